//! Pinning of packages the compiler considers unsafe (pip, setuptools).

use super::Feature;

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowUnsafe {
    enabled: bool,
}

impl AllowUnsafe {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Feature for AllowUnsafe {
    fn name(&self) -> &'static str {
        "allow_unsafe"
    }

    fn pin_options(&self, _env: &str) -> Vec<String> {
        if self.enabled {
            vec!["--allow-unsafe".to_string()]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_unsafe() {
        assert!(AllowUnsafe::default().pin_options("base").is_empty());
        assert_eq!(AllowUnsafe::new(true).pin_options("base"), vec!["--allow-unsafe"]);
    }
}
