//! Lock file model.
//!
//! A generated lock file has a fixed layout:
//!
//! ```text
//! # SHA256:<hex>                  <- integrity marker
//! #
//! # This file is autogenerated... <- header block
//! #
//! -r base.txt                     <- references, sorted
//! django==3.2.4                   <- body (pins and other compiler output)
//!     # via -r requirements/test.in
//! ```
//!
//! Files written by the compiler directly have no marker or references; they
//! parse into a lock file with an empty header and the whole content as body.

mod marker;
mod pin;

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

pub use marker::{MARKER_PREFIX, compute_marker, find_marker};
pub use pin::{Pin, canonical_name};

/// One logical line of a lock file body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A `name==version` pin with its hashes and annotations.
    Pin(Pin),
    /// Anything else, kept verbatim.
    Line(String),
}

/// Parsed lock file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockFile {
    /// Integrity marker line (`# SHA256:...`), if present.
    pub marker: Option<String>,
    /// Leading comment block, excluding the marker.
    pub header: Vec<String>,
    /// `-r` reference lines.
    pub references: Vec<String>,
    /// Body entries in order.
    pub entries: Vec<Entry>,
}

impl LockFile {
    /// Parse lock file text.
    pub fn parse(text: &str) -> Self {
        let mut lock = LockFile::default();
        let mut lines = text.lines().peekable();

        // Header: leading comment lines.
        while let Some(line) = lines.peek() {
            let trimmed = line.trim();
            if trimmed.is_empty() && lock.header.is_empty() && lock.marker.is_none() {
                lines.next();
                continue;
            }
            if !trimmed.starts_with('#') {
                break;
            }
            if trimmed.starts_with(MARKER_PREFIX) && lock.marker.is_none() {
                lock.marker = Some(trimmed.to_string());
            } else {
                lock.header.push(line.trim_end().to_string());
            }
            lines.next();
        }

        let mut logical = String::new();
        for line in lines {
            if let Some(stripped) = line.trim_end().strip_suffix('\\') {
                if !logical.is_empty() {
                    logical.push(' ');
                }
                logical.push_str(stripped.trim());
                continue;
            }
            if !logical.is_empty() {
                logical.push(' ');
                logical.push_str(line.trim());
                lock.push_logical(&logical);
                logical.clear();
                continue;
            }
            lock.push_physical(line);
        }
        if !logical.is_empty() {
            lock.push_logical(&logical);
        }

        lock
    }

    fn push_physical(&mut self, line: &str) {
        let is_annotation = line.starts_with(char::is_whitespace) && line.trim().starts_with('#');
        if is_annotation {
            if let Some(Entry::Pin(pin)) = self.entries.last_mut() {
                pin.annotations.push(line.trim_end().to_string());
                return;
            }
        }
        if is_reference(line) {
            self.references.push(line.trim().to_string());
            return;
        }
        self.push_logical(line);
    }

    fn push_logical(&mut self, line: &str) {
        match Pin::parse(line) {
            Some(pin) => self.entries.push(Entry::Pin(pin)),
            None => self.entries.push(Entry::Line(line.trim_end().to_string())),
        }
    }

    /// Read and parse a lock file from disk.
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::LockFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self::parse(&text))
    }

    /// Render the lock file text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(marker) = &self.marker {
            out.push_str(marker);
            out.push('\n');
        }
        for line in &self.header {
            out.push_str(line);
            out.push('\n');
        }
        for reference in &self.references {
            out.push_str(reference);
            out.push('\n');
        }
        for entry in &self.entries {
            match entry {
                Entry::Pin(pin) => out.push_str(&pin.serialize()),
                Entry::Line(line) => out.push_str(line),
            }
            out.push('\n');
        }
        out
    }

    /// Write the rendered lock file to disk.
    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render())?;
        Ok(())
    }

    /// Replace the header block, one line per header text line.
    pub fn set_header(&mut self, text: &str) {
        self.header = text.lines().map(str::to_string).collect();
    }

    /// Replace reference lines with `-r <file>` for each given file, sorted.
    pub fn set_references<I, S>(&mut self, files: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut files: Vec<String> = files.into_iter().map(|f| f.as_ref().to_string()).collect();
        files.sort();
        files.dedup();
        self.references = files.into_iter().map(|f| format!("-r {f}")).collect();
    }

    /// All pins in order.
    pub fn pins(&self) -> impl Iterator<Item = &Pin> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Pin(pin) => Some(pin),
            Entry::Line(_) => None,
        })
    }

    /// All pins in order, mutably.
    pub fn pins_mut(&mut self) -> impl Iterator<Item = &mut Pin> {
        self.entries.iter_mut().filter_map(|entry| match entry {
            Entry::Pin(pin) => Some(pin),
            Entry::Line(_) => None,
        })
    }

    /// Remove pins for which `keep` returns false, with their annotations.
    pub fn retain_pins(&mut self, mut keep: impl FnMut(&Pin) -> bool) {
        self.entries.retain(|entry| match entry {
            Entry::Pin(pin) => keep(pin),
            Entry::Line(_) => true,
        });
    }
}

fn is_reference(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("-r ") || trimmed.starts_with("--requirement")
}
