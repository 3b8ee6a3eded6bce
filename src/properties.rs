//! Sorted `key=value` documents used for missing-license and override files

use crate::error::{LicenseError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// Key-sorted properties, written back in key order for reproducible diffs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SortedProperties {
    entries: BTreeMap<String, String>,
}

impl SortedProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a properties document
    ///
    /// Supports `key=value`, `key:value` and `key value` forms, `#` and `!`
    /// comments, backslash escapes and backslash line continuations.
    pub fn parse(content: &str) -> Self {
        let mut entries = BTreeMap::new();
        let mut lines = content.lines();

        while let Some(line) = lines.next() {
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }

            let mut logical = trimmed.to_string();
            while ends_with_continuation(&logical) {
                logical.pop();
                match lines.next() {
                    Some(next) => logical.push_str(next.trim_start()),
                    None => break,
                }
            }

            let (key, value) = split_entry(&logical);
            entries.insert(unescape(key), unescape(value));
        }

        Self { entries }
    }

    /// Load a properties file
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| LicenseError::file(path, e))?;
        Ok(Self::parse(&content))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render with each header line as a `#` comment
    pub fn render<S: AsRef<str>>(&self, header: &[S]) -> String {
        let mut out = String::new();
        for line in header {
            let line = line.as_ref();
            if line.is_empty() {
                out.push_str("#\n");
            } else {
                let _ = writeln!(out, "# {}", line);
            }
        }
        for (key, value) in &self.entries {
            let _ = writeln!(out, "{}={}", escape(key, true), escape(value, false));
        }
        out
    }

    /// Write to a file, creating parent directories
    pub fn store<S: AsRef<str>>(&self, path: &Path, header: &[S]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LicenseError::file(parent, e))?;
        }
        std::fs::write(path, self.render(header)).map_err(|e| LicenseError::file(path, e))
    }
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' => {
                key_end = index;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let rest = line[key_end..].trim_start_matches([' ', '\t']);
    let rest = rest
        .strip_prefix('=')
        .or_else(|| rest.strip_prefix(':'))
        .unwrap_or(rest);
    (key, rest.trim_start_matches([' ', '\t']))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{000c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('u');
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn escape(raw: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for (index, c) in raw.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{000c}' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' if is_key => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || index == 0 => out.push_str("\\ "),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_separators_and_comments() {
        let props = SortedProperties::parse(
            "# comment\n! other comment\n\norg--a--1.0=MIT\norg--b--2.0 : Apache-2.0\norg--c--3.0=\norg--d--4.0 BSD\n",
        );
        assert_eq!(props.get("org--a--1.0"), Some("MIT"));
        assert_eq!(props.get("org--b--2.0"), Some("Apache-2.0"));
        assert_eq!(props.get("org--c--3.0"), Some(""));
        assert_eq!(props.get("org--d--4.0"), Some("BSD"));
        assert_eq!(props.len(), 4);
    }

    #[test]
    fn test_parse_continuation_and_escapes() {
        let props = SortedProperties::parse("key=The Apache \\\n    License\nspaced\\ key=\\u0041BC\n");
        assert_eq!(props.get("key"), Some("The Apache License"));
        assert_eq!(props.get("spaced key"), Some("ABC"));
    }

    #[test]
    fn test_render_is_sorted_with_header() {
        let mut props = SortedProperties::new();
        props.insert("z--z--1", "MIT");
        props.insert("a--a--1", "");
        let rendered = props.render(&["Generated", ""]);
        assert_eq!(rendered, "# Generated\n#\na--a--1=\nz--z--1=MIT\n");
    }

    #[test]
    fn test_store_and_load_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("THIRD-PARTY.properties");

        let mut props = SortedProperties::new();
        props.insert("org--a--1.0", "The Apache License, Version 2.0");
        props.insert("odd key=1", " leading space");
        props.store(&path, &["header"]).unwrap();

        assert_eq!(SortedProperties::load(&path).unwrap(), props);
    }

    #[test]
    fn test_absent_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.properties");
        assert!(matches!(
            SortedProperties::load(&path),
            Err(LicenseError::FileError { .. })
        ));
    }
}
