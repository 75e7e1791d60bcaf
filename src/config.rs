//! Line-based `-cfg` configuration file (spec.md §6).
//!
//! A simple `key value` file, one setting per line, in the plain,
//! manual-parsing style `src/date.rs`'s expression parser already uses in
//! this crate rather than pulling in a TOML/serde dependency for three
//! settings.

use crate::error::{Error, Result};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub default_encoding: Option<String>,
    pub default_eol: Option<String>,
    pub unicode_map_paths: Vec<String>,
}

impl Config {
    /// Parses `key value` pairs, one per line; blank lines and lines
    /// starting with `#` are ignored. Recognized keys: `encoding`, `eol`,
    /// `unicode-map` (repeatable).
    pub fn parse(text: &str) -> Result<Config> {
        let mut cfg = Config::default();
        for (lineno, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let key = parts.next().unwrap_or("");
            let value = parts.next().unwrap_or("").trim();
            if value.is_empty() {
                return Err(Error::Config(format!("line {}: '{key}' has no value", lineno + 1)));
            }
            match key {
                "encoding" => cfg.default_encoding = Some(value.to_string()),
                "eol" => cfg.default_eol = Some(value.to_string()),
                "unicode-map" => cfg.unicode_map_paths.push(value.to_string()),
                other => return Err(Error::Config(format!("line {}: unknown setting '{other}'", lineno + 1))),
            }
        }
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        Config::parse(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recognized_keys() {
        let cfg = Config::parse("encoding UTF-8\neol dos\nunicode-map /tmp/a.map\nunicode-map /tmp/b.map\n").unwrap();
        assert_eq!(cfg.default_encoding.as_deref(), Some("UTF-8"));
        assert_eq!(cfg.default_eol.as_deref(), Some("dos"));
        assert_eq!(cfg.unicode_map_paths, vec!["/tmp/a.map", "/tmp/b.map"]);
    }

    #[test]
    fn blank_lines_and_comments_are_skipped() {
        let cfg = Config::parse("# comment\n\nencoding Latin1\n").unwrap();
        assert_eq!(cfg.default_encoding.as_deref(), Some("Latin1"));
    }

    #[test]
    fn unknown_key_is_a_config_error() {
        assert!(Config::parse("bogus value").is_err());
    }

    #[test]
    fn missing_value_is_a_config_error() {
        assert!(Config::parse("encoding").is_err());
    }
}
