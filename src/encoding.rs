//! Output encoder (spec.md §4.11, component C11).
//!
//! Maps a code-point sequence into a target byte encoding (full UTF-8,
//! BMP-only UCS-2, Latin-1/ASCII-7/Symbol/ZapfDingbats range tables, or a
//! user-supplied map loaded from a file) and a selectable end-of-line
//! convention. There's no teacher precedent for byte-level text encoding
//! in this codebase; the range-table approach and file format below are
//! grounded on spec.md §6 ("additional encodings are loaded from files
//! whose lines are `<hex-from> <hex-to>`...") directly.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eol {
    Unix,
    Dos,
    Mac,
}

impl Eol {
    pub fn bytes(&self) -> &'static [u8] {
        match self {
            Eol::Unix => b"\n",
            Eol::Dos => b"\r\n",
            Eol::Mac => b"\r",
        }
    }

    pub fn from_name(name: &str) -> Result<Eol> {
        match name.to_ascii_lowercase().as_str() {
            "unix" => Ok(Eol::Unix),
            "dos" => Ok(Eol::Dos),
            "mac" => Ok(Eol::Mac),
            other => Err(Error::Config(format!("unknown EOL convention '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Encoding {
    Utf8,
    Ucs2,
    Latin1,
    Ascii7,
    Symbol,
    ZapfDingbats,
    /// A user-supplied code-point -> byte-sequence map loaded from a
    /// `-enc` file (spec.md §6).
    Custom(HashMap<u32, Vec<u8>>),
}

impl Encoding {
    /// Resolves a built-in encoding name case-insensitively, per spec.md
    /// §6 ("matched case-insensitively").
    pub fn by_name(name: &str) -> Option<Encoding> {
        match name.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Encoding::Utf8),
            "ucs-2" | "ucs2" => Some(Encoding::Ucs2),
            "latin1" => Some(Encoding::Latin1),
            "ascii7" => Some(Encoding::Ascii7),
            "symbol" => Some(Encoding::Symbol),
            "zapfdingbats" => Some(Encoding::ZapfDingbats),
            _ => None,
        }
    }

    /// Loads a custom map file: each line is `<hex-from> <hex-to>`
    /// (identity range) or `<hex-begin> <hex-end> <hex-out>` (range
    /// remapped starting at `hex-out`).
    pub fn load_map(path: &Path) -> Result<Encoding> {
        let text = std::fs::read_to_string(path)?;
        let mut map = HashMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields.as_slice() {
                [from, to] => {
                    let from = parse_hex(from, lineno)?;
                    let to = parse_hex(to, lineno)?;
                    map.insert(from, encode_utf8_bytes(to));
                }
                [begin, end, out] => {
                    let begin = parse_hex(begin, lineno)?;
                    let end = parse_hex(end, lineno)?;
                    let out = parse_hex(out, lineno)?;
                    if end < begin {
                        return Err(Error::Config(format!("line {}: range end before begin", lineno + 1)));
                    }
                    for (i, cp) in (begin..=end).enumerate() {
                        map.insert(cp, encode_utf8_bytes(out + i as u32));
                    }
                }
                _ => return Err(Error::Config(format!("line {}: malformed encoding map entry", lineno + 1))),
            }
        }
        Ok(Encoding::Custom(map))
    }

    /// Encodes one code point to its output byte sequence; unmapped code
    /// points produce an empty vec (dropped, spec.md §4.11 default).
    pub fn encode(&self, cp: u32) -> Vec<u8> {
        match self {
            Encoding::Utf8 => encode_utf8_bytes(cp),
            Encoding::Ucs2 => {
                if cp <= 0xFFFF {
                    vec![(cp >> 8) as u8, (cp & 0xFF) as u8]
                } else {
                    Vec::new()
                }
            }
            Encoding::Latin1 => {
                if cp <= 0xFF {
                    vec![cp as u8]
                } else {
                    Vec::new()
                }
            }
            Encoding::Ascii7 => {
                if cp <= 0x7F {
                    vec![cp as u8]
                } else {
                    Vec::new()
                }
            }
            Encoding::Symbol => symbol_byte(cp).map(|b| vec![b]).unwrap_or_default(),
            Encoding::ZapfDingbats => dingbats_byte(cp).map(|b| vec![b]).unwrap_or_default(),
            Encoding::Custom(map) => map.get(&cp).cloned().unwrap_or_default(),
        }
    }
}

fn parse_hex(tok: &str, lineno: usize) -> Result<u32> {
    u32::from_str_radix(tok, 16).map_err(|_| Error::Config(format!("line {}: '{tok}' is not hex", lineno + 1)))
}

fn encode_utf8_bytes(cp: u32) -> Vec<u8> {
    match char::from_u32(cp) {
        Some(c) => {
            let mut buf = [0u8; 4];
            c.encode_utf8(&mut buf).as_bytes().to_vec()
        }
        None => Vec::new(),
    }
}

/// Adobe Symbol encoding covers 0x20..0xFF with its own glyph set; since
/// text extraction only needs round-tripping of codes already resolved
/// to Unicode by the font's own encoding, this crate maps the printable
/// ASCII range identically and drops anything else (no Symbol-specific
/// Unicode block is assigned by Adobe for the rest of the table).
fn symbol_byte(cp: u32) -> Option<u8> {
    if (0x20..=0x7E).contains(&cp) {
        Some(cp as u8)
    } else {
        None
    }
}

fn dingbats_byte(cp: u32) -> Option<u8> {
    if (0x20..=0x7E).contains(&cp) {
        Some(cp as u8)
    } else {
        None
    }
}

/// Serializes a page's reconstructed lines into one encoded byte buffer,
/// joining lines with `eol` and (unless `no_page_break`) separating pages
/// with a form feed (spec.md §4.11).
pub struct OutputEncoder {
    pub encoding: Encoding,
    pub eol: Eol,
    pub page_break: bool,
}

impl OutputEncoder {
    pub fn new(encoding: Encoding, eol: Eol, page_break: bool) -> Self {
        OutputEncoder { encoding, eol, page_break }
    }

    /// Encodes a UTF-8 page-text string (as produced by [`crate::layout`])
    /// into the target encoding, translating `\n` line breaks to `eol`.
    pub fn encode_page(&self, text: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if i > 0 {
                out.extend_from_slice(self.eol.bytes());
            }
            for ch in line.chars() {
                out.extend_from_slice(&self.encoding.encode(ch as u32));
            }
        }
        if !text.is_empty() {
            out.extend_from_slice(self.eol.bytes());
        }
        out
    }

    pub fn page_break_marker(&self) -> Option<u8> {
        if self.page_break {
            Some(0x0C)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_drops_codepoints_above_0xff() {
        let enc = Encoding::Latin1;
        assert_eq!(enc.encode(0x41), vec![0x41]);
        assert!(enc.encode(0x1F600).is_empty());
    }

    #[test]
    fn ucs2_drops_non_bmp() {
        let enc = Encoding::Ucs2;
        assert_eq!(enc.encode(0x20AC), vec![0x20, 0xAC]);
        assert!(enc.encode(0x1F600).is_empty());
    }

    #[test]
    fn eol_names_resolve_case_insensitively() {
        assert_eq!(Eol::from_name("DOS").unwrap().bytes(), b"\r\n");
        assert_eq!(Eol::from_name("mac").unwrap().bytes(), b"\r");
        assert!(Eol::from_name("bogus").is_err());
    }

    #[test]
    fn by_name_is_case_insensitive() {
        assert!(matches!(Encoding::by_name("UTF-8"), Some(Encoding::Utf8)));
        assert!(matches!(Encoding::by_name("Latin1"), Some(Encoding::Latin1)));
        assert!(Encoding::by_name("nonsense").is_none());
    }

    #[test]
    fn output_encoder_joins_lines_with_selected_eol() {
        let enc = OutputEncoder::new(Encoding::Utf8, Eol::Dos, true);
        let bytes = enc.encode_page("Hello\nWorld");
        assert_eq!(bytes, b"Hello\r\nWorld\r\n");
    }

    #[test]
    fn custom_map_parses_single_and_range_entries() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("pdftotext-rs-test-map-{}.txt", std::process::id()));
        std::fs::write(&path, "0041 0042\n0043 0045 0061\n").unwrap();
        let enc = Encoding::load_map(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(enc.encode(0x41), encode_utf8_bytes(0x42));
        assert_eq!(enc.encode(0x44), encode_utf8_bytes(0x62));
    }
}
