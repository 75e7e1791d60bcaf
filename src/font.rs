//! Font model (spec.md §3 "Font", feeding component C8).
//!
//! A `Font` exposes what the content-stream interpreter needs to turn a
//! string operand into positioned, Unicode-tagged glyphs: a character-code
//! decoder (per-byte for simple fonts, per-CID for composite Type 0 fonts),
//! per-glyph advance widths, a Unicode translation (the font's `ToUnicode`
//! CMap, falling back to its encoding table), and the descriptor flags
//! (fixed-pitch, serif, italic, bold, symbolic) `TextFontInfo` exposes in
//! `original_source/xpdf/TextFontInfo.cc`.
//!
//! Ascent/descent clamping ("odd ascent/descent values cause trouble more
//! often than not") and the fixed-pitch-width-from-glyph-`m` heuristic are
//! both grounded in that file.

use crate::error::Result;
use crate::object::{Dict, Object, Ref};
use crate::xref::XRef;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct FontFlags {
    pub fixed_pitch: bool,
    pub serif: bool,
    pub symbolic: bool,
    pub italic: bool,
    pub bold: bool,
}

impl FontFlags {
    fn from_bits(bits: i32) -> Self {
        FontFlags {
            fixed_pitch: bits & 1 != 0,
            serif: bits & 2 != 0,
            symbolic: bits & 4 != 0,
            italic: bits & 64 != 0,
            bold: bits & 0x40000 != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontKind {
    Type1,
    TrueType,
    Type3,
    Type0,
}

/// A loaded font, enough of one to decode strings and report metrics.
/// Matches spec.md §3's "union of Type 1, Type 1C (CFF), TrueType, Type 3,
/// Type 0 (composite)" — Type1/Type1C/TrueType differ only in outline
/// format, irrelevant to text extraction, so they share `FontKind::Type1`
/// and `FontKind::TrueType` without distinguishing CFF from Type1.
pub struct Font {
    pub id: Ref,
    pub name: Option<String>,
    pub kind: FontKind,
    pub flags: FontFlags,
    pub ascent: f64,
    pub descent: f64,
    /// Glyph-space-to-text-space matrix; `[0.001, 0, 0, 0.001, 0, 0]` for
    /// every font kind except Type 3, which supplies its own `/FontMatrix`.
    pub font_matrix: [f64; 6],
    widths: HashMap<u32, f64>,
    default_width: f64,
    to_unicode: HashMap<u32, Vec<u32>>,
    is_composite: bool,
    /// Byte width of one character code: 1 for simple fonts, 2 for a
    /// composite font using the near-universal Identity-H/V encoding
    /// (spec.md doesn't require general multi-byte CMap codespace parsing;
    /// Identity-H covers the overwhelming majority of real documents).
    code_bytes: u8,
    /// code -> glyph name, for the StandardEncoding/WinAnsiEncoding/
    /// Differences fallback used when there's no ToUnicode CMap.
    encoding_names: HashMap<u8, String>,
}

impl Font {
    pub fn load(xref: &XRef, font_ref: Ref, font_dict: &Dict) -> Result<Font> {
        let subtype = font_dict.get("Subtype").and_then(|o| o.as_name().ok()).unwrap_or("");
        let is_composite = subtype == "Type0";

        let (descriptor_dict, descendant_widths_source, default_width) = if is_composite {
            let descendant = first_descendant(xref, font_dict)?;
            let desc = descendant
                .as_ref()
                .and_then(|d| d.get("FontDescriptor"))
                .map(|o| xref.resolve(o, 0))
                .transpose()?
                .and_then(|o| o.as_dict().ok().cloned());
            let dw = descendant
                .as_ref()
                .and_then(|d| d.get("DW"))
                .and_then(|o| o.as_f64().ok())
                .unwrap_or(1000.0);
            (desc, descendant, dw)
        } else {
            let desc = font_dict
                .get("FontDescriptor")
                .map(|o| xref.resolve(o, 0))
                .transpose()?
                .and_then(|o| o.as_dict().ok().cloned());
            (desc, None, 0.0)
        };

        let mut ascent = 0.75;
        let mut descent = -0.25;
        let mut flags = FontFlags::default();
        if let Some(d) = &descriptor_dict {
            if let Some(a) = d.get("Ascent").and_then(|o| o.as_f64().ok()) {
                ascent = if a / 1000.0 > 1.0 { 0.75 } else { a / 1000.0 };
            }
            if let Some(a) = d.get("Descent").and_then(|o| o.as_f64().ok()) {
                descent = if a / 1000.0 < -0.5 { -0.25 } else { a / 1000.0 };
            }
            if let Some(f) = d.get("Flags").and_then(|o| o.as_int().ok()) {
                flags = FontFlags::from_bits(f);
            }
        }

        let kind = if subtype == "Type3" {
            FontKind::Type3
        } else if is_composite {
            FontKind::Type0
        } else if subtype == "TrueType" {
            FontKind::TrueType
        } else {
            FontKind::Type1
        };

        let font_matrix = if kind == FontKind::Type3 {
            read_matrix(font_dict.get("FontMatrix")).unwrap_or([0.001, 0.0, 0.0, 0.001, 0.0, 0.0])
        } else {
            [0.001, 0.0, 0.0, 0.001, 0.0, 0.0]
        };

        let name = font_dict
            .get("BaseFont")
            .and_then(|o| o.as_name().ok())
            .map(|s| s.to_string());

        let (widths, computed_default) = if is_composite {
            let d = descendant_widths_source.as_ref();
            (read_composite_widths(xref, d)?, default_width)
        } else {
            (read_simple_widths(xref, font_dict)?, 0.0)
        };

        let to_unicode = read_to_unicode(xref, font_dict)?;

        let encoding_names = if is_composite {
            HashMap::new()
        } else {
            read_simple_encoding(font_dict, flags.symbolic)
        };

        Ok(Font {
            id: font_ref,
            name,
            kind,
            flags,
            ascent,
            descent,
            font_matrix,
            widths,
            default_width: computed_default,
            to_unicode,
            is_composite,
            code_bytes: if is_composite { 2 } else { 1 },
            encoding_names,
        })
    }

    pub fn is_fixed_pitch(&self) -> bool {
        self.flags.fixed_pitch
    }

    /// A minimal, otherwise-unused font for layout-analyzer tests that
    /// need a `Rc<Font>` to hang a `TextChar` off of but don't exercise
    /// any font behavior themselves.
    #[cfg(test)]
    pub fn dummy_for_test() -> Font {
        Font {
            id: Ref::new(0, 0),
            name: None,
            kind: FontKind::Type1,
            flags: FontFlags::default(),
            ascent: 0.75,
            descent: -0.25,
            font_matrix: [0.001, 0.0, 0.0, 0.001, 0.0, 0.0],
            widths: HashMap::new(),
            default_width: 500.0,
            to_unicode: HashMap::new(),
            is_composite: false,
            code_bytes: 1,
            encoding_names: HashMap::new(),
        }
    }

    /// Splits a content-stream string operand into (code, byte-length)
    /// pairs: one byte per code for simple fonts, two for composite
    /// (Identity-H/V) fonts.
    pub fn decode_string(&self, bytes: &[u8]) -> Vec<(u32, u8)> {
        if self.code_bytes == 2 {
            bytes
                .chunks(2)
                .map(|c| {
                    let code = if c.len() == 2 {
                        ((c[0] as u32) << 8) | c[1] as u32
                    } else {
                        c[0] as u32
                    };
                    (code, c.len() as u8)
                })
                .collect()
        } else {
            bytes.iter().map(|&b| (b as u32, 1u8)).collect()
        }
    }

    /// Advance width for one character code, in glyph-space/1000 units
    /// (multiply by the font size to get text-space units).
    pub fn width(&self, code: u32) -> f64 {
        self.widths.get(&code).copied().unwrap_or(self.default_width) / 1000.0
    }

    /// Unicode translation for one character code: the ToUnicode CMap if
    /// present, else the encoding table's glyph name mapped through the
    /// built-in Adobe-standard-name table (spec.md §4.8 step 3).
    pub fn to_unicode(&self, code: u32) -> Vec<u32> {
        if let Some(u) = self.to_unicode.get(&code) {
            return u.clone();
        }
        if !self.is_composite {
            if let Some(name) = self.encoding_names.get(&(code as u8)) {
                if let Some(cp) = glyph_name_to_unicode(name) {
                    return vec![cp];
                }
            }
            // No encoding table entry: symbolic fonts and built-in
            // encodings commonly just use the code as a Latin-1 code
            // point (xpdf falls back similarly for "no known name").
            return vec![code];
        }
        // Composite font, no ToUnicode: CID-to-Unicode requires the
        // collection's own CMap, out of scope; emit nothing rather than a
        // wrong guess.
        Vec::new()
    }
}

fn first_descendant(xref: &XRef, font_dict: &Dict) -> Result<Option<Dict>> {
    let Some(arr) = font_dict.get("DescendantFonts") else {
        return Ok(None);
    };
    let resolved = xref.resolve(arr, 0)?;
    let items = resolved.as_array()?;
    let Some(first) = items.first() else {
        return Ok(None);
    };
    Ok(xref.resolve(first, 0)?.as_dict().ok().cloned())
}

fn read_matrix(obj: Option<&Object>) -> Option<[f64; 6]> {
    let arr = obj?.as_array().ok()?;
    if arr.len() != 6 {
        return None;
    }
    let mut m = [0.0; 6];
    for (i, o) in arr.iter().enumerate() {
        m[i] = o.as_f64().ok()?;
    }
    Some(m)
}

fn read_simple_widths(xref: &XRef, font_dict: &Dict) -> Result<HashMap<u32, f64>> {
    let mut out = HashMap::new();
    let first_char = font_dict.get("FirstChar").and_then(|o| o.as_int().ok()).unwrap_or(0);
    let Some(widths_obj) = font_dict.get("Widths") else {
        return Ok(out);
    };
    let resolved = xref.resolve(widths_obj, 0)?;
    let Ok(items) = resolved.as_array() else {
        return Ok(out);
    };
    for (i, w) in items.iter().enumerate() {
        let resolved_w = xref.resolve(w, 0)?;
        if let Ok(v) = resolved_w.as_f64() {
            out.insert((first_char + i as i32) as u32, v);
        }
    }
    Ok(out)
}

/// `/W` array: `c [w1 w2 ...]` (consecutive widths starting at c) or
/// `c1 c2 w` (range sharing one width).
fn read_composite_widths(xref: &XRef, descendant: Option<&Dict>) -> Result<HashMap<u32, f64>> {
    let mut out = HashMap::new();
    let Some(d) = descendant else {
        return Ok(out);
    };
    let Some(w_obj) = d.get("W") else {
        return Ok(out);
    };
    let resolved = xref.resolve(w_obj, 0)?;
    let Ok(items) = resolved.as_array() else {
        return Ok(out);
    };
    let mut i = 0;
    while i < items.len() {
        let Ok(c1) = items[i].as_int() else {
            break;
        };
        i += 1;
        if i >= items.len() {
            break;
        }
        if let Ok(arr) = xref.resolve(&items[i], 0)?.as_array() {
            for (j, w) in arr.iter().enumerate() {
                if let Ok(v) = w.as_f64() {
                    out.insert((c1 + j as i32) as u32, v);
                }
            }
            i += 1;
        } else if let Ok(c2) = items[i].as_int() {
            i += 1;
            if i >= items.len() {
                break;
            }
            if let Ok(v) = items[i].as_f64() {
                for code in c1..=c2 {
                    out.insert(code as u32, v);
                }
            }
            i += 1;
        } else {
            break;
        }
    }
    Ok(out)
}

/// Parses a `ToUnicode` CMap stream just enough for `bfchar`/`bfrange`
/// entries — the only constructs real-world ToUnicode CMaps use.
fn read_to_unicode(xref: &XRef, font_dict: &Dict) -> Result<HashMap<u32, Vec<u32>>> {
    let mut out = HashMap::new();
    let Some(obj) = font_dict.get("ToUnicode") else {
        return Ok(out);
    };
    let resolved = xref.resolve(obj, 0)?;
    let Object::Stream(dict, raw) = &resolved else {
        return Ok(out);
    };
    let bytes = crate::stream::decoded_bytes(dict, raw, None)?;
    parse_cmap_bf(&bytes, &mut out);
    Ok(out)
}

fn parse_cmap_bf(bytes: &[u8], out: &mut HashMap<u32, Vec<u32>>) {
    let text = String::from_utf8_lossy(bytes);
    let mut in_char = false;
    let mut in_range = false;
    let mut tokens: Vec<&str> = Vec::new();

    for word in text.split_whitespace() {
        match word {
            "beginbfchar" => {
                in_char = true;
                tokens.clear();
                continue;
            }
            "endbfchar" => {
                in_char = false;
                continue;
            }
            "beginbfrange" => {
                in_range = true;
                tokens.clear();
                continue;
            }
            "endbfrange" => {
                in_range = false;
                continue;
            }
            _ => {}
        }
        if in_char {
            tokens.push(word);
            if tokens.len() == 2 {
                if let (Some(src), Some(dst)) = (hex_string(tokens[0]), hex_codepoints(tokens[1])) {
                    out.insert(src, dst);
                }
                tokens.clear();
            }
        } else if in_range {
            tokens.push(word);
            if tokens.len() == 3 {
                if let (Some(lo), Some(hi)) = (hex_string(tokens[0]), hex_string(tokens[1])) {
                    if tokens[2].starts_with('[') {
                        // array form handled loosely: not split across
                        // whitespace boundaries reliably; skip (rare).
                    } else if let Some(base) = hex_codepoints(tokens[2]) {
                        if let Some(&first) = base.first() {
                            for (i, code) in (lo..=hi.min(lo + 0xFFFF)).enumerate() {
                                out.insert(code, vec![first + i as u32]);
                            }
                        }
                    }
                }
                tokens.clear();
            }
        }
    }
}

fn hex_string(tok: &str) -> Option<u32> {
    let t = tok.trim_start_matches('<').trim_end_matches('>');
    u32::from_str_radix(t, 16).ok()
}

fn hex_codepoints(tok: &str) -> Option<Vec<u32>> {
    let t = tok.trim_start_matches('<').trim_end_matches('>');
    if t.len() % 4 != 0 || t.is_empty() {
        return u32::from_str_radix(t, 16).ok().map(|v| vec![v]);
    }
    let mut out = Vec::new();
    for chunk in t.as_bytes().chunks(4) {
        let s = std::str::from_utf8(chunk).ok()?;
        out.push(u32::from_str_radix(s, 16).ok()?);
    }
    Some(out)
}

/// Builds code -> glyph-name from `/Encoding`: a base table
/// (StandardEncoding for non-symbolic fonts, identity for symbolic ones)
/// plus `/Differences` overrides.
fn read_simple_encoding(font_dict: &Dict, symbolic: bool) -> HashMap<u8, String> {
    let mut table: HashMap<u8, String> = HashMap::new();
    let mut base_is_win_ansi = !symbolic;

    let encoding_obj = font_dict.get("Encoding");
    let mut differences: Option<&[Object]> = None;
    if let Some(obj) = encoding_obj {
        match obj {
            Object::Name(n) => {
                base_is_win_ansi = n.as_ref() == "WinAnsiEncoding" || n.as_ref() == "StandardEncoding" || n.as_ref() == "MacRomanEncoding";
            }
            Object::Dict(d) => {
                if let Some(Object::Name(n)) = d.get("BaseEncoding") {
                    base_is_win_ansi = n.as_ref() == "WinAnsiEncoding" || n.as_ref() == "StandardEncoding" || n.as_ref() == "MacRomanEncoding";
                }
                if let Some(Object::Array(arr)) = d.get("Differences") {
                    differences = Some(arr.as_slice());
                }
            }
            _ => {}
        }
    }

    if base_is_win_ansi {
        for code in 32u16..=126 {
            table.insert(code as u8, standard_ascii_name(code as u8).to_string());
        }
    }

    if let Some(diffs) = differences {
        let mut code = 0u32;
        for item in diffs {
            match item {
                Object::Int(n) => code = *n as u32,
                Object::Name(n) => {
                    if code <= 255 {
                        table.insert(code as u8, n.to_string());
                    }
                    code += 1;
                }
                _ => {}
            }
        }
    }

    table
}

/// Adobe StandardEncoding/WinAnsiEncoding glyph names for the printable
/// ASCII range; identical in both encodings for 32..=126.
fn standard_ascii_name(code: u8) -> &'static str {
    const NAMES: [&str; 95] = [
        "space", "exclam", "quotedbl", "numbersign", "dollar", "percent", "ampersand", "quotesingle",
        "parenleft", "parenright", "asterisk", "plus", "comma", "hyphen", "period", "slash",
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
        "colon", "semicolon", "less", "equal", "greater", "question", "at",
        "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R",
        "S", "T", "U", "V", "W", "X", "Y", "Z",
        "bracketleft", "backslash", "bracketright", "asciicircum", "underscore", "grave",
        "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r",
        "s", "t", "u", "v", "w", "x", "y", "z",
        "braceleft", "bar", "braceright", "asciitilde",
    ];
    NAMES[(code as usize).saturating_sub(32).min(94)]
}

/// Reverses [`standard_ascii_name`], plus `uniXXXX` and single-letter
/// glyph names, plus a handful of common Latin-1 Differences entries.
fn glyph_name_to_unicode(name: &str) -> Option<u32> {
    if let Some(hex) = name.strip_prefix("uni") {
        if let Ok(v) = u32::from_str_radix(hex, 16) {
            return Some(v);
        }
    }
    for code in 32u8..=126 {
        if standard_ascii_name(code) == name {
            return Some(code as u32);
        }
    }
    match name {
        "bullet" => Some(0x2022),
        "endash" => Some(0x2013),
        "emdash" => Some(0x2014),
        "quotedblleft" => Some(0x201C),
        "quotedblright" => Some(0x201D),
        "quoteleft" => Some(0x2018),
        "quoteright" => Some(0x2019),
        "ellipsis" => Some(0x2026),
        "fi" => Some(0xFB01),
        "fl" => Some(0xFB02),
        "eacute" => Some(0x00E9),
        "egrave" => Some(0x00E8),
        "agrave" => Some(0x00E0),
        "adieresis" => Some(0x00E4),
        "ouml" | "odieresis" => Some(0x00F6),
        "uuml" | "udieresis" => Some(0x00FC),
        "ccedilla" => Some(0x00E7),
        "ntilde" => Some(0x00F1),
        "nbspace" | "space" => Some(0x0020),
        _ if name.chars().count() == 1 => name.chars().next().map(|c| c as u32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn simple_font_decodes_one_byte_per_code() {
        let font = Font {
            id: Ref::new(1, 0),
            name: None,
            kind: FontKind::Type1,
            flags: FontFlags::default(),
            ascent: 0.75,
            descent: -0.25,
            font_matrix: [0.001, 0.0, 0.0, 0.001, 0.0, 0.0],
            widths: HashMap::new(),
            default_width: 500.0,
            to_unicode: HashMap::new(),
            is_composite: false,
            code_bytes: 1,
            encoding_names: HashMap::new(),
        };
        assert_eq!(font.decode_string(b"AB"), vec![(65, 1), (66, 1)]);
        assert_eq!(font.width(1), 0.5);
    }

    #[test]
    fn composite_font_decodes_two_bytes_per_code() {
        let font = Font {
            id: Ref::new(1, 0),
            name: None,
            kind: FontKind::Type0,
            flags: FontFlags::default(),
            ascent: 0.75,
            descent: -0.25,
            font_matrix: [0.001, 0.0, 0.0, 0.001, 0.0, 0.0],
            widths: HashMap::new(),
            default_width: 1000.0,
            to_unicode: HashMap::new(),
            is_composite: true,
            code_bytes: 2,
            encoding_names: HashMap::new(),
        };
        assert_eq!(font.decode_string(&[0x00, 0x41, 0x00, 0x42]), vec![(0x41, 2), (0x42, 2)]);
    }

    #[test]
    fn glyph_name_fallback_covers_ascii_and_uni_escapes() {
        assert_eq!(glyph_name_to_unicode("A"), Some(b'A' as u32));
        assert_eq!(glyph_name_to_unicode("space"), Some(0x20));
        assert_eq!(glyph_name_to_unicode("uni00E9"), Some(0x00E9));
    }

    #[test]
    fn bfchar_cmap_parses() {
        let mut out = HashMap::new();
        parse_cmap_bf(b"beginbfchar\n<0041> <0042>\nendbfchar", &mut out);
        assert_eq!(out.get(&0x41), Some(&vec![0x42]));
    }

    #[test]
    fn bfrange_cmap_parses() {
        let mut out = HashMap::new();
        parse_cmap_bf(b"beginbfrange\n<0020> <0022> <0041>\nendbfrange", &mut out);
        assert_eq!(out.get(&0x20), Some(&vec![0x41]));
        assert_eq!(out.get(&0x22), Some(&vec![0x43]));
    }

    #[allow(dead_code)]
    fn assert_rc<T>(_: &Rc<T>) {}
}
