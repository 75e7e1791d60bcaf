//! Parser (spec.md §4.4, component C4).
//!
//! Consumes [`Token`]s into [`Object`]s. Handles indirect references, the
//! `stream`…`endstream` prelude (including `/Length`-by-indirect-ref and
//! the scan-for-`endstream` fallback), and indirect object definitions
//! (`N G obj … endobj`). Parsing always runs over a plain in-memory byte
//! buffer — either a slice of the source file (for the document body) or
//! an already-decoded content stream — so the parser is built directly on
//! [`MemoryStream`] rather than generically over [`ByteStream`].

use crate::error::{Error, Result};
use crate::lexer::{Lexer, Mode, Token};
use crate::object::{Dict, Object, RawStream, Ref};
use crate::stream::MemoryStream;
use std::rc::Rc;

/// Recursion bound for nested arrays/dicts (spec.md §4.4, §8).
pub const MAX_PARSE_DEPTH: u32 = 500;

/// Callback used to resolve an indirect `/Length` without re-entering the
/// whole xref/fetch machinery from this module. The cross-reference table
/// supplies this when parsing the document body.
pub type LengthResolver<'a> = dyn Fn(Ref) -> Result<i64> + 'a;

pub struct Parser {
    lexer: Lexer<MemoryStream>,
    pending: Vec<Token>,
    /// The whole backing buffer, so `stream`/`endstream` payloads can be
    /// sliced directly rather than read byte-by-byte through the lexer.
    snapshot: Rc<[u8]>,
}

impl Parser {
    pub fn new(data: Rc<[u8]>, offset: u64) -> Self {
        let mut stream = MemoryStream::whole(data.clone());
        stream.seek(offset);
        Parser {
            lexer: Lexer::new(stream),
            pending: Vec::new(),
            snapshot: data,
        }
    }

    pub fn pos(&self) -> u64 {
        self.lexer.pos()
    }

    pub fn seek(&mut self, offset: u64) {
        self.pending.clear();
        self.lexer.raw_seek(offset);
    }

    fn next_token(&mut self) -> Token {
        self.pending.pop().unwrap_or_else(|| self.lexer.next_token())
    }

    fn push_back(&mut self, t: Token) {
        self.pending.push(t);
    }

    /// Parse one object, with no `/Length` resolver: any stream dict whose
    /// `/Length` is an indirect ref falls back to the scan-for-`endstream`
    /// recovery path.
    pub fn parse_object(&mut self) -> Result<Object> {
        self.parse_object_with(&|_| Err(Error::Unimplemented("indirect Length".into())))
    }

    pub fn parse_object_with(&mut self, lengths: &LengthResolver) -> Result<Object> {
        self.parse_object_depth(lengths, 0)
    }

    /// Parse a single content-stream-style token into an `Object`/`Command`
    /// without ref/stream handling — used by the content interpreter (C8),
    /// which re-lexes decoded page content and never sees indirect
    /// references or embedded streams.
    pub fn next_content_token(&mut self) -> Result<Object> {
        let tok = self.next_token();
        match tok {
            Token::ArrayOpen | Token::DictOpen => {
                self.parse_object_with(&|_| Err(Error::Unimplemented("indirect Length".into())))
            }
            other => self.object_from_token(other, &|_| Err(Error::Internal("no refs in content streams".into())), 0),
        }
    }

    fn parse_object_depth(&mut self, lengths: &LengthResolver, depth: u32) -> Result<Object> {
        if depth > MAX_PARSE_DEPTH {
            return Err(Error::RecursionLimit("object nesting"));
        }
        let tok = self.next_token();
        self.object_from_token(tok, lengths, depth)
    }

    fn object_from_token(&mut self, tok: Token, lengths: &LengthResolver, depth: u32) -> Result<Object> {
        match tok {
            Token::Eof => Ok(Object::Eof),
            Token::Error => Ok(Object::Error),
            Token::Null => Ok(Object::Null),
            Token::Bool(b) => Ok(Object::Bool(b)),
            Token::Real(r) => Ok(Object::Real(r)),
            Token::String(s) => Ok(Object::String(s)),
            Token::Name(n) => Ok(Object::Name(n)),
            Token::ArrayOpen => self.parse_array(lengths, depth + 1),
            Token::DictOpen => self.parse_dict_or_stream(lengths, depth + 1),
            Token::Int(n) => self.parse_int_or_ref(n),
            Token::Keyword(k) => Ok(Object::Command(Rc::from(k.as_str()))),
            Token::ArrayClose | Token::DictClose => Ok(Object::Error),
        }
    }

    /// `int` alone, or the two-token lookahead for `int int R`.
    fn parse_int_or_ref(&mut self, n: i32) -> Result<Object> {
        let t2 = self.next_token();
        let Token::Int(gen) = t2 else {
            self.push_back(t2);
            return Ok(Object::Int(n));
        };
        let t3 = self.next_token();
        match t3 {
            Token::Keyword(ref k) if k == "R" => {
                if n < 0 {
                    return Ok(Object::Error);
                }
                Ok(Object::Ref(Ref::new(n as u32, gen as u16)))
            }
            _ => {
                self.push_back(t3);
                self.push_back(Token::Int(gen));
                Ok(Object::Int(n))
            }
        }
    }

    fn parse_array(&mut self, lengths: &LengthResolver, depth: u32) -> Result<Object> {
        if depth > MAX_PARSE_DEPTH {
            return Err(Error::RecursionLimit("object nesting"));
        }
        let mut items = Vec::new();
        loop {
            let tok = self.next_token();
            match tok {
                Token::ArrayClose => break,
                Token::Eof => break,
                other => items.push(self.object_from_token(other, lengths, depth)?),
            }
        }
        Ok(Object::Array(items))
    }

    fn parse_dict_or_stream(&mut self, lengths: &LengthResolver, depth: u32) -> Result<Object> {
        let mut dict = Dict::new();
        loop {
            let tok = self.next_token();
            match tok {
                Token::DictClose => break,
                Token::Eof => break,
                Token::Name(key) => {
                    let value = self.parse_object_depth(lengths, depth)?;
                    dict.insert(key, value);
                }
                _ => {
                    // Malformed entry (key wasn't a name): skip the value
                    // and keep going rather than aborting the whole dict.
                    let _ = self.parse_object_depth(lengths, depth);
                }
            }
        }

        let next = self.next_token();
        match next {
            Token::Keyword(ref k) if k == "stream" => {
                let raw = self.read_stream_payload(&dict, lengths)?;
                Ok(Object::Stream(dict, raw))
            }
            other => {
                self.push_back(other);
                Ok(Object::Dict(dict))
            }
        }
    }

    /// After the `stream` keyword: skip exactly one EOL (`\n` or `\r\n`,
    /// never a bare `\r` — spec.md §6 byte-exactness), then capture
    /// `/Length` bytes (or scan for `endstream` if absent/invalid/indirect
    /// and unresolvable).
    fn read_stream_payload(&mut self, dict: &Dict, lengths: &LengthResolver) -> Result<RawStream> {
        let after_keyword = self.lexer.pos();
        let data_start = self.skip_stream_eol(after_keyword);

        let declared_len = match dict.get("Length") {
            Some(Object::Int(n)) => Some(*n as i64),
            Some(Object::Ref(r)) => lengths(*r).ok(),
            _ => None,
        };

        let full = &self.snapshot;
        let (start, end) = match declared_len {
            Some(len) if len >= 0 && (data_start as i64 + len) as usize <= full.len() => {
                (data_start as usize, (data_start as i64 + len) as usize)
            }
            _ => scan_for_endstream(full, data_start as usize),
        };

        let bytes: Rc<[u8]> = Rc::from(&full[start..end.min(full.len())]);

        // Resync past "endstream" for the outer object loop.
        self.lexer.raw_seek(end as u64);
        self.skip_past_keyword("endstream");

        Ok(RawStream { bytes })
    }

    /// Applies the exact stream-EOL rule directly against the backing
    /// buffer and returns the payload start offset.
    fn skip_stream_eol(&self, pos: u64) -> u64 {
        let full = &self.snapshot;
        let mut i = pos as usize;
        if i < full.len() && full[i] == b'\r' {
            i += 1;
            if i < full.len() && full[i] == b'\n' {
                i += 1;
            }
        } else if i < full.len() && full[i] == b'\n' {
            i += 1;
        }
        i as u64
    }

    /// Switches the lexer into raw byte-copy mode and consumes an inline
    /// image's data up to its whitespace-preceded `EI` (spec.md §4.4). Used
    /// by the content-stream interpreter right after parsing the `BI`
    /// dictionary's key/value pairs and the `ID` keyword.
    pub fn skip_inline_image_data(&mut self) -> Vec<u8> {
        self.pending.clear();
        self.lexer.mode = Mode::InlineImageData;
        self.lexer.read_inline_image_data()
    }

    fn skip_past_keyword(&mut self, keyword: &str) {
        loop {
            match self.next_token() {
                Token::Keyword(ref k) if k == keyword => break,
                Token::Eof => break,
                _ => continue,
            }
        }
    }
}

fn scan_for_endstream(full: &[u8], from: usize) -> (usize, usize) {
    const NEEDLE: &[u8] = b"endstream";
    let from = from.min(full.len());
    if let Some(rel) = full[from..].windows(NEEDLE.len()).position(|w| w == NEEDLE) {
        let mut end = from + rel;
        // Trim a trailing EOL that belongs to the keyword line, not data.
        if end > from && full[end - 1] == b'\n' {
            end -= 1;
            if end > from && full[end - 1] == b'\r' {
                end -= 1;
            }
        }
        (from, end)
    } else {
        (from, full.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(src: &[u8]) -> Object {
        let data: Rc<[u8]> = Rc::from(src);
        let mut p = Parser::new(data, 0);
        p.parse_object().unwrap()
    }

    #[test]
    fn parses_indirect_reference() {
        assert_eq!(parse_str(b"12 0 R"), Object::Ref(Ref::new(12, 0)));
    }

    #[test]
    fn bare_int_is_not_confused_with_ref() {
        assert_eq!(parse_str(b"12 0 obj"), Object::Int(12));
    }

    #[test]
    fn parses_nested_array_and_dict() {
        let obj = parse_str(b"<< /A [1 2 /Name (str)] /B << /C true >> >>");
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.len(), 2);
        let arr = dict.get("A").unwrap().as_array().unwrap();
        assert_eq!(arr.len(), 3);
    }

    #[test]
    fn stream_with_declared_length() {
        let src = b"<< /Length 5 >>\nstream\nhello\nendstream";
        let obj = parse_str(src);
        match obj {
            Object::Stream(_, raw) => assert_eq!(&*raw.bytes, b"hello"),
            other => panic!("expected stream, got {other:?}"),
        }
    }

    #[test]
    fn stream_without_length_scans_for_endstream() {
        let src = b"<< /Foo 1 >>\nstream\nsome raw bytes\nendstream";
        let obj = parse_str(src);
        match obj {
            Object::Stream(_, raw) => assert_eq!(&*raw.bytes, b"some raw bytes"),
            other => panic!("expected stream, got {other:?}"),
        }
    }

    #[test]
    fn recursion_depth_is_bounded() {
        let mut src = Vec::new();
        for _ in 0..(MAX_PARSE_DEPTH + 10) {
            src.extend_from_slice(b"[");
        }
        let data: Rc<[u8]> = Rc::from(src.as_slice());
        let mut p = Parser::new(data, 0);
        assert!(p.parse_object().is_err());
    }
}
