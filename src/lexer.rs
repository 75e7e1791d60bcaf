//! Lexer (spec.md §4.2, component C2).
//!
//! Tokenizes the COS grammar from a [`ByteStream`]: numbers, names, literal
//! and hex strings, delimiters and keywords. Exposes `peek`/`bump`
//! explicitly (REDESIGN FLAGS §9: "expose peek()/bump() explicitly; do not
//! rely on co-routines") rather than an iterator the parser can't look
//! ahead on.

use crate::object::Name;
use crate::stream::ByteStream;
use std::rc::Rc;

/// One lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Eof,
    Error,
    Null,
    Bool(bool),
    Int(i32),
    Real(f64),
    String(Vec<u8>),
    Name(Name),
    /// `[`, `]`, `<<`, `>>`, `{`, `}` — the COS structural delimiters.
    ArrayOpen,
    ArrayClose,
    DictOpen,
    DictClose,
    /// A bare operator/keyword: `obj`, `endobj`, `stream`, `R`, `true`,
    /// content-stream operators, etc. The parser interprets context.
    Keyword(String),
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x0c' | b'\0')
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Lexer mode. Content streams switch to `InlineImage` after an `ID`
/// operator and stay there, copying raw bytes, until a whitespace-preceded
/// `EI` (spec.md §4.4, §9 "implement as an explicit mode flag").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    InlineImageData,
}

/// Owns its stream by value (instead of borrowing it) so a `Parser` can
/// keep a `Lexer<MemoryStream>` alive across tokens while still reaching
/// back into the stream to seek — e.g. to skip the exact EOL after a
/// `stream` keyword and to jump past a stream's declared `/Length`.
pub struct Lexer<S: ByteStream> {
    stream: S,
    lookahead: Option<u8>,
    pub mode: Mode,
}

impl<S: ByteStream> Lexer<S> {
    pub fn new(stream: S) -> Self {
        Lexer {
            stream,
            lookahead: None,
            mode: Mode::Normal,
        }
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn bump(&mut self) -> Option<u8> {
        match self.lookahead.take() {
            Some(b) => Some(b),
            None => self.stream.get(),
        }
    }

    fn peek(&mut self) -> Option<u8> {
        if self.lookahead.is_none() {
            self.lookahead = self.stream.get();
        }
        self.lookahead
    }

    /// Absolute position in the underlying stream of the next unconsumed
    /// byte (i.e. accounting for a buffered-but-not-bumped lookahead byte).
    pub fn pos(&self) -> u64 {
        let t = self.stream.tell();
        if self.lookahead.is_some() {
            t.saturating_sub(1)
        } else {
            t
        }
    }

    /// Discard any buffered lookahead and reposition the underlying stream.
    /// Used by the parser to jump to a stream's payload start/end.
    pub fn raw_seek(&mut self, pos: u64) {
        self.lookahead = None;
        self.stream.seek(pos);
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(b) if is_whitespace(b) => {
                    self.bump();
                }
                Some(b'%') => {
                    self.bump();
                    while let Some(b) = self.peek() {
                        if b == b'\n' || b == b'\r' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    /// Read raw bytes until a whitespace-preceded `EI`, for inline-image
    /// data (spec.md §4.4's inline image termination rule).
    pub fn read_inline_image_data(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            match self.bump() {
                None => break,
                Some(b) => {
                    out.push(b);
                    if b == b'I' && out.len() >= 2 {
                        let prev_is_e = out[out.len() - 2] == b'E';
                        let before_e_is_ws = out.len() < 3 || is_whitespace(out[out.len() - 3]);
                        if prev_is_e && before_e_is_ws {
                            // Confirm EI is itself followed by whitespace/EOF
                            // or delimiter so we don't cut off mid-binary-run.
                            let next = self.peek();
                            if next.is_none() || is_whitespace(next.unwrap()) || is_delimiter(next.unwrap()) {
                                out.truncate(out.len() - 2);
                                break;
                            }
                        }
                    }
                }
            }
        }
        self.mode = Mode::Normal;
        out
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        let Some(b) = self.peek() else {
            return Token::Eof;
        };

        match b {
            b'/' => self.lex_name(),
            b'(' => self.lex_literal_string(),
            b'<' => {
                self.bump();
                if self.peek() == Some(b'<') {
                    self.bump();
                    Token::DictOpen
                } else {
                    self.lex_hex_string()
                }
            }
            b'>' => {
                self.bump();
                if self.peek() == Some(b'>') {
                    self.bump();
                    Token::DictClose
                } else {
                    Token::Error
                }
            }
            b'[' => {
                self.bump();
                Token::ArrayOpen
            }
            b']' => {
                self.bump();
                Token::ArrayClose
            }
            b'{' => {
                self.bump();
                Token::Keyword("{".to_string())
            }
            b'}' => {
                self.bump();
                Token::Keyword("}".to_string())
            }
            b')' => {
                self.bump();
                Token::Error
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.lex_number(),
            _ => self.lex_keyword(),
        }
    }

    fn lex_name(&mut self) -> Token {
        self.bump(); // consume '/'
        let mut s = Vec::new();
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.bump();
            if b == b'#' {
                let h1 = self.peek();
                if let Some(h1v) = h1.and_then(hex_digit) {
                    self.bump();
                    let h2 = self.peek().and_then(hex_digit);
                    if let Some(h2v) = h2 {
                        self.bump();
                        s.push((h1v << 4) | h2v);
                        continue;
                    } else {
                        s.push(b'#');
                        s.push(hex_char(h1v));
                        continue;
                    }
                } else {
                    s.push(b'#');
                    continue;
                }
            }
            s.push(b);
        }
        let name = String::from_utf8_lossy(&s).into_owned();
        Token::Name(Rc::from(name.as_str()))
    }

    fn lex_number(&mut self) -> Token {
        let mut s = Vec::new();
        let mut is_real = false;
        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            s.push(self.bump().unwrap());
        }
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => {
                    s.push(b);
                    self.bump();
                }
                b'.' => {
                    is_real = true;
                    s.push(b);
                    self.bump();
                }
                b'e' | b'E' | b'-' | b'+' if is_real || !s.is_empty() => {
                    // Some writers emit malformed exponents; xpdf-style
                    // lexers tolerate trailing junk by just stopping.
                    break;
                }
                _ => break,
            }
        }
        let text = String::from_utf8_lossy(&s).into_owned();
        if is_real {
            match text.parse::<f64>() {
                Ok(v) => Token::Real(v),
                Err(_) => Token::Real(0.0),
            }
        } else {
            match text.parse::<i32>() {
                Ok(v) => Token::Int(v),
                Err(_) => text.parse::<f64>().map(Token::Real).unwrap_or(Token::Error),
            }
        }
    }

    fn lex_literal_string(&mut self) -> Token {
        self.bump(); // consume '('
        let mut s = Vec::new();
        let mut depth = 1;
        while let Some(b) = self.bump() {
            match b {
                b'(' => {
                    depth += 1;
                    s.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    s.push(b);
                }
                b'\\' => match self.bump() {
                    Some(b'n') => s.push(b'\n'),
                    Some(b'r') => s.push(b'\r'),
                    Some(b't') => s.push(b'\t'),
                    Some(b'b') => s.push(0x08),
                    Some(b'f') => s.push(0x0c),
                    Some(b'(') => s.push(b'('),
                    Some(b')') => s.push(b')'),
                    Some(b'\\') => s.push(b'\\'),
                    Some(b'\r') => {
                        // \<CR> or \<CR><LF> is a line continuation: no byte emitted.
                        if self.peek() == Some(b'\n') {
                            self.bump();
                        }
                    }
                    Some(b'\n') => {}
                    Some(d @ b'0'..=b'7') => {
                        let mut val = (d - b'0') as u32;
                        for _ in 0..2 {
                            match self.peek() {
                                Some(d2 @ b'0'..=b'7') => {
                                    val = val * 8 + (d2 - b'0') as u32;
                                    self.bump();
                                }
                                _ => break,
                            }
                        }
                        s.push((val & 0xff) as u8);
                    }
                    Some(other) => s.push(other),
                    None => break,
                },
                other => s.push(other),
            }
        }
        Token::String(s)
    }

    fn lex_hex_string(&mut self) -> Token {
        let mut nibbles = Vec::new();
        loop {
            match self.peek() {
                Some(b'>') => {
                    self.bump();
                    break;
                }
                Some(b) if is_whitespace(b) => {
                    self.bump();
                }
                Some(b) => {
                    if let Some(v) = hex_digit(b) {
                        nibbles.push(v);
                    }
                    self.bump();
                }
                None => break,
            }
        }
        if nibbles.len() % 2 == 1 {
            nibbles.push(0); // pad a trailing half-byte with zero
        }
        let bytes: Vec<u8> = nibbles.chunks(2).map(|c| (c[0] << 4) | c[1]).collect();
        Token::String(bytes)
    }

    fn lex_keyword(&mut self) -> Token {
        let mut s = Vec::new();
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            s.push(b);
            self.bump();
        }
        if s.is_empty() {
            // A stray delimiter byte we don't otherwise handle (e.g. bare '%').
            self.bump();
            return Token::Error;
        }
        let text = String::from_utf8_lossy(&s).into_owned();
        match text.as_str() {
            "true" => Token::Bool(true),
            "false" => Token::Bool(false),
            "null" => Token::Null,
            _ => Token::Keyword(text),
        }
    }
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn hex_char(v: u8) -> u8 {
    match v {
        0..=9 => b'0' + v,
        _ => b'a' + (v - 10),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;
    use std::rc::Rc;

    fn tokens(src: &[u8]) -> Vec<Token> {
        let data: Rc<[u8]> = Rc::from(src);
        let mut ms = MemoryStream::whole(data);
        ms.reset().unwrap();
        let mut lexer = Lexer::new(ms);
        let mut out = Vec::new();
        loop {
            let t = lexer.next_token();
            if t == Token::Eof {
                break;
            }
            out.push(t);
        }
        out
    }

    #[test]
    fn numbers_distinguish_int_and_real() {
        assert_eq!(tokens(b"72 720.0 -3 +4.5"), vec![
            Token::Int(72),
            Token::Real(720.0),
            Token::Int(-3),
            Token::Real(4.5),
        ]);
    }

    #[test]
    fn literal_string_escapes() {
        assert_eq!(
            tokens(b"(Hello\\nWorld\\051)"),
            vec![Token::String(b"Hello\nWorld)".to_vec())]
        );
    }

    #[test]
    fn hex_string_pads_trailing_nibble() {
        assert_eq!(tokens(b"<48656C6C6F>"), vec![Token::String(b"Hello".to_vec())]);
        assert_eq!(tokens(b"<4>"), vec![Token::String(vec![0x40])]);
    }

    #[test]
    fn name_escapes_round_trip() {
        assert_eq!(tokens(b"/Name#20With#23Hash"), vec![Token::Name(Rc::from("Name With#Hash"))]);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(tokens(b"1 %comment\n2"), vec![Token::Int(1), Token::Int(2)]);
    }

    #[test]
    fn dict_and_array_delimiters() {
        assert_eq!(
            tokens(b"<< /A [1 2] >>"),
            vec![
                Token::DictOpen,
                Token::Name(Rc::from("A")),
                Token::ArrayOpen,
                Token::Int(1),
                Token::Int(2),
                Token::ArrayClose,
                Token::DictClose,
            ]
        );
    }

    #[test]
    fn keywords_and_booleans() {
        assert_eq!(
            tokens(b"true false null obj endobj R"),
            vec![
                Token::Bool(true),
                Token::Bool(false),
                Token::Null,
                Token::Keyword("obj".into()),
                Token::Keyword("endobj".into()),
                Token::Keyword("R".into()),
            ]
        );
    }
}
