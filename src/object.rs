//! The COS object model (spec.md §3, component C3).
//!
//! `Object` is a closed sum type: null/eof/error sentinels, the PDF scalar
//! types, strings (uninterpreted bytes, not text), interned names, owning
//! arrays, insertion-ordered dicts, stream (dict, lazily-decoded bytes)
//! pairs, indirect references, and content-stream command tokens.
//!
//! Per the REDESIGN FLAGS in spec.md §9, this is a tagged sum rather than a
//! class hierarchy, and dicts become cheaply-clonable (`Rc`-shared) once
//! parsing has produced them — mutation only happens during construction.

use std::fmt;
use std::rc::Rc;

/// Maximum depth `resolve()` will chase through indirect references before
/// treating the document as cyclic (spec.md §3, §8 "Recursion bounds").
pub const MAX_RESOLVE_DEPTH: u32 = 500;

/// An interned PDF name (the part after the leading `/`, already
/// `#hh`-unescaped). Cheap to clone and compare by pointer-or-bytes.
pub type Name = Rc<str>;

/// The identifier of an indirect object: object number and generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ref {
    pub num: u32,
    pub gen: u16,
}

impl Ref {
    pub fn new(num: u32, gen: u16) -> Self {
        Ref { num, gen }
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.num, self.gen)
    }
}

/// An insertion-ordered name → Object mapping with key uniqueness enforced
/// on insert (last write wins, position preserved from first insertion,
/// matching how PDF dictionaries are conventionally read).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dict {
    entries: Vec<(Name, Object)>,
}

impl Dict {
    pub fn new() -> Self {
        Dict {
            entries: Vec::new(),
        }
    }

    /// Insert or overwrite a key. Returns the previous value, if any.
    pub fn insert(&mut self, key: Name, value: Object) -> Option<Object> {
        for entry in &mut self.entries {
            if entry.0 == key {
                return Some(std::mem::replace(&mut entry.1, value));
            }
        }
        self.entries.push((key, value));
        None
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Object)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Dict-typed query: the caller asks for a sub-dict and gets an error
    /// (not a silent default) if the key is absent or not a dict.
    pub fn at<'a>(&'a self, key: &str) -> crate::error::Result<&'a Object> {
        self.get(key)
            .ok_or_else(|| crate::error::Error::General(format!("missing dict key /{key}")))
    }
}

/// Where a stream's encoded bytes live. Streams are lazily decoded: the raw
/// (still-filtered) bytes are captured once at parse time since the source
/// file itself is the re-seekable backing store; `crate::stream` decodes on
/// demand and may cache the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStream {
    pub bytes: Rc<[u8]>,
}

/// A closed sum of every COS value kind (spec.md §3).
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// The PDF `null` literal.
    Null,
    /// Sentinel: the token stream ended where an object was expected.
    Eof,
    /// Sentinel: this slot failed to parse. Distinct from an I/O or syntax
    /// `Error` bubbling up — it lets a dict/array collection continue past
    /// one bad entry (REDESIGN FLAGS, "dedicated error Object variant").
    Error,
    Bool(bool),
    Int(i32),
    Real(f64),
    /// Uninterpreted bytes; PDF strings are not text until a font's
    /// encoding or a ToUnicode CMap says otherwise.
    String(Vec<u8>),
    Name(Name),
    Array(Vec<Object>),
    Dict(Dict),
    Stream(Dict, RawStream),
    /// An indirect reference. Never dereferenced implicitly; only valid
    /// against the document that issued it.
    Ref(Ref),
    /// A PostScript-like operator name, meaningful only inside content
    /// streams (`re`, `Tj`, `BT`, ...).
    Command(Name),
}

impl Object {
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Object::Int(_))
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Object::Ref(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Object::Error | Object::Eof)
    }

    /// Numeric value regardless of whether the token was an int or a real;
    /// PDF content streams freely mix `72` and `72.0`.
    pub fn as_f64(&self) -> crate::error::Result<f64> {
        match self {
            Object::Int(n) => Ok(*n as f64),
            Object::Real(n) => Ok(*n),
            other => Err(type_error("number", other)),
        }
    }

    pub fn as_int(&self) -> crate::error::Result<i32> {
        match self {
            Object::Int(n) => Ok(*n),
            Object::Real(n) => Ok(*n as i32),
            other => Err(type_error("int", other)),
        }
    }

    pub fn as_name(&self) -> crate::error::Result<&str> {
        match self {
            Object::Name(n) => Ok(n.as_ref()),
            other => Err(type_error("name", other)),
        }
    }

    pub fn as_str_bytes(&self) -> crate::error::Result<&[u8]> {
        match self {
            Object::String(s) => Ok(s),
            other => Err(type_error("string", other)),
        }
    }

    pub fn as_array(&self) -> crate::error::Result<&[Object]> {
        match self {
            Object::Array(a) => Ok(a),
            other => Err(type_error("array", other)),
        }
    }

    pub fn as_dict(&self) -> crate::error::Result<&Dict> {
        match self {
            Object::Dict(d) => Ok(d),
            Object::Stream(d, _) => Ok(d),
            other => Err(type_error("dict", other)),
        }
    }

    pub fn as_ref_id(&self) -> crate::error::Result<Ref> {
        match self {
            Object::Ref(r) => Ok(*r),
            other => Err(type_error("ref", other)),
        }
    }

    /// Array indexing that raises rather than panics or silently defaults,
    /// per spec.md §4.3.
    pub fn at(&self, index: usize) -> crate::error::Result<&Object> {
        self.as_array()?
            .get(index)
            .ok_or_else(|| crate::error::Error::General(format!("array index {index} out of range")))
    }
}

fn type_error(expected: &str, got: &Object) -> crate::error::Error {
    crate::error::Error::General(format!("expected {expected}, found {}", kind_name(got)))
}

fn kind_name(obj: &Object) -> &'static str {
    match obj {
        Object::Null => "null",
        Object::Eof => "eof",
        Object::Error => "error",
        Object::Bool(_) => "bool",
        Object::Int(_) => "int",
        Object::Real(_) => "real",
        Object::String(_) => "string",
        Object::Name(_) => "name",
        Object::Array(_) => "array",
        Object::Dict(_) => "dict",
        Object::Stream(..) => "stream",
        Object::Ref(_) => "ref",
        Object::Command(_) => "command",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Rc::from(s)
    }

    #[test]
    fn dict_enforces_key_uniqueness_on_insert() {
        let mut d = Dict::new();
        d.insert(name("Type"), Object::Name(name("Page")));
        d.insert(name("Type"), Object::Name(name("Pages")));
        assert_eq!(d.len(), 1);
        assert_eq!(d.get("Type").unwrap().as_name().unwrap(), "Pages");
    }

    #[test]
    fn dict_preserves_insertion_order() {
        let mut d = Dict::new();
        d.insert(name("B"), Object::Int(2));
        d.insert(name("A"), Object::Int(1));
        let keys: Vec<&str> = d.iter().map(|(k, _)| k.as_ref()).collect();
        assert_eq!(keys, vec!["B", "A"]);
    }

    #[test]
    fn wrong_type_access_is_an_error_not_a_default() {
        let obj = Object::Int(5);
        assert!(obj.as_name().is_err());
    }

    #[test]
    fn numbers_unify_int_and_real() {
        assert_eq!(Object::Int(3).as_f64().unwrap(), 3.0);
        assert_eq!(Object::Real(3.5).as_f64().unwrap(), 3.5);
    }
}
