//! Literal constants stored in a prototype's literal table
//!
//! Literals are the compile-time subset of runtime values. The VM converts
//! them into its own value type when a `LOAD` executes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain descriptor literal, e.g. the real line or a signed integer lattice
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceLiteral {
    /// Domain name, such as `"R"` or `"Z"`
    pub domain: String,
    /// Dimension of the space
    pub dimension: i64,
    /// Sign restriction: `'+'`, `'-'` or `'\\'` for none
    pub sign: char,
    /// Optional nested space
    pub child: Option<Box<SpaceLiteral>>,
}

impl SpaceLiteral {
    /// Create a space literal without a child
    pub fn new(domain: impl Into<String>, dimension: i64, sign: char) -> Self {
        Self {
            domain: domain.into(),
            dimension,
            sign,
            child: None,
        }
    }
}

/// A constant in the literal table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// `null`
    Null,
    /// 64-bit integer
    Integer(i64),
    /// 64-bit float
    Float(f64),
    /// Complex number
    Complex {
        /// Real part
        re: f64,
        /// Imaginary part
        im: f64,
    },
    /// Boolean
    Bool(bool),
    /// String (also used for member names)
    String(String),
    /// Space descriptor
    Space(SpaceLiteral),
}

/// Hashable identity of a literal used for deduplication
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum LiteralKey {
    Null,
    Integer(i64),
    Float(u64),
    Complex(u64, u64),
    Bool(bool),
    String(String),
    Space(SpaceLiteral),
}

impl Literal {
    /// Check if the literal is a string
    pub fn is_string(&self) -> bool {
        matches!(self, Literal::String(_))
    }

    /// Get the string payload, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn key(&self) -> LiteralKey {
        match self {
            Literal::Null => LiteralKey::Null,
            Literal::Integer(i) => LiteralKey::Integer(*i),
            Literal::Float(f) => LiteralKey::Float(f.to_bits()),
            Literal::Complex { re, im } => LiteralKey::Complex(re.to_bits(), im.to_bits()),
            Literal::Bool(b) => LiteralKey::Bool(*b),
            Literal::String(s) => LiteralKey::String(s.clone()),
            Literal::Space(s) => LiteralKey::Space(s.clone()),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Integer(i)
    }
}

impl From<f64> for Literal {
    fn from(f: f64) -> Self {
        Literal::Float(f)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::Complex { re, im } => write!(f, "{}{:+}i", re, im),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::String(s) => write!(f, "{:?}", s),
            Literal::Space(s) => write!(f, "@{}{}{}", s.domain, s.sign, s.dimension),
        }
    }
}
