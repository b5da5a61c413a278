//! Space descriptors

use std::fmt;
use std::rc::Rc;

use bytecode_system::SpaceLiteral;

use crate::object::header::WeakSlot;

/// Domain descriptor such as `R^3` or `Z+`
///
/// Spaces never reference other values that could lead back to them, so
/// they are reference counted but not registered in the chain.
pub struct Space {
    pub(crate) weak: WeakSlot,
    /// Domain name
    pub domain: Rc<str>,
    /// Dimension
    pub dimension: i64,
    /// Sign restriction: `'+'`, `'-'` or `'\\'` for none
    pub sign: char,
    /// Nested space
    pub child: Option<Rc<Space>>,
}

impl Space {
    /// Create a space without a child
    pub fn new(domain: &str, dimension: i64, sign: char) -> Rc<Space> {
        Rc::new(Space {
            weak: WeakSlot::default(),
            domain: Rc::from(domain),
            dimension,
            sign,
            child: None,
        })
    }

    /// Build a space from its literal form
    pub fn from_literal(lit: &SpaceLiteral) -> Rc<Space> {
        Rc::new(Space {
            weak: WeakSlot::default(),
            domain: Rc::from(lit.domain.as_str()),
            dimension: lit.dimension,
            sign: lit.sign,
            child: lit.child.as_deref().map(Space::from_literal),
        })
    }

    /// Structural equality
    pub fn same_as(&self, other: &Space) -> bool {
        self.domain == other.domain
            && self.dimension == other.dimension
            && self.sign == other.sign
            && match (&self.child, &other.child) {
                (None, None) => true,
                (Some(a), Some(b)) => a.same_as(b),
                _ => false,
            }
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.domain)?;
        if self.sign != '\\' {
            write!(f, "{}", self.sign)?;
        }
        write!(f, "^{}", self.dimension)?;
        if let Some(child) = &self.child {
            write!(f, "->{child}")?;
        }
        Ok(())
    }
}
