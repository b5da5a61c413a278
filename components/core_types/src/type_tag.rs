//! Type tags
//!
//! A tag is one base-type bit combined with flag bits. Flags are fixed per
//! base type when the constant is defined; nothing sets them afterwards.

use std::fmt;

const RAW_NULL: u32 = 1 << 0;
const RAW_INTEGER: u32 = 1 << 1;
const RAW_FLOAT: u32 = 1 << 2;
const RAW_COMPLEX: u32 = 1 << 3;
const RAW_BOOL: u32 = 1 << 4;
const RAW_STRING: u32 = 1 << 5;
const RAW_ARRAY: u32 = 1 << 6;
const RAW_DICT: u32 = 1 << 7;
const RAW_CLOSURE: u32 = 1 << 8;
const RAW_NATIVE_CLOSURE: u32 = 1 << 9;
const RAW_CLASS: u32 = 1 << 10;
const RAW_INSTANCE: u32 = 1 << 11;
const RAW_WEAKREF: u32 = 1 << 12;
const RAW_SPACE: u32 = 1 << 13;
const RAW_OUTER: u32 = 1 << 14;
const RAW_PROTOTYPE: u32 = 1 << 15;

const BASE_MASK: u32 = 0x00FF_FFFF;

/// Tagged type of a value
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTag(u32);

impl TypeTag {
    /// Value can be falsy
    pub const CAN_BE_FALSE: u32 = 0x0100_0000;
    /// Value is a number
    pub const NUMERIC: u32 = 0x0200_0000;
    /// Value is reference counted
    pub const COUNT_REFERENCES: u32 = 0x0800_0000;
    /// Value has a delegate table of native methods
    pub const HAS_DELEGATES: u32 = 0x0400_0000;

    /// `null`
    pub const NULL: TypeTag = TypeTag(RAW_NULL | Self::CAN_BE_FALSE);
    /// 64-bit integer
    pub const INTEGER: TypeTag =
        TypeTag(RAW_INTEGER | Self::NUMERIC | Self::CAN_BE_FALSE | Self::HAS_DELEGATES);
    /// 64-bit float
    pub const FLOAT: TypeTag =
        TypeTag(RAW_FLOAT | Self::NUMERIC | Self::CAN_BE_FALSE | Self::HAS_DELEGATES);
    /// Complex number
    pub const COMPLEX: TypeTag =
        TypeTag(RAW_COMPLEX | Self::NUMERIC | Self::CAN_BE_FALSE | Self::HAS_DELEGATES);
    /// Boolean
    pub const BOOL: TypeTag = TypeTag(RAW_BOOL | Self::CAN_BE_FALSE);
    /// String
    pub const STRING: TypeTag = TypeTag(RAW_STRING | Self::HAS_DELEGATES);
    /// Array
    pub const ARRAY: TypeTag =
        TypeTag(RAW_ARRAY | Self::COUNT_REFERENCES | Self::HAS_DELEGATES);
    /// Dict
    pub const DICT: TypeTag = TypeTag(RAW_DICT | Self::COUNT_REFERENCES | Self::HAS_DELEGATES);
    /// Script closure
    pub const CLOSURE: TypeTag =
        TypeTag(RAW_CLOSURE | Self::COUNT_REFERENCES | Self::HAS_DELEGATES);
    /// Native closure
    pub const NATIVE_CLOSURE: TypeTag =
        TypeTag(RAW_NATIVE_CLOSURE | Self::COUNT_REFERENCES | Self::HAS_DELEGATES);
    /// Class
    pub const CLASS: TypeTag = TypeTag(RAW_CLASS | Self::COUNT_REFERENCES | Self::HAS_DELEGATES);
    /// Class instance
    pub const INSTANCE: TypeTag =
        TypeTag(RAW_INSTANCE | Self::COUNT_REFERENCES | Self::HAS_DELEGATES);
    /// Weak reference
    pub const WEAKREF: TypeTag =
        TypeTag(RAW_WEAKREF | Self::COUNT_REFERENCES | Self::HAS_DELEGATES);
    /// Space descriptor
    pub const SPACE: TypeTag = TypeTag(RAW_SPACE | Self::COUNT_REFERENCES);
    /// Captured-variable cell
    pub const OUTER: TypeTag = TypeTag(RAW_OUTER | Self::COUNT_REFERENCES);
    /// Function prototype
    pub const PROTOTYPE: TypeTag = TypeTag(RAW_PROTOTYPE | Self::COUNT_REFERENCES);

    /// All tags, in base-bit order
    pub const ALL: [TypeTag; 16] = [
        Self::NULL,
        Self::INTEGER,
        Self::FLOAT,
        Self::COMPLEX,
        Self::BOOL,
        Self::STRING,
        Self::ARRAY,
        Self::DICT,
        Self::CLOSURE,
        Self::NATIVE_CLOSURE,
        Self::CLASS,
        Self::INSTANCE,
        Self::WEAKREF,
        Self::SPACE,
        Self::OUTER,
        Self::PROTOTYPE,
    ];

    /// Raw tag bits
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Base-type bit without flags
    pub fn base(self) -> u32 {
        self.0 & BASE_MASK
    }

    /// Position of the base bit, usable as a table index (0..16)
    pub fn index(self) -> usize {
        self.base().trailing_zeros() as usize
    }

    /// Check if values of this type are numbers
    pub fn is_numeric(self) -> bool {
        self.0 & Self::NUMERIC != 0
    }

    /// Check if values of this type can be falsy
    pub fn is_falsy_capable(self) -> bool {
        self.0 & Self::CAN_BE_FALSE != 0
    }

    /// Check if values of this type are reference counted
    pub fn counts_references(self) -> bool {
        self.0 & Self::COUNT_REFERENCES != 0
    }

    /// Check if values of this type have a delegate table
    pub fn has_delegates(self) -> bool {
        self.0 & Self::HAS_DELEGATES != 0
    }

    /// Type name as reported by `typeof`
    pub fn name(self) -> &'static str {
        match self.base() {
            RAW_NULL => "null",
            RAW_INTEGER => "integer",
            RAW_FLOAT => "float",
            RAW_COMPLEX => "complex",
            RAW_BOOL => "bool",
            RAW_STRING => "string",
            RAW_ARRAY => "array",
            RAW_DICT => "dict",
            RAW_CLOSURE => "closure",
            RAW_NATIVE_CLOSURE => "native_closure",
            RAW_CLASS => "class",
            RAW_INSTANCE => "instance",
            RAW_WEAKREF => "weakref",
            RAW_SPACE => "space",
            RAW_OUTER => "outer",
            _ => "prototype",
        }
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({}, {:#010x})", self.name(), self.0)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
