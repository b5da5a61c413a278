//! Contract compliance tests for core_types
//!
//! These tests pin the public surface other components rely on.

use core_types::{
    arith, parse_type_mask, ArithOp, Array, Class, ErrorKind, NativeAttribute, NativeContext,
    NativeFunction, SlotError, TypeTag, Value, VmError, VmResult,
};
use memory_manager::Heap;
use std::rc::Rc;

fn identity(_: &mut dyn NativeContext, args: &[Value]) -> VmResult<Value> {
    Ok(args.get(1).cloned().unwrap_or_default())
}

#[cfg(test)]
mod value_contract_tests {
    use super::*;

    /// Contract: every value reports a tag whose name matches type_name
    #[test]
    fn contract_type_name_matches_tag() {
        let heap = Heap::new();
        let values = [
            Value::Null,
            Value::Integer(1),
            Value::Bool(false),
            Value::from("x"),
            Value::Array(Array::new(&heap, Vec::new())),
        ];
        for v in &values {
            assert_eq!(v.type_name(), v.tag().name());
        }
    }

    /// Contract: only heap values are reference counted
    #[test]
    fn contract_ref_count_only_for_heap_values() {
        let heap = Heap::new();
        assert!(Value::Integer(1).ref_count().is_none());
        assert!(Value::Array(Array::new(&heap, Vec::new())).ref_count().is_some());
        assert!(TypeTag::ARRAY.counts_references());
    }

    /// Contract: numeric promotion in arithmetic
    #[test]
    fn contract_numeric_promotion() {
        let heap = Heap::new();
        let int = arith(ArithOp::Add, &Value::Integer(5), &Value::Integer(1), &heap).unwrap();
        let float = arith(ArithOp::Add, &Value::Float(5.0), &Value::Integer(1), &heap).unwrap();
        assert!(matches!(int, Value::Integer(6)));
        assert!(matches!(float, Value::Float(f) if f == 6.0));
    }
}

#[cfg(test)]
mod class_contract_tests {
    use super::*;

    /// Contract: instantiation locks the class hierarchy against fields
    #[test]
    fn contract_lock_is_transitive() {
        let heap = Heap::new();
        let a = Class::new(&heap, None, "init");
        let b = Class::new(&heap, Some(a.clone()), "init");
        let c = Class::new(&heap, Some(b.clone()), "init");
        let _i = c.create_instance();
        for class in [&a, &b, &c] {
            assert!(class.is_locked());
            assert!(matches!(
                class.new_slot(Rc::from("f"), Value::Integer(1), false),
                Err(SlotError::Locked(_))
            ));
        }
    }

    /// Contract: locked-class errors surface as ErrorKind::Locked
    #[test]
    fn contract_locked_error_kind() {
        let err: VmError = SlotError::Locked("f".to_string()).into();
        assert_eq!(err.kind, ErrorKind::Locked);
    }
}

#[cfg(test)]
mod native_contract_tests {
    use super::*;

    /// Contract: unknown mask characters are registration errors
    #[test]
    fn contract_type_mask_rejects_unknown() {
        assert!(parse_type_mask(".nsdacxywbCfie").is_ok());
        assert!(NativeFunction::new("f", identity).type_mask("Q").is_err());
    }

    /// Contract: attributes are resolved from a closed set
    #[test]
    fn contract_attributes() {
        let heap = Heap::new();
        let f = NativeFunction::new("id", identity)
            .params(2)
            .docs("identity")
            .instantiate(&heap);
        assert_eq!(f.attribute(NativeAttribute::ParamCount).as_int(), Some(2));
        assert_eq!(f.attribute(NativeAttribute::MinArgs).as_int(), Some(2));
        assert!(NativeAttribute::from_name("unknown").is_none());
    }
}
