//! Unit tests for VmError, ErrorKind and SlotError

use core_types::{ErrorKind, SlotError, TraceEntry, VmError};

#[cfg(test)]
mod error_kind_tests {
    use super::*;

    #[test]
    fn test_error_kind_names() {
        assert_eq!(ErrorKind::Type.to_string(), "type error");
        assert_eq!(ErrorKind::StackOverflow.to_string(), "stack overflow");
        assert_eq!(ErrorKind::Locked.name(), "locked class");
    }

    #[test]
    fn test_error_kind_copy() {
        let kind1 = ErrorKind::Interrupted;
        let kind2 = kind1;
        assert_eq!(kind1, kind2);
    }
}

#[cfg(test)]
mod vm_error_tests {
    use super::*;

    #[test]
    fn test_constructors_set_kind() {
        assert_eq!(VmError::type_error("x").kind, ErrorKind::Type);
        assert_eq!(VmError::argument("x").kind, ErrorKind::Argument);
        assert_eq!(VmError::member("x").kind, ErrorKind::Member);
        assert_eq!(VmError::arithmetic("x").kind, ErrorKind::Arithmetic);
    }

    #[test]
    fn test_display_omits_trace() {
        let mut err = VmError::member("no 'x'");
        err.push_trace(TraceEntry {
            function: "main".to_string(),
            source: "a.nut".to_string(),
            line: 1,
            instruction: 0,
        });
        assert_eq!(err.to_string(), "member error: no 'x'");
        assert_eq!(err.trace.len(), 1);
    }

    #[test]
    fn test_report_orders_frames_innermost_first() {
        let mut err = VmError::type_error("bad operand");
        for (function, line) in [("inner", 5), ("outer", 9)] {
            err.push_trace(TraceEntry {
                function: function.to_string(),
                source: "s".to_string(),
                line,
                instruction: 2,
            });
        }
        let report = err.report();
        let inner = report.find("inner").unwrap();
        let outer = report.find("outer").unwrap();
        assert!(inner < outer);
    }

    #[test]
    fn test_error_is_std_error() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&VmError::type_error("x"));
        takes_error(&SlotError::NullKey);
    }
}

#[cfg(test)]
mod slot_error_tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(SlotError::NullKey.to_string(), "null is not a valid key");
        assert_eq!(
            SlotError::OutOfRange { index: 3, len: 2 }.to_string(),
            "index 3 out of range for length 2"
        );
        assert_eq!(
            SlotError::Missing("k".to_string()).to_string(),
            "member 'k' does not exist"
        );
    }

    #[test]
    fn test_conversion_kinds() {
        let err: VmError = SlotError::OutOfRange { index: 0, len: 0 }.into();
        assert_eq!(err.kind, ErrorKind::Member);
        let err: VmError = SlotError::InvalidKey("integer").into();
        assert_eq!(err.kind, ErrorKind::Type);
    }
}
