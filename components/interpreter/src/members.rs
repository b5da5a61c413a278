//! Member access protocol
//!
//! Resolution order for reads: the object's own slots, then the `_get`
//! metamethod for instances, then the delegate table of the value's type.
//! Writes never fall back to delegates.

use std::cmp::Ordering;
use std::rc::Rc;

use core_types::{
    arith, compare, negate, ArithOp, Class, ErrorKind, MetaMethod, SlotError, Value, VmError,
    VmResult,
};

use crate::vm::Vm;

/// String key for dicts, classes and instances
pub(crate) fn key_str(key: &Value) -> Result<Rc<str>, SlotError> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Err(SlotError::NullKey),
        other => Err(SlotError::InvalidKey(other.type_name())),
    }
}

fn missing(key: &Value) -> VmError {
    VmError::member(format!("the index '{key}' does not exist"))
}

fn string_index(s: &str, key: &Value) -> VmResult<Option<Value>> {
    let Value::Integer(index) = key else {
        return Ok(None);
    };
    let bytes = s.as_bytes();
    let resolved = if *index < 0 {
        index + bytes.len() as i64
    } else {
        *index
    };
    usize::try_from(resolved)
        .ok()
        .and_then(|i| bytes.get(i))
        .map(|b| Some(Value::Integer(i64::from(*b))))
        .ok_or_else(|| {
            SlotError::OutOfRange {
                index: *index,
                len: bytes.len(),
            }
            .into()
        })
}

impl Vm {
    /// Read `obj[key]`
    pub fn get_member(&mut self, obj: &Value, key: &Value) -> VmResult<Value> {
        let own = match obj {
            Value::Dict(dict) => match key {
                Value::String(k) => dict.get(k),
                _ => None,
            },
            Value::Array(array) => match key {
                Value::Integer(i) => return Ok(array.get_index(*i)?),
                _ => None,
            },
            Value::String(s) => string_index(s, key)?,
            Value::Instance(instance) => {
                let found = key.as_str().and_then(|k| instance.get(k));
                if found.is_none() {
                    if let Some(meta) = instance.meta(MetaMethod::Get) {
                        return self.call_value(&meta, vec![obj.clone(), key.clone()]);
                    }
                }
                found
            }
            Value::Class(class) => key.as_str().and_then(|k| class.get(k)),
            _ => None,
        };
        if let Some(value) = own {
            return Ok(value);
        }
        key.as_str()
            .and_then(|k| self.delegate(obj.tag(), k))
            .ok_or_else(|| missing(key))
    }

    /// Write an existing slot `obj[key] = value`
    pub fn set_member(&mut self, obj: &Value, key: &Value, value: Value) -> VmResult<()> {
        match obj {
            Value::Dict(dict) => {
                let k = key_str(key)?;
                if dict.set(&k, value) {
                    Ok(())
                } else {
                    Err(SlotError::Missing(k.to_string()).into())
                }
            }
            Value::Array(array) => match key {
                Value::Integer(i) => Ok(array.set_index(*i, value)?),
                other => Err(SlotError::InvalidKey(other.type_name()).into()),
            },
            Value::Instance(instance) => {
                let stored = key.as_str().is_some_and(|k| instance.set(k, value.clone()));
                if stored {
                    return Ok(());
                }
                match instance.meta(MetaMethod::Set) {
                    Some(meta) => {
                        self.call_value(&meta, vec![obj.clone(), key.clone(), value])?;
                        Ok(())
                    }
                    None => Err(missing(key)),
                }
            }
            Value::Class(class) => {
                let k = key_str(key)?;
                if class.set(&k, value) {
                    Ok(())
                } else {
                    Err(SlotError::Missing(k.to_string()).into())
                }
            }
            other => Err(VmError::type_error(format!(
                "cannot set a member of '{}'",
                other.type_name()
            ))),
        }
    }

    /// Create slot `obj[key] <- value`
    pub fn new_slot(&mut self, obj: &Value, key: &Value, value: Value) -> VmResult<()> {
        match obj {
            Value::Dict(dict) => {
                dict.new_slot(key_str(key)?, value);
                Ok(())
            }
            Value::Class(class) => self.new_class_member(class, key, value, Value::Null, false),
            Value::Instance(instance) => match instance.meta(MetaMethod::NewSlot) {
                Some(meta) => {
                    self.call_value(&meta, vec![obj.clone(), key.clone(), value])?;
                    Ok(())
                }
                None => Err(VmError::type_error("instances cannot create new slots")),
            },
            other => Err(VmError::type_error(format!(
                "cannot create a slot in '{}'",
                other.type_name()
            ))),
        }
    }

    /// Add a class member, routing through `_newmember` when the class has one
    pub fn new_class_member(
        &mut self,
        class: &Rc<Class>,
        key: &Value,
        value: Value,
        attributes: Value,
        is_static: bool,
    ) -> VmResult<()> {
        if let Some(meta) = class.meta(MetaMethod::NewMember) {
            self.call_value(
                &meta,
                vec![
                    Value::Class(class.clone()),
                    key.clone(),
                    value,
                    attributes,
                    Value::Bool(is_static),
                ],
            )?;
            return Ok(());
        }
        let k = key_str(key)?;
        class.new_slot(k.clone(), value, is_static)?;
        if !attributes.is_null() {
            class.set_member_attributes(&k, attributes)?;
        }
        Ok(())
    }

    /// Remove `obj[key]`, returning the removed value
    pub fn delete_slot(&mut self, obj: &Value, key: &Value) -> VmResult<Value> {
        match obj {
            Value::Dict(dict) => {
                let k = key_str(key)?;
                dict.remove(&k)
                    .ok_or_else(|| SlotError::Missing(k.to_string()).into())
            }
            Value::Array(array) => match key {
                Value::Integer(i) => Ok(array.remove(*i)?),
                other => Err(SlotError::InvalidKey(other.type_name()).into()),
            },
            Value::Instance(instance) => match instance.meta(MetaMethod::DelSlot) {
                Some(meta) => self.call_value(&meta, vec![obj.clone(), key.clone()]),
                None => Err(VmError::type_error("cannot delete a slot of an instance")),
            },
            other => Err(VmError::type_error(format!(
                "cannot delete a slot of '{}'",
                other.type_name()
            ))),
        }
    }

    /// Check `key in obj`; delegates do not count
    pub fn has_member(&self, obj: &Value, key: &Value) -> bool {
        match (obj, key) {
            (Value::Dict(dict), Value::String(k)) => dict.contains(k),
            (Value::Array(array), Value::Integer(i)) => array.get_index(*i).is_ok(),
            (Value::String(s), Value::Integer(i)) => usize::try_from(*i).is_ok_and(|i| i < s.len()),
            (Value::Instance(instance), Value::String(k)) => instance.get(k).is_some(),
            (Value::Class(class), Value::String(k)) => class.get(k).is_some(),
            _ => false,
        }
    }

    /// Binary arithmetic, trying the left operand's metamethod first
    pub fn arith_op(&mut self, op: ArithOp, lhs: &Value, rhs: &Value) -> VmResult<Value> {
        if let Value::Instance(instance) = lhs {
            if let Some(meta) = instance.meta(op.meta()) {
                return self.call_value(&meta, vec![lhs.clone(), rhs.clone()]);
            }
        }
        if op == ArithOp::Add {
            let string_side = match (lhs, rhs) {
                (Value::String(_), Value::Instance(_)) => Some((lhs, rhs, false)),
                (Value::Instance(_), Value::String(_)) => Some((rhs, lhs, true)),
                _ => None,
            };
            if let Some((s, instance, instance_first)) = string_side {
                let text = self.to_display_string(instance)?;
                let s = s.as_str().unwrap_or_default();
                let joined = if instance_first {
                    format!("{text}{s}")
                } else {
                    format!("{s}{text}")
                };
                return Ok(Value::string(&joined));
            }
        }
        arith(op, lhs, rhs, &self.heap)
    }

    /// Unary minus, honouring `_neg`
    pub fn negate_op(&mut self, value: &Value) -> VmResult<Value> {
        if let Value::Instance(instance) = value {
            if let Some(meta) = instance.meta(MetaMethod::Neg) {
                return self.call_value(&meta, vec![value.clone()]);
            }
        }
        negate(value)
    }

    /// Ordering, honouring `_cmp` on the left operand
    pub fn compare_op(&mut self, lhs: &Value, rhs: &Value) -> VmResult<Ordering> {
        if let Value::Instance(instance) = lhs {
            if let Some(meta) = instance.meta(MetaMethod::Cmp) {
                let result = self.call_value(&meta, vec![lhs.clone(), rhs.clone()])?;
                return match result {
                    Value::Integer(i) => Ok(i.cmp(&0)),
                    other => Err(VmError::type_error(format!(
                        "'_cmp' must return an integer, not '{}'",
                        other.type_name()
                    ))),
                };
            }
        }
        compare(lhs, rhs)
    }

    /// `typeof` name, honouring `_typeof`
    pub fn type_of(&mut self, value: &Value) -> VmResult<Value> {
        if let Value::Instance(instance) = value {
            if let Some(meta) = instance.meta(MetaMethod::TypeOf) {
                return self.call_value(&meta, vec![value.clone()]);
            }
        }
        Ok(Value::string(value.type_name()))
    }

    /// `obj instanceof cls`
    pub fn instance_of(&self, class: &Value, obj: &Value) -> VmResult<bool> {
        match class {
            Value::Class(class) => Ok(match obj {
                Value::Instance(instance) => instance.instance_of(class),
                _ => false,
            }),
            other => Err(VmError::new(
                ErrorKind::Type,
                format!("instanceof expects a class, got '{}'", other.type_name()),
            )),
        }
    }
}
