//! Instruction dispatch
//!
//! The fetch-decode-execute loop. Each iteration reads one instruction from
//! the innermost frame, advances its instruction pointer and executes it.
//! Errors unwind frames up to the nearest root frame, which is the frame a
//! native or host call entered through.

use std::cmp::Ordering;
use std::rc::Rc;
use std::sync::atomic::Ordering as AtomicOrdering;

use bytecode_system::{
    is_valid_arg, AppendKind, BitwiseOp, CmpOp, Instruction, NewObjectKind, Opcode, OuterKind,
};
use core_types::{
    bit_not, bitwise, ArithOp, Array, Class, Closure, Dict, ErrorKind, MetaMethod, Value, VmError,
    VmResult,
};
use tracing::{debug, trace, warn};

use crate::call_frame::CallFrame;
use crate::outers;
use crate::vm::Vm;

/// Outcome of one instruction
pub(crate) enum Flow {
    /// Keep decoding
    Continue,
    /// A root frame returned this value
    Return(Value),
}

fn malformed(message: impl Into<String>) -> VmError {
    VmError::new(ErrorKind::Compile, message)
}

fn slot(base: usize, reg: i64) -> VmResult<usize> {
    usize::try_from(reg)
        .map(|r| base + r)
        .map_err(|_| malformed(format!("invalid register {reg}")))
}

fn index_arg(arg: i64, what: &str) -> VmResult<usize> {
    usize::try_from(arg).map_err(|_| malformed(format!("invalid {what} {arg}")))
}

impl Vm {
    /// Run until the innermost root frame returns
    pub(crate) fn execute(&mut self) -> VmResult<Value> {
        loop {
            match self.step() {
                Ok(Flow::Continue) => {}
                Ok(Flow::Return(value)) => return Ok(value),
                Err(e) => return Err(self.unwind(e)),
            }
        }
    }

    /// Pop frames up to and including the nearest root frame
    fn unwind(&mut self, mut err: VmError) -> VmError {
        while let Some(frame) = self.frames.pop() {
            err.push_trace(frame.trace_entry());
            self.close_outers(frame.base);
            self.stack.truncate(frame.prev_top);
            trace!(function = frame.closure.name(), "unwind frame");
            if frame.root {
                break;
            }
        }
        err
    }

    fn frame(&self) -> VmResult<&CallFrame> {
        self.frames
            .last()
            .ok_or_else(|| malformed("no active call frame"))
    }

    fn frame_mut(&mut self) -> VmResult<&mut CallFrame> {
        self.frames
            .last_mut()
            .ok_or_else(|| malformed("no active call frame"))
    }

    fn reg(&self, base: usize, reg: i64) -> VmResult<Value> {
        let index = slot(base, reg)?;
        self.stack
            .get(index)
            .cloned()
            .ok_or_else(|| malformed(format!("register {reg} out of range")))
    }

    fn set_reg(&mut self, base: usize, reg: i64, value: Value) -> VmResult<()> {
        let index = slot(base, reg)?;
        match self.stack.get_mut(index) {
            Some(s) => {
                *s = value;
                Ok(())
            }
            None => Err(malformed(format!("register {reg} out of range"))),
        }
    }

    /// Write `value` unless `reg` is the discard sentinel
    fn set_opt(&mut self, base: usize, reg: i64, value: Value) -> VmResult<()> {
        if is_valid_arg(reg) {
            self.set_reg(base, reg, value)
        } else {
            Ok(())
        }
    }

    fn literal(&self, index: i64) -> VmResult<Value> {
        let frame = self.frame()?;
        usize::try_from(index)
            .ok()
            .and_then(|i| frame.proto().literals.get(i))
            .map(Value::from_literal)
            .ok_or_else(|| malformed(format!("literal {index} out of range")))
    }

    fn jump(&mut self, offset: i64) -> VmResult<()> {
        let frame = self.frame_mut()?;
        let target = frame.ip as i64 + offset;
        frame.ip = usize::try_from(target).map_err(|_| malformed("jump before function start"))?;
        Ok(())
    }

    fn check_interrupt(&self) -> VmResult<()> {
        if self.interrupt.swap(false, AtomicOrdering::Relaxed) {
            warn!("execution interrupted");
            return Err(VmError::new(ErrorKind::Interrupted, "execution interrupted"));
        }
        Ok(())
    }

    /// Execute one instruction
    fn step(&mut self) -> VmResult<Flow> {
        self.check_interrupt()?;
        let frame = self.frame_mut()?;
        let base = frame.base;
        let Some(inst) = frame.proto().instructions.get(frame.ip).copied() else {
            return self.return_from_frame(Value::Null);
        };
        frame.ip += 1;

        match inst.opcode {
            Opcode::Load => {
                let value = self.literal(inst.arg1)?;
                self.set_reg(base, inst.arg0, value)?;
            }
            Opcode::LoadInteger => self.set_reg(base, inst.arg0, Value::Integer(inst.arg1))?,
            Opcode::LoadFloat => {
                self.set_reg(base, inst.arg0, Value::Float(f64::from_bits(inst.arg1 as u64)))?
            }
            Opcode::LoadBool => self.set_reg(base, inst.arg0, Value::Bool(inst.arg1 != 0))?,
            Opcode::DLoad => {
                let first = self.literal(inst.arg1)?;
                self.set_reg(base, inst.arg0, first)?;
                let second = self.literal(inst.arg3)?;
                self.set_reg(base, inst.arg2, second)?;
            }
            Opcode::LoadNulls => {
                let start = slot(base, inst.arg0)?;
                let count = index_arg(inst.arg1, "count")?;
                let end = (start + count).min(self.stack.len());
                for s in &mut self.stack[start.min(end)..end] {
                    *s = Value::Null;
                }
            }
            Opcode::LoadRoot => self.set_reg(base, inst.arg0, Value::Dict(self.root.clone()))?,
            Opcode::Move => {
                let value = self.reg(base, inst.arg1)?;
                self.set_reg(base, inst.arg0, value)?;
            }
            Opcode::DMove => {
                let first = self.reg(base, inst.arg1)?;
                self.set_reg(base, inst.arg0, first)?;
                let second = self.reg(base, inst.arg3)?;
                self.set_reg(base, inst.arg2, second)?;
            }

            Opcode::GetOuter => {
                let cell = self.outer_cell(inst.arg1)?;
                let value = outers::read(&cell, &self.stack);
                self.set_reg(base, inst.arg0, value)?;
            }
            Opcode::SetOuter => {
                let cell = self.outer_cell(inst.arg1)?;
                let value = self.reg(base, inst.arg2)?;
                outers::write(&cell, &mut self.stack, value.clone());
                self.set_opt(base, inst.arg0, value)?;
            }

            Opcode::Get => {
                let key = self.reg(base, inst.arg1)?;
                let obj = self.reg(base, inst.arg2)?;
                let value = self.get_member(&obj, &key)?;
                self.set_reg(base, inst.arg0, value)?;
            }
            Opcode::GetK => {
                let key = self.literal(inst.arg1)?;
                let obj = self.reg(base, inst.arg2)?;
                let value = self.get_member(&obj, &key)?;
                self.set_reg(base, inst.arg0, value)?;
            }
            Opcode::Set => {
                let obj = self.reg(base, inst.arg1)?;
                let key = self.reg(base, inst.arg2)?;
                let value = self.reg(base, inst.arg3)?;
                self.set_member(&obj, &key, value.clone())?;
                self.set_opt(base, inst.arg0, value)?;
            }
            Opcode::NewSlot => {
                let obj = self.reg(base, inst.arg1)?;
                let key = self.reg(base, inst.arg2)?;
                let value = self.reg(base, inst.arg3)?;
                self.new_slot(&obj, &key, value.clone())?;
                self.set_opt(base, inst.arg0, value)?;
            }
            Opcode::NewSlotA => self.exec_new_slot_a(base, inst)?,
            Opcode::Delete => {
                let obj = self.reg(base, inst.arg1)?;
                let key = self.reg(base, inst.arg2)?;
                let removed = self.delete_slot(&obj, &key)?;
                self.set_opt(base, inst.arg0, removed)?;
            }

            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::Exp => {
                let op = ArithOp::from_opcode(inst.opcode)
                    .ok_or_else(|| malformed("not an arithmetic opcode"))?;
                let lhs = self.reg(base, inst.arg1)?;
                let rhs = self.reg(base, inst.arg2)?;
                let value = self.arith_op(op, &lhs, &rhs)?;
                self.set_reg(base, inst.arg0, value)?;
            }
            Opcode::Bitwise => {
                let op = BitwiseOp::from_arg(inst.arg3)
                    .ok_or_else(|| malformed(format!("invalid bitwise op {}", inst.arg3)))?;
                let lhs = self.reg(base, inst.arg1)?;
                let rhs = self.reg(base, inst.arg2)?;
                self.set_reg(base, inst.arg0, bitwise(op, &lhs, &rhs)?)?;
            }
            Opcode::Neg => {
                let value = self.reg(base, inst.arg1)?;
                let result = self.negate_op(&value)?;
                self.set_reg(base, inst.arg0, result)?;
            }
            Opcode::Not => {
                let value = self.reg(base, inst.arg1)?;
                self.set_reg(base, inst.arg0, Value::Bool(value.is_falsy()))?;
            }
            Opcode::BitNot => {
                let value = self.reg(base, inst.arg1)?;
                self.set_reg(base, inst.arg0, bit_not(&value)?)?;
            }

            Opcode::Eq | Opcode::Neq => {
                let lhs = self.reg(base, inst.arg1)?;
                let rhs = self.reg(base, inst.arg2)?;
                let equal = lhs.check_equal(&rhs);
                self.set_reg(base, inst.arg0, Value::Bool(equal == (inst.opcode == Opcode::Eq)))?;
            }
            Opcode::EqK | Opcode::NeqK => {
                let lhs = self.literal(inst.arg1)?;
                let rhs = self.reg(base, inst.arg2)?;
                let equal = lhs.check_equal(&rhs);
                self.set_reg(base, inst.arg0, Value::Bool(equal == (inst.opcode == Opcode::EqK)))?;
            }
            Opcode::Cmp => {
                let op = CmpOp::from_arg(inst.arg3)
                    .ok_or_else(|| malformed(format!("invalid comparison {}", inst.arg3)))?;
                let lhs = self.reg(base, inst.arg1)?;
                let rhs = self.reg(base, inst.arg2)?;
                let result = self.compare_with(op, &lhs, &rhs)?;
                self.set_reg(base, inst.arg0, result)?;
            }
            Opcode::JCmp => {
                let op = CmpOp::from_arg(inst.arg0)
                    .ok_or_else(|| malformed(format!("invalid comparison {}", inst.arg0)))?;
                let lhs = self.reg(base, inst.arg2)?;
                let rhs = self.reg(base, inst.arg3)?;
                if self.compare_with(op, &lhs, &rhs)?.is_falsy() {
                    self.jump(inst.arg1)?;
                }
            }

            Opcode::Jmp => self.jump(inst.arg1)?,
            Opcode::Jz => {
                if self.reg(base, inst.arg0)?.is_falsy() {
                    self.jump(inst.arg1)?;
                }
            }
            Opcode::And | Opcode::Or => {
                let value = self.reg(base, inst.arg2)?;
                let short_circuit = value.is_falsy() == (inst.opcode == Opcode::And);
                if short_circuit {
                    self.set_reg(base, inst.arg0, value)?;
                    self.jump(inst.arg1)?;
                }
            }

            Opcode::PrepCall | Opcode::PrepCallK => {
                let key = if inst.opcode == Opcode::PrepCall {
                    self.reg(base, inst.arg1)?
                } else {
                    self.literal(inst.arg1)?
                };
                let obj = self.reg(base, inst.arg2)?;
                let method = self.get_member(&obj, &key)?;
                self.set_reg(base, inst.arg3, obj)?;
                self.set_reg(base, inst.arg0, method)?;
            }
            Opcode::Call => self.exec_call(base, inst)?,
            Opcode::TailCall => self.exec_tail_call(base, inst)?,
            Opcode::Return => {
                let value = if is_valid_arg(inst.arg0) {
                    self.reg(base, inst.arg0)?
                } else {
                    Value::Null
                };
                return self.return_from_frame(value);
            }
            Opcode::Close => {
                let from = slot(base, inst.arg1)?;
                self.close_outers(from);
            }
            Opcode::Closure => self.exec_closure(base, inst)?,

            Opcode::NewObject => self.exec_new_object(base, inst)?,
            Opcode::AppendToArray => self.exec_append(base, inst)?,
            Opcode::TypeOf => {
                let value = self.reg(base, inst.arg1)?;
                let name = self.type_of(&value)?;
                self.set_reg(base, inst.arg0, name)?;
            }
            Opcode::InstanceOf => {
                let class = self.reg(base, inst.arg1)?;
                let obj = self.reg(base, inst.arg2)?;
                let result = self.instance_of(&class, &obj)?;
                self.set_reg(base, inst.arg0, Value::Bool(result))?;
            }
            Opcode::Exists => {
                let obj = self.reg(base, inst.arg1)?;
                let key = self.reg(base, inst.arg2)?;
                let result = self.has_member(&obj, &key);
                self.set_reg(base, inst.arg0, Value::Bool(result))?;
            }
            Opcode::GetBase => {
                let owner_base = self.frame()?.closure.owner().and_then(|c| c.base());
                let value = owner_base.map_or(Value::Null, Value::Class);
                self.set_reg(base, inst.arg0, value)?;
            }
            Opcode::Clone => {
                let value = self.reg(base, inst.arg1)?;
                let copy = value.deep_copy(&self.heap);
                self.set_reg(base, inst.arg0, copy)?;
            }
            Opcode::Foreach => self.exec_foreach(base, inst)?,
        }
        Ok(Flow::Continue)
    }

    fn outer_cell(&self, index: i64) -> VmResult<Rc<core_types::Outer>> {
        let index = index_arg(index, "outer")?;
        self.frame()?
            .closure
            .outer(index)
            .ok_or_else(|| malformed(format!("outer {index} out of range")))
    }

    fn compare_with(&mut self, op: CmpOp, lhs: &Value, rhs: &Value) -> VmResult<Value> {
        let ordering = self.compare_op(lhs, rhs)?;
        Ok(match op {
            CmpOp::Gt => Value::Bool(ordering == Ordering::Greater),
            CmpOp::Ge => Value::Bool(ordering != Ordering::Less),
            CmpOp::Lt => Value::Bool(ordering == Ordering::Less),
            CmpOp::Le => Value::Bool(ordering != Ordering::Greater),
            CmpOp::ThreeWay => Value::Integer(ordering as i64),
        })
    }

    /// Pop the innermost frame and deliver `value` to its caller
    fn return_from_frame(&mut self, value: Value) -> VmResult<Flow> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| malformed("return without a call frame"))?;
        self.close_outers(frame.base);
        self.stack.truncate(frame.prev_top);
        trace!(function = frame.closure.name(), depth = self.frames.len(), "pop frame");
        if frame.root {
            return Ok(Flow::Return(value));
        }
        if let Some(target) = frame.target {
            match self.stack.get_mut(target) {
                Some(s) => *s = value,
                None => return Err(malformed("return target out of range")),
            }
        }
        Ok(Flow::Continue)
    }

    fn call_args(&self, call_base: usize, nargs: usize) -> VmResult<Vec<Value>> {
        self.stack
            .get(call_base..call_base + nargs)
            .map(<[Value]>::to_vec)
            .ok_or_else(|| malformed("call arguments out of range"))
    }

    fn exec_call(&mut self, base: usize, inst: Instruction) -> VmResult<()> {
        let callee = self.reg(base, inst.arg1)?;
        let call_base = slot(base, inst.arg2)?;
        let nargs = index_arg(inst.arg3, "argument count")?;
        let target = if is_valid_arg(inst.arg0) {
            let target = slot(base, inst.arg0)?;
            if target >= self.stack.len() {
                return Err(malformed(format!("register {} out of range", inst.arg0)));
            }
            Some(target)
        } else {
            None
        };
        match callee {
            Value::Closure(closure) => {
                if call_base + nargs > self.stack.len() {
                    return Err(malformed("call arguments out of range"));
                }
                self.push_frame(closure, call_base, nargs, target, false)
            }
            other => {
                let args = self.call_args(call_base, nargs)?;
                let result = self.call_value(&other, args)?;
                match target {
                    Some(_) => self.set_reg(base, inst.arg0, result),
                    None => Ok(()),
                }
            }
        }
    }

    /// Replace the current frame with a call to a closure
    ///
    /// Other callees are called normally; the `RETURN` that follows a
    /// `TAILCALL` then returns their result.
    fn exec_tail_call(&mut self, base: usize, inst: Instruction) -> VmResult<()> {
        let Value::Closure(closure) = self.reg(base, inst.arg1)? else {
            return self.exec_call(base, inst);
        };
        let call_base = slot(base, inst.arg2)?;
        let nargs = index_arg(inst.arg3, "argument count")?;
        let args = self.call_args(call_base, nargs)?;

        self.close_outers(base);
        let old = self
            .frames
            .pop()
            .ok_or_else(|| malformed("tail call without a call frame"))?;
        for (i, arg) in args.into_iter().enumerate() {
            match self.stack.get_mut(base + i) {
                Some(s) => *s = arg,
                None => {
                    self.frames.push(old);
                    return Err(malformed("tail call arguments out of range"));
                }
            }
        }
        self.stack.truncate(old.prev_top.max(base + nargs));
        trace!(from = old.closure.name(), to = closure.name(), "tail call");
        if let Err(e) = self.push_frame(closure, base, nargs, old.target, old.root) {
            self.frames.push(old);
            return Err(e);
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.prev_top = old.prev_top;
        }
        Ok(())
    }

    fn exec_closure(&mut self, base: usize, inst: Instruction) -> VmResult<()> {
        let index = index_arg(inst.arg1, "function")?;
        let (proto, parent) = {
            let frame = self.frame()?;
            let proto = frame
                .proto()
                .functions
                .get(index)
                .cloned()
                .ok_or_else(|| malformed(format!("function {index} out of range")))?;
            (proto, frame.closure.clone())
        };

        let mut cells = Vec::with_capacity(proto.outers.len());
        for info in &proto.outers {
            let cell = match info.kind {
                OuterKind::Local => self.open_outers.capture(&self.heap, base + info.index),
                OuterKind::Outer => parent.outer(info.index).ok_or_else(|| {
                    malformed(format!("outer '{}' missing in enclosing function", info.name))
                })?,
            };
            cells.push(cell);
        }
        let defaults = proto
            .default_params
            .iter()
            .map(|r| self.reg(base, *r).map(|v| v.deep_copy(&self.heap)))
            .collect::<VmResult<Vec<_>>>()?;

        debug!(name = %proto.name, outers = cells.len(), "closure created");
        let closure = Closure::new(&self.heap, proto, cells, defaults);
        self.set_reg(base, inst.arg0, Value::Closure(closure))
    }

    fn exec_new_object(&mut self, base: usize, inst: Instruction) -> VmResult<()> {
        let kind = NewObjectKind::from_arg(inst.arg3)
            .ok_or_else(|| malformed(format!("invalid object kind {}", inst.arg3)))?;
        let value = match kind {
            NewObjectKind::Dict => Value::Dict(Dict::new(&self.heap)),
            NewObjectKind::Array => {
                let capacity = usize::try_from(inst.arg1).unwrap_or(0);
                Value::Array(Array::with_capacity(&self.heap, capacity))
            }
            NewObjectKind::Class => {
                let base_class = if is_valid_arg(inst.arg1) {
                    match self.reg(base, inst.arg1)? {
                        Value::Class(c) => Some(c),
                        other => {
                            return Err(VmError::type_error(format!(
                                "cannot inherit from '{}'",
                                other.type_name()
                            )))
                        }
                    }
                } else {
                    None
                };
                let attributes = if is_valid_arg(inst.arg2) {
                    self.reg(base, inst.arg2)?
                } else {
                    Value::Null
                };
                let class = Class::new(
                    &self.heap,
                    base_class.clone(),
                    &self.config.constructor_name,
                );
                class.set_attributes(attributes.clone());
                if let Some(parent) = base_class {
                    if let Some(meta) = parent.meta(MetaMethod::Inherit) {
                        self.call_value(
                            &meta,
                            vec![Value::Class(parent), Value::Class(class.clone()), attributes],
                        )?;
                    }
                }
                Value::Class(class)
            }
        };
        self.set_reg(base, inst.arg0, value)
    }

    fn exec_new_slot_a(&mut self, base: usize, inst: Instruction) -> VmResult<()> {
        let Value::Class(class) = self.reg(base, inst.arg1)? else {
            return Err(VmError::type_error("class members need a class"));
        };
        let key = self.reg(base, inst.arg2)?;
        let value = self.reg(base, inst.arg3)?;
        let attributes = if inst.arg0 & 2 != 0 {
            self.reg(base, inst.arg2 - 1)?
        } else {
            Value::Null
        };
        self.new_class_member(&class, &key, value, attributes, inst.arg0 & 1 != 0)
    }

    fn exec_append(&mut self, base: usize, inst: Instruction) -> VmResult<()> {
        let Value::Array(array) = self.reg(base, inst.arg0)? else {
            return Err(VmError::type_error("append target is not an array"));
        };
        let kind = AppendKind::from_arg(inst.arg2)
            .ok_or_else(|| malformed(format!("invalid append kind {}", inst.arg2)))?;
        let value = match kind {
            AppendKind::Stack => self.reg(base, inst.arg1)?,
            AppendKind::Literal => self.literal(inst.arg1)?,
            AppendKind::Integer => Value::Integer(inst.arg1),
            AppendKind::Float => Value::Float(f64::from_bits(inst.arg1 as u64)),
            AppendKind::Bool => Value::Bool(inst.arg1 != 0),
        };
        array.push(value);
        Ok(())
    }

    /// One iteration step; jumps by `offset` when the container is exhausted
    fn exec_foreach(&mut self, base: usize, inst: Instruction) -> VmResult<()> {
        let container = self.reg(base, inst.arg0)?;
        let state = self.reg(base, inst.arg2 + 2)?;
        let next = match &container {
            Value::Array(array) => {
                let index = state.as_int().unwrap_or(0);
                usize::try_from(index)
                    .ok()
                    .and_then(|i| array.get(i))
                    .map(|v| (Value::Integer(index), v, Value::Integer(index + 1)))
            }
            Value::Dict(dict) => dict.next_entry(state.as_str()).map(|(k, v)| {
                let key = Value::String(k);
                (key.clone(), v, key)
            }),
            Value::String(s) => {
                let index = state.as_int().unwrap_or(0);
                usize::try_from(index)
                    .ok()
                    .and_then(|i| s.as_bytes().get(i))
                    .map(|b| {
                        (
                            Value::Integer(index),
                            Value::Integer(i64::from(*b)),
                            Value::Integer(index + 1),
                        )
                    })
            }
            Value::Instance(instance) => {
                let meta = instance.meta(MetaMethod::Next).ok_or_else(|| {
                    VmError::type_error("instance has no '_next' metamethod")
                })?;
                let key = self.call_value(&meta, vec![container.clone(), state])?;
                if key.is_null() {
                    None
                } else {
                    let value = self.get_member(&container, &key)?;
                    Some((key.clone(), value, key))
                }
            }
            other => {
                return Err(VmError::type_error(format!(
                    "cannot iterate '{}'",
                    other.type_name()
                )))
            }
        };
        match next {
            Some((key, value, state)) => {
                self.set_reg(base, inst.arg2, key)?;
                self.set_reg(base, inst.arg2 + 1, value)?;
                self.set_reg(base, inst.arg2 + 2, state)
            }
            None => self.jump(inst.arg1),
        }
    }
}
