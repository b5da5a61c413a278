//! Single-step peephole fusion
//!
//! The emitter looks at the last instruction it appended and the one about
//! to be appended. [`fuse`] decides, without side effects, whether the pair
//! collapses into one instruction. The emitter then applies the returned
//! [`Fusion`] and moves to the returned [`EmitterState`].

use crate::instruction::{is_valid_arg, Instruction, ARG_INVALID};
use crate::opcode::{AppendKind, Opcode};

/// Whether the next append may fuse with the previous instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmitterState {
    /// Fusion allowed
    #[default]
    Armed,
    /// The next append is taken as-is: the previous instruction was
    /// retargeted by a MOVE fusion or a jump target sits between the two
    Suppressed,
}

/// Facts about the function being emitted that fusion rules depend on
pub struct FuseContext<'a> {
    /// True for any function other than the top level
    pub has_parent: bool,
    /// Index of the first instruction of the return expression being compiled
    pub return_expression: Option<usize>,
    /// Index of the previous instruction
    pub previous_index: usize,
    /// Reports whether a stack slot holds a named local
    pub is_local: &'a dyn Fn(i64) -> bool,
}

/// Outcome of offering an instruction to the emitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fusion {
    /// Append the (possibly rewritten) instruction
    Append(Instruction),
    /// Overwrite the previous instruction and drop the new one
    Replace {
        /// New value of the previous instruction
        previous: Instruction,
        /// State for the following append
        state: EmitterState,
    },
    /// Overwrite the previous instruction and still append the new one
    RewriteBoth {
        /// New value of the previous instruction
        previous: Instruction,
        /// Instruction to append
        next: Instruction,
    },
}

fn replace(previous: Instruction) -> Fusion {
    Fusion::Replace {
        previous,
        state: EmitterState::Armed,
    }
}

/// Decide how `next` combines with `prev`
///
/// # Arguments
///
/// * `prev` - Last appended instruction, `None` for an empty stream
/// * `next` - Instruction being appended
/// * `state` - Current emitter state
/// * `ctx` - Function-level facts
///
/// # Examples
///
/// ```
/// use bytecode_system::peephole::{fuse, EmitterState, FuseContext, Fusion};
/// use bytecode_system::{Instruction, Opcode};
///
/// let is_local = |_: i64| false;
/// let ctx = FuseContext { has_parent: false, return_expression: None, previous_index: 0, is_local: &is_local };
/// let prev = Instruction::binary(Opcode::Move, 1, 2);
/// let next = Instruction::binary(Opcode::Move, 3, 4);
/// match fuse(Some(&prev), next, EmitterState::Armed, &ctx) {
///     Fusion::Replace { previous, .. } => assert_eq!(previous.opcode, Opcode::DMove),
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
pub fn fuse(
    prev: Option<&Instruction>,
    mut next: Instruction,
    state: EmitterState,
    ctx: &FuseContext<'_>,
) -> Fusion {
    let pi = match (prev, state) {
        (Some(pi), EmitterState::Armed) => *pi,
        _ => return Fusion::Append(next),
    };
    let temp = |reg: i64| !(ctx.is_local)(reg);

    match next.opcode {
        Opcode::Jz => {
            if pi.opcode == Opcode::Cmp && pi.arg0 == next.arg0 {
                return replace(Instruction::new(
                    Opcode::JCmp,
                    pi.arg3,
                    next.arg1,
                    pi.arg1,
                    pi.arg2,
                ));
            }
        }
        Opcode::Set | Opcode::NewSlot => {
            if next.arg0 == next.arg3 {
                next.arg0 = ARG_INVALID;
            }
        }
        Opcode::SetOuter => {
            if next.arg0 == next.arg2 {
                next.arg0 = ARG_INVALID;
            }
        }
        Opcode::Return => {
            let in_return_expression = ctx
                .return_expression
                .is_some_and(|start| start < ctx.previous_index);
            if ctx.has_parent
                && is_valid_arg(next.arg0)
                && pi.opcode == Opcode::Call
                && in_return_expression
            {
                let mut tail = pi;
                tail.opcode = Opcode::TailCall;
                return Fusion::RewriteBoth {
                    previous: tail,
                    next,
                };
            } else if pi.opcode == Opcode::Close {
                return replace(next);
            }
        }
        Opcode::Get => {
            if pi.opcode == Opcode::Load && pi.arg0 == next.arg1 && temp(pi.arg0) {
                return replace(Instruction::ternary(Opcode::GetK, next.arg0, pi.arg1, next.arg2));
            }
        }
        Opcode::PrepCall => {
            if pi.opcode == Opcode::Load && pi.arg0 == next.arg1 && temp(pi.arg0) {
                return replace(Instruction::new(
                    Opcode::PrepCallK,
                    next.arg0,
                    pi.arg1,
                    next.arg2,
                    next.arg3,
                ));
            }
        }
        Opcode::Eq | Opcode::Neq => {
            if pi.opcode == Opcode::Load && pi.arg0 == next.arg1 && temp(pi.arg0) {
                let op = if next.opcode == Opcode::Eq {
                    Opcode::EqK
                } else {
                    Opcode::NeqK
                };
                return replace(Instruction::ternary(op, next.arg0, pi.arg1, next.arg2));
            }
        }
        Opcode::AppendToArray => {
            if let Some(kind) = AppendKind::from_load(pi.opcode) {
                let stack_sourced = AppendKind::from_arg(next.arg2) == Some(AppendKind::Stack);
                if stack_sourced && pi.arg0 == next.arg1 && temp(pi.arg0) {
                    return replace(Instruction::ternary(
                        Opcode::AppendToArray,
                        next.arg0,
                        pi.arg1,
                        kind.as_arg(),
                    ));
                }
            }
        }
        Opcode::Move => {
            if pi.opcode.is_retargetable() && pi.arg0 == next.arg1 && temp(pi.arg0) {
                let mut retargeted = pi;
                retargeted.arg0 = next.arg0;
                return Fusion::Replace {
                    previous: retargeted,
                    state: EmitterState::Suppressed,
                };
            }
            if pi.opcode == Opcode::Move {
                return replace(Instruction::new(
                    Opcode::DMove,
                    pi.arg0,
                    pi.arg1,
                    next.arg0,
                    next.arg1,
                ));
            }
        }
        Opcode::Load => {
            if pi.opcode == Opcode::Load && is_valid_arg(next.arg1) && next.arg1 >= 0 {
                return replace(Instruction::new(
                    Opcode::DLoad,
                    pi.arg0,
                    pi.arg1,
                    next.arg0,
                    next.arg1,
                ));
            }
        }
        Opcode::LoadNulls => {
            if pi.opcode == Opcode::LoadNulls && pi.arg0 + pi.arg1 == next.arg0 {
                return replace(Instruction::binary(
                    Opcode::LoadNulls,
                    pi.arg0,
                    pi.arg1 + next.arg1,
                ));
            }
        }
        _ => {}
    }

    Fusion::Append(next)
}
