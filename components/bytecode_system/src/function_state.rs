//! Per-function compiler state
//!
//! [`FunctionState`] is the mutable builder a compiler drives while emitting
//! one function: it owns the instruction buffer (with peephole fusion on
//! append), the literal table, the local-variable stack and the virtual
//! register allocator. Nested functions get a child state that owns its
//! parent, so outer-variable resolution can walk upward and mark parent
//! locals as escaping.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::error::{CompileError, CompileResult, MAX_LITERALS, MAX_STACK_SIZE};
use crate::instruction::Instruction;
use crate::literal::{Literal, LiteralKey};
use crate::opcode::Opcode;
use crate::peephole::{fuse, EmitterState, FuseContext, Fusion};
use crate::prototype::{LineInfo, LocalInfo, OuterInfo, OuterKind, Prototype};

/// Lifetime state of a named local
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalState {
    /// Released when its scope ends
    Scoped,
    /// Captured by a nested function; closing its scope must close the outer
    Escaped,
}

/// A stack slot as seen by the compiler
#[derive(Debug, Clone, PartialEq, Eq)]
struct LocalVar {
    /// `None` for temporaries
    name: Option<String>,
    pos: usize,
    start_op: usize,
    state: LocalState,
}

/// Pending break/continue jumps of one loop
#[derive(Debug, Default)]
struct LoopTargets {
    breaks: Vec<usize>,
    continues: Vec<usize>,
}

/// Mutable builder for one function being compiled
#[derive(Debug)]
pub struct FunctionState {
    name: String,
    source_name: String,
    parent: Option<Box<FunctionState>>,
    instructions: Vec<Instruction>,
    literals: Vec<Literal>,
    literal_index: HashMap<LiteralKey, usize>,
    parameters: Vec<String>,
    functions: Vec<Rc<Prototype>>,
    outers: Vec<OuterInfo>,
    escaped: usize,
    locals: Vec<LocalVar>,
    local_infos: Vec<LocalInfo>,
    line_info: Vec<LineInfo>,
    last_line: Option<u32>,
    default_params: Vec<i64>,
    targets: Vec<usize>,
    stack_size: usize,
    return_expression: Option<usize>,
    state: EmitterState,
    optimize: bool,
    varargs: bool,
    loops: Vec<LoopTargets>,
}

impl FunctionState {
    /// Create the state for a top-level function
    ///
    /// Slot 0 is reserved for the `this` parameter.
    pub fn new(name: impl Into<String>) -> Self {
        let mut fs = Self {
            name: name.into(),
            source_name: String::new(),
            parent: None,
            instructions: Vec::new(),
            literals: Vec::new(),
            literal_index: HashMap::new(),
            parameters: Vec::new(),
            functions: Vec::new(),
            outers: Vec::new(),
            escaped: 0,
            locals: Vec::new(),
            local_infos: Vec::new(),
            line_info: Vec::new(),
            last_line: None,
            default_params: Vec::new(),
            targets: Vec::new(),
            stack_size: 0,
            return_expression: None,
            state: EmitterState::Armed,
            optimize: true,
            varargs: false,
            loops: Vec::new(),
        };
        fs.parameters.push("this".to_string());
        fs.locals.push(LocalVar {
            name: Some("this".to_string()),
            pos: 0,
            start_op: 0,
            state: LocalState::Scoped,
        });
        fs.stack_size = 1;
        fs
    }

    /// Start compiling a nested function; `self` becomes its parent
    pub fn push_child(self, name: impl Into<String>) -> FunctionState {
        let mut child = FunctionState::new(name);
        child.source_name = self.source_name.clone();
        child.parent = Some(Box::new(self));
        child
    }

    /// Finish a nested function
    ///
    /// Builds the child's prototype, stores it in the parent and returns the
    /// parent together with the index to use in a `CLOSURE` instruction.
    pub fn pop_child(mut self) -> CompileResult<(FunctionState, usize)> {
        let mut parent = self.parent.take().ok_or(CompileError::NoParentState)?;
        let proto = self.build_prototype();
        let index = parent.functions.len();
        parent.functions.push(Rc::new(proto));
        Ok((*parent, index))
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the source name recorded in prototypes
    pub fn set_source_name(&mut self, source: impl Into<String>) {
        self.source_name = source.into();
    }

    /// Enable or disable peephole fusion
    pub fn set_optimization(&mut self, enabled: bool) {
        self.optimize = enabled;
    }

    /// Mark the function as variadic
    pub fn set_varargs(&mut self, varargs: bool) {
        self.varargs = varargs;
    }

    /// Check if this state has an enclosing function
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Emitted instructions
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of emitted instructions
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Index of the last emitted instruction
    pub fn last_pos(&self) -> Option<usize> {
        self.instructions.len().checked_sub(1)
    }

    // ------------------------------------------------------------------
    // Emission
    // ------------------------------------------------------------------

    /// Append an instruction, fusing it with the previous one when a
    /// peephole rule applies
    pub fn add_instr(&mut self, inst: Instruction) {
        if !self.optimize {
            self.instructions.push(inst);
            return;
        }
        let previous_index = self.instructions.len().saturating_sub(1);
        let outcome = {
            let locals = &self.locals;
            let is_local = |reg: i64| {
                usize::try_from(reg)
                    .ok()
                    .and_then(|pos| locals.get(pos))
                    .is_some_and(|l| l.name.is_some())
            };
            let ctx = FuseContext {
                has_parent: self.parent.is_some(),
                return_expression: self.return_expression,
                previous_index,
                is_local: &is_local,
            };
            fuse(self.instructions.last(), inst, self.state, &ctx)
        };
        match outcome {
            Fusion::Append(next) => {
                self.instructions.push(next);
                self.state = EmitterState::Armed;
            }
            Fusion::Replace { previous, state } => {
                self.instructions[previous_index] = previous;
                self.state = state;
            }
            Fusion::RewriteBoth { previous, next } => {
                self.instructions[previous_index] = previous;
                self.instructions.push(next);
                self.state = EmitterState::Armed;
            }
        }
    }

    /// Build and append an instruction
    pub fn emit(&mut self, opcode: Opcode, arg0: i64, arg1: i64, arg2: i64, arg3: i64) {
        self.add_instr(Instruction::new(opcode, arg0, arg1, arg2, arg3));
    }

    /// Overwrite all arguments of an emitted instruction
    pub fn set_instruction_params(&mut self, pos: usize, arg0: i64, arg1: i64, arg2: i64, arg3: i64) {
        if let Some(inst) = self.instructions.get_mut(pos) {
            inst.arg0 = arg0;
            inst.arg1 = arg1;
            inst.arg2 = arg2;
            inst.arg3 = arg3;
        }
    }

    /// Overwrite one argument of an emitted instruction
    pub fn set_instruction_param(&mut self, pos: usize, arg: usize, value: i64) {
        if let Some(inst) = self.instructions.get_mut(pos) {
            inst.set_arg(arg, value);
        }
    }

    /// Point the jump at `pos` to the instruction index `target`
    ///
    /// A target at the end of the stream binds a label there, so the next
    /// instruction is not fused with the one before it.
    pub fn patch_jump(&mut self, pos: usize, target: usize) {
        let offset = target as i64 - (pos as i64 + 1);
        self.set_instruction_param(pos, 1, offset);
        if target == self.instructions.len() {
            self.snooze_opt();
        }
    }

    /// Keep the next instruction from fusing with the previous one
    ///
    /// Call when a jump target is bound at the current position.
    pub fn snooze_opt(&mut self) {
        self.state = EmitterState::Suppressed;
    }

    /// Record that the instructions emitted from now on belong to a
    /// return expression
    pub fn set_return_expression(&mut self) {
        self.return_expression = Some(self.instructions.len());
    }

    /// Forget the current return expression
    pub fn clear_return_expression(&mut self) {
        self.return_expression = None;
    }

    /// Record the source line of the next instruction
    pub fn add_line_info(&mut self, line: u32, force: bool) {
        if self.last_line != Some(line) || force {
            self.line_info.push(LineInfo {
                line,
                op: self.instructions.len(),
            });
            self.last_line = Some(line);
        }
    }

    // ------------------------------------------------------------------
    // Literals
    // ------------------------------------------------------------------

    /// Index of a literal in the table, adding it when new
    pub fn get_literal(&mut self, literal: Literal) -> CompileResult<usize> {
        let key = literal.key();
        if let Some(&idx) = self.literal_index.get(&key) {
            return Ok(idx);
        }
        if self.literals.len() >= MAX_LITERALS {
            return Err(CompileError::TooManyLiterals);
        }
        let idx = self.literals.len();
        self.literals.push(literal);
        self.literal_index.insert(key, idx);
        Ok(idx)
    }

    /// Index of a string literal
    pub fn get_string_literal(&mut self, s: &str) -> CompileResult<usize> {
        self.get_literal(Literal::String(s.to_string()))
    }

    /// Number of literals
    pub fn literal_count(&self) -> usize {
        self.literals.len()
    }

    // ------------------------------------------------------------------
    // Locals and the target stack
    // ------------------------------------------------------------------

    fn grow_stack(&mut self) -> CompileResult<()> {
        if self.locals.len() > self.stack_size {
            if self.locals.len() > MAX_STACK_SIZE {
                return Err(CompileError::TooManyLocals);
            }
            self.stack_size = self.locals.len();
        }
        Ok(())
    }

    /// Reserve a temporary stack slot
    pub fn alloc_stack_pos(&mut self) -> CompileResult<usize> {
        let pos = self.locals.len();
        self.locals.push(LocalVar {
            name: None,
            pos,
            start_op: self.instructions.len(),
            state: LocalState::Scoped,
        });
        if let Err(e) = self.grow_stack() {
            self.locals.pop();
            return Err(e);
        }
        Ok(pos)
    }

    fn retire_top_local(&mut self) {
        if let Some(local) = self.locals.pop() {
            if let Some(name) = local.name {
                if local.state == LocalState::Escaped {
                    self.escaped -= 1;
                }
                self.local_infos.push(LocalInfo {
                    name,
                    pos: local.pos,
                    start_op: local.start_op,
                    end_op: self.last_pos().unwrap_or(0),
                });
            }
        }
    }

    /// Push a target register; `None` allocates a fresh temporary
    pub fn push_target(&mut self, target: Option<usize>) -> CompileResult<usize> {
        let pos = match target {
            Some(pos) => pos,
            None => self.alloc_stack_pos()?,
        };
        self.targets.push(pos);
        Ok(pos)
    }

    /// Pop the current target, releasing it if it is a temporary
    pub fn pop_target(&mut self) -> CompileResult<usize> {
        let pos = self.targets.pop().ok_or(CompileError::UnbalancedTargets)?;
        let local = self.locals.get(pos).ok_or(CompileError::UnbalancedTargets)?;
        if local.name.is_none() {
            if pos + 1 != self.locals.len() {
                return Err(CompileError::UnbalancedTargets);
            }
            self.locals.pop();
        }
        Ok(pos)
    }

    /// Current target without popping it
    pub fn top_target(&self) -> CompileResult<usize> {
        self.targets.last().copied().ok_or(CompileError::UnbalancedTargets)
    }

    /// Target `n` entries below the top
    pub fn get_up_target(&self, n: usize) -> CompileResult<usize> {
        self.targets
            .len()
            .checked_sub(n + 1)
            .map(|i| self.targets[i])
            .ok_or(CompileError::UnbalancedTargets)
    }

    /// Number of slots currently in use
    pub fn get_stack_size(&self) -> usize {
        self.locals.len()
    }

    /// Shrink the slot stack to `n`, retiring named locals
    pub fn set_stack_size(&mut self, n: usize) {
        while self.locals.len() > n {
            self.retire_top_local();
        }
    }

    /// Number of escaped locals at or above slot `n`
    ///
    /// A non-zero result means leaving the scope must emit `CLOSE`.
    pub fn count_outers(&self, n: usize) -> usize {
        self.locals
            .iter()
            .skip(n)
            .filter(|l| l.state == LocalState::Escaped)
            .count()
    }

    /// Number of locals currently captured by nested functions
    pub fn escaped_count(&self) -> usize {
        self.escaped
    }

    /// Declare a named local in the next free slot
    pub fn push_local(&mut self, name: &str) -> CompileResult<usize> {
        let pos = self.locals.len();
        self.locals.push(LocalVar {
            name: Some(name.to_string()),
            pos,
            start_op: self.instructions.len(),
            state: LocalState::Scoped,
        });
        if let Err(e) = self.grow_stack() {
            self.locals.pop();
            return Err(e);
        }
        Ok(pos)
    }

    /// Slot of the innermost local named `name`
    pub fn get_local(&self, name: &str) -> Option<usize> {
        self.locals
            .iter()
            .rev()
            .find(|l| l.name.as_deref() == Some(name))
            .map(|l| l.pos)
    }

    /// Check if `pos` holds a named local
    pub fn is_local(&self, pos: usize) -> bool {
        self.locals.get(pos).is_some_and(|l| l.name.is_some())
    }

    /// Lifetime state of the local in `pos`
    pub fn local_state(&self, pos: usize) -> Option<LocalState> {
        self.locals.get(pos).map(|l| l.state)
    }

    /// Mark the local in `pos` as captured
    pub fn mark_local_as_outer(&mut self, pos: usize) {
        if let Some(local) = self.locals.get_mut(pos) {
            if local.state == LocalState::Scoped {
                local.state = LocalState::Escaped;
                self.escaped += 1;
            }
        }
    }

    /// Resolve `name` as a captured variable, walking enclosing functions
    ///
    /// Returns the index into this function's outer table, creating the
    /// descriptor on first use.
    pub fn get_outer_variable(&mut self, name: &str) -> Option<usize> {
        if let Some(i) = self.outers.iter().position(|o| o.name == name) {
            return Some(i);
        }
        let parent = self.parent.as_mut()?;
        let (kind, index) = match parent.get_local(name) {
            Some(pos) => {
                parent.mark_local_as_outer(pos);
                (OuterKind::Local, pos)
            }
            None => (OuterKind::Outer, parent.get_outer_variable(name)?),
        };
        self.outers.push(OuterInfo {
            name: name.to_string(),
            kind,
            index,
        });
        Some(self.outers.len() - 1)
    }

    /// Declare a parameter
    pub fn add_parameter(&mut self, name: &str) -> CompileResult<usize> {
        let pos = self.push_local(name)?;
        self.parameters.push(name.to_string());
        Ok(pos)
    }

    /// Record the parent register that holds a default value for the next
    /// trailing parameter
    pub fn add_default_param(&mut self, parent_register: usize) {
        self.default_params.push(parent_register as i64);
    }

    // ------------------------------------------------------------------
    // Loops
    // ------------------------------------------------------------------

    /// Open a loop that `break`/`continue` may target
    pub fn begin_loop(&mut self) {
        self.loops.push(LoopTargets::default());
        self.snooze_opt();
    }

    /// Emit a `break` jump, patched when the loop ends
    pub fn add_break(&mut self) -> CompileResult<()> {
        let pos = self.instructions.len();
        let targets = self.loops.last_mut().ok_or(CompileError::NotInLoop("break"))?;
        targets.breaks.push(pos);
        self.instructions.push(Instruction::binary(Opcode::Jmp, 0, 0));
        self.state = EmitterState::Armed;
        Ok(())
    }

    /// Emit a `continue` jump, patched when the loop ends
    pub fn add_continue(&mut self) -> CompileResult<()> {
        let pos = self.instructions.len();
        let targets = self
            .loops
            .last_mut()
            .ok_or(CompileError::NotInLoop("continue"))?;
        targets.continues.push(pos);
        self.instructions.push(Instruction::binary(Opcode::Jmp, 0, 0));
        self.state = EmitterState::Armed;
        Ok(())
    }

    /// Close the innermost loop
    ///
    /// Breaks jump to the next instruction to be emitted; continues jump to
    /// `continue_to`.
    pub fn end_loop(&mut self, continue_to: usize) -> CompileResult<()> {
        let targets = self.loops.pop().ok_or(CompileError::NotInLoop("loop end"))?;
        let end = self.instructions.len();
        for pos in targets.breaks {
            self.patch_jump(pos, end);
        }
        for pos in targets.continues {
            self.patch_jump(pos, continue_to);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    /// Snapshot the current state as a prototype
    pub fn build_prototype(&self) -> Prototype {
        let end_op = self.last_pos().unwrap_or(0);
        let mut locals = self.local_infos.clone();
        locals.extend(self.locals.iter().filter_map(|l| {
            l.name.as_ref().map(|name| LocalInfo {
                name: name.clone(),
                pos: l.pos,
                start_op: l.start_op,
                end_op,
            })
        }));
        debug!(
            name = %self.name,
            instructions = self.instructions.len(),
            literals = self.literals.len(),
            outers = self.outers.len(),
            "built prototype"
        );
        Prototype {
            name: self.name.clone(),
            source_name: self.source_name.clone(),
            instructions: self.instructions.clone(),
            literals: self.literals.clone(),
            parameters: self.parameters.clone(),
            functions: self.functions.clone(),
            outers: self.outers.clone(),
            default_params: self.default_params.clone(),
            locals,
            line_info: self.line_info.clone(),
            stack_size: self.stack_size,
            varargs: self.varargs,
        }
    }
}
