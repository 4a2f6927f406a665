/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

mod address;
mod condition;
mod expression;
pub mod instruction;
pub mod memory;
mod routines;

use crate::ast::*;
use crate::errors::GenError;
use condition::{CanonOp, canonicalize};
use instruction::{Code, Instr, Register};
use memory::{MemoryTable, ParamSlot, Pointee, ProcedureRecord, SymbolKind};
use std::collections::HashMap;
use std::fmt;

// Severity of a recorded diagnostic. Warnings do not suppress output.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        };
        write!(f, "{}: Line {}: {}", tag, self.line, self.message)
    }
}

// Everything the generator hands back: the instruction stream plus the
// diagnostics gathered while lowering. When `error_mode` is set the stream
// is not fit to run and must not be written out.
#[derive(Debug)]
pub struct GenOutput {
    pub code: Vec<Instr>,
    pub diagnostics: Vec<Diagnostic>,
    pub error_mode: bool,
}

pub struct Generator {
    pub(crate) code: Code,
    pub(crate) memory: MemoryTable,
    procedures: HashMap<String, ProcedureRecord>,
    // watermark shared by every procedure scope and main
    offset: u64,
    pub(crate) loop_depth: u32,
    pub(crate) lineno: usize,
    error_mode: bool,
    diagnostics: Vec<Diagnostic>,
}

impl Generator {
    pub fn new() -> Self {
        Self {
            code: Code::new(),
            memory: MemoryTable::new(0),
            procedures: HashMap::new(),
            offset: 0,
            loop_depth: 0,
            lineno: 1,
            error_mode: false,
            diagnostics: Vec::new(),
        }
    }

    pub fn run(mut self, program: &Program) -> GenOutput {
        for procedure in &program.procedures {
            self.gen_procedure(procedure);
        }
        self.gen_main(&program.main);
        GenOutput {
            code: self.code.into_instrs(),
            diagnostics: self.diagnostics,
            error_mode: self.error_mode,
        }
    }

    pub(crate) fn error(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            line,
            message: message.into(),
        });
        self.error_mode = true;
    }

    pub(crate) fn warning(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            line,
            message: message.into(),
        });
    }

    // --- procedures and main ---

    fn gen_procedure(&mut self, procedure: &ProcDef) {
        let head = &procedure.head;
        if self.procedures.contains_key(&head.name) {
            self.error(
                head.line,
                format!("procedure {} already declared", head.name),
            );
            return;
        }
        if self.code.is_empty() {
            // slot 0 is patched to jump over every procedure body once the
            // main entry is known
            self.code.reserve_jump();
        }

        let mut record = ProcedureRecord {
            location: self.code.len(),
            callback: self.offset,
            params: Vec::new(),
        };
        self.memory = MemoryTable::new(self.offset + 1);

        for param in &head.params {
            let pointee = match param.kind {
                ParamKind::Scalar => Pointee::Scalar,
                ParamKind::Array => Pointee::Array,
            };
            match self.memory.add_pointer(&param.name, pointee) {
                Ok(address) => record.params.push(ParamSlot {
                    address,
                    kind: pointee,
                }),
                Err(e) => self.error(head.line, e.0),
            }
        }

        self.gen_declarations(&procedure.declarations);
        self.gen_body(&procedure.commands);

        // registered only now, so a call from the body above reported the
        // procedure as unknown (recursion is unrepresentable)
        let callback = record.callback;
        self.procedures.insert(head.name.clone(), record);
        self.offset = self.memory.offset();

        // return trampoline: the caller's STRK left its own PC in the
        // callback cell, and the call site is STRK / STORE / JUMP
        self.gen_number(callback, Register::A);
        self.code.push(Instr::Load(Register::A));
        self.code.push(Instr::Inc(Register::A));
        self.code.push(Instr::Inc(Register::A));
        self.code.push(Instr::Inc(Register::A));
        self.code.push(Instr::Jumpr(Register::A));
    }

    fn gen_main(&mut self, main: &MainBlock) {
        if !self.code.is_empty() {
            self.code.patch(0, Instr::Jump(self.code.len()));
        }
        self.memory = MemoryTable::new(self.offset);
        self.gen_declarations(&main.declarations);
        self.gen_body(&main.commands);
        self.code.push(Instr::Halt);
    }

    fn gen_declarations(&mut self, declarations: &[Declaration]) {
        for declaration in declarations {
            let (result, line) = match declaration {
                Declaration::Scalar { name, line } => (self.memory.add_scalar(name), *line),
                Declaration::Array { name, size, line } => {
                    (self.memory.add_array(name, *size), *line)
                }
            };
            if let Err(e) = result {
                self.error(line, e.0);
            }
        }
    }

    // --- commands ---

    pub(crate) fn gen_body(&mut self, commands: &[Command]) {
        for command in commands {
            match command {
                Command::Assign {
                    target,
                    value,
                    line,
                } => {
                    self.lineno = *line;
                    if let Err(e) = self.gen_assign(target, value) {
                        self.error(*line, e.0);
                    }
                    self.initialize(target);
                }
                Command::Read { target, line } => {
                    self.lineno = *line;
                    if let Err(e) = self.gen_read(target) {
                        self.error(*line, e.0);
                    }
                    self.initialize(target);
                }
                Command::Write { value, line } => {
                    self.lineno = *line;
                    if let Err(e) = self.gen_write(value) {
                        self.error(*line, e.0);
                    }
                }
                Command::IfElse {
                    condition,
                    then_branch,
                    else_branch,
                } => self.gen_ifelse(condition, then_branch, else_branch),
                Command::While { condition, body } => self.gen_while(condition, body),
                Command::Repeat { body, condition } => self.gen_repeat(body, condition),
                Command::Call { name, args, line } => self.gen_call(name, args, *line),
            }
        }
    }

    fn gen_assign(&mut self, target: &Identifier, value: &Expression) -> Result<(), GenError> {
        self.load_address(target, Register::H)?;
        self.gen_expression(value)?;
        self.code.push(Instr::Store(Register::H));
        Ok(())
    }

    fn gen_read(&mut self, target: &Identifier) -> Result<(), GenError> {
        self.load_address(target, Register::H)?;
        self.code.push(Instr::Read);
        self.code.push(Instr::Store(Register::H));
        Ok(())
    }

    fn gen_write(&mut self, value: &Value) -> Result<(), GenError> {
        match value {
            Value::Number(n) => {
                self.gen_number(*n, Register::A);
                self.code.push(Instr::Write);
            }
            Value::Load(target) => {
                self.check_initialized(target);
                self.load_address(target, Register::H)?;
                self.code.push(Instr::Load(Register::H));
                self.code.push(Instr::Write);
            }
        }
        Ok(())
    }

    fn gen_ifelse(
        &mut self,
        condition: &Condition,
        then_branch: &[Command],
        else_branch: &[Command],
    ) {
        let (canon, swap) = canonicalize(condition);
        let (block_a, block_b) = if swap {
            (else_branch, then_branch)
        } else {
            (then_branch, else_branch)
        };

        if let Err(e) = self.gen_condition(&canon) {
            self.error(self.lineno, e.0);
            return;
        }

        let before_block_a = self.code.reserve_jump();
        self.gen_body(block_a);
        let after_block_a = self.code.reserve_jump();
        self.gen_body(block_b);
        let after_block_b = self.code.len();
        self.code.patch(before_block_a, Instr::Jump(after_block_a + 1));
        self.code.patch(after_block_a, Instr::Jump(after_block_b));
    }

    fn gen_while(&mut self, condition: &Condition, body: &[Command]) {
        let (canon, swap) = canonicalize(condition);
        let before_condition = self.code.len();
        if let Err(e) = self.gen_condition(&canon) {
            self.error(self.lineno, e.0);
            return;
        }

        if !swap {
            let before_block = self.code.reserve_jump();
            self.loop_depth += 1;
            self.gen_body(body);
            self.loop_depth -= 1;
            self.code.push(Instr::Jump(before_condition));
            let after_block = self.code.len();
            self.code.patch(before_block, Instr::Jump(after_block));
        } else {
            // the condition's own closing jump doubles as the loop exit
            let before_block = self.code.len() - 1;
            self.loop_depth += 1;
            self.gen_body(body);
            self.loop_depth -= 1;
            self.code.push(Instr::Jump(before_condition));
            let after_block = self.code.len();
            let exit = match canon.op {
                CanonOp::Gt => Instr::Jpos(after_block),
                CanonOp::Eq => Instr::Jzero(after_block),
            };
            self.code.patch(before_block, exit);
        }
    }

    fn gen_repeat(&mut self, body: &[Command], condition: &Condition) {
        let (canon, swap) = canonicalize(condition);
        let block_start = self.code.len();
        self.loop_depth += 1;
        self.gen_body(body);
        self.loop_depth -= 1;

        if let Err(e) = self.gen_condition(&canon) {
            self.error(self.lineno, e.0);
            return;
        }
        if !swap {
            self.code.push(Instr::Jump(block_start));
        } else {
            // retarget the condition's closing jump as the back-edge
            let last_jump = self.code.len() - 1;
            let back = match canon.op {
                CanonOp::Gt => Instr::Jpos(block_start),
                CanonOp::Eq => Instr::Jzero(block_start),
            };
            self.code.patch(last_jump, back);
        }
    }

    // --- calls ---

    fn gen_call(&mut self, name: &str, args: &[String], line: usize) {
        self.lineno = line;
        // the callee may write through any parameter, so arguments count as
        // initialized from the call site on
        for arg in args {
            self.memory.mark_initialized(arg);
        }

        let Some(procedure) = self.procedures.get(name).cloned() else {
            self.error(
                line,
                format!(
                    "procedure {} not declared (this may mean that recursive call was issued)",
                    name
                ),
            );
            return;
        };
        if args.len() != procedure.params.len() {
            self.error(
                line,
                format!(
                    "argument count mismatch with procedure {} (received: {}, expected: {})",
                    name,
                    args.len(),
                    procedure.params.len()
                ),
            );
            return;
        }

        for (arg, slot) in args.iter().zip(&procedure.params) {
            let kind = match self.arg_pointee(arg) {
                Ok(kind) => kind,
                Err(e) => {
                    self.error(line, e.0);
                    return;
                }
            };
            if kind != slot.kind {
                self.error(
                    line,
                    format!("argument type mismatch with procedure {}", name),
                );
                return;
            }

            // forward the argument's effective address into the callee's
            // parameter cell
            let reference = match kind {
                Pointee::Scalar => Identifier::Scalar(arg.clone()),
                Pointee::Array => Identifier::ArrayNum(arg.clone(), 0),
            };
            if let Err(e) = self.load_address(&reference, Register::H) {
                self.error(line, e.0);
                return;
            }
            self.code.push(Instr::Get(Register::H));
            self.gen_number(slot.address, Register::B);
            self.code.push(Instr::Store(Register::B));
        }

        // the return trampoline lands three instructions past this STRK
        self.gen_number(procedure.callback, Register::B);
        self.code.push(Instr::Strk(Register::A));
        self.code.push(Instr::Store(Register::B));
        self.code.push(Instr::Jump(procedure.location));
    }

    fn arg_pointee(&self, name: &str) -> Result<Pointee, GenError> {
        match self.memory.kind_of(name)? {
            SymbolKind::Scalar => Ok(Pointee::Scalar),
            SymbolKind::Array => Ok(Pointee::Array),
            SymbolKind::Pointer => self.memory.pointer_kind(name),
        }
    }

    // --- helpers ---

    // Materialize an unsigned constant into a register from its binary
    // expansion, most significant bit first. Never touches memory.
    pub(crate) fn gen_number(&mut self, number: u64, reg: Register) {
        self.code.push(Instr::Rst(reg));
        if number == 0 {
            return;
        }
        let bits = 64 - number.leading_zeros() as u64;
        for i in (1..bits).rev() {
            if number >> i & 1 == 1 {
                self.code.push(Instr::Inc(reg));
            }
            self.code.push(Instr::Shl(reg));
        }
        if number & 1 == 1 {
            self.code.push(Instr::Inc(reg));
        }
    }

    fn initialize(&mut self, target: &Identifier) {
        if let Identifier::Scalar(name) = target {
            self.memory.mark_initialized(name);
        }
    }

    pub(crate) fn check_initialized(&mut self, target: &Identifier) {
        if let Identifier::Scalar(name) = target {
            self.check_initialized_name(name);
        }
    }

    // Backward flow can supply a value on a later iteration, so inside a
    // loop this only warns.
    pub(crate) fn check_initialized_name(&mut self, name: &str) {
        if !self.memory.is_uninitialized_scalar(name) {
            return;
        }
        if self.loop_depth == 0 {
            self.error(self.lineno, format!("variable {} not initialized", name));
        } else {
            self.warning(
                self.lineno,
                format!("variable {} may be not initialized", name),
            );
        }
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}
