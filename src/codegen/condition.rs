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

use crate::ast::{Condition, RelOp, Value};
use crate::codegen::Generator;
use crate::codegen::instruction::{Instr, Register};
use crate::errors::GenError;

// The two comparison primitives the machine can express cheaply.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CanonOp {
    Eq,
    Gt,
}

#[derive(Debug, Clone)]
pub struct CanonCondition {
    pub op: CanonOp,
    pub lhs: Value,
    pub rhs: Value,
}

// Reduce a source relation to a canonical primitive. When `swap` comes back
// true the surrounding command exchanges its two branch bodies, which is how
// the negated relations are expressed.
pub fn canonicalize(condition: &Condition) -> (CanonCondition, bool) {
    let Condition { op, lhs, rhs } = condition;
    match op {
        RelOp::Eq => (canon(CanonOp::Eq, lhs, rhs), false),
        RelOp::Neq => (canon(CanonOp::Eq, lhs, rhs), true),
        RelOp::Gt => (canon(CanonOp::Gt, lhs, rhs), false),
        RelOp::Lt => (canon(CanonOp::Gt, rhs, lhs), false),
        RelOp::Geq => (canon(CanonOp::Gt, rhs, lhs), true),
        RelOp::Leq => (canon(CanonOp::Gt, lhs, rhs), true),
    }
}

fn canon(op: CanonOp, lhs: &Value, rhs: &Value) -> CanonCondition {
    CanonCondition {
        op,
        lhs: lhs.clone(),
        rhs: rhs.clone(),
    }
}

impl Generator {
    // Emit the canonical comparison. Control falls through into the block
    // behind the closing JPOS/JZERO when the primitive holds; the jump skips
    // the single instruction a surrounding command plants right after it.
    pub(crate) fn gen_condition(&mut self, condition: &CanonCondition) -> Result<(), GenError> {
        self.load_operand(&condition.lhs, Register::E)?;
        self.load_operand(&condition.rhs, Register::F)?;

        match condition.op {
            CanonOp::Gt => {
                self.code.push(Instr::Get(Register::E));
                self.code.push(Instr::Sub(Register::F));
                let k = self.code.len();
                self.code.push(Instr::Jpos(k + 2));
            }
            CanonOp::Eq => {
                // |lhs - rhs| assembled from the two saturating differences
                self.code.push(Instr::Get(Register::E));
                self.code.push(Instr::Sub(Register::F));
                self.code.push(Instr::Put(Register::B));
                self.code.push(Instr::Get(Register::F));
                self.code.push(Instr::Sub(Register::E));
                self.code.push(Instr::Add(Register::B));
                let k = self.code.len();
                self.code.push(Instr::Jzero(k + 2));
            }
        }
        Ok(())
    }
}
