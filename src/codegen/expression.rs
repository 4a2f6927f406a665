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

use crate::ast::{ArithOp, Expression, Value};
use crate::codegen::Generator;
use crate::codegen::instruction::{Instr, Register};
use crate::errors::GenError;

impl Generator {
    // The result always lands in the accumulator.
    pub(crate) fn gen_expression(&mut self, expression: &Expression) -> Result<(), GenError> {
        match expression {
            Expression::Single(value) => self.gen_atom(value),
            Expression::Binary { op, lhs, rhs } => self.gen_binary(*op, lhs, rhs),
        }
    }

    fn gen_atom(&mut self, value: &Value) -> Result<(), GenError> {
        match value {
            Value::Number(n) => self.gen_number(*n, Register::A),
            Value::Load(target) => {
                self.check_initialized(target);
                self.load_address(target, Register::F)?;
                self.code.push(Instr::Load(Register::F));
            }
        }
        Ok(())
    }

    fn gen_binary(&mut self, op: ArithOp, lhs: &Value, rhs: &Value) -> Result<(), GenError> {
        if let Value::Load(target) = lhs {
            self.check_initialized(target);
        }
        if let Value::Load(target) = rhs {
            self.check_initialized(target);
        }

        // two literals fold at compile time, with the machine's arithmetic
        if let (Value::Number(x), Value::Number(y)) = (lhs, rhs) {
            let folded = fold(op, *x, *y)?;
            self.gen_number(folded, Register::A);
            return Ok(());
        }

        if self.try_peephole(op, lhs, rhs)? {
            return Ok(());
        }

        self.load_operand(lhs, Register::F)?;
        self.load_operand(rhs, Register::G)?;

        match op {
            ArithOp::Add => {
                self.code.push(Instr::Get(Register::F));
                self.code.push(Instr::Add(Register::G));
            }
            ArithOp::Sub => {
                self.code.push(Instr::Get(Register::F));
                self.code.push(Instr::Sub(Register::G));
            }
            ArithOp::Mul => self.gen_multiplication(Register::F, Register::G),
            ArithOp::Div => {
                self.gen_division(Register::F, Register::G);
                self.code.push(Instr::Get(Register::B));
            }
            ArithOp::Mod => {
                self.gen_division(Register::F, Register::G);
                // the routine leaves the remainder in the dividend register
                self.code.push(Instr::Get(Register::F));
            }
        }
        Ok(())
    }

    // +1 and *2 reduce on either side; -1 and /2 only when the literal is
    // the right-hand operand.
    fn try_peephole(&mut self, op: ArithOp, lhs: &Value, rhs: &Value) -> Result<bool, GenError> {
        let reduced = match (op, lhs, rhs) {
            (ArithOp::Add, Value::Number(1), Value::Load(target))
            | (ArithOp::Add, Value::Load(target), Value::Number(1)) => {
                Some((target, Instr::Inc(Register::A)))
            }
            (ArithOp::Mul, Value::Number(2), Value::Load(target))
            | (ArithOp::Mul, Value::Load(target), Value::Number(2)) => {
                Some((target, Instr::Shl(Register::A)))
            }
            (ArithOp::Sub, Value::Load(target), Value::Number(1)) => {
                Some((target, Instr::Dec(Register::A)))
            }
            (ArithOp::Div, Value::Load(target), Value::Number(2)) => {
                Some((target, Instr::Shr(Register::A)))
            }
            _ => None,
        };
        match reduced {
            Some((target, tail)) => {
                self.load_address(target, Register::F)?;
                self.code.push(Instr::Load(Register::F));
                self.code.push(tail);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // Put an operand's value into `reg`, leaving the accumulator free for
    // the next operand.
    pub(crate) fn load_operand(&mut self, value: &Value, reg: Register) -> Result<(), GenError> {
        match value {
            Value::Number(n) => self.gen_number(*n, reg),
            Value::Load(target) => {
                self.load_address(target, reg)?;
                self.code.push(Instr::Load(reg));
                self.code.push(Instr::Put(reg));
            }
        }
        Ok(())
    }
}

// Fold a binary operation on two literals, matching the target semantics:
// SUB floors at zero and division is floor division.
fn fold(op: ArithOp, x: u64, y: u64) -> Result<u64, GenError> {
    Ok(match op {
        ArithOp::Add => x.saturating_add(y),
        ArithOp::Sub => x.saturating_sub(y),
        ArithOp::Mul => x.saturating_mul(y),
        ArithOp::Div => {
            if y == 0 {
                return Err(GenError("division by zero in constant expression".to_string()));
            }
            x / y
        }
        ArithOp::Mod => {
            if y == 0 {
                return Err(GenError("division by zero in constant expression".to_string()));
            }
            x % y
        }
    })
}
