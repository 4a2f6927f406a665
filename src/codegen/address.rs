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

use crate::ast::Identifier;
use crate::codegen::Generator;
use crate::codegen::instruction::{Instr, Register};
use crate::codegen::memory::SymbolKind;
use crate::errors::GenError;

impl Generator {
    // Leaves the absolute cell address of `target` in `reg`. The accumulator
    // doubles as scratch whenever a variable index or a pointer parameter is
    // involved, so callers must not park a live value there.
    pub(crate) fn load_address(
        &mut self,
        target: &Identifier,
        reg: Register,
    ) -> Result<(), GenError> {
        match target {
            Identifier::Scalar(name) => self.load_scalar_address(name, reg),
            Identifier::ArrayNum(name, index) => self.load_element_address(name, *index, reg),
            Identifier::ArrayVar(name, index) => self.load_indexed_address(name, index, reg),
        }
    }

    fn load_scalar_address(&mut self, name: &str, reg: Register) -> Result<(), GenError> {
        if self.memory.kind_of(name)? == SymbolKind::Array {
            return Err(GenError(format!("{} is an array", name)));
        }
        let forwarded = self.memory.is_scalar_pointer(name)?;
        let address = self.memory.scalar_address(name)?;
        self.gen_number(address, reg);
        if forwarded {
            // the cell holds the caller's address, not the value
            self.code.push(Instr::Load(reg));
            self.code.push(Instr::Put(reg));
        }
        Ok(())
    }

    fn load_element_address(
        &mut self,
        name: &str,
        index: u64,
        reg: Register,
    ) -> Result<(), GenError> {
        if self.memory.is_array_pointer(name)? {
            // parameter arrays carry no size, so the index is trusted
            let pointer_cell = self.memory.scalar_address(name)?;
            self.gen_number(pointer_cell, reg);
            self.code.push(Instr::Load(reg));
            self.gen_number(index, reg);
            self.code.push(Instr::Add(reg));
            self.code.push(Instr::Put(reg));
        } else {
            let cell = self.memory.array_cell(name, index)?;
            self.gen_number(cell, reg);
        }
        Ok(())
    }

    fn load_indexed_address(
        &mut self,
        name: &str,
        index: &str,
        reg: Register,
    ) -> Result<(), GenError> {
        self.check_initialized_name(index);

        let through_pointer = self.memory.is_array_pointer(name)?;

        // the index must name a scalar, possibly a forwarded one
        if self.memory.kind_of(index)? == SymbolKind::Array {
            return Err(GenError(format!("{} is an array", index)));
        }
        let indirect_index = self.memory.is_scalar_pointer(index)?;
        let index_address = self.memory.scalar_address(index)?;

        if through_pointer {
            let pointer_cell = self.memory.scalar_address(name)?;
            self.gen_number(pointer_cell, reg);
            self.code.push(Instr::Load(reg));
            self.code.push(Instr::Put(reg));
            self.gen_number(index_address, Register::A);
            self.code.push(Instr::Load(Register::A));
            if indirect_index {
                self.code.push(Instr::Load(Register::A));
            }
            self.code.push(Instr::Add(reg));
            self.code.push(Instr::Put(reg));
        } else {
            let base = self.memory.array_cell(name, 0)?;
            self.gen_number(index_address, Register::A);
            self.code.push(Instr::Load(Register::A));
            if indirect_index {
                self.code.push(Instr::Load(Register::A));
            }
            self.gen_number(base, reg);
            self.code.push(Instr::Add(reg));
            self.code.push(Instr::Put(reg));
        }
        Ok(())
    }
}
