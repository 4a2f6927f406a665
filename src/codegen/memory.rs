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

use crate::errors::GenError;
use std::collections::HashMap;

// What a pointer parameter forwards to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Pointee {
    Scalar,
    Array,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    Scalar,
    Array,
    Pointer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Scalar { address: u64, initialized: bool },
    Array { base: u64, size: u64 },
    Pointer { address: u64, pointee: Pointee },
}

// Per-scope symbol table. Cells are handed out densely from the offset the
// scope starts at; an array occupies `size` consecutive cells.
#[derive(Debug)]
pub struct MemoryTable {
    symbols: HashMap<String, Symbol>,
    offset: u64,
}

impl MemoryTable {
    pub fn new(offset: u64) -> Self {
        Self {
            symbols: HashMap::new(),
            offset,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn add_scalar(&mut self, name: &str) -> Result<(), GenError> {
        if self.symbols.contains_key(name) {
            return Err(GenError(format!("variable {} already declared", name)));
        }
        self.symbols.insert(
            name.to_string(),
            Symbol::Scalar {
                address: self.offset,
                initialized: false,
            },
        );
        self.offset += 1;
        Ok(())
    }

    pub fn add_array(&mut self, name: &str, size: u64) -> Result<(), GenError> {
        if self.symbols.contains_key(name) {
            return Err(GenError(format!("array {} already declared", name)));
        }
        if size == 0 {
            return Err(GenError(format!(
                "array {} cannot be declared with size 0",
                name
            )));
        }
        self.symbols.insert(
            name.to_string(),
            Symbol::Array {
                base: self.offset,
                size,
            },
        );
        self.offset += size;
        Ok(())
    }

    // Returns the cell the new pointer occupies.
    pub fn add_pointer(&mut self, name: &str, pointee: Pointee) -> Result<u64, GenError> {
        if self.symbols.contains_key(name) {
            return Err(GenError(format!("parameter {} already declared", name)));
        }
        let address = self.offset;
        self.symbols.insert(
            name.to_string(),
            Symbol::Pointer { address, pointee },
        );
        self.offset += 1;
        Ok(address)
    }

    fn lookup(&self, name: &str) -> Result<&Symbol, GenError> {
        self.symbols
            .get(name)
            .ok_or_else(|| GenError(format!("{} is undeclared", name)))
    }

    pub fn kind_of(&self, name: &str) -> Result<SymbolKind, GenError> {
        Ok(match self.lookup(name)? {
            Symbol::Scalar { .. } => SymbolKind::Scalar,
            Symbol::Array { .. } => SymbolKind::Array,
            Symbol::Pointer { .. } => SymbolKind::Pointer,
        })
    }

    pub fn pointer_kind(&self, name: &str) -> Result<Pointee, GenError> {
        match self.lookup(name)? {
            Symbol::Pointer { pointee, .. } => Ok(*pointee),
            _ => Err(GenError(format!("{} is not a pointer", name))),
        }
    }

    // True for a parameter that forwards a scalar cell. A pointer to an
    // array used in scalar position is a kind mismatch.
    pub fn is_scalar_pointer(&self, name: &str) -> Result<bool, GenError> {
        match self.lookup(name)? {
            Symbol::Pointer {
                pointee: Pointee::Scalar,
                ..
            } => Ok(true),
            Symbol::Pointer {
                pointee: Pointee::Array,
                ..
            } => Err(GenError(format!("pointer {} points to an array", name))),
            _ => Ok(false),
        }
    }

    pub fn is_array_pointer(&self, name: &str) -> Result<bool, GenError> {
        match self.lookup(name)? {
            Symbol::Pointer {
                pointee: Pointee::Array,
                ..
            } => Ok(true),
            Symbol::Pointer {
                pointee: Pointee::Scalar,
                ..
            } => Err(GenError(format!("pointer {} points to a variable", name))),
            _ => Ok(false),
        }
    }

    // Address of the cell holding a scalar's value, or holding a pointer's
    // forwarded address.
    pub fn scalar_address(&self, name: &str) -> Result<u64, GenError> {
        match self.lookup(name)? {
            Symbol::Scalar { address, .. } => Ok(*address),
            Symbol::Pointer { address, .. } => Ok(*address),
            Symbol::Array { .. } => Err(GenError(format!("{} is an array", name))),
        }
    }

    // Cell of a literal-indexed element of a local array, bounds included.
    pub fn array_cell(&self, name: &str, index: u64) -> Result<u64, GenError> {
        match self.lookup(name)? {
            Symbol::Array { base, size } => {
                if index < *size {
                    Ok(base + index)
                } else {
                    Err(GenError(format!(
                        "index {} is out of bounds for array {}",
                        index, name
                    )))
                }
            }
            _ => Err(GenError(format!("{} is not an array", name))),
        }
    }

    pub fn mark_initialized(&mut self, name: &str) {
        if let Some(Symbol::Scalar { initialized, .. }) = self.symbols.get_mut(name) {
            *initialized = true;
        }
    }

    pub fn is_uninitialized_scalar(&self, name: &str) -> bool {
        matches!(
            self.symbols.get(name),
            Some(Symbol::Scalar {
                initialized: false,
                ..
            })
        )
    }
}

// One callable procedure: where its body starts in the code stream, the
// cell the caller's return PC lands in, and the pointer cells its
// parameters occupy, in declaration order.
#[derive(Debug, Clone)]
pub struct ProcedureRecord {
    pub location: usize,
    pub callback: u64,
    pub params: Vec<ParamSlot>,
}

#[derive(Debug, Copy, Clone)]
pub struct ParamSlot {
    pub address: u64,
    pub kind: Pointee,
}
