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

pub mod ast;
pub mod codegen;
pub mod errors;
pub mod file_reader;
pub mod parser;

use std::path::Path;

use anyhow::{Context, Result};
use codegen::instruction::Instr;
use codegen::{GenOutput, Generator};
use file_reader::FileReader;

extern crate pest;
extern crate pest_derive;

pub fn compile<F: FileReader>(source_path: &Path, reader: &F) -> Result<GenOutput> {
    let source = reader
        .read_to_string(source_path)
        .with_context(|| format!("Failed to read input file: {}", source_path.display()))?;

    let program = parser::parse_source(&source).context("Failed during parsing stage")?;

    Ok(Generator::new().run(&program))
}

// Render the instruction stream the way the virtual machine consumes it:
// one instruction per line, in emission order, no header.
pub fn render(code: &[Instr]) -> String {
    let mut out = String::new();
    for instr in code {
        out.push_str(&instr.to_string());
        out.push('\n');
    }
    out
}
