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

mod ast_builder;

use crate::ast::*;
use crate::errors::CompileError;
use anyhow::Result;
use pest::Parser;
use pest_derive::Parser;

// Derive the parser from our grammar file.
#[derive(Parser)]
#[grammar = "./grammar.pest"]
pub struct ImpParser;

// Main parsing function that takes the entire source code string.
pub fn parse_source(source: &str) -> Result<Program> {
    let mut pairs =
        ImpParser::parse(Rule::program, source).map_err(CompileError::from)?;

    let mut procedures = Vec::new();
    let mut main = MainBlock {
        declarations: Vec::new(),
        commands: Vec::new(),
    };

    for pair in pairs.next().unwrap().into_inner() {
        match pair.as_rule() {
            Rule::procedure => procedures.push(ast_builder::build_procedure(pair)?),
            Rule::main => main = ast_builder::build_main(pair)?,
            Rule::EOI => {}
            _ => unreachable!("Unknown program rule: {:?}", pair.as_rule()),
        }
    }

    Ok(Program { procedures, main })
}

// ------------- unit tests -------------
