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

use anyhow::Result;
use clap::Parser as clap_parser;
use impc::compile;
use impc::file_reader::SourceFileReader;
use impc::render;
use std::fs;
use std::path::PathBuf;

#[derive(clap_parser)]
#[clap(version = "0.1.0", author = "Connor Nolan")]
struct Opts {
    /// Source program
    input: PathBuf,
    /// Assembly output
    output: PathBuf,
}

fn main() -> Result<()> {
    let opts: Opts = Opts::parse();

    let reader = SourceFileReader;
    let result = compile(&opts.input, &reader)?;

    for diagnostic in &result.diagnostics {
        eprintln!("{}", diagnostic);
    }

    if result.error_mode {
        anyhow::bail!(
            "errors were reported, {} was not written",
            opts.output.display()
        );
    }

    fs::write(&opts.output, render(&result.code))?;
    println!(
        "Successfully compiled {} to {}",
        opts.input.display(),
        opts.output.display()
    );

    Ok(())
}
