use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CompileError {
    #[error("Syntax Error: {0}")]
    Parse(#[from] pest::error::Error<crate::parser::Rule>),

    #[error("Structural Error on line {line}: {reason}")]
    Structural { line: usize, reason: String },
}

// A semantic complaint raised by the symbol table or a lowering helper. The
// generator stamps it with the offending source line when it records the
// diagnostic.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct GenError(pub String);
