//! Driver-facing error type

use crate::bytecode::ValidationError;
use crate::compiler::CodegenError;
use crate::value::RuntimeError;
use mypl_config::ConfigError;
use thiserror::Error;

/// Any failure a MyPL driver can report
///
/// `Lex`, `Parse`, and `Static` are produced by front-end stages that live
/// outside this crate; they are carried here so a driver has one error type
/// and can tell runtime failures apart from everything before them.
#[derive(Debug, Error)]
pub enum MyplError {
    #[error("Lexer error: {0}")]
    Lex(String),

    #[error("Parser error: {0}")]
    Parse(String),

    #[error("Static error: {0}")]
    Static(String),

    #[error("Code generation error: {0}")]
    Codegen(#[from] CodegenError),

    #[error("Invalid bytecode: {}", join_validation(.0))]
    InvalidBytecode(Vec<ValidationError>),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl MyplError {
    /// Short stage name: `lex`, `parse`, `static`, `codegen`, `runtime`, or `config`
    pub fn kind(&self) -> &'static str {
        match self {
            MyplError::Lex(_) => "lex",
            MyplError::Parse(_) => "parse",
            MyplError::Static(_) => "static",
            MyplError::Codegen(_) | MyplError::InvalidBytecode(_) => "codegen",
            MyplError::Runtime(_) => "runtime",
            MyplError::Config(_) => "config",
        }
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, MyplError::Runtime(_))
    }

    /// The runtime error, if this is one
    pub fn as_runtime(&self) -> Option<&RuntimeError> {
        match self {
            MyplError::Runtime(err) => Some(err),
            _ => None,
        }
    }
}

fn join_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
