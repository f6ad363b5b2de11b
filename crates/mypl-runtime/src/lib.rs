//! MyPL Runtime - code generation and execution
//!
//! This library provides the back half of the MyPL toolchain:
//! - Lowering a validated syntax tree to Frame Blueprints
//! - A textual dump and a structural validator for generated code
//! - A stack-based engine with tagged values, a record heap, and a call stack

/// MyPL runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public API modules
pub mod ast;
pub mod bytecode;
pub mod compiler;
pub mod error;
pub mod heap;
pub mod io;
pub mod runtime;
pub mod types;
pub mod value;
pub mod vm;

// Re-export commonly used types
pub use bytecode::{disassemble, Blueprint, Bytecode, Instruction, Opcode};
pub use compiler::{compile, CodegenError, Compiler};
pub use error::MyplError;
pub use io::{InputReader, OutputWriter};
pub use mypl_config::VmConfig;
pub use runtime::{Execution, Runtime, RuntimeConfig};
pub use types::TypeTable;
pub use value::{RuntimeError, RuntimeErrorKind, Value};
pub use vm::VM;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoke() {
        assert_eq!(VERSION, "0.1.0");
    }
}
