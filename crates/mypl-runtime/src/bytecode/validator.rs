//! Bytecode validator: static checks before execution
//!
//! Performs three checks on every blueprint:
//! 1. **Operands**: each instruction carries exactly the operand kind its opcode requires
//! 2. **Jump targets**: every JMP/JMPF is patched and lands inside the same blueprint
//! 3. **Call targets**: every CALL names an existing blueprint
//!
//! All problems are collected rather than stopping at the first one.

use crate::bytecode::{Bytecode, Opcode, Operand, OperandKind, UNPATCHED};
use std::fmt;

/// A validation error with the blueprint and index where it was detected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub function: String,
    pub index: usize,
    pub kind: ValidationErrorKind,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.function, self.index, self.kind)
    }
}

/// Kinds of errors the validator can detect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Operand kind differs from what the opcode requires
    OperandMismatch {
        opcode: &'static str,
        expected: OperandKind,
        found: Option<OperandKind>,
    },
    /// Forward jump never backpatched
    UnpatchedJump,
    /// Jump target outside `[0, len)`
    JumpOutOfBounds { target: usize, len: usize },
    /// CALL to a name with no blueprint
    UnknownFunction(String),
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperandMismatch {
                opcode,
                expected,
                found,
            } => write!(
                f,
                "{} expects {:?} operand, found {:?}",
                opcode, expected, found
            ),
            Self::UnpatchedJump => write!(f, "jump target was never patched"),
            Self::JumpOutOfBounds { target, len } => {
                write!(f, "jump target {} out of bounds (len {})", target, len)
            }
            Self::UnknownFunction(name) => write!(f, "call to unknown function '{}'", name),
        }
    }
}

/// Validate a compiled program
pub fn validate(bytecode: &Bytecode) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for blueprint in bytecode.iter() {
        let len = blueprint.instructions.len();
        for (index, instruction) in blueprint.instructions.iter().enumerate() {
            let mut report = |kind| {
                errors.push(ValidationError {
                    function: blueprint.name.clone(),
                    index,
                    kind,
                })
            };

            let expected = instruction.opcode.operand_kind();
            let found = instruction.operand.as_ref().map(|op| op.kind());
            let matches = match found {
                None => expected == OperandKind::None,
                Some(kind) => kind == expected,
            };
            if !matches {
                report(ValidationErrorKind::OperandMismatch {
                    opcode: instruction.opcode.mnemonic(),
                    expected,
                    found,
                });
                continue;
            }

            if let Some(target) = instruction.jump_target() {
                if target == UNPATCHED {
                    report(ValidationErrorKind::UnpatchedJump);
                } else if target >= len {
                    report(ValidationErrorKind::JumpOutOfBounds { target, len });
                }
            }

            if let Some(Operand::Name(name)) = &instruction.operand {
                if instruction.opcode == Opcode::Call && !bytecode.contains(name) {
                    report(ValidationErrorKind::UnknownFunction(name.clone()));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
