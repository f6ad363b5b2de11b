//! Bytecode model
//!
//! A compiled program is a set of Frame Blueprints, one per function.
//! Each blueprint is a flat instruction list; jump targets are indices
//! into that same list.

mod disasm;
mod opcode;
mod validator;

pub use disasm::{disassemble, format_value};
pub use opcode::{Opcode, OperandKind};
pub use validator::{validate, ValidationError, ValidationErrorKind};

use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Address carried by a forward jump until it is backpatched
pub const UNPATCHED: usize = usize::MAX;

/// Instruction operand
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Literal pushed by PUSH
    Value(Value),
    /// Local slot index for LOAD/STORE
    Slot(usize),
    /// Jump target for JMP/JMPF
    Address(usize),
    /// Function name for CALL, field name for SETFLD/GETFLD
    Name(String),
    /// Ordered field names for ALLOC
    Fields(Vec<String>),
}

impl Operand {
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Value(_) => OperandKind::Value,
            Operand::Slot(_) => OperandKind::Slot,
            Operand::Address(_) => OperandKind::Address,
            Operand::Name(_) => OperandKind::Name,
            Operand::Fields(_) => OperandKind::Fields,
        }
    }
}

/// One opcode plus optional operand and diagnostic comment
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Option<Operand>,
    pub comment: Option<String>,
}

impl Instruction {
    /// Instruction without an operand
    pub fn simple(opcode: Opcode) -> Self {
        Self {
            opcode,
            operand: None,
            comment: None,
        }
    }

    fn with_operand(opcode: Opcode, operand: Operand) -> Self {
        Self {
            opcode,
            operand: Some(operand),
            comment: None,
        }
    }

    pub fn push(value: Value) -> Self {
        Self::with_operand(Opcode::Push, Operand::Value(value))
    }

    pub fn load(slot: usize) -> Self {
        Self::with_operand(Opcode::Load, Operand::Slot(slot))
    }

    pub fn store(slot: usize) -> Self {
        Self::with_operand(Opcode::Store, Operand::Slot(slot))
    }

    pub fn jmp(address: usize) -> Self {
        Self::with_operand(Opcode::Jmp, Operand::Address(address))
    }

    pub fn jmpf(address: usize) -> Self {
        Self::with_operand(Opcode::Jmpf, Operand::Address(address))
    }

    pub fn call(name: impl Into<String>) -> Self {
        Self::with_operand(Opcode::Call, Operand::Name(name.into()))
    }

    pub fn alloc(fields: Vec<String>) -> Self {
        Self::with_operand(Opcode::Alloc, Operand::Fields(fields))
    }

    pub fn setfld(field: impl Into<String>) -> Self {
        Self::with_operand(Opcode::SetFld, Operand::Name(field.into()))
    }

    pub fn getfld(field: impl Into<String>) -> Self {
        Self::with_operand(Opcode::GetFld, Operand::Name(field.into()))
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Jump target, if this is a jump
    pub fn jump_target(&self) -> Option<usize> {
        match (self.opcode, &self.operand) {
            (Opcode::Jmp | Opcode::Jmpf, Some(Operand::Address(addr))) => Some(*addr),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        match &self.operand {
            None => {}
            Some(Operand::Value(v)) => write!(f, " {}", format_value(v))?,
            Some(Operand::Slot(slot)) => write!(f, " {}", slot)?,
            Some(Operand::Address(UNPATCHED)) => write!(f, " ?")?,
            Some(Operand::Address(addr)) => write!(f, " {}", addr)?,
            Some(Operand::Name(name)) => write!(f, " {}", name)?,
            Some(Operand::Fields(fields)) => write!(f, " [{}]", fields.join(", "))?,
        }
        if let Some(comment) = &self.comment {
            write!(f, "  // {}", comment)?;
        }
        Ok(())
    }
}

/// Frame Blueprint: one function's compiled instructions
#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    pub name: String,
    pub param_count: usize,
    pub instructions: Vec<Instruction>,
}

impl Blueprint {
    pub fn new(name: impl Into<String>, param_count: usize) -> Self {
        Self {
            name: name.into(),
            param_count,
            instructions: Vec::new(),
        }
    }

    /// Append an instruction and return its index
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    /// Index the next emitted instruction will get (for jump targets)
    pub fn current_offset(&self) -> usize {
        self.instructions.len()
    }

    /// Point the placeholder jump at `index` to `target`
    ///
    /// Only the address operand changes; opcode and comment are kept.
    pub fn patch_jump(&mut self, index: usize, target: usize) {
        let instruction = &mut self.instructions[index];
        debug_assert!(
            matches!(instruction.operand, Some(Operand::Address(UNPATCHED))),
            "patching a non-placeholder instruction: {}",
            instruction
        );
        instruction.operand = Some(Operand::Address(target));
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Compiled program: blueprints keyed by name, kept in generation order
#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    blueprints: Vec<Arc<Blueprint>>,
    index: HashMap<String, usize>,
}

impl Bytecode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a blueprint, replacing any previous one of the same name
    pub fn insert(&mut self, blueprint: Blueprint) {
        let blueprint = Arc::new(blueprint);
        match self.index.get(&blueprint.name) {
            Some(&slot) => self.blueprints[slot] = blueprint,
            None => {
                self.index
                    .insert(blueprint.name.clone(), self.blueprints.len());
                self.blueprints.push(blueprint);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Blueprint>> {
        self.index.get(name).map(|&slot| &self.blueprints[slot])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Blueprints in generation order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Blueprint>> {
        self.blueprints.iter()
    }

    pub fn len(&self) -> usize {
        self.blueprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_returns_index() {
        let mut bp = Blueprint::new("main", 0);
        assert_eq!(bp.emit(Instruction::push(Value::Int(1))), 0);
        assert_eq!(bp.emit(Instruction::simple(Opcode::Pop)), 1);
        assert_eq!(bp.current_offset(), 2);
    }

    #[test]
    fn test_patch_jump_only_changes_address() {
        let mut bp = Blueprint::new("main", 0);
        let jump = bp.emit(Instruction::jmpf(UNPATCHED).with_comment("exit"));
        bp.emit(Instruction::simple(Opcode::Nop));

        bp.patch_jump(jump, 1);

        assert_eq!(bp.instructions[jump].jump_target(), Some(1));
        assert_eq!(bp.instructions[jump].opcode, Opcode::Jmpf);
        assert_eq!(bp.instructions[jump].comment.as_deref(), Some("exit"));
    }

    #[test]
    fn test_instruction_display() {
        assert_eq!(Instruction::push(Value::string("hi")).to_string(), "PUSH \"hi\"");
        assert_eq!(Instruction::jmpf(UNPATCHED).to_string(), "JMPF ?");
        assert_eq!(
            Instruction::alloc(vec!["x".into(), "y".into()]).to_string(),
            "ALLOC [x, y]"
        );
        assert_eq!(
            Instruction::simple(Opcode::Pop)
                .with_comment("clean up call return value")
                .to_string(),
            "POP  // clean up call return value"
        );
    }

    #[test]
    fn test_insert_replaces_by_name() {
        let mut bytecode = Bytecode::new();
        bytecode.insert(Blueprint::new("f", 1));
        bytecode.insert(Blueprint::new("main", 0));
        bytecode.insert(Blueprint::new("f", 2));

        assert_eq!(bytecode.len(), 2);
        assert_eq!(bytecode.get("f").map(|bp| bp.param_count), Some(2));
        let names: Vec<&str> = bytecode.iter().map(|bp| bp.name.as_str()).collect();
        assert_eq!(names, vec!["f", "main"]);
    }
}
