//! AST to bytecode compiler
//!
//! Lowers each function declaration into one Frame Blueprint.
//! - Expressions leave exactly one value on the operand stack
//! - Statements leave the operand stack as they found it
//! - Parameters occupy slots 0..k-1; every other local gets the next free slot
//! - Forward jumps are emitted as placeholders and backpatched
//!
//! The input tree is assumed to be validated. Anything that does not
//! resolve is a defect upstream and aborts generation with a `CodegenError`.

mod expr;
mod stmt;

pub use expr::is_builtin;

use crate::ast::{FunDecl, Program, Stmt, TypeDecl};
use crate::bytecode::{Blueprint, Bytecode, Instruction, Opcode};
use crate::types::TypeTable;
use crate::value::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Generation-time defect
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    #[error("Unknown type '{name}' in function '{function}'")]
    UnknownType { name: String, function: String },

    #[error("Unknown function '{name}' called from '{function}'")]
    UnknownFunction { name: String, function: String },

    #[error("Unknown variable '{name}' in function '{function}'")]
    UnknownVariable { name: String, function: String },

    #[error("'{name}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Function '{0}' is declared more than once")]
    DuplicateFunction(String),

    #[error("Empty variable path in function '{function}'")]
    EmptyPath { function: String },
}

/// Local variable information
#[derive(Debug, Clone)]
pub(super) struct Local {
    pub(super) name: String,
    /// Slot index in the function's flat slot space
    pub(super) slot: usize,
    /// Scope depth of this local (for shadowing resolution)
    pub(super) depth: usize,
}

/// Compiler state
pub struct Compiler<'a> {
    /// Record layouts and function signatures
    pub(super) types: &'a TypeTable,
    /// Record declarations, for field initializers
    pub(super) records: HashMap<&'a str, &'a TypeDecl>,
    /// Blueprint being generated
    pub(super) blueprint: Blueprint,
    /// Visible locals, innermost last
    pub(super) locals: Vec<Local>,
    /// Current scope depth
    pub(super) scope_depth: usize,
    /// Next unused slot; slots are never reused within a function
    pub(super) next_slot: usize,
}

impl<'a> Compiler<'a> {
    /// Create a new compiler
    pub fn new(types: &'a TypeTable) -> Self {
        Self {
            types,
            records: HashMap::new(),
            blueprint: Blueprint::new("", 0),
            locals: Vec::new(),
            scope_depth: 0,
            next_slot: 0,
        }
    }

    /// Compile a program to one blueprint per function
    pub fn compile(&mut self, program: &'a Program) -> Result<Bytecode, CodegenError> {
        self.records = program
            .types
            .iter()
            .map(|decl| (decl.name.as_str(), decl))
            .collect();

        let mut bytecode = Bytecode::new();
        for fun in &program.functions {
            if bytecode.contains(&fun.name) {
                return Err(CodegenError::DuplicateFunction(fun.name.clone()));
            }
            let blueprint = self.compile_function(fun)?;
            debug!(
                function = %blueprint.name,
                params = blueprint.param_count,
                instructions = blueprint.len(),
                "generated blueprint"
            );
            bytecode.insert(blueprint);
        }

        Ok(bytecode)
    }

    /// Compile a single function declaration
    fn compile_function(&mut self, fun: &FunDecl) -> Result<Blueprint, CodegenError> {
        self.blueprint = Blueprint::new(fun.name.clone(), fun.params.len());
        self.locals.clear();
        self.scope_depth = 0;
        self.next_slot = 0;

        // Arguments land in slots 0..k-1 at call time; no store prologue
        for param in &fun.params {
            self.declare_local(&param.name);
        }

        for stmt in &fun.body {
            self.compile_stmt(stmt)?;
        }

        if !matches!(fun.body.last(), Some(Stmt::Return(_))) {
            self.emit(Instruction::push(Value::Nil));
            self.emit(Instruction::simple(Opcode::Vret));
        }

        Ok(std::mem::replace(
            &mut self.blueprint,
            Blueprint::new("", 0),
        ))
    }

    /// Append an instruction to the current blueprint
    pub(super) fn emit(&mut self, instruction: Instruction) -> usize {
        self.blueprint.emit(instruction)
    }

    /// Bind a name to a fresh slot in the current scope
    pub(super) fn declare_local(&mut self, name: &str) -> usize {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.locals.push(Local {
            name: name.to_string(),
            slot,
            depth: self.scope_depth,
        });
        slot
    }

    /// Resolve a local variable by name, returning its slot if visible
    pub(super) fn resolve_local(&self, name: &str) -> Option<usize> {
        // Search from most recent to oldest (for shadowing)
        self.locals
            .iter()
            .rev()
            .find(|local| local.name == name)
            .map(|local| local.slot)
    }

    /// Resolve or fail with the current function name attached
    pub(super) fn require_local(&self, name: &str) -> Result<usize, CodegenError> {
        self.resolve_local(name)
            .ok_or_else(|| CodegenError::UnknownVariable {
                name: name.to_string(),
                function: self.blueprint.name.clone(),
            })
    }

    pub(super) fn begin_scope(&mut self) {
        self.scope_depth += 1;
    }

    /// Drop names declared in the closing scope; their slots stay allocated
    pub(super) fn end_scope(&mut self) {
        self.scope_depth -= 1;
        let depth = self.scope_depth;
        self.locals.retain(|local| local.depth <= depth);
    }
}

/// Compile a program with a fresh compiler
pub fn compile(program: &Program, types: &TypeTable) -> Result<Bytecode, CodegenError> {
    Compiler::new(types).compile(program)
}
