//! Type/signature table
//!
//! Produced by the static checker and consumed by the code generator.
//! The generator only needs two facts from it: the ordered field names of
//! each record type (allocation order) and each function's arity.

use crate::ast::{Expr, Literal, Program};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One record field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    /// Declared or inferred type name, if known
    pub ty: Option<String>,
}

/// Record type layout
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordType {
    /// Fields in declaration order
    pub fields: Vec<FieldInfo>,
}

impl RecordType {
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

/// Function signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    /// Parameter types in declaration order
    pub params: Vec<String>,
    pub return_type: String,
}

impl FunctionSignature {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Record layouts and function signatures, keyed by name
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TypeTable {
    records: HashMap<String, RecordType>,
    functions: HashMap<String, FunctionSignature>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table a checker would produce for a valid program
    pub fn from_program(program: &Program) -> Self {
        let mut table = Self::new();

        for decl in &program.types {
            let fields = decl
                .fields
                .iter()
                .map(|field| FieldInfo {
                    name: field.name.clone(),
                    ty: field.ty.clone().or_else(|| infer_type_name(&field.init)),
                })
                .collect();
            table.define_record(decl.name.clone(), RecordType { fields });
        }

        for fun in &program.functions {
            table.define_function(
                fun.name.clone(),
                FunctionSignature {
                    params: fun.params.iter().map(|p| p.ty.clone()).collect(),
                    return_type: fun.return_type.clone(),
                },
            );
        }

        table
    }

    pub fn define_record(&mut self, name: impl Into<String>, record: RecordType) {
        self.records.insert(name.into(), record);
    }

    pub fn define_function(&mut self, name: impl Into<String>, signature: FunctionSignature) {
        self.functions.insert(name.into(), signature);
    }

    pub fn record(&self, name: &str) -> Option<&RecordType> {
        self.records.get(name)
    }

    /// Ordered field names of a record type
    pub fn record_fields(&self, name: &str) -> Option<Vec<String>> {
        self.records.get(name).map(RecordType::field_names)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }
}

/// Type of an initializer when it is evident without checking
fn infer_type_name(expr: &Expr) -> Option<String> {
    let name = match expr {
        Expr::Literal(Literal::Int(_)) => "int",
        Expr::Literal(Literal::Double(_)) => "double",
        Expr::Literal(Literal::Bool(_)) => "bool",
        Expr::Literal(Literal::Char(_)) => "char",
        Expr::Literal(Literal::String(_)) => "string",
        Expr::New(type_name) => return Some(type_name.clone()),
        _ => return None,
    };
    Some(name.to_string())
}
