//! Expression compilation

use super::{CodegenError, Compiler};
use crate::ast::*;
use crate::bytecode::{Instruction, Opcode};
use crate::value::Value;

/// Built-in function lowered to a dedicated opcode
struct Builtin {
    opcode: Opcode,
    arity: usize,
    /// WRITE consumes its argument; the call still has to yield a value
    pushes_nil: bool,
}

fn builtin(name: &str) -> Option<Builtin> {
    let (opcode, arity, pushes_nil) = match name {
        "print" => (Opcode::Write, 1, true),
        "read" => (Opcode::Read, 0, false),
        "length" => (Opcode::Len, 1, false),
        "get" => (Opcode::GetChr, 2, false),
        "stoi" | "dtoi" => (Opcode::ToInt, 1, false),
        "stod" | "itod" => (Opcode::ToDbl, 1, false),
        "itos" | "dtos" => (Opcode::ToStr, 1, false),
        _ => return None,
    };
    Some(Builtin {
        opcode,
        arity,
        pushes_nil,
    })
}

/// Whether `name` is compiled to an opcode rather than a CALL
pub fn is_builtin(name: &str) -> bool {
    builtin(name).is_some()
}

impl<'a> Compiler<'a> {
    /// Compile an expression; leaves exactly one value on the stack
    pub(super) fn compile_expr(&mut self, expr: &Expr) -> Result<(), CodegenError> {
        match expr {
            Expr::Literal(lit) => {
                self.emit(Instruction::push(literal_value(lit)));
                Ok(())
            }
            Expr::Path(path) => self.compile_path(path),
            Expr::New(type_name) => self.compile_new(type_name),
            Expr::Call(call) => self.compile_call(call),
            Expr::Unary(unary) => {
                self.compile_expr(&unary.expr)?;
                let opcode = match unary.op {
                    UnaryOp::Negate => Opcode::Neg,
                    UnaryOp::Not => Opcode::Not,
                };
                self.emit(Instruction::simple(opcode));
                Ok(())
            }
            Expr::Binary(binary) => {
                // Left to right: fixes operand order for the VM
                self.compile_expr(&binary.left)?;
                self.compile_expr(&binary.right)?;
                self.emit(Instruction::simple(binary_opcode(binary.op)));
                Ok(())
            }
            Expr::Group(inner) => self.compile_expr(inner),
        }
    }

    /// Load the base variable, then one GETFLD per remaining component
    fn compile_path(&mut self, path: &[String]) -> Result<(), CodegenError> {
        let (base, fields) = path.split_first().ok_or_else(|| CodegenError::EmptyPath {
            function: self.blueprint.name.clone(),
        })?;

        let slot = self.require_local(base)?;
        self.emit(Instruction::load(slot));
        for field in fields {
            self.emit(Instruction::getfld(field.clone()));
        }
        Ok(())
    }

    /// Allocate, then initialize each field on a duplicate of the new id
    ///
    /// The type must be known to both the table and the program's own
    /// declarations, since the initializers come from the latter.
    fn compile_new(&mut self, type_name: &str) -> Result<(), CodegenError> {
        let unknown = || CodegenError::UnknownType {
            name: type_name.to_string(),
            function: self.blueprint.name.clone(),
        };
        let fields = self.types.record_fields(type_name).ok_or_else(unknown)?;
        let decl = self.records.get(type_name).copied().ok_or_else(unknown)?;
        self.emit(Instruction::alloc(fields));

        for field in &decl.fields {
            self.emit(Instruction::simple(Opcode::Dup));
            self.compile_expr(&field.init)?;
            self.emit(Instruction::setfld(field.name.clone()));
        }
        Ok(())
    }

    /// Compile a call in expression context; the result stays on the stack
    pub(super) fn compile_call(&mut self, call: &CallExpr) -> Result<(), CodegenError> {
        if let Some(builtin) = builtin(&call.name) {
            check_arity(&call.name, builtin.arity, call.args.len())?;
            for arg in &call.args {
                self.compile_expr(arg)?;
            }
            self.emit(Instruction::simple(builtin.opcode));
            if builtin.pushes_nil {
                self.emit(Instruction::push(Value::Nil));
            }
            return Ok(());
        }

        let arity = self
            .types
            .function(&call.name)
            .map(|sig| sig.arity())
            .ok_or_else(|| CodegenError::UnknownFunction {
                name: call.name.clone(),
                function: self.blueprint.name.clone(),
            })?;
        check_arity(&call.name, arity, call.args.len())?;

        for arg in &call.args {
            self.compile_expr(arg)?;
        }
        self.emit(Instruction::call(call.name.clone()));
        Ok(())
    }
}

fn check_arity(name: &str, expected: usize, found: usize) -> Result<(), CodegenError> {
    if expected == found {
        Ok(())
    } else {
        Err(CodegenError::ArityMismatch {
            name: name.to_string(),
            expected,
            found,
        })
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Int(n) => Value::Int(*n),
        Literal::Double(d) => Value::Double(*d),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Char(c) => Value::Char(*c),
        Literal::String(s) => Value::string(s.clone()),
        Literal::Nil => Value::Nil,
    }
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::Eq => Opcode::CmpEq,
        BinaryOp::Ne => Opcode::CmpNe,
        BinaryOp::Lt => Opcode::CmpLt,
        BinaryOp::Le => Opcode::CmpLe,
        BinaryOp::Gt => Opcode::CmpGt,
        BinaryOp::Ge => Opcode::CmpGe,
        BinaryOp::And => Opcode::And,
        BinaryOp::Or => Opcode::Or,
    }
}
