//! Statement compilation

use super::{CodegenError, Compiler};
use crate::ast::*;
use crate::bytecode::{Instruction, Opcode, UNPATCHED};
use crate::value::Value;

impl<'a> Compiler<'a> {
    /// Compile a statement
    pub(super) fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), CodegenError> {
        match stmt {
            Stmt::VarDecl(decl) => {
                // Initializer sees the enclosing binding of the same name
                self.compile_expr(&decl.init)?;
                let slot = self.declare_local(&decl.name);
                self.emit(Instruction::store(slot));
                Ok(())
            }
            Stmt::Assign(assign) => self.compile_assign(assign),
            Stmt::If(if_stmt) => self.compile_if(if_stmt),
            Stmt::While(while_stmt) => self.compile_while(while_stmt),
            Stmt::For(for_stmt) => self.compile_for(for_stmt),
            Stmt::Return(expr) => {
                match expr {
                    Some(expr) => self.compile_expr(expr)?,
                    None => {
                        self.emit(Instruction::push(Value::Nil));
                    }
                }
                self.emit(Instruction::simple(Opcode::Vret));
                Ok(())
            }
            Stmt::Delete(name) => {
                let slot = self.require_local(name)?;
                self.emit(Instruction::load(slot));
                self.emit(Instruction::simple(Opcode::Free));
                // Stale ids must not stay reachable through the variable
                self.emit(Instruction::push(Value::Nil));
                self.emit(Instruction::store(slot));
                Ok(())
            }
            Stmt::Call(call) => {
                self.compile_call(call)?;
                self.emit(Instruction::simple(Opcode::Pop).with_comment("clean up call return value"));
                Ok(())
            }
        }
    }

    /// Compile a block in its own scope
    fn compile_block(&mut self, stmts: &[Stmt]) -> Result<(), CodegenError> {
        self.begin_scope();
        for stmt in stmts {
            self.compile_stmt(stmt)?;
        }
        self.end_scope();
        Ok(())
    }

    /// Compile `x = e` or `a.b.c = e`
    fn compile_assign(&mut self, assign: &Assign) -> Result<(), CodegenError> {
        let (base, rest) = assign
            .target
            .split_first()
            .ok_or_else(|| CodegenError::EmptyPath {
                function: self.blueprint.name.clone(),
            })?;

        // Value first, then the object to store it into
        self.compile_expr(&assign.value)?;
        let slot = self.require_local(base)?;

        match rest.split_last() {
            None => {
                self.emit(Instruction::store(slot));
            }
            Some((field, through)) => {
                self.emit(Instruction::load(slot));
                for component in through {
                    self.emit(Instruction::getfld(component.clone()));
                }
                self.emit(Instruction::simple(Opcode::Swap));
                self.emit(Instruction::setfld(field.clone()));
            }
        }
        Ok(())
    }

    /// Compile an if/elif/else chain
    ///
    /// Each JMPF skips to the next branch's condition. Every branch body
    /// except the final one ends in a JMP to the shared landing NOP.
    fn compile_if(&mut self, if_stmt: &IfStmt) -> Result<(), CodegenError> {
        let mut exit_jumps = Vec::new();
        let last = if_stmt.branches.len().saturating_sub(1);

        for (idx, branch) in if_stmt.branches.iter().enumerate() {
            self.compile_expr(&branch.cond)?;
            let skip = self.emit(Instruction::jmpf(UNPATCHED));
            self.compile_block(&branch.body)?;

            if idx != last || if_stmt.else_body.is_some() {
                exit_jumps.push(self.emit(Instruction::jmp(UNPATCHED)));
            }
            let next = self.blueprint.current_offset();
            self.blueprint.patch_jump(skip, next);
        }

        if let Some(else_body) = &if_stmt.else_body {
            self.compile_block(else_body)?;
        }

        let landing = self.emit(Instruction::simple(Opcode::Nop));
        for jump in exit_jumps {
            self.blueprint.patch_jump(jump, landing);
        }
        Ok(())
    }

    /// Compile a while loop
    fn compile_while(&mut self, while_stmt: &WhileStmt) -> Result<(), CodegenError> {
        let loop_start = self.blueprint.current_offset();

        self.compile_expr(&while_stmt.cond)?;
        let exit_jump = self.emit(Instruction::jmpf(UNPATCHED));

        self.compile_block(&while_stmt.body)?;
        self.emit(Instruction::jmp(loop_start));

        let landing = self.emit(Instruction::simple(Opcode::Nop));
        self.blueprint.patch_jump(exit_jump, landing);
        Ok(())
    }

    /// Compile a counting loop with inclusive bounds
    fn compile_for(&mut self, for_stmt: &ForStmt) -> Result<(), CodegenError> {
        self.begin_scope();

        self.compile_expr(&for_stmt.start)?;
        // A visible variable of the same name is reused as the counter
        let slot = match self.resolve_local(&for_stmt.var) {
            Some(slot) => slot,
            None => self.declare_local(&for_stmt.var),
        };
        self.emit(Instruction::store(slot));

        let loop_start = self.emit(Instruction::load(slot));
        self.compile_expr(&for_stmt.end)?;
        let (compare, step) = match for_stmt.direction {
            ForDirection::Upto => (Opcode::CmpLe, Opcode::Add),
            ForDirection::Downto => (Opcode::CmpGe, Opcode::Sub),
        };
        self.emit(Instruction::simple(compare));
        let exit_jump = self.emit(Instruction::jmpf(UNPATCHED));

        self.compile_block(&for_stmt.body)?;

        self.emit(Instruction::load(slot));
        self.emit(Instruction::push(Value::Int(1)));
        self.emit(Instruction::simple(step));
        self.emit(Instruction::store(slot));
        self.emit(Instruction::jmp(loop_start));

        let landing = self.emit(Instruction::simple(Opcode::Nop));
        self.blueprint.patch_jump(exit_jump, landing);

        self.end_scope();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::bytecode::{disassemble, Opcode};
    use crate::compiler::compile;
    use crate::types::TypeTable;

    fn dump(program: &Program) -> String {
        let types = TypeTable::from_program(program);
        disassemble(&compile(program, &types).unwrap())
    }

    #[test]
    fn test_for_upto_lowering() {
        let program = Program::with_main(vec![Stmt::for_upto(
            "i",
            Expr::int(1),
            Expr::int(3),
            vec![Stmt::print(Expr::var("i"))],
        )]);
        insta::assert_snapshot!(dump(&program), @r"
        Frame 'main' (0 params)
          0: PUSH 1
          1: STORE 0
          2: LOAD 0
          3: PUSH 3
          4: CMPLE
          5: JMPF 15
          6: LOAD 0
          7: WRITE
          8: PUSH nil
          9: POP  // clean up call return value
          10: LOAD 0
          11: PUSH 1
          12: ADD
          13: STORE 0
          14: JMP 2
          15: NOP
          16: PUSH nil
          17: VRET
        ");
    }

    #[test]
    fn test_for_downto_reuses_visible_slot() {
        let program = Program::with_main(vec![
            Stmt::var("a", Expr::int(0)),
            Stmt::var("i", Expr::int(9)),
            Stmt::for_downto("i", Expr::int(5), Expr::int(1), vec![]),
        ]);
        let types = TypeTable::from_program(&program);
        let bytecode = compile(&program, &types).unwrap();
        let main = bytecode.get("main").unwrap();

        // Counter stored into the existing slot 1, decremented with SUB
        assert_eq!(main.instructions[5].to_string(), "STORE 1");
        assert!(main
            .instructions
            .iter()
            .any(|instr| instr.opcode == Opcode::Sub));
        assert!(main.instructions.iter().all(|instr| instr.to_string() != "STORE 2"));
    }

    #[test]
    fn test_delete_clears_slot() {
        let program = Program::new(
            vec![TypeDecl::new("T", vec![("x", Expr::int(0))])],
            vec![FunDecl::main(vec![
                Stmt::var("t", Expr::new_record("T")),
                Stmt::delete("t"),
            ])],
        );
        insta::assert_snapshot!(dump(&program), @r"
        Frame 'main' (0 params)
          0: ALLOC [x]
          1: DUP
          2: PUSH 0
          3: SETFLD x
          4: STORE 0
          5: LOAD 0
          6: FREE
          7: PUSH nil
          8: STORE 0
          9: PUSH nil
          10: VRET
        ");
    }

    #[test]
    fn test_block_locals_get_fresh_slots() {
        let program = Program::with_main(vec![
            Stmt::var("x", Expr::int(1)),
            Stmt::if_then(Expr::bool(true), vec![Stmt::var("x", Expr::var("x"))]),
            Stmt::var("y", Expr::var("x")),
        ]);
        let types = TypeTable::from_program(&program);
        let bytecode = compile(&program, &types).unwrap();
        let lines: Vec<String> = bytecode
            .get("main")
            .unwrap()
            .instructions
            .iter()
            .map(|i| i.to_string())
            .collect();

        // inner x -> slot 1 (initialized from outer slot 0); y reads outer x again
        assert_eq!(&lines[4..6], &["LOAD 0".to_string(), "STORE 1".to_string()]);
        assert_eq!(&lines[7..9], &["LOAD 0".to_string(), "STORE 2".to_string()]);
    }

    #[test]
    fn test_explicit_return_has_no_implicit_tail() {
        let program = Program::new(
            vec![],
            vec![
                FunDecl::new("int", "one", &[], vec![Stmt::ret(Expr::int(1))]),
                FunDecl::main(vec![]),
            ],
        );
        let types = TypeTable::from_program(&program);
        let bytecode = compile(&program, &types).unwrap();
        assert_eq!(bytecode.get("one").unwrap().len(), 2);
    }
}
