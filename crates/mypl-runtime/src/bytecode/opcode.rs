//! Bytecode instruction set
//!
//! Stack-based bytecode with 37 opcodes organized by category.

use std::fmt;

/// What kind of operand an opcode carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    None,
    /// Literal value
    Value,
    /// Local slot index
    Slot,
    /// Jump target within the same blueprint
    Address,
    /// Function or field name
    Name,
    /// Ordered field name list
    Fields,
}

/// Bytecode opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Opcode {
    // ===== Stack & slots =====
    /// Push literal [value]
    Push,
    /// Discard top
    Pop,
    /// Push slot value [slot]
    Load,
    /// Pop into slot, growing the slot list if needed [slot]
    Store,

    // ===== Arithmetic =====
    /// Pop b, pop a, push a + b (numbers, or string/char concatenation)
    Add,
    /// Pop b, pop a, push a - b
    Sub,
    /// Pop b, pop a, push a * b
    Mul,
    /// Pop b, pop a, push a / b
    Div,
    /// Pop b, pop a, push a % b
    Mod,
    /// Pop a, push -a
    Neg,

    // ===== Logical =====
    /// Pop b, pop a, push a and b
    And,
    /// Pop b, pop a, push a or b
    Or,
    /// Pop a, push not a
    Not,

    // ===== Comparison =====
    /// Pop b, pop a, push a < b
    CmpLt,
    /// Pop b, pop a, push a <= b
    CmpLe,
    /// Pop b, pop a, push a > b
    CmpGt,
    /// Pop b, pop a, push a >= b
    CmpGe,
    /// Pop b, pop a, push a == b
    CmpEq,
    /// Pop b, pop a, push a != b
    CmpNe,

    // ===== Control flow =====
    /// Set pc [address]
    Jmp,
    /// Pop condition, set pc if false [address]
    Jmpf,
    /// Call blueprint by name [name]
    Call,
    /// Pop return value, pop activation, push value on caller
    Vret,

    // ===== Built-ins =====
    /// Pop a, print it
    Write,
    /// Push one line from the console
    Read,
    /// Pop string, push its length
    Len,
    /// Pop string, pop index, push character
    GetChr,
    /// Pop a, push it as int
    ToInt,
    /// Pop a, push it as double
    ToDbl,
    /// Pop a, push it as string
    ToStr,

    // ===== Heap =====
    /// Push id of a new object with all fields nil [fields]
    Alloc,
    /// Pop id, remove the object
    Free,
    /// Pop value, pop id, set field [name]
    SetFld,
    /// Pop id, push field value [name]
    GetFld,

    // ===== Misc =====
    /// Push a copy of top
    Dup,
    /// Exchange the top two values
    Swap,
    /// No-op (landing pad)
    Nop,
}

impl Opcode {
    /// Operand this opcode requires
    pub fn operand_kind(self) -> OperandKind {
        match self {
            Opcode::Push => OperandKind::Value,
            Opcode::Load | Opcode::Store => OperandKind::Slot,
            Opcode::Jmp | Opcode::Jmpf => OperandKind::Address,
            Opcode::Call | Opcode::SetFld | Opcode::GetFld => OperandKind::Name,
            Opcode::Alloc => OperandKind::Fields,
            _ => OperandKind::None,
        }
    }

    /// Values popped from the operand stack (CALL and VRET are handled by the engine)
    pub fn pops(self) -> usize {
        match self {
            Opcode::Push | Opcode::Load | Opcode::Jmp | Opcode::Read | Opcode::Alloc => 0,
            Opcode::Nop | Opcode::Call => 0,
            Opcode::Pop
            | Opcode::Store
            | Opcode::Neg
            | Opcode::Not
            | Opcode::Jmpf
            | Opcode::Vret
            | Opcode::Write
            | Opcode::Len
            | Opcode::ToInt
            | Opcode::ToDbl
            | Opcode::ToStr
            | Opcode::Free
            | Opcode::GetFld
            | Opcode::Dup => 1,
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::And
            | Opcode::Or
            | Opcode::CmpLt
            | Opcode::CmpLe
            | Opcode::CmpGt
            | Opcode::CmpGe
            | Opcode::CmpEq
            | Opcode::CmpNe
            | Opcode::GetChr
            | Opcode::SetFld
            | Opcode::Swap => 2,
        }
    }

    /// Mnemonic used in dumps and traces
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Neg => "NEG",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Not => "NOT",
            Opcode::CmpLt => "CMPLT",
            Opcode::CmpLe => "CMPLE",
            Opcode::CmpGt => "CMPGT",
            Opcode::CmpGe => "CMPGE",
            Opcode::CmpEq => "CMPEQ",
            Opcode::CmpNe => "CMPNE",
            Opcode::Jmp => "JMP",
            Opcode::Jmpf => "JMPF",
            Opcode::Call => "CALL",
            Opcode::Vret => "VRET",
            Opcode::Write => "WRITE",
            Opcode::Read => "READ",
            Opcode::Len => "LEN",
            Opcode::GetChr => "GETCHR",
            Opcode::ToInt => "TOINT",
            Opcode::ToDbl => "TODBL",
            Opcode::ToStr => "TOSTR",
            Opcode::Alloc => "ALLOC",
            Opcode::Free => "FREE",
            Opcode::SetFld => "SETFLD",
            Opcode::GetFld => "GETFLD",
            Opcode::Dup => "DUP",
            Opcode::Swap => "SWAP",
            Opcode::Nop => "NOP",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_kinds() {
        assert_eq!(Opcode::Push.operand_kind(), OperandKind::Value);
        assert_eq!(Opcode::Store.operand_kind(), OperandKind::Slot);
        assert_eq!(Opcode::Jmpf.operand_kind(), OperandKind::Address);
        assert_eq!(Opcode::GetFld.operand_kind(), OperandKind::Name);
        assert_eq!(Opcode::Alloc.operand_kind(), OperandKind::Fields);
        assert_eq!(Opcode::Swap.operand_kind(), OperandKind::None);
    }

    #[test]
    fn test_binary_operators_pop_two() {
        for op in [Opcode::Add, Opcode::CmpLe, Opcode::And, Opcode::SetFld] {
            assert_eq!(op.pops(), 2, "{}", op);
        }
    }
}
