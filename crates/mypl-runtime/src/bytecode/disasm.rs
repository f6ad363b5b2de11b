//! Bytecode disassembler
//!
//! Stable, human-readable dump used for diagnostics and golden tests.
//!
//! # Format
//! ```text
//! Frame 'add' (2 params)
//!   0: LOAD 0
//!   1: LOAD 1
//!   2: ADD
//!   3: VRET
//! ```

use super::{Blueprint, Bytecode};
use crate::value::Value;
use std::fmt::{self, Write};

/// Disassemble every blueprint, in generation order
pub fn disassemble(bytecode: &Bytecode) -> String {
    let mut output = String::new();
    for blueprint in bytecode.iter() {
        // Writing into a String cannot fail
        let _ = write!(output, "{}", blueprint);
    }
    output
}

impl fmt::Display for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = if self.param_count == 1 { "" } else { "s" };
        writeln!(
            f,
            "Frame '{}' ({} param{})",
            self.name, self.param_count, plural
        )?;
        for (idx, instruction) in self.instructions.iter().enumerate() {
            writeln!(f, "  {}: {}", idx, instruction)?;
        }
        Ok(())
    }
}

/// Render a literal operand: strings and chars quoted and escaped
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", escape(s, '"')),
        Value::Char(c) => format!("'{}'", escape(&c.to_string(), '\'')),
        other => other.to_string(),
    }
}

fn escape(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}
