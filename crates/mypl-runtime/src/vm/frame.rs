//! Activation records

use crate::bytecode::Blueprint;
use crate::value::{RuntimeError, RuntimeErrorKind, Value};
use std::sync::Arc;

/// One live invocation of a blueprint
///
/// Each call creates a fresh activation with:
/// - its own slot list (arguments in slots 0..k-1, grown on demand by STORE)
/// - its own operand stack
/// - a program counter starting at 0
///
/// Nothing in an activation is shared with any other call.
#[derive(Debug, Clone)]
pub struct Activation {
    /// Blueprint being executed
    pub blueprint: Arc<Blueprint>,
    /// Local slots
    pub slots: Vec<Value>,
    /// Operand stack
    pub stack: Vec<Value>,
    /// Index of the next instruction
    pub pc: usize,
}

impl Activation {
    /// Activation with the given arguments already in place
    pub fn new(blueprint: Arc<Blueprint>, args: Vec<Value>) -> Self {
        Self {
            blueprint,
            slots: args,
            stack: Vec::new(),
            pc: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.blueprint.name
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or_else(RuntimeError::stack_underflow)
    }

    pub fn peek(&self) -> Result<&Value, RuntimeError> {
        self.stack.last().ok_or_else(RuntimeError::stack_underflow)
    }

    /// Remove the top `count` values, keeping their push order
    pub fn pop_n(&mut self, count: usize) -> Result<Vec<Value>, RuntimeError> {
        if self.stack.len() < count {
            return Err(RuntimeError::stack_underflow());
        }
        let at = self.stack.len() - count;
        Ok(self.stack.split_off(at))
    }

    pub fn load(&self, slot: usize) -> Result<Value, RuntimeError> {
        self.slots.get(slot).cloned().ok_or_else(|| {
            RuntimeError::new(
                RuntimeErrorKind::InvalidSlot,
                format!("slot {} is beyond the {} allocated slots", slot, self.slots.len()),
            )
        })
    }

    /// Write a slot, padding any gap with nil
    pub fn store(&mut self, slot: usize, value: Value) {
        if slot >= self.slots.len() {
            self.slots.resize(slot + 1, Value::Nil);
        }
        self.slots[slot] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activation() -> Activation {
        Activation::new(Arc::new(Blueprint::new("f", 2)), vec![Value::Int(1), Value::Int(2)])
    }

    #[test]
    fn test_arguments_fill_leading_slots() {
        let frame = activation();
        assert_eq!(frame.load(0).unwrap(), Value::Int(1));
        assert_eq!(frame.load(1).unwrap(), Value::Int(2));
        assert_eq!(frame.load(2).unwrap_err().kind, RuntimeErrorKind::InvalidSlot);
    }

    #[test]
    fn test_store_grows_slots() {
        let mut frame = activation();
        frame.store(4, Value::Bool(true));
        assert_eq!(frame.slots.len(), 5);
        assert_eq!(frame.load(3).unwrap(), Value::Nil);
        assert_eq!(frame.load(4).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_pop_n_keeps_order() {
        let mut frame = activation();
        frame.push(Value::Int(6));
        frame.push(Value::Int(4));
        frame.push(Value::Int(2));
        assert_eq!(
            frame.pop_n(2).unwrap(),
            vec![Value::Int(4), Value::Int(2)]
        );
        assert_eq!(frame.stack, vec![Value::Int(6)]);
        assert!(frame.pop_n(3).is_err());
    }

    #[test]
    fn test_pop_empty_underflows() {
        let mut frame = activation();
        assert_eq!(frame.pop().unwrap_err().kind, RuntimeErrorKind::StackUnderflow);
    }
}
