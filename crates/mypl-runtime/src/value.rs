//! Runtime value representation
//!
//! Every value on an operand stack, in a slot, or in a heap field is one of
//! seven tagged variants. Opcode handlers pattern-match on the tag.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Heap object identifier
pub type ObjectId = u64;

/// Runtime value
///
/// # Equality
///
/// Values of the same tag compare by content: strings by characters,
/// object references by id. `Nil == Nil`. Values of different tags are
/// never equal (`Int(1) != Double(1.0)`).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
    Bool(bool),
    Char(char),
    /// Immutable, shared string
    String(Arc<String>),
    /// Reference to a heap object
    ObjectRef(ObjectId),
    Nil,
}

impl Value {
    /// Create a string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(Arc::new(s.into()))
    }

    /// Tag name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::ObjectRef(_) => "object",
            Value::Nil => "nil",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl fmt::Display for Value {
    /// Canonical textual form, as printed by WRITE
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            // Debug keeps the fractional part (3.0 prints as "3.0"); 1e16 and
            // beyond use exponent form, non-finite values print inf/-inf/NaN
            Value::Double(d) => write!(f, "{:?}", d),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "{}", c),
            Value::String(s) => write!(f, "{}", s),
            Value::ObjectRef(id) => write!(f, "{}", id),
            Value::Nil => write!(f, "nil"),
        }
    }
}

/// Category of a runtime failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// Operand of the wrong dynamic type
    TypeMismatch,
    /// CALL names no blueprint
    UnknownFunction,
    /// Character index outside the string
    IndexOutOfRange,
    /// Malformed string-to-number conversion
    InvalidConversion,
    /// Field access or free through nil
    NilReference,
    /// Freed or never-allocated object id
    InvalidObject,
    /// Object has no field of that name
    UnknownField,
    /// Integer division or modulo by zero
    DivideByZero,
    /// Pop from an empty operand stack
    StackUnderflow,
    /// LOAD past the end of the slot list
    InvalidSlot,
    /// Operand missing or of the wrong kind for its opcode
    MalformedInstruction,
    /// Entry point function does not exist
    NoEntryPoint,
    /// Too many live activations
    CallDepthExceeded,
    /// No object ids left above the heap base
    HeapExhausted,
    /// Console read or write failed
    Io,
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimeErrorKind::TypeMismatch => "Type error",
            RuntimeErrorKind::UnknownFunction => "Unknown function",
            RuntimeErrorKind::IndexOutOfRange => "Index out of range",
            RuntimeErrorKind::InvalidConversion => "Invalid conversion",
            RuntimeErrorKind::NilReference => "Nil reference",
            RuntimeErrorKind::InvalidObject => "Invalid object",
            RuntimeErrorKind::UnknownField => "Unknown field",
            RuntimeErrorKind::DivideByZero => "Division by zero",
            RuntimeErrorKind::StackUnderflow => "Stack underflow",
            RuntimeErrorKind::InvalidSlot => "Invalid slot",
            RuntimeErrorKind::MalformedInstruction => "Malformed instruction",
            RuntimeErrorKind::NoEntryPoint => "No entry point",
            RuntimeErrorKind::CallDepthExceeded => "Call depth exceeded",
            RuntimeErrorKind::HeapExhausted => "Heap exhausted",
            RuntimeErrorKind::Io => "I/O error",
        };
        f.write_str(name)
    }
}

/// Where a runtime error happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLocation {
    /// Blueprint name
    pub function: String,
    /// Index of the failing instruction
    pub pc: usize,
    /// Rendered failing instruction
    pub instruction: String,
}

/// Runtime error
///
/// Fatal: the run stops at the first one. The engine fills in `location`
/// with the failing instruction before the error leaves `run()`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}{}", location_suffix(.location))]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
    pub location: Option<ErrorLocation>,
}

fn location_suffix(location: &Option<ErrorLocation>) -> String {
    match location {
        Some(loc) => format!(" (in {} at {}: {})", loc.function, loc.pc, loc.instruction),
        None => String::new(),
    }
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }

    /// Attach a location unless one is already set
    pub fn at(mut self, location: ErrorLocation) -> Self {
        if self.location.is_none() {
            self.location = Some(location);
        }
        self
    }

    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::TypeMismatch, msg)
    }

    pub fn stack_underflow() -> Self {
        Self::new(RuntimeErrorKind::StackUnderflow, "operand stack is empty")
    }

    pub fn io(err: std::io::Error) -> Self {
        Self::new(RuntimeErrorKind::Io, err.to_string())
    }
}
