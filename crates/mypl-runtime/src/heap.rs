//! Record object heap
//!
//! An arena indexed by `id - base`. Freed entries become tombstones and ids
//! are never handed out twice, so a stale reference is always detectable.
//! There is no reclamation: objects live until FREE.

use crate::value::{ObjectId, RuntimeError, RuntimeErrorKind, Value};
use std::fmt;

/// A live record instance: fields in allocation order
#[derive(Debug, Clone, PartialEq)]
pub struct HeapObject {
    fields: Vec<(String, Value)>,
}

impl HeapObject {
    fn new(field_names: &[String]) -> Self {
        Self {
            fields: field_names
                .iter()
                .map(|name| (name.clone(), Value::Nil))
                .collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Object table owned by one engine instance
#[derive(Debug, Clone)]
pub struct Heap {
    base: ObjectId,
    slots: Vec<Option<HeapObject>>,
}

impl Heap {
    /// Create a heap whose first object gets id `base`
    pub fn new(base: ObjectId) -> Self {
        Self {
            base,
            slots: Vec::new(),
        }
    }

    /// Allocate an object with every named field set to nil
    pub fn alloc(&mut self, field_names: &[String]) -> Result<ObjectId, RuntimeError> {
        let id = self
            .base
            .checked_add(self.slots.len() as ObjectId)
            .ok_or_else(|| {
                RuntimeError::new(
                    RuntimeErrorKind::HeapExhausted,
                    format!("no object ids left after {}", ObjectId::MAX),
                )
            })?;
        self.slots.push(Some(HeapObject::new(field_names)));
        Ok(id)
    }

    /// Remove an object; its id stays retired
    pub fn free(&mut self, id: ObjectId) -> Result<(), RuntimeError> {
        let slot = self.slot_mut(id)?;
        *slot = None;
        Ok(())
    }

    pub fn get_field(&self, id: ObjectId, field: &str) -> Result<Value, RuntimeError> {
        self.object(id)?
            .get(field)
            .cloned()
            .ok_or_else(|| unknown_field(id, field))
    }

    pub fn set_field(
        &mut self,
        id: ObjectId,
        field: &str,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let object = self
            .slot_mut(id)?
            .as_mut()
            .ok_or_else(|| freed(id))?;
        let slot = object.get_mut(field).ok_or_else(|| unknown_field(id, field))?;
        *slot = value;
        Ok(())
    }

    /// Look up a live object
    pub fn object(&self, id: ObjectId) -> Result<&HeapObject, RuntimeError> {
        match self.index(id).and_then(|idx| self.slots.get(idx)) {
            Some(Some(object)) => Ok(object),
            Some(None) => Err(freed(id)),
            None => Err(unknown(id)),
        }
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.object(id).is_ok()
    }

    /// Number of objects not yet freed
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Live objects in id order
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &HeapObject)> {
        let base = self.base;
        self.slots
            .iter()
            .enumerate()
            .filter_map(move |(idx, slot)| slot.as_ref().map(|obj| (base + idx as ObjectId, obj)))
    }

    fn index(&self, id: ObjectId) -> Option<usize> {
        id.checked_sub(self.base).map(|offset| offset as usize)
    }

    fn slot_mut(&mut self, id: ObjectId) -> Result<&mut Option<HeapObject>, RuntimeError> {
        let idx = self.index(id).ok_or_else(|| unknown(id))?;
        match self.slots.get_mut(idx) {
            Some(slot) if slot.is_some() => Ok(slot),
            Some(_) => Err(freed(id)),
            None => Err(unknown(id)),
        }
    }
}

impl fmt::Display for Heap {
    /// `{1111: {x: 1, next: nil}}`, live objects only
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (n, (id, object)) in self.iter().enumerate() {
            if n > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {{", id)?;
            for (m, (name, value)) in object.fields().enumerate() {
                if m > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}: {}", name, value)?;
            }
            f.write_str("}")?;
        }
        f.write_str("}")
    }
}

fn freed(id: ObjectId) -> RuntimeError {
    RuntimeError::new(
        RuntimeErrorKind::InvalidObject,
        format!("object {} has been freed", id),
    )
}

fn unknown(id: ObjectId) -> RuntimeError {
    RuntimeError::new(
        RuntimeErrorKind::InvalidObject,
        format!("no object with id {}", id),
    )
}

fn unknown_field(id: ObjectId, field: &str) -> RuntimeError {
    RuntimeError::new(
        RuntimeErrorKind::UnknownField,
        format!("object {} has no field '{}'", id, field),
    )
}
