// static metadata for every instruction kind the codec understands

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How an instruction's operands are laid out in text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpForm {
    /// `mnemonic operands [tags] [: types] [-> results]`
    #[default]
    Generic,
    /// Generic, preceded by a parenthesised angle occupying slot 0.
    Rotation,
    /// `mnemonic @callee(count, args...) [tags] [: types] -> result`
    Call,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Plain,
    /// May be followed by a `[start, length, stride]` accessor list.
    Register,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpKind {
    pub name: String,
    #[serde(default)]
    pub form: OpForm,
    #[serde(default)]
    pub slots: Vec<SlotKind>,
    /// Minimum number of operands in the generic operand list.
    #[serde(default)]
    pub required: usize,
}

impl OpKind {
    pub fn generic(name: &str, slots: &[SlotKind], required: usize) -> Self {
        OpKind {
            name: name.to_owned(),
            form: OpForm::Generic,
            slots: slots.to_vec(),
            required,
        }
    }

    /// A rotation gate; `slots` excludes the angle, which is prepended as slot 0.
    pub fn rotation(name: &str, slots: &[SlotKind], required: usize) -> Self {
        let mut all = vec![SlotKind::Plain];
        all.extend_from_slice(slots);
        OpKind {
            name: name.to_owned(),
            form: OpForm::Rotation,
            slots: all,
            required,
        }
    }

    pub fn call(name: &str) -> Self {
        OpKind {
            name: name.to_owned(),
            form: OpForm::Call,
            slots: Vec::new(),
            required: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |detail: &str| ConfigError::InvalidOp {
            name: self.name.clone(),
            detail: detail.to_owned(),
        };
        if self.name.is_empty() || !self.name.chars().all(|c| c.is_ascii_alphanumeric() || "_.$".contains(c)) {
            return Err(invalid("mnemonic must be a bare word"));
        }
        if !self.name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
            return Err(invalid("mnemonic must start with a letter or '_'"));
        }
        match self.form {
            OpForm::Call if !self.slots.is_empty() || self.required != 0 => {
                Err(invalid("call instructions take no slot map"))
            }
            OpForm::Rotation if self.slots.first() != Some(&SlotKind::Plain) => {
                Err(invalid("slot 0 of a rotation instruction must be plain"))
            }
            _ if self.required > self.operand_slots().len() => {
                Err(invalid("more required operands than slots"))
            }
            _ => Ok(()),
        }
    }

    /// Slots filled by the generic operand list (the rotation angle excluded).
    pub fn operand_slots(&self) -> &[SlotKind] {
        match self.form {
            OpForm::Rotation => self.slots.get(1..).unwrap_or(&[]),
            OpForm::Generic | OpForm::Call => &self.slots,
        }
    }

    /// Length of the segment-size array. One per slot, plus one per register
    /// slot for its accessor references. Calls have two: arguments, references.
    pub fn segment_count(&self) -> usize {
        match self.form {
            OpForm::Call => 2,
            OpForm::Generic | OpForm::Rotation => self
                .slots
                .iter()
                .map(|s| match s {
                    SlotKind::Plain => 1,
                    SlotKind::Register => 2,
                })
                .sum(),
        }
    }

    pub fn register_slot_count(&self) -> usize {
        self.slots.iter().filter(|s| **s == SlotKind::Register).count()
    }
}

/// Lookup table from mnemonic to kind metadata.
#[derive(Debug, Clone, Default)]
pub struct OpCatalog {
    ops: HashMap<String, Arc<OpKind>>,
}

impl OpCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in `q` dialect.
    pub fn quantum() -> Self {
        use SlotKind::{Plain, Register};

        let mut ops = Vec::new();
        for name in [
            "q.h", "q.x", "q.y", "q.z", "q.s", "q.sdg", "q.t", "q.tdg", "q.reset", "q.measure",
            "q.dealloc",
        ] {
            ops.push(OpKind::generic(name, &[Register], 1));
        }
        for name in ["q.cx", "q.cz", "q.swap"] {
            ops.push(OpKind::generic(name, &[Register, Register], 2));
        }
        for name in ["q.ccx", "q.cswap"] {
            ops.push(OpKind::generic(name, &[Register, Register, Register], 3));
        }
        for name in ["q.rx", "q.ry", "q.rz", "q.phase"] {
            ops.push(OpKind::rotation(name, &[Register], 1));
        }
        ops.push(OpKind::generic("q.alloc", &[], 0));
        ops.push(OpKind::generic("q.barrier", &[Register; 4], 1));
        // gate value, then the qubits it acts on
        ops.push(OpKind::generic("q.apply", &[Plain, Register], 2));
        ops.push(OpKind::generic("q.capply", &[Plain, Register, Register], 3));
        ops.push(OpKind::generic("q.control", &[Plain], 1));
        ops.push(OpKind::call("q.call"));

        let mut catalog = OpCatalog::new();
        for op in ops {
            catalog.ops.insert(op.name.clone(), Arc::new(op));
        }
        catalog
    }

    pub fn insert(&mut self, op: OpKind) -> Result<Arc<OpKind>, ConfigError> {
        op.validate()?;
        if self.ops.contains_key(&op.name) {
            return Err(ConfigError::DuplicateOp { name: op.name });
        }
        let op = Arc::new(op);
        self.ops.insert(op.name.clone(), Arc::clone(&op));
        Ok(op)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<OpKind>> {
        self.ops.get(name)
    }

    /// All kinds, sorted by mnemonic.
    pub fn kinds(&self) -> Vec<&Arc<OpKind>> {
        let mut kinds: Vec<_> = self.ops.values().collect();
        kinds.sort_by(|a, b| a.name.cmp(&b.name));
        kinds
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
