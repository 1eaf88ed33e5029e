//! Interned value types.
//!
//! Every `Type` handle is owned by a `TypeRegistry`, which keeps at most one
//! live instance per structural key. Equality and hashing on `Type` are by
//! identity, which after interning is the same as structural equality.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use serde::{Serialize, Serializer};

use crate::error::ConstructionError;

/// Structural key of a type. Also the payload each handle points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Qubit,
    /// A qubit register, optionally of known size (> 1).
    Register { size: Option<u32> },
    /// Single-qubit unitary marker types.
    Gate1,
    Gate2,
    /// A controlled gate over `base` (gate1, gate2 or circuit).
    ControlledGate { controls: Option<u32>, base: Type },
    Circuit,

    // host builtins
    Index,
    Integer { width: u32 },
    Float { width: u32 },
}

impl TypeKind {
    /// Whether a type of this kind may be the base of a controlled gate.
    pub fn is_controllable(&self) -> bool {
        matches!(self, TypeKind::Gate1 | TypeKind::Gate2 | TypeKind::Circuit)
    }

    fn validate(&self) -> Result<(), ConstructionError> {
        match self {
            TypeKind::Register { size: Some(n) } if *n <= 1 => Err(ConstructionError::invariant(
                "register type",
                format!("size must be > 1, got {}", n),
            )),
            TypeKind::ControlledGate { controls: Some(0), .. } => Err(
                ConstructionError::invariant("controlled gate type", "control count must be > 0"),
            ),
            TypeKind::ControlledGate { base, .. } if !base.kind().is_controllable() => {
                Err(ConstructionError::invariant(
                    "controlled gate type",
                    format!("base type must be gate1, gate2 or circuit, got {}", base),
                ))
            }
            TypeKind::Integer { width } if !(1..=64).contains(width) => Err(
                ConstructionError::invariant("integer type", format!("width {} out of range", width)),
            ),
            TypeKind::Float { width } if !matches!(width, 16 | 32 | 64) => Err(
                ConstructionError::invariant("float type", format!("unsupported width {}", width)),
            ),
            _ => Ok(()),
        }
    }
}

/// Handle to an interned type.
#[derive(Clone)]
pub struct Type(Arc<TypeKind>);

impl Type {
    pub fn kind(&self) -> &TypeKind {
        &self.0
    }

    pub fn is_index(&self) -> bool {
        matches!(*self.0, TypeKind::Index)
    }

    pub fn is_register(&self) -> bool {
        matches!(*self.0, TypeKind::Register { .. })
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl std::fmt::Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Type({})", self)
    }
}

// types serialize as their canonical text
impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Append-only interner for `Type`s. Safe to share across threads.
#[derive(Default)]
pub struct TypeRegistry {
    types: DashMap<TypeKind, Type>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the unique handle for `kind`, creating it on first use.
    pub fn intern(&self, kind: TypeKind) -> Result<Type, ConstructionError> {
        if let Some(existing) = self.types.get(&kind) {
            return Ok(existing.clone());
        }
        kind.validate()?;
        let ty = match self.types.entry(kind) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(v) => {
                let ty = Type(Arc::new(v.key().clone()));
                debug!("interned type {}", ty);
                v.insert(ty.clone());
                ty
            }
        };
        Ok(ty)
    }

    pub fn qubit(&self) -> Type {
        self.builtin(TypeKind::Qubit)
    }

    pub fn register(&self, size: Option<u32>) -> Result<Type, ConstructionError> {
        self.intern(TypeKind::Register { size })
    }

    pub fn gate1(&self) -> Type {
        self.builtin(TypeKind::Gate1)
    }

    pub fn gate2(&self) -> Type {
        self.builtin(TypeKind::Gate2)
    }

    pub fn controlled_gate(
        &self,
        controls: Option<u32>,
        base: Type,
    ) -> Result<Type, ConstructionError> {
        self.intern(TypeKind::ControlledGate { controls, base })
    }

    pub fn circuit(&self) -> Type {
        self.builtin(TypeKind::Circuit)
    }

    pub fn index(&self) -> Type {
        self.builtin(TypeKind::Index)
    }

    pub fn integer(&self, width: u32) -> Result<Type, ConstructionError> {
        self.intern(TypeKind::Integer { width })
    }

    pub fn float(&self, width: u32) -> Result<Type, ConstructionError> {
        self.intern(TypeKind::Float { width })
    }

    /// Number of distinct types interned so far.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    // parameterless kinds cannot violate an invariant
    fn builtin(&self, kind: TypeKind) -> Type {
        let payload = kind.clone();
        let ty = self.types.entry(kind).or_insert_with(|| Type(Arc::new(payload)));
        ty.value().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn interning_is_idempotent() {
        let reg = TypeRegistry::new();
        assert_eq!(reg.qubit(), reg.qubit());
        assert_eq!(reg.register(Some(4)).unwrap(), reg.register(Some(4)).unwrap());
        assert_eq!(reg.register(None).unwrap(), reg.register(None).unwrap());
        assert_ne!(reg.register(Some(4)).unwrap(), reg.register(Some(5)).unwrap());
        assert_ne!(reg.register(None).unwrap(), reg.register(Some(2)).unwrap());

        let a = reg.controlled_gate(Some(2), reg.gate1()).unwrap();
        let b = reg.controlled_gate(Some(2), reg.gate1()).unwrap();
        let c = reg.controlled_gate(None, reg.gate1()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(reg.len(), 8);
    }

    #[test]
    fn register_size_must_exceed_one() {
        let reg = TypeRegistry::new();
        for bad in [0, 1] {
            let err = reg.register(Some(bad)).unwrap_err();
            assert!(matches!(err, ConstructionError::InvalidConstructionInvariant { .. }));
        }
        // nothing was interned for the failed attempts
        assert!(reg.is_empty());
    }

    #[test]
    fn controlled_gate_invariants() {
        let reg = TypeRegistry::new();
        assert!(reg.controlled_gate(Some(0), reg.gate1()).is_err());
        assert!(reg.controlled_gate(None, reg.qubit()).is_err());
        let reg4 = reg.register(Some(4)).unwrap();
        assert!(reg.controlled_gate(Some(1), reg4).is_err());
        assert!(reg.controlled_gate(Some(1), reg.circuit()).is_ok());
        assert!(reg.controlled_gate(Some(3), reg.gate2()).is_ok());
    }

    #[test]
    fn nested_controlled_gate_is_not_a_base() {
        let reg = TypeRegistry::new();
        let inner = reg.controlled_gate(Some(1), reg.gate1()).unwrap();
        assert!(reg.controlled_gate(Some(1), inner).is_err());
    }

    #[test]
    fn scalar_width_invariants() {
        let reg = TypeRegistry::new();
        assert!(reg.integer(1).is_ok());
        assert!(reg.integer(0).is_err());
        assert!(reg.integer(65).is_err());
        assert!(reg.float(64).is_ok());
        assert!(reg.float(8).is_err());
    }

    #[test]
    fn concurrent_interning_yields_one_instance() {
        let reg = TypeRegistry::new();
        let handles: Vec<Type> = (0..256u32)
            .into_par_iter()
            .map(|_| reg.controlled_gate(Some(3), reg.gate1()).unwrap())
            .collect();
        let first = &handles[0];
        assert!(handles.iter().all(|h| h == first));
        assert_eq!(reg.len(), 2);
    }
}
