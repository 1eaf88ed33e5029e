//! Instruction records and the operand bookkeeping shared by the parser and
//! the builders.
//!
//! A record stores its operands flat. For a generic instruction the physical
//! order is: the rotation reference (if any), then for each logical slot its
//! main operand followed by that slot's accessor references. Segment sizes
//! (tag `operand_segment_sizes`) give the length of each of those runs, so the
//! logical grouping can always be recovered. Call instructions put every
//! argument first and every accessor reference after them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::asm::lexer::{is_bare_word, is_sigil_name};
use crate::error::{ConstructionError, PrintError};
use crate::ir::catalog::{OpForm, OpKind, SlotKind};
use crate::ir::types::{Type, TypeRegistry};

pub const SEGMENT_SIZES: &str = "operand_segment_sizes";
pub const ROTATION_ANGLE: &str = "phi";
pub const CALLEE: &str = "callee";
pub const CALL_COUNT: &str = "count";
pub const CALL_ACCESSORS: &str = "accessors";
const ACCESSOR_PREFIX: &str = "accessors_";

/// Longest accessor list: `[start, length, stride]`.
pub const MAX_ACCESSOR_ELEMS: usize = 3;

/// Name of the accessor tag for the `k`-th register slot of a generic instruction.
pub fn accessor_tag_name(k: usize) -> String {
    format!("{}{}", ACCESSOR_PREFIX, k)
}

/// Whether `name` is one of the structural tag names the codec owns.
pub fn is_reserved_tag(name: &str) -> bool {
    if matches!(name, SEGMENT_SIZES | ROTATION_ANGLE | CALLEE | CALL_COUNT | CALL_ACCESSORS) {
        return true;
    }
    name.strip_prefix(ACCESSOR_PREFIX)
        .is_some_and(|k| !k.is_empty() && k.bytes().all(|b| b.is_ascii_digit()))
}

/// Name of an SSA value owned by the host IR.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueRef(String);

impl ValueRef {
    pub fn new(name: impl Into<String>) -> Self {
        ValueRef(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ValueRef {
    fn from(name: &str) -> Self {
        ValueRef::new(name)
    }
}

impl std::fmt::Display for ValueRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl Serialize for ValueRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One recorded component of a slice accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessorElem {
    Constant(i64),
    /// Stands for the next accessor reference operand.
    Dynamic,
}

/// Accessor component as supplied to the builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accessor {
    Const(i64),
    Value(ValueRef),
}

/// A parsed accessor list: the recorded elements plus the references behind
/// the `Dynamic` ones, in textual order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessorList {
    pub elems: Vec<AccessorElem>,
    pub refs: Vec<ValueRef>,
}

impl AccessorList {
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    fn from_builder(accessors: &[Accessor]) -> Result<Self, ConstructionError> {
        if accessors.len() > MAX_ACCESSOR_ELEMS {
            return Err(ConstructionError::invariant(
                "accessor list",
                format!("at most {} elements, got {}", MAX_ACCESSOR_ELEMS, accessors.len()),
            ));
        }
        let mut list = AccessorList::default();
        for a in accessors {
            match a {
                Accessor::Const(n) => list.elems.push(AccessorElem::Constant(*n)),
                Accessor::Value(v) => {
                    check_value(v)?;
                    list.elems.push(AccessorElem::Dynamic);
                    list.refs.push(v.clone());
                }
            }
        }
        Ok(list)
    }
}

/// A named tag value. The last three variants only appear under reserved names.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Symbol(String),
    Array(Vec<Tag>),
    Segments(Vec<u32>),
    Accessors(Vec<AccessorElem>),
    AccessorLists(Vec<Vec<AccessorElem>>),
}

/// Name-sorted tag dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TagDict(BTreeMap<String, Tag>);

impl TagDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.0.get(name)
    }

    /// Inserts a tag, returning the previous value under that name.
    pub fn insert(&mut self, name: impl Into<String>, tag: Tag) -> Option<Tag> {
        self.0.insert(name.into(), tag)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Tags not consumed by structural printing.
    pub fn user_tags(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.iter().filter(|(k, _)| !is_reserved_tag(k))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The rotation parameter of a rotation instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RotationParam<'a> {
    Literal(f64),
    Value(&'a ValueRef),
}

/// Operands of one logical slot, regrouped from the flat operand list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotOperands<'a> {
    pub main: Option<&'a ValueRef>,
    pub accessors: &'a [ValueRef],
}

/// One argument of a call instruction with its accessor references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallArg<'a> {
    pub value: &'a ValueRef,
    pub accessors: &'a [AccessorElem],
    pub refs: &'a [ValueRef],
}

/// An instruction record. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct Instruction {
    #[serde(rename = "op", serialize_with = "serialize_kind")]
    kind: Arc<OpKind>,
    operands: Vec<ValueRef>,
    operand_types: Vec<Type>,
    tags: TagDict,
    results: Vec<Type>,
}

fn serialize_kind<S: Serializer>(kind: &Arc<OpKind>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&kind.name)
}

impl Instruction {
    /// Assembles a record from raw parts. Nothing is checked here; the printer
    /// reports records whose tags and operands disagree.
    pub fn from_parts(
        kind: Arc<OpKind>,
        operands: Vec<ValueRef>,
        operand_types: Vec<Type>,
        tags: TagDict,
        results: Vec<Type>,
    ) -> Self {
        Instruction {
            kind,
            operands,
            operand_types,
            tags,
            results,
        }
    }

    pub fn kind(&self) -> &Arc<OpKind> {
        &self.kind
    }

    pub fn mnemonic(&self) -> &str {
        &self.kind.name
    }

    pub fn operands(&self) -> &[ValueRef] {
        &self.operands
    }

    pub fn operand_types(&self) -> &[Type] {
        &self.operand_types
    }

    pub fn tags(&self) -> &TagDict {
        &self.tags
    }

    pub fn results(&self) -> &[Type] {
        &self.results
    }

    pub fn segments(&self) -> Result<&[u32], PrintError> {
        match self.tags.get(SEGMENT_SIZES) {
            Some(Tag::Segments(s)) => Ok(s),
            Some(_) => Err(self.wrong_tag(SEGMENT_SIZES)),
            None => Err(self.missing_tag(SEGMENT_SIZES)),
        }
    }

    /// Recorded accessor elements of the `k`-th register slot.
    pub fn accessors(&self, k: usize) -> Result<&[AccessorElem], PrintError> {
        let name = accessor_tag_name(k);
        match self.tags.get(&name) {
            Some(Tag::Accessors(a)) => Ok(a),
            Some(_) => Err(self.wrong_tag(&name)),
            None => Err(self.missing_tag(&name)),
        }
    }

    pub fn rotation(&self) -> Option<RotationParam<'_>> {
        if self.kind.form != OpForm::Rotation {
            return None;
        }
        if let Some(Tag::Float(angle)) = self.tags.get(ROTATION_ANGLE) {
            return Some(RotationParam::Literal(*angle));
        }
        match self.segments() {
            Ok([1, ..]) => self.operands.first().map(RotationParam::Value),
            _ => None,
        }
    }

    pub fn callee(&self) -> Option<&str> {
        match self.tags.get(CALLEE) {
            Some(Tag::Symbol(s)) => Some(s),
            _ => None,
        }
    }

    /// Regroups the physical operands of a generic or rotation instruction
    /// into one entry per logical slot (the rotation angle slot included).
    pub fn slot_groups(&self) -> Result<Vec<SlotOperands<'_>>, PrintError> {
        let segments = self.segments()?;
        if segments.len() != self.kind.segment_count() {
            return Err(self.wrong_tag(SEGMENT_SIZES));
        }
        let underflow = || PrintError::OperandUnderflow {
            mnemonic: self.kind.name.clone(),
        };
        let mut groups = Vec::with_capacity(self.kind.slots.len());
        let mut seg = segments.iter().map(|&n| n as usize);
        let mut rest = self.operands.as_slice();
        for slot in &self.kind.slots {
            let main = take_run(&mut rest, seg.next().unwrap_or(0))
                .ok_or_else(underflow)?
                .first();
            let accessors = match slot {
                SlotKind::Register => {
                    take_run(&mut rest, seg.next().unwrap_or(0)).ok_or_else(underflow)?
                }
                SlotKind::Plain => &[],
            };
            groups.push(SlotOperands { main, accessors });
        }
        if !rest.is_empty() {
            return Err(PrintError::OperandOverflow {
                mnemonic: self.kind.name.clone(),
                extra: rest.len(),
            });
        }
        Ok(groups)
    }

    /// Pairs each call argument with its accessor list and references.
    pub fn call_groups(&self) -> Result<Vec<CallArg<'_>>, PrintError> {
        let (num_args, num_refs) = match self.segments()? {
            [a, r] => (*a as usize, *r as usize),
            _ => return Err(self.wrong_tag(SEGMENT_SIZES)),
        };
        let lists = match self.tags.get(CALL_ACCESSORS) {
            Some(Tag::AccessorLists(l)) if l.len() == num_args => l,
            Some(_) => return Err(self.wrong_tag(CALL_ACCESSORS)),
            None => return Err(self.missing_tag(CALL_ACCESSORS)),
        };
        if num_args + num_refs != self.operands.len() {
            return Err(self.wrong_tag(SEGMENT_SIZES));
        }
        let (args, mut refs) = self.operands.split_at(num_args);
        let mut out = Vec::with_capacity(num_args);
        for (value, list) in args.iter().zip(lists) {
            let dynamic = list.iter().filter(|e| **e == AccessorElem::Dynamic).count();
            if dynamic > refs.len() {
                return Err(PrintError::OperandUnderflow {
                    mnemonic: self.kind.name.clone(),
                });
            }
            let (mine, rest) = refs.split_at(dynamic);
            refs = rest;
            out.push(CallArg {
                value,
                accessors: list,
                refs: mine,
            });
        }
        if !refs.is_empty() {
            return Err(PrintError::OperandOverflow {
                mnemonic: self.kind.name.clone(),
                extra: refs.len(),
            });
        }
        Ok(out)
    }

    fn missing_tag(&self, name: &str) -> PrintError {
        PrintError::MissingTag {
            mnemonic: self.kind.name.clone(),
            name: name.to_owned(),
        }
    }

    fn wrong_tag(&self, name: &str) -> PrintError {
        PrintError::WrongTagKind {
            mnemonic: self.kind.name.clone(),
            name: name.to_owned(),
        }
    }
}

fn take_run<'a>(rest: &mut &'a [ValueRef], n: usize) -> Option<&'a [ValueRef]> {
    if rest.len() < n {
        return None;
    }
    let (run, tail) = rest.split_at(n);
    *rest = tail;
    Some(run)
}

// --- operand accumulators ---

/// Slot-by-slot accumulator for generic and rotation instructions.
pub(crate) struct OperandGroup {
    kind: Arc<OpKind>,
    operands: Vec<ValueRef>,
    // accessor references are pinned to `index` and absent from the type list
    pinned: Vec<bool>,
    segments: Vec<u32>,
    accessors: Vec<Vec<AccessorElem>>,
    angle: Option<f64>,
    slot: usize,
    segment: usize,
    register: usize,
}

impl OperandGroup {
    pub(crate) fn new(kind: Arc<OpKind>) -> Self {
        let segments = vec![0; kind.segment_count()];
        let accessors = vec![Vec::new(); kind.register_slot_count()];
        let slot = match kind.form {
            OpForm::Rotation => 1,
            OpForm::Generic | OpForm::Call => 0,
        };
        OperandGroup {
            kind,
            operands: Vec::new(),
            pinned: Vec::new(),
            segments,
            accessors,
            angle: None,
            slot,
            segment: slot,
            register: 0,
        }
    }

    pub(crate) fn set_angle(&mut self, angle: f64) {
        self.angle = Some(angle);
    }

    /// Must be called before any operand is pushed.
    pub(crate) fn set_angle_value(&mut self, value: ValueRef) {
        debug_assert!(self.operands.is_empty());
        self.operands.push(value);
        self.pinned.push(false);
        self.segments[0] = 1;
    }

    /// Kind of the slot the next operand fills, or `None` when all are taken.
    pub(crate) fn next_slot(&self) -> Option<SlotKind> {
        self.kind.slots.get(self.slot).copied()
    }

    /// Number of operands pushed through the generic operand list.
    pub(crate) fn operand_count(&self) -> usize {
        let first = match self.kind.form {
            OpForm::Rotation => 1,
            OpForm::Generic | OpForm::Call => 0,
        };
        self.slot - first
    }

    pub(crate) fn push(&mut self, value: ValueRef, list: AccessorList) -> Result<(), ConstructionError> {
        let Some(slot) = self.next_slot() else {
            return Err(ConstructionError::TooManyOperands {
                mnemonic: self.kind.name.clone(),
                max: self.kind.operand_slots().len(),
            });
        };
        self.operands.push(value);
        self.pinned.push(false);
        self.segments[self.segment] = 1;
        self.segment += 1;
        self.slot += 1;

        match slot {
            SlotKind::Register => {
                self.segments[self.segment] = list.refs.len() as u32;
                self.segment += 1;
                self.pinned.extend(std::iter::repeat(true).take(list.refs.len()));
                self.operands.extend(list.refs);
                self.accessors[self.register] = list.elems;
                self.register += 1;
                Ok(())
            }
            SlotKind::Plain if list.is_empty() => Ok(()),
            SlotKind::Plain => Err(ConstructionError::invariant(
                "operand",
                format!("slot {} of '{}' does not take accessors", self.slot - 1, self.kind.name),
            )),
        }
    }

    /// Number of operands whose type must come from the type list.
    pub(crate) fn typed_count(&self) -> usize {
        self.pinned.iter().filter(|p| !**p).count()
    }

    pub(crate) fn finish(
        self,
        types: Vec<Type>,
        index: &Type,
        mut tags: TagDict,
        results: Vec<Type>,
    ) -> Result<Instruction, ConstructionError> {
        let operand_types = merge_types(&self.pinned, types, index)?;
        tags.insert(SEGMENT_SIZES, Tag::Segments(self.segments));
        for (k, elems) in self.accessors.into_iter().enumerate() {
            tags.insert(accessor_tag_name(k), Tag::Accessors(elems));
        }
        if let Some(angle) = self.angle {
            tags.insert(ROTATION_ANGLE, Tag::Float(angle));
        }
        Ok(Instruction::from_parts(
            self.kind,
            self.operands,
            operand_types,
            tags,
            results,
        ))
    }
}

/// Accumulator for call instructions.
#[derive(Default)]
pub(crate) struct CallGroup {
    args: Vec<ValueRef>,
    refs: Vec<ValueRef>,
    lists: Vec<Vec<AccessorElem>>,
}

impl CallGroup {
    pub(crate) fn push(&mut self, value: ValueRef, list: AccessorList) {
        self.args.push(value);
        self.refs.extend(list.refs);
        self.lists.push(list.elems);
    }

    pub(crate) fn arg_count(&self) -> usize {
        self.args.len()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn finish(
        self,
        kind: Arc<OpKind>,
        callee: String,
        count: i64,
        arg_types: Vec<Type>,
        index: &Type,
        mut tags: TagDict,
        result: Type,
    ) -> Result<Instruction, ConstructionError> {
        let num_refs = self.refs.len();
        let mut pinned = vec![false; self.args.len()];
        pinned.extend(std::iter::repeat(true).take(num_refs));
        let operand_types = merge_types(&pinned, arg_types, index)?;

        tags.insert(CALLEE, Tag::Symbol(callee));
        tags.insert(CALL_COUNT, Tag::Int(count));
        tags.insert(CALL_ACCESSORS, Tag::AccessorLists(self.lists));
        tags.insert(
            SEGMENT_SIZES,
            Tag::Segments(vec![self.args.len() as u32, num_refs as u32]),
        );
        let mut operands = self.args;
        operands.extend(self.refs);
        Ok(Instruction::from_parts(
            kind,
            operands,
            operand_types,
            tags,
            vec![result],
        ))
    }
}

fn merge_types(pinned: &[bool], types: Vec<Type>, index: &Type) -> Result<Vec<Type>, ConstructionError> {
    let expected = pinned.iter().filter(|p| !**p).count();
    if types.len() != expected {
        return Err(ConstructionError::invariant(
            "operand types",
            format!("expected {} types, got {}", expected, types.len()),
        ));
    }
    let mut given = types.into_iter();
    Ok(pinned
        .iter()
        .map(|&p| match p {
            true => index.clone(),
            false => given.next().unwrap_or_else(|| index.clone()),
        })
        .collect())
}

// --- builders ---

enum AngleArg {
    Literal(f64),
    Value(ValueRef, Type),
}

/// Builds generic and rotation instructions without going through text.
pub struct InstructionBuilder<'r> {
    kind: Arc<OpKind>,
    registry: &'r TypeRegistry,
    angle: Option<AngleArg>,
    operands: Vec<(ValueRef, Type, Vec<Accessor>)>,
    tags: Vec<(String, Tag)>,
    results: Vec<Type>,
}

impl<'r> InstructionBuilder<'r> {
    pub fn new(kind: Arc<OpKind>, registry: &'r TypeRegistry) -> Self {
        InstructionBuilder {
            kind,
            registry,
            angle: None,
            operands: Vec::new(),
            tags: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn angle(mut self, angle: f64) -> Self {
        self.angle = Some(AngleArg::Literal(angle));
        self
    }

    pub fn angle_value(mut self, value: impl Into<ValueRef>, ty: Type) -> Self {
        self.angle = Some(AngleArg::Value(value.into(), ty));
        self
    }

    pub fn operand(self, value: impl Into<ValueRef>, ty: Type) -> Self {
        self.register_operand(value, ty, &[])
    }

    pub fn register_operand(mut self, value: impl Into<ValueRef>, ty: Type, accessors: &[Accessor]) -> Self {
        self.operands.push((value.into(), ty, accessors.to_vec()));
        self
    }

    pub fn tag(mut self, name: &str, tag: Tag) -> Self {
        self.tags.push((name.to_owned(), tag));
        self
    }

    pub fn result(mut self, ty: Type) -> Self {
        self.results.push(ty);
        self
    }

    pub fn build(self) -> Result<Instruction, ConstructionError> {
        let kind = self.kind;
        check_kind(&kind)?;
        let mut group = OperandGroup::new(Arc::clone(&kind));
        let mut types = Vec::new();

        match (kind.form, self.angle) {
            (OpForm::Call, _) => {
                return Err(ConstructionError::WrongForm {
                    mnemonic: kind.name.clone(),
                    expected: "generic",
                })
            }
            (OpForm::Rotation, Some(AngleArg::Literal(angle))) => {
                check_float("rotation angle", angle)?;
                group.set_angle(angle);
            }
            (OpForm::Rotation, Some(AngleArg::Value(value, ty))) => {
                check_value(&value)?;
                group.set_angle_value(value);
                types.push(ty);
            }
            (OpForm::Rotation, None) => {
                return Err(ConstructionError::invariant(
                    "rotation instruction",
                    format!("'{}' needs an angle", kind.name),
                ))
            }
            (OpForm::Generic, Some(_)) => {
                return Err(ConstructionError::WrongForm {
                    mnemonic: kind.name.clone(),
                    expected: "rotation",
                })
            }
            (OpForm::Generic, None) => {}
        }

        let count = self.operands.len();
        for (value, ty, accessors) in self.operands {
            check_value(&value)?;
            group.push(value, AccessorList::from_builder(&accessors)?)?;
            types.push(ty);
        }
        if count < kind.required {
            return Err(ConstructionError::invariant(
                "operand list",
                format!("'{}' needs at least {} operands, got {}", kind.name, kind.required, count),
            ));
        }

        let tags = user_tags(self.tags)?;
        group.finish(types, &self.registry.index(), tags, self.results)
    }
}

/// Builds call instructions without going through text.
pub struct CallBuilder<'r> {
    kind: Arc<OpKind>,
    registry: &'r TypeRegistry,
    callee: String,
    count: i64,
    args: Vec<(ValueRef, Type, Vec<Accessor>)>,
    tags: Vec<(String, Tag)>,
    result: Option<Type>,
}

impl<'r> CallBuilder<'r> {
    pub fn new(kind: Arc<OpKind>, registry: &'r TypeRegistry, callee: &str, count: i64) -> Self {
        CallBuilder {
            kind,
            registry,
            callee: callee.to_owned(),
            count,
            args: Vec::new(),
            tags: Vec::new(),
            result: None,
        }
    }

    pub fn arg(mut self, value: impl Into<ValueRef>, ty: Type, accessors: &[Accessor]) -> Self {
        self.args.push((value.into(), ty, accessors.to_vec()));
        self
    }

    pub fn tag(mut self, name: &str, tag: Tag) -> Self {
        self.tags.push((name.to_owned(), tag));
        self
    }

    pub fn result(mut self, ty: Type) -> Self {
        self.result = Some(ty);
        self
    }

    pub fn build(self) -> Result<Instruction, ConstructionError> {
        check_kind(&self.kind)?;
        if self.kind.form != OpForm::Call {
            return Err(ConstructionError::WrongForm {
                mnemonic: self.kind.name.clone(),
                expected: "call",
            });
        }
        let Some(result) = self.result else {
            return Err(ConstructionError::invariant(
                "call instruction",
                format!("'{}' needs a result type", self.kind.name),
            ));
        };
        if !is_sigil_name(&self.callee) {
            return Err(ConstructionError::invariant(
                "callee",
                format!("'{}' is not a symbol name", self.callee),
            ));
        }
        let mut group = CallGroup::default();
        let mut types = Vec::with_capacity(self.args.len());
        for (value, ty, accessors) in self.args {
            check_value(&value)?;
            group.push(value, AccessorList::from_builder(&accessors)?);
            types.push(ty);
        }
        let tags = user_tags(self.tags)?;
        group.finish(
            self.kind,
            self.callee,
            self.count,
            types,
            &self.registry.index(),
            tags,
            result,
        )
    }
}

fn user_tags(tags: Vec<(String, Tag)>) -> Result<TagDict, ConstructionError> {
    let mut dict = TagDict::new();
    for (name, tag) in tags {
        if !is_bare_word(&name) {
            return Err(ConstructionError::invariant(
                "tag",
                format!("'{}' is not a bare word", name),
            ));
        }
        if is_reserved_tag(&name) {
            return Err(ConstructionError::invariant(
                "tag",
                format!("'{}' is reserved", name),
            ));
        }
        check_tag_value(&tag)?;
        if dict.insert(name.clone(), tag).is_some() {
            return Err(ConstructionError::invariant(
                "tag",
                format!("'{}' given twice", name),
            ));
        }
    }
    Ok(dict)
}

fn check_kind(kind: &OpKind) -> Result<(), ConstructionError> {
    kind.validate()
        .map_err(|err| ConstructionError::invariant("instruction kind", err.to_string()))
}

fn check_value(value: &ValueRef) -> Result<(), ConstructionError> {
    if is_sigil_name(value.name()) {
        return Ok(());
    }
    Err(ConstructionError::invariant(
        "value name",
        format!("'{}' cannot follow '%'", value.name()),
    ))
}

// NaN and the infinities have no literal form
fn check_float(what: &'static str, x: f64) -> Result<(), ConstructionError> {
    if x.is_finite() {
        return Ok(());
    }
    Err(ConstructionError::invariant(what, format!("{:?} is not finite", x)))
}

fn check_tag_value(tag: &Tag) -> Result<(), ConstructionError> {
    match tag {
        Tag::Float(x) => check_float("tag value", *x),
        Tag::Symbol(s) if !is_sigil_name(s) => Err(ConstructionError::invariant(
            "tag value",
            format!("'{}' is not a symbol name", s),
        )),
        Tag::Array(items) => items.iter().try_for_each(check_tag_value),
        Tag::Segments(_) | Tag::Accessors(_) | Tag::AccessorLists(_) => Err(
            ConstructionError::invariant("tag value", "structural payloads are reserved"),
        ),
        Tag::Unit | Tag::Bool(_) | Tag::Int(_) | Tag::Str(_) | Tag::Symbol(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::catalog::OpCatalog;

    #[test]
    fn reserved_names() {
        assert!(is_reserved_tag("operand_segment_sizes"));
        assert!(is_reserved_tag("accessors_0"));
        assert!(is_reserved_tag("accessors_12"));
        assert!(is_reserved_tag("accessors"));
        assert!(!is_reserved_tag("accessors_"));
        assert!(!is_reserved_tag("accessors_x"));
        assert!(!is_reserved_tag("label"));
    }

    #[test]
    fn builder_records_segments_and_accessors() {
        let reg = TypeRegistry::new();
        let catalog = OpCatalog::quantum();
        let r4 = reg.register(Some(4)).unwrap();
        let instr = InstructionBuilder::new(catalog.get("q.cx").unwrap().clone(), &reg)
            .register_operand(
                "r",
                r4.clone(),
                &[Accessor::Const(0), Accessor::Value("n".into()), Accessor::Const(1)],
            )
            .operand("b", reg.qubit())
            .build()
            .unwrap();

        let names: Vec<_> = instr.operands().iter().map(|v| v.name()).collect();
        assert_eq!(names, ["r", "n", "b"]);
        assert_eq!(instr.segments().unwrap(), &[1, 1, 1, 0]);
        assert_eq!(
            instr.accessors(0).unwrap(),
            &[AccessorElem::Constant(0), AccessorElem::Dynamic, AccessorElem::Constant(1)]
        );
        assert!(instr.accessors(1).unwrap().is_empty());
        assert_eq!(instr.operand_types(), &[r4, reg.index(), reg.qubit()]);

        let groups = instr.slot_groups().unwrap();
        assert_eq!(groups[0].main.unwrap().name(), "r");
        assert_eq!(groups[0].accessors.len(), 1);
        assert_eq!(groups[1].main.unwrap().name(), "b");
        assert!(groups[1].accessors.is_empty());
    }

    #[test]
    fn builder_rejects_too_many_operands() {
        let reg = TypeRegistry::new();
        let catalog = OpCatalog::quantum();
        let err = InstructionBuilder::new(catalog.get("q.h").unwrap().clone(), &reg)
            .operand("a", reg.qubit())
            .operand("b", reg.qubit())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConstructionError::TooManyOperands { max: 1, .. }));
    }

    #[test]
    fn builder_rejects_accessors_on_plain_slot() {
        let reg = TypeRegistry::new();
        let catalog = OpCatalog::quantum();
        let err = InstructionBuilder::new(catalog.get("q.apply").unwrap().clone(), &reg)
            .register_operand("g", reg.gate1(), &[Accessor::Const(0)])
            .operand("q", reg.qubit())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidConstructionInvariant { .. }));
    }

    #[test]
    fn rotation_value_takes_first_segment() {
        let reg = TypeRegistry::new();
        let catalog = OpCatalog::quantum();
        let f64_ty = reg.float(64).unwrap();
        let instr = InstructionBuilder::new(catalog.get("q.rz").unwrap().clone(), &reg)
            .angle_value("theta", f64_ty.clone())
            .operand("q", reg.qubit())
            .build()
            .unwrap();
        assert_eq!(instr.segments().unwrap(), &[1, 1, 0]);
        assert_eq!(instr.rotation(), Some(RotationParam::Value(&ValueRef::new("theta"))));
        assert_eq!(instr.operand_types()[0], f64_ty);
    }

    #[test]
    fn rotation_without_angle_is_rejected() {
        let reg = TypeRegistry::new();
        let catalog = OpCatalog::quantum();
        let err = InstructionBuilder::new(catalog.get("q.rx").unwrap().clone(), &reg)
            .operand("q", reg.qubit())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidConstructionInvariant { .. }));
    }

    #[test]
    fn call_refs_follow_all_args() {
        let reg = TypeRegistry::new();
        let catalog = OpCatalog::quantum();
        let r4 = reg.register(Some(4)).unwrap();
        let instr = CallBuilder::new(catalog.get("q.call").unwrap().clone(), &reg, "body", 2)
            .arg("a", r4.clone(), &[Accessor::Value("i".into())])
            .arg("b", r4.clone(), &[Accessor::Const(1), Accessor::Value("j".into())])
            .result(reg.circuit())
            .build()
            .unwrap();
        let names: Vec<_> = instr.operands().iter().map(|v| v.name()).collect();
        assert_eq!(names, ["a", "b", "i", "j"]);
        assert_eq!(instr.segments().unwrap(), &[2, 2]);
        assert_eq!(instr.callee(), Some("body"));

        let args = instr.call_groups().unwrap();
        assert_eq!(args[0].refs, &[ValueRef::new("i")]);
        assert_eq!(args[1].refs, &[ValueRef::new("j")]);
    }

    #[test]
    fn reserved_user_tag_is_rejected() {
        let reg = TypeRegistry::new();
        let catalog = OpCatalog::quantum();
        let err = InstructionBuilder::new(catalog.get("q.h").unwrap().clone(), &reg)
            .operand("q", reg.qubit())
            .tag("accessors_0", Tag::Unit)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidConstructionInvariant { .. }));
    }

    #[test]
    fn builders_cap_accessor_lists() {
        let reg = TypeRegistry::new();
        let catalog = OpCatalog::quantum();
        let r8 = reg.register(Some(8)).unwrap();
        let four: Vec<_> = (0..4).map(Accessor::Const).collect();
        let err = InstructionBuilder::new(catalog.get("q.h").unwrap().clone(), &reg)
            .register_operand("r", r8.clone(), &four)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidConstructionInvariant { what: "accessor list", .. }));

        let five = vec![Accessor::Const(0); 5];
        let err = CallBuilder::new(catalog.get("q.call").unwrap().clone(), &reg, "f", 1)
            .arg("a", r8.clone(), &five)
            .result(reg.circuit())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidConstructionInvariant { what: "accessor list", .. }));

        let three = [Accessor::Const(0), Accessor::Value("n".into()), Accessor::Const(2)];
        let instr = InstructionBuilder::new(catalog.get("q.h").unwrap().clone(), &reg)
            .register_operand("r", r8, &three)
            .build()
            .unwrap();
        assert_eq!(instr.accessors(0).unwrap().len(), MAX_ACCESSOR_ELEMS);
    }

    #[test]
    fn builder_rejects_tags_without_literal_syntax() {
        let reg = TypeRegistry::new();
        let catalog = OpCatalog::quantum();
        let bad = [
            ("two words", Tag::Unit),
            ("w", Tag::Float(f64::NAN)),
            ("rate", Tag::Float(f64::INFINITY)),
            ("nested", Tag::Array(vec![Tag::Int(1), Tag::Array(vec![Tag::Float(f64::NEG_INFINITY)])])),
            ("target", Tag::Symbol(String::new())),
            ("sizes", Tag::Segments(vec![1])),
        ];
        for (name, tag) in bad {
            let err = InstructionBuilder::new(catalog.get("q.h").unwrap().clone(), &reg)
                .operand("q", reg.qubit())
                .tag(name, tag)
                .build()
                .unwrap_err();
            assert!(
                matches!(err, ConstructionError::InvalidConstructionInvariant { what: "tag" | "tag value", .. }),
                "{}",
                name
            );
        }

        let instr = InstructionBuilder::new(catalog.get("q.h").unwrap().clone(), &reg)
            .operand("q", reg.qubit())
            .tag("rate", Tag::Array(vec![Tag::Float(0.5), Tag::Symbol("k.1".into())]))
            .build()
            .unwrap();
        assert_eq!(instr.tags().user_tags().count(), 1);
    }

    #[test]
    fn non_finite_angle_is_rejected() {
        let reg = TypeRegistry::new();
        let catalog = OpCatalog::quantum();
        for angle in [f64::NAN, f64::INFINITY] {
            let err = InstructionBuilder::new(catalog.get("q.rz").unwrap().clone(), &reg)
                .angle(angle)
                .operand("q", reg.qubit())
                .build()
                .unwrap_err();
            assert!(matches!(err, ConstructionError::InvalidConstructionInvariant { what: "rotation angle", .. }));
        }
    }

    #[test]
    fn names_must_lex_after_their_sigil() {
        let reg = TypeRegistry::new();
        let catalog = OpCatalog::quantum();
        let err = InstructionBuilder::new(catalog.get("q.h").unwrap().clone(), &reg)
            .operand("a b", reg.qubit())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidConstructionInvariant { what: "value name", .. }));

        let err = InstructionBuilder::new(catalog.get("q.rx").unwrap().clone(), &reg)
            .angle_value("", reg.float(64).unwrap())
            .operand("q", reg.qubit())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidConstructionInvariant { what: "value name", .. }));

        let r4 = reg.register(Some(4)).unwrap();
        let err = CallBuilder::new(catalog.get("q.call").unwrap().clone(), &reg, "f", 1)
            .arg("a", r4.clone(), &[Accessor::Value("i-1".into())])
            .result(reg.circuit())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidConstructionInvariant { what: "value name", .. }));

        let err = CallBuilder::new(catalog.get("q.call").unwrap().clone(), &reg, "has space", 1)
            .arg("a", r4, &[])
            .result(reg.circuit())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidConstructionInvariant { what: "callee", .. }));
    }

    #[test]
    fn unchecked_kind_is_rejected() {
        let reg = TypeRegistry::new();
        let kind = Arc::new(OpKind {
            name: "q.bad".to_owned(),
            form: OpForm::Rotation,
            slots: Vec::new(),
            required: 0,
        });
        let err = InstructionBuilder::new(kind, &reg).angle(0.5).build().unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidConstructionInvariant { what: "instruction kind", .. }));

        let err = CallBuilder::new(Arc::new(OpKind::call("")), &reg, "f", 0)
            .result(reg.circuit())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConstructionError::InvalidConstructionInvariant { what: "instruction kind", .. }));
    }
}
