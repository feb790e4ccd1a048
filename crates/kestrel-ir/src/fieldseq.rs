//! Field sequences
//!
//! A field sequence records the chain of field accesses (`a.b.c`) that an
//! address computation was derived from, so alias analysis can still tell
//! disjoint fields apart after the access has been lowered to pointer
//! arithmetic. Sequences are hash-consed: building the same chain twice
//! yields the same `FieldSeqId`, so equality is id equality.
//!
//! `None` stands for the empty sequence. `FieldSeqId::NOT_A_FIELD` marks an
//! address that is known not to be a plain field chain; it absorbs anything
//! it is appended to or with.

use rustc_hash::FxHashMap;

use crate::error::{IrError, IrResult};
use crate::types::FieldHandle;

/// Canonical handle of a non-empty field sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldSeqId(u32);

impl FieldSeqId {
    /// Sentinel for "not a field sequence"
    pub const NOT_A_FIELD: FieldSeqId = FieldSeqId(u32::MAX);

    pub fn is_not_a_field(self) -> bool {
        self == FieldSeqId::NOT_A_FIELD
    }
}

impl std::fmt::Display for FieldSeqId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_not_a_field() {
            write!(f, "NotAField")
        } else {
            write!(f, "fs{}", self.0)
        }
    }
}

/// Storage class of the field at one position in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldSeqKind {
    Instance,
    SimpleStatic,
    /// Static stored in a per-type boxed area
    SharedStatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FieldSeqKey {
    field: FieldHandle,
    kind: FieldSeqKind,
    next: Option<FieldSeqId>,
}

/// One element of an interned sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSeqNode {
    pub field: FieldHandle,
    pub kind: FieldSeqKind,
    /// Remainder of the chain; a non-owning link to another interned node
    pub next: Option<FieldSeqId>,
}

/// Canonicalizing store for field sequences, owned by one compilation
#[derive(Debug, Default)]
pub struct FieldSeqStore {
    nodes: Vec<FieldSeqNode>,
    canon: FxHashMap<FieldSeqKey, FieldSeqId>,
}

impl FieldSeqStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct interned sequences
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Canonical one-element sequence
    pub fn create_singleton(&mut self, field: FieldHandle, kind: FieldSeqKind) -> IrResult<FieldSeqId> {
        if field.is_null() {
            return Err(IrError::NullFieldHandle);
        }
        Ok(self.intern(FieldSeqKey { field, kind, next: None }))
    }

    /// Canonical concatenation of `a` followed by `b`
    pub fn append(&mut self, a: Option<FieldSeqId>, b: Option<FieldSeqId>) -> Option<FieldSeqId> {
        let a = match a {
            None => return b,
            Some(a) if a.is_not_a_field() => return Some(FieldSeqId::NOT_A_FIELD),
            Some(a) => a,
        };
        let b = match b {
            None => return Some(a),
            Some(b) if b.is_not_a_field() => return Some(FieldSeqId::NOT_A_FIELD),
            Some(b) => b,
        };

        // Rebuild `a` front to back on top of `b`.
        let mut prefix = Vec::new();
        let mut cursor = Some(a);
        while let Some(id) = cursor {
            let node = self.nodes[id.0 as usize];
            prefix.push(node);
            cursor = node.next;
        }

        let mut tail = b;
        for node in prefix.into_iter().rev() {
            tail = self.intern(FieldSeqKey { field: node.field, kind: node.kind, next: Some(tail) });
        }
        Some(tail)
    }

    /// Canonical sequence for a whole chain given front to back
    pub fn from_chain(&mut self, chain: &[(FieldHandle, FieldSeqKind)]) -> IrResult<Option<FieldSeqId>> {
        let mut seq = None;
        for &(field, kind) in chain.iter().rev() {
            let head = self.create_singleton(field, kind)?;
            seq = self.append(Some(head), seq);
        }
        Ok(seq)
    }

    /// Interned element behind `id`; `None` for the sentinel
    pub fn node(&self, id: FieldSeqId) -> Option<&FieldSeqNode> {
        if id.is_not_a_field() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    /// Field at the head of the sequence
    pub fn field_handle(&self, id: FieldSeqId) -> Option<FieldHandle> {
        self.node(id).map(|node| node.field)
    }

    pub fn kind(&self, id: FieldSeqId) -> Option<FieldSeqKind> {
        self.node(id).map(|node| node.kind)
    }

    pub fn next(&self, id: FieldSeqId) -> Option<FieldSeqId> {
        self.node(id).and_then(|node| node.next)
    }

    /// Last element of the sequence
    pub fn tail(&self, id: FieldSeqId) -> FieldSeqId {
        let mut current = id;
        while let Some(next) = self.next(current) {
            current = next;
        }
        current
    }

    /// Whether the head field is a static
    pub fn is_static(&self, id: FieldSeqId) -> bool {
        matches!(self.kind(id), Some(FieldSeqKind::SimpleStatic | FieldSeqKind::SharedStatic))
    }

    /// Number of fields in the chain (0 for the sentinel)
    pub fn seq_len(&self, id: FieldSeqId) -> usize {
        self.iter(id).count()
    }

    /// Fields of the chain, front to back
    pub fn iter(&self, id: FieldSeqId) -> FieldSeqIter<'_> {
        FieldSeqIter { store: self, cursor: if id.is_not_a_field() { None } else { Some(id) } }
    }

    fn intern(&mut self, key: FieldSeqKey) -> FieldSeqId {
        if let Some(&id) = self.canon.get(&key) {
            return id;
        }
        let id = FieldSeqId(self.nodes.len() as u32);
        log::trace!("interning field sequence {} ({} -> {:?})", id, key.field, key.next);
        self.nodes.push(FieldSeqNode { field: key.field, kind: key.kind, next: key.next });
        self.canon.insert(key, id);
        id
    }
}

/// Iterator over the fields of one sequence
pub struct FieldSeqIter<'a> {
    store: &'a FieldSeqStore,
    cursor: Option<FieldSeqId>,
}

impl<'a> Iterator for FieldSeqIter<'a> {
    type Item = &'a FieldSeqNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.store.node(self.cursor?)?;
        self.cursor = node.next;
        Some(node)
    }
}
