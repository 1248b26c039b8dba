use crate::reference::SlotId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a tracked object. Ids are handed out by the graph and are
/// never reused, so a stale id always fails lookups instead of aliasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    pub id: u64,
}

impl ObjectId {
    pub(crate) fn from_raw(id: u64) -> Self {
        Self { id }
    }

    pub fn as_u64(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectData {
    Integer(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Record(Vec<(String, ObjectData)>),
    None,
}

impl ObjectData {
    /// Rough number of bytes the payload holds. Only used to decide whether
    /// the tracker is under memory pressure.
    pub fn size_hint(&self) -> usize {
        match self {
            ObjectData::Integer(_) => std::mem::size_of::<i64>(),
            ObjectData::Float(_) => std::mem::size_of::<f64>(),
            ObjectData::Text(s) => s.len(),
            ObjectData::Bytes(b) => b.len(),
            ObjectData::Record(fields) => fields
                .iter()
                .map(|(name, value)| name.len() + value.size_hint())
                .sum(),
            ObjectData::None => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub id: ObjectId,
    pub name: String,
    pub data: ObjectData,
    pub(crate) outgoing: Vec<SlotId>,
}

impl TrackedObject {
    pub(crate) fn new(id: ObjectId, name: String, data: ObjectData) -> Self {
        Self {
            id,
            name,
            data,
            outgoing: Vec::new(),
        }
    }

    pub fn outgoing(&self) -> &[SlotId] {
        &self.outgoing
    }

    pub fn size_hint(&self) -> usize {
        self.data.size_hint()
    }
}

impl Hash for TrackedObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialEq for TrackedObject {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TrackedObject {}
