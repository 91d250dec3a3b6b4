use crate::anchor::Cut;
use std::ops::Range;
use std::path::PathBuf;
use thiserror::Error;

/// The edit primitive: a byte-span replacement or a pure insertion.
///
/// Offsets always refer to the original document. Operations are never
/// rebased against each other; the serializer replays them in offset order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOperation {
    /// Replace `range` of the original with `bytes`
    Replace { range: Range<usize>, bytes: Vec<u8> },
    /// Insert `bytes` before the original byte at `offset`
    InsertAt { offset: usize, bytes: Vec<u8> },
}

impl EditOperation {
    pub fn offset(&self) -> usize {
        match self {
            EditOperation::Replace { range, .. } => range.start,
            EditOperation::InsertAt { offset, .. } => *offset,
        }
    }

    /// Exclusive end of the original bytes this operation consumes.
    pub fn end(&self) -> usize {
        match self {
            EditOperation::Replace { range, .. } => range.end,
            EditOperation::InsertAt { offset, .. } => *offset,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            EditOperation::Replace { bytes, .. } | EditOperation::InsertAt { bytes, .. } => bytes,
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Invalid byte range: [{byte_start}, {byte_end}) in document of length {len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        len: usize,
    },

    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Operations accumulated during one run, in the order they were recorded.
///
/// Recording is a pure append: overlap is not checked and the document is
/// not touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSet {
    operations: Vec<EditOperation>,
}

impl EditSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_replace(&mut self, range: Range<usize>, bytes: impl Into<Vec<u8>>) {
        let bytes = bytes.into();
        log::trace!("record replace {range:?} ({} bytes)", bytes.len());
        self.operations.push(EditOperation::Replace { range, bytes });
    }

    pub fn record_insert(&mut self, offset: usize, bytes: impl Into<Vec<u8>>) {
        let bytes = bytes.into();
        log::trace!("record insert at {offset} ({} bytes)", bytes.len());
        self.operations.push(EditOperation::InsertAt { offset, bytes });
    }

    /// Record `fragment` at a located cut.
    ///
    /// Opening a self-closing element rewrites its `/>` into
    /// `>` + fragment + `</name>`.
    pub fn record_cut(&mut self, cut: Cut, fragment: &[u8]) {
        match cut {
            Cut::Insert { offset } => self.record_insert(offset, fragment),
            Cut::Replace { range } => self.record_replace(range, fragment),
            Cut::OpenEmpty { range, name } => {
                let mut bytes = Vec::with_capacity(fragment.len() + name.len() + 4);
                bytes.push(b'>');
                bytes.extend_from_slice(fragment);
                bytes.extend_from_slice(b"</");
                bytes.extend_from_slice(name.as_bytes());
                bytes.push(b'>');
                self.record_replace(range, bytes);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EditOperation> {
        self.operations.iter()
    }

    pub fn extend(&mut self, other: EditSet) {
        self.operations.extend(other.operations);
    }
}

impl<'a> IntoIterator for &'a EditSet {
    type Item = &'a EditOperation;
    type IntoIter = std::slice::Iter<'a, EditOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
