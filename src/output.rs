//! Replays an [`EditSet`] over the original bytes and writes the result.

use crate::edit::{EditError, EditOperation, EditSet};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::Path;

/// Splice `edits` into `source`.
///
/// Operations are walked in ascending offset order; operations at the same
/// offset keep the order they were recorded in. Original bytes are copied up
/// to each offset, then the operation's bytes are emitted, and a replacement
/// additionally skips its range. Of several replacements over the same
/// range only the last recorded one is kept. Any other operation that starts
/// inside a range already consumed is emitted at the current position.
pub fn serialize(source: &[u8], edits: &EditSet) -> Result<Vec<u8>, EditError> {
    let mut operations = superseding_replacements(edits);
    for op in &operations {
        if op.offset() > op.end() || op.end() > source.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: op.offset(),
                byte_end: op.end(),
                len: source.len(),
            });
        }
    }
    operations.sort_by_key(|op| op.offset());

    let added: usize = operations.iter().map(|op| op.bytes().len()).sum();
    let mut out = Vec::with_capacity(source.len() + added);
    let mut cursor = 0;
    for op in operations {
        if op.offset() > cursor {
            out.extend_from_slice(&source[cursor..op.offset()]);
            cursor = op.offset();
        }
        out.extend_from_slice(op.bytes());
        cursor = cursor.max(op.end());
    }
    out.extend_from_slice(&source[cursor..]);
    Ok(out)
}

/// Recorded operations minus every replacement that a later replacement
/// over the identical range overrides.
fn superseding_replacements(edits: &EditSet) -> Vec<&EditOperation> {
    let mut last: HashMap<&Range<usize>, usize> = HashMap::new();
    for (index, op) in edits.iter().enumerate() {
        if let EditOperation::Replace { range, .. } = op {
            last.insert(range, index);
        }
    }

    edits
        .iter()
        .enumerate()
        .filter(|(index, op)| match op {
            EditOperation::Replace { range, .. } => {
                let keep = last.get(range) == Some(index);
                if !keep {
                    log::debug!("replacement of {range:?} superseded by a later one");
                }
                keep
            }
            EditOperation::InsertAt { .. } => true,
        })
        .map(|(_, op)| op)
        .collect()
}

/// Write fully materialised output to `path`.
///
/// The bytes go to a temporary file in the destination directory, are
/// synced, and the temporary file is renamed over `path`, so the
/// destination is never left truncated. An existing destination's
/// permissions are kept.
pub fn write_output(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let wrap = |source: std::io::Error| EditError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path).ok().map(|meta| meta.permissions());

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(wrap)?;
    temp.write_all(content).map_err(wrap)?;
    temp.as_file().sync_all().map_err(wrap)?;
    if let Some(permissions) = permissions {
        temp.as_file().set_permissions(permissions).map_err(wrap)?;
    }
    temp.persist(path).map_err(|e| wrap(e.error))?;

    log::debug!("wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
