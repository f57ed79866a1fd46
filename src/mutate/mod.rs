//! Mutate module - In-place normalization of document fields
//!
//! Documents are parsed into an order-preserving `serde_json::Map` and only
//! the targeted fields are patched, so unknown fields and key order survive
//! the rewrite. A document is only written back when something changed, via
//! a sibling temp file renamed over the original.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::codec::POSITION_FIELD;
use crate::error::MutateError;
use crate::normalize::round_value;

pub const NAME_FIELD: &str = "name";
pub const DESCRIPTION_FIELD: &str = "description";

const INDENT: &[u8] = b"    ";

/// Which in-place edits to perform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationOptions {
    /// Write the file stem into `name`
    pub update_name_from_filename: bool,
    /// Drop the `description` field
    pub remove_description: bool,
    /// Set `name` to an empty string
    pub clear_name: bool,
    /// Rewrite `position` rounded to the scan precision
    pub round_positions_in_file: bool,
}

impl MutationOptions {
    /// True when no edit is enabled and documents are never touched.
    pub fn is_noop(&self) -> bool {
        !(self.update_name_from_filename
            || self.remove_description
            || self.clear_name
            || self.round_positions_in_file)
    }
}

/// A single change applied to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldEdit {
    PositionRounded,
    NameFromFilename,
    DescriptionRemoved,
    NameCleared,
}

/// What happened to one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationOutcome {
    pub edits: Vec<FieldEdit>,
    pub written: bool,
}

/// Applies [`MutationOptions`] to documents on disk.
#[derive(Debug, Clone)]
pub struct FieldMutator {
    options: MutationOptions,
    decimals: i32,
}

impl FieldMutator {
    /// `decimals` is the precision used for `round_positions_in_file`;
    /// a negative value turns that edit off.
    pub fn new(options: MutationOptions, decimals: i32) -> Self {
        Self { options, decimals }
    }

    pub fn options(&self) -> &MutationOptions {
        &self.options
    }

    pub fn is_noop(&self) -> bool {
        self.options.is_noop()
    }

    /// Read, patch and (if changed) rewrite the document at `path`.
    pub fn apply(&self, path: &Path) -> Result<MutationOutcome, MutateError> {
        if self.is_noop() {
            return Ok(MutationOutcome::default());
        }

        let bytes = fs::read(path).map_err(|source| MutateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut document: Value =
            serde_json::from_slice(&bytes).map_err(|source| MutateError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let map = document
            .as_object_mut()
            .ok_or_else(|| MutateError::NotAnObject {
                path: path.to_path_buf(),
            })?;

        let edits = self.patch(path, map);
        if edits.is_empty() {
            tracing::debug!("No field changes for {}", path.display());
            return Ok(MutationOutcome {
                edits,
                written: false,
            });
        }

        write_pretty(path, &document)?;
        tracing::info!("Updated {} {:?}", path.display(), edits);

        Ok(MutationOutcome {
            edits,
            written: true,
        })
    }

    /// Patch an in-memory document. Edits run in a fixed order: position
    /// rounding, name from filename, description removal, name clearing.
    pub fn patch(&self, path: &Path, map: &mut Map<String, Value>) -> Vec<FieldEdit> {
        let mut edits = Vec::new();

        if self.options.round_positions_in_file
            && self.decimals >= 0
            && round_position_field(map, self.decimals)
        {
            edits.push(FieldEdit::PositionRounded);
        }

        if self.options.update_name_from_filename {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            if map.get(NAME_FIELD).and_then(Value::as_str) != Some(stem.as_str()) {
                map.insert(NAME_FIELD.to_string(), Value::String(stem));
                edits.push(FieldEdit::NameFromFilename);
            }
        }

        if self.options.remove_description {
            if map.shift_remove(DESCRIPTION_FIELD).is_some() {
                edits.push(FieldEdit::DescriptionRemoved);
            } else {
                tracing::debug!("No description found in {}", path.display());
            }
        }

        if self.options.clear_name {
            if let Some(name) = map.get_mut(NAME_FIELD) {
                if name.as_str() != Some("") {
                    *name = Value::String(String::new());
                    edits.push(FieldEdit::NameCleared);
                }
            }
        }

        edits
    }
}

/// Round each numeric component of `position` in place. Returns whether any
/// component changed value; integers that are already exact stay untouched.
fn round_position_field(map: &mut Map<String, Value>, decimals: i32) -> bool {
    let Some(Value::Array(items)) = map.get_mut(POSITION_FIELD) else {
        return false;
    };
    if items.is_empty() || !items.iter().all(Value::is_number) {
        return false;
    }

    let mut changed = false;
    for item in items.iter_mut() {
        let Some(current) = item.as_f64() else {
            continue;
        };
        let rounded = round_value(current, decimals);
        if rounded != current {
            if let Some(number) = Number::from_f64(rounded) {
                *item = Value::Number(number);
                changed = true;
            }
        }
    }
    changed
}

/// Serialize with 4-space indentation and swap the result into place.
fn write_pretty(path: &Path, document: &Value) -> Result<(), MutateError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    document
        .serialize(&mut serializer)
        .map_err(|source| MutateError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;

    let tmp = temp_sibling(path);
    let io_err = |source| MutateError::Io {
        path: path.to_path_buf(),
        source,
    };

    let result = fs::File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(&buf)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(e));
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.posdup.tmp", name))
}
