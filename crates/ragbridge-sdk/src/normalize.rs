//! Response-shape normalization
//!
//! The ingestion backend returns the same logical list as a bare array, an array
//! of strings, or an object wrapping an array of records whose name field varies.
//! Everything here is a pure function from a decoded JSON value to one canonical
//! shape, driven by explicit ordered alias lists.

use ragbridge_core::{CollectionSummary, DocumentRecord, FieldDescriptor};
use serde_json::Value;

use crate::error::ShapeError;
use crate::models::{FailedDocument, UploadAck};

/// Keys that may wrap the collection array in an object response
pub const COLLECTION_WRAPPERS: &[&str] = &["collections", "data"];
/// Name fields of a collection record, most specific first
pub const COLLECTION_NAME_ALIASES: &[&str] = &["collection_name", "name", "id"];

pub const DOCUMENT_WRAPPERS: &[&str] = &["documents", "data"];
pub const DOCUMENT_NAME_ALIASES: &[&str] = &["document_name", "name", "filename", "id"];
pub const DOCUMENT_ID_ALIASES: &[&str] = &["document_id", "id"];

pub const TASK_TOKEN_ALIASES: &[&str] = &["task_id", "taskId", "task_token"];
pub const FAILURE_REASON_ALIASES: &[&str] = &["error_message", "error", "reason", "message"];

/// Semantic kind a response body is normalized into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    CollectionList,
    DocumentList,
    UploadAck,
    Completion,
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ShapeKind::CollectionList => "collection-list",
            ShapeKind::DocumentList => "document-list",
            ShapeKind::UploadAck => "upload-ack",
            ShapeKind::Completion => "completion",
        };
        f.write_str(name)
    }
}

/// A normalized response
#[derive(Debug, Clone, PartialEq)]
pub enum Canonical {
    Collections(Vec<CollectionSummary>),
    Documents(Vec<DocumentRecord>),
    UploadAck(UploadAck),
    Completion(String),
}

/// Normalize `raw` into the canonical value for `kind`
pub fn normalize(raw: &Value, kind: ShapeKind) -> Result<Canonical, ShapeError> {
    match kind {
        ShapeKind::CollectionList => collections(raw).map(Canonical::Collections),
        ShapeKind::DocumentList => documents(raw).map(Canonical::Documents),
        ShapeKind::UploadAck => upload_ack(raw).map(Canonical::UploadAck),
        ShapeKind::Completion => completion(raw).map(Canonical::Completion),
    }
}

/// Decode a response body, classifying non-JSON as a shape error
pub fn parse_body(body: &[u8], kind: ShapeKind) -> Result<Value, ShapeError> {
    serde_json::from_slice(body).map_err(|e| ShapeError::malformed(kind, e.to_string()))
}

pub fn collections(raw: &Value) -> Result<Vec<CollectionSummary>, ShapeError> {
    let kind = ShapeKind::CollectionList;
    list_items(raw, COLLECTION_WRAPPERS, kind)?
        .iter()
        .map(|item| match item {
            Value::String(name) => Ok(CollectionSummary::named(name.clone())),
            Value::Object(_) => {
                let name = first_string(item, COLLECTION_NAME_ALIASES).ok_or_else(|| {
                    ShapeError::unrecognized(kind, format!("collection record without a name: {item}"))
                })?;
                Ok(CollectionSummary {
                    name,
                    embedding_dimension: item
                        .get("embedding_dimension")
                        .and_then(Value::as_u64)
                        .and_then(|d| u32::try_from(d).ok()),
                    metadata_schema: metadata_schema(item)?,
                })
            }
            other => Err(ShapeError::unrecognized(
                kind,
                format!("unexpected collection element: {other}"),
            )),
        })
        .collect()
}

pub fn documents(raw: &Value) -> Result<Vec<DocumentRecord>, ShapeError> {
    Ok(list_items(raw, DOCUMENT_WRAPPERS, ShapeKind::DocumentList)?
        .iter()
        .map(document_record)
        .collect())
}

pub fn upload_ack(raw: &Value) -> Result<UploadAck, ShapeError> {
    let kind = ShapeKind::UploadAck;
    if !raw.is_object() {
        return Err(ShapeError::unrecognized(kind, "expected a JSON object"));
    }

    let failures = match raw.get("failed_documents") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(failed_document).collect(),
        Some(other) => {
            return Err(ShapeError::unrecognized(
                kind,
                format!("failed_documents is not a list: {other}"),
            ))
        }
    };

    Ok(UploadAck {
        task_token: first_string(raw, TASK_TOKEN_ALIASES),
        failures,
        message: raw.get("message").and_then(Value::as_str).map(str::to_string),
    })
}

/// Answer text of a non-streaming completion
pub fn completion(raw: &Value) -> Result<String, ShapeError> {
    raw.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .or_else(|| delta_content(raw))
        .map(str::to_string)
        .ok_or_else(|| {
            ShapeError::unrecognized(ShapeKind::Completion, "no choices[0].message.content")
        })
}

/// Incremental text of one streamed envelope, if any
pub fn delta_content(envelope: &Value) -> Option<&str> {
    envelope
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
}

fn list_items<'a>(
    raw: &'a Value,
    wrappers: &[&str],
    kind: ShapeKind,
) -> Result<&'a Vec<Value>, ShapeError> {
    match raw {
        Value::Array(items) => Ok(items),
        Value::Object(map) => wrappers
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .ok_or_else(|| {
                ShapeError::unrecognized(
                    kind,
                    format!("object without any of {:?} as a list", wrappers),
                )
            }),
        other => Err(ShapeError::unrecognized(
            kind,
            format!("expected a list or an object, got {}", json_type(other)),
        )),
    }
}

fn document_record(item: &Value) -> DocumentRecord {
    match item {
        Value::String(name) => DocumentRecord::named(name.clone()),
        Value::Object(_) => DocumentRecord {
            name: first_string(item, DOCUMENT_NAME_ALIASES).unwrap_or_else(|| item.to_string()),
            id: first_string(item, DOCUMENT_ID_ALIASES),
        },
        other => DocumentRecord::named(other.to_string()),
    }
}

fn failed_document(item: &Value) -> FailedDocument {
    match item {
        Value::String(name) => FailedDocument {
            name: name.clone(),
            reason: None,
        },
        _ => FailedDocument {
            name: document_record(item).name,
            reason: first_string(item, FAILURE_REASON_ALIASES),
        },
    }
}

fn metadata_schema(item: &Value) -> Result<Vec<FieldDescriptor>, ShapeError> {
    match item.get("metadata_schema") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(schema) => serde_json::from_value(schema.clone()).map_err(|e| {
            ShapeError::unrecognized(
                ShapeKind::CollectionList,
                format!("invalid metadata_schema: {e}"),
            )
        }),
    }
}

/// First non-empty string (or number) under one of `aliases`
fn first_string(item: &Value, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|key| match item.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
