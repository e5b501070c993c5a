//! Nested workout tree → four flat record collections linked by generated keys.
//!
//! One depth-first, pre-order pass. The root computes `created_at` from its own
//! date parts and every descendant inherits it. Each child record carries its
//! parent's primary key under the parent level's key name. Every run owns its
//! output; nothing is shared between runs.

pub mod anonymize;
pub mod levels;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::parser::coerce::DateError;
use crate::parser::document::WorkoutDocument;
use anonymize::Anonymizer;
use levels::{LevelSchema, LevelSpec};

/// Flat field → scalar mapping, ready for a relational insert.
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum FlattenError {
    #[error(transparent)]
    Date(#[from] DateError),
    #[error("{level}: missing field {field:?}")]
    MissingField {
        level: &'static str,
        field: &'static str,
    },
    #[error("{level}: invalid {field}: {value:?}")]
    InvalidValue {
        level: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("{level}: expected an object")]
    NotAnObject { level: &'static str },
    #[error("schema has no level {0:?}")]
    UnknownLevel(String),
    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Records per level name, each in pre-order traversal order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Flattened {
    levels: BTreeMap<&'static str, Vec<Record>>,
}

impl Flattened {
    fn new(schema: &LevelSchema) -> Self {
        Self {
            levels: schema.levels().iter().map(|l| (l.name, Vec::new())).collect(),
        }
    }

    pub fn records(&self, level: &str) -> &[Record] {
        self.levels.get(level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total records across all levels.
    pub fn len(&self) -> usize {
        self.levels.values().map(Vec::len).sum()
    }
}

pub fn flatten_document(
    document: &WorkoutDocument,
    schema: &LevelSchema,
    anonymizer: &dyn Anonymizer,
) -> Result<Flattened, FlattenError> {
    let root = serde_json::to_value(document)?;
    flatten(&root, schema, anonymizer)
}

pub fn flatten(
    root: &Value,
    schema: &LevelSchema,
    anonymizer: &dyn Anonymizer,
) -> Result<Flattened, FlattenError> {
    let root_level = schema
        .root()
        .ok_or_else(|| FlattenError::UnknownLevel("<root>".into()))?;
    let mut run = Run {
        schema,
        anonymizer,
        out: Flattened::new(schema),
    };
    run.visit(root, root_level, None, None)?;
    debug!(records = run.out.len(), "flattened workout");
    Ok(run.out)
}

struct ParentKey {
    field: &'static str,
    id: Value,
}

struct Run<'a> {
    schema: &'a LevelSchema,
    anonymizer: &'a dyn Anonymizer,
    out: Flattened,
}

impl<'a> Run<'a> {
    fn visit(
        &mut self,
        node: &Value,
        spec: &'a LevelSpec,
        parent: Option<ParentKey>,
        created_at: Option<&Value>,
    ) -> Result<(), FlattenError> {
        let fields = node
            .as_object()
            .ok_or(FlattenError::NotAnObject { level: spec.name })?;
        let mut record = (spec.build)(fields, self.anonymizer)?;

        let created_at = match created_at {
            Some(inherited) => {
                record.insert("created_at".into(), inherited.clone());
                inherited.clone()
            }
            None => record.get("created_at").cloned().ok_or(FlattenError::MissingField {
                level: spec.name,
                field: "created_at",
            })?,
        };

        let id = Value::String(Uuid::new_v4().to_string());
        record.insert(spec.primary_key.into(), id.clone());
        if let Some(parent) = parent {
            record.insert(parent.field.into(), parent.id);
        }

        self.out
            .levels
            .entry(spec.name)
            .or_default()
            .push(record);

        let Some(child_key) = spec.child else {
            return Ok(());
        };
        let schema = self.schema;
        let child_spec = schema
            .level(child_key)
            .ok_or_else(|| FlattenError::UnknownLevel(child_key.to_string()))?;
        let children = fields
            .get(child_key)
            .and_then(Value::as_array)
            .ok_or(FlattenError::MissingField {
                level: spec.name,
                field: child_key,
            })?;

        for child in children {
            let link = ParentKey {
                field: spec.primary_key,
                id: id.clone(),
            };
            self.visit(child, child_spec, Some(link), Some(&created_at))?;
        }
        Ok(())
    }
}

// ── Tests ──
