//! Per-level record builders and the schema table that wires them together.

use serde_json::{Map, Value};

use super::anonymize::Anonymizer;
use super::{FlattenError, Record};
use crate::parser::coerce::{assemble_timestamp, parse_float, parse_int};

pub const WORKOUTS: &str = "workouts";
pub const WORKOUT_COMPONENTS: &str = "workout_components";
pub const SETS: &str = "sets";
pub const SET_COMPONENTS: &str = "set_components";

pub type Node = Map<String, Value>;
pub type BuildFn = fn(&Node, &dyn Anonymizer) -> Result<Record, FlattenError>;

/// How one tree level turns into records.
#[derive(Clone, Copy)]
pub struct LevelSpec {
    pub name: &'static str,
    pub primary_key: &'static str,
    /// Field holding the child nodes; also the child level's name.
    pub child: Option<&'static str>,
    pub build: BuildFn,
}

impl std::fmt::Debug for LevelSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelSpec")
            .field("name", &self.name)
            .field("primary_key", &self.primary_key)
            .field("child", &self.child)
            .finish()
    }
}

/// Ordered level table, root first.
#[derive(Debug, Clone)]
pub struct LevelSchema {
    levels: Vec<LevelSpec>,
}

impl LevelSchema {
    pub fn new(levels: Vec<LevelSpec>) -> Self {
        Self { levels }
    }

    /// workouts → workout_components → sets → set_components
    pub fn workout() -> Self {
        Self::new(vec![
            LevelSpec {
                name: WORKOUTS,
                primary_key: "workout_id",
                child: Some(WORKOUT_COMPONENTS),
                build: build_workout,
            },
            LevelSpec {
                name: WORKOUT_COMPONENTS,
                primary_key: "workout_component_id",
                child: Some(SETS),
                build: build_workout_component,
            },
            LevelSpec {
                name: SETS,
                primary_key: "set_id",
                child: Some(SET_COMPONENTS),
                build: build_set,
            },
            LevelSpec {
                name: SET_COMPONENTS,
                primary_key: "set_component_id",
                child: None,
                build: build_set_component,
            },
        ])
    }

    pub fn root(&self) -> Option<&LevelSpec> {
        self.levels.first()
    }

    pub fn level(&self, name: &str) -> Option<&LevelSpec> {
        self.levels.iter().find(|l| l.name == name)
    }

    pub fn levels(&self) -> &[LevelSpec] {
        &self.levels
    }
}

// ── Builders ──

// Each field lists its document name first, then the name used by raw scraped dumps.
const DURATION: &[&str] = &["total_duration_seconds", "duration"];
const CARDIO_DURATION: &[&str] = &["cardio_duration_seconds", "cardio_duration"];
const REST_TIME: &[&str] = &["rest_time_seconds", "rest_time"];
const WEIGHT: &[&str] = &["weight_value", "weight"];
const CLASSIFICATION: &[&str] = &["classification", "type"];
const CLASSIFICATIONS: &[&str] = &["STRAIGHT", "SUPER", "DROP"];

fn build_workout(node: &Node, anonymizer: &dyn Anonymizer) -> Result<Record, FlattenError> {
    let level = WORKOUTS;
    let created_at = assemble_timestamp(
        &required(node, level, &["month_date"])?,
        &required(node, level, &["month"])?,
        &required(node, level, &["year"])?,
    )?;

    let mut r = Record::new();
    r.insert("name".into(), Value::String(required(node, level, &["name"])?));
    r.insert("created_at".into(), Value::String(created_at));
    r.insert("duration".into(), int(node, DURATION));
    r.insert(
        "created_by".into(),
        text(node, &["username"])
            .map(|u| Value::String(anonymizer.anonymize(&u)))
            .unwrap_or(Value::Null),
    );
    r.insert("url".into(), string(node, &["url"]));
    r.insert("muscles_used".into(), muscles(node));
    r.insert("energy_level".into(), int(node, &["energy_level"]));
    r.insert("self_rating".into(), int(node, &["self_rating"]));
    r.insert("cardio_duration".into(), int(node, CARDIO_DURATION));
    Ok(r)
}

fn build_workout_component(node: &Node, _: &dyn Anonymizer) -> Result<Record, FlattenError> {
    let mut r = Record::new();
    r.insert("sequence".into(), int(node, &["sequence"]));
    r.insert("rest_time".into(), int(node, REST_TIME));
    Ok(r)
}

fn build_set(node: &Node, _: &dyn Anonymizer) -> Result<Record, FlattenError> {
    let raw = required(node, SETS, CLASSIFICATION)?;
    // raw dumps spell these STRAIGHT_SET / SUPER_SET / DROP_SET
    let upper = raw.to_uppercase();
    let classification = upper.strip_suffix("_SET").unwrap_or(upper.as_str());
    if !CLASSIFICATIONS.iter().any(|c| *c == classification) {
        return Err(FlattenError::InvalidValue {
            level: SETS,
            field: "classification",
            value: raw,
        });
    }

    let mut r = Record::new();
    r.insert("sequence".into(), int(node, &["sequence"]));
    r.insert("rest_time".into(), int(node, REST_TIME));
    r.insert("classification".into(), Value::String(classification.to_string()));
    Ok(r)
}

fn build_set_component(node: &Node, _: &dyn Anonymizer) -> Result<Record, FlattenError> {
    let mut r = Record::new();
    r.insert("sequence".into(), int(node, &["sequence"]));
    r.insert(
        "weight_metric".into(),
        Value::String(required(node, SET_COMPONENTS, &["weight_metric"])?),
    );
    r.insert(
        "weight".into(),
        text(node, WEIGHT)
            .and_then(|t| parse_float(&t))
            .map(Value::from)
            .unwrap_or(Value::Null),
    );
    r.insert("reps".into(), int(node, &["reps"]));
    r.insert("rest_time".into(), int(node, REST_TIME));
    r.insert("exercise_name".into(), string(node, &["exercise_name"]));
    r.insert("exercise_link".into(), string(node, &["exercise_link"]));
    Ok(r)
}

// ── Field access ──

/// First present key as text; raw scraped dumps hold numbers as strings.
fn text(node: &Node, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match node.get(*key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn required(node: &Node, level: &'static str, keys: &[&'static str]) -> Result<String, FlattenError> {
    text(node, keys).ok_or(FlattenError::MissingField { level, field: keys.first().copied().unwrap_or_default() })
}

fn string(node: &Node, keys: &[&str]) -> Value {
    text(node, keys).map(Value::String).unwrap_or(Value::Null)
}

fn int(node: &Node, keys: &[&str]) -> Value {
    text(node, keys)
        .and_then(|t| parse_int(&t))
        .map(Value::from)
        .unwrap_or(Value::Null)
}

/// `;`-joined, sorted and deduplicated. Accepts an array or a comma list.
fn muscles(node: &Node) -> Value {
    let mut names: Vec<String> = match node.get("muscles_used") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .collect(),
        Some(Value::String(s)) => s.split([',', ';']).map(|m| m.trim().to_string()).collect(),
        _ => Vec::new(),
    };
    names.retain(|m| !m.is_empty());
    names.sort();
    names.dedup();
    Value::String(names.join(";"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::anonymize::Sha256Anonymizer;
    use serde_json::json;

    fn node(v: Value) -> Node {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn schema_table() {
        let schema = LevelSchema::workout();
        assert_eq!(schema.root().map(|l| l.name), Some(WORKOUTS));
        let chain: Vec<_> = schema.levels().iter().map(|l| (l.name, l.child)).collect();
        assert_eq!(
            chain,
            vec![
                (WORKOUTS, Some(WORKOUT_COMPONENTS)),
                (WORKOUT_COMPONENTS, Some(SETS)),
                (SETS, Some(SET_COMPONENTS)),
                (SET_COMPONENTS, None),
            ]
        );
        assert_eq!(schema.level(SETS).map(|l| l.primary_key), Some("set_id"));
        assert!(schema.level("nope").is_none());
    }

    #[test]
    fn workout_record_from_raw_strings() {
        let anon = Sha256Anonymizer::new("");
        let raw = node(json!({
            "name": "Leg Day",
            "month": "june", "month_date": "7", "year": "2016",
            "total_duration_seconds": "3600",
            "cardio_duration_seconds": "",
            "energy_level": 4,
            "self_rating": "9",
            "username": "zzyt",
            "muscles_used": "Quads, Glutes,Quads",
        }));
        let r = build_workout(&raw, &anon).unwrap();
        assert_eq!(r["created_at"], json!("2016-06-07 00:00:00"));
        assert_eq!(r["duration"], json!(3600));
        assert_eq!(r["cardio_duration"], Value::Null);
        assert_eq!(r["energy_level"], json!(4));
        assert_eq!(r["self_rating"], json!(9));
        assert_eq!(r["muscles_used"], json!("Glutes;Quads"));
        assert_eq!(r["created_by"], json!(anon.anonymize("zzyt")));
        assert_eq!(r["url"], Value::Null);
    }

    #[test]
    fn workout_requires_date_parts() {
        let anon = Sha256Anonymizer::default();
        let raw = node(json!({ "name": "x", "month": "june", "year": "2016" }));
        assert!(matches!(
            build_workout(&raw, &anon),
            Err(FlattenError::MissingField { level: WORKOUTS, field: "month_date" })
        ));
    }

    #[test]
    fn set_types_from_raw_dumps() {
        let anon = Sha256Anonymizer::default();
        for (raw, expected) in [("STRAIGHT_SET", "STRAIGHT"), ("super_set", "SUPER"), ("DROP", "DROP")] {
            let r = build_set(&node(json!({ "sequence": 1, "type": raw, "rest_time": "90" })), &anon).unwrap();
            assert_eq!(r["classification"], json!(expected));
            assert_eq!(r["rest_time"], json!(90));
        }
        assert!(matches!(
            build_set(&node(json!({ "sequence": 1, "type": "GIANT_SET" })), &anon),
            Err(FlattenError::InvalidValue { level: SETS, field: "classification", .. })
        ));
    }

    #[test]
    fn set_component_coercions() {
        let anon = Sha256Anonymizer::default();
        let raw = node(json!({
            "sequence": 2,
            "weight_metric": "lbs",
            "weight_value": "135.5",
            "reps": "ten",
            "rest_time_seconds": null,
        }));
        let r = build_set_component(&raw, &anon).unwrap();
        assert_eq!(r["weight"], json!(135.5));
        assert_eq!(r["reps"], Value::Null);
        assert_eq!(r["rest_time"], Value::Null);
        assert_eq!(r["sequence"], json!(2));
        assert_eq!(r["exercise_name"], Value::Null);
    }
}
