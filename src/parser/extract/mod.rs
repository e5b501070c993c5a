//! Markup → `WorkoutDocument`.
//!
//! The page layout doesn't follow the logical hierarchy: rest markers sit
//! beside the sets they describe, drop sets only reveal themselves on their
//! second entry, and grouped exercises render one info block per member
//! regardless of how many sets follow. `component` and `sets` put the tree
//! back together.

pub mod component;
pub mod header;
pub mod sets;

use scraper::Html;
use thiserror::Error;
use tracing::debug;

use super::document::WorkoutDocument;
use crate::links;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{url}: missing required element: {anchor}")]
    Structure { url: String, anchor: &'static str },
    #[error("{url}: unrecognized {field}: {value:?}")]
    UnrecognizedField {
        url: String,
        field: &'static str,
        value: String,
    },
}

/// Source URL carried along for error context.
#[derive(Debug, Clone, Copy)]
pub struct Source<'a> {
    pub url: &'a str,
}

impl Source<'_> {
    pub fn missing(&self, anchor: &'static str) -> ExtractError {
        ExtractError::Structure {
            url: self.url.to_string(),
            anchor,
        }
    }

    pub fn unrecognized(&self, field: &'static str, value: &str) -> ExtractError {
        ExtractError::UnrecognizedField {
            url: self.url.to_string(),
            field,
            value: value.to_string(),
        }
    }
}

pub fn extract(markup: &str, source_url: &str) -> Result<WorkoutDocument, ExtractError> {
    let doc = Html::parse_document(markup);
    let src = Source { url: source_url };

    let header = header::extract(&doc, src)?;
    let workout_components = component::extract_all(&doc, src)?;

    let document = WorkoutDocument {
        url: source_url.to_string(),
        username: links::parse_workout_url(source_url).map(|w| w.username),
        name: header.name,
        muscles_used: header.muscles_used,
        total_duration_seconds: header.total_duration_seconds,
        cardio_duration_seconds: header.cardio_duration_seconds,
        energy_level: header.energy_level,
        self_rating: header.self_rating,
        month: header.month,
        month_date: header.month_date,
        year: header.year,
        workout_components,
    };

    debug!(
        url = source_url,
        components = document.workout_components.len(),
        grouped = document.workout_components.iter().filter(|c| c.is_grouped()).count(),
        entries = document.entry_count(),
        "extracted workout"
    );
    Ok(document)
}

// ── Tests ──
