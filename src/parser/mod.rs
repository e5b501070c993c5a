pub mod coerce;
pub mod document;
pub mod extract;
pub mod markup;

use thiserror::Error;

use crate::db::ScrapedPage;
use crate::flatten::anonymize::Anonymizer;
use crate::flatten::levels::LevelSchema;
use crate::flatten::{flatten_document, FlattenError, Flattened};
use extract::ExtractError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Flatten(#[from] FlattenError),
}

pub struct ProcessedPage {
    pub page_data_id: i64,
    pub url: String,
    pub outcome: Result<Flattened, PipelineError>,
}

/// Two passes: markup → nested document → flat records.
pub fn process_page(page: &ScrapedPage, schema: &LevelSchema, anonymizer: &dyn Anonymizer) -> ProcessedPage {
    let outcome = extract::extract(&page.html, &page.url)
        .map_err(PipelineError::from)
        .and_then(|doc| Ok(flatten_document(&doc, schema, anonymizer)?));
    ProcessedPage {
        page_data_id: page.page_data_id,
        url: page.url.clone(),
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::anonymize::Sha256Anonymizer;
    use crate::flatten::levels::SET_COMPONENTS;

    fn page(html: String) -> ScrapedPage {
        ScrapedPage {
            page_data_id: 7,
            url: "https://bodyspace.bodybuilding.com/workouts/viewworkoutlog/zzshad/593210b4af19ce69876e7dcd".into(),
            html,
        }
    }

    #[test]
    fn good_page_flattens() {
        let html = std::fs::read_to_string("tests/fixtures/drop_set.html").unwrap();
        let done = process_page(&page(html), &LevelSchema::workout(), &Sha256Anonymizer::default());
        assert_eq!(done.page_data_id, 7);
        let flat = done.outcome.unwrap();
        assert_eq!(flat.records(SET_COMPONENTS).len(), 5);
    }

    #[test]
    fn broken_page_reports_extract_error() {
        let done = process_page(
            &page("<html><body><p>private log</p></body></html>".into()),
            &LevelSchema::workout(),
            &Sha256Anonymizer::default(),
        );
        assert!(matches!(done.outcome, Err(PipelineError::Extract(_))));
    }
}
