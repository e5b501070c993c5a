use std::collections::BTreeSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::{ExtractError, Source};
use crate::parser::coerce::parse_hh_mm;
use crate::parser::markup::{doc_all, doc_first, first, sel, text};

static NAME: LazyLock<Selector> = LazyLock::new(|| sel("div.rowSectionHeader"));
static MUSCLES: LazyLock<Selector> = LazyLock::new(|| sel("div.musclesWorked span.value"));
static TOTAL_TIME: LazyLock<Selector> = LazyLock::new(|| {
    sel(r#"span[wicketpath="logResultsPanel_workoutSummary_totalWorkoutTime"]"#)
});
static CARDIO_TIME: LazyLock<Selector> = LazyLock::new(|| {
    sel(r#"span[wicketpath="logResultsPanel_workoutSummary_totalCardioTime"]"#)
});
static ENERGY_MARK: LazyLock<Selector> = LazyLock::new(|| sel("div.energyLevel span.on"));
static SELF_RATING: LazyLock<Selector> = LazyLock::new(|| sel("div.selfRating span.value"));
static FOOTER: LazyLock<Selector> = LazyLock::new(|| sel("div.log-footer"));
static FOOTER_MONTH: LazyLock<Selector> = LazyLock::new(|| sel("span.log-month"));
static FOOTER_DAY: LazyLock<Selector> = LazyLock::new(|| sel("span.log-day"));
static FOOTER_YEAR: LazyLock<Selector> = LazyLock::new(|| sel("span.log-year"));

/// Workout-level fields from the page header, summary and footer.
#[derive(Debug, Clone)]
pub struct Header {
    pub name: String,
    pub muscles_used: BTreeSet<String>,
    pub total_duration_seconds: Option<u32>,
    pub cardio_duration_seconds: Option<u32>,
    pub energy_level: u32,
    pub self_rating: String,
    pub month: String,
    pub month_date: String,
    pub year: String,
}

pub fn extract(doc: &Html, src: Source<'_>) -> Result<Header, ExtractError> {
    let required = |selector: &Selector, anchor: &'static str| {
        doc_first(doc, selector)
            .map(text)
            .ok_or_else(|| src.missing(anchor))
    };

    let name = required(&NAME, "name header")?;
    let muscles_used = required(&MUSCLES, "muscles used")?
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect();
    let total_duration_seconds = parse_hh_mm(&required(&TOTAL_TIME, "total workout time")?);
    let cardio_duration_seconds = parse_hh_mm(&required(&CARDIO_TIME, "total cardio time")?);

    let energy_level = doc_all(doc, &ENERGY_MARK).len() as u32;
    let self_rating = doc_first(doc, &SELF_RATING).map(text).unwrap_or_default();

    let footer = doc_first(doc, &FOOTER).ok_or_else(|| src.missing("footer"))?;
    let footer_part = |selector: &Selector, anchor: &'static str| {
        first(footer, selector)
            .map(text)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| src.missing(anchor))
    };
    let month = footer_part(&FOOTER_MONTH, "footer month")?;
    let month_date = footer_part(&FOOTER_DAY, "footer day")?;
    let year = footer_part(&FOOTER_YEAR, "footer year")?;

    Ok(Header {
        name,
        muscles_used,
        total_duration_seconds,
        cardio_duration_seconds,
        energy_level,
        self_rating,
        month,
        month_date,
        year,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.test/log";

    fn page(body: &str) -> Html {
        Html::parse_document(&format!("<html><body>{}</body></html>", body))
    }

    const MINIMAL: &str = r#"
        <div class="rowSectionHeader"> Leg Day </div>
        <div class="musclesWorked"><span class="value">Quads, Glutes, Quads,</span></div>
        <span wicketpath="logResultsPanel_workoutSummary_totalWorkoutTime">0:45</span>
        <span wicketpath="logResultsPanel_workoutSummary_totalCardioTime">--</span>
        <div class="log-footer"><span class="log-month">Jan</span><span class="log-day">2</span><span class="log-year">2017</span></div>
    "#;

    #[test]
    fn optional_fields_default() {
        let header = extract(&page(MINIMAL), Source { url: URL }).unwrap();
        assert_eq!(header.name, "Leg Day");
        assert_eq!(header.muscles_used.len(), 2);
        assert_eq!(header.total_duration_seconds, Some(2700));
        assert_eq!(header.cardio_duration_seconds, None);
        assert_eq!(header.energy_level, 0);
        assert_eq!(header.self_rating, "");
        assert_eq!(header.month, "Jan");
    }

    #[test]
    fn missing_timer() {
        let body = MINIMAL.replace("totalCardioTime", "somethingElse");
        let err = extract(&page(&body), Source { url: URL }).unwrap_err();
        assert!(matches!(err, ExtractError::Structure { anchor: "total cardio time", .. }));
    }

    #[test]
    fn empty_footer_part() {
        let body = MINIMAL.replace(r#"<span class="log-year">2017</span>"#, r#"<span class="log-year"> </span>"#);
        let err = extract(&page(&body), Source { url: URL }).unwrap_err();
        assert!(matches!(err, ExtractError::Structure { anchor: "footer year", .. }));
    }
}
