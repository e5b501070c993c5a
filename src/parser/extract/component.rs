use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::sets::{extract_set, RestMarkers, SetPosition};
use super::{ExtractError, Source};
use crate::parser::coerce::parse_rest_time;
use crate::parser::document::{ExerciseInfo, WorkoutComponent};
use crate::parser::markup::{all, attr, doc_all, first, sel, text};

static OVERVIEW: LazyLock<Selector> = LazyLock::new(|| sel("div.exercise-overview"));
static DETAILS: LazyLock<Selector> = LazyLock::new(|| sel("div.exercise-details"));
static COMPONENT_REST: LazyLock<Selector> = LazyLock::new(|| sel("div.exercise-rest"));
static EXERCISE_INFO: LazyLock<Selector> = LazyLock::new(|| sel("div.exercise-info"));
static EXERCISE_NAME: LazyLock<Selector> = LazyLock::new(|| sel("h3"));
static EXERCISE_LINK: LazyLock<Selector> = LazyLock::new(|| sel("a[href]"));
static EXERCISE_MUSCLE: LazyLock<Selector> = LazyLock::new(|| sel(".exercise-muscle"));
static EXERCISE_TYPE: LazyLock<Selector> = LazyLock::new(|| sel(".exercise-type"));
static EXERCISE_EQUIPMENT: LazyLock<Selector> = LazyLock::new(|| sel(".exercise-equipment"));
static SET: LazyLock<Selector> = LazyLock::new(|| sel("div.set"));
static SET_REST: LazyLock<Selector> = LazyLock::new(|| sel("div.set-rest"));

/// Every workout component, in markup order.
///
/// Overview blocks (exercise info) and details blocks (sets) are separate
/// sibling lists paired by index. Component rest markers form a third list
/// that may be shorter; trailing components then have no rest.
pub fn extract_all(doc: &Html, src: Source<'_>) -> Result<Vec<WorkoutComponent>, ExtractError> {
    let overviews = doc_all(doc, &OVERVIEW);
    let details = doc_all(doc, &DETAILS);
    let rests: Vec<Option<u32>> = doc_all(doc, &COMPONENT_REST)
        .into_iter()
        .map(|r| parse_rest_time(&text(r)))
        .collect();

    overviews
        .iter()
        .enumerate()
        .map(|(i, overview)| {
            let detail = details
                .get(i)
                .copied()
                .ok_or_else(|| src.missing("exercise details"))?;
            let rest = rests.get(i).copied().flatten();
            extract_component(i as u32 + 1, *overview, detail, rest, src)
        })
        .collect()
}

fn extract_component(
    sequence: u32,
    overview: ElementRef<'_>,
    details: ElementRef<'_>,
    rest_time_seconds: Option<u32>,
    src: Source<'_>,
) -> Result<WorkoutComponent, ExtractError> {
    let exercise_group = all(overview, &EXERCISE_INFO)
        .into_iter()
        .map(|info| exercise_info(info, src))
        .collect::<Result<Vec<_>, _>>()?;
    if exercise_group.is_empty() {
        return Err(src.missing("exercise info"));
    }

    let set_rests: Vec<Option<u32>> = all(details, &SET_REST)
        .into_iter()
        .map(|r| parse_rest_time(&text(r)))
        .collect();
    let markers = RestMarkers {
        component: rest_time_seconds,
        per_set: &set_rests,
    };

    let blocks = all(details, &SET);
    let mut exercises = exercise_group.iter().cycle();
    let mut entries_seen = 0usize;
    let mut sets = Vec::with_capacity(blocks.len());

    for (index, block) in blocks.iter().enumerate() {
        let position = SetPosition {
            index,
            is_last: index + 1 == blocks.len(),
        };
        let set = extract_set(*block, position, &markers, &mut exercises, &mut entries_seen, src)?;
        sets.push(set);
    }

    Ok(WorkoutComponent {
        sequence,
        rest_time_seconds,
        exercise_group,
        sets,
    })
}

fn exercise_info(info: ElementRef<'_>, src: Source<'_>) -> Result<ExerciseInfo, ExtractError> {
    let optional = |selector: &Selector| first(info, selector).map(text).filter(|t| !t.is_empty());

    let name = optional(&EXERCISE_NAME).ok_or_else(|| src.missing("exercise name"))?;
    Ok(ExerciseInfo {
        name,
        link: first(info, &EXERCISE_LINK).and_then(|a| attr(a, "href")),
        muscle: optional(&EXERCISE_MUSCLE),
        movement_type: optional(&EXERCISE_TYPE),
        equipment: optional(&EXERCISE_EQUIPMENT),
    })
}
