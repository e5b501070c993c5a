use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::{ExtractError, Source};
use crate::parser::coerce::{parse_clock, parse_weight_reps, WeightUnit};
use crate::parser::document::{ExerciseInfo, SetClassification, SetEntry, SetGroup, WeightMetric};
use crate::parser::markup::{all, first, own_text, sel, text};

static SET_TITLE: LazyLock<Selector> = LazyLock::new(|| sel("div.set-title"));
static LABEL: LazyLock<Selector> = LazyLock::new(|| sel("label.left-label"));
static LABEL_MARKER: LazyLock<Selector> = LazyLock::new(|| sel("span"));
static VALUE: LazyLock<Selector> = LazyLock::new(|| sel("div.inputWrapper"));

const WEIGHT_REPS_LABEL: &str = "WEIGHT/REPS";
const TIME_LABEL: &str = "TIME";

/// Rest markers available to one component.
pub struct RestMarkers<'a> {
    pub component: Option<u32>,
    /// `div.set-rest` values in markup order. One per set for straight and
    /// drop sets, one per entry inside grouped components.
    pub per_set: &'a [Option<u32>],
}

#[derive(Debug, Clone, Copy)]
pub struct SetPosition {
    pub index: usize,
    pub is_last: bool,
}

/// Entries of the set being built. Nothing reaches the component until the
/// set closes, so a drop discovered on the second entry can still zero the
/// first entry's rest.
#[derive(Debug)]
pub struct PendingSet {
    sequence: u32,
    classification: SetClassification,
    entries: Vec<SetEntry>,
}

impl PendingSet {
    pub fn new(sequence: u32, classification: SetClassification) -> Self {
        Self {
            sequence,
            classification,
            entries: Vec::new(),
        }
    }

    pub fn classification(&self) -> SetClassification {
        self.classification
    }

    /// STRAIGHT → DROP. Supersets keep their classification.
    pub fn mark_drop(&mut self) {
        if self.classification != SetClassification::Straight {
            return;
        }
        self.classification = SetClassification::Drop;
        // everything buffered so far precedes another entry
        for entry in &mut self.entries {
            entry.rest_time_seconds = Some(0);
        }
    }

    pub fn push(&mut self, mut entry: SetEntry, is_final: bool) {
        if self.classification == SetClassification::Drop && !is_final {
            entry.rest_time_seconds = Some(0);
        }
        self.entries.push(entry);
    }

    pub fn finish(self) -> SetGroup {
        let rest_time_seconds = self.entries.last().and_then(|e| e.rest_time_seconds);
        SetGroup {
            sequence: self.sequence,
            classification: self.classification,
            rest_time_seconds,
            set_components: self.entries,
        }
    }
}

pub fn extract_set<'e>(
    block: ElementRef<'_>,
    position: SetPosition,
    markers: &RestMarkers<'_>,
    exercises: &mut impl Iterator<Item = &'e ExerciseInfo>,
    entries_seen: &mut usize,
    src: Source<'_>,
) -> Result<SetGroup, ExtractError> {
    let classification = if all(block, &SET_TITLE).len() >= 2 {
        SetClassification::Super
    } else {
        SetClassification::Straight
    };
    let mut pending = PendingSet::new(position.index as u32 + 1, classification);

    let labels = all(block, &LABEL);
    let values = all(block, &VALUE);

    for (j, label) in labels.iter().enumerate() {
        let value = values.get(j).copied().ok_or_else(|| src.missing("set value"))?;
        let is_final = j + 1 == labels.len();

        // a drop only shows up from the second entry on
        if j > 0 && first(*label, &LABEL_MARKER).is_some_and(|m| text(m).to_lowercase().contains("drop")) {
            pending.mark_drop();
        }

        let exercise = exercises.next().ok_or_else(|| src.missing("exercise info"))?;
        let mut entry = parse_entry(&own_text(*label), &text(value), j as u32 + 1, src)?.with_exercise(exercise);
        entry.rest_time_seconds =
            resolve_rest(position, is_final, pending.classification(), markers, *entries_seen);

        pending.push(entry, is_final);
        *entries_seen += 1;
    }

    Ok(pending.finish())
}

/// Rest after one entry, before any drop-set override.
fn resolve_rest(
    position: SetPosition,
    is_final: bool,
    classification: SetClassification,
    markers: &RestMarkers<'_>,
    entries_seen: usize,
) -> Option<u32> {
    let grouped = classification == SetClassification::Super;

    if position.is_last && is_final {
        return markers.component;
    }
    if position.is_last && grouped {
        return None;
    }
    let index = if grouped { entries_seen } else { position.index };
    markers.per_set.get(index).copied().flatten()
}

fn parse_entry(label: &str, value: &str, sequence: u32, src: Source<'_>) -> Result<SetEntry, ExtractError> {
    let (weight_metric, weight_value, reps) = match label.to_uppercase().as_str() {
        WEIGHT_REPS_LABEL => {
            let wr = parse_weight_reps(value).map_err(|_| src.unrecognized("weight unit", value))?;
            let metric = match wr.unit {
                WeightUnit::Lbs => WeightMetric::Lbs,
                WeightUnit::Kg => WeightMetric::Kg,
            };
            (metric, wr.weight, wr.reps)
        }
        TIME_LABEL => (WeightMetric::Seconds, parse_clock(value).map(f64::from), None),
        _ => return Err(src.unrecognized("set label", label)),
    };

    Ok(SetEntry {
        sequence,
        weight_metric,
        weight_value,
        reps,
        rest_time_seconds: None,
        exercise_name: String::new(),
        exercise_link: None,
        exercise_muscle: None,
        exercise_movement_type: None,
        exercise_equipment: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rest: Option<u32>) -> SetEntry {
        SetEntry {
            sequence: 1,
            weight_metric: WeightMetric::Lbs,
            weight_value: Some(100.0),
            reps: Some(8),
            rest_time_seconds: rest,
            exercise_name: "Squat".into(),
            exercise_link: None,
            exercise_muscle: None,
            exercise_movement_type: None,
            exercise_equipment: None,
        }
    }

    #[test]
    fn drop_discovery_rewrites_buffered_entry() {
        let mut set = PendingSet::new(1, SetClassification::Straight);
        set.push(entry(Some(90)), false);
        set.mark_drop();
        set.push(entry(Some(90)), false);
        set.push(entry(Some(120)), true);
        let group = set.finish();
        assert_eq!(group.classification, SetClassification::Drop);
        let rests: Vec<_> = group.set_components.iter().map(|e| e.rest_time_seconds).collect();
        assert_eq!(rests, vec![Some(0), Some(0), Some(120)]);
        assert_eq!(group.rest_time_seconds, Some(120));
    }

    #[test]
    fn supersets_never_become_drops() {
        let mut set = PendingSet::new(1, SetClassification::Super);
        set.push(entry(Some(30)), false);
        set.mark_drop();
        set.push(entry(Some(60)), true);
        let group = set.finish();
        assert_eq!(group.classification, SetClassification::Super);
        assert_eq!(group.set_components[0].rest_time_seconds, Some(30));
    }

    #[test]
    fn two_entry_drop_zeroes_first() {
        let mut set = PendingSet::new(2, SetClassification::Straight);
        set.push(entry(None), false);
        set.mark_drop();
        set.push(entry(Some(45)), true);
        let group = set.finish();
        assert_eq!(group.set_components[0].rest_time_seconds, Some(0));
        assert_eq!(group.set_components[1].rest_time_seconds, Some(45));
    }

    fn set_block(body: &str) -> scraper::Html {
        scraper::Html::parse_fragment(&format!(r#"<div class="set">{}</div>"#, body))
    }

    fn run_set(html: &scraper::Html) -> SetGroup {
        let block = crate::parser::markup::doc_first(html, &sel("div.set")).unwrap();
        let exercise = ExerciseInfo {
            name: "Squat".into(),
            link: None,
            muscle: None,
            movement_type: None,
            equipment: None,
        };
        let group = [exercise];
        let per_set = [Some(60)];
        let markers = RestMarkers { component: Some(120), per_set: &per_set };
        let position = SetPosition { index: 0, is_last: false };
        let mut seen = 0;
        extract_set(block, position, &markers, &mut group.iter().cycle(), &mut seen, Source { url: "u" }).unwrap()
    }

    #[test]
    fn drop_marker_on_first_entry_is_ignored() {
        let html = set_block(
            r#"<div class="set-title">Set 1</div>
            <label class="left-label">WEIGHT/REPS <span>Drop 1</span></label>
            <div class="inputWrapper">100lbs x 8reps</div>"#,
        );
        let group = run_set(&html);
        assert_eq!(group.classification, SetClassification::Straight);
        assert_eq!(group.set_components[0].rest_time_seconds, Some(60));
    }

    #[test]
    fn drop_marker_on_second_entry() {
        let html = set_block(
            r#"<div class="set-title">Set 1</div>
            <label class="left-label">WEIGHT/REPS</label>
            <div class="inputWrapper">100lbs x 8reps</div>
            <label class="left-label">WEIGHT/REPS <span>Drop 1</span></label>
            <div class="inputWrapper">80lbs x 6reps</div>"#,
        );
        let group = run_set(&html);
        assert_eq!(group.classification, SetClassification::Drop);
        let rests: Vec<_> = group.set_components.iter().map(|e| e.rest_time_seconds).collect();
        assert_eq!(rests, vec![Some(0), Some(60)]);
    }

    #[test]
    fn rest_precedence() {
        let per_set = [Some(10), Some(20), Some(30), Some(40)];
        let markers = RestMarkers { component: Some(99), per_set: &per_set };
        let mid = SetPosition { index: 1, is_last: false };
        let last = SetPosition { index: 2, is_last: true };

        assert_eq!(resolve_rest(mid, true, SetClassification::Straight, &markers, 3), Some(20));
        assert_eq!(resolve_rest(mid, true, SetClassification::Super, &markers, 3), Some(40));
        assert_eq!(resolve_rest(last, true, SetClassification::Straight, &markers, 0), Some(99));
        assert_eq!(resolve_rest(last, true, SetClassification::Super, &markers, 0), Some(99));
        assert_eq!(resolve_rest(last, false, SetClassification::Super, &markers, 0), None);
        assert_eq!(resolve_rest(last, false, SetClassification::Drop, &markers, 0), Some(30));

        let sparse = RestMarkers { component: None, per_set: &per_set[..1] };
        assert_eq!(resolve_rest(mid, true, SetClassification::Straight, &sparse, 0), None);
    }
}
