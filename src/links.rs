use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::info;

static WORKOUT_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://bodyspace\.bodybuilding\.com/workouts/viewworkoutlog/([^/\s]+)/([0-9a-fA-F]+)/?$")
        .unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkoutUrl {
    pub url: String,
    pub username: String,
    pub log_id: String,
}

/// Split a workout-log URL into its owner and log id.
pub fn parse_workout_url(url: &str) -> Option<WorkoutUrl> {
    let caps = WORKOUT_URL_RE.captures(url.trim())?;
    Some(WorkoutUrl {
        url: url.trim().to_string(),
        username: caps[1].to_string(),
        log_id: caps[2].to_string(),
    })
}

/// Read a link list (one URL per line) and keep the workout-log pages.
pub fn read_link_file(path: &Path) -> Result<Vec<WorkoutUrl>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read link list {}", path.display()))?;
    let links = filter_links(&raw);
    info!(
        "Workout links in {}: {} ({} lines)",
        path.display(),
        links.len(),
        raw.lines().count()
    );
    Ok(links)
}

fn filter_links(raw: &str) -> Vec<WorkoutUrl> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(parse_workout_url)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_and_id() {
        let w = parse_workout_url(
            "https://bodyspace.bodybuilding.com/workouts/viewworkoutlog/-NYSE1-/4fb56f36b488e39f44f45352",
        )
        .unwrap();
        assert_eq!(w.username, "-NYSE1-");
        assert_eq!(w.log_id, "4fb56f36b488e39f44f45352");
    }

    #[test]
    fn rejects_other_pages() {
        assert!(parse_workout_url("https://www.bodybuilding.com/exercises/pistol-squat").is_none());
        assert!(parse_workout_url("https://bodyspace.bodybuilding.com/workouts/viewworkoutlog/zzyt").is_none());
    }

    #[test]
    fn filters_link_list() {
        let raw = "\
# exported links
https://bodyspace.bodybuilding.com/workouts/viewworkoutlog/zzyt/5721ad540cf2b58f38ced9d7

https://www.bodybuilding.com/exercises/pistol-squat
  https://bodyspace.bodybuilding.com/workouts/viewworkoutlog/12laynew/58097f260cf27a6fb6996c8d
";
        let links = filter_links(raw);
        let owners: Vec<&str> = links.iter().map(|l| l.username.as_str()).collect();
        assert_eq!(owners, vec!["zzyt", "12laynew"]);
    }
}
