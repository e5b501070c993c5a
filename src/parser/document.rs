use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One scraped workout log, nested the way the page renders it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutDocument {
    pub url: String,
    pub username: Option<String>,
    pub name: String,
    pub muscles_used: BTreeSet<String>,
    pub total_duration_seconds: Option<u32>,
    pub cardio_duration_seconds: Option<u32>,
    pub energy_level: u32,
    pub self_rating: String,
    pub month: String,
    pub month_date: String,
    pub year: String,
    pub workout_components: Vec<WorkoutComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutComponent {
    pub sequence: u32,
    pub rest_time_seconds: Option<u32>,
    pub exercise_group: Vec<ExerciseInfo>,
    pub sets: Vec<SetGroup>,
}

impl WorkoutComponent {
    pub fn is_grouped(&self) -> bool {
        self.exercise_group.len() > 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseInfo {
    pub name: String,
    pub link: Option<String>,
    pub muscle: Option<String>,
    pub movement_type: Option<String>,
    pub equipment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SetClassification {
    Straight,
    Super,
    Drop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetGroup {
    pub sequence: u32,
    pub classification: SetClassification,
    pub rest_time_seconds: Option<u32>,
    pub set_components: Vec<SetEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightMetric {
    Lbs,
    Kg,
    Seconds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetEntry {
    pub sequence: u32,
    pub weight_metric: WeightMetric,
    pub weight_value: Option<f64>,
    pub reps: Option<u32>,
    pub rest_time_seconds: Option<u32>,
    pub exercise_name: String,
    pub exercise_link: Option<String>,
    pub exercise_muscle: Option<String>,
    pub exercise_movement_type: Option<String>,
    pub exercise_equipment: Option<String>,
}

impl SetEntry {
    /// Copy the exercise fields onto the entry.
    pub fn with_exercise(mut self, exercise: &ExerciseInfo) -> Self {
        self.exercise_name = exercise.name.clone();
        self.exercise_link = exercise.link.clone();
        self.exercise_muscle = exercise.muscle.clone();
        self.exercise_movement_type = exercise.movement_type.clone();
        self.exercise_equipment = exercise.equipment.clone();
        self
    }
}

impl WorkoutDocument {
    pub fn entry_count(&self) -> usize {
        self.workout_components
            .iter()
            .flat_map(|c| &c.sets)
            .map(|s| s.set_components.len())
            .sum()
    }
}
