use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use utoipa::ToSchema;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash, PartialOrd, Ord,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}
id_newtype!(TeacherId);
id_newtype!(RoomId);

macro_rules! int_id_newtype {
    ($name:ident) => {
        #[derive(
            Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash, PartialOrd, Ord,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}
int_id_newtype!(CourseId);
int_id_newtype!(EnrollmentId);

pub const DEFAULT_DAY: &str = "MON";
pub const DEFAULT_TIME_OF_DAY: &str = "MORNING";

/// A schedulable `<DAY>_<TIMEOFDAY>` unit, e.g. `MON_MORNING`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SlotId(pub String);

impl SlotId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn is_valid_format(&self) -> bool {
        match self.0.split_once('_') {
            Some((day, time)) => !day.is_empty() && !time.is_empty(),
            None => false,
        }
    }

    /// Splits into `(day, time_of_day)`. Malformed ids fall back to
    /// [`DEFAULT_DAY`] / [`DEFAULT_TIME_OF_DAY`] for the missing part.
    pub fn parts(&self) -> (&str, &str) {
        match self.0.split_once('_') {
            Some((day, time)) => (
                if day.is_empty() { DEFAULT_DAY } else { day },
                if time.is_empty() { DEFAULT_TIME_OF_DAY } else { time },
            ),
            None if self.0.is_empty() => (DEFAULT_DAY, DEFAULT_TIME_OF_DAY),
            None => (self.0.as_str(), DEFAULT_TIME_OF_DAY),
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    #[serde(default)]
    pub title: String,
    pub lessons_per_week: u32,
    #[serde(default)]
    pub required_qualification: Option<String>,
}

impl Course {
    pub fn accepts(&self, teacher: &Teacher) -> bool {
        match self.required_qualification.as_deref() {
            None | Some("") => true,
            Some(tag) => teacher.qualifications.iter().any(|q| q.contains(tag)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Teacher {
    pub id: TeacherId,
    #[serde(default)]
    pub availability: Vec<SlotId>,
    #[serde(default)]
    pub qualifications: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Room {
    pub id: RoomId,
    pub capacity: u32,
    /// Empty means "free at every pooled slot".
    #[serde(default)]
    pub availability: Vec<SlotId>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: EnrollmentId,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub available_slots: Vec<SlotId>,
    #[serde(default)]
    pub preferred_slots: Vec<SlotId>,
}

/// Tuning knobs for one optimization run. Every field has a default, so a
/// partial JSON object is accepted.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GaParams {
    pub population_size: usize,
    pub generations: usize,
    pub mutation_rate: f64,
    pub max_mutation_rate: f64,
    pub crossover_rate: f64,
    pub elite_fraction: f64,
    pub tournament_size: usize,
    /// Share of the initial population built by the feasible-greedy strategy.
    pub feasible_fraction: f64,
    /// Share of the population (best first) that gets the local-search pass
    /// and whose violations drive penalty escalation.
    pub top_fraction: f64,
    pub violation_window: usize,
    pub penalty_escalation: f64,
    /// Upper bound on a penalty weight, as a multiple of its base value.
    pub penalty_cap: f64,
    pub stagnation_limit: usize,
    pub max_classes_per_teacher: usize,
    pub repair_attempts: usize,
    pub draw_attempts: usize,
    pub backtrack_iteration_limit: usize,
    pub validity_threshold: u32,
    pub seed: Option<u64>,
    pub term_start: String,
    pub term_end: String,
}

impl Default for GaParams {
    fn default() -> Self {
        Self {
            population_size: 50,
            generations: 150,
            mutation_rate: 0.1,
            max_mutation_rate: 0.5,
            crossover_rate: 0.8,
            elite_fraction: 0.2,
            tournament_size: 3,
            feasible_fraction: 0.7,
            top_fraction: 0.2,
            violation_window: 5,
            penalty_escalation: 1.5,
            penalty_cap: 10.0,
            stagnation_limit: 20,
            max_classes_per_teacher: 3,
            repair_attempts: 20,
            draw_attempts: 64,
            backtrack_iteration_limit: 1_000_000,
            validity_threshold: 0,
            seed: None,
            term_start: "2025-11-03".into(),
            term_end: "2026-01-03".into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct ScheduleRequest {
    pub course: Course,
    pub teachers: Vec<Teacher>,
    pub rooms: Vec<Room>,
    pub enrollments: Vec<Enrollment>,
    #[serde(default)]
    pub params: Option<GaParams>,
}

impl ScheduleRequest {
    pub fn slot_set(&self) -> HashSet<&SlotId> {
        self.teachers
            .iter()
            .flat_map(|t| t.availability.iter())
            .chain(self.rooms.iter().flat_map(|r| r.availability.iter()))
            .chain(self.enrollments.iter().flat_map(|e| e.available_slots.iter()))
            .collect()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledClass {
    pub course_id: CourseId,
    pub teacher_id: TeacherId,
    pub room_id: RoomId,
    pub day_of_week: String,
    pub time_slot: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledEnrollment {
    /// 1-based index into `ScheduleResult::scheduled_classes`.
    pub scheduled_class_id: u64,
    pub enrollment_id: EnrollmentId,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
pub struct PenaltyWeightsReport {
    pub qualification: f64,
    pub capacity: f64,
    pub availability: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStats {
    pub generation: usize,
    pub best_score: f64,
    pub mean_score: f64,
    pub best_unassigned: usize,
    pub best_hard_violations: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub penalty_weights: PenaltyWeightsReport,
    pub mutation_rate: f64,
    pub population_size: usize,
    pub generations: usize,
    pub templates: usize,
    pub best_score: f64,
    pub unassigned_before_fallback: usize,
    pub used_fallback: bool,
    pub qualification_widened: bool,
    #[serde(default)]
    pub history: Vec<GenerationStats>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResult {
    pub scheduled_classes: Vec<ScheduledClass>,
    pub scheduled_enrollments: Vec<ScheduledEnrollment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}
