pub mod audit;

use std::collections::HashSet;
use thiserror::Error;

pub use types::{
    Course, Enrollment, EnrollmentId, GaParams, Room, ScheduleRequest, ScheduleResult, Teacher,
};

/// Fatal conditions that abort a run. Everything else (conflicts, overflow,
/// unplaced students during search) is folded into fitness instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("no teachers available")]
    NoTeachers,
    #[error("no rooms available")]
    NoRooms,
    #[error("no enrollments to schedule")]
    NoEnrollments,
    #[error("course {course} has invalid lessons per week: {lessons}")]
    InvalidLessonCount { course: u64, lessons: u32 },
    #[error("no time slots found in teacher, room or enrollment availability")]
    NoSlotsAvailable,
    #[error("no teacher/room/slot combination can host a class")]
    NoFeasibleTemplates,
    #[error("enrollment {enrollment} has no feasible teacher/room/slot combination")]
    StudentWithoutTemplates { enrollment: EnrollmentId },
    #[error("cannot place every enrollment into a class")]
    Unsatisfiable,
    #[error("exact search gave up after {iterations} steps")]
    BacktrackLimit { iterations: usize },
}

impl ScheduleError {
    /// Stable identifier for the boundary layer.
    pub fn code(&self) -> &'static str {
        match self {
            ScheduleError::NoTeachers => "no_teachers",
            ScheduleError::NoRooms => "no_rooms",
            ScheduleError::NoEnrollments => "no_enrollments",
            ScheduleError::InvalidLessonCount { .. } => "invalid_lesson_count",
            ScheduleError::NoSlotsAvailable => "no_slots_available",
            ScheduleError::NoFeasibleTemplates => "no_feasible_templates",
            ScheduleError::StudentWithoutTemplates { .. } => "student_without_templates",
            ScheduleError::Unsatisfiable => "unsatisfiable",
            ScheduleError::BacktrackLimit { .. } => "backtrack_limit",
        }
    }

    /// True for problems detectable from the input alone, before any search.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ScheduleError::NoTeachers
                | ScheduleError::NoRooms
                | ScheduleError::NoEnrollments
                | ScheduleError::InvalidLessonCount { .. }
                | ScheduleError::NoSlotsAvailable
        )
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid request: {0}")]
    Msg(String),
}

pub fn validate(req: &ScheduleRequest) -> Result<(), ValidationError> {
    let mut errors: Vec<String> = Vec::new();

    if req.teachers.is_empty() {
        errors.push("teachers is empty".into());
    }
    if req.rooms.is_empty() {
        errors.push("rooms is empty".into());
    }
    if req.enrollments.is_empty() {
        errors.push("enrollments is empty".into());
    }
    if req.course.lessons_per_week == 0 {
        errors.push(format!("course {} has lessonsPerWeek=0", req.course.id));
    }

    fn chk_unique<I: ToString>(name: &str, ids: impl Iterator<Item = I>, errors: &mut Vec<String>) {
        let mut seen = HashSet::new();
        for id in ids {
            let s = id.to_string();
            if !seen.insert(s.clone()) {
                errors.push(format!("duplicate {name} id: {s}"));
            }
        }
    }
    chk_unique("teacher", req.teachers.iter().map(|x| &x.id), &mut errors);
    chk_unique("room", req.rooms.iter().map(|x| &x.id), &mut errors);
    chk_unique("enrollment", req.enrollments.iter().map(|x| x.id), &mut errors);

    let mut malformed: Vec<&str> = req
        .slot_set()
        .into_iter()
        .filter(|s| !s.is_valid_format())
        .map(|s| s.0.as_str())
        .collect();
    malformed.sort_unstable();
    for s in malformed {
        errors.push(format!("slot has invalid format: {s:?}"));
    }

    for r in &req.rooms {
        if r.capacity == 0 {
            errors.push(format!("room {} has capacity 0", r.id));
        }
    }

    if !req.teachers.iter().any(|t| req.course.accepts(t)) && !req.teachers.is_empty() {
        errors.push(format!(
            "no teacher holds qualification {:?}",
            req.course.required_qualification.as_deref().unwrap_or_default()
        ));
    }

    let lessons = req.course.lessons_per_week as usize;
    for e in &req.enrollments {
        let distinct: HashSet<_> = e.available_slots.iter().collect();
        if lessons > 0 && distinct.len() < lessons {
            errors.push(format!(
                "enrollment {} has {} available slots, needs {}",
                e.id,
                distinct.len(),
                lessons
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Msg(errors.join("; ")))
    }
}

/// A single-course scheduler. Runs synchronously and blocks until it either
/// produces a complete schedule or hits a fatal condition.
pub trait Scheduler: Send + Sync + 'static {
    fn schedule(&self, req: &ScheduleRequest) -> Result<ScheduleResult, ScheduleError>;
}
