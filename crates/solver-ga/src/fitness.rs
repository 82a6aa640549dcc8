//! Baseline-plus-reward-minus-penalty scoring.
//!
//! Hard violations are penalized per occurrence instead of rejecting the
//! individual outright, so the search still sees a gradient. The weights of
//! the three hard categories are owned by the evolution loop and escalate
//! when a category stops improving.

use crate::catalog::Catalog;
use crate::individual::Individual;
use std::collections::HashSet;
use types::PenaltyWeightsReport;

pub const BASELINE: f64 = 1_000.0;
pub const ASSIGNED_REWARD: f64 = 100.0;
pub const UNASSIGNED_PENALTY: f64 = 150.0;
pub const UNASSIGNED_HARD_PENALTY: f64 = 10_000.0;
pub const GHOST_CLASS_PENALTY: f64 = 1_000.0;
pub const STUDENT_SLOT_PENALTY: f64 = 5_000.0;
pub const DUPLICATE_STUDENT_PENALTY: f64 = 5_000.0;
pub const FULL_CLASS_BONUS: f64 = 10.0;
pub const SPARSE_CLASS_PENALTY: f64 = 10.0;
pub const PREFERRED_SLOT_BONUS: f64 = 2.0;
pub const VALIDITY_BONUS: f64 = 500.0;
pub const FULL_RATIO: f64 = 0.85;
pub const SPARSE_RATIO: f64 = 0.4;

pub const BASE_QUALIFICATION_WEIGHT: f64 = 50_000.0;
pub const BASE_CAPACITY_WEIGHT: f64 = 20_000.0;
pub const BASE_AVAILABILITY_WEIGHT: f64 = 50_000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HardCategory {
    Qualification,
    Capacity,
    Availability,
}

impl HardCategory {
    pub const ALL: [HardCategory; 3] = [
        HardCategory::Qualification,
        HardCategory::Capacity,
        HardCategory::Availability,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PenaltyWeights {
    pub qualification: f64,
    pub capacity: f64,
    pub availability: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            qualification: BASE_QUALIFICATION_WEIGHT,
            capacity: BASE_CAPACITY_WEIGHT,
            availability: BASE_AVAILABILITY_WEIGHT,
        }
    }
}

impl PenaltyWeights {
    pub fn get(&self, cat: HardCategory) -> f64 {
        match cat {
            HardCategory::Qualification => self.qualification,
            HardCategory::Capacity => self.capacity,
            HardCategory::Availability => self.availability,
        }
    }

    /// Multiplies one weight by `factor`, never beyond `cap` times its base.
    pub fn escalate(&mut self, cat: HardCategory, factor: f64, cap: f64) {
        let base = PenaltyWeights::default().get(cat);
        let w = match cat {
            HardCategory::Qualification => &mut self.qualification,
            HardCategory::Capacity => &mut self.capacity,
            HardCategory::Availability => &mut self.availability,
        };
        *w = (*w * factor).min(base * cap.max(1.0));
    }

    pub fn report(&self) -> PenaltyWeightsReport {
        PenaltyWeightsReport {
            qualification: self.qualification,
            capacity: self.capacity,
            availability: self.availability,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Violations {
    /// H1: classes taught by a teacher lacking the course qualification.
    pub qualification: u32,
    /// H2: students over room capacity, summed over classes.
    pub capacity: u32,
    /// H3: slots outside teacher/room availability or already claimed.
    pub availability: u32,
    pub student_slot: u32,
    pub duplicate_student: u32,
    pub ghost_classes: u32,
    pub unassigned: u32,
}

impl Violations {
    pub fn get(&self, cat: HardCategory) -> u32 {
        match cat {
            HardCategory::Qualification => self.qualification,
            HardCategory::Capacity => self.capacity,
            HardCategory::Availability => self.availability,
        }
    }

    pub fn hard(&self) -> u32 {
        self.qualification + self.capacity + self.availability
    }

    /// Violations that would make the schedule unusable as output.
    /// Qualification is excluded: when no qualified teacher exists every
    /// class carries it.
    pub fn blocking(&self) -> u32 {
        self.capacity + self.availability + self.student_slot + self.duplicate_student
    }

    pub fn total(&self) -> u32 {
        self.hard() + self.student_slot + self.duplicate_student + self.unassigned
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    pub score: f64,
    pub violations: Violations,
}

pub fn evaluate(cat: &Catalog, ind: &Individual, weights: &PenaltyWeights, validity_threshold: u32) -> Evaluation {
    let mut v = Violations::default();
    let mut score = BASELINE;
    let mut teacher_use: HashSet<(usize, usize)> = HashSet::new();
    let mut room_use: HashSet<(usize, usize)> = HashSet::new();
    let mut seen: HashSet<usize> = HashSet::new();

    for class in &ind.classes {
        let key = &cat.template(class.template).key;
        let teacher = &cat.teachers[key.teacher];
        let room = &cat.rooms[key.room];

        if class.students.is_empty() {
            v.ghost_classes += 1;
            score -= GHOST_CLASS_PENALTY;
        }

        // A widened catalog holds only unqualified templates.
        if !teacher.qualified && !cat.qualification_widened {
            v.qualification += 1;
            score -= weights.qualification;
        }

        let overflow = class.students.len().saturating_sub(room.capacity) as u32;
        if overflow > 0 {
            v.capacity += overflow;
            score -= weights.capacity * overflow as f64;
        }

        for &slot in &key.slots {
            let outside = !teacher.availability.contains(slot) || !room.availability.contains(slot);
            let reused = !teacher_use.insert((key.teacher, slot)) | !room_use.insert((key.room, slot));
            if outside || reused {
                v.availability += 1;
                score -= weights.availability;
            }
        }

        let mut placed = 0usize;
        for &s in &class.students {
            let student = &cat.students[s];
            if !student.availability.covers(&key.slots) {
                v.student_slot += 1;
                score -= STUDENT_SLOT_PENALTY;
                continue;
            }
            if !seen.insert(s) {
                v.duplicate_student += 1;
                score -= DUPLICATE_STUDENT_PENALTY;
                continue;
            }
            placed += 1;
            score += ASSIGNED_REWARD;
            if student.preferred.intersects(&key.slots) {
                score += PREFERRED_SLOT_BONUS;
            }
        }

        if placed > 0 {
            let ratio = class.students.len() as f64 / room.capacity.max(1) as f64;
            if ratio > FULL_RATIO {
                score += FULL_CLASS_BONUS;
            } else if ratio < SPARSE_RATIO {
                score -= SPARSE_CLASS_PENALTY;
            }
        }
    }

    let missing = cat.student_count().saturating_sub(seen.len());
    v.unassigned = missing as u32;
    score -= (UNASSIGNED_PENALTY + UNASSIGNED_HARD_PENALTY) * missing as f64;

    if v.total() <= validity_threshold {
        score += VALIDITY_BONUS;
    }

    Evaluation { score, violations: v }
}
