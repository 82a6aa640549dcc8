//! Restores the individual invariants after any structural change.

use crate::catalog::Catalog;
use crate::individual::{Individual, Occupancy};
use crate::init::{draw_template, targeted_class};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeSet;
use types::GaParams;

pub fn repair<R: Rng + ?Sized>(cat: &Catalog, ind: &mut Individual, params: &GaParams, rng: &mut R) {
    enforce_resource_conflicts(cat, ind, params, rng);
    normalize_students(cat, ind);
    fill_unassigned(cat, ind, rng);
}

/// Replaces classes that collide with earlier ones. Gives up on a class
/// after `repair_attempts` redraws and leaves the collision for fitness.
pub fn enforce_resource_conflicts<R: Rng + ?Sized>(
    cat: &Catalog,
    ind: &mut Individual,
    params: &GaParams,
    rng: &mut R,
) {
    let mut committed = Occupancy::default();
    for idx in 0..ind.classes.len() {
        let mut attempts = 0;
        loop {
            let template = ind.classes[idx].template;
            if committed.fits(cat, template) {
                committed.claim(cat, template);
                break;
            }
            attempts += 1;
            if attempts > params.repair_attempts {
                break;
            }
            let others = Occupancy::without(cat, &ind.classes, idx);
            let replacement = draw_template(cat, &others, params.draw_attempts, rng);
            let class = &mut ind.classes[idx];
            ind.unassigned.extend(std::mem::take(&mut class.students));
            class.template = replacement;
        }
    }
}

/// Drops students that no longer fit their class, sit in a second class or
/// overflow capacity, then recomputes the unassigned set.
pub fn normalize_students(cat: &Catalog, ind: &mut Individual) {
    let mut assigned: BTreeSet<usize> = BTreeSet::new();
    for class in &mut ind.classes {
        let capacity = cat.capacity(class.template);
        let mut kept = BTreeSet::new();
        for &s in &class.students {
            if s >= cat.student_count() || !cat.fits_student(class.template, s) {
                continue;
            }
            if assigned.contains(&s) || kept.len() >= capacity {
                continue;
            }
            kept.insert(s);
            assigned.insert(s);
        }
        class.students = kept;
    }
    ind.unassigned = (0..cat.student_count()).filter(|s| !assigned.contains(s)).collect();
}

/// Places unassigned students into the fullest compatible class, or opens a
/// targeted class for them.
pub fn fill_unassigned<R: Rng + ?Sized>(cat: &Catalog, ind: &mut Individual, rng: &mut R) {
    if ind.unassigned.is_empty() {
        return;
    }
    let mut pending: Vec<usize> = ind.unassigned.iter().copied().collect();
    pending.shuffle(rng);

    for s in pending {
        if let Some(i) = ind.best_fit(cat, s) {
            ind.classes[i].students.insert(s);
            ind.unassigned.remove(&s);
            continue;
        }
        let occ = Occupancy::of(cat, &ind.classes);
        if let Some(class) = targeted_class(cat, s, &occ, rng) {
            ind.classes.push(class);
            ind.unassigned.remove(&s);
        }
    }
}
