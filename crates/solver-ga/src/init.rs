//! Template drawing and the two individual-construction strategies.

use crate::catalog::Catalog;
use crate::individual::{ClassAssignment, Individual, Occupancy};
use crate::repair::repair;
use rand::distributions::Distribution;
use rand::seq::SliceRandom;
use rand::Rng;
use types::GaParams;

/// Weighted draw of a template that fits `occ`.
///
/// Rejection-samples up to `attempts` times, then scans every template
/// that still fits, and only when none does returns a conflicting draw.
pub fn draw_template<R: Rng + ?Sized>(cat: &Catalog, occ: &Occupancy, attempts: usize, rng: &mut R) -> usize {
    let mut last = cat.sampler.sample(rng);
    for _ in 0..attempts.min(2 * cat.templates.len()).max(1) {
        if occ.fits(cat, last) {
            return last;
        }
        last = cat.sampler.sample(rng);
    }
    let free: Vec<usize> = (0..cat.templates.len()).filter(|&t| occ.fits(cat, t)).collect();
    free.choose_weighted(rng, |&t| cat.template(t).weight())
        .copied()
        .unwrap_or(last)
}

/// A fresh single-student class for `student` that fits `occ`, preferring
/// shapes more students could join.
pub fn targeted_class<R: Rng + ?Sized>(
    cat: &Catalog,
    student: usize,
    occ: &Occupancy,
    rng: &mut R,
) -> Option<ClassAssignment> {
    let options: Vec<usize> = cat.student_combos[student]
        .iter()
        .filter_map(|combo| cat.combo_templates.get(combo))
        .flatten()
        .copied()
        .filter(|&t| occ.fits(cat, t))
        .collect();
    let &template = options.choose_weighted(rng, |&t| cat.template(t).weight()).ok()?;
    let mut class = ClassAssignment::empty(template);
    class.students.insert(student);
    Some(class)
}

pub fn random_individual<R: Rng + ?Sized>(cat: &Catalog, params: &GaParams, rng: &mut R) -> Individual {
    let mut occ = Occupancy::default();
    let mut picked = Vec::with_capacity(cat.target_classes);
    for _ in 0..cat.target_classes {
        let t = draw_template(cat, &occ, params.draw_attempts, rng);
        occ.claim(cat, t);
        picked.push(t);
    }
    let mut ind = Individual::with_classes(picked);
    assign_students_greedily(cat, &mut ind);
    ind
}

pub fn feasible_individual<R: Rng + ?Sized>(cat: &Catalog, rng: &mut R) -> Individual {
    let mut order: Vec<usize> = (0..cat.templates.len()).collect();
    order.shuffle(rng);
    order.sort_by_key(|&t| std::cmp::Reverse(cat.template(t).candidates.len()));

    let mut occ = Occupancy::default();
    let mut picked = Vec::with_capacity(cat.target_classes);
    for t in order {
        if picked.len() >= cat.target_classes {
            break;
        }
        if occ.fits(cat, t) {
            occ.claim(cat, t);
            picked.push(t);
        }
    }
    let mut ind = Individual::with_classes(picked);
    assign_students_greedily(cat, &mut ind);
    ind
}

/// Fills classes from their candidate pools, largest pool first, then drops
/// leftovers into the fullest compatible class.
pub fn assign_students_greedily(cat: &Catalog, ind: &mut Individual) {
    let mut unassigned: std::collections::BTreeSet<usize> = (0..cat.student_count()).collect();
    for c in &mut ind.classes {
        c.students.clear();
    }

    let mut order: Vec<usize> = (0..ind.classes.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(cat.template(ind.classes[i].template).candidates.len()));

    for i in order {
        let class = &mut ind.classes[i];
        let capacity = cat.capacity(class.template);
        for &s in &cat.template(class.template).candidates {
            if class.students.len() >= capacity {
                break;
            }
            if unassigned.contains(&s) && cat.fits_student(class.template, s) {
                class.students.insert(s);
                unassigned.remove(&s);
            }
        }
    }

    let leftovers: Vec<usize> = unassigned.iter().copied().collect();
    for s in leftovers {
        if let Some(i) = ind.best_fit(cat, s) {
            ind.classes[i].students.insert(s);
            unassigned.remove(&s);
        }
    }
    ind.unassigned = unassigned;
}

/// Mostly feasible-greedy seeds with a random remainder, all repaired once.
pub fn initial_population<R: Rng + ?Sized>(cat: &Catalog, params: &GaParams, rng: &mut R) -> Vec<Individual> {
    let size = params.population_size.max(2);
    let feasible = ((size as f64) * params.feasible_fraction.clamp(0.0, 1.0)).round() as usize;
    (0..size)
        .map(|i| {
            let mut ind = if i < feasible {
                feasible_individual(cat, rng)
            } else {
                random_individual(cat, params, rng)
            };
            repair(cat, &mut ind, params, rng);
            ind
        })
        .collect()
}
