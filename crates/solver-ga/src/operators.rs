//! Crossover and the four mutation moves.

use crate::catalog::Catalog;
use crate::individual::{Individual, Occupancy};
use crate::init::{draw_template, targeted_class};
use crate::repair::repair;
use rand::seq::{IteratorRandom, SliceRandom};
use rand::Rng;
use types::GaParams;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
    InsertUnassigned,
    MoveStudent,
    SwapStudents,
    ReconfigureClass,
}

impl Mutation {
    pub const ALL: [Mutation; 4] = [
        Mutation::InsertUnassigned,
        Mutation::MoveStudent,
        Mutation::SwapStudents,
        Mutation::ReconfigureClass,
    ];

    /// Applies the move in place. Returns false when it was a no-op.
    pub fn apply<R: Rng + ?Sized>(self, cat: &Catalog, ind: &mut Individual, params: &GaParams, rng: &mut R) -> bool {
        match self {
            Mutation::InsertUnassigned => insert_unassigned(cat, ind, rng),
            Mutation::MoveStudent => move_student(cat, ind, rng),
            Mutation::SwapStudents => swap_students(cat, ind, rng),
            Mutation::ReconfigureClass => reconfigure_class(cat, ind, params, rng),
        }
    }
}

/// Uniform per-gene crossover. With probability `1 - crossover_rate` the
/// child is a plain copy of one parent.
pub fn crossover<R: Rng + ?Sized>(
    cat: &Catalog,
    a: &Individual,
    b: &Individual,
    params: &GaParams,
    rng: &mut R,
) -> Individual {
    if a.classes.is_empty() && b.classes.is_empty() {
        return a.clone();
    }
    if rng.gen::<f64>() >= params.crossover_rate {
        return if rng.gen_bool(0.5) { a.clone() } else { b.clone() };
    }

    let len = a.classes.len().max(b.classes.len());
    let mut child = Individual::default();
    for i in 0..len {
        let gene = match (a.classes.get(i), b.classes.get(i)) {
            (Some(x), Some(y)) => {
                if rng.gen_bool(0.5) {
                    x
                } else {
                    y
                }
            }
            (Some(x), None) => x,
            (None, Some(y)) => y,
            (None, None) => unreachable!("index below the longer parent"),
        };
        child.classes.push(gene.clone());
    }
    repair(cat, &mut child, params, rng);
    child
}

/// Runs each move with probability `rate` in random order and repairs if
/// anything changed.
pub fn mutate<R: Rng + ?Sized>(cat: &Catalog, ind: &mut Individual, rate: f64, params: &GaParams, rng: &mut R) -> bool {
    let mut moves = Mutation::ALL;
    moves.shuffle(rng);
    let mut changed = false;
    for m in moves {
        if rng.gen::<f64>() < rate {
            changed |= m.apply(cat, ind, params, rng);
        }
    }
    if changed {
        repair(cat, ind, params, rng);
    }
    changed
}

pub fn insert_unassigned<R: Rng + ?Sized>(cat: &Catalog, ind: &mut Individual, rng: &mut R) -> bool {
    let Some(&student) = ind.unassigned.iter().choose(rng) else {
        return false;
    };
    let open: Vec<usize> = (0..ind.classes.len())
        .filter(|&i| ind.classes[i].accepts(cat, student))
        .collect();
    if let Some(&i) = open.choose(rng) {
        ind.classes[i].students.insert(student);
        ind.unassigned.remove(&student);
        return true;
    }
    let occ = Occupancy::of(cat, &ind.classes);
    match targeted_class(cat, student, &occ, rng) {
        Some(class) => {
            ind.classes.push(class);
            ind.unassigned.remove(&student);
            true
        }
        None => false,
    }
}

pub fn move_student<R: Rng + ?Sized>(cat: &Catalog, ind: &mut Individual, rng: &mut R) -> bool {
    let populated: Vec<usize> = (0..ind.classes.len())
        .filter(|&i| !ind.classes[i].students.is_empty())
        .collect();
    let Some(&from) = populated.choose(rng) else {
        return false;
    };
    let Some(&student) = ind.classes[from].students.iter().choose(rng) else {
        return false;
    };
    let targets: Vec<usize> = (0..ind.classes.len())
        .filter(|&i| i != from && ind.classes[i].accepts(cat, student))
        .collect();
    let Some(&to) = targets.choose(rng) else {
        return false;
    };
    ind.classes[from].students.remove(&student);
    ind.classes[to].students.insert(student);
    true
}

/// Swaps one student between two classes when each can attend the other's slots.
pub fn swap_students<R: Rng + ?Sized>(cat: &Catalog, ind: &mut Individual, rng: &mut R) -> bool {
    let populated: Vec<usize> = (0..ind.classes.len())
        .filter(|&i| !ind.classes[i].students.is_empty())
        .collect();
    if populated.len() < 2 {
        return false;
    }
    let picked: Vec<usize> = populated.choose_multiple(rng, 2).copied().collect();
    let (ca, cb) = (picked[0], picked[1]);
    let (Some(&sa), Some(&sb)) = (
        ind.classes[ca].students.iter().choose(rng),
        ind.classes[cb].students.iter().choose(rng),
    ) else {
        return false;
    };
    if !cat.fits_student(ind.classes[cb].template, sa) || !cat.fits_student(ind.classes[ca].template, sb) {
        return false;
    }
    ind.classes[ca].students.remove(&sa);
    ind.classes[cb].students.remove(&sb);
    ind.classes[ca].students.insert(sb);
    ind.classes[cb].students.insert(sa);
    true
}

/// Gives one class a fresh non-conflicting shape; its students become unassigned.
pub fn reconfigure_class<R: Rng + ?Sized>(cat: &Catalog, ind: &mut Individual, params: &GaParams, rng: &mut R) -> bool {
    if ind.classes.is_empty() {
        return false;
    }
    let idx = rng.gen_range(0..ind.classes.len());
    let others = Occupancy::without(cat, &ind.classes, idx);
    let template = draw_template(cat, &others, params.draw_attempts, rng);
    let class = &mut ind.classes[idx];
    ind.unassigned.extend(std::mem::take(&mut class.students));
    class.template = template;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::ClassAssignment;
    use crate::testing::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeSet;

    // templates: 0 = t1/r1/MON, 1 = t1/r1/TUE
    fn catalog() -> Catalog {
        Catalog::build(
            &request(
                1,
                vec![teacher("t1", &["MON_AM", "TUE_AM"])],
                vec![room("r1", 2, &[])],
                vec![
                    enrollment(1, &["MON_AM"]),
                    enrollment(2, &["MON_AM", "TUE_AM"]),
                    enrollment(3, &["TUE_AM"]),
                    enrollment(4, &["MON_AM", "TUE_AM"]),
                ],
            ),
            3,
        )
        .unwrap()
    }

    fn class(template: usize, students: &[usize]) -> ClassAssignment {
        ClassAssignment {
            template,
            students: students.iter().copied().collect(),
        }
    }

    fn consistent(cat: &Catalog, ind: &Individual) -> bool {
        let assigned = ind.assigned();
        let total: usize = ind.classes.iter().map(|c| c.students.len()).sum();
        total == assigned.len()
            && assigned.is_disjoint(&ind.unassigned)
            && assigned.len() + ind.unassigned.len() == cat.student_count()
    }

    #[test]
    fn crossover_takes_genes_from_both_parents() {
        let cat = catalog();
        let a = Individual {
            classes: vec![class(0, &[0, 1])],
            unassigned: BTreeSet::from([2, 3]),
        };
        let b = Individual {
            classes: vec![class(0, &[0]), class(1, &[2, 3])],
            unassigned: BTreeSet::from([1]),
        };
        let params = GaParams {
            crossover_rate: 1.0,
            ..GaParams::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        for _ in 0..20 {
            let child = crossover(&cat, &a, &b, &params, &mut rng);
            // the tail gene only exists in b
            assert!(child.classes.iter().any(|c| c.template == 1));
            assert!(consistent(&cat, &child));
        }
    }

    #[test]
    fn skipped_crossover_clones_a_parent() {
        let cat = catalog();
        let a = Individual {
            classes: vec![class(0, &[0, 1])],
            unassigned: BTreeSet::from([2, 3]),
        };
        let b = Individual {
            classes: vec![class(1, &[2, 3])],
            unassigned: BTreeSet::from([0, 1]),
        };
        let params = GaParams {
            crossover_rate: 0.0,
            ..GaParams::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(22);
        for _ in 0..10 {
            let child = crossover(&cat, &a, &b, &params, &mut rng);
            assert!(child == a || child == b);
        }
    }

    #[test]
    fn insert_uses_existing_class_or_opens_one() {
        let cat = catalog();
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        let mut ind = Individual {
            classes: vec![class(0, &[])],
            unassigned: BTreeSet::from([0]),
        };
        assert!(insert_unassigned(&cat, &mut ind, &mut rng));
        assert_eq!(ind.classes[0].students, BTreeSet::from([0]));

        let mut ind = Individual {
            classes: vec![class(0, &[0, 1])],
            unassigned: BTreeSet::from([2]),
        };
        assert!(insert_unassigned(&cat, &mut ind, &mut rng));
        assert_eq!(ind.classes.len(), 2);
        assert_eq!(ind.classes[1].template, 1);

        let mut done = Individual {
            classes: vec![class(0, &[0, 1])],
            unassigned: BTreeSet::new(),
        };
        assert!(!insert_unassigned(&cat, &mut done, &mut rng));
    }

    #[test]
    fn move_requires_a_compatible_target() {
        let cat = catalog();
        let mut rng = ChaCha8Rng::seed_from_u64(24);
        // student 0 only fits Monday, and Monday is the only class
        let mut stuck = Individual {
            classes: vec![class(0, &[0]), class(1, &[2, 3])],
            unassigned: BTreeSet::from([1]),
        };
        let mut moved = false;
        for _ in 0..64 {
            if move_student(&cat, &mut stuck, &mut rng) {
                moved = true;
                break;
            }
        }
        // the only legal move is 3 from Tuesday to Monday
        assert!(moved);
        assert_eq!(stuck.classes[0].students, BTreeSet::from([0, 3]));
        assert_eq!(stuck.classes[1].students, BTreeSet::from([2]));
    }

    #[test]
    fn swap_checks_both_directions() {
        let cat = catalog();
        let mut rng = ChaCha8Rng::seed_from_u64(25);
        // 0 cannot attend Tuesday, 2 cannot attend Monday
        let mut ind = Individual {
            classes: vec![class(0, &[0]), class(1, &[2])],
            unassigned: BTreeSet::from([1, 3]),
        };
        for _ in 0..10 {
            assert!(!swap_students(&cat, &mut ind, &mut rng));
        }

        let mut ind = Individual {
            classes: vec![class(0, &[1]), class(1, &[3])],
            unassigned: BTreeSet::from([0, 2]),
        };
        assert!(swap_students(&cat, &mut ind, &mut rng));
        assert_eq!(ind.classes[0].students, BTreeSet::from([3]));
        assert_eq!(ind.classes[1].students, BTreeSet::from([1]));
    }

    #[test]
    fn reconfigure_drops_students() {
        let cat = catalog();
        let mut rng = ChaCha8Rng::seed_from_u64(26);
        let mut ind = Individual {
            classes: vec![class(0, &[0, 1])],
            unassigned: BTreeSet::from([2, 3]),
        };
        assert!(reconfigure_class(&cat, &mut ind, &GaParams::default(), &mut rng));
        assert!(ind.classes[0].students.is_empty());
        assert_eq!(ind.unassigned, BTreeSet::from([0, 1, 2, 3]));
    }

    #[test]
    fn mutate_keeps_the_individual_consistent() {
        let cat = catalog();
        let params = GaParams::default();
        let mut rng = ChaCha8Rng::seed_from_u64(27);
        let mut ind = Individual {
            classes: vec![class(0, &[0, 1]), class(1, &[2])],
            unassigned: BTreeSet::from([3]),
        };
        for _ in 0..50 {
            mutate(&cat, &mut ind, 1.0, &params, &mut rng);
            assert!(consistent(&cat, &ind));
        }
    }
}
