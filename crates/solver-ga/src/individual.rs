use crate::catalog::Catalog;
use std::collections::{BTreeSet, HashSet};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassAssignment {
    pub template: usize,
    pub students: BTreeSet<usize>,
}

impl ClassAssignment {
    pub fn empty(template: usize) -> Self {
        Self {
            template,
            students: BTreeSet::new(),
        }
    }

    pub fn has_room(&self, cat: &Catalog) -> bool {
        self.students.len() < cat.capacity(self.template)
    }

    pub fn fill_ratio(&self, cat: &Catalog) -> f64 {
        self.students.len() as f64 / cat.capacity(self.template).max(1) as f64
    }

    /// Can take `student` without breaking capacity or slot compatibility.
    pub fn accepts(&self, cat: &Catalog, student: usize) -> bool {
        self.has_room(cat) && cat.fits_student(self.template, student)
    }
}

/// One candidate schedule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Individual {
    pub classes: Vec<ClassAssignment>,
    pub unassigned: BTreeSet<usize>,
}

impl Individual {
    pub fn with_classes(templates: impl IntoIterator<Item = usize>) -> Self {
        Self {
            classes: templates.into_iter().map(ClassAssignment::empty).collect(),
            unassigned: BTreeSet::new(),
        }
    }

    pub fn assigned(&self) -> BTreeSet<usize> {
        self.classes.iter().flat_map(|c| c.students.iter().copied()).collect()
    }

    pub fn is_complete(&self, cat: &Catalog) -> bool {
        self.assigned().len() == cat.student_count()
    }

    /// Jaccard similarity over the set of class shapes.
    pub fn similarity(&self, other: &Individual) -> f64 {
        let a: HashSet<usize> = self.classes.iter().map(|c| c.template).collect();
        let b: HashSet<usize> = other.classes.iter().map(|c| c.template).collect();
        let union = a.union(&b).count();
        if union == 0 {
            return 1.0;
        }
        a.intersection(&b).count() as f64 / union as f64
    }

    /// Index of the best-filled class that can take `student`.
    pub fn best_fit(&self, cat: &Catalog, student: usize) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, c) in self.classes.iter().enumerate() {
            if !c.accepts(cat, student) {
                continue;
            }
            let ratio = c.fill_ratio(cat);
            if best.map_or(true, |(_, r)| ratio > r) {
                best = Some((i, ratio));
            }
        }
        best.map(|(i, _)| i)
    }
}

/// Claimed (teacher, slot) and (room, slot) pairs.
#[derive(Default, Clone, Debug)]
pub struct Occupancy {
    teacher: HashSet<(usize, usize)>,
    room: HashSet<(usize, usize)>,
}

impl Occupancy {
    pub fn of<'a>(cat: &Catalog, classes: impl IntoIterator<Item = &'a ClassAssignment>) -> Self {
        let mut occ = Self::default();
        for c in classes {
            occ.claim(cat, c.template);
        }
        occ
    }

    /// Occupancy of every class except the one at `skip`.
    pub fn without(cat: &Catalog, classes: &[ClassAssignment], skip: usize) -> Self {
        Self::of(
            cat,
            classes.iter().enumerate().filter(|(i, _)| *i != skip).map(|(_, c)| c),
        )
    }

    pub fn fits(&self, cat: &Catalog, template: usize) -> bool {
        let key = &cat.template(template).key;
        key.slots
            .iter()
            .all(|&s| !self.teacher.contains(&(key.teacher, s)) && !self.room.contains(&(key.room, s)))
    }

    pub fn claim(&mut self, cat: &Catalog, template: usize) {
        let key = &cat.template(template).key;
        for &s in &key.slots {
            self.teacher.insert((key.teacher, s));
            self.room.insert((key.room, s));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    fn two_teacher_catalog() -> Catalog {
        Catalog::build(
            &request(
                1,
                vec![teacher("t1", &["MON_AM", "TUE_AM"]), teacher("t2", &["MON_AM"])],
                vec![room("r1", 2, &[]), room("r2", 1, &[])],
                vec![enrollment(1, &["MON_AM"]), enrollment(2, &["MON_AM", "TUE_AM"])],
            ),
            3,
        )
        .unwrap()
    }

    fn find(cat: &Catalog, teacher: usize, room: usize, slot: &str) -> usize {
        cat.templates
            .iter()
            .position(|t| {
                t.key.teacher == teacher && t.key.room == room && cat.slots[t.key.slots[0]].0 == slot
            })
            .unwrap()
    }

    #[test]
    fn occupancy_blocks_shared_teacher_or_room() {
        let cat = two_teacher_catalog();
        let t1_r1_mon = find(&cat, 0, 0, "MON_AM");
        let t1_r2_mon = find(&cat, 0, 1, "MON_AM");
        let t2_r1_mon = find(&cat, 1, 0, "MON_AM");
        let t2_r2_mon = find(&cat, 1, 1, "MON_AM");
        let t1_r1_tue = find(&cat, 0, 0, "TUE_AM");

        let mut occ = Occupancy::default();
        occ.claim(&cat, t1_r1_mon);
        assert!(!occ.fits(&cat, t1_r2_mon));
        assert!(!occ.fits(&cat, t2_r1_mon));
        assert!(occ.fits(&cat, t2_r2_mon));
        assert!(occ.fits(&cat, t1_r1_tue));
    }

    #[test]
    fn best_fit_prefers_fuller_classes() {
        let cat = two_teacher_catalog();
        let big = find(&cat, 0, 0, "MON_AM");
        let small = find(&cat, 1, 1, "MON_AM");
        let mut ind = Individual::with_classes([big, small]);
        assert_eq!(ind.best_fit(&cat, 0), Some(0));
        ind.classes[1].students.insert(1);
        // small is full, big is empty
        assert_eq!(ind.best_fit(&cat, 0), Some(0));
        ind.classes[1].students.clear();
        ind.classes[0].students.insert(1);
        // 1/2 beats 0/1
        assert_eq!(ind.best_fit(&cat, 0), Some(0));
        let tue = find(&cat, 0, 0, "TUE_AM");
        let ind = Individual::with_classes([tue]);
        assert_eq!(ind.best_fit(&cat, 0), None);
    }

    #[test]
    fn similarity_is_jaccard_over_templates() {
        let a = Individual::with_classes([0, 1, 2]);
        let b = Individual::with_classes([1, 2, 3]);
        assert!((a.similarity(&b) - 0.5).abs() < 1e-9);
        assert_eq!(Individual::default().similarity(&Individual::default()), 1.0);
        assert_eq!(a.similarity(&a), 1.0);
    }
}
