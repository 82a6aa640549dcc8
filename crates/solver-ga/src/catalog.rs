//! Slot pool, per-student slot combinations and the template table.
//!
//! Everything in here is derived once per run from the request and then
//! shared read-only by every other stage. Slots, teachers, rooms and
//! students are referred to by their index in the catalog's vectors.

use itertools::Itertools;
use rand::distributions::WeightedIndex;
use sched_core::ScheduleError;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};
use types::{EnrollmentId, RoomId, ScheduleRequest, SlotId, TeacherId};

/// Sorted slot indices of one class, `lessons_per_week` long.
pub type Combo = Vec<usize>;

/// Identity of a class shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateKey {
    pub teacher: usize,
    pub room: usize,
    pub slots: Combo,
}

#[derive(Clone, Debug)]
pub struct Template {
    pub key: TemplateKey,
    /// Students whose availability covers `key.slots`.
    pub candidates: BTreeSet<usize>,
}

impl Template {
    pub fn weight(&self) -> usize {
        self.candidates.len().max(1)
    }
}

/// Per-entity availability, indexed by slot.
#[derive(Clone, Debug)]
pub struct Availability(Vec<bool>);

impl Availability {
    fn from_ids(ids: &[SlotId], slot_index: &HashMap<&SlotId, usize>, n: usize) -> Self {
        let mut mask = vec![false; n];
        for id in ids {
            if let Some(&i) = slot_index.get(id) {
                mask[i] = true;
            }
        }
        Self(mask)
    }

    pub fn contains(&self, slot: usize) -> bool {
        self.0.get(slot).copied().unwrap_or(false)
    }

    pub fn covers(&self, slots: &[usize]) -> bool {
        slots.iter().all(|&s| self.contains(s))
    }

    pub fn intersects(&self, slots: &[usize]) -> bool {
        slots.iter().any(|&s| self.contains(s))
    }

    pub fn slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().enumerate().filter(|(_, &on)| on).map(|(i, _)| i)
    }

    pub fn is_empty(&self) -> bool {
        !self.0.iter().any(|&on| on)
    }
}

#[derive(Clone, Debug)]
pub struct TeacherInfo {
    pub id: TeacherId,
    pub availability: Availability,
    pub qualified: bool,
}

#[derive(Clone, Debug)]
pub struct RoomInfo {
    pub id: RoomId,
    pub capacity: usize,
    pub availability: Availability,
}

#[derive(Clone, Debug)]
pub struct StudentInfo {
    pub id: EnrollmentId,
    pub availability: Availability,
    pub preferred: Availability,
}

#[derive(Clone, Debug)]
pub struct Catalog {
    pub lessons_per_week: usize,
    pub slots: Vec<SlotId>,
    pub teachers: Vec<TeacherInfo>,
    pub rooms: Vec<RoomInfo>,
    pub students: Vec<StudentInfo>,
    pub templates: Vec<Template>,
    pub combo_templates: HashMap<Combo, Vec<usize>>,
    /// Combos per student, restricted to combos some template can host.
    pub student_combos: Vec<Vec<Combo>>,
    /// Templates whose slots lie inside each student's availability.
    pub student_templates: Vec<Vec<usize>>,
    /// Teachers that templates were drawn from.
    pub teacher_pool: usize,
    /// Set when no qualified teacher could host a class and every teacher was admitted.
    pub qualification_widened: bool,
    pub target_classes: usize,
    pub(crate) sampler: WeightedIndex<usize>,
}

impl Catalog {
    pub fn build(req: &ScheduleRequest, max_classes_per_teacher: usize) -> Result<Self, ScheduleError> {
        if req.teachers.is_empty() {
            return Err(ScheduleError::NoTeachers);
        }
        if req.rooms.is_empty() {
            return Err(ScheduleError::NoRooms);
        }
        if req.enrollments.is_empty() {
            return Err(ScheduleError::NoEnrollments);
        }
        let lessons = req.course.lessons_per_week as usize;
        if lessons == 0 {
            return Err(ScheduleError::InvalidLessonCount {
                course: req.course.id.0,
                lessons: req.course.lessons_per_week,
            });
        }

        let mut slots: Vec<SlotId> = req.slot_set().into_iter().cloned().collect();
        slots.sort();
        if slots.is_empty() {
            return Err(ScheduleError::NoSlotsAvailable);
        }
        let slot_index: HashMap<&SlotId, usize> = slots.iter().enumerate().map(|(i, s)| (s, i)).collect();
        let n = slots.len();

        let teachers: Vec<TeacherInfo> = req
            .teachers
            .iter()
            .map(|t| TeacherInfo {
                id: t.id.clone(),
                availability: Availability::from_ids(&t.availability, &slot_index, n),
                qualified: req.course.accepts(t),
            })
            .collect();
        let rooms: Vec<RoomInfo> = req
            .rooms
            .iter()
            .map(|r| RoomInfo {
                id: r.id.clone(),
                capacity: r.capacity as usize,
                availability: if r.availability.is_empty() {
                    Availability(vec![true; n])
                } else {
                    Availability::from_ids(&r.availability, &slot_index, n)
                },
            })
            .collect();
        let students: Vec<StudentInfo> = req
            .enrollments
            .iter()
            .map(|e| StudentInfo {
                id: e.id,
                availability: Availability::from_ids(&e.available_slots, &slot_index, n),
                preferred: Availability::from_ids(&e.preferred_slots, &slot_index, n),
            })
            .collect();

        let mut student_combos: Vec<Vec<Combo>> = Vec::with_capacity(students.len());
        let mut combo_students: HashMap<Combo, BTreeSet<usize>> = HashMap::new();
        for (si, s) in students.iter().enumerate() {
            let usable: Vec<usize> = s.availability.slots().collect();
            let combos: Vec<Combo> = if usable.len() < lessons {
                Vec::new()
            } else {
                usable.into_iter().combinations(lessons).collect()
            };
            for c in &combos {
                combo_students.entry(c.clone()).or_default().insert(si);
            }
            student_combos.push(combos);
        }
        // deterministic template order regardless of hash seeds
        let mut combo_order: Vec<&Combo> = combo_students.keys().collect();
        combo_order.sort();

        let qualified: Vec<usize> = (0..teachers.len()).filter(|&t| teachers[t].qualified).collect();
        let everyone: Vec<usize> = (0..teachers.len()).collect();

        let mut qualification_widened = false;
        let mut teacher_pool = qualified.len();
        let mut templates = templates_from_combos(&qualified, &teachers, &rooms, &combo_order, &combo_students);
        if templates.is_empty() {
            debug!("no template from qualified teachers, widening to all teachers");
            qualification_widened = qualified.len() < everyone.len();
            teacher_pool = everyone.len();
            templates = templates_from_combos(&everyone, &teachers, &rooms, &combo_order, &combo_students);
        }
        if templates.is_empty() {
            debug!("no student combo fits any teacher/room, falling back to shared slots");
            let pool = if qualified.is_empty() { &everyone } else { &qualified };
            qualification_widened = qualified.is_empty();
            teacher_pool = pool.len();
            templates = templates_from_shared_slots(pool, &teachers, &rooms, lessons);
        }
        if templates.is_empty() {
            return Err(ScheduleError::NoFeasibleTemplates);
        }

        let mut combo_templates: HashMap<Combo, Vec<usize>> = HashMap::new();
        for (i, t) in templates.iter().enumerate() {
            combo_templates.entry(t.key.slots.clone()).or_default().push(i);
        }
        for combos in &mut student_combos {
            combos.retain(|c| combo_templates.contains_key(c));
        }
        let student_templates: Vec<Vec<usize>> = students
            .iter()
            .map(|s| {
                (0..templates.len())
                    .filter(|&i| s.availability.covers(&templates[i].key.slots))
                    .collect()
            })
            .collect();

        let sampler = WeightedIndex::new(templates.iter().map(Template::weight))
            .map_err(|_| ScheduleError::NoFeasibleTemplates)?;

        let target_classes = target_class_count(students.len(), &rooms, teacher_pool, max_classes_per_teacher);

        info!(
            slots = slots.len(),
            templates = templates.len(),
            students = students.len(),
            target_classes,
            qualification_widened,
            "catalog built"
        );

        Ok(Self {
            lessons_per_week: lessons,
            slots,
            teachers,
            rooms,
            students,
            templates,
            combo_templates,
            student_combos,
            student_templates,
            teacher_pool,
            qualification_widened,
            target_classes,
            sampler,
        })
    }

    pub fn template(&self, i: usize) -> &Template {
        &self.templates[i]
    }

    pub fn capacity(&self, template: usize) -> usize {
        self.rooms[self.templates[template].key.room].capacity
    }

    /// True when `student` can attend every lesson of `template`.
    pub fn fits_student(&self, template: usize, student: usize) -> bool {
        self.students[student]
            .availability
            .covers(&self.templates[template].key.slots)
    }

    pub fn student_count(&self) -> usize {
        self.students.len()
    }
}

fn templates_from_combos(
    teacher_pool: &[usize],
    teachers: &[TeacherInfo],
    rooms: &[RoomInfo],
    combos: &[&Combo],
    combo_students: &HashMap<Combo, BTreeSet<usize>>,
) -> Vec<Template> {
    let mut out = Vec::new();
    for &ti in teacher_pool {
        let teacher = &teachers[ti];
        if teacher.availability.is_empty() {
            continue;
        }
        for (ri, room) in rooms.iter().enumerate() {
            if room.capacity == 0 {
                continue;
            }
            for &combo in combos {
                if !teacher.availability.covers(combo) || !room.availability.covers(combo) {
                    continue;
                }
                out.push(Template {
                    key: TemplateKey {
                        teacher: ti,
                        room: ri,
                        slots: combo.clone(),
                    },
                    candidates: combo_students.get(combo).cloned().unwrap_or_default(),
                });
            }
        }
    }
    out
}

fn templates_from_shared_slots(
    teacher_pool: &[usize],
    teachers: &[TeacherInfo],
    rooms: &[RoomInfo],
    lessons: usize,
) -> Vec<Template> {
    let mut out = Vec::new();
    for &ti in teacher_pool {
        for (ri, room) in rooms.iter().enumerate() {
            if room.capacity == 0 {
                continue;
            }
            let shared: Vec<usize> = teachers[ti]
                .availability
                .slots()
                .filter(|&s| room.availability.contains(s))
                .collect();
            if shared.len() < lessons {
                continue;
            }
            for combo in shared.into_iter().combinations(lessons) {
                out.push(Template {
                    key: TemplateKey {
                        teacher: ti,
                        room: ri,
                        slots: combo,
                    },
                    candidates: BTreeSet::new(),
                });
            }
        }
    }
    out
}

fn target_class_count(students: usize, rooms: &[RoomInfo], teacher_pool: usize, per_teacher: usize) -> usize {
    let max_cap = rooms.iter().map(|r| r.capacity).max().unwrap_or(0).max(1);
    let min_cap = rooms
        .iter()
        .map(|r| r.capacity)
        .filter(|&c| c > 0)
        .min()
        .unwrap_or(max_cap);
    let wanted = students.div_ceil(max_cap).max(students.div_ceil(min_cap)).max(1);
    let ceiling = per_teacher.max(1) * teacher_pool.max(1);
    wanted.min(ceiling).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    #[test]
    fn builds_templates_inside_teacher_and_room_availability() {
        let req = request(
            3,
            vec![teacher("t1", &["MON_AM", "WED_AM", "FRI_AM"])],
            vec![room("r1", 2, &["MON_AM", "WED_AM", "FRI_AM"])],
            vec![
                enrollment(1, &["MON_AM", "WED_AM", "FRI_AM"]),
                enrollment(2, &["MON_AM", "WED_AM", "FRI_AM", "TUE_PM"]),
            ],
        );
        let cat = Catalog::build(&req, 3).unwrap();
        assert_eq!(cat.slots.len(), 4);
        assert_eq!(cat.templates.len(), 1);
        let t = &cat.templates[0];
        assert_eq!(t.candidates, BTreeSet::from([0, 1]));
        assert_eq!(t.weight(), 2);
        assert_eq!(cat.student_templates, vec![vec![0], vec![0]]);
        // student 2 had four combos, only one can be hosted
        assert_eq!(cat.student_combos[1].len(), 1);
    }

    #[test]
    fn empty_room_availability_means_every_slot() {
        let req = request(
            1,
            vec![teacher("t1", &["MON_AM", "TUE_AM"])],
            vec![room("r1", 5, &[])],
            vec![enrollment(1, &["MON_AM", "TUE_AM"])],
        );
        let cat = Catalog::build(&req, 3).unwrap();
        assert_eq!(cat.templates.len(), 2);
    }

    #[test]
    fn zero_capacity_rooms_and_idle_teachers_host_nothing() {
        let req = request(
            1,
            vec![teacher("idle", &[]), teacher("t1", &["MON_AM"])],
            vec![room("closet", 0, &[]), room("r1", 5, &[])],
            vec![enrollment(1, &["MON_AM"])],
        );
        let cat = Catalog::build(&req, 3).unwrap();
        assert_eq!(cat.templates.len(), 1);
        assert_eq!(cat.templates[0].key.teacher, 1);
        assert_eq!(cat.templates[0].key.room, 1);
    }

    #[test]
    fn widens_to_unqualified_teachers() {
        let mut req = request(
            1,
            vec![teacher("t1", &["MON_AM"])],
            vec![room("r1", 5, &[])],
            vec![enrollment(1, &["MON_AM"])],
        );
        req.course.required_qualification = Some("CHEM".into());
        let cat = Catalog::build(&req, 3).unwrap();
        assert!(cat.qualification_widened);
        assert_eq!(cat.templates.len(), 1);
        assert!(!cat.teachers[0].qualified);
    }

    #[test]
    fn qualified_teachers_are_preferred() {
        let mut req = request(
            1,
            vec![qualified("chem", &["MON_AM"], &["CHEM"]), teacher("t2", &["MON_AM"])],
            vec![room("r1", 5, &[])],
            vec![enrollment(1, &["MON_AM"])],
        );
        req.course.required_qualification = Some("CHEM".into());
        let cat = Catalog::build(&req, 3).unwrap();
        assert!(!cat.qualification_widened);
        assert!(cat.templates.iter().all(|t| t.key.teacher == 0));
    }

    #[test]
    fn falls_back_to_shared_slots_without_student_combos() {
        let req = request(
            2,
            vec![teacher("t1", &["MON_AM", "TUE_AM"])],
            vec![room("r1", 5, &[])],
            vec![enrollment(1, &["MON_AM"])],
        );
        let cat = Catalog::build(&req, 3).unwrap();
        assert_eq!(cat.templates.len(), 1);
        assert!(cat.templates[0].candidates.is_empty());
        assert!(cat.student_templates[0].is_empty());
    }

    #[test]
    fn reports_named_input_errors() {
        let ok = || {
            request(
                1,
                vec![teacher("t1", &["MON_AM"])],
                vec![room("r1", 5, &[])],
                vec![enrollment(1, &["MON_AM"])],
            )
        };
        let mut r = ok();
        r.teachers.clear();
        assert_eq!(Catalog::build(&r, 3).unwrap_err(), ScheduleError::NoTeachers);
        let mut r = ok();
        r.rooms.clear();
        assert_eq!(Catalog::build(&r, 3).unwrap_err(), ScheduleError::NoRooms);
        let mut r = ok();
        r.enrollments.clear();
        assert_eq!(Catalog::build(&r, 3).unwrap_err(), ScheduleError::NoEnrollments);
        let mut r = ok();
        r.course.lessons_per_week = 0;
        assert!(matches!(
            Catalog::build(&r, 3).unwrap_err(),
            ScheduleError::InvalidLessonCount { .. }
        ));

        let r = request(
            1,
            vec![teacher("t1", &[])],
            vec![room("r1", 5, &[])],
            vec![enrollment(1, &[])],
        );
        assert_eq!(Catalog::build(&r, 3).unwrap_err(), ScheduleError::NoSlotsAvailable);

        let r = request(
            2,
            vec![teacher("t1", &["MON_AM"])],
            vec![room("r1", 5, &[])],
            vec![enrollment(1, &["MON_AM", "TUE_AM"])],
        );
        assert_eq!(Catalog::build(&r, 3).unwrap_err(), ScheduleError::NoFeasibleTemplates);
    }

    #[test]
    fn target_class_count_respects_room_sizes_and_teacher_cap() {
        let rooms = |caps: &[usize]| -> Vec<RoomInfo> {
            caps.iter()
                .map(|&c| RoomInfo {
                    id: RoomId(format!("r{c}")),
                    capacity: c,
                    availability: Availability(vec![true]),
                })
                .collect()
        };
        assert_eq!(target_class_count(10, &rooms(&[5, 2]), 10, 3), 5);
        assert_eq!(target_class_count(10, &rooms(&[5, 2]), 1, 3), 3);
        assert_eq!(target_class_count(1, &rooms(&[30]), 1, 3), 1);
        assert_eq!(target_class_count(4, &rooms(&[0, 2]), 2, 3), 2);
    }
}
