//! Post-hoc checks over a materialized schedule: capacity, double booking,
//! slot compatibility, exclusivity and completeness.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use types::{EnrollmentId, RoomId, ScheduleRequest, ScheduleResult, SlotId, TeacherId};

/// `(day, time_of_day)`, the form slots are compared in.
type Slot<'a> = (&'a str, &'a str);

fn slot_set(slots: &[SlotId]) -> HashSet<Slot<'_>> {
    slots.iter().map(SlotId::parts).collect()
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Audit {
    pub scheduled_classes: usize,
    pub roster_rows: usize,
    /// `scheduledClassId`s whose roster exceeds the room capacity.
    pub capacity_overflows: Vec<u64>,
    pub teacher_double_bookings: usize,
    pub room_double_bookings: usize,
    /// Roster rows whose slot is outside the enrollment's, teacher's or room's availability.
    pub slot_mismatches: usize,
    /// Enrollments that show up in more than one class.
    pub split_enrollments: Vec<EnrollmentId>,
    pub missing_enrollments: Vec<EnrollmentId>,
    pub unknown_references: usize,
}

impl Audit {
    pub fn is_clean(&self) -> bool {
        self.capacity_overflows.is_empty()
            && self.teacher_double_bookings == 0
            && self.room_double_bookings == 0
            && self.slot_mismatches == 0
            && self.split_enrollments.is_empty()
            && self.missing_enrollments.is_empty()
            && self.unknown_references == 0
    }
}

pub fn audit(req: &ScheduleRequest, res: &ScheduleResult) -> Audit {
    let teachers: HashMap<&TeacherId, HashSet<Slot>> = req
        .teachers
        .iter()
        .map(|t| (&t.id, slot_set(&t.availability)))
        .collect();
    let rooms: HashMap<&RoomId, (u32, HashSet<Slot>)> = req
        .rooms
        .iter()
        .map(|r| (&r.id, (r.capacity, slot_set(&r.availability))))
        .collect();
    let students: HashMap<EnrollmentId, HashSet<Slot>> = req
        .enrollments
        .iter()
        .map(|e| (e.id, slot_set(&e.available_slots)))
        .collect();

    let mut out = Audit {
        scheduled_classes: res.scheduled_classes.len(),
        roster_rows: res.scheduled_enrollments.len(),
        ..Audit::default()
    };

    let slots: Vec<Slot> = res
        .scheduled_classes
        .iter()
        .map(|c| (c.day_of_week.as_str(), c.time_slot.as_str()))
        .collect();

    let mut teacher_use: HashSet<(&TeacherId, Slot)> = HashSet::new();
    let mut room_use: HashSet<(&RoomId, Slot)> = HashSet::new();
    for (c, &slot) in res.scheduled_classes.iter().zip(&slots) {
        if !teacher_use.insert((&c.teacher_id, slot)) {
            out.teacher_double_bookings += 1;
        }
        if !room_use.insert((&c.room_id, slot)) {
            out.room_double_bookings += 1;
        }
    }

    let mut sizes: HashMap<u64, u32> = HashMap::new();
    let mut rows_by_student: HashMap<EnrollmentId, Vec<usize>> = HashMap::new();
    for row in &res.scheduled_enrollments {
        let Some(idx) = (row.scheduled_class_id as usize).checked_sub(1) else {
            out.unknown_references += 1;
            continue;
        };
        let (Some(class), Some(avail)) = (res.scheduled_classes.get(idx), students.get(&row.enrollment_id))
        else {
            out.unknown_references += 1;
            continue;
        };
        *sizes.entry(row.scheduled_class_id).or_default() += 1;
        rows_by_student.entry(row.enrollment_id).or_default().push(idx);

        let slot = &slots[idx];
        let teacher_ok = teachers
            .get(&class.teacher_id)
            .is_some_and(|a| a.contains(slot));
        let room_ok = rooms
            .get(&class.room_id)
            .is_some_and(|(_, a)| a.is_empty() || a.contains(slot));
        if !(avail.contains(slot) && teacher_ok && room_ok) {
            out.slot_mismatches += 1;
        }
    }

    let mut overflows: Vec<u64> = sizes
        .into_iter()
        .filter(|(id, n)| {
            let class = &res.scheduled_classes[*id as usize - 1];
            rooms.get(&class.room_id).map_or(true, |(cap, _)| n > cap)
        })
        .map(|(id, _)| id)
        .collect();
    overflows.sort_unstable();
    out.capacity_overflows = overflows;

    let lessons = req.course.lessons_per_week as usize;
    let mut split: Vec<EnrollmentId> = rows_by_student
        .iter()
        .filter(|(_, idxs)| {
            let homes: BTreeSet<(&TeacherId, &RoomId)> = idxs
                .iter()
                .map(|&i| (&res.scheduled_classes[i].teacher_id, &res.scheduled_classes[i].room_id))
                .collect();
            homes.len() > 1 || idxs.len() > lessons
        })
        .map(|(id, _)| *id)
        .collect();
    split.sort_unstable();
    out.split_enrollments = split;

    let mut missing: Vec<EnrollmentId> = req
        .enrollments
        .iter()
        .map(|e| e.id)
        .filter(|id| !rows_by_student.contains_key(id))
        .collect();
    missing.sort_unstable();
    out.missing_enrollments = missing;

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{
        Course, CourseId, Enrollment, Room, ScheduledClass, ScheduledEnrollment, Teacher,
    };

    fn slots(xs: &[&str]) -> Vec<SlotId> {
        xs.iter().map(|s| SlotId::new(*s)).collect()
    }

    fn request(capacity: u32) -> ScheduleRequest {
        ScheduleRequest {
            course: Course {
                id: CourseId(1),
                title: String::new(),
                lessons_per_week: 2,
                required_qualification: None,
            },
            teachers: vec![Teacher {
                id: TeacherId("t1".into()),
                availability: slots(&["MON_AM", "TUE_AM"]),
                qualifications: vec![],
            }],
            rooms: vec![Room {
                id: RoomId("r1".into()),
                capacity,
                availability: vec![],
            }],
            enrollments: (1..=2)
                .map(|i| Enrollment {
                    id: EnrollmentId(i),
                    user_id: None,
                    available_slots: slots(&["MON_AM", "TUE_AM"]),
                    preferred_slots: vec![],
                })
                .collect(),
            params: None,
        }
    }

    fn class(day: &str) -> ScheduledClass {
        ScheduledClass {
            course_id: CourseId(1),
            teacher_id: TeacherId("t1".into()),
            room_id: RoomId("r1".into()),
            day_of_week: day.into(),
            time_slot: "AM".into(),
            start_date: "2025-11-03".into(),
            end_date: "2026-01-03".into(),
        }
    }

    fn row(class: u64, e: u64) -> ScheduledEnrollment {
        ScheduledEnrollment {
            scheduled_class_id: class,
            enrollment_id: EnrollmentId(e),
        }
    }

    fn schedule() -> ScheduleResult {
        ScheduleResult {
            scheduled_classes: vec![class("MON"), class("TUE")],
            scheduled_enrollments: vec![row(1, 1), row(1, 2), row(2, 1), row(2, 2)],
            diagnostics: None,
        }
    }

    #[test]
    fn clean_schedule_passes() {
        let a = audit(&request(2), &schedule());
        assert!(a.is_clean(), "{a:?}");
        assert_eq!(a.scheduled_classes, 2);
        assert_eq!(a.roster_rows, 4);
    }

    #[test]
    fn detects_capacity_overflow() {
        let a = audit(&request(1), &schedule());
        assert_eq!(a.capacity_overflows, vec![1, 2]);
    }

    #[test]
    fn detects_double_booking_and_missing_students() {
        let mut res = schedule();
        res.scheduled_classes.push(class("MON"));
        res.scheduled_enrollments.retain(|r| r.enrollment_id == EnrollmentId(1));
        let a = audit(&request(2), &res);
        assert_eq!(a.teacher_double_bookings, 1);
        assert_eq!(a.room_double_bookings, 1);
        assert_eq!(a.missing_enrollments, vec![EnrollmentId(2)]);
    }

    #[test]
    fn detects_slot_mismatch_and_split_enrollment() {
        let mut res = schedule();
        res.scheduled_classes.push(class("WED"));
        res.scheduled_enrollments.push(row(3, 2));
        let a = audit(&request(2), &res);
        assert_eq!(a.slot_mismatches, 1);
        assert_eq!(a.split_enrollments, vec![EnrollmentId(2)]);
    }

    #[test]
    fn lenient_slot_ids_match_their_materialized_form() {
        let mut req = request(2);
        req.course.lessons_per_week = 1;
        req.teachers[0].availability = slots(&["NOON"]);
        req.rooms[0].availability = slots(&["NOON_"]);
        for e in &mut req.enrollments {
            e.available_slots = slots(&["NOON"]);
        }
        let mut lone = class("NOON");
        lone.time_slot = "MORNING".into();
        let res = ScheduleResult {
            scheduled_classes: vec![lone],
            scheduled_enrollments: vec![row(1, 1), row(1, 2)],
            diagnostics: None,
        };
        let a = audit(&req, &res);
        assert!(a.is_clean(), "{a:?}");
    }

    #[test]
    fn dangling_rows_are_counted() {
        let mut res = schedule();
        res.scheduled_enrollments.push(row(0, 1));
        res.scheduled_enrollments.push(row(9, 1));
        res.scheduled_enrollments.push(row(1, 77));
        assert_eq!(audit(&request(2), &res).unknown_references, 3);
    }
}
