//! Turns the winning classes into output records: one `ScheduledClass` per
//! (class, slot) and one roster row per student and slot instance.

use crate::catalog::Catalog;
use crate::individual::ClassAssignment;
use tracing::warn;
use types::{CourseId, GaParams, ScheduleResult, ScheduledClass, ScheduledEnrollment};

pub fn materialize(
    cat: &Catalog,
    course: CourseId,
    classes: &[ClassAssignment],
    params: &GaParams,
) -> ScheduleResult {
    let mut ordered: Vec<&ClassAssignment> = classes.iter().filter(|c| !c.students.is_empty()).collect();
    ordered.sort_by_cached_key(|c| {
        let key = &cat.template(c.template).key;
        (
            key.slots.iter().map(|&s| cat.slots[s].0.clone()).collect::<Vec<_>>(),
            cat.teachers[key.teacher].id.0.clone(),
            cat.rooms[key.room].id.0.clone(),
        )
    });

    let mut result = ScheduleResult::default();
    for class in ordered {
        let key = &cat.template(class.template).key;
        let teacher = &cat.teachers[key.teacher].id;
        let room = &cat.rooms[key.room].id;
        for &s in &key.slots {
            let slot = &cat.slots[s];
            if !slot.is_valid_format() {
                warn!(slot = %slot, "malformed slot id, using default day/time");
            }
            let (day, time) = slot.parts();
            result.scheduled_classes.push(ScheduledClass {
                course_id: course,
                teacher_id: teacher.clone(),
                room_id: room.clone(),
                day_of_week: day.to_string(),
                time_slot: time.to_string(),
                start_date: params.term_start.clone(),
                end_date: params.term_end.clone(),
            });
            let id = result.scheduled_classes.len() as u64;
            result
                .scheduled_enrollments
                .extend(class.students.iter().map(|&st| ScheduledEnrollment {
                    scheduled_class_id: id,
                    enrollment_id: cat.students[st].id,
                }));
        }
    }
    result
}
