//! Request builders shared by the unit tests.

use types::{
    Course, CourseId, Enrollment, EnrollmentId, Room, RoomId, ScheduleRequest, SlotId, Teacher,
    TeacherId,
};

pub fn slots(xs: &[&str]) -> Vec<SlotId> {
    xs.iter().map(|s| SlotId::new(*s)).collect()
}

pub fn teacher(id: &str, avail: &[&str]) -> Teacher {
    qualified(id, avail, &[])
}

pub fn qualified(id: &str, avail: &[&str], quals: &[&str]) -> Teacher {
    Teacher {
        id: TeacherId(id.into()),
        availability: slots(avail),
        qualifications: quals.iter().map(|q| q.to_string()).collect(),
    }
}

pub fn room(id: &str, capacity: u32, avail: &[&str]) -> Room {
    Room {
        id: RoomId(id.into()),
        capacity,
        availability: slots(avail),
    }
}

pub fn enrollment(id: u64, avail: &[&str]) -> Enrollment {
    Enrollment {
        id: EnrollmentId(id),
        user_id: None,
        available_slots: slots(avail),
        preferred_slots: vec![],
    }
}

pub fn request(
    lessons: u32,
    teachers: Vec<Teacher>,
    rooms: Vec<Room>,
    enrollments: Vec<Enrollment>,
) -> ScheduleRequest {
    ScheduleRequest {
        course: Course {
            id: CourseId(7),
            title: "Test course".into(),
            lessons_per_week: lessons,
            required_qualification: None,
        },
        teachers,
        rooms,
        enrollments,
        params: None,
    }
}
