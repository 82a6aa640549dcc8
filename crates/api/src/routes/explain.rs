use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use sched_core::audit::audit;
use types::{EnrollmentId, ScheduleRequest, ScheduleResult};

#[derive(Deserialize, ToSchema)]
pub struct ExplainIn {
    pub request: ScheduleRequest,
    pub schedule: ScheduleResult,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExplainOut {
    pub clean: bool,
    pub counts: Counts,
    pub capacity_overflows: Vec<u64>,
    pub split_enrollments: Vec<EnrollmentId>,
    pub missing_enrollments: Vec<EnrollmentId>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Counts {
    pub scheduled_classes: usize,
    pub roster_rows: usize,
    pub teacher_double_bookings: usize,
    pub room_double_bookings: usize,
    pub slot_mismatches: usize,
    pub unknown_references: usize,
}

#[utoipa::path(
    post,
    path = "/v1/explain",
    request_body = ExplainIn,
    responses(
    (status = 200, description = "Hard-rule audit of the provided schedule", body = ExplainOut)
    )
)]
pub async fn explain(Json(input): Json<ExplainIn>) -> Json<ExplainOut> {
    let a = audit(&input.request, &input.schedule);
    Json(ExplainOut {
        clean: a.is_clean(),
        counts: Counts {
            scheduled_classes: a.scheduled_classes,
            roster_rows: a.roster_rows,
            teacher_double_bookings: a.teacher_double_bookings,
            room_double_bookings: a.room_double_bookings,
            slot_mismatches: a.slot_mismatches,
            unknown_references: a.unknown_references,
        },
        capacity_overflows: a.capacity_overflows,
        split_enrollments: a.split_enrollments,
        missing_enrollments: a.missing_enrollments,
    })
}
