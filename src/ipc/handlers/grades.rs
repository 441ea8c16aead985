use crate::calc::{compute_grade, fit_to_subject_count};
use crate::ipc::error::ok;
use crate::ipc::helpers::parse_marks;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Preview of the derived values for marks still being entered. Writes
/// nothing.
fn handle_grades_compute(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let (marks, subject_count) = match parse_marks(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let marks = fit_to_subject_count(marks, subject_count);
    let summary = compute_grade(&marks);
    ok(
        &req.id,
        json!({
            "marks": marks,
            "total": summary.total,
            "cgpa": summary.cgpa,
            "grade": summary.grade,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.compute" => Some(handle_grades_compute(state, req)),
        _ => None,
    }
}
