use crate::calc::{coerce_mark, MAX_SUBJECTS};
use crate::identity::{IdentityToken, Role};
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::store::SqliteRecordStore;

pub fn str_param<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

pub fn require_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match str_param(req, key) {
        Some(v) => Ok(v.to_string()),
        None => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

pub fn require_store<'s>(
    state: &'s AppState,
    req: &Request,
) -> Result<SqliteRecordStore<'s>, serde_json::Value> {
    state
        .store()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn require_session<'s>(
    state: &'s AppState,
    req: &Request,
) -> Result<&'s IdentityToken, serde_json::Value> {
    state
        .session
        .as_ref()
        .ok_or_else(|| err(&req.id, "not_authenticated", "sign in first", None))
}

pub fn require_teacher<'s>(
    state: &'s AppState,
    req: &Request,
) -> Result<&'s IdentityToken, serde_json::Value> {
    let session = require_session(state, req)?;
    if session.role != Role::Teacher {
        return Err(err(
            &req.id,
            "forbidden",
            "only teachers can change student records",
            None,
        ));
    }
    Ok(session)
}

/// Reads `params.marks` (array of form values) and optional
/// `params.subjectCount`. More than `MAX_SUBJECTS` subjects is `bad_params`.
pub fn parse_marks(req: &Request) -> Result<(Vec<i64>, Option<i64>), serde_json::Value> {
    let marks = match req.params.get("marks") {
        None => Vec::new(),
        Some(v) if v.is_null() => Vec::new(),
        Some(v) => {
            let Some(arr) = v.as_array() else {
                return Err(err(&req.id, "bad_params", "marks must be an array", None));
            };
            arr.iter().map(coerce_mark).collect()
        }
    };
    let subject_count = match req.params.get("subjectCount") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => Some(coerce_mark(v)),
    };
    if req.params.get("marks").is_none() && subject_count.is_none() {
        return Err(err(&req.id, "bad_params", "missing marks", None));
    }
    let too_many = match subject_count {
        Some(n) => n > MAX_SUBJECTS,
        None => marks.len() as i64 > MAX_SUBJECTS,
    };
    if too_many {
        return Err(err(
            &req.id,
            "bad_params",
            format!("at most {} subjects", MAX_SUBJECTS),
            None,
        ));
    }
    Ok((marks, subject_count))
}
