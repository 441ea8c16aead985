use crate::calc::fit_to_subject_count;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::handlers::portal::advance_portal;
use crate::ipc::helpers::{
    parse_marks, require_session, require_store, require_str, require_teacher, str_param,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Branch, NewStudent, Year};
use crate::portal::{PortalAction, Screen};
use crate::rank::parse_criteria;
use crate::registry;
use crate::store::RecordStore;
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_session(state, req) {
        return resp;
    }
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let criteria = match parse_criteria(req.params.get("criteria")) {
        Ok(c) => c,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match store.list(&criteria.group()) {
        Ok(list) => {
            let students: Vec<_> = list.into_iter().filter(|r| criteria.matches(r)).collect();
            ok(&req.id, json!({ "students": students }))
        }
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_session(state, req) {
        return resp;
    }
    let student_id = match require_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match store.get(&student_id) {
        Ok(record) => ok(&req.id, json!({ "student": record })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn parse_new_student(req: &Request) -> Result<NewStudent, serde_json::Value> {
    let id = require_str(req, "id")?.trim().to_string();
    let name = require_str(req, "name")?.trim().to_string();
    if id.is_empty() || name.is_empty() {
        return Err(err(&req.id, "bad_params", "id/name must not be empty", None));
    }

    let branch = match str_param(req, "branch") {
        None => Branch::Cse,
        Some(s) => Branch::parse(s).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("unknown branch: {}", s),
                None,
            )
        })?,
    };
    let year = match str_param(req, "year") {
        None => Year::First,
        Some(s) => Year::parse(s).ok_or_else(|| {
            err(&req.id, "bad_params", format!("unknown year: {}", s), None)
        })?,
    };
    let section = str_param(req, "section")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "A".to_string());

    let (marks, subject_count) = parse_marks(req)?;
    Ok(NewStudent {
        id,
        name,
        branch,
        section,
        year,
        marks: fit_to_subject_count(marks, subject_count),
    })
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_teacher(state, req) {
        return resp;
    }
    let draft = match parse_new_student(req) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let created = {
        let store = match require_store(state, req) {
            Ok(s) => s,
            Err(resp) => return resp,
        };
        registry::register(&store, draft)
    };
    let record = match created {
        Ok(r) => r,
        Err(e) => return store_err(&req.id, &e),
    };

    // Adding from the portal form moves the teacher on to the grade table.
    let on_add_screen = state
        .portal
        .as_ref()
        .map(|p| p.screen == Screen::AddStudent)
        .unwrap_or(false);
    let portal = if on_add_screen {
        match advance_portal(state, PortalAction::StudentAdded) {
            Ok(v) => v,
            Err(f) => return f.respond(&req.id),
        }
    } else {
        serde_json::Value::Null
    };

    ok(&req.id, json!({ "student": record, "portal": portal }))
}

fn handle_students_update_marks(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_teacher(state, req) {
        return resp;
    }
    let student_id = match require_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (marks, subject_count) = match parse_marks(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match registry::update_marks(&store, &student_id, fit_to_subject_count(marks, subject_count)) {
        Ok(record) => ok(&req.id, json!({ "student": record })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_teacher(state, req) {
        return resp;
    }
    let student_id = match require_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match registry::remove(&store, &student_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.updateMarks" => Some(handle_students_update_marks(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
