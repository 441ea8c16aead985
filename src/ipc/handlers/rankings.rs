use crate::identity::Role;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{require_session, require_store, str_param};
use crate::ipc::types::{AppState, Request};
use crate::model::StudentRecord;
use crate::rank::{
    class_standing, filtered_rank, global_rank, my_rank, parse_criteria, roster, RosterSort,
};
use crate::store::{CollectionFilter, RecordStore};
use serde_json::json;

/// Loads the full class snapshot for a read-only ranking request.
fn load_class(state: &AppState, req: &Request) -> Result<Vec<StudentRecord>, serde_json::Value> {
    require_session(state, req)?;
    let store = require_store(state, req)?;
    store
        .list(&CollectionFilter::all())
        .map_err(|e| store_err(&req.id, &e))
}

fn handle_rank_global(state: &mut AppState, req: &Request) -> serde_json::Value {
    match load_class(state, req) {
        Ok(all) => ok(&req.id, json!({ "entries": global_rank(&all) })),
        Err(resp) => resp,
    }
}

fn handle_rank_filtered(state: &mut AppState, req: &Request, standing: bool) -> serde_json::Value {
    let criteria = match parse_criteria(req.params.get("criteria")) {
        Ok(c) => c,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let all = match load_class(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let entries = if standing {
        class_standing(&all, &criteria)
    } else {
        filtered_rank(&all, &criteria)
    };
    ok(&req.id, json!({ "entries": entries, "criteria": criteria }))
}

/// Class rank of one student. Students default to themselves.
fn handle_rank_mine(state: &mut AppState, req: &Request) -> serde_json::Value {
    let all = match load_class(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_id = match (str_param(req, "studentId"), state.session.as_ref()) {
        (Some(id), _) => id.to_string(),
        (None, Some(s)) if s.role == Role::Student => s.record_key.clone(),
        _ => return err(&req.id, "bad_params", "missing studentId", None),
    };
    let ranked = global_rank(&all);
    let rank = my_rank(&ranked, &student_id);
    ok(
        &req.id,
        json!({
            "studentId": student_id,
            "rank": rank,
            "display": rank.to_string(),
            "classSize": ranked.len(),
        }),
    )
}

fn handle_roster_view(state: &mut AppState, req: &Request) -> serde_json::Value {
    let criteria = match parse_criteria(req.params.get("criteria")) {
        Ok(c) => c,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let sort = match str_param(req, "sort") {
        None => RosterSort::None,
        Some(s) => match RosterSort::parse(s) {
            Some(v) => v,
            None => return err(&req.id, "bad_params", format!("unknown sort: {}", s), None),
        },
    };
    let all = match load_class(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    ok(&req.id, json!({ "rows": roster(&all, &criteria, sort), "sort": sort }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "rank.global" => Some(handle_rank_global(state, req)),
        "rank.filtered" => Some(handle_rank_filtered(state, req, false)),
        "rank.standing" => Some(handle_rank_filtered(state, req, true)),
        "rank.mine" => Some(handle_rank_mine(state, req)),
        "roster.view" => Some(handle_roster_view(state, req)),
        _ => None,
    }
}
