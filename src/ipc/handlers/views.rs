use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{require_session, require_store, require_str};
use crate::ipc::types::{AppState, Request};
use crate::live::{LiveView, ViewQuery};
use crate::store::StoreError;
use serde_json::json;

/// Opens a live view under `key`, replacing (and releasing) any view already
/// registered there. Returns the initial view payload.
pub fn open_view(
    state: &mut AppState,
    key: &str,
    query: ViewQuery,
) -> Result<serde_json::Value, StoreError> {
    state.views.remove(key);
    let live = {
        let Some(store) = state.store() else {
            return Err(StoreError::Unavailable("no workspace selected".to_string()));
        };
        LiveView::open(&store, query)?
    };
    let payload = json!({
        "subscriptionId": key,
        "version": live.version(),
        "view": live.view(),
    });
    tracing::info!(subscription = %key, query = ?live.query(), "view opened");
    state.views.insert(key.to_string(), live);
    Ok(payload)
}

pub fn close_view(state: &mut AppState, key: &str) -> bool {
    let closed = state.views.remove(key).is_some();
    if closed {
        tracing::info!(subscription = %key, "view closed");
    }
    closed
}

fn handle_views_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_session(state, req) {
        return resp;
    }
    if let Err(resp) = require_store(state, req) {
        return resp;
    }
    let Some(raw) = req.params.get("query") else {
        return err(&req.id, "bad_params", "missing query", None);
    };
    let query = match ViewQuery::parse(raw) {
        Ok(q) => q,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    state.next_view_id += 1;
    let key = format!("v{}", state.next_view_id);
    match open_view(state, &key, query) {
        Ok(payload) => ok(&req.id, payload),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_views_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key = match require_str(req, "subscriptionId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if !close_view(state, &key) {
        return err(&req.id, "not_found", "subscription not found", None);
    }
    ok(&req.id, json!({ "ok": true }))
}

/// Refreshes every open view from its newest snapshot and returns one event
/// per view that changed.
pub fn drain_events(state: &mut AppState) -> Vec<serde_json::Value> {
    let mut events = Vec::new();
    for (key, live) in state.views.iter_mut() {
        if !live.refresh() {
            continue;
        }
        events.push(json!({
            "event": "view.updated",
            "subscriptionId": key,
            "version": live.version(),
            "view": live.view(),
        }));
    }
    events
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "views.open" => Some(handle_views_open(state, req)),
        "views.close" => Some(handle_views_close(state, req)),
        _ => None,
    }
}
