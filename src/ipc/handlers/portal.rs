use crate::ipc::error::{err, ok, store_err};
use crate::ipc::handlers::views::{close_view, open_view};
use crate::ipc::helpers::str_param;
use crate::ipc::types::{AppState, Request, PORTAL_VIEW_ID};
use crate::model::Branch;
use crate::portal::{PortalAction, Screen, TransitionError};
use crate::rank::RosterSort;
use crate::store::StoreError;
use serde_json::json;

pub enum PortalFailure {
    NotSignedIn,
    Transition(TransitionError),
    Store(StoreError),
}

impl PortalFailure {
    pub fn respond(&self, id: &str) -> serde_json::Value {
        match self {
            PortalFailure::NotSignedIn => err(id, "not_authenticated", "sign in first", None),
            PortalFailure::Transition(e) => err(id, "bad_transition", e.to_string(), None),
            PortalFailure::Store(e) => store_err(id, e),
        }
    }
}

/// Applies a portal transition, then swaps the portal's live view: the old
/// subscription is released and the new screen's view (if any) is opened.
pub fn advance_portal(
    state: &mut AppState,
    action: PortalAction,
) -> Result<serde_json::Value, PortalFailure> {
    let (Some(portal), Some(session)) = (state.portal.as_ref(), state.session.as_ref()) else {
        return Err(PortalFailure::NotSignedIn);
    };
    let next = portal.apply(action).map_err(PortalFailure::Transition)?;
    let query = next.view_query(&session.record_key);

    close_view(state, PORTAL_VIEW_ID);
    let view = match query {
        Some(q) => open_view(state, PORTAL_VIEW_ID, q).map_err(PortalFailure::Store)?,
        None => serde_json::Value::Null,
    };
    let result = json!({ "state": next, "view": view });
    state.portal = Some(next);
    Ok(result)
}

/// "All" or an empty value clears a filter.
fn optional_filter(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("ALL"))
}

fn parse_action(req: &Request) -> Result<PortalAction, String> {
    let Some(action) = str_param(req, "action") else {
        return Err("missing action".to_string());
    };
    match action {
        "open" => {
            let screen = str_param(req, "screen").unwrap_or("");
            Screen::parse(screen)
                .map(PortalAction::Open)
                .ok_or_else(|| format!("unknown screen: {}", screen))
        }
        "back" => Ok(PortalAction::Back),
        "studentAdded" => Ok(PortalAction::StudentAdded),
        "setBranch" => match optional_filter(str_param(req, "branch")) {
            None => Ok(PortalAction::SetBranch(None)),
            Some(b) => Branch::parse(b)
                .map(|b| PortalAction::SetBranch(Some(b)))
                .ok_or_else(|| format!("unknown branch: {}", b)),
        },
        "setSection" => Ok(PortalAction::SetSection(
            optional_filter(str_param(req, "section")).map(|s| s.to_string()),
        )),
        "setSort" => {
            let sort = str_param(req, "sort").unwrap_or("none");
            RosterSort::parse(sort)
                .map(PortalAction::SetSort)
                .ok_or_else(|| format!("unknown sort: {}", sort))
        }
        other => Err(format!("unknown action: {}", other)),
    }
}

fn handle_portal_state(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(portal) = state.portal.as_ref() else {
        return err(&req.id, "not_authenticated", "sign in first", None);
    };
    let view = state
        .views
        .get(PORTAL_VIEW_ID)
        .map(|live| json!({ "version": live.version(), "view": live.view() }));
    ok(&req.id, json!({ "state": portal, "view": view }))
}

fn handle_portal_navigate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let action = match parse_action(req) {
        Ok(a) => a,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match advance_portal(state, action) {
        Ok(result) => ok(&req.id, result),
        Err(f) => f.respond(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "portal.state" => Some(handle_portal_state(state, req)),
        "portal.navigate" => Some(handle_portal_navigate(state, req)),
        _ => None,
    }
}
