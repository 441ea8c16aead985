use crate::auth::{teacher_login, teacher_signup};
use crate::identity::IdentityToken;
use crate::ipc::error::{err, identity_err, login_err, ok};
use crate::ipc::helpers::{require_store, require_str};
use crate::ipc::types::{AppState, Request};
use crate::portal::PortalState;
use serde_json::json;

fn start_session(state: &mut AppState, token: IdentityToken) -> serde_json::Value {
    state.sign_out();
    tracing::info!(role = token.role.as_str(), login_id = %token.login_id, "signed in");
    let portal = PortalState::new(token.role);
    let result = json!({ "session": token, "portal": portal });
    state.session = Some(token);
    state.portal = Some(portal);
    result
}

fn handle_teacher(state: &mut AppState, req: &Request, signup: bool) -> serde_json::Value {
    let username = match require_str(req, "username") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let password = match require_str(req, "password") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(idp) = state.identities() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let outcome = if signup {
        teacher_signup(&idp, &username, &password)
    } else {
        teacher_login(&idp, &username, &password)
    };
    match outcome {
        Ok(token) => ok(&req.id, start_session(state, token)),
        Err(e) => identity_err(&req.id, &e),
    }
}

fn handle_student_begin(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match require_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let next = {
        let store = match require_store(state, req) {
            Ok(s) => s,
            Err(resp) => return resp,
        };
        state.student_login.submit_id(&store, &student_id)
    };
    match next {
        Ok(next) => {
            let result = json!({ "login": next });
            state.student_login = next;
            ok(&req.id, result)
        }
        Err(e) => login_err(&req.id, &e),
    }
}

fn handle_student_complete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let password = match require_str(req, "password") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let outcome = {
        let store = match require_store(state, req) {
            Ok(s) => s,
            Err(resp) => return resp,
        };
        let Some(idp) = state.identities() else {
            return err(&req.id, "no_workspace", "select a workspace first", None);
        };
        state.student_login.submit_secret(&store, &idp, &password)
    };
    match outcome {
        Ok(token) => ok(&req.id, start_session(state, token)),
        Err(e) => login_err(&req.id, &e),
    }
}

fn handle_student_back(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.student_login = state.student_login.back();
    ok(&req.id, json!({ "login": state.student_login }))
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(s) = state.session.as_ref() {
        tracing::info!(login_id = %s.login_id, "signed out");
    }
    state.sign_out();
    ok(&req.id, json!({ "ok": true }))
}

fn handle_session(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "session": state.session,
            "portal": state.portal,
            "login": state.student_login,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.teacher.signup" => Some(handle_teacher(state, req, true)),
        "auth.teacher.login" => Some(handle_teacher(state, req, false)),
        "auth.student.begin" => Some(handle_student_begin(state, req)),
        "auth.student.complete" => Some(handle_student_complete(state, req)),
        "auth.student.back" => Some(handle_student_back(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.session" => Some(handle_session(state, req)),
        _ => None,
    }
}
