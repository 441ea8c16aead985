use crate::auth::LoginError;
use crate::identity::IdentityError;
use crate::store::StoreError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn store_err(id: &str, e: &StoreError) -> serde_json::Value {
    if let StoreError::Unavailable(_) = e {
        tracing::warn!(error = %e, "record store failure");
    }
    err(id, e.code(), e.to_string(), None)
}

pub fn identity_err(id: &str, e: &IdentityError) -> serde_json::Value {
    err(id, e.code(), e.to_string(), None)
}

pub fn login_err(id: &str, e: &LoginError) -> serde_json::Value {
    err(id, e.code(), e.to_string(), None)
}
