use std::collections::BTreeMap;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::auth::StudentLogin;
use crate::identity::{IdentityToken, SqliteIdentityProvider};
use crate::live::LiveView;
use crate::portal::PortalState;
use crate::store::{ChangeFeed, SqliteRecordStore};

/// Subscription id reserved for the view the portal screen renders.
pub const PORTAL_VIEW_ID: &str = "portal";

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub feed: ChangeFeed,
    pub session: Option<IdentityToken>,
    pub student_login: StudentLogin,
    pub portal: Option<PortalState>,
    pub views: BTreeMap<String, LiveView>,
    pub next_view_id: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            feed: ChangeFeed::new(),
            session: None,
            student_login: StudentLogin::new(),
            portal: None,
            views: BTreeMap::new(),
            next_view_id: 0,
        }
    }

    pub fn store(&self) -> Option<SqliteRecordStore<'_>> {
        self.db
            .as_ref()
            .map(|conn| SqliteRecordStore::new(conn, &self.feed))
    }

    pub fn identities(&self) -> Option<SqliteIdentityProvider<'_>> {
        self.db.as_ref().map(SqliteIdentityProvider::new)
    }

    /// Drops the session together with everything scoped to it.
    pub fn sign_out(&mut self) {
        self.session = None;
        self.portal = None;
        self.student_login = StudentLogin::new();
        self.views.clear();
    }
}
