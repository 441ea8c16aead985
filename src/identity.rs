use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("identity not found: {0}")]
    NotFound(String),
    #[error("wrong secret")]
    WrongSecret,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

impl IdentityError {
    pub fn code(&self) -> &'static str {
        match self {
            IdentityError::AlreadyExists(_) => "already_exists",
            IdentityError::InvalidInput(_) => "invalid_input",
            IdentityError::NotFound(_) => "not_found",
            IdentityError::WrongSecret => "wrong_secret",
            IdentityError::Unavailable(_) => "unavailable",
        }
    }
}

impl From<rusqlite::Error> for IdentityError {
    fn from(e: rusqlite::Error) -> Self {
        IdentityError::Unavailable(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

/// Proof of a successful signup or login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityToken {
    pub token: String,
    pub role: Role,
    pub login_id: String,
    /// Internal key of the record this identity is linked to: the student id
    /// for students, a generated key for teachers.
    pub record_key: String,
    pub display_name: String,
    pub issued_at: String,
}

#[derive(Debug, Clone)]
pub struct NewIdentity<'a> {
    pub role: Role,
    pub login_id: &'a str,
    pub secret: &'a str,
    pub record_key: &'a str,
    pub display_name: &'a str,
}

pub trait IdentityProvider {
    fn create_identity(&self, new: NewIdentity<'_>) -> Result<IdentityToken, IdentityError>;
    fn authenticate(
        &self,
        role: Role,
        login_id: &str,
        secret: &str,
    ) -> Result<IdentityToken, IdentityError>;
}

/// Secrets are ASCII letters and digits only.
pub fn validate_secret(secret: &str) -> Result<(), IdentityError> {
    if secret.is_empty() || !secret.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(IdentityError::InvalidInput(
            "password must contain only letters and numbers".to_string(),
        ));
    }
    Ok(())
}

/// Teacher usernames are letters and spaces, with at least one letter.
pub fn validate_teacher_username(name: &str) -> Result<(), IdentityError> {
    let ok = name.chars().any(|c| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c.is_whitespace());
    if !ok {
        return Err(IdentityError::InvalidInput(
            "username can only contain letters and spaces".to_string(),
        ));
    }
    Ok(())
}

/// Public login id for a teacher username: whitespace removed, lower-cased.
pub fn teacher_login_id(username: &str) -> String {
    username
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

fn hash_secret(salt: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct SqliteIdentityProvider<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteIdentityProvider<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn issue(&self, role: Role, login_id: &str, record_key: String, display_name: String) -> IdentityToken {
        IdentityToken {
            token: Uuid::new_v4().to_string(),
            role,
            login_id: login_id.to_string(),
            record_key,
            display_name,
            issued_at: now_rfc3339(),
        }
    }
}

impl IdentityProvider for SqliteIdentityProvider<'_> {
    fn create_identity(&self, new: NewIdentity<'_>) -> Result<IdentityToken, IdentityError> {
        if new.login_id.trim().is_empty() {
            return Err(IdentityError::InvalidInput("login id must not be empty".to_string()));
        }
        validate_secret(new.secret)?;

        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM identities WHERE role = ? AND login_id = ?",
                (new.role.as_str(), new.login_id),
                |r| r.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(IdentityError::AlreadyExists(new.login_id.to_string()));
        }

        let salt = Uuid::new_v4().simple().to_string();
        self.conn.execute(
            "INSERT INTO identities(role, login_id, record_key, display_name, salt, secret_hash, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            (
                new.role.as_str(),
                new.login_id,
                new.record_key,
                new.display_name,
                &salt,
                hash_secret(&salt, new.secret),
                now_rfc3339(),
            ),
        )?;
        tracing::info!(role = new.role.as_str(), login_id = %new.login_id, "identity created");

        Ok(self.issue(
            new.role,
            new.login_id,
            new.record_key.to_string(),
            new.display_name.to_string(),
        ))
    }

    fn authenticate(
        &self,
        role: Role,
        login_id: &str,
        secret: &str,
    ) -> Result<IdentityToken, IdentityError> {
        let row: Option<(String, String, String, String)> = self
            .conn
            .query_row(
                "SELECT record_key, display_name, salt, secret_hash
                 FROM identities
                 WHERE role = ? AND login_id = ?",
                (role.as_str(), login_id),
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()?;
        let Some((record_key, display_name, salt, secret_hash)) = row else {
            return Err(IdentityError::NotFound(login_id.to_string()));
        };
        if hash_secret(&salt, secret) != secret_hash {
            tracing::warn!(role = role.as_str(), login_id = %login_id, "authentication rejected");
            return Err(IdentityError::WrongSecret);
        }
        Ok(self.issue(role, login_id, record_key, display_name))
    }
}
