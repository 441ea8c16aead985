//! Teacher signup/login and the two-step student login wizard.

use crate::identity::{
    teacher_login_id, validate_secret, validate_teacher_username, IdentityError,
    IdentityProvider, IdentityToken, NewIdentity, Role,
};
use crate::registry;
use crate::store::{RecordStore, StoreError};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LoginError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("enter a student id first")]
    WrongStep,
}

impl LoginError {
    pub fn code(&self) -> &'static str {
        match self {
            LoginError::Store(e) => e.code(),
            LoginError::Identity(e) => e.code(),
            LoginError::WrongStep => "bad_transition",
        }
    }
}

pub fn teacher_signup<P: IdentityProvider + ?Sized>(
    idp: &P,
    username: &str,
    secret: &str,
) -> Result<IdentityToken, IdentityError> {
    let username = username.trim();
    validate_teacher_username(username)?;
    validate_secret(secret)?;
    let record_key = Uuid::new_v4().to_string();
    idp.create_identity(NewIdentity {
        role: Role::Teacher,
        login_id: &teacher_login_id(username),
        secret,
        record_key: &record_key,
        display_name: username,
    })
}

pub fn teacher_login<P: IdentityProvider + ?Sized>(
    idp: &P,
    username: &str,
    secret: &str,
) -> Result<IdentityToken, IdentityError> {
    idp.authenticate(Role::Teacher, &teacher_login_id(username), secret)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum StudentLoginStep {
    EnterId,
    #[serde(rename_all = "camelCase")]
    EnterSecret { student_id: String, first_time: bool },
}

/// Student login wizard. Each call returns the next state; the current one is
/// never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentLogin {
    #[serde(flatten)]
    step: StudentLoginStep,
}

impl Default for StudentLogin {
    fn default() -> Self {
        Self::new()
    }
}

impl StudentLogin {
    pub fn new() -> Self {
        Self {
            step: StudentLoginStep::EnterId,
        }
    }

    #[cfg(test)]
    pub fn step(&self) -> &StudentLoginStep {
        &self.step
    }

    /// Step 1: the student must already have been added by a teacher.
    pub fn submit_id<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        student_id: &str,
    ) -> Result<StudentLogin, LoginError> {
        let student_id = student_id.trim();
        let record = store.get(student_id)?;
        Ok(StudentLogin {
            step: StudentLoginStep::EnterSecret {
                student_id: record.id,
                first_time: !record.password_set,
            },
        })
    }

    pub fn back(&self) -> StudentLogin {
        StudentLogin::new()
    }

    /// Step 2: set the secret on first login, otherwise check it.
    pub fn submit_secret<S, P>(
        &self,
        store: &S,
        idp: &P,
        secret: &str,
    ) -> Result<IdentityToken, LoginError>
    where
        S: RecordStore + ?Sized,
        P: IdentityProvider + ?Sized,
    {
        let StudentLoginStep::EnterSecret {
            student_id,
            first_time,
        } = &self.step
        else {
            return Err(LoginError::WrongStep);
        };
        validate_secret(secret)?;

        if !*first_time {
            return Ok(idp.authenticate(Role::Student, student_id, secret)?);
        }

        let record = store.get(student_id)?;
        let created = idp.create_identity(NewIdentity {
            role: Role::Student,
            login_id: student_id,
            secret,
            record_key: &record.id,
            display_name: &record.name,
        });
        match created {
            Ok(token) => {
                registry::mark_password_set(store, student_id)?;
                Ok(token)
            }
            // Identity exists but the record flag was never set: treat it as
            // an ordinary login and repair the flag.
            Err(IdentityError::AlreadyExists(_)) => {
                let token = idp.authenticate(Role::Student, student_id, secret)?;
                registry::mark_password_set(store, student_id)?;
                Ok(token)
            }
            Err(e) => Err(e.into()),
        }
    }
}
