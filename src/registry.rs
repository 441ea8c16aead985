use crate::model::{NewStudent, StudentRecord};
use crate::store::{RecordStore, StoreError};
use chrono::{SecondsFormat, Utc};

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Adds a new student. Ids are never reused: an existing record is an error,
/// not an overwrite.
pub fn register<S: RecordStore + ?Sized>(
    store: &S,
    draft: NewStudent,
) -> Result<StudentRecord, StoreError> {
    match store.get(&draft.id) {
        Ok(_) => return Err(StoreError::AlreadyExists(draft.id)),
        Err(StoreError::NotFound(_)) => {}
        Err(e) => return Err(e),
    }
    let record = StudentRecord::new(draft, &now_rfc3339());
    store.put(&record.id, &record)?;
    Ok(record)
}

/// Replaces every mark for a student and rewrites the derived values.
pub fn update_marks<S: RecordStore + ?Sized>(
    store: &S,
    student_id: &str,
    marks: Vec<i64>,
) -> Result<StudentRecord, StoreError> {
    let record = store.get(student_id)?.with_marks(marks, &now_rfc3339());
    store.put(student_id, &record)?;
    Ok(record)
}

pub fn remove<S: RecordStore + ?Sized>(store: &S, student_id: &str) -> Result<(), StoreError> {
    store.delete(student_id)
}

/// Records that a student has created their login secret.
pub fn mark_password_set<S: RecordStore + ?Sized>(
    store: &S,
    student_id: &str,
) -> Result<StudentRecord, StoreError> {
    let mut record = store.get(student_id)?;
    if record.password_set {
        return Ok(record);
    }
    record.password_set = true;
    record.updated_at = now_rfc3339();
    store.put(student_id, &record)?;
    Ok(record)
}
