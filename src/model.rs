use crate::calc::{compute_grade, LetterGrade};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const BRANCHES: [Branch; 10] = [
    Branch::Cse,
    Branch::Csd,
    Branch::Cai,
    Branch::Aids,
    Branch::Ecm,
    Branch::Ece,
    Branch::Eee,
    Branch::It,
    Branch::Mech,
    Branch::Civil,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Branch {
    Cse,
    Csd,
    Cai,
    Aids,
    Ecm,
    Ece,
    Eee,
    It,
    Mech,
    Civil,
}

impl Branch {
    pub fn code(&self) -> &'static str {
        match self {
            Branch::Cse => "CSE",
            Branch::Csd => "CSD",
            Branch::Cai => "CAI",
            Branch::Aids => "AIDS",
            Branch::Ecm => "ECM",
            Branch::Ece => "ECE",
            Branch::Eee => "EEE",
            Branch::It => "IT",
            Branch::Mech => "MECH",
            Branch::Civil => "CIVIL",
        }
    }

    pub fn parse(s: &str) -> Option<Branch> {
        let t = s.trim();
        BRANCHES
            .iter()
            .copied()
            .find(|b| b.code().eq_ignore_ascii_case(t))
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Year {
    #[serde(rename = "1st")]
    First,
    #[serde(rename = "2nd")]
    Second,
}

impl Year {
    pub fn as_str(&self) -> &'static str {
        match self {
            Year::First => "1st",
            Year::Second => "2nd",
        }
    }

    pub fn parse(s: &str) -> Option<Year> {
        match s.trim() {
            "1st" | "1" => Some(Year::First),
            "2nd" | "2" => Some(Year::Second),
            _ => None,
        }
    }
}

/// Teacher-entered fields for a new student. Derived values are not accepted
/// from callers.
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub id: String,
    pub name: String,
    pub branch: Branch,
    pub section: String,
    pub year: Year,
    pub marks: Vec<i64>,
}

/// One enrolled student, keyed by `id`.
///
/// `total`, `cgpa` and `grade` are private and only ever set from `marks`,
/// so a record cannot hold a stale derivation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub branch: Branch,
    pub section: String,
    pub year: Year,
    marks: Vec<i64>,
    total: i64,
    cgpa: f64,
    grade: LetterGrade,
    pub password_set: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl StudentRecord {
    pub fn new(draft: NewStudent, now: &str) -> Self {
        let summary = compute_grade(&draft.marks);
        Self {
            id: draft.id,
            name: draft.name,
            branch: draft.branch,
            section: draft.section,
            year: draft.year,
            marks: draft.marks,
            total: summary.total,
            cgpa: summary.cgpa,
            grade: summary.grade,
            password_set: false,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    /// Rebuilds a persisted record. Stored derived columns are ignored and
    /// recomputed from `marks`.
    pub fn restore(
        fields: NewStudent,
        password_set: bool,
        created_at: String,
        updated_at: String,
    ) -> Self {
        let mut r = Self::new(fields, &created_at);
        r.password_set = password_set;
        r.updated_at = updated_at;
        r
    }

    /// Full overwrite of the marks; all derived values are recomputed.
    pub fn with_marks(mut self, marks: Vec<i64>, now: &str) -> Self {
        let summary = compute_grade(&marks);
        self.marks = marks;
        self.total = summary.total;
        self.cgpa = summary.cgpa;
        self.grade = summary.grade;
        self.updated_at = now.to_string();
        self
    }

    pub fn marks(&self) -> &[i64] {
        &self.marks
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn cgpa(&self) -> f64 {
        self.cgpa
    }

    pub fn grade(&self) -> LetterGrade {
        self.grade
    }
}
