use serde::{Deserialize, Serialize};

/// Letter grade derived from a CGPA. `NotApplicable` is only produced when a
/// student has no subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    F,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl LetterGrade {
    pub fn as_str(&self) -> &'static str {
        match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::F => "F",
            LetterGrade::NotApplicable => "N/A",
        }
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, LetterGrade::F)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeSummary {
    pub total: i64,
    pub cgpa: f64,
    pub grade: LetterGrade,
}

impl GradeSummary {
    pub fn empty() -> Self {
        Self {
            total: 0,
            cgpa: 0.0,
            grade: LetterGrade::NotApplicable,
        }
    }
}

/// Upper bound on subjects per student, matching the entry form.
pub const MAX_SUBJECTS: i64 = 10;

/// CGPA in hundredths: `round((total / count) / 10, 2) * 100`, rounding half
/// away from zero. Integer arithmetic keeps the threshold checks exact; i128
/// keeps it exact for any i64 marks.
fn cgpa_hundredths(total: i128, count: usize) -> i128 {
    let num = total.saturating_mul(10);
    let count = count as u128;
    let half_up = num
        .unsigned_abs()
        .saturating_mul(2)
        .saturating_add(count)
        / (2 * count);
    let half_up = i128::try_from(half_up).unwrap_or(i128::MAX);
    if num < 0 {
        -half_up
    } else {
        half_up
    }
}

fn grade_for(hundredths: i128) -> LetterGrade {
    let mut grade = LetterGrade::C;
    if hundredths >= 800 {
        grade = LetterGrade::B;
    }
    if hundredths >= 900 {
        grade = LetterGrade::A;
    }
    // Fail is checked last and wins over everything above.
    if hundredths < 400 {
        grade = LetterGrade::F;
    }
    grade
}

/// Derives total, CGPA and letter grade from per-subject marks.
///
/// Marks are taken as-is: negative or >100 values are not rejected here.
pub fn compute_grade(marks: &[i64]) -> GradeSummary {
    if marks.is_empty() {
        return GradeSummary::empty();
    }
    let total: i128 = marks.iter().map(|&m| i128::from(m)).sum();
    let hundredths = cgpa_hundredths(total, marks.len());
    GradeSummary {
        // Reported total saturates; CGPA and grade use the exact sum.
        total: total.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64,
        cgpa: hundredths as f64 / 100.0,
        grade: grade_for(hundredths),
    }
}

/// Coerces one entered mark to an integer. Numbers truncate toward zero,
/// numeric strings parse, anything else becomes 0.
pub fn coerce_mark(raw: &serde_json::Value) -> i64 {
    if let Some(n) = raw.as_i64() {
        return n;
    }
    if let Some(f) = raw.as_f64() {
        if f.is_finite() {
            return f.trunc() as i64;
        }
        return 0;
    }
    if let Some(s) = raw.as_str() {
        let t = s.trim();
        if let Ok(n) = t.parse::<i64>() {
            return n;
        }
        if let Ok(f) = t.parse::<f64>() {
            if f.is_finite() {
                return f.trunc() as i64;
            }
        }
    }
    0
}

/// Shapes entered marks to the declared subject count: missing subjects are
/// filled with 0, extra entries dropped. A negative count means no subjects;
/// counts above `MAX_SUBJECTS` are capped.
pub fn fit_to_subject_count(mut marks: Vec<i64>, subject_count: Option<i64>) -> Vec<i64> {
    let Some(count) = subject_count else {
        return marks;
    };
    if count <= 0 {
        return Vec::new();
    }
    marks.resize(count.min(MAX_SUBJECTS) as usize, 0);
    marks
}
