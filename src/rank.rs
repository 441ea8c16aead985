use crate::model::{Branch, StudentRecord};
use crate::store::{in_group, CollectionFilter};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Selection applied to a class snapshot. `None` means "All".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankCriteria {
    pub branch: Option<Branch>,
    pub section: Option<String>,
    pub only_failed: bool,
}

impl RankCriteria {
    pub fn matches(&self, r: &StudentRecord) -> bool {
        in_group(self.branch, self.section.as_deref(), r)
            && (!self.only_failed || r.grade().is_fail())
    }

    /// Branch/section part of the selection, as a store filter.
    pub fn group(&self) -> CollectionFilter {
        CollectionFilter {
            branch: self.branch,
            section: self.section.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStudent {
    #[serde(flatten)]
    pub record: StudentRecord,
    pub rank: usize,
}

/// Result of looking up one student in a ranked list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MyRank {
    Ranked(usize),
    Unknown,
}

impl fmt::Display for MyRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MyRank::Ranked(n) => write!(f, "#{}", n),
            MyRank::Unknown => f.write_str("-"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RosterSort {
    #[default]
    None,
    Rank,
    Failed,
}

impl RosterSort {
    pub fn parse(s: &str) -> Option<RosterSort> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Some(RosterSort::None),
            "rank" => Some(RosterSort::Rank),
            "failed" => Some(RosterSort::Failed),
            _ => None,
        }
    }
}

/// One row of the teacher's grade table. `serial` is the 1-based display
/// position; `rank` is only present in rank order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterRow {
    pub serial: usize,
    #[serde(flatten)]
    pub record: StudentRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
}

/// CGPA descending; equal CGPAs fall back to id ascending so the order is
/// total and repeatable.
fn rank_order(a: &StudentRecord, b: &StudentRecord) -> Ordering {
    b.cgpa()
        .total_cmp(&a.cgpa())
        .then_with(|| a.id.cmp(&b.id))
}

fn assign_ranks(mut list: Vec<StudentRecord>) -> Vec<RankedStudent> {
    list.sort_by(rank_order);
    list.into_iter()
        .enumerate()
        .map(|(i, record)| RankedStudent { record, rank: i + 1 })
        .collect()
}

/// Ranks the whole class. Output length equals input length and ranks are
/// exactly `1..=n`.
pub fn global_rank(all: &[StudentRecord]) -> Vec<RankedStudent> {
    assign_ranks(all.to_vec())
}

/// Filters first, then ranks within the remaining subset.
pub fn filtered_rank(all: &[StudentRecord], criteria: &RankCriteria) -> Vec<RankedStudent> {
    assign_ranks(all.iter().filter(|r| criteria.matches(r)).cloned().collect())
}

fn rank_group(all: &[StudentRecord], group: &CollectionFilter) -> Vec<RankedStudent> {
    assign_ranks(all.iter().filter(|r| group.matches(r)).cloned().collect())
}

/// Ranks within the branch/section group, then applies `only_failed`. Rank
/// numbers match `filtered_rank` over the same group, so a failed student
/// keeps the rank shown on the grades screen.
pub fn class_standing(all: &[StudentRecord], criteria: &RankCriteria) -> Vec<RankedStudent> {
    rank_group(all, &criteria.group())
        .into_iter()
        .filter(|r| !criteria.only_failed || r.record.grade().is_fail())
        .collect()
}

pub fn my_rank(ranked: &[RankedStudent], student_id: &str) -> MyRank {
    ranked
        .iter()
        .find(|r| r.record.id == student_id)
        .map(|r| MyRank::Ranked(r.rank))
        .unwrap_or(MyRank::Unknown)
}

/// Teacher table. Branch/section always apply; `sort` picks id order, rank
/// order (ranked within the filtered group), or failed-only in id order.
pub fn roster(all: &[StudentRecord], criteria: &RankCriteria, sort: RosterSort) -> Vec<RosterRow> {
    let group = criteria.group();
    let rows: Vec<(StudentRecord, Option<usize>)> = match sort {
        RosterSort::Rank => rank_group(all, &group)
            .into_iter()
            .map(|r| (r.record, Some(r.rank)))
            .collect(),
        RosterSort::None | RosterSort::Failed => {
            let mut list: Vec<StudentRecord> = all
                .iter()
                .filter(|r| group.matches(r))
                .filter(|r| sort != RosterSort::Failed || r.grade().is_fail())
                .cloned()
                .collect();
            list.sort_by(|a, b| a.id.cmp(&b.id));
            list.into_iter().map(|r| (r, None)).collect()
        }
    };
    rows.into_iter()
        .enumerate()
        .map(|(i, (record, rank))| RosterRow {
            serial: i + 1,
            record,
            rank,
        })
        .collect()
}

fn parse_all_or<T>(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, String> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(format!("criteria.{} must be string or null", key));
            };
            let t = s.trim();
            if t.is_empty() || t.eq_ignore_ascii_case("ALL") {
                return Ok(None);
            }
            parse(t)
                .map(Some)
                .ok_or_else(|| format!("criteria.{} has unknown value: {}", key, t))
        }
    }
}

/// Parses `{branch?, section?, onlyFailed?}`; "All" or empty means no filter.
pub fn parse_criteria(raw: Option<&serde_json::Value>) -> Result<RankCriteria, String> {
    let Some(raw) = raw else {
        return Ok(RankCriteria::default());
    };
    if raw.is_null() {
        return Ok(RankCriteria::default());
    }
    let Some(obj) = raw.as_object() else {
        return Err("criteria must be an object".to_string());
    };

    let branch = parse_all_or(obj, "branch", Branch::parse)?;
    let section = parse_all_or(obj, "section", |s| Some(s.to_string()))?;
    let only_failed = match obj.get("onlyFailed") {
        None => false,
        Some(v) if v.is_null() => false,
        Some(v) => match v.as_bool() {
            Some(b) => b,
            None => return Err("criteria.onlyFailed must be boolean".to_string()),
        },
    };

    Ok(RankCriteria {
        branch,
        section,
        only_failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewStudent, Year};
    use serde_json::json;

    fn student(id: &str, branch: Branch, section: &str, marks: Vec<i64>) -> StudentRecord {
        StudentRecord::new(
            NewStudent {
                id: id.into(),
                name: format!("Student {}", id),
                branch,
                section: section.into(),
                year: Year::First,
                marks,
            },
            "2026-01-01T00:00:00Z",
        )
    }

    fn class() -> Vec<StudentRecord> {
        vec![
            student("S4", Branch::Ece, "B", vec![30, 30]), // 3.0 F
            student("S2", Branch::Cse, "A", vec![85, 85]), // 8.5
            student("S1", Branch::Cse, "A", vec![85, 85]), // 8.5
            student("S3", Branch::Cse, "B", vec![95, 95]), // 9.5
            student("S5", Branch::Cse, "A", vec![20, 10]), // 1.5 F
        ]
    }

    fn ids(v: &[RankedStudent]) -> Vec<&str> {
        v.iter().map(|r| r.record.id.as_str()).collect()
    }

    #[test]
    fn global_rank_is_dense_permutation_in_cgpa_order() {
        let ranked = global_rank(&class());
        assert_eq!(ranked.len(), 5);
        let ranks: Vec<usize> = ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
        for w in ranked.windows(2) {
            assert!(w[0].record.cgpa() >= w[1].record.cgpa());
        }
        assert_eq!(ids(&ranked), vec!["S3", "S1", "S2", "S4", "S5"]);
    }

    #[test]
    fn ties_break_by_id_ascending() {
        let ranked = global_rank(&class());
        assert_eq!(my_rank(&ranked, "S1"), MyRank::Ranked(2));
        assert_eq!(my_rank(&ranked, "S2"), MyRank::Ranked(3));
    }

    #[test]
    fn ranking_is_idempotent_and_input_order_independent() {
        let mut reversed = class();
        reversed.reverse();
        let a = global_rank(&class());
        let b = global_rank(&class());
        let c = global_rank(&reversed);
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn filtered_rank_ranks_within_subset() {
        let criteria = RankCriteria {
            section: Some("A".into()),
            ..Default::default()
        };
        let ranked = filtered_rank(&class(), &criteria);
        assert_eq!(ids(&ranked), vec!["S1", "S2", "S5"]);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn only_failed_in_filtered_mode_renumbers() {
        let criteria = RankCriteria {
            only_failed: true,
            ..Default::default()
        };
        let ranked = filtered_rank(&class(), &criteria);
        assert!(ranked.iter().all(|r| r.record.grade().is_fail()));
        assert_eq!(ids(&ranked), vec!["S4", "S5"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);
    }

    #[test]
    fn only_failed_standing_without_group_keeps_class_rank() {
        let criteria = RankCriteria {
            only_failed: true,
            ..Default::default()
        };
        let standing = class_standing(&class(), &criteria);
        assert_eq!(ids(&standing), vec!["S4", "S5"]);
        assert_eq!(standing[0].rank, 4);
        assert_eq!(standing[1].rank, 5);
    }

    #[test]
    fn standing_ranks_within_group_before_cutting_to_failed() {
        let group = RankCriteria {
            branch: Some(Branch::Cse),
            section: Some("A".into()),
            ..Default::default()
        };
        let failed = RankCriteria {
            only_failed: true,
            ..group.clone()
        };
        let grades = filtered_rank(&class(), &group);
        assert_eq!(ids(&grades), vec!["S1", "S2", "S5"]);

        let standing = class_standing(&class(), &failed);
        assert_eq!(ids(&standing), vec!["S5"]);
        assert_eq!(standing[0].rank, 3);
        assert_eq!(my_rank(&grades, "S5"), MyRank::Ranked(standing[0].rank));

        // Without only_failed, standing and filtered agree entirely.
        assert_eq!(class_standing(&class(), &group), grades);
    }

    #[test]
    fn criteria_group_selects_what_criteria_matches() {
        let criteria = RankCriteria {
            branch: Some(Branch::Cse),
            section: Some("B".into()),
            only_failed: false,
        };
        let group = criteria.group();
        for r in class() {
            assert_eq!(group.matches(&r), criteria.matches(&r), "{}", r.id);
        }
        assert_eq!(ids(&filtered_rank(&class(), &criteria)), vec!["S3"]);
    }

    #[test]
    fn my_rank_unknown_for_missing_id() {
        let ranked = global_rank(&class());
        assert_eq!(my_rank(&ranked, "S99"), MyRank::Unknown);
        assert_eq!(my_rank(&[], "S1"), MyRank::Unknown);
        assert_eq!(MyRank::Unknown.to_string(), "-");
        assert_eq!(MyRank::Ranked(3).to_string(), "#3");
    }

    #[test]
    fn empty_class_ranks_to_empty() {
        assert!(global_rank(&[]).is_empty());
        assert!(filtered_rank(&[], &RankCriteria::default()).is_empty());
    }

    #[test]
    fn roster_sort_modes() {
        let criteria = RankCriteria {
            branch: Some(Branch::Cse),
            ..Default::default()
        };

        let plain = roster(&class(), &criteria, RosterSort::None);
        let plain_ids: Vec<&str> = plain.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(plain_ids, vec!["S1", "S2", "S3", "S5"]);
        assert!(plain.iter().all(|r| r.rank.is_none()));
        assert_eq!(plain[3].serial, 4);

        let ranked = roster(&class(), &criteria, RosterSort::Rank);
        let ranked_ids: Vec<&str> = ranked.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ranked_ids, vec!["S3", "S1", "S2", "S5"]);
        assert_eq!(ranked[0].rank, Some(1));

        let failed = roster(&class(), &criteria, RosterSort::Failed);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].record.id, "S5");
        assert_eq!(failed[0].serial, 1);
    }

    #[test]
    fn parse_criteria_accepts_all_and_rejects_junk() {
        let parsed = parse_criteria(Some(&json!({
            "branch": "All",
            "section": "ALL",
            "onlyFailed": null
        })))
        .expect("parse criteria");
        assert_eq!(parsed, RankCriteria::default());

        let parsed = parse_criteria(Some(&json!({ "branch": "ece", "section": "B", "onlyFailed": true })))
            .expect("parse criteria");
        assert_eq!(parsed.branch, Some(Branch::Ece));
        assert_eq!(parsed.section.as_deref(), Some("B"));
        assert!(parsed.only_failed);

        assert!(parse_criteria(Some(&json!({ "branch": "BIO" }))).is_err());
        assert!(parse_criteria(Some(&json!({ "onlyFailed": "yes" }))).is_err());
        assert!(parse_criteria(Some(&json!([1]))).is_err());
    }
}
