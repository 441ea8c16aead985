use crate::model::StudentRecord;
use crate::rank::{
    class_standing, filtered_rank, global_rank, my_rank, parse_criteria, roster, MyRank,
    RankCriteria, RankedStudent, RosterRow, RosterSort,
};
use crate::store::{CollectionFilter, RecordStore, StoreError, Subscription};
use serde::Serialize;

/// What a live view shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewQuery {
    /// Whole-class ranking, optionally highlighting one student.
    Leaderboard { viewer: Option<String> },
    /// Ranks within the filtered subset.
    Rankings { criteria: RankCriteria },
    /// Class-wide ranks, then filtered.
    Standing { criteria: RankCriteria },
    Roster {
        criteria: RankCriteria,
        sort: RosterSort,
    },
    Student { student_id: String },
}

impl ViewQuery {
    pub fn parse(raw: &serde_json::Value) -> Result<ViewQuery, String> {
        let Some(obj) = raw.as_object() else {
            return Err("query must be an object".to_string());
        };
        let kind = obj.get("kind").and_then(|v| v.as_str()).unwrap_or("");
        let criteria = || parse_criteria(obj.get("criteria"));
        match kind {
            "leaderboard" => Ok(ViewQuery::Leaderboard {
                viewer: obj
                    .get("viewer")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
            }),
            "rankings" => Ok(ViewQuery::Rankings {
                criteria: criteria()?,
            }),
            "standing" => Ok(ViewQuery::Standing {
                criteria: criteria()?,
            }),
            "roster" => {
                let sort = match obj.get("sort").and_then(|v| v.as_str()) {
                    None => RosterSort::None,
                    Some(s) => RosterSort::parse(s)
                        .ok_or_else(|| format!("unknown roster sort: {}", s))?,
                };
                Ok(ViewQuery::Roster {
                    criteria: criteria()?,
                    sort,
                })
            }
            "student" => {
                let Some(id) = obj.get("studentId").and_then(|v| v.as_str()) else {
                    return Err("student view needs studentId".to_string());
                };
                Ok(ViewQuery::Student {
                    student_id: id.to_string(),
                })
            }
            other => Err(format!("unknown view kind: {}", other)),
        }
    }

    /// Predicate that can be pushed into the store subscription without
    /// changing the derived result.
    fn collection_filter(&self) -> CollectionFilter {
        match self {
            ViewQuery::Rankings { criteria }
            | ViewQuery::Roster { criteria, .. }
            | ViewQuery::Standing { criteria } => criteria.group(),
            _ => CollectionFilter::all(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DerivedView {
    #[serde(rename_all = "camelCase")]
    Leaderboard {
        entries: Vec<RankedStudent>,
        my_rank: Option<MyRank>,
    },
    Rankings {
        entries: Vec<RankedStudent>,
    },
    Standing {
        entries: Vec<RankedStudent>,
    },
    Roster {
        rows: Vec<RosterRow>,
    },
    Student {
        record: Option<StudentRecord>,
    },
}

/// Pure derivation of a collection view from one snapshot.
pub fn derive(query: &ViewQuery, records: &[StudentRecord]) -> DerivedView {
    match query {
        ViewQuery::Leaderboard { viewer } => {
            let entries = global_rank(records);
            let my_rank = viewer.as_deref().map(|id| my_rank(&entries, id));
            DerivedView::Leaderboard { entries, my_rank }
        }
        ViewQuery::Rankings { criteria } => DerivedView::Rankings {
            entries: filtered_rank(records, criteria),
        },
        ViewQuery::Standing { criteria } => DerivedView::Standing {
            entries: class_standing(records, criteria),
        },
        ViewQuery::Roster { criteria, sort } => DerivedView::Roster {
            rows: roster(records, criteria, *sort),
        },
        ViewQuery::Student { student_id } => DerivedView::Student {
            record: records.iter().find(|r| &r.id == student_id).cloned(),
        },
    }
}

enum Feed {
    Collection(Subscription<Vec<StudentRecord>>),
    Record(Subscription<Option<StudentRecord>>),
}

/// A derived view kept current from a store subscription. Only the newest
/// snapshot is ever used; a snapshot not newer than the current one is
/// ignored and the previous view stays in place.
pub struct LiveView {
    query: ViewQuery,
    feed: Feed,
    version: Option<u64>,
    view: Option<DerivedView>,
}

impl LiveView {
    pub fn open<S: RecordStore + ?Sized>(store: &S, query: ViewQuery) -> Result<Self, StoreError> {
        let feed = match &query {
            ViewQuery::Student { student_id } => Feed::Record(store.subscribe_key(student_id)?),
            q => Feed::Collection(store.subscribe_collection(q.collection_filter())?),
        };
        let mut live = LiveView {
            query,
            feed,
            version: None,
            view: None,
        };
        live.refresh();
        Ok(live)
    }

    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn view(&self) -> Option<&DerivedView> {
        self.view.as_ref()
    }

    fn is_newer(&self, version: u64) -> bool {
        self.version.map(|v| version > v).unwrap_or(true)
    }

    /// Pulls the newest pending snapshot and recomputes the view from it.
    /// Returns true when the view was replaced.
    pub fn refresh(&mut self) -> bool {
        let (version, next) = match &self.feed {
            Feed::Collection(sub) => {
                let Some(snap) = sub.latest() else {
                    return false;
                };
                if !self.is_newer(snap.version) {
                    return false;
                }
                (snap.version, derive(&self.query, &snap.data))
            }
            Feed::Record(sub) => {
                let Some(snap) = sub.latest() else {
                    return false;
                };
                if !self.is_newer(snap.version) {
                    return false;
                }
                (snap.version, DerivedView::Student { record: snap.data })
            }
        };
        self.version = Some(version);
        self.view = Some(next);
        true
    }
}
