use crate::identity::Role;
use crate::live::ViewQuery;
use crate::model::Branch;
use crate::rank::{RankCriteria, RosterSort};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Screen {
    Dashboard,
    AddStudent,
    ViewGrades,
    Performance,
    Failed,
}

impl Screen {
    pub fn parse(s: &str) -> Option<Screen> {
        match s {
            "dashboard" => Some(Screen::Dashboard),
            "addStudent" => Some(Screen::AddStudent),
            "viewGrades" => Some(Screen::ViewGrades),
            "performance" => Some(Screen::Performance),
            "failed" => Some(Screen::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalAction {
    Open(Screen),
    Back,
    /// A teacher finished adding a student.
    StudentAdded,
    SetBranch(Option<Branch>),
    SetSection(Option<String>),
    SetSort(RosterSort),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot apply {action} on {screen:?} as {role:?}")]
pub struct TransitionError {
    pub role: Role,
    pub screen: Screen,
    pub action: String,
}

/// Which panel a signed-in user is looking at, plus its filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalState {
    pub role: Role,
    pub screen: Screen,
    pub criteria: RankCriteria,
    pub sort: RosterSort,
}

impl PortalState {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            screen: Screen::Dashboard,
            criteria: RankCriteria::default(),
            sort: RosterSort::None,
        }
    }

    fn reject(&self, action: &PortalAction) -> TransitionError {
        TransitionError {
            role: self.role,
            screen: self.screen,
            action: format!("{:?}", action),
        }
    }

    fn has_filters(&self) -> bool {
        matches!(
            (self.role, self.screen),
            (Role::Teacher, Screen::ViewGrades)
                | (Role::Student, Screen::ViewGrades)
                | (Role::Student, Screen::Failed)
        )
    }

    fn can_open(&self, target: Screen) -> bool {
        use Screen::*;
        match self.role {
            Role::Teacher => matches!(
                (self.screen, target),
                (Dashboard, AddStudent) | (Dashboard, ViewGrades) | (ViewGrades, AddStudent)
            ),
            Role::Student => {
                self.screen == Dashboard && matches!(target, Performance | ViewGrades | Failed)
            }
        }
    }

    /// Returns the next state. Filters carry over between screens.
    pub fn apply(&self, action: PortalAction) -> Result<PortalState, TransitionError> {
        let mut next = self.clone();
        match &action {
            PortalAction::Open(target) => {
                if !self.can_open(*target) {
                    return Err(self.reject(&action));
                }
                next.screen = *target;
            }
            PortalAction::Back => {
                if self.screen == Screen::Dashboard {
                    return Err(self.reject(&action));
                }
                next.screen = Screen::Dashboard;
            }
            PortalAction::StudentAdded => {
                if self.role != Role::Teacher || self.screen != Screen::AddStudent {
                    return Err(self.reject(&action));
                }
                next.screen = Screen::ViewGrades;
            }
            PortalAction::SetBranch(branch) => {
                if !self.has_filters() {
                    return Err(self.reject(&action));
                }
                next.criteria.branch = *branch;
            }
            PortalAction::SetSection(section) => {
                if !self.has_filters() {
                    return Err(self.reject(&action));
                }
                next.criteria.section = section.clone();
            }
            PortalAction::SetSort(sort) => {
                if self.role != Role::Teacher || self.screen != Screen::ViewGrades {
                    return Err(self.reject(&action));
                }
                next.sort = *sort;
            }
        }
        Ok(next)
    }

    /// Live view the current screen renders, if any. `viewer` is the
    /// signed-in student's record key.
    pub fn view_query(&self, viewer: &str) -> Option<ViewQuery> {
        let group = RankCriteria {
            only_failed: false,
            ..self.criteria.clone()
        };
        match (self.role, self.screen) {
            (_, Screen::Dashboard) | (_, Screen::AddStudent) => None,
            (Role::Teacher, Screen::ViewGrades) => Some(ViewQuery::Roster {
                criteria: group,
                sort: self.sort,
            }),
            (Role::Student, Screen::Performance) => Some(ViewQuery::Leaderboard {
                viewer: Some(viewer.to_string()),
            }),
            (Role::Student, Screen::ViewGrades) => Some(ViewQuery::Rankings { criteria: group }),
            (Role::Student, Screen::Failed) => Some(ViewQuery::Standing {
                criteria: RankCriteria {
                    only_failed: true,
                    ..group
                },
            }),
            (Role::Teacher, Screen::Performance) | (Role::Teacher, Screen::Failed) => None,
        }
    }
}
