//! Project board schema types and resolution helpers.
//!
//! A [`ProjectSchema`] is a read-only snapshot of a ProjectV2 board's field
//! definitions, fetched once per run. Resolution rules:
//!
//! - field names match **exactly**;
//! - select option values match **case-insensitively by substring** (a
//!   configured target `todo` matches an option named `Todo 📋`);
//! - iteration fields resolve to the iteration whose half-open window
//!   `[start_date, start_date + duration)` contains the given day.

use chrono::{Days, NaiveDate};
use serde::Deserialize;

/// A selectable option on a single-select project field.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldOption {
    /// Opaque option node id.
    pub id: String,
    /// Display name, e.g. `Todo 📋`.
    pub name: String,
}

/// One iteration (time window) of an iteration-typed field.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Iteration {
    /// Opaque iteration node id.
    pub id: String,
    /// First day of the window.
    pub start_date: NaiveDate,
    /// Window length in days.
    pub duration: u32,
}

impl Iteration {
    /// Whether `day` falls inside `[start_date, start_date + duration)`.
    #[must_use]
    pub fn contains(&self, day: NaiveDate) -> bool {
        let end = self.start_date + Days::new(u64::from(self.duration));
        self.start_date <= day && day < end
    }
}

/// A named field on the project board.
///
/// Single-select fields carry `options`; iteration fields carry
/// `iterations`; other field kinds carry neither.
#[derive(Debug, Clone)]
pub struct ProjectField {
    /// Opaque field node id.
    pub id: String,
    /// Field name as shown on the board, e.g. `monthly milestone`.
    pub name: String,
    /// Select options, empty for non-select fields.
    pub options: Vec<FieldOption>,
    /// Iterations, empty for non-iteration fields.
    pub iterations: Vec<Iteration>,
}

impl ProjectField {
    /// Resolve a select option by case-insensitive substring match.
    ///
    /// When several option names contain the target substring, the last
    /// one wins.
    #[must_use]
    pub fn option_matching(&self, target: &str) -> Option<&FieldOption> {
        let needle = target.to_lowercase();
        self.options
            .iter()
            .rev()
            .find(|option| option.name.to_lowercase().contains(&needle))
    }

    /// The iteration whose window contains `day`, if any.
    ///
    /// Gaps between iterations are expected (e.g. a board whose milestones
    /// lapsed); the caller treats `None` as "leave the field unset".
    #[must_use]
    pub fn current_iteration(&self, day: NaiveDate) -> Option<&Iteration> {
        self.iterations.iter().find(|it| it.contains(day))
    }
}

/// A resolved field id + value id pair, ready to be written to an item.
#[derive(Debug, Clone)]
pub struct FieldValue {
    /// Field node id.
    pub field_id: String,
    /// Option or iteration node id to set.
    pub value_id: String,
}

/// Snapshot of a project board's identity and field definitions.
#[derive(Debug, Clone)]
pub struct ProjectSchema {
    /// The project's opaque node id, used by every mutation.
    pub project_id: String,
    /// All fields on the board.
    pub fields: Vec<ProjectField>,
}

impl ProjectSchema {
    /// Look up a field by exact name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&ProjectField> {
        self.fields.iter().find(|field| field.name == name)
    }
}
