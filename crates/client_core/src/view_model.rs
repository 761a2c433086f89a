//! Render-ready derivation of the recipient table.
//!
//! Everything here is a pure function of the latest snapshot, the active sort
//! and filters, and the current edit session. Nothing reaches the store.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
};

use serde::{Deserialize, Serialize};
use shared::{
    domain::{
        Ethnicity, FieldKey, FieldKind, Gender, Race, RecipientRecord, RevisionMarker,
    },
    error::ParseValueError,
};

use crate::{
    edit_session::EditSession,
    error::ViewError,
    sync::Snapshot,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: FieldKey,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: FieldKey, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    pub fn ascending(field: FieldKey) -> Self {
        Self::new(field, SortDirection::Ascending)
    }

    pub fn descending(field: FieldKey) -> Self {
        Self::new(field, SortDirection::Descending)
    }

    /// Descending flips the comparator so equal keys keep snapshot order.
    pub fn compare(&self, a: &RecipientRecord, b: &RecipientRecord) -> Ordering {
        let ordering = compare_field(self.field, a, b);
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

fn compare_field(field: FieldKey, a: &RecipientRecord, b: &RecipientRecord) -> Ordering {
    let (a, b) = (&a.fields, &b.fields);
    match field {
        FieldKey::FirstName => compare_text(&a.first_name, &b.first_name),
        FieldKey::LastName => compare_text(&a.last_name, &b.last_name),
        FieldKey::HouseholdId => compare_text(&a.household_id, &b.household_id),
        FieldKey::DateOfBirth => a.date_of_birth.cmp(&b.date_of_birth),
        FieldKey::Gender => compare_text(a.gender.as_str(), b.gender.as_str()),
        FieldKey::Race => compare_text(a.race.as_str(), b.race.as_str()),
        FieldKey::Ethnicity => compare_text(a.ethnicity.as_str(), b.ethnicity.as_str()),
        FieldKey::VeteranStatus => a.veteran_status.cmp(&b.veteran_status),
        FieldKey::ActiveStatus => a.active_status.cmp(&b.active_status),
    }
}

/// Accepted values for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "accepted", rename_all = "snake_case")]
pub enum FieldFilter {
    Gender(BTreeSet<Gender>),
    Race(BTreeSet<Race>),
    Ethnicity(BTreeSet<Ethnicity>),
    Flag(BTreeSet<bool>),
    /// Case-insensitive substring match.
    Text(String),
}

impl FieldFilter {
    pub fn text(needle: impl Into<String>) -> Self {
        FieldFilter::Text(needle.into())
    }

    pub fn flag(value: bool) -> Self {
        FieldFilter::Flag(BTreeSet::from([value]))
    }

    fn name(&self) -> &'static str {
        match self {
            FieldFilter::Gender(_) => "gender",
            FieldFilter::Race(_) => "race",
            FieldFilter::Ethnicity(_) => "ethnicity",
            FieldFilter::Flag(_) => "flag",
            FieldFilter::Text(_) => "text",
        }
    }

    fn applies_to(&self, field: FieldKey) -> bool {
        match self {
            FieldFilter::Gender(_) => field == FieldKey::Gender,
            FieldFilter::Race(_) => field == FieldKey::Race,
            FieldFilter::Ethnicity(_) => field == FieldKey::Ethnicity,
            FieldFilter::Flag(_) => field.kind() == FieldKind::Flag,
            FieldFilter::Text(_) => field.is_free_text(),
        }
    }

    /// An empty accepted set or a blank needle filters nothing.
    fn is_unrestricted(&self) -> bool {
        match self {
            FieldFilter::Gender(set) => set.is_empty(),
            FieldFilter::Race(set) => set.is_empty(),
            FieldFilter::Ethnicity(set) => set.is_empty(),
            FieldFilter::Flag(set) => set.is_empty(),
            FieldFilter::Text(needle) => needle.trim().is_empty(),
        }
    }

    fn matches(&self, field: FieldKey, record: &RecipientRecord) -> bool {
        let f = &record.fields;
        match self {
            FieldFilter::Gender(set) => set.contains(&f.gender),
            FieldFilter::Race(set) => set.contains(&f.race),
            FieldFilter::Ethnicity(set) => set.contains(&f.ethnicity),
            FieldFilter::Flag(set) => match field {
                FieldKey::VeteranStatus => set.contains(&f.veteran_status),
                FieldKey::ActiveStatus => set.contains(&f.active_status),
                _ => false,
            },
            FieldFilter::Text(needle) => record
                .text_value(field)
                .to_lowercase()
                .contains(&needle.trim().to_lowercase()),
        }
    }

    /// Parses comma-separated values into the filter kind `field` expects.
    pub fn parse(field: FieldKey, raw: &str) -> Result<Self, ParseValueError> {
        fn collect<T: std::str::FromStr<Err = ParseValueError> + Ord>(
            raw: &str,
        ) -> Result<BTreeSet<T>, ParseValueError> {
            raw.split(',')
                .filter(|part| !part.trim().is_empty())
                .map(str::parse)
                .collect()
        }

        match field {
            FieldKey::Gender => collect(raw).map(FieldFilter::Gender),
            FieldKey::Race => collect(raw).map(FieldFilter::Race),
            FieldKey::Ethnicity => collect(raw).map(FieldFilter::Ethnicity),
            FieldKey::VeteranStatus | FieldKey::ActiveStatus => raw
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(|part| parse_flag(field, part))
                .collect::<Result<BTreeSet<bool>, _>>()
                .map(FieldFilter::Flag),
            _ => Ok(FieldFilter::Text(raw.to_string())),
        }
    }
}

pub(crate) fn parse_flag(field: FieldKey, raw: &str) -> Result<bool, ParseValueError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" => Ok(false),
        _ => Err(ParseValueError::new(field.as_str(), raw, ["true", "false"])),
    }
}

/// At most one filter per field; a missing entry means no filter on that field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    entries: BTreeMap<FieldKey, FieldFilter>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: FieldKey, filter: FieldFilter) -> Result<Self, ViewError> {
        self.insert(field, filter)?;
        Ok(self)
    }

    /// Replaces the entry for `field`. Unrestricted filters remove it.
    pub fn insert(&mut self, field: FieldKey, filter: FieldFilter) -> Result<(), ViewError> {
        if !filter.applies_to(field) {
            return Err(ViewError::FilterMismatch {
                field,
                filter: filter.name(),
            });
        }
        if filter.is_unrestricted() {
            self.entries.remove(&field);
        } else {
            self.entries.insert(field, filter);
        }
        Ok(())
    }

    pub fn remove(&mut self, field: FieldKey) -> Option<FieldFilter> {
        self.entries.remove(&field)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, field: FieldKey) -> Option<&FieldFilter> {
        self.entries.get(&field)
    }

    pub fn is_filtered(&self, field: FieldKey) -> bool {
        self.entries.contains_key(&field)
    }

    pub fn matches(&self, record: &RecipientRecord) -> bool {
        self.entries
            .iter()
            .all(|(field, filter)| filter.matches(*field, record))
    }
}

/// Filters, then stably sorts, a snapshot. Deterministic and side-effect free.
pub fn derive(
    records: &[RecipientRecord],
    sort: Option<&SortSpec>,
    filters: &FilterSpec,
) -> Vec<RecipientRecord> {
    let mut rows: Vec<RecipientRecord> = records
        .iter()
        .filter(|record| filters.matches(record))
        .cloned()
        .collect();
    if let Some(spec) = sort {
        rows.sort_by(|a, b| spec.compare(a, b));
    }
    rows
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayRow {
    pub record: RecipientRecord,
    /// This row is the target of the open edit session.
    pub editing: bool,
    /// Edit links are disabled for every row while any session is active.
    pub edit_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnState {
    pub field: FieldKey,
    pub title: &'static str,
    pub sort_order: Option<SortDirection>,
    pub filtered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableView {
    pub revision: Option<RevisionMarker>,
    /// No snapshot has been received yet.
    pub loading: bool,
    /// The last refresh failed and rows come from an older snapshot.
    pub stale: bool,
    pub total: usize,
    pub visible: usize,
    pub columns: Vec<ColumnState>,
    pub rows: Vec<DisplayRow>,
}

pub fn build_view(
    snapshot: &Snapshot,
    sort: Option<&SortSpec>,
    filters: &FilterSpec,
    session: Option<&EditSession>,
    stale: bool,
) -> TableView {
    let active = session.filter(|session| session.is_active());
    let rows: Vec<DisplayRow> = derive(&snapshot.records, sort, filters)
        .into_iter()
        .map(|record| DisplayRow {
            editing: active.is_some_and(|session| session.target_id == record.recipient_id),
            edit_enabled: active.is_none(),
            record,
        })
        .collect();

    let columns = FieldKey::ALL
        .iter()
        .map(|&field| ColumnState {
            field,
            title: field.title(),
            sort_order: sort
                .filter(|spec| spec.field == field)
                .map(|spec| spec.direction),
            filtered: filters.is_filtered(field),
        })
        .collect();

    TableView {
        revision: snapshot.revision,
        loading: snapshot.revision.is_none(),
        stale,
        total: snapshot.records.len(),
        visible: rows.len(),
        columns,
        rows,
    }
}

#[cfg(test)]
#[path = "tests/view_model_tests.rs"]
mod tests;
