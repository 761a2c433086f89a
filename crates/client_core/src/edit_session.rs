//! Single-record edit sessions.
//!
//! ```text
//! Idle -> Open -> Validating -> Committing -> Idle   (commit succeeded)
//!         Open | Validating ---------------> Idle    (cancel)
//!                Validating -> Open                  (draft rejected)
//!                              Committing -> Open    (store rejected)
//! ```
//!
//! One controller owns the only session. The snapshot is never patched here;
//! a successful commit advances the store revision and the synchronizer picks
//! the change up from there.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shared::{
    domain::{
        FieldKey, FieldKind, RecipientFields, RecipientId, RecipientRecord, DATE_FORMAT,
    },
    error::ParseValueError,
    validation::{is_blank, validate_fields, FieldViolation},
};
use tracing::{info, warn};

use crate::{error::SessionError, remote::RemoteStore, view_model::parse_flag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Open,
    Validating,
    Committing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
}

impl FieldValue {
    /// Interprets raw input according to the kind of `field`.
    pub fn parse_for(field: FieldKey, raw: &str) -> Result<Self, ParseValueError> {
        match field.kind() {
            FieldKind::Flag => parse_flag(field, raw).map(FieldValue::Flag),
            _ => Ok(FieldValue::Text(raw.to_string())),
        }
    }
}

/// Uncommitted copy of a record's fields. Dates and enumerated values stay
/// textual so that malformed input can be held and reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientDraft {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub gender: String,
    pub race: String,
    pub ethnicity: String,
    pub veteran_status: bool,
    pub household_id: String,
    pub active_status: bool,
}

impl From<&RecipientFields> for RecipientDraft {
    fn from(fields: &RecipientFields) -> Self {
        Self {
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
            date_of_birth: fields.date_of_birth.format(DATE_FORMAT).to_string(),
            gender: fields.gender.as_str().to_string(),
            race: fields.race.as_str().to_string(),
            ethnicity: fields.ethnicity.as_str().to_string(),
            veteran_status: fields.veteran_status,
            household_id: fields.household_id.clone(),
            active_status: fields.active_status,
        }
    }
}

impl RecipientDraft {
    pub fn get(&self, field: FieldKey) -> FieldValue {
        match field {
            FieldKey::VeteranStatus => FieldValue::Flag(self.veteran_status),
            FieldKey::ActiveStatus => FieldValue::Flag(self.active_status),
            _ => FieldValue::Text(self.text_slot(field).clone()),
        }
    }

    fn text_slot(&self, field: FieldKey) -> &String {
        match field {
            FieldKey::FirstName => &self.first_name,
            FieldKey::LastName => &self.last_name,
            FieldKey::DateOfBirth => &self.date_of_birth,
            FieldKey::Gender => &self.gender,
            FieldKey::Race => &self.race,
            FieldKey::Ethnicity => &self.ethnicity,
            _ => &self.household_id,
        }
    }

    /// Writes one field without validating it.
    pub fn set(&mut self, field: FieldKey, value: FieldValue) -> Result<(), SessionError> {
        match (field, value) {
            (FieldKey::VeteranStatus, FieldValue::Flag(v)) => self.veteran_status = v,
            (FieldKey::ActiveStatus, FieldValue::Flag(v)) => self.active_status = v,
            (FieldKey::VeteranStatus | FieldKey::ActiveStatus, FieldValue::Text(_)) => {
                return Err(SessionError::FieldKind {
                    field,
                    expected: "flag",
                })
            }
            (_, FieldValue::Flag(_)) => {
                return Err(SessionError::FieldKind {
                    field,
                    expected: "text",
                })
            }
            (FieldKey::FirstName, FieldValue::Text(v)) => self.first_name = v,
            (FieldKey::LastName, FieldValue::Text(v)) => self.last_name = v,
            (FieldKey::DateOfBirth, FieldValue::Text(v)) => self.date_of_birth = v,
            (FieldKey::Gender, FieldValue::Text(v)) => self.gender = v,
            (FieldKey::Race, FieldValue::Text(v)) => self.race = v,
            (FieldKey::Ethnicity, FieldValue::Text(v)) => self.ethnicity = v,
            (FieldKey::HouseholdId, FieldValue::Text(v)) => self.household_id = v,
        }
        Ok(())
    }

    /// Checks every constraint and reports all violations at once.
    pub fn parse(&self) -> Result<RecipientFields, Vec<FieldViolation>> {
        let mut violations = Vec::new();

        let date_of_birth = if is_blank(&self.date_of_birth) {
            violations.push(FieldViolation::required(FieldKey::DateOfBirth));
            None
        } else {
            NaiveDate::parse_from_str(self.date_of_birth.trim(), DATE_FORMAT)
                .map_err(|_| {
                    violations.push(FieldViolation::new(
                        FieldKey::DateOfBirth,
                        format!("'{}' is not a YYYY-MM-DD date", self.date_of_birth),
                    ))
                })
                .ok()
        };
        let gender = parse_enumerated(FieldKey::Gender, &self.gender, &mut violations);
        let race = parse_enumerated(FieldKey::Race, &self.race, &mut violations);
        let ethnicity = parse_enumerated(FieldKey::Ethnicity, &self.ethnicity, &mut violations);

        let (Some(date_of_birth), Some(gender), Some(race), Some(ethnicity)) =
            (date_of_birth, gender, race, ethnicity)
        else {
            violations.extend(validate_text(self));
            violations.sort_by_key(|violation| violation.field);
            return Err(violations);
        };

        let fields = RecipientFields {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            date_of_birth,
            gender,
            race,
            ethnicity,
            veteran_status: self.veteran_status,
            household_id: self.household_id.clone(),
            active_status: self.active_status,
        };
        violations.extend(validate_fields(&fields));
        if violations.is_empty() {
            Ok(fields)
        } else {
            violations.sort_by_key(|violation| violation.field);
            Err(violations)
        }
    }
}

fn parse_enumerated<T: std::str::FromStr<Err = ParseValueError>>(
    field: FieldKey,
    raw: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<T> {
    if is_blank(raw) {
        violations.push(FieldViolation::required(field));
        return None;
    }
    raw.parse::<T>()
        .map_err(|err| violations.push(FieldViolation::new(field, err.to_string())))
        .ok()
}

fn validate_text(draft: &RecipientDraft) -> Vec<FieldViolation> {
    [
        (FieldKey::FirstName, &draft.first_name),
        (FieldKey::LastName, &draft.last_name),
        (FieldKey::HouseholdId, &draft.household_id),
    ]
    .into_iter()
    .filter(|(_, value)| is_blank(value))
    .map(|(field, _)| FieldViolation::required(field))
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditSession {
    pub target_id: RecipientId,
    pub draft: RecipientDraft,
    pub status: SessionStatus,
}

impl EditSession {
    pub fn is_active(&self) -> bool {
        self.status != SessionStatus::Idle
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub recipient_id: RecipientId,
    pub fields: RecipientFields,
}

#[derive(Default)]
pub struct EditSessionController {
    session: Mutex<Option<EditSession>>,
}

/// Returns a session stranded in `Committing` to `Open` when the commit future
/// is dropped before the store answers.
struct CommitGuard<'a> {
    controller: &'a EditSessionController,
    armed: bool,
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(session) = self.controller.lock().as_mut() {
            if session.status == SessionStatus::Committing {
                warn!(recipient_id = %session.target_id, "commit abandoned; draft kept open");
                session.status = SessionStatus::Open;
            }
        }
    }
}

impl EditSessionController {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<EditSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require<'a>(
        slot: &'a mut Option<EditSession>,
        action: &'static str,
        allowed: &[SessionStatus],
    ) -> Result<&'a mut EditSession, SessionError> {
        let session = slot.as_mut().ok_or(SessionError::NoSession)?;
        if !allowed.contains(&session.status) {
            return Err(SessionError::InvalidState {
                action,
                status: session.status,
            });
        }
        Ok(session)
    }

    pub fn status(&self) -> SessionStatus {
        self.lock()
            .as_ref()
            .map_or(SessionStatus::Idle, |session| session.status)
    }

    pub fn session(&self) -> Option<EditSession> {
        self.lock().clone()
    }

    pub fn open(&self, record: &RecipientRecord) -> Result<EditSession, SessionError> {
        let mut slot = self.lock();
        if let Some(active) = slot.as_ref() {
            return Err(SessionError::SessionConflict {
                active: active.target_id,
            });
        }
        let session = EditSession {
            target_id: record.recipient_id,
            draft: RecipientDraft::from(&record.fields),
            status: SessionStatus::Open,
        };
        *slot = Some(session.clone());
        info!(recipient_id = %record.recipient_id, "edit session opened");
        Ok(session)
    }

    pub fn edit(&self, field: FieldKey, value: FieldValue) -> Result<(), SessionError> {
        let mut slot = self.lock();
        let session = Self::require(&mut slot, "edit", &[SessionStatus::Open])?;
        session.draft.set(field, value)
    }

    /// Validates the draft and, if it holds, sends it to the store as a whole.
    pub async fn commit(&self, store: &dyn RemoteStore) -> Result<CommitOutcome, SessionError> {
        let (recipient_id, fields) = {
            let mut slot = self.lock();
            let session = Self::require(&mut slot, "commit", &[SessionStatus::Open])?;
            session.status = SessionStatus::Validating;
            match session.draft.parse() {
                Ok(fields) => {
                    session.status = SessionStatus::Committing;
                    (session.target_id, fields)
                }
                Err(violations) => {
                    session.status = SessionStatus::Open;
                    warn!(
                        recipient_id = %session.target_id,
                        violations = violations.len(),
                        "draft failed validation"
                    );
                    return Err(SessionError::Validation(violations));
                }
            }
        };

        let mut guard = CommitGuard {
            controller: self,
            armed: true,
        };
        let result = store.update(recipient_id, &fields).await;
        guard.armed = false;

        let mut slot = self.lock();
        match result {
            Ok(()) => {
                *slot = None;
                info!(%recipient_id, "edit session committed");
                Ok(CommitOutcome {
                    recipient_id,
                    fields,
                })
            }
            Err(err) => {
                if let Some(session) = slot.as_mut() {
                    session.status = SessionStatus::Open;
                }
                warn!(%recipient_id, error = %err, "store rejected commit; draft kept open");
                Err(SessionError::RemoteCommit {
                    recipient_id: Some(recipient_id),
                    reason: format!("{err:#}"),
                })
            }
        }
    }

    /// Discards the draft. Not allowed once the store call has started.
    pub fn cancel(&self) -> Result<EditSession, SessionError> {
        let mut slot = self.lock();
        Self::require(
            &mut slot,
            "cancel",
            &[SessionStatus::Open, SessionStatus::Validating],
        )?;
        let mut discarded = slot.take().ok_or(SessionError::NoSession)?;
        discarded.status = SessionStatus::Idle;
        info!(recipient_id = %discarded.target_id, "edit session cancelled");
        Ok(discarded)
    }
}

#[cfg(test)]
#[path = "tests/edit_session_tests.rs"]
mod tests;
