use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ParseValueError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(RecipientId);

/// Opaque token owned by the store. Every successful mutation advances it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct RevisionMarker(pub u64);

impl fmt::Display for RevisionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Wire format for dates of birth.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

macro_rules! value_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident => $value:literal, $label:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical value, as stored and sent over the wire.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }

            /// Human-facing filter label.
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseValueError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let raw = raw.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == raw)
                    .ok_or_else(|| ParseValueError::new($field, raw, $name::ALL.iter().map(|v| v.as_str())))
            }
        }
    };
}

value_enum!(Gender, "gender" {
    Male => "Male", "Male";
    Female => "Female", "Female";
    Nonbinary => "Nonbinary", "Non Binary";
});

value_enum!(Race, "race" {
    IndianNativeAlaskan => "Indian Native Alaskan", "Indian Native Alaskan";
    Asian => "Asian", "Asian";
    Black => "Black", "Black";
    HawaiianPacificIslander => "Hawaiian Pacific Islander", "Hawaiian Pacific Islander";
    White => "White", "White";
    SomeOtherRace => "Some other race", "Other";
});

value_enum!(Ethnicity, "ethnicity" {
    Hispanic => "Hispanic", "Hispanic";
    NonHispanic => "Non-Hispanic", "Non-Hispanic";
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    FirstName,
    LastName,
    DateOfBirth,
    Gender,
    Race,
    Ethnicity,
    VeteranStatus,
    HouseholdId,
    ActiveStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Date,
    Enumerated,
    Flag,
}

impl FieldKey {
    pub const ALL: &'static [FieldKey] = &[
        FieldKey::FirstName,
        FieldKey::LastName,
        FieldKey::DateOfBirth,
        FieldKey::Gender,
        FieldKey::Race,
        FieldKey::Ethnicity,
        FieldKey::VeteranStatus,
        FieldKey::HouseholdId,
        FieldKey::ActiveStatus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::FirstName => "first_name",
            FieldKey::LastName => "last_name",
            FieldKey::DateOfBirth => "date_of_birth",
            FieldKey::Gender => "gender",
            FieldKey::Race => "race",
            FieldKey::Ethnicity => "ethnicity",
            FieldKey::VeteranStatus => "veteran_status",
            FieldKey::HouseholdId => "household_id",
            FieldKey::ActiveStatus => "active_status",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            FieldKey::FirstName => "First Name",
            FieldKey::LastName => "Name",
            FieldKey::DateOfBirth => "Date of Birth",
            FieldKey::Gender => "Gender",
            FieldKey::Race => "Race",
            FieldKey::Ethnicity => "Ethnicity",
            FieldKey::VeteranStatus => "Veteran",
            FieldKey::HouseholdId => "Household ID",
            FieldKey::ActiveStatus => "Active",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            FieldKey::FirstName | FieldKey::LastName | FieldKey::HouseholdId => FieldKind::Text,
            FieldKey::DateOfBirth => FieldKind::Date,
            FieldKey::Gender | FieldKey::Race | FieldKey::Ethnicity => FieldKind::Enumerated,
            FieldKey::VeteranStatus | FieldKey::ActiveStatus => FieldKind::Flag,
        }
    }

    /// Free-text fields are filtered by substring rather than set membership.
    pub fn is_free_text(self) -> bool {
        matches!(self.kind(), FieldKind::Text | FieldKind::Date)
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKey {
    type Err = ParseValueError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let alias = match normalized.as_str() {
            "name" => "last_name",
            "dob" | "age" => "date_of_birth",
            "veteran" => "veteran_status",
            "household" => "household_id",
            "active" => "active_status",
            other => other,
        };
        FieldKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == alias)
            .ok_or_else(|| ParseValueError::new("field", raw, FieldKey::ALL.iter().map(|k| k.as_str())))
    }
}

/// Every editable attribute of a recipient. Creates and updates always carry
/// the whole set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientFields {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub race: Race,
    pub ethnicity: Ethnicity,
    pub veteran_status: bool,
    pub household_id: String,
    pub active_status: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientRecord {
    pub recipient_id: RecipientId,
    #[serde(flatten)]
    pub fields: RecipientFields,
}

impl RecipientRecord {
    pub fn new(recipient_id: RecipientId, fields: RecipientFields) -> Self {
        Self {
            recipient_id,
            fields,
        }
    }

    /// `"first, last"` as shown in the name column.
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.fields.first_name, self.fields.last_name)
    }

    /// Value as the table shows it: labels for enumerated and flag fields.
    pub fn display_value(&self, field: FieldKey) -> String {
        let f = &self.fields;
        let label = match field {
            FieldKey::Gender => f.gender.label(),
            FieldKey::Race => f.race.label(),
            FieldKey::Ethnicity => f.ethnicity.label(),
            FieldKey::VeteranStatus if f.veteran_status => "Veteran",
            FieldKey::VeteranStatus => "Not a Veteran",
            FieldKey::ActiveStatus if f.active_status => "Yes",
            FieldKey::ActiveStatus => "No",
            _ => return self.text_value(field),
        };
        label.to_string()
    }

    /// Textual value of `field`, as matched by free-text filters.
    pub fn text_value(&self, field: FieldKey) -> String {
        let f = &self.fields;
        match field {
            FieldKey::FirstName => f.first_name.clone(),
            FieldKey::LastName => f.last_name.clone(),
            FieldKey::DateOfBirth => f.date_of_birth.format(DATE_FORMAT).to_string(),
            FieldKey::Gender => f.gender.as_str().to_string(),
            FieldKey::Race => f.race.as_str().to_string(),
            FieldKey::Ethnicity => f.ethnicity.as_str().to_string(),
            FieldKey::VeteranStatus => f.veteran_status.to_string(),
            FieldKey::HouseholdId => f.household_id.clone(),
            FieldKey::ActiveStatus => f.active_status.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
