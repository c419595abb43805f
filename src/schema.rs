//! Fixed record shape of the table.
//!
//! Every dataset row has the same seven fields. Only five of them are
//! required on import and validation checks key presence, nothing more.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// A decoded CSV row keyed by header name, before it becomes a [`Record`].
pub type Candidate = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Id,
    Name,
    Email,
    Age,
    Role,
    Department,
    Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Text,
}

impl Field {
    /// All fields in schema order.
    pub const ALL: [Field; 7] = [
        Field::Id,
        Field::Name,
        Field::Email,
        Field::Age,
        Field::Role,
        Field::Department,
        Field::Location,
    ];

    pub const REQUIRED: [Field; 5] = [Field::Id, Field::Name, Field::Email, Field::Age, Field::Role];

    pub fn name(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Name => "name",
            Field::Email => "email",
            Field::Age => "age",
            Field::Role => "role",
            Field::Department => "department",
            Field::Location => "location",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Field::Id => "Id",
            Field::Name => "Name",
            Field::Email => "Email",
            Field::Age => "Age",
            Field::Role => "Role",
            Field::Department => "Department",
            Field::Location => "Location",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Id | Field::Age => FieldKind::Numeric,
            _ => FieldKind::Text,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .find(|f| f.name() == s)
            .copied()
            .ok_or_else(|| format!("unknown field \"{s}\""))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub name: String,
    pub email: String,
    pub age: String,
    pub role: String,
    pub department: String,
    pub location: String,
}

impl Record {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Id => &self.id,
            Field::Name => &self.name,
            Field::Email => &self.email,
            Field::Age => &self.age,
            Field::Role => &self.role,
            Field::Department => &self.department,
            Field::Location => &self.location,
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let slot = match field {
            Field::Id => &mut self.id,
            Field::Name => &mut self.name,
            Field::Email => &mut self.email,
            Field::Age => &mut self.age,
            Field::Role => &mut self.role,
            Field::Department => &mut self.department,
            Field::Location => &mut self.location,
        };
        *slot = value.into();
    }

    /// Build a record from a candidate. Keys that are not schema fields are
    /// dropped, absent fields stay empty. Callers validate first.
    pub fn from_candidate(candidate: &Candidate) -> Self {
        let mut record = Record::default();
        for field in Field::ALL {
            if let Some(value) = candidate.get(field.name()) {
                record.set(field, value.as_str());
            }
        }
        record
    }
}

/// True iff every required field key exists in the candidate.
pub fn is_valid(candidate: &Candidate) -> bool {
    Field::REQUIRED
        .iter()
        .all(|f| candidate.contains_key(f.name()))
}

pub fn missing_fields(candidate: &Candidate) -> Vec<Field> {
    Field::REQUIRED
        .iter()
        .filter(|f| !candidate.contains_key(f.name()))
        .copied()
        .collect()
}
