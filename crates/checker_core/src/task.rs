use std::fmt;

use serde::{Deserialize, Serialize};

/// The two kinds of server-side jobs a client can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Check that a court site is reachable and supported; yields its label.
    Verify,
    /// Search one or more court sites for a person.
    Check,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Verify => "verify",
            TaskKind::Check => "check",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier of the task currently being observed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle {
    pub id: String,
}

impl TaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A court site that passed verification in the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub link: String,
    pub label: String,
}

/// The person a check searches for. Only the surname is mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersonName {
    pub surname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patronymic: Option<String>,
}

impl PersonName {
    pub fn new(surname: impl Into<String>) -> Self {
        Self {
            surname: surname.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_patronymic(mut self, patronymic: impl Into<String>) -> Self {
        self.patronymic = Some(patronymic.into());
        self
    }
}

/// Body of a task submission. Serializes to the JSON the submission
/// endpoints expect: `{address}` or `{address: [...], fullname}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SubmitRequest {
    Verify {
        address: String,
    },
    Check {
        #[serde(rename = "address")]
        addresses: Vec<String>,
        fullname: PersonName,
    },
}

impl SubmitRequest {
    pub fn kind(&self) -> TaskKind {
        match self {
            SubmitRequest::Verify { .. } => TaskKind::Verify,
            SubmitRequest::Check { .. } => TaskKind::Check,
        }
    }

    pub fn address_count(&self) -> usize {
        match self {
            SubmitRequest::Verify { .. } => 1,
            SubmitRequest::Check { addresses, .. } => addresses.len(),
        }
    }
}
