use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::{Nationality, Purpose};

/// Raw, unvalidated fields of one guest as typed into the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OccupantFields {
    pub name: String,
    pub birth_date: String,
    pub nationality: String,
    pub purpose: String,
    pub address: String,
    pub document: String,
}

impl Default for OccupantFields {
    fn default() -> Self {
        Self {
            name: String::new(),
            birth_date: String::new(),
            nationality: Nationality::Czechia.label().to_string(),
            purpose: Purpose::Tourism.label().to_string(),
            address: String::new(),
            document: String::new(),
        }
    }
}

impl OccupantFields {
    pub(crate) fn trimmed(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            birth_date: self.birth_date.trim().to_string(),
            nationality: self.nationality.trim().to_string(),
            purpose: self.purpose.trim().to_string(),
            address: self.address.trim().to_string(),
            document: self.document.trim().to_string(),
        }
    }
}

/// Everything the check-in form submits. Also what a session remembers
/// to pre-fill the form after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormValues {
    pub arrival: String,
    pub departure: String,
    pub guests: u8,
    pub primary: OccupantFields,
    pub companion: OccupantFields,
    pub phone: String,
    pub email: String,
    pub consent: bool,
}

impl Default for FormValues {
    fn default() -> Self {
        Self {
            arrival: String::new(),
            departure: String::new(),
            guests: 1,
            primary: OccupantFields::default(),
            companion: OccupantFields::default(),
            phone: String::new(),
            email: String::new(),
            consent: false,
        }
    }
}

/// Lists backing the two select boxes of the form.
#[derive(Debug, Serialize)]
pub struct FormOptions {
    pub nationalities: Vec<&'static str>,
    pub purposes: Vec<&'static str>,
    pub max_guests: u8,
}

impl FormOptions {
    pub fn current() -> Self {
        Self {
            nationalities: Nationality::ALL.iter().map(|n| n.label()).collect(),
            purposes: Purpose::ALL.iter().map(|p| p.label()).collect(),
            max_guests: 2,
        }
    }
}

/// What a client renders for one session.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub phase: &'static str,
    pub values: FormValues,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
}
