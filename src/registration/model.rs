use serde::{Deserialize, Serialize};
use time::{format_description::FormatItem, macros::format_description, Date, OffsetDateTime};

use super::validators::format_date;

/// Column schema shared by every store backend, in storage order.
pub const COLUMNS: [&str; 18] = [
    "arrival",
    "departure",
    "guests",
    "guest1_name",
    "guest1_birth_date",
    "guest1_nationality",
    "guest1_purpose",
    "guest1_address",
    "guest1_document",
    "guest2_name",
    "guest2_birth_date",
    "guest2_nationality",
    "guest2_purpose",
    "guest2_address",
    "guest2_document",
    "phone",
    "email",
    "submitted_at",
];

/// Index of the submission timestamp, which doubles as the row identifier.
pub const SUBMITTED_AT_COLUMN: usize = COLUMNS.len() - 1;

/// Number of cells one occupant takes up in a row.
pub const OCCUPANT_WIDTH: usize = 6;

const TIMESTAMP_FORMAT: &[FormatItem<'static>] = format_description!(
    "[day padding:none]. [month padding:none]. [year] [hour]:[minute]:[second]"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Nationality {
    #[serde(rename = "Česko")]
    Czechia,
    #[serde(rename = "Slovensko")]
    Slovakia,
    #[serde(rename = "Německo")]
    Germany,
    #[serde(rename = "Rakousko")]
    Austria,
    #[serde(rename = "Polsko")]
    Poland,
    #[serde(rename = "Ukrajina")]
    Ukraine,
    #[serde(rename = "Rusko")]
    Russia,
    #[serde(rename = "USA")]
    Usa,
    #[serde(rename = "Jiná")]
    Other,
}

impl Nationality {
    pub const ALL: [Nationality; 9] = [
        Self::Czechia,
        Self::Slovakia,
        Self::Germany,
        Self::Austria,
        Self::Poland,
        Self::Ukraine,
        Self::Russia,
        Self::Usa,
        Self::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Czechia => "Česko",
            Self::Slovakia => "Slovensko",
            Self::Germany => "Německo",
            Self::Austria => "Rakousko",
            Self::Poland => "Polsko",
            Self::Ukraine => "Ukrajina",
            Self::Russia => "Rusko",
            Self::Usa => "USA",
            Self::Other => "Jiná",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|n| n.label() == label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Purpose {
    #[serde(rename = "turismus")]
    Tourism,
    #[serde(rename = "zaměstnání")]
    Employment,
    #[serde(rename = "studium")]
    Study,
    #[serde(rename = "rodinné důvody")]
    Family,
    #[serde(rename = "jiný")]
    Other,
}

impl Purpose {
    pub const ALL: [Purpose; 5] = [
        Self::Tourism,
        Self::Employment,
        Self::Study,
        Self::Family,
        Self::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Tourism => "turismus",
            Self::Employment => "zaměstnání",
            Self::Study => "studium",
            Self::Family => "rodinné důvody",
            Self::Other => "jiný",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|p| p.label() == label)
    }
}

/// One registered guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupant {
    pub name: String,
    pub birth_date: Date,
    pub nationality: Nationality,
    pub purpose: Purpose,
    pub address: String,
    pub document: String,
}

impl Occupant {
    fn cells(&self) -> [String; OCCUPANT_WIDTH] {
        [
            self.name.clone(),
            format_date(self.birth_date),
            self.nationality.label().to_string(),
            self.purpose.label().to_string(),
            self.address.clone(),
            self.document.clone(),
        ]
    }
}

/// A validated stay submission, ready to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestRecord {
    pub arrival: Date,
    pub departure: Date,
    pub primary: Occupant,
    pub companion: Option<Occupant>,
    pub phone: String,
    pub email: String,
    pub submitted_at: OffsetDateTime,
}

impl GuestRecord {
    pub fn occupant_count(&self) -> usize {
        1 + usize::from(self.companion.is_some())
    }

    /// Cells in [`COLUMNS`] order. Companion cells are blank for a single guest.
    pub fn to_row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(COLUMNS.len());
        row.push(format_date(self.arrival));
        row.push(format_date(self.departure));
        row.push(self.occupant_count().to_string());
        row.extend(self.primary.cells());
        match &self.companion {
            Some(o) => row.extend(o.cells()),
            None => row.extend(std::iter::repeat(String::new()).take(OCCUPANT_WIDTH)),
        }
        row.push(self.phone.clone());
        row.push(self.email.clone());
        row.push(format_timestamp(self.submitted_at));
        row
    }

    pub fn submitted_at_label(&self) -> String {
        format_timestamp(self.submitted_at)
    }
}

/// Current wall-clock time, local when the offset can be determined.
pub fn now_timestamp() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

pub fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| ts.unix_timestamp().to_string())
}
