use std::path::PathBuf;

use anyhow::Context;
use rand::{distributions::Alphanumeric, Rng};

use crate::registration::validators::{DocumentPolicy, FieldRules, PhonePolicy};

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub api_base: String,
    pub spreadsheet_id: Option<String>,
    pub sheet_name: String,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone)]
pub enum StoreBackend {
    File { path: PathBuf },
    Sheets(SheetsConfig),
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingOrder {
    #[default]
    NewestFirst,
    Insertion,
}

impl std::str::FromStr for ListingOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest-first" | "reverse" => Ok(Self::NewestFirst),
            "insertion" | "oldest-first" => Ok(Self::Insertion),
            other => {
                anyhow::bail!("unknown listing order '{other}' (expected newest-first|insertion)")
            }
        }
    }
}

#[derive(Clone)]
pub struct AdminConfig {
    pub secret: String,
    pub token_secret: String,
    pub session_minutes: i64,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("secret", &"<redacted>")
            .field("token_secret", &"<redacted>")
            .field("session_minutes", &self.session_minutes)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreBackend,
    pub admin: AdminConfig,
    pub rules: FieldRules,
    pub listing_order: ListingOrder,
    pub clear_on_success: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match env_or("STORE_BACKEND", "file").to_ascii_lowercase().as_str() {
            "file" => StoreBackend::File {
                path: env_or("GUESTBOOK_CSV_PATH", "data/guestbook.csv").into(),
            },
            "sheets" => StoreBackend::Sheets(SheetsConfig {
                api_base: env_or("SHEETS_API_BASE", "https://sheets.googleapis.com"),
                spreadsheet_id: std::env::var("SHEET_ID").ok(),
                sheet_name: env_or("SHEET_NAME", "Sheet1"),
                access_token: std::env::var("SHEETS_ACCESS_TOKEN").ok(),
            }),
            "memory" => StoreBackend::Memory,
            other => anyhow::bail!("unknown STORE_BACKEND '{other}' (expected file|sheets|memory)"),
        };

        let secret = std::env::var("ADMIN_SECRET").context("ADMIN_SECRET must be set")?;
        anyhow::ensure!(!secret.trim().is_empty(), "ADMIN_SECRET must not be empty");
        let admin = AdminConfig {
            secret,
            token_secret: std::env::var("ADMIN_TOKEN_SECRET").unwrap_or_else(|_| random_key()),
            session_minutes: std::env::var("ADMIN_SESSION_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(30),
        };

        let rules = FieldRules {
            phone: env_or("PHONE_POLICY", "digits")
                .parse::<PhonePolicy>()
                .context("PHONE_POLICY")?,
            document: env_or("DOCUMENT_POLICY", "free-text")
                .parse::<DocumentPolicy>()
                .context("DOCUMENT_POLICY")?,
        };

        let listing_order = env_or("LISTING_ORDER", "newest-first")
            .parse::<ListingOrder>()
            .context("LISTING_ORDER")?;

        let clear_on_success = env_or("CLEAR_ON_SUCCESS", "true")
            .parse::<bool>()
            .context("CLEAR_ON_SUCCESS must be true or false")?;

        Ok(Self {
            store,
            admin,
            rules,
            listing_order,
            clear_on_success,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn random_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}
