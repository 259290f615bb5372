use tracing::{debug, error, info};

use super::builder::{build_record, normalize};
use super::dto::{FormValues, SessionView};
use super::validators::FieldRules;
use crate::store::{RowId, StoreConnection};

pub const STORAGE_FAILURE_MESSAGE: &str =
    "Your registration could not be saved. Please contact the administrator.";
pub const SAVED_MESSAGE: &str = "Registration saved. Thank you!";

/// Where a check-in form currently stands. Validating and persisting happen
/// inside [`SubmissionController::submit`] and are never observable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Collecting {
        errors: Vec<String>,
        notice: Option<String>,
    },
    Persisted {
        submitted: FormValues,
        row_id: RowId,
    },
}

/// Per-session form state: what to pre-fill and what happened last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSession {
    pub values: FormValues,
    pub phase: Phase,
}

impl Default for FormSession {
    fn default() -> Self {
        Self {
            values: FormValues::default(),
            phase: Phase::Collecting {
                errors: Vec::new(),
                notice: None,
            },
        }
    }
}

impl FormSession {
    pub fn view(&self, session_id: uuid::Uuid) -> SessionView {
        let (phase, errors, message, submitted_at) = match &self.phase {
            Phase::Collecting { errors, notice } => {
                ("collecting", errors.clone(), notice.clone(), None)
            }
            Phase::Persisted { row_id, .. } => (
                "persisted",
                Vec::new(),
                Some(SAVED_MESSAGE.to_string()),
                Some(row_id.0.clone()),
            ),
        };
        SessionView {
            session_id,
            phase,
            values: self.values.clone(),
            errors,
            message,
            submitted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `replayed` is set when an identical resubmission hit an already persisted session.
    Persisted { row_id: RowId, replayed: bool },
    Invalid(Vec<String>),
    StorageFailed,
}

pub struct SubmissionController<'a> {
    store: &'a StoreConnection,
    rules: FieldRules,
    clear_on_success: bool,
}

impl<'a> SubmissionController<'a> {
    pub fn new(store: &'a StoreConnection, rules: FieldRules, clear_on_success: bool) -> Self {
        Self {
            store,
            rules,
            clear_on_success,
        }
    }

    /// Records edited field values. Never validates.
    pub fn edit(&self, _session: FormSession, values: FormValues) -> FormSession {
        FormSession {
            values,
            phase: Phase::Collecting {
                errors: Vec::new(),
                notice: None,
            },
        }
    }

    pub async fn submit(&self, session: FormSession, values: FormValues) -> (FormSession, Outcome) {
        if let Phase::Persisted { submitted, row_id } = &session.phase {
            if normalize(submitted) == normalize(&values) {
                debug!(id = %row_id, "identical resubmission ignored");
                let outcome = Outcome::Persisted {
                    row_id: row_id.clone(),
                    replayed: true,
                };
                return (session, outcome);
            }
        }

        let record = match build_record(&values, self.rules) {
            Ok(record) => record,
            Err(errors) => {
                debug!(count = errors.len(), "submission rejected by validation");
                let next = FormSession {
                    values,
                    phase: Phase::Collecting {
                        errors: errors.clone(),
                        notice: None,
                    },
                };
                return (next, Outcome::Invalid(errors));
            }
        };

        let appended = match self.store.handle() {
            Ok(store) => store.append(&record).await,
            Err(e) => Err(e),
        };

        match appended {
            Ok(()) => {
                let row_id = RowId(record.submitted_at_label());
                info!(id = %row_id, guests = record.occupant_count(), "guest registration stored");
                let kept = if self.clear_on_success {
                    FormValues::default()
                } else {
                    values.clone()
                };
                let next = FormSession {
                    values: kept,
                    phase: Phase::Persisted {
                        submitted: values,
                        row_id: row_id.clone(),
                    },
                };
                (
                    next,
                    Outcome::Persisted {
                        row_id,
                        replayed: false,
                    },
                )
            }
            Err(e) => {
                error!(error = %e, "failed to store guest registration");
                let next = FormSession {
                    values,
                    phase: Phase::Collecting {
                        errors: Vec::new(),
                        notice: Some(STORAGE_FAILURE_MESSAGE.to_string()),
                    },
                };
                (next, Outcome::StorageFailed)
            }
        }
    }
}
