use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use uuid::Uuid;

const TICKET_TTL: Duration = Duration::minutes(5);

/// Second-step confirmation for wiping the store. At most one ticket is
/// outstanding; requesting a new one invalidates the previous.
#[derive(Default)]
pub struct PurgeTickets {
    current: Mutex<Option<(Uuid, OffsetDateTime)>>,
}

impl PurgeTickets {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn issue(&self) -> (Uuid, OffsetDateTime) {
        let ticket = Uuid::new_v4();
        let expires = OffsetDateTime::now_utc() + TICKET_TTL;
        *self.current.lock().await = Some((ticket, expires));
        (ticket, expires)
    }

    /// Consumes the ticket. Returns false for unknown or expired tickets.
    pub async fn redeem(&self, ticket: Uuid) -> bool {
        let mut current = self.current.lock().await;
        match *current {
            Some((t, expires)) if t == ticket => {
                *current = None;
                OffsetDateTime::now_utc() <= expires
            }
            _ => false,
        }
    }
}
