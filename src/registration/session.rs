use std::collections::HashMap;
use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::controller::FormSession;

const SESSION_TTL: Duration = Duration::hours(6);

struct Entry {
    session: FormSession,
    touched: OffsetDateTime,
}

type Slot = Arc<Mutex<Entry>>;

/// Remembered form state keyed by session id. Only used to pre-fill forms.
///
/// The map lock is only held for lookups and inserts. Each session has its
/// own lock, so a slow submit blocks nothing but its own session.
#[derive(Default)]
pub struct SessionStore {
    slots: Mutex<HashMap<Uuid, Slot>>,
}

/// Exclusive access to one session. A submit holds it for its whole run so
/// two submits of the same session cannot interleave.
pub struct SessionGuard {
    entry: OwnedMutexGuard<Entry>,
}

impl SessionGuard {
    pub fn session(&self) -> FormSession {
        self.entry.session.clone()
    }

    pub fn put(&mut self, session: FormSession) {
        self.entry.session = session;
        self.entry.touched = OffsetDateTime::now_utc();
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, id: Uuid) -> Option<Slot> {
        self.slots.lock().await.get(&id).cloned()
    }

    /// Waits only for other holders of the same session.
    pub async fn checkout(&self, id: Uuid) -> Option<SessionGuard> {
        let slot = self.slot(id).await?;
        Some(SessionGuard {
            entry: slot.lock_owned().await,
        })
    }

    /// Starts a fresh session, dropping idle ones. Sessions busy in a submit are kept.
    pub async fn create(&self) -> (Uuid, FormSession) {
        let mut slots = self.slots.lock().await;
        let cutoff = OffsetDateTime::now_utc() - SESSION_TTL;
        slots.retain(|_, slot| match slot.try_lock() {
            Ok(entry) => entry.touched > cutoff,
            Err(_) => true,
        });

        let id = Uuid::new_v4();
        let session = FormSession::default();
        let entry = Entry {
            session: session.clone(),
            touched: OffsetDateTime::now_utc(),
        };
        slots.insert(id, Arc::new(Mutex::new(entry)));
        (id, session)
    }

    pub async fn get(&self, id: Uuid) -> Option<FormSession> {
        Some(self.checkout(id).await?.session())
    }

    pub async fn active_count(&self) -> usize {
        self.slots.lock().await.len()
    }
}
