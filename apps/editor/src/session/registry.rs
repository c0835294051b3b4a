//! Live editor sessions and the timer task behind each one.
//!
//! A session is only ever touched under its async mutex. After every access the
//! handle re-arms a single tokio task for the session's earliest deadline; the old
//! task is aborted first, so a superseded timer can never fire.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, Weak};

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::document::ResumeDocument;
use crate::session::callbacks::{CallbackEvent, Outbox};
use crate::session::editor::{EditorSession, EditorSettings};

pub struct SessionHandle {
    id: Uuid,
    session: Mutex<EditorSession>,
    outbox: Arc<Outbox>,
    timer: StdMutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    fn new(id: Uuid, document: ResumeDocument, settings: EditorSettings) -> Self {
        let outbox = Arc::new(Outbox::new());
        let session = EditorSession::new(id, document, settings, outbox.clone());
        Self {
            id,
            session: Mutex::new(session),
            outbox,
            timer: StdMutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Runs `f` against the session at the current time, then re-arms the timer.
    pub async fn with<R>(self: &Arc<Self>, f: impl FnOnce(&mut EditorSession, Instant) -> R) -> R {
        let mut session = self.session.lock().await;
        let out = f(&mut session, Instant::now());
        let deadline = session.next_deadline();
        drop(session);
        self.reschedule(deadline);
        out
    }

    /// Callback events raised since the last drain.
    pub fn drain_callbacks(&self) -> Vec<CallbackEvent> {
        self.outbox.drain()
    }

    fn timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.timer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn reschedule(self: &Arc<Self>, deadline: Option<Instant>) {
        let mut timer = self.timer();
        if let Some(task) = timer.take() {
            task.abort();
        }
        if let Some(deadline) = deadline {
            let handle: Weak<Self> = Arc::downgrade(self);
            *timer = Some(tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                if let Some(handle) = handle.upgrade() {
                    handle.fire().await;
                }
            }));
        }
    }

    /// Timer body. Nothing may be awaited after `reschedule`, which aborts this task.
    async fn fire(self: Arc<Self>) {
        let mut session = self.session.lock().await;
        let report = session.tick(Instant::now());
        let deadline = session.next_deadline();
        drop(session);
        debug!(session_id = %self.id, ?report, "Session timers fired");
        self.reschedule(deadline);
    }

    fn cancel_timer(&self) {
        if let Some(task) = self.timer().take() {
            task.abort();
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<SessionHandle>>>,
    settings: EditorSettings,
}

impl SessionRegistry {
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            settings,
        }
    }

    pub async fn open(&self, document: ResumeDocument) -> Arc<SessionHandle> {
        let id = Uuid::new_v4();
        let handle = Arc::new(SessionHandle::new(id, document, self.settings.clone()));
        self.sessions.write().await.insert(id, handle.clone());
        handle
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<SessionHandle>, AppError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Editor session {id} not found")))
    }

    pub async fn close(&self, id: Uuid) -> Result<(), AppError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("Editor session {id} not found")))?;
        handle.cancel_timer();
        handle.session.lock().await.close();
        info!(session_id = %id, "Session removed");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
