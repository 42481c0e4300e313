//! Chat window driver: runs bridge calls as background tasks and reports progress.
//!
//! The UI thread only calls [`ChatWindow::submit`] / [`ChatWindow::cancel`], which
//! return immediately. Rendered markup and completion, failure or cancellation are
//! delivered through the listener passed to [`ChatWindow::new`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Local, NaiveTime};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::bridge::ProcessBridge;
use crate::history::{ChatEntry, EntryStatus};
use crate::render::RenderStyle;
use crate::session::{ChatSession, SessionError};

/// Notifications sent to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    /// Full history markup after a change.
    Rendered(String),
    Answered { entry: usize },
    Failed { entry: usize, reason: String },
    Cancelled { entry: usize },
}

pub type Listener = Arc<dyn Fn(WindowEvent) + Send + Sync>;

pub struct ChatWindow {
    session: Arc<Mutex<ChatSession>>,
    bridge: Arc<ProcessBridge>,
    style: Arc<RenderStyle>,
    runtime: Handle,
    listener: Listener,
    in_flight: Mutex<Option<AbortHandle>>,
}

impl ChatWindow {
    pub fn new(
        bridge: ProcessBridge,
        style: RenderStyle,
        runtime: Handle,
        listener: impl Fn(WindowEvent) + Send + Sync + 'static,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(ChatSession::new())),
            bridge: Arc::new(bridge),
            style: Arc::new(style),
            runtime,
            listener: Arc::new(listener),
            in_flight: Mutex::new(None),
        }
    }

    /// Submit `input` stamped with the current local time.
    pub fn submit(&self, input: &str) -> Result<Option<usize>, SessionError> {
        self.submit_at(input, Local::now().time())
    }

    /// Submit `input` stamped with `at`.
    ///
    /// Returns the index of the new entry, `None` for blank input, or
    /// [`SessionError::Busy`] while a reply is pending.
    pub fn submit_at(&self, input: &str, at: NaiveTime) -> Result<Option<usize>, SessionError> {
        let (pending, html) = {
            let mut session = lock(&*self.session);
            let Some(pending) = session.begin(input, at)? else {
                return Ok(None);
            };
            let html = session.render(&self.style);
            (pending, html)
        };
        let entry = pending.entry;
        (self.listener)(WindowEvent::Rendered(html));

        let session = Arc::clone(&self.session);
        let bridge = Arc::clone(&self.bridge);
        let style = Arc::clone(&self.style);
        let listener = Arc::clone(&self.listener);
        let task = self.runtime.spawn(async move {
            let outcome = bridge.invoke(&pending.input).await;
            let (event, html) = {
                let mut session = lock(&*session);
                let event = match session.finish(&pending, outcome) {
                    Ok(ChatEntry {
                        status: EntryStatus::Failed(reason),
                        ..
                    }) => WindowEvent::Failed {
                        entry: pending.entry,
                        reason: reason.clone(),
                    },
                    Ok(_) => WindowEvent::Answered {
                        entry: pending.entry,
                    },
                    Err(e) => {
                        debug!(error = %e, "dropping reply for a cancelled question");
                        return;
                    }
                };
                (event, session.render(&style))
            };
            listener(WindowEvent::Rendered(html));
            listener(event);
        });
        *lock(&self.in_flight) = Some(task.abort_handle());
        Ok(Some(entry))
    }

    /// Abort the pending reply and kill its process. Returns `false` when idle.
    pub fn cancel(&self) -> bool {
        if let Some(task) = lock(&self.in_flight).take() {
            task.abort();
        }
        let (entry, html) = {
            let mut session = lock(&*self.session);
            let Some(entry) = session.cancel() else {
                return false;
            };
            (entry, session.render(&self.style))
        };
        (self.listener)(WindowEvent::Rendered(html));
        (self.listener)(WindowEvent::Cancelled { entry });
        true
    }

    pub fn render(&self) -> String {
        lock(&*self.session).render(&self.style)
    }

    /// Snapshot of all entries.
    pub fn history(&self) -> Vec<ChatEntry> {
        lock(&*self.session).history().entries().to_vec()
    }

    pub fn is_busy(&self) -> bool {
        lock(&*self.session).is_awaiting()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
