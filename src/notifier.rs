use crate::mailer::MailSender;
use crate::types::{Mail, MessageTemplate, Session};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};
use tokio::sync::Notify;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

const ARMED: u8 = 0;
const CANCELLED: u8 = 1;
const DISPATCHING: u8 = 2;
const DELIVERED: u8 = 3;
const FAILED: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Armed,
    Cancelled,
    Dispatching,
    Delivered,
    Failed,
}

impl From<u8> for ReminderStatus {
    fn from(value: u8) -> Self {
        match value {
            ARMED => ReminderStatus::Armed,
            CANCELLED => ReminderStatus::Cancelled,
            DISPATCHING => ReminderStatus::Dispatching,
            DELIVERED => ReminderStatus::Delivered,
            _ => ReminderStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyFired,
    Unknown,
}

struct TimerState {
    status: AtomicU8,
    cancelled: Notify,
}

/// Handle to one armed reminder. Clones refer to the same timer.
#[derive(Clone)]
pub struct TimerHandle {
    id: Uuid,
    state: Arc<TimerState>,
}

impl TimerHandle {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Arc::new(TimerState {
                status: AtomicU8::new(ARMED),
                cancelled: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> ReminderStatus {
        self.state.status.load(Ordering::SeqCst).into()
    }

    /// Returns `true` if the reminder was still armed. The mail is then never sent.
    pub fn cancel(&self) -> bool {
        let cancelled = self.transition(ARMED, CANCELLED);
        if cancelled {
            self.state.cancelled.notify_one();
        }
        cancelled
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .status
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Sends a one-shot mail once a delay has passed, unless cancelled first.
#[derive(Clone)]
pub struct DeferredNotifier {
    mailer: Arc<dyn MailSender>,
    from_address: String,
    armed: Arc<Mutex<HashMap<Uuid, TimerHandle>>>,
}

impl DeferredNotifier {
    pub fn new(mailer: Arc<dyn MailSender>, from_address: impl Into<String>) -> Self {
        Self {
            mailer,
            from_address: from_address.into(),
            armed: Arc::default(),
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn arm(
        &self,
        delay: Duration,
        recipient: &Session,
        template: &MessageTemplate,
    ) -> TimerHandle {
        let handle = TimerHandle::new();
        let mail = Mail {
            from: self.from_address.clone(),
            to: recipient.email.clone(),
            subject: template.subject.clone(),
            body: template.render_body(recipient),
        };
        self.tracked().insert(handle.id, handle.clone());

        let span = info_span!("reminder", id = %handle.id, to = %mail.to);
        let timer = handle.clone();
        let mailer = self.mailer.clone();
        let armed = self.armed.clone();
        tokio::spawn(
            async move {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = timer.state.cancelled.notified() => {}
                }

                if timer.transition(ARMED, DISPATCHING) {
                    match mailer.send(&mail).await {
                        Ok(()) => {
                            timer.state.status.store(DELIVERED, Ordering::SeqCst);
                            info!("Reminder delivered");
                        }
                        Err(err) => {
                            timer.state.status.store(FAILED, Ordering::SeqCst);
                            error!(?err, "Failed to deliver reminder");
                        }
                    }
                } else {
                    debug!("Reminder cancelled before firing");
                }

                armed
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&timer.id);
            }
            .instrument(span),
        );

        info!(
            id = %handle.id,
            delay_secs = delay.as_secs(),
            username = %recipient.username,
            "Reminder armed"
        );
        handle
    }

    /// Armed or currently dispatching reminder with this id.
    pub fn handle(&self, id: Uuid) -> Option<TimerHandle> {
        self.tracked().get(&id).cloned()
    }

    pub fn cancel(&self, id: Uuid) -> CancelOutcome {
        let mut tracked = self.tracked();
        let Some(handle) = tracked.get(&id) else {
            return CancelOutcome::Unknown;
        };
        if handle.cancel() {
            tracked.remove(&id);
            info!(%id, "Reminder cancelled");
            CancelOutcome::Cancelled
        } else {
            CancelOutcome::AlreadyFired
        }
    }

    /// Cancels every reminder that has not fired yet. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let cancelled = self
            .tracked()
            .drain()
            .filter(|(_, handle)| handle.cancel())
            .count();
        if cancelled > 0 {
            info!(cancelled, "Cancelled pending reminders");
        }
        cancelled
    }

    fn tracked(&self) -> MutexGuard<'_, HashMap<Uuid, TimerHandle>> {
        self.armed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
