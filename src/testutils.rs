use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
    backend::{InsertOutcome, SlotBackend},
    error::{MailError, StorageError},
    mailer::MailSender,
    types::{Booking, Mail, Slot},
};

pub struct MockSlotBackendInner {
    pub success: AtomicBool,
    pub calls_to_find_booking: AtomicU64,
    pub calls_to_insert_booking: AtomicU64,
    pub calls_to_bookings: AtomicU64,
    pub bookings: Mutex<HashMap<Slot, Booking>>,
}

#[derive(Clone)]
pub struct MockSlotBackend(pub Arc<MockSlotBackendInner>);

impl MockSlotBackendInner {
    fn new() -> Self {
        Self {
            success: AtomicBool::new(true),
            calls_to_find_booking: AtomicU64::default(),
            calls_to_insert_booking: AtomicU64::default(),
            calls_to_bookings: AtomicU64::default(),
            bookings: Mutex::default(),
        }
    }
}

impl MockSlotBackend {
    pub fn new() -> Self {
        Self(Arc::new(MockSlotBackendInner::new()))
    }

    fn result(&self) -> Result<(), StorageError> {
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(()),
            false => Err(StorageError::Unavailable("Supposed to fail".into())),
        }
    }
}

impl SlotBackend for MockSlotBackend {
    fn find_booking(&self, slot: &Slot) -> Result<Option<String>, StorageError> {
        self.0.calls_to_find_booking.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        Ok(self
            .0
            .bookings
            .lock()
            .unwrap()
            .get(slot)
            .map(|booking| booking.username.clone()))
    }

    fn insert_booking(&self, booking: &Booking) -> Result<InsertOutcome, StorageError> {
        self.0
            .calls_to_insert_booking
            .fetch_add(1, Ordering::SeqCst);
        self.result()?;
        let mut bookings = self.0.bookings.lock().unwrap();
        if bookings.contains_key(&booking.slot) {
            return Ok(InsertOutcome::AlreadyTaken);
        }
        bookings.insert(booking.slot.clone(), booking.clone());
        Ok(InsertOutcome::Inserted)
    }

    fn bookings(&self) -> Result<Vec<Booking>, StorageError> {
        self.0.calls_to_bookings.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        Ok(self.0.bookings.lock().unwrap().values().cloned().collect())
    }
}

pub struct RecordingMailSenderInner {
    pub success: AtomicBool,
    pub calls_to_send: AtomicU64,
    pub sent: Mutex<Vec<Mail>>,
    blocked: AtomicBool,
    release: Notify,
}

/// Mail collaborator that remembers every attempt instead of delivering.
#[derive(Clone)]
pub struct RecordingMailSender(pub Arc<RecordingMailSenderInner>);

impl RecordingMailSender {
    pub fn new() -> Self {
        Self(Arc::new(RecordingMailSenderInner {
            success: AtomicBool::new(true),
            calls_to_send: AtomicU64::default(),
            sent: Mutex::default(),
            blocked: AtomicBool::new(false),
            release: Notify::new(),
        }))
    }

    /// Holds every following `send` until `release_sends` is called.
    pub fn block_sends(&self) {
        self.0.blocked.store(true, Ordering::SeqCst);
    }

    pub fn release_sends(&self) {
        self.0.blocked.store(false, Ordering::SeqCst);
        self.0.release.notify_one();
    }
}

#[async_trait]
impl MailSender for RecordingMailSender {
    async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        self.0.calls_to_send.fetch_add(1, Ordering::SeqCst);
        if self.0.blocked.load(Ordering::SeqCst) {
            self.0.release.notified().await;
        }
        self.0.sent.lock().unwrap().push(mail.clone());
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(()),
            false => Err(MailError::Configuration("Supposed to fail".into())),
        }
    }
}
