use crate::error::StorageError;
use crate::types::{Booking, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyTaken,
}

/// Persistent store for bookings.
///
/// `insert_booking` must be atomic with respect to the slot key: when two
/// callers insert the same slot concurrently, exactly one sees `Inserted`.
pub trait SlotBackend: Clone + Send + Sync + 'static {
    fn find_booking(&self, slot: &Slot) -> Result<Option<String>, StorageError>;
    fn insert_booking(&self, booking: &Booking) -> Result<InsertOutcome, StorageError>;
    fn bookings(&self) -> Result<Vec<Booking>, StorageError>;
}

/// Orders bookings by slot: month, day, then the time token compared bytewise.
/// Every backend lists through this so the order never depends on a database
/// collation.
pub fn sort_bookings(bookings: &mut [Booking]) {
    bookings.sort_by(|a, b| a.slot.cmp(&b.slot));
}
