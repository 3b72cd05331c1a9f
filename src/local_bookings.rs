use crate::backend::{sort_bookings, InsertOutcome, SlotBackend};
use crate::error::StorageError;
use crate::types::{Booking, Slot};
use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

/// In-memory bookings. Used when no database is configured; nothing survives a restart.
#[derive(Debug, Clone, Default)]
pub struct LocalBookings {
    bookings: Arc<Mutex<HashMap<Slot, Booking>>>,
}

impl LocalBookings {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Slot, Booking>>, StorageError> {
        self.bookings.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl SlotBackend for LocalBookings {
    fn find_booking(&self, slot: &Slot) -> Result<Option<String>, StorageError> {
        Ok(self
            .lock()?
            .get(slot)
            .map(|booking| booking.username.clone()))
    }

    fn insert_booking(&self, booking: &Booking) -> Result<InsertOutcome, StorageError> {
        let mut bookings = self.lock()?;
        match bookings.entry(booking.slot.clone()) {
            Entry::Occupied(_) => Ok(InsertOutcome::AlreadyTaken),
            Entry::Vacant(entry) => {
                entry.insert(booking.clone());
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    fn bookings(&self) -> Result<Vec<Booking>, StorageError> {
        let mut bookings: Vec<Booking> = self.lock()?.values().cloned().collect();
        sort_bookings(&mut bookings);
        Ok(bookings)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;

    fn booking(month: u8, day: u8, time: &str, username: &str) -> Booking {
        Booking {
            slot: Slot::new(month, day, time),
            username: username.into(),
            booked_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_and_find_single_booking() {
        let local_bookings = LocalBookings::default();
        let slot = Slot::new(4, 15, "9:00");
        assert_eq!(local_bookings.find_booking(&slot).unwrap(), None);

        let outcome = local_bookings
            .insert_booking(&booking(4, 15, "9:00", "alice"))
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
        assert_eq!(
            local_bookings.find_booking(&slot).unwrap(),
            Some("alice".to_string())
        );

        let outcome = local_bookings
            .insert_booking(&booking(4, 15, "9:00", "bob"))
            .unwrap();
        assert_eq!(outcome, InsertOutcome::AlreadyTaken);
        assert_eq!(
            local_bookings.find_booking(&slot).unwrap(),
            Some("alice".to_string())
        );
    }

    #[test]
    fn test_bookings_are_listed_in_slot_order() {
        let local_bookings = LocalBookings::default();
        local_bookings
            .insert_booking(&booking(5, 1, "8:00", "carol"))
            .unwrap();
        local_bookings
            .insert_booking(&booking(4, 20, "9:00", "bob"))
            .unwrap();
        local_bookings
            .insert_booking(&booking(4, 15, "9:00", "alice"))
            .unwrap();

        let names: Vec<String> = local_bookings
            .bookings()
            .unwrap()
            .into_iter()
            .map(|booking| booking.username)
            .collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_clones_share_bookings() {
        let local_bookings = LocalBookings::default();
        let clone = local_bookings.clone();
        clone
            .insert_booking(&booking(1, 1, "7:00", "dave"))
            .unwrap();
        assert_eq!(local_bookings.bookings().unwrap().len(), 1);
    }
}
