use crate::backend::{InsertOutcome, SlotBackend};
use crate::error::StorageError;
use crate::types::{Booking, Session, Slot};
use chrono::Utc;
use tracing::{debug, error, info};
use validator::{Validate, ValidationErrors};

#[derive(Debug)]
pub enum BookingResult {
    Confirmed(Booking),
    /// The slot already belongs to someone.
    Conflict(Slot),
    InvalidInput(String),
    StorageError(StorageError),
}

#[derive(Debug, Validate)]
struct SlotRequest {
    #[validate(range(min = 1, max = 12, message = "month must be between 1 and 12"))]
    month: i64,
    #[validate(range(min = 1, max = 31, message = "day must be between 1 and 31"))]
    day: i64,
    #[validate(length(min = 1, message = "time must not be empty"))]
    time: String,
    #[validate(length(min = 1, message = "username must not be empty"))]
    username: String,
}

impl SlotRequest {
    const FIELD_ORDER: [&'static str; 4] = ["month", "day", "time", "username"];

    fn into_slot(self) -> Result<Slot, String> {
        if let Err(errors) = self.validate() {
            return Err(first_violation(&errors));
        }
        match (u8::try_from(self.month), u8::try_from(self.day)) {
            (Ok(month), Ok(day)) => Ok(Slot::new(month, day, self.time)),
            _ => Err("month and day must be positive".into()),
        }
    }
}

fn first_violation(errors: &ValidationErrors) -> String {
    let field_errors = errors.field_errors();
    SlotRequest::FIELD_ORDER
        .iter()
        .filter_map(|field| field_errors.get(*field))
        .flat_map(|errors| errors.iter())
        .find_map(|error| error.message.as_ref().map(|message| message.to_string()))
        .unwrap_or_else(|| errors.to_string())
}

/// Hands out slots, at most one booking per `(day, month, time)`.
#[derive(Clone)]
pub struct SlotRegistry<B: SlotBackend> {
    backend: B,
}

impl<B: SlotBackend> SlotRegistry<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Reads the slot once and, if free, writes it once with an atomic
    /// conditional insert. A lost race is reported as `Conflict`.
    pub fn book_slot(
        &self,
        month: i64,
        day: i64,
        time: &str,
        session: &Session,
    ) -> BookingResult {
        let request = SlotRequest {
            month,
            day,
            time: time.trim().to_string(),
            username: session.username.trim().to_string(),
        };
        let slot = match request.into_slot() {
            Ok(slot) => slot,
            Err(reason) => {
                debug!(month, day, time, %reason, "Rejected booking request");
                return BookingResult::InvalidInput(reason);
            }
        };

        match self.backend.find_booking(&slot) {
            Ok(Some(owner)) => {
                info!(%slot, %owner, requested_by = %session.username, "Slot already taken");
                return BookingResult::Conflict(slot);
            }
            Ok(None) => {}
            Err(err) => {
                error!(?err, %slot, "Failed to look up booking");
                return BookingResult::StorageError(err);
            }
        }

        let booking = Booking {
            slot,
            username: session.username.clone(),
            booked_at: Utc::now(),
        };
        match self.backend.insert_booking(&booking) {
            Ok(InsertOutcome::Inserted) => {
                info!(slot = %booking.slot, username = %booking.username, "Slot booked");
                BookingResult::Confirmed(booking)
            }
            Ok(InsertOutcome::AlreadyTaken) => {
                info!(
                    slot = %booking.slot,
                    requested_by = %session.username,
                    "Slot taken by a concurrent booking"
                );
                BookingResult::Conflict(booking.slot)
            }
            Err(err) => {
                error!(?err, slot = %booking.slot, "Failed to store booking");
                BookingResult::StorageError(err)
            }
        }
    }

    pub fn bookings(&self) -> Result<Vec<Booking>, StorageError> {
        self.backend.bookings().map_err(|err| {
            error!(?err, "Failed to read bookings");
            err
        })
    }
}
