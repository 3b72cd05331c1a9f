use crate::backend::{sort_bookings, InsertOutcome, SlotBackend};
use crate::error::StorageError;
use crate::schema::schedule;
use crate::types::{Booking, Slot};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tracing::{debug, error};

#[derive(Insertable)]
#[diesel(table_name = schedule)]
struct NewBooking<'a> {
    slot_day: i16,
    slot_month: i16,
    slot_time: &'a str,
    username: &'a str,
    booked_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = schedule)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct BookingRow {
    slot_day: i16,
    slot_month: i16,
    slot_time: String,
    username: String,
    booked_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StorageError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let (Ok(month), Ok(day)) = (u8::try_from(row.slot_month), u8::try_from(row.slot_day))
        else {
            return Err(StorageError::Unavailable(format!(
                "stored slot out of range: {}/{}",
                row.slot_day, row.slot_month
            )));
        };
        Ok(Booking {
            slot: Slot::new(month, day, row.slot_time),
            username: row.username,
            booked_at: row.booked_at,
        })
    }
}

/// PostgreSQL-backed bookings sharing one connection between all callers.
#[derive(Clone)]
pub struct DatabaseInterface {
    connection: Arc<Mutex<PgConnection>>,
}

impl DatabaseInterface {
    pub fn new(database_url: &str, timeout: Duration) -> Result<Self, StorageError> {
        let connection = Self::establish_connection(database_url, timeout)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn establish_connection(
        database_url: &str,
        timeout: Duration,
    ) -> Result<PgConnection, StorageError> {
        let mut connection = PgConnection::establish(&with_connect_timeout(database_url, timeout))?;
        diesel::sql_query(format!("SET statement_timeout = {}", timeout.as_millis()))
            .execute(&mut connection)?;
        Ok(connection)
    }

    fn lock(&self) -> Result<MutexGuard<'_, PgConnection>, StorageError> {
        self.connection.lock().map_err(|_| {
            error!("Database connection lock poisoned");
            StorageError::Poisoned
        })
    }

    #[cfg(test)]
    fn remove_all_bookings(&self) -> Result<usize, StorageError> {
        let mut connection = self.lock()?;
        Ok(diesel::delete(schedule::table).execute(&mut *connection)?)
    }
}

/// Adds `connect_timeout` to either libpq form: a `postgres://` URL gets a
/// query parameter, a `key=value` conninfo string gets another pair.
fn with_connect_timeout(database_url: &str, timeout: Duration) -> String {
    if database_url.contains("connect_timeout=") {
        return database_url.to_string();
    }
    // libpq only accepts whole seconds here
    let seconds = timeout.as_secs().max(1);
    let is_url = ["postgres://", "postgresql://"]
        .iter()
        .any(|scheme| database_url.starts_with(scheme));
    if !is_url {
        return format!("{} connect_timeout={seconds}", database_url.trim_end());
    }
    let separator = if database_url.contains('?') { '&' } else { '?' };
    format!("{database_url}{separator}connect_timeout={seconds}")
}

impl SlotBackend for DatabaseInterface {
    fn find_booking(&self, slot: &Slot) -> Result<Option<String>, StorageError> {
        let mut connection = self.lock()?;
        let owner = schedule::table
            .filter(schedule::slot_day.eq(i16::from(slot.day)))
            .filter(schedule::slot_month.eq(i16::from(slot.month)))
            .filter(schedule::slot_time.eq(slot.time.as_str()))
            .select(schedule::username)
            .first::<String>(&mut *connection)
            .optional()?;
        Ok(owner)
    }

    fn insert_booking(&self, booking: &Booking) -> Result<InsertOutcome, StorageError> {
        let mut connection = self.lock()?;
        let new_booking = NewBooking {
            slot_day: i16::from(booking.slot.day),
            slot_month: i16::from(booking.slot.month),
            slot_time: &booking.slot.time,
            username: &booking.username,
            booked_at: booking.booked_at,
        };

        let inserted = diesel::insert_into(schedule::table)
            .values(&new_booking)
            .on_conflict_do_nothing()
            .execute(&mut *connection)?;

        match inserted {
            0 => {
                debug!(slot = %booking.slot, "Insert skipped, slot already present");
                Ok(InsertOutcome::AlreadyTaken)
            }
            _ => Ok(InsertOutcome::Inserted),
        }
    }

    fn bookings(&self) -> Result<Vec<Booking>, StorageError> {
        let mut connection = self.lock()?;
        let rows: Vec<BookingRow> = schedule::table
            .select(BookingRow::as_select())
            .load(&mut *connection)?;
        drop(connection);
        // bytewise time order regardless of the column collation
        let mut bookings = rows
            .into_iter()
            .map(Booking::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        sort_bookings(&mut bookings);
        Ok(bookings)
    }
}
