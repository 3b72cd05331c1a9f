use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use validator::Validate;

/// A reservable laundry time unit, keyed by `(day, month, time)`.
///
/// `time` is kept as the raw trimmed token the user entered. Two slots are the
/// same only if all three fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot {
    pub month: u8,
    pub day: u8,
    pub time: String,
}

impl Slot {
    pub fn new(month: u8, day: u8, time: impl Into<String>) -> Self {
        Self {
            month,
            day,
            time: time.into(),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.day, self.month, self.time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub slot: Slot,
    pub username: String,
    pub booked_at: DateTime<Utc>,
}

/// Identity of the user on whose behalf a call is made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Session {
    #[validate(length(min = 1, message = "username must not be empty"))]
    pub username: String,
    #[validate(email(message = "email must be a valid address"))]
    #[serde(default)]
    pub email: String,
}

impl Session {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineKind {
    Washer,
    Dryer,
}

impl MachineKind {
    pub fn run_time(&self, washer: Duration, dryer: Duration) -> Duration {
        match self {
            MachineKind::Washer => washer,
            MachineKind::Dryer => dryer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    pub subject: String,
    pub body: String,
}

impl MessageTemplate {
    const USERNAME_PLACEHOLDER: &'static str = "{username}";

    pub fn render_body(&self, session: &Session) -> String {
        self.body
            .replace(Self::USERNAME_PLACEHOLDER, &session.username)
    }
}

impl Default for MessageTemplate {
    fn default() -> Self {
        Self {
            subject: "Laundry machine is done".into(),
            body: "Dear {username},\n\nYour laundry is done!".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slots_compare_by_fields_not_by_rendering() {
        // "1/11/1" could come from (day 1, month 11, "1") or (day 11, month 1, "1")
        let a = Slot::new(11, 1, "1");
        let b = Slot::new(1, 11, "1");
        assert_ne!(a, b);

        let c = Slot::new(1, 1, "1/1");
        let d = Slot::new(1, 1, "1/1");
        assert_eq!(c, d);
    }

    #[test]
    fn slot_display() {
        assert_eq!(Slot::new(4, 15, "9:00").to_string(), "15/4/9:00");
    }

    #[test]
    fn default_template_mentions_username() {
        let session = Session::new("alice", "alice@example.com");
        let body = MessageTemplate::default().render_body(&session);
        assert_eq!(body, "Dear alice,\n\nYour laundry is done!");
    }

    #[test]
    fn session_validation() {
        assert!(Session::new("alice", "alice@example.com").validate().is_ok());
        assert!(Session::new("", "alice@example.com").validate().is_err());
        assert!(Session::new("alice", "not-an-address").validate().is_err());
    }

    #[test_case::test_case(MachineKind::Washer, 45)]
    #[test_case::test_case(MachineKind::Dryer, 60)]
    fn machine_run_time(machine: MachineKind, minutes: u64) {
        let washer = Duration::from_secs(45 * 60);
        let dryer = Duration::from_secs(60 * 60);
        assert_eq!(
            machine.run_time(washer, dryer),
            Duration::from_secs(minutes * 60)
        );
    }
}
