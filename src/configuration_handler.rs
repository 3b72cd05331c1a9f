use crate::configuration::Configuration;
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "laundry_booking", about = "Laundry slot booking with completion reminders")]
pub struct ConfigurationHandler {
    #[arg(long, env = "PORT", default_value = "3000")]
    port: String,

    /// PostgreSQL URL. Bookings are kept in memory when omitted.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, env = "STORE_TIMEOUT_SECS", default_value_t = 5)]
    store_timeout_secs: u64,

    /// Reminders are only logged when omitted.
    #[arg(long, env = "MAIL_RELAY_URL")]
    mail_relay_url: Option<String>,

    #[arg(long, env = "MAIL_RELAY_TOKEN", default_value = "", hide_env_values = true)]
    mail_relay_token: String,

    #[arg(long, env = "MAIL_FROM", default_value = "laundry@localhost")]
    mail_from: String,

    #[arg(
        long,
        env = "WASHER_MINUTES",
        default_value_t = 45,
        value_parser = clap::value_parser!(u64).range(0..=MAX_RUN_MINUTES)
    )]
    washer_minutes: u64,

    #[arg(
        long,
        env = "DRYER_MINUTES",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(0..=MAX_RUN_MINUTES)
    )]
    dryer_minutes: u64,
}

/// One week.
const MAX_RUN_MINUTES: u64 = 7 * 24 * 60;

impl ConfigurationHandler {
    pub fn parse_arguments() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }
}

impl Configuration for ConfigurationHandler {
    fn port(&self) -> String {
        self.port.clone()
    }

    fn database_url(&self) -> Option<String> {
        self.database_url.clone()
    }

    fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    fn mail_relay_url(&self) -> Option<String> {
        self.mail_relay_url.clone()
    }

    fn mail_relay_token(&self) -> String {
        self.mail_relay_token.clone()
    }

    fn mail_from(&self) -> String {
        self.mail_from.clone()
    }

    fn washer_delay(&self) -> Duration {
        Duration::from_secs(self.washer_minutes.saturating_mul(60))
    }

    fn dryer_delay(&self) -> Duration {
        Duration::from_secs(self.dryer_minutes.saturating_mul(60))
    }
}
