use std::time::Duration;

pub trait Configuration: Clone + Send + Sync + 'static {
    fn port(&self) -> String;
    fn database_url(&self) -> Option<String>;
    fn store_timeout(&self) -> Duration;
    fn mail_relay_url(&self) -> Option<String>;
    fn mail_relay_token(&self) -> String;
    fn mail_from(&self) -> String;
    fn washer_delay(&self) -> Duration;
    fn dryer_delay(&self) -> Duration;
}
