use std::{sync::Arc, time::Duration};

use crate::{
    configuration::Configuration,
    configuration_handler::ConfigurationHandler,
    database_interface::DatabaseInterface,
    http::create_app,
    local_bookings::LocalBookings,
    mailer::{HttpMailSender, LogMailSender, MailSender},
    notifier::DeferredNotifier,
};
use tokio::time::sleep;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod backend;
mod configuration;
mod configuration_handler;
mod database_interface;
mod error;
mod http;
mod local_bookings;
mod mailer;
mod notifier;
mod registry;
mod schema;
#[cfg(test)]
mod testutils;
mod types;

fn mail_sender(configuration: &ConfigurationHandler) -> Arc<dyn MailSender> {
    let Some(relay_url) = configuration.mail_relay_url() else {
        warn!("No mail relay configured, reminders will only be logged");
        return Arc::new(LogMailSender);
    };
    match HttpMailSender::new(
        relay_url,
        configuration.mail_relay_token(),
        configuration.store_timeout(),
    ) {
        Ok(sender) => Arc::new(sender),
        Err(err) => {
            error!(?err, "Mail relay unusable, reminders will only be logged");
            Arc::new(LogMailSender)
        }
    }
}

async fn shutdown_signal(notifier: DeferredNotifier) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(?err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
    notifier.cancel_all();
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let configuration = ConfigurationHandler::parse_arguments();
    let notifier = DeferredNotifier::new(mail_sender(&configuration), configuration.mail_from());

    let address = format!("0.0.0.0:{}", configuration.port());
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(?err, %address, "Failed to bind");
            std::process::exit(1);
        }
    };
    info!(%address, "Laundry booking accessible");

    let app = if let Some(database_url) = configuration.database_url() {
        let backend = loop {
            match DatabaseInterface::new(&database_url, configuration.store_timeout()) {
                Ok(backend) => {
                    info!("Successfully connected to database");
                    break backend;
                }
                Err(err) => {
                    error!(?err, "Failed to establish database connection. Retry in 1 sec. You may want to restart it with database disabled (bookings kept in memory).");
                    sleep(Duration::from_secs(1)).await;
                }
            }
        };
        create_app(backend, notifier.clone(), configuration)
    } else {
        warn!("No database configured, bookings are kept in memory");
        create_app(LocalBookings::default(), notifier.clone(), configuration)
    };

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(notifier))
        .await
    {
        error!(?err, "Server stopped unexpectedly");
    }
}
