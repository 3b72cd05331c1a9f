use crate::backend::SlotBackend;
use crate::configuration::Configuration;
use crate::error::StorageError;
use crate::notifier::{CancelOutcome, DeferredNotifier, ReminderStatus};
use crate::registry::{BookingResult, SlotRegistry};
use crate::types::{Booking, MachineKind, MessageTemplate, Session, Slot};
use axum::extract::Path;
use axum::response::Response;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum::{
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct AppState<T: SlotBackend> {
    registry: SlotRegistry<T>,
    notifier: DeferredNotifier,
    template: MessageTemplate,
    washer_delay: Duration,
    dryer_delay: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BookingRequest {
    month: i64,
    day: i64,
    time: String,
    #[serde(flatten)]
    session: Session,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum BookingResponse {
    Confirmed { booking: Booking, message: String },
    Conflict { slot: Slot, message: String },
    InvalidInput { message: String },
    StorageError { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct ReminderRequest {
    machine: MachineKind,
    /// Overrides the machine's run time.
    delay_seconds: Option<u64>,
    #[serde(flatten)]
    #[validate(nested)]
    session: Session,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReminderResponse {
    id: Uuid,
    status: ReminderStatus,
    fires_in_secs: Option<u64>,
}

pub fn create_app<T: SlotBackend, C: Configuration>(
    backend: T,
    notifier: DeferredNotifier,
    configuration: C,
) -> Router {
    let state = AppState {
        registry: SlotRegistry::new(backend),
        notifier,
        template: MessageTemplate::default(),
        washer_delay: configuration.washer_delay(),
        dryer_delay: configuration.dryer_delay(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/bookings", get(get_bookings))
        .route("/book", post(book_slot))
        .route("/reminders", post(arm_reminder))
        .route("/reminders/:id", get(get_reminder).delete(cancel_reminder))
        .with_state(state)
        .layer(cors)
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

const STORAGE_FAILURE_MESSAGE: &str = "Booking service is unavailable, please try again later";

async fn get_bookings<T: SlotBackend>(State(state): State<AppState<T>>) -> Response {
    let registry = state.registry.clone();
    let result = tokio::task::spawn_blocking(move || registry.bookings())
        .await
        .unwrap_or_else(|err| Err(StorageError::Unavailable(err.to_string())));

    match result {
        Ok(bookings) => Json(bookings).into_response(),
        Err(_) => error_body(StatusCode::INTERNAL_SERVER_ERROR, STORAGE_FAILURE_MESSAGE),
    }
}

async fn book_slot<T: SlotBackend>(
    State(state): State<AppState<T>>,
    Json(request): Json<BookingRequest>,
) -> impl IntoResponse {
    let registry = state.registry.clone();
    let result = tokio::task::spawn_blocking(move || {
        registry.book_slot(request.month, request.day, &request.time, &request.session)
    })
    .await
    .unwrap_or_else(|err| {
        error!(?err, "Booking task failed");
        BookingResult::StorageError(StorageError::Unavailable(err.to_string()))
    });

    match result {
        BookingResult::Confirmed(booking) => {
            let message = format!("You have been scheduled for {}", booking.slot);
            (
                StatusCode::OK,
                Json(BookingResponse::Confirmed { booking, message }),
            )
        }
        BookingResult::Conflict(slot) => (
            StatusCode::CONFLICT,
            Json(BookingResponse::Conflict {
                slot,
                message: "Time is already taken".into(),
            }),
        ),
        BookingResult::InvalidInput(message) => (
            StatusCode::BAD_REQUEST,
            Json(BookingResponse::InvalidInput { message }),
        ),
        // already logged by the registry
        BookingResult::StorageError(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(BookingResponse::StorageError {
                message: STORAGE_FAILURE_MESSAGE.into(),
            }),
        ),
    }
}

async fn arm_reminder<T: SlotBackend>(
    State(state): State<AppState<T>>,
    Json(request): Json<ReminderRequest>,
) -> Response {
    if let Err(errors) = request.validate() {
        return error_body(StatusCode::BAD_REQUEST, errors.to_string());
    }

    let delay = request
        .delay_seconds
        .map(Duration::from_secs)
        .unwrap_or_else(|| {
            request
                .machine
                .run_time(state.washer_delay, state.dryer_delay)
        });
    let handle = state
        .notifier
        .arm(delay, &request.session, &state.template);

    Json(ReminderResponse {
        id: handle.id(),
        status: handle.status(),
        fires_in_secs: Some(delay.as_secs()),
    })
    .into_response()
}

async fn get_reminder<T: SlotBackend>(
    State(state): State<AppState<T>>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.notifier.handle(id) {
        Some(handle) => Json(ReminderResponse {
            id,
            status: handle.status(),
            fires_in_secs: None,
        })
        .into_response(),
        None => error_body(StatusCode::NOT_FOUND, "Reminder is unknown or already finished"),
    }
}

async fn cancel_reminder<T: SlotBackend>(
    State(state): State<AppState<T>>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.notifier.cancel(id) {
        CancelOutcome::Cancelled => Json(ReminderResponse {
            id,
            status: ReminderStatus::Cancelled,
            fires_in_secs: None,
        })
        .into_response(),
        CancelOutcome::AlreadyFired => {
            error_body(StatusCode::CONFLICT, "Reminder has already been sent")
        }
        CancelOutcome::Unknown => {
            error_body(StatusCode::NOT_FOUND, "Reminder is unknown or already finished")
        }
    }
}
