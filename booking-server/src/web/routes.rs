//! HTTP route handlers.
//!
//! Handlers are the only place that reads the wall clock; everything below
//! them takes `now` explicitly.

use axum::body::Bytes;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::domain::{ConnectionId, InvalidParams, SessionId};
use crate::payment::CallbackToken;
use crate::purchase::{ParcelOrder, PurchaseError, PurchaseTransaction, TicketOrder};
use crate::search::{
    CalendarDay, ParcelMonthlyPlanner, RouteDateSearch, RouteSearch, SearchError,
};
use crate::store::{BookingStore, ConnectionView, StoreError};

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/connections/search", get(search_connections))
        .route("/connections/:id", get(connection_detail))
        .route("/connections/:id/tickets", post(buy_tickets))
        .route("/connections/:id/parcels", post(send_parcel))
        .route("/parcels/calendar", get(parcel_calendar))
        .route("/parcels/price", get(parcel_price))
        // Browsers follow the provider's return URL with GET.
        .route(
            "/payments/:session/succeeded",
            get(payment_succeeded).post(payment_succeeded),
        )
        .route(
            "/payments/:session/failed",
            get(payment_failed).post(payment_failed),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Connections on a route and day, with neighbouring days.
async fn search_connections(
    State(state): State<AppState>,
    Query(query): Query<RouteSearchQuery>,
) -> Result<Json<RouteSearch>, AppError> {
    let config = state.config.current().await;
    let search = RouteDateSearch::new(&state.store, &config);
    let result = search.find(&query.into_request(), Utc::now()).await?;
    Ok(Json(result))
}

/// One connection with its capacity and availability.
async fn connection_detail(
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
) -> Result<Json<ConnectionView>, AppError> {
    let view = state
        .store
        .connection(&id)
        .await?
        .ok_or_else(|| AppError::NotFound {
            message: format!("connection {id} not found"),
        })?;
    Ok(Json(view))
}

/// A month of parcel availability.
async fn parcel_calendar(
    State(state): State<AppState>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<Vec<CalendarDay>>, AppError> {
    let config = state.config.current().await;
    let planner = ParcelMonthlyPlanner::new(&state.store, &config);
    let days = planner.plan_month(&query.into_request(), Utc::now()).await?;
    Ok(Json(days))
}

/// Tariff price of a parcel.
async fn parcel_price(
    State(state): State<AppState>,
    Query(query): Query<DimensionsQuery>,
) -> Result<Json<ParcelPriceResponse>, AppError> {
    let config = state.config.current().await;
    let dimensions = query.dimensions();
    let mut fields = InvalidParams::new();
    config
        .parcel_rules
        .check_dimensions(&dimensions, "", &mut fields);
    if !fields.is_empty() {
        return Err(AppError::BadRequest {
            message: "invalid parcel dimensions".to_string(),
            fields,
        });
    }
    Ok(Json(ParcelPriceResponse {
        dimensions,
        price: config.tariff.price(&dimensions),
    }))
}

/// Hold seats and start checkout.
async fn buy_tickets(
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
    body: Bytes,
) -> Result<(StatusCode, Json<PurchaseResponse>), AppError> {
    let order: TicketOrder = parse_body(&body)?;
    let config = state.config.current().await;
    let tx = PurchaseTransaction::new(&state.store, state.payments.as_ref(), &config);
    let receipt = tx.purchase_tickets(&id, &order, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// Hold luggage volume for a parcel and start checkout.
async fn send_parcel(
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
    body: Bytes,
) -> Result<(StatusCode, Json<PurchaseResponse>), AppError> {
    let order: ParcelOrder = parse_body(&body)?;
    let config = state.config.current().await;
    let tx = PurchaseTransaction::new(&state.store, state.payments.as_ref(), &config);
    let receipt = tx.purchase_parcel(&id, &order, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// The provider reports a successful payment.
async fn payment_succeeded(
    State(state): State<AppState>,
    Path(session): Path<SessionId>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<ConfirmResponse>, AppError> {
    let token = callback_token(query)?;
    let config = state.config.current().await;
    let tx = PurchaseTransaction::new(&state.store, state.payments.as_ref(), &config);
    let confirmed = tx.confirm(&session, &token, Utc::now()).await?;
    Ok(Json(ConfirmResponse {
        session_id: session,
        confirmed,
    }))
}

/// The provider reports a failed or abandoned payment.
async fn payment_failed(
    State(state): State<AppState>,
    Path(session): Path<SessionId>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<CancelResponse>, AppError> {
    let token = callback_token(query)?;
    let config = state.config.current().await;
    let tx = PurchaseTransaction::new(&state.store, state.payments.as_ref(), &config);
    let record = tx.cancel(&session, &token, Utc::now()).await?;
    Ok(Json(CancelResponse::new(session, &record)))
}

fn callback_token(query: CallbackQuery) -> Result<CallbackToken, AppError> {
    query.token.ok_or_else(|| AppError::Unauthorized {
        message: "missing callback token".to_string(),
    })
}

/// Parse a JSON body, turning syntax and shape errors into 400s.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "rejected malformed request body");
        AppError::BadRequest {
            message: format!("Invalid JSON: {e}"),
            fields: InvalidParams::new(),
        }
    })
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest {
        message: String,
        fields: InvalidParams,
    },
    Unauthorized {
        message: String,
    },
    NotFound {
        message: String,
    },
    Conflict {
        message: String,
    },
    Gone {
        message: String,
    },
    /// Detail is logged, not returned
    BadGateway {
        message: String,
    },
    /// Detail is logged, not returned
    Internal {
        message: String,
    },
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Gone { .. } => StatusCode::GONE,
            AppError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Internal {
            message: e.to_string(),
        }
    }
}

impl From<SearchError> for AppError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::Validation(fields) => AppError::BadRequest {
                message: "invalid search request".to_string(),
                fields,
            },
            SearchError::NotYetAvailable => AppError::NotFound {
                message: SearchError::NotYetAvailable.to_string(),
            },
            SearchError::Storage(e) => e.into(),
        }
    }
}

impl From<PurchaseError> for AppError {
    fn from(e: PurchaseError) -> Self {
        let message = e.to_string();
        match e {
            PurchaseError::Validation(fields) => AppError::BadRequest {
                message: "invalid order".to_string(),
                fields,
            },
            PurchaseError::ConnectionNotFound(_) | PurchaseError::UnknownSession => {
                AppError::NotFound { message }
            }
            PurchaseError::SaleClosed(_)
            | PurchaseError::CapacityConflict(_)
            | PurchaseError::AlreadyConfirmed => AppError::Conflict { message },
            PurchaseError::ExpiredSale => AppError::Gone { message },
            PurchaseError::Unauthorized => AppError::Unauthorized { message },
            PurchaseError::PaymentGateway(_) => AppError::BadGateway { message },
            PurchaseError::Storage(_) => AppError::Internal { message },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, fields) = match self {
            AppError::BadRequest { message, fields } => (message, fields),
            AppError::Unauthorized { message }
            | AppError::NotFound { message }
            | AppError::Conflict { message }
            | AppError::Gone { message } => (message, InvalidParams::new()),
            AppError::BadGateway { message } => {
                error!(%status, detail = %message, "payment provider failure");
                ("payment provider unavailable".to_string(), InvalidParams::new())
            }
            AppError::Internal { message } => {
                error!(%status, detail = %message, "request failed");
                ("internal error".to_string(), InvalidParams::new())
            }
        };

        let body = Json(ErrorResponse {
            error: message,
            fields,
        });
        (status, body).into_response()
    }
}
