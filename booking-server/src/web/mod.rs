//! Web layer for the booking service.
//!
//! Thin JSON endpoints over search and purchase.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
