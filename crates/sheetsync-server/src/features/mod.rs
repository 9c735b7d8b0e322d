//! Feature slices of the HTTP API
//!
//! Each feature keeps its write operations in `commands/`, its reads in
//! `queries/` and the axum wiring in `routes.rs`.
//!
//! - **conversions**: accept conversion and deletion requests
//! - **tasks**: processing task status
//! - **records**: read back published records

pub mod conversions;
pub mod records;
pub mod tasks;

use axum::Router;

use crate::bootstrap::AppServices;

/// Routes mounted under `/api/v1`
pub fn router() -> Router<AppServices> {
    Router::new()
        .merge(conversions::conversions_routes())
        .nest("/tasks", tasks::tasks_routes())
        .nest("/records", records::records_routes())
}
