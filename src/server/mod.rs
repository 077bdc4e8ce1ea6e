//! Server-side modules for the devtime API server.

pub mod auth;
pub mod routes;
pub mod storage;

pub use auth::{ApiKeyStore, AuthUser};
pub use routes::{router, ApiError, AppState};
pub use storage::{init_db, DayStore};
