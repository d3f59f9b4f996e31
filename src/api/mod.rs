//! API Module
//!
//! HTTP handlers and routing for the cache admin API.
//!
//! # Endpoints
//! - `GET /health`, `GET /stats`, `POST /stats/reset`, `GET /policies`
//! - `PUT /cache`, `GET /cache/:key`, `DELETE /cache/:key`,
//!   `GET /cache/:key/exists`, `POST /cache/invalidate`

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
