//! # Larder
//!
//! A shopping-list and recipe server for households, usable both as a
//! standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! larder = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use larder::config::ServerConfig;
//! use larder::db::{Database, SqliteDatabase};
//! use larder::server::{AppState, create_router};
//!
//! let db = SqliteDatabase::new("./data/larder.db").unwrap();
//! db.initialize().unwrap();
//!
//! let state = Arc::new(AppState {
//!     db: Arc::new(db),
//!     config: ServerConfig::default(),
//! });
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes the binary's CLI dependencies. Disable with
//!   `default-features = false`.

pub mod auth;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod server;
pub mod types;
