//! # Soundshelf
//!
//! A self-hostable audio catalogue server: uploads, playlists, favorites,
//! listening history and a follow graph behind a JSON HTTP API. Usable both as
//! a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! soundshelf = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use soundshelf::config::ServerConfig;
//! use soundshelf::server::{AppState, create_router};
//! use soundshelf::store::{SqliteStore, Store};
//!
//! let config = ServerConfig::default();
//! let store = SqliteStore::new(config.db_path()).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(Arc::new(store), config).unwrap());
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `soundshelf` binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod mail;
pub mod media;
pub mod mutations;
pub mod server;
pub mod store;
pub mod types;
pub mod views;
