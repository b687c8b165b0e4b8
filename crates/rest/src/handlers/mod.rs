//! HTTP request handlers and the interaction helpers behind them.
//!
//! - [`patch`] - JSON Patch / Merge Patch with If-Match
//! - [`history`] - instance history Bundle
//! - [`read`] - read and vread
//! - [`search`] - searchset Bundle
//!
//! Each handler is generic over the backend and takes [`AppState`] as axum
//! state; route registration is left to the embedding service.
//!
//! [`AppState`]: crate::state::AppState

pub mod history;
pub mod patch;
pub mod read;
pub mod search;

pub use history::{history_handler, history_response};
pub use patch::{patch_handler, patch_resource};
pub use read::{read_handler, vread_handler, vread_response};
pub use search::{search_handler, search_response};
