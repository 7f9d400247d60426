pub mod admin;
pub mod auth;
pub mod config;
pub mod data_source;
pub mod error;
pub mod permission;
pub mod principal;
pub mod request;
pub mod saved_objects;
pub mod state;
pub mod workspace;

pub use error::{Result, SavedObjectsError};
