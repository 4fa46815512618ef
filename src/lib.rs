//! Registration Flow: conversational student registration over HTTP.

pub mod config;
pub mod error;
pub mod registration;
pub mod store;
