//! Image Warden Controller
//!
//! Ties the report repository and the rule engine together behind the
//! decision and ingestion interface, and provides the `image-warden` CLI.

pub mod commands;
pub mod controller;
pub mod output;
pub mod signal;

pub use controller::Controller;
