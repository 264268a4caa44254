//! carenotify library
//!
//! Reminder engine, notification feed and emergency alerts for the care
//! companion. Exposed as a library for the binary and for integration tests.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod routes;
pub mod services;
pub mod storage;
