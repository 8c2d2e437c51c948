//! Cooperative member notification service
//!
//! Installment reminders, notification read state and the cached member feed,
//! served over HTTP and backed by a remote relational store.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod installment;
pub mod loan;
pub mod models;
pub mod notification;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod store;
