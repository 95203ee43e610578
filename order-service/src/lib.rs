//! Order service: checkout, payment reconciliation and kitchen status tracking.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
