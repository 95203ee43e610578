//! service-core: HTTP error mapping, base configuration, request middleware
//! and tracing setup shared by the restaurant services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
