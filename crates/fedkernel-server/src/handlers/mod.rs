//! HTTP handler modules for the federation API.
//!
//! Each sub-module implements thin handlers that parse requests, acquire
//! the service lock (and, for the patch workflow, the node-set lock),
//! delegate to [`FederationService`], and return JSON responses. No
//! business logic lives in handlers.
//!
//! [`FederationService`]: crate::service::FederationService

pub mod graph;
pub mod health;
pub mod patches;
pub mod repos;
