//! HTTP/JSON API server for the federation graph and patch workflow
//! engine.
//!
//! Exposes repository import and fact ingestion, graph queries, and the
//! patch-proposal workflow over a REST-shaped API. This crate contains the
//! server framework, API schema types, error handling, the coordinating
//! [`service::FederationService`], and the concurrency primitives that
//! gate ingestion and scope patch decisions.

pub mod concurrency;
pub mod error;
pub mod handlers;
pub mod router;
pub mod schema;
pub mod service;
pub mod state;
pub mod time_fmt;
