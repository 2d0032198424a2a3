#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for repo-radar
//!
//! This library consolidates all functionality for the repo-radar tool, which observes
//! repositories from a keyword search, a trending board, and a curated watchlist, and
//! tracks their day-over-day growth.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`model`]: Identities, snapshots, and persisted records
//! - [`hosting`]: Cached, rate-limit aware access to the hosting API
//! - [`sources`]: The search, trending, and watchlist adapters
//! - [`aggregate`]: Cross-source deduplication and ranking
//! - [`history`]: Persisted project table and growth deltas
//! - [`cycle`]: One fetch-aggregate-commit pass
//! - [`reports`]: Daily report rendering and retention

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod aggregate;
pub mod commands;
pub mod cycle;
pub mod history;
pub mod hosting;
pub mod model;
pub mod reports;
pub mod sources;

pub use crate::commands::{Host, run};
