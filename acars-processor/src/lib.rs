//! # ACARS Processor Library
//!
//! Ingests ACARS and VDL Mode 2 JSON feeds, persists every message, and runs
//! each one through the configured steps of filters, annotators and
//! receivers.
//!
//! **Flow:** ingest → store → bounded queue → worker pool → step chain

pub mod annotators;
pub mod clients;
pub mod config;
pub mod filters;
pub mod harness;
pub mod ingest;
pub mod params;
pub mod pipeline;
pub mod queue;
pub mod receivers;
pub mod runner;
pub mod worker;

pub use config::Config;
pub use pipeline::{ChainOutcome, Pipeline};
pub use runner::Processor;
