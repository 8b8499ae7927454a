//! # ACARS Common Library
//!
//! Shared code for the ACARS processor including:
//! - Typed ACARS and VDL Mode 2 message records
//! - The flat `APMessage` view and record projection
//! - Message store (SQLite) with migrations and the AI decision log
//! - Configuration loading helpers
//! - Timestamp utilities

pub mod apmessage;
pub mod config;
pub mod db;
pub mod error;
pub mod links;
pub mod messages;
pub mod time;

pub use apmessage::{merge_ap_messages, APMessage, Value};
pub use error::{Error, Result};
pub use messages::{AcarsMessage, MessageKind, MessageRecord, Vdlm2Message};
