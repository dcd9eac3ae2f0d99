//! # Ticket Match Common Library
//!
//! Shared code for the ticket-matching services:
//! - Common error type
//! - Bootstrap configuration loading and root folder resolution
//! - Clock abstraction used by retention sweeps

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
pub use time::{Clock, SystemClock};
