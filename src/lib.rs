//! Campaign Throttle - advisory rate limiting for outbound messaging
//!
//! This crate implements the client-side limiters that guard login, search
//! and contact-upload actions, together with the sending-policy model that
//! paces campaign dispatch: pacing profiles, hourly/daily quota status,
//! schedule projection and automatic pausing when a cap is reached.

pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod sending;
pub mod store;

pub use error::{Result, ThrottleError};
