//! Booking lifecycle and matching engine for a cleaning-services marketplace.
//!
//! Clients post jobs that cleaners bid on, or invite a specific cleaner
//! directly. Both paths feed one booking state machine; an expiration sweeper
//! closes invitations and open jobs nobody answered in time.

pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod extract;
pub mod requester;
pub mod storage;
pub mod telemetry;
pub mod workflows;
