//! # shopsync Connectivity
//!
//! Online/offline connectivity monitor for shopsync.
//!
//! This crate provides:
//! - A two-state connectivity state machine with listener notification
//! - A sync trigger fired exactly once per `Offline → Online` transition
//! - An optional polling fallback behind the [`ConnectivityProbe`] trait
//!
//! The monitor and the sync layer communicate only through one-directional
//! triggers; neither holds a reference to the other's state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod monitor;

pub use monitor::{
    ConnectivityEvent, ConnectivityMonitor, ConnectivityProbe, ConnectivityStatus, ListenerId,
};
