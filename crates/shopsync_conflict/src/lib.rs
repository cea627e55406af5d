//! # shopsync Conflict
//!
//! Conflict detection and resolution for shopsync.
//!
//! This crate provides:
//! - Conflict detection between staged local mutations and server state
//! - Resolution strategies: timestamp, server-wins, client-wins, manual
//! - A [`ConflictPresenter`] capability trait so the manual path stays
//!   decoupled from any UI toolkit
//! - Field-level merge as an optional third outcome
//! - An in-memory audit log of detected conflicts
//!
//! ## Key Invariants
//!
//! - A conflict exists iff the server was modified after the local change
//!   was staged
//! - Equal timestamps resolve to the server side
//! - Fixed strategies are deterministic for a given conflict
//! - A cancelled manual prompt leaves the conflict open; nothing guesses

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod error;
mod resolver;

pub use conflict::{server_modified_at, Conflict};
pub use error::{ConflictError, ConflictResult};
pub use resolver::{
    merge_changes, ConflictPresenter, ConflictResolver, Resolution, ResolutionAction,
    ResolutionStrategy,
};
