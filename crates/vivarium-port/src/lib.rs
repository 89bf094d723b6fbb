// SPDX-License-Identifier: Apache-2.0
//! vivarium-port: adapter contracts between the core runtime and its
//! surroundings.
//!
//! This crate defines the domain contract between the simulation core and the
//! data pipeline (storage backends, visualizers, analytics). It contains NO
//! engine logic — the core depends on these types, implementations live in
//! adapter crates.
//!
//! # Design Principles
//!
//! - **Observers are dumb** — They receive snapshots and deltas. No simulation
//!   logic leaks across this boundary.
//! - **The core owns time** — Ticks advance only inside the runtime; adapters
//!   never drive state.
//! - **Interfaces only** — No storage paths, wire encodings, or transport
//!   choices appear here.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::module_name_repetitions
)]

mod resolver;
mod store;
mod telemetry;
mod types;

pub use resolver::LabelResolver;
pub use store::{StateStore, StoreError};
pub use telemetry::{NullTelemetrySink, TelemetrySink, TickSummary};
pub use types::{CellDelta, OrganismSnapshot};
