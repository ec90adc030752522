//! Core library for the `loadcoord` CLI.
//!
//! A coordinator drives test suites through an ordered phase lifecycle on
//! agents and workers addressed by a hierarchical address tree. The crate
//! holds the addressing and binary operation codec, the component registry,
//! the barrier-synchronized test case runner, suite configuration and an
//! in-process simulated cluster the CLI runs against.
pub mod args;
pub mod cluster;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod entry;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod system;
