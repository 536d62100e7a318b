//! Noise-sweep driver for the `kramers-escape` simulator.
//!
//! This library exposes the configuration and output modules used by the
//! `kramers-sweep` CLI binary.

pub mod config;
pub mod io;
