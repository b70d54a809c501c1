#![doc = include_str!("../../../README.md")]
//!

//! This crate re-exports the logger, log objects and value conversion of
//! `datalogs-core` as the public library API.

pub use datalogs_core::*;
