//! Core data types for the Javelin build tool.
//!
//! This crate defines the value types the rest of the system is built on:
//! Maven-style dependency coordinates with classifiers and types, dependency
//! exclusions and scopes, repository descriptions with cache chaining and
//! checksum policies, the `Javelin.toml` build manifest, and the
//! `project/config:key` query language.
//!
//! This crate is intentionally free of async code and network I/O.

pub mod dependency;
pub mod manifest;
pub mod query;
pub mod repository;
