//! Dependency resolution engine: Maven-compatible nearest-wins mediation,
//! transitive resolution with scope propagation and exclusions, snapshot
//! handling, and per-node failure collection.

pub mod aggregate;
pub mod conflict;
pub mod graph;
pub mod resolver;

pub use graph::{Resolution, ResolvedDependency};
pub use resolver::{build_chain, resolve, resolve_with};
