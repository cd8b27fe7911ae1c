//! The scoped key-graph engine.
//!
//! Build scripts declare *projects*, *configurations*, and *archetypes* that
//! bind *keys* to producer functions. Evaluating a key walks the scope's
//! holder stack for the nearest binding, applies modifiers collected along
//! the way, and reports progress to an optional listener. Scopes are layered
//! configuration-by-configuration and memoized; configuration extensions let
//! one configuration override another's bindings when both are in scope.

pub mod cache;
pub mod evaluator;
pub mod holder;
pub mod input;
pub mod key;
pub mod listener;
pub mod scope;

pub use evaluator::{Eval, EvalError, Evaluator};
pub use holder::{
    Archetype, ArchetypeBuilder, Configuration, ConfigurationBuilder, Project, ProjectBuilder,
};
pub use key::{Key, Value};
pub use scope::Scope;
