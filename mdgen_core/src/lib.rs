//! `mdgen_core` is the core library for the mdgen build-time generator. It
//! turns a tree of source markdown files into per-target output trees: a
//! declarative manifest maps sources (literal paths or globs) to
//! destinations, and triple-brace placeholders in each document are replaced
//! by registered generators until the text stops changing.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Manifest + BuildTarget
//!   → Glob expander (ordered ResolvedMappings, conflict detection)
//!   → Source read (LF-normalized)
//!   → Substitution engine (fixed-point passes over the registry)
//!   → Output tree (write, or compare in `check`)
//! ```
//!
//! ## Modules
//!
//! - [`manifest`]: File mapping rules and glob expansion.
//! - [`section`]: Fence-aware markdown section extraction used by the
//!   section generator.
//! - [`registry`]: The [`Generator`] trait, built-in generators, and the
//!   placeholder key table.
//! - [`config`]: Loading `mdgen.toml` into a [`Manifest`] and a
//!   [`SubstitutionRegistry`].
//! - [`project`]: The build orchestrator: compute, write, and check outputs.
//! - [`watch`]: Generation tracking and affected-mapping rebuilds.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use mdgen_core::BuildTarget;
//! use mdgen_core::Project;
//! use mdgen_core::compute_outputs;
//! use mdgen_core::write_outputs;
//!
//! let project = Project::load(Path::new(".")).unwrap();
//! let result = compute_outputs(&project, BuildTarget::Local).unwrap();
//! write_outputs(&result).unwrap();
//! ```

pub use config::*;
pub use engine::*;
pub use error::*;
pub use manifest::*;
pub use placeholder::*;
pub use project::*;
pub use registry::Generator;
pub use registry::SubstitutionRegistry;
pub use section::*;
pub use target::*;
pub use watch::*;

pub mod config;
mod engine;
#[allow(unused_assignments)]
mod error;
pub mod manifest;
mod placeholder;
pub mod project;
pub mod registry;
pub mod section;
mod target;
pub mod watch;

#[cfg(test)]
mod __fixtures;
