//! Typed model of Nuclio function deployment documents.
//!
//! Function documents are described by schemas ([`schema`]) and held as
//! validated [`entity::ConfigEntity`] trees. The root of every document is a
//! [`function::FunctionConfig`], which offers typed mutators for environment
//! variables, volumes and triggers. Triggers can also be assembled with the
//! builders in [`triggers`], which write raw documents through [`path`].
//!
//! ## Crate Features
//!
//! - `default` enables `clap`.
//! - `clap` derives `clap::Args` for [`environment::BuilderEnvironmentOptions`].

pub mod document;
pub mod entity;
pub mod environment;
pub mod function;
pub mod model;
pub mod naming;
pub mod path;
pub mod schema;
pub mod triggers;
pub mod validation;
