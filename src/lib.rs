//! Compile a type-system manifest (classes, interfaces, enums) into one
//! JSON-Schema document that validates declarative configuration referencing
//! those types.
//!
//! Pipeline: [`loader`] → [`roots`] → [`compiler`] (backed by [`registry`],
//! reporting into [`diagnostics`]) → [`document`].
pub mod cli;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod extensions;
pub mod jq_exec;
pub mod loader;
pub mod manifest;
pub mod path_de;
pub mod registry;
pub mod roots;

pub use compiler::{Compiler, CompilerOptions};
pub use diagnostics::{DiagnosticNode, Diagnostics, NodeId};
pub use document::{render_full_schema, RenderOptions, Rendered};
pub use error::{EngineError, ManifestError, Result};
pub use manifest::{TypeRef, TypeSystem};
pub use registry::{DefinitionRegistry, Owner};
