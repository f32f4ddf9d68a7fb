//! `weft_core` is a layout-composition engine: it wraps page content in
//! reusable layout templates via slot-based content injection, propagating
//! each page's frontmatter to every layout in its chain.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Page source
//!   → Frontmatter extraction (leading `---` metadata block)
//!   → Layout chain resolution (layout wrapping layout, cycle-checked)
//!   → Slot resolution per chain link, innermost first
//!   → Composed ContentNode tree + collected warnings
//! ```
//!
//! ## Modules
//!
//! - [`registry`] — The template cache: parse-once layouts keyed by
//!   identifier, safe for concurrent lookups across page builds.
//! - [`pipeline`] — The per-page composition state machine, from raw
//!   source to an emitted [`ContentNode`].
//! - [`resolver`] — Slot substitution: supplied content, declared
//!   fallback, or empty, in document order.
//! - [`build`] — Page discovery and the parallel build over a worker
//!   pool, one isolated pipeline instance per page.
//!
//! ## Key Types
//!
//! - [`Template`] — A parsed layout: static fragments, slot markers, and
//!   declared style imports.
//! - [`FrontmatterRecord`] — A page's metadata, exposed read-only to every
//!   layout in its chain, with the rendered body under the reserved
//!   `content` key.
//! - [`ComposedPage`] — The emitted output tree plus aggregated imports
//!   and non-fatal warnings.
//! - [`WeftError`] — The failure taxonomy; parse, not-found, and cycle
//!   errors abort a single page's build and never the whole process.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::path::Path;
//!
//! use weft_core::CancelToken;
//! use weft_core::MemoryLoader;
//! use weft_core::TemplateRegistry;
//! use weft_core::compose_page;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = TemplateRegistry::new();
//! registry.register(
//! 	"layouts/base.html",
//! 	"<html><body><slot /></body></html>",
//! )?;
//!
//! let page = "---\nlayout: layouts/base.html\ntitle: Hello\n---\n<p>Hi!</p>\n";
//! let composed = compose_page(
//! 	Path::new("index.html"),
//! 	page,
//! 	&registry,
//! 	&MemoryLoader::new(),
//! 	&CancelToken::new(),
//! )?;
//!
//! assert!(composed.node.to_string().contains("<p>Hi!</p>"));
//! # Ok(())
//! # }
//! ```

pub use build::*;
pub use config::*;
pub use error::*;
pub use frontmatter::*;
pub use loader::*;
pub use node::*;
pub use pipeline::*;
pub use position::*;
pub use registry::*;
pub use resolver::*;
pub use template::*;

pub mod build;
pub mod config;
mod error;
pub mod frontmatter;
pub(crate) mod interpolate;
pub(crate) mod lexer;
mod loader;
mod node;
pub mod pipeline;
mod position;
pub mod registry;
pub mod resolver;
mod template;

#[cfg(test)]
mod __fixtures;
#[cfg(test)]
mod __tests;
