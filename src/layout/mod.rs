//! Graphviz layout: DOT generation, the `dot` subprocess, and `-Tplain` parsing.

mod dot;
mod engine;
mod plain;

pub use dot::build_dot;
pub use engine::LayoutEngine;
pub use plain::parse_plain;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Graphviz 'dot' was not found. Install Graphviz or set its path with --dot-path.")]
    Unavailable,
    #[error("Failed to run {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("dot exited with {code}: {stderr}")]
    Failed { code: String, stderr: String },
}
