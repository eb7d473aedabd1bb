//! Renderable relationship graph built from a layout pass.

mod geometry;
mod graph;

pub use geometry::Point;
pub use graph::{GraphScene, SceneEvent, SceneMeta, SceneNode};
