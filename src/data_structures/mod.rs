//! Scene data structures: layers, resources, textures and the scene graph.
//!
//! - `layer` identifies groups of scene content
//! - `model` contains geometry and material resources
//! - `texture` holds CPU pixels and the GPU texture created from them
//! - `instance` holds per-node local transforms
//! - `scene_graph` is the node arena with children and link lists

pub mod instance;
pub mod layer;
pub mod model;
pub mod scene_graph;
pub mod texture;
