//! scene-reclaim
//!
//! Layer-scoped teardown for a GPU-backed scene graph. Scene content is
//! grouped into layers; when a layer is unloaded its nodes are detached and
//! their geometries, materials and textures are released exactly once. The
//! crate works on CPU-side data alone and uploads to a `wgpu` device only
//! when asked to, so reclamation can run (and be tested) without a GPU.
//!
//! High-level modules
//! - `config`: knobs for how layer membership is matched
//! - `context`: headless GPU device/queue used for uploads
//! - `data_structures`: layers, resources, textures and the scene graph
//! - `reclaim`: the three removal policies and single-node cleanup
//! - `resources`: helpers to load layer content (glTF) into the graph
//!

pub mod config;
pub mod context;
pub mod data_structures;
pub mod reclaim;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use config::{LayerMatch, ReclaimConfig};
pub use data_structures::layer::Layer;
pub use data_structures::scene_graph::{NodeId, NodeKind, SceneEvent, SceneGraph, SceneNode};
pub use reclaim::Reclaimer;

/// Install the platform logger.
///
/// Uses `env_logger` natively (configure through `RUST_LOG`) and the browser
/// console on wasm. Calling it more than once only prints a warning.
pub fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            // a logger is already installed, so this reaches the console
            log::warn!("Could not initialize logger: {}", e);
        }
    }
}
