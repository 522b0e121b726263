//! Turntable Core - model loading, animation and the interaction loop
//!
//! Platform-independent pieces of the model viewer: glTF/STL loading,
//! scene graph and CPU skinning, the animation mixer, camera and lighting
//! math, and the [`InteractionController`] that turns pointer input and
//! frame ticks into model rotation. Front-ends supply a [`SceneRenderer`].

pub mod animation;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod gltf_loader;
pub mod lighting;
#[cfg(not(target_arch = "wasm32"))]
pub mod loader;
pub mod projection;
pub mod render;
pub mod scene;
pub mod stl;
pub mod transform;

// Re-export commonly used types
pub use animation::{AnimationAction, AnimationClip, AnimationMixer, LoopMode};
pub use clock::Clock;
pub use config::ViewerConfig;
pub use controller::{DragState, InteractionController, PointerEvent};
pub use error::{ConfigError, LoadError};
pub use geometry::{Aabb, Mesh, Primitive};
pub use lighting::Lighting;
pub use projection::Camera;
pub use render::SceneRenderer;
pub use scene::{LoadedAsset, Model};
pub use transform::Orientation;
