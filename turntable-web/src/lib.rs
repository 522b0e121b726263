//! Turntable Web - WASM model viewer rendered with wgpu
//!
//! Mount from JavaScript once the module has loaded:
//!
//! ```js
//! import init, { WebViewer } from "./pkg/turntable_web.js";
//! await init();
//! await WebViewer.attach("canvas");
//! ```

pub mod assets;
pub mod gpu;
#[cfg(target_arch = "wasm32")]
mod web;

pub use gpu::{GpuError, GpuRenderer};
#[cfg(target_arch = "wasm32")]
pub use web::WebViewer;
