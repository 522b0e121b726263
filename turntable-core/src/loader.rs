//! Loading models from the local filesystem.

use std::fs;
use std::path::Path;

use crate::error::LoadError;
use crate::gltf_loader::load_gltf_with;
use crate::scene::LoadedAsset;
use crate::stl::parse_stl;

/// Load a `.gltf`, `.glb` or `.stl` file.
///
/// External glTF buffers are read relative to the file's directory.
pub fn load_model_file(path: impl AsRef<Path>) -> Result<LoadedAsset, LoadError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let bytes = fs::read(path)?;
    log::info!("loading {} ({} bytes)", path.display(), bytes.len());

    match extension.as_str() {
        "gltf" | "glb" => {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            load_gltf_with(&bytes, |uri| {
                let buffer_path = base.join(uri);
                log::debug!("reading buffer {}", buffer_path.display());
                Ok(fs::read(buffer_path)?)
            })
        }
        "stl" => parse_stl(&bytes),
        _ => Err(LoadError::UnsupportedFormat(path.display().to_string())),
    }
}
