//! glTF / GLB loader.
//!
//! Loading is split in two so callers can fetch external buffers however
//! their platform allows (file reads natively, HTTP fetches in the browser):
//!
//! 1. [`PendingGltf::parse`] reads the document, decodes the GLB blob and any
//!    `data:` URIs, and lists the buffers still missing.
//! 2. The caller resolves each [`ExternalBuffer`] and calls
//!    [`PendingGltf::finish`] to build the [`LoadedAsset`].

use base64::Engine as _;
use gltf::animation::util::ReadOutputs;
use gltf::buffer::Source;
use nalgebra::{Matrix4, Point3, Quaternion, Vector3};

use crate::animation::{AnimationClip, Interpolation, Keyframes, Track, TrackValues};
use crate::error::LoadError;
use crate::geometry::{Mesh, Primitive, SkinWeights};
use crate::scene::{LoadedAsset, Model, Node, Skin};
use crate::transform::NodeTransform;

/// A buffer referenced by URI that the caller must supply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalBuffer {
    pub index: usize,
    pub uri: String,
}

/// A parsed document whose buffers may still be incomplete.
pub struct PendingGltf {
    document: gltf::Document,
    buffers: Vec<Option<Vec<u8>>>,
    external: Vec<ExternalBuffer>,
}

impl PendingGltf {
    /// Parse `.gltf` JSON or `.glb` bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, LoadError> {
        let gltf::Gltf { document, mut blob } = gltf::Gltf::from_slice(bytes)?;

        let mut buffers = Vec::with_capacity(document.buffers().len());
        let mut external = Vec::new();
        for buffer in document.buffers() {
            let data = match buffer.source() {
                Source::Bin => blob.take(),
                Source::Uri(uri) if uri.starts_with("data:") => Some(decode_data_uri(uri)?),
                Source::Uri(uri) => {
                    external.push(ExternalBuffer {
                        index: buffer.index(),
                        uri: uri.to_string(),
                    });
                    None
                }
            };
            buffers.push(data);
        }

        Ok(Self {
            document,
            buffers,
            external,
        })
    }

    /// Buffers referenced by relative or absolute URI.
    pub fn external_buffers(&self) -> &[ExternalBuffer] {
        &self.external
    }

    pub fn resolve(&mut self, index: usize, data: Vec<u8>) {
        if let Some(slot) = self.buffers.get_mut(index) {
            *slot = Some(data);
        }
    }

    /// Build the model and clips from the default scene.
    pub fn finish(self) -> Result<LoadedAsset, LoadError> {
        let buffers = self.checked_buffers()?;
        let document = &self.document;
        let mut model = Model::new();

        for mesh in document.meshes() {
            model.add_mesh(load_mesh(&mesh, &buffers)?);
        }

        for skin in document.skins() {
            let reader = skin.reader(|b| buffers.get(b.index()).copied());
            let inverse_bind_matrices = reader
                .read_inverse_bind_matrices()
                .map(|matrices| matrices.map(Matrix4::from).collect())
                .unwrap_or_default();
            model.add_skin(Skin {
                joints: skin.joints().map(|joint| joint.index()).collect(),
                inverse_bind_matrices,
            });
        }

        for node in document.nodes() {
            let (translation, rotation, scale) = node.transform().decomposed();
            let mut scene_node = Node::new(node.name().unwrap_or_default())
                .with_transform(NodeTransform::from_trs(translation, rotation, scale));
            scene_node.mesh = node.mesh().map(|m| m.index());
            scene_node.skin = node.skin().map(|s| s.index());
            model.add_node(scene_node, None);
        }
        for node in document.nodes() {
            for child in node.children() {
                model.set_parent(child.index(), node.index());
            }
        }

        match document.default_scene().or_else(|| document.scenes().next()) {
            Some(scene) => {
                for node in scene.nodes() {
                    model.add_root(node.index());
                }
            }
            None => {
                let orphans: Vec<usize> = model
                    .nodes()
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| n.parent.is_none())
                    .map(|(i, _)| i)
                    .collect();
                for node in orphans {
                    model.add_root(node);
                }
            }
        }

        let clips = document
            .animations()
            .map(|animation| load_animation(&animation, &buffers))
            .collect();

        Ok(LoadedAsset { model, clips })
    }

    fn checked_buffers(&self) -> Result<Vec<&[u8]>, LoadError> {
        self.document
            .buffers()
            .map(|buffer| {
                let index = buffer.index();
                let data = self.buffers.get(index).and_then(|b| b.as_deref()).ok_or_else(|| {
                    LoadError::MissingBuffer {
                        index,
                        uri: match buffer.source() {
                            Source::Uri(uri) => uri.to_string(),
                            Source::Bin => "<glb binary chunk>".to_string(),
                        },
                    }
                })?;
                if data.len() < buffer.length() {
                    return Err(LoadError::BufferTooShort {
                        index,
                        needed: buffer.length(),
                        actual: data.len(),
                    });
                }
                Ok(data)
            })
            .collect()
    }
}

/// Load a document, fetching external buffers through `resolve(uri)`.
pub fn load_gltf_with<F>(bytes: &[u8], mut resolve: F) -> Result<LoadedAsset, LoadError>
where
    F: FnMut(&str) -> Result<Vec<u8>, LoadError>,
{
    let mut pending = PendingGltf::parse(bytes)?;
    for ExternalBuffer { index, uri } in pending.external_buffers().to_vec() {
        let data = resolve(&uri)?;
        pending.resolve(index, data);
    }
    pending.finish()
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>, LoadError> {
    let (header, payload) = uri
        .split_once(',')
        .ok_or_else(|| LoadError::InvalidDataUri("missing ',' separator".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(LoadError::InvalidDataUri(format!(
            "only base64 data URIs are supported, got {header:?}"
        )));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| LoadError::InvalidDataUri(e.to_string()))
}

fn load_mesh(mesh: &gltf::Mesh<'_>, buffers: &[&[u8]]) -> Result<Mesh, LoadError> {
    let name = mesh
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("mesh{}", mesh.index()));
    let mut loaded = Mesh::new(name.clone());

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::warn!(
                "skipping {:?} primitive in mesh {name:?}: only triangles are drawn",
                primitive.mode()
            );
            continue;
        }

        let reader = primitive.reader(|b| buffers.get(b.index()).copied());
        let positions: Vec<Point3<f32>> = reader
            .read_positions()
            .ok_or_else(|| LoadError::MissingPositions { mesh: name.clone() })?
            .map(Point3::from)
            .collect();
        let normals: Vec<Vector3<f32>> = reader
            .read_normals()
            .map(|normals| normals.map(Vector3::from).collect())
            .unwrap_or_default();
        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        if let Some(&index) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(LoadError::IndexOutOfRange {
                mesh: name,
                index,
                count: positions.len(),
            });
        }

        let skin_weights = match (reader.read_joints(0), reader.read_weights(0)) {
            (Some(joints), Some(weights)) => Some(SkinWeights {
                joints: joints.into_u16().collect(),
                weights: weights.into_f32().collect(),
            }),
            _ => None,
        };

        let base_color = primitive
            .material()
            .pbr_metallic_roughness()
            .base_color_factor();

        let mut loaded_primitive =
            Primitive::new(positions, normals, indices).with_base_color(base_color);
        loaded_primitive.skin_weights = skin_weights;
        loaded.primitives.push(loaded_primitive);
    }

    Ok(loaded)
}

fn load_animation(animation: &gltf::Animation<'_>, buffers: &[&[u8]]) -> AnimationClip {
    let name = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("animation{}", animation.index()));
    let mut clip = AnimationClip::new(name);

    for channel in animation.channels() {
        let node = channel.target().node().index();
        let interpolation = match channel.sampler().interpolation() {
            gltf::animation::Interpolation::Step => Interpolation::Step,
            gltf::animation::Interpolation::Linear => Interpolation::Linear,
            gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
        };

        let reader = channel.reader(|b| buffers.get(b.index()).copied());
        let (Some(inputs), Some(outputs)) = (reader.read_inputs(), reader.read_outputs()) else {
            log::warn!("animation {:?}: channel without data", clip.name);
            continue;
        };
        let times: Vec<f32> = inputs.collect();

        let values = match outputs {
            ReadOutputs::Translations(values) => TrackValues::Translation(keyframes(
                times,
                values.map(Vector3::from).collect(),
                interpolation,
            )),
            ReadOutputs::Scales(values) => TrackValues::Scale(keyframes(
                times,
                values.map(Vector3::from).collect(),
                interpolation,
            )),
            ReadOutputs::Rotations(values) => TrackValues::Rotation(keyframes(
                times,
                values
                    .into_f32()
                    .map(|[x, y, z, w]| Quaternion::new(w, x, y, z))
                    .collect(),
                interpolation,
            )),
            ReadOutputs::MorphTargetWeights(_) => {
                log::debug!("animation {:?}: morph target weights are not animated", clip.name);
                continue;
            }
        };
        clip.add_track(Track::new(node, values));
    }

    clip
}

fn keyframes<T: crate::animation::Animatable>(
    times: Vec<f32>,
    values: Vec<T>,
    interpolation: Interpolation,
) -> Keyframes<T> {
    match interpolation {
        Interpolation::CubicSpline => Keyframes::cubic_spline(times, values),
        other => Keyframes::new(times, values, other),
    }
}
