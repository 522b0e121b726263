//! wgpu renderer: a lit mesh pass over a cube-map background.

use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix3, Matrix4};
use thiserror::Error;
use turntable_core::config::RenderConfig;
use turntable_core::lighting::color_from_hex;
use turntable_core::scene::DrawItem;
use turntable_core::{Camera, Lighting, Model, SceneRenderer};
use wgpu::util::DeviceExt;

use crate::assets::CubeFaces;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Maps OpenGL clip depth (-1..1) to wgpu's 0..1.
#[rustfmt::skip]
fn opengl_to_wgpu() -> Matrix4<f32> {
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 0.5, 0.5,
        0.0, 0.0, 0.0, 1.0,
    )
}

#[derive(Error, Debug)]
pub enum GpuError {
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable graphics adapter")]
    NoAdapter,

    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("surface unavailable: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Interleave the vertex data of one draw item.
pub fn vertices(item: &DrawItem<'_>) -> Vec<Vertex> {
    item.positions()
        .iter()
        .zip(item.normals())
        .map(|(p, n)| Vertex {
            position: [p.x, p.y, p.z],
            normal: [n.x, n.y, n.z],
        })
        .collect()
}

/// Per-frame uniforms shared by both pipelines (240 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GlobalsUniform {
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    pub sun_dir: [f32; 4],
    pub sun_color: [f32; 4],
    pub ambient: [f32; 4],
    pub hemi_sky: [f32; 4],
    pub hemi_ground: [f32; 4],
    /// x: exposure, y: 1.0 when the shader must encode sRGB itself.
    pub params: [f32; 4],
}

impl GlobalsUniform {
    pub fn new(camera: &Camera, lighting: &Lighting, manual_srgb: bool) -> Self {
        let view_proj = opengl_to_wgpu() * camera.view_projection();
        let inv_view_proj = view_proj.try_inverse().unwrap_or_else(Matrix4::identity);
        let rgb = |c: nalgebra::Vector3<f32>, intensity: f32| {
            let c = c * intensity;
            [c.x, c.y, c.z, 1.0]
        };
        let sun_dir = lighting.sun.direction();
        let p = camera.position;

        Self {
            view_proj: view_proj.into(),
            inv_view_proj: inv_view_proj.into(),
            camera_pos: [p.x, p.y, p.z, 1.0],
            sun_dir: [sun_dir.x, sun_dir.y, sun_dir.z, 0.0],
            sun_color: rgb(lighting.sun.color, lighting.sun.intensity),
            ambient: rgb(lighting.ambient.color, lighting.ambient.intensity),
            hemi_sky: rgb(lighting.hemisphere.sky, lighting.hemisphere.intensity),
            hemi_ground: rgb(lighting.hemisphere.ground, lighting.hemisphere.intensity),
            params: [lighting.exposure, if manual_srgb { 1.0 } else { 0.0 }, 0.0, 0.0],
        }
    }
}

/// Per-draw uniforms (144 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DrawUniform {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
    pub base_color: [f32; 4],
}

impl DrawUniform {
    pub fn new(item: &DrawItem<'_>) -> Self {
        let linear: Matrix3<f32> = item.transform.fixed_view::<3, 3>(0, 0).into_owned();
        let normal = linear
            .try_inverse()
            .map(|inverse| inverse.transpose())
            .unwrap_or(linear)
            .to_homogeneous();
        Self {
            model: item.transform.into(),
            normal: normal.into(),
            base_color: item.primitive.base_color,
        }
    }
}

struct DrawBuffers {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    skinned: bool,
}

/// GPU copies of one model's draw items, rebuilt when the model changes.
struct ModelBuffers {
    model_id: u64,
    draws: Vec<DrawBuffers>,
}

pub struct GpuRenderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    manual_srgb: bool,
    clear_color: wgpu::Color,
    depth_view: wgpu::TextureView,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    draw_layout: wgpu::BindGroupLayout,
    mesh_pipeline: wgpu::RenderPipeline,
    skybox_layout: wgpu::BindGroupLayout,
    skybox_pipeline: wgpu::RenderPipeline,
    skybox: Option<wgpu::BindGroup>,
    model: Option<ModelBuffers>,
}

impl GpuRenderer {
    pub async fn new(
        target: wgpu::SurfaceTarget<'static>,
        width: u32,
        height: u32,
        render: &RenderConfig,
    ) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(target)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
            .ok_or(GpuError::NoAdapter)?;
        log::info!("graphics adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Turntable Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                },
                None,
            )
            .await?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(wgpu::TextureFormat::is_srgb)
            .or_else(|| capabilities.formats.first().copied())
            .ok_or(GpuError::NoAdapter)?;
        let manual_srgb = !format.is_srgb();
        if manual_srgb {
            log::debug!("surface format {format:?} is not sRGB, encoding in shader");
        }

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);
        let depth_view = create_depth_view(&device, &config);

        let uniform_entry = |visibility| wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Globals Bind Group Layout"),
            entries: &[uniform_entry(wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT)],
        });
        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Bind Group Layout"),
            entries: &[uniform_entry(wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT)],
        });
        let skybox_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Skybox Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Globals Uniform Buffer"),
            contents: bytemuck::cast_slice(&[GlobalsUniform::zeroed()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Globals Bind Group"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let mesh_pipeline = create_mesh_pipeline(&device, format, &globals_layout, &draw_layout);
        let skybox_pipeline =
            create_skybox_pipeline(&device, format, &globals_layout, &skybox_layout);

        let [r, g, b] = {
            let c = color_from_hex(render.clear_color);
            [c.x as f64, c.y as f64, c.z as f64]
        };

        Ok(Self {
            surface,
            device,
            queue,
            config,
            manual_srgb,
            clear_color: wgpu::Color { r, g, b, a: 1.0 },
            depth_view,
            globals_buffer,
            globals_bind_group,
            draw_layout,
            mesh_pipeline,
            skybox_layout,
            skybox_pipeline,
            skybox: None,
            model: None,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 || (width, height) == self.size() {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_view(&self.device, &self.config);
    }

    /// Upload the background cube map. Until this is called the clear
    /// colour is shown.
    pub fn set_skybox(&mut self, cube: &CubeFaces) {
        let size = wgpu::Extent3d {
            width: cube.size(),
            height: cube.size(),
            depth_or_array_layers: 6,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Skybox Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (layer, face) in cube.faces().iter().enumerate() {
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer as u32,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                &face.pixels,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * face.width),
                    rows_per_image: Some(face.height),
                },
                wgpu::Extent3d {
                    width: face.width,
                    height: face.height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Skybox View"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Skybox Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        self.skybox = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Skybox Texture Bind Group"),
            layout: &self.skybox_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        }));
    }

    /// Bring the GPU buffers in line with the model's current pose.
    fn prepare_model(&mut self, model: &Model) {
        let items = model.draw_items();

        let stale = self
            .model
            .as_ref()
            .map_or(true, |cached| cached.model_id != model.id() || cached.draws.len() != items.len());
        if stale {
            log::debug!("uploading model {} ({} draws)", model.id(), items.len());
            let draws = items.iter().map(|item| self.create_draw(item)).collect();
            self.model = Some(ModelBuffers {
                model_id: model.id(),
                draws,
            });
            return;
        }

        let Some(cached) = self.model.as_ref() else {
            return;
        };
        for (item, draw) in items.iter().zip(&cached.draws) {
            self.queue
                .write_buffer(&draw.uniform_buffer, 0, bytemuck::cast_slice(&[DrawUniform::new(item)]));
            if draw.skinned {
                self.queue
                    .write_buffer(&draw.vertex_buffer, 0, bytemuck::cast_slice(&vertices(item)));
            }
        }
    }

    fn create_draw(&self, item: &DrawItem<'_>) -> DrawBuffers {
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices(item)),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Index Buffer"),
            contents: bytemuck::cast_slice(&item.primitive.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Draw Uniform Buffer"),
            contents: bytemuck::cast_slice(&[DrawUniform::new(item)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Bind Group"),
            layout: &self.draw_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        DrawBuffers {
            vertex_buffer,
            index_buffer,
            index_count: item.primitive.indices.len() as u32,
            uniform_buffer,
            bind_group,
            skinned: item.skinned.is_some(),
        }
    }
}

impl SceneRenderer for GpuRenderer {
    type Error = GpuError;

    fn render(
        &mut self,
        model: Option<&Model>,
        camera: &Camera,
        lighting: &Lighting,
    ) -> Result<(), GpuError> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let globals = GlobalsUniform::new(camera, lighting, self.manual_srgb);
        self.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::cast_slice(&[globals]));
        match model {
            Some(model) => self.prepare_model(model),
            None => self.model = None,
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(skybox) = &self.skybox {
                pass.set_pipeline(&self.skybox_pipeline);
                pass.set_bind_group(0, &self.globals_bind_group, &[]);
                pass.set_bind_group(1, skybox, &[]);
                pass.draw(0..3, 0..1);
            }

            if let Some(cached) = &self.model {
                pass.set_pipeline(&self.mesh_pipeline);
                pass.set_bind_group(0, &self.globals_bind_group, &[]);
                for draw in &cached.draws {
                    pass.set_bind_group(1, &draw.bind_group, &[]);
                    pass.set_vertex_buffer(0, draw.vertex_buffer.slice(..));
                    pass.set_index_buffer(draw.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..draw.index_count, 0, 0..1);
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

fn create_depth_view(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_mesh_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    globals_layout: &wgpu::BindGroupLayout,
    draw_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Mesh Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Mesh Pipeline Layout"),
        bind_group_layouts: &[globals_layout, draw_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Mesh Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: "vs_main",
            buffers: &[Vertex::layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

fn create_skybox_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    globals_layout: &wgpu::BindGroupLayout,
    skybox_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Skybox Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/skybox.wgsl").into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Skybox Pipeline Layout"),
        bind_group_layouts: &[globals_layout, skybox_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Skybox Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: "vs_main",
            buffers: &[], // Full-screen triangle
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        // On the far plane, behind everything; never writes depth.
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector4};
    use turntable_core::{Mesh, Primitive};

    #[test]
    fn test_uniform_sizes_match_shaders() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
        assert_eq!(std::mem::size_of::<GlobalsUniform>(), 240);
        assert_eq!(std::mem::size_of::<DrawUniform>(), 144);
    }

    #[test]
    fn test_view_projection_depth_is_zero_to_one() {
        let camera = Camera::default();
        let globals = GlobalsUniform::new(&camera, &Lighting::default(), false);
        let view_proj = Matrix4::from(globals.view_proj);

        let depth = |p: Point3<f32>| {
            let clip = view_proj * p.to_homogeneous();
            clip.z / clip.w
        };
        let forward = (camera.target - camera.position).normalize();
        assert!(depth(camera.position + forward * camera.near).abs() < 1e-4);
        assert!((depth(camera.position + forward * camera.far) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_inverse_maps_far_plane_back() {
        let camera = Camera::default();
        let globals = GlobalsUniform::new(&camera, &Lighting::default(), true);
        let view_proj = Matrix4::from(globals.view_proj);
        let inv = Matrix4::from(globals.inv_view_proj);
        let round_trip = view_proj * inv * Vector4::new(0.3, -0.2, 1.0, 1.0);
        assert!((round_trip - Vector4::new(0.3, -0.2, 1.0, 1.0)).norm() < 1e-3);
        assert_eq!(globals.params[1], 1.0);
    }

    #[test]
    fn test_draw_uniform_from_item() {
        let mut model = Model::from_mesh(
            Mesh::new("cube").with_primitive(Primitive::cube(1.0).with_base_color([1.0, 0.0, 0.0, 1.0])),
        );
        model.orientation.rotate(0.0, 0.5, 0.0);
        let items = model.draw_items();
        let uniform = DrawUniform::new(&items[0]);

        assert_eq!(uniform.base_color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(Matrix4::from(uniform.model), items[0].transform);
        // Pure rotation: the normal matrix equals the rotation itself.
        let normal = Matrix4::from(uniform.normal);
        assert!((normal - items[0].transform).norm() < 1e-5);
        assert_eq!(vertices(&items[0]).len(), 24);
    }
}
