use std::collections::HashMap;

use bytemuck::NoUninit;
use glam::Vec3;
use wgpu::*;

use super::gpu_init::GpuContext;
use crate::error::{GameError, Result};
use crate::model::{Camera, Lighting, MeshId, Node, NodeId, SceneGraph, Skybox, Surface};
use crate::utils::{MeshBuffer, Vertex};

pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
/// Colour textures are authored in sRGB
pub const TEXTURE_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

/// `inv_view_proj` turns far-plane NDC back into world space for the sky
#[repr(C)]
#[derive(Debug, Clone, Copy, NoUninit)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub eye: [f32; 4],
}

impl CameraUniform {
    pub fn from_camera(camera: &Camera) -> Self {
        let view_proj = camera.view_proj();
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            eye: camera.eye.extend(1.0).to_array(),
        }
    }
}

/// Packed lights. `w` carries intensity, except `spot_dir.w` which holds the
/// cosine of the cone half-angle. A disabled spot has zero intensity.
#[repr(C)]
#[derive(Debug, Clone, Copy, NoUninit)]
pub struct LightingUniform {
    pub ambient: [f32; 4],
    pub sun_dir: [f32; 4],
    pub spot_pos: [f32; 4],
    pub spot_dir: [f32; 4],
}

impl LightingUniform {
    pub fn from_lighting(lighting: &Lighting) -> Self {
        let ambient = Vec3::from(lighting.ambient_color) * lighting.ambient_intensity;
        let spot = &lighting.spot;
        let spot_intensity = if spot.enabled { spot.intensity } else { 0.0 };
        let spot_dir = (spot.target - spot.position).normalize_or_zero();
        Self {
            ambient: ambient.extend(1.0).to_array(),
            sun_dir: lighting.sun_direction.normalize_or_zero().extend(lighting.sun_intensity).to_array(),
            spot_pos: spot.position.extend(spot_intensity).to_array(),
            spot_dir: spot_dir.extend(spot.angle.cos()).to_array(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, NoUninit)]
pub struct NodeUniform {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
    pub tint: [f32; 4],
    /// xy: texture repeats, zw unused
    pub uv_repeat: [f32; 4],
}

impl NodeUniform {
    pub fn from_node(node: &Node) -> Self {
        let model = node.model_matrix();
        let [u, v] = node.look.uv_repeat;
        Self {
            model: model.to_cols_array_2d(),
            normal: model.inverse().transpose().to_cols_array_2d(),
            tint: node.look.color,
            uv_repeat: [u, v, 0.0, 0.0],
        }
    }
}

/// Visible nodes in submission order: opaque first, then translucent
/// ones sorted far to near from `eye`
pub fn draw_order(scene: &SceneGraph, eye: Vec3) -> Vec<NodeId> {
    let mut opaque = Vec::new();
    let mut translucent = Vec::new();
    for (id, node) in scene.nodes() {
        if !node.look.visible {
            continue;
        }
        if node.is_translucent() {
            translucent.push((id, node.pose.position.distance_squared(eye)));
        } else {
            opaque.push(id);
        }
    }
    translucent.sort_by(|a, b| b.1.total_cmp(&a.1));
    opaque.extend(translucent.into_iter().map(|(id, _)| id));
    opaque
}

pub fn create_depth_texture(device: &Device, width: u32, height: u32) -> (Texture, TextureView) {
    let depth_texture = device.create_texture(&TextureDescriptor {
        label: Some("depth_texture"),
        size: Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth_texture.create_view(&TextureViewDescriptor::default());
    (depth_texture, depth_view)
}

fn uniform_entry(binding: u32, visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Sampled texture at binding 0 and its sampler at binding 1
fn texture_layout(device: &Device, label: &str, view_dimension: TextureViewDimension) -> BindGroupLayout {
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                    view_dimension,
                    multisampled: false,
                },
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Sampler(SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

fn create_sampler(device: &Device, label: &str, address_mode: AddressMode) -> Sampler {
    device.create_sampler(&SamplerDescriptor {
        label: Some(label),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Linear,
        mipmap_filter: FilterMode::Nearest,
        ..Default::default()
    })
}

/// RGBA8 texture with one array layer per slice of `layers`, all `width` x `height`
pub fn upload_rgba_layers(device: &Device, queue: &Queue, label: &str, width: u32, height: u32, layers: &[&[u8]]) -> Texture {
    let texture = device.create_texture(&TextureDescriptor {
        label: Some(label),
        size: Extent3d { width, height, depth_or_array_layers: layers.len() as u32 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });
    for (layer, rgba) in layers.iter().enumerate() {
        queue.write_texture(
            TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: Origin3d { x: 0, y: 0, z: layer as u32 },
                aspect: TextureAspect::All,
            },
            rgba,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            Extent3d { width, height, depth_or_array_layers: 1 },
        );
    }
    texture
}

fn texture_bind_group(device: &Device, label: &str, layout: &BindGroupLayout, view: &TextureView, sampler: &Sampler) -> BindGroup {
    device.create_bind_group(&BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            BindGroupEntry { binding: 0, resource: BindingResource::TextureView(view) },
            BindGroupEntry { binding: 1, resource: BindingResource::Sampler(sampler) },
        ],
    })
}

fn uniform_buffer(device: &Device, label: &str, size: usize) -> Buffer {
    device.create_buffer(&BufferDescriptor {
        label: Some(label),
        size: size as BufferAddress,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Camera and lighting, bound once per frame at group 0
pub struct FrameResources {
    pub camera_buffer: Buffer,
    pub lighting_buffer: Buffer,
    pub bind_group_layout: BindGroupLayout,
    pub bind_group: BindGroup,
}

pub fn create_frame_resources(device: &Device) -> FrameResources {
    let camera_buffer = uniform_buffer(device, "camera_buffer", std::mem::size_of::<CameraUniform>());
    let lighting_buffer = uniform_buffer(device, "lighting_buffer", std::mem::size_of::<LightingUniform>());

    let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("frame_bind_group_layout"),
        entries: &[
            uniform_entry(0, ShaderStages::VERTEX | ShaderStages::FRAGMENT),
            uniform_entry(1, ShaderStages::FRAGMENT),
        ],
    });

    let bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some("frame_bind_group"),
        layout: &bind_group_layout,
        entries: &[
            BindGroupEntry { binding: 0, resource: camera_buffer.as_entire_binding() },
            BindGroupEntry { binding: 1, resource: lighting_buffer.as_entire_binding() },
        ],
    });

    FrameResources { camera_buffer, lighting_buffer, bind_group_layout, bind_group }
}

/// Opaque pass writes depth, the translucent pass only tests against it
pub fn create_scene_pipeline(
    device: &Device,
    format: TextureFormat,
    layouts: &[&BindGroupLayout],
    translucent: bool,
) -> RenderPipeline {
    let shader = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("scene_shader"),
        source: ShaderSource::Wgsl(include_str!("../shaders/scene.wgsl").into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("scene_pipeline_layout"),
        bind_group_layouts: layouts,
        push_constant_ranges: &[],
    });

    let (label, blend, cull_mode) = if translucent {
        ("translucent_pipeline", BlendState::ALPHA_BLENDING, None)
    } else {
        ("opaque_pipeline", BlendState::REPLACE, Some(Face::Back))
    };

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as BufferAddress,
                step_mode: VertexStepMode::Vertex,
                attributes: &[
                    VertexAttribute { offset: 0, shader_location: 0, format: VertexFormat::Float32x3 },
                    VertexAttribute { offset: 12, shader_location: 1, format: VertexFormat::Float32x3 },
                    VertexAttribute { offset: 24, shader_location: 2, format: VertexFormat::Float32x4 },
                    VertexAttribute { offset: 40, shader_location: 3, format: VertexFormat::Float32x2 },
                ],
            }],
            compilation_options: Default::default(),
        },
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState { format, blend: Some(blend), write_mask: ColorWrites::ALL })],
            compilation_options: Default::default(),
        }),
        primitive: PrimitiveState {
            topology: PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: FrontFace::Ccw,
            cull_mode,
            polygon_mode: PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: !translucent,
            depth_compare: CompareFunction::Less,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: MultisampleState { count: 1, mask: !0, alpha_to_coverage_enabled: false },
        multiview: None,
        cache: None,
    })
}

/// Fullscreen triangle sampling the sky cubemap, drawn first without touching depth
pub fn create_sky_pipeline(device: &Device, format: TextureFormat, layouts: &[&BindGroupLayout]) -> RenderPipeline {
    let shader = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("sky_shader"),
        source: ShaderSource::Wgsl(include_str!("../shaders/sky.wgsl").into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("sky_pipeline_layout"),
        bind_group_layouts: layouts,
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("sky_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &shader,
            entry_point: Some("vs_sky"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: Some("fs_sky"),
            targets: &[Some(ColorTargetState { format, blend: Some(BlendState::REPLACE), write_mask: ColorWrites::ALL })],
            compilation_options: Default::default(),
        }),
        primitive: PrimitiveState::default(),
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: false,
            depth_compare: CompareFunction::Always,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

struct NodeGpu {
    buffer: Buffer,
    bind_group: BindGroup,
}

/// GPU side of the scene graph plus the egui overlay
pub struct RenderState {
    pub format: TextureFormat,
    pub alpha_mode: CompositeAlphaMode,
    pub width: u32,
    pub height: u32,

    frame: FrameResources,
    node_layout: BindGroupLayout,
    surface_layout: BindGroupLayout,
    sky_layout: BindGroupLayout,
    repeat_sampler: Sampler,
    sky_sampler: Sampler,
    opaque_pipeline: RenderPipeline,
    translucent_pipeline: RenderPipeline,
    sky_pipeline: RenderPipeline,
    depth_view: TextureView,

    meshes: HashMap<MeshId, MeshBuffer>,
    nodes: HashMap<NodeId, NodeGpu>,
    /// Bound for untextured nodes and for surfaces still loading
    white_material: BindGroup,
    materials: HashMap<Surface, BindGroup>,
    skies: HashMap<Skybox, BindGroup>,

    pub egui_renderer: egui_wgpu::Renderer,
    pub egui_primitives: Option<Vec<egui::ClippedPrimitive>>,
    pub egui_full_output: Option<egui::FullOutput>,
    pub egui_dpr: f32,
}

impl RenderState {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = gpu.device.as_ref();
        let frame = create_frame_resources(device);
        let node_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("node_bind_group_layout"),
            entries: &[uniform_entry(0, ShaderStages::VERTEX)],
        });
        let surface_layout = texture_layout(device, "surface_bind_group_layout", TextureViewDimension::D2);
        let sky_layout = texture_layout(device, "sky_bind_group_layout", TextureViewDimension::Cube);
        let repeat_sampler = create_sampler(device, "repeat_sampler", AddressMode::Repeat);
        let sky_sampler = create_sampler(device, "sky_sampler", AddressMode::ClampToEdge);

        let layouts = [&frame.bind_group_layout, &node_layout, &surface_layout];
        let opaque_pipeline = create_scene_pipeline(device, gpu.format, &layouts, false);
        let translucent_pipeline = create_scene_pipeline(device, gpu.format, &layouts, true);
        let sky_pipeline = create_sky_pipeline(device, gpu.format, &[&frame.bind_group_layout, &sky_layout]);

        let white_pixel: &[u8] = &[255; 4];
        let white = upload_rgba_layers(device, gpu.queue.as_ref(), "white_texture", 1, 1, &[white_pixel]);
        let white_view = white.create_view(&TextureViewDescriptor::default());
        let white_material = texture_bind_group(device, "white_bind_group", &surface_layout, &white_view, &repeat_sampler);

        let (width, height) = (gpu.config.width, gpu.config.height);
        let (_, depth_view) = create_depth_texture(device, width, height);
        let egui_renderer = egui_wgpu::Renderer::new(device, gpu.format, egui_wgpu::RendererOptions::default());

        Self {
            format: gpu.format,
            alpha_mode: gpu.config.alpha_mode,
            width,
            height,
            frame,
            node_layout,
            surface_layout,
            sky_layout,
            repeat_sampler,
            sky_sampler,
            opaque_pipeline,
            translucent_pipeline,
            sky_pipeline,
            depth_view,
            meshes: HashMap::new(),
            nodes: HashMap::new(),
            white_material,
            materials: HashMap::new(),
            skies: HashMap::new(),
            egui_renderer,
            egui_primitives: None,
            egui_full_output: None,
            egui_dpr: 1.0,
        }
    }

    fn surface_config(&self) -> SurfaceConfiguration {
        SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: self.format,
            width: self.width,
            height: self.height,
            present_mode: PresentMode::Fifo,
            alpha_mode: self.alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        }
    }

    /// Reconfigure the surface and depth buffer. Returns false when nothing changed.
    pub fn resize(&mut self, device: &Device, surface: &wgpu::Surface<'_>, width: u32, height: u32) -> bool {
        let (width, height) = (width.max(1), height.max(1));
        if width == self.width && height == self.height {
            return false;
        }
        self.width = width;
        self.height = height;
        surface.configure(device, &self.surface_config());
        let (_, depth_view) = create_depth_texture(device, width, height);
        self.depth_view = depth_view;
        tracing::debug!("surface resized to {}x{}", width, height);
        true
    }

    /// Store a tessellated egui frame for the next `draw_frame`
    pub fn set_ui(&mut self, primitives: Vec<egui::ClippedPrimitive>, full_output: egui::FullOutput, dpr: f32) {
        self.egui_primitives = Some(primitives);
        self.egui_full_output = Some(full_output);
        self.egui_dpr = dpr;
    }

    /// Upload surface textures and sky sets that have arrived since the last frame
    fn upload_textures(&mut self, device: &Device, queue: &Queue, scene: &SceneGraph) {
        for surface in Surface::ALL {
            if self.materials.contains_key(&surface) {
                continue;
            }
            let Some(image) = scene.texture(surface) else { continue };
            let texture = upload_rgba_layers(device, queue, surface.path(), image.width, image.height, &[image.rgba.as_slice()]);
            let view = texture.create_view(&TextureViewDescriptor::default());
            let bind_group = texture_bind_group(device, "surface_bind_group", &self.surface_layout, &view, &self.repeat_sampler);
            self.materials.insert(surface, bind_group);
            tracing::debug!("uploaded texture {}", surface.path());
        }

        for sky in Skybox::ALL {
            if self.skies.contains_key(&sky) {
                continue;
            }
            let Some(cube) = scene.sky_faces(sky) else { continue };
            let layers: Vec<&[u8]> = cube.faces.iter().map(|f| f.rgba.as_slice()).collect();
            let texture = upload_rgba_layers(device, queue, sky.dir(), cube.size, cube.size, &layers);
            let view = texture.create_view(&TextureViewDescriptor {
                label: Some("sky_view"),
                dimension: Some(TextureViewDimension::Cube),
                ..Default::default()
            });
            let bind_group = texture_bind_group(device, "sky_bind_group", &self.sky_layout, &view, &self.sky_sampler);
            self.skies.insert(sky, bind_group);
            tracing::debug!("uploaded sky {}", sky.dir());
        }
    }

    fn material(&self, surface: Option<Surface>) -> &BindGroup {
        surface
            .and_then(|s| self.materials.get(&s))
            .unwrap_or(&self.white_material)
    }

    /// Upload missing meshes, refresh per-node uniforms and drop buffers of removed nodes
    fn prepare(&mut self, device: &Device, queue: &Queue, scene: &SceneGraph, order: &[NodeId]) {
        self.upload_textures(device, queue, scene);
        self.nodes.retain(|id, _| scene.node(*id).is_some());

        for id in order {
            let Some(node) = scene.node(*id) else { continue };
            if !self.meshes.contains_key(&node.mesh) {
                if let Some(mesh) = scene.mesh(node.mesh) {
                    self.meshes.insert(node.mesh, mesh.upload(device));
                }
            }

            let layout = &self.node_layout;
            let gpu = self.nodes.entry(*id).or_insert_with(|| {
                let buffer = uniform_buffer(device, "node_buffer", std::mem::size_of::<NodeUniform>());
                let bind_group = device.create_bind_group(&BindGroupDescriptor {
                    label: Some("node_bind_group"),
                    layout,
                    entries: &[BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() }],
                });
                NodeGpu { buffer, bind_group }
            });
            queue.write_buffer(&gpu.buffer, 0, bytemuck::bytes_of(&NodeUniform::from_node(node)));
        }
    }

    pub fn draw_frame(&mut self, gpu: &GpuContext, scene: &SceneGraph, camera: &Camera) -> Result<()> {
        let device = gpu.device.as_ref();
        let queue = gpu.queue.as_ref();

        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                gpu.surface.configure(device, &self.surface_config());
                tracing::warn!("surface lost, reconfigured");
                return Ok(());
            }
            Err(SurfaceError::Timeout) => return Ok(()),
            Err(e) => return Err(GameError::Gpu(format!("surface error: {e:?}"))),
        };

        queue.write_buffer(&self.frame.camera_buffer, 0, bytemuck::bytes_of(&CameraUniform::from_camera(camera)));
        queue.write_buffer(
            &self.frame.lighting_buffer,
            0,
            bytemuck::bytes_of(&LightingUniform::from_lighting(&scene.lighting)),
        );

        let order = draw_order(scene, camera.eye);
        self.prepare(device, queue, scene, &order);

        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor { label: Some("encoder") });

        {
            let mut rp = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(scene.skybox.clear_color()),
                        store: StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations { load: LoadOp::Clear(1.0), store: StoreOp::Store }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rp.set_bind_group(0, &self.frame.bind_group, &[]);
            if let Some(sky) = self.skies.get(&scene.skybox) {
                rp.set_pipeline(&self.sky_pipeline);
                rp.set_bind_group(1, sky, &[]);
                rp.draw(0..3, 0..1);
            }

            let mut translucent = false;
            rp.set_pipeline(&self.opaque_pipeline);

            for id in &order {
                let Some(node) = scene.node(*id) else { continue };
                let (Some(mesh), Some(gpu_node)) = (self.meshes.get(&node.mesh), self.nodes.get(id)) else {
                    continue;
                };
                if mesh.index_count == 0 {
                    continue;
                }
                if node.is_translucent() && !translucent {
                    translucent = true;
                    rp.set_pipeline(&self.translucent_pipeline);
                }
                rp.set_bind_group(1, &gpu_node.bind_group, &[]);
                rp.set_bind_group(2, self.material(node.look.texture), &[]);
                rp.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                rp.set_index_buffer(mesh.index_buffer.slice(..), IndexFormat::Uint32);
                rp.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        if let (Some(primitives), Some(full_output)) = (self.egui_primitives.take(), self.egui_full_output.take()) {
            self.draw_ui(device, queue, &mut encoder, &view, &primitives, &full_output);
        }

        queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn draw_ui(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        view: &TextureView,
        primitives: &[egui::ClippedPrimitive],
        full_output: &egui::FullOutput,
    ) {
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.width, self.height],
            pixels_per_point: self.egui_dpr,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(device, queue, *id, image_delta);
        }
        self.egui_renderer.update_buffers(device, queue, encoder, primitives, &screen_descriptor);

        {
            let egui_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("egui_render_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: Operations { load: LoadOp::Load, store: StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.egui_renderer.render(&mut egui_pass.forget_lifetime(), primitives, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;
    use crate::model::{hex_color, NodeLook};
    use crate::physics::Pose;
    use crate::utils::create_box_mesh;

    #[test]
    fn test_uniform_sizes_match_shader_layout() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 144);
        assert_eq!(std::mem::size_of::<LightingUniform>(), 64);
        assert_eq!(std::mem::size_of::<NodeUniform>(), 160);
    }

    #[test]
    fn test_sky_ray_through_screen_center_points_at_target() {
        let mut camera = Camera::new(800, 600, &crate::config::CameraConfig::default());
        camera.eye = Vec3::new(0.0, 5.0, 20.0);
        camera.set_look_at(Vec3::new(0.0, 5.0, 0.0));
        let u = CameraUniform::from_camera(&camera);

        let far = Mat4::from_cols_array_2d(&u.inv_view_proj) * glam::Vec4::new(0.0, 0.0, 1.0, 1.0);
        let dir = (far.truncate() / far.w - camera.eye).normalize();
        assert!(dir.abs_diff_eq(Vec3::NEG_Z, 1e-3), "sky ray off axis: {:?}", dir);
    }

    #[test]
    fn test_disabled_spot_has_no_intensity() {
        let mut lighting = Lighting::default();
        lighting.spot.intensity = 2.0;
        assert_eq!(LightingUniform::from_lighting(&lighting).spot_pos[3], 0.0);
        lighting.spot.enabled = true;
        assert_eq!(LightingUniform::from_lighting(&lighting).spot_pos[3], 2.0);
    }

    #[test]
    fn test_translucent_nodes_draw_last_far_to_near() {
        let mut scene = SceneGraph::new();
        let mesh = scene.add_mesh(create_box_mesh(Vec3::ONE));
        let near = scene.add_node(mesh, Pose::at(Vec3::new(0.0, 0.0, 5.0)), NodeLook::colored(hex_color(0xffffff, 0.5)));
        let solid = scene.add_node(mesh, Pose::IDENTITY, NodeLook::default());
        let far = scene.add_node(mesh, Pose::at(Vec3::new(0.0, 0.0, 50.0)), NodeLook::colored(hex_color(0xffffff, 0.5)));
        let hidden = scene.add_node(mesh, Pose::IDENTITY, NodeLook::default().hidden());

        let order = draw_order(&scene, Vec3::ZERO);
        assert_eq!(order, vec![solid, far, near]);
        assert!(!order.contains(&hidden));
    }

    #[test]
    fn test_node_uniform_carries_scale_and_tint() {
        let node = Node {
            mesh: MeshId::default(),
            pose: Pose::at(Vec3::new(1.0, 2.0, 3.0)),
            look: NodeLook::colored([0.2, 0.4, 0.6, 1.0]).scaled(2.0).textured(Surface::Ice, 2.0),
        };
        let u = NodeUniform::from_node(&node);
        assert_eq!(u.tint, [0.2, 0.4, 0.6, 1.0]);
        assert_eq!(u.uv_repeat, [2.0, 2.0, 0.0, 0.0]);
        assert_eq!(u.model[0][0], 2.0);
        assert_eq!(u.model[3], [1.0, 2.0, 3.0, 1.0]);
        assert!(Mat4::from_cols_array_2d(&u.normal).is_finite());
    }
}
