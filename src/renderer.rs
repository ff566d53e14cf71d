//! wgpu renderer: window, surface, pipelines and the frame loop.

use winit::{
    event::{ElementState, Event, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};
use wgpu::{Adapter, Buffer, RenderPipeline};
use std::sync::Arc;

use crate::assets::{Assets, TextureSlot, SLOT_COUNT};
use crate::compositor::Compositor;
use crate::config::AppConfig;
use crate::draw::{DrawList, Layer, LineDraw, Outline, Shape, SolidDraw, MAX_POINT_LIGHTS};
use crate::error::{AppError, FrameError};
use crate::mesh::{Mesh, MeshData, Vertex};
use crate::phase::StyleTable;
use crate::scene::Scene;
use crate::state::Simulation;
use crate::time::FramePacer;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const INITIAL_INSTANCES: u64 = 4096;
const RAIN_STEP: f32 = 0.1;
const TIME_OF_DAY_STEP: f32 = 0.05;
const HEIGHT_STEP: f32 = 10.0;
const DISTANCE_STEP: f32 = 50.0;
/// Pixels per wheel line.
const WHEEL_LINE: f32 = 40.0;
/// Source weighted by alpha, added onto the destination.
const ADDITIVE_BLENDING: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent::OVER,
};

pub struct Renderer {
    adapter: Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    window: Arc<winit::window::Window>,
    surface_format: wgpu::TextureFormat,
    solid_pipeline: RenderPipeline,
    line_pipeline: RenderPipeline,
    haze_pipeline: RenderPipeline,
    globals_buffer: Buffer,
    globals_bind_group: wgpu::BindGroup,
    texture_bind_group: wgpu::BindGroup,
    depth_view: wgpu::TextureView,
    shapes: [Mesh; 4],
    outlines: [Mesh; 4],
    instance_buffer: Buffer,
    instance_capacity: u64,
    scene: Scene,
    sim: Simulation,
    compositor: Compositor,
    pacer: FramePacer,
    pointer: PointerState,
    title: String,
}

#[derive(Default)]
struct PointerState {
    dragging: bool,
    last_x: Option<f64>,
}

// Per-frame lighting block, laid out to match `Globals` in the shader
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
    eye: [f32; 4],
    ambient: [f32; 4],
    sun_color: [f32; 4],
    sun_dir: [f32; 4],
    fog: [f32; 4],
    point_pos: [[f32; 4]; MAX_POINT_LIGHTS],
    point_color: [[f32; 4]; MAX_POINT_LIGHTS],
    counts: [f32; 4],
}

impl Globals {
    fn from_list(list: &DrawList, seconds: f32) -> Self {
        let mut globals = Self {
            view_proj: list.view_proj.to_cols_array_2d(),
            eye: list.eye.extend(seconds).to_array(),
            ambient: list.lighting.ambient.extend(list.bloom).to_array(),
            sun_color: [0.0; 4],
            sun_dir: [0.0, -1.0, 0.0, 0.0],
            fog: list.clear.extend(0.0).to_array(),
            point_pos: [[0.0; 4]; MAX_POINT_LIGHTS],
            point_color: [[0.0; 4]; MAX_POINT_LIGHTS],
            counts: [list.lighting.points.len() as f32, 0.0, 0.0, 0.0],
        };
        if let Some((color, dir)) = list.lighting.directional {
            globals.sun_color = color.extend(1.0).to_array();
            globals.sun_dir = dir.extend(0.0).to_array();
        }
        if let Some(fog) = list.fog {
            globals.fog = fog.color.extend(fog.density).to_array();
        }
        for (i, light) in list.lighting.points.iter().enumerate() {
            globals.point_pos[i] = light.position.extend(light.intensity).to_array();
            globals.point_color[i] = light.color.extend(1.0).to_array();
        }
        globals
    }
}

// One draw instance; solids and outlines share the layout
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Instance {
    model: [[f32; 4]; 4],
    color: [f32; 4],
    surface_a: [f32; 4],
    surface_b: [f32; 4],
    extra: [f32; 4],
}

impl Instance {
    const ATTRIBUTES: [wgpu::VertexAttribute; 8] = wgpu::vertex_attr_array![
        3 => Float32x4,
        4 => Float32x4,
        5 => Float32x4,
        6 => Float32x4,
        7 => Float32x4,
        8 => Float32x4,
        9 => Float32x4,
        10 => Float32x4,
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Instance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }

    fn solid(draw: &SolidDraw) -> Self {
        let s = draw.surface;
        Self {
            model: draw.model.to_cols_array_2d(),
            color: draw.color.to_array(),
            surface_a: s.specular.extend(s.shininess).to_array(),
            surface_b: [s.metallic, s.roughness, s.reflectivity, s.subsurface],
            extra: [
                s.emissive,
                draw.texture.map_or(-1.0, |slot| slot.layer() as f32),
                draw.uv_scale,
                0.0,
            ],
        }
    }

    fn line(draw: &LineDraw) -> Self {
        Self {
            model: draw.model.to_cols_array_2d(),
            color: draw.color.to_array(),
            surface_a: [0.0; 4],
            surface_b: [0.0; 4],
            extra: [1.0, -1.0, 1.0, draw.weight],
        }
    }
}

fn shape_index(shape: Shape) -> usize {
    match shape {
        Shape::Cube => 0,
        Shape::Cone => 1,
        Shape::Sphere => 2,
        Shape::Disc => 3,
    }
}

fn outline_index(outline: Outline) -> usize {
    match outline {
        Outline::Cube => 0,
        Outline::Cone => 1,
        Outline::Segment => 2,
        Outline::Ring => 3,
    }
}

/// Consecutive draws sharing a mesh, submitted as one instanced call.
#[derive(Debug, Clone, PartialEq)]
struct Batch {
    mesh: usize,
    instances: std::ops::Range<u32>,
}

/// Group runs of equal mesh indices without reordering.
fn batches(meshes: impl Iterator<Item = usize>, first: u32) -> Vec<Batch> {
    let mut out: Vec<Batch> = Vec::new();
    for (i, mesh) in meshes.enumerate() {
        let index = first + i as u32;
        match out.last_mut() {
            Some(batch) if batch.mesh == mesh => batch.instances.end = index + 1,
            _ => out.push(Batch {
                mesh,
                instances: index..index + 1,
            }),
        }
    }
    out
}

impl Renderer {
    pub async fn new(
        event_loop: &EventLoop<()>,
        config: &AppConfig,
        scene: Scene,
        assets: &Assets,
    ) -> Result<Self, AppError> {
        // Create window with Arc for shared ownership
        let window = Arc::new(
            WindowBuilder::new()
                .with_title("Rendering Eras")
                .with_inner_size(winit::dpi::PhysicalSize::new(
                    config.window_width,
                    config.window_height,
                ))
                .build(event_loop)?,
        );

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(AppError::NoAdapter)?;
        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Renderer Device"),
                    required_features: wgpu::Features::default(),
                    required_limits: wgpu::Limits::default(),
                },
                None, // Trace path
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);
        surface.configure(
            &device,
            &wgpu::SurfaceConfiguration {
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                format: surface_format,
                width,
                height,
                present_mode: surface_caps.present_modes[0],
                alpha_mode: surface_caps.alpha_modes[0],
                view_formats: vec![],
                desired_maximum_frame_latency: 2,
            },
        );
        let depth_view = create_depth_view(&device, width, height);

        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("City Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Globals Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Globals Buffer"),
            size: std::mem::size_of::<Globals>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Globals Bind Group"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2Array,
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
        let texture_bind_group = upload_textures(&device, &queue, &texture_layout, assets);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("City Pipeline Layout"),
            bind_group_layouts: &[&globals_layout, &texture_layout],
            push_constant_ranges: &[],
        });
        let solid_pipeline = create_pipeline(
            "Solid Pipeline",
            &device,
            &pipeline_layout,
            &shader_module,
            surface_format,
            "fs_main",
            wgpu::PrimitiveTopology::TriangleList,
            wgpu::BlendState::ALPHA_BLENDING,
            true,
        );
        let line_pipeline = create_pipeline(
            "Line Pipeline",
            &device,
            &pipeline_layout,
            &shader_module,
            surface_format,
            "fs_line",
            wgpu::PrimitiveTopology::LineList,
            wgpu::BlendState::ALPHA_BLENDING,
            true,
        );
        let haze_pipeline = create_pipeline(
            "Haze Pipeline",
            &device,
            &pipeline_layout,
            &shader_module,
            surface_format,
            "fs_main",
            wgpu::PrimitiveTopology::TriangleList,
            ADDITIVE_BLENDING,
            false,
        );

        let shapes = [Shape::Cube, Shape::Cone, Shape::Sphere, Shape::Disc]
            .map(|shape| Mesh::new(&device, &format!("{shape:?}"), &MeshData::for_shape(shape)));
        let outlines = [Outline::Cube, Outline::Cone, Outline::Segment, Outline::Ring].map(
            |outline| {
                Mesh::new(
                    &device,
                    &format!("{outline:?} Outline"),
                    &MeshData::for_outline(outline),
                )
            },
        );
        let instance_buffer = create_instance_buffer(&device, INITIAL_INSTANCES);

        let mut sim = Simulation::new(config);
        sim.camera.set_aspect(width, height);
        let compositor = Compositor::new(StyleTable::new(), config.seed as u32, assets.loaded());

        Ok(Self {
            adapter,
            device,
            queue,
            surface,
            window,
            surface_format,
            solid_pipeline,
            line_pipeline,
            haze_pipeline,
            globals_buffer,
            globals_bind_group,
            texture_bind_group,
            depth_view,
            shapes,
            outlines,
            instance_buffer,
            instance_capacity: INITIAL_INSTANCES,
            scene,
            sim,
            compositor,
            pacer: FramePacer::new(),
            pointer: PointerState::default(),
            title: String::new(),
        })
    }

    pub fn run(mut self, event_loop: EventLoop<()>) -> Result<(), AppError> {
        event_loop.run(move |event, target| {
            target.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent {
                    window_id,
                    event: WindowEvent::CloseRequested,
                } if window_id == self.window.id() => {
                    log::info!("Closing after {} simulation steps", self.pacer.steps());
                    target.exit();
                }
                Event::WindowEvent {
                    event: WindowEvent::Resized(physical_size),
                    window_id,
                } if window_id == self.window.id() => {
                    self.resize(physical_size);
                }
                Event::AboutToWait => {
                    self.window.request_redraw();
                }
                Event::WindowEvent {
                    event: WindowEvent::RedrawRequested,
                    window_id,
                } if window_id == self.window.id() => {
                    if let Err(e) = self.update_and_render() {
                        log::error!("Fatal frame error: {}", e);
                        target.exit();
                    }
                }
                Event::WindowEvent {
                    event: WindowEvent::KeyboardInput { event, .. },
                    window_id,
                } if window_id == self.window.id() => {
                    self.handle_keyboard_input(event);
                }
                Event::WindowEvent { event, window_id } if window_id == self.window.id() => {
                    self.handle_pointer(event);
                }
                _ => {}
            }
        })?;
        Ok(())
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        let surface_caps = self.surface.get_capabilities(&self.adapter);

        self.surface.configure(
            &self.device,
            &wgpu::SurfaceConfiguration {
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                format: self.surface_format,
                width: new_size.width,
                height: new_size.height,
                present_mode: surface_caps.present_modes[0],
                alpha_mode: surface_caps.alpha_modes[0],
                view_formats: vec![],
                desired_maximum_frame_latency: 2,
            },
        );
        self.depth_view = create_depth_view(&self.device, new_size.width, new_size.height);
        self.sim.camera.set_aspect(new_size.width, new_size.height);
    }

    fn handle_keyboard_input(&mut self, event: KeyEvent) {
        if event.state != ElementState::Pressed {
            return;
        }
        let PhysicalKey::Code(keycode) = event.physical_key else {
            return;
        };
        let sim = &mut self.sim;
        match keycode {
            KeyCode::ArrowRight => sim.next_phase(),
            KeyCode::ArrowLeft => sim.prev_phase(),
            KeyCode::Space => sim.set_auto_advance(!sim.auto_advance()),
            KeyCode::KeyC => sim.set_manual_camera(!sim.camera.is_manual()),
            KeyCode::ArrowUp => sim.set_rain_intensity(sim.rain_intensity() + RAIN_STEP),
            KeyCode::ArrowDown => sim.set_rain_intensity(sim.rain_intensity() - RAIN_STEP),
            KeyCode::PageUp => sim.set_time_of_day(sim.time_of_day() + TIME_OF_DAY_STEP),
            KeyCode::PageDown => sim.set_time_of_day(sim.time_of_day() - TIME_OF_DAY_STEP),
            KeyCode::KeyW => sim.set_camera_height(sim.camera.height() + HEIGHT_STEP),
            KeyCode::KeyS => sim.set_camera_height(sim.camera.height() - HEIGHT_STEP),
            KeyCode::KeyQ => sim.set_camera_distance(sim.camera.distance() - DISTANCE_STEP),
            KeyCode::KeyE => sim.set_camera_distance(sim.camera.distance() + DISTANCE_STEP),
            _ => {}
        }
    }

    fn handle_pointer(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.pointer.dragging = state == ElementState::Pressed;
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let (true, Some(last)) = (self.pointer.dragging, self.pointer.last_x) {
                    self.sim.drag((position.x - last) as f32);
                }
                self.pointer.last_x = Some(position.x);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let dy = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y * WHEEL_LINE,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32,
                };
                // Scrolling up moves the camera in.
                self.sim.wheel(-dy);
            }
            _ => {}
        }
    }

    /// Run the pending simulation steps, then compose and draw one frame.
    /// Only an out-of-memory surface is fatal; other frame errors skip the frame.
    fn update_and_render(&mut self) -> Result<(), FrameError> {
        for _ in 0..self.pacer.frame() {
            self.sim.update();
        }

        let telemetry = self.sim.telemetry().to_string();
        if telemetry != self.title {
            self.window.set_title(&telemetry);
            self.title = telemetry;
        }

        let list = self.compositor.compose(&self.scene, &self.sim);
        match list.validate().and_then(|()| self.render(&list)) {
            Ok(()) => Ok(()),
            Err(FrameError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                log::warn!("Surface lost, reconfiguring");
                self.resize(self.window.inner_size());
                Ok(())
            }
            Err(e @ FrameError::Surface(wgpu::SurfaceError::OutOfMemory)) => Err(e),
            Err(e) => {
                log::error!("Skipping frame: {}", e);
                Ok(())
            }
        }
    }

    fn render(&mut self, list: &DrawList) -> Result<(), FrameError> {
        let frame = self.surface.get_current_texture()?;
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let seconds = self.sim.frame() as f32 / 60.0;
        self.queue.write_buffer(
            &self.globals_buffer,
            0,
            bytemuck::cast_slice(&[Globals::from_list(list, seconds)]),
        );

        let instances: Vec<Instance> = list
            .solids
            .iter()
            .map(Instance::solid)
            .chain(list.lines.iter().map(Instance::line))
            .collect();
        self.ensure_instance_capacity(instances.len() as u64);
        self.queue
            .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));

        // Haze is the last layer, so it is a suffix of the solids.
        let split = list.solids.partition_point(|d| d.layer < Layer::Haze);
        let (opaque, haze) = list.solids.split_at(split);
        let solid_batches = batches(opaque.iter().map(|d| shape_index(d.shape)), 0);
        let haze_batches = batches(haze.iter().map(|d| shape_index(d.shape)), split as u32);
        let line_batches = batches(
            list.lines.iter().map(|d| outline_index(d.outline)),
            list.solids.len() as u32,
        );

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let clear = list.clear;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("City Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear.x as f64,
                            g: clear.y as f64,
                            b: clear.z as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(0, &self.globals_bind_group, &[]);
            render_pass.set_bind_group(1, &self.texture_bind_group, &[]);
            render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));

            render_pass.set_pipeline(&self.solid_pipeline);
            for batch in &solid_batches {
                draw_batch(&mut render_pass, &self.shapes[batch.mesh], batch);
            }
            render_pass.set_pipeline(&self.line_pipeline);
            for batch in &line_batches {
                draw_batch(&mut render_pass, &self.outlines[batch.mesh], batch);
            }
            render_pass.set_pipeline(&self.haze_pipeline);
            for batch in &haze_batches {
                draw_batch(&mut render_pass, &self.shapes[batch.mesh], batch);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn ensure_instance_capacity(&mut self, needed: u64) {
        if needed <= self.instance_capacity {
            return;
        }
        let capacity = needed.next_power_of_two();
        log::debug!("Growing instance buffer to {}", capacity);
        self.instance_buffer = create_instance_buffer(&self.device, capacity);
        self.instance_capacity = capacity;
    }
}

fn draw_batch<'a>(pass: &mut wgpu::RenderPass<'a>, mesh: &'a Mesh, batch: &Batch) {
    pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
    pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
    pass.draw_indexed(0..mesh.num_indices, 0, batch.instances.clone());
}

#[allow(clippy::too_many_arguments)]
fn create_pipeline(
    label: &str,
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    fragment_entry: &str,
    topology: wgpu::PrimitiveTopology,
    blend: wgpu::BlendState,
    depth_write_enabled: bool,
) -> RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: "vs_main",
            buffers: &[Vertex::layout(), Instance::layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: fragment_entry,
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // Sky sphere is seen from inside and cones are open-sided.
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width,
            height,
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

fn create_instance_buffer(device: &wgpu::Device, capacity: u64) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Instance Buffer"),
        size: capacity * std::mem::size_of::<Instance>() as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Every slot becomes one layer of a single array texture; empty slots are white.
fn upload_textures(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    assets: &Assets,
) -> wgpu::BindGroup {
    let size = assets.size().max(1);
    let extent = wgpu::Extent3d {
        width: size,
        height: size,
        depth_or_array_layers: SLOT_COUNT as u32,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Surface Maps"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let blank = vec![255u8; (size * size * 4) as usize];
    for slot in TextureSlot::ALL {
        let pixels = assets
            .get(slot)
            .filter(|image| image.dimensions() == (size, size))
            .map_or(blank.as_slice(), |image| image.as_raw().as_slice());
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: slot.layer(),
                },
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * size),
                rows_per_image: Some(size),
            },
            wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
        );
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        dimension: Some(wgpu::TextureViewDimension::D2Array),
        ..Default::default()
    });
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Surface Sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Texture Bind Group"),
        layout,
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
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    #[test]
    fn batches_merge_runs_without_reordering() {
        let got = batches([0, 0, 2, 2, 2, 0].into_iter(), 10);
        assert_eq!(
            got,
            vec![
                Batch { mesh: 0, instances: 10..12 },
                Batch { mesh: 2, instances: 12..15 },
                Batch { mesh: 0, instances: 15..16 },
            ]
        );
        assert!(batches(std::iter::empty(), 0).is_empty());
    }

    #[test]
    fn untextured_solid_marks_no_layer() {
        let draw = SolidDraw {
            layer: crate::draw::Layer::Buildings,
            shape: Shape::Cube,
            model: Mat4::IDENTITY,
            color: Vec3::ONE.extend(1.0),
            surface: crate::draw::SurfaceParams::UNLIT,
            texture: None,
            uv_scale: 2.0,
        };
        assert_eq!(Instance::solid(&draw).extra, [1.0, -1.0, 2.0, 0.0]);
        let roof = SolidDraw {
            texture: Some(TextureSlot::Roof),
            ..draw
        };
        assert_eq!(Instance::solid(&roof).extra[1], TextureSlot::Roof.layer() as f32);
    }

    #[test]
    fn globals_carry_lights_and_fog() {
        let mut list = DrawList::new(Vec3::splat(0.2), Mat4::IDENTITY, Vec3::new(0.0, 10.0, 0.0));
        list.lighting.directional = Some((Vec3::ONE, Vec3::NEG_Y));
        list.fog = Some(crate::draw::Fog {
            color: Vec3::ONE,
            density: 0.001,
        });
        let g = Globals::from_list(&list, 2.0);
        assert_eq!(g.sun_color[3], 1.0);
        assert_eq!(g.fog[3], 0.001);
        assert_eq!(g.eye, [0.0, 10.0, 0.0, 2.0]);
        assert_eq!(g.counts[0], 0.0);
        assert_eq!(std::mem::size_of::<Globals>() % 16, 0);
    }
}
