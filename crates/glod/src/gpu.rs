//! # Gpu — The wgpu Command Executor
//!
//! [`GpuDevice`] owns every GPU object behind the handles the pipeline deals
//! in, and executes recorded command streams. It is the single place where
//! the crate's bind-target/set-uniform/draw contract meets wgpu's
//! pass/bind-group model.
//!
//! ## Bind Group Plan
//!
//! | Group | Contents                          | Rebind frequency   |
//! |-------|-----------------------------------|--------------------|
//! | 0     | uniform block (dynamic offset)    | per draw (offset)  |
//! | 1     | texture slots + sampler           | per draw           |
//! | 2     | light buffer                      | per lighting pass  |
//!
//! ## Dynamic Uniform Arena
//!
//! Named uniform values persist on a program until overwritten, but wgpu
//! wants immutable buffer contents per draw. Each program keeps a staged
//! CPU copy of its uniform block; at every draw the staged bytes are
//! snapshotted into one large arena buffer at an offset aligned to
//! `min_uniform_buffer_offset_alignment`, and the draw binds group 0 with
//! that dynamic offset.
//!
//! ## Two Sweeps
//!
//! `execute` walks the command stream twice. The first sweep applies
//! uniform writes, snapshots draw state, and creates per-draw texture bind
//! groups; the second encodes the render passes and replays the draws.
//! Buffer writes from the first sweep land before the submitted passes, so
//! ordering is preserved.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::command::{
    Command, DepthAccess, DeviceResources, GeometryData, GeometryDraw, GeometryId, PassDesc,
    PassOutput, ProgramId, TargetId, TextureId, UniformValue,
};
use crate::error::{LinkError, SetupError};
use crate::light::{LightBlocks, LightCapacity};
use crate::shaders::{BlendMode, DepthMode, ProgramSpec, UniformLayout};
use crate::target::{DEPTH_STENCIL_FORMAT, TargetSpec};

const INITIAL_ARENA_SIZE: u64 = 16 * 1024;

struct GpuTarget {
    views: Vec<wgpu::TextureView>,
    samplers: Vec<wgpu::Sampler>,
    depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct GpuGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
}

struct GpuProgram {
    pipeline: wgpu::RenderPipeline,
    layout: UniformLayout,
    /// CPU copy of the uniform block; named writes land here and persist
    /// across draws until overwritten.
    staged: Vec<u8>,
    uniform_bind_group: wgpu::BindGroup,
    uniform_bind_group_layout: wgpu::BindGroupLayout,
    texture_bind_group_layout: wgpu::BindGroupLayout,
    texture_slots: u32,
    uses_lights: bool,
    label: String,
}

struct GpuTexture {
    view: wgpu::TextureView,
}

/// What a texture input slot currently holds, by handle.
#[derive(Clone, Copy)]
enum BoundSlot {
    Attachment { target: usize, attachment: usize },
    Texture(usize),
}

/// Per-draw state captured in the first sweep.
struct DrawPrep {
    uniform_offset: u32,
    texture_bind_group: wgpu::BindGroup,
}

/// The wgpu backend: owns device, queue, and all handle-addressed resources.
pub struct GpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    capacity: LightCapacity,

    targets: Vec<GpuTarget>,
    geometries: Vec<GpuGeometry>,
    programs: Vec<GpuProgram>,
    textures: Vec<GpuTexture>,

    default_texture: wgpu::TextureView,
    default_sampler: wgpu::Sampler,

    light_buffer: wgpu::Buffer,
    light_bind_group_layout: wgpu::BindGroupLayout,
    light_bind_group: wgpu::BindGroup,

    uniform_arena: wgpu::Buffer,
    uniform_arena_size: u64,
}

impl GpuDevice {
    /// Wrap an already-acquired device and queue. The light buffer is sized
    /// from `capacity` once, here; the lighting program must be built with
    /// the same capacity.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, capacity: LightCapacity) -> Self {
        let default_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("default sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // 1x1 white stand-in for unbound texture slots.
        let default_texture = {
            let texture = device.create_texture_with_data(
                &queue,
                &wgpu::TextureDescriptor {
                    label: Some("default white texture"),
                    size: wgpu::Extent3d {
                        width: 1,
                        height: 1,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                &[255, 255, 255, 255],
            );
            texture.create_view(&wgpu::TextureViewDescriptor::default())
        };

        let light_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("light buffer"),
            size: capacity.buffer_size(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let light_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("light layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });
        let light_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("light bind group"),
            layout: &light_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: light_buffer.as_entire_binding(),
            }],
        });

        let uniform_arena = create_arena(&device, INITIAL_ARENA_SIZE);

        Self {
            device,
            queue,
            capacity,
            targets: Vec::new(),
            geometries: Vec::new(),
            programs: Vec::new(),
            textures: Vec::new(),
            default_texture,
            default_sampler,
            light_buffer,
            light_bind_group_layout,
            light_bind_group,
            uniform_arena,
            uniform_arena_size: INITIAL_ARENA_SIZE,
        }
    }

    pub fn capacity(&self) -> LightCapacity {
        self.capacity
    }

    /// Build a shader program. Validation failures are caught with an error
    /// scope and reported as [`LinkError`] instead of being left to the
    /// device's uncaptured-error handler.
    pub fn create_program(&mut self, spec: &ProgramSpec) -> Result<ProgramId, LinkError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&spec.label),
                source: wgpu::ShaderSource::Wgsl(spec.source.as_str().into()),
            });

        let layout = UniformLayout::new(&spec.uniforms);

        let uniform_bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{} uniforms", spec.label)),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: true,
                            min_binding_size: wgpu::BufferSize::new(layout.size() as u64),
                        },
                        count: None,
                    }],
                });

        let mut texture_entries = Vec::with_capacity(spec.texture_slots as usize + 1);
        for slot in 0..spec.texture_slots {
            texture_entries.push(wgpu::BindGroupLayoutEntry {
                binding: slot,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            });
        }
        texture_entries.push(wgpu::BindGroupLayoutEntry {
            binding: spec.texture_slots,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
        let texture_bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{} textures", spec.label)),
                    entries: &texture_entries,
                });

        let mut group_layouts = vec![&uniform_bind_group_layout, &texture_bind_group_layout];
        if spec.uses_lights {
            group_layouts.push(&self.light_bind_group_layout);
        }
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&spec.label),
                bind_group_layouts: &group_layouts,
                push_constant_ranges: &[],
            });

        let blend = match spec.blend {
            BlendMode::Replace => None,
            BlendMode::Additive => Some(wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent::REPLACE,
            }),
        };
        let targets: Vec<_> = spec
            .color_formats
            .iter()
            .map(|&format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let depth_stencil = match spec.depth {
            DepthMode::TestWrite => Some(wgpu::DepthStencilState {
                format: DEPTH_STENCIL_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            DepthMode::ReadOnly => Some(wgpu::DepthStencilState {
                format: DEPTH_STENCIL_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            DepthMode::Disabled => None,
        };

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&spec.label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[spec.vertex.layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &targets,
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: spec.cull_back.then_some(wgpu::Face::Back),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            log::error!("program '{}' failed to build: {error}", spec.label);
            return Err(LinkError {
                label: spec.label.clone(),
                message: error.to_string(),
            });
        }

        let uniform_bind_group = create_uniform_bind_group(
            &self.device,
            &uniform_bind_group_layout,
            &self.uniform_arena,
            layout.size(),
            &spec.label,
        );

        self.programs.push(GpuProgram {
            pipeline,
            staged: vec![0u8; layout.size() as usize],
            layout,
            uniform_bind_group,
            uniform_bind_group_layout,
            texture_bind_group_layout,
            texture_slots: spec.texture_slots,
            uses_lights: spec.uses_lights,
            label: spec.label.clone(),
        });
        log::debug!("built program '{}'", spec.label);
        Ok(ProgramId(self.programs.len() - 1))
    }

    /// Upload an RGBA8 material texture.
    pub fn create_texture(&mut self, label: &str, width: u32, height: u32, rgba: &[u8]) -> TextureId {
        let texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            rgba,
        );
        self.textures.push(GpuTexture {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
        });
        TextureId(self.textures.len() - 1)
    }

    /// Create an offscreen texture usable as the backbuffer for
    /// [`execute`](Self::execute). Windowed callers pass their surface view
    /// instead.
    pub fn create_backbuffer(
        &self,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> wgpu::TextureView {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen backbuffer"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// Execute one recorded frame against the given backbuffer view.
    pub fn execute(&mut self, commands: &[Command], backbuffer: &wgpu::TextureView) {
        let draws = self.prepare_draws(commands);
        self.encode_passes(commands, draws, backbuffer);
    }

    // ── Sweep 1: uniforms, light upload, per-draw snapshots ────────────

    fn prepare_draws(&mut self, commands: &[Command]) -> Vec<DrawPrep> {
        let align = self
            .device
            .limits()
            .min_uniform_buffer_offset_alignment
            .max(1);

        let mut draws = Vec::new();
        let mut arena = Vec::new();
        let mut bound: HashMap<u32, BoundSlot> = HashMap::new();
        let mut current: Option<usize> = None;

        for command in commands {
            match command {
                Command::SetProgram(program) => current = Some(program.0),
                Command::SetUniform { name, value } => {
                    let program = current.expect("uniform set before any program");
                    self.stage_uniform(program, name, value);
                }
                Command::BindAttachment {
                    slot,
                    target,
                    attachment,
                } => {
                    bound.insert(
                        *slot,
                        BoundSlot::Attachment {
                            target: target.0,
                            attachment: *attachment,
                        },
                    );
                }
                Command::BindTexture { slot, texture } => {
                    bound.insert(*slot, BoundSlot::Texture(texture.0));
                }
                Command::UploadLights(blocks) => {
                    let bytes = pack_light_bytes(&self.capacity, blocks);
                    self.queue.write_buffer(&self.light_buffer, 0, &bytes);
                }
                Command::Draw { .. } => {
                    let program_index = current.expect("draw issued before any program");
                    let program = &self.programs[program_index];

                    let offset = (arena.len() as u32).next_multiple_of(align);
                    arena.resize(offset as usize, 0);
                    arena.extend_from_slice(&program.staged);

                    let texture_bind_group = self.create_texture_bind_group(program, &bound);
                    draws.push(DrawPrep {
                        uniform_offset: offset,
                        texture_bind_group,
                    });
                }
                Command::BeginPass(_) | Command::EndPass => {}
            }
        }

        if !arena.is_empty() {
            self.ensure_arena_capacity(arena.len() as u64);
            self.queue.write_buffer(&self.uniform_arena, 0, &arena);
        }
        draws
    }

    fn stage_uniform(&mut self, program_index: usize, name: &str, value: &UniformValue) {
        let program = &mut self.programs[program_index];
        match program.layout.field(name) {
            Some((kind, offset)) if kind == value.kind() => {
                write_value(&mut program.staged, offset, value);
            }
            Some((kind, _)) => {
                log::warn!(
                    "uniform '{name}' on '{}' declared {kind:?}, got {:?}; ignored",
                    program.label,
                    value.kind()
                );
            }
            None => {
                log::warn!("uniform '{name}' not declared by '{}'; ignored", program.label);
            }
        }
    }

    fn create_texture_bind_group(
        &self,
        program: &GpuProgram,
        bound: &HashMap<u32, BoundSlot>,
    ) -> wgpu::BindGroup {
        let mut sampler = &self.default_sampler;
        let mut entries = Vec::with_capacity(program.texture_slots as usize + 1);
        for slot in 0..program.texture_slots {
            let view = match bound.get(&slot) {
                Some(BoundSlot::Attachment { target, attachment }) => {
                    let target = &self.targets[*target];
                    if slot == 0 {
                        sampler = &target.samplers[*attachment];
                    }
                    &target.views[*attachment]
                }
                Some(BoundSlot::Texture(texture)) => &self.textures[*texture].view,
                None => &self.default_texture,
            };
            entries.push(wgpu::BindGroupEntry {
                binding: slot,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: program.texture_slots,
            resource: wgpu::BindingResource::Sampler(sampler),
        });

        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} draw textures", program.label)),
            layout: &program.texture_bind_group_layout,
            entries: &entries,
        })
    }

    fn ensure_arena_capacity(&mut self, needed: u64) {
        if needed <= self.uniform_arena_size {
            return;
        }
        let new_size = needed.next_power_of_two();
        self.uniform_arena = create_arena(&self.device, new_size);
        self.uniform_arena_size = new_size;
        // The arena buffer changed identity; every program's group-0 bind
        // group pointed at the old one.
        for program in &mut self.programs {
            program.uniform_bind_group = create_uniform_bind_group(
                &self.device,
                &program.uniform_bind_group_layout,
                &self.uniform_arena,
                program.layout.size(),
                &program.label,
            );
        }
    }

    // ── Sweep 2: encode render passes ──────────────────────────────────

    fn encode_passes(
        &self,
        commands: &[Command],
        draws: Vec<DrawPrep>,
        backbuffer: &wgpu::TextureView,
    ) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        let mut draw_iter = draws.into_iter();

        let mut index = 0;
        while index < commands.len() {
            if let Command::BeginPass(desc) = &commands[index] {
                index = self.encode_one_pass(&mut encoder, commands, index, desc, &mut draw_iter, backbuffer);
            } else {
                index += 1;
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn encode_one_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        commands: &[Command],
        begin_index: usize,
        desc: &PassDesc,
        draw_iter: &mut std::vec::IntoIter<DrawPrep>,
        backbuffer: &wgpu::TextureView,
    ) -> usize {
        let load = match desc.clear_color {
            Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
            None => wgpu::LoadOp::Load,
        };

        let (color_attachments, depth_view, width, height) = match &desc.output {
            PassOutput::Backbuffer { width, height } => {
                (vec![color_attachment(backbuffer, load)], None, *width, *height)
            }
            PassOutput::Attachments { target, slots } => {
                let target = &self.targets[target.0];
                let attachments = slots
                    .iter()
                    .map(|&slot| color_attachment(&target.views[slot], load))
                    .collect();
                (attachments, Some(&target.depth_view), target.width, target.height)
            }
        };

        let depth_stencil_attachment = match (desc.depth, depth_view) {
            (DepthAccess::Disabled, _) | (_, None) => None,
            (DepthAccess::ClearWrite, Some(view)) => {
                Some(wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0),
                        store: wgpu::StoreOp::Store,
                    }),
                })
            }
            // Attached with no ops on either aspect: wgpu treats the whole
            // surface as read-only for the pass.
            (DepthAccess::Read, Some(view)) => Some(wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: None,
                stencil_ops: None,
            }),
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("recorded pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);

        let mut current: Option<&GpuProgram> = None;
        let mut index = begin_index + 1;
        while index < commands.len() {
            match &commands[index] {
                Command::EndPass => return index + 1,
                Command::SetProgram(program) => {
                    let program = &self.programs[program.0];
                    pass.set_pipeline(&program.pipeline);
                    if program.uses_lights {
                        pass.set_bind_group(2, &self.light_bind_group, &[]);
                    }
                    current = Some(program);
                }
                Command::Draw { geometry, draw } => {
                    let program = current.expect("draw issued before any program");
                    let prep = draw_iter.next().expect("draw prepared in first sweep");

                    pass.set_bind_group(0, &program.uniform_bind_group, &[prep.uniform_offset]);
                    pass.set_bind_group(1, &prep.texture_bind_group, &[]);

                    let geometry = &self.geometries[geometry.0];
                    pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
                    match draw {
                        GeometryDraw::Indexed(count) => {
                            let index_buffer = geometry
                                .index_buffer
                                .as_ref()
                                .expect("indexed draw against geometry without indices");
                            pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                            pass.draw_indexed(0..*count, 0, 0..1);
                        }
                        GeometryDraw::NonIndexed(count) => pass.draw(0..*count, 0..1),
                    }
                }
                // Handled in the first sweep.
                _ => {}
            }
            index += 1;
        }
        index
    }
}

impl DeviceResources for GpuDevice {
    fn create_target(&mut self, spec: &TargetSpec) -> Result<TargetId, SetupError> {
        spec.validate()?;

        let extent = wgpu::Extent3d {
            width: spec.width,
            height: spec.height,
            depth_or_array_layers: 1,
        };
        let mut views = Vec::with_capacity(spec.color.len());
        let mut samplers = Vec::with_capacity(spec.color.len());
        for (index, attachment) in spec.color.iter().enumerate() {
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&format!("target attachment {index}")),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: attachment.format.texture_format(),
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            views.push(texture.create_view(&wgpu::TextureViewDescriptor::default()));
            samplers.push(self.device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(&format!("target attachment {index} sampler")),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                mag_filter: attachment.mag_filter.wgpu_filter(),
                min_filter: attachment.min_filter.wgpu_filter(),
                ..Default::default()
            }));
        }

        let depth_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("target depth/stencil"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_STENCIL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        self.targets.push(GpuTarget {
            views,
            samplers,
            depth_view: depth_texture.create_view(&wgpu::TextureViewDescriptor::default()),
            width: spec.width,
            height: spec.height,
        });
        log::debug!(
            "created {}x{} target with {} color attachments",
            spec.width,
            spec.height,
            spec.color.len()
        );
        Ok(TargetId(self.targets.len() - 1))
    }

    fn create_geometry(&mut self, data: &GeometryData) -> GeometryId {
        let vertex_bytes: &[u8] = match data {
            GeometryData::Mesh { vertices, .. } => bytemuck::cast_slice(vertices),
            GeometryData::Quad { vertices, .. } => bytemuck::cast_slice(vertices),
        };
        let indices = match data {
            GeometryData::Mesh { indices, .. } | GeometryData::Quad { indices, .. } => indices,
        };

        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("geometry vertices"),
                contents: vertex_bytes,
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = indices.as_ref().map(|indices| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("geometry indices"),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                })
        });

        self.geometries.push(GpuGeometry {
            vertex_buffer,
            index_buffer,
        });
        GeometryId(self.geometries.len() - 1)
    }
}

fn color_attachment<'a>(
    view: &'a wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
) -> Option<wgpu::RenderPassColorAttachment<'a>> {
    Some(wgpu::RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        },
        depth_slice: None,
    })
}

fn create_arena(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("uniform arena"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_uniform_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    arena: &wgpu::Buffer,
    block_size: u32,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("{label} uniform bind group")),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: arena,
                offset: 0,
                size: wgpu::BufferSize::new(block_size as u64),
            }),
        }],
    })
}

/// Write one uniform value into a staged block at its layout offset.
/// Mat3 expands from glam's packed columns to the shader's vec4-strided
/// columns; everything else copies straight through.
fn write_value(staged: &mut [u8], offset: u32, value: &UniformValue) {
    let offset = offset as usize;
    match value {
        UniformValue::Float(v) => {
            staged[offset..offset + 4].copy_from_slice(bytemuck::bytes_of(v));
        }
        UniformValue::Int(v) => {
            staged[offset..offset + 4].copy_from_slice(bytemuck::bytes_of(v));
        }
        UniformValue::Uint(v) => {
            staged[offset..offset + 4].copy_from_slice(bytemuck::bytes_of(v));
        }
        UniformValue::Vec2(v) => {
            staged[offset..offset + 8].copy_from_slice(bytemuck::cast_slice(&v.to_array()));
        }
        UniformValue::Vec3(v) => {
            staged[offset..offset + 12].copy_from_slice(bytemuck::cast_slice(&v.to_array()));
        }
        UniformValue::Vec4(v) => {
            staged[offset..offset + 16].copy_from_slice(bytemuck::cast_slice(&v.to_array()));
        }
        UniformValue::Mat3(v) => {
            let columns = v.to_cols_array();
            for column in 0..3 {
                let src = &columns[column * 3..column * 3 + 3];
                let dst = offset + column * 16;
                staged[dst..dst + 12].copy_from_slice(bytemuck::cast_slice(src));
            }
        }
        UniformValue::Mat4(v) => {
            staged[offset..offset + 64]
                .copy_from_slice(bytemuck::cast_slice(&v.to_cols_array()));
        }
    }
}

/// Serialize packed light arrays into the fixed-capacity buffer image:
/// point at 0, spot and directional at their configured offsets. Overlong
/// arrays are clamped so the buffer can never be overrun, whatever the
/// caller did upstream.
fn pack_light_bytes(capacity: &LightCapacity, blocks: &LightBlocks) -> Vec<u8> {
    let mut bytes = vec![0u8; capacity.buffer_size() as usize];
    copy_clamped(
        &mut bytes,
        0,
        bytemuck::cast_slice(&blocks.point),
        capacity.point * std::mem::size_of::<crate::light::GpuPointLight>(),
        "point",
    );
    copy_clamped(
        &mut bytes,
        capacity.spot_offset() as usize,
        bytemuck::cast_slice(&blocks.spot),
        capacity.spot * std::mem::size_of::<crate::light::GpuSpotLight>(),
        "spot",
    );
    copy_clamped(
        &mut bytes,
        capacity.directional_offset() as usize,
        bytemuck::cast_slice(&blocks.directional),
        capacity.directional * std::mem::size_of::<crate::light::GpuDirectionalLight>(),
        "directional",
    );
    bytes
}

fn copy_clamped(dst: &mut [u8], offset: usize, src: &[u8], max_len: usize, kind: &str) {
    let len = src.len().min(max_len);
    if len < src.len() {
        log::warn!("{kind} light data exceeds buffer capacity, clamping");
    }
    dst[offset..offset + len].copy_from_slice(&src[..len]);
}
