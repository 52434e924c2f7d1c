//! Records and executes one deferred frame against an offscreen backbuffer.
//!
//! Run with `RUST_LOG=debug cargo run --example headless` to watch the
//! target, program, and frame setup go by.

use glam::{Mat4, Vec3};
use glod::prelude::*;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const BACKBUFFER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn main() {
    env_logger::init();

    // ── Device ──────────────────────────────────────────────────────────
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .expect("no suitable GPU adapter");
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("glod headless device".into()),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        ..Default::default()
    }))
    .expect("failed to create GPU device");

    let capacity = LightCapacity::default();
    let mut gpu = GpuDevice::new(device, queue, capacity);

    // ── Programs ────────────────────────────────────────────────────────
    let attributes = VertexAttributes {
        normal: true,
        ..Default::default()
    };
    let geometry = gpu
        .create_program(&geometry_program(&attributes, false))
        .expect("geometry program");
    let lighting = gpu
        .create_program(&lighting_program(&capacity))
        .expect("lighting program");
    let post_process = gpu
        .create_program(&post_process_program(BACKBUFFER_FORMAT))
        .expect("post-process program");

    // ── Pipeline and scene ──────────────────────────────────────────────
    let pipeline = DeferredPipeline::new(
        &mut gpu,
        PipelinePrograms {
            lighting,
            post_process,
        },
        WIDTH,
        HEIGHT,
        capacity,
    )
    .expect("pipeline setup");

    let triangle = gpu.create_geometry(&GeometryData::Mesh {
        vertices: vec![
            vertex([-1.0, -1.0, 0.0]),
            vertex([1.0, -1.0, 0.0]),
            vertex([0.0, 1.0, 0.0]),
        ],
        indices: None,
    });
    let drawables = [Drawable {
        geometry: triangle,
        draw: GeometryDraw::NonIndexed(3),
        program: geometry,
        material: Material {
            base_color_factor: glam::Vec4::new(0.8, 0.3, 0.2, 1.0),
            roughness_factor: 0.6,
            metallic_factor: 0.0,
            ..Default::default()
        },
        attributes,
        flat_shading: false,
        world: Mat4::IDENTITY,
    }];

    let sun = [DirectionalLight {
        color: Vec3::ONE,
        intensity: 3.0,
        entity: 1,
        ..Default::default()
    }];
    let entity_transforms = [
        Mat4::IDENTITY,
        // The sun entity, tilted to light the triangle from above.
        Mat4::from_rotation_x(-0.9),
    ];

    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::Y);
    let projection =
        Mat4::perspective_rh(60f32.to_radians(), WIDTH as f32 / HEIGHT as f32, 0.1, 100.0);

    // ── One frame ───────────────────────────────────────────────────────
    let commands = pipeline
        .record_frame(&FrameInput {
            view,
            projection,
            drawables: &drawables,
            point_lights: &[],
            spot_lights: &[],
            directional_lights: &sun,
            entity_transforms: &entity_transforms,
            exposure: 1.2,
        })
        .expect("frame records");
    log::info!("recorded {} commands", commands.len());

    let backbuffer = gpu.create_backbuffer(WIDTH, HEIGHT, BACKBUFFER_FORMAT);
    gpu.execute(&commands, &backbuffer);
    log::info!("frame submitted");
}

fn vertex(position: [f32; 3]) -> glod::vertex::MeshVertex {
    glod::vertex::MeshVertex {
        position,
        normal: [0.0, 0.0, 1.0],
        uv: [0.0, 0.0],
    }
}
