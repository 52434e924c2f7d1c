//! # Pipeline — The Deferred Pass Orchestrator
//!
//! [`DeferredPipeline`] owns the frame structure: which target each phase
//! writes, which surfaces each phase reads, and in what order draws are
//! issued. Per frame it records:
//!
//! ```text
//! record_frame(input)
//!   │
//!   ├─ Geometry phase ── G-buffer slots 0..=3, clear color+depth
//!   │     per drawable: program, transforms, material factors,
//!   │     conditional texture bindings, draw
//!   │
//!   ├─ Lighting phase ── G-buffer slot 4 (HDR), depth read-only
//!   │     G-buffer slots 0..=3 bound as inputs, packed light arrays,
//!   │     one fullscreen-quad draw
//!   │
//!   └─ Post-process phase ── backbuffer
//!         HDR slot bound as input, exposure tone mapping,
//!         one fullscreen-quad draw
//! ```
//!
//! The G-buffer's spare fifth attachment doubles as the HDR accumulation
//! surface so the lighting pass keeps the geometry pass's depth buffer
//! attached instead of recomputing depth into a second target.
//!
//! Everything long-lived — the G-buffer target and the fullscreen quad —
//! is created once at construction. A failed program build or an invalid
//! target spec surfaces at construction; `record_frame` can only fail on
//! the light-capacity contract.

use glam::{Mat3, Vec2};

use crate::command::{
    Command, DepthAccess, DeviceResources, GeometryDraw, GeometryId, PassDesc, PassOutput,
    ProgramId, TargetId, UniformValue,
};
use crate::drawable::Drawable;
use crate::error::{CapacityError, LightKind, SetupError};
use crate::frame::{FrameRecorder, Phase};
use crate::light::{DirectionalLight, LightBlocks, LightCapacity, PointLight, SpotLight};
use crate::pack;
use crate::target::{TargetSpec, gbuffer};
use crate::vertex::fullscreen_quad;

/// The programs the orchestrator itself draws with. Geometry programs are
/// per-drawable (one variant per attribute set) and live on
/// [`Drawable`](crate::drawable::Drawable).
#[derive(Debug, Clone, Copy)]
pub struct PipelinePrograms {
    pub lighting: ProgramId,
    pub post_process: ProgramId,
}

/// Everything one frame needs, gathered by the caller. Transform and
/// camera math stay outside this crate; lights reference
/// `entity_transforms` by index.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub view: glam::Mat4,
    pub projection: glam::Mat4,
    pub drawables: &'a [Drawable],
    pub point_lights: &'a [PointLight],
    pub spot_lights: &'a [SpotLight],
    pub directional_lights: &'a [DirectionalLight],
    pub entity_transforms: &'a [glam::Mat4],
    /// Exposure for the tone-mapping pass.
    pub exposure: f32,
}

/// The deferred pass orchestrator. See the module docs for the frame
/// structure.
#[derive(Debug)]
pub struct DeferredPipeline {
    gbuffer: TargetId,
    quad: GeometryId,
    quad_draw: GeometryDraw,
    programs: PipelinePrograms,
    capacity: LightCapacity,
    width: u32,
    height: u32,
}

impl DeferredPipeline {
    /// Create the long-lived frame resources: the five-attachment G-buffer
    /// and the fullscreen quad. Fails if the target dimensions are invalid.
    pub fn new(
        resources: &mut dyn DeviceResources,
        programs: PipelinePrograms,
        width: u32,
        height: u32,
        capacity: LightCapacity,
    ) -> Result<Self, SetupError> {
        let gbuffer = resources.create_target(&TargetSpec::gbuffer(width, height))?;

        let (vertices, indices) = fullscreen_quad();
        let quad_data = crate::command::GeometryData::Quad {
            vertices,
            indices: Some(indices),
        };
        let quad_draw = quad_data.draw();
        let quad = resources.create_geometry(&quad_data);

        log::debug!(
            "deferred pipeline ready: {width}x{height} G-buffer, light capacity {capacity:?}"
        );

        Ok(Self {
            gbuffer,
            quad,
            quad_draw,
            programs,
            capacity,
            width,
            height,
        })
    }

    /// The G-buffer target, for callers that want to inspect or debug it.
    pub fn gbuffer_target(&self) -> TargetId {
        self.gbuffer
    }

    /// Record one complete frame as a command stream.
    ///
    /// Light counts are checked against the configured capacity before
    /// anything is packed; an overflow returns [`CapacityError`] and
    /// records nothing.
    pub fn record_frame(&self, input: &FrameInput<'_>) -> Result<Vec<Command>, CapacityError> {
        self.check_capacity(input)?;

        let mut frame = FrameRecorder::new();
        self.record_geometry_phase(&mut frame, input);
        self.record_lighting_phase(&mut frame, input);
        self.record_post_process_phase(&mut frame, input);
        Ok(frame.finish())
    }

    fn check_capacity(&self, input: &FrameInput<'_>) -> Result<(), CapacityError> {
        let checks = [
            (LightKind::Point, input.point_lights.len(), self.capacity.point),
            (LightKind::Spot, input.spot_lights.len(), self.capacity.spot),
            (
                LightKind::Directional,
                input.directional_lights.len(),
                self.capacity.directional,
            ),
        ];
        for (kind, count, capacity) in checks {
            if count > capacity {
                return Err(CapacityError {
                    kind,
                    count,
                    capacity,
                });
            }
        }
        Ok(())
    }

    fn record_geometry_phase(&self, frame: &mut FrameRecorder, input: &FrameInput<'_>) {
        frame.advance_to(Phase::Geometry);
        frame.begin_pass(PassDesc {
            output: PassOutput::Attachments {
                target: self.gbuffer,
                slots: vec![
                    gbuffer::BASE_COLOR,
                    gbuffer::MATERIAL,
                    gbuffer::NORMAL,
                    gbuffer::POSITION,
                ],
            },
            clear_color: Some([0.0, 0.0, 0.0, 1.0]),
            depth: DepthAccess::ClearWrite,
        });

        for drawable in input.drawables {
            frame.set_program(drawable.program);

            frame.set_uniform("world", UniformValue::Mat4(drawable.world));
            frame.set_uniform("view", UniformValue::Mat4(input.view));
            frame.set_uniform("proj", UniformValue::Mat4(input.projection));
            let normal_matrix = Mat3::from_mat4(input.view * drawable.world)
                .inverse()
                .transpose();
            frame.set_uniform("normal_matrix", UniformValue::Mat3(normal_matrix));

            let material = &drawable.material;
            frame.set_uniform(
                "base_color_factor",
                UniformValue::Vec4(material.base_color_factor),
            );
            frame.set_uniform(
                "metallic_factor",
                UniformValue::Float(material.metallic_factor),
            );
            frame.set_uniform(
                "roughness_factor",
                UniformValue::Float(material.roughness_factor),
            );
            frame.set_uniform(
                "occlusion_strength",
                UniformValue::Float(material.occlusion_strength),
            );

            // Texture bindings depend on the texcoord stream existing; a
            // mesh without texture coordinates shades from factors alone.
            if drawable.attributes.texcoord {
                if let Some(texture) = material.base_color_texture {
                    frame.bind_texture(0, texture);
                }
                if let Some(texture) = material.metallic_roughness_texture {
                    frame.bind_texture(1, texture);
                }
                if let Some(texture) = material.normal_texture {
                    frame.bind_texture(2, texture);
                    // Normal perturbation needs tangents to mean anything.
                    if drawable.attributes.tangent {
                        frame.set_uniform(
                            "normal_scale",
                            UniformValue::Float(material.normal_scale),
                        );
                    }
                }
                if let Some(texture) = material.occlusion_texture {
                    frame.bind_texture(3, texture);
                }
            }

            frame.draw(drawable.geometry, drawable.draw);
        }

        frame.end_pass();
    }

    fn record_lighting_phase(&self, frame: &mut FrameRecorder, input: &FrameInput<'_>) {
        frame.advance_to(Phase::Lighting);

        let blocks = LightBlocks {
            point: pack::pack_point(input.point_lights, input.entity_transforms, input.view),
            spot: pack::pack_spot(input.spot_lights, input.entity_transforms, input.view),
            directional: pack::pack_directional(
                input.directional_lights,
                input.entity_transforms,
                input.view,
            ),
        };

        frame.begin_pass(PassDesc {
            output: PassOutput::Attachments {
                target: self.gbuffer,
                slots: vec![gbuffer::HDR],
            },
            clear_color: Some([0.0, 0.0, 0.0, 1.0]),
            depth: DepthAccess::Read,
        });

        frame.set_program(self.programs.lighting);
        for slot in [
            gbuffer::BASE_COLOR,
            gbuffer::MATERIAL,
            gbuffer::NORMAL,
            gbuffer::POSITION,
        ] {
            frame.bind_attachment(slot as u32, self.gbuffer, slot);
        }

        frame.set_uniform(
            "resolution",
            UniformValue::Vec2(Vec2::new(self.width as f32, self.height as f32)),
        );
        frame.set_uniform(
            "point_light_count",
            UniformValue::Uint(blocks.point.len() as u32),
        );
        frame.set_uniform(
            "spot_light_count",
            UniformValue::Uint(blocks.spot.len() as u32),
        );
        frame.set_uniform(
            "directional_light_count",
            UniformValue::Uint(blocks.directional.len() as u32),
        );
        frame.upload_lights(blocks);

        frame.draw(self.quad, self.quad_draw);
        frame.end_pass();
    }

    fn record_post_process_phase(&self, frame: &mut FrameRecorder, input: &FrameInput<'_>) {
        frame.advance_to(Phase::PostProcess);
        frame.begin_pass(PassDesc {
            output: PassOutput::Backbuffer {
                width: self.width,
                height: self.height,
            },
            clear_color: Some([0.0, 0.0, 0.0, 1.0]),
            depth: DepthAccess::Disabled,
        });

        frame.set_program(self.programs.post_process);
        frame.bind_attachment(0, self.gbuffer, gbuffer::HDR);
        frame.set_uniform("exposure", UniformValue::Float(input.exposure));
        frame.draw(self.quad, self.quad_draw);
        frame.end_pass();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::GeometryData;
    use crate::drawable::{Material, VertexAttributes};
    use glam::{Mat4, Vec3};

    /// Hands out handles without a GPU; records what was requested.
    #[derive(Default)]
    struct StubResources {
        targets: Vec<TargetSpec>,
        geometries: Vec<GeometryData>,
    }

    impl DeviceResources for StubResources {
        fn create_target(&mut self, spec: &TargetSpec) -> Result<TargetId, SetupError> {
            spec.validate()?;
            self.targets.push(spec.clone());
            Ok(TargetId(self.targets.len() - 1))
        }

        fn create_geometry(&mut self, data: &GeometryData) -> GeometryId {
            self.geometries.push(data.clone());
            GeometryId(self.geometries.len() - 1)
        }
    }

    fn programs() -> PipelinePrograms {
        PipelinePrograms {
            lighting: ProgramId(100),
            post_process: ProgramId(101),
        }
    }

    fn pipeline(resources: &mut StubResources) -> DeferredPipeline {
        DeferredPipeline::new(resources, programs(), 640, 480, LightCapacity::default())
            .expect("pipeline setup")
    }

    fn one_mesh_one_light_input<'a>(
        drawables: &'a [Drawable],
        dir_lights: &'a [DirectionalLight],
        transforms: &'a [Mat4],
    ) -> FrameInput<'a> {
        FrameInput {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            drawables,
            point_lights: &[],
            spot_lights: &[],
            directional_lights: dir_lights,
            entity_transforms: transforms,
            exposure: 1.0,
        }
    }

    fn test_drawable(geometry: GeometryId) -> Drawable {
        Drawable {
            geometry,
            draw: GeometryDraw::Indexed(6),
            program: ProgramId(0),
            material: Material::default(),
            attributes: VertexAttributes {
                texcoord: false,
                normal: true,
                ..Default::default()
            },
            flat_shading: false,
            world: Mat4::IDENTITY,
        }
    }

    #[test]
    fn construction_creates_gbuffer_and_quad() {
        let mut resources = StubResources::default();
        let _pipeline = pipeline(&mut resources);

        assert_eq!(resources.targets.len(), 1);
        assert_eq!(resources.targets[0].color.len(), gbuffer::ATTACHMENT_COUNT);
        assert_eq!(resources.geometries.len(), 1);
        match &resources.geometries[0] {
            GeometryData::Quad { vertices, indices } => {
                assert_eq!(vertices.len(), 4);
                assert_eq!(indices.as_deref(), Some(&[0, 1, 2, 2, 3, 0][..]));
            }
            other => panic!("expected quad geometry, got {other:?}"),
        }
    }

    #[test]
    fn construction_rejects_zero_dimensions() {
        let mut resources = StubResources::default();
        let result =
            DeferredPipeline::new(&mut resources, programs(), 0, 480, LightCapacity::default());
        assert!(matches!(result, Err(SetupError::ZeroDimensions { .. })));
    }

    #[test]
    fn one_frame_issues_exactly_three_draws_in_order() {
        let mut resources = StubResources::default();
        let pipeline = pipeline(&mut resources);

        let mesh = resources.create_geometry(&GeometryData::Mesh {
            vertices: vec![bytemuck::Zeroable::zeroed(); 4],
            indices: Some(vec![0, 1, 2, 2, 3, 0]),
        });
        let drawables = [test_drawable(mesh)];
        let lights = [DirectionalLight {
            color: Vec3::ONE,
            intensity: 10.0,
            entity: 0,
            ..Default::default()
        }];
        let transforms = [Mat4::IDENTITY];
        let commands = pipeline
            .record_frame(&one_mesh_one_light_input(&drawables, &lights, &transforms))
            .expect("frame records");

        let draws: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                Command::Draw { geometry, draw } => Some((*geometry, *draw)),
                _ => None,
            })
            .collect();
        assert_eq!(
            draws,
            vec![
                (mesh, GeometryDraw::Indexed(6)),            // geometry pass
                (pipeline.quad, GeometryDraw::Indexed(6)),   // lighting quad
                (pipeline.quad, GeometryDraw::Indexed(6)),   // post-process quad
            ]
        );
    }

    #[test]
    fn phases_target_the_expected_attachments() {
        let mut resources = StubResources::default();
        let pipeline = pipeline(&mut resources);
        let commands = pipeline
            .record_frame(&one_mesh_one_light_input(&[], &[], &[]))
            .expect("frame records");

        let passes: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                Command::BeginPass(desc) => Some(desc.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(passes.len(), 3);

        match &passes[0].output {
            PassOutput::Attachments { slots, .. } => assert_eq!(slots, &[0, 1, 2, 3]),
            other => panic!("geometry pass should write the G-buffer, got {other:?}"),
        }
        assert_eq!(passes[0].depth, DepthAccess::ClearWrite);

        match &passes[1].output {
            PassOutput::Attachments { slots, .. } => assert_eq!(slots, &[gbuffer::HDR]),
            other => panic!("lighting pass should write the HDR slot, got {other:?}"),
        }
        // The geometry depth buffer stays attached, read-only.
        assert_eq!(passes[1].depth, DepthAccess::Read);

        assert!(matches!(passes[2].output, PassOutput::Backbuffer { .. }));
        assert_eq!(passes[2].depth, DepthAccess::Disabled);
    }

    #[test]
    fn geometry_writes_complete_before_lighting_reads() {
        let mut resources = StubResources::default();
        let pipeline = pipeline(&mut resources);

        let mesh = resources.create_geometry(&GeometryData::Mesh {
            vertices: vec![bytemuck::Zeroable::zeroed(); 3],
            indices: None,
        });
        let mut drawable = test_drawable(mesh);
        drawable.draw = GeometryDraw::NonIndexed(3);
        let drawables = [drawable];
        let lights = [DirectionalLight::default()];
        let transforms = [Mat4::IDENTITY];
        let commands = pipeline
            .record_frame(&one_mesh_one_light_input(&drawables, &lights, &transforms))
            .expect("frame records");

        let geometry_draw = commands
            .iter()
            .position(|c| matches!(c, Command::Draw { geometry, .. } if *geometry == mesh))
            .expect("geometry draw recorded");
        let first_gbuffer_read = commands
            .iter()
            .position(|c| matches!(c, Command::BindAttachment { .. }))
            .expect("lighting pass reads the G-buffer");
        let geometry_pass_end = commands
            .iter()
            .position(|c| matches!(c, Command::EndPass))
            .expect("geometry pass ends");

        assert!(geometry_draw < geometry_pass_end);
        assert!(geometry_pass_end < first_gbuffer_read);
    }

    #[test]
    fn texture_bindings_are_skipped_without_texcoords() {
        let mut resources = StubResources::default();
        let pipeline = pipeline(&mut resources);

        let mesh = resources.create_geometry(&GeometryData::Mesh {
            vertices: vec![bytemuck::Zeroable::zeroed(); 3],
            indices: None,
        });
        let mut drawable = test_drawable(mesh);
        drawable.material.base_color_texture = Some(crate::command::TextureId(0));
        drawable.material.normal_texture = Some(crate::command::TextureId(1));
        drawable.attributes.texcoord = false;

        let drawables = [drawable];
        let commands = pipeline
            .record_frame(&one_mesh_one_light_input(&drawables, &[], &[]))
            .expect("frame records");

        assert!(
            !commands.iter().any(|c| matches!(c, Command::BindTexture { .. })),
            "no texture stream, no texture bindings"
        );
    }

    #[test]
    fn texture_bindings_use_fixed_slots_with_texcoords() {
        let mut resources = StubResources::default();
        let pipeline = pipeline(&mut resources);

        let mesh = resources.create_geometry(&GeometryData::Mesh {
            vertices: vec![bytemuck::Zeroable::zeroed(); 3],
            indices: None,
        });
        let mut drawable = test_drawable(mesh);
        drawable.attributes.texcoord = true;
        drawable.attributes.tangent = true;
        drawable.material.base_color_texture = Some(crate::command::TextureId(10));
        drawable.material.metallic_roughness_texture = Some(crate::command::TextureId(11));
        drawable.material.normal_texture = Some(crate::command::TextureId(12));
        drawable.material.occlusion_texture = Some(crate::command::TextureId(13));

        let drawables = [drawable];
        let commands = pipeline
            .record_frame(&one_mesh_one_light_input(&drawables, &[], &[]))
            .expect("frame records");

        let bindings: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                Command::BindTexture { slot, texture } => Some((*slot, texture.0)),
                _ => None,
            })
            .collect();
        assert_eq!(bindings, vec![(0, 10), (1, 11), (2, 12), (3, 13)]);
        assert!(commands.iter().any(|c| matches!(
            c,
            Command::SetUniform { name, .. } if name == "normal_scale"
        )));
    }

    #[test]
    fn light_overflow_is_a_capacity_error() {
        let mut resources = StubResources::default();
        let capacity = LightCapacity {
            point: 2,
            spot: 8,
            directional: 4,
        };
        let pipeline =
            DeferredPipeline::new(&mut resources, programs(), 640, 480, capacity).expect("setup");

        let point_lights = vec![PointLight::default(); 3];
        let transforms = [Mat4::IDENTITY];
        let input = FrameInput {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            drawables: &[],
            point_lights: &point_lights,
            spot_lights: &[],
            directional_lights: &[],
            entity_transforms: &transforms,
            exposure: 1.0,
        };
        let err = pipeline.record_frame(&input).unwrap_err();
        assert_eq!(err.kind, LightKind::Point);
        assert_eq!(err.count, 3);
        assert_eq!(err.capacity, 2);
    }

    #[test]
    fn packed_light_counts_match_uploaded_blocks() {
        let mut resources = StubResources::default();
        let pipeline = pipeline(&mut resources);

        let lights = [
            DirectionalLight {
                intensity: 10.0,
                entity: 0,
                ..Default::default()
            },
        ];
        let point_lights = [PointLight::default(), PointLight::default()];
        let transforms = [Mat4::IDENTITY];
        let input = FrameInput {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            drawables: &[],
            point_lights: &point_lights,
            spot_lights: &[],
            directional_lights: &lights,
            entity_transforms: &transforms,
            exposure: 1.0,
        };
        let commands = pipeline.record_frame(&input).expect("frame records");

        let blocks = commands
            .iter()
            .find_map(|c| match c {
                Command::UploadLights(blocks) => Some(blocks),
                _ => None,
            })
            .expect("lights uploaded");
        assert_eq!(blocks.point.len(), 2);
        assert_eq!(blocks.spot.len(), 0);
        assert_eq!(blocks.directional.len(), 1);
    }
}
