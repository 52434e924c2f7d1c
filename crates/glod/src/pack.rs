//! # Pack — Scene Lights to GPU Light Blocks
//!
//! Pure, stateless transforms from editable light records into the
//! fixed-layout arrays the shading pass consumes. Same inputs — records,
//! entity transforms, view matrix — always produce byte-identical output;
//! there is no caching and no shared state between calls.
//!
//! Positions are carried into view space by the full view matrix.
//! Directions are carried by the view's rotation component only (a
//! direction has no position to translate) and re-normalized inside the
//! block constructors so drift can't accumulate across frames.
//!
//! Packing does not enforce the GPU array capacity — output length always
//! equals input length. The orchestrator checks counts against its
//! [`LightCapacity`](crate::light::LightCapacity) before calling in here.

use glam::{Mat3, Mat4, Vec3};

use crate::light::{
    DirectionalLight, GpuDirectionalLight, GpuPointLight, GpuSpotLight, PointLight, SpotLight,
};

/// World-space position of an entity: the translation column of its
/// transform.
fn entity_position(transforms: &[Mat4], entity: usize) -> Vec3 {
    transforms[entity].w_axis.truncate()
}

/// World-space forward axis of an entity: its local −Z, rotated into the
/// world (the glTF light convention).
fn entity_forward(transforms: &[Mat4], entity: usize) -> Vec3 {
    Mat3::from_mat4(transforms[entity]) * Vec3::NEG_Z
}

/// Pack point lights into view-space GPU blocks, preserving input order.
///
/// Each record's position is looked up through its entity index in
/// `transforms`; an out-of-range index is a caller bug and panics.
pub fn pack_point(lights: &[PointLight], transforms: &[Mat4], view: Mat4) -> Vec<GpuPointLight> {
    lights
        .iter()
        .map(|light| {
            let position_vs = view.transform_point3(entity_position(transforms, light.entity));
            GpuPointLight::new(
                light.color,
                position_vs,
                light.range,
                light.intensity,
                light.depth_near,
                light.depth_far,
                light.shadow_bias,
            )
        })
        .collect()
}

/// Pack spot lights into view-space GPU blocks, preserving input order.
pub fn pack_spot(lights: &[SpotLight], transforms: &[Mat4], view: Mat4) -> Vec<GpuSpotLight> {
    let view_rotation = Mat3::from_mat4(view);
    lights
        .iter()
        .map(|light| {
            let position_vs = view.transform_point3(entity_position(transforms, light.entity));
            let direction_vs = view_rotation * entity_forward(transforms, light.entity);
            GpuSpotLight::new(
                light.color,
                position_vs,
                direction_vs,
                light.range,
                light.inner_cutoff_degrees,
                light.outer_cutoff_degrees,
                light.intensity,
            )
        })
        .collect()
}

/// Pack directional lights into view-space GPU blocks, preserving input
/// order.
pub fn pack_directional(
    lights: &[DirectionalLight],
    transforms: &[Mat4],
    view: Mat4,
) -> Vec<GpuDirectionalLight> {
    let view_rotation = Mat3::from_mat4(view);
    lights
        .iter()
        .map(|light| {
            let direction_vs = view_rotation * entity_forward(transforms, light.entity);
            GpuDirectionalLight::new(light.color, direction_vs, light.intensity, light.max_slope_bias)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn view_looking_down_x() -> Mat4 {
        Mat4::look_at_rh(Vec3::ZERO, Vec3::X, Vec3::Y)
    }

    #[test]
    fn point_positions_move_into_view_space() {
        let lights = [PointLight {
            entity: 0,
            ..Default::default()
        }];
        let transforms = [Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0))];
        let packed = pack_point(&lights, &transforms, view_looking_down_x());
        // Camera at origin looking down +X: a light 5 ahead lands at z = -5.
        let pos = Vec3::from_array(packed[0].position_vs);
        assert!(pos.abs_diff_eq(Vec3::new(0.0, 0.0, -5.0), 1e-5), "got {pos}");
    }

    #[test]
    fn directions_are_rotated_not_translated() {
        let lights = [DirectionalLight {
            entity: 0,
            ..Default::default()
        }];
        // Large translation must not leak into the packed direction.
        let transforms = [Mat4::from_rotation_translation(
            Quat::IDENTITY,
            Vec3::new(1000.0, -500.0, 250.0),
        )];
        let view = Mat4::from_translation(Vec3::new(0.0, 10.0, 0.0)).inverse();
        let packed = pack_directional(&lights, &transforms, view);
        let dir = Vec3::from_array(packed[0].direction_vs);
        assert!(dir.abs_diff_eq(Vec3::NEG_Z, 1e-5), "got {dir}");
    }

    #[test]
    fn packed_directions_are_unit_length() {
        let lights = [SpotLight {
            entity: 0,
            ..Default::default()
        }];
        // Non-uniform-looking transform with rotation; direction still unit.
        let transforms = [Mat4::from_quat(Quat::from_rotation_y(1.1))];
        let view = Mat4::look_at_rh(Vec3::new(3.0, 4.0, 5.0), Vec3::ZERO, Vec3::Y);
        let packed = pack_spot(&lights, &transforms, view);
        let len = Vec3::from_array(packed[0].direction_vs).length();
        assert!((len - 1.0).abs() < 1e-5, "direction length = {len}");
    }

    #[test]
    fn packing_is_deterministic() {
        let lights = [
            SpotLight {
                entity: 0,
                intensity: 3.0,
                ..Default::default()
            },
            SpotLight {
                entity: 1,
                outer_cutoff_degrees: 60.0,
                ..Default::default()
            },
        ];
        let transforms = [
            Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            Mat4::from_quat(Quat::from_rotation_x(0.7)),
        ];
        let view = Mat4::look_at_rh(Vec3::new(0.0, 2.0, 8.0), Vec3::ZERO, Vec3::Y);

        let a = pack_spot(&lights, &transforms, view);
        let b = pack_spot(&lights, &transforms, view);
        assert_eq!(
            bytemuck::cast_slice::<_, u8>(&a),
            bytemuck::cast_slice::<_, u8>(&b)
        );
    }

    #[test]
    fn output_preserves_input_order_and_length() {
        let lights: Vec<PointLight> = (0..5)
            .map(|i| PointLight {
                entity: i,
                intensity: i as f32,
                ..Default::default()
            })
            .collect();
        let transforms: Vec<Mat4> = (0..5)
            .map(|i| Mat4::from_translation(Vec3::splat(i as f32)))
            .collect();
        let packed = pack_point(&lights, &transforms, Mat4::IDENTITY);
        assert_eq!(packed.len(), lights.len());
        for (i, block) in packed.iter().enumerate() {
            assert_eq!(block.intensity, i as f32);
        }
    }
}
