//! Per-frame transform for the spinning triangle

use std::f32::consts::{FRAC_PI_4, TAU};

use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix4, Point3, Rotation3, Vector3};
use qq_present::render::backends::vulkan::SwapchainResources;
use qq_present::render::frame::{FrameHook, FrameInfo, ImageIndex, ResourceSet};
use qq_present::PresentResult;

/// Radians per second around the vertical axis
pub const SPIN_RATE: f32 = 1.2;

/// Uniform block read by `spin_vert.vert`
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TransformUniform {
    /// Column-major clip-from-model matrix
    pub mvp: [[f32; 4]; 4],
}

/// Maps nalgebra's GL clip space (y up, z in -1..1) to Vulkan's (y down, z in 0..1)
#[rustfmt::skip]
fn vulkan_clip_correction() -> Matrix4<f32> {
    Matrix4::new(
        1.0,  0.0, 0.0, 0.0,
        0.0, -1.0, 0.0, 0.0,
        0.0,  0.0, 0.5, 0.5,
        0.0,  0.0, 0.0, 1.0,
    )
}

/// Model-view-projection for a triangle rotated by `angle` radians
pub fn transform_at(angle: f32, aspect_ratio: f32) -> TransformUniform {
    let model = Rotation3::from_axis_angle(&Vector3::y_axis(), angle).to_homogeneous();
    let view = Matrix4::look_at_rh(&Point3::new(0.0, 0.0, 2.5), &Point3::origin(), &Vector3::y());
    let projection = Matrix4::new_perspective(aspect_ratio.max(f32::EPSILON), FRAC_PI_4, 0.1, 10.0);

    TransformUniform {
        mvp: (vulkan_clip_correction() * projection * view * model).into(),
    }
}

/// Frame hook that rotates the triangle with wall-clock time
#[derive(Debug, Default)]
pub struct SpinningTriangle {
    angle: f32,
}

impl SpinningTriangle {
    fn advance(&mut self, info: &FrameInfo) {
        self.angle = (self.angle + SPIN_RATE * info.delta.as_secs_f32()) % TAU;
    }
}

impl FrameHook<SwapchainResources> for SpinningTriangle {
    fn before_submit(
        &mut self,
        resources: &mut SwapchainResources,
        image: ImageIndex,
        info: &FrameInfo,
    ) -> PresentResult<()> {
        self.advance(info);
        let uniform = transform_at(self.angle, info.extent.aspect_ratio());
        resources.write_uniform(image, &uniform)
    }

    fn resources_rebuilt(&mut self, resources: &mut SwapchainResources) -> PresentResult<()> {
        log::debug!("Triangle uniforms now target {}", resources.extent());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qq_present::render::backends::vulkan::DEFAULT_UNIFORM_SIZE;
    use qq_present::render::frame::SurfaceExtent;
    use std::time::Duration;

    fn info(delta_ms: u64) -> FrameInfo {
        FrameInfo {
            frame_number: 0,
            slot: 0,
            extent: SurfaceExtent::new(800, 600),
            delta: Duration::from_millis(delta_ms),
            elapsed: Duration::from_millis(delta_ms),
        }
    }

    #[test]
    fn test_uniform_fits_default_buffer() {
        assert_eq!(std::mem::size_of::<TransformUniform>() as u64, DEFAULT_UNIFORM_SIZE);
    }

    #[test]
    fn test_angle_advances_with_delta_and_wraps() {
        let mut spin = SpinningTriangle::default();
        spin.advance(&info(500));
        assert!((spin.angle - SPIN_RATE * 0.5).abs() < 1e-5);

        spin.advance(&info(10_000));
        assert!(spin.angle >= 0.0 && spin.angle < TAU);
    }

    #[test]
    fn test_origin_lands_inside_vulkan_depth_range() {
        let mvp = Matrix4::from(transform_at(0.3, 4.0 / 3.0).mvp);
        let clip = mvp * nalgebra::Vector4::new(0.0, 0.0, 0.0, 1.0);
        let depth = clip.z / clip.w;
        assert!(depth > 0.0 && depth < 1.0, "depth {depth}");
        assert!((clip.x / clip.w).abs() < 1e-5);
    }

    #[test]
    fn test_top_vertex_maps_to_upper_half() {
        let mvp = Matrix4::from(transform_at(0.0, 1.0).mvp);
        let clip = mvp * nalgebra::Vector4::new(0.0, 0.6, 0.0, 1.0);
        // Vulkan's y axis points down
        assert!(clip.y / clip.w < 0.0);
    }
}
