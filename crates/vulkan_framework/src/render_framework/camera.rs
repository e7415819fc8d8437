//! Perspective camera for Vulkan clip space

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};

/// Look-at perspective camera
///
/// Projection maps depth to `[0, 1]` and flips Y so +Y in world space is up on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Eye position
    pub position: Vec3,
    /// Point looked at
    pub target: Vec3,
    /// World up direction
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
    /// Width over height
    pub aspect: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 3.0), Vec3::zeros())
    }
}

impl Camera {
    /// Camera at `position` looking at `target` with a 45° field of view
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            up: Vec3::y(),
            fov_y: std::f32::consts::FRAC_PI_4,
            near: 0.1,
            far: 100.0,
            aspect: 1.0,
        }
    }

    /// Update the aspect ratio, ignoring degenerate values
    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    /// Move the eye, keeping the target
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Orbit around the target on a horizontal circle
    pub fn orbit(&mut self, yaw: f32, distance: f32, height: f32) {
        self.position = self.target + Vec3::new(distance * yaw.sin(), height, distance * yaw.cos());
    }

    /// Fit the camera to view an axis-aligned box from the +Z side
    pub fn frame_bounds(&mut self, min: [f32; 3], max: [f32; 3]) {
        let min = Vec3::from(min);
        let max = Vec3::from(max);
        let center = (min + max) * 0.5;
        let radius = ((max - min).norm() * 0.5).max(1e-3);
        let distance = radius / (self.fov_y * 0.5).sin();

        self.target = center;
        self.position = center + Vec3::new(0.0, radius * 0.3, distance);
        self.near = (distance - radius).max(distance * 0.01);
        self.far = distance + radius * 2.0;
    }

    /// World to view transform
    pub fn view(&self) -> Mat4 {
        Mat4::look_at(self.position, self.target, self.up)
    }

    /// View to clip transform
    pub fn projection(&self) -> Mat4 {
        Mat4::vulkan_projection(self.fov_y, self.aspect, self.near, self.far)
    }

    /// `projection * view`
    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    fn to_ndc(camera: &Camera, p: Vec3) -> Vec3 {
        let clip = camera.view_projection() * Vec4::new(p.x, p.y, p.z, 1.0);
        Vec3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w)
    }

    #[test]
    fn test_target_projects_to_center() {
        let camera = Camera::new(Vec3::new(2.0, 1.0, 4.0), Vec3::new(0.0, 0.5, 0.0));
        let ndc = to_ndc(&camera, camera.target);
        assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_world_up_is_screen_up() {
        let camera = Camera::default();
        let above = to_ndc(&camera, Vec3::new(0.0, 0.5, 0.0));
        assert!(above.y < 0.0, "Vulkan NDC has -Y at the top");
    }

    #[test]
    fn test_aspect_ratio_scales_x() {
        let mut camera = Camera::default();
        let square = to_ndc(&camera, Vec3::new(0.5, 0.0, 0.0)).x;
        camera.set_aspect(2.0);
        let wide = to_ndc(&camera, Vec3::new(0.5, 0.0, 0.0)).x;
        assert_relative_eq!(wide, square / 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_degenerate_aspect_ignored() {
        let mut camera = Camera::default();
        camera.set_aspect(0.0);
        camera.set_aspect(f32::NAN);
        assert_eq!(camera.aspect, 1.0);
    }

    #[test]
    fn test_frame_bounds_keeps_box_in_depth_range() {
        let mut camera = Camera::default();
        camera.frame_bounds([-1.0, -1.0, -1.0], [1.0, 1.0, 1.0]);
        assert_eq!(camera.target, Vec3::zeros());
        for corner in [Vec3::new(-1.0, -1.0, 1.0), Vec3::new(1.0, 1.0, -1.0)] {
            let ndc = to_ndc(&camera, corner);
            assert!(ndc.z >= 0.0 && ndc.z <= 1.0, "{:?}", ndc);
        }
    }

    #[test]
    fn test_orbit_keeps_distance() {
        let mut camera = Camera::default();
        camera.orbit(1.2, 5.0, 0.0);
        assert_relative_eq!((camera.position - camera.target).norm(), 5.0, epsilon = 1e-5);
    }
}
