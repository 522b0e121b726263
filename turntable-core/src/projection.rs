/// Camera and projection utilities
use nalgebra::{Matrix4, Point3, Vector3};

use crate::config::CameraConfig;
use crate::geometry::Aabb;

/// Perspective camera looking from `position` at `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_config(&CameraConfig::default(), width, height)
    }

    pub fn from_config(config: &CameraConfig, width: u32, height: u32) -> Self {
        Self {
            position: Point3::from(config.position),
            target: Point3::from(config.target),
            up: Vector3::new(0.0, 1.0, 0.0),
            fov: config.fov_degrees.to_radians(),
            aspect: aspect_ratio(width, height),
            near: config.near,
            far: config.far,
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = aspect_ratio(width, height);
    }

    /// Create the view matrix (camera transformation)
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    /// Create the projection matrix (depth in -1..1)
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_perspective(self.aspect, self.fov, self.near, self.far)
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }

    /// Move the camera back along its current viewing direction until the
    /// box fits the vertical field of view, aiming at the box centre.
    pub fn frame(&mut self, bounds: &Aabb) {
        let center = bounds.center();
        let radius = bounds.radius().max(1e-3);
        let direction = (self.position - self.target)
            .try_normalize(1e-6)
            .unwrap_or_else(|| Vector3::new(0.0, 0.0, 1.0));
        let half_fov = (self.fov * 0.5).min(self.fov * 0.5 * self.aspect.max(1e-3));
        let distance = radius / half_fov.sin().max(1e-3);

        self.target = center;
        self.position = center + direction * distance;
        self.near = (distance - radius).max(distance * 1e-3);
        self.far = distance + radius * 2.0;
    }

    /// Project a 3D point to 2D screen space, returning `(x, y, depth)`.
    /// Points behind the camera or outside the depth range yield `None`;
    /// x/y may fall outside the screen and are clipped by the rasterizer.
    pub fn project_to_screen(
        &self,
        point: &Point3<f32>,
        model_matrix: &Matrix4<f32>,
        width: u32,
        height: u32,
    ) -> Option<(f32, f32, f32)> {
        let mvp = self.view_projection() * model_matrix;
        let clip = mvp * point.to_homogeneous();

        // Behind the camera or on the eye plane
        if clip.w <= 1e-6 {
            return None;
        }

        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        let depth = clip.z / clip.w;

        if !(-1.0..=1.0).contains(&depth) {
            return None;
        }

        let screen_x = (ndc_x + 1.0) * 0.5 * width as f32;
        let screen_y = (1.0 - ndc_y) * 0.5 * height as f32;

        Some((screen_x, screen_y, depth))
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_creation() {
        let camera = Camera::new(800, 600);
        assert!((camera.aspect - 800.0 / 600.0).abs() < 1e-6);
        assert!((camera.fov - 75f32.to_radians()).abs() < 1e-6);
        assert_eq!(camera.position, Point3::new(0.0, 10.0, 20.0));
    }

    #[test]
    fn test_zero_height_viewport_keeps_finite_aspect() {
        let mut camera = Camera::default();
        camera.set_viewport(640, 0);
        assert!(camera.aspect.is_finite());
    }

    #[test]
    fn test_target_projects_to_screen_center() {
        let camera = Camera::new(800, 600);
        let (x, y, depth) = camera
            .project_to_screen(&camera.target, &Matrix4::identity(), 800, 600)
            .unwrap();
        assert!((x - 400.0).abs() < 1e-3);
        assert!((y - 300.0).abs() < 1e-3);
        assert!(depth > -1.0 && depth < 1.0);
    }

    #[test]
    fn test_point_behind_camera_is_clipped() {
        let camera = Camera::new(800, 600);
        let behind = Point3::new(0.0, 10.0, 40.0);
        assert!(camera
            .project_to_screen(&behind, &Matrix4::identity(), 800, 600)
            .is_none());
    }

    #[test]
    fn test_frame_keeps_box_in_view() {
        let mut camera = Camera::new(800, 600);
        let bounds = Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        camera.frame(&bounds);

        assert_eq!(camera.target, Point3::origin());
        for corner in bounds.corners() {
            assert!(camera
                .project_to_screen(&corner, &Matrix4::identity(), 800, 600)
                .is_some());
        }
    }
}
