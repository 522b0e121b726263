/// Model orientation and node transforms
use nalgebra::{Matrix4, Quaternion, Translation3, UnitQuaternion, Vector3};

/// Euler orientation of the model root (in radians), applied in XYZ order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Orientation {
    /// Pitch, around the horizontal axis.
    pub x: f32,
    /// Yaw, around the vertical axis.
    pub y: f32,
    /// Roll, around the view axis.
    pub z: f32,
}

impl Orientation {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn pitch(&self) -> f32 {
        self.x
    }

    pub fn yaw(&self) -> f32 {
        self.y
    }

    /// Rotate by delta amounts (in radians)
    pub fn rotate(&mut self, dx: f32, dy: f32, dz: f32) {
        self.x += dx;
        self.y += dy;
        self.z += dz;
    }

    /// Rotation matrix Rx * Ry * Rz.
    pub fn matrix(&self) -> Matrix4<f32> {
        let rx = Matrix4::new_rotation(Vector3::new(self.x, 0.0, 0.0));
        let ry = Matrix4::new_rotation(Vector3::new(0.0, self.y, 0.0));
        let rz = Matrix4::new_rotation(Vector3::new(0.0, 0.0, self.z));
        rx * ry * rz
    }
}

/// Local translation / rotation / scale of a scene node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransform {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

impl NodeTransform {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Build from glTF-style arrays; rotation is `[x, y, z, w]`.
    pub fn from_trs(translation: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) -> Self {
        let [x, y, z, w] = rotation;
        Self {
            translation: Vector3::from(translation),
            rotation: UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z)),
            scale: Vector3::from(scale),
        }
    }

    /// T * R * S
    pub fn matrix(&self) -> Matrix4<f32> {
        Translation3::from(self.translation).to_homogeneous()
            * self.rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale)
    }
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Transform a normal by the inverse transpose of the matrix's linear part.
pub fn transform_normal(matrix: &Matrix4<f32>, normal: &Vector3<f32>) -> Vector3<f32> {
    let linear = matrix.fixed_view::<3, 3>(0, 0).into_owned();
    let normal_matrix = linear
        .try_inverse()
        .map(|inverse| inverse.transpose())
        .unwrap_or(linear);
    (normal_matrix * normal)
        .try_normalize(1e-12)
        .unwrap_or_else(Vector3::zeros)
}
