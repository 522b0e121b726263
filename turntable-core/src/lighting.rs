//! Scene lights, Lambert shading and tone mapping shared by the renderers.

use nalgebra::{Point3, Vector3};

use crate::config::LightingConfig;

/// Decode a `0xRRGGBB` colour to linear RGB.
pub fn color_from_hex(hex: u32) -> Vector3<f32> {
    let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xFF) as f32 / 255.0);
    Vector3::new(channel(16), channel(8), channel(0))
}

pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub fn linear_to_srgb(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// ACES filmic curve (Narkowicz fit) after exposure, per channel.
pub fn aces_filmic(color: Vector3<f32>, exposure: f32) -> Vector3<f32> {
    color.map(|c| {
        let x = (c * exposure).max(0.0);
        ((x * (2.51 * x + 0.03)) / (x * (2.43 * x + 0.59) + 0.14)).clamp(0.0, 1.0)
    })
}

/// Relative luminance of a linear colour.
pub fn luminance(color: &Vector3<f32>) -> f32 {
    0.2126 * color.x + 0.7152 * color.y + 0.0722 * color.z
}

/// Light from a distant source shining towards the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: Vector3<f32>,
    pub intensity: f32,
    pub position: Point3<f32>,
}

impl DirectionalLight {
    /// Unit vector from the surface towards the light.
    pub fn direction(&self) -> Vector3<f32> {
        self.position
            .coords
            .try_normalize(1e-9)
            .unwrap_or_else(Vector3::y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: Vector3<f32>,
    pub intensity: f32,
}

/// Sky colour from above fading to ground colour from below.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HemisphereLight {
    pub sky: Vector3<f32>,
    pub ground: Vector3<f32>,
    pub intensity: f32,
}

impl HemisphereLight {
    pub fn irradiance(&self, normal: &Vector3<f32>) -> Vector3<f32> {
        let t = 0.5 * normal.y + 0.5;
        self.ground.lerp(&self.sky, t) * self.intensity
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub sun: DirectionalLight,
    pub ambient: AmbientLight,
    pub hemisphere: HemisphereLight,
    pub exposure: f32,
}

impl Lighting {
    pub fn from_config(config: &LightingConfig, exposure: f32) -> Self {
        Self {
            sun: DirectionalLight {
                color: color_from_hex(config.sun_color),
                intensity: config.sun_intensity,
                position: Point3::from(config.sun_position),
            },
            ambient: AmbientLight {
                color: color_from_hex(config.ambient_color),
                intensity: config.ambient_intensity,
            },
            hemisphere: HemisphereLight {
                sky: color_from_hex(config.hemisphere_sky),
                ground: color_from_hex(config.hemisphere_ground),
                intensity: config.hemisphere_intensity,
            },
            exposure,
        }
    }

    /// Linear radiance of a diffuse surface with world-space `normal`.
    pub fn shade(&self, normal: &Vector3<f32>, base_color: &Vector3<f32>) -> Vector3<f32> {
        let n_dot_l = normal.dot(&self.sun.direction()).max(0.0);
        let irradiance = self.sun.color * (self.sun.intensity * n_dot_l)
            + self.ambient.color * self.ambient.intensity
            + self.hemisphere.irradiance(normal);
        base_color.component_mul(&irradiance)
    }

    /// [`Lighting::shade`] followed by tone mapping, in display range 0..1.
    pub fn shade_display(&self, normal: &Vector3<f32>, base_color: &Vector3<f32>) -> Vector3<f32> {
        aces_filmic(self.shade(normal, base_color), self.exposure).map(linear_to_srgb)
    }
}

impl Default for Lighting {
    fn default() -> Self {
        Self::from_config(&LightingConfig::default(), 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_decoding() {
        let white = color_from_hex(0xFFFFFF);
        assert!((white - Vector3::new(1.0, 1.0, 1.0)).norm() < 1e-6);
        let red = color_from_hex(0xFF0000);
        assert!(red.x > 0.99 && red.y == 0.0 && red.z == 0.0);
    }

    #[test]
    fn test_srgb_round_trip_midpoint() {
        let c = 0.5;
        assert!((linear_to_srgb(srgb_to_linear(c)) - c).abs() < 1e-5);
    }

    #[test]
    fn test_lit_side_is_brighter() {
        let lighting = Lighting::default();
        let white = Vector3::new(1.0, 1.0, 1.0);
        let towards = lighting.shade(&lighting.sun.direction(), &white);
        let away = lighting.shade(&-lighting.sun.direction(), &white);
        assert!(luminance(&towards) > luminance(&away));
    }

    #[test]
    fn test_tone_mapping_stays_in_range() {
        let mapped = aces_filmic(Vector3::new(0.0, 1.0, 100.0), 1.0);
        assert_eq!(mapped.x, 0.0);
        assert!(mapped.y > 0.5 && mapped.y < 1.0);
        assert!(mapped.z <= 1.0);
    }
}
