/// ASCII rasterizer for terminal rendering
use crossterm::{
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use nalgebra::Vector3;
use std::convert::Infallible;
use std::io::Write;
use turntable_core::lighting::luminance;
use turntable_core::transform::transform_normal;
use turntable_core::{Camera, Lighting, Model, SceneRenderer};

/// Character luminosity ramp for shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// ASCII renderer that converts 3D meshes to terminal characters
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    depth_buffer: Vec<f32>,
    char_buffer: Vec<char>,
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            depth_buffer: vec![f32::INFINITY; size],
            char_buffer: vec![' '; size],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        *self = Self::new(width, height);
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f32::INFINITY);
        self.char_buffer.fill(' ');
    }

    /// Row `y` of the last rendered frame.
    pub fn row(&self, y: usize) -> String {
        self.char_buffer[y * self.width..(y + 1) * self.width]
            .iter()
            .collect()
    }

    fn render_model(&mut self, model: &Model, camera: &Camera, lighting: &Lighting) {
        let (width, height) = (self.width as u32, self.height as u32);

        for item in model.draw_items() {
            let positions = item.positions();
            let normals = item.normals();
            let [red, green, blue, _] = item.primitive.base_color;
            let base_color = Vector3::new(red, green, blue);

            for [a, b, c] in item.primitive.triangles() {
                let mut screen = [(0.0, 0.0, 0.0); 3];
                let mut visible = true;
                for (slot, &index) in screen.iter_mut().zip(&[a, b, c]) {
                    match camera.project_to_screen(&positions[index], &item.transform, width, height)
                    {
                        Some(coords) => *slot = coords,
                        None => visible = false,
                    }
                }
                if !visible {
                    continue; // Triangle is clipped
                }

                let normal = transform_normal(&item.transform, &(normals[a] + normals[b] + normals[c]));
                let shaded = lighting.shade_display(&normal, &base_color);
                let character = ramp_character(luminance(&shaded));

                self.rasterize_triangle(&screen, character);
            }
        }
    }

    fn rasterize_triangle(&mut self, coords: &[(f32, f32, f32); 3], character: char) {
        let [v0, v1, v2] = *coords;

        // Bounding box
        let min_x = v0.0.min(v1.0).min(v2.0).floor() as i32;
        let max_x = v0.0.max(v1.0).max(v2.0).ceil() as i32;
        let min_y = v0.1.min(v1.1).min(v2.1).floor() as i32;
        let max_y = v0.1.max(v1.1).max(v2.1).ceil() as i32;

        // Clip to screen bounds
        let min_x = min_x.max(0);
        let max_x = max_x.min(self.width as i32 - 1);
        let min_y = min_y.max(0);
        let max_y = max_y.min(self.height as i32 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;

                let Some((w0, w1, w2)) =
                    barycentric((v0.0, v0.1), (v1.0, v1.1), (v2.0, v2.1), (px, py))
                else {
                    continue;
                };
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let depth = w0 * v0.2 + w1 * v1.2 + w2 * v2.2;
                let idx = y as usize * self.width + x as usize;
                if depth < self.depth_buffer[idx] {
                    self.depth_buffer[idx] = depth;
                    self.char_buffer[idx] = character;
                }
            }
        }
    }

    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for y in 0..self.height {
            for x in 0..self.width {
                let c = self.char_buffer[y * self.width + x];

                // Color based on character intensity
                let color = match c {
                    ' ' | '.' | ':' => Color::DarkGrey,
                    '-' | '=' => Color::Grey,
                    '+' | '*' => Color::White,
                    '#' | '%' | '@' => Color::Cyan,
                    _ => Color::White,
                };

                writer.queue(SetForegroundColor(color))?;
                writer.queue(Print(c))?;
            }
            if y + 1 < self.height {
                writer.queue(Print("\r\n"))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

impl SceneRenderer for AsciiRenderer {
    type Error = Infallible;

    fn render(
        &mut self,
        model: Option<&Model>,
        camera: &Camera,
        lighting: &Lighting,
    ) -> Result<(), Infallible> {
        self.clear();
        if let Some(model) = model {
            self.render_model(model, camera, lighting);
        }
        Ok(())
    }
}

/// Map a display luminance in 0..1 to a ramp character. Covered cells never
/// map to blank.
fn ramp_character(luminance: f32) -> char {
    let steps = (LUMINOSITY_RAMP.len() - 1) as f32;
    let index = (luminance.clamp(0.0, 1.0) * steps).round() as usize;
    LUMINOSITY_RAMP[index.clamp(1, LUMINOSITY_RAMP.len() - 1)]
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}
