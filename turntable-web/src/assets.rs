//! URL resolution and skybox image decoding for the browser front-end.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("failed to decode {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: image::ImageError,
    },

    #[error("skybox face {face} is not square ({width}x{height})")]
    NotSquare { face: usize, width: u32, height: u32 },

    #[error("skybox face {face} is {size}px wide, expected {expected}px")]
    FaceSizeMismatch { face: usize, size: u32, expected: u32 },
}

/// Resolve a URI found inside a document at `base` (e.g. a glTF buffer).
/// Absolute paths, schemes and `data:` URIs are returned unchanged.
pub fn resolve_url(base: &str, relative: &str) -> String {
    if relative.starts_with('/') || relative.starts_with("data:") || relative.contains("://") {
        return relative.to_string();
    }
    match base.rfind('/') {
        Some(slash) => format!("{}{}", &base[..=slash], relative),
        None => relative.to_string(),
    }
}

/// A decoded RGBA8 image.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

pub fn decode_image(url: &str, bytes: &[u8]) -> Result<RgbaImage, AssetError> {
    let image = image::load_from_memory(bytes)
        .map_err(|source| AssetError::Decode {
            url: url.to_string(),
            source,
        })?
        .to_rgba8();
    let (width, height) = image.dimensions();
    Ok(RgbaImage {
        width,
        height,
        pixels: image.into_raw(),
    })
}

/// Six square faces of equal size in +X, -X, +Y, -Y, +Z, -Z order.
#[derive(Debug, Clone)]
pub struct CubeFaces {
    size: u32,
    faces: [RgbaImage; 6],
}

impl CubeFaces {
    pub fn new(faces: [RgbaImage; 6]) -> Result<Self, AssetError> {
        let expected = faces[0].width;
        for (face, image) in faces.iter().enumerate() {
            if image.width != image.height {
                return Err(AssetError::NotSquare {
                    face,
                    width: image.width,
                    height: image.height,
                });
            }
            if image.width != expected {
                return Err(AssetError::FaceSizeMismatch {
                    face,
                    size: image.width,
                    expected,
                });
            }
        }
        Ok(Self {
            size: expected,
            faces,
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn faces(&self) -> &[RgbaImage; 6] {
        &self.faces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn face(size: u32) -> RgbaImage {
        RgbaImage {
            width: size,
            height: size,
            pixels: vec![0; (size * size * 4) as usize],
        }
    }

    #[test]
    fn test_resolve_relative_to_document() {
        assert_eq!(
            resolve_url("/rabbit_squat/scene.gltf", "scene.bin"),
            "/rabbit_squat/scene.bin"
        );
        assert_eq!(
            resolve_url("https://cdn.test/a/b.gltf", "tex/c.bin"),
            "https://cdn.test/a/tex/c.bin"
        );
        assert_eq!(resolve_url("scene.gltf", "scene.bin"), "scene.bin");
    }

    #[test]
    fn test_absolute_urls_are_kept() {
        assert_eq!(resolve_url("/a/scene.gltf", "/b/x.bin"), "/b/x.bin");
        assert_eq!(
            resolve_url("/a/scene.gltf", "https://x.test/y.bin"),
            "https://x.test/y.bin"
        );
    }

    #[test]
    fn test_decode_png() {
        let image = decode_image("face.png", &png(2, 3)).unwrap();
        assert_eq!((image.width, image.height), (2, 3));
        assert_eq!(&image.pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_decode_garbage_names_the_url() {
        let err = decode_image("/skybox/bad.jpg", b"nope").unwrap_err();
        assert!(err.to_string().contains("/skybox/bad.jpg"));
    }

    #[test]
    fn test_cube_faces_validate_sizes() {
        let cube = CubeFaces::new(std::array::from_fn(|_| face(4))).unwrap();
        assert_eq!(cube.size(), 4);

        let mut faces: [RgbaImage; 6] = std::array::from_fn(|_| face(4));
        faces[3] = face(8);
        assert!(matches!(
            CubeFaces::new(faces),
            Err(AssetError::FaceSizeMismatch { face: 3, .. })
        ));

        let mut faces: [RgbaImage; 6] = std::array::from_fn(|_| face(4));
        faces[1].height = 2;
        assert!(matches!(
            CubeFaces::new(faces),
            Err(AssetError::NotSquare { face: 1, .. })
        ));
    }
}
