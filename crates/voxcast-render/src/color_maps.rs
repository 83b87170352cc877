//! Color maps: built-in gradients and colormaps decoded from images.

use std::collections::HashMap;

use glam::{Vec3, Vec4};
use voxcast_core::{DecodeError, TransferFunction};

/// Name of the colormap used when nothing else is selected.
pub const DEFAULT_COLOR_MAP: &str = "coolwarm";

/// Number of entries a built-in color map is sampled to.
pub const COLOR_MAP_RESOLUTION: u32 = 256;

/// A color gradient defined by evenly spaced control points.
#[derive(Debug, Clone)]
pub struct ColorMap {
    /// Color map name.
    pub name: String,
    /// Color samples (evenly spaced from 0 to 1).
    pub colors: Vec<Vec3>,
}

impl ColorMap {
    /// Creates a new color map.
    pub fn new(name: impl Into<String>, colors: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            colors,
        }
    }

    /// Samples the color map at a given value (0 to 1).
    pub fn sample(&self, t: f32) -> Vec3 {
        let t = t.clamp(0.0, 1.0);

        match self.colors.len() {
            0 => Vec3::ZERO,
            1 => self.colors[0],
            len => {
                let n = len - 1;
                let idx = ((t * n as f32).floor() as usize).min(n - 1);
                let frac = t * n as f32 - idx as f32;
                self.colors[idx].lerp(self.colors[idx + 1], frac)
            }
        }
    }
}

/// Built-in color maps by name.
#[derive(Default)]
pub struct ColorMapRegistry {
    color_maps: HashMap<String, ColorMap>,
}

impl ColorMapRegistry {
    /// Creates a registry holding the built-in color maps.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register_defaults();
        registry
    }

    fn register_defaults(&mut self) {
        self.register(ColorMap::new(
            "viridis",
            vec![
                Vec3::new(0.267, 0.004, 0.329),
                Vec3::new(0.282, 0.140, 0.457),
                Vec3::new(0.253, 0.265, 0.529),
                Vec3::new(0.206, 0.371, 0.553),
                Vec3::new(0.163, 0.471, 0.558),
                Vec3::new(0.127, 0.566, 0.550),
                Vec3::new(0.134, 0.658, 0.517),
                Vec3::new(0.266, 0.749, 0.440),
                Vec3::new(0.477, 0.821, 0.318),
                Vec3::new(0.741, 0.873, 0.150),
                Vec3::new(0.993, 0.906, 0.144),
            ],
        ));

        self.register(ColorMap::new(
            "blues",
            vec![
                Vec3::new(0.969, 0.984, 1.000),
                Vec3::new(0.776, 0.859, 0.937),
                Vec3::new(0.419, 0.682, 0.839),
                Vec3::new(0.129, 0.443, 0.710),
                Vec3::new(0.031, 0.188, 0.420),
            ],
        ));

        self.register(ColorMap::new(
            "reds",
            vec![
                Vec3::new(1.000, 0.961, 0.941),
                Vec3::new(0.988, 0.733, 0.631),
                Vec3::new(0.984, 0.416, 0.290),
                Vec3::new(0.796, 0.094, 0.114),
                Vec3::new(0.404, 0.000, 0.051),
            ],
        ));

        // Diverging blue-white-red, the usual choice for CT density.
        self.register(ColorMap::new(
            "coolwarm",
            vec![
                Vec3::new(0.230, 0.299, 0.754),
                Vec3::new(0.552, 0.690, 0.996),
                Vec3::new(0.866, 0.866, 0.866),
                Vec3::new(0.956, 0.604, 0.486),
                Vec3::new(0.706, 0.016, 0.150),
            ],
        ));

        self.register(ColorMap::new(
            "rainbow",
            vec![
                Vec3::new(0.5, 0.0, 1.0),
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(0.0, 1.0, 1.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
            ],
        ));
    }

    /// Registers a color map, replacing any with the same name.
    pub fn register(&mut self, color_map: ColorMap) {
        self.color_maps.insert(color_map.name.clone(), color_map);
    }

    /// Gets a color map by name.
    pub fn get(&self, name: &str) -> Option<&ColorMap> {
        self.color_maps.get(name)
    }

    /// Returns all color map names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.color_maps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// A 1-D RGBA lookup table ready for upload.
///
/// Texels are 8-bit RGBA, `width` of them, used without color-space conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColormapDescriptor {
    width: u32,
    rgba: Vec<u8>,
}

impl ColormapDescriptor {
    /// Wraps raw RGBA texels. Returns `Empty` for zero width or a byte
    /// count that is not `width * 4`.
    pub fn from_rgba(width: u32, rgba: Vec<u8>) -> Result<Self, DecodeError> {
        if width == 0 || rgba.len() != width as usize * 4 {
            return Err(DecodeError::Empty);
        }
        Ok(Self { width, rgba })
    }

    /// Decodes an encoded image (PNG, JPEG, BMP, ...) into a lookup table.
    ///
    /// Images taller than one row are collapsed to their middle row.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::UnsupportedFormat);
        }
        let format = image::guess_format(bytes).map_err(|_| DecodeError::UnsupportedFormat)?;
        let img = image::load_from_memory_with_format(bytes, format).map_err(|e| match e {
            image::ImageError::Unsupported(_) => DecodeError::UnsupportedFormat,
            other => DecodeError::Corrupt(other.to_string()),
        })?;

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::Empty);
        }

        let row = height / 2;
        let start = (row * width * 4) as usize;
        let end = start + (width * 4) as usize;
        let texels = rgba.as_raw()[start..end].to_vec();
        log::debug!("decoded {width}x{height} colormap image using row {row}");
        Self::from_rgba(width, texels)
    }

    /// Samples a built-in color map into an opaque lookup table.
    #[must_use]
    pub fn from_color_map(color_map: &ColorMap, resolution: u32) -> Self {
        let resolution = resolution.max(2);
        let mut rgba = Vec::with_capacity(resolution as usize * 4);
        for i in 0..resolution {
            let t = i as f32 / (resolution - 1) as f32;
            let c = color_map.sample(t);
            rgba.extend_from_slice(&[
                (c.x.clamp(0.0, 1.0) * 255.0).round() as u8,
                (c.y.clamp(0.0, 1.0) * 255.0).round() as u8,
                (c.z.clamp(0.0, 1.0) * 255.0).round() as u8,
                255,
            ]);
        }
        Self {
            width: resolution,
            rgba,
        }
    }

    /// Number of texels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Raw RGBA texels.
    #[must_use]
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    fn texel(&self, i: usize) -> Vec4 {
        let t = &self.rgba[i * 4..i * 4 + 4];
        Vec4::new(
            f32::from(t[0]),
            f32::from(t[1]),
            f32::from(t[2]),
            f32::from(t[3]),
        ) / 255.0
    }
}

/// Linear filtering with texel centers at `(i + 0.5) / width` and clamped
/// edges, as the GPU sampler does.
impl TransferFunction for ColormapDescriptor {
    fn lookup(&self, t: f32) -> Vec4 {
        let w = self.width as usize;
        let u = t.clamp(0.0, 1.0) * self.width as f32 - 0.5;
        if u <= 0.0 {
            return self.texel(0);
        }
        let i = u.floor() as usize;
        if i + 1 >= w {
            return self.texel(w - 1);
        }
        let frac = u - i as f32;
        self.texel(i).lerp(self.texel(i + 1), frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;

    fn encode_png(width: u32, height: u32, pixel: impl Fn(u32, u32) -> [u8; 4]) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| Rgba(pixel(x, y)));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_sample_endpoints() {
        let registry = ColorMapRegistry::new();
        let map = registry.get("rainbow").unwrap();
        assert_eq!(map.sample(0.0), Vec3::new(0.5, 0.0, 1.0));
        assert_eq!(map.sample(1.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(map.sample(-1.0), map.sample(0.0));
    }

    #[test]
    fn test_registry_has_default() {
        let registry = ColorMapRegistry::new();
        assert!(registry.get(DEFAULT_COLOR_MAP).is_some());
        assert_eq!(
            registry.names(),
            vec!["blues", "coolwarm", "rainbow", "reds", "viridis"]
        );
    }

    #[test]
    fn test_decode_png_single_row() {
        let bytes = encode_png(4, 1, |x, _| [(x * 60) as u8, 0, 0, 255]);
        let colormap = ColormapDescriptor::decode(&bytes).unwrap();
        assert_eq!(colormap.width(), 4);
        assert_eq!(&colormap.rgba()[..4], &[0, 0, 0, 255]);
        assert_eq!(&colormap.rgba()[12..], &[180, 0, 0, 255]);
    }

    #[test]
    fn test_decode_tall_image_uses_middle_row() {
        let bytes = encode_png(2, 5, |_, y| [0, (y * 10) as u8, 0, 255]);
        let colormap = ColormapDescriptor::decode(&bytes).unwrap();
        assert_eq!(colormap.width(), 2);
        assert_eq!(colormap.rgba()[1], 20);
    }

    #[test]
    fn test_decode_garbage_is_unsupported() {
        assert_eq!(
            ColormapDescriptor::decode(b"definitely not an image"),
            Err(DecodeError::UnsupportedFormat)
        );
        assert_eq!(
            ColormapDescriptor::decode(&[]),
            Err(DecodeError::UnsupportedFormat)
        );
    }

    #[test]
    fn test_decode_truncated_png_is_corrupt() {
        let bytes = encode_png(8, 8, |_, _| [1, 2, 3, 255]);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            ColormapDescriptor::decode(truncated),
            Err(DecodeError::Corrupt(_))
        ));
    }

    #[test]
    fn test_from_rgba_rejects_bad_length() {
        assert_eq!(
            ColormapDescriptor::from_rgba(0, vec![]),
            Err(DecodeError::Empty)
        );
        assert_eq!(
            ColormapDescriptor::from_rgba(2, vec![0; 7]),
            Err(DecodeError::Empty)
        );
    }

    #[test]
    fn test_from_color_map_is_opaque() {
        let registry = ColorMapRegistry::new();
        let colormap = ColormapDescriptor::from_color_map(
            registry.get("viridis").unwrap(),
            COLOR_MAP_RESOLUTION,
        );
        assert_eq!(colormap.width(), COLOR_MAP_RESOLUTION);
        assert!(colormap.rgba().chunks_exact(4).all(|t| t[3] == 255));
    }

    #[test]
    fn test_lookup_interpolates_between_centers() {
        let colormap = ColormapDescriptor::from_rgba(2, vec![0, 0, 0, 0, 255, 255, 255, 255]).unwrap();
        assert_eq!(colormap.lookup(0.0), Vec4::ZERO);
        assert_eq!(colormap.lookup(1.0), Vec4::ONE);
        let mid = colormap.lookup(0.5);
        assert!((mid.x - 0.5).abs() < 1e-6);
    }
}
