//! Volume descriptors and the `name_WxHxD_type.raw` naming contract.

use std::fmt;
use std::str::FromStr;

use glam::{UVec3, Vec3};

use crate::error::ParseError;
use crate::march::ScalarField;

/// Storage format of a single voxel in a raw volume file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoxelType {
    /// 8-bit unsigned integer.
    Uint8,
    /// 16-bit unsigned integer, little-endian.
    Uint16,
    /// 32-bit IEEE-754 float, little-endian.
    Float32,
}

impl VoxelType {
    /// Size of one voxel in bytes.
    #[must_use]
    pub fn size_bytes(self) -> usize {
        match self {
            VoxelType::Uint8 => 1,
            VoxelType::Uint16 => 2,
            VoxelType::Float32 => 4,
        }
    }

    /// Name as it appears in filenames.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            VoxelType::Uint8 => "uint8",
            VoxelType::Uint16 => "uint16",
            VoxelType::Float32 => "float32",
        }
    }
}

impl fmt::Display for VoxelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VoxelType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uint8" => Ok(VoxelType::Uint8),
            "uint16" => Ok(VoxelType::Uint16),
            "float32" => Ok(VoxelType::Float32),
            other => Err(ParseError::UnsupportedVoxelType(other.to_string())),
        }
    }
}

/// Shape and storage format of a volume, as encoded in its filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeLayout {
    /// Dataset name (the part before the dimensions).
    pub name: String,
    /// Grid dimensions (width, height, depth).
    pub dims: UVec3,
    /// Per-voxel storage format.
    pub voxel_type: VoxelType,
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn is_dataset_name(s: &str) -> bool {
    !s.starts_with('.') && s.split('.').all(is_word)
}

fn parse_dimension(s: &str, filename: &str) -> Result<u32, ParseError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::MalformedName(filename.to_string()));
    }
    match s.parse::<u32>() {
        Ok(0) | Err(_) => Err(ParseError::MalformedName(filename.to_string())),
        Ok(v) => Ok(v),
    }
}

impl VolumeLayout {
    /// Creates a layout directly.
    pub fn new(name: impl Into<String>, dims: UVec3, voxel_type: VoxelType) -> Self {
        Self {
            name: name.into(),
            dims,
            voxel_type,
        }
    }

    /// Parses `name_<W>x<H>x<D>_<type>` out of a filename or path.
    ///
    /// Directory components and the trailing extension are ignored. The
    /// name may contain underscores and dots.
    pub fn from_filename(filename: &str) -> Result<Self, ParseError> {
        let malformed = || ParseError::MalformedName(filename.to_string());

        let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
        let stem = base.rsplit_once('.').map_or(base, |(stem, _ext)| stem);

        let mut parts = stem.rsplitn(3, '_');
        let (Some(type_part), Some(dims_part), Some(name_part)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        if !is_dataset_name(name_part) || !is_word(type_part) {
            return Err(malformed());
        }

        let dims: Vec<&str> = dims_part.split('x').collect();
        let [w, h, d] = dims.as_slice() else {
            return Err(malformed());
        };
        let dims = UVec3::new(
            parse_dimension(w, filename)?,
            parse_dimension(h, filename)?,
            parse_dimension(d, filename)?,
        );

        let voxel_type = type_part.parse::<VoxelType>()?;
        let layout = Self::new(name_part, dims, voxel_type);
        if layout.checked_byte_len().is_none() {
            return Err(malformed());
        }
        Ok(layout)
    }

    /// Number of voxels in the grid.
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.dims.x as usize * self.dims.y as usize * self.dims.z as usize
    }

    fn checked_byte_len(&self) -> Option<usize> {
        (self.dims.x as usize)
            .checked_mul(self.dims.y as usize)?
            .checked_mul(self.dims.z as usize)?
            .checked_mul(self.voxel_type.size_bytes())
    }

    /// Exact byte length a raw file with this layout must have.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.checked_byte_len().unwrap_or(usize::MAX)
    }

    /// Largest of the three dimensions.
    #[must_use]
    pub fn max_dimension(&self) -> u32 {
        self.dims.max_element()
    }

    /// World-space extent of the volume box relative to the unit cube.
    ///
    /// The longest axis maps to 1.
    #[must_use]
    pub fn volume_scale(&self) -> Vec3 {
        let dims = self.dims.as_vec3();
        dims / dims.max_element().max(1.0)
    }
}

/// A fully loaded volume: layout plus raw voxel bytes.
///
/// Invariant: `bytes.len() == layout.byte_len()`.
#[derive(Debug, Clone)]
pub struct VolumeDescriptor {
    layout: VolumeLayout,
    bytes: Vec<u8>,
    value_range: (f32, f32),
}

impl VolumeDescriptor {
    /// Pairs a layout with its raw bytes, checking the byte count.
    pub fn new(layout: VolumeLayout, bytes: Vec<u8>) -> Result<Self, ParseError> {
        let expected = layout.byte_len();
        if bytes.len() != expected {
            return Err(ParseError::SizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let value_range = match layout.voxel_type {
            VoxelType::Uint8 => (0.0, f32::from(u8::MAX)),
            VoxelType::Uint16 => (0.0, f32::from(u16::MAX)),
            VoxelType::Float32 => float_range(&bytes),
        };

        Ok(Self {
            layout,
            bytes,
            value_range,
        })
    }

    /// Builds an 8-bit volume by evaluating `f` at every voxel center.
    ///
    /// `f` receives the voxel center in normalized `[0, 1]^3` coordinates and
    /// should return a value in `[0, 1]`.
    pub fn from_fn(name: impl Into<String>, dims: UVec3, f: impl Fn(Vec3) -> f32) -> Self {
        let layout = VolumeLayout::new(name, dims, VoxelType::Uint8);
        let size = dims.as_vec3();
        let mut bytes = Vec::with_capacity(layout.voxel_count());
        for z in 0..dims.z {
            for y in 0..dims.y {
                for x in 0..dims.x {
                    let p = (UVec3::new(x, y, z).as_vec3() + 0.5) / size;
                    bytes.push(quantize_unorm8(f(p)));
                }
            }
        }
        Self {
            layout,
            bytes,
            value_range: (0.0, f32::from(u8::MAX)),
        }
    }

    /// The volume's layout.
    #[must_use]
    pub fn layout(&self) -> &VolumeLayout {
        &self.layout
    }

    /// Dataset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.layout.name
    }

    /// Grid dimensions.
    #[must_use]
    pub fn dims(&self) -> UVec3 {
        self.layout.dims
    }

    /// Per-voxel storage format.
    #[must_use]
    pub fn voxel_type(&self) -> VoxelType {
        self.layout.voxel_type
    }

    /// Raw voxel bytes, x fastest, then y, then z.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Range used to normalize voxel values to `[0, 1]`.
    #[must_use]
    pub fn value_range(&self) -> (f32, f32) {
        self.value_range
    }

    fn raw_value(&self, index: usize) -> f32 {
        let size = self.layout.voxel_type.size_bytes();
        let b = &self.bytes[index * size..(index + 1) * size];
        match self.layout.voxel_type {
            VoxelType::Uint8 => f32::from(b[0]),
            VoxelType::Uint16 => f32::from(u16::from_le_bytes([b[0], b[1]])),
            VoxelType::Float32 => f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        }
    }

    /// Voxel value at linear index, normalized to `[0, 1]`.
    #[must_use]
    pub fn normalized_at(&self, index: usize) -> f32 {
        let (min, max) = self.value_range;
        let span = max - min;
        if span <= 0.0 {
            return 0.0;
        }
        ((self.raw_value(index) - min) / span).clamp(0.0, 1.0)
    }

    /// Voxel value at integer coordinates (clamped to the grid), normalized.
    #[must_use]
    pub fn voxel(&self, x: i64, y: i64, z: i64) -> f32 {
        let dims = self.layout.dims;
        let cx = x.clamp(0, i64::from(dims.x) - 1) as usize;
        let cy = y.clamp(0, i64::from(dims.y) - 1) as usize;
        let cz = z.clamp(0, i64::from(dims.z) - 1) as usize;
        let index = cx + dims.x as usize * (cy + dims.y as usize * cz);
        self.normalized_at(index)
    }
}

/// Trilinear sampling with texel centers at `(i + 0.5) / dim` and
/// clamp-to-edge addressing, matching a linear-filtered 3-D texture.
impl ScalarField for VolumeDescriptor {
    fn sample(&self, p: Vec3) -> f32 {
        let dims = self.layout.dims.as_vec3();
        let u = p.clamp(Vec3::ZERO, Vec3::ONE) * dims - 0.5;
        let base = u.floor();
        let frac = u - base;
        let (x0, y0, z0) = (base.x as i64, base.y as i64, base.z as i64);

        let c000 = self.voxel(x0, y0, z0);
        let c100 = self.voxel(x0 + 1, y0, z0);
        let c010 = self.voxel(x0, y0 + 1, z0);
        let c110 = self.voxel(x0 + 1, y0 + 1, z0);
        let c001 = self.voxel(x0, y0, z0 + 1);
        let c101 = self.voxel(x0 + 1, y0, z0 + 1);
        let c011 = self.voxel(x0, y0 + 1, z0 + 1);
        let c111 = self.voxel(x0 + 1, y0 + 1, z0 + 1);

        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
        let c00 = lerp(c000, c100, frac.x);
        let c10 = lerp(c010, c110, frac.x);
        let c01 = lerp(c001, c101, frac.x);
        let c11 = lerp(c011, c111, frac.x);
        let c0 = lerp(c00, c10, frac.y);
        let c1 = lerp(c01, c11, frac.y);
        lerp(c0, c1, frac.z)
    }
}

/// Parses `filename` and pairs it with `bytes`.
///
/// Fails with [`ParseError::MalformedName`] if the name does not match,
/// [`ParseError::UnsupportedVoxelType`] for an unknown type suffix and
/// [`ParseError::SizeMismatch`] if the byte count is wrong.
pub fn parse_descriptor(filename: &str, bytes: Vec<u8>) -> Result<VolumeDescriptor, ParseError> {
    let layout = VolumeLayout::from_filename(filename)?;
    VolumeDescriptor::new(layout, bytes)
}

fn float_range(bytes: &[u8]) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for chunk in bytes.chunks_exact(4) {
        let v = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if v.is_finite() {
            min = min.min(v);
            max = max.max(v);
        }
    }
    if min > max {
        (0.0, 0.0)
    } else {
        (min, max)
    }
}

fn quantize_unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_skull_filename() {
        let layout = VolumeLayout::from_filename("skull_256x256x256_uint8.raw").unwrap();
        assert_eq!(layout.name, "skull");
        assert_eq!(layout.dims, UVec3::new(256, 256, 256));
        assert_eq!(layout.voxel_type, VoxelType::Uint8);
        assert_eq!(layout.byte_len(), 256 * 256 * 256);
    }

    #[test]
    fn test_parse_descriptor_full() {
        let bytes = vec![0u8; 256 * 256 * 256];
        let volume = parse_descriptor("skull_256x256x256_uint8.raw", bytes).unwrap();
        assert_eq!(volume.dims(), UVec3::splat(256));
        assert_eq!(volume.voxel_type(), VoxelType::Uint8);
    }

    #[test]
    fn test_bad_name_is_malformed() {
        assert!(matches!(
            VolumeLayout::from_filename("bad name"),
            Err(ParseError::MalformedName(_))
        ));
        assert!(matches!(
            parse_descriptor("bad name", vec![]),
            Err(ParseError::MalformedName(_))
        ));
    }

    #[test]
    fn test_name_with_underscores_and_directory() {
        let layout = VolumeLayout::from_filename("data/ct/my_head_scan_64x32x16_uint16.raw").unwrap();
        assert_eq!(layout.name, "my_head_scan");
        assert_eq!(layout.dims, UVec3::new(64, 32, 16));
        assert_eq!(layout.voxel_type, VoxelType::Uint16);
        assert_eq!(layout.byte_len(), 64 * 32 * 16 * 2);
    }

    #[test]
    fn test_name_with_dots_keeps_only_extension_off() {
        let layout = VolumeLayout::from_filename("scans/my.scan_2x2x2_uint8.raw").unwrap();
        assert_eq!(layout.name, "my.scan");
        assert_eq!(layout.dims, UVec3::splat(2));

        let bare = VolumeLayout::from_filename("cube_2x2x2_uint8").unwrap();
        assert_eq!(bare.name, "cube");
        assert!(parse_descriptor("my.scan_2x2x2_uint8.raw", vec![0; 8]).is_ok());
    }

    #[test]
    fn test_malformed_variants() {
        for name in [
            "skull_256x256_uint8.raw",
            "skull_256x256x0_uint8.raw",
            "skull_axbxc_uint8.raw",
            "_256x256x256_uint8.raw",
            "skull-1_2x2x2_uint8.raw",
            ".hidden_2x2x2_uint8.raw",
            "a..b_2x2x2_uint8.raw",
            "256x256x256_uint8.raw",
            "skull_2x2x99999999999_uint8.raw",
        ] {
            assert!(
                matches!(VolumeLayout::from_filename(name), Err(ParseError::MalformedName(_))),
                "{name} should be malformed"
            );
        }
    }

    #[test]
    fn test_unknown_voxel_type() {
        assert_eq!(
            VolumeLayout::from_filename("skull_2x2x2_int12.raw"),
            Err(ParseError::UnsupportedVoxelType("int12".to_string()))
        );
    }

    #[test]
    fn test_size_check() {
        let layout = VolumeLayout::new("cube", UVec3::splat(2), VoxelType::Uint8);
        assert_eq!(layout.byte_len(), 8);
        assert!(VolumeDescriptor::new(layout.clone(), vec![0; 8]).is_ok());
        assert_eq!(
            VolumeDescriptor::new(layout.clone(), vec![0; 7]).unwrap_err(),
            ParseError::SizeMismatch {
                expected: 8,
                actual: 7
            }
        );
        assert_eq!(
            VolumeDescriptor::new(layout, vec![0; 9]).unwrap_err(),
            ParseError::SizeMismatch {
                expected: 8,
                actual: 9
            }
        );
    }

    #[test]
    fn test_normalization() {
        let layout = VolumeLayout::new("w", UVec3::new(2, 1, 1), VoxelType::Uint16);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&u16::MAX.to_le_bytes());
        let volume = VolumeDescriptor::new(layout, bytes).unwrap();
        assert_eq!(volume.normalized_at(0), 0.0);
        assert_eq!(volume.normalized_at(1), 1.0);

        let layout = VolumeLayout::new("f", UVec3::new(3, 1, 1), VoxelType::Float32);
        let mut bytes = Vec::new();
        for v in [-2.0f32, 0.0, 2.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let volume = VolumeDescriptor::new(layout, bytes).unwrap();
        assert_eq!(volume.value_range(), (-2.0, 2.0));
        assert!((volume.normalized_at(1) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_constant_float_volume_maps_to_zero() {
        let layout = VolumeLayout::new("c", UVec3::new(2, 1, 1), VoxelType::Float32);
        let bytes = [3.0f32, 3.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        let volume = VolumeDescriptor::new(layout, bytes).unwrap();
        assert_eq!(volume.normalized_at(0), 0.0);
    }

    #[test]
    fn test_trilinear_sampling() {
        // Two voxels along x: 0 and 255
        let layout = VolumeLayout::new("ramp", UVec3::new(2, 1, 1), VoxelType::Uint8);
        let volume = VolumeDescriptor::new(layout, vec![0, 255]).unwrap();
        // Texel centers at 0.25 and 0.75
        assert!(volume.sample(Vec3::new(0.25, 0.5, 0.5)).abs() < 1e-6);
        assert!((volume.sample(Vec3::new(0.75, 0.5, 0.5)) - 1.0).abs() < 1e-6);
        assert!((volume.sample(Vec3::new(0.5, 0.5, 0.5)) - 0.5).abs() < 1e-6);
        // Clamp to edge
        assert!(volume.sample(Vec3::new(0.0, 0.5, 0.5)).abs() < 1e-6);
        assert!((volume.sample(Vec3::new(1.0, 0.5, 0.5)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_from_fn_and_volume_scale() {
        let volume = VolumeDescriptor::from_fn("half", UVec3::new(4, 4, 2), |p| p.x);
        assert_eq!(volume.bytes().len(), 32);
        assert_eq!(volume.layout().volume_scale(), Vec3::new(1.0, 1.0, 0.5));
    }

    proptest! {
        #[test]
        fn prop_byte_len_matches_filename(w in 1u32..64, h in 1u32..64, d in 1u32..64, t in 0usize..3) {
            let ty = [VoxelType::Uint8, VoxelType::Uint16, VoxelType::Float32][t];
            let name = format!("vol_{w}x{h}x{d}_{ty}.raw");
            let layout = VolumeLayout::from_filename(&name).unwrap();
            prop_assert_eq!(layout.byte_len(), (w * h * d) as usize * ty.size_bytes());
            let ok = VolumeDescriptor::new(layout.clone(), vec![0; layout.byte_len()]);
            prop_assert!(ok.is_ok());
            let short = VolumeDescriptor::new(layout.clone(), vec![0; layout.byte_len() - 1]);
            let is_size_mismatch = matches!(short, Err(ParseError::SizeMismatch { .. }));
            prop_assert!(is_size_mismatch);
        }
    }
}
