//! Interactive volume viewer.
//!
//! Usage: `cargo run --example volume_viewer [options.json]`
//!
//! Without an options file, two synthetic volumes are written to a temp
//! directory and put in the volume menu. Press V to switch volumes, C to
//! cycle colormaps, drag to orbit, right-drag to pan and scroll to zoom.

use std::path::Path;

use voxcast::{MenuEntry, Options, Result, UVec3, Vec3, VolumeDescriptor};

/// Writes `volume` as `<name>_<W>x<H>x<D>_uint8.raw` into `dir`.
fn write_raw(dir: &Path, volume: &VolumeDescriptor) -> Result<String> {
    let dims = volume.dims();
    let filename = format!("{}_{}x{}x{}_uint8.raw", volume.name(), dims.x, dims.y, dims.z);
    std::fs::write(dir.join(&filename), volume.bytes())?;
    Ok(filename)
}

fn synthetic_options() -> Result<Options> {
    let dir = std::env::temp_dir().join("voxcast_demo");
    std::fs::create_dir_all(&dir)?;

    let sphere = VolumeDescriptor::from_fn("sphere", UVec3::splat(96), |p| {
        let r = (p - Vec3::splat(0.5)).length() * 2.0;
        (1.0 - r).max(0.0) * 0.6
    });
    let shells = VolumeDescriptor::from_fn("shells", UVec3::new(128, 128, 64), |p| {
        let r = (p - Vec3::splat(0.5)).length() * 12.0;
        if r < 6.0 {
            (r.sin() * 0.5 + 0.5).powi(4) * 0.4
        } else {
            0.0
        }
    });

    let mut options = Options {
        data_dir: dir.clone(),
        ..Options::default()
    };
    options
        .volumes
        .push(MenuEntry::new("Sphere", write_raw(&dir, &sphere)?));
    options
        .volumes
        .push(MenuEntry::new("Shells", write_raw(&dir, &shells)?));
    Ok(options)
}

fn main() -> Result<()> {
    let options = match std::env::args().nth(1) {
        Some(path) => Options::load(path)?,
        None => synthetic_options()?,
    };
    voxcast::run(options)
}
