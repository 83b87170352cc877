//! Renders a synthetic volume without a window and saves it as PNG.
//!
//! Usage: `cargo run --example render_synthetic [output.png]`

use voxcast::{
    ColorMapRegistry, ColormapDescriptor, OpacityModel, Options, UVec3, Vec3, VolumeDescriptor,
};

fn main() {
    env_logger::init();
    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "voxcast_synthetic.png".to_string());

    // Two overlapping blobs in a non-cubic grid
    let volume = VolumeDescriptor::from_fn("blobs", UVec3::new(128, 96, 64), |p| {
        let a = (-(p - Vec3::new(0.35, 0.5, 0.5)).length_squared() * 40.0).exp();
        let b = (-(p - Vec3::new(0.65, 0.5, 0.5)).length_squared() * 60.0).exp();
        (a + b).min(1.0)
    });

    let registry = ColorMapRegistry::new();
    let colormap = ColormapDescriptor::from_color_map(
        registry.get("coolwarm").expect("built-in colormap"),
        256,
    );

    let options = Options {
        opacity_model: OpacityModel::ScalarRamp,
        opacity_scale: 0.5,
        initial_sampling_rate: 2.0,
        ..Options::default()
    };

    match voxcast::render_to_file(&output, &volume, &colormap, options, 800, 600) {
        Ok(()) => println!("wrote {output}"),
        Err(e) => eprintln!("render failed: {e}"),
    }
}
