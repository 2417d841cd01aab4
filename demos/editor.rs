//! Editor demo: built-in primitives lit by one light of each kind.
//!
//! Usage: `cargo run --example editor [config.toml] [model.obj ...]`
//!
//! Right drag looks around, WASD/QE fly, left click selects (shift adds),
//! F5 reloads shaders from `shader_dir`.

use cgmath::{Point3, Vector3};
use trellis::prelude::*;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1).peekable();
    let config = match args.next_if(|arg| arg.ends_with(".toml")) {
        Some(path) => EditorConfig::load(&path)?,
        None => EditorConfig::default(),
    };
    let resolutions = config.shadows.clone();

    let mut app = EditorApp::new(config)?;
    let scene = app.scene_mut();

    scene.queue_model_load(BUILTIN_PLANE, NodeId::ROOT);
    scene.queue_model_load(BUILTIN_CUBE, NodeId::ROOT);
    scene.queue_model_load(BUILTIN_SPHERE, NodeId::ROOT);
    for path in args {
        scene.queue_model_load(path, NodeId::ROOT);
    }

    scene.add_light(
        Light::directional(Vector3::new(-0.4, -1.0, -0.3), resolutions.directional_resolution)
            .with_color([1.0, 0.96, 0.9]),
    );
    scene.add_light(
        Light::point(Vector3::new(2.0, 2.5, 1.0), 12.0, resolutions.point_resolution)
            .with_color([0.9, 0.6, 0.4]),
    );
    scene.add_light(Light::spot(
        Vector3::new(-3.0, 5.0, 2.0),
        Vector3::new(0.5, -1.0, -0.3),
        20.0,
        18.0,
        28.0,
        resolutions.spot_resolution,
    ));
    scene
        .lights
        .add_probe(ReflectionProbe::new(Vector3::new(0.0, 2.0, 0.0), Vector3::new(8.0, 4.0, 8.0)));
    scene.camera.look_at(Point3::new(0.0, 0.5, 0.0));

    app.run()
}
