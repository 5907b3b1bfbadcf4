//! Drive the compute and render loops against an in-memory surface and
//! print how the moving cloud settles.
//!
//! `cargo run --example headless_alignment`

use std::sync::Arc;
use std::time::Duration;

use icp_check::color::MOVING_COLOR;
use icp_check::{
    test_misalignment, ConcurrencyCoordinator, LiveConfig, LiveContext, RenderLoop, Scene,
    SharedSceneBuffer, Tick,
};
use pointclouds_core::PointCloud;
use pointclouds_registration::apply_transform;
use pointclouds_viewer::HeadlessSurface;

fn main() {
    let t: Vec<f32> = (0..400).map(|i| i as f32 * 0.03).collect();
    let target = PointCloud::from_xyz(
        t.iter().map(|t| t.cos() * (0.5 + 0.05 * t)).collect(),
        t.iter().map(|t| t.sin() * 0.5).collect(),
        t.iter().map(|t| (t * 0.7).sin() * 0.1).collect(),
    );
    let misaligned = apply_transform(&target, &test_misalignment());
    let scene = Scene::from_clouds(target, misaligned.clone());
    println!("Target: {} points", scene.target.len());

    let mut config = LiveConfig::new("in-memory");
    config.reset_period = Duration::from_millis(50);

    let context = Arc::new(LiveContext::new(SharedSceneBuffer::new(
        misaligned,
        scene.moving_mode.style(MOVING_COLOR),
    )));
    let mut surface = HeadlessSurface::new();
    let viewports = scene.configure(&mut surface);
    let mut coordinator = ConcurrencyCoordinator::new(Arc::clone(&context), &scene, &config);
    let mut render = RenderLoop::new(Arc::clone(&context), viewports.live, Duration::ZERO);

    for step in 0..10_000 {
        let tick = match coordinator.tick() {
            Ok(tick) => tick,
            Err(err) => {
                eprintln!("alignment failed: {err}");
                return;
            }
        };
        render.cycle(&mut surface);
        match tick {
            Tick::Published { fitness_score, .. } if step % 10 == 0 => {
                println!("step {step:>4}: fitness {fitness_score:.6}");
            }
            Tick::Reset { resets } => {
                println!("step {step:>4}: reset #{resets}, back at the misaligned pose");
                break;
            }
            _ => {}
        }
    }

    let summary = coordinator.summary();
    println!(
        "{} steps, {} converged, {} display updates",
        summary.steps,
        summary.converged_steps,
        surface.display().updates()
    );
}
