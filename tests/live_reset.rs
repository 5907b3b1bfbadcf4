//! Compute and render loops driven together on one thread so every
//! interleaving is deterministic.

use std::sync::Arc;
use std::time::Duration;

use icp_check::color::MOVING_COLOR;
use icp_check::scene::MOVING_ID;
use icp_check::{
    test_misalignment, ConcurrencyCoordinator, LiveConfig, LiveContext, RenderLoop, Scene,
    SharedSceneBuffer, Tick,
};
use pointclouds_core::PointCloud;
use pointclouds_registration::apply_transform;
use pointclouds_viewer::{HeadlessSurface, Surface};

fn wavy_patch() -> PointCloud {
    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut z = Vec::new();
    for i in 0..12 {
        for j in 0..12 {
            let u = i as f32 * 0.1 + j as f32 * 0.001;
            let v = j as f32 * 0.1 + i as f32 * 0.0013;
            x.push(u);
            y.push(v);
            z.push((u * 3.0).sin() * 0.2 + (v * 2.0).cos() * 0.1);
        }
    }
    PointCloud::from_xyz(x, y, z)
}

fn shown_moving(surface: &HeadlessSurface, scene_viewport: pointclouds_viewer::ViewportId) -> Vec<[f32; 3]> {
    surface
        .display()
        .viewport(scene_viewport)
        .and_then(|vp| vp.cloud(MOVING_ID))
        .map(|c| c.positions.clone())
        .unwrap_or_default()
}

#[test]
fn moving_cloud_returns_to_misaligned_pose() {
    let target = wavy_patch();
    let misaligned = apply_transform(&target, &test_misalignment());
    let scene = Scene::from_clouds(target, misaligned.clone());
    let misaligned_positions: Vec<[f32; 3]> = misaligned.iter_points().collect();

    let mut config = LiveConfig::new("unused.pcd");
    config.reset_period = Duration::from_millis(20);

    let context = Arc::new(LiveContext::new(SharedSceneBuffer::new(
        misaligned,
        scene.moving_mode.style(MOVING_COLOR),
    )));
    let mut surface = HeadlessSurface::new();
    let viewports = scene.configure(&mut surface);
    let mut coordinator = ConcurrencyCoordinator::new(Arc::clone(&context), &scene, &config);
    let mut render = RenderLoop::new(Arc::clone(&context), viewports.live, Duration::ZERO);

    assert!(render.cycle(&mut surface));
    assert_eq!(shown_moving(&surface, viewports.live), misaligned_positions);

    let mut saw_progress = false;
    let mut resets = 0;
    for _ in 0..100_000 {
        let tick = coordinator.tick().unwrap();
        assert!(render.cycle(&mut surface));
        let shown = shown_moving(&surface, viewports.live);
        match tick {
            Tick::Published { .. } => {
                assert_ne!(shown, misaligned_positions);
                saw_progress = true;
            }
            Tick::Reset { resets: n } => {
                assert_eq!(shown, misaligned_positions);
                assert_eq!(coordinator.cycle().elapsed(), Duration::ZERO);
                resets = n;
                if saw_progress {
                    break;
                }
            }
            Tick::Retry | Tick::Stopped => {}
        }
    }
    assert!(resets >= 1, "no reset within the step budget");
    assert!(saw_progress, "no converged step was published before a reset");
    assert!(context.buffer.resets() >= 1);
}

#[test]
fn published_fitness_does_not_grow_between_resets() {
    let target = wavy_patch();
    let misaligned = apply_transform(&target, &test_misalignment());
    let scene = Scene::from_clouds(target, misaligned.clone());
    let mut config = LiveConfig::new("unused.pcd");
    config.reset_period = Duration::from_secs(3600);

    let context = Arc::new(LiveContext::new(SharedSceneBuffer::new(
        misaligned,
        scene.moving_mode.style(MOVING_COLOR),
    )));
    let mut coordinator = ConcurrencyCoordinator::new(Arc::clone(&context), &scene, &config);

    let mut previous = f32::INFINITY;
    for _ in 0..40 {
        let Tick::Published { fitness_score, .. } = coordinator.tick().unwrap() else {
            panic!("expected every pass to converge and publish");
        };
        assert!(fitness_score <= previous + 1e-5);
        previous = fitness_score;
    }
    assert_eq!(context.buffer.with_snapshot(|s| s.fitness_score), previous);
}

#[test]
fn closing_the_surface_stops_both_loops() {
    let target = wavy_patch();
    let misaligned = apply_transform(&target, &test_misalignment());
    let scene = Scene::from_clouds(target, misaligned);
    let mut config = LiveConfig::new("unused.pcd");
    config.reset_period = Duration::from_millis(5);
    config.frame_interval = Duration::from_millis(5);

    let session = icp_check::Session::start(&scene, &config).unwrap();
    let mut surface = HeadlessSurface::new().with_max_polls(20);
    let viewports = scene.configure(&mut surface);
    session.render_loop(&viewports, &config).run(&mut surface);

    assert!(surface.is_closed());
    assert!(session.context().is_closed());
    let summary = session.finish().unwrap();
    assert!(summary.steps > 0);
}
