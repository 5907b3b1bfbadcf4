use std::error::Error;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;
use icp_check::config::{DEFAULT_FRAME_INTERVAL, DEFAULT_RESET_PERIOD};
use icp_check::{LiveConfig, Scene, Session};
use pointclouds_viewer::HeadlessSurface;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Watch ICP pull a misaligned copy of a point cloud back onto the original.
#[derive(Parser, Debug)]
#[command(name = "icp-check", version, about)]
struct Cli {
    /// Target point cloud (.pcd, .ply, .las or .laz)
    file: PathBuf,

    /// Independent misaligned cloud; by default the target is misaligned synthetically
    second_file: Option<PathBuf>,

    /// Apply the test misalignment to SECOND_FILE as well
    #[arg(long, requires = "second_file")]
    perturb_second: bool,

    /// Converged compute time, in seconds, before the moving cloud is reset [default: 40]
    #[arg(long, value_name = "SECS", value_parser = parse_secs)]
    reset_period: Option<Duration>,

    /// Render loop interval in milliseconds
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_FRAME_INTERVAL.as_millis() as u64)]
    frame_interval_ms: u64,

    /// Ignore correspondences farther apart than this
    #[arg(long, value_name = "M")]
    max_correspondence_distance: Option<f32>,

    /// Run without a window
    #[arg(long)]
    headless: bool,

    /// Stop a headless run after this many seconds
    #[arg(long, value_name = "SECS", value_parser = parse_secs)]
    duration: Option<Duration>,
}

/// Where the two viewports are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Headless,
    Window,
}

impl Cli {
    fn backend(&self) -> Result<Backend, String> {
        if self.headless {
            Ok(Backend::Headless)
        } else if cfg!(feature = "gui") {
            Ok(Backend::Window)
        } else {
            Err("this build has no window support (feature `gui`); pass --headless".to_owned())
        }
    }

    fn config(&self) -> LiveConfig {
        LiveConfig {
            target_path: self.file.clone(),
            second_path: self.second_file.clone(),
            perturb_second: self.perturb_second,
            reset_period: self.reset_period.unwrap_or(DEFAULT_RESET_PERIOD),
            frame_interval: Duration::from_millis(self.frame_interval_ms),
            max_correspondence_distance: self.max_correspondence_distance.unwrap_or(f32::INFINITY),
        }
    }
}

fn parse_secs(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{e}"))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);
    Registry::default().with(filter).with(fmt_layer).init();
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            ErrorKind::MissingRequiredArgument => {
                eprintln!("Usage: icp-check <FILE> [SECOND_FILE]");
                eprintln!("Provide one point cloud file.");
                process::exit(-1);
            }
            _ => {
                let _ = err.print();
                process::exit(-1);
            }
        },
    };

    init_tracing();

    if let Err(err) = run(&cli) {
        eprintln!("error: {err}");
        process::exit(-1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let backend = cli.backend()?;
    let config = cli.config();
    let scene = Scene::load(&config)?;

    match backend {
        Backend::Headless => run_headless(&scene, &config, cli.duration),
        Backend::Window => {
            if cli.duration.is_some() {
                warn!("--duration only applies to headless runs");
            }
            run_window(scene, &config)
        }
    }
}

fn run_headless(
    scene: &Scene,
    config: &LiveConfig,
    duration: Option<Duration>,
) -> Result<(), Box<dyn Error>> {
    let mut surface = HeadlessSurface::new();
    if let Some(duration) = duration {
        surface = surface.with_lifetime(duration);
    }
    let viewports = scene.configure(&mut surface);

    let session = Session::start(scene, config)?;
    info!("running headless");
    session.render_loop(&viewports, config).run(&mut surface);
    session.finish()?;
    Ok(())
}

#[cfg(feature = "gui")]
fn run_window(scene: Scene, config: &LiveConfig) -> Result<(), Box<dyn Error>> {
    use icp_check::config::{WINDOW_SIZE, WINDOW_TITLE};
    use icp_check::RenderLoop;
    use pointclouds_viewer::{run_window, WindowOptions};
    use std::sync::Arc;

    let session = Session::start(&scene, config)?;
    let context = Arc::clone(session.context());
    let interval = config.frame_interval;
    let options = WindowOptions {
        title: WINDOW_TITLE.to_owned(),
        size: WINDOW_SIZE,
        repaint_interval: interval,
        ..WindowOptions::default()
    };

    let shown = run_window(
        options,
        move |surface| {
            let viewports = scene.configure(surface);
            RenderLoop::new(context, viewports.live, interval)
        },
        |render: &mut RenderLoop, surface| render.cycle(surface),
    );
    let finished = session.finish();
    shown?;
    finished?;
    Ok(())
}

#[cfg(not(feature = "gui"))]
fn run_window(_scene: Scene, _config: &LiveConfig) -> Result<(), Box<dyn Error>> {
    Err("built without the `gui` feature".into())
}

#[cfg(test)]
mod tests {
    use super::{Backend, Cli};
    use clap::{CommandFactory, Parser};
    use icp_check::config::{DEFAULT_FRAME_INTERVAL, DEFAULT_RESET_PERIOD};
    use std::time::Duration;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_reach_config() {
        let cli = Cli::try_parse_from(["icp-check", "scan.pcd"]).unwrap();
        let config = cli.config();
        assert_eq!(config.target_path.to_str(), Some("scan.pcd"));
        assert_eq!(config.reset_period, DEFAULT_RESET_PERIOD);
        assert_eq!(config.frame_interval, DEFAULT_FRAME_INTERVAL);
        assert!(config.max_correspondence_distance.is_infinite());
    }

    #[test]
    fn flags_reach_config() {
        let cli = Cli::try_parse_from([
            "icp-check",
            "a.ply",
            "b.ply",
            "--perturb-second",
            "--reset-period",
            "0.5",
            "--frame-interval-ms",
            "20",
            "--max-correspondence-distance",
            "0.25",
            "--headless",
            "--duration",
            "2",
        ])
        .unwrap();
        let config = cli.config();
        assert!(config.perturb_second);
        assert_eq!(config.reset_period, Duration::from_millis(500));
        assert_eq!(config.frame_interval, Duration::from_millis(20));
        assert_eq!(config.max_correspondence_distance, 0.25);
        assert_eq!(cli.duration, Some(Duration::from_secs(2)));
    }

    #[test]
    fn headless_flag_selects_headless_backend() {
        let cli = Cli::try_parse_from(["icp-check", "scan.pcd", "--headless"]).unwrap();
        assert_eq!(cli.backend(), Ok(Backend::Headless));
    }

    #[cfg(feature = "gui")]
    #[test]
    fn window_is_the_default_backend() {
        let cli = Cli::try_parse_from(["icp-check", "scan.pcd"]).unwrap();
        assert_eq!(cli.backend(), Ok(Backend::Window));
    }

    #[cfg(not(feature = "gui"))]
    #[test]
    fn windowless_build_requires_headless_flag() {
        let cli = Cli::try_parse_from(["icp-check", "scan.pcd"]).unwrap();
        let err = cli.backend().unwrap_err();
        assert!(err.contains("--headless"), "{err}");
    }

    #[test]
    fn perturb_needs_second_file() {
        assert!(Cli::try_parse_from(["icp-check", "a.pcd", "--perturb-second"]).is_err());
    }

    #[test]
    fn negative_period_is_rejected() {
        assert!(Cli::try_parse_from(["icp-check", "a.pcd", "--reset-period", "-1"]).is_err());
    }
}
