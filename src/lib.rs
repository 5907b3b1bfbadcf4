#![forbid(unsafe_code)]
//! Live visual check of point-to-point ICP.
//!
//! A compute thread refines a deliberately misaligned copy of a cloud one ICP
//! pass at a time and publishes each converged pose; the render thread shows
//! the latest pose next to the target. Every reset period the moving cloud is
//! put back where it started so the convergence can be watched again.

pub mod buffer;
pub mod color;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod render;
pub mod reset;
pub mod scene;
pub mod session;

pub use buffer::{SceneSnapshot, SharedSceneBuffer};
pub use color::{has_real_color, ColorMode};
pub use config::LiveConfig;
pub use context::LiveContext;
pub use coordinator::{ConcurrencyCoordinator, CoordinatorState, RunSummary, Tick};
pub use engine::{AlignmentEngine, AlignmentState, StepOutcome};
pub use error::{AlignError, SetupError};
pub use render::RenderLoop;
pub use reset::ResetCycle;
pub use scene::{test_misalignment, Scene, Viewports};
pub use session::{Session, SessionError};
