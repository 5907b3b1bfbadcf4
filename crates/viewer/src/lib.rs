#![forbid(unsafe_code)]

pub mod camera;
pub mod display;
pub mod headless;
pub mod surface;
#[cfg(feature = "gui")]
pub mod window;

pub use camera::Camera;
pub use display::{DisplayCloud, DisplayList, Viewport};
pub use headless::HeadlessSurface;
pub use surface::{CloudStyle, Surface, ViewportId, ViewportRect};
#[cfg(feature = "gui")]
pub use window::{run_window, WindowOptions, WindowSurface};
