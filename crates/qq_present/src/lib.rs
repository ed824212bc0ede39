//! # qq presentation controller
//!
//! Frame pacing and swapchain lifecycle management for a real-time Vulkan
//! presentation loop.
//!
//! The crate is split into a backend-agnostic controller and a Vulkan
//! implementation of the collaborators it drives:
//!
//! - [`render::frame`]: the frame synchronization ring, the per-image fence
//!   tracking, and the [`FrameDriver`] state machine that runs
//!   wait → acquire → submit → present and owns the recreation decision.
//! - [`render::backends::vulkan`]: instance/device bring-up, the swapchain
//!   dependent resource set, and a [`VulkanBackend`] implementing
//!   [`PresentBackend`].
//! - [`config`]: serde-backed configuration loaded from TOML or RON.
//! - [`foundation`]: logging setup.
//!
//! ## Example
//!
//! ```rust,no_run
//! use qq_present::config::PresentConfig;
//! use qq_present::render::backends::vulkan::{VulkanBackend, Window};
//! use qq_present::render::frame::{FrameDriver, NoFrameUpdate, WindowSurface};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! qq_present::foundation::logging::init();
//! let config = PresentConfig::default();
//! let mut window = Window::from_config(&config.window)?;
//! let backend = VulkanBackend::new(&mut window, &config)?;
//! let mut driver = FrameDriver::new(backend, window, NoFrameUpdate, &config)?;
//!
//! while !driver.window().should_close() {
//!     driver.window_mut().poll_events();
//!     driver.run_frame()?;
//! }
//! driver.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod foundation;
pub mod render;

pub use render::backends::vulkan::VulkanBackend;
pub use render::frame::{FrameDriver, PresentBackend, PresentError, PresentResult};
