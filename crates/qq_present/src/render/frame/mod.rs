//! Frame pacing and swapchain lifecycle
//!
//! Backend-agnostic core of the crate. [`FrameDriver`] owns the
//! [`FrameSyncRing`], the [`ImagesInFlight`] table and the current
//! swapchain-dependent resource set, and drives them through the
//! [`PresentBackend`] and [`WindowSurface`] seams.

mod backend;
mod driver;
mod error;
pub mod selection;
mod sync_ring;
mod types;

#[cfg(test)]
pub(crate) mod tests;

pub use backend::{FrameHook, FrameInfo, NoFrameUpdate, PresentBackend, ResourceSet, WindowSurface};
pub use driver::{FrameDriver, FrameState, FrameStats};
pub use error::{AcquireOutcome, PresentError, PresentOutcome, PresentResult};
pub use sync_ring::{FrameSlot, FrameSyncRing, ImagesInFlight};
pub use types::{ImageIndex, PerImage, SurfaceExtent, SwapchainGeneration};
