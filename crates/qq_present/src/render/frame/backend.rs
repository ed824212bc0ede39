//! Seams between the frame driver and the outside world
//!
//! The driver never talks to a GPU API or a windowing library directly.
//! It drives a [`PresentBackend`] (GPU timeline plus the swapchain-dependent
//! resource set builder), reads a [`WindowSurface`], and lets a
//! [`FrameHook`] write per-frame data right before submission. The Vulkan
//! backend and GLFW window implement the first two; tests use mocks.

use std::fmt::Debug;
use std::time::Duration;

use super::error::{AcquireOutcome, PresentOutcome, PresentResult};
use super::types::{ImageIndex, SurfaceExtent, SwapchainGeneration};

/// A built swapchain-dependent resource set
pub trait ResourceSet {
    /// Generation this set was built for
    fn generation(&self) -> SwapchainGeneration;

    /// Extent the set was built for
    fn extent(&self) -> SurfaceExtent;

    /// Number of swapchain images (M)
    fn image_count(&self) -> u32;
}

/// GPU timeline operations and the resource set builder
///
/// Fences and semaphores are plain handles owned by the caller: whatever
/// is created here is destroyed exactly once through the matching
/// `destroy_*` call. Acquire and present report out-of-date and suboptimal
/// swapchains as outcomes, not errors.
pub trait PresentBackend {
    /// CPU-observable GPU completion signal
    type Fence: Copy + PartialEq + Debug;
    /// GPU-only ordering signal
    type Semaphore: Copy + PartialEq + Debug;
    /// Swapchain-dependent resource set
    type Resources: ResourceSet;

    /// Create a fence, optionally already signaled
    fn create_fence(&mut self, signaled: bool) -> PresentResult<Self::Fence>;

    /// Destroy a fence created by this backend
    fn destroy_fence(&mut self, fence: Self::Fence);

    /// Create a semaphore
    fn create_semaphore(&mut self) -> PresentResult<Self::Semaphore>;

    /// Destroy a semaphore created by this backend
    fn destroy_semaphore(&mut self, semaphore: Self::Semaphore);

    /// Block until `fence` is signaled; a timeout is `FenceTimeout`
    fn wait_for_fence(&mut self, fence: Self::Fence, timeout_ns: u64) -> PresentResult<()>;

    /// Return `fence` to the unsignaled state
    fn reset_fence(&mut self, fence: Self::Fence) -> PresentResult<()>;

    /// Block until the GPU has finished all submitted work
    fn wait_idle(&mut self) -> PresentResult<()>;

    /// Build a complete resource set for `extent`
    ///
    /// Either returns a fully built set or releases whatever it created
    /// before returning the error.
    fn build_resources(
        &mut self,
        extent: SurfaceExtent,
        generation: SwapchainGeneration,
    ) -> PresentResult<Self::Resources>;

    /// Release a resource set; the GPU must be idle with respect to it
    fn destroy_resources(&mut self, resources: Self::Resources);

    /// Ask for the next presentable image, signaling `signal` when it is ready
    fn acquire_next_image(
        &mut self,
        resources: &Self::Resources,
        signal: Self::Semaphore,
        timeout_ns: u64,
    ) -> PresentResult<AcquireOutcome>;

    /// Submit the prebuilt commands for `image`
    ///
    /// Execution waits on `wait` at color attachment output and signals
    /// `signal` and `fence` when done.
    fn submit(
        &mut self,
        resources: &Self::Resources,
        image: ImageIndex,
        wait: Self::Semaphore,
        signal: Self::Semaphore,
        fence: Self::Fence,
    ) -> PresentResult<()>;

    /// Queue `image` for presentation once `wait` is signaled
    fn present(
        &mut self,
        resources: &Self::Resources,
        image: ImageIndex,
        wait: Self::Semaphore,
    ) -> PresentResult<PresentOutcome>;
}

/// The windowing system as the driver sees it
pub trait WindowSurface {
    /// Current drawable size in pixels
    fn framebuffer_extent(&mut self) -> SurfaceExtent;

    /// Block until at least one window event arrives
    fn wait_events(&mut self);

    /// Whether the window was resized since the last call, clearing the flag
    fn take_resized(&mut self) -> bool;

    /// Whether the window has been asked to close
    fn should_close(&self) -> bool;
}

/// Per-frame context handed to a [`FrameHook`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    /// Logical frame number, counting only presented frames
    pub frame_number: u64,
    /// Frame slot in use (`frame_number mod N`)
    pub slot: usize,
    /// Extent of the current resource set
    pub extent: SurfaceExtent,
    /// Time since the previous `run_frame` call
    pub delta: Duration,
    /// Time since the driver was created
    pub elapsed: Duration,
}

/// Writes per-frame dynamic data before submission
///
/// `before_submit` runs after the image's previous user has finished on the
/// GPU, so the hook may freely overwrite that image's uniform storage.
pub trait FrameHook<R> {
    /// Update data for `image` just before its commands are submitted
    fn before_submit(
        &mut self,
        resources: &mut R,
        image: ImageIndex,
        info: &FrameInfo,
    ) -> PresentResult<()>;

    /// Called once after every rebuild of the resource set
    fn resources_rebuilt(&mut self, _resources: &mut R) -> PresentResult<()> {
        Ok(())
    }
}

/// Hook for static content: submits the prebuilt commands unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFrameUpdate;

impl<R> FrameHook<R> for NoFrameUpdate {
    fn before_submit(
        &mut self,
        _resources: &mut R,
        _image: ImageIndex,
        _info: &FrameInfo,
    ) -> PresentResult<()> {
        Ok(())
    }
}
