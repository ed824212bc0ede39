//! The frame driver: one call to [`FrameDriver::run_frame`] per frame
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!            v                                              │
//!  Idle ─> Waiting ─> Acquiring ─> Submitting ─> Presenting ┘
//!                        │                          │
//!                        └──────> Recreating <──────┘
//!                                     │
//!                                     └─> Idle
//!
//!  any state ─ shutdown() ─> ShutDown
//! ```
//!
//! An out-of-date swapchain from acquire skips the frame entirely: no
//! fence is reset, no work is submitted and the frame slot does not
//! advance. Out-of-date or suboptimal results from present, a suboptimal
//! acquire, or a window resize all rebuild after the frame has been
//! presented. Every other failure is returned to the caller as fatal.

use std::fmt;
use std::time::Instant;

use super::backend::{FrameHook, FrameInfo, PresentBackend, ResourceSet, WindowSurface};
use super::error::{describe_image, AcquireOutcome, PresentError, PresentOutcome, PresentResult};
use super::sync_ring::{FrameSlot, FrameSyncRing, ImagesInFlight};
use super::types::{ImageIndex, SurfaceExtent, SwapchainGeneration};
use crate::config::PresentConfig;

/// Where the driver is in its per-frame cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Between frames
    Idle,
    /// Blocked on the current slot's fence
    Waiting,
    /// Asking the presentation engine for an image
    Acquiring,
    /// Handing off the image, updating per-frame data, submitting
    Submitting,
    /// Queueing the image for presentation
    Presenting,
    /// Draining the GPU and rebuilding swapchain-dependent resources
    Recreating,
    /// A rebuild failed; only [`FrameDriver::shutdown`] remains
    Failed,
    /// Terminal; every resource has been released
    ShutDown,
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Counters for what the driver has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames completed without a recreation (the logical frame number)
    pub frames_completed: u64,
    /// Images queued for presentation, including suboptimal ones
    pub frames_presented: u64,
    /// Resource set rebuilds after the initial build
    pub recreations: u64,
    /// Acquires that reported an out-of-date swapchain
    pub out_of_date_acquires: u64,
    /// Waits on another slot's fence before reusing an image
    pub image_handoff_waits: u64,
}

/// Drives frames through a [`PresentBackend`] against a [`WindowSurface`]
///
/// Owns the frame sync ring, the per-image fence table and the current
/// swapchain-dependent resource set. Dropping the driver shuts it down.
pub struct FrameDriver<B, W, H>
where
    B: PresentBackend,
    W: WindowSurface,
    H: FrameHook<B::Resources>,
{
    // Declared before the window: the backend's surface must go first
    backend: B,
    window: W,
    hook: H,
    ring: FrameSyncRing<B>,
    images_in_flight: ImagesInFlight<B::Fence>,
    resources: Option<B::Resources>,
    generation: SwapchainGeneration,
    frame_slot: usize,
    fence_timeout_ns: u64,
    state: FrameState,
    stats: FrameStats,
    started: Instant,
    last_frame: Instant,
}

impl<B, W, H> FrameDriver<B, W, H>
where
    B: PresentBackend,
    W: WindowSurface,
    H: FrameHook<B::Resources>,
{
    /// Create the sync ring and build the first resource set
    ///
    /// If the window is minimized this blocks until it has a drawable size.
    pub fn new(
        mut backend: B,
        mut window: W,
        mut hook: H,
        config: &PresentConfig,
    ) -> PresentResult<Self> {
        config
            .validate()
            .map_err(|e| PresentError::InitializationFailed(e.to_string()))?;

        let mut ring = FrameSyncRing::new(&mut backend, config.max_frames_in_flight)?;

        let generation = SwapchainGeneration::initial();
        let built = Self::wait_for_drawable_extent(&mut window)
            .and_then(|extent| backend.build_resources(extent, generation))
            .and_then(|mut resources| match hook.resources_rebuilt(&mut resources) {
                Ok(()) => Ok(resources),
                Err(err) => {
                    backend.destroy_resources(resources);
                    Err(err)
                }
            });

        let resources = match built {
            Ok(resources) => resources,
            Err(err) => {
                ring.destroy(&mut backend);
                return Err(err);
            }
        };

        log::info!(
            "Frame driver ready: {} frames in flight, {} swapchain images at {}",
            ring.len(),
            resources.image_count(),
            resources.extent()
        );

        let mut images_in_flight = ImagesInFlight::new();
        images_in_flight.reset(generation, resources.image_count());

        let now = Instant::now();
        Ok(Self {
            backend,
            window,
            hook,
            ring,
            images_in_flight,
            resources: Some(resources),
            generation,
            frame_slot: 0,
            fence_timeout_ns: config.fence_timeout_ns,
            state: FrameState::Idle,
            stats: FrameStats::default(),
            started: now,
            last_frame: now,
        })
    }

    /// Run one frame: wait, acquire, submit, present, and rebuild if needed
    ///
    /// Out-of-date and suboptimal swapchains are handled here and never
    /// returned. Any error that is returned is fatal; the caller should
    /// stop the loop and call [`Self::shutdown`].
    pub fn run_frame(&mut self) -> PresentResult<()> {
        match self.state {
            FrameState::ShutDown => return Err(PresentError::ShutDown),
            FrameState::Failed => return Err(PresentError::Halted),
            _ => {}
        }

        let result = self.drive_frame();
        if let Err(err) = &result {
            if !err.is_window_closed() {
                log::error!(
                    "Frame {} failed in state {}: {err}",
                    self.stats.frames_completed,
                    self.state
                );
            }
        }
        result
    }

    fn drive_frame(&mut self) -> PresentResult<()> {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame);
        self.last_frame = now;

        if self.resources.is_none() {
            // The previous rebuild was interrupted by a close request
            return self.recreate();
        }

        let slot: FrameSlot<B> = self.ring.slot(self.frame_slot);

        transition(&mut self.state, FrameState::Waiting);
        self.ring
            .acquire_fence_wait(&mut self.backend, self.frame_slot, self.fence_timeout_ns)?;

        transition(&mut self.state, FrameState::Acquiring);
        let resources = self.resources.as_ref().ok_or(PresentError::ShutDown)?;
        let acquired = self
            .backend
            .acquire_next_image(resources, slot.image_available, self.fence_timeout_ns)?;

        let (raw_index, acquire_suboptimal) = match acquired {
            AcquireOutcome::Ready { index, suboptimal } => (index, suboptimal),
            AcquireOutcome::OutOfDate => {
                log::debug!("Acquire reported an out-of-date swapchain");
                self.stats.out_of_date_acquires += 1;
                return self.recreate();
            }
        };
        let image =
            ImageIndex::validate(raw_index, resources.image_count(), resources.generation())?;

        transition(&mut self.state, FrameState::Submitting);
        if let Some(previous) = self.images_in_flight.claim(image, slot.in_flight)? {
            log::trace!("{} still in flight on {previous:?}, waiting", describe_image(image));
            self.stats.image_handoff_waits += 1;
            self.backend.wait_for_fence(previous, self.fence_timeout_ns)?;
        }

        let info = FrameInfo {
            frame_number: self.stats.frames_completed,
            slot: self.frame_slot,
            extent: resources.extent(),
            delta,
            elapsed: now.duration_since(self.started),
        };
        let resources = self.resources.as_mut().ok_or(PresentError::ShutDown)?;
        self.hook.before_submit(resources, image, &info)?;

        self.ring.reset_fence(&mut self.backend, self.frame_slot)?;
        self.backend.submit(
            resources,
            image,
            slot.image_available,
            slot.render_finished,
            slot.in_flight,
        )?;

        transition(&mut self.state, FrameState::Presenting);
        let presented = self.backend.present(resources, image, slot.render_finished)?;
        if presented != PresentOutcome::OutOfDate {
            self.stats.frames_presented += 1;
        }

        let resized = self.window.take_resized();
        if presented.needs_recreation() || acquire_suboptimal || resized {
            log::debug!(
                "Rebuilding after present: outcome {presented:?}, \
                 suboptimal acquire {acquire_suboptimal}, resized {resized}"
            );
            return self.recreate();
        }

        self.frame_slot = (self.frame_slot + 1) % self.ring.len();
        self.stats.frames_completed += 1;
        transition(&mut self.state, FrameState::Idle);
        Ok(())
    }

    /// Drain the GPU and rebuild every swapchain-dependent resource
    ///
    /// The old set is destroyed before the new one is built, so two
    /// generations never coexist. The frame slot does not advance.
    fn recreate(&mut self) -> PresentResult<()> {
        transition(&mut self.state, FrameState::Recreating);

        self.backend.wait_idle()?;
        if let Some(old) = self.resources.take() {
            log::debug!("Destroying swapchain resources {}", old.generation());
            self.backend.destroy_resources(old);
        }

        let extent = Self::wait_for_drawable_extent(&mut self.window)?;

        self.generation = self.generation.next();
        let mut resources = match self.backend.build_resources(extent, self.generation) {
            Ok(resources) => resources,
            Err(err) => {
                transition(&mut self.state, FrameState::Failed);
                return Err(PresentError::RecreationFailed(Box::new(err)));
            }
        };

        self.images_in_flight.reset(self.generation, resources.image_count());
        let rebuilt = self.hook.resources_rebuilt(&mut resources);
        self.resources = Some(resources);
        rebuilt?;

        // A resize that arrived while rebuilding is already reflected
        self.window.take_resized();
        self.stats.recreations += 1;

        log::info!("Swapchain recreated at {extent} ({})", self.generation);
        transition(&mut self.state, FrameState::Idle);
        Ok(())
    }

    /// Read the window size, blocking on window events while it is empty
    fn wait_for_drawable_extent(window: &mut W) -> PresentResult<SurfaceExtent> {
        loop {
            let extent = window.framebuffer_extent();
            if !extent.is_degenerate() {
                return Ok(extent);
            }
            if window.should_close() {
                return Err(PresentError::WindowClosed);
            }
            log::debug!("Surface is {extent}, waiting for window events");
            window.wait_events();
        }
    }

    /// Wait for the GPU, then release the resource set and the sync ring
    ///
    /// Safe to call more than once and from any state; later calls do
    /// nothing. Resources are released even if the idle wait fails, and
    /// that failure is returned afterwards.
    pub fn shutdown(&mut self) -> PresentResult<()> {
        if self.state == FrameState::ShutDown {
            return Ok(());
        }
        log::info!(
            "Shutting down frame driver after {} frames ({} recreations)",
            self.stats.frames_completed,
            self.stats.recreations
        );

        let idle = self.backend.wait_idle();
        if let Some(resources) = self.resources.take() {
            self.backend.destroy_resources(resources);
        }
        self.ring.destroy(&mut self.backend);
        transition(&mut self.state, FrameState::ShutDown);
        idle
    }

    /// Current state
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Counters
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Slot the next frame will use
    pub fn frame_slot(&self) -> usize {
        self.frame_slot
    }

    /// Number of frames in flight (N); zero after shutdown
    pub fn frames_in_flight(&self) -> usize {
        self.ring.len()
    }

    /// Generation of the current (or last attempted) resource set
    pub fn generation(&self) -> SwapchainGeneration {
        self.generation
    }

    /// Current resource set, if one is built
    pub fn resources(&self) -> Option<&B::Resources> {
        self.resources.as_ref()
    }

    /// The backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The window
    pub fn window(&self) -> &W {
        &self.window
    }

    /// The window, mutably (to poll events)
    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    /// The per-frame hook
    pub fn hook(&self) -> &H {
        &self.hook
    }
}

impl<B, W, H> Drop for FrameDriver<B, W, H>
where
    B: PresentBackend,
    W: WindowSurface,
    H: FrameHook<B::Resources>,
{
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!("Frame driver shutdown failed during drop: {err}");
        }
    }
}

fn transition(state: &mut FrameState, next: FrameState) {
    if *state != next {
        log::trace!("Frame state {state} -> {next}");
        *state = next;
    }
}
