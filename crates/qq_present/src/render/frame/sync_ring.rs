//! Frame synchronization ring and per-image fence tracking
//!
//! The ring holds N frame slots, each a {fence, image-available semaphore,
//! render-finished semaphore} triple. Slot `i mod N` is used for logical
//! frame `i`, so at most N frames are ever queued ahead of the GPU.
//!
//! Ordering for one slot is strict: wait on its fence, reset the fence,
//! submit work that signals the fence. The fence starts signaled so the
//! first wait on every slot returns immediately.
//!
//! [`ImagesInFlight`] covers the case the ring cannot: the presentation
//! engine may hand back an image that a *different* slot's submission is
//! still rendering into. Before reusing an image the driver waits on the
//! fence recorded for it here.

use std::fmt;

use super::backend::PresentBackend;
use super::error::{PresentError, PresentResult};
use super::types::{ImageIndex, PerImage, SwapchainGeneration};

/// Synchronization primitives for one frame in flight
pub struct FrameSlot<B: PresentBackend> {
    /// Signaled when the GPU finishes this slot's submission
    pub in_flight: B::Fence,
    /// Signaled by the presentation engine when the acquired image is ready
    pub image_available: B::Semaphore,
    /// Signaled when rendering finishes; presentation waits on it
    pub render_finished: B::Semaphore,
}

impl<B: PresentBackend> Clone for FrameSlot<B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: PresentBackend> Copy for FrameSlot<B> {}

impl<B: PresentBackend> fmt::Debug for FrameSlot<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSlot")
            .field("in_flight", &self.in_flight)
            .field("image_available", &self.image_available)
            .field("render_finished", &self.render_finished)
            .finish()
    }
}

impl<B: PresentBackend> FrameSlot<B> {
    /// Create one slot, releasing anything already created if a later step fails
    fn create(backend: &mut B) -> PresentResult<Self> {
        let image_available = backend.create_semaphore()?;

        let render_finished = match backend.create_semaphore() {
            Ok(semaphore) => semaphore,
            Err(err) => {
                backend.destroy_semaphore(image_available);
                return Err(err);
            }
        };

        let in_flight = match backend.create_fence(true) {
            Ok(fence) => fence,
            Err(err) => {
                backend.destroy_semaphore(render_finished);
                backend.destroy_semaphore(image_available);
                return Err(err);
            }
        };

        Ok(Self {
            in_flight,
            image_available,
            render_finished,
        })
    }

    fn destroy(self, backend: &mut B) {
        backend.destroy_fence(self.in_flight);
        backend.destroy_semaphore(self.render_finished);
        backend.destroy_semaphore(self.image_available);
    }
}

/// Fixed ring of N frame slots
///
/// Created once at startup and destroyed once at shutdown; swapchain
/// recreation never touches it.
pub struct FrameSyncRing<B: PresentBackend> {
    slots: Vec<FrameSlot<B>>,
}

impl<B: PresentBackend> FrameSyncRing<B> {
    /// Create `frames_in_flight` slots
    ///
    /// On failure every primitive created so far is destroyed before the
    /// error is returned.
    pub fn new(backend: &mut B, frames_in_flight: usize) -> PresentResult<Self> {
        if frames_in_flight == 0 {
            return Err(PresentError::InitializationFailed(
                "frame sync ring needs at least one slot".to_string(),
            ));
        }

        let mut slots = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            match FrameSlot::create(backend) {
                Ok(slot) => slots.push(slot),
                Err(err) => {
                    for slot in slots.drain(..) {
                        slot.destroy(backend);
                    }
                    return Err(err);
                }
            }
        }

        log::debug!("Created frame sync ring with {frames_in_flight} slots");
        Ok(Self { slots })
    }

    /// Number of slots (N); zero once destroyed
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the ring has been destroyed
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot used by logical frame `frame`
    ///
    /// # Panics
    ///
    /// Panics if the ring has been destroyed.
    pub fn slot(&self, frame: usize) -> FrameSlot<B> {
        self.slots[frame % self.slots.len()]
    }

    /// Block until the slot for `frame` is no longer in flight
    pub fn acquire_fence_wait(
        &self,
        backend: &mut B,
        frame: usize,
        timeout_ns: u64,
    ) -> PresentResult<()> {
        let slot = self.checked_slot(frame)?;
        backend.wait_for_fence(slot.in_flight, timeout_ns)
    }

    /// Unsignal the slot's fence; only valid after [`Self::acquire_fence_wait`]
    pub fn reset_fence(&self, backend: &mut B, frame: usize) -> PresentResult<()> {
        let slot = self.checked_slot(frame)?;
        backend.reset_fence(slot.in_flight)
    }

    /// Release every primitive; calling it again does nothing
    pub fn destroy(&mut self, backend: &mut B) {
        if self.slots.is_empty() {
            return;
        }
        log::debug!("Destroying frame sync ring ({} slots)", self.slots.len());
        for slot in self.slots.drain(..) {
            slot.destroy(backend);
        }
    }

    fn checked_slot(&self, frame: usize) -> PresentResult<FrameSlot<B>> {
        if self.slots.is_empty() {
            return Err(PresentError::ShutDown);
        }
        Ok(self.slot(frame))
    }
}

/// Fence of the slot that last rendered into each swapchain image
#[derive(Debug)]
pub struct ImagesInFlight<F> {
    fences: PerImage<Option<F>>,
}

impl<F: Copy + PartialEq> ImagesInFlight<F> {
    /// Empty table, to be sized by [`Self::reset`] once resources exist
    pub fn new() -> Self {
        Self {
            fences: PerImage::new(SwapchainGeneration::initial(), Vec::new()),
        }
    }

    /// Forget every record and size the table for a new resource set
    pub fn reset(&mut self, generation: SwapchainGeneration, image_count: u32) {
        self.fences = PerImage::filled(generation, image_count, None);
    }

    /// Fence currently recorded for `image`
    pub fn get(&self, image: ImageIndex) -> PresentResult<Option<F>> {
        self.fences.get(image).copied()
    }

    /// Record `fence` as the user of `image`
    ///
    /// Returns the previously recorded fence when it belongs to another
    /// slot; the caller must wait on it before submitting.
    pub fn claim(&mut self, image: ImageIndex, fence: F) -> PresentResult<Option<F>> {
        let entry = self.fences.get_mut(image)?;
        let previous = entry.replace(fence);
        Ok(previous.filter(|previous| *previous != fence))
    }

    /// Number of images tracked
    pub fn len(&self) -> usize {
        self.fences.len()
    }

    /// Whether no images are tracked
    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }
}

impl<F: Copy + PartialEq> Default for ImagesInFlight<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::frame::tests::mock::{MockBackend, MockFence};

    #[test]
    fn test_ring_creates_and_destroys_everything_once() {
        let mut backend = MockBackend::new();
        let mut ring = FrameSyncRing::new(&mut backend, 3).unwrap();
        assert_eq!(ring.len(), 3);
        assert_eq!(backend.fences_created(), 3);
        assert_eq!(backend.semaphores_created(), 6);

        ring.destroy(&mut backend);
        ring.destroy(&mut backend);
        assert!(ring.is_empty());
        assert_eq!(backend.live_fences(), 0);
        assert_eq!(backend.live_semaphores(), 0);
        assert!(backend.violations().is_empty(), "{:?}", backend.violations());
    }

    #[test]
    fn test_ring_slot_wraps() {
        let mut backend = MockBackend::new();
        let mut ring = FrameSyncRing::new(&mut backend, 2).unwrap();
        assert_eq!(ring.slot(0).in_flight, ring.slot(2).in_flight);
        assert_ne!(ring.slot(0).in_flight, ring.slot(1).in_flight);
        ring.destroy(&mut backend);
    }

    #[test]
    fn test_ring_zero_slots_rejected() {
        let mut backend = MockBackend::new();
        assert!(matches!(
            FrameSyncRing::new(&mut backend, 0),
            Err(PresentError::InitializationFailed(_))
        ));
        assert_eq!(backend.fences_created(), 0);
    }

    #[test]
    fn test_ring_partial_failure_cleans_up() {
        let mut backend = MockBackend::new();
        backend.fail_fence_creation_after(2);

        let result = FrameSyncRing::new(&mut backend, 3);
        assert!(matches!(result, Err(PresentError::Api { .. })));
        assert_eq!(backend.live_fences(), 0);
        assert_eq!(backend.live_semaphores(), 0);
        assert!(backend.violations().is_empty(), "{:?}", backend.violations());
    }

    #[test]
    fn test_fresh_slot_wait_returns_immediately() {
        let mut backend = MockBackend::new();
        let mut ring = FrameSyncRing::new(&mut backend, 2).unwrap();
        ring.acquire_fence_wait(&mut backend, 0, 1_000).unwrap();
        ring.reset_fence(&mut backend, 0).unwrap();

        // Reset without a submission: nothing will ever signal it
        assert!(matches!(
            ring.acquire_fence_wait(&mut backend, 0, 1_000),
            Err(PresentError::FenceTimeout { timeout_ns: 1_000 })
        ));
        ring.destroy(&mut backend);
    }

    #[test]
    fn test_destroyed_ring_reports_shutdown() {
        let mut backend = MockBackend::new();
        let mut ring = FrameSyncRing::new(&mut backend, 1).unwrap();
        ring.destroy(&mut backend);
        assert!(matches!(
            ring.acquire_fence_wait(&mut backend, 0, 1),
            Err(PresentError::ShutDown)
        ));
    }

    #[test]
    fn test_images_in_flight_claim() {
        let generation = SwapchainGeneration::initial();
        let mut images = ImagesInFlight::new();
        images.reset(generation, 3);
        let image = ImageIndex::validate(1, 3, generation).unwrap();

        assert_eq!(images.claim(image, MockFence(7)).unwrap(), None);
        // Same slot again: nothing to wait for
        assert_eq!(images.claim(image, MockFence(7)).unwrap(), None);
        assert_eq!(images.claim(image, MockFence(9)).unwrap(), Some(MockFence(7)));
        assert_eq!(images.get(image).unwrap(), Some(MockFence(9)));
    }

    #[test]
    fn test_images_in_flight_reset_forgets_old_generation() {
        let old = SwapchainGeneration::initial();
        let mut images = ImagesInFlight::new();
        images.reset(old, 2);
        let stale = ImageIndex::validate(0, 2, old).unwrap();
        images.claim(stale, MockFence(1)).unwrap();

        let new = old.next();
        images.reset(new, 4);
        assert_eq!(images.len(), 4);
        assert!(matches!(images.get(stale), Err(PresentError::StaleImageIndex { .. })));
        let fresh = ImageIndex::validate(0, 4, new).unwrap();
        assert_eq!(images.get(fresh).unwrap(), None::<MockFence>);
    }
}
