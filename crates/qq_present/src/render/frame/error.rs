//! Frame controller errors and recoverable outcomes
//!
//! Only fatal conditions are errors. An out-of-date or suboptimal swapchain
//! is an expected outcome of acquire/present: it is reported through
//! [`AcquireOutcome`] and [`PresentOutcome`], consumed by the driver's
//! recreation path and never returned to the caller of `run_frame`.

use ash::vk;
use thiserror::Error;

use super::types::ImageIndex;

/// Fatal errors of the frame controller and its backends
#[derive(Error, Debug)]
pub enum PresentError {
    /// A GPU API call failed
    #[error("{operation} failed: {result}")]
    Api {
        /// The call that failed
        operation: &'static str,
        /// The API result code
        result: vk::Result,
    },

    /// A CPU wait on a fence did not finish in time
    #[error("fence wait timed out after {timeout_ns} ns")]
    FenceTimeout {
        /// The timeout that elapsed
        timeout_ns: u64,
    },

    /// The surface offers no usable format, present mode, or extent
    #[error("no compatible swapchain configuration: {0}")]
    NoCompatibleConfiguration(String),

    /// The presentation engine returned an index outside the image set
    #[error("image index {index} out of range for {image_count} swapchain images")]
    InvalidImageIndex {
        /// Raw index returned
        index: u32,
        /// Images in the current resource set
        image_count: u32,
    },

    /// An image index from an older swapchain generation was used
    #[error(
        "image index {index} belongs to generation {index_generation}, \
         current is {current_generation}"
    )]
    StaleImageIndex {
        /// Raw index
        index: u32,
        /// Generation the index was validated against
        index_generation: u64,
        /// Generation of the container it was used with
        current_generation: u64,
    },

    /// Per-frame data did not fit the per-image uniform buffer
    #[error("uniform write of {len} bytes exceeds the {capacity}-byte buffer")]
    UniformOverflow {
        /// Bytes the caller tried to write
        len: u64,
        /// Size of the mapped buffer
        capacity: u64,
    },

    /// Rebuilding the swapchain-dependent resources failed after the old set was released
    #[error("swapchain recreation failed: {0}")]
    RecreationFailed(#[source] Box<PresentError>),

    /// The window was closed while waiting for a usable surface size
    #[error("window closed while waiting for a drawable surface")]
    WindowClosed,

    /// The driver has been shut down
    #[error("frame driver is shut down")]
    ShutDown,

    /// An earlier swapchain recreation failed; recreation is not retried
    #[error("frame driver halted after a failed swapchain recreation")]
    Halted,

    /// Startup failed (instance, device, surface, shaders)
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
}

impl PresentError {
    /// Build a closure mapping a `vk::Result` into [`PresentError::Api`]
    ///
    /// ```rust,ignore
    /// device.reset_fences(&[fence]).map_err(PresentError::api("vkResetFences"))?;
    /// ```
    pub fn api(operation: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Api { operation, result }
    }

    /// Whether the window went away (an orderly exit rather than a failure)
    pub const fn is_window_closed(&self) -> bool {
        matches!(self, Self::WindowClosed)
    }
}

/// Result type for the frame controller
pub type PresentResult<T> = Result<T, PresentError>;

/// Outcome of asking the presentation engine for the next image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is available; `suboptimal` asks for recreation after this frame
    Ready {
        /// Raw image index, not yet validated
        index: u32,
        /// The surface no longer matches the swapchain exactly
        suboptimal: bool,
    },
    /// The swapchain can no longer be used; nothing was signaled
    OutOfDate,
}

/// Outcome of queueing an image for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented, swapchain still matches the surface
    Optimal,
    /// Presented, but the swapchain should be rebuilt
    Suboptimal,
    /// Not presented, the swapchain must be rebuilt
    OutOfDate,
}

impl PresentOutcome {
    /// Whether this outcome requires recreation
    pub const fn needs_recreation(self) -> bool {
        !matches!(self, Self::Optimal)
    }
}

/// Describe the image an error concerns, for log lines
pub(crate) fn describe_image(image: ImageIndex) -> String {
    format!("image {} ({})", image.raw(), image.generation())
}
