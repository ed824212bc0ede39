//! Vulkan fences and semaphores for the frame sync ring
//!
//! The ring owns these as plain handles and hands them back for
//! destruction exactly once, so there is no RAII wrapper here.

use ash::{vk, Device};

use crate::render::frame::{PresentError, PresentResult};

/// Create a fence, optionally signaled so the first wait returns immediately
pub fn create_fence(device: &Device, signaled: bool) -> PresentResult<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::builder().flags(flags);

    unsafe {
        device
            .create_fence(&create_info, None)
            .map_err(PresentError::api("vkCreateFence"))
    }
}

/// Create a binary semaphore
pub fn create_semaphore(device: &Device) -> PresentResult<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::builder();

    unsafe {
        device
            .create_semaphore(&create_info, None)
            .map_err(PresentError::api("vkCreateSemaphore"))
    }
}

/// Block on a fence; `VK_TIMEOUT` becomes [`PresentError::FenceTimeout`]
pub fn wait_for_fence(device: &Device, fence: vk::Fence, timeout_ns: u64) -> PresentResult<()> {
    match unsafe { device.wait_for_fences(&[fence], true, timeout_ns) } {
        Ok(()) => Ok(()),
        Err(vk::Result::TIMEOUT) => Err(PresentError::FenceTimeout { timeout_ns }),
        Err(result) => Err(PresentError::Api {
            operation: "vkWaitForFences",
            result,
        }),
    }
}

/// Unsignal a fence
pub fn reset_fence(device: &Device, fence: vk::Fence) -> PresentResult<()> {
    unsafe {
        device
            .reset_fences(&[fence])
            .map_err(PresentError::api("vkResetFences"))
    }
}
