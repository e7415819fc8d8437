//! Vulkan synchronization primitives for GPU/CPU coordination
//!
//! RAII wrappers for semaphores and fences plus [`FrameSync`], the pair of
//! objects each frame in flight needs.

use ash::vk;
use std::sync::Arc;

use super::{Context, VulkanResult};

/// Semaphore wrapper with RAII cleanup
pub struct Semaphore {
    context: Arc<Context>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new binary semaphore
    pub fn new(context: Arc<Context>) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { context.device().create_semaphore(&create_info, None)? };
        Ok(Self { context, semaphore })
    }

    /// Get semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.context.device().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    context: Arc<Context>,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence, optionally already signalled
    pub fn new(context: Arc<Context>, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { context.device().create_fence(&create_info, None)? };
        Ok(Self { context, fence })
    }

    /// Block until the fence is signalled or `timeout` nanoseconds pass
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe { self.context.device().wait_for_fences(&[self.fence], true, timeout)? };
        Ok(())
    }

    /// Return the fence to the unsignalled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.context.device().reset_fences(&[self.fence])? };
        Ok(())
    }

    /// Whether the fence is currently signalled
    pub fn is_signaled(&self) -> VulkanResult<bool> {
        let signaled = unsafe { self.context.device().get_fence_status(self.fence)? };
        Ok(signaled)
    }

    /// Get fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.context.device().destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects owned by one frame in flight
///
/// The render-finished semaphores belong to swapchain images, not frames, so they
/// live with the swapchain resources instead.
pub struct FrameSync {
    /// Signalled when the acquired swapchain image is ready to be rendered to
    pub image_available: Semaphore,
    /// Signalled when the GPU has finished this frame's command buffer
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the objects for one frame; the fence starts signalled so the first wait returns
    pub fn new(context: Arc<Context>) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(context.clone())?,
            in_flight: Fence::new(context, true)?,
        })
    }
}
