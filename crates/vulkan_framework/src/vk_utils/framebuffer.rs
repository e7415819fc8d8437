//! Framebuffer wrapper

use ash::vk;
use std::sync::Arc;

use super::{Context, VulkanResult};

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    context: Arc<Context>,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
}

impl Framebuffer {
    /// Create a framebuffer over `attachments` in render pass attachment order
    pub fn new(
        context: Arc<Context>,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { context.device().create_framebuffer(&create_info, None)? };

        Ok(Self {
            context,
            framebuffer,
            extent,
        })
    }

    /// Framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }

    /// Size the framebuffer was created with
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.context.device().destroy_framebuffer(self.framebuffer, None);
        }
    }
}
