//! Command buffer management
//!
//! [`CommandPool`] owns the pool; [`CommandRecorder`] wraps one primary command
//! buffer and tracks whether it is recording and inside a render pass so that
//! begin/end calls cannot be mismatched.

use ash::vk;
use std::sync::Arc;

use super::{Context, VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    context: Arc<Context>,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually
    pub fn new(context: Arc<Context>, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe { context.device().create_command_pool(&pool_create_info, None)? };

        Ok(Self { context, command_pool })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let command_buffers = unsafe { self.context.device().allocate_command_buffers(&alloc_info)? };
        Ok(command_buffers)
    }

    /// Get the command pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees every buffer allocated from it.
            self.context.device().destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Type-safe command buffer recorder
pub struct CommandRecorder {
    context: Arc<Context>,
    command_buffer: vk::CommandBuffer,
    recording: bool,
    in_render_pass: bool,
}

impl CommandRecorder {
    /// Wrap a command buffer allocated from a resettable pool
    pub fn new(context: Arc<Context>, command_buffer: vk::CommandBuffer) -> Self {
        Self {
            context,
            command_buffer,
            recording: false,
            in_render_pass: false,
        }
    }

    /// Reset the buffer and begin one-time recording
    pub fn begin(&mut self) -> VulkanResult<()> {
        if self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer already recording".to_string(),
            });
        }

        let device = self.context.device();
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            device.reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())?;
            device.begin_command_buffer(self.command_buffer, &begin_info)?;
        }

        self.recording = true;
        Ok(())
    }

    /// Begin an inline render pass
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) -> VulkanResult<()> {
        if !self.recording || self.in_render_pass {
            return Err(VulkanError::InvalidOperation {
                reason: "Render pass must begin inside a recording command buffer, outside another pass"
                    .to_string(),
            });
        }

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            self.context.device().cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );
        }

        self.in_render_pass = true;
        Ok(())
    }

    /// End the current render pass
    pub fn end_render_pass(&mut self) -> VulkanResult<()> {
        if !self.in_render_pass {
            return Err(VulkanError::InvalidOperation {
                reason: "No render pass is active".to_string(),
            });
        }
        unsafe { self.context.device().cmd_end_render_pass(self.command_buffer) };
        self.in_render_pass = false;
        Ok(())
    }

    /// End command recording
    pub fn end(&mut self) -> VulkanResult<()> {
        if !self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer not recording".to_string(),
            });
        }
        if self.in_render_pass {
            self.end_render_pass()?;
        }

        unsafe { self.context.device().end_command_buffer(self.command_buffer)? };
        self.recording = false;
        Ok(())
    }

    /// Whether a render pass is currently open
    pub fn in_render_pass(&self) -> bool {
        self.in_render_pass
    }

    /// Raw handle for code that records commands directly
    pub fn handle(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Set viewport 0
    pub fn set_viewport(&mut self, viewport: vk::Viewport) {
        unsafe {
            self.context
                .device()
                .cmd_set_viewport(self.command_buffer, 0, &[viewport]);
        }
    }

    /// Set scissor 0
    pub fn set_scissor(&mut self, scissor: vk::Rect2D) {
        unsafe {
            self.context
                .device()
                .cmd_set_scissor(self.command_buffer, 0, &[scissor]);
        }
    }

    /// Bind graphics pipeline
    pub fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.context.device().cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    /// Bind descriptor sets starting at set 0
    pub fn bind_descriptor_sets(&mut self, layout: vk::PipelineLayout, sets: &[vk::DescriptorSet]) {
        unsafe {
            self.context.device().cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                sets,
                &[],
            );
        }
    }

    /// Bind vertex buffers
    pub fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]) {
        unsafe {
            self.context
                .device()
                .cmd_bind_vertex_buffers(self.command_buffer, first_binding, buffers, offsets);
        }
    }

    /// Bind index buffer
    pub fn bind_index_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize, index_type: vk::IndexType) {
        unsafe {
            self.context
                .device()
                .cmd_bind_index_buffer(self.command_buffer, buffer, offset, index_type);
        }
    }

    /// Non-indexed draw
    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.context.device().cmd_draw(
                self.command_buffer,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
    }

    /// Draw indexed
    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.context.device().cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
    }

    /// Push constants to shaders
    pub fn push_constants(
        &mut self,
        pipeline_layout: vk::PipelineLayout,
        stage_flags: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.context.device().cmd_push_constants(
                self.command_buffer,
                pipeline_layout,
                stage_flags,
                offset,
                data,
            );
        }
    }
}
