//! Window, context and swapchain ownership plus the per-frame cycle

use ash::vk;
use std::sync::Arc;

use super::frame_state::{FrameCounter, SwapchainEvent, SwapchainState};
use super::AppError;
use crate::config::AppConfig;
use crate::vk_utils::swapchain::choose_surface_format;
use crate::vk_utils::{
    CommandPool, CommandRecorder, Context, Framebuffer, FrameSync, Image, RenderPass, Semaphore,
    Swapchain, VulkanError,
};
use crate::window::Window;

/// Everything a material needs to build a pipeline for this application
#[derive(Clone)]
pub struct RenderTarget {
    /// Shared Vulkan context
    pub context: Arc<Context>,
    /// Forward render pass every frame records into
    pub render_pass: vk::RenderPass,
    /// Color attachment format
    pub color_format: vk::Format,
    /// Number of frames the CPU records ahead; per-frame resources are sized to this
    pub frames_in_flight: usize,
}

/// One frame being recorded
///
/// Returned by [`VkApp::begin_frame`] with the render pass open and the dynamic
/// viewport/scissor set, and handed back to [`VkApp::finish_frame`].
pub struct Frame {
    index: usize,
    image_index: u32,
    extent: vk::Extent2D,
    suboptimal: bool,
    recorder: CommandRecorder,
}

impl Frame {
    /// Frame-in-flight slot; selects per-frame descriptor sets and uniform buffers
    pub fn index(&self) -> usize {
        self.index
    }

    /// Swapchain image being rendered to
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    /// Render area size
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Command buffer being recorded
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.recorder.handle()
    }

    /// Recorder for issuing draw commands
    pub fn recorder(&mut self) -> &mut CommandRecorder {
        &mut self.recorder
    }
}

/// Vulkan application core
pub struct VkApp {
    config: AppConfig,
    state: SwapchainState,
    frames: FrameCounter,

    // Field order is drop order: swapchain resources, then per-frame objects,
    // then the context handle, then the window the surface belongs to.
    framebuffers: Vec<Framebuffer>,
    depth_images: Vec<Image>,
    render_finished: Vec<Semaphore>,
    swapchain: Option<Swapchain>,
    render_pass: RenderPass,
    frame_sync: Vec<FrameSync>,
    command_buffers: Vec<vk::CommandBuffer>,
    _command_pool: CommandPool,
    context: Arc<Context>,
    window: Window,
}

impl VkApp {
    /// Open the window, create the Vulkan context and the first swapchain
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        config.validate()?;

        let mut window = Window::new(&config.window)?;
        let context = Context::create(&mut window, &config.renderer)?;

        let formats = unsafe {
            context
                .surface_loader()
                .get_physical_device_surface_formats(context.physical_device().device, context.surface())
                .map_err(VulkanError::Api)?
        };
        let surface_format = choose_surface_format(&formats)
            .ok_or_else(|| VulkanError::InitializationFailed("Surface reports no formats".to_string()))?;
        let render_pass = RenderPass::new_forward_pass(context.clone(), surface_format.format)?;

        let frames_in_flight = config.renderer.frames_in_flight;
        let command_pool = CommandPool::new(context.clone(), context.graphics_family())?;
        let command_buffers = command_pool.allocate_command_buffers(frames_in_flight as u32)?;
        let frame_sync = (0..frames_in_flight)
            .map(|_| FrameSync::new(context.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "VkApp initialized: {} frames in flight, color format {:?}",
            frames_in_flight,
            surface_format.format
        );

        let mut app = Self {
            config,
            state: SwapchainState::NoSwapchain,
            frames: FrameCounter::new(frames_in_flight),
            framebuffers: Vec::new(),
            depth_images: Vec::new(),
            render_finished: Vec::new(),
            swapchain: None,
            render_pass,
            frame_sync,
            command_buffers,
            _command_pool: command_pool,
            context,
            window,
        };
        app.create_swapchain()?;
        Ok(app)
    }

    /// (Re)build the swapchain and everything sized to it
    ///
    /// Leaves the state at `ZeroSized` without touching the old swapchain while
    /// the window is minimized.
    pub fn create_swapchain(&mut self) -> Result<(), AppError> {
        self.context.wait_idle()?;

        let framebuffer_size = self.window.framebuffer_size();
        let extent = Swapchain::query_extent(&self.context, framebuffer_size)?;
        if framebuffer_size.0 == 0 || framebuffer_size.1 == 0 || extent.width == 0 || extent.height == 0 {
            log::debug!("Framebuffer is zero-sized, postponing swapchain creation");
            self.state = self.state.on(SwapchainEvent::Created { zero_extent: true });
            return Ok(());
        }

        self.framebuffers.clear();
        self.depth_images.clear();
        self.render_finished.clear();

        let swapchain = Swapchain::new(
            self.context.clone(),
            framebuffer_size,
            self.config.renderer.vsync,
            self.swapchain.as_ref(),
        )?;

        if swapchain.format().format != self.render_pass.color_format() {
            log::warn!(
                "Surface format changed from {:?} to {:?}; rebuilding the render pass",
                self.render_pass.color_format(),
                swapchain.format().format
            );
            self.render_pass = RenderPass::new_forward_pass(self.context.clone(), swapchain.format().format)?;
        }

        let extent = swapchain.extent();
        for &view in swapchain.image_views() {
            let depth = Image::depth(self.context.clone(), extent)?;
            let framebuffer = Framebuffer::new(
                self.context.clone(),
                self.render_pass.handle(),
                &[view, depth.view()],
                extent,
            )?;
            self.depth_images.push(depth);
            self.framebuffers.push(framebuffer);
            self.render_finished.push(Semaphore::new(self.context.clone())?);
        }

        log::info!(
            "Swapchain ready: {}x{}, {} images, {:?}",
            extent.width,
            extent.height,
            swapchain.image_count(),
            swapchain.present_mode()
        );

        // Replacing the option destroys the retired swapchain.
        self.swapchain = Some(swapchain);
        self.state = self.state.on(SwapchainEvent::Created { zero_extent: false });
        Ok(())
    }

    /// Start recording a frame
    ///
    /// Returns `Ok(None)` when nothing can be rendered right now (minimized window,
    /// swapchain invalidated during acquire). The caller just skips the frame.
    pub fn begin_frame(&mut self) -> Result<Option<Frame>, AppError> {
        if self.state == SwapchainState::ZeroSized {
            let (width, height) = self.window.framebuffer_size();
            if width > 0 && height > 0 {
                self.state = self.state.on(SwapchainEvent::FramebufferRestored);
            }
        }
        if self.state.needs_recreate() {
            self.create_swapchain()?;
        }
        if !self.state.can_render() {
            return Ok(None);
        }
        let swapchain = match self.swapchain.as_ref() {
            Some(swapchain) => swapchain,
            None => return Ok(None),
        };

        let index = self.frames.current();
        let sync = &self.frame_sync[index];
        sync.in_flight.wait(u64::MAX)?;

        let (image_index, suboptimal) = match swapchain.acquire_next_image(sync.image_available.handle()) {
            Ok(acquired) => acquired,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Swapchain out of date during acquire");
                // The fence stays signalled so the retry does not deadlock.
                self.state = self.state.on(SwapchainEvent::OutOfDate);
                return Ok(None);
            }
            Err(e) => return Err(VulkanError::Api(e).into()),
        };

        sync.in_flight.reset()?;

        let extent = swapchain.extent();
        let framebuffer = self.framebuffers[image_index as usize].handle();
        let mut recorder = CommandRecorder::new(self.context.clone(), self.command_buffers[index]);
        recorder.begin()?;

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.config.renderer.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        recorder.begin_render_pass(self.render_pass.handle(), framebuffer, render_area, &clear_values)?;
        recorder.set_viewport(vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        recorder.set_scissor(render_area);

        Ok(Some(Frame {
            index,
            image_index,
            extent,
            suboptimal,
            recorder,
        }))
    }

    /// End recording, submit and present
    pub fn finish_frame(&mut self, mut frame: Frame) -> Result<(), AppError> {
        frame.recorder.end()?;

        let swapchain = self.swapchain.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "finish_frame called without a swapchain".to_string(),
        })?;
        let sync = &self.frame_sync[frame.index];
        let render_finished = self.render_finished[frame.image_index as usize].handle();

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.recorder.handle()];
        let signal_semaphores = [render_finished];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.context
                .device()
                .queue_submit(self.context.graphics_queue(), &[submit_info], sync.in_flight.handle())
                .map_err(VulkanError::Api)?;
        }

        match swapchain.present(frame.image_index, render_finished) {
            Ok(suboptimal) if suboptimal || frame.suboptimal => {
                log::debug!("Swapchain suboptimal, scheduling recreation");
                self.state = self.state.on(SwapchainEvent::Suboptimal);
            }
            Ok(_) => {}
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Swapchain out of date during present");
                self.state = self.state.on(SwapchainEvent::OutOfDate);
            }
            Err(e) => return Err(VulkanError::Api(e).into()),
        }

        self.frames.advance();
        Ok(())
    }

    /// Record that the framebuffer was resized; the swapchain is rebuilt before the next frame
    pub fn notify_resized(&mut self, width: u32, height: u32) {
        log::debug!("Framebuffer resized to {}x{}", width, height);
        self.state = self.state.on(SwapchainEvent::Resized);
    }

    /// Current swapchain extent, zero while there is none
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain
            .as_ref()
            .map(Swapchain::extent)
            .unwrap_or(vk::Extent2D { width: 0, height: 0 })
    }

    /// Width over height of the swapchain, 1.0 while minimized
    pub fn aspect_ratio(&self) -> f32 {
        let extent = self.extent();
        if extent.height == 0 {
            1.0
        } else {
            extent.width as f32 / extent.height as f32
        }
    }

    /// Pipeline creation inputs for materials
    pub fn render_target(&self) -> RenderTarget {
        RenderTarget {
            context: self.context.clone(),
            render_pass: self.render_pass.handle(),
            color_format: self.render_pass.color_format(),
            frames_in_flight: self.frames_in_flight(),
        }
    }

    /// Block until the GPU has finished all submitted work
    pub fn wait_idle(&self) -> Result<(), AppError> {
        self.context.wait_idle()?;
        Ok(())
    }

    /// Current swapchain state
    pub fn state(&self) -> SwapchainState {
        self.state
    }

    /// Number of frames in flight
    pub fn frames_in_flight(&self) -> usize {
        self.frame_sync.len()
    }

    /// Frames presented so far
    pub fn frame_count(&self) -> u64 {
        self.frames.total()
    }

    /// Shared Vulkan context
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Configuration the app was created with
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Window
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Mutable window
    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }
}

impl Drop for VkApp {
    fn drop(&mut self) {
        if let Err(e) = self.context.wait_idle() {
            log::error!("wait_idle failed during shutdown: {}", e);
        }
        log::debug!("VkApp shutting down after {} frames", self.frames.total());
    }
}
