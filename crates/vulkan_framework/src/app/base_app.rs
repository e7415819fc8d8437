//! Application trait and main loop

use glfw::{Action, Key, WindowEvent};
use std::time::{Duration, Instant};

use super::frame_state::SwapchainState;
use super::vk_app::{Frame, VkApp};
use super::AppError;
use crate::config::AppConfig;

/// Longest step handed to [`Application::update`]; longer gaps (minimized window,
/// debugger pause) are clamped.
pub const MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

/// Callbacks driven by [`run`]
pub trait Application {
    /// Create GPU resources; the swapchain and render target exist at this point
    fn initialize(&mut self, app: &mut VkApp) -> Result<(), AppError>;

    /// Advance simulation state by `delta_time` seconds
    fn update(&mut self, _app: &mut VkApp, _delta_time: f32) -> Result<(), AppError> {
        Ok(())
    }

    /// Record draw commands into an open render pass
    fn render(&mut self, app: &VkApp, frame: &mut Frame) -> Result<(), AppError>;

    /// Framebuffer size changed; the swapchain is rebuilt before the next frame
    fn on_resize(&mut self, _app: &mut VkApp, _width: u32, _height: u32) {}

    /// Raw window event; Escape closes the window unless overridden
    fn handle_event(&mut self, app: &mut VkApp, event: &WindowEvent) -> Result<(), AppError> {
        if let WindowEvent::Key(Key::Escape, _, Action::Press, _) = event {
            app.window_mut().set_should_close(true);
        }
        Ok(())
    }

    /// Release GPU resources; the device is idle when this runs
    fn cleanup(&mut self, _app: &mut VkApp) {}
}

/// Frame delta timing
#[derive(Debug, Clone)]
pub struct FrameTimer {
    last_frame: Instant,
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    /// Start timing now
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
        }
    }

    /// Measure the time since the previous tick; returns the clamped delta in seconds
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame);
        self.last_frame = now;
        self.advance(elapsed)
    }

    /// Account for `elapsed` as one frame
    pub fn advance(&mut self, elapsed: Duration) -> f32 {
        self.delta_time = elapsed.min(MAX_FRAME_DELTA).as_secs_f32();
        self.total_time += self.delta_time;
        self.frame_count += 1;
        self.delta_time
    }

    /// Seconds covered by the last tick
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Sum of all deltas
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Ticks so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average frames per second since creation
    pub fn average_fps(&self) -> f32 {
        if self.total_time > 0.0 {
            self.frame_count as f32 / self.total_time
        } else {
            0.0
        }
    }
}

/// Create a [`VkApp`] from `config` and drive `app` until the window closes
///
/// The application is cleaned up and dropped before the window and context.
pub fn run<A: Application>(config: AppConfig, mut app: A) -> Result<(), AppError> {
    let mut vk_app = VkApp::new(config)?;
    app.initialize(&mut vk_app)?;
    log::info!("Entering main loop");

    let result = main_loop(&mut vk_app, &mut app);

    if let Err(e) = vk_app.wait_idle() {
        log::error!("Failed to wait for device idle: {}", e);
    }
    app.cleanup(&mut vk_app);
    drop(app);

    log::info!("Main loop finished after {} frames", vk_app.frame_count());
    result
}

fn main_loop<A: Application>(vk_app: &mut VkApp, app: &mut A) -> Result<(), AppError> {
    let mut timer = FrameTimer::new();

    while !vk_app.window().should_close() {
        if vk_app.state() == SwapchainState::ZeroSized {
            // Nothing to draw while minimized.
            vk_app.window_mut().wait_events();
        } else {
            vk_app.window_mut().poll_events();
        }

        for event in vk_app.window().flush_events() {
            if let WindowEvent::FramebufferSize(width, height) = event {
                let (width, height) = (width.max(0) as u32, height.max(0) as u32);
                vk_app.notify_resized(width, height);
                app.on_resize(vk_app, width, height);
            }
            app.handle_event(vk_app, &event)?;
        }

        let delta_time = timer.tick();
        app.update(vk_app, delta_time)?;

        if let Some(mut frame) = vk_app.begin_frame()? {
            let rendered = app.render(vk_app, &mut frame);
            // Submit even on failure: the frame fence was reset and must be signalled again.
            vk_app.finish_frame(frame)?;
            rendered?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_timer_accumulates() {
        let mut timer = FrameTimer::new();
        assert_relative_eq!(timer.advance(Duration::from_millis(16)), 0.016, epsilon = 1e-6);
        timer.advance(Duration::from_millis(34));
        assert_eq!(timer.frame_count(), 2);
        assert_relative_eq!(timer.total_time(), 0.05, epsilon = 1e-6);
        assert_relative_eq!(timer.average_fps(), 40.0, epsilon = 1e-3);
    }

    #[test]
    fn test_long_gaps_are_clamped() {
        let mut timer = FrameTimer::new();
        let delta = timer.advance(Duration::from_secs(10));
        assert_relative_eq!(delta, MAX_FRAME_DELTA.as_secs_f32());
        assert_relative_eq!(timer.delta_time(), 0.25);
    }

    #[test]
    fn test_tick_is_non_negative() {
        let mut timer = FrameTimer::new();
        assert!(timer.tick() >= 0.0);
        assert!(timer.average_fps() >= 0.0);
    }
}
