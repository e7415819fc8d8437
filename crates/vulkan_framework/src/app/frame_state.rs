//! Swapchain lifecycle state machine
//!
//! Kept free of Vulkan calls so every transition can be tested without a GPU.
//! [`super::VkApp`] feeds it events and asks it whether to render or rebuild.

/// Where the swapchain stands between frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwapchainState {
    /// No swapchain has been created yet
    #[default]
    NoSwapchain,
    /// Swapchain matches the surface; frames may be rendered
    Ready,
    /// The framebuffer is zero-sized (minimized); nothing can be created
    ZeroSized,
    /// The swapchain no longer matches the surface and must be rebuilt
    OutOfDate,
}

/// Things that happen to the swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainEvent {
    /// A (re)creation attempt finished with the given extent
    Created {
        /// Whether the surface extent had zero width or height
        zero_extent: bool,
    },
    /// The window reported a framebuffer resize
    Resized,
    /// Acquire or present returned `ERROR_OUT_OF_DATE_KHR`
    OutOfDate,
    /// Present returned `SUBOPTIMAL_KHR`
    Suboptimal,
    /// The framebuffer was polled while zero-sized and found to be non-zero again
    FramebufferRestored,
}

impl SwapchainState {
    /// Apply one event
    pub fn on(self, event: SwapchainEvent) -> Self {
        use SwapchainEvent as E;
        use SwapchainState as S;

        match (self, event) {
            (_, E::Created { zero_extent: true }) => S::ZeroSized,
            (_, E::Created { zero_extent: false }) => S::Ready,
            (S::Ready, E::Resized | E::OutOfDate | E::Suboptimal) => S::OutOfDate,
            (S::ZeroSized, E::FramebufferRestored) => S::OutOfDate,
            (state, _) => state,
        }
    }

    /// Only a ready swapchain may render
    pub fn can_render(self) -> bool {
        self == SwapchainState::Ready
    }

    /// Whether the next frame must start by (re)creating the swapchain
    pub fn needs_recreate(self) -> bool {
        matches!(self, SwapchainState::NoSwapchain | SwapchainState::OutOfDate)
    }
}

/// Round-robin index over the frames in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCounter {
    current: usize,
    frames_in_flight: usize,
    total: u64,
}

impl FrameCounter {
    /// Counter over `frames_in_flight` slots (at least one)
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            current: 0,
            frames_in_flight: frames_in_flight.max(1),
            total: 0,
        }
    }

    /// Slot of the frame being recorded
    pub fn current(&self) -> usize {
        self.current
    }

    /// Frames presented so far
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Move to the next slot after a frame was submitted
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.frames_in_flight;
        self.total += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SwapchainEvent as E;
    use SwapchainState as S;

    #[test]
    fn test_initial_creation() {
        assert_eq!(S::default(), S::NoSwapchain);
        assert!(S::NoSwapchain.needs_recreate());
        assert_eq!(S::NoSwapchain.on(E::Created { zero_extent: false }), S::Ready);
        assert_eq!(S::NoSwapchain.on(E::Created { zero_extent: true }), S::ZeroSized);
    }

    #[test]
    fn test_ready_invalidated() {
        for event in [E::Resized, E::OutOfDate, E::Suboptimal] {
            assert_eq!(S::Ready.on(event), S::OutOfDate, "{:?}", event);
        }
        assert!(S::OutOfDate.needs_recreate());
        assert!(!S::OutOfDate.can_render());
    }

    #[test]
    fn test_recreate_from_out_of_date() {
        assert_eq!(S::OutOfDate.on(E::Created { zero_extent: false }), S::Ready);
        assert_eq!(S::OutOfDate.on(E::Created { zero_extent: true }), S::ZeroSized);
    }

    #[test]
    fn test_zero_sized_waits_for_restore() {
        assert_eq!(S::ZeroSized.on(E::Resized), S::ZeroSized);
        assert_eq!(S::ZeroSized.on(E::OutOfDate), S::ZeroSized);
        assert!(!S::ZeroSized.can_render());
        assert!(!S::ZeroSized.needs_recreate());
        assert_eq!(S::ZeroSized.on(E::FramebufferRestored), S::OutOfDate);
    }

    #[test]
    fn test_restore_ignored_when_not_minimized() {
        assert_eq!(S::Ready.on(E::FramebufferRestored), S::Ready);
        assert_eq!(S::NoSwapchain.on(E::Resized), S::NoSwapchain);
    }

    #[test]
    fn test_only_ready_renders() {
        assert!(S::Ready.can_render());
        assert!(!S::NoSwapchain.can_render());
    }

    #[test]
    fn test_frame_counter_wraps() {
        let mut counter = FrameCounter::new(2);
        assert_eq!(counter.current(), 0);
        counter.advance();
        assert_eq!(counter.current(), 1);
        counter.advance();
        assert_eq!(counter.current(), 0);
        assert_eq!(counter.total(), 2);

        let mut single = FrameCounter::new(0);
        single.advance();
        assert_eq!(single.current(), 0);
    }
}
