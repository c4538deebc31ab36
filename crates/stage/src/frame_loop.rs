use crate::host::{FrameRequest, Host};

/// A cancellable repeating frame task.
///
/// Holds at most one outstanding request. A callback is honored only if it
/// carries that request; anything else is stale.
#[derive(Debug, Default)]
pub struct FrameLoop {
    pending: Option<FrameRequest>,
    cancelled: bool,
    scheduled: u64,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the next frame unless the loop was cancelled.
    pub fn schedule<H: Host + ?Sized>(&mut self, host: &mut H) -> Option<FrameRequest> {
        if self.cancelled {
            return None;
        }
        if let Some(old) = self.pending.take() {
            host.cancel_frame(old);
        }
        let request = host.request_frame();
        self.pending = Some(request);
        self.scheduled += 1;
        Some(request)
    }

    /// Consume `request` if it is the outstanding one.
    pub fn accept(&mut self, request: FrameRequest) -> bool {
        if self.cancelled || self.pending != Some(request) {
            return false;
        }
        self.pending = None;
        true
    }

    /// Stop the loop for good, cancelling any outstanding request.
    pub fn cancel<H: Host + ?Sized>(&mut self, host: &mut H) {
        self.cancelled = true;
        if let Some(request) = self.pending.take() {
            host.cancel_frame(request);
        }
    }

    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Requests made over the loop's lifetime.
    pub fn scheduled(&self) -> u64 {
        self.scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;
    use glimmer_common::Viewport;

    #[test]
    fn accepts_only_the_pending_request() {
        let mut host = HeadlessHost::new(Viewport::new(10, 10));
        let mut frames = FrameLoop::new();
        let first = frames.schedule(&mut host).unwrap();

        assert!(!frames.accept(FrameRequest(first.0 + 100)));
        assert!(frames.accept(first));
        assert!(!frames.accept(first), "a request is honored once");
        assert_eq!(frames.pending(), None);
    }

    #[test]
    fn rescheduling_replaces_the_old_request() {
        let mut host = HeadlessHost::new(Viewport::new(10, 10));
        let probe = host.probe();
        let mut frames = FrameLoop::new();
        let a = frames.schedule(&mut host).unwrap();
        let b = frames.schedule(&mut host).unwrap();
        assert_ne!(a, b);
        assert!(!frames.accept(a));
        assert!(frames.accept(b));
        assert_eq!(probe.stats().frames_cancelled, 1);
        assert_eq!(frames.scheduled(), 2);
    }

    #[test]
    fn cancel_is_final() {
        let mut host = HeadlessHost::new(Viewport::new(10, 10));
        let probe = host.probe();
        let mut frames = FrameLoop::new();
        let request = frames.schedule(&mut host).unwrap();
        frames.cancel(&mut host);
        frames.cancel(&mut host);

        assert!(frames.is_cancelled());
        assert!(!frames.accept(request));
        assert!(frames.schedule(&mut host).is_none());
        assert_eq!(probe.stats().frames_cancelled, 1);
    }
}
