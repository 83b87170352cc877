//! Render readiness tracking.

/// Whether the renderer has everything it needs to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderReadiness {
    /// Volume or colormap not uploaded yet.
    #[default]
    NotReady,
    /// Both resources are resident.
    Ready,
    /// A replacement resource is being uploaded over a ready pair.
    Uploading,
}

impl RenderReadiness {
    /// Returns true if a frame may be drawn.
    ///
    /// `Uploading` still renders with the previous resources; the swap is a
    /// handle replacement that happens between frames.
    #[must_use]
    pub fn can_render(self) -> bool {
        matches!(self, Self::Ready | Self::Uploading)
    }
}

/// Tracks which resources are resident and whether an upload is running.
#[derive(Debug, Clone, Default)]
pub struct ReadinessTracker {
    volume_ready: bool,
    colormap_ready: bool,
    uploads_in_flight: u32,
}

impl ReadinessTracker {
    /// Creates a tracker with nothing resident.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current readiness.
    #[must_use]
    pub fn state(&self) -> RenderReadiness {
        match (self.volume_ready && self.colormap_ready, self.uploads_in_flight) {
            (false, _) => RenderReadiness::NotReady,
            (true, 0) => RenderReadiness::Ready,
            (true, _) => RenderReadiness::Uploading,
        }
    }

    /// Marks the start of an upload.
    pub fn begin_upload(&mut self) {
        self.uploads_in_flight = self.uploads_in_flight.saturating_add(1);
    }

    /// Marks the end of an upload that did not produce a resource.
    pub fn abort_upload(&mut self) {
        self.uploads_in_flight = self.uploads_in_flight.saturating_sub(1);
    }

    /// Marks a volume upload as finished.
    pub fn volume_uploaded(&mut self) {
        self.volume_ready = true;
        self.abort_upload();
    }

    /// Marks a colormap upload as finished.
    pub fn colormap_uploaded(&mut self) {
        self.colormap_ready = true;
        self.abort_upload();
    }

    /// Returns true if a volume is resident.
    #[must_use]
    pub fn has_volume(&self) -> bool {
        self.volume_ready
    }

    /// Returns true if a colormap is resident.
    #[must_use]
    pub fn has_colormap(&self) -> bool {
        self.colormap_ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_until_both_uploaded() {
        let mut tracker = ReadinessTracker::new();
        assert_eq!(tracker.state(), RenderReadiness::NotReady);

        tracker.begin_upload();
        tracker.volume_uploaded();
        assert_eq!(tracker.state(), RenderReadiness::NotReady);

        tracker.begin_upload();
        tracker.colormap_uploaded();
        assert_eq!(tracker.state(), RenderReadiness::Ready);
    }

    #[test]
    fn test_swap_goes_through_uploading() {
        let mut tracker = ReadinessTracker::new();
        tracker.volume_uploaded();
        tracker.colormap_uploaded();

        tracker.begin_upload();
        assert_eq!(tracker.state(), RenderReadiness::Uploading);
        assert!(tracker.state().can_render());

        tracker.volume_uploaded();
        assert_eq!(tracker.state(), RenderReadiness::Ready);
    }

    #[test]
    fn test_failed_upload_restores_state() {
        let mut tracker = ReadinessTracker::new();
        tracker.volume_uploaded();
        tracker.colormap_uploaded();

        tracker.begin_upload();
        tracker.abort_upload();
        assert_eq!(tracker.state(), RenderReadiness::Ready);

        // Extra aborts never underflow.
        tracker.abort_upload();
        assert_eq!(tracker.state(), RenderReadiness::Ready);
    }

    #[test]
    fn test_not_ready_cannot_render() {
        assert!(!RenderReadiness::NotReady.can_render());
        assert!(RenderReadiness::Ready.can_render());
    }
}
