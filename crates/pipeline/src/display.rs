//! Worker-to-display handoff.

use std::sync::{Arc, Mutex};

use flowscope_frame_model::VisualizationImage;

/// Bounded single-slot handoff from the worker to the presentation layer.
///
/// `publish` replaces whatever is in the slot; a display side that falls
/// behind simply sees fewer images. Neither side ever blocks the other
/// beyond the slot's own lock, which is held only for the swap.
#[derive(Debug, Clone, Default)]
pub struct DisplaySlot {
    slot: Arc<Mutex<Option<VisualizationImage>>>,
}

impl DisplaySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `image` in the slot, discarding any unconsumed occupant.
    /// Returns whether an unconsumed image was dropped.
    pub fn publish(&self, image: VisualizationImage) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.replace(image).is_some()
    }

    /// Take the latest image, leaving the slot empty.
    pub fn take(&self) -> Option<VisualizationImage> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.take()
    }

    /// Whether an image is waiting.
    pub fn is_occupied(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_from_empty_slot_is_none() {
        let slot = DisplaySlot::new();
        assert!(slot.take().is_none());
        assert!(!slot.is_occupied());
    }

    #[test]
    fn publish_then_take_round_trips() {
        let slot = DisplaySlot::new();
        let dropped = slot.publish(VisualizationImage::blank(4, 4));
        assert!(!dropped);
        let image = slot.take().unwrap();
        assert_eq!((image.width(), image.height()), (4, 4));
        assert!(slot.take().is_none());
    }

    #[test]
    fn publish_replaces_unconsumed_occupant() {
        let slot = DisplaySlot::new();
        slot.publish(VisualizationImage::blank(4, 4));
        let dropped = slot.publish(VisualizationImage::blank(8, 8));
        assert!(dropped);

        // Only the newest image survives.
        let image = slot.take().unwrap();
        assert_eq!((image.width(), image.height()), (8, 8));
    }

    #[test]
    fn clones_share_the_slot() {
        let worker_side = DisplaySlot::new();
        let display_side = worker_side.clone();
        worker_side.publish(VisualizationImage::blank(2, 2));
        assert!(display_side.take().is_some());
    }
}
