//! Reference frame storage.

use flowscope_frame_model::Frame;

/// Single-slot holder for the baseline frame.
///
/// Empty at startup. While the pipeline is idle the slot is replaced with
/// every newly normalized frame; entering monitoring mode freezes it. Not
/// internally synchronized — the serial worker is the only accessor.
#[derive(Debug, Default)]
pub struct ReferenceSlot {
    frame: Option<Frame>,
}

impl ReferenceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally store `frame`, discarding any previous value.
    pub fn replace(&mut self, frame: Frame) {
        self.frame = Some(frame);
    }

    /// The currently held frame, if any.
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Whether a baseline is held.
    pub fn is_set(&self) -> bool {
        self.frame.is_some()
    }

    /// Empty the slot.
    pub fn clear(&mut self) {
        self.frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, fill: u8) -> Frame {
        Frame::from_rgba(
            width,
            height,
            vec![fill; (width * height * 4) as usize],
        )
        .unwrap()
    }

    #[test]
    fn starts_empty() {
        let slot = ReferenceSlot::new();
        assert!(!slot.is_set());
        assert!(slot.frame().is_none());
    }

    #[test]
    fn replace_discards_previous_frame() {
        let mut slot = ReferenceSlot::new();
        slot.replace(frame(2, 2, 1));
        slot.replace(frame(2, 2, 9));
        assert_eq!(slot.frame().unwrap().rgba(0, 0), Some([9, 9, 9, 9]));
    }

    #[test]
    fn clear_empties_the_slot() {
        let mut slot = ReferenceSlot::new();
        slot.replace(frame(2, 2, 1));
        slot.clear();
        assert!(!slot.is_set());
    }
}
