/// Whether a refresh cycle re-fetches everything or only what changed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RefreshKind {
    /// Full bounding-box fetch that replaces the retained feature set.
    Keyframe,
    /// Time-filtered fetch merged onto the retained feature set.
    Delta,
}

/// Metadata for one refresh cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RefreshFrame {
    /// 0-based cycle index.
    pub index: u64,
    pub kind: RefreshKind,
}

impl RefreshFrame {
    pub fn is_keyframe(&self) -> bool {
        self.kind == RefreshKind::Keyframe
    }
}

/// Refresh-cycle counter.
///
/// Cycle 0 and every `keyframe_interval`-th cycle after it are keyframes; the
/// cycles in between are deltas. This bounds drift from an incremental stream
/// while keeping most refreshes cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshClock {
    next_index: u64,
    keyframe_interval: u64,
    force_keyframe: bool,
}

impl RefreshClock {
    pub fn new(keyframe_interval: u64) -> Self {
        Self {
            next_index: 0,
            keyframe_interval: keyframe_interval.max(1),
            force_keyframe: false,
        }
    }

    pub fn keyframe_interval(&self) -> u64 {
        self.keyframe_interval
    }

    /// Number of cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.next_index
    }

    /// Makes the next cycle a keyframe regardless of its index.
    pub fn force_keyframe(&mut self) {
        self.force_keyframe = true;
    }

    pub fn peek(&self) -> RefreshFrame {
        let kind = if self.force_keyframe || self.next_index % self.keyframe_interval == 0 {
            RefreshKind::Keyframe
        } else {
            RefreshKind::Delta
        };
        RefreshFrame {
            index: self.next_index,
            kind,
        }
    }

    /// Starts the next cycle.
    pub fn advance(&mut self) -> RefreshFrame {
        let frame = self.peek();
        self.next_index += 1;
        self.force_keyframe = false;
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::{RefreshClock, RefreshKind};

    #[test]
    fn every_nth_cycle_is_a_keyframe() {
        let mut clock = RefreshClock::new(3);
        let kinds: Vec<_> = (0..7).map(|_| clock.advance().kind).collect();
        assert_eq!(
            kinds,
            vec![
                RefreshKind::Keyframe,
                RefreshKind::Delta,
                RefreshKind::Delta,
                RefreshKind::Keyframe,
                RefreshKind::Delta,
                RefreshKind::Delta,
                RefreshKind::Keyframe,
            ]
        );
        assert_eq!(clock.cycles(), 7);
    }

    #[test]
    fn forced_keyframe_applies_once() {
        let mut clock = RefreshClock::new(10);
        assert!(clock.advance().is_keyframe());
        clock.force_keyframe();
        assert!(clock.peek().is_keyframe());
        assert!(clock.advance().is_keyframe());
        assert!(!clock.advance().is_keyframe());
    }

    #[test]
    fn zero_interval_means_always_keyframe() {
        let mut clock = RefreshClock::new(0);
        assert_eq!(clock.keyframe_interval(), 1);
        assert!(clock.advance().is_keyframe());
        assert!(clock.advance().is_keyframe());
    }
}
