/// Where the detection loop is in its polling cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopPhase {
    /// Session closed, image captured, or check-in in progress.
    #[default]
    Idle,
    /// A cycle is running: grabbing a frame or awaiting the scorer.
    Polling,
    /// Cycle finished; the next attempt is armed.
    Waiting,
}

/// Session-scoped verification state, as shown to the user.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionState {
    pub phase: LoopPhase,
    pub in_flight: bool,
    pub consecutive_hits: u32,
    /// Last displayed similarity on the 0-100 scale.
    pub last_similarity: Option<f64>,
    pub last_error: Option<String>,
    /// A manual (one-shot) preview request is outstanding.
    pub is_previewing: bool,
}

impl DetectionState {
    /// Clears what the user sees (similarity, error, hit count) without
    /// touching loop bookkeeping.
    pub fn clear_readings(&mut self) {
        self.consecutive_hits = 0;
        self.last_similarity = None;
        self.last_error = None;
        self.is_previewing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle_and_empty() {
        let state = DetectionState::default();
        assert_eq!(state.phase, LoopPhase::Idle);
        assert!(!state.in_flight);
        assert_eq!(state.consecutive_hits, 0);
        assert!(state.last_similarity.is_none());
    }

    #[test]
    fn test_clear_readings_keeps_phase() {
        let mut state = DetectionState {
            phase: LoopPhase::Waiting,
            in_flight: false,
            consecutive_hits: 1,
            last_similarity: Some(81.0),
            last_error: Some("boom".into()),
            is_previewing: true,
        };
        state.clear_readings();
        assert_eq!(state.phase, LoopPhase::Waiting);
        assert_eq!(state.consecutive_hits, 0);
        assert!(state.last_similarity.is_none());
        assert!(state.last_error.is_none());
        assert!(!state.is_previewing);
    }
}
