use crate::shared::observation::Observation;
use crate::verification::domain::detection_state::DetectionState;
use crate::verification::domain::verification_policy::VerificationPolicy;

/// Outcome of folding one observation into the tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Hold,
    /// The run of positives reached the required length.
    Capture,
}

/// Debounces per-frame observations into a capture trigger.
///
/// Capture fires only after `required_hits` back-to-back positives. The
/// counter lives in [`DetectionState`]; the tracker holds configuration only.
#[derive(Clone, Debug, PartialEq)]
pub struct StabilityTracker {
    threshold_percent: f64,
    required_hits: u32,
}

impl StabilityTracker {
    pub fn new(threshold_percent: f64, required_hits: u32) -> Self {
        Self {
            threshold_percent,
            required_hits: required_hits.max(1),
        }
    }

    pub fn from_policy(policy: &VerificationPolicy) -> Self {
        Self::new(policy.threshold_percent, policy.required_hits)
    }

    pub fn is_positive(&self, observation: &Observation) -> bool {
        observation.detected
            && observation.verified
            && observation.similarity_percent() >= self.threshold_percent
    }

    pub fn observe(&self, state: &mut DetectionState, observation: &Observation) -> Verdict {
        if !observation.detected {
            state.last_similarity = None;
            state.consecutive_hits = 0;
            return Verdict::Hold;
        }

        state.last_similarity = Some(observation.similarity_percent());

        if !self.is_positive(observation) {
            state.consecutive_hits = 0;
            return Verdict::Hold;
        }

        state.consecutive_hits += 1;
        if state.consecutive_hits >= self.required_hits {
            state.consecutive_hits = 0;
            Verdict::Capture
        } else {
            Verdict::Hold
        }
    }

    /// A failed or absent response counts the same as "no face".
    pub fn record_failure(&self, state: &mut DetectionState) {
        state.last_similarity = None;
        state.consecutive_hits = 0;
    }
}

impl Default for StabilityTracker {
    fn default() -> Self {
        Self::from_policy(&VerificationPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn run(observations: &[Observation]) -> (DetectionState, Vec<Verdict>) {
        let tracker = StabilityTracker::default();
        let mut state = DetectionState::default();
        let verdicts = observations
            .iter()
            .map(|o| tracker.observe(&mut state, o))
            .collect();
        (state, verdicts)
    }

    #[test]
    fn test_two_consecutive_positives_capture_after_second() {
        let (state, verdicts) = run(&[Observation::new(0.72, true), Observation::new(0.75, true)]);
        assert_eq!(verdicts, vec![Verdict::Hold, Verdict::Capture]);
        assert_eq!(state.consecutive_hits, 0);
        assert_relative_eq!(state.last_similarity.unwrap(), 75.0);
    }

    #[test]
    fn test_positive_then_negative_never_captures() {
        let (state, verdicts) = run(&[
            Observation::new(0.9, true),
            Observation::new(0.5, false),
            Observation::new(0.9, true),
        ]);
        assert!(!verdicts.contains(&Verdict::Capture));
        assert_eq!(state.consecutive_hits, 1);
    }

    #[test]
    fn test_no_face_resets_and_clears_similarity() {
        let (state, verdicts) = run(&[Observation::new(0.95, true), Observation::no_face()]);
        assert_eq!(verdicts, vec![Verdict::Hold, Verdict::Hold]);
        assert_eq!(state.consecutive_hits, 0);
        assert!(state.last_similarity.is_none());
    }

    #[rstest]
    #[case::exactly_threshold(0.70, true, true)]
    #[case::below_threshold(0.6999, true, false)]
    #[case::high_but_unverified(0.99, false, false)]
    #[case::verified_low(0.2, true, false)]
    fn test_positive_rule(#[case] similarity: f64, #[case] verified: bool, #[case] expected: bool) {
        let tracker = StabilityTracker::default();
        assert_eq!(
            tracker.is_positive(&Observation::new(similarity, verified)),
            expected
        );
    }

    #[test]
    fn test_capture_resets_counter_for_next_window() {
        let (state, verdicts) = run(&[Observation::new(0.8, true); 4]);
        assert_eq!(
            verdicts,
            vec![Verdict::Hold, Verdict::Capture, Verdict::Hold, Verdict::Capture]
        );
        assert_eq!(state.consecutive_hits, 0);
    }

    #[test]
    fn test_single_hit_policy_captures_immediately() {
        let tracker = StabilityTracker::new(70.0, 1);
        let mut state = DetectionState::default();
        assert_eq!(
            tracker.observe(&mut state, &Observation::new(0.8, true)),
            Verdict::Capture
        );
    }

    #[test]
    fn test_failure_resets() {
        let tracker = StabilityTracker::default();
        let mut state = DetectionState::default();
        tracker.observe(&mut state, &Observation::new(0.8, true));
        tracker.record_failure(&mut state);
        assert_eq!(state.consecutive_hits, 0);
        assert!(state.last_similarity.is_none());
    }

    #[test]
    fn test_zero_required_hits_is_clamped() {
        let tracker = StabilityTracker::new(70.0, 0);
        let mut state = DetectionState::default();
        assert_eq!(
            tracker.observe(&mut state, &Observation::new(0.8, true)),
            Verdict::Capture
        );
    }
}
