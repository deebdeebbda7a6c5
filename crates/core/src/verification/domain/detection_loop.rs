use std::time::Duration;

use crate::capture::domain::frame_source::FrameSource;
use crate::scoring::domain::scorer::ScoreError;
use crate::shared::constants::{MSG_SIMILARITY_CHECK_FAILED, MSG_SIMILARITY_PREVIEW_FAILED};
use crate::shared::frame::Frame;
use crate::shared::observation::Observation;
use crate::verification::domain::detection_state::{DetectionState, LoopPhase};
use crate::verification::domain::stability_tracker::{StabilityTracker, Verdict};
use crate::verification::domain::verification_policy::VerificationPolicy;

/// Lifecycle inputs owned by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionInputs {
    pub is_open: bool,
    pub has_capture: bool,
    /// A check-in submission is running; polling pauses meanwhile.
    pub is_checking: bool,
}

impl SessionInputs {
    pub fn allows_polling(&self) -> bool {
        self.is_open && !self.has_capture && !self.is_checking
    }
}

/// Side effects requested by a transition, executed in order by the driver.
#[derive(Clone, Debug, PartialEq)]
pub enum Directive {
    /// Arm the single session timer, replacing any pending one.
    Arm(Duration),
    Disarm,
    /// Send `frame` to the scorer; the settlement must quote `ticket`.
    Score { ticket: u64, frame: Frame },
    /// Drop the outstanding scorer request.
    Abandon,
    /// Hand the frame to the caller as the verification result.
    AutoCapture(Frame),
}

/// How a manual preview settlement was applied.
#[derive(Clone, Debug, PartialEq)]
pub enum PreviewOutcome {
    /// Stale ticket or closed session; nothing changed.
    Ignored,
    Scored(Observation),
    Failed(String),
}

/// Explicit state machine for the polling cycle.
///
/// Idle -> Polling when the inputs allow it, Polling -> Waiting when a cycle
/// settles (poll interval) or finds no frame (retry interval), Waiting ->
/// Polling when the timer fires, and any state -> Idle on close, capture, or
/// check-in. Transitions never touch the clock or the network; they return
/// [`Directive`]s for the session driver.
///
/// At most one scorer request is outstanding. Every request carries a ticket
/// and stopping bumps the current ticket, so a settlement that arrives after
/// a stop is ignored.
pub struct DetectionLoop {
    policy: VerificationPolicy,
    tracker: StabilityTracker,
    inputs: SessionInputs,
    state: DetectionState,
    ticket: u64,
    preview_ticket: u64,
}

impl DetectionLoop {
    pub fn new(policy: VerificationPolicy) -> Self {
        Self {
            tracker: StabilityTracker::from_policy(&policy),
            policy,
            inputs: SessionInputs::default(),
            state: DetectionState::default(),
            ticket: 0,
            preview_ticket: 0,
        }
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    pub fn inputs(&self) -> SessionInputs {
        self.inputs
    }

    pub fn policy(&self) -> &VerificationPolicy {
        &self.policy
    }

    pub fn open(&mut self, source: &dyn FrameSource) -> Vec<Directive> {
        let inputs = SessionInputs {
            is_open: true,
            ..self.inputs
        };
        self.apply_inputs(inputs, source)
    }

    /// Closes the session and discards its state.
    pub fn close(&mut self) -> Vec<Directive> {
        let directives = self.stop();
        self.inputs = SessionInputs::default();
        self.preview_ticket += 1;
        self.state = DetectionState::default();
        directives
    }

    pub fn set_checking(&mut self, is_checking: bool, source: &dyn FrameSource) -> Vec<Directive> {
        let inputs = SessionInputs {
            is_checking,
            ..self.inputs
        };
        self.apply_inputs(inputs, source)
    }

    /// Records a manual capture; polling stops because an image now exists.
    pub fn capture(&mut self) -> Vec<Directive> {
        self.inputs.has_capture = true;
        self.stop()
    }

    /// Forgets the captured image and readings, re-enabling polling.
    pub fn retake(&mut self, source: &dyn FrameSource) -> Vec<Directive> {
        self.preview_ticket += 1;
        self.state.clear_readings();
        let inputs = SessionInputs {
            has_capture: false,
            ..self.inputs
        };
        self.apply_inputs(inputs, source)
    }

    /// Runs a cycle now if polling is allowed (e.g. after a camera switch).
    pub fn poke(&mut self, source: &dyn FrameSource) -> Vec<Directive> {
        if self.state.phase == LoopPhase::Idle {
            return Vec::new();
        }
        self.run_cycle(source)
    }

    pub fn on_timer(&mut self, source: &dyn FrameSource) -> Vec<Directive> {
        if self.state.phase == LoopPhase::Idle {
            return Vec::new();
        }
        self.run_cycle(source)
    }

    pub fn on_scored(
        &mut self,
        ticket: u64,
        frame: Frame,
        result: Result<Observation, ScoreError>,
    ) -> Vec<Directive> {
        if !self.state.in_flight || ticket != self.ticket {
            log::debug!("Ignoring stale scorer result (ticket {ticket}, current {})", self.ticket);
            return Vec::new();
        }
        self.state.in_flight = false;

        match result {
            Ok(observation) => {
                self.state.last_error = None;
                if self.tracker.observe(&mut self.state, &observation) == Verdict::Capture {
                    log::info!(
                        "Stable verification reached at {:.1}%, capturing frame {}",
                        observation.similarity_percent(),
                        frame.index()
                    );
                    self.inputs.has_capture = true;
                    let mut directives = self.stop();
                    directives.push(Directive::AutoCapture(frame));
                    return directives;
                }
            }
            Err(e) => {
                log::warn!("Similarity check failed: {e}");
                self.tracker.record_failure(&mut self.state);
                self.state.last_error = Some(MSG_SIMILARITY_CHECK_FAILED.to_string());
            }
        }

        if !self.inputs.allows_polling() {
            return self.stop();
        }
        self.state.phase = LoopPhase::Waiting;
        vec![Directive::Arm(self.policy.poll_interval)]
    }

    /// Starts a one-shot preview and returns its ticket.
    pub fn begin_preview(&mut self) -> u64 {
        self.preview_ticket += 1;
        self.state.is_previewing = true;
        self.state.last_error = None;
        self.preview_ticket
    }

    /// Fails a preview locally, before any network call.
    pub fn reject_preview(&mut self, message: &str) {
        self.state.is_previewing = false;
        self.state.last_similarity = None;
        self.state.last_error = Some(message.to_string());
    }

    pub fn on_preview(
        &mut self,
        ticket: u64,
        result: Result<Observation, ScoreError>,
    ) -> PreviewOutcome {
        if ticket != self.preview_ticket || !self.inputs.is_open {
            return PreviewOutcome::Ignored;
        }
        self.state.is_previewing = false;

        match result {
            Ok(observation) => {
                self.state.last_similarity = Some(observation.similarity_percent());
                PreviewOutcome::Scored(observation)
            }
            Err(e) => {
                log::warn!("Similarity preview failed: {e}");
                let message = e
                    .detail()
                    .unwrap_or(MSG_SIMILARITY_PREVIEW_FAILED)
                    .to_string();
                self.state.last_similarity = None;
                self.state.last_error = Some(message.clone());
                PreviewOutcome::Failed(message)
            }
        }
    }

    fn apply_inputs(&mut self, inputs: SessionInputs, source: &dyn FrameSource) -> Vec<Directive> {
        self.inputs = inputs;
        if inputs.allows_polling() {
            self.run_cycle(source)
        } else {
            self.stop()
        }
    }

    fn run_cycle(&mut self, source: &dyn FrameSource) -> Vec<Directive> {
        if !self.inputs.allows_polling() {
            return self.stop();
        }
        if self.state.in_flight {
            log::debug!("Detection cycle deferred: request still in flight");
            return vec![Directive::Arm(self.policy.retry_interval)];
        }

        let mut directives = Vec::new();
        if self.state.phase == LoopPhase::Waiting {
            directives.push(Directive::Disarm);
        }
        self.state.phase = LoopPhase::Polling;

        match source.grab_frame() {
            None => {
                self.state.phase = LoopPhase::Waiting;
                directives.push(Directive::Arm(self.policy.retry_interval));
            }
            Some(frame) => {
                self.ticket += 1;
                self.state.in_flight = true;
                directives.push(Directive::Score {
                    ticket: self.ticket,
                    frame,
                });
            }
        }
        directives
    }

    fn stop(&mut self) -> Vec<Directive> {
        let mut directives = Vec::new();
        if self.state.in_flight {
            self.state.in_flight = false;
            self.ticket += 1;
            directives.push(Directive::Abandon);
        }
        if self.state.phase != LoopPhase::Idle {
            directives.push(Directive::Disarm);
            self.state.phase = LoopPhase::Idle;
        }
        directives
    }
}
