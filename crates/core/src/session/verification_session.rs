use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::capture::domain::frame_source::FrameSource;
use crate::scoring::domain::scorer::{ScoreError, ScoreRequest, Scorer};
use crate::session::session_logger::SessionLogger;
use crate::shared::constants::{MSG_CAMERA_UNAVAILABLE, MSG_USER_ID_REQUIRED};
use crate::shared::frame::Frame;
use crate::shared::observation::Observation;
use crate::verification::domain::detection_loop::{DetectionLoop, Directive, PreviewOutcome};
use crate::verification::domain::detection_state::DetectionState;
use crate::verification::domain::verification_policy::{PolicyError, VerificationPolicy};

type Pending<T> = Pin<Box<dyn Future<Output = T> + Send>>;

type ScoreResult = Result<Observation, ScoreError>;

/// Per-session settings.
#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    pub policy: VerificationPolicy,
    /// Identity sent with every scorer request (admin login variant).
    pub user_id: Option<String>,
    /// Manual previews fail fast when `user_id` is blank.
    pub require_user_id: bool,
}

impl SessionConfig {
    fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }
}

/// Lifecycle inputs and user actions sent to a running session.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionCommand {
    Open,
    Close,
    SetChecking(bool),
    Capture,
    Retake,
    SelectDevice(String),
}

/// Notifications emitted by a running session.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Stable verification reached; emitted once per detection window.
    AutoCaptured(Frame),
    ManualCaptured(Frame),
    PreviewScored { similarity_percent: f64, verified: bool },
    /// A one-shot preview came back verified.
    ManualVerified,
    PreviewFailed(String),
    /// Manual capture found no frame to take.
    CaptureUnavailable,
    DeviceSelected(String),
    DeviceError(String),
}

/// Caller-side handle of a spawned verification session.
///
/// Dropping the handle (or calling [`SessionHandle::shutdown`]) ends the
/// session task, which cancels the timer and any outstanding request.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<DetectionState>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn open(&self) {
        self.send(SessionCommand::Open);
    }

    pub fn close(&self) {
        self.send(SessionCommand::Close);
    }

    pub fn set_checking(&self, is_checking: bool) {
        self.send(SessionCommand::SetChecking(is_checking));
    }

    pub fn capture(&self) {
        self.send(SessionCommand::Capture);
    }

    pub fn retake(&self) {
        self.send(SessionCommand::Retake);
    }

    pub fn select_device(&self, id: &str) {
        self.send(SessionCommand::SelectDevice(id.to_string()));
    }

    pub fn send(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            log::warn!("Verification session has already stopped");
        }
    }

    /// Latest published snapshot.
    pub fn state(&self) -> DetectionState {
        self.state.borrow().clone()
    }

    pub fn state_receiver(&self) -> watch::Receiver<DetectionState> {
        self.state.clone()
    }

    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }

    /// Waits for the next captured frame, automatic or manual, skipping
    /// other events. `None` once the session has ended.
    pub async fn next_capture(&mut self) -> Option<Frame> {
        while let Some(event) = self.events.recv().await {
            match event {
                SessionEvent::AutoCaptured(frame) | SessionEvent::ManualCaptured(frame) => {
                    return Some(frame)
                }
                other => log::debug!("Session event: {other:?}"),
            }
        }
        None
    }

    /// Stops the session task and waits for it to finish.
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            log::warn!("Verification session task failed: {e}");
        }
    }
}

/// Spawns verification sessions on the current tokio runtime.
pub struct VerificationSession;

impl VerificationSession {
    pub fn spawn<S: Scorer>(
        source: Arc<dyn FrameSource>,
        scorer: Arc<S>,
        config: SessionConfig,
        logger: Box<dyn SessionLogger>,
    ) -> Result<SessionHandle, PolicyError> {
        config.policy.validate()?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(DetectionState::default());

        let driver = SessionDriver {
            machine: DetectionLoop::new(config.policy.clone()),
            source,
            scorer,
            config,
            logger,
            deadline: None,
            in_flight: None,
            preview: None,
            state_tx,
            events: event_tx,
        };
        let task = tokio::spawn(driver.run(command_rx));

        Ok(SessionHandle {
            commands: command_tx,
            state: state_rx,
            events: event_rx,
            task,
        })
    }
}

struct ScoreSettled {
    ticket: u64,
    frame: Frame,
    started: Instant,
    result: ScoreResult,
}

/// Owns one session: the loop state machine plus the timer and the
/// outstanding futures its directives refer to.
struct SessionDriver<S> {
    machine: DetectionLoop,
    source: Arc<dyn FrameSource>,
    scorer: Arc<S>,
    config: SessionConfig,
    logger: Box<dyn SessionLogger>,
    deadline: Option<Instant>,
    in_flight: Option<Pending<ScoreSettled>>,
    preview: Option<Pending<(u64, ScoreResult)>>,
    state_tx: watch::Sender<DetectionState>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl<S: Scorer> SessionDriver<S> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                settled = next_settled(&mut self.in_flight) => self.handle_scored(settled),
                (ticket, result) = next_settled(&mut self.preview) => {
                    self.handle_preview(ticket, result)
                }
                () = sleep_until_deadline(self.deadline) => {
                    self.deadline = None;
                    let directives = self.machine.on_timer(&*self.source);
                    self.execute(directives);
                }
            }
            self.publish();
        }

        let directives = self.machine.close();
        self.execute(directives);
        self.preview = None;
        self.publish();
        self.logger.summary();
    }

    fn handle_command(&mut self, command: SessionCommand) {
        log::debug!("Session command: {command:?}");
        match command {
            SessionCommand::Open => {
                let directives = self.machine.open(&*self.source);
                self.execute(directives);
            }
            SessionCommand::Close => {
                self.preview = None;
                let directives = self.machine.close();
                self.execute(directives);
            }
            SessionCommand::SetChecking(is_checking) => {
                let directives = self.machine.set_checking(is_checking, &*self.source);
                self.execute(directives);
            }
            SessionCommand::Capture => self.capture(),
            SessionCommand::Retake => {
                self.preview = None;
                let directives = self.machine.retake(&*self.source);
                self.execute(directives);
            }
            SessionCommand::SelectDevice(id) => match self.source.select_device(&id) {
                Ok(()) => {
                    self.logger.info(&format!("Camera switched to {id}"));
                    self.emit(SessionEvent::DeviceSelected(id));
                    let directives = self.machine.poke(&*self.source);
                    self.execute(directives);
                }
                Err(e) => {
                    log::warn!("Camera switch failed: {e}");
                    self.emit(SessionEvent::DeviceError(e.to_string()));
                }
            },
        }
    }

    fn capture(&mut self) {
        let inputs = self.machine.inputs();
        if !inputs.is_open || inputs.has_capture {
            log::debug!(
                "Manual capture ignored (open: {}, captured: {})",
                inputs.is_open,
                inputs.has_capture
            );
            return;
        }
        let Some(frame) = self.source.grab_frame() else {
            log::warn!("{MSG_CAMERA_UNAVAILABLE}");
            self.emit(SessionEvent::CaptureUnavailable);
            return;
        };

        let directives = self.machine.capture();
        self.execute(directives);
        self.logger.info(&format!("Manual capture of frame {}", frame.index()));
        self.emit(SessionEvent::ManualCaptured(frame.clone()));
        self.start_preview(frame);
    }

    fn start_preview(&mut self, frame: Frame) {
        if self.config.require_user_id && self.config.user_id().is_none() {
            self.machine.reject_preview(MSG_USER_ID_REQUIRED);
            self.emit(SessionEvent::PreviewFailed(MSG_USER_ID_REQUIRED.to_string()));
            return;
        }

        let ticket = self.machine.begin_preview();
        let request = ScoreRequest::for_frame(&frame, self.config.user_id());
        let scorer = Arc::clone(&self.scorer);
        self.preview = Some(Box::pin(async move {
            (ticket, scorer.score(request).await)
        }));
    }

    fn handle_scored(&mut self, settled: ScoreSettled) {
        let ScoreSettled {
            ticket,
            frame,
            started,
            result,
        } = settled;

        self.logger
            .round_trip(started.elapsed().as_secs_f64() * 1000.0);
        match &result {
            Ok(observation) if observation.detected => {
                self.logger.similarity(observation.similarity_percent())
            }
            Ok(_) => {}
            Err(e) => self.logger.scorer_failed(&e.to_string()),
        }

        let directives = self.machine.on_scored(ticket, frame, result);
        self.execute(directives);
    }

    fn handle_preview(&mut self, ticket: u64, result: ScoreResult) {
        match self.machine.on_preview(ticket, result) {
            PreviewOutcome::Ignored => {}
            PreviewOutcome::Scored(observation) => {
                let similarity_percent = observation.similarity_percent();
                self.logger
                    .info(&format!("Preview similarity {similarity_percent:.1}%"));
                self.emit(SessionEvent::PreviewScored {
                    similarity_percent,
                    verified: observation.verified,
                });
                if observation.verified {
                    self.emit(SessionEvent::ManualVerified);
                }
            }
            PreviewOutcome::Failed(message) => self.emit(SessionEvent::PreviewFailed(message)),
        }
    }

    fn execute(&mut self, directives: Vec<Directive>) {
        for directive in directives {
            match directive {
                Directive::Arm(delay) => self.deadline = Some(Instant::now() + delay),
                Directive::Disarm => self.deadline = None,
                Directive::Abandon => self.in_flight = None,
                Directive::Score { ticket, frame } => {
                    let request = ScoreRequest::for_frame(&frame, self.config.user_id());
                    let scorer = Arc::clone(&self.scorer);
                    let started = Instant::now();
                    self.in_flight = Some(Box::pin(async move {
                        let result = scorer.score(request).await;
                        ScoreSettled {
                            ticket,
                            frame,
                            started,
                            result,
                        }
                    }));
                }
                Directive::AutoCapture(frame) => {
                    self.logger
                        .info(&format!("Auto-captured frame {}", frame.index()));
                    self.emit(SessionEvent::AutoCaptured(frame.clone()));
                    if self.machine.policy().preview_auto_capture {
                        self.start_preview(frame);
                    }
                }
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        // The caller may have stopped listening; the session carries on.
        let _ = self.events.send(event);
    }

    fn publish(&self) {
        let current = self.machine.state();
        self.state_tx.send_if_modified(|published| {
            if *published == *current {
                false
            } else {
                *published = current.clone();
                true
            }
        });
    }
}

/// Resolves with the slot's output and empties it; pends forever when empty.
async fn next_settled<T>(slot: &mut Option<Pending<T>>) -> T {
    let Some(pending) = slot.as_mut() else {
        return std::future::pending().await;
    };
    let output = pending.await;
    *slot = None;
    output
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
