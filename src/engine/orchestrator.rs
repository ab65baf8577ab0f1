use super::phase_sync::SyncRuntime;
use super::state::EngineState;
use super::types::{AppPhase, EngineOutput, FinalReport, Transition};
use crate::calibration::{Calibrator, SafeMaxCalibrator, UserProfile};
use crate::config::MemotionConfig;
use crate::error::EngineError;
use crate::events::{EngineEvent, EventQueue};
use crate::landmarks::LandmarkSet;
use crate::pain::{PainAnalyzer, PainDetector};
use crate::scoring::{HealthScorer, Scorer};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Lazy initialization outcome
#[derive(Debug, Clone, PartialEq)]
pub(super) enum InitStatus {
    Pending,
    Ready,
    Failed(String),
}

/// Drives one user through detection, calibration, synchronized exercise and scoring
pub struct SessionEngine {
    pub(super) config: MemotionConfig,
    pub(super) instance_id: String,
    pub(super) user_id: String,
    pub(super) state: EngineState,
    pub(super) init: InitStatus,

    // Components
    pub(super) calibrator: Box<dyn Calibrator>,
    pub(super) scorer: Box<dyn Scorer>,
    pub(super) pain: Box<dyn PainAnalyzer>,
    pub(super) runtime: Option<SyncRuntime>,

    // Session products
    pub(super) profile: Option<UserProfile>,
    pub(super) final_report: Option<FinalReport>,
    pub(super) face_baseline: Vec<LandmarkSet>,
    pub(super) events: EventQueue,
}

impl SessionEngine {
    /// Create an engine with the built-in calibrator, scorer and pain detector
    pub fn new(config: MemotionConfig) -> Self {
        let calibrator = Box::new(SafeMaxCalibrator::new(config.calibration.clone()));
        let scorer = Box::new(HealthScorer::new(config.scoring.clone()));
        let pain = Box::new(PainDetector::new(config.pain.clone()));
        Self::with_components(config, calibrator, scorer, pain)
    }

    /// Create an engine around caller-supplied components
    pub fn with_components(
        config: MemotionConfig,
        calibrator: Box<dyn Calibrator>,
        scorer: Box<dyn Scorer>,
        pain: Box<dyn PainAnalyzer>,
    ) -> Self {
        let instance_id = Uuid::new_v4().to_string();
        let state = EngineState::new(
            Uuid::new_v4().to_string(),
            config.calibration.joints.clone(),
        );
        let events = EventQueue::new(config.session.event_queue_capacity);
        debug!("Session engine {} created", instance_id);

        Self {
            config,
            instance_id,
            user_id: "anonymous".to_string(),
            state,
            init: InitStatus::Pending,
            calibrator,
            scorer,
            pain,
            runtime: None,
            profile: None,
            final_report: None,
            face_baseline: Vec::new(),
            events,
        }
    }

    pub fn with_user_id<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Process one camera frame; errors are reported in the output, never returned
    pub fn process_frame(
        &mut self,
        landmarks: &LandmarkSet,
        face_landmarks: Option<&LandmarkSet>,
        timestamp_ms: u64,
    ) -> EngineOutput {
        if let Err(e) = self.ensure_initialized() {
            return EngineOutput::failure(self.state.current_phase, &e);
        }

        self.state.started_ms.get_or_insert(timestamp_ms);
        self.state.last_frame_ms = Some(timestamp_ms);

        match self.state.current_phase {
            AppPhase::Detection => self.process_detection(landmarks, timestamp_ms),
            AppPhase::Calibration => {
                self.process_calibration(landmarks, face_landmarks, timestamp_ms)
            }
            AppPhase::Sync => self.process_sync(landmarks, face_landmarks, timestamp_ms),
            AppPhase::Scoring | AppPhase::Completed => self.process_scoring(timestamp_ms),
        }
    }

    fn ensure_initialized(&mut self) -> Result<(), EngineError> {
        match &self.init {
            InitStatus::Ready => Ok(()),
            InitStatus::Failed(reason) => Err(EngineError::NotInitialized {
                reason: reason.clone(),
            }),
            InitStatus::Pending => match self.config.validate() {
                Ok(()) => {
                    info!(
                        "Session engine {} initialized for user {}",
                        self.instance_id, self.user_id
                    );
                    self.init = InitStatus::Ready;
                    Ok(())
                }
                Err(e) => {
                    let reason = e.to_string();
                    error!("Session engine {} failed to initialize: {}", self.instance_id, reason);
                    self.init = InitStatus::Failed(reason.clone());
                    Err(EngineError::NotInitialized { reason })
                }
            },
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.init == InitStatus::Ready
    }

    /// Move to `to`, record the change and describe it for the output
    pub(super) fn transition_to(
        &mut self,
        to: AppPhase,
        timestamp_ms: u64,
        message: &str,
    ) -> Transition {
        let from = self.state.current_phase;
        self.state.current_phase = to;
        info!("Phase {} -> {}: {}", from.name(), to.name(), message);
        self.events.push(EngineEvent::PhaseChanged {
            from,
            to,
            timestamp_ms,
        });
        Transition {
            from_phase: from.number(),
            to_phase: to.number(),
            message: message.to_string(),
        }
    }

    /// Freeze the exercise; only meaningful during sync
    pub fn pause(&mut self) -> bool {
        if self.state.current_phase != AppPhase::Sync || self.state.is_paused {
            return false;
        }
        self.state.is_paused = true;
        if let Some(SyncRuntime::Video { video, .. }) = self.runtime.as_mut() {
            video.pause();
        }
        info!("Session {} paused", self.state.session_id);
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state.current_phase != AppPhase::Sync || !self.state.is_paused {
            return false;
        }
        self.state.is_paused = false;
        // Playback restarts from the next frame's sync status
        if let Some(SyncRuntime::Video {
            loop_started_for, ..
        }) = self.runtime.as_mut()
        {
            *loop_started_for = None;
        }
        info!("Session {} resumed", self.state.session_id);
        true
    }

    /// Start over from detection with fresh state and components
    pub fn restart(&mut self) {
        info!("Restarting session engine {}", self.instance_id);
        self.state = EngineState::new(
            Uuid::new_v4().to_string(),
            self.config.calibration.joints.clone(),
        );
        self.calibrator.reset();
        self.pain.reset();
        // The scorer is reset by start_session when sync begins again
        self.runtime = None;
        self.profile = None;
        self.final_report = None;
        self.face_baseline.clear();
    }

    /// Jump forward to phase `number`; returns false when the phase is not ahead
    pub fn skip_to_phase(&mut self, number: u8) -> Result<bool, EngineError> {
        let target = AppPhase::from_number(number)?;
        let current = self.state.current_phase;
        if target <= current || current == AppPhase::Completed {
            return Ok(false);
        }

        let timestamp_ms = self.state.last_frame_ms.unwrap_or(0);
        if target >= AppPhase::Sync && self.runtime.is_none() {
            self.enter_sync(timestamp_ms);
        }
        let message = format!("Skipped to {}", target.name());
        self.transition_to(target, timestamp_ms, &message);
        Ok(true)
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain()
    }

    pub fn user_profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn final_report(&self) -> Option<&FinalReport> {
        self.final_report.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.state.current_phase == AppPhase::Completed
    }

    pub fn current_phase(&self) -> AppPhase {
        self.state.current_phase
    }

    pub fn last_activity_ms(&self) -> Option<u64> {
        self.state.last_frame_ms
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn session_id(&self) -> &str {
        &self.state.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config(&self) -> &MemotionConfig {
        &self.config
    }
}
