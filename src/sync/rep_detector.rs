use super::exercise::MotionPhase;
use crate::config::FreeTrainingConfig;
use tracing::debug;

/// Threshold rise/fall state machine counting reps without a reference video
#[derive(Debug, Clone)]
pub struct RepDetector {
    max_angle: f64,
    low_ratio: f64,
    high_ratio: f64,
    eccentric_drop: f64,
    hold_drop: f64,
    phase: MotionPhase,
    peak_angle: f64,
    last_angle: f64,
    rep_count: u32,
}

impl RepDetector {
    pub fn new(max_angle: f64, config: &FreeTrainingConfig) -> Self {
        Self {
            max_angle,
            low_ratio: config.low_ratio,
            high_ratio: config.high_ratio,
            eccentric_drop: config.eccentric_drop,
            hold_drop: config.hold_drop,
            phase: MotionPhase::Idle,
            peak_angle: 0.0,
            last_angle: 0.0,
            rep_count: 0,
        }
    }

    fn low(&self) -> f64 {
        self.low_ratio * self.max_angle
    }

    fn high(&self) -> f64 {
        self.high_ratio * self.max_angle
    }

    /// Feed one angle; returns true when it completes a rep
    pub fn update(&mut self, angle: f64) -> bool {
        self.peak_angle = self.peak_angle.max(angle);
        let mut completed = false;

        match self.phase {
            MotionPhase::Idle => {
                if angle > self.low() {
                    self.phase = MotionPhase::Concentric;
                    self.peak_angle = angle;
                }
            }
            MotionPhase::Concentric => {
                if angle >= self.high() {
                    self.phase = MotionPhase::Hold;
                } else if angle < self.last_angle - self.eccentric_drop {
                    self.phase = MotionPhase::Eccentric;
                }
            }
            MotionPhase::Hold => {
                if angle < self.peak_angle - self.hold_drop {
                    self.phase = MotionPhase::Eccentric;
                }
            }
            MotionPhase::Eccentric => {
                if angle < self.low() {
                    self.rep_count += 1;
                    self.phase = MotionPhase::Idle;
                    self.peak_angle = 0.0;
                    completed = true;
                    debug!("Free-training rep {} detected", self.rep_count);
                }
            }
        }

        self.last_angle = angle;
        completed
    }

    pub fn phase(&self) -> MotionPhase {
        self.phase
    }

    pub fn rep_count(&self) -> u32 {
        self.rep_count
    }

    pub fn max_angle(&self) -> f64 {
        self.max_angle
    }

    pub fn reset(&mut self) {
        self.phase = MotionPhase::Idle;
        self.peak_angle = 0.0;
        self.last_angle = 0.0;
        self.rep_count = 0;
    }
}
