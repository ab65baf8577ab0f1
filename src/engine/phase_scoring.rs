use super::orchestrator::SessionEngine;
use super::types::{AppPhase, CalibratedJoint, EngineOutput, FinalReport};
use crate::events::EngineEvent;
use crate::scoring::{Grade, SessionReport};
use tracing::info;

impl SessionEngine {
    /// Produce the final report once; later frames get the cached copy
    pub(super) fn process_scoring(&mut self, timestamp_ms: u64) -> EngineOutput {
        let mut output = EngineOutput::new(AppPhase::Scoring);
        if let Some(report) = &self.final_report {
            output.final_report = Some(report.clone());
            return output;
        }

        if let Some(event) = self.pain.close_episode(timestamp_ms) {
            self.scorer.add_pain_event(event);
        }
        let report = self.build_final_report(self.scorer.compute_session_report());
        info!(
            "Session {} scored {:.1} ({}) over {} reps",
            report.session_id, report.total_score, report.grade, report.total_reps
        );

        self.events.push(EngineEvent::SessionCompleted {
            total_score: report.total_score,
            total_reps: report.total_reps,
            timestamp_ms,
        });
        output.transition = Some(self.transition_to(
            AppPhase::Completed,
            timestamp_ms,
            "Report ready",
        ));

        self.final_report = Some(report.clone());
        output.final_report = Some(report);
        output
    }

    fn build_final_report(&self, report: SessionReport) -> FinalReport {
        let state = &self.state;
        let averages = report.average_scores;
        let total_score = if report.total_reps > 0 {
            averages.total
        } else {
            state.average_score
        };
        let grade = Grade::from_score(total_score);

        let calibrated_joints = state
            .calibrated_joints
            .iter()
            .map(|(&joint, &max_angle)| CalibratedJoint {
                joint,
                joint_name: joint.display_name().to_string(),
                max_angle,
            })
            .collect();

        FinalReport {
            session_id: state.session_id.clone(),
            exercise_name: report.exercise_name,
            duration_seconds: state.elapsed_ms() / 1000,
            total_score,
            rom_score: averages.rom,
            stability_score: averages.stability,
            flow_score: averages.flow,
            symmetry_score: averages.symmetry,
            compensation_score: averages.compensation,
            grade: grade.label().to_string(),
            grade_color: grade.color().to_string(),
            total_reps: report.total_reps,
            fatigue_level: report.fatigue.fatigue_level,
            fatigue_trend: report.fatigue.trend,
            calibrated_joints,
            primary_joint: state.primary_joint,
            primary_max_angle: state.primary_max_angle,
            rep_scores: report.rep_scores,
            pain_events: report.pain_events,
            pain_summary: self.pain.summary(),
            recommendations: report.recommendations,
        }
    }
}
