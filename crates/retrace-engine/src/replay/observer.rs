use retrace_common::{RecordedStep, ReplayRun, RunStatus, StepResult};
use tracing::{info, warn};

/// Receives run events. Observers only consume; they cannot steer the run.
pub trait ReplayObserver: Send + Sync {
    fn run_started(&self, _total_steps: usize) {}

    fn step_started(&self, _step: &RecordedStep) {}

    fn step_finished(&self, _result: &StepResult) {}

    fn run_finished(&self, _run: &ReplayRun) {}
}

/// Emits every run event as a structured `tracing` event.
pub struct TracingObserver;

impl ReplayObserver for TracingObserver {
    fn run_started(&self, total_steps: usize) {
        info!(total_steps, "Replay started");
    }

    fn step_started(&self, step: &RecordedStep) {
        info!(
            step = step.index,
            action = step.action.name(),
            "Executing step"
        );
    }

    fn step_finished(&self, result: &StepResult) {
        let selector = result.selector_used.as_ref().map(|c| c.to_string());
        if result.succeeded {
            info!(
                step = result.step_index,
                action = %result.action,
                attempts = result.attempts_made,
                skipped = result.skipped,
                selector = selector.as_deref().unwrap_or("-"),
                "Step succeeded"
            );
        } else {
            warn!(
                step = result.step_index,
                action = %result.action,
                attempts = result.attempts_made,
                error = result.error_message.as_deref().unwrap_or("-"),
                "Step failed"
            );
        }
    }

    fn run_finished(&self, run: &ReplayRun) {
        match run.status {
            RunStatus::Completed => info!(steps = run.results.len(), "Replay completed"),
            status => warn!(
                ?status,
                steps = run.results.len(),
                stopped_at = run.current_step_index,
                "Replay did not complete"
            ),
        }
    }
}
