use crate::result::{ReplayRun, RunStatus, StepResult};
use crate::selector::SelectorCandidate;

/// Render a finished run as a human-readable report, one line per recorded result.
pub fn format_run(run: &ReplayRun, total_steps: usize) -> String {
    let mut output = String::new();

    for result in &run.results {
        output.push_str(&format_step(result));
        output.push('\n');
    }

    let attempted = run.results.len();
    let summary = match run.status {
        RunStatus::Completed => format!(
            "Replay completed: {}/{} steps ({} skipped)",
            run.succeeded_count(),
            total_steps,
            run.skipped_count()
        ),
        RunStatus::Cancelled => format!(
            "Replay cancelled before step {} ({}/{} steps recorded)",
            run.current_step_index, attempted, total_steps
        ),
        RunStatus::Failed => match run.failed_step() {
            Some(step) => format!(
                "Replay failed at step {} ({}/{} steps recorded)",
                step.step_index, attempted, total_steps
            ),
            None => format!("Replay failed ({}/{} steps recorded)", attempted, total_steps),
        },
        RunStatus::Idle | RunStatus::Running => format!(
            "Replay not finished ({}/{} steps recorded)",
            attempted, total_steps
        ),
    };
    output.push_str(&summary);
    output
}

/// e.g. `[2] click_element ok (1 attempt) via xpath: //button[@id='submit']`
pub fn format_step(result: &StepResult) -> String {
    let attempts = match result.attempts_made {
        1 => "1 attempt".to_string(),
        n => format!("{} attempts", n),
    };

    let mut line = if result.skipped {
        format!("[{}] {} skipped", result.step_index, result.action)
    } else if result.succeeded {
        format!("[{}] {} ok ({})", result.step_index, result.action, attempts)
    } else {
        format!("[{}] {} FAILED ({})", result.step_index, result.action, attempts)
    };

    if let Some(candidate) = &result.selector_used {
        line.push_str(&format!(" via {} [{}]", candidate, candidate.strategy));
    }
    if let Some(err) = &result.error_message {
        line.push_str(&format!(": {}", err));
    }
    line
}

pub fn format_candidates(candidates: &[SelectorCandidate]) -> String {
    if candidates.is_empty() {
        return "No unique selector found".to_string();
    }
    candidates
        .iter()
        .enumerate()
        .map(|(rank, c)| format!("{:>3}. {} [{}]", rank + 1, c, c.strategy))
        .collect::<Vec<_>>()
        .join("\n")
}
