use retrace_common::formatter::{format_candidates, format_run, format_step};
use retrace_common::result::{ReplayRun, RunStatus, StepResult};
use retrace_common::selector::{SelectorCandidate, SelectorKind, Specificity, Strategy};

fn submit_candidate() -> SelectorCandidate {
    SelectorCandidate::new(
        SelectorKind::XPath,
        "//button[@id='submit']",
        Specificity::Unique,
        Strategy::Synthesized,
    )
}

#[test]
fn test_format_successful_step() {
    let result = StepResult::success(2, "click_element", 1).with_selector(submit_candidate());
    assert_eq!(
        format_step(&result),
        "[2] click_element ok (1 attempt) via xpath: //button[@id='submit'] [synthesized]"
    );
}

#[test]
fn test_format_failed_and_skipped_steps() {
    let failed = StepResult::failure(1, "drag_drop", 0, "Unsupported action: drag_drop");
    assert_eq!(
        format_step(&failed),
        "[1] drag_drop FAILED (0 attempts): Unsupported action: drag_drop"
    );

    let skipped = StepResult::skipped(3, "wait");
    assert_eq!(format_step(&skipped), "[3] wait skipped");
}

#[test]
fn test_format_run_summary() {
    let mut run = ReplayRun::new();
    run.results.push(StepResult::success(0, "navigate", 1));
    run.results.push(StepResult::failure(1, "click_element", 5, "No unique selector resolved"));
    run.status = RunStatus::Failed;
    run.failed = true;
    run.current_step_index = 2;

    let report = format_run(&run, 3);
    assert!(report.starts_with("[0] navigate ok (1 attempt)\n"));
    assert!(report.ends_with("Replay failed at step 1 (2/3 steps recorded)"));
}

#[test]
fn test_format_cancelled_run() {
    let run = ReplayRun {
        status: RunStatus::Cancelled,
        current_step_index: 0,
        results: vec![],
        failed: true,
    };
    assert_eq!(
        format_run(&run, 4),
        "Replay cancelled before step 0 (0/4 steps recorded)"
    );
}

#[test]
fn test_format_candidates() {
    assert_eq!(format_candidates(&[]), "No unique selector found");

    let widened = SelectorCandidate::new(
        SelectorKind::XPath,
        "//form[@id='login']/button",
        Specificity::Unique,
        Strategy::Widened { depth: 1 },
    );
    assert_eq!(
        format_candidates(&[submit_candidate(), widened]),
        "  1. xpath: //button[@id='submit'] [synthesized]\n\
         \x20 2. xpath: //form[@id='login']/button [widened (depth 1)]"
    );
}

#[test]
fn test_candidate_serialization_flattens_strategy() {
    let widened = SelectorCandidate::new(
        SelectorKind::Css,
        "#login > button",
        Specificity::Unique,
        Strategy::Widened { depth: 2 },
    );
    let value = serde_json::to_value(&widened).unwrap();
    assert_eq!(value["kind"], "css");
    assert_eq!(value["specificity"], "unique");
    assert_eq!(value["strategy"], "widened");
    assert_eq!(value["depth"], 2);

    let back: SelectorCandidate = serde_json::from_value(value).unwrap();
    assert_eq!(back, widened);
}
