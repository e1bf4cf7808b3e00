//! Replay of recorded steps against a live page.
//!
//! Each step is resolved against a fresh snapshot of the page, so a step that fails
//! because the page was still changing gets a new resolution on the next attempt.
//! The parsed snapshot lives only inside [`resolve_html`]; nothing DOM-shaped is held
//! across an `.await`.

pub mod observer;
pub mod options;
pub mod secrets;

pub use observer::{ReplayObserver, TracingObserver};
pub use options::ReplayOptions;

use crate::driver::{Driver, QueryOutcome};
use crate::resolution::resolve_html;
use retrace_common::schema::{ScrollParams, validate_steps_skipping};
use retrace_common::{
    DocumentError, ElementDescriptor, RecordedStep, ReplayDocument, ReplayRun, RunStatus,
    SelectorCandidate, SelectorKind, StepAction, StepResult,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Conditions that keep a replay from starting at all.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Invalid recorded steps: {0}")]
    InvalidSteps(#[from] DocumentError),

    #[error("Invalid replay options: {0}")]
    InvalidOptions(String),

    #[error("Driver is not ready")]
    DriverNotReady,
}

enum Interaction<'a> {
    Click,
    Fill { text: &'a str, sensitive: bool },
    Select { label: &'a str },
}

/// Why one attempt at a Click/InputText step failed.
struct AttemptFailure {
    candidate: Option<SelectorCandidate>,
    message: String,
}

impl AttemptFailure {
    fn new(candidate: Option<&SelectorCandidate>, message: impl Into<String>) -> Self {
        Self {
            candidate: candidate.cloned(),
            message: message.into(),
        }
    }
}

pub struct ReplayEngine {
    options: ReplayOptions,
    observers: Vec<Arc<dyn ReplayObserver>>,
}

impl ReplayEngine {
    pub fn new(options: ReplayOptions) -> Self {
        Self {
            options,
            observers: Vec::new(),
        }
    }

    pub fn options(&self) -> &ReplayOptions {
        &self.options
    }

    /// Observers are notified in registration order.
    pub fn add_observer(&mut self, observer: Arc<dyn ReplayObserver>) {
        self.observers.push(observer);
    }

    /// Replay `steps` with the secrets configured in the options.
    pub async fn run<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        steps: &[RecordedStep],
    ) -> Result<ReplayRun, ReplayError> {
        self.execute(driver, steps, &self.options.secrets).await
    }

    /// Replay a whole document. Option secrets take precedence over the document's.
    pub async fn run_document<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        document: &ReplayDocument,
    ) -> Result<ReplayRun, ReplayError> {
        document.check_version()?;
        let mut secrets = document.secrets.clone();
        secrets.extend(
            self.options
                .secrets
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        self.execute(driver, &document.steps, &secrets).await
    }

    async fn execute<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        steps: &[RecordedStep],
        secrets: &BTreeMap<String, String>,
    ) -> Result<ReplayRun, ReplayError> {
        validate_steps_skipping(steps, &self.options.skippable_step_indexes)?;
        if self.options.max_retries == 0 {
            return Err(ReplayError::InvalidOptions(
                "max_retries must be at least 1".into(),
            ));
        }
        if !driver.is_ready().await {
            return Err(ReplayError::DriverNotReady);
        }

        let mut run = ReplayRun::new();
        run.status = RunStatus::Running;
        self.notify(|o| o.run_started(steps.len()));

        for step in steps {
            if self.options.cancel.is_cancelled() {
                info!("Replay cancelled before step {}", step.index);
                run.status = RunStatus::Cancelled;
                run.failed = true;
                break;
            }

            run.current_step_index = step.index;
            self.notify(|o| o.step_started(step));

            let result = if self.is_skippable(step) {
                debug!("Skipping step {}", step.index);
                StepResult::skipped(step.index, step.action.name())
            } else {
                self.execute_step(driver, step, secrets).await
            };

            self.notify(|o| o.step_finished(&result));
            let succeeded = result.succeeded;
            run.results.push(result);
            run.current_step_index = step.index + 1;

            if !succeeded {
                run.failed = true;
                run.status = RunStatus::Failed;
                break;
            }
            if matches!(step.action, StepAction::Done(_)) {
                break;
            }
        }

        if run.status == RunStatus::Running {
            run.status = RunStatus::Completed;
        }
        self.notify(|o| o.run_finished(&run));
        Ok(run)
    }

    fn notify(&self, event: impl Fn(&dyn ReplayObserver)) {
        for observer in &self.observers {
            event(observer.as_ref());
        }
    }

    fn is_skippable(&self, step: &RecordedStep) -> bool {
        step.skippable || self.options.skippable_step_indexes.contains(&step.index)
    }

    async fn execute_step<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        step: &RecordedStep,
        secrets: &BTreeMap<String, String>,
    ) -> StepResult {
        let action = step.action.name();
        match &step.action {
            StepAction::Navigate(params) => {
                info!("Navigating to: {}", params.url);
                match driver.navigate(&params.url).await {
                    Ok(nav) => {
                        debug!(url = %nav.url, title = %nav.title, "Navigation finished");
                        self.settle().await;
                        StepResult::success(step.index, action, 1)
                    }
                    Err(e) => StepResult::failure(
                        step.index,
                        action,
                        1,
                        format!("Navigation to {} failed: {}", params.url, e),
                    ),
                }
            }
            StepAction::Click(_) => self.interact(driver, step, Interaction::Click).await,
            StepAction::InputText(params) => match secrets::substitute(&params.text, secrets) {
                Ok(typed) => {
                    let interaction = Interaction::Fill {
                        text: &typed.text,
                        sensitive: typed.contains_secret || self.options.redact_in_logs,
                    };
                    self.interact(driver, step, interaction).await
                }
                Err(e) => StepResult::failure(step.index, action, 0, e.to_string()),
            },
            StepAction::SelectOption(params) => {
                let interaction = Interaction::Select {
                    label: &params.text,
                };
                self.interact(driver, step, interaction).await
            }
            StepAction::Wait(params) => {
                debug!("Waiting {}s", params.seconds);
                tokio::time::sleep(std::time::Duration::from_secs(params.seconds)).await;
                StepResult::success(step.index, action, 1)
            }
            StepAction::ScrollDown(params) => self.scroll(driver, step, params, 1).await,
            StepAction::ScrollUp(params) => self.scroll(driver, step, params, -1).await,
            StepAction::Done(_) => StepResult::success(step.index, action, 0),
            StepAction::Unsupported(unsupported) => StepResult::failure(
                step.index,
                action,
                0,
                format!("Unsupported action: {}", unsupported.kind.key()),
            ),
        }
    }

    async fn scroll<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        step: &RecordedStep,
        params: &ScrollParams,
        direction: i64,
    ) -> StepResult {
        let action = step.action.name();
        let amount = match (params.amount, params.quarter_page) {
            (Some(amount), false) => amount,
            (_, quarter_page) => match driver.viewport_height().await {
                Ok(height) if quarter_page => height / 4,
                Ok(height) => height,
                Err(e) => {
                    return StepResult::failure(
                        step.index,
                        action,
                        1,
                        format!("Could not read viewport height: {}", e),
                    );
                }
            },
        };

        match driver.scroll_by(direction * amount).await {
            Ok(()) => {
                self.settle().await;
                StepResult::success(step.index, action, 1)
            }
            Err(e) => StepResult::failure(step.index, action, 1, format!("Scroll failed: {}", e)),
        }
    }

    /// Resolve-then-act loop shared by Click and InputText, bounded by `max_retries`.
    async fn interact<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        step: &RecordedStep,
        interaction: Interaction<'_>,
    ) -> StepResult {
        let action = step.action.name();
        let Some(descriptor) = &step.element else {
            return StepResult::failure(step.index, action, 0, "Step has no target element");
        };

        let max_attempts = self.options.max_retries;
        let mut tried = HashSet::new();
        let mut last = AttemptFailure::new(None, "No attempt made");

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.options.retry_delay).await;
            }

            match self
                .attempt(driver, descriptor, &mut tried, &interaction)
                .await
            {
                Ok(candidate) => {
                    info!(
                        "Step {} {} via {} ({}) on attempt {}",
                        step.index, action, candidate, candidate.strategy, attempt
                    );
                    self.settle().await;
                    return StepResult::success(step.index, action, attempt)
                        .with_selector(candidate);
                }
                Err(failure) => {
                    warn!(
                        "Step {} attempt {}/{} failed: {}",
                        step.index, attempt, max_attempts, failure.message
                    );
                    last = failure;
                }
            }
        }

        let result = StepResult::failure(
            step.index,
            action,
            max_attempts,
            format!("{} (after {} attempts)", last.message, max_attempts),
        );
        match last.candidate {
            Some(candidate) => result.with_selector(candidate),
            None => result,
        }
    }

    async fn attempt<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        descriptor: &ElementDescriptor,
        tried: &mut HashSet<(SelectorKind, String)>,
        interaction: &Interaction<'_>,
    ) -> Result<SelectorCandidate, AttemptFailure> {
        let html = driver
            .content()
            .await
            .map_err(|e| AttemptFailure::new(None, format!("Could not read page: {}", e)))?;

        let candidates = resolve_html(&html, descriptor);
        let candidate = next_candidate(&candidates, tried)
            .ok_or_else(|| AttemptFailure::new(None, "No unique selector resolved"))?;
        debug!(
            "Trying {} [{}] ({} candidates)",
            candidate,
            candidate.strategy,
            candidates.len()
        );

        let handle = match driver
            .query_unique(candidate.kind, &candidate.expression)
            .await
        {
            Ok(QueryOutcome::Found(handle)) => handle,
            Ok(QueryOutcome::NotFound) => {
                return Err(AttemptFailure::new(
                    Some(&candidate),
                    format!("Selector matched nothing: {}", candidate),
                ));
            }
            Ok(QueryOutcome::Ambiguous(count)) => {
                return Err(AttemptFailure::new(
                    Some(&candidate),
                    format!("Selector matched {} elements: {}", count, candidate),
                ));
            }
            Err(e) => {
                return Err(AttemptFailure::new(
                    Some(&candidate),
                    format!("Query failed for {}: {}", candidate, e),
                ));
            }
        };

        let outcome = match interaction {
            Interaction::Click => driver.click(handle).await,
            Interaction::Fill { text, sensitive } => {
                if *sensitive {
                    debug!("Filling {} ({} chars)", candidate, text.chars().count());
                } else {
                    debug!("Filling {} with '{}'", candidate, text);
                }
                driver.fill(handle, text).await
            }
            Interaction::Select { label } => {
                debug!("Selecting '{}' in {}", label, candidate);
                driver.select_option(handle, label).await
            }
        };

        outcome.map_err(|e| {
            AttemptFailure::new(
                Some(&candidate),
                format!("Action failed on {}: {}", candidate, e),
            )
        })?;
        Ok(candidate)
    }

    async fn settle(&self) {
        if !self.options.settle_delay.is_zero() {
            tokio::time::sleep(self.options.settle_delay).await;
        }
    }
}

/// Highest-ranked candidate not yet tried in this step. Starts over from the top once
/// every current candidate has been tried.
fn next_candidate(
    candidates: &[SelectorCandidate],
    tried: &mut HashSet<(SelectorKind, String)>,
) -> Option<SelectorCandidate> {
    let first = candidates.first()?;
    let key = |c: &SelectorCandidate| (c.kind, c.expression.clone());

    let chosen = match candidates.iter().find(|c| !tried.contains(&key(c))) {
        Some(untried) => untried,
        None => {
            tried.clear();
            first
        }
    };
    tried.insert(key(chosen));
    Some(chosen.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_common::{Specificity, Strategy};

    fn candidate(expression: &str) -> SelectorCandidate {
        SelectorCandidate::new(
            SelectorKind::XPath,
            expression,
            Specificity::Unique,
            Strategy::Synthesized,
        )
    }

    #[test]
    fn test_next_candidate_cycles() {
        let candidates = vec![candidate("//a"), candidate("//b")];
        let mut tried = HashSet::new();
        let picks: Vec<String> = (0..4)
            .filter_map(|_| next_candidate(&candidates, &mut tried))
            .map(|c| c.expression)
            .collect();
        assert_eq!(picks, vec!["//a", "//b", "//a", "//b"]);
    }

    #[test]
    fn test_next_candidate_empty() {
        let mut tried = HashSet::new();
        assert!(next_candidate(&[], &mut tried).is_none());
    }
}
