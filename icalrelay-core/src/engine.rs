//! Pipeline execution.
//!
//! A [`Pipeline`] is an ordered list of validated modules. The [`Engine`]
//! runs one pipeline against one document, step by step, and sums the
//! event deltas. What happens after a failing step is the caller's choice
//! ([`ErrorPolicy`]): an interactive render stops at once, background work
//! keeps going and collects the failures.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::document::CalendarDocument;
use crate::error::{RelayError, RelayResult};
use crate::modules::{ExecutionContext, ModuleInvocation, ModuleSpec};
use crate::source::Fetcher;

/// What to do when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop at the first failing step
    #[default]
    Abort,
    /// Record the failure and run the remaining steps
    Continue,
}

/// A failure at one position of a pipeline.
#[derive(Error, Debug)]
#[error("step {index} ({module}): {error}")]
pub struct StepError {
    pub index: usize,
    pub module: String,
    pub error: RelayError,
}

/// What running a pipeline did.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Sum of the deltas of all successful steps
    pub delta: i64,
    /// Number of steps that ran successfully
    pub applied: usize,
    pub errors: Vec<StepError>,
}

impl PipelineReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Report for a pipeline that failed validation and never ran.
    pub fn rejected(errors: Vec<StepError>) -> Self {
        for step in &errors {
            warn!(step = step.index, module = %step.module, "Invalid module: {}", step.error);
        }
        PipelineReport {
            errors,
            ..Default::default()
        }
    }

    /// The delta, or the first step's error.
    pub fn into_result(self) -> RelayResult<i64> {
        match self.errors.into_iter().next() {
            Some(step) => Err(step.error),
            None => Ok(self.delta),
        }
    }
}

/// Validated modules in execution order.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    steps: Vec<ModuleSpec>,
}

impl Pipeline {
    pub fn new(steps: Vec<ModuleSpec>) -> Self {
        Pipeline { steps }
    }

    /// Validate every invocation, failing on the first bad one.
    pub fn from_invocations(invocations: &[ModuleInvocation]) -> RelayResult<Self> {
        let steps = invocations
            .iter()
            .map(ModuleSpec::from_invocation)
            .collect::<RelayResult<Vec<_>>>()?;

        Ok(Pipeline { steps })
    }

    /// Validate every invocation and report all that are bad.
    pub fn validate(invocations: &[ModuleInvocation]) -> Result<Self, Vec<StepError>> {
        let mut steps = Vec::with_capacity(invocations.len());
        let mut errors = Vec::new();

        for (index, invocation) in invocations.iter().enumerate() {
            match ModuleSpec::from_invocation(invocation) {
                Ok(spec) => steps.push(spec),
                Err(error) => errors.push(StepError {
                    index,
                    module: invocation.name.clone(),
                    error,
                }),
            }
        }

        if errors.is_empty() {
            Ok(Pipeline { steps })
        } else {
            Err(errors)
        }
    }

    pub fn steps(&self) -> &[ModuleSpec] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether every step is a low-privileged module.
    pub fn is_low_privileged(&self) -> bool {
        self.steps.iter().all(|step| step.kind().is_low_privileged())
    }
}

/// Runs modules against documents. Holds no per-document state, so one
/// engine can serve any number of concurrent renders.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    fetcher: Fetcher,
}

impl Engine {
    pub fn new(fetcher: Fetcher) -> Self {
        Engine { fetcher }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Run a single validated module and check its delta against the
    /// module's class.
    pub async fn run_module(
        &self,
        doc: &mut CalendarDocument,
        spec: &ModuleSpec,
        now: DateTime<Utc>,
    ) -> RelayResult<i64> {
        let ctx = ExecutionContext {
            now,
            fetcher: &self.fetcher,
        };

        let delta = spec.apply(doc, &ctx).await?;
        spec.kind().check_delta(delta)
    }

    /// Run a module by name with raw parameters.
    pub async fn call(
        &self,
        doc: &mut CalendarDocument,
        name: &str,
        params: &BTreeMap<String, String>,
    ) -> RelayResult<i64> {
        let spec = ModuleSpec::parse(name, params)?;
        self.run_module(doc, &spec, Utc::now()).await
    }

    /// Run a validated pipeline. `now` is fixed for the whole run.
    pub async fn run(
        &self,
        doc: &mut CalendarDocument,
        pipeline: &Pipeline,
        policy: ErrorPolicy,
    ) -> PipelineReport {
        let mut report = PipelineReport::default();
        let now = Utc::now();

        for (index, spec) in pipeline.steps().iter().enumerate() {
            let result = self.run_module(doc, spec, now).await;
            let ok = record(&mut report, index, spec.kind().name(), result);
            if !ok && policy == ErrorPolicy::Abort {
                break;
            }
        }

        log_report(&report);
        report
    }

    /// Validate and run invocations in one go.
    ///
    /// Under [`ErrorPolicy::Abort`] every invocation is validated before the
    /// first one runs, and an invalid pipeline leaves `doc` untouched. Under
    /// [`ErrorPolicy::Continue`] an invalid invocation is a failing step at
    /// its position and the steps around it still run.
    pub async fn run_invocations(
        &self,
        doc: &mut CalendarDocument,
        invocations: &[ModuleInvocation],
        policy: ErrorPolicy,
    ) -> PipelineReport {
        if policy == ErrorPolicy::Abort {
            return match Pipeline::validate(invocations) {
                Ok(pipeline) => self.run(doc, &pipeline, policy).await,
                Err(errors) => PipelineReport::rejected(errors),
            };
        }

        let specs: Vec<(String, RelayResult<ModuleSpec>)> = invocations
            .iter()
            .map(|inv| (inv.name.clone(), ModuleSpec::from_invocation(inv)))
            .collect();

        let mut report = PipelineReport::default();
        let now = Utc::now();

        for (index, (name, spec)) in specs.into_iter().enumerate() {
            let result = match spec {
                Ok(spec) => self.run_module(doc, &spec, now).await,
                Err(e) => Err(e),
            };

            record(&mut report, index, &name, result);
        }

        log_report(&report);
        report
    }
}

/// Fold one step's result into the report. Returns whether it succeeded.
fn record(
    report: &mut PipelineReport,
    index: usize,
    module: &str,
    result: RelayResult<i64>,
) -> bool {
    match result {
        Ok(delta) => {
            debug!(step = index, module, delta, "Module applied");
            report.delta += delta;
            report.applied += 1;
            true
        }
        Err(error) => {
            warn!(step = index, module, "Module failed: {}", error);
            report.errors.push(StepError {
                index,
                module: module.to_string(),
                error,
            });
            false
        }
    }
}

fn log_report(report: &PipelineReport) {
    info!(
        delta = report.delta,
        applied = report.applied,
        errors = report.errors.len(),
        "Pipeline finished"
    );
}
