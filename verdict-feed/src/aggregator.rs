//! Verdict aggregator: fetch cycle, readiness tally, render, repeat
//!
//! Each refresh cycle gets a fresh [`CycleContext`]. Slice fetches run as
//! independent tasks and report back over a channel owned by that cycle, in
//! whatever order they finish. The cycle renders once every slice in the
//! plan has arrived; a cycle with a failed slice renders nothing and leaves
//! the target as it was. Cycles never overlap: the next timer tick is only
//! taken after the current cycle has finished.

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::feed::{FeedClient, FeedError, RawRecord, Slice, SliceName, SlicePlan};
use crate::render::render_pass;
use crate::settings::Settings;
use crate::target::RenderTarget;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use verdict_common::Result;

/// Outcome of one slice fetch
#[derive(Debug)]
pub struct SliceResult {
    pub name: SliceName,
    pub outcome: std::result::Result<Slice, FeedError>,
}

impl SliceResult {
    pub fn success(slice: Slice) -> Self {
        Self {
            name: slice.name.clone(),
            outcome: Ok(slice),
        }
    }

    pub fn failure(name: SliceName, error: FeedError) -> Self {
        Self {
            name,
            outcome: Err(error),
        }
    }
}

/// Result of feeding one slice result into the cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Still waiting for slices
    Waiting { received: usize, required: usize },
    /// All required slices present; render now
    Ready,
    /// The cycle already fired; the result was ignored
    AlreadyFired,
}

/// State of one refresh cycle
#[derive(Debug)]
pub struct CycleContext {
    cycle: u64,
    plan: SlicePlan,
    slices: HashMap<SliceName, Slice>,
    failed: Vec<SliceName>,
    fired: bool,
}

impl CycleContext {
    pub fn new(cycle: u64, plan: SlicePlan) -> Self {
        Self {
            cycle,
            plan,
            slices: HashMap::new(),
            failed: Vec::new(),
            fired: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.fired
    }

    /// Distinct slices received so far
    pub fn received(&self) -> usize {
        self.slices.len()
    }

    /// Record one slice result.
    ///
    /// Returns `Ready` exactly once per cycle, when the number of distinct
    /// successfully received slices reaches the plan's required count.
    pub fn accept(&mut self, result: SliceResult, diagnostics: &mut Diagnostics) -> Readiness {
        if self.fired {
            debug!(cycle = self.cycle, slice = %result.name, "Ignoring slice after render");
            return Readiness::AlreadyFired;
        }

        let required = self.plan.required_count();

        if !self.plan.contains(&result.name) {
            warn!(cycle = self.cycle, slice = %result.name, "Ignoring slice not in plan");
            return Readiness::Waiting {
                received: self.slices.len(),
                required,
            };
        }

        match result.outcome {
            Ok(slice) => {
                if self.slices.contains_key(&result.name) {
                    debug!(cycle = self.cycle, slice = %result.name, "Duplicate slice delivery");
                } else {
                    debug!(cycle = self.cycle, slice = %result.name, rows = slice.rows.len(), "Slice received");
                    self.slices.insert(result.name, slice);
                }
            }
            Err(e) => {
                diagnostics.push(Diagnostic::TransportFailure {
                    slice: result.name.to_string(),
                    reason: e.to_string(),
                });
                if !self.failed.contains(&result.name) {
                    self.failed.push(result.name);
                }
            }
        }

        if self.slices.len() == required {
            self.fired = true;
            Readiness::Ready
        } else {
            Readiness::Waiting {
                received: self.slices.len(),
                required,
            }
        }
    }

    /// Slices in the plan that have not arrived
    pub fn missing(&self) -> Vec<SliceName> {
        self.plan
            .slices()
            .into_iter()
            .filter(|name| !self.slices.contains_key(name))
            .collect()
    }

    /// Data slice chosen for rendering: the config slice's `sheet`, or the
    /// plan's default sheet
    pub fn selected_sheet(&self, diagnostics: &mut Diagnostics) -> Option<SliceName> {
        let Some(config_name) = &self.plan.config else {
            return self.plan.default_sheet.clone();
        };

        let Some(config) = self.slices.get(config_name) else {
            diagnostics.push(Diagnostic::ConfigSlice {
                reason: format!("slice '{}' not received", config_name),
            });
            return None;
        };

        match config.configured_sheet() {
            Some(sheet) if self.plan.data.contains(&sheet) => Some(sheet),
            Some(sheet) => {
                diagnostics.push(Diagnostic::ConfigSlice {
                    reason: format!("sheet '{}' is not a data slice", sheet),
                });
                None
            }
            None => {
                diagnostics.push(Diagnostic::ConfigSlice {
                    reason: "first row has no 'sheet' value".to_string(),
                });
                None
            }
        }
    }

    /// Records of the selected sheet, malformed rows skipped
    pub fn sheet_records(
        &self,
        diagnostics: &mut Diagnostics,
    ) -> Option<(SliceName, Vec<RawRecord>)> {
        let sheet = self.selected_sheet(diagnostics)?;
        let slice = self.slices.get(&sheet)?;
        Some((sheet, slice.records(diagnostics)))
    }
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Fragments were written to the target
    Rendered { sheet: SliceName, blocks: usize },
    /// Some slices never arrived; target untouched
    Incomplete { missing: Vec<SliceName> },
    /// All slices arrived but none could be rendered; target untouched
    NotRendered { reason: String },
}

/// Summary of one cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
    pub diagnostics: Vec<Diagnostic>,
    /// Rows dropped for missing fields
    pub skipped_records: usize,
}

impl CycleReport {
    pub fn rendered(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Rendered { .. })
    }
}

/// Polls the feed and renders into a target
pub struct Aggregator<T: RenderTarget> {
    client: Arc<FeedClient>,
    settings: Settings,
    target: T,
    cycles: u64,
}

impl<T: RenderTarget> Aggregator<T> {
    pub fn new(client: FeedClient, settings: Settings, target: T) -> Self {
        Self {
            client: Arc::new(client),
            settings,
            target,
            cycles: 0,
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Start one fetch task per slice in the plan.
    ///
    /// The receiver yields one [`SliceResult`] per slice, in completion
    /// order, and closes when every task has reported.
    pub fn fetch_cycle(&self) -> mpsc::Receiver<SliceResult> {
        let plan = self.settings.slice_plan();
        let slices = plan.slices();
        let (tx, rx) = mpsc::channel(slices.len().max(1));

        for name in slices {
            let client = Arc::clone(&self.client);
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = match client.fetch_slice(&name).await {
                    Ok(slice) => SliceResult::success(slice),
                    Err(e) => SliceResult::failure(name, e),
                };
                // Receiver only goes away if the cycle was abandoned
                let _ = tx.send(result).await;
            });
        }

        rx
    }

    /// Run one full cycle: fetch, wait for all slices, render
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.cycles += 1;
        let started_at = Utc::now();
        let mut diagnostics = Diagnostics::new();
        let mut context = CycleContext::new(self.cycles, self.settings.slice_plan());

        debug!(cycle = self.cycles, "Starting fetch cycle");
        let mut results = self.fetch_cycle();
        while let Some(result) = results.recv().await {
            if context.accept(result, &mut diagnostics) == Readiness::Ready {
                break;
            }
        }

        let outcome = if context.is_ready() {
            self.on_all_slices_ready(&context, &mut diagnostics)?
        } else {
            debug!(
                cycle = self.cycles,
                received = context.received(),
                required = context.plan.required_count(),
                "Fetch tasks finished before all slices arrived"
            );
            CycleOutcome::Incomplete {
                missing: context.missing(),
            }
        };

        Ok(CycleReport {
            cycle: self.cycles,
            started_at,
            finished_at: Utc::now(),
            skipped_records: diagnostics.malformed_count(),
            outcome,
            diagnostics: diagnostics.into_entries(),
        })
    }

    /// Render the selected sheet of a completed cycle into the target
    pub fn on_all_slices_ready(
        &mut self,
        context: &CycleContext,
        diagnostics: &mut Diagnostics,
    ) -> Result<CycleOutcome> {
        let Some((sheet, records)) = context.sheet_records(diagnostics) else {
            return Ok(CycleOutcome::NotRendered {
                reason: "no usable sheet selected".to_string(),
            });
        };

        let fragments = render_pass(&records, &self.settings.render, diagnostics);
        self.target.replace(&fragments)?;

        Ok(CycleOutcome::Rendered {
            sheet,
            blocks: fragments.len(),
        })
    }

    /// Run cycles on the refresh timer until `shutdown` resolves.
    ///
    /// Cycle errors are logged and the loop continues.
    pub async fn watch<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut timer = interval(self.settings.refresh);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            "Watching {} ({:?} profile, every {}s)",
            self.settings.base_url,
            self.settings.profile,
            self.settings.refresh.as_secs()
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = timer.tick() => {}
            }

            match self.run_cycle().await {
                Ok(report) => log_report(&report),
                Err(e) => error!("Cycle {} failed: {}", self.cycles, e),
            }
        }

        info!("Watch stopped after {} cycle(s)", self.cycles);
    }
}

/// Log the cycle summary line
pub fn log_report(report: &CycleReport) {
    let elapsed_ms = (report.finished_at - report.started_at).num_milliseconds();
    match &report.outcome {
        CycleOutcome::Rendered { sheet, blocks } => info!(
            cycle = report.cycle,
            sheet = %sheet,
            blocks = *blocks,
            skipped = report.skipped_records,
            diagnostics = report.diagnostics.len(),
            elapsed_ms,
            "Rendered"
        ),
        CycleOutcome::Incomplete { missing } => {
            let missing: Vec<&str> = missing.iter().map(SliceName::as_str).collect();
            warn!(
                cycle = report.cycle,
                elapsed_ms,
                "Cycle incomplete, missing slices: {}",
                missing.join(", ")
            )
        }
        CycleOutcome::NotRendered { reason } => {
            warn!(cycle = report.cycle, elapsed_ms, "Cycle not rendered: {}", reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use crate::feed::FeedProfile;
    use serde_json::json;

    fn ok(name: &str, rows: Vec<serde_json::Value>) -> SliceResult {
        SliceResult::success(Slice::new(SliceName::new(name), rows))
    }

    fn failed(name: &str) -> SliceResult {
        SliceResult::failure(
            SliceName::new(name),
            FeedError::HttpStatus(404, "Not Found".to_string()),
        )
    }

    #[test]
    fn test_ready_fires_once_after_all_distinct_slices() {
        let mut diagnostics = Diagnostics::new();
        let mut context = CycleContext::new(1, FeedProfile::Trial.slice_plan());

        assert_eq!(
            context.accept(ok("numeric", vec![]), &mut diagnostics),
            Readiness::Waiting { received: 1, required: 3 }
        );
        // Same slice again does not count twice
        assert_eq!(
            context.accept(ok("numeric", vec![]), &mut diagnostics),
            Readiness::Waiting { received: 1, required: 3 }
        );
        assert_eq!(
            context.accept(ok("config", vec![json!({"sheet": "numeric"})]), &mut diagnostics),
            Readiness::Waiting { received: 2, required: 3 }
        );
        assert!(!context.is_ready());
        assert_eq!(
            context.accept(ok("by-victim", vec![]), &mut diagnostics),
            Readiness::Ready
        );
        assert_eq!(
            context.accept(ok("numeric", vec![]), &mut diagnostics),
            Readiness::AlreadyFired
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_failure_is_reported_and_blocks_readiness() {
        let mut diagnostics = Diagnostics::new();
        let mut context = CycleContext::new(1, FeedProfile::Trial.slice_plan());

        context.accept(ok("config", vec![]), &mut diagnostics);
        context.accept(failed("numeric"), &mut diagnostics);
        let readiness = context.accept(ok("by_victim", vec![]), &mut diagnostics);

        assert_eq!(readiness, Readiness::Waiting { received: 2, required: 3 });
        assert_eq!(context.missing(), vec![SliceName::new("numeric")]);
        assert_eq!(context.received(), 2);
        assert_eq!(diagnostics.count(DiagnosticKind::TransportFailure), 1);
    }

    #[test]
    fn test_unplanned_slice_is_ignored() {
        let mut diagnostics = Diagnostics::new();
        let mut context = CycleContext::new(1, FeedProfile::Sentencing.slice_plan());

        let readiness = context.accept(ok("numeric", vec![]), &mut diagnostics);
        assert_eq!(readiness, Readiness::Waiting { received: 0, required: 1 });
        assert_eq!(
            context.accept(ok("death_penalty", vec![]), &mut diagnostics),
            Readiness::Ready
        );
    }

    #[test]
    fn test_selected_sheet_from_config() {
        let mut diagnostics = Diagnostics::new();
        let mut context = CycleContext::new(1, FeedProfile::Trial.slice_plan());
        context.accept(ok("config", vec![json!({"sheet": "by-victim"})]), &mut diagnostics);

        assert_eq!(
            context.selected_sheet(&mut diagnostics),
            Some(SliceName::new("by_victim"))
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_selected_sheet_rejects_unknown_name() {
        let mut diagnostics = Diagnostics::new();
        let mut context = CycleContext::new(1, FeedProfile::Trial.slice_plan());
        context.accept(ok("config", vec![json!({"sheet": "config"})]), &mut diagnostics);

        assert_eq!(context.selected_sheet(&mut diagnostics), None);
        assert_eq!(diagnostics.count(DiagnosticKind::ConfigSlice), 1);
    }

    #[test]
    fn test_sentencing_uses_default_sheet() {
        let mut diagnostics = Diagnostics::new();
        let mut context = CycleContext::new(1, FeedProfile::Sentencing.slice_plan());
        context.accept(
            ok(
                "death_penalty",
                vec![
                    json!({"name_full": "A", "Charge": "c1", "Verdict": "0"}),
                    json!({"Charge": "c2"}),
                ],
            ),
            &mut diagnostics,
        );

        let (sheet, records) = context.sheet_records(&mut diagnostics).unwrap();
        assert_eq!(sheet, SliceName::new("death_penalty"));
        assert_eq!(records.len(), 1);
        assert_eq!(diagnostics.malformed_count(), 1);
    }
}
