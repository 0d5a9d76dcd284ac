//! Manhattan panel controller: guards, recompute-vs-reuse decision, plot
//! assembly.
//!
//! ```text
//!  Interaction ──► order guard ──► selection/p guards ──► trigger
//!                                                         │
//!            ┌────────── base_variable / data_reloaded ───┤
//!            ▼                                            ▼ log_scale / pvalue
//!   load pvalues ► transform ► flatten           cached generation (or the
//!            │                                   persisted one, if it matches)
//!            ▼                                            │
//!   threshold ok? ► persist ► publish ───────────────────►├─► threshold ► plot
//! ```
//!
//! Nothing is persisted or published unless the whole cycle succeeds, so a
//! failed refresh leaves both the cache and the last plot untouched.

use std::sync::Arc;

use serde::Serialize;

use crate::cache::{ArtifactCache, CacheGeneration};
use crate::error::{DashError, Result};
use crate::flatten::{flatten, FlattenedSeries};
use crate::logging::{
    agg_increment, log_artifact_write, log_cache_decision, log_guard, log_refresh,
    log_refresh_failure, log_threshold, log_transform, v_str, ProfileScope,
};
use crate::matrix::{PValueMatrix, TransformMatrix};
use crate::panel::PanelId;
use crate::plot::{assemble_plot, AxisScale, PlotDescription};
use crate::selection::{BaseRequest, Interaction, PanelKind, Trigger};
use crate::store::{fingerprint, ArtifactName, ArtifactStore, Table};
use crate::threshold::{corrected_threshold, SignificanceLevel, SignificanceThreshold};
use crate::transform::pairwise_transform;

/// Benign reasons to leave the plot as it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardRejected {
    EmptySelection,
    NonPositivePValue,
    /// `seq` not newer than the last processed interaction
    Stale,
}

impl GuardRejected {
    pub fn as_str(self) -> &'static str {
        match self {
            GuardRejected::EmptySelection => "empty_selection",
            GuardRejected::NonPositivePValue => "non_positive_pvalue",
            GuardRejected::Stale => "stale",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheDecision {
    Recompute,
    Reuse,
    #[serde(rename = "reload")]
    ReloadFromStore,
}

impl CacheDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheDecision::Recompute => "recompute",
            CacheDecision::Reuse => "reuse",
            CacheDecision::ReloadFromStore => "reload",
        }
    }
}

#[derive(Debug)]
pub enum RefreshOutcome {
    Updated {
        plot: PlotDescription,
        decision: CacheDecision,
    },
    /// Explicit "no update": distinct from an empty plot.
    NoUpdate {
        reason: GuardRejected,
        retained: Option<PlotDescription>,
    },
    /// Reported to the user; the previous plot stays visible.
    Failed {
        error: DashError,
        retained: Option<PlotDescription>,
    },
}

impl RefreshOutcome {
    /// Plot the presentation layer should be showing after this cycle.
    pub fn visible_plot(&self) -> Option<&PlotDescription> {
        match self {
            RefreshOutcome::Updated { plot, .. } => Some(plot),
            RefreshOutcome::NoUpdate { retained, .. } | RefreshOutcome::Failed { retained, .. } => {
                retained.as_ref()
            }
        }
    }
}

/// A generation that exists only in this cycle until it is published.
struct Candidate {
    generation: CacheGeneration,
    tables: Vec<(ArtifactName, Table)>,
}

pub struct ManhattanController {
    panel: PanelId,
    kind: PanelKind,
    tolerance: f64,
    cache: ArtifactCache,
    last_plot: Option<PlotDescription>,
    last_seq: Option<u64>,
}

impl ManhattanController {
    pub fn new(panel: PanelId, kind: PanelKind, tolerance: f64) -> Self {
        Self {
            panel,
            kind,
            tolerance,
            cache: ArtifactCache::new(),
            last_plot: None,
            last_seq: None,
        }
    }

    pub fn panel(&self) -> PanelId {
        self.panel
    }

    pub fn kind(&self) -> PanelKind {
        self.kind
    }

    pub fn last_plot(&self) -> Option<&PlotDescription> {
        self.last_plot.as_ref()
    }

    pub fn cached(&self) -> Option<Arc<CacheGeneration>> {
        self.cache.current()
    }

    /// Process one interaction. Interactions must arrive in `seq` order; an
    /// older or repeated `seq` is rejected without touching any state.
    pub fn handle<S: ArtifactStore + ?Sized>(
        &mut self,
        store: &mut S,
        interaction: &Interaction,
    ) -> RefreshOutcome {
        let seq = interaction.seq;
        if self.last_seq.is_some_and(|last| seq <= last) {
            return self.reject(seq, GuardRejected::Stale);
        }
        self.last_seq = Some(seq);

        let selection = &interaction.selection;
        let Some(request) = self.kind.request(&selection.base) else {
            return self.reject(seq, GuardRejected::EmptySelection);
        };
        let Some(level) = selection.pvalue.and_then(SignificanceLevel::new) else {
            return self.reject(seq, GuardRejected::NonPositivePValue);
        };
        let scale = AxisScale::from_flag(selection.log_scale);

        match self.refresh(store, interaction.trigger, &request, level, scale) {
            Ok((plot, threshold, decision)) => {
                log_refresh(
                    self.panel.0,
                    seq,
                    interaction.trigger.as_str(),
                    decision.as_str(),
                    plot.points.len(),
                    threshold.value,
                );
                self.last_plot = Some(plot.clone());
                RefreshOutcome::Updated { plot, decision }
            }
            Err(error) => {
                agg_increment("failure");
                log_refresh_failure(self.panel.0, seq, error.kind(), &error.to_string());
                RefreshOutcome::Failed {
                    error,
                    retained: self.last_plot.clone(),
                }
            }
        }
    }

    fn reject(&self, seq: u64, reason: GuardRejected) -> RefreshOutcome {
        agg_increment("guard");
        log_guard(self.panel.0, seq, reason.as_str());
        RefreshOutcome::NoUpdate {
            reason,
            retained: self.last_plot.clone(),
        }
    }

    fn refresh<S: ArtifactStore + ?Sized>(
        &mut self,
        store: &mut S,
        trigger: Trigger,
        request: &BaseRequest,
        level: SignificanceLevel,
        scale: AxisScale,
    ) -> Result<(PlotDescription, SignificanceThreshold, CacheDecision)> {
        let (pvalues, source) = self.load_pvalues(store)?;
        if trigger.reuses_cache() {
            match self.cache.current() {
                Some(gen) if gen.request == *request && gen.source == source => {
                    log_cache_decision(self.panel.0, "reuse", gen.generation, trigger.as_str());
                    agg_increment("reuse");
                    let threshold = self.threshold(level, &gen.logs)?;
                    let plot = assemble_plot(&gen.flattened, &threshold, scale);
                    return Ok((plot, threshold, CacheDecision::Reuse));
                }
                Some(gen) if gen.request != *request => {
                    log_cache_decision(self.panel.0, "recompute", gen.generation, "cached_selection_differs");
                }
                Some(gen) => {
                    log_cache_decision(self.panel.0, "recompute", gen.generation, "pvalues_changed");
                }
                None => {
                    if let Some(generation) = self.reload_from_store(store, request, &source)? {
                        let threshold = self.threshold(level, &generation.logs)?;
                        let gen = self.cache.publish(generation);
                        log_cache_decision(self.panel.0, "reload", gen.generation, trigger.as_str());
                        agg_increment("reload");
                        let plot = assemble_plot(&gen.flattened, &threshold, scale);
                        return Ok((plot, threshold, CacheDecision::ReloadFromStore));
                    }
                }
            }
        }

        let candidate = self.recompute(&pvalues, source, request)?;
        let threshold = self.threshold(level, &candidate.generation.logs)?;
        store.save_generation(&candidate.tables)?;
        for (name, table) in &candidate.tables {
            let fp = if name == &ArtifactName::logs(self.panel) {
                &candidate.generation.logs_fingerprint
            } else {
                &candidate.generation.flattened_fingerprint
            };
            log_artifact_write(name.as_str(), candidate.generation.generation, fp, table.len());
        }
        let gen = self.cache.publish(candidate.generation);
        log_cache_decision(self.panel.0, "recompute", gen.generation, trigger.as_str());
        agg_increment("recompute");
        let plot = assemble_plot(&gen.flattened, &threshold, scale);
        Ok((plot, threshold, CacheDecision::Recompute))
    }

    fn threshold(&self, level: SignificanceLevel, logs: &TransformMatrix) -> Result<SignificanceThreshold> {
        let t = corrected_threshold(level, logs)?;
        log_threshold(self.panel.0, t.raw_p, t.comparison_count, t.value);
        Ok(t)
    }

    /// Current p-value table and its fingerprint.
    fn load_pvalues<S: ArtifactStore + ?Sized>(&self, store: &S) -> Result<(Table, String)> {
        let table = store
            .load(&ArtifactName::pvalues())?
            .ok_or_else(|| DashError::Persistence("p-value matrix has not been loaded".to_string()))?;
        let source = fingerprint(&table)?;
        Ok((table, source))
    }

    fn recompute(&self, table: &Table, source: String, request: &BaseRequest) -> Result<Candidate> {
        let _profile = ProfileScope::with_context("recompute", &[("panel", v_str(&self.panel.to_string()))]);
        let pvalues = PValueMatrix::from_table(table, self.tolerance)?;
        let base = request.resolve(pvalues.labels());
        let logs = pairwise_transform(&pvalues, &base, self.tolerance)?;
        let flattened = flatten(&logs);
        log_transform(self.panel.0, logs.rows().len(), logs.cols().len(), flattened.len());
        self.candidate(request.clone(), source, logs, flattened)
    }

    /// Persisted generation from an earlier session, if it matches `request`,
    /// was derived from the current p-values and is internally consistent.
    fn reload_from_store<S: ArtifactStore + ?Sized>(
        &self,
        store: &S,
        request: &BaseRequest,
        source: &str,
    ) -> Result<Option<CacheGeneration>> {
        let BaseRequest::Variables(names) = request else {
            return Ok(None);
        };
        let _profile = ProfileScope::new("reload_from_store");
        let logs_table = store.load(&ArtifactName::logs(self.panel))?;
        let flat_table = store.load(&ArtifactName::flattened_logs(self.panel))?;
        let (Some(logs_table), Some(flat_table)) = (logs_table, flat_table) else {
            return Ok(None);
        };
        let derived_from_current = |t: &Table| t.source.as_deref() == Some(source);
        if !derived_from_current(&logs_table) || !derived_from_current(&flat_table) {
            log_cache_decision(self.panel.0, "recompute", 0, "persisted_generation_outdated");
            return Ok(None);
        }
        let logs = TransformMatrix::from_table(&logs_table)?;
        let flattened = FlattenedSeries::from_table(&flat_table)?;
        if logs.rows() != names.as_slice() {
            return Ok(None);
        }
        if flattened != flatten(&logs) {
            log_cache_decision(self.panel.0, "recompute", 0, "persisted_generation_inconsistent");
            return Ok(None);
        }
        Ok(Some(self.candidate(request.clone(), source.to_string(), logs, flattened)?.generation))
    }

    fn candidate(
        &self,
        request: BaseRequest,
        source: String,
        logs: TransformMatrix,
        flattened: FlattenedSeries,
    ) -> Result<Candidate> {
        let logs_table = logs.to_table()?.with_source(source.as_str());
        let flat_table = flattened.to_table()?.with_source(source.as_str());
        let generation = CacheGeneration {
            generation: self.cache.next_generation(),
            request,
            source,
            logs_fingerprint: fingerprint(&logs_table)?,
            flattened_fingerprint: fingerprint(&flat_table)?,
            logs,
            flattened,
        };
        Ok(Candidate {
            generation,
            tables: vec![
                (ArtifactName::logs(self.panel), logs_table),
                (ArtifactName::flattened_logs(self.panel), flat_table),
            ],
        })
    }
}
