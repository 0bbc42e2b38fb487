//! Import orchestration.
//!
//! Importers run one at a time in dependency order. Ties between importers
//! that are ready at the same moment go by name, so the order never depends on
//! registration order. A failed importer skips everything downstream of it;
//! unrelated importers still run. Cancellation stops the run at the next row
//! boundary and marks the remaining stages cancelled.

use chrono::{DateTime, Utc};
use comptox_graphdb::GraphStore;
use comptox_ontology::Ontology;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::error::BuildError;
use crate::importer::{BuildContext, SourceImporter};
use crate::summary::ImportStageResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    /// Completed in an earlier run that this one resumes.
    AlreadyCompleted,
    Failed { error: String },
    SkippedDependencyFailed { dependency: String },
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub importer: String,
    /// Position in the execution order, from 0.
    pub sequence: usize,
    pub status: StageStatus,
    pub result: ImportStageResult,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageReport>,
    pub node_count: usize,
    pub edge_count: usize,
}

impl BuildReport {
    pub fn stage(&self, importer: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.importer == importer)
    }

    pub fn is_success(&self) -> bool {
        self.stages.iter().all(|s| {
            matches!(
                s.status,
                StageStatus::Completed | StageStatus::AlreadyCompleted
            )
        })
    }

    pub fn was_cancelled(&self) -> bool {
        self.stages
            .iter()
            .any(|s| s.status == StageStatus::Cancelled)
    }

    /// Sum of every stage's counters.
    pub fn totals(&self) -> ImportStageResult {
        let mut total = ImportStageResult::default();
        for stage in &self.stages {
            total.absorb(&stage.result);
        }
        total
    }

    /// Importers that finished in this run or an earlier one.
    pub fn completed(&self) -> BTreeSet<String> {
        self.stages
            .iter()
            .filter(|s| {
                matches!(
                    s.status,
                    StageStatus::Completed | StageStatus::AlreadyCompleted
                )
            })
            .map(|s| s.importer.clone())
            .collect()
    }
}

/// Execution order for `importers` by their `requires` lists.
pub fn plan(importers: &[Box<dyn SourceImporter>]) -> Result<Vec<usize>, BuildError> {
    let mut index: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, imp) in importers.iter().enumerate() {
        if index.insert(imp.name(), i).is_some() {
            return Err(BuildError::DuplicateImporter(imp.name().to_string()));
        }
    }

    let requires: Vec<BTreeSet<String>> = importers
        .iter()
        .map(|imp| imp.requires().into_iter().collect())
        .collect();
    for (imp, deps) in importers.iter().zip(&requires) {
        if let Some(missing) = deps.iter().find(|d| !index.contains_key(d.as_str())) {
            return Err(BuildError::MissingDependency {
                importer: imp.name().to_string(),
                dependency: missing.clone(),
            });
        }
    }

    let mut indegree: Vec<usize> = requires.iter().map(BTreeSet::len).collect();
    let mut ready: BTreeSet<&str> = importers
        .iter()
        .zip(&indegree)
        .filter(|(_, &d)| d == 0)
        .map(|(imp, _)| imp.name())
        .collect();

    let mut order = Vec::with_capacity(importers.len());
    while let Some(name) = ready.pop_first() {
        order.push(index[name]);
        for (j, deps) in requires.iter().enumerate() {
            if deps.contains(name) {
                indegree[j] -= 1;
                if indegree[j] == 0 {
                    ready.insert(importers[j].name());
                }
            }
        }
    }

    if order.len() != importers.len() {
        let placed: HashSet<usize> = order.iter().copied().collect();
        let mut stuck: Vec<String> = (0..importers.len())
            .filter(|i| !placed.contains(i))
            .map(|i| importers[i].name().to_string())
            .collect();
        stuck.sort();
        return Err(BuildError::DependencyCycle(stuck));
    }
    Ok(order)
}

pub struct Orchestrator<'o> {
    ontology: &'o Ontology,
    cancel: CancelToken,
    already_completed: BTreeSet<String>,
}

impl<'o> Orchestrator<'o> {
    pub fn new(ontology: &'o Ontology) -> Self {
        Self {
            ontology,
            cancel: CancelToken::new(),
            already_completed: BTreeSet::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Skip importers that completed in `previous`. The store must already
    /// hold that run's output.
    pub fn resume_from(mut self, previous: &BuildReport) -> Self {
        self.already_completed = previous.completed();
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run every importer. Configuration errors (cycles, missing or duplicate
    /// importers) abort before anything runs; importer failures are recorded
    /// in the report.
    pub fn run(
        &self,
        store: &mut dyn GraphStore,
        mut importers: Vec<Box<dyn SourceImporter>>,
    ) -> Result<BuildReport, BuildError> {
        let order = plan(&importers)?;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(
            run_id = %run_id,
            order = ?order.iter().map(|&i| importers[i].name()).collect::<Vec<_>>(),
            "starting build"
        );

        let mut stages = Vec::with_capacity(order.len());
        let mut unusable: BTreeMap<String, String> = BTreeMap::new();

        for (sequence, &i) in order.iter().enumerate() {
            let importer = &mut importers[i];
            let name = importer.name().to_string();
            let mut report = StageReport {
                importer: name.clone(),
                sequence,
                status: StageStatus::Completed,
                result: ImportStageResult::default(),
                started_at: None,
                finished_at: None,
            };

            if self.already_completed.contains(&name) {
                tracing::info!(importer = %name, "already completed, skipping");
                report.status = StageStatus::AlreadyCompleted;
                stages.push(report);
                continue;
            }

            if let Some(dependency) = importer
                .requires()
                .into_iter()
                .find(|d| unusable.contains_key(d))
            {
                tracing::warn!(importer = %name, dependency = %dependency, "dependency did not complete, skipping");
                unusable.insert(name.clone(), dependency.clone());
                report.status = StageStatus::SkippedDependencyFailed { dependency };
                stages.push(report);
                continue;
            }

            if self.cancel.is_cancelled() {
                unusable.insert(name.clone(), "cancelled".to_string());
                report.status = StageStatus::Cancelled;
                stages.push(report);
                continue;
            }

            report.started_at = Some(Utc::now());
            tracing::info!(importer = %name, sequence, "importer started");
            let outcome = {
                let mut ctx = BuildContext {
                    store: &mut *store,
                    ontology: self.ontology,
                    stats: &mut report.result,
                    cancel: &self.cancel,
                };
                run_stage(importer.as_mut(), &mut ctx)
            };
            report.finished_at = Some(Utc::now());

            match outcome {
                Ok(()) => {
                    let r = &report.result;
                    tracing::info!(
                        importer = %name,
                        rows = r.rows_read,
                        created = r.created,
                        merged = r.merged,
                        ambiguous = r.ambiguous,
                        unmatched = r.unmatched,
                        filtered = r.filtered,
                        edges_created = r.edges_created,
                        edges_skipped = r.edges_skipped(),
                        "importer finished"
                    );
                }
                Err(err) if BuildError::is_cancellation(&err) => {
                    tracing::warn!(importer = %name, "importer cancelled");
                    unusable.insert(name.clone(), "cancelled".to_string());
                    report.status = StageStatus::Cancelled;
                }
                Err(err) => {
                    tracing::error!(importer = %name, error = %format!("{err:#}"), "importer failed");
                    unusable.insert(name.clone(), format!("{err:#}"));
                    report.status = StageStatus::Failed {
                        error: format!("{err:#}"),
                    };
                }
            }
            stages.push(report);
        }

        Ok(BuildReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            stages,
            node_count: store.node_count(),
            edge_count: store.edge_count(),
        })
    }
}

fn run_stage(importer: &mut dyn SourceImporter, ctx: &mut BuildContext<'_>) -> anyhow::Result<()> {
    ctx.checkpoint()?;
    importer.prepopulate(ctx)?;
    ctx.checkpoint()?;
    importer.fetch_raw_data()?;
    ctx.checkpoint()?;
    importer.parse(ctx)
}
