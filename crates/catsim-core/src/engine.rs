//! Batch simulation engine.
//!
//! Fans every (examinee, replication) session out over a bounded pool of
//! blocking tasks and gathers the trajectories back in input order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::config::SimulationConfig;
use crate::model::Trajectory;
use crate::report::{SimulationReport, SimulationSettings};
use crate::session::{run_seeded_session, session_seed};
use crate::statistics::{compute_aggregate_stats, compute_conditional_stats};

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_session_start(&self, index: usize, true_ability: f64);
    fn on_session_complete(&self, index: usize, trajectory: &Trajectory);
    fn on_batch_complete(&self, total: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_session_start(&self, _: usize, _: f64) {}
    fn on_session_complete(&self, _: usize, _: &Trajectory) {}
    fn on_batch_complete(&self, _: usize, _: Duration) {}
}

/// Runs a validated configuration to completion.
pub struct SimulationEngine {
    config: SimulationConfig,
}

impl SimulationEngine {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Simulate every session and build the report.
    ///
    /// Session `i` draws from its own stream seeded with `base + i`, so the
    /// result does not depend on scheduling or parallelism. When no seed is
    /// configured a random base is drawn and recorded in the report.
    pub async fn run(&self, progress: &dyn ProgressReporter) -> Result<SimulationReport> {
        let config = &self.config;
        config.validate().context("invalid simulation configuration")?;

        let start = Instant::now();
        let run_id = Uuid::new_v4();
        let base_seed = config.seed.unwrap_or_else(rand::random);
        let pool = Arc::new(config.pool.clone());
        let semaphore = Arc::new(Semaphore::new(config.parallelism));
        let abilities = config.session_abilities();
        let total = abilities.len();

        tracing::info!(
            %run_id,
            sessions = total,
            seed = base_seed,
            method = %config.method,
            rule = %config.stopping_rule,
            "starting simulation batch"
        );

        let mut futures = FuturesUnordered::new();

        for (index, true_ability) in abilities.into_iter().enumerate() {
            let pool = Arc::clone(&pool);
            let semaphore = Arc::clone(&semaphore);
            let method = config.method;
            let rule = config.stopping_rule;
            let seed = session_seed(base_seed, index);

            futures.push(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| anyhow::anyhow!("semaphore closed"))?;

                progress.on_session_start(index, true_ability);
                let trajectory = tokio::task::spawn_blocking(move || {
                    run_seeded_session(&pool, true_ability, method, rule, seed)
                })
                .await
                .with_context(|| format!("session {index} did not complete"))?;

                Ok::<_, anyhow::Error>((index, trajectory))
            });
        }

        let gather = async {
            let mut slots: Vec<Option<Trajectory>> = vec![None; total];
            while let Some(result) = futures.next().await {
                let (index, trajectory) = result?;
                progress.on_session_complete(index, &trajectory);
                slots[index] = Some(trajectory);
            }
            Ok::<_, anyhow::Error>(slots)
        };

        let slots = match config.time_budget {
            Some(budget) => tokio::time::timeout(budget, gather)
                .await
                .map_err(|_| {
                    tracing::error!(?budget, "simulation batch exceeded its time budget");
                    anyhow::anyhow!("simulation exceeded time budget of {budget:?}")
                })??,
            None => gather.await?,
        };

        let trajectories: Vec<Trajectory> = slots
            .into_iter()
            .collect::<Option<_>>()
            .context("a session produced no trajectory")?;

        let elapsed = start.elapsed();
        progress.on_batch_complete(total, elapsed);

        let aggregate = compute_aggregate_stats(&trajectories);
        let conditional = compute_conditional_stats(&trajectories);

        if let Some(stats) = &aggregate {
            tracing::info!(
                %run_id,
                sessions = total,
                bias = stats.bias,
                rmse = stats.rmse,
                avg_items = stats.avg_items,
                elapsed_ms = elapsed.as_millis() as u64,
                "simulation batch complete"
            );
        }

        Ok(SimulationReport {
            id: run_id,
            created_at: chrono::Utc::now(),
            settings: SimulationSettings {
                pool: config.pool.clone(),
                method: config.method,
                stopping_rule: config.stopping_rule,
                seed: base_seed,
                replications: config.replications,
                parallelism: config.parallelism,
            },
            trajectories,
            aggregate,
            conditional,
            duration_ms: elapsed.as_millis() as u64,
        })
    }
}
