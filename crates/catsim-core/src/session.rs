//! The per-examinee adaptive testing loop.
//!
//! A session moves through select → administer → re-estimate → check-stop
//! until the stopping rule fires or the selector has nothing left to offer.
//! Each administration appends one [`ProgressionStep`]; the finished session
//! becomes an immutable [`Trajectory`].

use std::collections::HashSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::estimator::estimate_ability;
use crate::irt::fisher_information;
use crate::model::{
    Administration, EstimationMethod, ItemPool, ProgressionStep, StopReason, StoppingRule,
    Trajectory,
};
use crate::selector::select_next_item;
use crate::simulator::simulate_response;

/// Outcome of advancing a session by one administration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Another item may be administered.
    Continue,
    /// The session is over.
    Done(StopReason),
}

/// An in-progress adaptive test for one simulated examinee.
#[derive(Debug)]
pub struct AdaptiveSession<'a> {
    pool: &'a ItemPool,
    method: EstimationMethod,
    rule: StoppingRule,
    true_ability: f64,
    history: Vec<Administration>,
    used: HashSet<u32>,
    progression: Vec<ProgressionStep>,
    estimate: f64,
    standard_error: f64,
    cumulative_info: f64,
    stop_reason: Option<StopReason>,
}

impl<'a> AdaptiveSession<'a> {
    pub fn new(
        pool: &'a ItemPool,
        true_ability: f64,
        method: EstimationMethod,
        rule: StoppingRule,
    ) -> Self {
        Self {
            pool,
            method,
            rule,
            true_ability,
            history: Vec::with_capacity(pool.len()),
            used: HashSet::with_capacity(pool.len()),
            progression: vec![ProgressionStep::initial()],
            estimate: 0.0,
            standard_error: f64::INFINITY,
            cumulative_info: 0.0,
            stop_reason: None,
        }
    }

    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    pub fn standard_error(&self) -> f64 {
        self.standard_error
    }

    pub fn items_administered(&self) -> usize {
        self.history.len()
    }

    pub fn progression(&self) -> &[ProgressionStep] {
        &self.progression
    }

    pub fn is_done(&self) -> bool {
        self.stop_reason.is_some()
    }

    /// Select, administer and score one item, then check the stopping rule.
    pub fn advance<R>(&mut self, rng: &mut R) -> SessionState
    where
        R: Rng + ?Sized,
    {
        if let Some(reason) = self.stop_reason {
            return SessionState::Done(reason);
        }
        if let Some(reason) = self.check_stop() {
            return self.finish(reason);
        }

        let Some(item) = select_next_item(self.pool, self.estimate, &self.used).copied() else {
            let reason = if self.used.len() >= self.pool.len() {
                StopReason::PoolExhausted
            } else {
                StopReason::NoInformativeItem
            };
            return self.finish(reason);
        };

        let response = simulate_response(rng, self.true_ability, &item);
        self.history.push(Administration { item, response });
        self.used.insert(item.id);

        let result = estimate_ability(self.method, &self.history);
        self.estimate = result.estimate;
        self.standard_error = result.standard_error;

        let item_info = fisher_information(self.estimate, item.difficulty, item.discrimination);
        self.cumulative_info += item_info;

        let step = self.history.len();
        tracing::debug!(
            step,
            item_id = item.id,
            response,
            estimate = self.estimate,
            se = self.standard_error,
            "administered item"
        );

        self.progression.push(ProgressionStep {
            step,
            item_id: Some(item.id),
            difficulty: Some(item.difficulty),
            response: Some(response),
            ability_estimate: self.estimate,
            standard_error: self.standard_error,
            fisher_info: item_info,
            cumulative_fisher_info: self.cumulative_info,
            test_information: result.fisher_info,
        });

        match self.check_stop() {
            Some(reason) => self.finish(reason),
            None => SessionState::Continue,
        }
    }

    fn check_stop(&self) -> Option<StopReason> {
        let administered = self.history.len();
        let pool_size = self.pool.len();
        match self.rule {
            StoppingRule::FixedLength { length } if administered >= length => {
                Some(StopReason::FixedLengthReached)
            }
            StoppingRule::TargetSem { target } if self.standard_error <= target => {
                Some(StopReason::TargetSemReached)
            }
            _ if administered >= pool_size => Some(StopReason::PoolExhausted),
            _ => None,
        }
    }

    fn finish(&mut self, reason: StopReason) -> SessionState {
        self.stop_reason = Some(reason);
        SessionState::Done(reason)
    }

    /// Freeze the session into a trajectory. A session that has not reached
    /// [`SessionState::Done`] is recorded as [`StopReason::Interrupted`].
    pub fn into_trajectory(self) -> Trajectory {
        Trajectory {
            true_ability: self.true_ability,
            final_estimate: self.estimate,
            final_se: self.standard_error,
            items_administered: self.history.len(),
            stop_reason: self.stop_reason.unwrap_or(StopReason::Interrupted),
            seed: None,
            progression: self.progression,
        }
    }
}

/// Run one complete session, drawing responses from `rng`.
pub fn run_session<R>(
    pool: &ItemPool,
    true_ability: f64,
    method: EstimationMethod,
    rule: StoppingRule,
    rng: &mut R,
) -> Trajectory
where
    R: Rng + ?Sized,
{
    let mut session = AdaptiveSession::new(pool, true_ability, method, rule);
    while session.advance(rng) == SessionState::Continue {}
    session.into_trajectory()
}

/// Run one complete session on its own ChaCha stream seeded with `seed`.
pub fn run_seeded_session(
    pool: &ItemPool,
    true_ability: f64,
    method: EstimationMethod,
    rule: StoppingRule,
    seed: u64,
) -> Trajectory {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut trajectory = run_session(pool, true_ability, method, rule, &mut rng);
    trajectory.seed = Some(seed);
    trajectory
}

/// Seed for the session at `index` of a batch started with `base_seed`.
pub fn session_seed(base_seed: u64, index: usize) -> u64 {
    base_seed.wrapping_add(index as u64)
}
