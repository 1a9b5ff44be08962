//! black-box maximization over a box of named scalar parameters
//!
//! `maximize` picks a solver by name, spends at most `num_evals` calls of the
//! objective, and reports the best parameter set together with every call it
//! made. Solvers only propose candidates; the `Evaluator` owns the budget, the
//! log, and (optionally) parallel evaluation.

mod grid;
mod pso;
mod random;
mod sobol;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{SurvError, Result};

pub use grid::GridSearch;
pub use pso::ParticleSwarm;
pub use random::RandomSearch;
pub use sobol::{SobolSearch, SobolSequence, MAX_SOBOL_DIMENSIONS};

/// one candidate: parameter name -> value
pub type ParameterSet = BTreeMap<String, f64>;

/// closed interval a parameter is searched over, `[low, high]` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Bounds {
    pub low: f64,
    pub high: f64,
}

impl Bounds {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }

    /// map u in [0, 1] into the interval
    pub fn scale(&self, u: f64) -> f64 {
        (self.low + u * self.width()).clamp(self.low, self.high)
    }
}

impl From<(f64, f64)> for Bounds {
    fn from((low, high): (f64, f64)) -> Self {
        Self::new(low, high)
    }
}

impl From<[f64; 2]> for Bounds {
    fn from([low, high]: [f64; 2]) -> Self {
        Self::new(low, high)
    }
}

impl From<Bounds> for [f64; 2] {
    fn from(bounds: Bounds) -> Self {
        [bounds.low, bounds.high]
    }
}

/// the box being searched, dimensions in name order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    bounds: BTreeMap<String, Bounds>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// add a dimension, rejecting NaN/inf and inverted intervals
    pub fn add(&mut self, name: impl Into<String>, bounds: impl Into<Bounds>) -> Result<()> {
        let name = name.into();
        let bounds = bounds.into();
        if !bounds.low.is_finite() || !bounds.high.is_finite() || bounds.low > bounds.high {
            return Err(SurvError::invalid_bounds(name, bounds.low, bounds.high));
        }
        self.bounds.insert(name, bounds);
        Ok(())
    }

    pub fn with(mut self, name: impl Into<String>, bounds: impl Into<Bounds>) -> Result<Self> {
        self.add(name, bounds)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Bounds> {
        self.bounds.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Bounds)> {
        self.bounds.iter()
    }

    /// build a candidate from one coordinate per dimension (name order)
    pub fn point(&self, coordinates: &[f64]) -> ParameterSet {
        self.bounds
            .keys()
            .cloned()
            .zip(coordinates.iter().copied())
            .collect()
    }

    /// build a candidate from unit-cube coordinates
    pub fn scale_unit(&self, unit: &[f64]) -> ParameterSet {
        self.bounds
            .iter()
            .zip(unit)
            .map(|((name, b), &u)| (name.clone(), b.scale(u)))
            .collect()
    }

    pub fn contains(&self, params: &ParameterSet) -> bool {
        self.bounds.len() == params.len()
            && self.bounds
                .iter()
                .all(|(name, b)| params.get(name).map_or(false, |&v| b.contains(v)))
    }
}

/// one objective call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub params: ParameterSet,
    pub score: f64,
}

/// everything a search did, in call order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchLog {
    pub solver: String,
    pub evaluations: Vec<Evaluation>,
    pub elapsed_secs: f64,
}

impl SearchLog {
    pub fn num_evals(&self) -> usize {
        self.evaluations.len()
    }

    /// best finite score, first one wins ties
    pub fn best(&self) -> Option<&Evaluation> {
        self.evaluations
            .iter()
            .filter(|e| e.score.is_finite())
            .fold(None, |best: Option<&Evaluation>, e| match best {
                Some(b) if b.score >= e.score => Some(b),
                _ => Some(e),
            })
    }
}

/// best parameters, their score, and the call log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub optimal: ParameterSet,
    pub optimum: f64,
    pub log: SearchLog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// evaluate each batch of candidates on the rayon pool
    pub parallel: bool,
    /// seed for the stochastic solvers
    pub seed: u64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { parallel: false, seed: 42 }
    }
}

/// budgeted, logged access to the objective
pub struct Evaluator<'f> {
    objective: &'f (dyn Fn(&ParameterSet) -> Result<f64> + Sync),
    budget: usize,
    parallel: bool,
    evaluations: Vec<Evaluation>,
    best: f64,
}

impl<'f> Evaluator<'f> {
    pub fn new(
        objective: &'f (dyn Fn(&ParameterSet) -> Result<f64> + Sync),
        budget: usize,
        parallel: bool,
    ) -> Self {
        Self {
            objective,
            budget,
            parallel,
            evaluations: Vec::with_capacity(budget),
            best: f64::NEG_INFINITY,
        }
    }

    pub fn remaining(&self) -> usize {
        self.budget - self.evaluations.len()
    }

    /// score candidates in order; anything past the budget is dropped, so
    /// the returned vec can be shorter than `candidates`
    pub fn evaluate(&mut self, candidates: &[ParameterSet]) -> Result<Vec<f64>> {
        let batch = &candidates[..candidates.len().min(self.remaining())];
        let objective = self.objective;

        let results: Vec<Result<f64>> = if self.parallel {
            batch.par_iter().map(|p| objective(p)).collect()
        } else {
            batch.iter().map(|p| objective(p)).collect()
        };

        let mut scores = Vec::with_capacity(batch.len());
        for (params, result) in batch.iter().zip(results) {
            let score = result?;
            if score.is_finite() {
                debug!(call = self.evaluations.len(), score, ?params, "evaluated");
                if score > self.best {
                    self.best = score;
                    info!(call = self.evaluations.len(), score, "new best");
                }
            } else {
                warn!(call = self.evaluations.len(), ?params, "objective returned a non-finite score");
            }
            self.evaluations.push(Evaluation { params: params.clone(), score });
            scores.push(score);
        }

        Ok(scores)
    }

    fn into_evaluations(self) -> Vec<Evaluation> {
        self.evaluations
    }
}

/// proposes candidates and feeds them to the evaluator until the budget is gone
pub trait Solver: Send + Sync {
    fn name(&self) -> &'static str;

    fn optimize(&self, space: &SearchSpace, evaluator: &mut Evaluator<'_>) -> Result<()>;
}

/// the solvers `maximize` knows by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverKind {
    GridSearch,
    RandomSearch,
    Sobol,
    ParticleSwarm,
}

impl SolverKind {
    pub const ALL: [SolverKind; 4] = [
        SolverKind::GridSearch,
        SolverKind::RandomSearch,
        SolverKind::Sobol,
        SolverKind::ParticleSwarm,
    ];

    /// case-insensitive; `_` and `-` count as spaces, short forms accepted
    pub fn from_name(name: &str) -> Result<Self> {
        let normalized = name.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "grid search" | "grid" => Ok(Self::GridSearch),
            "random search" | "random" => Ok(Self::RandomSearch),
            "sobol" => Ok(Self::Sobol),
            "particle swarm" | "pso" => Ok(Self::ParticleSwarm),
            _ => Err(SurvError::UnknownSolver(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GridSearch => "grid search",
            Self::RandomSearch => "random search",
            Self::Sobol => "sobol",
            Self::ParticleSwarm => "particle swarm",
        }
    }

    pub fn build(&self, seed: u64) -> Box<dyn Solver> {
        match self {
            Self::GridSearch => Box::new(GridSearch),
            Self::RandomSearch => Box::new(RandomSearch::new(seed)),
            Self::Sobol => Box::new(SobolSearch::new()),
            Self::ParticleSwarm => Box::new(ParticleSwarm::new(seed)),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// run `solver` against `objective` w/ at most `num_evals` calls
pub fn maximize_with<F>(
    objective: F,
    num_evals: usize,
    solver: &dyn Solver,
    space: &SearchSpace,
    options: &SearchOptions,
) -> Result<SearchOutcome>
where
    F: Fn(&ParameterSet) -> Result<f64> + Sync,
{
    if space.is_empty() {
        return Err(SurvError::EmptySearchSpace);
    }
    if num_evals == 0 {
        return Err(SurvError::invalid_parameter("num_evals", num_evals));
    }

    info!(solver = solver.name(), num_evals, dimensions = space.len(), "starting search");
    let started = Instant::now();

    let mut evaluator = Evaluator::new(&objective, num_evals, options.parallel);
    solver.optimize(space, &mut evaluator)?;

    let log = SearchLog {
        solver: solver.name().to_string(),
        evaluations: evaluator.into_evaluations(),
        elapsed_secs: started.elapsed().as_secs_f64(),
    };

    let best = log.best().cloned().ok_or_else(|| {
        SurvError::numerical_error("no candidate produced a finite score")
    })?;

    info!(
        solver = solver.name(),
        calls = log.num_evals(),
        optimum = best.score,
        secs = log.elapsed_secs,
        "search finished"
    );

    Ok(SearchOutcome {
        optimal: best.params,
        optimum: best.score,
        log,
    })
}

/// look up the solver by name and run it
pub fn maximize<F>(
    objective: F,
    num_evals: usize,
    solver_name: &str,
    space: &SearchSpace,
    options: &SearchOptions,
) -> Result<SearchOutcome>
where
    F: Fn(&ParameterSet) -> Result<f64> + Sync,
{
    let solver = SolverKind::from_name(solver_name)?.build(options.seed);
    maximize_with(objective, num_evals, solver.as_ref(), space, options)
}
