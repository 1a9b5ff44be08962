//! cross-validated hyperparameter search for the survival net
//!
//! `tune_hyperparameters` wraps "train on the training fold, score the held-out
//! fold by C-index" in k-fold cross-validation and hands the mean score to a
//! named solver. The solver sees six scalar dimensions; this module owns the
//! mapping from those scalars to a `TrainParams`.

use std::fmt::Write as _;
use std::path::Path;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    config::TuningConfig,
    cv::{CrossValidated, FoldStrategy, KFold, StratifiedKFold},
    data::SurvivalData,
    dataset::load_dataset,
    error::{Result, SurvError},
    metrics::concordance_index,
    optimization::OptimizerType,
    search::{maximize, Bounds, ParameterSet, SearchLog, SearchOptions, SearchSpace, SolverKind},
    train::{train_on, TrainParams},
};

pub const LOG_LEARNING_RATE: &str = "log_learning_rate";
pub const LOG_L1_REG: &str = "log_l1_reg";
pub const DROPOUT: &str = "dropout";
pub const HIDDEN_WIDTH_1: &str = "hidden_width_1";
pub const HIDDEN_WIDTH_2: &str = "hidden_width_2";
pub const LOSS_MIX: &str = "loss_mix";

/// search interval for each tunable hyperparameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HyperparameterRanges {
    pub log_learning_rate: Bounds, // lr = 10^x
    pub log_l1_reg: Bounds,        // l1 = 10^x
    pub dropout: Bounds,
    pub hidden_width_1: Bounds,
    pub hidden_width_2: Bounds,
    pub loss_mix: Bounds,
}

impl Default for HyperparameterRanges {
    fn default() -> Self {
        Self {
            log_learning_rate: Bounds::new(-6.0, -3.0),
            log_l1_reg: Bounds::new(-7.0, -3.0),
            dropout: Bounds::new(0.0, 0.5),
            hidden_width_1: Bounds::new(8.0, 64.0),
            hidden_width_2: Bounds::new(4.0, 32.0),
            loss_mix: Bounds::new(0.0, 1.0),
        }
    }
}

impl HyperparameterRanges {
    /// every range collapsed onto a single point
    pub fn fixed(values: &TunedValues) -> Self {
        let point = |v: f64| Bounds::new(v, v);
        Self {
            log_learning_rate: point(values.log_learning_rate),
            log_l1_reg: point(values.log_l1_reg),
            dropout: point(values.dropout),
            hidden_width_1: point(values.hidden_width_1),
            hidden_width_2: point(values.hidden_width_2),
            loss_mix: point(values.loss_mix),
        }
    }

    fn named(&self) -> [(&'static str, Bounds); 6] {
        [
            (LOG_LEARNING_RATE, self.log_learning_rate),
            (LOG_L1_REG, self.log_l1_reg),
            (DROPOUT, self.dropout),
            (HIDDEN_WIDTH_1, self.hidden_width_1),
            (HIDDEN_WIDTH_2, self.hidden_width_2),
            (LOSS_MIX, self.loss_mix),
        ]
    }

    /// the solver's box; also rejects ranges no training run could use
    pub fn to_space(&self) -> Result<SearchSpace> {
        let mut space = SearchSpace::new();
        for (name, bounds) in self.named() {
            space.add(name, bounds)?;
        }

        // low <= high is already checked, so the ends are enough
        if self.dropout.low < 0.0 || self.dropout.high >= 1.0 {
            return Err(SurvError::invalid_bounds(DROPOUT, self.dropout.low, self.dropout.high));
        }
        if self.loss_mix.low < 0.0 || self.loss_mix.high > 1.0 {
            return Err(SurvError::invalid_bounds(LOSS_MIX, self.loss_mix.low, self.loss_mix.high));
        }
        // widths round to >= 1 anyway, but a negative width range is a typo
        for (name, b) in [(HIDDEN_WIDTH_1, self.hidden_width_1), (HIDDEN_WIDTH_2, self.hidden_width_2)] {
            if b.low < 0.0 {
                return Err(SurvError::invalid_bounds(name, b.low, b.high));
            }
        }

        Ok(space)
    }
}

/// a single point in the search space, in solver coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TunedValues {
    pub log_learning_rate: f64,
    pub log_l1_reg: f64,
    pub dropout: f64,
    pub hidden_width_1: f64,
    pub hidden_width_2: f64,
    pub loss_mix: f64,
}

impl TunedValues {
    pub fn from_params(params: &ParameterSet) -> Result<Self> {
        let get = |name: &str| {
            params
                .get(name)
                .copied()
                .ok_or_else(|| SurvError::invalid_parameter(name, "missing"))
        };
        Ok(Self {
            log_learning_rate: get(LOG_LEARNING_RATE)?,
            log_l1_reg: get(LOG_L1_REG)?,
            dropout: get(DROPOUT)?,
            hidden_width_1: get(HIDDEN_WIDTH_1)?,
            hidden_width_2: get(HIDDEN_WIDTH_2)?,
            loss_mix: get(LOSS_MIX)?,
        })
    }

    /// decode into a training run
    pub fn train_params(&self, fixed: &FixedSettings) -> TrainParams {
        let width = |w: f64| w.round().max(1.0) as usize;
        TrainParams {
            hidden_width_1: width(self.hidden_width_1),
            hidden_width_2: width(self.hidden_width_2),
            dropout: self.dropout,
            learning_rate: 10f64.powf(self.log_learning_rate),
            l1_reg: 10f64.powf(self.log_l1_reg),
            loss_mix: self.loss_mix,
            batch_size: fixed.batch_size,
            epochs: fixed.epochs,
            optimizer: fixed.optimizer,
            seed: fixed.seed,
            standardize: fixed.standardize,
            ..Default::default()
        }
    }
}

/// everything held constant while the search runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedSettings {
    pub batch_size: usize,
    pub epochs: usize,
    pub optimizer: OptimizerType,
    pub seed: u64,
    pub standardize: bool,
    pub stratified: bool, // keep the event rate even across folds
    pub shuffle_folds: bool, // plain k-fold only, false keeps row order
    pub parallel: bool,   // score candidates on the rayon pool
}

impl Default for FixedSettings {
    fn default() -> Self {
        Self {
            batch_size: 64,
            epochs: 50,
            optimizer: OptimizerType::Adam,
            seed: 42,
            standardize: true,
            stratified: false,
            shuffle_folds: true,
            parallel: false,
        }
    }
}

impl FixedSettings {
    fn fold_strategy(&self, nfolds: usize) -> Box<dyn FoldStrategy> {
        if self.stratified {
            Box::new(StratifiedKFold::new(nfolds).with_seed(self.seed))
        } else if self.shuffle_folds {
            Box::new(KFold::new(nfolds).with_seed(self.seed))
        } else {
            Box::new(KFold::new(nfolds).without_shuffle())
        }
    }
}

/// best hyperparameters, their cross-validated C-index, and the search log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningResult {
    pub optimal: ParameterSet,
    pub optimum: f64,
    pub log: SearchLog,
}

impl TuningResult {
    /// `{name: value, ...}` in name order
    pub fn format_optimal(&self) -> String {
        let mut out = String::from("{");
        for (k, (name, value)) in self.optimal.iter().enumerate() {
            if k > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{}: {}", name, value);
        }
        out.push('}');
        out
    }

    /// the winning point decoded into a training run
    pub fn train_params(&self, fixed: &FixedSettings) -> Result<TrainParams> {
        Ok(TunedValues::from_params(&self.optimal)?.train_params(fixed))
    }

    pub fn print(&self) {
        println!("Optimal hyperparameters: {}", self.format_optimal());
        println!("Cross-validated C-index: {:.4}", self.optimum);
    }
}

/// search `ranges` for the hyperparameters w/ the best mean held-out C-index
///
/// `outcomes` is (N x 2): survival time, then event flag (non-zero = observed).
/// `method` is any name `SolverKind::from_name` accepts. At most `nevals`
/// candidates are trained, each `nfolds` times.
pub fn tune_hyperparameters(
    features: Array2<f64>,
    outcomes: ArrayView2<f64>,
    method: &str,
    nfolds: usize,
    nevals: usize,
    ranges: &HyperparameterRanges,
    fixed: &FixedSettings,
) -> Result<TuningResult> {
    let solver = SolverKind::from_name(method)?;
    if nfolds < 2 {
        return Err(SurvError::invalid_parameter("nfolds", nfolds));
    }
    if nevals == 0 {
        return Err(SurvError::invalid_parameter("nevals", nevals));
    }

    let space = ranges.to_space()?;
    let data = SurvivalData::from_arrays(features, outcomes)?;

    info!(
        samples = data.n_samples(),
        features = data.n_features(),
        events = data.n_events(),
        nfolds,
        nevals,
        solver = solver.name(),
        "tuning survival net"
    );

    let cv = CrossValidated::new(
        &data,
        fixed.fold_strategy(nfolds),
        |train: &SurvivalData, test: &SurvivalData, params: &ParameterSet| {
            let run = TunedValues::from_params(params)?.train_params(fixed);
            let model = train_on(train, &run)?;
            let risk = model.predict(test.covariates())?;
            concordance_index(risk.view(), test.times(), test.events())
        },
    );

    let options = SearchOptions { parallel: fixed.parallel, seed: fixed.seed };
    let outcome = maximize(|p: &ParameterSet| cv.score(p), nevals, solver.name(), &space, &options)?;

    Ok(TuningResult {
        optimal: outcome.optimal,
        optimum: outcome.optimum,
        log: outcome.log,
    })
}

/// load the dataset file and run the search described by `config`
pub fn tune_from_file(path: impl AsRef<Path>, config: &TuningConfig) -> Result<TuningResult> {
    let (features, outcomes) = load_dataset(path)?;
    tune_hyperparameters(
        features,
        outcomes.view(),
        &config.method,
        config.nfolds,
        config.nevals,
        &config.ranges,
        &config.settings,
    )
}
