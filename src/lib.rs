//! # survival tune
//!
//! cross-validated hyperparameter search for deep cox survival networks
//!
//! ## what you get
//!
//! - a small DeepSurv-style net (two hidden layers, dropout, log-risk output)
//! - cox partial likelihood + pairwise ranking loss, mixed however you like
//! - k-fold (or event-stratified) cross-validation as a plain wrapper
//! - four solvers: grid search, random search, sobol, particle swarm
//! - harrell's c-index as the score being maximized
//!
//! ## quick start
//!
//! ```rust,no_run
//! use survival_tune::{synthetic_dataset, tune_hyperparameters, FixedSettings, HyperparameterRanges};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // 300 patients, 5 features; outcomes are (time, event) rows
//! let (features, outcomes) = synthetic_dataset(300, 5, 42)?;
//!
//! let result = tune_hyperparameters(
//!     features,
//!     outcomes.view(),
//!     "particle swarm",
//!     3,  // folds
//!     20, // candidates
//!     &HyperparameterRanges::default(),
//!     &FixedSettings { epochs: 20, ..Default::default() },
//! )?;
//!
//! result.print();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cv;
pub mod data;
pub mod dataset;
pub mod error;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod optimization;
pub mod search;
pub mod train;
pub mod tuning;

pub use config::TuningConfig;
pub use cv::{CrossValidated, FoldStrategy, KFold, StratifiedKFold};
pub use data::SurvivalData;
pub use dataset::{load_dataset, save_dataset, synthetic_dataset};
pub use error::{Result, SurvError};
pub use metrics::concordance_index;
pub use search::{maximize, Bounds, ParameterSet, SearchLog, SearchSpace, SolverKind};
pub use train::{train, TrainParams, TrainedModel};
pub use tuning::{tune_from_file, tune_hyperparameters, FixedSettings, HyperparameterRanges, TuningResult};
