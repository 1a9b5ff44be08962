use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use crate::error::{SurvError, Result};

/// survival data - times, events, and patient features
#[derive(Debug, Clone)]
pub struct SurvivalData {
    times: Array1<f64>,      // time to event/censoring
    events: Vec<bool>,       // true = event, false = censored
    covariates: Array2<f64>, // patient features (n_samples x n_features)
}

impl SurvivalData {
    /// make new survival data from raw vecs/arrays
    pub fn new(
        times: Vec<f64>,         // survival/censoring times
        events: Vec<bool>,       // true = event occurred, false = censored
        covariates: Array2<f64>, // patient features matrix
    ) -> Result<Self> {
        let n_samples = times.len();

        if events.len() != n_samples {
            return Err(SurvError::invalid_dimensions(
                format!("times len ({}) != events len ({})", n_samples, events.len())
            ));
        }

        if covariates.nrows() != n_samples {
            return Err(SurvError::invalid_dimensions(
                format!("covariates rows ({}) != n_samples ({})", covariates.nrows(), n_samples)
            ));
        }

        if times.iter().any(|&t| t < 0.0 || !t.is_finite()) {
            return Err(SurvError::invalid_survival_data(
                "survival times must be non-negative & finite"
            ));
        }

        if covariates.iter().any(|x| !x.is_finite()) {
            return Err(SurvError::invalid_survival_data(
                "covariates contain NaN or inf"
            ));
        }

        Ok(Self {
            times: Array1::from(times),
            events,
            covariates,
        })
    }

    /// build from a feature matrix (N x D) and an outcome matrix (N x 2) of
    /// (time, event flag) rows; any non-zero flag counts as an event
    pub fn from_arrays(features: Array2<f64>, outcomes: ArrayView2<f64>) -> Result<Self> {
        if outcomes.ncols() != 2 {
            return Err(SurvError::invalid_dimensions(
                format!("outcomes need 2 columns (time, event), got {}", outcomes.ncols())
            ));
        }

        if features.nrows() != outcomes.nrows() {
            return Err(SurvError::invalid_dimensions(
                format!("features rows ({}) != outcomes rows ({})", features.nrows(), outcomes.nrows())
            ));
        }

        let times = outcomes.column(0).to_vec();
        let events = outcomes.column(1).iter().map(|&e| e != 0.0).collect();
        Self::new(times, events, features)
    }

    /// how many patients
    pub fn n_samples(&self) -> usize {
        self.times.len()
    }

    /// how many features per patient
    pub fn n_features(&self) -> usize {
        self.covariates.ncols()
    }

    /// how many observed events (not censored)
    pub fn n_events(&self) -> usize {
        self.events.iter().filter(|&&e| e).count()
    }

    /// survival/censoring times
    pub fn times(&self) -> ArrayView1<'_, f64> {
        self.times.view()
    }

    /// event indicators (true = event, false = censored)
    pub fn events(&self) -> &[bool] {
        &self.events
    }

    /// patient feature matrix
    pub fn covariates(&self) -> ArrayView2<'_, f64> {
        self.covariates.view()
    }

    /// unique event times in order
    pub fn event_times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self.times
            .iter()
            .zip(self.events.iter())
            .filter_map(|(time, event)| if *event { Some(*time) } else { None })
            .collect();

        times.sort_by(f64::total_cmp);
        times.dedup();
        times
    }

    /// grab a subset of patients by indices
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        if indices.iter().any(|&i| i >= self.n_samples()) {
            return Err(SurvError::invalid_dimensions(
                "subset index out of bounds"
            ));
        }

        let times: Vec<f64> = indices.iter().map(|&i| self.times[i]).collect();
        let events: Vec<bool> = indices.iter().map(|&i| self.events[i]).collect();
        let covariates = self.covariates.select(Axis(0), indices);

        Self::new(times, events, covariates)
    }
}

/// per-column z-score transform, fitted on training rows and reused on test rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    pub means: Array1<f64>,
    pub stds: Array1<f64>,
}

impl Standardizer {
    pub fn fit(covariates: ArrayView2<f64>) -> Result<Self> {
        let means = covariates
            .mean_axis(Axis(0))
            .ok_or_else(|| SurvError::invalid_survival_data("can't standardize zero samples"))?;
        // constant columns only get centred
        let stds = covariates
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 { s } else { 1.0 });

        Ok(Self { means, stds })
    }

    pub fn transform(&self, covariates: ArrayView2<f64>) -> Result<Array2<f64>> {
        if covariates.ncols() != self.means.len() {
            return Err(SurvError::invalid_dimensions(
                format!("feature count mismatch: expected {}, got {}",
                       self.means.len(), covariates.ncols())
            ));
        }

        Ok((&covariates - &self.means) / &self.stds)
    }
}
