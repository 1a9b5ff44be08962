//! dataset files - a serialized `(features, outcomes)` pair
//!
//! `.json` files go through serde_json, everything else is bincode. Also
//! generates synthetic cohorts for demos and smoke runs.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{Result, SurvError};

/// features (N x D) and outcomes (N x 2: time, event flag)
pub type DatasetPair = (Array2<f64>, Array2<f64>);

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// read a dataset file written by `save_dataset` (or anything with the same layout)
pub fn load_dataset(path: impl AsRef<Path>) -> Result<DatasetPair> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);

    let (features, outcomes): DatasetPair = if is_json(path) {
        serde_json::from_reader(reader)?
    } else {
        bincode::deserialize_from(reader)?
    };

    if features.nrows() != outcomes.nrows() {
        return Err(SurvError::invalid_dimensions(format!(
            "{}: features rows ({}) != outcomes rows ({})",
            path.display(),
            features.nrows(),
            outcomes.nrows()
        )));
    }

    debug!(
        path = %path.display(),
        samples = features.nrows(),
        features = features.ncols(),
        "loaded dataset"
    );
    Ok((features, outcomes))
}

/// write `(features, outcomes)` to disk
pub fn save_dataset(
    path: impl AsRef<Path>,
    features: &Array2<f64>,
    outcomes: &Array2<f64>,
) -> Result<()> {
    let path = path.as_ref();
    let writer = BufWriter::new(File::create(path)?);

    if is_json(path) {
        serde_json::to_writer(writer, &(features, outcomes))?;
    } else {
        bincode::serialize_into(writer, &(features, outcomes))?;
    }

    Ok(())
}

/// proportional-hazards cohort w/ a nonlinear log-risk:
/// `x0 - 0.5 x1 + 0.5 x0^2`, exponential event times, uniform censoring.
/// roughly a quarter of the rows end up censored.
pub fn synthetic_dataset(n_samples: usize, n_features: usize, seed: u64) -> Result<DatasetPair> {
    if n_samples < 2 {
        return Err(SurvError::invalid_parameter("n_samples", n_samples));
    }
    if n_features == 0 {
        return Err(SurvError::invalid_parameter("n_features", n_features));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let features: Array2<f64> = Array2::random_using((n_samples, n_features), Uniform::new(-1.0, 1.0), &mut rng);

    let mut outcomes = Array2::zeros((n_samples, 2));
    for (row, mut outcome) in features.axis_iter(Axis(0)).zip(outcomes.axis_iter_mut(Axis(0))) {
        let x0 = row[0];
        let x1 = if n_features > 1 { row[1] } else { 0.0 };
        let log_risk = x0 - 0.5 * x1 + 0.5 * x0 * x0;

        let event_time = -rng.gen::<f64>().max(1e-12).ln() / log_risk.exp();
        let censor_time = rng.gen_range(0.0..4.0);
        outcome[0] = event_time.min(censor_time);
        outcome[1] = if event_time <= censor_time { 1.0 } else { 0.0 };
    }

    Ok((features, outcomes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_bincode_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whas.bin");
        let features = array![[0.5, 1.0], [1.5, -2.0], [0.0, 0.0]];
        let outcomes = array![[3.0, 1.0], [4.0, 0.0], [1.0, 1.0]];

        save_dataset(&path, &features, &outcomes).unwrap();
        let (x, y) = load_dataset(&path).unwrap();
        assert_eq!(x, features);
        assert_eq!(y, outcomes);
    }

    #[test]
    fn test_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("support.json");
        let features = array![[0.5], [1.5]];
        let outcomes = array![[3.0, 1.0], [4.0, 0.0]];

        save_dataset(&path, &features, &outcomes).unwrap();
        let (x, _) = load_dataset(&path).unwrap();
        assert_eq!(x, features);
    }

    #[test]
    fn test_missing_file() {
        let err = load_dataset("/definitely/not/here.bin").unwrap_err();
        assert!(matches!(err, SurvError::Io(_)));
    }

    #[test]
    fn test_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, b"[1, 2").unwrap();
        assert!(matches!(load_dataset(&path), Err(SurvError::Decode(_))));
    }

    #[test]
    fn test_synthetic_dataset() {
        let (x, y) = synthetic_dataset(200, 4, 7).unwrap();
        assert_eq!(x.dim(), (200, 4));
        assert_eq!(y.dim(), (200, 2));
        assert!(y.column(0).iter().all(|&t| t >= 0.0 && t.is_finite()));

        let events = y.column(1).iter().filter(|&&e| e == 1.0).count();
        assert!(events > 100 && events < 200, "{} events", events);

        let (x2, y2) = synthetic_dataset(200, 4, 7).unwrap();
        assert_eq!(x, x2);
        assert_eq!(y, y2);
        assert!(synthetic_dataset(1, 4, 7).is_err());
        assert!(synthetic_dataset(10, 0, 7).is_err());
    }

    #[test]
    fn test_mismatched_rows_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bin");
        let features = array![[0.5], [1.5], [2.0]];
        let outcomes = array![[3.0, 1.0], [4.0, 0.0]];

        save_dataset(&path, &features, &outcomes).unwrap();
        assert!(load_dataset(&path).is_err());
    }
}
