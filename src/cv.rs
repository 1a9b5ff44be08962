//! k-fold cross-validation as an explicit wrapper around an evaluation callback

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::{
    data::SurvivalData,
    error::{SurvError, Result},
};

/// one train/test split, as row indices into the full data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// decides how rows are split into folds
pub trait FoldStrategy: Send + Sync {
    fn n_folds(&self) -> usize;

    /// folds for one repetition; `repeat` lets strategies re-draw the split
    fn folds(&self, data: &SurvivalData, repeat: usize) -> Result<Vec<Fold>>;
}

impl<S: FoldStrategy + ?Sized> FoldStrategy for Box<S> {
    fn n_folds(&self) -> usize {
        (**self).n_folds()
    }

    fn folds(&self, data: &SurvivalData, repeat: usize) -> Result<Vec<Fold>> {
        (**self).folds(data, repeat)
    }
}

fn check_fold_count(n_folds: usize, n_samples: usize) -> Result<()> {
    if n_folds < 2 {
        return Err(SurvError::invalid_parameter("n_folds", n_folds));
    }
    if n_folds > n_samples {
        return Err(SurvError::invalid_dimensions(
            format!("can't make {} folds out of {} samples", n_folds, n_samples)
        ));
    }
    Ok(())
}

/// turn per-fold test sets into train/test pairs
fn folds_from_test_sets(test_sets: Vec<Vec<usize>>, n_samples: usize) -> Vec<Fold> {
    let mut owner = vec![0usize; n_samples];
    for (k, test) in test_sets.iter().enumerate() {
        for &i in test {
            owner[i] = k;
        }
    }

    test_sets
        .into_iter()
        .enumerate()
        .map(|(k, mut test)| {
            test.sort_unstable();
            let train = (0..n_samples).filter(|&i| owner[i] != k).collect();
            Fold { train, test }
        })
        .collect()
}

/// plain k-fold: contiguous chunks of a (shuffled) row order
#[derive(Debug, Clone)]
pub struct KFold {
    pub n_folds: usize,
    pub shuffle: bool,
    pub seed: u64,
}

impl KFold {
    pub fn new(n_folds: usize) -> Self {
        Self { n_folds, shuffle: true, seed: 0 }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn without_shuffle(mut self) -> Self {
        self.shuffle = false;
        self
    }
}

impl FoldStrategy for KFold {
    fn n_folds(&self) -> usize {
        self.n_folds
    }

    fn folds(&self, data: &SurvivalData, repeat: usize) -> Result<Vec<Fold>> {
        let n = data.n_samples();
        check_fold_count(self.n_folds, n)?;

        let mut order: Vec<usize> = (0..n).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(repeat as u64));
            order.shuffle(&mut rng);
        }

        // first n % k folds get one extra row
        let base = n / self.n_folds;
        let extra = n % self.n_folds;
        let mut test_sets = Vec::with_capacity(self.n_folds);
        let mut start = 0;
        for k in 0..self.n_folds {
            let size = base + usize::from(k < extra);
            test_sets.push(order[start..start + size].to_vec());
            start += size;
        }

        Ok(folds_from_test_sets(test_sets, n))
    }
}

/// k-fold that deals events and censored rows separately so every fold
/// keeps roughly the overall event ratio
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    pub n_folds: usize,
    pub seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_folds: usize) -> Self {
        Self { n_folds, seed: 0 }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl FoldStrategy for StratifiedKFold {
    fn n_folds(&self) -> usize {
        self.n_folds
    }

    fn folds(&self, data: &SurvivalData, repeat: usize) -> Result<Vec<Fold>> {
        let n = data.n_samples();
        check_fold_count(self.n_folds, n)?;

        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(repeat as u64));
        let (mut event_rows, mut censored_rows): (Vec<usize>, Vec<usize>) =
            (0..n).partition(|&i| data.events()[i]);
        event_rows.shuffle(&mut rng);
        censored_rows.shuffle(&mut rng);

        // censored rows continue the round robin where events stopped
        let mut test_sets = vec![Vec::new(); self.n_folds];
        for (slot, i) in event_rows.into_iter().chain(censored_rows).enumerate() {
            test_sets[slot % self.n_folds].push(i);
        }

        Ok(folds_from_test_sets(test_sets, n))
    }
}

/// wraps `eval(train, test, params) -> score` so that calling `score(params)`
/// runs it on every fold and returns the mean
pub struct CrossValidated<'a, P, F> {
    data: &'a SurvivalData,
    strategy: Box<dyn FoldStrategy + 'a>,
    repeats: usize,
    eval: F,
    _params: std::marker::PhantomData<fn(&P)>,
}

impl<'a, P, F> CrossValidated<'a, P, F>
where
    F: Fn(&SurvivalData, &SurvivalData, &P) -> Result<f64>,
{
    pub fn new(data: &'a SurvivalData, strategy: impl FoldStrategy + 'a, eval: F) -> Self {
        Self {
            data,
            strategy: Box::new(strategy),
            repeats: 1,
            eval,
            _params: std::marker::PhantomData,
        }
    }

    /// repeat the whole k-fold run w/ fresh splits and average everything
    pub fn with_repeats(mut self, repeats: usize) -> Self {
        self.repeats = repeats.max(1);
        self
    }

    pub fn n_folds(&self) -> usize {
        self.strategy.n_folds()
    }

    /// every (repeat, fold) split this wrapper will evaluate
    pub fn splits(&self) -> Result<Vec<Fold>> {
        let mut all = Vec::with_capacity(self.repeats * self.n_folds());
        for repeat in 0..self.repeats {
            all.extend(self.strategy.folds(self.data, repeat)?);
        }
        Ok(all)
    }

    /// per-fold scores, in split order
    pub fn fold_scores(&self, params: &P) -> Result<Vec<f64>> {
        self.splits()?
            .iter()
            .enumerate()
            .map(|(k, fold)| {
                let train = self.data.subset(&fold.train)?;
                let test = self.data.subset(&fold.test)?;
                let score = (self.eval)(&train, &test, params)?;
                debug!(fold = k, train = train.n_samples(), test = test.n_samples(), score, "fold scored");
                Ok(score)
            })
            .collect()
    }

    /// mean score across all folds
    pub fn score(&self, params: &P) -> Result<f64> {
        let scores = self.fold_scores(params)?;
        Ok(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use std::cell::Cell;

    fn create_test_data(n: usize) -> SurvivalData {
        let times: Vec<f64> = (0..n).map(|i| 1.0 + i as f64).collect();
        let events: Vec<bool> = (0..n).map(|i| i % 3 != 0).collect();
        let covariates = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f64);
        SurvivalData::new(times, events, covariates).unwrap()
    }

    fn assert_partition(folds: &[Fold], n: usize) {
        let mut seen = vec![0usize; n];
        for fold in folds {
            for &i in &fold.test {
                seen[i] += 1;
            }
            assert_eq!(fold.train.len() + fold.test.len(), n);
            assert!(fold.train.iter().all(|i| !fold.test.contains(i)));
        }
        assert!(seen.iter().all(|&c| c == 1), "every row is tested exactly once");
    }

    #[test]
    fn test_kfold_partitions() {
        let data = create_test_data(23);
        let folds = KFold::new(5).with_seed(9).folds(&data, 0).unwrap();

        assert_eq!(folds.len(), 5);
        assert_partition(&folds, 23);
        let sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
        assert_eq!(sizes, vec![5, 5, 5, 4, 4]);
    }

    #[test]
    fn test_kfold_without_shuffle_is_contiguous() {
        let data = create_test_data(6);
        let folds = KFold::new(2).without_shuffle().folds(&data, 0).unwrap();
        assert_eq!(folds[0].test, vec![0, 1, 2]);
        assert_eq!(folds[1].test, vec![3, 4, 5]);
        assert_eq!(folds[1].train, vec![0, 1, 2]);
    }

    #[test]
    fn test_kfold_seeded() {
        let data = create_test_data(30);
        let a = KFold::new(3).with_seed(1).folds(&data, 0).unwrap();
        let b = KFold::new(3).with_seed(1).folds(&data, 0).unwrap();
        let c = KFold::new(3).with_seed(1).folds(&data, 1).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_bad_fold_counts() {
        let data = create_test_data(4);
        assert!(KFold::new(1).folds(&data, 0).is_err());
        assert!(KFold::new(5).folds(&data, 0).is_err());
        assert!(StratifiedKFold::new(0).folds(&data, 0).is_err());
    }

    #[test]
    fn test_stratified_keeps_events_spread() {
        let data = create_test_data(30); // 20 events, 10 censored
        let folds = StratifiedKFold::new(5).with_seed(3).folds(&data, 0).unwrap();
        assert_partition(&folds, 30);

        for fold in &folds {
            let events = fold.test.iter().filter(|&&i| data.events()[i]).count();
            assert_eq!(events, 4);
            assert_eq!(fold.test.len(), 6);
        }
    }

    #[test]
    fn test_cross_validated_mean() {
        let data = create_test_data(12);
        // score = test fold size / params, mean over 3 folds of 4
        let cv = CrossValidated::new(&data, KFold::new(3), |_train, test, scale: &f64| {
            Ok(test.n_samples() as f64 / scale)
        });

        assert_eq!(cv.n_folds(), 3);
        assert_eq!(cv.fold_scores(&2.0).unwrap(), vec![2.0, 2.0, 2.0]);
        assert_eq!(cv.score(&4.0).unwrap(), 1.0);
    }

    #[test]
    fn test_cross_validated_repeats() {
        let data = create_test_data(10);
        let calls = Cell::new(0);
        let cv = CrossValidated::new(&data, KFold::new(2), |train, test, _: &()| {
            calls.set(calls.get() + 1);
            assert_eq!(train.n_samples() + test.n_samples(), 10);
            Ok(0.5)
        })
        .with_repeats(3);

        assert_eq!(cv.score(&()).unwrap(), 0.5);
        assert_eq!(calls.get(), 6);
    }

    #[test]
    fn test_cross_validated_propagates_errors() {
        let data = create_test_data(10);
        let cv = CrossValidated::new(&data, KFold::new(2), |_, _, _: &()| {
            Err(SurvError::numerical_error("training blew up"))
        });
        assert!(matches!(cv.score(&()), Err(SurvError::NumericalError { .. })));
    }
}
