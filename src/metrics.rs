use ndarray::ArrayView1;
use crate::{
    data::SurvivalData,
    error::{SurvError, Result},
};

/// Harrell's C-index - how often do higher risk scores = shorter survival?
///
/// A pair (i, j) is comparable when i had an event and j outlived it (or was
/// censored no earlier than i's event). Tied risk scores count as half.
pub fn concordance_index(
    risk_scores: ArrayView1<f64>,
    times: ArrayView1<f64>,
    events: &[bool],
) -> Result<f64> {
    let n = risk_scores.len();
    if n != times.len() || n != events.len() {
        return Err(SurvError::invalid_dimensions(
            "risk scores, times, and events must have same length"
        ));
    }

    if n < 2 {
        return Err(SurvError::invalid_dimensions(
            "need at least 2 samples for concordance"
        ));
    }

    if risk_scores.iter().any(|r| !r.is_finite()) {
        return Err(SurvError::numerical_error("risk scores contain NaN or inf"));
    }

    let mut concordant = 0.0;
    let mut tied_risk = 0.0;
    let mut comparable = 0u64;

    for i in 0..n {
        if !events[i] {
            continue; // censored obs can't anchor a pair
        }

        for j in 0..n {
            if i == j {
                continue;
            }

            if times[j] > times[i] || (!events[j] && times[j] >= times[i]) {
                comparable += 1;

                if risk_scores[i] > risk_scores[j] {
                    concordant += 1.0;
                } else if risk_scores[i] == risk_scores[j] {
                    tied_risk += 1.0;
                }
            }
        }
    }

    if comparable == 0 {
        return Err(SurvError::numerical_error(
            "no comparable pairs for concordance calc"
        ));
    }

    Ok((concordant + 0.5 * tied_risk) / comparable as f64)
}

/// Breslow log partial likelihood of risk scores
pub fn log_partial_likelihood(
    data: &SurvivalData,
    risk_scores: ArrayView1<f64>,
) -> Result<f64> {
    if risk_scores.len() != data.n_samples() {
        return Err(SurvError::invalid_dimensions(
            "risk scores length must match number of samples"
        ));
    }

    let times = data.times();
    let events = data.events();
    let mut loglik = 0.0;

    for &event_time in &data.event_times() {
        let risk_set: Vec<usize> = (0..data.n_samples())
            .filter(|&i| times[i] >= event_time)
            .collect();

        // log-sum-exp w/ max shift
        let max_risk = risk_set.iter().map(|&i| risk_scores[i]).fold(f64::NEG_INFINITY, f64::max);
        let log_sum_exp = max_risk +
            risk_set.iter()
                .map(|&i| (risk_scores[i] - max_risk).exp())
                .sum::<f64>()
                .ln();

        for i in (0..data.n_samples()).filter(|&i| times[i] == event_time && events[i]) {
            loglik += risk_scores[i] - log_sum_exp;
        }
    }

    Ok(loglik)
}

/// evaluation summary for a set of predictions
#[derive(Debug, Clone)]
pub struct ModelMetrics {
    pub c_index: f64,
    pub log_likelihood: f64,
}

impl ModelMetrics {
    pub fn compute(data: &SurvivalData, risk_scores: ArrayView1<f64>) -> Result<Self> {
        Ok(Self {
            c_index: concordance_index(risk_scores, data.times(), data.events())?,
            log_likelihood: log_partial_likelihood(data, risk_scores)?,
        })
    }

    pub fn print(&self) {
        println!("C-index:             {:.6}", self.c_index);
        println!("Log-likelihood:      {:.6}", self.log_likelihood);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};
    use approx::assert_relative_eq;

    fn create_test_data() -> (SurvivalData, Array1<f64>) {
        let times = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let events = vec![true, false, true, true, false];
        let covariates = Array2::from_shape_vec((5, 2), vec![
            1.0, 2.0,
            0.0, 1.0,
            1.0, 0.0,
            -1.0, 1.0,
            0.0, -1.0,
        ]).unwrap();

        let data = SurvivalData::new(times, events, covariates).unwrap();
        let risk_scores = Array1::from(vec![0.5, -0.2, 0.8, -0.1, -0.5]);

        (data, risk_scores)
    }

    #[test]
    fn test_concordance_index_in_range() {
        let (data, risk_scores) = create_test_data();
        let c_index = concordance_index(
            risk_scores.view(),
            data.times(),
            data.events(),
        ).unwrap();

        assert!((0.0..=1.0).contains(&c_index));
    }

    #[test]
    fn test_concordance_hand_computed() {
        // comparable pairs: (0,1..4)=4, (2,3),(2,4)=2, (3,4)=1 -> 7
        // concordant: 0>1,0>3,0>4 (0<2 discordant); 2>3,2>4; 3>4 -> 6
        let (data, risk_scores) = create_test_data();
        let c_index = concordance_index(risk_scores.view(), data.times(), data.events()).unwrap();
        assert_relative_eq!(c_index, 6.0 / 7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_perfect_concordance() {
        let times = Array1::from(vec![1.0, 2.0, 3.0, 4.0]);
        let events = vec![true, true, true, true];
        let risk_scores = Array1::from(vec![4.0, 3.0, 2.0, 1.0]);

        let c_index = concordance_index(risk_scores.view(), times.view(), &events).unwrap();
        assert_relative_eq!(c_index, 1.0, epsilon = 1e-10);

        // negating the scores inverts the ordering
        let flipped = risk_scores.mapv(|r| -r);
        let c_index = concordance_index(flipped.view(), times.view(), &events).unwrap();
        assert_relative_eq!(c_index, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_ties_count_half() {
        let times = Array1::from(vec![1.0, 2.0, 3.0]);
        let events = vec![true, true, true];
        let risk_scores = Array1::from(vec![0.0, 0.0, 0.0]);

        let c_index = concordance_index(risk_scores.view(), times.view(), &events).unwrap();
        assert_relative_eq!(c_index, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_no_comparable_pairs() {
        let times = Array1::from(vec![1.0, 2.0]);
        let events = vec![false, false];
        let risk_scores = Array1::from(vec![0.1, 0.2]);

        assert!(concordance_index(risk_scores.view(), times.view(), &events).is_err());
    }

    #[test]
    fn test_dimension_mismatch_error() {
        let risk_scores = Array1::from(vec![1.0, 2.0]);
        let times = Array1::from(vec![1.0, 2.0, 3.0]);
        let events = vec![true, false];

        assert!(concordance_index(risk_scores.view(), times.view(), &events).is_err());
    }

    #[test]
    fn test_log_partial_likelihood() {
        let (data, risk_scores) = create_test_data();
        let loglik = log_partial_likelihood(&data, risk_scores.view()).unwrap();
        assert!(loglik.is_finite() && loglik < 0.0);

        // zero risk: each event contributes -ln(|risk set|) = -(ln 5 + ln 3 + ln 2)
        let zeros = Array1::zeros(5);
        let loglik = log_partial_likelihood(&data, zeros.view()).unwrap();
        assert_relative_eq!(loglik, -(5.0f64.ln() + 3.0f64.ln() + 2.0f64.ln()), epsilon = 1e-12);
    }

    #[test]
    fn test_model_metrics() {
        let (data, risk_scores) = create_test_data();
        let metrics = ModelMetrics::compute(&data, risk_scores.view()).unwrap();

        assert!((0.0..=1.0).contains(&metrics.c_index));
        assert!(metrics.log_likelihood.is_finite());
    }
}
