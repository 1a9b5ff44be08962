//! training objectives on a batch of risk scores
//!
//! all losses are minimized and return `(loss, d loss / d risk)`.

use ndarray::{Array1, ArrayView1};
use crate::error::{SurvError, Result};

/// ranking loss exponent is clamped here so far-apart pairs can't overflow;
/// a clamped pair adds a constant and no gradient
const MAX_EXPONENT: f64 = 50.0;

fn check_lengths(risk: &ArrayView1<f64>, times: &ArrayView1<f64>, events: &[bool]) -> Result<()> {
    if risk.len() != times.len() || risk.len() != events.len() {
        return Err(SurvError::invalid_dimensions(
            format!("risk ({}), times ({}) and events ({}) must match",
                   risk.len(), times.len(), events.len())
        ));
    }
    Ok(())
}

/// mean negative breslow log partial likelihood over the batch's events
pub fn cox_loss(
    risk: ArrayView1<f64>,
    times: ArrayView1<f64>,
    events: &[bool],
) -> Result<(f64, Array1<f64>)> {
    check_lengths(&risk, &times, events)?;

    let n = risk.len();
    let n_events = events.iter().filter(|&&e| e).count();
    let mut grad = Array1::zeros(n);
    if n_events == 0 {
        return Ok((0.0, grad)); // nothing to rank against
    }

    // shift before exp, the likelihood is shift invariant
    let max_risk = risk.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp_risk = risk.mapv(|r| (r - max_risk).exp());

    let mut loss = 0.0;
    for i in (0..n).filter(|&i| events[i]) {
        let at_risk: Vec<usize> = (0..n).filter(|&j| times[j] >= times[i]).collect();
        let risk_sum: f64 = at_risk.iter().map(|&j| exp_risk[j]).sum();

        loss -= risk[i] - (max_risk + risk_sum.ln());
        grad[i] -= 1.0;
        for &j in &at_risk {
            grad[j] += exp_risk[j] / risk_sum;
        }
    }

    let scale = 1.0 / n_events as f64;
    Ok((loss * scale, grad * scale))
}

/// mean of exp(-(r_i - r_j) / sigma) over comparable pairs
pub fn ranking_loss(
    risk: ArrayView1<f64>,
    times: ArrayView1<f64>,
    events: &[bool],
    sigma: f64,
) -> Result<(f64, Array1<f64>)> {
    check_lengths(&risk, &times, events)?;
    if !(sigma > 0.0 && sigma.is_finite()) {
        return Err(SurvError::invalid_parameter("sigma", sigma));
    }

    let n = risk.len();
    let mut grad = Array1::zeros(n);
    let mut loss = 0.0;
    let mut pairs = 0usize;

    for i in (0..n).filter(|&i| events[i]) {
        for j in 0..n {
            if i == j || !(times[j] > times[i] || (!events[j] && times[j] >= times[i])) {
                continue;
            }

            let exponent = -(risk[i] - risk[j]) / sigma;
            pairs += 1;
            if exponent >= MAX_EXPONENT {
                // loss is flat here, so the pair contributes no gradient
                loss += MAX_EXPONENT.exp();
                continue;
            }

            let term = exponent.exp();
            loss += term;
            grad[i] -= term / sigma;
            grad[j] += term / sigma;
        }
    }

    if pairs == 0 {
        return Ok((0.0, grad));
    }

    let scale = 1.0 / pairs as f64;
    Ok((loss * scale, grad * scale))
}

/// cox likelihood blended w/ the pairwise ranking loss:
/// `(1 - loss_mix) * cox + loss_mix * ranking`
#[derive(Debug, Clone, Copy)]
pub struct SurvivalLoss {
    pub loss_mix: f64,
    pub sigma: f64,
}

impl SurvivalLoss {
    pub fn new(loss_mix: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&loss_mix) {
            return Err(SurvError::invalid_parameter("loss_mix", loss_mix));
        }
        Ok(Self { loss_mix, sigma: 1.0 })
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn evaluate(
        &self,
        risk: ArrayView1<f64>,
        times: ArrayView1<f64>,
        events: &[bool],
    ) -> Result<(f64, Array1<f64>)> {
        let (mut loss, mut grad) = (0.0, Array1::zeros(risk.len()));

        if self.loss_mix < 1.0 {
            let (l, g) = cox_loss(risk, times, events)?;
            loss += (1.0 - self.loss_mix) * l;
            grad.scaled_add(1.0 - self.loss_mix, &g);
        }

        if self.loss_mix > 0.0 {
            let (l, g) = ranking_loss(risk, times, events, self.sigma)?;
            loss += self.loss_mix * l;
            grad.scaled_add(self.loss_mix, &g);
        }

        Ok((loss, grad))
    }
}
