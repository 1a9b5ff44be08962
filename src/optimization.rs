use ndarray::Array1;
use serde::{Deserialize, Serialize};
use crate::error::{SurvError, Result};

/// Optimization algorithm types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerType {
    Adam,
    RMSprop,
}

impl Default for OptimizerType {
    fn default() -> Self {
        Self::Adam
    }
}

/// Configuration for gradient-based network training
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    pub optimizer_type: OptimizerType,
    pub learning_rate: f64,
    pub l1_penalty: f64,
    pub l2_penalty: f64,
    pub beta1: f64,   // Adam momentum parameter
    pub beta2: f64,   // Adam/RMSprop decay parameter for second moment
    pub epsilon: f64, // Adam/RMSprop numerical stability
    pub max_update: f64, // per-parameter step clip
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            optimizer_type: OptimizerType::Adam,
            learning_rate: 0.001,
            l1_penalty: 0.0,
            l2_penalty: 0.0,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            max_update: 1.0,
        }
    }
}

impl OptimizationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(SurvError::invalid_parameter("learning_rate", self.learning_rate));
        }
        if !(self.l1_penalty >= 0.0 && self.l1_penalty.is_finite()) {
            return Err(SurvError::invalid_parameter("l1_penalty", self.l1_penalty));
        }
        if !(self.l2_penalty >= 0.0 && self.l2_penalty.is_finite()) {
            return Err(SurvError::invalid_parameter("l2_penalty", self.l2_penalty));
        }
        if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
            return Err(SurvError::invalid_parameter(
                "beta1/beta2",
                format!("{}/{}", self.beta1, self.beta2),
            ));
        }
        Ok(())
    }
}

/// Adam optimizer state for momentum tracking
#[derive(Debug, Clone)]
struct AdamState {
    m: Array1<f64>,  // First moment estimate
    v: Array1<f64>,  // Second moment estimate
    t: usize,        // Time step
}

impl AdamState {
    fn new(n_params: usize) -> Self {
        Self {
            m: Array1::zeros(n_params),
            v: Array1::zeros(n_params),
            t: 0,
        }
    }
}

/// RMSprop optimizer state for second moment tracking
#[derive(Debug, Clone)]
struct RMSpropState {
    v: Array1<f64>,  // moving average of squared gradients
}

impl RMSpropState {
    fn new(n_params: usize) -> Self {
        Self {
            v: Array1::zeros(n_params),
        }
    }
}

#[derive(Debug, Clone)]
enum OptimizerState {
    Adam(AdamState),
    RMSprop(RMSpropState),
}

/// descends a flat parameter vector, one mini-batch gradient at a time
#[derive(Debug, Clone)]
pub struct ParameterOptimizer {
    config: OptimizationConfig,
    state: OptimizerState,
}

impl ParameterOptimizer {
    pub fn new(config: OptimizationConfig, n_params: usize) -> Result<Self> {
        config.validate()?;
        let state = match config.optimizer_type {
            OptimizerType::Adam => OptimizerState::Adam(AdamState::new(n_params)),
            OptimizerType::RMSprop => OptimizerState::RMSprop(RMSpropState::new(n_params)),
        };
        Ok(Self { config, state })
    }

    /// L1 (sign) and L2 terms on the entries `penalty_mask` selects
    fn regularized_gradient(
        &self,
        params: &Array1<f64>,
        gradient: &Array1<f64>,
        penalty_mask: &Array1<f64>,
    ) -> Array1<f64> {
        let mut regularized = gradient.clone();

        if self.config.l2_penalty > 0.0 {
            regularized += &(self.config.l2_penalty * params * penalty_mask);
        }

        if self.config.l1_penalty > 0.0 {
            for i in 0..params.len() {
                if params[i].abs() > 1e-10 {  // subgradient is zero at zero
                    regularized[i] += self.config.l1_penalty * params[i].signum() * penalty_mask[i];
                }
            }
        }

        regularized
    }

    /// one update step: params <- params - step(gradient)
    pub fn step(
        &mut self,
        params: &mut Array1<f64>,
        gradient: &Array1<f64>,
        penalty_mask: &Array1<f64>,
    ) -> Result<()> {
        if gradient.len() != params.len() || penalty_mask.len() != params.len() {
            return Err(SurvError::invalid_dimensions(
                format!("params ({}), gradient ({}) and mask ({}) must match",
                       params.len(), gradient.len(), penalty_mask.len())
            ));
        }

        if gradient.iter().any(|g| !g.is_finite()) {
            return Err(SurvError::numerical_error("gradient blew up (NaN or inf)"));
        }

        let g = self.regularized_gradient(params, gradient, penalty_mask);
        let cfg = &self.config;

        let update = match &mut self.state {
            OptimizerState::Adam(adam) => {
                adam.t += 1;
                adam.m = &(cfg.beta1 * &adam.m) + &((1.0 - cfg.beta1) * &g);
                adam.v = &(cfg.beta2 * &adam.v) + &((1.0 - cfg.beta2) * &g.mapv(|x| x * x));

                // bias-corrected moments
                let m_hat = &adam.m / (1.0 - cfg.beta1.powi(adam.t as i32));
                let v_hat = &adam.v / (1.0 - cfg.beta2.powi(adam.t as i32));

                cfg.learning_rate * &m_hat / &v_hat.mapv(|v| v.sqrt() + cfg.epsilon)
            }
            OptimizerState::RMSprop(rms) => {
                rms.v = &(cfg.beta2 * &rms.v) + &((1.0 - cfg.beta2) * &g.mapv(|x| x * x));
                cfg.learning_rate * &g / &rms.v.mapv(|v| v.sqrt() + cfg.epsilon)
            }
        };

        let clip = cfg.max_update;
        params.zip_mut_with(&update, |p, &u| *p -= u.clamp(-clip, clip));

        if params.iter().any(|p| !p.is_finite()) {
            return Err(SurvError::numerical_error("parameters became NaN or inf"));
        }

        Ok(())
    }
}
