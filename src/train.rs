use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    data::{Standardizer, SurvivalData},
    error::{SurvError, Result},
    loss::SurvivalLoss,
    metrics::ModelMetrics,
    network::SurvivalNet,
    optimization::{OptimizationConfig, OptimizerType, ParameterOptimizer},
};

/// everything one training run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainParams {
    pub hidden_width_1: usize,
    pub hidden_width_2: usize,
    pub dropout: f64,
    pub learning_rate: f64,
    pub l1_reg: f64,
    pub loss_mix: f64,     // 0 = pure cox likelihood, 1 = pure ranking loss
    pub ranking_sigma: f64,
    pub batch_size: usize,
    pub epochs: usize,
    pub optimizer: OptimizerType,
    pub seed: u64,
    pub standardize: bool, // z-score features w/ training-set stats
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            hidden_width_1: 32,
            hidden_width_2: 16,
            dropout: 0.1,
            learning_rate: 1e-3,
            l1_reg: 0.0,
            loss_mix: 0.0,
            ranking_sigma: 1.0,
            batch_size: 64,
            epochs: 50,
            optimizer: OptimizerType::Adam,
            seed: 42,
            standardize: true,
        }
    }
}

impl TrainParams {
    pub fn validate(&self) -> Result<()> {
        if self.hidden_width_1 == 0 {
            return Err(SurvError::invalid_parameter("hidden_width_1", self.hidden_width_1));
        }
        if self.hidden_width_2 == 0 {
            return Err(SurvError::invalid_parameter("hidden_width_2", self.hidden_width_2));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(SurvError::invalid_parameter("dropout", self.dropout));
        }
        if !(0.0..=1.0).contains(&self.loss_mix) {
            return Err(SurvError::invalid_parameter("loss_mix", self.loss_mix));
        }
        if !(self.ranking_sigma.is_finite() && self.ranking_sigma > 0.0) {
            return Err(SurvError::invalid_parameter("ranking_sigma", self.ranking_sigma));
        }
        if self.batch_size == 0 {
            return Err(SurvError::invalid_parameter("batch_size", self.batch_size));
        }
        if self.epochs == 0 {
            return Err(SurvError::invalid_parameter("epochs", self.epochs));
        }
        self.optimization_config().validate()
    }

    fn optimization_config(&self) -> OptimizationConfig {
        OptimizationConfig {
            optimizer_type: self.optimizer,
            learning_rate: self.learning_rate,
            l1_penalty: self.l1_reg,
            ..Default::default()
        }
    }
}

/// a fitted network plus what it needs to score new rows
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: SurvivalNet,
    pub standardizer: Option<Standardizer>,
    pub loss_history: Vec<f64>, // mean batch loss per epoch
}

impl TrainedModel {
    /// log-risk scores - higher means shorter expected survival
    pub fn predict(&self, features: ArrayView2<f64>) -> Result<Array1<f64>> {
        match &self.standardizer {
            Some(scaler) => self.model.predict(scaler.transform(features)?.view()),
            None => self.model.predict(features),
        }
    }

    pub fn evaluate(&self, data: &SurvivalData) -> Result<ModelMetrics> {
        let risk = self.predict(data.covariates())?;
        ModelMetrics::compute(data, risk.view())
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.loss_history.last().copied()
    }
}

/// fit a survival net w/ mini-batch gradient descent
pub fn train(
    features: ArrayView2<f64>,
    times: ArrayView1<f64>,
    events: &[bool],
    params: &TrainParams,
) -> Result<TrainedModel> {
    params.validate()?;

    let n = features.nrows();
    if times.len() != n || events.len() != n {
        return Err(SurvError::invalid_dimensions(
            format!("features rows ({}), times ({}) and events ({}) must match",
                   n, times.len(), events.len())
        ));
    }
    if n == 0 {
        return Err(SurvError::invalid_survival_data("can't train on zero samples"));
    }

    let mut rng = StdRng::seed_from_u64(params.seed);

    let standardizer = if params.standardize {
        Some(Standardizer::fit(features)?)
    } else {
        None
    };
    let x = match &standardizer {
        Some(scaler) => scaler.transform(features)?,
        None => features.to_owned(),
    };

    let mut model = SurvivalNet::new(
        x.ncols(),
        params.hidden_width_1,
        params.hidden_width_2,
        params.dropout,
        &mut rng,
    )?;
    let mut weights = model.parameters();
    let penalty_mask = model.weight_mask();
    let mut optimizer = ParameterOptimizer::new(params.optimization_config(), weights.len())?;
    let loss_fn = SurvivalLoss::new(params.loss_mix)?.with_sigma(params.ranking_sigma);

    let mut order: Vec<usize> = (0..n).collect();
    let mut loss_history = Vec::with_capacity(params.epochs);

    for epoch in 0..params.epochs {
        order.shuffle(&mut rng);

        let mut epoch_loss = 0.0;
        let mut n_batches = 0usize;

        for batch in order.chunks(params.batch_size) {
            let xb = x.select(Axis(0), batch);
            let tb = times.select(Axis(0), batch);
            let eb: Vec<bool> = batch.iter().map(|&i| events[i]).collect();

            let (risk, cache) = model.forward_train(xb.view(), &mut rng)?;
            let (loss, d_risk) = loss_fn.evaluate(risk.view(), tb.view(), &eb)?;
            if !loss.is_finite() {
                return Err(SurvError::numerical_error(
                    format!("loss diverged at epoch {}", epoch)
                ));
            }

            let grad = model.backward(&cache, &d_risk)?;
            optimizer.step(&mut weights, &grad, &penalty_mask)?;
            model.set_parameters(&weights)?;

            epoch_loss += loss;
            n_batches += 1;
        }

        let mean_loss = epoch_loss / n_batches as f64;
        trace!(epoch, loss = mean_loss, "epoch done");
        loss_history.push(mean_loss);
    }

    Ok(TrainedModel {
        model,
        standardizer,
        loss_history,
    })
}

/// `train` on a whole `SurvivalData`
pub fn train_on(data: &SurvivalData, params: &TrainParams) -> Result<TrainedModel> {
    train(data.covariates(), data.times(), data.events(), params)
}
