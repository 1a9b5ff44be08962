use ndarray::{Array1, Array2, ArrayView2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;

use crate::error::{SurvError, Result};

/// fully connected layer, `w` is (inputs x outputs)
#[derive(Debug, Clone)]
pub struct DenseLayer {
    pub w: Array2<f64>,
    pub b: Array1<f64>,
}

impl DenseLayer {
    /// he-uniform init, biases start at zero
    fn new<R: Rng + ?Sized>(n_in: usize, n_out: usize, rng: &mut R) -> Self {
        let limit = (6.0 / n_in as f64).sqrt();
        Self {
            w: Array2::random_using((n_in, n_out), Uniform::new(-limit, limit), rng),
            b: Array1::zeros(n_out),
        }
    }

    fn forward(&self, x: ArrayView2<f64>) -> Array2<f64> {
        x.dot(&self.w) + &self.b
    }

    fn n_parameters(&self) -> usize {
        self.w.len() + self.b.len()
    }
}

/// what `forward_train` remembers for the backward pass
#[derive(Debug)]
pub struct ForwardCache {
    inputs: Vec<Array2<f64>>,      // input to each layer
    pre_activations: Vec<Array2<f64>>, // hidden z before relu
    masks: Vec<Array2<f64>>,       // scaled dropout masks
}

/// two hidden relu layers -> one linear log-risk output
#[derive(Debug, Clone)]
pub struct SurvivalNet {
    hidden: [DenseLayer; 2],
    output: DenseLayer,
    dropout: f64,
}

impl SurvivalNet {
    pub fn new<R: Rng + ?Sized>(
        n_in: usize,
        hidden_1: usize,
        hidden_2: usize,
        dropout: f64,
        rng: &mut R,
    ) -> Result<Self> {
        if n_in == 0 || hidden_1 == 0 || hidden_2 == 0 {
            return Err(SurvError::invalid_parameter(
                "layer widths",
                format!("{}/{}/{}", n_in, hidden_1, hidden_2),
            ));
        }

        if !(0.0..1.0).contains(&dropout) {
            return Err(SurvError::invalid_parameter("dropout", dropout));
        }

        Ok(Self {
            hidden: [
                DenseLayer::new(n_in, hidden_1, rng),
                DenseLayer::new(hidden_1, hidden_2, rng),
            ],
            output: DenseLayer::new(hidden_2, 1, rng),
            dropout,
        })
    }

    pub fn n_features(&self) -> usize {
        self.hidden[0].w.nrows()
    }

    pub fn n_parameters(&self) -> usize {
        self.hidden.iter().map(DenseLayer::n_parameters).sum::<usize>()
            + self.output.n_parameters()
    }

    fn check_features(&self, x: &ArrayView2<f64>) -> Result<()> {
        if x.ncols() != self.n_features() {
            return Err(SurvError::invalid_dimensions(
                format!("feature count mismatch: expected {}, got {}",
                       self.n_features(), x.ncols())
            ));
        }
        Ok(())
    }

    /// inference pass - no dropout
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.check_features(&x)?;

        let mut a = x.to_owned();
        for layer in &self.hidden {
            a = layer.forward(a.view()).mapv(relu);
        }

        Ok(self.output.forward(a.view()).column(0).to_owned())
    }

    /// training pass w/ inverted dropout, keeps what backward needs
    pub fn forward_train<R: Rng + ?Sized>(
        &self,
        x: ArrayView2<f64>,
        rng: &mut R,
    ) -> Result<(Array1<f64>, ForwardCache)> {
        self.check_features(&x)?;

        let keep = 1.0 - self.dropout;
        let mut cache = ForwardCache {
            inputs: Vec::with_capacity(3),
            pre_activations: Vec::with_capacity(2),
            masks: Vec::with_capacity(2),
        };

        let mut a = x.to_owned();
        for layer in &self.hidden {
            let z = layer.forward(a.view());
            let mask = Array2::random_using(z.raw_dim(), Uniform::new(0.0, 1.0), rng)
                .mapv(|u: f64| if u < keep { 1.0 / keep } else { 0.0 });

            let next = z.mapv(relu) * &mask;
            cache.inputs.push(a);
            cache.pre_activations.push(z);
            cache.masks.push(mask);
            a = next;
        }

        let risk = self.output.forward(a.view()).column(0).to_owned();
        cache.inputs.push(a);
        Ok((risk, cache))
    }

    /// gradients of the loss w.r.t. every parameter, flattened in `parameters()` order
    pub fn backward(&self, cache: &ForwardCache, d_risk: &Array1<f64>) -> Result<Array1<f64>> {
        let n = d_risk.len();
        if cache.inputs.len() != 3 || cache.inputs[2].nrows() != n {
            return Err(SurvError::invalid_dimensions(
                "backward called with a cache from a different batch"
            ));
        }

        let g = d_risk.view().insert_axis(Axis(1)); // (n x 1)
        let mut grads_w = Vec::with_capacity(3);
        let mut grads_b = Vec::with_capacity(3);

        grads_w.push(cache.inputs[2].t().dot(&g));
        grads_b.push(g.sum_axis(Axis(0)));
        let mut d_a = g.dot(&self.output.w.t());

        for (l, layer) in self.hidden.iter().enumerate().rev() {
            let d_z = (d_a * &cache.masks[l]) * &cache.pre_activations[l].mapv(relu_grad);
            grads_w.push(cache.inputs[l].t().dot(&d_z));
            grads_b.push(d_z.sum_axis(Axis(0)));
            d_a = d_z.dot(&layer.w.t());
        }

        grads_w.reverse();
        grads_b.reverse();
        Ok(flatten(&grads_w, &grads_b))
    }

    fn layers(&self) -> [&DenseLayer; 3] {
        [&self.hidden[0], &self.hidden[1], &self.output]
    }

    /// every weight & bias as one vector (layer by layer, weights then biases)
    pub fn parameters(&self) -> Array1<f64> {
        let layers = self.layers();
        let ws: Vec<Array2<f64>> = layers.iter().map(|l| l.w.clone()).collect();
        let bs: Vec<Array1<f64>> = layers.iter().map(|l| l.b.clone()).collect();
        flatten(&ws, &bs)
    }

    /// 1 for weights, 0 for biases - regularization only touches weights
    pub fn weight_mask(&self) -> Array1<f64> {
        let mut mask = Vec::with_capacity(self.n_parameters());
        for layer in self.layers() {
            mask.extend(std::iter::repeat(1.0).take(layer.w.len()));
            mask.extend(std::iter::repeat(0.0).take(layer.b.len()));
        }
        Array1::from(mask)
    }

    pub fn set_parameters(&mut self, params: &Array1<f64>) -> Result<()> {
        if params.len() != self.n_parameters() {
            return Err(SurvError::invalid_dimensions(
                format!("expected {} parameters, got {}", self.n_parameters(), params.len())
            ));
        }

        let mut offset = 0;
        for layer in self.hidden.iter_mut().chain(std::iter::once(&mut self.output)) {
            let (rows, cols) = layer.w.dim();
            let w = params.slice(ndarray::s![offset..offset + rows * cols]);
            layer.w.assign(&w.into_shape((rows, cols)).map_err(|e| {
                SurvError::invalid_dimensions(e.to_string())
            })?);
            offset += rows * cols;

            let nb = layer.b.len();
            layer.b.assign(&params.slice(ndarray::s![offset..offset + nb]));
            offset += nb;
        }

        Ok(())
    }
}

fn flatten(ws: &[Array2<f64>], bs: &[Array1<f64>]) -> Array1<f64> {
    let mut flat = Vec::with_capacity(
        ws.iter().map(|w| w.len()).sum::<usize>() + bs.iter().map(|b| b.len()).sum::<usize>()
    );
    for (w, b) in ws.iter().zip(bs) {
        flat.extend(w.iter().copied());
        flat.extend(b.iter().copied());
    }
    Array1::from(flat)
}

fn relu(x: f64) -> f64 {
    x.max(0.0)
}

fn relu_grad(x: f64) -> f64 {
    if x > 0.0 { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn net(dropout: f64) -> SurvivalNet {
        let mut rng = StdRng::seed_from_u64(7);
        SurvivalNet::new(3, 4, 2, dropout, &mut rng).unwrap()
    }

    fn batch() -> Array2<f64> {
        Array2::from_shape_vec((4, 3), vec![
            0.5, -1.0, 0.2,
            1.5, 0.3, -0.7,
            -0.4, 0.8, 1.1,
            0.0, 0.1, -0.2,
        ]).unwrap()
    }

    #[test]
    fn test_shapes() {
        let model = net(0.0);
        assert_eq!(model.n_features(), 3);
        assert_eq!(model.n_parameters(), 3 * 4 + 4 + 4 * 2 + 2 + 2 + 1);
        assert_eq!(model.parameters().len(), model.n_parameters());
        assert_eq!(model.weight_mask().sum() as usize, 3 * 4 + 4 * 2 + 2);

        let risk = model.predict(batch().view()).unwrap();
        assert_eq!(risk.len(), 4);
        assert!(risk.iter().all(|r| r.is_finite()));
    }

    #[test]
    fn test_rejects_bad_config() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(SurvivalNet::new(3, 0, 2, 0.1, &mut rng).is_err());
        assert!(SurvivalNet::new(3, 4, 2, 1.0, &mut rng).is_err());
        assert!(net(0.0).predict(Array2::zeros((2, 5)).view()).is_err());
    }

    #[test]
    fn test_parameter_round_trip() {
        let mut model = net(0.0);
        let params = model.parameters().mapv(|p| p * 0.5 + 0.01);
        model.set_parameters(&params).unwrap();
        assert_eq!(model.parameters(), params);
        assert!(model.set_parameters(&Array1::zeros(3)).is_err());
    }

    #[test]
    fn test_train_pass_matches_predict_without_dropout() {
        let model = net(0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let (risk, _) = model.forward_train(batch().view(), &mut rng).unwrap();
        let expected = model.predict(batch().view()).unwrap();
        for (a, b) in risk.iter().zip(expected.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_backward_matches_finite_differences() {
        // loss = sum(risk * c) so d loss / d risk = c
        let mut model = net(0.0);
        let x = batch();
        let c = Array1::from(vec![0.3, -1.2, 0.7, 0.4]);
        let mut rng = StdRng::seed_from_u64(2);

        let (_, cache) = model.forward_train(x.view(), &mut rng).unwrap();
        let grad = model.backward(&cache, &c).unwrap();

        let base = model.parameters();
        let h = 1e-6;
        for k in 0..base.len() {
            let mut plus = base.clone();
            plus[k] += h;
            model.set_parameters(&plus).unwrap();
            let up = model.predict(x.view()).unwrap().dot(&c);

            let mut minus = base.clone();
            minus[k] -= h;
            model.set_parameters(&minus).unwrap();
            let down = model.predict(x.view()).unwrap().dot(&c);

            assert_relative_eq!(grad[k], (up - down) / (2.0 * h), epsilon = 1e-5);
        }
    }

    #[test]
    fn test_dropout_zeroes_some_units() {
        let model = net(0.5);
        let mut rng = StdRng::seed_from_u64(3);
        let x = Array2::from_elem((64, 3), 1.0);
        let (_, cache) = model.forward_train(x.view(), &mut rng).unwrap();

        let zeros = cache.masks[0].iter().filter(|&&m| m == 0.0).count();
        assert!(zeros > 0 && zeros < cache.masks[0].len());
        assert!(cache.masks[0].iter().all(|&m| m == 0.0 || (m - 2.0).abs() < 1e-12));
    }
}
