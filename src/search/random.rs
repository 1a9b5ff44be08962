use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use super::{Evaluator, ParameterSet, SearchSpace, Solver};
use crate::error::Result;

/// uniform samples from the box
#[derive(Debug, Clone, Copy)]
pub struct RandomSearch {
    pub seed: u64,
}

impl RandomSearch {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn candidates(&self, space: &SearchSpace, count: usize) -> Vec<ParameterSet> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..count)
            .map(|_| {
                let unit: Vec<f64> = (0..space.len()).map(|_| rng.gen::<f64>()).collect();
                space.scale_unit(&unit)
            })
            .collect()
    }
}

impl Solver for RandomSearch {
    fn name(&self) -> &'static str {
        "random search"
    }

    fn optimize(&self, space: &SearchSpace, evaluator: &mut Evaluator<'_>) -> Result<()> {
        let candidates = self.candidates(space, evaluator.remaining());
        evaluator.evaluate(&candidates)?;
        Ok(())
    }
}
