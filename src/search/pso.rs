use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use tracing::debug;

use super::{Bounds, Evaluator, SearchSpace, Solver};
use crate::error::Result;

/// global-best particle swarm, positions & velocities clamped to the box
#[derive(Debug, Clone, Copy)]
pub struct ParticleSwarm {
    pub seed: u64,
    pub num_particles: Option<usize>, // default: ~sqrt(num_evals), at least 5
    pub inertia: f64,
    pub cognitive: f64,
    pub social: f64,
}

#[derive(Debug, Clone)]
struct Particle {
    position: Vec<f64>,
    velocity: Vec<f64>,
    best_position: Vec<f64>,
    best_score: f64,
}

impl ParticleSwarm {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            num_particles: None,
            inertia: 0.7,
            cognitive: 1.5,
            social: 1.5,
        }
    }

    pub fn with_particles(mut self, num_particles: usize) -> Self {
        self.num_particles = Some(num_particles.max(1));
        self
    }

    /// swarm size for a budget, never more than the budget
    pub fn swarm_size(&self, budget: usize) -> usize {
        let default = ((budget as f64).sqrt().round() as usize).max(5);
        self.num_particles.unwrap_or(default).min(budget).max(1)
    }

    fn spawn<R: Rng>(bounds: &[Bounds], rng: &mut R) -> Particle {
        let position: Vec<f64> = bounds.iter().map(|b| b.scale(rng.gen::<f64>())).collect();
        let velocity = bounds
            .iter()
            .map(|b| (2.0 * rng.gen::<f64>() - 1.0) * b.width())
            .collect();
        Particle {
            best_position: position.clone(),
            position,
            velocity,
            best_score: f64::NEG_INFINITY,
        }
    }
}

impl Solver for ParticleSwarm {
    fn name(&self) -> &'static str {
        "particle swarm"
    }

    fn optimize(&self, space: &SearchSpace, evaluator: &mut Evaluator<'_>) -> Result<()> {
        let bounds: Vec<Bounds> = space.iter().map(|(_, b)| *b).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut swarm: Vec<Particle> = (0..self.swarm_size(evaluator.remaining()))
            .map(|_| Self::spawn(&bounds, &mut rng))
            .collect();

        let mut global_best: Option<(Vec<f64>, f64)> = None;
        let mut generation = 0usize;

        while evaluator.remaining() > 0 {
            let candidates: Vec<_> = swarm.iter().map(|p| space.point(&p.position)).collect();
            let scores = evaluator.evaluate(&candidates)?;

            for (particle, &score) in swarm.iter_mut().zip(&scores) {
                // NaN never beats anything
                if score > particle.best_score {
                    particle.best_score = score;
                    particle.best_position = particle.position.clone();
                }
                if global_best.as_ref().map_or(score.is_finite(), |(_, best)| score > *best) {
                    global_best = Some((particle.position.clone(), score));
                }
            }

            debug!(generation, best = global_best.as_ref().map(|(_, s)| *s), "swarm generation");
            generation += 1;

            let Some((leader, _)) = global_best.as_ref() else {
                continue; // nothing finite yet, keep exploring from where we are
            };

            for particle in swarm.iter_mut() {
                for d in 0..bounds.len() {
                    let b = &bounds[d];
                    let (r1, r2) = (rng.gen::<f64>(), rng.gen::<f64>());
                    let v = self.inertia * particle.velocity[d]
                        + self.cognitive * r1 * (particle.best_position[d] - particle.position[d])
                        + self.social * r2 * (leader[d] - particle.position[d]);

                    particle.velocity[d] = v.clamp(-b.width(), b.width());
                    particle.position[d] = (particle.position[d] + particle.velocity[d]).clamp(b.low, b.high);
                }
            }
        }

        Ok(())
    }
}
