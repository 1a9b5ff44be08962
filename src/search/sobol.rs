use super::{Evaluator, ParameterSet, SearchSpace, Solver};
use crate::error::{SurvError, Result};

const BITS: usize = 32;

/// (degree s, coefficients a, initial m_1..m_s) for dimensions 2.. (Joe & Kuo)
const DIRECTION_TABLE: [(u32, u32, &[u32]); 15] = [
    (1, 0, &[1]),
    (2, 1, &[1, 3]),
    (3, 1, &[1, 3, 1]),
    (3, 2, &[1, 1, 1]),
    (4, 1, &[1, 1, 3, 3]),
    (4, 4, &[1, 3, 5, 13]),
    (5, 2, &[1, 1, 5, 5, 17]),
    (5, 4, &[1, 1, 5, 5, 5]),
    (5, 7, &[1, 1, 7, 11, 19]),
    (5, 11, &[1, 1, 5, 1, 1]),
    (5, 13, &[1, 1, 1, 3, 11]),
    (5, 14, &[1, 3, 5, 5, 31]),
    (6, 1, &[1, 3, 3, 9, 7, 49]),
    (6, 13, &[1, 1, 1, 15, 21, 21]),
    (6, 16, &[1, 3, 1, 13, 27, 49]),
];

pub const MAX_SOBOL_DIMENSIONS: usize = DIRECTION_TABLE.len() + 1;

/// gray-code sobol sequence in [0, 1)^d
#[derive(Debug, Clone)]
pub struct SobolSequence {
    directions: Vec<[u32; BITS]>,
    state: Vec<u32>,
    index: u64,
}

fn direction_numbers(s: usize, a: u32, m: &[u32]) -> [u32; BITS] {
    let mut v = [0u32; BITS];
    for k in 0..BITS {
        v[k] = if k < s {
            m[k] << (BITS - 1 - k)
        } else {
            let mut value = v[k - s] ^ (v[k - s] >> s);
            for j in 1..s {
                if (a >> (s - 1 - j)) & 1 == 1 {
                    value ^= v[k - j];
                }
            }
            value
        };
    }
    v
}

impl SobolSequence {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 || dimensions > MAX_SOBOL_DIMENSIONS {
            return Err(SurvError::invalid_parameter("sobol dimensions", dimensions));
        }

        // first dimension is van der corput: every m = 1
        let mut directions = vec![direction_numbers(BITS, 0, &[1; BITS])];
        for &(s, a, m) in DIRECTION_TABLE.iter().take(dimensions - 1) {
            directions.push(direction_numbers(s as usize, a, m));
        }

        Ok(Self {
            directions,
            state: vec![0; dimensions],
            index: 0,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.directions.len()
    }

    /// next point; the first call returns the origin
    pub fn next_point(&mut self) -> Vec<f64> {
        let scale = 1.0 / (1u64 << BITS) as f64;
        if self.index > 0 {
            // flip the bit at the lowest zero of index - 1
            let c = (!(self.index - 1)).trailing_zeros() as usize;
            for (x, v) in self.state.iter_mut().zip(&self.directions) {
                *x ^= v[c.min(BITS - 1)];
            }
        }
        self.index += 1;
        self.state.iter().map(|&x| x as f64 * scale).collect()
    }
}

impl Iterator for SobolSequence {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_point())
    }
}

/// low-discrepancy points from a sobol sequence, origin skipped
#[derive(Debug, Clone, Copy)]
pub struct SobolSearch {
    pub skip: usize,
}

impl Default for SobolSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl SobolSearch {
    pub fn new() -> Self {
        Self { skip: 1 }
    }

    pub fn candidates(&self, space: &SearchSpace, count: usize) -> Result<Vec<ParameterSet>> {
        let sequence = SobolSequence::new(space.len())?;
        Ok(sequence
            .skip(self.skip)
            .take(count)
            .map(|unit| space.scale_unit(&unit))
            .collect())
    }
}

impl Solver for SobolSearch {
    fn name(&self) -> &'static str {
        "sobol"
    }

    fn optimize(&self, space: &SearchSpace, evaluator: &mut Evaluator<'_>) -> Result<()> {
        let candidates = self.candidates(space, evaluator.remaining())?;
        evaluator.evaluate(&candidates)?;
        Ok(())
    }
}
