//! Dirichlet noise for root exploration.

use rand_distr::{Distribution, Gamma};

use crate::core::GameRng;

use super::search::SearchError;

/// Sample a symmetric Dirichlet vector of `size` entries with concentration `alpha`.
///
/// Draws `Gamma(alpha, 1)` variates and normalizes them to sum to one. If every
/// draw underflows to zero (possible for very small `alpha`) the uniform vector
/// is returned instead.
pub fn dirichlet(alpha: f64, size: usize, rng: &mut GameRng) -> Result<Vec<f64>, SearchError> {
    if !(alpha > 0.0) || !alpha.is_finite() {
        return Err(SearchError::InvalidNoise(format!("alpha must be positive, got {alpha}")));
    }
    if size == 0 {
        return Ok(Vec::new());
    }

    let gamma = Gamma::new(alpha, 1.0).map_err(|e| SearchError::InvalidNoise(e.to_string()))?;
    let mut noise: Vec<f64> = (0..size).map(|_| gamma.sample(rng.inner_mut())).collect();

    let sum: f64 = noise.iter().sum();
    if sum > 0.0 {
        for x in &mut noise {
            *x /= sum;
        }
    } else {
        noise.fill(1.0 / size as f64);
    }
    Ok(noise)
}
