use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

/// Create a seeded generator, or an OS-seeded one when `seed` is `None`.
pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(rand::make_rng, StdRng::seed_from_u64)
}

/// Sample a value from the standard normal distribution using the Box-Muller transform.
pub(crate) fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.random_range(f64::EPSILON..=1.0);
    let u2: f64 = rng.random_range(0.0_f64..=core::f64::consts::TAU);
    (-2.0 * u1.ln()).sqrt() * u2.cos()
}
