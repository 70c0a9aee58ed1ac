//! Geometric tower-height sampling
//!
//! Heights come from per-thread generators. Sharing one generator across
//! writer threads would serialize them on the sampler and correlate the
//! draws, so every thread seeds its own.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;

thread_local! {
    static TOWER_RNG: RefCell<StdRng> = RefCell::new(StdRng::from_entropy());
}

/// Draws a tower height in `[1, max_height]`
///
/// Classic skip-list distribution: starting at one, each additional level is
/// kept with probability `probability`, capped at `max_height`.
pub(crate) fn random_height(max_height: usize, probability: f64) -> usize {
    TOWER_RNG.with(|rng| {
        let mut rng = rng.borrow_mut();
        let mut height = 1;
        while height < max_height && rng.gen_bool(probability) {
            height += 1;
        }
        height
    })
}
