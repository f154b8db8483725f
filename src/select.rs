//! Candidate selection.
//!
//! Filters out already-featured artifacts and picks one of the rest
//! uniformly at random. Popularity plays no part, so over successive days the
//! whole trending set gets covered instead of only its head.
//!
//! The random source is a parameter: the CLI passes an OS-seeded RNG, tests pass
//! a seeded [`StdRng`](rand::rngs::StdRng).

use std::collections::HashSet;

use rand::Rng;

use crate::error::{PipelineError, Result};
use crate::models::Candidate;

/// Candidates whose `external_id` is not in `featured`, in input order.
pub fn unfeatured<'a>(candidates: &'a [Candidate], featured: &HashSet<String>) -> Vec<&'a Candidate> {
    candidates
        .iter()
        .filter(|c| !featured.contains(&c.external_id))
        .collect()
}

/// Pick one unfeatured candidate uniformly at random.
///
/// Fails with [`PipelineError::NoCandidateAvailable`] when every candidate is
/// already featured (or there are none).
pub fn select_candidate<R>(
    candidates: &[Candidate],
    featured: &HashSet<String>,
    rng: &mut R,
) -> Result<Candidate>
where
    R: Rng + ?Sized,
{
    let remaining = unfeatured(candidates, featured);
    if remaining.is_empty() {
        return Err(PipelineError::NoCandidateAvailable {
            considered: candidates.len(),
        });
    }

    let index = rng.random_range(0..remaining.len());
    Ok(remaining[index].clone())
}
