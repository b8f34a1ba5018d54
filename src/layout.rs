use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use itertools::iproduct;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::info;

use crate::assignment::AssignmentKind;
use crate::grid::Coordinate;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("cannot place {count} assignments on a board with {capacity} cells")]
    InsufficientSpace { count: usize, capacity: usize },
    #[error("no assignment types to choose from")]
    EmptyTypePool,
}

/// Where an assignment will be placed and what it asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Planned {
    pub at: Coordinate,
    pub kind: AssignmentKind,
}

static PROCESS_RNG: OnceLock<Mutex<StdRng>> = OnceLock::new();

fn process_rng() -> &'static Mutex<StdRng> {
    PROCESS_RNG.get_or_init(|| {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        info!(seed, "seeded layout rng");
        Mutex::new(StdRng::seed_from_u64(seed))
    })
}

/// Plan `count` assignments with the process-wide generator, seeded once.
pub fn generate(
    width: usize,
    height: usize,
    count: usize,
    pool: &[AssignmentKind],
) -> Result<Vec<Planned>, LayoutError> {
    let mut rng = process_rng()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    generate_with(&mut *rng, width, height, count, pool)
}

/// Draw `count` distinct cells and an independently shuffled type sequence.
pub fn generate_with<R: Rng + ?Sized>(
    rng: &mut R,
    width: usize,
    height: usize,
    count: usize,
    pool: &[AssignmentKind],
) -> Result<Vec<Planned>, LayoutError> {
    if !width.checked_mul(height).is_some_and(|cells| count <= cells) {
        return Err(LayoutError::InsufficientSpace {
            count,
            capacity: width.saturating_mul(height),
        });
    }
    if pool.is_empty() {
        return Err(LayoutError::EmptyTypePool);
    }

    let mut cells: Vec<Coordinate> = iproduct!(1..=height, 1..=width)
        .map(Coordinate::from)
        .collect();
    let (picked, _) = cells.partial_shuffle(rng, count);

    let mut kinds: Vec<AssignmentKind> = pool.iter().copied().cycle().take(count).collect();
    kinds.shuffle(rng);

    Ok(picked
        .iter()
        .zip(kinds)
        .map(|(&at, kind)| Planned { at, kind })
        .collect())
}
