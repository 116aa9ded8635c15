//! Concurrent tile relaxation.
//!
//! Each iteration's per-tile updates run on a fixed worker pool; iterations
//! themselves stay strictly sequential. Within an iteration a shuffled
//! pending queue and a lock-guarded executing set enforce the invariant
//! that no tile is processed while any of its graph-adjacent tiles is
//! mid-update: a worker that finds only conflicted tiles blocks until some
//! update completes and retries. Tiles live behind per-tile `RwLock`s, so
//! the exclusion rule is backed by real ownership: a worker write-locks its
//! own tile and read-locks neighbours while resolving correspondence
//! targets.
//!
//! Per-tile update order within an iteration is nondeterministic; the
//! aggregate error is computed by the driving thread in fixed tile order
//! after all updates of the iteration have been joined.

use std::collections::{HashSet, VecDeque};
use std::sync::{Condvar, Mutex, RwLock};

use log::debug;
use mosaic_core::{ErrorStatistic, FitError, Model, PlateauCriteria, Point, Real};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

use crate::configuration::{OptimizeOptions, OptimizeReport, TileConfiguration};
use crate::tile::Tile;

struct SchedulerState {
    pending: VecDeque<usize>,
    executing: HashSet<usize>,
    failure: Option<FitError>,
}

/// Relax the configuration like
/// [`TileConfiguration::optimize`], but with the per-tile updates of each
/// iteration distributed over `num_threads` workers (defaulting to the
/// number of logical cores).
///
/// For a fixed `opts.seed` the queue shuffle is reproducible; the converged
/// aggregate error matches the sequential optimizer up to floating-point
/// summation order of concurrently updated, non-adjacent tiles.
pub fn optimize_concurrently<M>(
    config: &mut TileConfiguration<M>,
    opts: &OptimizeOptions,
    num_threads: Option<usize>,
) -> Result<OptimizeReport, FitError>
where
    M: Model<2> + Send + Sync,
{
    let threads = num_threads.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });

    let fixed = config.fixed_tiles().clone();
    let arena: Vec<RwLock<Tile<M>>> = std::mem::take(config.tiles_mut())
        .into_iter()
        .map(RwLock::new)
        .collect();

    let criteria = PlateauCriteria {
        max_allowed_error: opts.max_allowed_error,
        max_plateau_width: opts.max_plateau_width,
        slope_epsilon: 1e-4,
    };
    let mut observer = ErrorStatistic::new(opts.max_plateau_width + 1);
    let mut rng = StdRng::seed_from_u64(opts.seed);

    let movable: Vec<usize> = (0..arena.len()).filter(|i| !fixed.contains(i)).collect();

    let mut result = OptimizeReport {
        iterations: 0,
        final_error: 0.0,
        converged: false,
        removed_connections: 0,
    };

    'iterations: for i in 0..opts.max_iterations {
        let mut order = movable.clone();
        order.shuffle(&mut rng);

        let state = Mutex::new(SchedulerState {
            pending: order.into(),
            executing: HashSet::new(),
            failure: None,
        });
        let ready = Condvar::new();

        std::thread::scope(|scope| {
            for _ in 0..threads {
                scope.spawn(|| worker(&arena, &state, &ready, opts.damp));
            }
            // Scope exit joins all workers: the iteration barrier.
        });

        let failure = state
            .lock()
            .expect("scheduler state lock poisoned")
            .failure
            .take();
        if let Some(e) = failure {
            // Restore the tiles before surfacing the error.
            restore(config, arena);
            return Err(e);
        }

        // Aggregate errors in fixed tile order on the driving thread.
        let mut min = Real::INFINITY;
        let mut max = Real::NEG_INFINITY;
        let mut sum = 0.0;
        for (t, lock) in arena.iter().enumerate() {
            let mut tile = lock.write().expect("tile lock poisoned");
            let resolve = |tt: usize, pp: usize| -> Point<2> {
                if tt == t {
                    // A tile never matches against itself, but stay safe.
                    return Point::new(mosaic_core::Coord::<2>::zeros());
                }
                *arena[tt].read().expect("tile lock poisoned").point(pp)
            };
            tile.update_cost(resolve);
            let d = tile.distance();
            min = min.min(d);
            max = max.max(d);
            sum += d;
        }
        let mean = if arena.is_empty() {
            0.0
        } else {
            sum / arena.len() as Real
        };

        observer.add(mean);
        result.iterations = i + 1;
        result.final_error = mean;
        if criteria.converged(&observer, i) {
            debug!(
                "concurrent tile relaxation settled after {} iterations, mean error {}",
                i + 1,
                mean
            );
            result.converged = true;
            config.set_errors(min, mean, max);
            break 'iterations;
        }
        config.set_errors(min, mean, max);
    }

    restore(config, arena);
    Ok(result)
}

fn restore<M: Model<2>>(config: &mut TileConfiguration<M>, arena: Vec<RwLock<Tile<M>>>) {
    *config.tiles_mut() = arena
        .into_iter()
        .map(|lock| lock.into_inner().expect("tile lock poisoned"))
        .collect();
}

/// Worker loop: claim a non-conflicting tile, update it, requeue blocked
/// neighbours by waking the pool, until the queue drains.
fn worker<M>(
    arena: &[RwLock<Tile<M>>],
    state: &Mutex<SchedulerState>,
    ready: &Condvar,
    damp: Real,
) where
    M: Model<2> + Send + Sync,
{
    loop {
        let claimed = {
            let mut guard = state.lock().expect("scheduler state lock poisoned");
            loop {
                if guard.pending.is_empty() || guard.failure.is_some() {
                    return;
                }
                // First pending tile with no neighbour mid-update.
                let slot = guard.pending.iter().position(|&t| {
                    let tile = arena[t].read().expect("tile lock poisoned");
                    tile.connected().iter().all(|n| !guard.executing.contains(n))
                });
                match slot {
                    Some(s) => {
                        let t = guard.pending.remove(s).expect("slot exists");
                        guard.executing.insert(t);
                        break t;
                    }
                    None => {
                        // Everything runnable conflicts with an executing
                        // neighbour; wait for a completion and retry.
                        guard = ready
                            .wait(guard)
                            .expect("scheduler state lock poisoned");
                    }
                }
            }
        };

        let outcome = update_one(arena, claimed, damp);

        let mut guard = state.lock().expect("scheduler state lock poisoned");
        guard.executing.remove(&claimed);
        if let Err(e) = outcome {
            if guard.failure.is_none() {
                guard.failure = Some(e);
            }
            guard.pending.clear();
        }
        ready.notify_all();
    }
}

fn update_one<M>(arena: &[RwLock<Tile<M>>], t: usize, damp: Real) -> Result<(), FitError>
where
    M: Model<2> + Send + Sync,
{
    let mut tile = arena[t].write().expect("tile lock poisoned");
    let resolve = |tt: usize, pp: usize| -> Point<2> {
        *arena[tt].read().expect("tile lock poisoned").point(pp)
    };
    tile.fit_model(resolve)?;
    let resolve = |tt: usize, pp: usize| -> Point<2> {
        *arena[tt].read().expect("tile lock poisoned").point(pp)
    };
    tile.apply(damp, resolve);
    Ok(())
}
