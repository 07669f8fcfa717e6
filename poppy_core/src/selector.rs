use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::{
    grid::{MineGrid, GRID_SIZE, GRID_WIDTH},
    rng::{segment_fraction, segment_values, ProvablyFairRng},
};

/// Highest derivation round that is still evaluated. Rounds run `0..=MAX_ROUND`.
pub const MAX_ROUND: u32 = 1000;

/// Source of one hex digest per derivation round.
pub trait RoundHasher {
    fn round_digest_hex(&self, round: u32) -> String;
}

impl RoundHasher for ProvablyFairRng {
    fn round_digest_hex(&self, round: u32) -> String {
        ProvablyFairRng::round_digest_hex(self, round)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineSet {
    /// Mine cells in discovery order.
    pub cells: Vec<usize>,
    /// Segments that landed exactly on `u32::MAX`: they use up a pick but name no cell.
    pub void_picks: usize,
    /// Number of digests computed.
    pub rounds: u32,
}

impl MineSet {
    fn picks(&self) -> usize {
        self.cells.len() + self.void_picks
    }

    pub fn contains(&self, cell: usize) -> bool {
        self.cells.contains(&cell)
    }

    pub fn sorted(&self) -> Vec<usize> {
        let mut cells = self.cells.clone();
        cells.sort_unstable();
        cells
    }
}

/// Index into the remaining cells for a fraction, or `None` when the fraction is
/// exactly 1.0 and the product lands one past the end.
pub fn pick_index(fraction: f64, available: usize) -> Option<usize> {
    let idx = (fraction * available as f64).floor() as usize;
    (idx < available).then_some(idx)
}

pub fn select_mines_with<H: RoundHasher>(hasher: &H, mine_count: i64, grid_size: usize) -> MineSet {
    // counts past usize::MAX still saturate the grid
    let target = if mine_count <= 0 {
        0
    } else {
        usize::try_from(mine_count).unwrap_or(usize::MAX)
    };
    if target > grid_size {
        warn!(
            "requested {} mines but the grid only fits {}, result will be short",
            target, grid_size
        );
    }

    let mut set = MineSet::default();
    let mut round = 0u32;
    while set.picks() < target && round <= MAX_ROUND {
        let digest = hasher.round_digest_hex(round);
        trace!(round, %digest, "derivation round");
        for n in segment_values(&digest) {
            if set.picks() >= target {
                break;
            }
            // rebuilt per segment so every confirmed mine shrinks the pick space
            let available: Vec<usize> = (0..grid_size).filter(|c| !set.contains(*c)).collect();
            if available.is_empty() {
                continue;
            }
            match pick_index(segment_fraction(n), available.len()) {
                Some(idx) => set.cells.push(available[idx]),
                None => {
                    warn!(round, "segment at u32::MAX, pick consumed without a cell");
                    set.void_picks += 1;
                }
            }
        }
        round += 1;
    }
    set.rounds = round;
    set
}

pub fn select_mines_in_grid(
    server_seed: &str,
    client_seed: &str,
    nonce: i64,
    mine_count: i64,
    grid_size: usize,
) -> MineSet {
    let rng = ProvablyFairRng::new(server_seed, client_seed, nonce);
    select_mines_with(&rng, mine_count, grid_size)
}

/// Mines on the standard 5x5 board.
pub fn select_mines(server_seed: &str, client_seed: &str, nonce: i64, mine_count: i64) -> MineSet {
    select_mines_in_grid(server_seed, client_seed, nonce, mine_count, GRID_SIZE)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub mine_count: i64,
    pub mines: MineSet,
    pub grid: MineGrid,
    pub server_seed_hash: String,
}

impl Verification {
    /// Fewer mines than requested: the count exceeded the grid or a void pick occurred.
    pub fn underfilled(&self) -> bool {
        (self.mines.cells.len() as i64) < self.mine_count
    }
}

pub fn verify_with_seeds(server_seed: &str, client_seed: &str, nonce: i64, mine_count: i64) -> Verification {
    let rng = ProvablyFairRng::new(server_seed, client_seed, nonce);
    let mines = select_mines_with(&rng, mine_count, GRID_SIZE);
    let grid = MineGrid::from_cells(&mines.cells, GRID_SIZE, GRID_WIDTH);
    Verification {
        mine_count,
        mines,
        grid,
        server_seed_hash: rng.server_seed_hash_hex(),
    }
}

/// Check that a claimed board matches what the seeds produce. Order is ignored.
pub fn verify_mines(
    server_seed: &str,
    client_seed: &str,
    nonce: i64,
    mine_count: i64,
    expected_cells: &[usize],
) -> bool {
    let actual = select_mines(server_seed, client_seed, nonce, mine_count).sorted();
    let mut expected = expected_cells.to_vec();
    expected.sort_unstable();
    actual == expected
}
