pub mod grid;
pub mod rng;
pub mod selector;

pub use crate::grid::{MineGrid, GRID_SIZE, GRID_WIDTH};
pub use crate::rng::{derive_hash_hex, hmac_hex, segment_fraction, segment_values, ProvablyFairRng};
pub use crate::selector::{
    pick_index, select_mines, select_mines_in_grid, select_mines_with, verify_mines, verify_with_seeds, MineSet,
    RoundHasher, Verification, MAX_ROUND,
};
