use std::collections::HashSet;

use poppy_core::{select_mines, select_mines_in_grid, ProvablyFairRng, GRID_SIZE};

#[test]
fn selection_repeatable() {
    let a = select_mines("s", "c", 42, 5);
    let b = select_mines("s", "c", 42, 5);
    assert_eq!(a, b);
}

#[test]
fn known_vector_across_ports() {
    let set = select_mines("serverseed123", "clientseed", 0, 3);
    assert_eq!(set.cells, vec![14, 17, 6]);
    assert_eq!(set.cells.len(), 3);
}

#[test]
fn negative_nonce_is_interpolated() {
    let set = select_mines("serverseed123", "clientseed", -1, 5);
    assert_eq!(set.cells, vec![1, 3, 8, 20, 9]);
}

#[test]
fn empty_server_seed_still_derives() {
    let set = select_mines("", "clientseed", 0, 3);
    assert_eq!(set.cells, vec![11, 15, 24]);
}

#[test]
fn distinct_bounded_and_counted_sweep() {
    for nonce in 0..200i64 {
        for mine_count in [-1i64, 0, 1, 3, 12, 24, 25] {
            let set = select_mines("server", "client", nonce, mine_count);
            let unique: HashSet<usize> = set.cells.iter().copied().collect();
            assert_eq!(unique.len(), set.cells.len(), "duplicate at nonce {nonce}");
            assert!(set.cells.iter().all(|c| *c < GRID_SIZE));
            let expected = (mine_count.max(0) as usize).min(GRID_SIZE);
            assert_eq!(set.cells.len() + set.void_picks, expected);
        }
    }
}

#[test]
fn parametric_grid_size() {
    let set = select_mines_in_grid("server", "client", 7, 10, 64);
    assert_eq!(set.cells.len(), 10);
    assert!(set.cells.iter().all(|c| *c < 64));

    let saturated = select_mines_in_grid("server", "client", 7, 10, 4);
    let mut cells = saturated.cells.clone();
    cells.sort_unstable();
    assert_eq!(cells, vec![0, 1, 2, 3]);
}

#[test]
fn adjacent_nonces_use_independent_digests() {
    let a = ProvablyFairRng::new("serverseed123", "clientseed", 0);
    let b = ProvablyFairRng::new("serverseed123", "clientseed", 1);
    assert_ne!(a.round_digest_hex(0), b.round_digest_hex(0));
    assert_eq!(select_mines("serverseed123", "clientseed", 1, 3).cells, vec![1, 7, 5]);
}
