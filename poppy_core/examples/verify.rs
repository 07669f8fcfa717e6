use poppy_core::verify_with_seeds;

fn main() {
    // Example end-to-end verification
    let server_seed = "serverseed123";
    let client_seed = "clientseed";
    let nonce = 0i64;
    let outcome = verify_with_seeds(server_seed, client_seed, nonce, 3);
    println!(
        "server_seed_hash={} mines={:?}\n{}",
        outcome.server_seed_hash, outcome.mines.cells, outcome.grid
    );
}
