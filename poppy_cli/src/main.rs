use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

use poppy_core::Verification;
use poppy_shared::{MineExport, SavedInputs, SeedInputs};

#[derive(Parser)]
#[command(name = "poppy-cli", about = "Verify provably-fair mines rounds from revealed seeds")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Database URL, default sqlite://poppy.db
    #[arg(long, value_parser, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[derive(clap::Args, Debug, Default)]
struct InputArgs {
    /// Revealed server seed
    #[arg(long)]
    server_seed: Option<String>,
    /// Client seed used for the round
    #[arg(long)]
    client_seed: Option<String>,
    /// Round nonce
    #[arg(long, allow_hyphen_values = true)]
    nonce: Option<String>,
    /// Number of mines in the round
    #[arg(long, allow_hyphen_values = true)]
    mines: Option<i64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the mine board; omitted inputs fall back to the last-used ones
    Verify {
        #[command(flatten)]
        inputs: InputArgs,
        /// Print the export record instead of the board
        #[arg(long)]
        json: bool,
    },
    /// Verify the next round (nonce + 1)
    Next,
    /// Verify the previous round (nonce - 1)
    Prev,
    /// Write the export record for the saved inputs
    Export {
        /// Output file, stdout when omitted
        #[arg(long)]
        out: Option<String>,
    },
    /// View last N verifications
    History {
        #[arg(default_value_t = 20)]
        n: i64,
    },
    /// Export the verification log to CSV path
    ExportCsv { path: String },
}

impl InputArgs {
    fn merge_into(self, saved: &mut SavedInputs) {
        if let Some(s) = self.server_seed {
            saved.server_seed = s;
        }
        if let Some(c) = self.client_seed {
            saved.client_seed = c;
        }
        if let Some(n) = self.nonce {
            saved.nonce = n;
        }
        if let Some(m) = self.mines {
            saved.mine_count = m;
        }
    }
}

async fn get_pool(url: Option<String>) -> anyhow::Result<SqlitePool> {
    let url = url.unwrap_or_else(|| "sqlite://poppy.db".into());
    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    sqlx::migrate!("../migrations").run(&pool).await?;
    Ok(pool)
}

async fn load_inputs(pool: &SqlitePool) -> anyhow::Result<SavedInputs> {
    let row = sqlx::query("SELECT server_seed, client_seed, nonce, mine_count FROM saved_inputs WHERE id = 1")
        .fetch_optional(pool)
        .await?;
    Ok(match row {
        Some(r) => SavedInputs {
            server_seed: r.get("server_seed"),
            client_seed: r.get("client_seed"),
            nonce: r.get("nonce"),
            mine_count: r.get("mine_count"),
        },
        None => SavedInputs::default(),
    })
}

async fn save_inputs(pool: &SqlitePool, saved: &SavedInputs) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO saved_inputs (id, server_seed, client_seed, nonce, mine_count) VALUES (1, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET server_seed = excluded.server_seed, client_seed = excluded.client_seed,
         nonce = excluded.nonce, mine_count = excluded.mine_count",
    )
    .bind(&saved.server_seed)
    .bind(&saved.client_seed)
    .bind(&saved.nonce)
    .bind(saved.mine_count)
    .execute(pool)
    .await?;
    Ok(())
}

async fn log_verification(pool: &SqlitePool, inputs: &SeedInputs, v: &Verification) -> anyhow::Result<()> {
    let ts = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO verifications (ts, server_seed_hash, client_seed, nonce, mine_count, mines_json) VALUES (?, ?, ?, ?, ?, ?)"
    )
    .bind(ts)
    .bind(&v.server_seed_hash)
    .bind(&inputs.client_seed)
    .bind(inputs.nonce)
    .bind(inputs.mine_count)
    .bind(serde_json::to_string(&v.mines.cells)?)
    .execute(pool)
    .await?;
    Ok(())
}

/// Validates and persists the inputs, then runs the derivation and logs it.
async fn run_verification(pool: &SqlitePool, saved: &SavedInputs) -> anyhow::Result<(SeedInputs, Verification)> {
    let inputs = saved.to_request().validate()?;
    save_inputs(pool, saved).await?;
    let verification = inputs.verify();
    log_verification(pool, &inputs, &verification).await?;
    Ok((inputs, verification))
}

async fn step_round(pool: &SqlitePool, delta: i64) -> anyhow::Result<()> {
    let mut saved = load_inputs(pool).await?;
    saved.step_nonce(delta)?;
    let (inputs, v) = run_verification(pool, &saved).await?;
    print_board(&inputs, &v);
    Ok(())
}

fn print_board(inputs: &SeedInputs, v: &Verification) {
    println!("server seed sha256: {}", v.server_seed_hash);
    println!(
        "client seed: {}  nonce: {}  mines requested: {}",
        inputs.client_seed, inputs.nonce, inputs.mine_count
    );
    print!("{}", v.grid);
    let cells: Vec<String> = v.mines.cells.iter().map(|c| c.to_string()).collect();
    println!("Mines: {}", cells.join(", "));
    if v.underfilled() {
        println!(
            "note: only {} of {} requested mines could be placed",
            v.mines.cells.len(),
            inputs.mine_count
        );
    }
}

fn export_json(inputs: &SeedInputs, v: &Verification) -> anyhow::Result<String> {
    Ok(MineExport::new(inputs, &v.mines).to_json_pretty()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let pool = get_pool(cli.database_url).await?;

    match cli.command {
        Commands::Verify { inputs, json } => {
            let mut saved = load_inputs(&pool).await?;
            inputs.merge_into(&mut saved);
            let (inputs, v) = run_verification(&pool, &saved).await?;
            if json {
                println!("{}", export_json(&inputs, &v)?);
            } else {
                print_board(&inputs, &v);
            }
        }
        Commands::Next => step_round(&pool, 1).await?,
        Commands::Prev => step_round(&pool, -1).await?,
        Commands::Export { out } => {
            let saved = load_inputs(&pool).await?;
            let (inputs, v) = run_verification(&pool, &saved).await?;
            let json = export_json(&inputs, &v)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json).with_context(|| format!("writing {path}"))?;
                    println!("Exported nonce {} to {}", inputs.nonce, path);
                }
                None => println!("{json}"),
            }
        }
        Commands::History { n } => {
            let rows = sqlx::query("SELECT id, ts, client_seed, nonce, mine_count, server_seed_hash, mines_json FROM verifications ORDER BY id DESC LIMIT ?")
                .bind(n)
                .fetch_all(&pool).await?;
            for r in rows {
                let id: i64 = r.get("id");
                let ts: String = r.get("ts");
                let client_seed: String = r.get("client_seed");
                let nonce: i64 = r.get("nonce");
                let mine_count: i64 = r.get("mine_count");
                let server_seed_hash: String = r.get("server_seed_hash");
                let mines: String = r.get("mines_json");
                println!(
                    "#{:>6} {} seed={} nonce={} count={} hash={} mines={}",
                    id, ts, client_seed, nonce, mine_count, server_seed_hash, mines
                );
            }
        }
        Commands::ExportCsv { path } => {
            let mut wtr = csv::Writer::from_path(&path)?;
            wtr.write_record(["id", "ts", "client_seed", "nonce", "mine_count", "server_seed_hash", "mines"])?;
            let rows = sqlx::query("SELECT id, ts, client_seed, nonce, mine_count, server_seed_hash, mines_json FROM verifications ORDER BY id ASC")
                .fetch_all(&pool).await?;
            let total = rows.len();
            for r in &rows {
                wtr.write_record(&[
                    r.get::<i64, _>("id").to_string(),
                    r.get::<String, _>("ts"),
                    r.get::<String, _>("client_seed"),
                    r.get::<i64, _>("nonce").to_string(),
                    r.get::<i64, _>("mine_count").to_string(),
                    r.get::<String, _>("server_seed_hash"),
                    r.get::<String, _>("mines_json"),
                ])?;
            }
            wtr.flush()?;
            println!("Exported {} rows to {}", total, path);
        }
    }

    Ok(())
}
