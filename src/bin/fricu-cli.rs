use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use fricu_sdk::DataClient;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "fricu-cli")]
#[command(about = "Command-line client for the Fricu data server", long_about = None)]
struct Cli {
    #[arg(short, long, env = "FRICU_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server liveness
    Health,
    /// Print a stored document
    Get { key: String },
    /// Replace a stored document
    Put {
        key: String,
        /// JSON document inline
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        data: Option<String>,
        /// Read the JSON document from a file
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Warm up with one PUT, then fire concurrent GETs and report throughput
    Bench {
        /// Total GET requests
        #[arg(long, env = "FRICU_PERF_REQUESTS", default_value_t = 10_000)]
        requests: usize,
        /// Concurrent request loops
        #[arg(long, env = "FRICU_PERF_CONCURRENCY", default_value_t = 100)]
        concurrency: usize,
        /// Key to read
        #[arg(long, default_value = "activities")]
        key: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let client = DataClient::with_client(
        reqwest::Client::builder().pool_max_idle_per_host(0).build()?,
        &cli.url,
    );

    match cli.command {
        Commands::Health => {
            let health = client.health().await?;
            println!("{}", health.status);
        }
        Commands::Get { key } => {
            let document = client.get(&key).await?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        Commands::Put { key, data, file } => {
            let body = match (data, file) {
                (Some(data), _) => data,
                (None, Some(path)) => tokio::fs::read_to_string(&path).await?,
                (None, None) => return Err("either --data or --file is required".into()),
            };
            client.put_raw(&key, body).await?;
            println!("stored {key}");
        }
        Commands::Bench {
            requests,
            concurrency,
            key,
        } => return bench(&client, &key, requests, concurrency).await,
    }

    Ok(ExitCode::SUCCESS)
}

fn sample_activity() -> Value {
    json!([
        {
            "date": "2026-01-01T00:00:00Z",
            "sport": "cycling",
            "durationSec": 3600,
            "distanceKm": 40.1,
            "tss": 70,
            "normalizedPower": 220
        }
    ])
}

async fn bench(
    client: &DataClient,
    key: &str,
    requests: usize,
    concurrency: usize,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if requests == 0 || concurrency == 0 {
        return Err("--requests and --concurrency must be positive".into());
    }
    client.put(key, &sample_activity()).await?;

    let base = requests / concurrency;
    let rem = requests % concurrency;
    let start = Instant::now();

    let mut tasks = Vec::with_capacity(concurrency);
    for i in 0..concurrency {
        let client = client.clone();
        let key = key.to_string();
        let share = base + usize::from(i < rem);
        tasks.push(tokio::spawn(async move {
            let mut success = 0usize;
            let mut failed = 0usize;
            for _ in 0..share {
                match client.get_raw(&key).await {
                    Ok(_) => success += 1,
                    Err(_) => failed += 1,
                }
            }
            (success, failed)
        }));
    }

    let mut success = 0usize;
    let mut failed = 0usize;
    for task in tasks {
        match task.await {
            Ok((s, f)) => {
                success += s;
                failed += f;
            }
            Err(_) => failed += 1,
        }
    }

    let elapsed = start.elapsed();
    println!("total_requests={requests}");
    println!("success={success}");
    println!("failed={failed}");
    println!("elapsed_ms={}", elapsed.as_millis());
    println!("rps={:.2}", success as f64 / elapsed.as_secs_f64().max(f64::EPSILON));

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
