//! Match Tester CLI Tool
//!
//! Runs the matchmaking service in-process against seeded demo ratings and
//! drives the dispatch pool from the command line.
//!
//! Usage:
//!   cargo run --bin match-tester -- --help
//!   cargo run --bin match-tester single --rank 3 --match-type any
//!   cargo run --bin match-tester burst --requests 500 --tasks 8
//!   cargo run --bin match-tester report --requests 50 --skip 10 --take 20
//!   cargo run --bin match-tester shutdown --requests 1000 --deadline-ms 5

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use game_match::config::AppConfig;
use game_match::service::AppState;
use game_match::types::{GameType, MatchQuery, MatchRequest, MatchResponse, MatchType, UserId};
use game_match::StopOutcome;

#[derive(Parser)]
#[command(name = "match-tester")]
#[command(about = "In-process load and behaviour tester for the game-match dispatch pool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Port for the embedded health server
    #[arg(long, default_value = "18090")]
    health_port: u16,

    /// Number of demo users to seed
    #[arg(long, default_value = "20")]
    users: usize,

    /// Default max rating gap
    #[arg(long, default_value = "0.15")]
    gap: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Match a single seeded user and print their pairs
    Single {
        /// 1-based position of the user in the demo rating ladder
        #[arg(short, long, default_value = "1")]
        rank: usize,
        /// Match type (any, easier-only, harder-only)
        #[arg(short, long, default_value = "any")]
        match_type: String,
        /// Explicit gap for this request
        #[arg(long)]
        request_gap: Option<f64>,
    },
    /// Enqueue many requests concurrently and report throughput
    Burst {
        /// Total requests to enqueue
        #[arg(short, long, default_value = "200")]
        requests: usize,
        /// Number of concurrent enqueuing tasks
        #[arg(short, long, default_value = "4")]
        tasks: usize,
    },
    /// Run a burst, then page through the stored matches
    Report {
        #[arg(short, long, default_value = "20")]
        requests: usize,
        #[arg(long, default_value = "0")]
        skip: i64,
        #[arg(long, default_value = "0")]
        take: i64,
        /// Only report pairs involving this seeded user (1-based rank)
        #[arg(long)]
        user_rank: Option<usize>,
    },
    /// Enqueue requests and stop the pool with a deadline
    Shutdown {
        #[arg(short, long, default_value = "500")]
        requests: usize,
        #[arg(short, long, default_value = "50")]
        deadline_ms: u64,
    },
}

const IDLE_LIMIT: Duration = Duration::from_secs(30);

async fn start_service(cli: &Cli) -> Result<Arc<AppState>> {
    let mut config = AppConfig::default();
    config.service.health_port = cli.health_port;
    config.matchmaking.seed_demo_data = true;
    config.matchmaking.demo_user_count = cli.users;
    config.matchmaking.default_max_rating_gap = cli.gap;

    let state = Arc::new(AppState::new(config).await?);
    state.start().await?;
    Ok(state)
}

/// Seeded users ordered by rating
fn ladder(state: &AppState) -> Result<Vec<UserId>> {
    let mut ratings = state.ratings().all()?;
    ratings.sort_by(|a, b| a.rating.total_cmp(&b.rating));
    Ok(ratings.into_iter().map(|r| r.user_id).collect())
}

fn user_at(ladder: &[UserId], rank: usize) -> Result<UserId> {
    rank.checked_sub(1)
        .and_then(|i| ladder.get(i).copied())
        .ok_or_else(|| anyhow!("Rank {} is outside the seeded ladder of {}", rank, ladder.len()))
}

async fn burst(state: &Arc<AppState>, ladder: &[UserId], requests: usize, tasks: usize) -> Result<()> {
    if ladder.is_empty() {
        return Err(anyhow!("No seeded users to enqueue requests for"));
    }

    let tasks = tasks.max(1);
    let mut handles = Vec::with_capacity(tasks);

    for task in 0..tasks {
        let state = state.clone();
        let users: Vec<UserId> = ladder.to_vec();
        handles.push(tokio::spawn(async move {
            for n in (task..requests).step_by(tasks) {
                let user = users[n % users.len()];
                state.enqueue_match(MatchRequest::new(user, GameType::Chess, MatchType::Any))?;
            }
            Ok::<_, anyhow::Error>(())
        }));
    }

    for handle in handles {
        handle.await??;
    }
    Ok(())
}

fn print_report(report: &[MatchResponse]) {
    if report.is_empty() {
        println!("No matches found.");
        return;
    }

    for (i, definition) in report.iter().enumerate() {
        println!(
            "  Definition {}: {} / {} / gap {}",
            i + 1,
            definition.game_type,
            definition.match_type,
            definition.max_rating_gap
        );
        for pair in &definition.matches {
            println!(
                "    {} ({:.2}) vs {} ({:.2}) at {}",
                pair.requesting_user_id,
                pair.requesting_user_rating,
                pair.matched_user_id,
                pair.matched_user_rating,
                pair.match_date
            );
        }
    }
}

fn print_stats(state: &AppState, elapsed: Duration) {
    let stats = state.processor().stats();
    println!("📊 Dispatch Statistics:");
    println!("  Workers spawned: {}", stats.workers_spawned);
    println!("  Matched: {}", stats.items_matched);
    println!("  Skipped (unrated): {}", stats.items_skipped);
    println!("  Failed: {}", stats.items_failed);
    println!("  Left in queue: {}", stats.queued_requests);
    println!("  Elapsed: {}ms", elapsed.as_millis());
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let state = match start_service(&cli).await {
        Ok(state) => state,
        Err(e) => {
            eprintln!("❌ Failed to start service: {}", e);
            std::process::exit(1);
        }
    };
    let ladder = ladder(&state)?;
    println!("✅ Service started with {} seeded users", ladder.len());

    let started = Instant::now();

    match &cli.command {
        Commands::Single {
            rank,
            match_type,
            request_gap,
        } => {
            let user = user_at(&ladder, *rank)?;
            let mut request = MatchRequest::new(user, GameType::Chess, match_type.parse()?);
            if let Some(gap) = request_gap {
                request = request.with_max_rating_gap(*gap);
            }

            state.enqueue_match(request)?;
            state.processor().wait_until_idle(IDLE_LIMIT).await;

            println!("🔍 Matches for rank {} ({}):", rank, user);
            print_report(&state.query_matches(Some(user), &MatchQuery::default())?);
        }

        Commands::Burst { requests, tasks } => {
            burst(&state, &ladder, *requests, *tasks).await?;
            if !state.processor().wait_until_idle(IDLE_LIMIT).await {
                println!("⚠️  Dispatch pool did not go idle within {:?}", IDLE_LIMIT);
            }
            print_stats(&state, started.elapsed());
            println!("  Pairs stored: {}", state.pairs().count()?);
        }

        Commands::Report {
            requests,
            skip,
            take,
            user_rank,
        } => {
            burst(&state, &ladder, *requests, 1).await?;
            state.processor().wait_until_idle(IDLE_LIMIT).await;

            let user = user_rank.map(|rank| user_at(&ladder, rank)).transpose()?;
            let query = MatchQuery {
                skip: *skip,
                take: *take,
                ..MatchQuery::default()
            };

            println!("📋 Match report (skip {}, take {}):", skip, take);
            print_report(&state.query_matches(user, &query)?);
        }

        Commands::Shutdown {
            requests,
            deadline_ms,
        } => {
            burst(&state, &ladder, *requests, 1).await?;

            match state
                .processor()
                .stop_within(Duration::from_millis(*deadline_ms))
                .await
            {
                StopOutcome::Drained => println!("✅ Pool drained before the deadline"),
                StopOutcome::DeadlineExceeded { remaining_workers } => println!(
                    "⏱️  Deadline passed with {} workers still running",
                    remaining_workers
                ),
            }
            print_stats(&state, started.elapsed());
        }
    }

    state.shutdown().await?;
    Ok(())
}
