use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use mental_poker::config::{DrawPlan, ProtocolConfig};
use mental_poker::game::{
    evaluate_hand, ChannelTransport, GameRound, HandOutcome, PlayerSession, PokerHandJudge,
};
use mental_poker::tokio_tools::spawn_player;
use mental_poker::PlayerId;

const LOG_TARGET: &str = "bin::heads_up_demo";
const PLAYERS: [PlayerId; 2] = [1, 2];
const DEFAULT_HAND_SIZE: usize = 5;

#[derive(Debug, Parser)]
#[command(name = "heads_up_demo")]
#[command(about = "Play one heads-up hand between two local players", long_about = None)]
struct Args {
    /// JSON protocol config; flags below override its fields
    #[arg(long, env = "POKER_CONFIG")]
    config: Option<PathBuf>,

    /// Cut-and-choose rounds per shuffle proof
    #[arg(long, env = "POKER_SHUFFLE_ROUNDS")]
    rounds: Option<usize>,

    /// Cards per hand [default: 5]
    #[arg(long, env = "POKER_HAND_SIZE")]
    hand_size: Option<usize>,

    /// Deal top-of-deck positions instead of letting each player pick blind
    #[arg(long, default_value_t = false)]
    dealt: bool,

    /// Per-message timeout in milliseconds
    #[arg(long, env = "POKER_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Optional RNG seed for reproducible hands
    #[arg(long, env = "POKER_RNG_SEED")]
    seed: Option<u64>,

    /// Toggle structured (JSON) logs
    #[arg(long, env = "POKER_LOG_JSON", default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json)?;
    let config = build_config(&args).context("failed to build protocol config")?;
    let outcome = play_hand(config, args.seed).await?;
    print_outcome(&outcome);
    Ok(())
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt::fmt().with_env_filter(filter).with_target(false);

    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

fn build_config(args: &Args) -> Result<ProtocolConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            ProtocolConfig::from_json_str(&raw)?
        }
        None => ProtocolConfig::default(),
    };
    if let Some(rounds) = args.rounds {
        config.shuffle_rounds = rounds;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.message_timeout_ms = timeout_ms;
    }
    if args.config.is_none() || args.hand_size.is_some() || args.dealt {
        let hand_size = args.hand_size.unwrap_or(DEFAULT_HAND_SIZE);
        config.draw_plan = if args.dealt {
            DrawPlan::dealt(hand_size)
        } else {
            DrawPlan::heads_up(hand_size)
        };
    }
    config.validate()?;
    Ok(config)
}

fn player_rng(seed: Option<u64>, player: PlayerId) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(player)),
        None => StdRng::from_entropy(),
    }
}

async fn play_hand(config: ProtocolConfig, seed: Option<u64>) -> Result<HandOutcome> {
    let round_id = seed.unwrap_or(1);
    let (transport_a, transport_b) = ChannelTransport::pair(config.channel_capacity);
    let mut handles = Vec::with_capacity(PLAYERS.len());
    for (player, transport) in PLAYERS.into_iter().zip([transport_a, transport_b]) {
        let round = GameRound::new(
            round_id,
            player,
            PLAYERS.to_vec(),
            config.clone(),
            player_rng(seed, player),
        )
        .with_context(|| format!("failed to set up player {player}"))?;
        handles.push(spawn_player(player, async move {
            let mut session = PlayerSession::new(round, transport);
            session.run(&PokerHandJudge).await
        }));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (player, handle) in PLAYERS.into_iter().zip(handles) {
        let outcome = handle
            .await
            .with_context(|| format!("player {player} task panicked"))?
            .with_context(|| format!("player {player} aborted the hand"))?;
        outcomes.push(outcome);
    }

    let first = outcomes
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("no player finished"))?;
    if outcomes.iter().any(|outcome| *outcome != first) {
        return Err(anyhow!("players disagree on the showdown"));
    }
    info!(target: LOG_TARGET, round_id, winners = ?first.winners, "hand settled");
    Ok(first)
}

fn print_outcome(outcome: &HandOutcome) {
    println!("Round {}", outcome.round_id);
    for (player, cards) in &outcome.hands {
        let shown: Vec<String> = cards.iter().map(|card| card.short()).collect();
        println!(
            "  player {player}: {} ({})",
            shown.join(" "),
            evaluate_hand(cards).rank
        );
    }
    let winners: Vec<String> = outcome.winners.iter().map(|p| p.to_string()).collect();
    println!("  winner(s): {}", winners.join(", "));
}
