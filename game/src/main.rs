use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use learn_game::config::{QConfig, EVAL_EPISODES, HISTORY_TAIL, NUM_EPISODES};
use learn_game::players::{AnyPlayer, HeuristicPlayer, Player, QPlayer, RandomPlayer};
use learn_game::q_table::QTable;
use learn_game::{Game, Seat};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about = "Train and compare tic-tac-toe players", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Train a Q player, then evaluate it with exploration disabled")]
    Train {
        #[arg(long, value_enum, default_value_t = Kind::Random)]
        opponent: Kind,
        #[arg(long, default_value_t = NUM_EPISODES)]
        episodes: usize,
        #[arg(long, default_value_t = EVAL_EPISODES)]
        eval_episodes: usize,
        /// JSON file with Q player hyper-parameters
        #[arg(long)]
        config: Option<PathBuf>,
        /// Let a Q opponent learn into the same table
        #[arg(long)]
        self_play: bool,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 1_000)]
        report_every: usize,
        #[arg(long, default_value_t = HISTORY_TAIL)]
        show_last: usize,
    },
    #[command(about = "Pit two players against each other without evaluation")]
    Match {
        #[arg(value_enum)]
        first: Kind,
        #[arg(value_enum)]
        second: Kind,
        #[arg(long, default_value_t = 100)]
        episodes: usize,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 0)]
        report_every: usize,
        #[arg(long, default_value_t = HISTORY_TAIL)]
        show_last: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum Kind {
    Random,
    Heuristic,
    Q,
}

#[derive(Debug, Default)]
struct Tally {
    wins: usize,
    losses: usize,
    ties: usize,
}

fn load_config(path: Option<&Path>) -> Result<QConfig> {
    let config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<QConfig>(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => QConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn build_player(kind: Kind, id: &str, config: QConfig, seed: Option<u64>) -> AnyPlayer {
    let player: AnyPlayer = match kind {
        Kind::Random => RandomPlayer::new().with_id(id).into(),
        Kind::Heuristic => HeuristicPlayer::new().with_id(id).into(),
        Kind::Q => QPlayer::new(config).with_id(id).into(),
    };
    match seed {
        Some(seed) => reseed(player, seed),
        None => player,
    }
}

fn reseed(player: AnyPlayer, seed: u64) -> AnyPlayer {
    match player {
        AnyPlayer::Random(p) => p.with_seed(seed).into(),
        AnyPlayer::Heuristic(p) => p.with_seed(seed).into(),
        AnyPlayer::Q(p) => p.with_seed(seed).into(),
    }
}

fn new_game(first: AnyPlayer, second: AnyPlayer, seed: Option<u64>) -> Game {
    match seed {
        Some(seed) => Game::with_rng(first, second, StdRng::seed_from_u64(seed)),
        None => Game::new(first, second),
    }
}

fn record(tallies: &mut [Tally; 2], game: &Game) {
    let first = game.player(Seat::First).id();
    let second = game.player(Seat::Second).id();
    match game.winner() {
        Some(winner) if Some(winner) == first => {
            tallies[0].wins += 1;
            tallies[1].losses += 1;
        }
        Some(winner) if Some(winner) == second => {
            tallies[0].losses += 1;
            tallies[1].wins += 1;
        }
        Some(winner) => log::warn!("winner {:?} matches neither player", winner),
        None => {
            tallies[0].ties += 1;
            tallies[1].ties += 1;
        }
    }
}

fn run(game: &mut Game, episodes: usize, report_every: usize, label: &str) -> Result<[Tally; 2]> {
    let mut tallies = [Tally::default(), Tally::default()];
    for episode in 1..=episodes {
        game.play_one_episode()
            .with_context(|| format!("{} episode {}", label, episode))?;
        record(&mut tallies, game);
        if report_every > 0 && episode % report_every == 0 {
            log::info!(
                "{:<10}{:>8}/{:<8} wins {:>6} losses {:>6} ties {:>6}",
                label,
                episode,
                episodes,
                tallies[0].wins,
                tallies[0].losses,
                tallies[0].ties
            );
        }
    }
    Ok(tallies)
}

fn summarize(game: &Game, episodes: usize, tallies: &[Tally; 2], label: &str) {
    println!(
        "{}: {} games played. {} wins: {}, {} wins: {}, total ties: {}",
        label,
        episodes,
        game.player(Seat::First),
        tallies[0].wins,
        game.player(Seat::Second),
        tallies[1].wins,
        tallies[0].ties
    );
}

fn show_history(game: &Game, last: usize) {
    if last == 0 || game.history().is_empty() {
        return;
    }
    println!("\nlast game, winner {:?}:\n", game.winner());
    println!("{}", game.render_history(last));
}

/// Builds the training opponent. With `self_play` a Q opponent learns into the
/// learner's table; any other opponent kind rejects the flag.
fn build_rival(
    opponent: Kind,
    self_play: bool,
    learner: &AnyPlayer,
    config: QConfig,
    seed: Option<u64>,
) -> Result<AnyPlayer> {
    anyhow::ensure!(
        !self_play || opponent == Kind::Q,
        "--self-play needs --opponent q, got {:?}",
        opponent
    );
    let seed = seed.map(|s| s.wrapping_add(1));
    if self_play {
        let table = learner
            .as_q()
            .map(QPlayer::table)
            .unwrap_or_else(|| QTable::shared(config.q_init));
        let shared: AnyPlayer = QPlayer::with_shared_table(config, table)
            .with_id("Q2")
            .into();
        return Ok(match seed {
            Some(seed) => reseed(shared, seed),
            None => shared,
        });
    }
    let id = match opponent {
        Kind::Random => "R",
        Kind::Heuristic => "H",
        Kind::Q => "Q2",
    };
    Ok(build_player(opponent, id, config, seed))
}

#[allow(clippy::too_many_arguments)]
fn train(
    opponent: Kind,
    episodes: usize,
    eval_episodes: usize,
    config: Option<PathBuf>,
    self_play: bool,
    seed: Option<u64>,
    report_every: usize,
    show_last: usize,
) -> Result<()> {
    let config = load_config(config.as_deref())?;
    log::info!("q player config {:?}", config);
    let learner = build_player(Kind::Q, "Q", config, seed);
    let rival = build_rival(opponent, self_play, &learner, config, seed)?;
    let mut game = new_game(learner, rival, seed.map(|s| s.wrapping_add(2)));

    let tallies = run(&mut game, episodes, report_every, "train")?;
    summarize(&game, episodes, &tallies, "training");

    if let Some(q) = game.player_mut(Seat::First).as_q_mut() {
        q.set_epsilon(0.0);
        log::info!(
            "trained for {} episodes, {} table entries",
            q.episodes(),
            q.table().borrow().len()
        );
    }
    let tallies = run(&mut game, eval_episodes, report_every, "eval")?;
    summarize(&game, eval_episodes, &tallies, "evaluation");
    show_history(&game, show_last);
    Ok(())
}

fn play_match(
    first: Kind,
    second: Kind,
    episodes: usize,
    seed: Option<u64>,
    report_every: usize,
    show_last: usize,
) -> Result<()> {
    let config = QConfig::default();
    let first = build_player(first, "1", config, seed);
    let second = build_player(second, "2", config, seed.map(|s| s.wrapping_add(1)));
    let mut game = new_game(first, second, seed.map(|s| s.wrapping_add(2)));
    let tallies = run(&mut game, episodes, report_every, "match")?;
    summarize(&game, episodes, &tallies, "match");
    show_history(&game, show_last);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match Cli::parse().command {
        Command::Train {
            opponent,
            episodes,
            eval_episodes,
            config,
            self_play,
            seed,
            report_every,
            show_last,
        } => train(
            opponent,
            episodes,
            eval_episodes,
            config,
            self_play,
            seed,
            report_every,
            show_last,
        ),
        Command::Match {
            first,
            second,
            episodes,
            seed,
            report_every,
            show_last,
        } => play_match(first, second, episodes, seed, report_every, show_last),
    }
}
