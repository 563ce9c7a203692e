use crate::board::{Board, IsGameOver, Mark};
use crate::error::{GameError, Result};
use crate::players::{AnyPlayer, Player};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub mod board;
pub mod config;
pub mod error;
pub mod players;
pub mod q_table;

pub const WIN_REWARD: f64 = 1.0;
pub const LOSE_REWARD: f64 = -1.0;
pub const TIE_REWARD: f64 = 0.0;
/// Reward handed to both players after every non-final turn.
pub const STEP_REWARD: f64 = 0.0;

/// The slot a player was constructed into. Seat `First` always plays
/// crosses and seat `Second` noughts, whoever happens to move first.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Seat {
    First,
    Second,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Win(Seat),
    Tie,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    NotStarted,
    InProgress,
    Terminal(Outcome),
}

impl Seat {
    pub fn other(self) -> Self {
        match self {
            Seat::First => Seat::Second,
            Seat::Second => Seat::First,
        }
    }
    pub fn mark(self) -> Mark {
        match self {
            Seat::First => Mark::Cross,
            Seat::Second => Mark::Nought,
        }
    }
    pub fn of_mark(mark: Mark) -> Self {
        match mark {
            Mark::Cross => Seat::First,
            Mark::Nought => Seat::Second,
        }
    }
    fn index(self) -> usize {
        match self {
            Seat::First => 0,
            Seat::Second => 1,
        }
    }
}

/// Two-player turn loop over a tic-tac-toe board.
///
/// The game owns both players and drives them through whole episodes:
/// asking the player to move for an action, applying it, handing out the
/// per-turn reward and, once the board is won or full, the final reward.
/// The starting seat is picked at random for the first episode and then
/// alternates.
pub struct Game<P = AnyPlayer> {
    players: [P; 2],
    board: Board,
    current_player: Seat,
    starter: Option<Seat>,
    phase: Phase,
    history: Vec<Board>,
    winner: Option<String>,
    rng: StdRng,
}

impl<P: Player> Game<P> {
    pub fn new(player1: P, player2: P) -> Self {
        Self::with_rng(player1, player2, StdRng::from_entropy())
    }

    pub fn with_rng(mut player1: P, mut player2: P, rng: StdRng) -> Self {
        if player1.id().is_none() {
            player1.set_id("X".to_owned());
        }
        if player2.id().is_none() {
            player2.set_id("O".to_owned());
        }
        if player1.id() == player2.id() {
            log::warn!(
                "both players are named {:?}, winners will be indistinguishable",
                player1.id()
            );
        }
        Game {
            players: [player1, player2],
            board: Board::new(),
            current_player: Seat::First,
            starter: None,
            phase: Phase::NotStarted,
            history: Vec::with_capacity(9),
            winner: None,
            rng,
        }
    }

    fn assign_starter(&mut self) {
        let starter = match self.starter {
            Some(previous) => previous.other(),
            None if self.rng.gen_bool(0.5) => Seat::First,
            None => Seat::Second,
        };
        self.starter = Some(starter);
        self.current_player = starter;
    }

    fn swap_players(&mut self) {
        self.current_player = self.current_player.other();
    }

    fn play_turn(&mut self) -> Result<IsGameOver> {
        let mark = self.current_player.mark();
        let legal = self.board.legal_actions();
        let action = self.players[self.current_player.index()].select_action(&self.board, &legal)?;
        if !legal.contains(&action) {
            return Err(GameError::InvalidAction { action });
        }
        self.board = self.board.apply(action, mark)?;
        self.history.push(self.board);
        for player in self.players.iter_mut() {
            player.observe_reward(STEP_REWARD);
        }
        Ok(self.board.is_game_over(mark))
    }

    /// Plays one full episode from an empty board.
    ///
    /// Any error means a player broke the protocol; the episode is abandoned
    /// and the next call starts a fresh one, with both players reset.
    pub fn play_one_episode(&mut self) -> Result<()> {
        self.board = Board::new();
        self.history.clear();
        self.winner = None;
        for player in self.players.iter_mut() {
            player.reset();
        }
        self.assign_starter();
        self.phase = Phase::InProgress;

        let outcome = loop {
            match self.play_turn()? {
                IsGameOver::InPlay => self.swap_players(),
                IsGameOver::Drawn => break Outcome::Tie,
                IsGameOver::Win => break Outcome::Win(self.current_player),
            }
        };

        let (first_reward, second_reward) = match outcome {
            Outcome::Win(Seat::First) => (WIN_REWARD, LOSE_REWARD),
            Outcome::Win(Seat::Second) => (LOSE_REWARD, WIN_REWARD),
            Outcome::Tie => (TIE_REWARD, TIE_REWARD),
        };
        let [first, second] = &mut self.players;
        first.finalize(first_reward, &self.board);
        second.finalize(second_reward, &self.board);

        self.winner = match outcome {
            Outcome::Win(seat) => self.players[seat.index()].id().map(str::to_owned),
            Outcome::Tie => None,
        };
        self.phase = Phase::Terminal(outcome);
        log::debug!(
            "episode over after {} turns: {:?}, winner {:?}",
            self.history.len(),
            outcome,
            self.winner
        );
        Ok(())
    }

    /// Identifier of the last episode's winner, `None` for a tie or before
    /// any episode finished.
    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    /// Board after each turn of the last episode, in play order.
    pub fn history(&self) -> &[Board] {
        &self.history
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.phase {
            Phase::Terminal(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Seat that moved first in the last episode.
    pub fn starter(&self) -> Option<Seat> {
        self.starter
    }

    pub fn player(&self, seat: Seat) -> &P {
        &self.players[seat.index()]
    }

    pub fn player_mut(&mut self, seat: Seat) -> &mut P {
        &mut self.players[seat.index()]
    }

    pub fn into_players(self) -> (P, P) {
        let [first, second] = self.players;
        (first, second)
    }

    /// The last `last` boards of the episode, one grid per block.
    pub fn render_history(&self, last: usize) -> String {
        let skip = self.history.len().saturating_sub(last);
        self.history[skip..]
            .iter()
            .map(Board::to_string)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Action, LINES};
    use crate::config::QConfig;
    use crate::players::{HeuristicPlayer, QPlayer, RandomPlayer};

    /// Plays the first legal cell of a fixed preference order.
    struct Scripted {
        id: Option<String>,
        order: Vec<Action>,
        finals: Vec<f64>,
        rewards: usize,
    }

    impl Scripted {
        fn new(order: &[Action]) -> Self {
            Scripted {
                id: None,
                order: order.to_vec(),
                finals: Vec::new(),
                rewards: 0,
            }
        }
    }

    impl Player for Scripted {
        fn id(&self) -> Option<&str> {
            self.id.as_deref()
        }
        fn set_id(&mut self, id: String) {
            self.id = Some(id);
        }
        fn select_action(&mut self, _state: &Board, legal: &[Action]) -> Result<Action> {
            self.order
                .iter()
                .copied()
                .find(|a| legal.contains(a))
                .or(self.order.first().copied())
                .ok_or(GameError::EmptyActionSet)
        }
        fn observe_reward(&mut self, _reward: f64) {
            self.rewards += 1;
        }
        fn finalize(&mut self, reward: f64, _terminal: &Board) {
            self.finals.push(reward);
        }
    }

    /// Wraps a real player, can return an out-of-range cell on a chosen
    /// call, and counts moves made while still holding another episode's
    /// turn state.
    struct Faulty {
        inner: AnyPlayer,
        calls: usize,
        fail_on: Option<usize>,
        stale: usize,
    }

    impl Faulty {
        fn new(inner: AnyPlayer, fail_on: Option<usize>) -> Self {
            Faulty {
                inner,
                calls: 0,
                fail_on,
                stale: 0,
            }
        }
    }

    /// Every mark of `earlier` is still in place on `later`.
    fn precedes(earlier: &Board, later: &Board) -> bool {
        earlier
            .occupied()
            .iter()
            .all(|&i| earlier.cell(i) == later.cell(i))
    }

    impl Player for Faulty {
        fn id(&self) -> Option<&str> {
            self.inner.id()
        }
        fn set_id(&mut self, id: String) {
            self.inner.set_id(id);
        }
        fn select_action(&mut self, state: &Board, legal: &[Action]) -> Result<Action> {
            self.calls += 1;
            let stale = match &self.inner {
                AnyPlayer::Heuristic(h) => h.made_actions().iter().any(|&a| state.cell(a).is_none()),
                AnyPlayer::Q(q) => q
                    .previous()
                    .is_some_and(|(earlier, _)| !precedes(&earlier, state)),
                AnyPlayer::Random(_) => false,
            };
            if stale {
                self.stale += 1;
            }
            if self.fail_on == Some(self.calls) {
                return Ok(99);
            }
            self.inner.select_action(state, legal)
        }
        fn observe_reward(&mut self, reward: f64) {
            self.inner.observe_reward(reward);
        }
        fn finalize(&mut self, reward: f64, terminal: &Board) {
            self.inner.finalize(reward, terminal);
        }
        fn reset(&mut self) {
            self.inner.reset();
        }
    }

    fn seeded<P: Player>(p1: P, p2: P, seed: u64) -> Game<P> {
        Game::with_rng(p1, p2, StdRng::seed_from_u64(seed))
    }

    #[test]
    fn missing_ids_default_to_marks() {
        let game = seeded(Scripted::new(&[0]), Scripted::new(&[0]), 0);
        assert_eq!(game.player(Seat::First).id(), Some("X"));
        assert_eq!(game.player(Seat::Second).id(), Some("O"));
        assert_eq!(game.phase(), Phase::NotStarted);
        assert_eq!(game.winner(), None);

        let game: Game = Game::new(
            RandomPlayer::new().with_id("R").into(),
            HeuristicPlayer::new().into(),
        );
        assert_eq!(game.player(Seat::First).id(), Some("R"));
        assert_eq!(game.player(Seat::Second).id(), Some("O"));
    }

    #[test]
    fn first_line_completed_wins() {
        let order = [0, 3, 1, 4, 2];
        let mut game = seeded(Scripted::new(&order), Scripted::new(&order), 11);
        game.play_one_episode().expect("well-behaved players");

        let starter = game.starter().expect("episode played");
        assert_eq!(game.history().len(), 5);
        assert_eq!(game.outcome(), Some(Outcome::Win(starter)));
        assert_eq!(game.winner(), game.player(starter).id());
        assert!(game.board().is_winning(starter.mark()));
        assert_eq!(game.player(starter).finals, vec![WIN_REWARD]);
        assert_eq!(game.player(starter.other()).finals, vec![LOSE_REWARD]);
        assert_eq!(game.player(starter).rewards, 5);
        assert_eq!(game.player(starter.other()).rewards, 5);
    }

    #[test]
    fn full_board_without_line_is_a_tie() {
        let order = [0, 1, 2, 4, 3, 5, 7, 6, 8];
        let mut game = seeded(Scripted::new(&order), Scripted::new(&order), 5);
        game.play_one_episode().expect("well-behaved players");

        assert_eq!(game.history().len(), 9);
        assert_eq!(game.winner(), None);
        assert_eq!(game.phase(), Phase::Terminal(Outcome::Tie));
        let last = game.history().last().expect("nine boards");
        assert!(last.legal_actions().is_empty());
        assert!(LINES.iter().all(|line| {
            let first = last.cell(line[0]);
            line.iter().any(|&i| last.cell(i) != first)
        }));
        assert_eq!(game.player(Seat::First).finals, vec![TIE_REWARD]);
        assert_eq!(game.player(Seat::Second).finals, vec![TIE_REWARD]);
    }

    #[test]
    fn illegal_choice_fails_fast() {
        let mut game = seeded(Scripted::new(&[0]), Scripted::new(&[0]), 2);
        assert_eq!(
            game.play_one_episode(),
            Err(GameError::InvalidAction { action: 0 })
        );
        assert_eq!(game.phase(), Phase::InProgress);
        assert_eq!(game.winner(), None);
    }

    #[test]
    fn aborted_episode_does_not_leak_into_the_next() {
        let learners: [AnyPlayer; 2] = [
            HeuristicPlayer::new().with_seed(4).into(),
            QPlayer::new(QConfig::default()).with_seed(4).into(),
        ];
        for learner in learners {
            let mut game = seeded(
                Faulty::new(learner, None),
                Faulty::new(RandomPlayer::new().with_seed(5).into(), Some(2)),
                12,
            );
            assert_eq!(
                game.play_one_episode(),
                Err(GameError::InvalidAction { action: 99 })
            );
            let held_over = match &game.player(Seat::First).inner {
                AnyPlayer::Heuristic(h) => !h.made_actions().is_empty(),
                AnyPlayer::Q(q) => q.previous().is_some(),
                AnyPlayer::Random(_) => false,
            };
            assert!(held_over, "learner moved before the abort");

            game.play_one_episode().expect("second episode is clean");
            assert!(game.outcome().is_some());
            assert_eq!(game.player(Seat::First).stale, 0);
        }
        let mut q_game = seeded(
            Faulty::new(QPlayer::new(QConfig::default()).with_seed(6).into(), None),
            Faulty::new(RandomPlayer::new().with_seed(7).into(), Some(2)),
            13,
        );
        assert!(q_game.play_one_episode().is_err());
        q_game.play_one_episode().expect("second episode is clean");
        let q = q_game.player(Seat::First).inner.as_q().expect("q player");
        assert_eq!(q.episodes(), 1);
    }

    #[test]
    fn starting_seat_alternates() {
        let mut game: Game = seeded(
            RandomPlayer::new().with_seed(1).into(),
            RandomPlayer::new().with_seed(2).into(),
            42,
        );
        let mut starters = Vec::new();
        for _ in 0..10 {
            game.play_one_episode().expect("well-behaved players");
            let first_move = game.history()[0];
            let mark = first_move
                .occupied()
                .first()
                .and_then(|&i| first_move.cell(i))
                .expect("one mark after the first turn");
            assert_eq!(Some(Seat::of_mark(mark)), game.starter());
            starters.push(Seat::of_mark(mark));
        }
        assert!(starters.windows(2).all(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn history_grows_one_mark_per_turn() {
        let mut game: Game = seeded(
            HeuristicPlayer::new().with_seed(3).into(),
            RandomPlayer::new().with_seed(4).into(),
            7,
        );
        for _ in 0..50 {
            game.play_one_episode().expect("well-behaved players");
            let history = game.history();
            assert!((5..=9).contains(&history.len()));
            for (turn, board) in history.iter().enumerate() {
                assert_eq!(board.turns(), turn + 1);
            }
            match game.outcome() {
                Some(Outcome::Win(seat)) => {
                    assert_eq!(game.winner(), game.player(seat).id());
                    assert!(game.board().is_winning(seat.mark()));
                }
                Some(Outcome::Tie) => {
                    assert!(game.board().is_full());
                    assert_eq!(game.winner(), None);
                }
                None => panic!("episode finished without an outcome"),
            }
        }
    }

    #[test]
    fn q_player_counts_every_episode() {
        let mut game: Game = seeded(
            QPlayer::new(QConfig::default()).with_seed(8).into(),
            RandomPlayer::new().with_seed(9).into(),
            10,
        );
        for _ in 0..25 {
            game.play_one_episode().expect("well-behaved players");
        }
        let q = game.player(Seat::First).as_q().expect("q player in first seat");
        assert_eq!(q.episodes(), 25);
        assert!(!q.table().borrow().is_empty());
    }

    #[test]
    fn history_renders_last_boards() {
        let order = [0, 3, 1, 4, 2];
        let mut game = seeded(Scripted::new(&order), Scripted::new(&order), 11);
        game.play_one_episode().expect("well-behaved players");
        let rendered = game.render_history(2);
        assert_eq!(rendered.split("\n\n").count(), 2);
        assert_eq!(game.render_history(20).split("\n\n").count(), 5);
    }
}
