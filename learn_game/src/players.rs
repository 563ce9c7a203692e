use crate::board::{Action, Board, CELLS, LINES};
use crate::config::QConfig;
use crate::error::{GameError, Result};
use crate::q_table::{QTable, SharedQTable};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::rc::Rc;

const CENTER: Action = 4;
const CORNERS: [Action; 4] = [0, 2, 6, 8];
const SIDES: [Action; 4] = [1, 3, 5, 7];

/// What the game loop needs from anything that plays.
///
/// The game calls `select_action` once per own turn with a non-empty legal
/// set, `observe_reward` exactly once per turn (own or not) for every player,
/// and `finalize` exactly once at the end of each episode.
pub trait Player {
    fn id(&self) -> Option<&str>;
    fn set_id(&mut self, id: String);
    /// Must return an element of `legal`.
    fn select_action(&mut self, state: &Board, legal: &[Action]) -> Result<Action>;
    /// Reward for the turn just played. Overwrites any earlier value.
    fn observe_reward(&mut self, _reward: f64) {}
    fn finalize(&mut self, _reward: f64, _terminal: &Board) {}
    /// Drops turn-local state before a new episode. Learned values survive.
    fn reset(&mut self) {}
}

#[derive(Debug)]
pub struct RandomPlayer {
    id: Option<String>,
    rng: StdRng,
}

/// Scripted player: win, block, center, corner, side.
#[derive(Debug)]
pub struct HeuristicPlayer {
    id: Option<String>,
    rng: StdRng,
    made_actions: Vec<Action>,
}

/// Tabular Q-learning player.
#[derive(Debug)]
pub struct QPlayer {
    id: Option<String>,
    config: QConfig,
    table: SharedQTable,
    rng: StdRng,
    episodes: usize,
    previous: Option<(Board, Action)>,
    reward: f64,
}

/// Closed set of players the game can be built from.
#[derive(Debug)]
pub enum AnyPlayer {
    Random(RandomPlayer),
    Heuristic(HeuristicPlayer),
    Q(QPlayer),
}

impl RandomPlayer {
    pub fn new() -> Self {
        RandomPlayer {
            id: None,
            rng: StdRng::from_entropy(),
        }
    }
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl Default for RandomPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Player for RandomPlayer {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
    fn select_action(&mut self, _state: &Board, legal: &[Action]) -> Result<Action> {
        legal
            .choose(&mut self.rng)
            .copied()
            .ok_or(GameError::EmptyActionSet)
    }
}

/// The cell completing a line in which `claimed` already holds two cells,
/// provided that cell is still legal. First matching line wins.
fn completing_move(claimed: &[Action], legal: &[Action]) -> Option<Action> {
    LINES.iter().find_map(|line| {
        let (held, open): (Vec<Action>, Vec<Action>) =
            line.iter().partition(|cell| claimed.contains(*cell));
        match (held.len(), open.as_slice()) {
            (2, [cell]) if legal.contains(cell) => Some(*cell),
            _ => None,
        }
    })
}

fn random_among(rng: &mut StdRng, preferred: &[Action], legal: &[Action]) -> Option<Action> {
    let available: Vec<Action> = preferred
        .iter()
        .copied()
        .filter(|cell| legal.contains(cell))
        .collect();
    available.choose(rng).copied()
}

impl HeuristicPlayer {
    pub fn new() -> Self {
        HeuristicPlayer {
            id: None,
            rng: StdRng::from_entropy(),
            made_actions: Vec::with_capacity(5),
        }
    }
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
    pub fn made_actions(&self) -> &[Action] {
        &self.made_actions
    }
}

impl Default for HeuristicPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Player for HeuristicPlayer {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
    fn select_action(&mut self, _state: &Board, legal: &[Action]) -> Result<Action> {
        if legal.is_empty() {
            return Err(GameError::EmptyActionSet);
        }
        let opponent: Vec<Action> = (0..CELLS)
            .filter(|cell| !legal.contains(cell) && !self.made_actions.contains(cell))
            .collect();
        let action = completing_move(&self.made_actions, legal)
            .or_else(|| completing_move(&opponent, legal))
            .or_else(|| legal.contains(&CENTER).then_some(CENTER))
            .or_else(|| random_among(&mut self.rng, &CORNERS, legal))
            .or_else(|| random_among(&mut self.rng, &SIDES, legal))
            .ok_or(GameError::EmptyActionSet)?;
        self.made_actions.push(action);
        Ok(action)
    }
    fn finalize(&mut self, _reward: f64, _terminal: &Board) {
        self.made_actions.clear();
    }
    fn reset(&mut self) {
        self.made_actions.clear();
    }
}

impl QPlayer {
    /// A player with its own freshly allocated table.
    pub fn new(config: QConfig) -> Self {
        let table = QTable::shared(config.q_init);
        Self::with_shared_table(config, table)
    }
    /// A player updating `table` in place, alongside whoever else holds it.
    pub fn with_shared_table(config: QConfig, table: SharedQTable) -> Self {
        QPlayer {
            id: None,
            config,
            table,
            rng: StdRng::from_entropy(),
            episodes: 0,
            previous: None,
            reward: 0.0,
        }
    }
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
    pub fn config(&self) -> &QConfig {
        &self.config
    }
    pub fn table(&self) -> SharedQTable {
        Rc::clone(&self.table)
    }
    pub fn episodes(&self) -> usize {
        self.episodes
    }
    /// The (state, action) pair awaiting its bootstrapped update.
    pub fn previous(&self) -> Option<(Board, Action)> {
        self.previous
    }
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.config.epsilon = epsilon;
    }
    /// Exploration probability for the next move, decaying with episodes played.
    pub fn exploration_rate(&self) -> f64 {
        self.config.epsilon / (self.episodes + 1) as f64
    }
}

impl Player for QPlayer {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
    fn select_action(&mut self, state: &Board, legal: &[Action]) -> Result<Action> {
        if legal.is_empty() {
            return Err(GameError::EmptyActionSet);
        }
        let explore = self.rng.gen::<f64>() < self.exploration_rate();
        let mut table = self.table.borrow_mut();
        if let Some((prev_state, prev_action)) = self.previous {
            let successors: Vec<Option<Action>> = legal.iter().map(|&a| Some(a)).collect();
            table.update_q_table(
                &prev_state,
                Some(prev_action),
                self.reward,
                state,
                &successors,
                self.config.alpha,
                self.config.gamma,
            );
        }
        self.reward = 0.0;
        let action = if explore {
            legal.choose(&mut self.rng).copied()
        } else {
            table.best_action(state, legal)
        }
        .ok_or(GameError::EmptyActionSet)?;
        self.previous = Some((*state, action));
        Ok(action)
    }
    fn observe_reward(&mut self, reward: f64) {
        self.reward = reward;
    }
    fn finalize(&mut self, reward: f64, terminal: &Board) {
        let mut table = self.table.borrow_mut();
        table.set(terminal, None, 0.0);
        if let Some((prev_state, prev_action)) = self.previous.take() {
            table.update_q_table(
                &prev_state,
                Some(prev_action),
                reward,
                terminal,
                &[None],
                self.config.alpha,
                self.config.gamma,
            );
        }
        self.episodes += 1;
        self.reward = 0.0;
    }
    fn reset(&mut self) {
        self.previous = None;
        self.reward = 0.0;
    }
}

impl AnyPlayer {
    pub fn as_q(&self) -> Option<&QPlayer> {
        match self {
            AnyPlayer::Q(player) => Some(player),
            _ => None,
        }
    }
    pub fn as_q_mut(&mut self) -> Option<&mut QPlayer> {
        match self {
            AnyPlayer::Q(player) => Some(player),
            _ => None,
        }
    }
}

impl Player for AnyPlayer {
    fn id(&self) -> Option<&str> {
        match self {
            AnyPlayer::Random(p) => p.id(),
            AnyPlayer::Heuristic(p) => p.id(),
            AnyPlayer::Q(p) => p.id(),
        }
    }
    fn set_id(&mut self, id: String) {
        match self {
            AnyPlayer::Random(p) => p.set_id(id),
            AnyPlayer::Heuristic(p) => p.set_id(id),
            AnyPlayer::Q(p) => p.set_id(id),
        }
    }
    fn select_action(&mut self, state: &Board, legal: &[Action]) -> Result<Action> {
        match self {
            AnyPlayer::Random(p) => p.select_action(state, legal),
            AnyPlayer::Heuristic(p) => p.select_action(state, legal),
            AnyPlayer::Q(p) => p.select_action(state, legal),
        }
    }
    fn observe_reward(&mut self, reward: f64) {
        match self {
            AnyPlayer::Random(p) => p.observe_reward(reward),
            AnyPlayer::Heuristic(p) => p.observe_reward(reward),
            AnyPlayer::Q(p) => p.observe_reward(reward),
        }
    }
    fn finalize(&mut self, reward: f64, terminal: &Board) {
        match self {
            AnyPlayer::Random(p) => p.finalize(reward, terminal),
            AnyPlayer::Heuristic(p) => p.finalize(reward, terminal),
            AnyPlayer::Q(p) => p.finalize(reward, terminal),
        }
    }
    fn reset(&mut self) {
        match self {
            AnyPlayer::Random(p) => p.reset(),
            AnyPlayer::Heuristic(p) => p.reset(),
            AnyPlayer::Q(p) => p.reset(),
        }
    }
}

impl From<RandomPlayer> for AnyPlayer {
    fn from(player: RandomPlayer) -> Self {
        AnyPlayer::Random(player)
    }
}

impl From<HeuristicPlayer> for AnyPlayer {
    fn from(player: HeuristicPlayer) -> Self {
        AnyPlayer::Heuristic(player)
    }
}

impl From<QPlayer> for AnyPlayer {
    fn from(player: QPlayer) -> Self {
        AnyPlayer::Q(player)
    }
}

impl fmt::Display for AnyPlayer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self {
            AnyPlayer::Random(_) => "Random Player",
            AnyPlayer::Heuristic(_) => "Heuristic Player",
            AnyPlayer::Q(_) => "Q Player",
        };
        match self.id() {
            Some(id) => write!(f, "{} ({})", kind, id),
            None => write!(f, "{}", kind),
        }
    }
}
