use crate::board::{Action, Board};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Deref;
use std::rc::Rc;

/// A (state, action) key. `None` is the synthetic "no further action" taken
/// from a terminal state.
pub type QKey = (Board, Option<Action>);

/// A table shared between players on purpose, e.g. for self-play.
pub type SharedQTable = Rc<RefCell<QTable>>;

/// Sparse action-value table. Entries are created on first touch with the
/// optimism constant and are never evicted.
#[derive(Clone, Debug)]
pub struct QTable {
    qtable: HashMap<QKey, f64>,
    q_init: f64,
}

impl Deref for QTable {
    type Target = HashMap<QKey, f64>;
    fn deref(&self) -> &<Self as Deref>::Target {
        &self.qtable
    }
}

impl QTable {
    pub fn new(q_init: f64) -> Self {
        QTable {
            qtable: HashMap::with_capacity(11000),
            q_init,
        }
    }

    pub fn shared(q_init: f64) -> SharedQTable {
        Rc::new(RefCell::new(QTable::new(q_init)))
    }

    pub fn q_init(&self) -> f64 {
        self.q_init
    }

    /// Stored value, creating the entry with `q_init` if it is missing.
    pub fn get_or_init(&mut self, state: &Board, action: Option<Action>) -> f64 {
        *self.qtable.entry((*state, action)).or_insert(self.q_init)
    }

    /// Stored value, or `q_init` for an unseen pair. Never creates an entry.
    pub fn peek(&self, state: &Board, action: Option<Action>) -> f64 {
        self.qtable
            .get(&(*state, action))
            .copied()
            .unwrap_or(self.q_init)
    }

    pub fn set(&mut self, state: &Board, action: Option<Action>, value: f64) {
        self.qtable.insert((*state, action), value);
    }

    /// Greedy action over `legal`. Ties go to the action listed first.
    pub fn best_action(&mut self, state: &Board, legal: &[Action]) -> Option<Action> {
        legal
            .iter()
            .fold(None, |best: Option<(Action, f64)>, &action| {
                let value = self.get_or_init(state, Some(action));
                match best {
                    Some((_, top)) if top >= value => best,
                    _ => Some((action, value)),
                }
            })
            .map(|(action, _)| action)
    }

    /// `Q(s,a) += α · (R + γ · max_{a'} Q(s',a') − Q(s,a))`, returning the
    /// new `Q(s,a)`. An empty successor list bootstraps from 0.
    #[allow(clippy::too_many_arguments)]
    pub fn update_q_table(
        &mut self,
        state: &Board,
        action: Option<Action>,
        reward: f64,
        next_state: &Board,
        successors: &[Option<Action>],
        alpha: f64,
        gamma: f64,
    ) -> f64 {
        let max_next = successors
            .iter()
            .map(|&a| self.peek(next_state, a))
            .reduce(f64::max)
            .unwrap_or(0.0);
        let current = self.get_or_init(state, action);
        let updated = current + alpha * (reward + gamma * max_next - current);
        self.set(state, action, updated);
        log::trace!(
            "q update {} {:?}: {:.4} -> {:.4}",
            state.to_state_key(),
            action,
            current,
            updated
        );
        updated
    }
}
