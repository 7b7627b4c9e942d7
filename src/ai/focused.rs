use std::collections::{HashSet, VecDeque};

use super::agent::Agent;
use crate::env::{Action, Facing, Pose, SymbolicState, Tile};

/// Chases the pig along the shortest path of moves and turns to a cell next
/// to it. Exits are never entered.
#[derive(Debug, Default, Clone)]
pub struct FocusedAgent;

impl FocusedAgent {
    pub fn new() -> Self {
        FocusedAgent
    }

    fn neighbours(cell: (usize, usize)) -> impl Iterator<Item = (usize, usize)> {
        Facing::ALL.into_iter().filter_map(move |f| {
            Pose {
                row: cell.0,
                col: cell.1,
                facing: f,
            }
            .ahead()
        })
    }

    fn walkable(state: &SymbolicState, cell: (usize, usize)) -> bool {
        state.tiles[cell.0][cell.1] == Tile::Floor && state.is_free(cell)
    }

    fn successor(state: &SymbolicState, pose: Pose, action: Action) -> Option<Pose> {
        match action {
            Action::TurnLeft => Some(Pose {
                facing: pose.facing.turn_left(),
                ..pose
            }),
            Action::TurnRight => Some(Pose {
                facing: pose.facing.turn_right(),
                ..pose
            }),
            Action::MoveForward => pose
                .ahead()
                .filter(|&c| Self::walkable(state, c))
                .map(|(row, col)| Pose { row, col, ..pose }),
        }
    }

    /// First action of a shortest plan, or `None` when the agent is already
    /// next to the pig or no cell next to it is reachable.
    pub fn plan(state: &SymbolicState) -> Option<Action> {
        let goals: HashSet<(usize, usize)> = Self::neighbours(state.pig)
            .filter(|&c| c == state.me.cell() || Self::walkable(state, c))
            .collect();
        if goals.contains(&state.me.cell()) {
            return None;
        }

        let mut visited = HashSet::from([state.me]);
        let mut queue: VecDeque<(Pose, Action)> = VecDeque::new();
        for action in [Action::MoveForward, Action::TurnLeft, Action::TurnRight] {
            if let Some(next) = Self::successor(state, state.me, action) {
                if visited.insert(next) {
                    queue.push_back((next, action));
                }
            }
        }

        while let Some((pose, first)) = queue.pop_front() {
            if goals.contains(&pose.cell()) {
                return Some(first);
            }
            for action in [Action::MoveForward, Action::TurnLeft, Action::TurnRight] {
                if let Some(next) = Self::successor(state, pose, action) {
                    if visited.insert(next) {
                        queue.push_back((next, first));
                    }
                }
            }
        }
        None
    }

    /// Face the pig once adjacent to it.
    fn face_pig(state: &SymbolicState) -> Action {
        let me = state.me;
        if me.ahead() == Some(state.pig) {
            return Action::MoveForward;
        }
        let left = Pose {
            facing: me.facing.turn_left(),
            ..me
        };
        if left.ahead() == Some(state.pig) {
            Action::TurnLeft
        } else {
            Action::TurnRight
        }
    }
}

impl Agent<SymbolicState> for FocusedAgent {
    fn act(&mut self, state: &SymbolicState, _reward: f32, _done: bool, _training: bool) -> usize {
        Self::plan(state)
            .unwrap_or_else(|| Self::face_pig(state))
            .index()
    }

    fn name(&self) -> &str {
        "Focused"
    }
}
