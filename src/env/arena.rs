use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::{debug, info};

use super::state::{ArenaView, StateBuilder};
use super::{AdversaryType, ClientEndpoint, Environment, Step};
use crate::ai::seeded_rng;
use crate::config::ArenaConfig;
use crate::error::EnvironmentError;
use crate::experiment::Role;

pub const BOARD_SIZE: usize = 9;

const EXIT_REWARD: f32 = 5.0;
const CAPTURE_REWARD: f32 = 25.0;
const STEP_COST: f32 = -1.0;

// '#' wall, '.' floor, 'E' exit.
const LAYOUT: [&str; BOARD_SIZE] = [
    "#########",
    "#########",
    "##.#.#.##",
    "#E.....E#",
    "##.#.#.##",
    "##.....##",
    "##.#.#.##",
    "#########",
    "#########",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tile {
    Wall,
    Floor,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facing {
    North,
    East,
    South,
    West,
}

impl Facing {
    pub const ALL: [Facing; 4] = [Facing::North, Facing::East, Facing::South, Facing::West];

    pub fn turn_left(self) -> Facing {
        match self {
            Facing::North => Facing::West,
            Facing::West => Facing::South,
            Facing::South => Facing::East,
            Facing::East => Facing::North,
        }
    }

    pub fn turn_right(self) -> Facing {
        match self {
            Facing::North => Facing::East,
            Facing::East => Facing::South,
            Facing::South => Facing::West,
            Facing::West => Facing::North,
        }
    }

    /// Row/column delta of one step forward.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Facing::North => (-1, 0),
            Facing::East => (0, 1),
            Facing::South => (1, 0),
            Facing::West => (0, -1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pose {
    pub row: usize,
    pub col: usize,
    pub facing: Facing,
}

impl Pose {
    pub fn cell(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    /// The cell one step ahead, if it is on the board.
    pub fn ahead(&self) -> Option<(usize, usize)> {
        offset((self.row, self.col), self.facing.delta())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveForward,
    TurnLeft,
    TurnRight,
}

impl Action {
    pub const COUNT: usize = 3;

    pub fn from_index(index: usize) -> Option<Action> {
        match index {
            0 => Some(Action::MoveForward),
            1 => Some(Action::TurnLeft),
            2 => Some(Action::TurnRight),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Action::MoveForward => 0,
            Action::TurnLeft => 1,
            Action::TurnRight => 2,
        }
    }
}

fn offset(cell: (usize, usize), delta: (isize, isize)) -> Option<(usize, usize)> {
    let row = cell.0.checked_add_signed(delta.0)?;
    let col = cell.1.checked_add_signed(delta.1)?;
    (row < BOARD_SIZE && col < BOARD_SIZE).then_some((row, col))
}

fn parse_layout() -> [[Tile; BOARD_SIZE]; BOARD_SIZE] {
    let mut tiles = [[Tile::Wall; BOARD_SIZE]; BOARD_SIZE];
    for (row, line) in LAYOUT.iter().enumerate() {
        for (col, ch) in line.chars().enumerate() {
            tiles[row][col] = match ch {
                '.' => Tile::Floor,
                'E' => Tile::Exit,
                _ => Tile::Wall,
            };
        }
    }
    tiles
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Vacant,
    Connected,
    Left,
}

struct ArenaState {
    config: ArenaConfig,
    tiles: [[Tile; BOARD_SIZE]; BOARD_SIZE],
    poses: [Pose; 2],
    pig: (usize, usize),
    adversary: AdversaryType,
    episode: u64,
    phase: Phase,
    ready: [bool; 2],
    turn: Role,
    steps: [usize; 2],
    pending: [f32; 2],
    slots: [Slot; 2],
    rng: StdRng,
}

impl ArenaState {
    fn is_free(&self, cell: (usize, usize)) -> bool {
        self.tiles[cell.0][cell.1] != Tile::Wall
            && self.poses.iter().all(|p| p.cell() != cell)
            && self.pig != cell
    }

    fn floor_cells(&self) -> Vec<(usize, usize)> {
        let mut cells = Vec::new();
        for row in 0..BOARD_SIZE {
            for col in 0..BOARD_SIZE {
                if self.tiles[row][col] == Tile::Floor {
                    cells.push((row, col));
                }
            }
        }
        cells
    }

    fn pig_moves(&self) -> Vec<(usize, usize)> {
        Facing::ALL
            .iter()
            .filter_map(|f| offset(self.pig, f.delta()))
            .filter(|&c| self.tiles[c.0][c.1] == Tile::Floor && self.is_free(c))
            .collect()
    }

    fn start_episode(&mut self) {
        if self.config.randomize_positions {
            loop {
                let cells = self.floor_cells();
                let picked: Vec<(usize, usize)> =
                    cells.choose_multiple(&mut self.rng, 3).copied().collect();
                for (i, pose) in self.poses.iter_mut().enumerate() {
                    pose.row = picked[i].0;
                    pose.col = picked[i].1;
                    pose.facing = Facing::ALL[self.rng.random_range(0..4)];
                }
                self.pig = picked[2];
                if !self.pig_moves().is_empty() {
                    break;
                }
            }
        } else {
            self.poses = [
                Pose { row: 5, col: 2, facing: Facing::North },
                Pose { row: 5, col: 6, facing: Facing::North },
            ];
            self.pig = (3, 4);
        }
        self.episode += 1;
        self.phase = Phase::Running;
        self.ready = [false; 2];
        self.turn = Role::Challenger;
        self.steps = [0; 2];
        self.pending = [0.0; 2];
        debug!(
            episode = self.episode,
            adversary = self.adversary.name(),
            "arena episode started"
        );
    }

    fn finish(&mut self, reason: &str) {
        self.phase = Phase::Finished;
        debug!(episode = self.episode, reason, "arena episode finished");
    }

    fn apply(&mut self, role: Role, action: Action) {
        let idx = role.index();
        self.steps[idx] += 1;
        self.pending[idx] += STEP_COST;

        let pose = self.poses[idx];
        match action {
            Action::TurnLeft => self.poses[idx].facing = pose.facing.turn_left(),
            Action::TurnRight => self.poses[idx].facing = pose.facing.turn_right(),
            Action::MoveForward => {
                if let Some(cell) = pose.ahead().filter(|&c| self.is_free(c)) {
                    self.poses[idx].row = cell.0;
                    self.poses[idx].col = cell.1;
                    if self.tiles[cell.0][cell.1] == Tile::Exit {
                        self.pending[idx] += EXIT_REWARD;
                        self.finish("exit");
                        return;
                    }
                }
            }
        }

        if role == Role::Learner {
            let moves = self.pig_moves();
            if let Some(&cell) = moves.choose(&mut self.rng) {
                if self.rng.random_bool(0.5) {
                    self.pig = cell;
                }
            }
        }

        if self.pig_moves().is_empty() {
            self.pending[0] += CAPTURE_REWARD;
            self.pending[1] += CAPTURE_REWARD;
            self.finish("pig caught");
        } else if self.steps.iter().all(|&s| s >= self.config.max_steps) {
            self.finish("out of steps");
        }
    }

    fn view(&self, role: Role) -> ArenaView<'_> {
        ArenaView {
            tiles: &self.tiles,
            me: self.poses[role.index()],
            other: self.poses[role.other().index()],
            pig: self.pig,
            adversary: self.adversary,
            role,
        }
    }
}

struct Shared {
    state: Mutex<ArenaState>,
    changed: Condvar,
}

/// An in-process pig chase arena hosting both roles.
///
/// The challenger acts first in every round, the learner second; the pig takes
/// a random step after the learner.
#[derive(Clone)]
pub struct LocalArena {
    shared: Arc<Shared>,
    endpoints: Vec<ClientEndpoint>,
}

impl LocalArena {
    pub fn new(config: ArenaConfig, endpoints: &[ClientEndpoint], seed: Option<u64>) -> Self {
        let rng = seeded_rng(seed);
        let state = ArenaState {
            config,
            tiles: parse_layout(),
            poses: [Pose { row: 5, col: 2, facing: Facing::North }; 2],
            pig: (3, 4),
            adversary: AdversaryType::Random,
            episode: 0,
            phase: Phase::Idle,
            ready: [false; 2],
            turn: Role::Challenger,
            steps: [0; 2],
            pending: [0.0; 2],
            slots: [Slot::Vacant; 2],
            rng,
        };
        LocalArena {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                changed: Condvar::new(),
            }),
            endpoints: endpoints.to_vec(),
        }
    }

    /// Connect a role, rendering its observations with `builder`.
    pub fn connect<S: StateBuilder>(
        &self,
        role: Role,
        builder: S,
    ) -> Result<ArenaClient<S>, EnvironmentError> {
        let mut st = self.shared.state.lock();
        if st.slots[role.index()] != Slot::Vacant {
            return Err(EnvironmentError::AlreadyConnected(role));
        }
        st.slots[role.index()] = Slot::Connected;
        match self.endpoints.get(role.index()) {
            Some(ep) => info!(%role, endpoint = %ep, "role connected to arena"),
            None => info!(%role, "role connected to arena"),
        }
        Ok(ArenaClient {
            shared: self.shared.clone(),
            role,
            builder,
            episode: 0,
            done: true,
        })
    }
}

/// One role's handle on a [`LocalArena`]. Dropping it disconnects the role.
pub struct ArenaClient<S: StateBuilder> {
    shared: Arc<Shared>,
    role: Role,
    builder: S,
    episode: u64,
    done: bool,
}

impl<S: StateBuilder> ArenaClient<S> {
    fn peer_left(&self, st: &ArenaState) -> bool {
        st.slots[self.role.other().index()] == Slot::Left
    }

    fn in_my_episode(&self, st: &ArenaState) -> bool {
        st.phase == Phase::Running && st.episode == self.episode
    }
}

impl<S: StateBuilder> Environment for ArenaClient<S> {
    type Observation = S::Output;

    fn available_actions(&self) -> usize {
        Action::COUNT
    }

    fn done(&self) -> bool {
        self.done
    }

    fn reset(
        &mut self,
        adversary: Option<AdversaryType>,
    ) -> Result<Option<Self::Observation>, EnvironmentError> {
        let mut st = self.shared.state.lock();
        if let Some(adversary) = adversary {
            st.adversary = adversary;
        }
        if st.phase == Phase::Running && st.episode == self.episode {
            // Abandoning an episode the peer may still be waiting on.
            st.finish("abandoned");
        }

        let target = st.episode + 1;
        st.ready[self.role.index()] = true;
        if st.ready.iter().all(|&r| r) {
            st.start_episode();
            self.shared.changed.notify_all();
        }
        while st.episode < target {
            if self.peer_left(&st) {
                return Err(EnvironmentError::Disconnected);
            }
            self.shared.changed.wait(&mut st);
        }

        self.episode = target;
        if st.episode == target && st.phase == Phase::Running {
            self.done = false;
            Ok(Some(self.builder.build(&st.view(self.role))))
        } else {
            self.done = true;
            Ok(None)
        }
    }

    fn step(&mut self, action: usize) -> Result<Step<Self::Observation>, EnvironmentError> {
        let action = Action::from_index(action).ok_or(EnvironmentError::InvalidAction {
            action,
            available: Action::COUNT,
        })?;
        let mut st = self.shared.state.lock();

        while self.in_my_episode(&st) && st.turn != self.role {
            if self.peer_left(&st) {
                return Err(EnvironmentError::Disconnected);
            }
            self.shared.changed.wait(&mut st);
        }

        if self.in_my_episode(&st) {
            st.apply(self.role, action);
            st.turn = self.role.other();
            self.shared.changed.notify_all();

            while self.in_my_episode(&st) && st.turn != self.role {
                if self.peer_left(&st) {
                    return Err(EnvironmentError::Disconnected);
                }
                self.shared.changed.wait(&mut st);
            }
        }

        let done = !self.in_my_episode(&st);
        let reward = std::mem::take(&mut st.pending[self.role.index()]);
        self.done = done;
        Ok(Step {
            observation: self.builder.build(&st.view(self.role)),
            reward,
            done,
        })
    }
}

impl<S: StateBuilder> Drop for ArenaClient<S> {
    fn drop(&mut self) {
        let mut st = self.shared.state.lock();
        st.slots[self.role.index()] = Slot::Left;
        self.shared.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::SymbolicStateBuilder;
    use std::thread;

    fn fixed_arena(max_steps: usize) -> LocalArena {
        LocalArena::new(
            ArenaConfig {
                max_steps,
                randomize_positions: false,
            },
            &[],
            Some(7),
        )
    }

    #[test]
    fn test_layout_has_two_exits() {
        let tiles = parse_layout();
        let exits = tiles
            .iter()
            .flatten()
            .filter(|&&t| t == Tile::Exit)
            .count();
        assert_eq!(exits, 2);
    }

    #[test]
    fn test_facing_turns_are_inverse() {
        for f in Facing::ALL {
            assert_eq!(f.turn_left().turn_right(), f);
        }
    }

    #[test]
    fn test_action_index_roundtrip() {
        for i in 0..Action::COUNT {
            assert_eq!(Action::from_index(i).unwrap().index(), i);
        }
        assert!(Action::from_index(3).is_none());
    }

    #[test]
    fn test_connect_twice_fails() {
        let arena = fixed_arena(5);
        let _first = arena.connect(Role::Learner, SymbolicStateBuilder).unwrap();
        let second = arena.connect(Role::Learner, SymbolicStateBuilder);
        assert!(matches!(
            second,
            Err(EnvironmentError::AlreadyConnected(Role::Learner))
        ));
    }

    #[test]
    fn test_invalid_action_rejected() {
        let arena = fixed_arena(5);
        let mut client = arena.connect(Role::Challenger, SymbolicStateBuilder).unwrap();
        let err = client.step(7).unwrap_err();
        assert!(matches!(err, EnvironmentError::InvalidAction { action: 7, .. }));
    }

    #[test]
    fn test_episode_runs_out_of_steps() {
        let arena = fixed_arena(3);
        let mut challenger = arena.connect(Role::Challenger, SymbolicStateBuilder).unwrap();
        let mut learner = arena.connect(Role::Learner, SymbolicStateBuilder).unwrap();

        let handle = thread::spawn(move || {
            let obs = challenger.reset(Some(AdversaryType::Focused)).unwrap();
            assert!(obs.is_some());
            let mut total = 0.0;
            loop {
                // Turning in place never ends the episode early.
                let step = challenger.step(Action::TurnLeft.index()).unwrap();
                total += step.reward;
                if step.done {
                    break;
                }
            }
            total
        });

        let obs = learner.reset(None).unwrap().expect("learner observation");
        assert_eq!(obs.adversary, AdversaryType::Focused);
        let mut steps = 0;
        let mut total = 0.0;
        loop {
            let step = learner.step(Action::TurnRight.index()).unwrap();
            steps += 1;
            total += step.reward;
            if step.done {
                break;
            }
        }
        let challenger_total = handle.join().unwrap();
        assert_eq!(steps, 3);
        assert!(learner.done());
        assert!(total <= -3.0 + CAPTURE_REWARD);
        assert!(challenger_total <= -3.0 + CAPTURE_REWARD);
    }

    #[test]
    fn test_exit_pays_bonus_and_ends_episode() {
        let arena = fixed_arena(25);
        let mut challenger = arena.connect(Role::Challenger, SymbolicStateBuilder).unwrap();
        let mut learner = arena.connect(Role::Learner, SymbolicStateBuilder).unwrap();

        let handle = thread::spawn(move || {
            learner.reset(None).unwrap().expect("learner observation");
            let mut rewards = Vec::new();
            loop {
                let step = learner.step(Action::TurnLeft.index()).unwrap();
                rewards.push(step.reward);
                if step.done {
                    break;
                }
            }
            rewards
        });

        challenger.reset(None).unwrap().expect("challenger observation");
        // (5,2) north -> (4,2) -> (3,2), face west, step onto the exit at (3,1).
        let mut outcomes = Vec::new();
        for action in [
            Action::MoveForward,
            Action::MoveForward,
            Action::TurnLeft,
            Action::MoveForward,
        ] {
            let step = challenger.step(action.index()).unwrap();
            outcomes.push((step.reward, step.done, step.observation.me.cell()));
        }

        assert_eq!(
            outcomes,
            vec![
                (STEP_COST, false, (4, 2)),
                (STEP_COST, false, (3, 2)),
                (STEP_COST, false, (3, 2)),
                (STEP_COST + EXIT_REWARD, true, (3, 1)),
            ]
        );
        assert!(challenger.done());
        assert_eq!(handle.join().unwrap(), vec![STEP_COST; 3]);
    }

    #[test]
    fn test_trapped_pig_pays_both_roles() {
        let arena = fixed_arena(25);
        let mut st = arena.shared.state.lock();
        st.start_episode();
        // The pig sits in the dead end above (3,4); blocking (3,4) traps it.
        st.pig = (2, 4);
        st.poses[Role::Challenger.index()] = Pose {
            row: 4,
            col: 4,
            facing: Facing::North,
        };

        st.apply(Role::Challenger, Action::MoveForward);

        assert_eq!(st.phase, Phase::Finished);
        assert_eq!(st.poses[Role::Challenger.index()].cell(), (3, 4));
        assert_eq!(
            st.pending,
            [STEP_COST + CAPTURE_REWARD, CAPTURE_REWARD]
        );
    }

    #[test]
    fn test_reset_is_null_when_peer_ends_episode_on_first_action() {
        let arena = fixed_arena(25);
        let mut learner = arena.connect(Role::Learner, SymbolicStateBuilder).unwrap();
        let _challenger = arena.connect(Role::Challenger, SymbolicStateBuilder).unwrap();

        let handle = thread::spawn(move || {
            let observation = learner.reset(None);
            (observation, learner.done())
        });
        while !arena.shared.state.lock().ready[Role::Learner.index()] {
            thread::sleep(std::time::Duration::from_millis(1));
        }

        {
            // The challenger starts the episode and walks straight into an exit
            // before the learner gets to look at the board.
            let mut st = arena.shared.state.lock();
            st.ready[Role::Challenger.index()] = true;
            st.start_episode();
            st.poses[Role::Challenger.index()] = Pose {
                row: 3,
                col: 2,
                facing: Facing::West,
            };
            st.apply(Role::Challenger, Action::MoveForward);
            assert_eq!(st.phase, Phase::Finished);
            arena.shared.changed.notify_all();
        }

        let (observation, done) = handle.join().unwrap();
        assert!(observation.unwrap().is_none());
        assert!(done);
    }

    #[test]
    fn test_dropped_peer_disconnects() {
        let arena = fixed_arena(25);
        let mut challenger = arena.connect(Role::Challenger, SymbolicStateBuilder).unwrap();
        let learner = arena.connect(Role::Learner, SymbolicStateBuilder).unwrap();

        let handle = thread::spawn(move || challenger.reset(None));
        thread::sleep(std::time::Duration::from_millis(20));
        drop(learner);

        let result = handle.join().unwrap();
        assert!(matches!(result, Err(EnvironmentError::Disconnected)));
    }
}
