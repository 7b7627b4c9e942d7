use super::arena::{Pose, Tile, BOARD_SIZE};
use super::AdversaryType;
use crate::experiment::Role;

/// Read-only snapshot of the arena from one role's point of view.
pub struct ArenaView<'a> {
    pub tiles: &'a [[Tile; BOARD_SIZE]; BOARD_SIZE],
    pub me: Pose,
    pub other: Pose,
    pub pig: (usize, usize),
    pub adversary: AdversaryType,
    pub role: Role,
}

/// Maps the raw arena into the representation an agent consumes.
pub trait StateBuilder: Send {
    type Output;

    fn build(&self, view: &ArenaView<'_>) -> Self::Output;
}

/// Board tiles plus every entity's position, for scripted agents.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolicState {
    pub tiles: [[Tile; BOARD_SIZE]; BOARD_SIZE],
    pub me: Pose,
    pub other: Pose,
    pub pig: (usize, usize),
    pub adversary: AdversaryType,
}

impl SymbolicState {
    /// Whether `cell` can be entered right now.
    pub fn is_free(&self, cell: (usize, usize)) -> bool {
        self.tiles[cell.0][cell.1] != Tile::Wall && self.other.cell() != cell && self.pig != cell
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolicStateBuilder;

impl StateBuilder for SymbolicStateBuilder {
    type Output = SymbolicState;

    fn build(&self, view: &ArenaView<'_>) -> SymbolicState {
        SymbolicState {
            tiles: *view.tiles,
            me: view.me,
            other: view.other,
            pig: view.pig,
            adversary: view.adversary,
        }
    }
}

/// A grayscale frame, row-major, one byte per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

const WALL_SHADE: u8 = 64;
const EXIT_SHADE: u8 = 96;
const SELF_SHADE: u8 = 160;
const RANDOM_ADVERSARY_SHADE: u8 = 200;
const FOCUSED_ADVERSARY_SHADE: u8 = 224;
const PIG_SHADE: u8 = 255;

/// Renders the board into a `height x width` grayscale frame.
///
/// The adversary type is encoded in the other agent's shade so the learner can
/// tell which opponent it faces.
#[derive(Debug, Clone, Copy)]
pub struct FrameStateBuilder {
    pub height: usize,
    pub width: usize,
}

impl FrameStateBuilder {
    pub fn new(height: usize, width: usize) -> Self {
        FrameStateBuilder { height, width }
    }

    fn shade(view: &ArenaView<'_>, cell: (usize, usize)) -> u8 {
        if view.pig == cell {
            PIG_SHADE
        } else if view.me.cell() == cell {
            SELF_SHADE
        } else if view.other.cell() == cell {
            match view.adversary {
                AdversaryType::Random => RANDOM_ADVERSARY_SHADE,
                AdversaryType::Focused => FOCUSED_ADVERSARY_SHADE,
            }
        } else {
            match view.tiles[cell.0][cell.1] {
                Tile::Wall => WALL_SHADE,
                Tile::Exit => EXIT_SHADE,
                Tile::Floor => 0,
            }
        }
    }
}

impl StateBuilder for FrameStateBuilder {
    type Output = Frame;

    fn build(&self, view: &ArenaView<'_>) -> Frame {
        let mut pixels = Vec::with_capacity(self.height * self.width);
        for y in 0..self.height {
            let row = y * BOARD_SIZE / self.height;
            for x in 0..self.width {
                let col = x * BOARD_SIZE / self.width;
                pixels.push(Self::shade(view, (row, col)));
            }
        }
        Frame { pixels }
    }
}
