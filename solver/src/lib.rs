pub mod find;
pub mod grid;
pub mod progress;
pub mod util;

pub use find::{
    solve, solve_maze, with_search_stack, MapStorage, MapTrait, PathFinder, PathFinderState, PathResult, Snapshot,
};
pub use grid::{Cell, Direction, GridMap, Point};
pub use progress::{NoProgress, Progress, TextRenderer, Tile};
