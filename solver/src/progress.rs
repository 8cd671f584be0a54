use std::{io::Write, thread, time::Duration};

use crate::find::MapTrait;
use crate::grid::{Cell, GridMap, Point};

/// Receives a snapshot of the search every time it enters a cell or backtracks out of one.
/// Rendering has no influence on the search itself.
pub trait Progress<M: MapTrait> {
    fn render(&mut self, map: &M, path: &[M::Reference], current: M::Reference, goal: M::Reference);
}

/// Discards all progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl<M: MapTrait> Progress<M> for NoProgress {
    fn render(&mut self, _: &M, _: &[M::Reference], _: M::Reference, _: M::Reference) {}
}

/// How a single cell is shown in a frame, in order of precedence
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Tile {
    Wall,
    Current,
    Goal,
    Path,
    Open,
}

impl Tile {
    /// `current` is `None` before the search has entered its first cell
    pub fn classify(
        map: &GridMap,
        at: Point,
        current: Option<Point>,
        goal: Point,
        on_path: bool,
    ) -> Self {
        if map.cell(at) != Some(Cell::Open) {
            Tile::Wall
        } else if current == Some(at) {
            Tile::Current
        } else if goal == at {
            Tile::Goal
        } else if on_path {
            Tile::Path
        } else {
            Tile::Open
        }
    }

    fn symbol(self) -> char {
        match self {
            Tile::Wall => '#',
            Tile::Current => '@',
            Tile::Goal => 'G',
            Tile::Path => '*',
            Tile::Open => '.',
        }
    }
}

/// Writes every frame as a block of characters, waiting `delay` after each one
pub struct TextRenderer<W: Write> {
    out: W,
    delay: Duration,
    frame: usize,
    error: Option<std::io::Error>,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W, delay: Duration) -> Self {
        Self {
            out,
            delay,
            frame: 0,
            error: None,
        }
    }

    pub fn frames(&self) -> usize {
        self.frame
    }

    /// Returns the writer, or the first error that happened while writing frames
    pub fn finish(self) -> std::io::Result<W> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.out),
        }
    }

    fn write_frame(
        &mut self,
        map: &GridMap,
        path: &[Point],
        current: Point,
        goal: Point,
    ) -> std::io::Result<()> {
        writeln!(self.out, "frame {} at {}", self.frame, current)?;

        for row in 0..map.rows {
            let line: String = (0..map.columns)
                .map(|col| {
                    let at = Point { row, col };
                    Tile::classify(map, at, Some(current), goal, path.contains(&at)).symbol()
                })
                .collect();
            writeln!(self.out, "{}", line)?;
        }
        writeln!(self.out)?;

        self.out.flush()
    }
}

impl<W: Write> Progress<GridMap> for TextRenderer<W> {
    fn render(&mut self, map: &GridMap, path: &[Point], current: Point, goal: Point) {
        if self.error.is_some() {
            return;
        }

        if let Err(e) = self.write_frame(map, path, current, goal) {
            log::warn!("failed to write frame {}: {}", self.frame, e);
            self.error = Some(e);
            return;
        }

        self.frame += 1;

        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}
