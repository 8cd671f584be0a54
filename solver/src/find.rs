use anyhow::Context;

use crate::grid::{GridMap, Point};
use crate::progress::Progress;

/// Supertrait that collects all the requirements on the NodeReference values
/// Must be copy, comparable and not references (hence 'static)
pub trait NodeReference: Copy + Eq + std::fmt::Debug + 'static {}

pub trait MapTrait {
    /// The type that can be used to reference nodes in the map
    type Reference: NodeReference;

    /// The type that the map uses for storage
    type Storage<T: Default + Copy + Clone + 'static>: MapStorage<T, Reference = Self::Reference>;

    /// Check if the provided node reference is inside the map
    fn is_valid(&self, node: Self::Reference) -> bool;

    /// Check if the provided node is inside the map and can be walked on
    fn is_passable(&self, node: Self::Reference) -> bool;

    /// Return an iterator over the passable neighbors of the provided node, in the order they
    /// should be tried
    fn neighbors_of(&self, node: Self::Reference) -> impl Iterator<Item = Self::Reference>;

    /// Create a storage for values of type T
    fn create_storage<T: Default + Copy + Clone + 'static>(&self) -> Self::Storage<T>;
}

pub trait MapStorage<T> {
    type Reference: NodeReference;

    fn is_valid(&self, node: Self::Reference) -> bool;
    fn get(&self, node: Self::Reference) -> T;
    fn get_mut(&mut self, node: Self::Reference) -> &mut T;
}

/// Recursive depth-first search with backtracking.
///
/// `path` is the way that was taken to reach `current` and is never modified; every call works
/// on its own copy, so a failed branch leaves nothing behind for its siblings. Directions are
/// tried in the order given by [`MapTrait::neighbors_of`] and the first branch that reaches
/// `goal` wins. Returns the full path (including `current` and `goal`) or `None` if `goal` can
/// not be reached from here without revisiting a cell of the path.
pub fn solve<M: MapTrait, P: Progress<M> + ?Sized>(
    path: &[M::Reference],
    current: M::Reference,
    goal: M::Reference,
    map: &M,
    progress: &mut P,
) -> Option<Vec<M::Reference>> {
    let mut new_path = path.to_vec();
    new_path.push(current);

    progress.render(map, path, current, goal);

    if current == goal {
        return Some(new_path);
    }

    for next in map.neighbors_of(current) {
        if new_path.contains(&next) {
            continue;
        }

        if let Some(solution) = solve(&new_path, next, goal, map, progress) {
            return Some(solution);
        }

        // show the backtracking
        progress.render(map, path, current, goal);
    }

    None
}

/// Solve a maze from its top left to its bottom right corner.
///
/// A walled off start or goal never has a path.
pub fn solve_maze<P: Progress<GridMap> + ?Sized>(
    map: &GridMap,
    progress: &mut P,
) -> Option<Vec<Point>> {
    let (start, goal) = (map.start(), map.goal());

    if !map.is_passable(start) || !map.is_passable(goal) {
        log::debug!("start {} or goal {} is a wall", start, goal);
        return None;
    }

    let solution = solve(&[], start, goal, map, progress);
    match &solution {
        Some(path) => log::debug!("found a path of {} cells", path.len()),
        None => log::debug!("search space exhausted without reaching {}", goal),
    }
    solution
}

/// Stack reserved per cell of the maze, enough for one level of `solve` in a debug build
const STACK_PER_CELL: usize = 2 * 1024;
const MIN_SEARCH_STACK: usize = 8 * 1024 * 1024;

/// Run `search` on its own thread with a stack large enough for `solve` to recurse once for
/// every cell of `map`. The recursive search goes one level deeper for every cell on the
/// current path, which overflows the default stack on long corridors.
pub fn with_search_stack<T, F>(map: &GridMap, search: F) -> anyhow::Result<T>
where
    F: FnOnce() -> T + Send,
    T: Send,
{
    let stack_size = map
        .rows
        .saturating_mul(map.columns)
        .saturating_mul(STACK_PER_CELL)
        .max(MIN_SEARCH_STACK);
    log::debug!("searching on a thread with a {} byte stack", stack_size);

    std::thread::scope(|s| {
        let handle = std::thread::Builder::new()
            .name("search".into())
            .stack_size(stack_size)
            .spawn_scoped(s, search)
            .context("could not start the search thread")?;
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("the search thread panicked"))
    })
}

#[derive(Debug, PartialEq, Clone, Eq)]
pub struct PathResult<R> {
    pub path: Vec<R>,
    pub start: R,
    pub goal: R,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathFinderState<R> {
    Computing,
    NoPathFound,
    PathFound(PathResult<R>),
}

impl<R> PathFinderState<R> {
    pub fn is_done(&self) -> bool {
        !matches!(self, PathFinderState::Computing)
    }
}

/// What a renderer gets to see after each step: the path that led to `current` (not including
/// it) and the cell that is being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot<'a, R> {
    pub path: &'a [R],
    pub current: R,
}

/// The same search as [`solve`], but with an explicit stack so that it can be advanced one
/// frame at a time and does not grow the call stack with the length of the path.
pub struct PathFinder<M: MapTrait> {
    start: M::Reference,
    goal: M::Reference,
    started: bool,
    /// marks every cell currently on `path`, cleared again when a cell is popped
    on_path: M::Storage<bool>,
    path: Vec<M::Reference>,
    /// neighbors that are still left to try for each entry of `path`, in reverse order
    pending: Vec<Vec<M::Reference>>,
    frames: usize,
    state: PathFinderState<M::Reference>,
}

impl<M: MapTrait> PathFinder<M> {
    pub fn new(start: M::Reference, goal: M::Reference, on_path: M::Storage<bool>) -> Self {
        Self {
            start,
            goal,
            started: false,
            on_path,
            path: Vec::new(),
            pending: Vec::new(),
            frames: 0,
            state: PathFinderState::Computing,
        }
    }

    pub fn finish<P: Progress<M> + ?Sized>(
        mut self,
        map: &M,
        progress: &mut P,
    ) -> PathFinderState<M::Reference> {
        loop {
            let frames = self.frames;
            let state = self.step(map);

            if self.frames != frames {
                if let Some(snapshot) = self.frame() {
                    progress.render(map, snapshot.path, snapshot.current, self.goal);
                }
            }

            if state.is_done() {
                return state;
            }
        }
    }

    /// Advance the search by exactly one rendered frame: entering a new cell or falling back to
    /// the previous one. The last step of a failed search produces no frame.
    pub fn step(&mut self, map: &M) -> PathFinderState<M::Reference> {
        if self.state.is_done() {
            return self.state.clone();
        }

        if !self.started {
            self.started = true;
            self.enter(map, self.start);
            return self.state.clone();
        }

        let next = match self.pending.last_mut() {
            Some(pending) => {
                let mut next = None;
                while let Some(candidate) = pending.pop() {
                    if !self.on_path.get(candidate) {
                        next = Some(candidate);
                        break;
                    }
                }
                next
            }
            None => {
                self.state = PathFinderState::NoPathFound;
                return self.state.clone();
            }
        };

        match next {
            Some(next) => self.enter(map, next),
            None => {
                // dead end, fall back to the previous cell
                if let Some(point) = self.path.pop() {
                    *self.on_path.get_mut(point) = false;
                }
                self.pending.pop();

                if self.path.is_empty() {
                    log::debug!("no path from {:?} to {:?}", self.start, self.goal);
                    self.state = PathFinderState::NoPathFound;
                } else {
                    self.frames += 1;
                }
            }
        }

        self.state.clone()
    }

    fn enter(&mut self, map: &M, point: M::Reference) {
        *self.on_path.get_mut(point) = true;
        self.path.push(point);
        self.frames += 1;

        if point == self.goal {
            log::debug!("found a path of {} cells", self.path.len());
            self.state = PathFinderState::PathFound(PathResult {
                path: self.path.clone(),
                start: self.start,
                goal: self.goal,
            });
            return;
        }

        let mut pending: Vec<_> = map.neighbors_of(point).collect();
        pending.reverse();
        self.pending.push(pending);
    }

    /// The frame produced by the last step, if any
    pub fn frame(&self) -> Option<Snapshot<'_, M::Reference>> {
        let (current, path) = self.path.split_last()?;
        Some(Snapshot {
            path,
            current: *current,
        })
    }

    /// Number of frames produced so far
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn state(&self) -> &PathFinderState<M::Reference> {
        &self.state
    }

    pub fn start(&self) -> M::Reference {
        self.start
    }

    pub fn goal(&self) -> M::Reference {
        self.goal
    }
}

impl PathFinder<GridMap> {
    /// A finder from the top left to the bottom right corner of the maze. If either of them is a
    /// wall the finder is done before it takes its first step.
    pub fn for_maze(map: &GridMap) -> Self {
        let mut finder = Self::new(map.start(), map.goal(), map.create_storage::<bool>());

        if !map.is_passable(map.start()) || !map.is_passable(map.goal()) {
            log::debug!("start {} or goal {} is a wall", map.start(), map.goal());
            finder.started = true;
            finder.state = PathFinderState::NoPathFound;
        }

        finder
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::progress::NoProgress;
    use crate::util::parse_maze;

    #[derive(Default)]
    struct Recorder {
        frames: Vec<(Vec<Point>, Point)>,
    }

    impl Progress<GridMap> for Recorder {
        fn render(&mut self, _map: &GridMap, path: &[Point], current: Point, _goal: Point) {
            self.frames.push((path.to_vec(), current));
        }
    }

    fn maze(rows: &[&str]) -> GridMap {
        let text = format!("{}\n{}\n", rows.len(), rows.join("\n"));
        parse_maze(&text).unwrap()
    }

    fn points(p: &[(usize, usize)]) -> Vec<Point> {
        p.iter().map(|&(row, col)| Point { row, col }).collect()
    }

    fn assert_valid_path(map: &GridMap, path: &[Point]) {
        assert_eq!(path.first(), Some(&map.start()));
        assert_eq!(path.last(), Some(&map.goal()));

        for p in path {
            assert!(map.is_passable(*p), "{} is not passable", p);
            assert_eq!(path.iter().filter(|q| *q == p).count(), 1, "{} repeated", p);
        }

        for w in path.windows(2) {
            let (a, b) = (w[0], w[1]);
            assert_eq!(a.row.abs_diff(b.row) + a.col.abs_diff(b.col), 1, "{} -> {}", a, b);
        }
    }

    #[test]
    fn test_single_cell() {
        let map = maze(&["X"]);
        assert_eq!(solve_maze(&map, &mut NoProgress), Some(points(&[(0, 0)])));
    }

    #[test]
    fn test_open_3x3_reference_trace() {
        let map = maze(&["XXX", "XXX", "XXX"]);
        let mut recorder = Recorder::default();

        let expected = points(&[
            (0, 0),
            (1, 0),
            (2, 0),
            (2, 1),
            (1, 1),
            (0, 1),
            (0, 2),
            (1, 2),
            (2, 2),
        ]);
        assert_eq!(solve_maze(&map, &mut recorder), Some(expected.clone()));

        // no backtracking happens, one frame per entered cell
        assert_eq!(recorder.frames.len(), 9);
        for (i, (path, current)) in recorder.frames.iter().enumerate() {
            assert_eq!(path, &expected[..i]);
            assert_eq!(*current, expected[i]);
        }
    }

    #[test]
    fn test_around_a_wall() {
        let map = maze(&["XX", "#X"]);
        assert_eq!(
            solve_maze(&map, &mut NoProgress),
            Some(points(&[(0, 0), (0, 1), (1, 1)]))
        );
    }

    #[test]
    fn test_diagonal_is_not_adjacent() {
        let map = maze(&["X#", "#X"]);
        let mut recorder = Recorder::default();
        assert_eq!(solve_maze(&map, &mut recorder), None);
        assert_eq!(recorder.frames, vec![(vec![], Point::new(0, 0))]);
    }

    #[test]
    fn test_walled_start_or_goal() {
        let mut recorder = Recorder::default();
        assert_eq!(solve_maze(&maze(&["#X", "XX"]), &mut recorder), None);
        assert_eq!(solve_maze(&maze(&["XX", "X#"]), &mut recorder), None);
        assert_eq!(solve_maze(&maze(&["#"]), &mut recorder), None);
        assert!(recorder.frames.is_empty());

        let walled = maze(&["#X", "XX"]);
        assert_eq!(
            PathFinder::for_maze(&walled).finish(&walled, &mut recorder),
            PathFinderState::NoPathFound
        );
        assert!(recorder.frames.is_empty());
    }

    #[test]
    fn test_single_corridor() {
        let map = maze(&["XXX##", "##X##", "XXX##", "X####", "XXXXX"]);

        assert_eq!(
            solve_maze(&map, &mut NoProgress),
            Some(points(&[
                (0, 0),
                (0, 1),
                (0, 2),
                (1, 2),
                (2, 2),
                (2, 1),
                (2, 0),
                (3, 0),
                (4, 0),
                (4, 1),
                (4, 2),
                (4, 3),
                (4, 4),
            ]))
        );
    }

    #[test]
    fn test_backtracking_frames() {
        let map = maze(&["XXX", "X#X", "X#X"]);
        let mut recorder = Recorder::default();

        assert_eq!(
            solve_maze(&map, &mut recorder),
            Some(points(&[(0, 0), (0, 1), (0, 2), (1, 2), (2, 2)]))
        );

        let expected = vec![
            (points(&[]), Point::new(0, 0)),
            (points(&[(0, 0)]), Point::new(1, 0)),
            (points(&[(0, 0), (1, 0)]), Point::new(2, 0)),
            // dead end at (2,0), back to (1,0) and then to (0,0)
            (points(&[(0, 0)]), Point::new(1, 0)),
            (points(&[]), Point::new(0, 0)),
            (points(&[(0, 0)]), Point::new(0, 1)),
            (points(&[(0, 0), (0, 1)]), Point::new(0, 2)),
            (points(&[(0, 0), (0, 1), (0, 2)]), Point::new(1, 2)),
            (points(&[(0, 0), (0, 1), (0, 2), (1, 2)]), Point::new(2, 2)),
        ];
        assert_eq!(recorder.frames, expected);
    }

    #[test]
    fn test_deterministic_and_valid() {
        let map = maze(&[
            "XXXXX#X", "X#X#X#X", "X#XXX#X", "X###XXX", "XXX#X#X", "#X#XX#X", "XXX#XXX",
        ]);

        let first = solve_maze(&map, &mut NoProgress).unwrap();
        let second = solve_maze(&map, &mut NoProgress).unwrap();
        assert_eq!(first, second);
        assert_valid_path(&map, &first);
    }

    #[test]
    fn test_bundled_maze() {
        let map = parse_maze(include_str!("../../data/TestMaze.txt")).unwrap();

        let expected = points(&[
            (0, 0),
            (0, 1),
            (1, 1),
            (2, 1),
            (2, 0),
            (3, 0),
            (4, 0),
            (4, 1),
            (4, 2),
            (4, 3),
            (3, 3),
            (3, 4),
            (3, 5),
            (3, 6),
            (2, 6),
            (1, 6),
            (0, 6),
            (0, 7),
            (0, 8),
            (0, 9),
            (1, 9),
            (2, 9),
            (2, 8),
            (3, 8),
            (4, 8),
            (5, 8),
            (6, 8),
            (7, 8),
            (8, 8),
            (9, 8),
            (9, 9),
        ]);
        let solution = solve_maze(&map, &mut NoProgress).unwrap();
        assert_eq!(solution, expected);
        assert_valid_path(&map, &solution);
    }

    #[test]
    fn test_solve_keeps_callers_path() {
        let map = maze(&["XXX", "XXX", "XXX"]);
        let path = points(&[(0, 0)]);

        let solution =
            solve(&path[..], Point::new(0, 1), map.goal(), &map, &mut NoProgress).unwrap();
        assert_eq!(path, points(&[(0, 0)]));
        assert_eq!(&solution[..2], &points(&[(0, 0), (0, 1)])[..]);
        assert_valid_path(&map, &solution);
    }

    #[test]
    fn test_finder_matches_recursive() {
        for rows in [
            &["XXX", "XXX", "XXX"][..],
            &["XXX", "X#X", "X#X"][..],
            &["X#", "#X"][..],
            &["XX", "#X"][..],
            &["X"][..],
            &["XXXX", "X##X", "XX#X", "#XXX"][..],
            &["XXXX", "#X#X", "XX##", "X#XX"][..],
            &[
                "XXXXX#X", "X#X#X#X", "X#XXX#X", "X###XXX", "XXX#X#X", "#X#XX#X", "XXX#XXX",
            ][..],
        ] {
            let map = maze(rows);

            let mut recursive = Recorder::default();
            let solution = solve_maze(&map, &mut recursive);

            let mut stepped = Recorder::default();
            let state = PathFinder::for_maze(&map).finish(&map, &mut stepped);

            assert_eq!(recursive.frames, stepped.frames, "{:?}", rows);
            match (solution, state) {
                (Some(path), PathFinderState::PathFound(result)) => {
                    assert_eq!(path, result.path);
                    assert_eq!(result.start, map.start());
                    assert_eq!(result.goal, map.goal());
                }
                (None, PathFinderState::NoPathFound) => {}
                (a, b) => panic!("{:?} vs {:?} for {:?}", a, b, rows),
            }
        }
    }

    #[test]
    fn test_step_by_step() {
        let map = maze(&["X#", "#X"]);
        let mut finder = PathFinder::for_maze(&map);

        assert!(finder.frame().is_none());
        assert_eq!(finder.step(&map), PathFinderState::Computing);
        assert_eq!(
            finder.frame(),
            Some(Snapshot {
                path: &[],
                current: Point::new(0, 0)
            })
        );
        assert_eq!(finder.frames(), 1);

        assert_eq!(finder.step(&map), PathFinderState::NoPathFound);
        assert_eq!(finder.frames(), 1);

        // stepping a finished finder changes nothing
        assert_eq!(finder.step(&map), PathFinderState::NoPathFound);
        assert!(finder.state().is_done());
    }

    /// A snake through an n x n grid: every other row is open, connected at alternating ends
    fn snake(n: usize) -> GridMap {
        let mut map = GridMap::new(n, n);
        for row in (1..n).step_by(2) {
            for col in 0..n {
                map.cells[row][col] = crate::grid::Cell::Wall;
            }
            let gap = if (row / 2) % 2 == 0 { n - 1 } else { 0 };
            map.cells[row][gap] = crate::grid::Cell::Open;
        }
        map
    }

    #[test]
    fn test_long_corridor_does_not_recurse() {
        let map = snake(101);

        match PathFinder::for_maze(&map).finish(&map, &mut NoProgress) {
            PathFinderState::PathFound(result) => {
                assert_eq!(result.path.len(), map.open_cells());
                assert_valid_path(&map, &result.path);
            }
            s => panic!("unexpected {:?}", s),
        }
    }

    #[test]
    fn test_recursive_search_on_large_stack() {
        let map = snake(61);

        let path = with_search_stack(&map, || solve_maze(&map, &mut NoProgress))
            .unwrap()
            .unwrap();
        assert_eq!(path.len(), map.open_cells());
        assert_valid_path(&map, &path);

        // the result comes back unchanged from the search thread
        let expected = match PathFinder::for_maze(&map).finish(&map, &mut NoProgress) {
            PathFinderState::PathFound(result) => result.path,
            s => panic!("unexpected {:?}", s),
        };
        assert_eq!(path, expected);
    }

    #[test]
    fn test_search_thread_panic_is_an_error() {
        let map = GridMap::new(1, 1);
        let result: anyhow::Result<()> = with_search_stack(&map, || panic!("lost"));
        assert!(result.is_err());
    }
}
