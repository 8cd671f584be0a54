use std::{io, path::PathBuf, time::Duration};

use clap::Parser;
use solver::{
    solve_maze, util::load_maze, with_search_stack, NoProgress, PathFinder, PathFinderState, Point,
};
use solver::{Progress, TextRenderer};

/// Find a way from the top left to the bottom right corner of a maze, showing every step of
/// the search
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Maze file: the side length on the first line, then one line per row with `X` for open
    /// cells. Images (.png, .jpg, .bmp) are read as black and white mazes.
    #[arg(default_value = "TestMaze.txt")]
    maze: PathBuf,

    /// Pause between two frames
    #[arg(long, default_value_t = 200)]
    delay_ms: u64,

    /// Only print the result, not the frames
    #[arg(long, short)]
    quiet: bool,

    /// Use the recursive search instead of the explicit stack. It recurses once per cell on
    /// the current path, so it runs on a thread with a stack sized to the maze.
    #[arg(long)]
    recursive: bool,
}

fn search<P: Progress<solver::GridMap>>(
    map: &solver::GridMap,
    recursive: bool,
    progress: &mut P,
) -> Option<Vec<Point>> {
    if recursive {
        solve_maze(map, progress)
    } else {
        match PathFinder::for_maze(map).finish(map, progress) {
            PathFinderState::PathFound(result) => Some(result.path),
            _ => None,
        }
    }
}

fn format_path(path: &[Point]) -> String {
    let points: Vec<String> = path.iter().map(|p| p.to_string()).collect();
    format!("[{}]", points.join(", "))
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let args = Args::parse();

    let map = load_maze(&args.maze)?;
    println!("{}", map);

    let run = || -> Result<Option<Vec<Point>>, anyhow::Error> {
        if args.quiet {
            return Ok(search(&map, args.recursive, &mut NoProgress));
        }

        let mut renderer =
            TextRenderer::new(io::stdout().lock(), Duration::from_millis(args.delay_ms));
        let solution = search(&map, args.recursive, &mut renderer);
        log::info!("rendered {} frames", renderer.frames());
        drop(renderer.finish()?);
        Ok(solution)
    };

    let solution = if args.recursive {
        with_search_stack(&map, run)??
    } else {
        run()?
    };

    match solution {
        Some(path) => println!("The path is:\n{}", format_path(&path)),
        None => println!("no path exists"),
    }

    Ok(())
}
