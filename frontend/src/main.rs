use std::path::PathBuf;

use clap::Parser;

mod app;

/// Watch the backtracking search find its way through a maze
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Maze file to open instead of the one from the last session
    maze: Option<PathBuf>,
}

fn main() -> eframe::Result<()> {
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).
    let args = Args::parse();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 700.0])
            .with_min_inner_size([300.0, 220.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Maze backtracking",
        native_options,
        Box::new(move |cc| Box::new(app::App::new(cc, args.maze))),
    )
}
