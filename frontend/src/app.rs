mod camera;

use std::{path::PathBuf, time::Duration};

use egui::{Color32, Pos2, Rect, Stroke};
use nalgebra::{Point2, Vector2};
use solver::{
    find::{MapStorage, MapTrait, PathFinder, PathFinderState},
    grid::{GridMap, Point},
    progress::Tile,
    util::{load_maze, parse_maze},
};

use self::camera::Camera;

const PRESET: &str = include_str!("../../data/TestMaze.txt");

pub struct App {
    state: State,
    map: GridMap,
    pathfinder: PathFinder<GridMap>,
    camera: Camera,
    fit_requested: bool,
    last_step: f64,
    output_cell: String,
    load_error: Option<String>,
}

/// We derive Deserialize/Serialize so we can persist app state on shutdown.
#[derive(serde::Deserialize, serde::Serialize)]
#[serde(default)] // if we add new fields, give them default values when deserializing old state
struct State {
    maze_path: String,
    delay_ms: u64,
    auto_step: bool,
    pause_on_press: bool,
    draw_grid_lines: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            maze_path: String::new(),
            delay_ms: 200,
            auto_step: true,
            pause_on_press: true,
            draw_grid_lines: true,
        }
    }
}

fn tile_color(tile: Tile) -> Color32 {
    match tile {
        Tile::Wall => Color32::BLACK,
        Tile::Current => Color32::RED,
        Tile::Goal => Color32::GREEN,
        Tile::Path => Color32::YELLOW,
        Tile::Open => Color32::WHITE,
    }
}

fn preset_map() -> GridMap {
    // the preset is part of the binary and known to be well formed
    parse_maze(PRESET).unwrap_or_else(|_| GridMap::new(1, 1))
}

impl App {
    /// Called once before the first frame.
    pub fn new(cc: &eframe::CreationContext<'_>, maze: Option<PathBuf>) -> Self {
        // Load previous app state (if any).
        // Note that you must enable the `persistence` feature for this to work.
        let mut state: State = if let Some(storage) = cc.storage {
            eframe::get_value(storage, eframe::APP_KEY).unwrap_or_default()
        } else {
            Default::default()
        };

        if let Some(maze) = maze {
            state.maze_path = maze.display().to_string();
        }

        let map = preset_map();
        let mut app = App {
            state,
            pathfinder: PathFinder::for_maze(&map),
            map,
            camera: Camera::new(20.0),
            fit_requested: true,
            last_step: 0.0,
            output_cell: Default::default(),
            load_error: None,
        };

        if !app.state.maze_path.is_empty() {
            app.load_from_path();
        }

        app
    }

    fn set_map(&mut self, map: GridMap) {
        self.pathfinder = PathFinder::for_maze(&map);
        self.map = map;
        self.fit_requested = true;
        self.load_error = None;
    }

    fn load_from_path(&mut self) {
        match load_maze(&self.state.maze_path) {
            Ok(map) => self.set_map(map),
            Err(e) => {
                log::error!("could not load maze: {:#}", e);
                self.load_error = Some(format!("Could not load maze:\n{:#}", e));
            }
        }
    }

    fn reset(&mut self) {
        self.pathfinder = PathFinder::for_maze(&self.map);
    }

    fn finish(&mut self) {
        while !self.pathfinder.step(&self.map).is_done() {}
    }

    /// Takes a step if auto stepping is enabled and enough time has passed since the last one
    fn auto_step(&mut self, ctx: &egui::Context, paused: bool) {
        if !self.state.auto_step || self.pathfinder.state().is_done() {
            return;
        }

        let delay = Duration::from_millis(self.state.delay_ms);
        let now = ctx.input(|i| i.time);

        if !paused && now - self.last_step >= delay.as_secs_f64() {
            self.pathfinder.step(&self.map);
            self.last_step = now;
        }

        ctx.request_repaint_after(delay.min(Duration::from_millis(50)));
    }

    fn status(&self) -> String {
        match self.pathfinder.state() {
            PathFinderState::Computing => format!("Searching, frame {}", self.pathfinder.frames()),
            PathFinderState::NoPathFound => "no path exists".to_string(),
            PathFinderState::PathFound(result) => {
                let points: Vec<String> = result.path.iter().map(|p| p.to_string()).collect();
                format!(
                    "Path of {} cells after {} frames:\n[{}]",
                    result.path.len(),
                    self.pathfinder.frames(),
                    points.join(", ")
                )
            }
        }
    }

    fn point_at(&self, screen: Pos2, canvas: Rect) -> Option<Point> {
        let world = self
            .camera
            .screen_to_world(Point2::new(screen.x - canvas.left(), screen.y - canvas.top()));
        if world.x < 0.0 || world.y < 0.0 {
            return None;
        }
        let point = Point {
            row: world.y as usize,
            col: world.x as usize,
        };
        if self.map.is_valid(point) {
            Some(point)
        } else {
            None
        }
    }

    fn cell_rect(&self, point: Point, canvas: Rect) -> Rect {
        let to_screen = |x: f32, y: f32| {
            let p = self.camera.world_to_screen(Point2::new(x, y));
            Pos2::new(canvas.left() + p.x, canvas.top() + p.y)
        };
        Rect::from_min_max(
            to_screen(point.col as f32, point.row as f32),
            to_screen(point.col as f32 + 1.0, point.row as f32 + 1.0),
        )
    }

    fn draw_maze(&self, painter: &egui::Painter, canvas: Rect) {
        let goal = self.map.goal();
        let snapshot = self.pathfinder.frame();

        let mut on_path = self.map.create_storage::<bool>();
        if let Some(snapshot) = &snapshot {
            for p in snapshot.path {
                *on_path.get_mut(*p) = true;
            }
        }
        let current = snapshot.map(|s| s.current);

        for row in 0..self.map.rows {
            for col in 0..self.map.columns {
                let point = Point { row, col };
                let rect = self.cell_rect(point, canvas);
                if !canvas.intersects(rect) {
                    continue;
                }

                let tile = Tile::classify(&self.map, point, current, goal, on_path.get(point));
                painter.rect_filled(rect, 0.0, tile_color(tile));
            }
        }

        // trace the final path through the cell centers
        if let PathFinderState::PathFound(result) = self.pathfinder.state() {
            let stroke = Stroke::new((self.camera.scale() / 8.0).max(1.0), Color32::DARK_GREEN);
            for p in result.path.windows(2) {
                painter.line_segment(
                    [
                        self.cell_rect(p[0], canvas).center(),
                        self.cell_rect(p[1], canvas).center(),
                    ],
                    stroke,
                );
            }
        }

        if self.state.draw_grid_lines && self.camera.scale() >= 4.0 {
            let stroke = Stroke::new(1.0, Color32::GRAY);
            for row in 0..=self.map.rows {
                let a = self.cell_rect(Point { row, col: 0 }, canvas).left_top();
                let b = self
                    .cell_rect(
                        Point {
                            row,
                            col: self.map.columns,
                        },
                        canvas,
                    )
                    .left_top();
                painter.line_segment([a, b], stroke);
            }
            for col in 0..=self.map.columns {
                let a = self.cell_rect(Point { row: 0, col }, canvas).left_top();
                let b = self
                    .cell_rect(
                        Point {
                            row: self.map.rows,
                            col,
                        },
                        canvas,
                    )
                    .left_top();
                painter.line_segment([a, b], stroke);
            }
        }
    }

    fn describe_cell(&self, point: Point) -> String {
        let on_path = self
            .pathfinder
            .frame()
            .map(|s| s.path.contains(&point) || s.current == point)
            .unwrap_or(false);

        format!(
            "Cell {}\n{}{}",
            point,
            if self.map.is_passable(point) {
                "open"
            } else {
                "wall"
            },
            if on_path { ", on the current path" } else { "" }
        )
    }
}

impl eframe::App for App {
    /// Called by the frame work to save state before shutdown.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, eframe::APP_KEY, &self.state);
    }

    /// Called each time the UI needs repainting, which may be many times per second.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.add_space(16.0);

                egui::widgets::global_dark_light_mode_buttons(ui);
            });
        });

        egui::SidePanel::left("side_panel").show(ctx, |ui| {
            ui.label("Maze file");
            ui.text_edit_singleline(&mut self.state.maze_path);
            ui.horizontal(|ui| {
                if ui.button("Load").clicked() {
                    self.load_from_path();
                }
                if ui.button("Load Preset").clicked() {
                    self.set_map(preset_map());
                }
            });
            ui.label(format!(
                "{}x{} maze, {} open cells",
                self.map.rows,
                self.map.columns,
                self.map.open_cells()
            ));

            ui.separator();
            ui.checkbox(&mut self.state.draw_grid_lines, "Draw grid lines");

            ui.label("Pathfinder");
            ui.horizontal(|ui| {
                if ui.button("Reset").clicked() {
                    self.reset();
                }
                if ui.button("Step").clicked() {
                    self.pathfinder.step(&self.map);
                }
                if ui.button("Finish").clicked() {
                    self.finish();
                }
            });
            ui.checkbox(&mut self.state.auto_step, "Auto Step");
            ui.add(egui::Slider::new(&mut self.state.delay_ms, 0..=1000).text("delay (ms)"));
            ui.checkbox(&mut self.state.pause_on_press, "Pause while mouse is held");

            ui.separator();
            ui.label(&self.output_cell);

            if let Some(error) = &self.load_error {
                ui.colored_label(Color32::RED, error);
            }
            let status = self.status();
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.label(status);
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let (response, painter) =
                ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
            let canvas = response.rect;

            if self.fit_requested {
                self.camera.fit(
                    Vector2::new(canvas.width(), canvas.height()),
                    self.map.columns,
                    self.map.rows,
                );
                self.fit_requested = false;
            }

            // pan with the secondary button so holding the primary one can pause the search
            if response.dragged_by(egui::PointerButton::Secondary) {
                let delta = response.drag_delta();
                self.camera.pan(Vector2::new(delta.x, delta.y));
            }

            if let Some(hover) = response.hover_pos() {
                let (scroll, zoom) = ui.input(|i| (i.smooth_scroll_delta.y, i.zoom_delta()));
                let factor = zoom * (1.0 + scroll / 500.0);
                if factor != 1.0 {
                    self.camera.zoom_at(
                        Point2::new(hover.x - canvas.left(), hover.y - canvas.top()),
                        factor,
                    );
                }

                if let Some(point) = self.point_at(hover, canvas) {
                    self.output_cell = self.describe_cell(point);
                }
            }

            let paused = self.state.pause_on_press
                && response.is_pointer_button_down_on()
                && ui.input(|i| i.pointer.primary_down());
            self.auto_step(ctx, paused);

            self.draw_maze(&painter, canvas);
        });
    }
}
