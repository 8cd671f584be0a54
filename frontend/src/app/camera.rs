use nalgebra::{Point2, Vector2};

/// A camera that can be used to pan and zoom the view. Screen positions are in pixels relative
/// to the top left corner of the canvas, world positions are in cells (x = column, y = row).
pub struct Camera {
    offset: Vector2<f32>,
    scale: f32,
}

impl Camera {
    pub fn new(initial_scale: f32) -> Camera {
        Camera {
            offset: Vector2::zeros(),
            scale: initial_scale,
        }
    }

    pub fn world_to_screen(&self, world: Point2<f32>) -> Point2<f32> {
        (world + self.offset) * self.scale
    }

    pub fn screen_to_world(&self, screen: Point2<f32>) -> Point2<f32> {
        screen / self.scale - self.offset
    }

    /// Pans the camera by the given amount in pixels
    pub fn pan(&mut self, delta: Vector2<f32>) {
        self.offset += delta / self.scale;
    }

    /// Zooms by `factor` while keeping the world position under `at` in place
    pub fn zoom_at(&mut self, at: Point2<f32>, factor: f32) {
        let before = self.screen_to_world(at);
        self.scale = (self.scale * factor).clamp(1.0, 500.0);
        let after = self.screen_to_world(at);
        self.offset += after - before;
    }

    /// Center a `columns` x `rows` maze in a canvas of `size` pixels
    pub fn fit(&mut self, size: Vector2<f32>, columns: usize, rows: usize) {
        let world = Vector2::new(columns.max(1) as f32, rows.max(1) as f32);
        self.scale = (size.x / world.x).min(size.y / world.y).max(1.0);
        self.offset = (size / self.scale - world) / 2.0;
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }
}
