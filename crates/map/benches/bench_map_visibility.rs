use std::cell::RefCell;
use std::hint::black_box;
use std::rc::Rc;
use std::time::Instant;

use glam::{Vec2, Vec3};
use tessera_common::{Camera, Projection, Tile, TileCoordsMapper};
use tessera_map::{
    CameraVisibility, CameraVisibilityOptions, MapLayer, RectangularVisibility, TileRenderer,
    VisibilityStrategy,
};

#[derive(Default)]
struct CountingRenderer {
    live: usize,
}

impl TileRenderer for CountingRenderer {
    fn add_tile(&mut self, _tile: &Tile) {
        self.live += 1;
    }
    fn reuse_tile(&mut self, _tile: &Tile) {}
    fn remove_tile(&mut self, _tile: &Tile) {
        self.live -= 1;
    }
}

fn bench_rectangular_pan(view: f32, iterations: usize) {
    let mut layer = MapLayer::new(1.0, 1.0).unwrap();
    layer.set_visibility(Box::new(RectangularVisibility::new(view, view).unwrap()));
    layer.add_renderer(Rc::new(RefCell::new(CountingRenderer::default())));

    let start = Instant::now();
    for i in 0..iterations {
        layer.set_center(Vec2::new(i as f32 * 0.37, (i as f32 * 0.11).sin() * 8.0));
        black_box(layer.update());
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  rectangular pan ({view}x{view}, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn camera(height: f32, far: f32) -> Rc<RefCell<Camera>> {
    let projection = Projection::Perspective {
        fov_y: 60f32.to_radians(),
        aspect: 16.0 / 9.0,
        near: 0.1,
        far,
    };
    Rc::new(RefCell::new(
        Camera::new(Vec3::new(0.0, height, height * 0.75), projection).looking_at(Vec3::ZERO),
    ))
}

fn bench_camera_walk(height: f32, iterations: usize) {
    let cam = camera(height, height * 4.0);
    let mut vis = CameraVisibility::new(&cam, CameraVisibilityOptions::default()).unwrap();
    let mapper = TileCoordsMapper::new(1.0, 1.0).unwrap();
    let mut tiles = Vec::new();

    let start = Instant::now();
    for i in 0..iterations {
        cam.borrow_mut().position.x = i as f32 * 0.5;
        if let Some(result) = vis.compute_visible_tiles(&tiles, Vec2::ZERO, &mapper, None) {
            tiles = result.tiles;
        }
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  camera walk (height {height}, {} tiles, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}",
        tiles.len()
    );
}

fn bench_camera_unchanged(iterations: usize) {
    let cam = camera(20.0, 80.0);
    let mut vis = CameraVisibility::new(&cam, CameraVisibilityOptions::default()).unwrap();
    let mapper = TileCoordsMapper::new(1.0, 1.0).unwrap();
    let tiles = vis
        .compute_visible_tiles(&[], Vec2::ZERO, &mapper, None)
        .map(|r| r.tiles)
        .unwrap_or_default();

    let start = Instant::now();
    for _ in 0..iterations {
        let _ = black_box(vis.compute_visible_tiles(black_box(&tiles), Vec2::ZERO, &mapper, None));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  camera short-circuit ({} tiles, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}",
        tiles.len()
    );
}

fn main() {
    println!("=== Map Visibility Benchmarks ===\n");

    println!("Rectangular layer pan:");
    bench_rectangular_pan(16.0, 10000);
    bench_rectangular_pan(64.0, 1000);
    bench_rectangular_pan(256.0, 100);

    println!("\nCamera frustum walk:");
    bench_camera_walk(10.0, 1000);
    bench_camera_walk(30.0, 100);

    println!("\nCamera dependency cache:");
    bench_camera_unchanged(10000);

    println!("\n=== Done ===");
}
