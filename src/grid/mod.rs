//! Построение нерегулярной сетки
//!
//! Первичная сетка (`Grid`) — слегка «дрожащая» регулярная решётка точек,
//! окружённая кольцом граничных точек. Её ячейки адресуются и как ячейки
//! Вороного, и как клетки решётки `cells_x × cells_y` (нужно для инверсии
//! рельефа и климата по строкам). Уточнённая сетка строится модулем [`pack`].

pub mod pack;
pub mod voronoi;

use rand::Rng;
use serde::Serialize;

use crate::error::{MapError, Result};
use crate::random::round_to;

pub use pack::Pack;
pub use voronoi::{Cells, Mesh, NO_VERTEX, Point, Vertices};

/// Доля радиуса ячейки, на которую может сдвинуться точка решётки.
const JITTER_FACTOR: f64 = 0.9;

/// Первичная сетка.
#[derive(Debug, Clone, Serialize)]
pub struct Grid {
    pub width: f64,
    pub height: f64,
    /// Запрошенное число ячеек
    pub cells_desired: usize,
    /// Шаг решётки
    pub spacing: f64,
    pub cells_x: usize,
    pub cells_y: usize,
    /// Точки, ограничивающие триангуляцию (не ячейки)
    pub boundary: Vec<Point>,
    pub mesh: Mesh,
}

impl Grid {
    /// Размещает точки и строит сетку Вороного.
    pub fn generate<R: Rng + ?Sized>(
        width: f64,
        height: f64,
        cells_desired: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if cells_desired == 0 || !(width > 0.0 && height > 0.0) {
            return Err(MapError::Configuration(format!(
                "холст {width}×{height} и {cells_desired} ячеек"
            )));
        }
        let spacing = round_to((width * height / cells_desired as f64).sqrt(), 2);
        let cells_x = ((width + 0.5 * spacing - 1e-10) / spacing).floor() as usize;
        let cells_y = ((height + 0.5 * spacing - 1e-10) / spacing).floor() as usize;
        if cells_x < 2 || cells_y < 2 {
            return Err(MapError::Configuration(format!(
                "решётка {cells_x}×{cells_y} слишком мала"
            )));
        }

        let boundary = boundary_points(width, height, spacing);
        let points = jittered_grid(width, height, spacing, cells_x, cells_y, rng);
        let mesh = Mesh::build(&points, &boundary)?;
        log::debug!(
            "сетка: {} ячеек ({cells_x}×{cells_y}), шаг {spacing}",
            mesh.len()
        );

        Ok(Self {
            width,
            height,
            cells_desired,
            spacing,
            cells_x,
            cells_y,
            boundary,
            mesh,
        })
    }

    /// Клетка решётки, в которую попадает точка холста.
    #[must_use]
    pub fn find_cell(&self, x: f64, y: f64) -> usize {
        let col = (x / self.spacing).min(self.cells_x as f64 - 1.0).max(0.0) as usize;
        let row = (y / self.spacing).min(self.cells_y as f64 - 1.0).max(0.0) as usize;
        row * self.cells_x + col
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mesh.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mesh.is_empty()
    }
}

/// Точки по периметру холста, вынесенные наружу на один шаг.
fn boundary_points(width: f64, height: f64, spacing: f64) -> Vec<Point> {
    let offset = (-spacing).round();
    let b_spacing = spacing * 2.0;
    let w = width - offset * 2.0;
    let h = height - offset * 2.0;
    let number_x = ((w / b_spacing).ceil() - 1.0).max(1.0);
    let number_y = ((h / b_spacing).ceil() - 1.0).max(1.0);

    let mut points = Vec::new();
    let mut i = 0.5;
    while i < number_x {
        let x = (w * i / number_x + offset).ceil();
        points.push(Point::new(x, offset));
        points.push(Point::new(x, h + offset));
        i += 1.0;
    }
    let mut i = 0.5;
    while i < number_y {
        let y = (h * i / number_y + offset).ceil();
        points.push(Point::new(offset, y));
        points.push(Point::new(w + offset, y));
        i += 1.0;
    }
    points
}

/// Регулярная решётка с шагом `spacing`, каждая точка сдвинута случайно.
///
/// Точки идут строками, поэтому индекс ячейки равен `row * cells_x + col`.
fn jittered_grid<R: Rng + ?Sized>(
    width: f64,
    height: f64,
    spacing: f64,
    cells_x: usize,
    cells_y: usize,
    rng: &mut R,
) -> Vec<Point> {
    let radius = spacing / 2.0;
    let jittering = radius * JITTER_FACTOR;
    let mut jitter = || rng.r#gen::<f64>() * jittering * 2.0 - jittering;

    let mut points = Vec::with_capacity(cells_x * cells_y);
    for row in 0..cells_y {
        let y = radius + row as f64 * spacing;
        for col in 0..cells_x {
            let x = radius + col as f64 * spacing;
            let xj = round_to(x + jitter(), 2).clamp(0.0, width);
            let yj = round_to(y + jitter(), 2).clamp(0.0, height);
            points.push(Point::new(xj, yj));
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::rng_from_seed;

    #[test]
    fn lattice_matches_cell_count() {
        let mut rng = rng_from_seed("grid");
        let grid = Grid::generate(800.0, 600.0, 1000, &mut rng).unwrap();
        assert_eq!(grid.len(), grid.cells_x * grid.cells_y);
        assert!((grid.len() as f64 - 1000.0).abs() < 100.0);
    }

    #[test]
    fn points_stay_on_canvas() {
        let mut rng = rng_from_seed("bounds");
        let grid = Grid::generate(400.0, 300.0, 500, &mut rng).unwrap();
        for p in &grid.mesh.cells.points {
            assert!((0.0..=400.0).contains(&p.x));
            assert!((0.0..=300.0).contains(&p.y));
        }
    }

    #[test]
    fn find_cell_hits_own_lattice_slot() {
        let mut rng = rng_from_seed("find");
        let grid = Grid::generate(800.0, 600.0, 1000, &mut rng).unwrap();
        let col = 7;
        let row = 5;
        let x = (col as f64 + 0.5) * grid.spacing;
        let y = (row as f64 + 0.5) * grid.spacing;
        assert_eq!(grid.find_cell(x, y), row * grid.cells_x + col);
    }

    #[test]
    fn only_outer_ring_touches_border() {
        let mut rng = rng_from_seed("ring");
        let grid = Grid::generate(800.0, 600.0, 1000, &mut rng).unwrap();
        let center = grid.find_cell(400.0, 300.0);
        assert!(!grid.mesh.cells.border[center]);
        assert!(grid.mesh.cells.border.iter().any(|&b| b));
    }

    #[test]
    fn rejects_empty_canvas() {
        let mut rng = rng_from_seed("bad");
        assert!(matches!(
            Grid::generate(0.0, 600.0, 1000, &mut rng),
            Err(MapError::Configuration(_))
        ));
    }
}
