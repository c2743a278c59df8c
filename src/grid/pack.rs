//! Уточнённая сетка («pack»)
//!
//! Глубокий океан выбрасывается, вдоль побережья добавляются середины рёбер —
//! так разрешение повышается там, где оно важно для рек и береговой линии.

use serde::Serialize;

use crate::error::Result;
use crate::features::{COAST_LAND, COAST_WATER, FeatureKind, FeatureMap, LAND_HEIGHT};
use crate::grid::{Grid, Mesh, Point};
use crate::random::round_to;

/// Второе кольцо воды от берега.
const SHALLOW_WATER: i8 = -2;

#[derive(Debug, Clone, Serialize)]
pub struct Pack {
    pub mesh: Mesh,
    /// Ячейка первичной сетки, из которой получена ячейка
    pub grid_ref: Vec<usize>,
    pub heights: Vec<u8>,
    /// Площадь многоугольника ячейки
    pub area: Vec<f64>,
}

impl Pack {
    /// Перестраивает сетку по суше и прибрежной воде первичной сетки.
    pub fn build(grid: &Grid, heights: &[u8], features: &FeatureMap) -> Result<Self> {
        let cells = &grid.mesh.cells;
        let spacing2 = grid.spacing * grid.spacing;

        let mut points = Vec::new();
        let mut grid_ref = Vec::new();
        let mut pack_heights = Vec::new();
        let mut add = |p: Point, g: usize, h: u8| {
            points.push(p);
            grid_ref.push(g);
            pack_heights.push(h);
        };

        for i in 0..grid.len() {
            let height = heights[i];
            let ring = features.distance[i];
            if height < LAND_HEIGHT && ring != COAST_WATER && ring != SHALLOW_WATER {
                continue;
            }
            if ring == SHALLOW_WATER
                && (i % 4 == 0 || features.kind_of(i) == FeatureKind::Lake)
            {
                continue;
            }
            let p = cells.points[i];
            add(p, i, height);

            if (ring == COAST_LAND || ring == COAST_WATER) && !cells.border[i] {
                for &e in &cells.neighbors[i] {
                    if i > e || features.distance[e] != ring {
                        continue;
                    }
                    let q = cells.points[e];
                    if p.dist2(q) < spacing2 {
                        continue;
                    }
                    let mid = Point::new(
                        round_to((p.x + q.x) / 2.0, 1),
                        round_to((p.y + q.y) / 2.0, 1),
                    );
                    add(mid, i, height);
                }
            }
        }

        let mesh = Mesh::build(&points, &grid.boundary)?;
        let area = cell_areas(&mesh);
        log::debug!("уточнённая сетка: {} ячеек", mesh.len());

        Ok(Self {
            mesh,
            grid_ref,
            heights: pack_heights,
            area,
        })
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

fn cell_areas(mesh: &Mesh) -> Vec<f64> {
    let area = |i: usize| crate::features::polygon::area(&mesh.cell_polygon(i)).abs();

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..mesh.len()).into_par_iter().map(area).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..mesh.len()).map(area).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::markup_grid;
    use crate::random::rng_from_seed;

    fn island_grid() -> (Grid, Vec<u8>) {
        let mut rng = rng_from_seed("pack");
        let grid = Grid::generate(800.0, 600.0, 2000, &mut rng).unwrap();
        let heights = grid
            .mesh
            .cells
            .points
            .iter()
            .map(|p| {
                let d = ((p.x - 400.0).powi(2) + (p.y - 300.0).powi(2)).sqrt();
                if d < 150.0 { 50 } else { 5 }
            })
            .collect();
        (grid, heights)
    }

    #[test]
    fn keeps_land_and_drops_deep_ocean() {
        let (grid, heights) = island_grid();
        let features = markup_grid(&grid.mesh, &heights);
        let pack = Pack::build(&grid, &heights, &features).unwrap();

        let grid_land = heights.iter().filter(|&&h| h >= LAND_HEIGHT).count();
        let pack_land = pack.heights.iter().filter(|&&h| h >= LAND_HEIGHT).count();
        assert!(pack_land >= grid_land);
        assert!(pack.len() < grid.len());
        for (i, &g) in pack.grid_ref.iter().enumerate() {
            assert_eq!(pack.heights[i], heights[g]);
        }
    }

    #[test]
    fn areas_are_positive() {
        let (grid, heights) = island_grid();
        let features = markup_grid(&grid.mesh, &heights);
        let pack = Pack::build(&grid, &heights, &features).unwrap();
        assert!(pack.area.iter().all(|&a| a > 0.0));
    }
}
