//! Двойственная сетка Вороного по триангуляции Делоне
//!
//! Ячейки и вершины ссылаются друг на друга только индексами, поэтому сетка
//! хранится как набор плотных массивов без циклических ссылок.

use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};

/// Вершина отсутствует (ребро выпуклой оболочки).
pub const NO_VERTEX: usize = usize::MAX;

/// Ограничение обхода вокруг точки: у регулярной сетки степень не больше 8–9.
const MAX_EDGES_AROUND_POINT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn dist2(self, other: Point) -> f64 {
        (self.x - other.x).powi(2) + (self.y - other.y).powi(2)
    }
}

/// Ячейки Вороного (по одной на исходную точку, кроме граничных).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cells {
    /// Центры ячеек
    pub points: Vec<Point>,
    /// Упорядоченные вершины многоугольника
    pub vertices: Vec<Vec<usize>>,
    /// Соседние ячейки
    pub neighbors: Vec<Vec<usize>>,
    /// Ячейка касается внешней оболочки (граничных точек)
    pub border: Vec<bool>,
}

/// Вершины Вороного — центры описанных окружностей треугольников.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vertices {
    pub points: Vec<Point>,
    /// Соседние вершины через рёбра треугольника; [`NO_VERTEX`] на оболочке
    pub neighbors: Vec<[usize; 3]>,
    /// Точки треугольника. Индексы `>= cells.len()` — граничные точки, а не ячейки.
    pub cells: Vec<[usize; 3]>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub cells: Cells,
    pub vertices: Vertices,
}

impl Mesh {
    /// Строит сетку по реальным точкам `points` и ограничивающим `boundary`.
    ///
    /// Граничные точки участвуют только в триангуляции: в ячейки они не
    /// попадают, а в списках соседей отфильтровываются.
    pub fn build(points: &[Point], boundary: &[Point]) -> Result<Self> {
        let all: Vec<delaunator::Point> = points
            .iter()
            .chain(boundary)
            .map(|p| delaunator::Point { x: p.x, y: p.y })
            .collect();
        let triangulation = delaunator::triangulate(&all);
        if triangulation.triangles.is_empty() {
            return Err(MapError::Geometry { points: all.len() });
        }

        let triangles = &triangulation.triangles;
        let halfedges = &triangulation.halfedges;
        let n = points.len();
        let triangle_count = triangles.len() / 3;

        let mut cells = Cells {
            points: points.to_vec(),
            vertices: vec![Vec::new(); n],
            neighbors: vec![Vec::new(); n],
            border: vec![false; n],
        };
        let mut done = vec![false; n];
        let mut vertices = Vertices {
            points: vec![Point::default(); triangle_count],
            neighbors: vec![[NO_VERTEX; 3]; triangle_count],
            cells: vec![[0; 3]; triangle_count],
        };

        for e in 0..triangles.len() {
            let p = triangles[next_halfedge(e)];
            if p < n && !done[p] {
                let edges = edges_around_point(halfedges, e);
                cells.vertices[p] = edges.iter().map(|&e| triangle_of_edge(e)).collect();
                cells.neighbors[p] = edges
                    .iter()
                    .map(|&e| triangles[e])
                    .filter(|&c| c < n)
                    .collect();
                cells.border[p] = edges.len() > cells.neighbors[p].len();
                done[p] = true;
            }
        }

        for t in 0..triangle_count {
            let corners = [triangles[3 * t], triangles[3 * t + 1], triangles[3 * t + 2]];
            vertices.points[t] = circumcenter(
                all_point(&all, corners[0]),
                all_point(&all, corners[1]),
                all_point(&all, corners[2]),
            );
            vertices.cells[t] = corners;
            for (k, edge) in (3 * t..3 * t + 3).enumerate() {
                let opposite = halfedges[edge];
                vertices.neighbors[t][k] = if opposite == delaunator::EMPTY {
                    NO_VERTEX
                } else {
                    triangle_of_edge(opposite)
                };
            }
        }

        Ok(Self { cells, vertices })
    }

    /// Число реальных ячеек.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.points.is_empty()
    }

    /// Многоугольник ячейки в координатах холста.
    #[must_use]
    pub fn cell_polygon(&self, cell: usize) -> Vec<Point> {
        self.cells.vertices[cell]
            .iter()
            .map(|&v| self.vertices.points[v])
            .collect()
    }
}

fn all_point(all: &[delaunator::Point], i: usize) -> Point {
    Point::new(all[i].x, all[i].y)
}

fn next_halfedge(e: usize) -> usize {
    if e % 3 == 2 { e - 2 } else { e + 1 }
}

fn triangle_of_edge(e: usize) -> usize {
    e / 3
}

/// Входящие полурёбра вокруг точки, в которую ведёт `start`.
fn edges_around_point(halfedges: &[usize], start: usize) -> Vec<usize> {
    let mut result = Vec::new();
    let mut incoming = start;
    loop {
        result.push(incoming);
        let outgoing = next_halfedge(incoming);
        incoming = halfedges[outgoing];
        if incoming == delaunator::EMPTY
            || incoming == start
            || result.len() >= MAX_EDGES_AROUND_POINT
        {
            break;
        }
    }
    result
}

fn circumcenter(a: Point, b: Point, c: Point) -> Point {
    let ad = a.x * a.x + a.y * a.y;
    let bd = b.x * b.x + b.y * b.y;
    let cd = c.x * c.x + c.y * c.y;
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    Point::new(
        (ad * (b.y - c.y) + bd * (c.y - a.y) + cd * (a.y - b.y)) / d,
        (ad * (c.x - b.x) + bd * (a.x - c.x) + cd * (b.x - a.x)) / d,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mesh() -> Mesh {
        // 3×3 решётка в окружении граничных точек
        let points: Vec<Point> = (0..3)
            .flat_map(|y| {
                (0..3).map(move |x| {
                    let (x, y) = (f64::from(x), f64::from(y));
                    Point::new(10.0 + 10.0 * x + 0.1 * y, 10.0 + 10.0 * y)
                })
            })
            .collect();
        let boundary = vec![
            Point::new(-10.0, -10.0),
            Point::new(25.0, -12.0),
            Point::new(60.0, -10.0),
            Point::new(62.0, 25.0),
            Point::new(60.0, 60.0),
            Point::new(25.0, 62.0),
            Point::new(-10.0, 60.0),
            Point::new(-12.0, 25.0),
        ];
        Mesh::build(&points, &boundary).unwrap()
    }

    #[test]
    fn adjacency_is_symmetric() {
        let mesh = square_mesh();
        for (c, neighbors) in mesh.cells.neighbors.iter().enumerate() {
            for &n in neighbors {
                assert!(mesh.cells.neighbors[n].contains(&c), "{c} -> {n}");
            }
        }
    }

    #[test]
    fn center_cell_is_interior() {
        let mesh = square_mesh();
        assert!(!mesh.cells.border[4]);
        assert!(mesh.cells.border[0]);
        assert_eq!(mesh.cells.neighbors[4].len(), mesh.cells.vertices[4].len());
    }

    #[test]
    fn vertices_reference_their_cells() {
        let mesh = square_mesh();
        for (c, vs) in mesh.cells.vertices.iter().enumerate() {
            for &v in vs {
                assert!(mesh.vertices.cells[v].contains(&c));
            }
        }
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let points: Vec<Point> = (0..5).map(|i| Point::new(f64::from(i), 0.0)).collect();
        assert!(matches!(
            Mesh::build(&points, &[]),
            Err(MapError::Geometry { points: 5 })
        ));
    }
}
