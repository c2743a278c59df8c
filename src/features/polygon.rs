//! Контуры по вершинам Вороного
//!
//! Граница области обходится по вершинам: из текущей вершины идём к той
//! соседней, ребро к которой разделяет ячейки «своего» и «чужого» типа.

use std::collections::BTreeMap;

use crate::grid::{Mesh, Point};

/// Обходит границу области, начиная с `start`. `same` отвечает, принадлежит
/// ли ячейка (или граничная точка) области; `visit` получает все «свои»
/// ячейки, встреченные по пути.
pub fn connect_vertices(
    mesh: &Mesh,
    start: usize,
    same: impl Fn(usize) -> bool,
    mut visit: impl FnMut(usize),
    close_ring: bool,
) -> Vec<usize> {
    let vertices = &mesh.vertices;
    let max_iterations = vertices.cells.len();
    let mut chain: Vec<usize> = Vec::new();
    let mut next = start;

    for i in 0.. {
        if i > 0 && next == start {
            break;
        }
        let previous = chain.last().copied();
        let current = next;
        chain.push(current);

        let [a, b, c] = vertices.cells[current];
        for cell in [a, b, c] {
            if same(cell) {
                visit(cell);
            }
        }
        let (c1, c2, c3) = (same(a), same(b), same(c));
        let [v1, v2, v3] = vertices.neighbors[current];
        if Some(v1) != previous && c1 != c2 {
            next = v1;
        } else if Some(v2) != previous && c2 != c3 {
            next = v2;
        } else if Some(v3) != previous && c1 != c3 {
            next = v3;
        }

        if next >= vertices.cells.len() {
            log::warn!("обход контура ушёл за оболочку у вершины {current}");
            break;
        }
        if next == current {
            log::warn!("обход контура застрял на вершине {current}");
            break;
        }
        if i == max_iterations {
            log::warn!("обход контура превысил {max_iterations} шагов");
            break;
        }
    }

    if close_ring {
        chain.push(start);
    }
    chain
}

/// Отсечение многоугольника прямоугольником `[0, width] × [0, height]`
/// (Сазерленд — Ходжмен).
#[must_use]
pub fn clip(polygon: &[Point], width: f64, height: f64) -> Vec<Point> {
    #[derive(Clone, Copy)]
    enum Edge {
        Left,
        Right,
        Top,
        Bottom,
    }

    let inside = |p: Point, edge: Edge| match edge {
        Edge::Left => p.x >= 0.0,
        Edge::Right => p.x <= width,
        Edge::Top => p.y >= 0.0,
        Edge::Bottom => p.y <= height,
    };
    let intersect = |a: Point, b: Point, edge: Edge| {
        let along_x = |x: f64| Point::new(x, a.y + (b.y - a.y) * (x - a.x) / (b.x - a.x));
        let along_y = |y: f64| Point::new(a.x + (b.x - a.x) * (y - a.y) / (b.y - a.y), y);
        match edge {
            Edge::Left => along_x(0.0),
            Edge::Right => along_x(width),
            Edge::Top => along_y(0.0),
            Edge::Bottom => along_y(height),
        }
    };

    let mut output = polygon.to_vec();
    for edge in [Edge::Left, Edge::Right, Edge::Top, Edge::Bottom] {
        let Some(&last) = output.last() else {
            break;
        };
        let input = std::mem::take(&mut output);
        let mut prev = last;
        for &p in &input {
            match (inside(p, edge), inside(prev, edge)) {
                (true, true) => output.push(p),
                (true, false) => {
                    output.push(intersect(prev, p, edge));
                    output.push(p);
                }
                (false, true) => output.push(intersect(prev, p, edge)),
                (false, false) => {}
            }
            prev = p;
        }
    }
    output
}

/// Ориентированная площадь многоугольника.
#[must_use]
pub fn area(polygon: &[Point]) -> f64 {
    let Some(&last) = polygon.last() else {
        return 0.0;
    };
    let mut sum = 0.0;
    let mut b = last;
    for &a in polygon {
        sum += b.y * a.x - b.x * a.y;
        b = a;
    }
    sum / 2.0
}

/// Контуры всех классов ячеек: для каждого класса список замкнутых
/// многоугольников. `None` означает «не рисовать».
pub fn isolines<K, F>(mesh: &Mesh, kind_of: F) -> BTreeMap<K, Vec<Vec<Point>>>
where
    K: Ord + Copy,
    F: Fn(usize) -> Option<K>,
{
    let n = mesh.len();
    let kind = |cell: usize| if cell < n { kind_of(cell) } else { None };
    let mut checked = vec![false; n];
    let mut lines: BTreeMap<K, Vec<Vec<Point>>> = BTreeMap::new();

    for cell in 0..n {
        if checked[cell] {
            continue;
        }
        let Some(current) = kind(cell) else {
            continue;
        };
        checked[cell] = true;
        let same = |c: usize| kind(c) == Some(current);
        if mesh.cells.neighbors[cell].iter().all(|&c| same(c)) {
            continue;
        }
        let Some(&start) = mesh.cells.vertices[cell]
            .iter()
            .find(|&&v| mesh.vertices.cells[v].iter().any(|&c| !same(c)))
        else {
            continue;
        };
        let chain = connect_vertices(
            mesh,
            start,
            same,
            |c| {
                if c < n {
                    checked[c] = true;
                }
            },
            true,
        );
        if chain.len() < 3 {
            continue;
        }
        let ring = chain.iter().map(|&v| mesh.vertices.points[v]).collect();
        lines.entry(current).or_default().push(ring);
    }
    lines
}
