//! Генерация карты высот по рецепту инструментов
//!
//! Высоты — целые числа 0..=100 на ячейках первичной сетки, суша начинается
//! с 20. Рецепт — упорядоченный список [`HeightmapStep`]; каждый шаг
//! выполняется своей функцией над общим массивом высот.
//!
//! ## Инструменты
//! - **Hill / Pit** — «капля», расходящаяся по соседям в ширину с затуханием
//!   `delta^blobPower`
//! - **Range / Trough** — хребет или долина вдоль жадного пути между двумя точками
//! - **Strait** — пролив поперёк всего холста
//! - **Mask** — эллиптическое затухание к краям (или к центру)
//! - **Add / Multiply** — сдвиг и масштаб в полосе высот
//! - **Smooth** — усреднение с соседями
//! - **Invert** — зеркальное отражение по строкам/столбцам решётки

pub mod step;
pub mod templates;

use std::collections::VecDeque;

use rand::Rng;

use crate::grid::Grid;
use crate::random::chance;

pub use step::{Amount, HeightBand, HeightmapStep, InvertAxis, Span, StraitDirection, parse_recipe};
pub use templates::Template;

/// Сколько раз ищется подходящая стартовая точка.
const MAX_PLACEMENT_ATTEMPTS: usize = 50;
/// Выше этого значения холм не начинается (если удаётся найти место).
const HILL_START_LIMIT: f64 = 90.0;
/// Каждая N-я клетка хребта порождает отрог.
const SPUR_INTERVAL: usize = 6;

/// Затухание «капли» по числу ячеек.
const BLOB_POWER: [(usize, f64); 13] = [
    (1_000, 0.93),
    (2_000, 0.95),
    (5_000, 0.97),
    (10_000, 0.98),
    (20_000, 0.99),
    (30_000, 0.991),
    (40_000, 0.993),
    (50_000, 0.994),
    (60_000, 0.995),
    (70_000, 0.9955),
    (80_000, 0.996),
    (90_000, 0.9964),
    (100_000, 0.9973),
];

/// Затухание хребтов по числу ячеек.
const LINE_POWER: [(usize, f64); 13] = [
    (1_000, 0.75),
    (2_000, 0.77),
    (5_000, 0.79),
    (10_000, 0.81),
    (20_000, 0.82),
    (30_000, 0.83),
    (40_000, 0.84),
    (50_000, 0.86),
    (60_000, 0.87),
    (70_000, 0.88),
    (80_000, 0.91),
    (90_000, 0.92),
    (100_000, 0.93),
];

fn nearest_power(table: &[(usize, f64)], cells: usize) -> f64 {
    table
        .iter()
        .min_by_key(|(bucket, _)| bucket.abs_diff(cells))
        .map_or(1.0, |&(_, power)| power)
}

/// Ограничение высоты диапазоном 0..=100 с отбрасыванием дробной части.
fn lim(value: f64) -> u8 {
    value.clamp(0.0, 100.0) as u8
}

/// Исполнитель рецепта над высотами первичной сетки.
pub struct HeightmapEngine<'a> {
    grid: &'a Grid,
    heights: Vec<u8>,
    blob_power: f64,
    line_power: f64,
    exhausted_searches: usize,
}

impl<'a> HeightmapEngine<'a> {
    /// Плоское дно (все высоты 0).
    #[must_use]
    pub fn new(grid: &'a Grid) -> Self {
        Self::with_heights(grid, vec![0; grid.len()])
    }

    #[must_use]
    pub fn with_heights(grid: &'a Grid, heights: Vec<u8>) -> Self {
        Self {
            grid,
            heights,
            blob_power: nearest_power(&BLOB_POWER, grid.cells_desired),
            line_power: nearest_power(&LINE_POWER, grid.cells_desired),
            exhausted_searches: 0,
        }
    }

    #[must_use]
    pub fn heights(&self) -> &[u8] {
        &self.heights
    }

    #[must_use]
    pub fn into_heights(self) -> Vec<u8> {
        self.heights
    }

    /// Сколько раз поиск стартовой точки упёрся в лимит попыток.
    #[must_use]
    pub fn exhausted_searches(&self) -> usize {
        self.exhausted_searches
    }

    /// Выполняет рецепт целиком.
    pub fn run<R: Rng + ?Sized>(&mut self, recipe: &[HeightmapStep], rng: &mut R) {
        for step in recipe {
            self.apply(step, rng);
        }
    }

    pub fn apply<R: Rng + ?Sized>(&mut self, step: &HeightmapStep, rng: &mut R) {
        match *step {
            HeightmapStep::Hill { count, height, x, y } => {
                for _ in 0..count.resolve(rng) as usize {
                    self.add_hill(height, x, y, rng);
                }
            }
            HeightmapStep::Pit { count, height, x, y } => {
                for _ in 0..count.resolve(rng) as usize {
                    self.add_pit(height, x, y, rng);
                }
            }
            HeightmapStep::Range { count, height, x, y } => {
                for _ in 0..count.resolve(rng) as usize {
                    self.add_range(height, x, y, rng);
                }
            }
            HeightmapStep::Trough { count, height, x, y } => {
                for _ in 0..count.resolve(rng) as usize {
                    self.add_trough(height, x, y, rng);
                }
            }
            HeightmapStep::Strait { width, direction } => self.add_strait(width, direction, rng),
            HeightmapStep::Mask { power } => self.mask(power),
            HeightmapStep::Invert { probability, axis } => self.invert(probability, axis, rng),
            HeightmapStep::Add { value, band } => self.modify(band, value, 1.0),
            HeightmapStep::Multiply { factor, band } => self.modify(band, 0.0, factor),
            HeightmapStep::Smooth { power } => self.smooth(power),
        }
        log::trace!("шаг {step}: суша {} ячеек", self.land_cells());
    }

    fn land_cells(&self) -> usize {
        self.heights.iter().filter(|&&h| h >= 20).count()
    }

    /// Ищет стартовую клетку в прямоугольнике; `violation` равно нулю для
    /// подходящей клетки. После исчерпания попыток берётся наименее плохая.
    fn pick_start<R: Rng + ?Sized>(
        &mut self,
        x: Span,
        y: Span,
        rng: &mut R,
        violation: impl Fn(u8) -> f64,
    ) -> usize {
        let mut best = (f64::INFINITY, 0);
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let cell = self.grid.find_cell(
                x.pick(self.grid.width, rng),
                y.pick(self.grid.height, rng),
            );
            let v = violation(self.heights[cell]);
            if v <= 0.0 {
                return cell;
            }
            if v < best.0 {
                best = (v, cell);
            }
        }
        self.exhausted_searches += 1;
        best.1
    }

    fn add_hill<R: Rng + ?Sized>(&mut self, height: Amount, x: Span, y: Span, rng: &mut R) {
        let grid = self.grid;
        let h = f64::from(lim(height.resolve(rng)));
        let start = self.pick_start(x, y, rng, |current| {
            f64::from(current) + h - HILL_START_LIMIT
        });

        // слои обхода в ширину: каждая ячейка ниже всех соседок предыдущего слоя
        let n = self.heights.len();
        let mut change = vec![0u8; n];
        let mut layer = vec![usize::MAX; n];
        change[start] = h as u8;
        layer[start] = 0;
        let mut queue = VecDeque::from([start]);
        while let Some(q) = queue.pop_front() {
            let parent = change[q];
            for &c in &grid.mesh.cells.neighbors[q] {
                if layer[c] == usize::MAX {
                    layer[c] = layer[q] + 1;
                    if parent > 1 {
                        let p = f64::from(parent);
                        let next = p.powf(self.blob_power) * (rng.r#gen::<f64>() * 0.2 + 0.9);
                        change[c] = next.min(p - 1.0).max(0.0) as u8;
                    }
                    queue.push_back(c);
                } else if layer[c] == layer[q] + 1 {
                    change[c] = change[c].min(parent.saturating_sub(1));
                }
            }
        }

        for (h, &delta) in self.heights.iter_mut().zip(&change) {
            *h = lim(f64::from(*h) + f64::from(delta));
        }
    }

    fn add_pit<R: Rng + ?Sized>(&mut self, height: Amount, x: Span, y: Span, rng: &mut R) {
        let grid = self.grid;
        let mut h = f64::from(lim(height.resolve(rng)));
        let start = self.pick_start(x, y, rng, |current| 20.0 - f64::from(current));

        let mut used = vec![false; self.heights.len()];
        let mut queue = VecDeque::from([start]);
        while let Some(q) = queue.pop_front() {
            h = h.powf(self.blob_power) * (rng.r#gen::<f64>() * 0.2 + 0.9);
            if h < 1.0 {
                return;
            }
            for &c in &grid.mesh.cells.neighbors[q] {
                if used[c] {
                    continue;
                }
                let drop = h * (rng.r#gen::<f64>() * 0.2 + 0.9);
                self.heights[c] = lim(f64::from(self.heights[c]) - drop);
                used[c] = true;
                queue.push_back(c);
            }
        }
    }

    /// Конечная точка хребта: ближе к центру холста, на расстоянии
    /// `[width/8, width/max_divisor]` от старта.
    fn ridge_end<R: Rng + ?Sized>(
        &mut self,
        start_x: f64,
        start_y: f64,
        max_divisor: f64,
        rng: &mut R,
    ) -> usize {
        let (w, h) = (self.grid.width, self.grid.height);
        let mut end = (0.0, 0.0);
        let mut found = false;
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            end = (
                rng.r#gen::<f64>() * w * 0.8 + w * 0.1,
                rng.r#gen::<f64>() * h * 0.7 + h * 0.15,
            );
            let dist = (end.1 - start_y).abs() + (end.0 - start_x).abs();
            if dist >= w / 8.0 && dist <= w / max_divisor {
                found = true;
                break;
            }
        }
        if !found {
            self.exhausted_searches += 1;
        }
        self.grid.find_cell(end.0, end.1)
    }

    fn add_range<R: Rng + ?Sized>(&mut self, height: Amount, x: Span, y: Span, rng: &mut R) {
        let h = f64::from(lim(height.resolve(rng)));
        let start_x = x.pick(self.grid.width, rng);
        let start_y = y.pick(self.grid.height, rng);
        let end = self.ridge_end(start_x, start_y, 3.0, rng);
        let start = self.grid.find_cell(start_x, start_y);

        let mut used = vec![false; self.heights.len()];
        let ridge = self.ridge_path(start, end, &mut used, 0.85, rng);
        let depth = self.raise_ridge(&ridge, h, 1.0, &mut used, rng);
        self.add_spurs(&ridge, depth);
    }

    fn add_trough<R: Rng + ?Sized>(&mut self, height: Amount, x: Span, y: Span, rng: &mut R) {
        let h = f64::from(lim(height.resolve(rng)));
        let mut best = (f64::INFINITY, (0.0, 0.0, 0));
        let mut found = None;
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let sx = x.pick(self.grid.width, rng);
            let sy = y.pick(self.grid.height, rng);
            let cell = self.grid.find_cell(sx, sy);
            let violation = 20.0 - f64::from(self.heights[cell]);
            if violation <= 0.0 {
                found = Some((sx, sy, cell));
                break;
            }
            if violation < best.0 {
                best = (violation, (sx, sy, cell));
            }
        }
        let (start_x, start_y, start) = found.unwrap_or_else(|| {
            self.exhausted_searches += 1;
            best.1
        });
        let end = self.ridge_end(start_x, start_y, 2.0, rng);

        let mut used = vec![false; self.heights.len()];
        let valley = self.ridge_path(start, end, &mut used, 0.8, rng);
        let depth = self.raise_ridge(&valley, h, -1.0, &mut used, rng);
        self.add_spurs(&valley, depth);
    }

    /// Жадный путь к `end`: на каждом шаге сосед, ближайший к цели; иногда
    /// расстояние кандидата делится пополам для извилистости.
    fn ridge_path<R: Rng + ?Sized>(
        &self,
        start: usize,
        end: usize,
        used: &mut [bool],
        straightness: f64,
        rng: &mut R,
    ) -> Vec<usize> {
        let cells = &self.grid.mesh.cells;
        let target = cells.points[end];
        let mut cur = start;
        let mut path = vec![cur];
        used[cur] = true;
        while cur != end {
            let mut min = f64::INFINITY;
            for &e in &cells.neighbors[cur] {
                if used[e] {
                    continue;
                }
                let mut diff = target.dist2(cells.points[e]);
                if rng.r#gen::<f64>() > straightness {
                    diff /= 2.0;
                }
                if diff < min {
                    min = diff;
                    cur = e;
                }
            }
            if min.is_infinite() {
                break;
            }
            path.push(cur);
            used[cur] = true;
        }
        path
    }

    /// Поднимает (`sign = 1`) или опускает (`sign = -1`) путь и кольца вокруг
    /// него. Возвращает число обработанных колец.
    fn raise_ridge<R: Rng + ?Sized>(
        &mut self,
        path: &[usize],
        mut h: f64,
        sign: f64,
        used: &mut [bool],
        rng: &mut R,
    ) -> usize {
        let grid = self.grid;
        let mut queue = path.to_vec();
        let mut depth = 0;
        while !queue.is_empty() {
            let frontier = std::mem::take(&mut queue);
            depth += 1;
            for &i in &frontier {
                let delta = h * (rng.r#gen::<f64>() * 0.3 + 0.85);
                self.heights[i] = lim(f64::from(self.heights[i]) + sign * delta);
            }
            h = h.powf(self.line_power) - 1.0;
            if h < 2.0 {
                break;
            }
            for &f in &frontier {
                for &i in &grid.mesh.cells.neighbors[f] {
                    if !used[i] {
                        used[i] = true;
                        queue.push(i);
                    }
                }
            }
        }
        depth
    }

    /// Отроги: от каждой шестой клетки пути вниз по склону, смешивая высоты.
    fn add_spurs(&mut self, path: &[usize], depth: usize) {
        let grid = self.grid;
        for &first in path.iter().step_by(SPUR_INTERVAL) {
            let mut cur = first;
            for _ in 0..depth {
                let Some(&lowest) = grid.mesh.cells.neighbors[cur]
                    .iter()
                    .min_by_key(|&&c| self.heights[c])
                else {
                    break;
                };
                let blended =
                    (f64::from(self.heights[cur]) * 2.0 + f64::from(self.heights[lowest])) / 3.0;
                self.heights[lowest] = lim(blended);
                cur = lowest;
            }
        }
    }

    fn add_strait<R: Rng + ?Sized>(
        &mut self,
        width: Amount,
        direction: StraitDirection,
        rng: &mut R,
    ) {
        let grid = self.grid;
        let mut width = width.resolve(rng).min(grid.cells_x as f64 / 3.0);
        if width < 1.0 && chance(rng, width) {
            return;
        }
        let (w, h) = (grid.width, grid.height);
        let vertical = direction == StraitDirection::Vertical;
        let start_x = if vertical {
            (rng.r#gen::<f64>() * w * 0.4 + w * 0.3).floor()
        } else {
            5.0
        };
        let start_y = if vertical {
            5.0
        } else {
            (rng.r#gen::<f64>() * h * 0.4 + h * 0.3).floor()
        };
        let end_x = if vertical {
            (w - start_x - w * 0.1 + rng.r#gen::<f64>() * w * 0.2).floor()
        } else {
            w - 5.0
        };
        let end_y = if vertical {
            h - 5.0
        } else {
            (h - start_y - h * 0.1 + rng.r#gen::<f64>() * h * 0.2).floor()
        };
        let start = grid.find_cell(start_x, start_y);
        let end = grid.find_cell(end_x, end_y);

        // путь без запрета повторов, поэтому длина ограничена числом ячеек
        let cells = &grid.mesh.cells;
        let target = cells.points[end];
        let mut path = Vec::new();
        let mut cur = start;
        while cur != end && path.len() < cells.points.len() {
            let mut min = f64::INFINITY;
            for &e in &cells.neighbors[cur] {
                let mut diff = target.dist2(cells.points[e]);
                if rng.r#gen::<f64>() > 0.8 {
                    diff /= 2.0;
                }
                if diff < min {
                    min = diff;
                    cur = e;
                }
            }
            path.push(cur);
        }

        let mut used = vec![false; self.heights.len()];
        let mut band = Vec::new();
        let step = 0.1 / width;
        while width > 0.0 {
            let exp = 0.9 - step * width;
            for &r in &path {
                for &e in &cells.neighbors[r] {
                    if used[e] {
                        continue;
                    }
                    used[e] = true;
                    band.push(e);
                    let eroded = f64::from(self.heights[e]).powf(exp);
                    self.heights[e] = if eroded > 100.0 { 5 } else { eroded as u8 };
                }
            }
            path.clone_from(&band);
            width -= 1.0;
        }
    }

    fn mask(&mut self, power: f64) {
        let grid = self.grid;
        let fr = if power == 0.0 { 1.0 } else { power.abs() };
        for (h, p) in self.heights.iter_mut().zip(&grid.mesh.cells.points) {
            let nx = 2.0 * p.x / grid.width - 1.0;
            let ny = 2.0 * p.y / grid.height - 1.0;
            let mut distance = (1.0 - nx * nx) * (1.0 - ny * ny);
            if power < 0.0 {
                distance = 1.0 - distance;
            }
            let current = f64::from(*h);
            let masked = current * distance;
            *h = lim((current * (fr - 1.0) + masked) / fr);
        }
    }

    fn modify(&mut self, band: HeightBand, add: f64, mult: f64) {
        let (min, max) = band.bounds();
        let is_land = min == 20.0;
        for h in &mut self.heights {
            let mut value = f64::from(*h);
            if value < min || value > max {
                continue;
            }
            if add != 0.0 {
                value = if is_land {
                    (value + add).max(20.0)
                } else {
                    value + add
                };
            }
            if mult != 1.0 {
                value = if is_land {
                    (value - 20.0) * mult + 20.0
                } else {
                    value * mult
                };
            }
            *h = lim(value);
        }
    }

    fn smooth(&mut self, power: f64) {
        let neighbors = &self.grid.mesh.cells.neighbors;
        let old = self.heights.clone();
        for (i, h) in self.heights.iter_mut().enumerate() {
            let sum: f64 = f64::from(old[i])
                + neighbors[i].iter().map(|&c| f64::from(old[c])).sum::<f64>();
            let mean = sum / (neighbors[i].len() + 1) as f64;
            *h = if power == 1.0 {
                lim(mean)
            } else {
                lim((f64::from(old[i]) * (power - 1.0) + mean) / power)
            };
        }
    }

    fn invert<R: Rng + ?Sized>(&mut self, probability: f64, axis: InvertAxis, rng: &mut R) {
        if !chance(rng, probability) {
            return;
        }
        let invert_x = axis != InvertAxis::Y;
        let invert_y = axis != InvertAxis::X;
        let (cx, cy) = (self.grid.cells_x, self.grid.cells_y);
        let old = self.heights.clone();
        for (i, h) in self.heights.iter_mut().enumerate() {
            let (x, y) = (i % cx, i / cx);
            let nx = if invert_x { cx - x - 1 } else { x };
            let ny = if invert_y { cy - y - 1 } else { y };
            *h = old[nx + ny * cx];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::rng_from_seed;

    fn grid(cells: usize, seed: &str) -> Grid {
        let mut rng = rng_from_seed(seed);
        Grid::generate(800.0, 600.0, cells, &mut rng).unwrap()
    }

    #[test]
    fn power_tables_pick_nearest_bucket() {
        assert_eq!(nearest_power(&BLOB_POWER, 1_000), 0.93);
        assert_eq!(nearest_power(&BLOB_POWER, 9_000), 0.98);
        assert_eq!(nearest_power(&LINE_POWER, 400_000), 0.93);
    }

    #[test]
    fn centered_hill_peaks_and_decays_outward() {
        let grid = grid(1000, "hill");
        let start = grid.find_cell(400.0, 300.0);

        // число шагов от вершины по соседям
        let neighbors = &grid.mesh.cells.neighbors;
        let mut hops = vec![usize::MAX; grid.len()];
        hops[start] = 0;
        let mut queue = VecDeque::from([start]);
        while let Some(q) = queue.pop_front() {
            for &c in &neighbors[q] {
                if hops[c] == usize::MAX {
                    hops[c] = hops[q] + 1;
                    queue.push_back(c);
                }
            }
        }

        for seed in ["hill-step", "hill-2", "hill-3", "hill-4"] {
            let mut engine = HeightmapEngine::new(&grid);
            let step: HeightmapStep = "Hill 1 100 50 50".parse().unwrap();
            let mut rng = rng_from_seed(seed);
            engine.apply(&step, &mut rng);

            let heights = engine.heights();
            assert_eq!(heights[start], 100);
            // на любом кратчайшем пути от вершины высота строго убывает
            for (cell, &h) in heights.iter().enumerate() {
                for &p in &neighbors[cell] {
                    if hops[p] + 1 != hops[cell] {
                        continue;
                    }
                    assert!(
                        heights[p] > h || (heights[p] == 0 && h == 0),
                        "{seed}: {p} (h={}, шаг {}) → {cell} (h={h}, шаг {})",
                        heights[p],
                        hops[p],
                        hops[cell]
                    );
                }
            }
            // на плоском дне холм всегда начинается выше 90, попытки исчерпаны
            assert_eq!(engine.exhausted_searches(), 1);
        }
    }

    #[test]
    fn every_template_keeps_heights_in_bounds() {
        let grid = grid(2000, "bounds");
        for template in Template::ALL {
            let mut engine = HeightmapEngine::new(&grid);
            let mut rng = rng_from_seed(template.name());
            for step in template.recipe().unwrap() {
                engine.apply(&step, &mut rng);
                assert!(
                    engine.heights().iter().all(|&h| h <= 100),
                    "{template}: {step}"
                );
            }
        }
    }

    #[test]
    fn same_seed_same_heights() {
        let grid = grid(2000, "det");
        let recipe = Template::Continents.recipe().unwrap();
        let run = || {
            let mut engine = HeightmapEngine::new(&grid);
            engine.run(&recipe, &mut rng_from_seed("abc"));
            engine.into_heights()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn positive_mask_lowers_edges_more_than_center() {
        let grid = grid(1000, "mask");
        let mut engine = HeightmapEngine::with_heights(&grid, vec![80; grid.len()]);
        engine.apply(&HeightmapStep::Mask { power: 1.0 }, &mut rng_from_seed("m"));
        let center = grid.find_cell(400.0, 300.0);
        let corner = grid.find_cell(0.0, 0.0);
        assert!(engine.heights()[center] > engine.heights()[corner]);
    }

    #[test]
    fn land_band_add_keeps_land_above_sea() {
        let grid = grid(1000, "add");
        let initial: Vec<u8> = (0..grid.len()).map(|i| (i % 60) as u8 + 10).collect();
        let mut engine = HeightmapEngine::with_heights(&grid, initial.clone());
        engine.apply(
            &HeightmapStep::Add {
                value: -30.0,
                band: HeightBand::Land,
            },
            &mut rng_from_seed("a"),
        );
        for (before, after) in initial.iter().zip(engine.heights()) {
            if *before >= 20 {
                assert_eq!(*after, 20);
            } else {
                assert_eq!(before, after);
            }
        }
    }

    #[test]
    fn double_invert_restores_field() {
        let grid = grid(1000, "invert");
        let initial: Vec<u8> = (0..grid.len()).map(|i| (i * 7 % 101) as u8).collect();
        let mut engine = HeightmapEngine::with_heights(&grid, initial.clone());
        let step = HeightmapStep::Invert {
            probability: 1.0,
            axis: InvertAxis::Both,
        };
        let mut rng = rng_from_seed("i");
        engine.apply(&step, &mut rng);
        assert_ne!(engine.heights(), initial.as_slice());
        engine.apply(&step, &mut rng);
        assert_eq!(engine.heights(), initial.as_slice());
    }

    #[test]
    fn smoothing_flat_field_is_identity() {
        let grid = grid(1000, "smooth");
        let mut engine = HeightmapEngine::with_heights(&grid, vec![42; grid.len()]);
        engine.apply(&HeightmapStep::Smooth { power: 1.0 }, &mut rng_from_seed("s"));
        engine.apply(&HeightmapStep::Smooth { power: 3.0 }, &mut rng_from_seed("s"));
        assert!(engine.heights().iter().all(|&h| h == 42));
    }
}
