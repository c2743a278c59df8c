//! Сток воды и реки
//!
//! Ячейки суши обходятся от высоких к низким; каждая добавляет свои осадки
//! к потоку и передаёт его самой низкой соседке. Где поток достаточно
//! велик, появляется река; при слиянии имя сохраняет более полноводная.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::features::{FeatureKind, FeatureMap, LAND_HEIGHT};
use crate::grid::Mesh;

use super::depressions::drain_height;

/// Меньший поток не образует реку.
pub const MIN_FLUX_TO_FORM_RIVER: f64 = 30.0;
/// Реки короче не сохраняются.
const MIN_RIVER_CELLS: usize = 3;
/// Маркер «река ушла за край холста» в списке ячеек.
const OFF_MAP: usize = usize::MAX;

const FLUX_FACTOR: f64 = 500.0;
const MAX_FLUX_WIDTH: f64 = 1.0;
const LENGTH_FACTOR: f64 = 200.0;
const LENGTH_PROGRESSION: [f64; 9] = [1.0, 1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0];
const MAIN_STEM_FACTOR: f64 = 1.2;

/// Эрозия только выше этой высоты.
const DOWNCUT_MIN_HEIGHT: u8 = 35;
const MAX_DOWNCUT: u8 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct River {
    pub id: usize,
    pub source: usize,
    pub mouth: usize,
    /// Река, в которую впадает эта (`0` — впадает в море или озеро)
    pub parent: usize,
    /// Корневая река бассейна
    pub basin: usize,
    /// Ячейки от истока; последняя — водоём, куда впадает река
    pub cells: Vec<usize>,
    /// Расход в устье
    pub discharge: f64,
    pub length: f64,
    pub width: f64,
    pub source_width: f64,
    pub width_factor: f64,
    /// Река уходит за край холста
    pub exits_border: bool,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn source_width(flux: f64) -> f64 {
    round2((flux.powf(0.9) / FLUX_FACTOR).min(MAX_FLUX_WIDTH))
}

/// Полуширина русла в точке `index` от истока.
fn width_offset(flux: f64, index: usize, width_factor: f64, starting_width: f64) -> f64 {
    if index == 0 {
        return starting_width;
    }
    let flux_width = (flux.powf(0.7) / FLUX_FACTOR).min(MAX_FLUX_WIDTH);
    let progression = LENGTH_PROGRESSION
        .get(index)
        .or(LENGTH_PROGRESSION.last())
        .copied()
        .unwrap_or_default();
    let length_width = index as f64 / LENGTH_FACTOR + progression / LENGTH_FACTOR;
    width_factor * (length_width + flux_width) + starting_width
}

/// Состояние стока на время обхода.
pub(crate) struct Drainage<'a> {
    mesh: &'a Mesh,
    h: &'a [f64],
    pub flux: Vec<f64>,
    river_of: Vec<usize>,
    confluence: Vec<f64>,
    river_cells: BTreeMap<usize, Vec<usize>>,
    parents: HashMap<usize, usize>,
    /// Для озера: главная впадающая река и её поток
    lake_inflow: HashMap<usize, (usize, f64)>,
    next_river: usize,
}

impl<'a> Drainage<'a> {
    pub fn new(mesh: &'a Mesh, h: &'a [f64]) -> Self {
        let n = mesh.len();
        Self {
            mesh,
            h,
            flux: vec![0.0; n],
            river_of: vec![0; n],
            confluence: vec![0.0; n],
            river_cells: BTreeMap::new(),
            parents: HashMap::new(),
            lake_inflow: HashMap::new(),
            next_river: 1,
        }
    }

    fn is_land(&self, cell: usize) -> bool {
        self.h[cell] >= f64::from(LAND_HEIGHT)
    }

    fn add_cell(&mut self, river: usize, cell: usize) {
        self.river_cells.entry(river).or_default().push(cell);
    }

    fn new_river(&mut self, cell: usize) -> usize {
        let id = self.next_river;
        self.next_river += 1;
        self.river_of[cell] = id;
        self.add_cell(id, cell);
        id
    }

    /// Самая низкая из ячеек; озёра сравниваются по уровню воды.
    fn lowest(&self, map: &FeatureMap, cells: impl Iterator<Item = usize>) -> Option<usize> {
        cells.min_by(|&a, &b| {
            drain_height(map, self.h, a).total_cmp(&drain_height(map, self.h, b))
        })
    }

    /// Обходит сушу сверху вниз. `out_cells[i]` — озёра, вытекающие через `i`.
    pub fn drain_water(
        &mut self,
        map: &mut FeatureMap,
        prec: &[u8],
        out_cells: &[Vec<usize>],
        cells_desired: usize,
    ) {
        let mesh = self.mesh;
        let cells_modifier = (cells_desired as f64 / 10_000.0).powf(0.25);
        let mut land: Vec<usize> = (0..mesh.len()).filter(|&i| self.is_land(i)).collect();
        land.sort_by(|&a, &b| self.h[b].total_cmp(&self.h[a]));

        for i in land {
            self.flux[i] += f64::from(prec[i]) / cells_modifier;

            let draining: Vec<usize> = out_cells[i]
                .iter()
                .copied()
                .filter(|&id| {
                    // вода не вытекает через берег выше своего уровня
                    map.feature(id)
                        .lake
                        .as_ref()
                        .is_some_and(|lake| {
                            lake.flux > lake.evaporation && lake.height >= self.h[i]
                        })
                })
                .collect();
            for &lake_id in &draining {
                let Some(lake_cell) = mesh.cells.neighbors[i]
                    .iter()
                    .copied()
                    .find(|&c| !self.is_land(c) && map.ids[c] == lake_id)
                else {
                    continue;
                };
                let Some(lake) = map.feature_mut(lake_id).lake.as_mut() else {
                    continue;
                };
                self.flux[lake_cell] += (lake.flux - lake.evaporation).max(0.0);

                // цепочка озёр сохраняет имя главной впадающей реки
                let main_inlet = self.lake_inflow.get(&lake_id).map(|&(river, _)| river);
                if main_inlet != Some(self.river_of[lake_cell]) {
                    let same_river = main_inlet.filter(|&r| {
                        mesh.cells.neighbors[lake_cell]
                            .iter()
                            .any(|&c| self.river_of[c] == r)
                    });
                    match same_river {
                        Some(r) => {
                            self.river_of[lake_cell] = r;
                            self.add_cell(r, lake_cell);
                        }
                        None => {
                            self.new_river(lake_cell);
                        }
                    }
                }
                let outlet = self.river_of[lake_cell];
                lake.outlet = Some(outlet);
                self.flow_down(map, i, self.flux[lake_cell], outlet);
            }

            // притоки озёр становятся притоками вытекающей реки
            if let Some(outlet) = draining
                .first()
                .and_then(|&id| map.feature(id).lake.as_ref())
                .and_then(|lake| lake.outlet)
            {
                for &id in &draining {
                    if let Some(lake) = map.feature(id).lake.as_ref() {
                        for &inlet in &lake.inlets {
                            self.parents.insert(inlet, outlet);
                        }
                    }
                }
            }

            if mesh.cells.border[i] && self.river_of[i] != 0 {
                self.add_cell(self.river_of[i], OFF_MAP);
                continue;
            }

            let neighbors = mesh.cells.neighbors[i].iter().copied();
            let target = if !out_cells[i].is_empty() {
                self.lowest(map, neighbors.filter(|&c| !draining.contains(&map.ids[c])))
            } else if let Some(haven) =
                map.haven[i].filter(|&c| drain_height(map, self.h, c) < self.h[i])
            {
                Some(haven)
            } else {
                self.lowest(map, neighbors)
            };
            let Some(min) = target else {
                continue;
            };
            if self.h[i] <= drain_height(map, self.h, min) {
                continue;
            }

            if self.flux[i] < MIN_FLUX_TO_FORM_RIVER {
                if self.is_land(min) {
                    self.flux[min] += self.flux[i];
                }
                continue;
            }
            let river = match self.river_of[i] {
                0 => self.new_river(i),
                r => r,
            };
            self.flow_down(map, min, self.flux[i], river);
        }
    }

    /// Передаёт поток `from_flux` реки `river` в ячейку `to`.
    fn flow_down(&mut self, map: &mut FeatureMap, to: usize, from_flux: f64, river: usize) {
        let to_flux = self.flux[to] - self.confluence[to];
        let to_river = self.river_of[to];
        if to_river == 0 {
            self.river_of[to] = river;
        } else if from_flux > to_flux {
            self.confluence[to] += self.flux[to];
            if self.is_land(to) {
                self.parents.insert(to_river, river);
            }
            self.river_of[to] = river;
        } else {
            self.confluence[to] += from_flux;
            if self.is_land(to) {
                self.parents.insert(river, to_river);
            }
        }

        if self.is_land(to) {
            self.flux[to] += from_flux;
        } else {
            let id = map.ids[to];
            let feature = map.feature_mut(id);
            if feature.kind == FeatureKind::Lake {
                if let Some(lake) = feature.lake.as_mut() {
                    let entering = self.lake_inflow.get(&id).map(|&(_, flux)| flux);
                    if entering.is_none_or(|flux| from_flux > flux) {
                        self.lake_inflow.insert(id, (river, from_flux));
                    }
                    lake.flux += from_flux;
                    lake.inlets.push(river);
                }
            }
        }
        self.add_cell(river, to);
    }

    /// Собирает реки из накопленных путей. Возвращает реки, реку каждой
    /// ячейки и поток притоков в местах слияния.
    pub fn define_rivers(
        &self,
        heights: &[u8],
        cells_desired: usize,
    ) -> (Vec<River>, Vec<usize>, Vec<f64>) {
        let mesh = self.mesh;
        let n = mesh.len();
        let mut river_of = vec![0usize; n];
        let mut is_confluence = vec![false; n];
        let default_width_factor = round2(1.0 / (cells_desired as f64 / 10_000.0).powf(0.25));
        let main_stem_factor = default_width_factor * MAIN_STEM_FACTOR;

        let mut rivers = Vec::new();
        for (&id, raw) in &self.river_cells {
            if raw.len() < MIN_RIVER_CELLS {
                continue;
            }
            for &cell in raw {
                if cell == OFF_MAP || heights[cell] < LAND_HEIGHT {
                    continue;
                }
                if river_of[cell] == 0 {
                    river_of[cell] = id;
                } else {
                    is_confluence[cell] = true;
                }
            }

            let exits_border = raw.last() == Some(&OFF_MAP);
            let cells: Vec<usize> = raw.iter().copied().filter(|&c| c != OFF_MAP).collect();
            let source = cells[0];
            let mouth = if exits_border {
                cells[cells.len() - 1]
            } else {
                cells[cells.len().saturating_sub(2)]
            };
            let parent = self.parents.get(&id).copied().unwrap_or(0);
            let width_factor = if parent == 0 || parent == id {
                main_stem_factor
            } else {
                default_width_factor
            };
            let discharge = self.flux[mouth];
            let points = &mesh.cells.points;
            let length = round2(
                cells
                    .windows(2)
                    .map(|w| points[w[0]].dist2(points[w[1]]).sqrt())
                    .sum(),
            );
            let source_width = source_width(self.flux[source]);
            let offset = width_offset(discharge, cells.len(), width_factor, source_width);
            let width = round2((offset / 1.5).powf(1.8));

            rivers.push(River {
                id,
                source,
                mouth,
                parent,
                basin: id,
                cells,
                discharge,
                length,
                width,
                source_width,
                width_factor,
                exits_border,
            });
        }

        define_basins(&mut rivers);

        let confluence = (0..n)
            .map(|i| {
                if !is_confluence[i] {
                    return 0.0;
                }
                let mut influx: Vec<f64> = mesh.cells.neighbors[i]
                    .iter()
                    .filter(|&&c| river_of[c] != 0 && heights[c] >= LAND_HEIGHT)
                    .map(|&c| self.flux[c])
                    .collect();
                influx.sort_by(|a, b| b.total_cmp(a));
                influx.iter().skip(1).sum()
            })
            .collect();

        log::debug!("рек: {}", rivers.len());
        (rivers, river_of, confluence)
    }
}

/// Бассейн реки — корень цепочки родителей.
fn define_basins(rivers: &mut [River]) {
    let parent_of: HashMap<usize, usize> = rivers.iter().map(|r| (r.id, r.parent)).collect();
    for river in rivers.iter_mut() {
        let mut basin = river.id;
        // цепочка не длиннее числа рек, иначе это цикл
        for _ in 0..parent_of.len() {
            match parent_of.get(&basin) {
                Some(&parent) if parent != 0 && parent != basin => basin = parent,
                _ => break,
            }
        }
        river.basin = basin;
    }
}

/// Речная эрозия: русло углубляется пропорционально тому, во сколько раз
/// его поток больше среднего потока более высоких соседок.
pub fn downcut_rivers(mesh: &Mesh, heights: &mut [u8], flux: &[f64]) {
    for i in 0..mesh.len() {
        if heights[i] < DOWNCUT_MIN_HEIGHT || flux[i] == 0.0 {
            continue;
        }
        let higher: Vec<usize> = mesh.cells.neighbors[i]
            .iter()
            .copied()
            .filter(|&c| heights[c] > heights[i])
            .collect();
        if higher.is_empty() {
            continue;
        }
        let higher_flux = higher.iter().map(|&c| flux[c]).sum::<f64>() / higher.len() as f64;
        if higher_flux == 0.0 {
            continue;
        }
        let downcut = (flux[i] / higher_flux).floor().min(f64::from(MAX_DOWNCUT)) as u8;
        heights[i] -= downcut;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_width_saturates() {
        assert_eq!(source_width(0.0), 0.0);
        assert_eq!(source_width(1e9), MAX_FLUX_WIDTH);
    }

    #[test]
    fn width_grows_downstream() {
        let near = width_offset(100.0, 2, 1.0, 0.1);
        let far = width_offset(100.0, 20, 1.0, 0.1);
        assert!(far > near);
        assert_eq!(width_offset(100.0, 0, 1.0, 0.1), 0.1);
    }

    #[test]
    fn basins_follow_parent_chain() {
        let river = |id, parent| River {
            id,
            source: 0,
            mouth: 0,
            parent,
            basin: id,
            cells: Vec::new(),
            discharge: 0.0,
            length: 0.0,
            width: 0.0,
            source_width: 0.0,
            width_factor: 1.0,
            exits_border: false,
        };
        let mut rivers = vec![river(1, 0), river(2, 1), river(3, 2), river(4, 5), river(5, 4)];
        define_basins(&mut rivers);
        assert_eq!(rivers[0].basin, 1);
        assert_eq!(rivers[1].basin, 1);
        assert_eq!(rivers[2].basin, 1);
        // цикл не зацикливает обход
        assert!(rivers[3].basin == 4 || rivers[3].basin == 5);
    }
}
