//! Свойства озёр: сточность, водный баланс, температура и тип.

use crate::features::{FeatureGroup, FeatureKind, FeatureMap, LAND_HEIGHT};
use crate::grid::Mesh;

/// Озеро холоднее этого замерзает.
const FROZEN_TEMPERATURE: f64 = -3.0;
/// Озеро выше этого уровня считается лавовым.
const LAVA_HEIGHT: f64 = 60.0;
/// У малых озёр температура берётся по первой ячейке.
const SMALL_LAKE_CELLS: usize = 6;

/// Помечает бессточные озёра: из низшей береговой ячейки поиск идёт по
/// ячейкам ниже `уровень + limit`; если он дошёл до океана или более
/// низкого озера, у озера есть сток.
pub fn detect_closed_lakes(mesh: &Mesh, h: &[f64], map: &mut FeatureMap, limit: u8) {
    let limit = f64::from(limit);
    let mut closed = Vec::new();

    for feature in map.lakes() {
        let Some(lake) = feature.lake.as_ref() else {
            continue;
        };
        let max_elevation = lake.height + limit;
        if max_elevation > 99.0 {
            closed.push((feature.id, false));
            continue;
        }
        let Some(&lowest) = lake.shoreline.iter().min_by(|&&a, &&b| h[a].total_cmp(&h[b])) else {
            closed.push((feature.id, false));
            continue;
        };

        let mut deep = true;
        let mut checked = vec![false; mesh.len()];
        checked[lowest] = true;
        let mut stack = vec![lowest];
        while deep {
            let Some(cell) = stack.pop() else {
                break;
            };
            for &n in &mesh.cells.neighbors[cell] {
                if checked[n] || h[n] >= max_elevation {
                    continue;
                }
                if h[n] < f64::from(LAND_HEIGHT) {
                    let other = map.feature_of(n);
                    let lower_lake = other.lake.as_ref().is_some_and(|o| lake.height > o.height);
                    if other.kind == FeatureKind::Ocean || lower_lake {
                        deep = false;
                    }
                }
                checked[n] = true;
                stack.push(n);
            }
        }
        closed.push((feature.id, deep));
    }

    for (id, is_closed) in closed {
        if let Some(lake) = map.feature_mut(id).lake.as_mut() {
            lake.closed = is_closed;
        }
    }
}

/// Водный баланс озёр до стока рек: приток с берегов, температура,
/// испарение и ячейка стока. Возвращает для каждой ячейки озеро, которое
/// через неё вытекает.
pub fn define_climate_data(
    map: &mut FeatureMap,
    prec: &[u8],
    temp: &[i8],
    h: &[f64],
    height_exponent: f64,
) -> Vec<Vec<usize>> {
    let mut out_cells = vec![Vec::new(); h.len()];
    for feature in &mut map.features {
        if feature.kind != FeatureKind::Lake {
            continue;
        }
        let (id, cells, first_cell) = (feature.id, feature.cells, feature.first_cell);
        let Some(lake) = feature.lake.as_mut() else {
            continue;
        };
        lake.flux = lake.shoreline.iter().map(|&c| f64::from(prec[c])).sum();
        lake.temperature = if cells < SMALL_LAKE_CELLS || lake.shoreline.is_empty() {
            f64::from(temp[first_cell])
        } else {
            let sum: f64 = lake.shoreline.iter().map(|&c| f64::from(temp[c])).sum();
            (sum / lake.shoreline.len() as f64 * 10.0).round() / 10.0
        };
        let meters = (lake.height - 18.0).max(0.0).powf(height_exponent);
        let t = lake.temperature;
        let evaporation = ((700.0 * (t + 0.006 * meters)) / 50.0 + 75.0) / (80.0 - t);
        lake.evaporation = (evaporation * cells as f64).round();

        if lake.closed {
            continue;
        }
        lake.outlet_cell = lake
            .shoreline
            .iter()
            .copied()
            .min_by(|&a, &b| h[a].total_cmp(&h[b]));
        if let Some(cell) = lake.outlet_cell {
            out_cells[cell].push(id);
        }
    }
    out_cells
}

/// Оставляет у озёр только существующие реки.
pub fn cleanup_lake_data(map: &mut FeatureMap, river_exists: impl Fn(usize) -> bool) {
    for feature in &mut map.features {
        let Some(lake) = feature.lake.as_mut() else {
            continue;
        };
        lake.inlets.retain(|&r| river_exists(r));
        lake.inlets.sort_unstable();
        lake.inlets.dedup();
        if lake.outlet.is_some_and(|r| !river_exists(r)) {
            lake.outlet = None;
        }
    }
}

/// Тип озера по температуре, высоте и водному балансу.
pub fn define_lake_groups(map: &mut FeatureMap) {
    for feature in &mut map.features {
        if feature.kind != FeatureKind::Lake {
            continue;
        }
        let Some(lake) = feature.lake.as_ref() else {
            continue;
        };
        let group = if lake.temperature < FROZEN_TEMPERATURE {
            FeatureGroup::Frozen
        } else if lake.height > LAVA_HEIGHT {
            FeatureGroup::Lava
        } else if lake.inlets.is_empty()
            && lake.outlet.is_none()
            && lake.evaporation > lake.flux * 4.0
        {
            FeatureGroup::Dry
        } else if lake.outlet.is_none() && lake.evaporation > lake.flux {
            FeatureGroup::Salt
        } else {
            FeatureGroup::Freshwater
        };
        feature.group = Some(group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{LakeData, markup_pack};
    use crate::grid::Grid;
    use crate::random::rng_from_seed;

    /// Остров с озером в центре: низкий берег, за ним гребень высотой
    /// `ridge`, дальше равнина до моря.
    fn lake_island(ridge: u8) -> (Grid, Vec<u8>) {
        let mut rng = rng_from_seed("lake-island");
        let grid = Grid::generate(800.0, 600.0, 2000, &mut rng).unwrap();
        let heights = grid
            .mesh
            .cells
            .points
            .iter()
            .map(|p| {
                let d = (p.x - 400.0).hypot(p.y - 300.0);
                if d < 50.0 {
                    10
                } else if d < 90.0 {
                    25
                } else if d < 140.0 {
                    ridge
                } else if d < 200.0 {
                    30
                } else {
                    5
                }
            })
            .collect();
        (grid, heights)
    }

    fn lake_of(map: &FeatureMap) -> &LakeData {
        map.lakes().next().unwrap().lake.as_ref().unwrap()
    }

    #[test]
    fn low_rim_lake_drains() {
        let (grid, heights) = lake_island(35);
        let mut map = markup_pack(&grid.mesh, &heights, grid.width, grid.height);
        let h: Vec<f64> = heights.iter().map(|&v| f64::from(v)).collect();
        detect_closed_lakes(&grid.mesh, &h, &mut map, 20);
        assert!(!lake_of(&map).closed);
    }

    #[test]
    fn high_rim_lake_is_closed() {
        let (grid, heights) = lake_island(70);
        let mut map = markup_pack(&grid.mesh, &heights, grid.width, grid.height);
        let h: Vec<f64> = heights.iter().map(|&v| f64::from(v)).collect();
        detect_closed_lakes(&grid.mesh, &h, &mut map, 20);
        assert!(lake_of(&map).closed);
    }

    #[test]
    fn climate_data_sets_outlet_on_lowest_shore() {
        let (grid, heights) = lake_island(35);
        let mut map = markup_pack(&grid.mesh, &heights, grid.width, grid.height);
        let h: Vec<f64> = heights.iter().map(|&v| f64::from(v)).collect();
        let prec = vec![10u8; grid.len()];
        let temp = vec![15i8; grid.len()];
        let out_cells = define_climate_data(&mut map, &prec, &temp, &h, 2.0);

        let lake = lake_of(&map);
        assert_eq!(lake.flux, 10.0 * lake.shoreline.len() as f64);
        assert_eq!(lake.temperature, 15.0);
        assert!(lake.evaporation > 0.0);
        let outlet = lake.outlet_cell.unwrap();
        assert!(lake.shoreline.contains(&outlet));
        assert_eq!(out_cells[outlet].len(), 1);
    }

    #[test]
    fn groups_by_temperature_and_balance() {
        let (grid, heights) = lake_island(35);
        let mut map = markup_pack(&grid.mesh, &heights, grid.width, grid.height);
        let id = map.lakes().next().unwrap().id;
        let set = |map: &mut FeatureMap, temperature: f64, flux: f64, outlet: Option<usize>| {
            let lake = map.feature_mut(id).lake.as_mut().unwrap();
            lake.temperature = temperature;
            lake.height = 25.0;
            lake.flux = flux;
            lake.evaporation = 100.0;
            lake.outlet = outlet;
            define_lake_groups(map);
            map.feature(id).group
        };
        assert_eq!(set(&mut map, -10.0, 500.0, Some(1)), Some(FeatureGroup::Frozen));
        assert_eq!(set(&mut map, 10.0, 10.0, None), Some(FeatureGroup::Dry));
        assert_eq!(set(&mut map, 10.0, 50.0, None), Some(FeatureGroup::Salt));
        assert_eq!(set(&mut map, 10.0, 50.0, Some(1)), Some(FeatureGroup::Freshwater));
    }
}
