//! Озёра на первичной сетке: заполнение глубоких впадин и прорыв озёр,
//! отделённых от моря узкой низкой перемычкой.

use crate::features::{COAST_LAND, COAST_WATER, FeatureKind, FeatureMap, LAND_HEIGHT};
use crate::grid::Mesh;
use crate::heightmap::Template;

/// При таком пороге впадины не превращаются в озёра.
pub const DEPRESSION_LIMIT_DISABLED: u8 = 80;
/// Высота перемычки, которую море ещё может прорвать.
const SEA_BREACH_HEIGHT: u8 = 22;
/// Высота воды в новом озере.
const LAKE_FILL_HEIGHT: u8 = LAND_HEIGHT - 1;

/// Превращает в озёра локальные минимумы суши, из которых вода не может
/// стечь к морю, поднявшись меньше чем на `limit`. Возвращает число новых озёр.
pub fn add_lakes_in_deep_depressions(
    mesh: &Mesh,
    heights: &mut [u8],
    map: &mut FeatureMap,
    limit: u8,
) -> usize {
    if limit == DEPRESSION_LIMIT_DISABLED {
        return 0;
    }
    let cells = &mesh.cells;
    let mut added = 0;

    for i in 0..mesh.len() {
        if cells.border[i] || heights[i] < LAND_HEIGHT {
            continue;
        }
        let Some(lowest) = cells.neighbors[i].iter().map(|&c| heights[c]).min() else {
            continue;
        };
        if heights[i] > lowest {
            continue;
        }

        let threshold = u16::from(heights[i]) + u16::from(limit);
        let mut checked = vec![false; mesh.len()];
        checked[i] = true;
        let mut stack = vec![i];
        let mut deep = true;
        'search: while let Some(q) = stack.pop() {
            for &n in &cells.neighbors[q] {
                if checked[n] || u16::from(heights[n]) >= threshold {
                    continue;
                }
                if heights[n] < LAND_HEIGHT {
                    deep = false;
                    break 'search;
                }
                checked[n] = true;
                stack.push(n);
            }
        }
        if !deep {
            continue;
        }

        let mut lake_cells = vec![i];
        lake_cells.extend(cells.neighbors[i].iter().copied().filter(|&n| heights[n] == heights[i]));
        let id = map.push(FeatureKind::Lake, false, false, i, lake_cells.len());
        for &c in &lake_cells {
            map.feature_mut(map.ids[c]).cells -= 1;
            heights[c] = LAKE_FILL_HEIGHT;
            map.distance[c] = COAST_WATER;
            map.ids[c] = id;
        }
        for &c in &lake_cells {
            for &n in &cells.neighbors[c] {
                if !lake_cells.contains(&n) {
                    map.distance[n] = COAST_LAND;
                }
            }
        }
        added += 1;
    }
    if added > 0 {
        log::debug!("{added} озёр во впадинах");
    }
    added
}

/// Соединяет с океаном озёра, отделённые от него низкой прибрежной ячейкой.
/// Для атолла лагуна должна остаться озером.
pub fn open_near_sea_lakes(
    mesh: &Mesh,
    heights: &mut [u8],
    map: &mut FeatureMap,
    template: Option<Template>,
) -> usize {
    if template == Some(Template::Atoll) {
        return 0;
    }
    let cells = &mesh.cells;
    let mut opened = 0;

    for i in 0..mesh.len() {
        let lake = map.ids[i];
        if map.feature(lake).kind != FeatureKind::Lake {
            continue;
        }
        let breach = cells.neighbors[i].iter().find_map(|&c| {
            if map.distance[c] != COAST_LAND || heights[c] > SEA_BREACH_HEIGHT {
                return None;
            }
            cells.neighbors[c]
                .iter()
                .map(|&n| map.ids[n])
                .find(|&f| map.feature(f).kind == FeatureKind::Ocean)
                .map(|ocean| (c, ocean))
        });
        let Some((threshold, ocean)) = breach else {
            continue;
        };

        map.feature_mut(map.ids[threshold]).cells -= 1;
        heights[threshold] = LAKE_FILL_HEIGHT;
        map.distance[threshold] = COAST_WATER;
        map.ids[threshold] = ocean;
        map.feature_mut(ocean).cells += 1;
        for &c in &cells.neighbors[threshold] {
            if heights[c] >= LAND_HEIGHT {
                map.distance[c] = COAST_LAND;
            }
        }

        let mut moved = 0;
        for id in &mut map.ids {
            if *id == lake {
                *id = ocean;
                moved += 1;
            }
        }
        map.feature_mut(ocean).cells += moved;
        let old = map.feature_mut(lake);
        old.kind = FeatureKind::Ocean;
        old.cells = 0;
        opened += 1;
    }
    if opened > 0 {
        log::debug!("{opened} озёр соединены с морем");
    }
    opened
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::markup_grid;
    use crate::grid::Grid;
    use crate::random::rng_from_seed;

    /// Число шагов по соседям от центральной ячейки.
    fn hops_from_center(grid: &Grid) -> Vec<usize> {
        let center = grid.find_cell(400.0, 300.0);
        let mut hops = vec![usize::MAX; grid.len()];
        hops[center] = 0;
        let mut queue = std::collections::VecDeque::from([center]);
        while let Some(q) = queue.pop_front() {
            for &c in &grid.mesh.cells.neighbors[q] {
                if hops[c] == usize::MAX {
                    hops[c] = hops[q] + 1;
                    queue.push_back(c);
                }
            }
        }
        hops
    }

    /// Остров с кратером в центре, склоны понижаются к морю.
    fn crater_island() -> (Grid, Vec<u8>) {
        let mut rng = rng_from_seed("lakes");
        let grid = Grid::generate(800.0, 600.0, 2000, &mut rng).unwrap();
        let heights = hops_from_center(&grid)
            .into_iter()
            .map(|hop| match hop {
                0 => 30,
                1..=8 => 70 - 5 * (hop as u8 - 1),
                _ => 5,
            })
            .collect();
        (grid, heights)
    }

    #[test]
    fn deep_crater_becomes_lake() {
        let (grid, mut heights) = crater_island();
        let mut map = markup_grid(&grid.mesh, &heights);
        let before = map.features.len();
        let added = add_lakes_in_deep_depressions(&grid.mesh, &mut heights, &mut map, 20);
        assert!(added >= 1);
        assert_eq!(map.features.len(), before + added);
        let total: usize = map.features.iter().map(|f| f.cells).sum();
        assert_eq!(total, grid.len());
        for lake in map.features.iter().skip(before) {
            assert_eq!(heights[lake.first_cell], LAKE_FILL_HEIGHT);
            assert_eq!(map.distance[lake.first_cell], COAST_WATER);
        }
    }

    #[test]
    fn disabled_limit_adds_nothing() {
        let (grid, mut heights) = crater_island();
        let original = heights.clone();
        let mut map = markup_grid(&grid.mesh, &heights);
        let added = add_lakes_in_deep_depressions(
            &grid.mesh,
            &mut heights,
            &mut map,
            DEPRESSION_LIMIT_DISABLED,
        );
        assert_eq!(added, 0);
        assert_eq!(heights, original);
    }

    /// Лагуна за кольцом низкого берега толщиной в одну ячейку.
    fn lagoon_island() -> (Grid, Vec<u8>) {
        let mut rng = rng_from_seed("lagoon");
        let grid = Grid::generate(800.0, 600.0, 2000, &mut rng).unwrap();
        let heights = hops_from_center(&grid)
            .into_iter()
            .map(|hop| match hop {
                0..=3 => 10,
                4 => 21,
                _ => 5,
            })
            .collect();
        (grid, heights)
    }

    #[test]
    fn low_ring_lets_sea_into_lagoon() {
        let (grid, mut heights) = lagoon_island();
        let mut map = markup_grid(&grid.mesh, &heights);
        let center = grid.find_cell(400.0, 300.0);
        assert_eq!(map.kind_of(center), FeatureKind::Lake);

        let opened = open_near_sea_lakes(&grid.mesh, &mut heights, &mut map, Some(Template::Continents));
        assert!(opened >= 1);
        assert_eq!(map.kind_of(center), FeatureKind::Ocean);
        let total: usize = map.features.iter().map(|f| f.cells).sum();
        assert_eq!(total, grid.len());
    }

    #[test]
    fn atoll_keeps_lagoon() {
        let (grid, mut heights) = lagoon_island();
        let original = heights.clone();
        let mut map = markup_grid(&grid.mesh, &heights);
        let opened = open_near_sea_lakes(&grid.mesh, &mut heights, &mut map, Some(Template::Atoll));
        assert_eq!(opened, 0);
        assert_eq!(heights, original);
        assert_eq!(map.kind_of(grid.find_cell(400.0, 300.0)), FeatureKind::Lake);
    }
}
