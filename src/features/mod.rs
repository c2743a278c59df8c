//! Разметка суши и воды на связные объекты
//!
//! Заливка делит ячейки на объекты трёх видов: океан (вода, касающаяся края
//! холста), озеро (прочая вода) и остров (суша). Попутно размечаются кольца
//! расстояния до берега: `1` — прибрежная суша, `2..` — глубже в суше,
//! `-1` — прибрежная вода, `-2..=-9` — глубже в воде.
//!
//! Объекты нумеруются с единицы; `0` в [`FeatureMap::ids`] означает
//! «не размечено».

pub mod graph;
pub mod lakes;
pub mod polygon;

use serde::Serialize;

use crate::grid::{Mesh, Point};

pub use graph::build_feature_graph;
pub use lakes::{add_lakes_in_deep_depressions, open_near_sea_lakes};

/// Минимальная высота суши.
pub const LAND_HEIGHT: u8 = 20;
pub const COAST_LAND: i8 = 1;
pub const COAST_WATER: i8 = -1;
/// Глубже этого кольца вода не размечается.
const WATER_RING_LIMIT: i8 = -10;
const UNMARKED: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureKind {
    Ocean,
    Island,
    Lake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureGroup {
    Ocean,
    Sea,
    Gulf,
    Continent,
    Island,
    Isle,
    LakeIsland,
    Freshwater,
    Salt,
    Dry,
    Frozen,
    Lava,
}

/// Тип ячейки по кольцу расстояния до берега.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CellType {
    CoastLand,
    InlandLand,
    CoastWater,
    DeepWater,
}

impl CellType {
    #[must_use]
    pub fn from_ring(ring: i8) -> Self {
        match ring {
            COAST_LAND => CellType::CoastLand,
            r if r > COAST_LAND => CellType::InlandLand,
            COAST_WATER => CellType::CoastWater,
            _ => CellType::DeepWater,
        }
    }
}

/// Свойства озера, заполняемые гидрологией.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LakeData {
    /// Уровень воды
    pub height: f64,
    /// Ячейки суши вдоль берега
    pub shoreline: Vec<usize>,
    pub flux: f64,
    pub evaporation: f64,
    /// Бессточное озеро
    pub closed: bool,
    pub temperature: f64,
    /// Реки, впадающие в озеро
    pub inlets: Vec<usize>,
    /// Река, вытекающая из озера
    pub outlet: Option<usize>,
    pub outlet_cell: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Feature {
    pub id: usize,
    pub kind: FeatureKind,
    pub land: bool,
    /// Касается края холста
    pub border: bool,
    pub cells: usize,
    /// Ячейка на границе объекта (для сетки — первая ячейка заливки)
    pub first_cell: usize,
    /// Цепочка вершин контура (только на уточнённой сетке)
    pub vertices: Vec<usize>,
    pub area: f64,
    pub group: Option<FeatureGroup>,
    pub lake: Option<LakeData>,
}

/// Разметка сетки на объекты.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeatureMap {
    /// Объект ячейки, с единицы
    pub ids: Vec<usize>,
    /// Кольцо расстояния до берега
    pub distance: Vec<i8>,
    pub features: Vec<Feature>,
    /// Ближайшая водная соседка прибрежной суши
    pub haven: Vec<Option<usize>>,
    /// Число водных соседей прибрежной суши
    pub harbor: Vec<u8>,
}

impl FeatureMap {
    #[must_use]
    pub fn feature(&self, id: usize) -> &Feature {
        &self.features[id - 1]
    }

    pub fn feature_mut(&mut self, id: usize) -> &mut Feature {
        &mut self.features[id - 1]
    }

    #[must_use]
    pub fn feature_of(&self, cell: usize) -> &Feature {
        self.feature(self.ids[cell])
    }

    #[must_use]
    pub fn kind_of(&self, cell: usize) -> FeatureKind {
        self.feature_of(cell).kind
    }

    #[must_use]
    pub fn cell_type(&self, cell: usize) -> CellType {
        CellType::from_ring(self.distance[cell])
    }

    pub fn lakes(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter().filter(|f| f.kind == FeatureKind::Lake && f.cells > 0)
    }

    fn push(
        &mut self,
        kind: FeatureKind,
        land: bool,
        border: bool,
        first_cell: usize,
        cells: usize,
    ) -> usize {
        let id = self.features.len() + 1;
        self.features.push(Feature {
            id,
            kind,
            land,
            border,
            cells,
            first_cell,
            vertices: Vec::new(),
            area: 0.0,
            group: None,
            lake: None,
        });
        id
    }
}

/// Заливка по первичной сетке.
#[must_use]
pub fn markup_grid(mesh: &Mesh, heights: &[u8]) -> FeatureMap {
    let mut map = flood_fill(mesh, heights);
    expand_rings(mesh, &mut map.distance, COAST_LAND + 1, 1, i8::MAX);
    expand_rings(mesh, &mut map.distance, COAST_WATER - 1, -1, WATER_RING_LIMIT);
    log::debug!("сетка: {} объектов", map.features.len());
    map
}

/// Заливка по уточнённой сетке: кольца, гавани, контуры, площади и
/// начальные уровни озёр.
#[must_use]
pub fn markup_pack(mesh: &Mesh, heights: &[u8], width: f64, height: f64) -> FeatureMap {
    let mut map = flood_fill(mesh, heights);
    expand_rings(mesh, &mut map.distance, COAST_LAND + 1, 1, i8::MAX);
    expand_rings(mesh, &mut map.distance, COAST_WATER - 1, -1, WATER_RING_LIMIT);
    define_havens(mesh, heights, &mut map);

    let ids = map.ids.clone();
    for feature in &mut map.features {
        if feature.kind == FeatureKind::Ocean {
            continue;
        }
        let id = feature.id;
        let same = |c: usize| ids.get(c) == Some(&id);
        let Some(start) = find_on_border_cell(mesh, feature.first_cell, &same) else {
            log::warn!("объект {id}: нет граничной ячейки");
            continue;
        };
        feature.first_cell = start;
        let Some(&vertex) = mesh.cells.vertices[start]
            .iter()
            .find(|&&v| mesh.vertices.cells[v].iter().any(|&c| !same(c)))
        else {
            log::warn!("объект {id}: нет начальной вершины контура");
            continue;
        };
        feature.vertices = polygon::connect_vertices(mesh, vertex, same, |_| {}, false);

        let outline: Vec<Point> = feature.vertices.iter().map(|&v| mesh.vertices.points[v]).collect();
        let signed = polygon::area(&polygon::clip(&outline, width, height));
        feature.area = signed.abs().round();

        if feature.kind == FeatureKind::Lake {
            if signed > 0.0 {
                feature.vertices.reverse();
            }
            let mut shoreline: Vec<usize> = feature
                .vertices
                .iter()
                .flat_map(|&v| mesh.vertices.cells[v])
                .filter(|&c| c < heights.len() && heights[c] >= LAND_HEIGHT)
                .collect();
            shoreline.sort_unstable();
            shoreline.dedup();
            let lowest = shoreline.iter().map(|&c| heights[c]).min().unwrap_or(LAND_HEIGHT);
            feature.lake = Some(LakeData {
                height: f64::from(lowest) - 0.1,
                shoreline,
                ..LakeData::default()
            });
        }
    }
    log::debug!("уточнённая сетка: {} объектов", map.features.len());
    map
}

/// Размерные группы океанов и островов. `grid_cells` — число ячеек первичной
/// сетки, чтобы пороги не зависели от уточнения.
pub fn define_groups(mesh: &Mesh, map: &mut FeatureMap, grid_cells: usize) {
    let ocean_min = grid_cells as f64 / 25.0;
    let sea_min = grid_cells as f64 / 1000.0;
    let continent_min = grid_cells as f64 / 10.0;
    let island_min = grid_cells as f64 / 1000.0;

    let graph = build_feature_graph(mesh, map);
    let lake_locked = graph::lake_locked_islands(&graph, map);

    for feature in &mut map.features {
        let cells = feature.cells as f64;
        feature.group = match feature.kind {
            FeatureKind::Ocean if cells > ocean_min => Some(FeatureGroup::Ocean),
            FeatureKind::Ocean if cells > sea_min => Some(FeatureGroup::Sea),
            FeatureKind::Ocean => Some(FeatureGroup::Gulf),
            FeatureKind::Island if lake_locked.contains(&feature.id) => {
                Some(FeatureGroup::LakeIsland)
            }
            FeatureKind::Island if cells > continent_min => Some(FeatureGroup::Continent),
            FeatureKind::Island if cells > island_min => Some(FeatureGroup::Island),
            FeatureKind::Island => Some(FeatureGroup::Isle),
            FeatureKind::Lake => feature.group,
        };
    }
}

/// Заливка стеком: объект растёт по соседям того же класса (суша/вода).
fn flood_fill(mesh: &Mesh, heights: &[u8]) -> FeatureMap {
    let n = mesh.len();
    let cells = &mesh.cells;
    let mut map = FeatureMap {
        ids: vec![UNMARKED; n],
        distance: vec![0; n],
        features: Vec::new(),
        haven: vec![None; n],
        harbor: vec![0; n],
    };

    let mut cursor = 0;
    while let Some(first) = (cursor..n).find(|&i| map.ids[i] == UNMARKED) {
        cursor = first + 1;
        let id = map.features.len() + 1;
        let land = heights[first] >= LAND_HEIGHT;
        let mut border = false;
        let mut count = 1;
        map.ids[first] = id;
        let mut stack = vec![first];

        while let Some(q) = stack.pop() {
            border |= cells.border[q];
            for &c in &cells.neighbors[q] {
                let neighbor_land = heights[c] >= LAND_HEIGHT;
                if land == neighbor_land && map.ids[c] == UNMARKED {
                    map.ids[c] = id;
                    count += 1;
                    stack.push(c);
                } else if land && !neighbor_land {
                    map.distance[q] = COAST_LAND;
                    map.distance[c] = COAST_WATER;
                }
            }
        }

        let kind = if land {
            FeatureKind::Island
        } else if border {
            FeatureKind::Ocean
        } else {
            FeatureKind::Lake
        };
        map.push(kind, land, border, first, count);
    }
    map
}

/// Разносит кольца от уже размеченных: каждой неразмеченной соседке кольца
/// `t - step` достаётся `t`, пока есть прирост и не достигнут `limit`.
fn expand_rings(mesh: &Mesh, distance: &mut [i8], start: i8, step: i8, limit: i8) {
    let mut t = start;
    loop {
        if t == limit {
            break;
        }
        let previous = t - step;
        let mut count = 0;
        for i in 0..distance.len() {
            if distance[i] != previous {
                continue;
            }
            for &c in &mesh.cells.neighbors[i] {
                if distance[c] == 0 {
                    distance[c] = t;
                    count += 1;
                }
            }
        }
        if count == 0 {
            break;
        }
        t += step;
    }
}

/// Гавань прибрежной ячейки — ближайшая водная соседка, а число водных
/// соседей — вместимость её бухты.
fn define_havens(mesh: &Mesh, heights: &[u8], map: &mut FeatureMap) {
    let cells = &mesh.cells;
    for i in 0..mesh.len() {
        if map.distance[i] != COAST_LAND {
            continue;
        }
        let water = cells.neighbors[i].iter().copied().filter(|&c| heights[c] < LAND_HEIGHT);
        let mut closest: Option<(f64, usize)> = None;
        let mut count = 0u8;
        for c in water {
            count = count.saturating_add(1);
            let d = cells.points[i].dist2(cells.points[c]);
            if closest.is_none_or(|(best, _)| d < best) {
                closest = Some((d, c));
            }
        }
        map.haven[i] = closest.map(|(_, c)| c);
        map.harbor[i] = count;
    }
}

fn find_on_border_cell(mesh: &Mesh, first: usize, same: &impl Fn(usize) -> bool) -> Option<usize> {
    let on_border = |c: usize| {
        mesh.cells.border[c] || mesh.cells.neighbors[c].iter().any(|&n| !same(n))
    };
    if on_border(first) {
        return Some(first);
    }
    (0..mesh.len()).find(|&c| same(c) && on_border(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::random::rng_from_seed;

    /// Остров в центре и озеро посреди острова.
    fn island_with_lake() -> (Grid, Vec<u8>) {
        let mut rng = rng_from_seed("features");
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
                } else if d < 200.0 {
                    40
                } else {
                    5
                }
            })
            .collect();
        (grid, heights)
    }

    #[test]
    fn every_cell_belongs_to_one_feature() {
        let (grid, heights) = island_with_lake();
        let map = markup_grid(&grid.mesh, &heights);
        assert!(map.ids.iter().all(|&id| id != UNMARKED));
        let total: usize = map.features.iter().map(|f| f.cells).sum();
        assert_eq!(total, grid.len());
        for (cell, &id) in map.ids.iter().enumerate() {
            let feature = map.feature(id);
            assert_eq!(feature.land, heights[cell] >= LAND_HEIGHT);
        }
    }

    #[test]
    fn classifies_ocean_island_and_lake() {
        let (grid, heights) = island_with_lake();
        let map = markup_grid(&grid.mesh, &heights);
        let kinds: Vec<FeatureKind> = map.features.iter().map(|f| f.kind).collect();
        assert_eq!(kinds.iter().filter(|&&k| k == FeatureKind::Ocean).count(), 1);
        assert_eq!(kinds.iter().filter(|&&k| k == FeatureKind::Island).count(), 1);
        assert_eq!(kinds.iter().filter(|&&k| k == FeatureKind::Lake).count(), 1);
        assert_eq!(map.kind_of(grid.find_cell(400.0, 300.0)), FeatureKind::Lake);
    }

    #[test]
    fn rings_grow_away_from_coast() {
        let (grid, heights) = island_with_lake();
        let map = markup_grid(&grid.mesh, &heights);
        for (cell, &ring) in map.distance.iter().enumerate() {
            let land = heights[cell] >= LAND_HEIGHT;
            if ring == 0 {
                // только глубокая вода за последним кольцом
                assert!(!land);
                continue;
            }
            assert_eq!(ring > 0, land, "ячейка {cell}");
            if ring == COAST_LAND {
                assert!(grid.mesh.cells.neighbors[cell].iter().any(|&c| heights[c] < LAND_HEIGHT));
            }
            if ring > COAST_LAND {
                assert!(grid.mesh.cells.neighbors[cell].iter().any(|&c| map.distance[c] == ring - 1));
            }
        }
        assert!(map.distance.iter().all(|&d| d > WATER_RING_LIMIT));
    }

    #[test]
    fn cell_type_follows_ring() {
        assert_eq!(CellType::from_ring(1), CellType::CoastLand);
        assert_eq!(CellType::from_ring(5), CellType::InlandLand);
        assert_eq!(CellType::from_ring(-1), CellType::CoastWater);
        assert_eq!(CellType::from_ring(-4), CellType::DeepWater);
        assert_eq!(CellType::from_ring(0), CellType::DeepWater);

        let (grid, heights) = island_with_lake();
        let map = markup_grid(&grid.mesh, &heights);
        for cell in 0..grid.len() {
            let land = matches!(map.cell_type(cell), CellType::CoastLand | CellType::InlandLand);
            assert_eq!(land, heights[cell] >= LAND_HEIGHT);
        }
    }

    #[test]
    fn pack_markup_builds_lake_shoreline_and_havens() {
        let (grid, heights) = island_with_lake();
        let map = markup_pack(&grid.mesh, &heights, grid.width, grid.height);

        let lake = map.lakes().next().unwrap();
        let data = lake.lake.as_ref().unwrap();
        assert!(!data.shoreline.is_empty());
        assert!(data.shoreline.iter().all(|&c| heights[c] >= LAND_HEIGHT));
        assert!((data.height - 39.9).abs() < 1e-9);
        assert!(lake.area > 0.0);

        for cell in 0..grid.len() {
            if map.distance[cell] == COAST_LAND {
                let haven = map.haven[cell].unwrap();
                assert!(heights[haven] < LAND_HEIGHT);
                assert!(map.harbor[cell] >= 1);
            } else {
                assert!(map.haven[cell].is_none());
            }
        }
    }

    #[test]
    fn groups_follow_size_and_lake_enclosure() {
        let (grid, mut heights) = island_with_lake();
        // островок посреди озера
        let center = grid.find_cell(400.0, 300.0);
        heights[center] = 30;
        let mut map = markup_pack(&grid.mesh, &heights, grid.width, grid.height);
        define_groups(&grid.mesh, &mut map, grid.len());

        assert_eq!(map.feature_of(center).group, Some(FeatureGroup::LakeIsland));
        let big = map.feature_of(grid.find_cell(400.0, 130.0));
        assert_eq!(big.group, Some(FeatureGroup::Continent));
        let ocean = map.feature_of(0);
        assert_eq!(ocean.group, Some(FeatureGroup::Ocean));
    }
}
