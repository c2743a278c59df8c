//! Гидрология
//!
//! Порядок работы:
//! 1. наклон суши и поиск бессточных озёр,
//! 2. заполнение впадин,
//! 3. водный баланс озёр,
//! 4. сток воды и образование рек,
//! 5. типы озёр и речная эрозия.

pub mod depressions;
pub mod lakes;
pub mod rivers;

use serde::Serialize;

pub use depressions::DepressionResolution;
pub use rivers::River;

use crate::config::MapOptions;
use crate::features::FeatureMap;
use crate::grid::Pack;

/// Итог гидрологии на уточнённой сетке.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hydrology {
    /// Поток воды через ячейку
    pub flux: Vec<f64>,
    /// Река ячейки (`0` — нет реки)
    pub river_ids: Vec<usize>,
    /// Поток притоков в местах слияния (`0` — не слияние)
    pub confluence: Vec<f64>,
    pub rivers: Vec<River>,
    /// Высоты после наклона и заполнения впадин, по которым текла вода
    pub drainage_heights: Vec<f64>,
    pub resolution: DepressionResolution,
}

impl Hydrology {
    #[must_use]
    pub fn river(&self, id: usize) -> Option<&River> {
        self.rivers.iter().find(|r| r.id == id)
    }
}

/// Считает озёра и реки. `prec` и `temp` заданы на первичной сетке.
///
/// С включённой эрозией высоты `pack` заменяются высотами стока и русла
/// углубляются.
pub fn simulate(
    pack: &mut Pack,
    map: &mut FeatureMap,
    prec: &[u8],
    temp: &[i8],
    options: &MapOptions,
) -> Hydrology {
    let mesh = &pack.mesh;
    let prec: Vec<u8> = pack.grid_ref.iter().map(|&g| prec[g]).collect();
    let temp: Vec<i8> = pack.grid_ref.iter().map(|&g| temp[g]).collect();

    let distance = map.distance.clone();

    let mut h = depressions::alter_heights(mesh, &pack.heights, &distance);
    lakes::detect_closed_lakes(mesh, &h, map, options.lake_elevation_limit);
    let resolution = depressions::resolve_depressions(
        mesh,
        &pack.heights,
        &distance,
        &mut h,
        map,
        options.resolve_depressions_steps,
    );
    let out_cells = lakes::define_climate_data(map, &prec, &temp, &h, options.height_exponent);

    let mut drainage = rivers::Drainage::new(mesh, &h);
    drainage.drain_water(map, &prec, &out_cells, options.cells);
    let (rivers, river_ids, confluence) = drainage.define_rivers(&pack.heights, options.cells);
    let flux = drainage.flux;

    lakes::cleanup_lake_data(map, |id| rivers.iter().any(|r| r.id == id));
    lakes::define_lake_groups(map);

    if options.allow_erosion {
        pack.heights = h.iter().map(|&v| v.clamp(0.0, 100.0) as u8).collect();
        rivers::downcut_rivers(&pack.mesh, &mut pack.heights, &flux);
    }

    log::info!(
        "гидрология: рек {}, озёр {}",
        rivers.len(),
        map.lakes().count()
    );

    Hydrology {
        flux,
        river_ids,
        confluence,
        rivers,
        drainage_heights: h,
        resolution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureKind, LAND_HEIGHT, markup_grid, markup_pack};
    use crate::grid::Grid;
    use crate::random::rng_from_seed;

    /// Остров-конус с равномерными осадками.
    fn cone_island() -> (Pack, FeatureMap, Vec<u8>, Vec<i8>) {
        let mut rng = rng_from_seed("hydrology");
        let grid = Grid::generate(800.0, 600.0, 3000, &mut rng).unwrap();
        let heights: Vec<u8> = grid
            .mesh
            .cells
            .points
            .iter()
            .map(|p| {
                let d = (p.x - 400.0).hypot(p.y - 300.0);
                (90.0 - d * 0.35).max(5.0) as u8
            })
            .collect();
        let grid_map = markup_grid(&grid.mesh, &heights);
        let pack = Pack::build(&grid, &heights, &grid_map).unwrap();
        let map = markup_pack(&pack.mesh, &pack.heights, grid.width, grid.height);
        let prec = vec![40u8; grid.len()];
        let temp = vec![15i8; grid.len()];
        (pack, map, prec, temp)
    }

    fn options() -> MapOptions {
        MapOptions {
            cells: 3000,
            allow_erosion: false,
            ..MapOptions::default()
        }
    }

    #[test]
    fn rivers_run_downhill_to_the_sea() {
        let (mut pack, mut map, prec, temp) = cone_island();
        let hydrology = simulate(&mut pack, &mut map, &prec, &temp, &options());
        assert!(!hydrology.rivers.is_empty());

        for river in &hydrology.rivers {
            let h = &hydrology.drainage_heights;
            let land: Vec<f64> = river
                .cells
                .iter()
                .filter(|&&c| pack.heights[c] >= LAND_HEIGHT)
                .map(|&c| h[c])
                .collect();
            assert!(land.windows(2).all(|w| w[0] >= w[1]), "река {} течёт вверх", river.id);
            let last = *river.cells.last().unwrap();
            // река кончается в море, за краем или впадает в другую реку
            let joins_other = hydrology
                .rivers
                .iter()
                .any(|other| other.id != river.id && other.cells.contains(&last));
            assert!(river.exits_border || pack.heights[last] < LAND_HEIGHT || joins_other);
            assert!(river.width > 0.0);
        }
    }

    #[test]
    fn river_ids_point_to_kept_rivers() {
        let (mut pack, mut map, prec, temp) = cone_island();
        let hydrology = simulate(&mut pack, &mut map, &prec, &temp, &options());
        for (cell, &id) in hydrology.river_ids.iter().enumerate() {
            if id != 0 {
                let river = hydrology.river(id).unwrap();
                assert!(river.cells.contains(&cell));
            }
        }
    }

    #[test]
    fn flux_accumulates_downstream() {
        let (mut pack, mut map, prec, temp) = cone_island();
        let hydrology = simulate(&mut pack, &mut map, &prec, &temp, &options());
        let river = hydrology
            .rivers
            .iter()
            .max_by(|a, b| a.discharge.total_cmp(&b.discharge))
            .unwrap();
        assert!(hydrology.flux[river.mouth] >= hydrology.flux[river.source]);
        assert!(river.discharge >= rivers::MIN_FLUX_TO_FORM_RIVER);
    }

    #[test]
    fn erosion_keeps_land_above_sea() {
        let (mut pack, mut map, prec, temp) = cone_island();
        let land_before: Vec<bool> = pack.heights.iter().map(|&h| h >= LAND_HEIGHT).collect();
        let options = MapOptions {
            allow_erosion: true,
            ..options()
        };
        simulate(&mut pack, &mut map, &prec, &temp, &options);
        for (i, &was_land) in land_before.iter().enumerate() {
            assert_eq!(pack.heights[i] >= LAND_HEIGHT, was_land);
            assert!(pack.heights[i] <= 100);
        }
        assert!(map.features.iter().all(|f| f.kind != FeatureKind::Lake || f.group.is_some()));
    }
}
