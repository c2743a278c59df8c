//! Конвейер генерации
//!
//! Стадии идут строго по порядку, каждая читает результаты предыдущих:
//! сетка → рельеф → объекты → климат → уточнённая сетка → гидрология →
//! биомы. Весь случайный выбор идёт через один генератор, поэтому карта
//! однозначно определяется параметрами.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::biome::assign_biomes;
use crate::climate::{MapCoordinates, MapPlacement, precipitation, temperatures};
use crate::config::MapOptions;
use crate::error::{MapError, Result};
use crate::features::{
    LAND_HEIGHT, add_lakes_in_deep_depressions, define_groups, markup_grid, markup_pack,
    open_near_sea_lakes,
};
use crate::grid::{Grid, Pack};
use crate::heightmap::{HeightmapEngine, Template, parse_recipe};
use crate::hydrology;
use crate::random::rng_from_seed;
use crate::snapshot::{GridLayer, MapSnapshot, PackLayer};

/// Генерирует карту целиком. При ошибке частичный результат не возвращается.
pub fn generate(options: &MapOptions) -> Result<MapSnapshot> {
    options.validate()?;
    let mut rng = rng_from_seed(&options.seed);

    let (template, recipe) = match &options.custom_template {
        Some(text) => (None, parse_recipe(text)?),
        None => {
            let template = match options.template {
                Some(template) => template,
                None => Template::pick_weighted(&mut rng),
            };
            (Some(template), template.recipe()?)
        }
    };
    log::info!(
        "генерация: сид {:?}, шаблон {}, {} ячеек",
        options.seed,
        template.map_or("собственный", Template::name),
        options.cells
    );

    let grid = Grid::generate(options.width, options.height, options.cells, &mut rng)?;

    let mut engine = HeightmapEngine::new(&grid);
    engine.run(&recipe, &mut rng);
    let exhausted_searches = engine.exhausted_searches();
    let mut heights = engine.into_heights();
    log::info!("рельеф готов: {} шагов", recipe.len());

    let mut grid_features = markup_grid(&grid.mesh, &heights);
    let added = add_lakes_in_deep_depressions(
        &grid.mesh,
        &mut heights,
        &mut grid_features,
        options.lake_elevation_limit,
    );
    let opened = open_near_sea_lakes(&grid.mesh, &mut heights, &mut grid_features, template);
    log::debug!("озёр во впадинах: {added}, открыто к морю: {opened}");

    let touches_border = (0..grid.len())
        .any(|i| grid.mesh.cells.border[i] && heights[i] >= LAND_HEIGHT);
    let mut placement = MapPlacement::for_template(template, touches_border, &mut rng);
    if let Some(size) = options.map_size {
        placement.size = size;
    }
    if let Some(latitude) = options.latitude {
        placement.latitude = latitude;
    }
    if let Some(longitude) = options.longitude {
        placement.longitude = longitude;
    }
    let coordinates = MapCoordinates::new(placement, grid.width, grid.height);

    let temp = temperatures(&grid, &heights, &coordinates, options);
    let prec = precipitation(&grid, &heights, &temp, &coordinates, options, &mut rng);
    log::info!("климат: широты {:.1}…{:.1}", coordinates.lat_s, coordinates.lat_n);

    let mut pack = Pack::build(&grid, &heights, &grid_features)?;
    let mut pack_features = markup_pack(&pack.mesh, &pack.heights, grid.width, grid.height);
    define_groups(&pack.mesh, &mut pack_features, grid.len());

    let hydrology = hydrology::simulate(&mut pack, &mut pack_features, &prec, &temp, options);
    let biomes = assign_biomes(&pack, &hydrology, &prec, &temp);

    Ok(MapSnapshot::assemble(
        options.seed.clone(),
        template,
        GridLayer {
            grid,
            heights,
            features: grid_features,
            temperature: temp,
            precipitation: prec,
        },
        PackLayer {
            pack,
            features: pack_features,
            hydrology,
            biomes,
        },
        placement,
        coordinates,
        exhausted_searches,
    ))
}

/// Сессия генерации: одна генерация в фоновом потоке за раз.
///
/// Последний удачный снимок остаётся доступным, пока новая генерация
/// идёт или если она завершилась ошибкой.
#[derive(Default)]
pub struct MapSession {
    current: Option<Arc<MapSnapshot>>,
    worker: Option<JoinHandle<Result<MapSnapshot>>>,
}

impl MapSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Последний удачный снимок.
    #[must_use]
    pub fn current(&self) -> Option<Arc<MapSnapshot>> {
        self.current.clone()
    }

    /// Есть запущенная генерация, результат которой ещё не забран.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.worker.is_some()
    }

    /// Запускает генерацию в фоне.
    pub fn start(&mut self, options: MapOptions) -> Result<()> {
        if self.is_busy() {
            return Err(MapError::Busy);
        }
        let worker = thread::Builder::new()
            .name("mapgen".to_string())
            .spawn(move || generate(&options))?;
        self.worker = Some(worker);
        Ok(())
    }

    /// Дожидается запущенной генерации. `None`, если ничего не запущено.
    pub fn wait(&mut self) -> Option<Result<Arc<MapSnapshot>>> {
        let worker = self.worker.take()?;
        let result = match worker.join() {
            Ok(Ok(snapshot)) => {
                let snapshot = Arc::new(snapshot);
                self.current = Some(Arc::clone(&snapshot));
                Ok(snapshot)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(MapError::WorkerPanicked),
        };
        if let Err(err) = &result {
            log::error!("генерация не удалась: {err}");
        }
        Some(result)
    }

    /// Запускает генерацию и дожидается её.
    pub fn generate(&mut self, options: MapOptions) -> Result<Arc<MapSnapshot>> {
        self.start(options)?;
        self.wait().unwrap_or(Err(MapError::WorkerPanicked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(seed: &str) -> MapOptions {
        MapOptions {
            seed: seed.to_string(),
            cells: 2000,
            width: 800.0,
            height: 600.0,
            template: Some(Template::HighIsland),
            ..MapOptions::default()
        }
    }

    #[test]
    fn bad_options_fail_before_work() {
        let options = MapOptions {
            cells: 0,
            ..small("x")
        };
        assert!(matches!(generate(&options), Err(MapError::Configuration(_))));
    }

    #[test]
    fn custom_recipe_overrides_template() {
        let options = MapOptions {
            custom_template: Some("Hill 1 90-99 45-55 45-55\nSmooth 2 0 0 0".to_string()),
            ..small("custom")
        };
        let snapshot = generate(&options).unwrap();
        assert_eq!(snapshot.template, None);
        assert!(snapshot.grid.heights.iter().any(|&h| h >= LAND_HEIGHT));
    }

    #[test]
    fn overrides_fix_placement() {
        let options = MapOptions {
            map_size: Some(20.0),
            latitude: Some(30.0),
            ..small("placed")
        };
        let snapshot = generate(&options).unwrap();
        assert_eq!(snapshot.placement.size, 20.0);
        assert_eq!(snapshot.placement.latitude, 30.0);
        assert_eq!(snapshot.coordinates.lat_t, 36.0);
    }

    #[test]
    fn session_keeps_last_good_snapshot() {
        let mut session = MapSession::new();
        let first = session.generate(small("session")).unwrap();
        assert_eq!(first.seed, "session");

        let failed = session.generate(MapOptions {
            width: -1.0,
            ..small("broken")
        });
        assert!(failed.is_err());
        assert_eq!(session.current().unwrap().seed, "session");
    }

    #[test]
    fn session_runs_one_generation_at_a_time() {
        let mut session = MapSession::new();
        session.start(small("busy")).unwrap();
        assert!(matches!(session.start(small("busy")), Err(MapError::Busy)));
        assert!(session.wait().unwrap().is_ok());
        assert!(!session.is_busy());
        assert!(session.wait().is_none());
    }
}
