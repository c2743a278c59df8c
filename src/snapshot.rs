//! Снимок готовой карты
//!
//! Снимок владеет всеми массивами обеих сеток и не меняется после
//! генерации; его можно делить между потоками через `Arc` и выгружать в JSON.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use crate::biome::{Biome, BiomeInfo, biome_table};
use crate::climate::{MapCoordinates, MapPlacement};
use crate::error::Result;
use crate::features::polygon::{clip, isolines};
use crate::features::{FeatureMap, LAND_HEIGHT};
use crate::grid::{Grid, Pack, Point};
use crate::heightmap::Template;
use crate::hydrology::{DepressionResolution, Hydrology};
use crate::random::fnv1a;

/// Шаг полос высот для контуров.
const ELEVATION_BAND: u8 = 10;

/// Нефатальные отклонения, случившиеся при генерации.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum GenerationWarning {
    /// Инструменты рельефа не нашли подходящую стартовую точку и взяли лучшую
    PlacementExhausted { searches: usize },
    /// Впадины остались после всех шагов заполнения
    DepressionsUnresolved { depressions: usize },
    /// Заполнение впадин расходилось и было отменено
    DepressionsFallback { depressions: usize },
}

/// Первичная сетка с её слоями.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridLayer {
    #[serde(flatten)]
    pub grid: Grid,
    pub heights: Vec<u8>,
    pub features: FeatureMap,
    pub temperature: Vec<i8>,
    pub precipitation: Vec<u8>,
}

/// Уточнённая сетка с её слоями.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackLayer {
    #[serde(flatten)]
    pub pack: Pack,
    pub features: FeatureMap,
    pub hydrology: Hydrology,
    pub biomes: Vec<Biome>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSnapshot {
    pub seed: String,
    /// Именованный шаблон; `None` для собственного рецепта
    pub template: Option<Template>,
    pub grid: GridLayer,
    pub pack: PackLayer,
    pub placement: MapPlacement,
    pub coordinates: MapCoordinates,
    /// Береговые линии суши
    pub coastlines: Vec<Vec<Point>>,
    /// Контуры полос высот суши, по нижней границе полосы
    pub elevation_bands: BTreeMap<u8, Vec<Vec<Point>>>,
    /// Контуры биомов суши по номеру биома
    pub biome_contours: BTreeMap<u8, Vec<Vec<Point>>>,
    /// Имена, цвета и пригодность биомов по номеру
    pub biome_table: Vec<BiomeInfo>,
    pub warnings: Vec<GenerationWarning>,
}

impl MapSnapshot {
    /// Собирает снимок и строит контуры.
    #[must_use]
    pub fn assemble(
        seed: String,
        template: Option<Template>,
        grid: GridLayer,
        pack: PackLayer,
        placement: MapPlacement,
        coordinates: MapCoordinates,
        exhausted_searches: usize,
    ) -> Self {
        let mut warnings = Vec::new();
        if exhausted_searches > 0 {
            warnings.push(GenerationWarning::PlacementExhausted {
                searches: exhausted_searches,
            });
        }
        match pack.hydrology.resolution {
            DepressionResolution::Resolved { .. } => {}
            DepressionResolution::Unresolved { depressions } => {
                warnings.push(GenerationWarning::DepressionsUnresolved { depressions });
            }
            DepressionResolution::Fallback { depressions } => {
                warnings.push(GenerationWarning::DepressionsFallback { depressions });
            }
        }

        let coastlines = coastlines(&pack, grid.grid.width, grid.grid.height);
        let mesh = &pack.pack.mesh;
        let heights = &pack.pack.heights;
        let elevation_bands = isolines(mesh, |i| {
            (heights[i] >= LAND_HEIGHT).then(|| heights[i] / ELEVATION_BAND * ELEVATION_BAND)
        });
        let biomes = &pack.biomes;
        let biome_contours = isolines(mesh, |i| {
            (biomes[i] != Biome::Marine).then(|| biomes[i].id())
        });

        for warning in &warnings {
            log::warn!("{warning:?}");
        }

        Self {
            seed,
            template,
            grid,
            pack,
            placement,
            coordinates,
            coastlines,
            elevation_bands,
            biome_contours,
            biome_table: biome_table(),
            warnings,
        }
    }

    /// Контрольная сумма высот обеих сеток.
    #[must_use]
    pub fn height_checksum(&self) -> u64 {
        let mut bytes = self.grid.heights.clone();
        bytes.extend_from_slice(&self.pack.pack.heights);
        fnv1a(&bytes)
    }

    /// Выгружает снимок в JSON.
    pub fn save_as_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }
}

/// Многоугольники суши по цепочкам вершин объектов, обрезанные по холсту.
fn coastlines(pack: &PackLayer, width: f64, height: f64) -> Vec<Vec<Point>> {
    let vertices = &pack.pack.mesh.vertices.points;
    pack.features
        .features
        .iter()
        .filter(|f| f.land && f.vertices.len() > 2)
        .map(|f| {
            let ring: Vec<Point> = f.vertices.iter().map(|&v| vertices[v]).collect();
            clip(&ring, width, height)
        })
        .filter(|ring| ring.len() > 2)
        .collect()
}
