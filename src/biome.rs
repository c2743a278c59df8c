use serde::{Deserialize, Serialize};

use crate::features::LAND_HEIGHT;
use crate::grid::Pack;
use crate::hydrology::Hydrology;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Biome {
    Marine = 0,
    HotDesert = 1,
    ColdDesert = 2,
    Savanna = 3,
    Grassland = 4,
    TropicalSeasonalForest = 5,
    TemperateDeciduousForest = 6,
    TropicalRainforest = 7,
    TemperateRainforest = 8,
    Taiga = 9,
    Tundra = 10,
    Glacier = 11,
    Wetland = 12,
}

use Biome::{
    ColdDesert as CD, Grassland as GL, HotDesert as HD, Savanna as SV, Taiga as TG,
    TemperateDeciduousForest as TDF, TemperateRainforest as TRF, TropicalRainforest as TR,
    TropicalSeasonalForest as TSF, Tundra as TN,
};

/// Биом по влажности (строки, шаг 5) и холоду (столбцы, `20 − t`).
#[rustfmt::skip]
const MATRIX: [[Biome; 26]; 5] = [
    [HD, HD, HD, HD, HD, HD, HD, HD, HD, HD, HD, HD, HD, HD, HD, HD, CD, CD, CD, CD, CD, TN, TN, TN, TN, TN],
    [SV, SV, SV, GL, GL, GL, GL, GL, GL, GL, GL, GL, GL, GL, GL, GL, TG, TG, TG, TG, TG, TN, TN, TN, TN, TN],
    [TSF, TDF, TDF, TDF, TDF, TDF, TDF, TDF, TDF, TDF, TDF, TDF, TDF, TDF, TDF, TDF, TG, TG, TG, TG, TG, TN, TN, TN, TN, TN],
    [TSF, TDF, TDF, TDF, TDF, TDF, TDF, TRF, TRF, TRF, TRF, TRF, TRF, TRF, TRF, TRF, TG, TG, TG, TG, TG, TN, TN, TN, TN, TN],
    [TR, TR, TR, TR, TR, TR, TR, TRF, TRF, TRF, TRF, TRF, TRF, TRF, TRF, TRF, TG, TG, TG, TG, TG, TN, TN, TN, TN, TN],
];

/// Ниже этой температуры суша покрыта ледником.
const GLACIER_TEMPERATURE: i8 = -5;
const WETLAND_MIN_TEMPERATURE: i8 = -2;

impl Biome {
    pub const ALL: [Biome; 13] = [
        Biome::Marine,
        Biome::HotDesert,
        Biome::ColdDesert,
        Biome::Savanna,
        Biome::Grassland,
        Biome::TropicalSeasonalForest,
        Biome::TemperateDeciduousForest,
        Biome::TropicalRainforest,
        Biome::TemperateRainforest,
        Biome::Taiga,
        Biome::Tundra,
        Biome::Glacier,
        Biome::Wetland,
    ];

    #[must_use]
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Biome::Marine => "Marine",
            Biome::HotDesert => "Hot desert",
            Biome::ColdDesert => "Cold desert",
            Biome::Savanna => "Savanna",
            Biome::Grassland => "Grassland",
            Biome::TropicalSeasonalForest => "Tropical seasonal forest",
            Biome::TemperateDeciduousForest => "Temperate deciduous forest",
            Biome::TropicalRainforest => "Tropical rainforest",
            Biome::TemperateRainforest => "Temperate rainforest",
            Biome::Taiga => "Taiga",
            Biome::Tundra => "Tundra",
            Biome::Glacier => "Glacier",
            Biome::Wetland => "Wetland",
        }
    }

    pub fn to_rgb(&self) -> [u8; 3] {
        match self {
            Biome::Marine => [0x46, 0x6e, 0xab],
            Biome::HotDesert => [0xfb, 0xe7, 0x9f],
            Biome::ColdDesert => [0xb5, 0xb8, 0x87],
            Biome::Savanna => [0xd2, 0xd0, 0x82],
            Biome::Grassland => [0xc8, 0xd6, 0x8f],
            Biome::TropicalSeasonalForest => [0xb6, 0xd9, 0x5d],
            Biome::TemperateDeciduousForest => [0x29, 0xbc, 0x56],
            Biome::TropicalRainforest => [0x7d, 0xcb, 0x35],
            Biome::TemperateRainforest => [0x40, 0x9c, 0x43],
            Biome::Taiga => [0x4b, 0x6b, 0x32],
            Biome::Tundra => [0x96, 0x78, 0x4b],
            Biome::Glacier => [0xd5, 0xe7, 0xeb],
            Biome::Wetland => [0x0b, 0x91, 0x31],
        }
    }

    /// Пригодность для жизни, 0–100
    pub fn habitability(self) -> u8 {
        match self {
            Biome::Marine | Biome::Glacier => 0,
            Biome::HotDesert | Biome::Tundra => 4,
            Biome::ColdDesert => 10,
            Biome::Savanna => 22,
            Biome::Grassland => 30,
            Biome::TropicalSeasonalForest => 50,
            Biome::TemperateDeciduousForest => 100,
            Biome::TropicalRainforest => 80,
            Biome::TemperateRainforest => 90,
            Biome::Taiga | Biome::Wetland => 12,
        }
    }
}

/// Строка таблицы биомов для потребителей снимка.
#[derive(Debug, Clone, Serialize)]
pub struct BiomeInfo {
    pub id: u8,
    pub name: &'static str,
    pub color: [u8; 3],
    pub habitability: u8,
}

/// Таблица всех биомов в порядке номеров.
#[must_use]
pub fn biome_table() -> Vec<BiomeInfo> {
    Biome::ALL
        .iter()
        .map(|&biome| BiomeInfo {
            id: biome.id(),
            name: biome.name(),
            color: biome.to_rgb(),
            habitability: biome.habitability(),
        })
        .collect()
}

fn is_wetland(moisture: u16, temperature: i8, height: u8) -> bool {
    if temperature <= WETLAND_MIN_TEMPERATURE {
        return false;
    }
    (moisture > 40 && height < 25) || (moisture > 24 && height > 24 && height < 60)
}

/// Биом по влажности, температуре и высоте. Определён для любых входов.
#[must_use]
pub fn classify(moisture: u16, temperature: i8, height: u8) -> Biome {
    if is_wetland(moisture, temperature, height) {
        return Biome::Wetland;
    }
    if height < LAND_HEIGHT {
        return Biome::Marine;
    }
    if temperature < GLACIER_TEMPERATURE {
        return Biome::Glacier;
    }
    let band = usize::from(moisture / 5).min(MATRIX.len() - 1);
    let cold = (20 - i32::from(temperature)).clamp(0, 25) as usize;
    MATRIX[band][cold]
}

/// Влажность ячейки уточнённой сетки. `prec` задан на первичной сетке.
fn moisture(pack: &Pack, hydrology: &Hydrology, prec: &[u8], cell: usize) -> u16 {
    if pack.heights[cell] < LAND_HEIGHT {
        return 0;
    }
    let mut own = f64::from(prec[pack.grid_ref[cell]]);
    if hydrology.river_ids[cell] != 0 {
        own += (hydrology.flux[cell] / 20.0).max(2.0);
    }
    let around: Vec<f64> = pack.mesh.cells.neighbors[cell]
        .iter()
        .filter(|&&c| pack.heights[c] >= LAND_HEIGHT)
        .map(|&c| f64::from(prec[pack.grid_ref[c]]))
        .chain(std::iter::once(own))
        .collect();
    let mean = around.iter().sum::<f64>() / around.len() as f64;
    (4.0 + mean).round().clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Назначает биомы ячейкам уточнённой сетки
pub fn assign_biomes(pack: &Pack, hydrology: &Hydrology, prec: &[u8], temp: &[i8]) -> Vec<Biome> {
    let biome = |i: usize| {
        let t = temp[pack.grid_ref[i]];
        classify(moisture(pack, hydrology, prec, i), t, pack.heights[i])
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..pack.len()).into_par_iter().map(biome).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..pack.len()).map(biome).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_input_has_a_biome() {
        for moisture in [0u16, 3, 24, 25, 41, 200, u16::MAX] {
            for temperature in [i8::MIN, -30, -5, -2, 0, 10, 20, 35, i8::MAX] {
                for height in [0u8, 19, 20, 24, 25, 59, 60, 100, u8::MAX] {
                    let biome = classify(moisture, temperature, height);
                    assert!(Biome::ALL.contains(&biome));
                }
            }
        }
    }

    #[test]
    fn water_is_marine_unless_marshy() {
        assert_eq!(classify(0, 15, 5), Biome::Marine);
        assert_eq!(classify(50, 15, 19), Biome::Wetland);
        assert_eq!(classify(50, -10, 19), Biome::Marine);
    }

    #[test]
    fn cold_land_is_glacier() {
        assert_eq!(classify(10, -6, 40), Biome::Glacier);
        assert_eq!(classify(10, -5, 40), Biome::Tundra);
    }

    #[test]
    fn matrix_corners() {
        assert_eq!(classify(0, 30, 40), Biome::HotDesert);
        assert_eq!(classify(24, 30, 40), Biome::TropicalRainforest);
        assert_eq!(classify(14, 15, 70), Biome::TemperateDeciduousForest);
        assert_eq!(classify(14, 15, 30), Biome::TemperateDeciduousForest);
        assert_eq!(classify(5, 0, 70), Biome::Taiga);
    }

    #[test]
    fn ids_follow_table_order() {
        for (i, biome) in Biome::ALL.iter().enumerate() {
            assert_eq!(usize::from(biome.id()), i);
        }
        assert_eq!(Biome::TemperateDeciduousForest.habitability(), 100);
        assert_eq!(Biome::Glacier.name(), "Glacier");
    }

    #[test]
    fn table_lists_every_biome() {
        let table = biome_table();
        assert_eq!(table.len(), Biome::ALL.len());
        for (row, biome) in table.iter().zip(Biome::ALL) {
            assert_eq!(row.id, biome.id());
            assert_eq!(row.color, biome.to_rgb());
        }
        assert_eq!(table[usize::from(Biome::Marine.id())].habitability, 0);
    }
}
