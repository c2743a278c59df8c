//! Заполнение впадин
//!
//! Чтобы вода всегда находила путь вниз, каждая внутренняя ячейка суши
//! должна быть выше хотя бы одной соседки. Впадины поднимаются итеративно,
//! от низких ячеек к высоким; озёра поднимаются вместе с ними.

use serde::Serialize;

use crate::features::{FeatureKind, FeatureMap, LAND_HEIGHT};
use crate::grid::Mesh;

/// До этой доли шагов поднимаются озёра.
pub const CHECK_LAKE_SHARE: f64 = 0.85;
/// После этой доли шагов поднимаемое озеро объявляется бессточным.
pub const ELEVATE_LAKE_SHARE: f64 = 0.75;
const LAKE_RAISE: f64 = 0.2;
const LAND_RAISE: f64 = 0.1;
/// Сколько шагов подряд число впадин может расти, прежде чем заполнение прервётся.
const PROGRESS_WINDOW: usize = 5;
const MAX_HEIGHT: f64 = 100.0;

/// Итог заполнения впадин.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum DepressionResolution {
    Resolved { iterations: usize },
    /// Шаги кончились раньше, чем впадины
    Unresolved { depressions: usize },
    /// Число впадин росло; высоты возвращены к исходным
    Fallback { depressions: usize },
}

/// Слегка наклоняет сушу от берега: к высоте добавляются кольцо расстояния
/// и среднее кольцо соседей, чтобы на равнинах было куда течь.
#[must_use]
pub fn alter_heights(mesh: &Mesh, heights: &[u8], distance: &[i8]) -> Vec<f64> {
    heights
        .iter()
        .enumerate()
        .map(|(i, &h)| {
            let ring = distance[i];
            if h < LAND_HEIGHT || ring < 1 {
                return f64::from(h);
            }
            let neighbors = &mesh.cells.neighbors[i];
            let mean = neighbors.iter().map(|&c| f64::from(distance[c])).sum::<f64>()
                / neighbors.len().max(1) as f64;
            f64::from(h) + f64::from(ring) / 100.0 + mean / 10_000.0
        })
        .collect()
}

/// Высота стока: для озера — уровень воды, иначе высота ячейки.
pub(crate) fn drain_height(map: &FeatureMap, h: &[f64], cell: usize) -> f64 {
    map.feature_of(cell)
        .lake
        .as_ref()
        .map_or(h[cell], |lake| lake.height)
}

fn lowest_neighbor(mesh: &Mesh, map: &FeatureMap, h: &[f64], cell: usize) -> f64 {
    mesh.cells.neighbors[cell]
        .iter()
        .map(|&c| drain_height(map, h, c))
        .fold(f64::INFINITY, f64::min)
}

/// Число внутренних ячеек суши, не имеющих более низкой соседки.
#[must_use]
pub fn count_depressions(mesh: &Mesh, h: &[f64], map: &FeatureMap) -> usize {
    (0..mesh.len())
        .filter(|&i| h[i] >= f64::from(LAND_HEIGHT) && !mesh.cells.border[i])
        .filter(|&i| {
            let min = lowest_neighbor(mesh, map, h, i);
            min < MAX_HEIGHT && h[i] <= min
        })
        .count()
}

/// Уровень и признак бессточности каждого озера из `lakes`.
fn lake_levels(map: &FeatureMap, lakes: &[usize]) -> Vec<(usize, f64, bool)> {
    lakes
        .iter()
        .filter_map(|&index| {
            map.features[index]
                .lake
                .as_ref()
                .map(|lake| (index, lake.height, lake.closed))
        })
        .collect()
}

fn restore_lake_levels(map: &mut FeatureMap, levels: &[(usize, f64, bool)]) {
    for &(index, height, closed) in levels {
        if let Some(lake) = map.features[index].lake.as_mut() {
            lake.height = height;
            lake.closed = closed;
        }
    }
}

/// Поднимает впадины не более чем за `max_steps` шагов.
///
/// `heights` — исходные высоты ячеек, `h` — наклонённые высоты, которые
/// здесь и поднимаются. Уровни озёр меняются в `map`; при откате к
/// исходным высотам возвращаются и они.
pub fn resolve_depressions(
    mesh: &Mesh,
    heights: &[u8],
    distance: &[i8],
    h: &mut Vec<f64>,
    map: &mut FeatureMap,
    max_steps: usize,
) -> DepressionResolution {
    let check_lakes_until = max_steps as f64 * CHECK_LAKE_SHARE;
    let elevate_lakes_until = max_steps as f64 * ELEVATE_LAKE_SHARE;

    let lakes: Vec<usize> = map
        .features
        .iter()
        .enumerate()
        .filter(|(_, f)| f.kind == FeatureKind::Lake && f.lake.is_some())
        .map(|(index, _)| index)
        .collect();
    let initial_levels = lake_levels(map, &lakes);
    let mut land: Vec<usize> = (0..mesh.len())
        .filter(|&i| h[i] >= f64::from(LAND_HEIGHT) && !mesh.cells.border[i])
        .collect();
    land.sort_by(|&a, &b| h[a].total_cmp(&h[b]));

    let mut progress: Vec<i64> = Vec::new();
    let mut depressions: Option<usize> = None;
    let mut iteration = 0;

    while depressions != Some(0) && iteration < max_steps {
        if progress.len() > PROGRESS_WINDOW && progress.iter().sum::<i64>() > 0 {
            *h = alter_heights(mesh, heights, distance);
            restore_lake_levels(map, &initial_levels);
            let remaining = depressions.unwrap_or_default();
            log::warn!("заполнение впадин расходится, осталось {remaining}; высоты восстановлены");
            return DepressionResolution::Fallback {
                depressions: remaining,
            };
        }

        let mut count = 0usize;
        if (iteration as f64) < check_lakes_until {
            for &index in &lakes {
                let Some(lake) = map.features[index].lake.as_mut() else {
                    continue;
                };
                if lake.closed {
                    continue;
                }
                let min = lake.shoreline.iter().map(|&s| h[s]).fold(f64::INFINITY, f64::min);
                if min >= MAX_HEIGHT || lake.height > min {
                    continue;
                }
                if iteration as f64 > elevate_lakes_until {
                    for &s in &lake.shoreline {
                        h[s] = f64::from(heights[s]);
                    }
                    let min = lake.shoreline.iter().map(|&s| h[s]).fold(f64::INFINITY, f64::min);
                    lake.height = min - 1.0;
                    lake.closed = true;
                    continue;
                }
                count += 1;
                lake.height = min + LAKE_RAISE;
            }
        }

        for &i in &land {
            let min = lowest_neighbor(mesh, map, h, i);
            if min >= MAX_HEIGHT || h[i] > min {
                continue;
            }
            count += 1;
            h[i] = min + LAND_RAISE;
        }

        if let Some(previous) = depressions {
            progress.push(count as i64 - previous as i64);
        }
        depressions = Some(count);
        iteration += 1;
    }

    match depressions {
        Some(0) => {
            log::debug!("впадины заполнены за {iteration} шагов");
            DepressionResolution::Resolved {
                iterations: iteration,
            }
        }
        Some(remaining) => {
            log::warn!("осталось незаполненных впадин: {remaining}");
            DepressionResolution::Unresolved {
                depressions: remaining,
            }
        }
        None => DepressionResolution::Unresolved {
            depressions: count_depressions(mesh, h, map),
        },
    }
}
