//! Климат: положение карты на глобусе, температура и осадки
//!
//! Всё считается на первичной сетке построчно: строка решётки — это
//! широтная полоса. Осадки переносятся «пакетами» влаги вдоль строк
//! (западные и восточные ветра) и столбцов (северные и южные).

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::MapOptions;
use crate::features::LAND_HEIGHT;
use crate::grid::Grid;
use crate::heightmap::Template;
use crate::random::{chance, gauss, rand_range, round_to};

/// Множители осадков по 5-градусным широтным полосам от экватора к полюсу.
const LATITUDE_MODIFIER: [f64; 18] = [
    4.0, 2.0, 2.0, 2.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 3.0, 3.0, 2.0, 2.0, 1.0, 1.0, 1.0, 0.5,
];
/// Выше этой высоты ветер не переваливает и отдаёт всю влагу.
const MAX_PASSABLE_ELEVATION: u8 = 85;
/// В вечной мерзлоте осадки не переносятся.
const PERMAFROST: i8 = -5;

/// Размер и положение карты на глобусе, в процентах.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapPlacement {
    /// Доля меридиана, которую покрывает карта
    pub size: f64,
    /// 0 — карта у северного полюса, 100 — у южного
    pub latitude: f64,
    pub longitude: f64,
}

impl MapPlacement {
    const WHOLE_WORLD: MapPlacement = MapPlacement {
        size: 100.0,
        latitude: 50.0,
        longitude: 50.0,
    };

    /// Типичный размер карты для шаблона. Если суша не касается края,
    /// некоторые шаблоны с разной вероятностью растягиваются на весь мир.
    pub fn for_template<R: Rng + ?Sized>(
        template: Option<Template>,
        land_touches_border: bool,
        rng: &mut R,
    ) -> Self {
        if !land_touches_border {
            let whole_world = match template {
                Some(Template::Pangea) => 1.0,
                Some(Template::Shattered) => 0.7,
                Some(Template::Continents) => 0.5,
                Some(Template::Archipelago) => 0.35,
                Some(Template::HighIsland) => 0.25,
                Some(Template::LowIsland) => 0.1,
                _ => 0.0,
            };
            if chance(rng, whole_world) {
                return Self::WHOLE_WORLD;
            }
        }

        let max = if land_touches_border { 80.0 } else { 100.0 };
        let size = match template {
            Some(Template::Pangea) => gauss(rng, 70.0, 20.0, 30.0, max, 0),
            Some(Template::Volcano) => gauss(rng, 20.0, 20.0, 10.0, max, 0),
            Some(Template::Mediterranean) => gauss(rng, 25.0, 30.0, 15.0, 80.0, 0),
            Some(Template::Peninsula) => gauss(rng, 15.0, 15.0, 5.0, 80.0, 0),
            Some(Template::Isthmus) => gauss(rng, 15.0, 20.0, 3.0, 80.0, 0),
            Some(Template::Atoll) => gauss(rng, 3.0, 2.0, 1.0, 5.0, 1),
            _ => gauss(rng, 30.0, 20.0, 15.0, max, 0),
        };
        let center = if chance(rng, 0.5) { 40.0 } else { 60.0 };
        let latitude = gauss(rng, center, 20.0, 25.0, 75.0, 0);
        Self {
            size,
            latitude,
            longitude: 50.0,
        }
    }
}

/// Географические границы карты в градусах.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapCoordinates {
    /// Охват по широте
    pub lat_t: f64,
    pub lat_n: f64,
    pub lat_s: f64,
    pub lon_t: f64,
    pub lon_w: f64,
    pub lon_e: f64,
}

impl MapCoordinates {
    #[must_use]
    pub fn new(placement: MapPlacement, width: f64, height: f64) -> Self {
        let lat_shift = placement.latitude / 100.0;
        let lon_shift = placement.longitude / 100.0;
        let lat_t = round_to(placement.size / 100.0 * 180.0, 1);
        let lat_n = round_to(90.0 - (180.0 - lat_t) * lat_shift, 1);
        let lat_s = round_to(lat_n - lat_t, 1);
        let lon_t = round_to((width / height * lat_t).min(360.0), 1);
        let lon_e = round_to(180.0 - (360.0 - lon_t) * lon_shift, 1);
        let lon_w = round_to(lon_e - lon_t, 1);
        Self {
            lat_t,
            lat_n,
            lat_s,
            lon_t,
            lon_w,
            lon_e,
        }
    }

    /// Широта строки решётки.
    fn row_latitude(&self, row: usize, rows: usize) -> f64 {
        self.lat_n - row as f64 / rows as f64 * self.lat_t
    }
}

/// Сглаживание `easePolyInOut` с показателем `exponent`.
fn ease_poly_in_out(t: f64, exponent: f64) -> f64 {
    let t = t * 2.0;
    if t <= 1.0 {
        t.powf(exponent) / 2.0
    } else {
        (2.0 - (2.0 - t).powf(exponent)) / 2.0
    }
}

fn altitude_drop(height: u8, exponent: f64) -> f64 {
    if height < LAND_HEIGHT {
        return 0.0;
    }
    (f64::from(height - 18).powf(exponent) / 1000.0 * 6.5).round()
}

/// Температура по широте строки и высоте ячейки, °C.
#[must_use]
pub fn temperatures(
    grid: &Grid,
    heights: &[u8],
    coords: &MapCoordinates,
    options: &MapOptions,
) -> Vec<i8> {
    let t_eq = options.temperature_equator;
    let t_delta = t_eq - options.temperature_pole;
    let mut temp = vec![0i8; grid.len()];

    for row in 0..grid.cells_y {
        let first = row * grid.cells_x;
        let y = grid.mesh.cells.points[first].y;
        let lat = (coords.lat_n - y / grid.height * coords.lat_t).abs();
        let base = t_eq - ease_poly_in_out(lat / 90.0, 0.5) * t_delta;
        for i in first..first + grid.cells_x {
            let t = base - altitude_drop(heights[i], options.height_exponent);
            temp[i] = t.clamp(-128.0, 127.0) as i8;
        }
    }
    temp
}

/// Одна полоса переноса влаги.
struct Lane {
    first: usize,
    step: isize,
    steps: usize,
    max_prec: f64,
}

fn deposit(cell: &mut u8, amount: f64) {
    *cell = (f64::from(*cell) + amount).clamp(0.0, 255.0) as u8;
}

/// Осадки от преобладающих ветров.
pub fn precipitation<R: Rng + ?Sized>(
    grid: &Grid,
    heights: &[u8],
    temp: &[i8],
    coords: &MapCoordinates,
    options: &MapOptions,
    rng: &mut R,
) -> Vec<u8> {
    let (cx, cy) = (grid.cells_x, grid.cells_y);
    let modifier = (grid.cells_desired as f64 / 10_000.0).powf(0.25) * options.precipitation / 100.0;
    let band = |lat: f64| {
        let index = ((lat.abs() - 1.0) / 5.0).max(0.0) as usize;
        LATITUDE_MODIFIER[index.min(LATITUDE_MODIFIER.len() - 1)]
    };

    let mut lanes = Vec::new();
    let mut westerly = 0;
    let mut easterly = 0;
    let mut northerly = 0;
    let mut southerly = 0;
    for row in 0..cy {
        let lat = coords.row_latitude(row, cy);
        let lat_mod = band(lat);
        let tier = ((lat - 89.0).abs() / 30.0) as usize;
        let angle = options.winds[tier.min(options.winds.len() - 1)];
        let max_prec = (120.0 * modifier * lat_mod).min(255.0);
        if angle > 40.0 && angle < 140.0 {
            westerly += 1;
            lanes.push(Lane {
                first: row * cx,
                step: 1,
                steps: cx,
                max_prec,
            });
        }
        if angle > 220.0 && angle < 320.0 {
            easterly += 1;
            lanes.push(Lane {
                first: row * cx + cx - 1,
                step: -1,
                steps: cx,
                max_prec,
            });
        }
        if angle > 100.0 && angle < 260.0 {
            northerly += 1;
        }
        if angle > 280.0 || angle < 80.0 {
            southerly += 1;
        }
    }

    let vertical = f64::from(northerly + southerly);
    let mean_mod = LATITUDE_MODIFIER.iter().sum::<f64>() / LATITUDE_MODIFIER.len() as f64;
    let edge_mod = |lat: f64| if coords.lat_t > 60.0 { mean_mod } else { band(lat) };
    if northerly > 0 {
        let max_prec = f64::from(northerly) / vertical * 60.0 * modifier * edge_mod(coords.lat_n);
        lanes.extend((0..cx).map(|c| Lane {
            first: c,
            step: cx as isize,
            steps: cy,
            max_prec,
        }));
    }
    if southerly > 0 {
        let max_prec = f64::from(southerly) / vertical * 60.0 * modifier * edge_mod(coords.lat_s);
        lanes.extend((0..cx).map(|c| Lane {
            first: (cy - 1) * cx + c,
            step: -(cx as isize),
            steps: cy,
            max_prec,
        }));
    }
    log::debug!(
        "ветра: западных {westerly}, восточных {easterly}, северных {northerly}, южных {southerly}"
    );

    let mut prec = vec![0u8; grid.len()];
    for lane in &lanes {
        pass_wind(lane, heights, temp, &mut prec, modifier, rng);
    }
    prec
}

/// Проводит пакет влаги вдоль полосы: над водой он набирает влагу, над
/// сушей теряет её тем сильнее, чем круче подъём впереди.
fn pass_wind<R: Rng + ?Sized>(
    lane: &Lane,
    heights: &[u8],
    temp: &[i8],
    prec: &mut [u8],
    modifier: f64,
    rng: &mut R,
) {
    let max_prec = lane.max_prec;
    let mut humidity = max_prec - f64::from(heights[lane.first]);
    if humidity <= 0.0 {
        return;
    }

    let mut current = lane.first as isize;
    for s in 0..lane.steps {
        let i = current as usize;
        current += lane.step;
        let next = (s + 1 < lane.steps).then_some(current as usize);
        if temp[i] < PERMAFROST {
            continue;
        }
        let h = heights[i];
        // за краем полосы рельеф считается ровным
        let h_next = next.map_or(h, |n| heights[n]);

        if h < LAND_HEIGHT {
            match next {
                Some(n) if h_next >= LAND_HEIGHT => {
                    let coastal = (humidity / rand_range(rng, 10.0, 20.0)).max(1.0);
                    deposit(&mut prec[n], coastal);
                }
                _ => {
                    humidity = (humidity + 5.0 * modifier).min(max_prec);
                    deposit(&mut prec[i], 5.0 * modifier);
                }
            }
            continue;
        }

        if h_next > MAX_PASSABLE_ELEVATION {
            deposit(&mut prec[i], humidity);
            break;
        }
        let normal = (humidity / (10.0 * modifier)).max(1.0);
        let rise = f64::from(h_next.saturating_sub(h));
        let slope = (f64::from(h_next) / 70.0).powi(2);
        let rain = (normal + rise * slope).max(1.0).min(humidity);
        deposit(&mut prec[i], rain);
        let evaporation = if rain > 1.5 { 1.0 } else { 0.0 };
        humidity = (humidity - rain + evaporation).clamp(0.0, max_prec);
    }
}
