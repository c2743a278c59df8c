// src/config.rs
//! Параметры генерации карты
//!
//! Модуль описывает всё, что управляет генерацией:
//! - размеры холста и плотность сетки
//! - шаблон рельефа (именованный или собственный рецепт)
//! - климат: температуры, осадки, ветра, положение на глобусе
//! - гидрологию: порог озёр во впадинах, шаги заполнения, эрозию
//!
//! Структура читается из TOML; отсутствующие поля получают значения по умолчанию.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{MapError, Result};
use crate::heightmap::Template;

/// Основные параметры генерации карты
///
/// Одинаковые параметры (включая `seed`) дают одинаковую карту.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapOptions {
    /// Сид генератора случайных чисел
    #[serde(default = "default_seed")]
    pub seed: String,

    /// Желаемое число ячеек первичной сетки
    #[serde(default = "default_cells")]
    pub cells: usize,

    /// Ширина холста (по умолчанию 960)
    #[serde(default = "default_width")]
    pub width: f64,

    /// Высота холста (по умолчанию 540)
    #[serde(default = "default_height")]
    pub height: f64,

    /// Насколько вода должна подняться, чтобы вытечь из впадины:
    /// - меньше — больше озёр во впадинах,
    /// - `80` — впадины в озёра не превращаются.
    #[serde(default = "default_lake_elevation_limit")]
    pub lake_elevation_limit: u8,

    /// Температура на экваторе на уровне моря, °C
    #[serde(default = "default_temperature_equator")]
    pub temperature_equator: f64,

    /// Температура на полюсе на уровне моря, °C
    #[serde(default = "default_temperature_pole")]
    pub temperature_pole: f64,

    /// Показатель степени высоты при пересчёте в метры (влияет на
    /// охлаждение с высотой и испарение озёр)
    #[serde(default = "default_height_exponent")]
    pub height_exponent: f64,

    /// Количество осадков в процентах от нормы
    #[serde(default = "default_precipitation")]
    pub precipitation: f64,

    /// Направления преобладающих ветров (градусы) по шести 30-градусным
    /// ярусам широт с севера на юг
    #[serde(default = "default_winds")]
    pub winds: [f64; 6],

    /// Максимум итераций заполнения впадин
    #[serde(default = "default_resolve_depressions_steps")]
    pub resolve_depressions_steps: usize,

    /// Шаблон рельефа; без него выбирается случайный с учётом весов
    #[serde(default)]
    pub template: Option<Template>,

    /// Собственный рецепт рельефа, по шагу на строку; важнее `template`
    #[serde(default)]
    pub custom_template: Option<String>,

    /// Речная эрозия
    #[serde(default = "default_allow_erosion")]
    pub allow_erosion: bool,

    /// Размер карты в процентах от меридиана (иначе — по шаблону)
    #[serde(default)]
    pub map_size: Option<f64>,

    /// Сдвиг по широте в процентах: 0 — у северного полюса
    #[serde(default)]
    pub latitude: Option<f64>,

    /// Сдвиг по долготе в процентах
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl MapOptions {
    /// Загружает параметры из TOML-файла
    ///
    /// # Пример
    /// ```toml
    /// # map.toml
    /// seed = "abc"
    /// cells = 10000
    /// width = 800
    /// height = 600
    /// template = "continents"
    /// ```
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let options: Self = toml::from_str(&contents)?;
        options.validate()?;
        Ok(options)
    }

    /// Проверяет параметры до начала генерации.
    pub fn validate(&self) -> Result<()> {
        if self.cells == 0 {
            return Err(MapError::Configuration("число ячеек должно быть больше нуля".into()));
        }
        if !(self.width > 0.0 && self.height > 0.0) {
            return Err(MapError::Configuration(format!(
                "размер холста {}×{} должен быть положительным",
                self.width, self.height
            )));
        }
        if self.temperature_pole > self.temperature_equator {
            return Err(MapError::Configuration(
                "на полюсе не может быть теплее, чем на экваторе".into(),
            ));
        }
        if self.precipitation < 0.0 {
            return Err(MapError::Configuration("осадки не могут быть отрицательными".into()));
        }
        for (name, value) in [
            ("map_size", self.map_size),
            ("latitude", self.latitude),
            ("longitude", self.longitude),
        ] {
            if let Some(v) = value.filter(|v| !(0.0..=100.0).contains(v)) {
                return Err(MapError::Configuration(format!(
                    "{name} = {v}: ожидается процент от 0 до 100"
                )));
            }
        }
        Ok(())
    }
}

fn default_seed() -> String {
    "1".to_string()
}
fn default_cells() -> usize {
    10_000
}
fn default_width() -> f64 {
    960.0
}
fn default_height() -> f64 {
    540.0
}
fn default_lake_elevation_limit() -> u8 {
    20
}
fn default_temperature_equator() -> f64 {
    27.0
}
fn default_temperature_pole() -> f64 {
    -30.0
}
fn default_height_exponent() -> f64 {
    2.0
}
fn default_precipitation() -> f64 {
    100.0
}
fn default_winds() -> [f64; 6] {
    [225.0, 45.0, 225.0, 315.0, 135.0, 315.0]
}
fn default_resolve_depressions_steps() -> usize {
    250
}
fn default_allow_erosion() -> bool {
    true
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            cells: default_cells(),
            width: default_width(),
            height: default_height(),
            lake_elevation_limit: default_lake_elevation_limit(),
            temperature_equator: default_temperature_equator(),
            temperature_pole: default_temperature_pole(),
            height_exponent: default_height_exponent(),
            precipitation: default_precipitation(),
            winds: default_winds(),
            resolve_depressions_steps: default_resolve_depressions_steps(),
            template: None,
            custom_template: None,
            allow_erosion: default_allow_erosion(),
            map_size: None,
            latitude: None,
            longitude: None,
        }
    }
}
