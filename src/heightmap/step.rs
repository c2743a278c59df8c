//! Шаги рецепта рельефа и их текстовая запись
//!
//! Шаг записывается строкой из пяти полей: инструмент и до четырёх
//! параметров, например `Hill 1 90-100 44-56 40-60` или `Add 7 all 0 0`.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};
use crate::random::{chance, rand_range};

/// Число или диапазон `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Amount {
    Fixed(f64),
    Range(f64, f64),
}

impl Amount {
    /// Конкретное значение: целая часть фиксированного числа плюс единица с
    /// вероятностью дробной части; для диапазона — случайное целое.
    pub fn resolve<R: Rng + ?Sized>(self, rng: &mut R) -> f64 {
        match self {
            Amount::Fixed(value) => {
                let whole = value.trunc();
                whole + if chance(rng, value - whole) { 1.0 } else { 0.0 }
            }
            Amount::Range(min, max) => rand_range(rng, min, max),
        }
    }
}

impl FromStr for Amount {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Ok(value) = s.parse::<f64>() {
            return Ok(Amount::Fixed(value));
        }
        let (sign, rest) = match s.strip_prefix('-') {
            Some(rest) => (-1.0, rest),
            None => (1.0, s),
        };
        let (min, max) = rest
            .split_once('-')
            .ok_or_else(|| format!("`{s}` не число и не диапазон"))?;
        let min: f64 = min.parse().map_err(|_| format!("`{s}`: плохая нижняя граница"))?;
        let max: f64 = max.parse().map_err(|_| format!("`{s}`: плохая верхняя граница"))?;
        Ok(Amount::Range(min * sign, max))
    }
}

/// Полоса холста в процентах: `44-56`, `50` или `0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub min: f64,
    pub max: f64,
}

impl Span {
    pub const ALL: Span = Span { min: 0.0, max: 100.0 };

    /// Случайная координата внутри полосы для холста длиной `length`.
    pub fn pick<R: Rng + ?Sized>(self, length: f64, rng: &mut R) -> f64 {
        rand_range(rng, self.min / 100.0 * length, self.max / 100.0 * length)
    }
}

impl FromStr for Span {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.parse::<f64>()
                .map_err(|_| format!("`{s}` не является полосой в процентах"))
        };
        match s.split_once('-') {
            Some((min, max)) => Ok(Span {
                min: parse(min)?,
                max: parse(max)?,
            }),
            None => {
                let v = parse(s)?;
                Ok(Span { min: v, max: v })
            }
        }
    }
}

/// Диапазон высот, к которому применяется `Add` / `Multiply`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HeightBand {
    /// Вся суша; значения не опускаются ниже уровня моря
    Land,
    All,
    Between(f64, f64),
}

impl HeightBand {
    #[must_use]
    pub fn bounds(self) -> (f64, f64) {
        match self {
            HeightBand::Land => (20.0, 100.0),
            HeightBand::All => (0.0, 100.0),
            HeightBand::Between(min, max) => (min, max),
        }
    }
}

impl FromStr for HeightBand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "land" => Ok(HeightBand::Land),
            "all" => Ok(HeightBand::All),
            _ => {
                let (min, max) = s
                    .split_once('-')
                    .ok_or_else(|| format!("`{s}` не является диапазоном высот"))?;
                let min = min.parse().map_err(|_| format!("`{s}`: нижняя граница"))?;
                let max = max.parse().map_err(|_| format!("`{s}`: верхняя граница"))?;
                Ok(HeightBand::Between(min, max))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StraitDirection {
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvertAxis {
    X,
    Y,
    Both,
}

/// Один инструмент рецепта со своими параметрами.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HeightmapStep {
    Hill { count: Amount, height: Amount, x: Span, y: Span },
    Pit { count: Amount, height: Amount, x: Span, y: Span },
    Range { count: Amount, height: Amount, x: Span, y: Span },
    Trough { count: Amount, height: Amount, x: Span, y: Span },
    Strait { width: Amount, direction: StraitDirection },
    Mask { power: f64 },
    Invert { probability: f64, axis: InvertAxis },
    Add { value: f64, band: HeightBand },
    Multiply { factor: f64, band: HeightBand },
    Smooth { power: f64 },
}

impl HeightmapStep {
    #[must_use]
    pub fn tool(&self) -> &'static str {
        match self {
            HeightmapStep::Hill { .. } => "Hill",
            HeightmapStep::Pit { .. } => "Pit",
            HeightmapStep::Range { .. } => "Range",
            HeightmapStep::Trough { .. } => "Trough",
            HeightmapStep::Strait { .. } => "Strait",
            HeightmapStep::Mask { .. } => "Mask",
            HeightmapStep::Invert { .. } => "Invert",
            HeightmapStep::Add { .. } => "Add",
            HeightmapStep::Multiply { .. } => "Multiply",
            HeightmapStep::Smooth { .. } => "Smooth",
        }
    }
}

impl fmt::Display for HeightmapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tool())
    }
}

impl FromStr for HeightmapStep {
    type Err = MapError;

    fn from_str(line: &str) -> Result<Self> {
        let invalid = |reason: String| MapError::InvalidStep {
            line: line.to_string(),
            reason,
        };
        let fields: Vec<&str> = line.split_whitespace().collect();
        let arg = |i: usize| -> Result<&str> {
            fields
                .get(i)
                .copied()
                .ok_or_else(|| invalid(format!("нет параметра №{i}")))
        };
        let number = |i: usize| -> Result<f64> {
            arg(i)?
                .parse::<f64>()
                .map_err(|_| invalid(format!("параметр №{i} не число")))
        };
        let amount = |i: usize| -> Result<Amount> { arg(i)?.parse().map_err(invalid) };
        let span = |i: usize| -> Result<Span> { arg(i)?.parse().map_err(invalid) };
        let band = |i: usize| -> Result<HeightBand> { arg(i)?.parse().map_err(invalid) };

        let tool = arg(0)?;
        let step = match tool {
            "Hill" | "Pit" | "Range" | "Trough" => {
                let (count, height, x, y) = (amount(1)?, amount(2)?, span(3)?, span(4)?);
                match tool {
                    "Hill" => HeightmapStep::Hill { count, height, x, y },
                    "Pit" => HeightmapStep::Pit { count, height, x, y },
                    "Range" => HeightmapStep::Range { count, height, x, y },
                    _ => HeightmapStep::Trough { count, height, x, y },
                }
            }
            "Strait" => HeightmapStep::Strait {
                width: amount(1)?,
                direction: match arg(2)? {
                    "vertical" => StraitDirection::Vertical,
                    "horizontal" => StraitDirection::Horizontal,
                    other => return Err(invalid(format!("направление `{other}`"))),
                },
            },
            "Mask" => HeightmapStep::Mask { power: number(1)? },
            "Invert" => HeightmapStep::Invert {
                probability: number(1)?,
                axis: match arg(2)? {
                    "x" => InvertAxis::X,
                    "y" => InvertAxis::Y,
                    "both" => InvertAxis::Both,
                    other => return Err(invalid(format!("ось `{other}`"))),
                },
            },
            "Add" => HeightmapStep::Add {
                value: number(1)?,
                band: band(2)?,
            },
            "Multiply" => HeightmapStep::Multiply {
                factor: number(1)?,
                band: band(2)?,
            },
            "Smooth" => HeightmapStep::Smooth { power: number(1)? },
            other => return Err(invalid(format!("неизвестный инструмент `{other}`"))),
        };
        Ok(step)
    }
}

/// Разбирает рецепт: по шагу на строку, пустые строки пропускаются.
pub fn parse_recipe(text: &str) -> Result<Vec<HeightmapStep>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hill() {
        let step: HeightmapStep = "Hill 1 90-100 44-56 40-60".parse().unwrap();
        assert_eq!(
            step,
            HeightmapStep::Hill {
                count: Amount::Fixed(1.0),
                height: Amount::Range(90.0, 100.0),
                x: Span { min: 44.0, max: 56.0 },
                y: Span { min: 40.0, max: 60.0 },
            }
        );
    }

    #[test]
    fn parses_bands_and_negative_values() {
        let step: HeightmapStep = "Add -20 30-100 0 0".parse().unwrap();
        assert_eq!(
            step,
            HeightmapStep::Add {
                value: -20.0,
                band: HeightBand::Between(30.0, 100.0)
            }
        );
        let step: HeightmapStep = "Multiply 0.8 land 0 0".parse().unwrap();
        assert_eq!(
            step,
            HeightmapStep::Multiply {
                factor: 0.8,
                band: HeightBand::Land
            }
        );
        assert_eq!("-5-10".parse::<Amount>().unwrap(), Amount::Range(-5.0, 10.0));
    }

    #[test]
    fn rejects_unknown_tool() {
        let err = "Volcano 1 2 3 4".parse::<HeightmapStep>().unwrap_err();
        assert!(matches!(err, MapError::InvalidStep { .. }));
    }

    #[test]
    fn fixed_fraction_adds_probabilistic_pass() {
        let mut rng = crate::random::rng_from_seed("amount");
        let values: Vec<f64> = (0..200).map(|_| Amount::Fixed(1.5).resolve(&mut rng)).collect();
        assert!(values.iter().all(|&v| v == 1.0 || v == 2.0));
        assert!(values.contains(&1.0) && values.contains(&2.0));
    }
}
