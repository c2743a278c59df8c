//! Ошибки генерации карты

/// Ошибки, прерывающие генерацию или загрузку конфигурации.
///
/// Нефатальные ситуации (несошедшееся заполнение впадин, исчерпанные попытки
/// размещения холмов) ошибками не являются и попадают в
/// [`GenerationWarning`](crate::snapshot::GenerationWarning).
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    /// Бессмысленные размеры холста или число ячеек.
    #[error("некорректная конфигурация: {0}")]
    Configuration(String),

    /// Триангуляция по заданным точкам не строится.
    #[error("вырожденная геометрия: не удалось триангулировать {points} точек")]
    Geometry { points: usize },

    /// Неизвестное имя шаблона рельефа.
    #[error("неизвестный шаблон рельефа: {0}")]
    UnknownTemplate(String),

    /// Строка рецепта рельефа не разбирается.
    #[error("некорректный шаг рецепта `{line}`: {reason}")]
    InvalidStep { line: String, reason: String },

    /// Предыдущая генерация в сессии ещё не завершена.
    #[error("генерация уже выполняется")]
    Busy,

    /// Рабочий поток генерации завершился паникой.
    #[error("рабочий поток генерации аварийно завершился")]
    WorkerPanicked,

    #[error("ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("ошибка разбора TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("ошибка JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MapError>;
