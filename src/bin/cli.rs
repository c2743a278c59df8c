use clap::Parser;
use mapgen::{MapOptions, Template, generate};
use std::path::PathBuf;

/// Генератор материков: рельеф, климат, реки и биомы
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к конфигурационному файлу в формате TOML
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Сид (заменяет сид из конфигурации)
    #[arg(short, long)]
    seed: Option<String>,

    /// Шаблон рельефа, например `continents` или `atoll`
    #[arg(short, long)]
    template: Option<Template>,

    /// Путь для сохранения снимка карты (по умолчанию: ./map.json)
    #[arg(short, long, default_value = "map.json")]
    output: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut options = match &cli.config {
        Some(path) => {
            log::info!("Загрузка конфигурации из {}", path.display());
            MapOptions::from_toml_file(path)?
        }
        None => MapOptions::default(),
    };
    if let Some(seed) = cli.seed {
        options.seed = seed;
    }
    if let Some(template) = cli.template {
        options.template = Some(template);
        options.custom_template = None;
    }

    println!(
        "Генерация карты {}×{}, {} ячеек...",
        options.width, options.height, options.cells
    );
    let snapshot = generate(&options)?;

    for warning in &snapshot.warnings {
        println!("  предупреждение: {warning:?}");
    }
    println!(
        "Рек: {}, объектов: {}",
        snapshot.pack.hydrology.rivers.len(),
        snapshot.pack.features.features.len()
    );

    println!("Сохранение в {}", cli.output.display());
    snapshot.save_as_json(&cli.output)?;

    println!("\nГотово! Снимок карты сохранён.");
    Ok(())
}
