use std::path::PathBuf;

use crate::categorizer::CategoryMap;
use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, settings_file_exists, shellexpand_path};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings()?;

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    } else if !settings_file_exists() {
        // First run, ask where data should live
        println!("Data directory [{}]: ", settings.data_dir);
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        let chosen = input.trim();
        if !chosen.is_empty() {
            settings.data_dir = shellexpand_path(chosen);
        }
    }

    save_settings(&settings)?;

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;
    std::fs::create_dir_all(settings.uploads_dir())?;

    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;

    let categories_path = settings.categories_path();
    if categories_path.exists() {
        println!("Using existing category map at {}", categories_path.display());
    } else {
        let json = CategoryMap::default_map().to_json_pretty()?;
        std::fs::write(&categories_path, format!("{json}\n"))?;
        println!("Wrote starter category map to {}", categories_path.display());
    }

    println!("Initialized spendlens at {}", resolved.display());
    Ok(())
}
