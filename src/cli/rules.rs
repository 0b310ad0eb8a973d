use comfy_table::{Cell, Table};

use crate::categorizer::{assign_category, CategoryMap};
use crate::error::Result;
use crate::settings::load_settings;

fn load_map() -> Result<CategoryMap> {
    let settings = load_settings()?;
    CategoryMap::load(&settings.categories_path())
}

pub fn list() -> Result<()> {
    let map = load_map()?;
    let mut table = Table::new();
    table.set_header(vec!["#", "Category", "Keywords"]);
    for (i, rule) in map.rules().iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&rule.name),
            Cell::new(rule.keywords.join(", ")),
        ]);
    }
    println!("Categories (first match wins)\n{table}");
    Ok(())
}

pub fn test(description: &str) -> Result<()> {
    let map = load_map()?;
    let description = description.trim();
    let category = assign_category((!description.is_empty()).then_some(description), &map);
    println!("{description:?} \u{2192} {category}");
    Ok(())
}
