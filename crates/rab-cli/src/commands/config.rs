use rab_core::config::ExtractionConfig;
use rab_core::error::RabError;

pub fn print_default() -> Result<(), RabError> {
    let json = serde_json::to_string_pretty(&ExtractionConfig::default())?;
    println!("{json}");
    Ok(())
}
