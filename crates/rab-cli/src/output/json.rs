use rab_core::error::RabError;
use rab_core::model::AnalysisResult;

pub fn print(result: &AnalysisResult) -> Result<(), RabError> {
    let json = serde_json::to_string_pretty(result)?;
    println!("{json}");
    Ok(())
}
