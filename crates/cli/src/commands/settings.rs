//! `sleuth settings` — Show the effective configuration.

use sleuth_config::AppConfig;

pub fn run(config: &AppConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render(config, json)?);
    Ok(())
}

/// Render with every secret redacted.
fn render(config: &AppConfig, json: bool) -> Result<String, Box<dyn std::error::Error>> {
    let redacted = config.redacted();
    if json {
        return Ok(serde_json::to_string_pretty(&redacted)?);
    }

    let mut out = vec!["Current Settings:".to_string()];
    out.push(format!("  Provider:        {}", redacted.default_provider));
    out.push(format!("  Model:           {}", redacted.default_model));
    out.push(format!("  Evaluator model: {}", redacted.evaluator_model()));
    out.push(format!(
        "  API key:         {}",
        redacted.api_key.as_deref().unwrap_or("(not set)")
    ));
    out.push(String::new());
    out.push(toml::to_string_pretty(&redacted)?);
    Ok(out.join("\n"))
}
