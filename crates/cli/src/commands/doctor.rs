//! `sleuth doctor` — Diagnose setup problems.

use sleuth_config::AppConfig;
use sleuth_core::error::ProviderError;
use std::path::Path;

#[derive(Debug, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
}

impl Status {
    fn label(&self) -> &'static str {
        match self {
            Status::Ok => "ok   ",
            Status::Warn => "warn ",
            Status::Fail => "FAIL ",
        }
    }
}

/// Judge the provider's model listing against the configured model.
fn model_check(model: &str, listing: &Result<Vec<String>, ProviderError>) -> (Status, String) {
    match listing {
        Ok(models) if models.is_empty() => (
            Status::Ok,
            "Provider reachable (model list not published)".to_string(),
        ),
        Ok(models) if models.iter().any(|m| m == model) => {
            (Status::Ok, format!("Provider reachable, model {model} available"))
        }
        Ok(models) => (
            Status::Warn,
            format!(
                "Provider reachable, but model {model} is not among its {} models",
                models.len()
            ),
        ),
        Err(e) => (Status::Fail, format!("Provider unreachable: {e}")),
    }
}

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Sleuth Doctor — System Diagnostics");
    println!("==================================\n");

    let mut issues = 0;

    let default_path = AppConfig::config_path();
    let path = config_path.unwrap_or(&default_path);
    if path.exists() {
        println!("  ok    Config file found: {}", path.display());
    } else {
        println!("  warn  No config file, using defaults. Run `sleuth onboard`");
    }

    let config = match AppConfig::load_with(config_path) {
        Ok(config) => {
            println!("  ok    Configuration valid");
            config
        }
        Err(e) => {
            println!("  FAIL  {e}");
            println!("\n  1 issue found. Fix the config before running other checks.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ok    API key configured");
    } else {
        println!("  FAIL  No API key. Set SLEUTH_API_KEY, OPENAI_API_KEY or OPENROUTER_API_KEY");
        issues += 1;
    }

    match sleuth_providers::build_provider(&config) {
        Ok(provider) => {
            println!("  ok    Provider '{}' configured", provider.name());
            let listing = provider.list_models().await;
            let (status, message) = model_check(&config.default_model, &listing);
            println!("  {} {message}", status.label());
            if status == Status::Fail {
                issues += 1;
            }
        }
        Err(e) => {
            println!("  FAIL  Provider '{}': {e}", config.default_provider);
            issues += 1;
        }
    }

    println!("  ok    Search backend: {}", config.search.backend);

    match sleuth_tools::sandbox_from_config(&config).probe().await {
        Ok(version) => println!("  ok    Python: {version}"),
        Err(e) => {
            println!("  FAIL  {e} (needed by `sleuth code`)");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listed_model_is_ok() {
        let listing = Ok(vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()]);
        let (status, message) = model_check("gpt-4o-mini", &listing);
        assert_eq!(status, Status::Ok);
        assert!(message.contains("gpt-4o-mini available"));
    }

    #[test]
    fn unlisted_model_warns() {
        let listing = Ok(vec!["llama3".to_string()]);
        let (status, _) = model_check("gpt-4o-mini", &listing);
        assert_eq!(status, Status::Warn);
    }

    #[test]
    fn empty_listing_is_reachable() {
        let (status, _) = model_check("anything", &Ok(Vec::new()));
        assert_eq!(status, Status::Ok);
    }

    #[test]
    fn auth_failure_fails() {
        let listing = Err(ProviderError::AuthenticationFailed("bad key".into()));
        let (status, message) = model_check("gpt-4o-mini", &listing);
        assert_eq!(status, Status::Fail);
        assert!(message.contains("bad key"));
    }
}
