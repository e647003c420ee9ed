//! `sleuth onboard` — First-time setup.

use sleuth_config::AppConfig;
use std::path::Path;

pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let default_path = AppConfig::config_path();
    let config_path = config_path.unwrap_or(&default_path);

    println!("Sleuth — First-Time Setup");
    println!("=========================\n");

    if write_default(config_path)? {
        println!("Created config at: {}", config_path.display());
        println!("\nNext steps:");
        println!("   1. Set SLEUTH_API_KEY or add api_key to {}", config_path.display());
        println!("   2. Run: sleuth doctor");
        println!("   3. Run: sleuth research \"your question\"\n");
    } else {
        println!("Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    }

    Ok(())
}

/// Write the default config unless a file is already there.
fn write_default(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_loadable_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(write_default(&path).unwrap());
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.default_model, "gpt-4o-mini");

        std::fs::write(&path, "default_model = \"mine\"\n").unwrap();
        assert!(!write_default(&path).unwrap());
        let kept = std::fs::read_to_string(&path).unwrap();
        assert!(kept.contains("mine"));
    }
}
