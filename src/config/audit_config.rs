use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use super::{DatabaseConfig, RunArgs, SiteConfig};

pub const DEFAULT_CONFIG_PATH: &str = "configs/catalog_audit.toml";

/// Everything a run needs, passed explicitly into each component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub catalog: CatalogConfig,
    pub database: DatabaseConfig,
    pub site: SiteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub csv_path: PathBuf,
    pub image_root: PathBuf,
    pub output_path: PathBuf,
    /// Read the database side from this CSV export instead of connecting.
    pub db_export_path: Option<PathBuf>,
    pub image_url_prefix: String,
    pub examples_per_class: usize,
    pub delete_missing_images: bool,
    pub update_prices: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("database/johnhenry_products.csv"),
            image_root: PathBuf::from("wwwroot/images"),
            output_path: PathBuf::from("database/generated"),
            db_export_path: None,
            image_url_prefix: "/images".to_string(),
            examples_per_class: 10,
            delete_missing_images: false,
            update_prices: false,
        }
    }
}

impl AuditConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: AuditConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.database.load_credentials();
        Ok(config)
    }

    /// Explicit `--config` must exist; otherwise the default path is used when
    /// present and built-in defaults when not. Command-line paths win.
    pub fn load(args: &RunArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => {
                info!("No config file at {}, using defaults", DEFAULT_CONFIG_PATH);
                let mut config = Self::default();
                config.database.load_credentials();
                config
            }
        };

        config.apply_overrides(args);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, args: &RunArgs) {
        if let Some(input) = &args.input {
            self.catalog.csv_path = input.clone();
        }
        if let Some(output) = &args.output {
            self.catalog.output_path = output.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.catalog.output_path.as_os_str().is_empty() {
            return Err(anyhow!("output_path cannot be empty"));
        }
        if self.site.page_size == 0 {
            return Err(anyhow!("site.page_size must be positive"));
        }
        if !self.catalog.image_url_prefix.starts_with('/') {
            return Err(anyhow!(
                "image_url_prefix must start with '/': {}",
                self.catalog.image_url_prefix
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use tempfile::TempDir;

    #[test]
    fn test_full_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.toml");
        std::fs::write(
            &path,
            r#"
[catalog]
csv_path = "in/products.csv"
image_root = "img"
output_path = "out"
db_export_path = "in/export.csv"
examples_per_class = 3
update_prices = true

[database]
host = "db.internal"
dbname = "shop"
user = "auditor"

[site]
base_url = "http://localhost:8080"
[[site.pages]]
name = "FreelancerDress"
path = "/Home/FreelancerDress"
brand = "Freelancer"
category = "Đầm nữ"
"#,
        )
        .unwrap();

        let config = AuditConfig::from_file(&path).unwrap();
        assert_eq!(config.catalog.csv_path, PathBuf::from("in/products.csv"));
        assert_eq!(config.catalog.db_export_path, Some(PathBuf::from("in/export.csv")));
        assert_eq!(config.catalog.examples_per_class, 3);
        assert!(config.catalog.update_prices);
        assert!(!config.catalog.delete_missing_images);
        assert_eq!(config.catalog.image_url_prefix, "/images");
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.site.pages.len(), 1);
        assert_eq!(config.site.pages[0].category, Some(Category::DamNu));
        assert_eq!(config.site.page_size, 40);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: AuditConfig = toml::from_str("").unwrap();
        assert_eq!(config.catalog.examples_per_class, 10);
        assert_eq!(config.site.pages.len(), 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let args = RunArgs {
            config: Some(PathBuf::from("/definitely/not/here.toml")),
            ..Default::default()
        };
        assert!(AuditConfig::load(&args).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = AuditConfig::default();
        let args = RunArgs {
            input: Some(PathBuf::from("x.csv")),
            output: Some(PathBuf::from("o")),
            ..Default::default()
        };
        config.apply_overrides(&args);
        assert_eq!(config.catalog.csv_path, PathBuf::from("x.csv"));
        assert_eq!(config.catalog.output_path, PathBuf::from("o"));
    }

    #[test]
    fn test_bad_prefix_rejected() {
        let mut config = AuditConfig::default();
        config.catalog.image_url_prefix = "images".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let config = AuditConfig::from_file(Path::new(DEFAULT_CONFIG_PATH)).unwrap();
        assert_eq!(config.site.pages, SiteConfig::default_pages());
        assert_eq!(config.database.password_var(), "CATALOG_DB_PASSWORD");
        assert!(config.catalog.db_export_path.is_none());
        assert!(config.validate().is_ok());
    }
}
