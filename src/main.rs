//! DHD エクスポートサーバー

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dhd_export_service::http::{start_server, ServerConfig};
use dhd_export_service::{ExporterConfig, SiteConfig};

#[derive(Debug, Parser)]
#[command(name = "dhd-export", version, about = "Serve DHD platform exports over HTTP")]
struct Cli {
    /// Address to bind
    #[arg(long, env = "DHD_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "DHD_PORT", default_value_t = 3000)]
    port: u16,

    /// Directory downloaded exports are saved into
    #[arg(long, env = "DHD_DOWNLOAD_DIR", default_value = "./downloads")]
    download_dir: PathBuf,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Timeout for each page wait, in seconds
    #[arg(long, env = "DHD_TIMEOUT_SECS", default_value_t = 60)]
    timeout_secs: u64,

    /// JSON file overriding site URLs, selectors, filters or start date
    #[arg(long, env = "DHD_SITE_CONFIG")]
    site_config: Option<PathBuf>,

    /// Chrome/Chromium executable
    #[arg(long = "chrome", env = "CHROME_PATH")]
    chrome_executable: Option<PathBuf>,

    /// Log a screenshot when an export fails
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let site = match &self.site_config {
            Some(path) => SiteConfig::from_json_file(path)
                .with_context(|| format!("loading site config {}", path.display()))?,
            None => SiteConfig::default(),
        };

        let mut exporter = ExporterConfig::default()
            .with_download_path(self.download_dir)
            .with_headless(!self.headed)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_debug(self.debug)
            .with_site(site);
        if let Some(chrome) = self.chrome_executable {
            exporter = exporter.with_chrome_executable(chrome);
        }

        Ok(ServerConfig {
            host: self.host,
            port: self.port,
            exporter,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,dhd_export_service=debug")),
        )
        .init();

    let config = Cli::parse().into_server_config()?;
    start_server(config).await.context("server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["dhd-export"]).unwrap();
        let config = cli.into_server_config().unwrap();

        assert_eq!(config.port, 3000);
        assert!(config.exporter.headless);
        assert_eq!(config.exporter.timeout, Duration::from_secs(60));
        assert_eq!(config.exporter.site, SiteConfig::default());
    }

    #[test]
    fn test_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let site_path = dir.path().join("site.json");
        std::fs::write(&site_path, r#"{"start_date": "2024-01-01"}"#).unwrap();

        let cli = Cli::try_parse_from([
            "dhd-export",
            "--port",
            "8080",
            "--headed",
            "--timeout-secs",
            "15",
            "--download-dir",
            "/srv/exports",
            "--site-config",
            site_path.to_str().unwrap(),
        ])
        .unwrap();
        let config = cli.into_server_config().unwrap();

        assert_eq!(config.port, 8080);
        assert!(!config.exporter.headless);
        assert_eq!(config.exporter.timeout, Duration::from_secs(15));
        assert_eq!(config.exporter.download_path, PathBuf::from("/srv/exports"));
        assert_eq!(config.exporter.site.start_date.to_string(), "2024-01-01");
    }
}
