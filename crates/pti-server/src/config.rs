use std::collections::BTreeSet;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use pti::DEFAULT_ALLOWED_CONTENT_TYPES;

/// Port the service listens on by default.
pub const DEFAULT_PORT: u16 = 29911;

/// Largest upload accepted by default (20 MiB).
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 20 * 1024 * 1024;

/// How many hexcodes to try before giving up on an insert.
pub const DEFAULT_HEXCODE_ATTEMPTS: u32 = 5;

/// How the on-disk name of an upload is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum NamingStrategy {
    /// Keep the client's filename, numbering it on collision
    #[default]
    Original,
    /// Name the file after its hexcode, keeping the original extension
    Hexcode,
}

impl fmt::Display for NamingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NamingStrategy::Original => "original",
            NamingStrategy::Hexcode => "hexcode",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// Base of the URLs handed back to uploaders, without trailing slash.
    pub public_url: String,
    pub upload_dir: PathBuf,
    pub database_path: PathBuf,
    pub allowed_content_types: BTreeSet<String>,
    pub max_upload_size: usize,
    pub naming: NamingStrategy,
    pub hexcode_attempts: u32,
}

impl Config {
    /// Development defaults rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let listen_addr = SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT));
        Self {
            listen_addr,
            public_url: format!("http://localhost:{DEFAULT_PORT}"),
            upload_dir: data_dir.join("uploads"),
            database_path: data_dir.join("pti.db"),
            allowed_content_types: DEFAULT_ALLOWED_CONTENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            naming: NamingStrategy::default(),
            hexcode_attempts: DEFAULT_HEXCODE_ATTEMPTS,
        }
    }

    /// Whether a declared content type may be uploaded.
    ///
    /// Parameters such as `; charset=...` are ignored and the comparison is
    /// case-insensitive.
    pub fn accepts(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.allowed_content_types.contains(&essence)
    }

    /// Public URL for an image.
    pub fn image_url(&self, hexcode: &str, ext: &str) -> String {
        format!("{}/{}.{}", self.public_url.trim_end_matches('/'), hexcode, ext)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_default_image_types() {
        let config = Config::default();
        assert!(config.accepts("image/png"));
        assert!(config.accepts("image/jpeg"));
        assert!(config.accepts("image/jpg"));
        assert!(config.accepts("image/gif"));
    }

    #[test]
    fn content_type_match_ignores_case_and_parameters() {
        let config = Config::default();
        assert!(config.accepts("Image/PNG"));
        assert!(config.accepts("IMAGE/PNG; x=y"));
        assert!(config.accepts(" image/gif ;charset=binary"));
        assert!(!config.accepts("image/png-ish"));
        assert!(!config.accepts("; image/png"));
    }

    #[test]
    fn rejects_other_types() {
        let config = Config::default();
        assert!(!config.accepts("text/plain"));
        assert!(!config.accepts("image/webp"));
        assert!(!config.accepts(""));
    }

    #[test]
    fn image_url_joins_without_double_slash() {
        let mut config = Config::default();
        config.public_url = "https://img.example.com/".into();
        assert_eq!(
            config.image_url("deadbeef", "png"),
            "https://img.example.com/deadbeef.png"
        );
    }

    #[test]
    fn naming_strategy_displays_cli_names() {
        use clap::ValueEnum;

        for strategy in NamingStrategy::value_variants() {
            let value = strategy.to_possible_value().unwrap();
            assert_eq!(value.get_name(), strategy.to_string());
        }
    }
}
