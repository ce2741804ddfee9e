use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

pub const APP_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub theme: ThemeConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ThemeConfig {
    pub border_active: Color,
    pub border_inactive: Color,
    pub selection_bg: Color,
    pub selection_fg: Color,
    pub search_border: Color,
    pub logo: Color,
    pub help: Color,
    pub empty_state: Color,
    pub toast_success: Color,
    pub toast_error: Color,
    pub note_text: Color,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            border_active: Color::Rgb(255, 121, 198),
            border_inactive: Color::Rgb(98, 114, 164),
            selection_bg: Color::Rgb(68, 71, 90),
            selection_fg: Color::Rgb(255, 121, 198),
            search_border: Color::Rgb(139, 233, 253),
            logo: Color::Rgb(189, 147, 249),
            help: Color::Rgb(98, 114, 164),
            empty_state: Color::Rgb(148, 163, 184),
            toast_success: Color::Rgb(80, 250, 123),
            toast_error: Color::Rgb(255, 85, 85),
            note_text: Color::Rgb(30, 30, 30),
        }
    }
}

pub fn get_config_dir() -> PathBuf {
    let mut path = dirs::home_dir().expect("Could not find home directory");
    path.push(".notewall");
    path
}

pub fn load_config() -> AppConfig {
    let mut path = get_config_dir();
    fs::create_dir_all(&path).ok();
    path.push("config.toml");

    if !path.exists() {
        let default_config = AppConfig::default();
        if let Ok(toml_str) = toml::to_string_pretty(&default_config) {
            let mut options = OpenOptions::new();
            options.write(true).create(true).truncate(true);
            #[cfg(unix)]
            {
                options.mode(0o600);
            }
            if let Ok(mut file) = options.open(&path) {
                let _ = file.write_all(toml_str.as_bytes());
            }
        }
        return default_config;
    }

    match fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to parse config.toml: {}.", e);
                let backup_path = path.with_extension("toml.bak");
                if let Err(backup_err) = fs::rename(&path, &backup_path) {
                    eprintln!("Failed to backup corrupted config: {}", backup_err);
                } else {
                    eprintln!("Corrupted config backed up to {:?}", backup_path);
                }
                eprintln!("Using default configuration.");
                AppConfig::default()
            }
        },
        Err(e) => {
            eprintln!("Failed to read config file: {}. Using default.", e);
            AppConfig::default()
        }
    }
}
