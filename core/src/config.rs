//! INI-like configuration loader (§1.1 Ambient stack). Grounded in
//! `config.hpp`'s `cfg_singleton`: `[section]` blocks, `key = value`
//! lines, `include: path` directives, and a handful of typed value shapes.
//! Unlike the original, invalid or missing keys are reported as
//! [`ConfigError`] rather than thrown as untyped exceptions, and loading
//! aborts at the first error instead of silently defaulting.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::color::Color;
use crate::error::ConfigError;
use crate::geometry::Vec2;

/// Raw `[section] key = value` storage, loaded (with `#include`
/// expansion) from one or more files.
#[derive(Debug, Default)]
pub struct ConfigStore {
    sections: HashMap<String, HashMap<String, String>>,
}

impl ConfigStore {
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut store = Self::default();
        let mut seen = Vec::new();
        store.parse_into(path.as_ref(), &mut seen)?;
        Ok(store)
    }

    fn parse_into(&mut self, path: &Path, seen: &mut Vec<PathBuf>) -> Result<(), ConfigError> {
        let canonical = path.to_path_buf();
        if seen.contains(&canonical) {
            return Err(ConfigError::IncludeCycle(path.display().to_string()));
        }
        seen.push(canonical);

        let text = std::fs::read_to_string(path).map_err(|_| ConfigError::NotFound(path.display().to_string()))?;
        let mut current_section: Option<String> = None;

        for (lineno, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if current_section.is_none() {
                if let Some(rest) = line.strip_prefix("include") {
                    if let Some((_, target)) = rest.split_once(':') {
                        let target = target.trim();
                        let resolved = path.parent().map(|p| p.join(target)).unwrap_or_else(|| PathBuf::from(target));
                        self.parse_into(&resolved, seen)?;
                        continue;
                    }
                }
            }

            if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                current_section = Some(name.trim().to_string());
                self.sections.entry(name.trim().to_string()).or_default();
                continue;
            }

            let Some(section) = current_section.as_ref() else {
                return Err(ConfigError::Parse {
                    path: path.display().to_string(),
                    line: lineno + 1,
                    message: "key=value line outside any [section]".to_string(),
                });
            };

            if let Some((key, value)) = line.split_once('=') {
                self.sections
                    .get_mut(section)
                    .expect("section inserted above")
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        seen.pop();
        Ok(())
    }

    pub fn get_raw(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key).map(String::as_str)
    }

    pub fn get<T: ConfigValue>(&self, section: &str, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get_raw(section, key) {
            Some(raw) => T::parse(raw)
                .map(Some)
                .map_err(|message| ConfigError::InvalidValue { section: section.into(), key: key.into(), message }),
            None => Ok(None),
        }
    }

    pub fn get_req<T: ConfigValue>(&self, section: &str, key: &str) -> Result<T, ConfigError> {
        self.get(section, key)?.ok_or_else(|| ConfigError::MissingKey { section: section.into(), key: key.into() })
    }

    pub fn get_default<T: ConfigValue>(&self, section: &str, key: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.get(section, key)?.unwrap_or(default))
    }
}

/// A value shape the loader knows how to parse out of a raw string.
pub trait ConfigValue: Sized {
    fn parse(raw: &str) -> Result<Self, String>;
}

impl ConfigValue for bool {
    fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "true" | "on" => Ok(true),
            "false" | "off" => Ok(false),
            other => Err(format!("'{other}' is not a bool (expected true/false/on/off)")),
        }
    }
}

macro_rules! impl_numeric_config_value {
    ($($t:ty),*) => {
        $(impl ConfigValue for $t {
            fn parse(raw: &str) -> Result<Self, String> {
                raw.parse::<$t>().map_err(|e| e.to_string())
            }
        })*
    };
}
impl_numeric_config_value!(u32, i32, u64, f32);

impl ConfigValue for String {
    fn parse(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }
}

impl ConfigValue for Vec2 {
    fn parse(raw: &str) -> Result<Self, String> {
        let mut parts = raw.split_whitespace();
        let x: f32 = parts.next().ok_or("expected 'x y'")?.parse().map_err(|e: std::num::ParseFloatError| e.to_string())?;
        let y: f32 = match parts.next() {
            Some(y) => y.parse().map_err(|e: std::num::ParseFloatError| e.to_string())?,
            None => 0.0,
        };
        Ok(Vec2::new(x, y))
    }
}

impl ConfigValue for Color {
    fn parse(raw: &str) -> Result<Self, String> {
        let parts: Vec<&str> = raw.split_whitespace().collect();
        if parts.len() != 4 {
            return Err(format!("expected 'r g b a', got '{raw}'"));
        }
        let mut channel = [0u8; 4];
        for (i, p) in parts.iter().enumerate() {
            channel[i] = p.parse().map_err(|e: std::num::ParseIntError| e.to_string())?;
        }
        Ok(Color::new(channel[0], channel[1], channel[2], channel[3]))
    }
}

impl<T: ConfigValue> ConfigValue for Vec<T> {
    fn parse(raw: &str) -> Result<Self, String> {
        raw.split_whitespace().map(T::parse).collect()
    }
}

/// Physics + replication tuning, loaded once at startup (§1.1 Ambient
/// stack / §3 Weapon / Player configuration).
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub gravity: Vec2,
    pub rps: u32,
}

impl SimConfig {
    pub fn load(store: &ConfigStore) -> Result<Self, ConfigError> {
        let gravity = store.get_default("physics", "gravity", Vec2::new(0.0, 980.0))?;
        let rps = store.get_default("physics", "rps", 60)?;
        Ok(Self { gravity, rps })
    }
}

#[derive(Debug, Clone)]
pub struct NetConfig {
    pub listen_port: u16,
    pub sync_interval_ms: u32,
    pub resend_interval_ms: u32,
    pub max_retries: u32,
    pub ack_cache_ttl_secs: u32,
}

impl NetConfig {
    pub fn load(store: &ConfigStore) -> Result<Self, ConfigError> {
        Ok(Self {
            listen_port: store.get_default("net", "listen_port", 27800u32)? as u16,
            sync_interval_ms: store.get_default("net", "sync_interval_ms", 60)?,
            resend_interval_ms: store.get_default("net", "resend_interval_ms", 100)?,
            max_retries: store.get_default("net", "max_retries", 8)?,
            ack_cache_ttl_secs: store.get_default("net", "ack_cache_ttl_secs", 5)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub name: String,
    pub body_texture: String,
    pub face_texture: String,
    pub body_colour: Color,
    pub tracer_colour: Color,
    pub group: i32,
}

impl PlayerConfig {
    pub fn load(store: &ConfigStore, section: &str) -> Result<Self, ConfigError> {
        let name: String = store.get_req(section, "name")?;
        if name.len() > 23 {
            return Err(ConfigError::InvalidValue {
                section: section.into(),
                key: "name".into(),
                message: "player name exceeds 23 bytes".into(),
            });
        }
        Ok(Self {
            name,
            body_texture: store.get_default(section, "body_texture", "default".to_string())?,
            face_texture: store.get_default(section, "face_texture", "default".to_string())?,
            body_colour: store.get_default(section, "body_color", Color::WHITE)?,
            tracer_colour: store.get_default(section, "tracer_color", Color::new(255, 255, 0, 255))?,
            group: store.get_default(section, "group", -1)?,
        })
    }
}

pub fn load_sim_config(path: impl AsRef<Path>) -> Result<(SimConfig, NetConfig), ConfigError> {
    let store = ConfigStore::parse_file(path)?;
    let sim = SimConfig::load(&store)?;
    let net = NetConfig::load(&store)?;
    debug!(rps = sim.rps, listen_port = net.listen_port, "configuration loaded");
    Ok((sim, net))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(contents: &str) -> tempfile_path::TempConfig {
        tempfile_path::TempConfig::new(contents)
    }

    mod tempfile_path {
        use std::io::Write;
        use std::path::PathBuf;
        use std::sync::atomic::{AtomicU32, Ordering};

        static COUNTER: AtomicU32 = AtomicU32::new(0);

        pub struct TempConfig {
            pub path: PathBuf,
        }

        impl TempConfig {
            pub fn new(contents: &str) -> Self {
                let n = COUNTER.fetch_add(1, Ordering::Relaxed);
                let path = std::env::temp_dir().join(format!("hollowpoint_test_{}_{n}.cfg", std::process::id()));
                let mut f = std::fs::File::create(&path).unwrap();
                f.write_all(contents.as_bytes()).unwrap();
                Self { path }
            }
        }

        impl Drop for TempConfig {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }

    #[test]
    fn parses_sections_and_typed_values() {
        let tmp = write_temp("[physics]\ngravity = 0 980\nrps = 60\n");
        let store = ConfigStore::parse_file(&tmp.path).unwrap();
        let cfg = SimConfig::load(&store).unwrap();
        assert_eq!(cfg.rps, 60);
        assert!((cfg.gravity.y - 980.0).abs() < 1e-6);
    }

    #[test]
    fn missing_required_key_errors() {
        let tmp = write_temp("[player_configuration]\nbody_texture = foo\n");
        let store = ConfigStore::parse_file(&tmp.path).unwrap();
        let err = PlayerConfig::load(&store, "player_configuration").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { .. }));
    }

    #[test]
    fn name_over_23_bytes_is_rejected() {
        let tmp = write_temp("[p]\nname = this_name_is_definitely_too_long_for_the_limit\n");
        let store = ConfigStore::parse_file(&tmp.path).unwrap();
        let err = PlayerConfig::load(&store, "p").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
