use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Fixed kiosk position, used instead of GeoClue when set.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FixedLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Client configuration: defaults, then a TOML file, then `ATTEND_*`
/// environment overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Recognition service base URL.
    pub server_url: String,
    /// V4L2 device path.
    pub camera_device: String,
    pub camera_width: u32,
    pub camera_height: u32,
    /// Frames discarded after opening the camera (AGC/AE stabilization).
    pub warmup_frames: usize,
    pub jpeg_quality: u8,
    pub locate_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Enrollment session lifetime.
    pub session_expiry_secs: u64,
    pub clock_tick_secs: u64,
    /// Desktop id announced to GeoClue.
    pub desktop_id: String,
    /// Identity Toolkit web API key.
    pub auth_api_key: Option<String>,
    pub fixed_location: Option<FixedLocation>,
    /// Where the signed-in user is persisted between invocations.
    pub session_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            camera_device: "/dev/video0".to_string(),
            camera_width: 640,
            camera_height: 480,
            warmup_frames: 4,
            jpeg_quality: 85,
            locate_timeout_secs: 10,
            request_timeout_secs: 30,
            session_expiry_secs: 120,
            clock_tick_secs: 60,
            desktop_id: "attend".to_string(),
            auth_api_key: None,
            fixed_location: None,
            session_file: data_dir(&env_lookup).join("session.json"),
        }
    }
}

impl Config {
    /// Load from `path` (or the default config file when it exists), then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let default_path = config_dir(&env_lookup).join("config.toml");
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if default_path.is_file() => Self::from_file(&default_path)?,
            None => Self::default(),
        };
        config.apply_env(env_lookup);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply `ATTEND_*` overrides. Unparseable values are ignored with a
    /// warning and the previous value is kept.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ATTEND_SERVER_URL") {
            self.server_url = v;
        }
        if let Some(v) = lookup("ATTEND_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = lookup("ATTEND_AUTH_API_KEY") {
            self.auth_api_key = Some(v);
        }
        if let Some(v) = lookup("ATTEND_SESSION_FILE") {
            self.session_file = PathBuf::from(v);
        }
        override_parsed(&lookup, "ATTEND_LOCATE_TIMEOUT_SECS", &mut self.locate_timeout_secs);
        override_parsed(&lookup, "ATTEND_REQUEST_TIMEOUT_SECS", &mut self.request_timeout_secs);
        override_parsed(&lookup, "ATTEND_SESSION_EXPIRY_SECS", &mut self.session_expiry_secs);
        override_parsed(&lookup, "ATTEND_WARMUP_FRAMES", &mut self.warmup_frames);
        override_parsed(&lookup, "ATTEND_JPEG_QUALITY", &mut self.jpeg_quality);

        if let Some(v) = lookup("ATTEND_FIXED_LOCATION") {
            match parse_lat_lon(&v) {
                Some(loc) => self.fixed_location = Some(loc),
                None => tracing::warn!(value = %v, "ignoring ATTEND_FIXED_LOCATION, expected \"lat,lon\""),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Invalid {
                key: "jpeg_quality",
                reason: format!("{} is outside 1..=100", self.jpeg_quality),
            });
        }
        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                key: "server_url",
                reason: format!("{} is not an http(s) URL", self.server_url),
            });
        }
        for (key, secs) in [
            ("locate_timeout_secs", self.locate_timeout_secs),
            ("request_timeout_secs", self.request_timeout_secs),
            ("clock_tick_secs", self.clock_tick_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be at least 1".into(),
                });
            }
        }
        if let Some(loc) = self.fixed_location {
            if !(-90.0..=90.0).contains(&loc.latitude) || !(-180.0..=180.0).contains(&loc.longitude)
            {
                return Err(ConfigError::Invalid {
                    key: "fixed_location",
                    reason: format!("{},{} is out of range", loc.latitude, loc.longitude),
                });
            }
        }
        Ok(())
    }

    pub fn locate_timeout(&self) -> Duration {
        Duration::from_secs(self.locate_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `None` when expiry is disabled (0).
    pub fn session_expiry(&self) -> Option<Duration> {
        (self.session_expiry_secs > 0).then(|| Duration::from_secs(self.session_expiry_secs))
    }

    pub fn clock_tick(&self) -> Duration {
        Duration::from_secs(self.clock_tick_secs)
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable override"),
    }
}

fn parse_lat_lon(raw: &str) -> Option<FixedLocation> {
    let (lat, lon) = raw.split_once(',')?;
    Some(FixedLocation {
        latitude: lat.trim().parse().ok()?,
        longitude: lon.trim().parse().ok()?,
    })
}

fn home_dir<F: Fn(&str) -> Option<String>>(lookup: &F) -> PathBuf {
    PathBuf::from(lookup("HOME").unwrap_or_else(|| "/tmp".to_string()))
}

fn config_dir<F: Fn(&str) -> Option<String>>(lookup: &F) -> PathBuf {
    lookup("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir(lookup).join(".config"))
        .join("attend")
}

fn data_dir<F: Fn(&str) -> Option<String>>(lookup: &F) -> PathBuf {
    lookup("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir(lookup).join(".local/share"))
        .join("attend")
}
