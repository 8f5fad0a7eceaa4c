use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::api::models::Role;
use crate::socket::{Identity, SocketConfig};

pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

fn default_admin_id() -> String {
    "admin".to_string()
}

fn default_admin_name() -> String {
    "Admin".to_string()
}

fn default_history_limit() -> u32 {
    DEFAULT_HISTORY_LIMIT
}

/// Console session: where the backend lives and who we are.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppState {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub socket_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_admin_id")]
    pub admin_id: String,
    #[serde(default = "default_admin_name")]
    pub admin_name: String,
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            socket_url: None,
            token: None,
            admin_id: default_admin_id(),
            admin_name: default_admin_name(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    // TOML is the primary format; a session.json written by older builds is migrated on first load
    fn toml_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("admin-chat.toml"))
    }

    fn legacy_json_path() -> Option<PathBuf> {
        let proj = directories::ProjectDirs::from("com", "steelmart", "AdminChat")?;
        Some(proj.config_dir().join("session.json"))
    }

    pub fn load() -> Self {
        if let Some(path) = Self::toml_path() {
            if let Some(state) = Self::read_toml(&path) {
                return state;
            }
        }

        if let Some(legacy) = Self::legacy_json_path() {
            if let Ok(bytes) = fs::read(&legacy) {
                if let Ok(state) = serde_json::from_slice::<AppState>(&bytes) {
                    if let Err(e) = state.save() {
                        log::warn!("Could not migrate legacy session: {e}");
                    }
                    return state;
                }
            }
        }

        Self::new()
    }

    fn read_toml(path: &PathBuf) -> Option<Self> {
        let text = fs::read_to_string(path).ok()?;
        match toml::from_str::<AppState>(&text) {
            Ok(state) => Some(state),
            Err(e) => {
                log::warn!("Ignoring unreadable {}: {e}", path.display());
                None
            }
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        if let Some(path) = Self::toml_path() {
            if let Some(parent) = path.parent() { let _ = fs::create_dir_all(parent); }
            let toml = toml::to_string_pretty(self)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
            fs::write(path, toml)
        } else {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "No config dir"))
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    pub fn identity(&self) -> Identity {
        Identity { user_id: self.admin_id.clone(), role: Role::Admin }
    }

    /// Socket settings for this session, with the stored token as the handshake fallback.
    pub fn socket_config(&self) -> Result<SocketConfig, url::ParseError> {
        let url = match &self.socket_url {
            Some(raw) if !raw.trim().is_empty() => url::Url::parse(raw.trim())?,
            _ => crate::utils::socket_url(&self.base_url)?,
        };
        Ok(SocketConfig { session_token: self.token.clone(), ..SocketConfig::new(url) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let state: AppState = toml::from_str("base_url = \"https://admin.example.com\"\n").unwrap();
        assert_eq!(state.admin_id, "admin");
        assert_eq!(state.history_limit, DEFAULT_HISTORY_LIMIT);
        assert!(state.token.is_none());
        assert!(state.is_configured());
    }

    #[test]
    fn socket_config_prefers_explicit_url() {
        let state = AppState {
            base_url: "https://admin.example.com".into(),
            socket_url: Some("wss://rt.example.com/socket".into()),
            token: Some("tok".into()),
            ..AppState::default()
        };
        let cfg = state.socket_config().unwrap();
        assert_eq!(cfg.url.as_str(), "wss://rt.example.com/socket");
        assert_eq!(cfg.session_token.as_deref(), Some("tok"));

        let derived = AppState { socket_url: None, ..state }.socket_config().unwrap();
        assert_eq!(derived.url.as_str(), "wss://admin.example.com/ws");
    }

    #[test]
    fn toml_round_trip_keeps_session() {
        let state = AppState { base_url: "https://h".into(), token: Some("t".into()), ..AppState::default() };
        let text = toml::to_string_pretty(&state).unwrap();
        assert_eq!(toml::from_str::<AppState>(&text).unwrap(), state);
    }
}
