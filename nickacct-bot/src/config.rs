//! Bot configuration.
//!
//! The config file lives at `~/.config/nickacct/bot.toml` unless `--config`
//! names another one. Every field is optional; command-line flags win over
//! file values, which win over the defaults below.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use nickacct_sdk::client::{ConnectConfig, ReconnectConfig};

/// Default IRC server.
pub const DEFAULT_SERVER: &str = "irc.libera.chat:6697";
/// Default bot nick.
pub const DEFAULT_NICK: &str = "acctbot";
/// Default services identity queried for `ACC`.
pub const DEFAULT_NICKSERV: &str = "NickServ";
/// Default command prefix.
pub const DEFAULT_PREFIX: &str = "!";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("can't read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("bad config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Contents of `bot.toml`.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Server address (host:port).
    pub server: Option<String>,
    /// IRC nickname.
    pub nick: Option<String>,
    /// Use TLS (auto-detected from :6697, but can force).
    pub tls: Option<bool>,
    /// Skip TLS certificate verification.
    pub tls_insecure: Option<bool>,
    /// Channels to join.
    pub channels: Option<Vec<String>>,
    /// Services identity, `NickServ` or `NickServ@services.host`.
    pub nickserv: Option<String>,
    /// Command prefix for `account`.
    pub prefix: Option<String>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub nick: Option<String>,
    pub tls: bool,
    pub channels: Vec<String>,
    pub nickserv: Option<String>,
    pub prefix: Option<String>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server: String,
    pub nick: String,
    pub tls: bool,
    pub tls_insecure: bool,
    pub channels: Vec<String>,
    pub nickserv: String,
    pub prefix: String,
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nickacct")
        .join("bot.toml")
}

impl BotConfig {
    /// Load `path`, or the default location when `None`. A missing default
    /// file yields an empty config; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_path(), false),
        };
        if !explicit && !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Merge with command-line values and defaults.
    pub fn resolve(self, overrides: Overrides) -> Settings {
        let channels = if overrides.channels.is_empty() {
            self.channels.unwrap_or_default()
        } else {
            overrides.channels
        };
        Settings {
            server: overrides
                .server
                .or(self.server)
                .unwrap_or_else(|| DEFAULT_SERVER.to_string()),
            nick: overrides
                .nick
                .or(self.nick)
                .unwrap_or_else(|| DEFAULT_NICK.to_string()),
            tls: overrides.tls || self.tls.unwrap_or(false),
            tls_insecure: self.tls_insecure.unwrap_or(false),
            channels,
            nickserv: overrides
                .nickserv
                .or(self.nickserv)
                .unwrap_or_else(|| DEFAULT_NICKSERV.to_string()),
            prefix: overrides
                .prefix
                .or(self.prefix)
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
        }
    }
}

impl Settings {
    pub fn connect_config(&self) -> ConnectConfig {
        ConnectConfig {
            server_addr: self.server.clone(),
            nick: self.nick.clone(),
            user: self.nick.clone(),
            realname: "nick to account resolver".to_string(),
            tls: self.tls || self.server.ends_with(":6697"),
            tls_insecure: self.tls_insecure,
        }
    }

    pub fn reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig {
            channels: self.channels.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_file() {
        let cfg = BotConfig::parse(
            r##"
server = "irc.example.net:6667"
nick = "resolver"
tls = false
channels = ["#one", "#two"]
nickserv = "NickServ@services.example.net"
prefix = "."
"##,
        )
        .unwrap();
        assert_eq!(cfg.server.as_deref(), Some("irc.example.net:6667"));
        assert_eq!(cfg.channels, Some(vec!["#one".to_string(), "#two".to_string()]));
        assert_eq!(cfg.nickserv.as_deref(), Some("NickServ@services.example.net"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(BotConfig::parse("nickname = \"x\"").is_err());
    }

    #[test]
    fn defaults_when_empty() {
        let settings = BotConfig::default().resolve(Overrides::default());
        assert_eq!(settings.server, DEFAULT_SERVER);
        assert_eq!(settings.nick, DEFAULT_NICK);
        assert_eq!(settings.nickserv, DEFAULT_NICKSERV);
        assert_eq!(settings.prefix, DEFAULT_PREFIX);
        assert!(settings.channels.is_empty());
        assert!(settings.connect_config().tls, "6697 implies TLS");
    }

    #[test]
    fn command_line_wins() {
        let file = BotConfig {
            server: Some("file.example:6667".into()),
            nick: Some("filebot".into()),
            channels: Some(vec!["#file".into()]),
            prefix: Some(".".into()),
            ..Default::default()
        };
        let settings = file.resolve(Overrides {
            nick: Some("clibot".into()),
            channels: vec!["#cli".into()],
            ..Default::default()
        });
        assert_eq!(settings.server, "file.example:6667");
        assert_eq!(settings.nick, "clibot");
        assert_eq!(settings.channels, vec!["#cli".to_string()]);
        assert_eq!(settings.prefix, ".");
        assert!(!settings.connect_config().tls);
        assert_eq!(settings.reconnect_config().channels, vec!["#cli".to_string()]);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = BotConfig::load(Some(Path::new("/nonexistent/nickacct/bot.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
