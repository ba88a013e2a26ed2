//! Session configuration
//!
//! Defaults can be overridden through environment variables:
//! - `CHAT_PAGE_URL`: the page the client is served from (`http(s)://host[:port]`)
//! - `CHAT_DEFAULT_ROOM`: room used when none is given
//! - `CHAT_TYPING_TIMEOUT_MS`: typing indicator quiet period

use std::time::Duration;

use url::Url;

use crate::error::SessionError;
use crate::typing::DEFAULT_TYPING_TIMEOUT;

/// Default page address
const DEFAULT_PAGE_URL: &str = "http://127.0.0.1:8080";

/// Room used when the caller leaves it empty
pub const DEFAULT_ROOM: &str = "general";

/// Channel buffer size for session commands
pub const DEFAULT_COMMAND_BUFFER: usize = 256;

/// How long the driver waits for the transport to finish closing on shutdown
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Client session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Page URL the session endpoint is derived from
    pub page_url: Url,
    /// Fallback room name
    pub default_room: String,
    /// Typing indicator expiry
    pub typing_timeout: Duration,
    /// Buffer size of the driver command channel
    pub command_buffer: usize,
    /// Grace period for the close handshake when the driver stops
    pub shutdown_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            page_url: default_page_url(),
            default_room: DEFAULT_ROOM.to_string(),
            typing_timeout: DEFAULT_TYPING_TIMEOUT,
            command_buffer: DEFAULT_COMMAND_BUFFER,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Configuration for the given page URL, everything else default
    pub fn new(page_url: Url) -> Self {
        Self {
            page_url,
            ..Self::default()
        }
    }

    /// Load configuration from the environment
    pub fn from_env() -> Result<Self, SessionError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup` (keyed by environment variable name)
    ///
    /// An unparsable `CHAT_PAGE_URL` is an error; a blank room or a
    /// non-numeric timeout keeps the current value.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, SessionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(page_url) = lookup("CHAT_PAGE_URL") {
            self.page_url = Url::parse(page_url.trim())?;
        }

        if let Some(room) = lookup("CHAT_DEFAULT_ROOM") {
            let room = room.trim();
            if !room.is_empty() {
                self.default_room = room.to_string();
            }
        }

        if let Some(ms) = lookup("CHAT_TYPING_TIMEOUT_MS").and_then(|v| v.trim().parse::<u64>().ok()) {
            self.typing_timeout = Duration::from_millis(ms);
        }

        Ok(self)
    }

    /// Session endpoint for a user and room
    ///
    /// `{ws|wss}://<host>/ws?username=..&room=..`, secure when the page is https.
    pub fn session_url(&self, username: &str, room: &str) -> Result<Url, SessionError> {
        let scheme = if self.page_url.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        let host = self
            .page_url
            .host_str()
            .ok_or(url::ParseError::EmptyHost)?;
        let authority = match self.page_url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let mut url = Url::parse(&format!("{}://{}/ws", scheme, authority))?;
        url.query_pairs_mut()
            .append_pair("username", username)
            .append_pair("room", room);
        Ok(url)
    }
}

/// Parses a compile-time constant, covered by `test_defaults`; cannot fail.
fn default_page_url() -> Url {
    Url::parse(DEFAULT_PAGE_URL).expect("DEFAULT_PAGE_URL is a valid URL")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.default_room, "general");
        assert_eq!(config.typing_timeout, Duration::from_secs(3));
        assert_eq!(config.command_buffer, 256);
        assert_eq!(config.page_url.as_str(), "http://127.0.0.1:8080/");
    }

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_overrides_apply_valid_values() {
        let config = SessionConfig::default()
            .with_overrides(lookup_from(&[
                ("CHAT_PAGE_URL", "https://chat.example.com"),
                ("CHAT_DEFAULT_ROOM", " lounge "),
                ("CHAT_TYPING_TIMEOUT_MS", "1500"),
            ]))
            .unwrap();

        assert_eq!(config.page_url.scheme(), "https");
        assert_eq!(config.page_url.host_str(), Some("chat.example.com"));
        assert_eq!(config.default_room, "lounge");
        assert_eq!(config.typing_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_overrides_bad_values_keep_defaults() {
        let config = SessionConfig::default()
            .with_overrides(lookup_from(&[
                ("CHAT_DEFAULT_ROOM", "   "),
                ("CHAT_TYPING_TIMEOUT_MS", "soon"),
            ]))
            .unwrap();

        assert_eq!(config.default_room, "general");
        assert_eq!(config.typing_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_overrides_invalid_page_url_is_error() {
        let err = SessionConfig::default()
            .with_overrides(lookup_from(&[("CHAT_PAGE_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, SessionError::Url(_)));
    }

    #[test]
    fn test_no_overrides_is_default() {
        let config = SessionConfig::default()
            .with_overrides(lookup_from(&[]))
            .unwrap();
        assert_eq!(config.default_room, "general");
        assert_eq!(config.page_url.as_str(), "http://127.0.0.1:8080/");
    }

    #[test]
    fn test_session_url_plain() {
        let config = SessionConfig::default();
        let url = config.session_url("alice", "general").unwrap();
        assert_eq!(
            url.as_str(),
            "ws://127.0.0.1:8080/ws?username=alice&room=general"
        );
    }

    #[test]
    fn test_session_url_secure_and_encoded() {
        let config = SessionConfig::new(Url::parse("https://chat.example.com/index.html").unwrap());
        let url = config.session_url("a&b c", "room/1").unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.host_str(), Some("chat.example.com"));
        assert_eq!(url.path(), "/ws");

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("username".to_string(), "a&b c".to_string()),
                ("room".to_string(), "room/1".to_string()),
            ]
        );
    }
}
