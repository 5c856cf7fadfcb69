use std::fmt;

use serde::{Deserialize, Serialize};

/// A remote target.
///
/// Identity is the `(user, hostname, port)` triple; two hosts that only differ
/// in how they were written in the source file compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    /// Login user on the remote side.
    pub user: String,
    /// Target name passed to the secure-shell client.
    pub hostname: String,
    /// Explicit port, if one was written in the source.
    ///
    /// `None` lets the launcher pick the default for its execution mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Host {
    pub fn new(user: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            hostname: hostname.into(),
            port: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// `user@hostname`, the form handed to the client as its target.
    pub fn login(&self) -> String {
        format!("{}@{}", self.user, self.hostname)
    }

    /// Display label: `user@hostname`, plus `:port` when a port was given.
    pub fn label(&self) -> String {
        match self.port {
            Some(port) => format!("{}@{}:{}", self.user, self.hostname, port),
            None => self.login(),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_includes_port_only_when_explicit() {
        let plain = Host::new("root", "web1");
        assert_eq!(plain.label(), "root@web1");
        assert_eq!(plain.login(), "root@web1");

        let ported = Host::new("root", "web1").with_port(2222);
        assert_eq!(ported.label(), "root@web1:2222");
        assert_eq!(ported.login(), "root@web1");
        assert_eq!(ported.to_string(), "root@web1:2222");
    }

    #[test]
    fn identity_is_the_full_triple() {
        let a = Host::new("root", "web1");
        let b = Host::new("root", "web1").with_port(22);
        let c = Host::new("admin", "web1");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, Host::new("root", "web1"));
    }

    #[test]
    fn serde_skips_missing_port() {
        let json = serde_json::to_string(&Host::new("u", "h")).unwrap();
        assert!(!json.contains("port"));

        let back: Host = serde_json::from_str(r#"{"user":"u","hostname":"h","port":2200}"#).unwrap();
        assert_eq!(back.port, Some(2200));
    }
}
