/// Build-time session parameters. `server_address` is a `host:port` pair;
/// a session cannot start without it.
#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    pub server_address: Option<String>,
    /// Party name sent in the handshake line.
    pub party_name: String,
    /// Provider name shown in the transient provider-info panel.
    pub provider_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerAddr {
    pub host: String,
    pub port: u16,
}

impl SessionConfig {
    /// Splits `server_address` into host and port. `None` covers both a
    /// missing address and one that does not parse.
    pub fn server_addr(&self) -> Option<ServerAddr> {
        let raw = self.server_address.as_deref()?;
        let (host, port) = raw.rsplit_once(':')?;
        if host.is_empty() {
            return None;
        }
        let port = port.parse().ok()?;
        Some(ServerAddr {
            host: host.to_string(),
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(addr: Option<&str>) -> SessionConfig {
        SessionConfig {
            server_address: addr.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn parses_host_and_port() {
        let addr = config_with(Some("call.example.org:7777")).server_addr();
        assert_eq!(
            addr,
            Some(ServerAddr {
                host: "call.example.org".to_string(),
                port: 7777,
            })
        );
    }

    #[test]
    fn rejects_missing_or_malformed_address() {
        assert_eq!(config_with(None).server_addr(), None);
        assert_eq!(config_with(Some("no-port")).server_addr(), None);
        assert_eq!(config_with(Some(":7777")).server_addr(), None);
        assert_eq!(config_with(Some("host:not-a-port")).server_addr(), None);
    }
}
