//! Control-plane configuration, loaded from environment variables with
//! development defaults.

use std::net::SocketAddr;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind host (`HOST`)
    pub host: String,
    /// Bind port (`PORT`)
    pub port: u16,
    /// Event bus buffer capacity (`SQUAD_WS_CAPACITY`)
    pub ws_capacity: usize,
}

impl ApiConfig {
    /// Load from the environment.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(3000),
            ws_capacity: std::env::var("SQUAD_WS_CAPACITY")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(1000),
        }
    }

    /// The socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            ws_capacity: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bind_addr() {
        let config = ApiConfig::default();
        let addr = config.bind_addr().unwrap();
        assert_eq!(addr.port(), 3000);
    }
}
