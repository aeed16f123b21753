//! Endpoint-string parsing and the optional TOML configuration file.
//!
//! Endpoint strings use colon- or comma-separated tokens:
//!
//! ```text
//! udpin:0.0.0.0:14550
//! udpout:10.0.0.2:14550
//! tcpout:10.0.0.5:5760
//! serial:/dev/ttyUSB0:57600
//! ```
//!
//! Any invalid IP, port, baud, or scheme is a startup error that prevents
//! the router from starting.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::RouterError;

/// One parsed endpoint definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointSpec {
    UdpIn(SocketAddr),
    UdpOut(SocketAddr),
    TcpOut(SocketAddr),
    Serial { device: String, baud: u32 },
}

impl FromStr for EndpointSpec {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.splitn(3, [':', ',']).collect();
        if parts.len() != 3 {
            return Err(RouterError::InvalidProtocol(s.to_string()));
        }

        match parts[0] {
            "udpin" | "udpout" | "tcpout" => {
                let ip: IpAddr = parts[1]
                    .trim()
                    .parse()
                    .map_err(|_| RouterError::InvalidIpAddress(parts[1].to_string()))?;
                let port = parse_port(parts[2])?;
                let addr = SocketAddr::new(ip, port);
                Ok(match parts[0] {
                    "udpin" => Self::UdpIn(addr),
                    "udpout" => Self::UdpOut(addr),
                    _ => Self::TcpOut(addr),
                })
            }
            "serial" => {
                let baud = parts[2]
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|baud| *baud > 0)
                    .ok_or_else(|| RouterError::InvalidBaud(parts[2].to_string()))?;
                Ok(Self::Serial {
                    device: parts[1].to_string(),
                    baud,
                })
            }
            other => Err(RouterError::InvalidProtocol(other.to_string())),
        }
    }
}

fn parse_port(s: &str) -> Result<u16, RouterError> {
    s.trim()
        .parse::<u16>()
        .ok()
        .filter(|port| *port > 0)
        .ok_or_else(|| RouterError::InvalidPort(s.to_string()))
}

/// Top-level TOML configuration.
///
/// ```toml
/// [router]
/// name = "mavswitch"
/// system_id = 254
/// component_id = 190
/// endpoints = ["udpin:0.0.0.0:14550", "serial:/dev/ttyUSB0:57600"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    pub router: RouterSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterSection {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_system_id")]
    pub system_id: u8,
    #[serde(default = "default_component_id")]
    pub component_id: u8,
    #[serde(default)]
    pub endpoints: Vec<String>,
}

fn default_name() -> String {
    "mavswitch".to_string()
}

fn default_system_id() -> u8 {
    254
}

fn default_component_id() -> u8 {
    190
}

impl RouterConfig {
    pub fn from_file(path: &Path) -> Result<Self, RouterError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Parse every configured endpoint string; the first invalid one aborts.
    pub fn endpoint_specs(&self) -> Result<Vec<EndpointSpec>, RouterError> {
        self.router.endpoints.iter().map(|s| s.parse()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_scheme() {
        assert_eq!(
            "udpin:0.0.0.0:14550".parse::<EndpointSpec>().unwrap(),
            EndpointSpec::UdpIn("0.0.0.0:14550".parse().unwrap())
        );
        assert_eq!(
            "udpout:10.0.0.2:14550".parse::<EndpointSpec>().unwrap(),
            EndpointSpec::UdpOut("10.0.0.2:14550".parse().unwrap())
        );
        assert_eq!(
            "tcpout:10.0.0.5:5760".parse::<EndpointSpec>().unwrap(),
            EndpointSpec::TcpOut("10.0.0.5:5760".parse().unwrap())
        );
        assert_eq!(
            "serial:/dev/ttyUSB0:57600".parse::<EndpointSpec>().unwrap(),
            EndpointSpec::Serial {
                device: "/dev/ttyUSB0".to_string(),
                baud: 57600
            }
        );
    }

    #[test]
    fn comma_separators_are_accepted() {
        assert_eq!(
            "udpin,0.0.0.0,14550".parse::<EndpointSpec>().unwrap(),
            EndpointSpec::UdpIn("0.0.0.0:14550".parse().unwrap())
        );
    }

    #[test]
    fn bad_inputs_name_the_failing_part() {
        assert!(matches!(
            "udp:0.0.0.0:14550".parse::<EndpointSpec>(),
            Err(RouterError::InvalidProtocol(_))
        ));
        assert!(matches!(
            "udpin:not-an-ip:14550".parse::<EndpointSpec>(),
            Err(RouterError::InvalidIpAddress(_))
        ));
        assert!(matches!(
            "udpin:0.0.0.0:0".parse::<EndpointSpec>(),
            Err(RouterError::InvalidPort(_))
        ));
        assert!(matches!(
            "udpin:0.0.0.0:seventy".parse::<EndpointSpec>(),
            Err(RouterError::InvalidPort(_))
        ));
        assert!(matches!(
            "serial:/dev/ttyUSB0:fast".parse::<EndpointSpec>(),
            Err(RouterError::InvalidBaud(_))
        ));
        assert!(matches!(
            "udpin:0.0.0.0".parse::<EndpointSpec>(),
            Err(RouterError::InvalidProtocol(_))
        ));
    }

    #[test]
    fn toml_config_parses_with_defaults() {
        let config: RouterConfig = toml::from_str(
            r#"
            [router]
            endpoints = ["udpin:0.0.0.0:14550"]
            "#,
        )
        .unwrap();
        assert_eq!(config.router.name, "mavswitch");
        assert_eq!(config.router.system_id, 254);
        assert_eq!(config.router.component_id, 190);
        assert_eq!(config.endpoint_specs().unwrap().len(), 1);
    }

    #[test]
    fn invalid_endpoint_in_config_is_a_startup_error() {
        let config: RouterConfig = toml::from_str(
            r#"
            [router]
            endpoints = ["udpin:999.0.0.1:14550"]
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.endpoint_specs(),
            Err(RouterError::InvalidIpAddress(_))
        ));
    }
}
