//! Router and startup errors.

use thiserror::Error;

use mavswitch_network::NetworkError;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("invalid protocol `{0}` in endpoint string")]
    InvalidProtocol(String),

    #[error("invalid ip address `{0}`")]
    InvalidIpAddress(String),

    #[error("invalid port `{0}`")]
    InvalidPort(String),

    #[error("invalid baud rate `{0}`")]
    InvalidBaud(String),

    #[error("message id {0} is not defined in the dialect")]
    ProtocolUndefined(u32),

    #[error("router is not running")]
    RouterClosed,

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("configuration file could not be read: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration file is malformed: {0}")]
    Config(#[from] toml::de::Error),
}
