//! Error type shared by the protocol layer and the transports.

/// Represents all possible errors of the protocol layer.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The transport could not be acquired or configured.
    #[error("Cannot open transport '{path}': {source}")]
    Transport {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An operation that needs the link was called while disconnected.
    #[error("Device is not connected")]
    NotConnected,

    /// Byte-level I/O failure reported by a transport.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The requested baud rate is not supported.
    #[error("Baud rate {0} is not supported")]
    BaudRateOutOfRange(u32),
}

/// The result type of this crate.
pub type Result<T> = std::result::Result<T, Error>;
