use thiserror::Error;

/// Error types returned by this crate.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// The frame does not begin with the ASCII bytes `Bin`.
    #[error("packet does not start with \"Bin\"")]
    InvalidPrefix,

    /// The frame declares a header longer than the 10 MiB cap.
    ///
    /// The declared size is rejected before any buffer space is reserved for
    /// it.
    #[error("header of {0} bytes is larger than 10 MiB")]
    HeaderTooLarge(u64),

    /// The frame declares a payload longer than the 100 MiB cap, or a length
    /// whose 32-bit value would overflow the frame size bookkeeping once the
    /// 8-byte prefix and the header length word are added.
    ///
    /// The declared size is rejected before any buffer space is reserved for
    /// it.
    #[error("data of {0} bytes is larger than 100 MiB")]
    PayloadTooLarge(u64),

    /// Both the header length and the payload length are zero.
    ///
    /// A frame must carry at least one of the two, so this is a violation of
    /// the framing format.
    #[error("invalid packet format (zero-length header and payload)")]
    EmptyFrame,

    /// The endpoint path exceeds the 104 byte limit of a local stream
    /// socket address.
    #[error("socket path of {0} bytes exceeds the 104 byte limit")]
    SocketPathTooLong(usize),

    /// The client has no established connection to the peer.
    #[error("not connected")]
    NotConnected,

    /// An I/O error occurred when trying to parse the buffer.
    #[error("i/o error ({0:?}): {1}")]
    IOError(std::io::ErrorKind, String),
}

impl From<std::io::Error> for Error {
    fn from(v: std::io::Error) -> Self {
        Self::IOError(v.kind(), v.to_string())
    }
}
