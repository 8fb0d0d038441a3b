#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("failed to encode frame: {0}")]
    Encode(#[from] improv_proto::ProtoError),
}
