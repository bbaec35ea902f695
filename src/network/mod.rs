pub mod codec;
pub mod response;
pub mod wire;

pub use response::{ResponseBuilder, StatusResponse, STATUS_RESPONSE_SIZE};
pub use wire::{classify, CompressedEnvelope, FrameKind, StandardHeader};
