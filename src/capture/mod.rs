//! Capture input: the ordered interaction list and its HAR decoder

mod har;
mod interaction;

pub use har::{decode_har, read_har};
pub use interaction::{Body, BodyKind, Header, Interaction, InteractionId, Request, Response};
