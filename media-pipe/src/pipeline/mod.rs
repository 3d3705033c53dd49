//! End-to-end flows built from the registry, engines, converter and sink.

mod decode_images;
mod encode_images;
mod remux;

pub use decode_images::{DecodeReport, decode_to_images};
pub use encode_images::{EncodeReport, images_to_encode, list_images};
pub use remux::{RemuxReport, remux};
