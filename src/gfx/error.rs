use std::path::PathBuf;

use thiserror::Error;

use super::{BufferKind, Handle};

/// Errors raised by the graphics layer.
#[derive(Error, Debug)]
pub(crate) enum GraphicsError {
    #[error("no compatible graphics adapter found")]
    NoAdapter,
    #[error("failed to request device: {0}")]
    Device(String),
    #[error("surface has no supported formats")]
    NoSurfaceFormat,
    #[error("unknown handle {0:?}")]
    UnknownHandle(Handle),
    #[error("vertex array {0:?} has no buffer bound")]
    Unbound(Handle),
    #[error("buffer has already been released")]
    Released,
    #[error("expected a {expected:?} buffer, found a {found:?} buffer")]
    WrongKind { expected: BufferKind, found: BufferKind },
    #[error("upload of {count} elements exceeds capacity of {capacity}")]
    Overflow { count: usize, capacity: u32 },
    #[error("write of {size} bytes exceeds buffer size of {capacity} bytes")]
    BufferTooSmall { size: u64, capacity: u64 },
    #[error("program {program:?} was linked for a different vertex layout than {vertex_array:?}")]
    LayoutMismatch { program: Handle, vertex_array: Handle },
    #[error("element stride mismatch: buffer expects {expected} bytes, data has {found}")]
    StrideMismatch { expected: u32, found: u32 },
    #[error("failed to read shader source {path:?}")]
    ShaderRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("buffer readback failed: {0}")]
    Readback(String),
    #[error("scene is not loaded")]
    NotLoaded,
    #[error("surface lost")]
    SurfaceLost,
    #[error("timed out acquiring the next frame")]
    Timeout,
    #[error("out of memory")]
    OutOfMemory,
}

/// Reasons a vertex layout is rejected at construction.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum LayoutError {
    #[error("layout has no attributes")]
    Empty,
    #[error("attribute {name:?} has {components} components (expected 1..=4)")]
    ComponentCount { name: &'static str, components: u32 },
    #[error("attribute {name:?} offset {offset} is not float aligned")]
    Misaligned { name: &'static str, offset: u32 },
    #[error("attribute {name:?} at offset {offset} runs past the stride of {stride} bytes")]
    OutOfBounds { name: &'static str, offset: u32, stride: u32 },
    #[error("attributes {first:?} and {second:?} share index {index}")]
    DuplicateIndex { first: &'static str, second: &'static str, index: u32 },
    #[error("attributes {first:?} and {second:?} overlap")]
    Overlap { first: &'static str, second: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = GraphicsError::Overflow { count: 7, capacity: 4 };
        assert_eq!(err.to_string(), "upload of 7 elements exceeds capacity of 4");

        let err = LayoutError::DuplicateIndex { first: "Position", second: "Color", index: 0 };
        assert_eq!(err.to_string(), "attributes \"Position\" and \"Color\" share index 0");
    }
}
