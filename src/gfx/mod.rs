//! Backend-agnostic GPU resource layer.
//!
//! Resources are addressed through integer [`Handle`]s owned by exactly one
//! wrapper ([`Buffer`], [`VertexArray`], [`Program`]). Every GPU call goes
//! through a [`Context`], which is either the windowed `wgpu` state or the
//! [`DummyContext`] ledger.

mod buffer;
mod dummy;
mod error;
mod layout;
mod program;
mod vertex_array;

pub(crate) use buffer::Buffer;
pub(crate) use dummy::DummyContext;
pub(crate) use error::{GraphicsError, LayoutError};
pub(crate) use layout::{tiles, Vertex, VertexAttribute, VertexLayout};
pub(crate) use program::{Program, ShaderSources};
pub(crate) use vertex_array::{AttributeBinding, VertexArray};

#[cfg(test)]
pub(crate) use dummy::Call;

/// Opaque name of a context-owned resource.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Handle(u32);

impl Handle {
    pub(crate) fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub(crate) fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum BufferKind {
    Vertex,
    Index,
}

/// Allocation hint: `Static` buffers are written once, `Dynamic` ones often.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum BufferUsage {
    Static,
    Dynamic,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct BufferDescriptor {
    pub(crate) kind: BufferKind,
    pub(crate) usage: BufferUsage,
    pub(crate) size: u64,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Viewport {
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl Viewport {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Elements {
    /// `count` indices read from an index buffer bound for this draw only.
    Indexed { buffer: Handle, count: u32 },
    /// `count` vertices read in order.
    Arrays { count: u32 },
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct DrawCall {
    pub(crate) program: Handle,
    pub(crate) vertex_array: Handle,
    pub(crate) elements: Elements,
    pub(crate) clear_color: [f32; 4],
}

/// Result of linking a program. `info_log` carries compiler or linker
/// diagnostics; the handle is valid either way.
#[derive(Debug)]
pub(crate) struct Linked {
    pub(crate) handle: Handle,
    pub(crate) info_log: Option<String>,
}

/// A graphics context. All calls must happen on the thread that owns it.
pub(crate) trait Context {
    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<Handle, GraphicsError>;

    fn write_buffer(&mut self, buffer: Handle, contents: &[u8]) -> Result<(), GraphicsError>;

    /// Reads `size` bytes from the start of `buffer`, or `None` when the
    /// context cannot read buffers back.
    fn read_buffer(&mut self, buffer: Handle, size: u64) -> Result<Option<Vec<u8>>, GraphicsError>;

    fn delete_buffer(&mut self, buffer: Handle);

    fn create_vertex_array(&mut self) -> Result<Handle, GraphicsError>;

    fn bind_vertex_array(
        &mut self,
        vertex_array: Handle,
        buffer: Handle,
        bindings: &[AttributeBinding],
    ) -> Result<(), GraphicsError>;

    fn delete_vertex_array(&mut self, vertex_array: Handle);

    fn link_program(
        &mut self,
        sources: &ShaderSources,
        layout: &VertexLayout,
    ) -> Result<Linked, GraphicsError>;

    fn delete_program(&mut self, program: Handle);

    fn set_viewport(&mut self, viewport: Viewport);

    /// Clears, draws and presents one frame. Returns `false` when nothing
    /// was presented because the viewport is empty.
    fn draw(&mut self, call: &DrawCall) -> Result<bool, GraphicsError>;
}
