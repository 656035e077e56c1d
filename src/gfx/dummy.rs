//! Dummy graphics context.
//!
//! Performs no GPU work. Buffers live in host memory so uploads can be read
//! back, and every call is recorded so resource lifetimes can be audited
//! after a run (headless `--backend dummy` runs and the tests both rely on
//! this).

use std::collections::HashMap;

use super::{
    AttributeBinding, BufferDescriptor, BufferUsage, Context, DrawCall, Elements, GraphicsError,
    Handle, Linked, ShaderSources, VertexLayout, Viewport,
};

/// A recorded context call.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Call {
    CreateBuffer(Handle),
    WriteBuffer(Handle, usize),
    DeleteBuffer(Handle),
    CreateVertexArray(Handle),
    BindVertexArray(Handle, Handle),
    DeleteVertexArray(Handle),
    LinkProgram(Handle),
    DeleteProgram(Handle),
    SetViewport(Viewport),
    Draw(DrawCall),
}

#[derive(Debug)]
struct DummyBuffer {
    usage: BufferUsage,
    contents: Vec<u8>,
}

#[derive(Debug, Default)]
struct DummyVertexArray {
    source: Option<Handle>,
    bindings: Vec<AttributeBinding>,
}

#[derive(Debug, Default)]
pub(crate) struct DummyContext {
    next_handle: u32,
    buffers: HashMap<Handle, DummyBuffer>,
    vertex_arrays: HashMap<Handle, DummyVertexArray>,
    /// Attribute bindings each program was linked against.
    programs: HashMap<Handle, Vec<AttributeBinding>>,
    viewport: Viewport,
    link_error: Option<String>,
    resource_limit: Option<usize>,
    frames: u64,
    calls: Vec<Call>,
}

impl DummyContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    /// Makes every subsequent link report `info_log`.
    pub(crate) fn with_link_error(mut self, info_log: impl Into<String>) -> Self {
        self.link_error = Some(info_log.into());
        self
    }

    #[cfg(test)]
    /// Fails every allocation once `limit` resources are alive.
    pub(crate) fn with_resource_limit(mut self, limit: usize) -> Self {
        self.resource_limit = Some(limit);
        self
    }

    #[cfg(test)]
    pub(crate) fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Number of buffers, vertex arrays and programs not yet deleted.
    pub(crate) fn live_resources(&self) -> usize {
        self.buffers.len() + self.vertex_arrays.len() + self.programs.len()
    }

    /// Number of handles ever created.
    pub(crate) fn created_resources(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    Call::CreateBuffer(_) | Call::CreateVertexArray(_) | Call::LinkProgram(_)
                )
            })
            .count()
    }

    pub(crate) fn frames(&self) -> u64 {
        self.frames
    }

    #[cfg(test)]
    pub(crate) fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[cfg(test)]
    pub(crate) fn buffer_size(&self, buffer: Handle) -> Option<u64> {
        self.buffers.get(&buffer).map(|b| b.contents.len() as u64)
    }

    #[cfg(test)]
    pub(crate) fn buffer_usage(&self, buffer: Handle) -> Option<BufferUsage> {
        self.buffers.get(&buffer).map(|b| b.usage)
    }

    #[cfg(test)]
    pub(crate) fn buffer_contents(&self, buffer: Handle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.contents.as_slice())
    }

    #[cfg(test)]
    pub(crate) fn vertex_array_source(&self, vertex_array: Handle) -> Option<Handle> {
        self.vertex_arrays.get(&vertex_array).and_then(|va| va.source)
    }

    #[cfg(test)]
    pub(crate) fn vertex_array_bindings(&self, vertex_array: Handle) -> Option<&[AttributeBinding]> {
        self.vertex_arrays.get(&vertex_array).map(|va| va.bindings.as_slice())
    }

    fn allocate_handle(&mut self) -> Result<Handle, GraphicsError> {
        if matches!(self.resource_limit, Some(limit) if self.live_resources() >= limit) {
            return Err(GraphicsError::OutOfMemory);
        }

        self.next_handle += 1;
        Ok(Handle::new(self.next_handle))
    }
}

impl Context for DummyContext {
    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<Handle, GraphicsError> {
        let handle = self.allocate_handle()?;
        log::trace!(
            "DummyContext: creating {:?} buffer {:?} ({} bytes)",
            descriptor.kind,
            handle,
            descriptor.size
        );

        self.buffers.insert(
            handle,
            DummyBuffer {
                usage: descriptor.usage,
                contents: vec![0; descriptor.size as usize],
            },
        );
        self.calls.push(Call::CreateBuffer(handle));

        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: Handle, contents: &[u8]) -> Result<(), GraphicsError> {
        let target = self
            .buffers
            .get_mut(&buffer)
            .ok_or(GraphicsError::UnknownHandle(buffer))?;

        if contents.len() > target.contents.len() {
            return Err(GraphicsError::BufferTooSmall {
                size: contents.len() as u64,
                capacity: target.contents.len() as u64,
            });
        }

        target.contents[..contents.len()].copy_from_slice(contents);
        self.calls.push(Call::WriteBuffer(buffer, contents.len()));

        Ok(())
    }

    fn read_buffer(&mut self, buffer: Handle, size: u64) -> Result<Option<Vec<u8>>, GraphicsError> {
        let source = self
            .buffers
            .get(&buffer)
            .ok_or(GraphicsError::UnknownHandle(buffer))?;

        source
            .contents
            .get(..size as usize)
            .map(|bytes| Some(bytes.to_vec()))
            .ok_or_else(|| GraphicsError::Readback(format!("{size} bytes is past the end of {buffer:?}")))
    }

    fn delete_buffer(&mut self, buffer: Handle) {
        if self.buffers.remove(&buffer).is_none() {
            log::warn!("DummyContext: deleting unknown buffer {:?}", buffer);
        }
        self.calls.push(Call::DeleteBuffer(buffer));
    }

    fn create_vertex_array(&mut self) -> Result<Handle, GraphicsError> {
        let handle = self.allocate_handle()?;
        self.vertex_arrays.insert(handle, DummyVertexArray::default());
        self.calls.push(Call::CreateVertexArray(handle));

        Ok(handle)
    }

    fn bind_vertex_array(
        &mut self,
        vertex_array: Handle,
        buffer: Handle,
        bindings: &[AttributeBinding],
    ) -> Result<(), GraphicsError> {
        if !self.buffers.contains_key(&buffer) {
            return Err(GraphicsError::UnknownHandle(buffer));
        }

        let target = self
            .vertex_arrays
            .get_mut(&vertex_array)
            .ok_or(GraphicsError::UnknownHandle(vertex_array))?;
        target.source = Some(buffer);
        target.bindings = bindings.to_vec();

        log::trace!(
            "DummyContext: {:?} reads {} attributes from {:?}",
            vertex_array,
            bindings.len(),
            buffer
        );
        self.calls.push(Call::BindVertexArray(vertex_array, buffer));

        Ok(())
    }

    fn delete_vertex_array(&mut self, vertex_array: Handle) {
        if self.vertex_arrays.remove(&vertex_array).is_none() {
            log::warn!("DummyContext: deleting unknown vertex array {:?}", vertex_array);
        }
        self.calls.push(Call::DeleteVertexArray(vertex_array));
    }

    fn link_program(
        &mut self,
        _sources: &ShaderSources,
        layout: &VertexLayout,
    ) -> Result<Linked, GraphicsError> {
        let handle = self.allocate_handle()?;
        log::trace!(
            "DummyContext: linking program {:?} ({} attributes)",
            handle,
            layout.attributes().len()
        );

        self.programs.insert(handle, AttributeBinding::for_layout(layout));
        self.calls.push(Call::LinkProgram(handle));

        Ok(Linked {
            handle,
            info_log: self.link_error.clone(),
        })
    }

    fn delete_program(&mut self, program: Handle) {
        if self.programs.remove(&program).is_none() {
            log::warn!("DummyContext: deleting unknown program {:?}", program);
        }
        self.calls.push(Call::DeleteProgram(program));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.calls.push(Call::SetViewport(viewport));
    }

    fn draw(&mut self, call: &DrawCall) -> Result<bool, GraphicsError> {
        let expected = self
            .programs
            .get(&call.program)
            .ok_or(GraphicsError::UnknownHandle(call.program))?;

        let vertex_array = self
            .vertex_arrays
            .get(&call.vertex_array)
            .ok_or(GraphicsError::UnknownHandle(call.vertex_array))?;
        let source = vertex_array.source.ok_or(GraphicsError::Unbound(call.vertex_array))?;

        // The bound buffer may have been deleted since the bind
        if !self.buffers.contains_key(&source) {
            return Err(GraphicsError::UnknownHandle(source));
        }

        if vertex_array.bindings != *expected {
            return Err(GraphicsError::LayoutMismatch {
                program: call.program,
                vertex_array: call.vertex_array,
            });
        }

        if let Elements::Indexed { buffer, count } = call.elements {
            let indices = self.buffers.get(&buffer).ok_or(GraphicsError::UnknownHandle(buffer))?;
            let capacity = (indices.contents.len() / std::mem::size_of::<u32>()) as u32;
            if count > capacity {
                return Err(GraphicsError::Overflow { count: count as usize, capacity });
            }
        }

        if self.viewport.is_empty() {
            return Ok(false);
        }

        self.frames += 1;
        self.calls.push(Call::Draw(*call));

        Ok(true)
    }
}
