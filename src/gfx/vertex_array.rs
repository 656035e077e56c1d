use super::{Buffer, BufferKind, Context, GraphicsError, Handle, VertexLayout};

/// One enabled attribute slot, as handed to the context.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct AttributeBinding {
    pub(crate) index: u32,
    pub(crate) components: u32,
    pub(crate) offset: u32,
    pub(crate) stride: u32,
}

impl AttributeBinding {
    /// One binding per attribute of `layout`, in declaration order.
    pub(crate) fn for_layout(layout: &VertexLayout) -> Vec<Self> {
        layout
            .attributes()
            .iter()
            .map(|attribute| Self {
                index: attribute.index(),
                components: attribute.components(),
                offset: attribute.offset(),
                stride: layout.stride(),
            })
            .collect()
    }
}

/// Attribute bindings of a layout against a single vertex buffer.
#[derive(Debug)]
pub(crate) struct VertexArray {
    handle: Option<Handle>,
    layout: VertexLayout,
    buffer: Option<Handle>,
}

impl VertexArray {
    pub(crate) fn new<C: Context>(ctx: &mut C, layout: VertexLayout) -> Result<Self, GraphicsError> {
        let handle = ctx.create_vertex_array()?;

        Ok(Self {
            handle: Some(handle),
            layout,
            buffer: None,
        })
    }

    /// Points every attribute of the layout at `buffer`.
    ///
    /// Binding the buffer that is already bound does nothing.
    pub(crate) fn bind<C: Context>(&mut self, ctx: &mut C, buffer: &Buffer) -> Result<(), GraphicsError> {
        let handle = self.handle.ok_or(GraphicsError::Released)?;
        let target = buffer.handle().ok_or(GraphicsError::Released)?;

        if buffer.kind() != BufferKind::Vertex {
            return Err(GraphicsError::WrongKind {
                expected: BufferKind::Vertex,
                found: buffer.kind(),
            });
        }

        let stride = self.layout.stride();
        if buffer.element_stride() != stride {
            return Err(GraphicsError::StrideMismatch {
                expected: stride,
                found: buffer.element_stride(),
            });
        }

        if self.buffer == Some(target) {
            return Ok(());
        }

        let bindings = AttributeBinding::for_layout(&self.layout);

        ctx.bind_vertex_array(handle, target, &bindings)?;

        log::debug!("vertex array {:?} bound to buffer {:?}", handle, target);

        self.buffer = Some(target);

        Ok(())
    }

    /// Whether `buffer` differs from the buffer the attributes point at.
    pub(crate) fn needs_rebind(&self, buffer: &Buffer) -> bool {
        buffer.handle().is_none() || self.buffer != buffer.handle()
    }

    pub(crate) fn release<C: Context>(&mut self, ctx: &mut C) -> bool {
        match self.handle.take() {
            Some(handle) => {
                ctx.delete_vertex_array(handle);
                self.buffer = None;
                log::debug!("released vertex array {:?}", handle);
                true
            }
            None => false,
        }
    }

    pub(crate) fn handle(&self) -> Option<Handle> {
        self.handle
    }
}

impl Drop for VertexArray {
    fn drop(&mut self) {
        if let Some(handle) = self.handle {
            log::warn!("vertex array {:?} dropped without being released", handle);
        }
    }
}
