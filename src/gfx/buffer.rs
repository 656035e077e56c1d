use super::{BufferDescriptor, BufferKind, BufferUsage, Context, GraphicsError, Handle, Vertex};

/// A typed-stride view over one device buffer.
///
/// The wrapper owns its handle until [`Buffer::release`]; releasing twice is
/// a no-op.
#[derive(Debug)]
pub(crate) struct Buffer {
    handle: Option<Handle>,
    kind: BufferKind,
    usage: BufferUsage,
    element_stride: u32,
    capacity: u32,
    len: u32,
}

impl Buffer {
    /// Reserves `capacity * element_stride` bytes of device storage.
    pub(crate) fn allocate<C: Context>(
        ctx: &mut C,
        kind: BufferKind,
        capacity: u32,
        element_stride: u32,
        usage: BufferUsage,
    ) -> Result<Self, GraphicsError> {
        let size = u64::from(capacity) * u64::from(element_stride);
        let handle = ctx.create_buffer(&BufferDescriptor { kind, usage, size })?;

        log::debug!(
            "allocated {:?} {:?} buffer {:?}: {} x {} bytes",
            usage,
            kind,
            handle,
            capacity,
            element_stride
        );

        Ok(Self {
            handle: Some(handle),
            kind,
            usage,
            element_stride,
            capacity,
            len: 0,
        })
    }

    pub(crate) fn vertices<V: Vertex, C: Context>(
        ctx: &mut C,
        capacity: u32,
        usage: BufferUsage,
    ) -> Result<Self, GraphicsError> {
        Self::allocate(ctx, BufferKind::Vertex, capacity, V::LAYOUT.stride(), usage)
    }

    /// An index buffer of `u32` elements.
    pub(crate) fn indices<C: Context>(
        ctx: &mut C,
        capacity: u32,
        usage: BufferUsage,
    ) -> Result<Self, GraphicsError> {
        let stride = std::mem::size_of::<u32>() as u32;
        Self::allocate(ctx, BufferKind::Index, capacity, stride, usage)
    }

    /// Replaces the buffer contents with `data`.
    pub(crate) fn upload<T: bytemuck::Pod, C: Context>(
        &mut self,
        ctx: &mut C,
        data: &[T],
    ) -> Result<(), GraphicsError> {
        let handle = self.handle.ok_or(GraphicsError::Released)?;

        let found = std::mem::size_of::<T>() as u32;
        if found != self.element_stride {
            return Err(GraphicsError::StrideMismatch {
                expected: self.element_stride,
                found,
            });
        }

        if data.len() > self.capacity as usize {
            return Err(GraphicsError::Overflow {
                count: data.len(),
                capacity: self.capacity,
            });
        }

        ctx.write_buffer(handle, bytemuck::cast_slice(data))?;
        self.len = data.len() as u32;

        log::trace!("uploaded {} elements to {:?}", self.len, handle);

        Ok(())
    }

    /// Reads the uploaded elements back, where the context supports it.
    pub(crate) fn read_back<T: bytemuck::Pod, C: Context>(
        &self,
        ctx: &mut C,
    ) -> Result<Option<Vec<T>>, GraphicsError> {
        let handle = self.handle.ok_or(GraphicsError::Released)?;

        let found = std::mem::size_of::<T>() as u32;
        if found != self.element_stride {
            return Err(GraphicsError::StrideMismatch {
                expected: self.element_stride,
                found,
            });
        }

        let size = u64::from(self.len) * u64::from(self.element_stride);
        let bytes = match ctx.read_buffer(handle, size)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        if bytes.len() as u64 != size {
            return Err(GraphicsError::Readback(format!(
                "expected {} bytes, got {}",
                size,
                bytes.len()
            )));
        }

        // Copy through a zeroed vec, the byte vec is not aligned for `T`.
        let mut elements = vec![T::zeroed(); self.len as usize];
        bytemuck::cast_slice_mut::<T, u8>(&mut elements).copy_from_slice(&bytes);

        Ok(Some(elements))
    }

    /// Frees the device storage. Returns `false` if it was already freed.
    pub(crate) fn release<C: Context>(&mut self, ctx: &mut C) -> bool {
        match self.handle.take() {
            Some(handle) => {
                ctx.delete_buffer(handle);
                log::debug!("released {:?} buffer {:?}", self.kind, handle);
                true
            }
            None => false,
        }
    }

    pub(crate) fn handle(&self) -> Option<Handle> {
        self.handle
    }

    pub(crate) fn kind(&self) -> BufferKind {
        self.kind
    }

    #[cfg(test)]
    pub(crate) fn is_dynamic(&self) -> bool {
        self.usage == BufferUsage::Dynamic
    }

    pub(crate) fn element_stride(&self) -> u32 {
        self.element_stride
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> u32 {
        self.capacity
    }

    pub(crate) fn len(&self) -> u32 {
        self.len
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle {
            log::warn!("{:?} buffer {:?} dropped without being released", self.kind, handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{Call, DummyContext, VertexAttribute, VertexLayout};

    #[repr(C)]
    #[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Point {
        position: [f32; 2],
    }

    const POINT_ATTRIBUTES: &[VertexAttribute] = &[VertexAttribute::new("Position", 0, 2, 0)];

    impl Vertex for Point {
        const LAYOUT: VertexLayout = VertexLayout::new(POINT_ATTRIBUTES);
    }

    fn points(n: usize) -> Vec<Point> {
        (0..n).map(|i| Point { position: [i as f32, -(i as f32)] }).collect()
    }

    #[test]
    fn allocate_sizes_storage_from_capacity_and_stride() {
        let mut ctx = DummyContext::new();
        let mut buffer = Buffer::vertices::<Point, _>(&mut ctx, 16, BufferUsage::Static).unwrap();

        let handle = buffer.handle().unwrap();
        assert_eq!(ctx.buffer_size(handle), Some(16 * 8));
        assert_eq!(buffer.element_stride(), 8);
        assert_eq!(buffer.capacity(), 16);
        assert_eq!(buffer.len(), 0);
        assert!(!buffer.is_dynamic());

        buffer.release(&mut ctx);
    }

    #[test]
    fn usage_hint_reaches_the_context() {
        let mut ctx = DummyContext::new();
        let mut buffer = Buffer::indices(&mut ctx, 6, BufferUsage::Dynamic).unwrap();

        assert!(buffer.is_dynamic());
        assert_eq!(buffer.kind(), BufferKind::Index);
        assert_eq!(ctx.buffer_usage(buffer.handle().unwrap()), Some(BufferUsage::Dynamic));

        buffer.release(&mut ctx);
    }

    #[test]
    fn upload_then_read_back() {
        let mut ctx = DummyContext::new();
        let mut buffer = Buffer::vertices::<Point, _>(&mut ctx, 8, BufferUsage::Dynamic).unwrap();

        let data = points(5);
        buffer.upload(&mut ctx, &data).unwrap();
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.read_back::<Point, _>(&mut ctx).unwrap(), Some(data));

        // A second upload replaces the contents.
        let data = points(2);
        buffer.upload(&mut ctx, &data).unwrap();
        assert_eq!(buffer.read_back::<Point, _>(&mut ctx).unwrap(), Some(data));

        buffer.release(&mut ctx);
    }

    #[test]
    fn upload_up_to_capacity_succeeds() {
        let mut ctx = DummyContext::new();
        let mut buffer = Buffer::indices(&mut ctx, 6, BufferUsage::Static).unwrap();

        buffer.upload(&mut ctx, &[0u32, 1, 2, 0, 2, 3]).unwrap();
        assert_eq!(buffer.len(), 6);

        buffer.release(&mut ctx);
    }

    #[test]
    fn upload_past_capacity_fails() {
        let mut ctx = DummyContext::new();
        let mut buffer = Buffer::vertices::<Point, _>(&mut ctx, 2, BufferUsage::Static).unwrap();

        let err = buffer.upload(&mut ctx, &points(3)).unwrap_err();
        assert!(matches!(err, GraphicsError::Overflow { count: 3, capacity: 2 }));
        assert_eq!(buffer.len(), 0);

        buffer.release(&mut ctx);
    }

    #[test]
    fn upload_with_wrong_element_size_fails() {
        let mut ctx = DummyContext::new();
        let mut buffer = Buffer::vertices::<Point, _>(&mut ctx, 4, BufferUsage::Static).unwrap();

        let err = buffer.upload(&mut ctx, &[1u32, 2, 3]).unwrap_err();
        assert!(matches!(err, GraphicsError::StrideMismatch { expected: 8, found: 4 }));

        buffer.release(&mut ctx);
    }

    #[test]
    fn release_is_idempotent() {
        let mut ctx = DummyContext::new();
        let mut buffer = Buffer::indices(&mut ctx, 3, BufferUsage::Static).unwrap();
        let handle = buffer.handle().unwrap();

        assert!(buffer.release(&mut ctx));
        assert!(!buffer.release(&mut ctx));
        assert!(buffer.handle().is_none());

        let deletes = ctx
            .calls()
            .iter()
            .filter(|c| **c == Call::DeleteBuffer(handle))
            .count();
        assert_eq!(deletes, 1);
        assert_eq!(ctx.live_resources(), 0);
    }

    #[test]
    fn released_buffer_rejects_upload() {
        let mut ctx = DummyContext::new();
        let mut buffer = Buffer::indices(&mut ctx, 3, BufferUsage::Static).unwrap();
        buffer.release(&mut ctx);

        assert!(matches!(
            buffer.upload(&mut ctx, &[0u32]),
            Err(GraphicsError::Released)
        ));
    }
}
