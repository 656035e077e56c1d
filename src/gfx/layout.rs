//! Reflection-free vertex layout descriptors.
//!
//! A [`VertexLayout`] lists the float attributes of a vertex record in the
//! order they appear in memory. Layouts are built in `const` context, so a
//! malformed layout for a built-in record is a compile error rather than
//! corrupted rendering.

use super::LayoutError;

const FLOAT_SIZE: u32 = std::mem::size_of::<f32>() as u32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct VertexAttribute {
    name: &'static str,
    index: u32,
    components: u32,
    offset: u32,
}

impl VertexAttribute {
    pub(crate) const fn new(name: &'static str, index: u32, components: u32, offset: u32) -> Self {
        Self { name, index, components, offset }
    }

    #[cfg(test)]
    pub(crate) const fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) const fn index(&self) -> u32 {
        self.index
    }

    pub(crate) const fn components(&self) -> u32 {
        self.components
    }

    pub(crate) const fn offset(&self) -> u32 {
        self.offset
    }

    pub(crate) const fn size(&self) -> u32 {
        self.components * FLOAT_SIZE
    }

    const fn end(&self) -> u32 {
        self.offset + self.size()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct VertexLayout {
    attributes: &'static [VertexAttribute],
    stride: u32,
}

impl VertexLayout {
    /// Builds a layout, panicking on invalid input. Use in `const` items.
    pub(crate) const fn new(attributes: &'static [VertexAttribute]) -> Self {
        match Self::try_new(attributes) {
            Ok(layout) => layout,
            Err(_) => panic!("invalid vertex layout"),
        }
    }

    pub(crate) const fn try_new(attributes: &'static [VertexAttribute]) -> Result<Self, LayoutError> {
        if attributes.is_empty() {
            return Err(LayoutError::Empty);
        }

        let mut stride = 0;
        let mut i = 0;
        while i < attributes.len() {
            let attribute = attributes[i];
            if attribute.components == 0 || attribute.components > 4 {
                return Err(LayoutError::ComponentCount {
                    name: attribute.name,
                    components: attribute.components,
                });
            }

            stride += attribute.size();
            i += 1;
        }

        let mut i = 0;
        while i < attributes.len() {
            let a = attributes[i];
            if a.offset % FLOAT_SIZE != 0 {
                return Err(LayoutError::Misaligned { name: a.name, offset: a.offset });
            }

            if a.end() > stride {
                return Err(LayoutError::OutOfBounds { name: a.name, offset: a.offset, stride });
            }

            let mut j = i + 1;
            while j < attributes.len() {
                let b = attributes[j];
                if a.index == b.index {
                    return Err(LayoutError::DuplicateIndex {
                        first: a.name,
                        second: b.name,
                        index: a.index,
                    });
                }

                if a.offset < b.end() && b.offset < a.end() {
                    return Err(LayoutError::Overlap { first: a.name, second: b.name });
                }

                j += 1;
            }

            i += 1;
        }

        Ok(Self { attributes, stride })
    }

    pub(crate) const fn stride(&self) -> u32 {
        self.stride
    }

    pub(crate) const fn attributes(&self) -> &'static [VertexAttribute] {
        self.attributes
    }

    pub(crate) fn attribute(&self, name: &str) -> Option<&'static VertexAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// A tightly packed vertex record with a matching layout.
pub(crate) trait Vertex: bytemuck::Pod {
    const LAYOUT: VertexLayout;
}

/// Whether the record's size matches its layout stride.
///
/// Attribute ranges are already known to be disjoint and inside the stride,
/// so equal sizes mean the attributes tile the record exactly.
pub(crate) const fn tiles<V: Vertex>() -> bool {
    V::LAYOUT.stride() as usize == std::mem::size_of::<V>()
}
