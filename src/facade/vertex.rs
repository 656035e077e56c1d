use crate::gfx::{self, VertexAttribute, VertexLayout};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct ColorVertex {
    pub(crate) position: [f32; 2],
    pub(crate) color: [f32; 4],
}

impl ColorVertex {
    const ATTRIBUTES: &'static [VertexAttribute] = &[
        VertexAttribute::new("Position", 0, 2, 0),
        VertexAttribute::new("Color", 1, 4, 2 * 4),
    ];

    pub(crate) fn new(position: [f32; 2], color: [f32; 4]) -> Self {
        Self { position, color }
    }
}

impl gfx::Vertex for ColorVertex {
    const LAYOUT: VertexLayout = VertexLayout::new(Self::ATTRIBUTES);
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct TexturedVertex {
    pub(crate) position: [f32; 2],
    pub(crate) tex_coord: [f32; 2],
}

impl TexturedVertex {
    const ATTRIBUTES: &'static [VertexAttribute] = &[
        VertexAttribute::new("Position", 0, 2, 0),
        VertexAttribute::new("TexCoord", 1, 2, 2 * 4),
    ];
}

impl gfx::Vertex for TexturedVertex {
    const LAYOUT: VertexLayout = VertexLayout::new(Self::ATTRIBUTES);
}

const _: () = assert!(gfx::tiles::<ColorVertex>(), "ColorVertex does not match its layout");
const _: () = assert!(gfx::tiles::<TexturedVertex>(), "TexturedVertex does not match its layout");
