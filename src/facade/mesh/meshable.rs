use super::ColorVertex;

pub(crate) const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

pub(crate) trait Meshable {
    fn vertices(&self) -> Vec<ColorVertex>;

    /// Triangle-list indices into `vertices`; empty for non-indexed shapes.
    fn indices(&self) -> Vec<u32>;
}

/// A centered quad with a different color in each corner.
pub(crate) struct Quad;

impl Quad {
    const VERTICES: [ColorVertex; 4] = [
        ColorVertex { position: [-0.5,  0.5], color: [1.0, 0.0, 0.0, 1.0] },
        ColorVertex { position: [ 0.5,  0.5], color: [0.0, 1.0, 0.0, 1.0] },
        ColorVertex { position: [ 0.5, -0.5], color: [0.0, 0.0, 1.0, 1.0] },
        ColorVertex { position: [-0.5, -0.5], color: [1.0, 1.0, 0.0, 1.0] },
    ];
}

impl Meshable for Quad {
    fn vertices(&self) -> Vec<ColorVertex> {
        Self::VERTICES.to_vec()
    }

    fn indices(&self) -> Vec<u32> {
        QUAD_INDICES.to_vec()
    }
}

/// A single triangle, drawn without an index buffer.
pub(crate) struct Triangle;

impl Triangle {
    const VERTICES: [ColorVertex; 3] = [
        ColorVertex { position: [ 0.0,  0.5], color: [1.0, 0.0, 0.0, 1.0] },
        ColorVertex { position: [-0.5, -0.5], color: [0.0, 1.0, 0.0, 1.0] },
        ColorVertex { position: [ 0.5, -0.5], color: [0.0, 0.0, 1.0, 1.0] },
    ];
}

impl Meshable for Triangle {
    fn vertices(&self) -> Vec<ColorVertex> {
        Self::VERTICES.to_vec()
    }

    fn indices(&self) -> Vec<u32> {
        Vec::new()
    }
}
