mod boxes;
mod meshable;

use crate::config::{BoxConfig, Demo};

use super::vertex::ColorVertex;

use self::meshable::{Meshable, Quad, Triangle};

/// CPU-side geometry, uploaded once at load.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Mesh {
    pub(crate) vertices: Vec<ColorVertex>,
    pub(crate) indices: Vec<u32>,
}

impl Mesh {
    pub(crate) fn from_shape<M: Meshable>(shape: &M) -> Self {
        Self {
            vertices: shape.vertices(),
            indices: shape.indices(),
        }
    }

    /// Concatenates indexed shapes into one mesh, offsetting each shape's
    /// indices past the vertices already added.
    pub(crate) fn batch<'a, M, I>(shapes: I) -> Self
    where
        M: Meshable + 'a,
        I: IntoIterator<Item = &'a M>,
    {
        let mut mesh = Self::default();
        for shape in shapes {
            mesh.append(Self::from_shape(shape));
        }

        mesh
    }

    pub(crate) fn for_demo(demo: Demo, config: &BoxConfig) -> Self {
        match demo {
            Demo::Quad => Self::from_shape(&Quad),
            Demo::Triangle => Self::from_shape(&Triangle),
            Demo::Boxes => {
                let shapes = match &config.seed {
                    Some(seed) => boxes::generate(&mut boxes::seeded(seed), config),
                    None => boxes::generate(&mut rand::thread_rng(), config),
                };

                Self::batch(&shapes)
            }
        }
    }

    fn append(&mut self, mut other: Mesh) {
        let offset = self.vertices.len() as u32;
        other.indices.iter_mut().for_each(|i| *i += offset);

        self.vertices.append(&mut other.vertices);
        self.indices.append(&mut other.indices);
    }

    pub(crate) fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    pub(crate) fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub(crate) fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}
