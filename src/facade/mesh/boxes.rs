use std::hash::{Hash, Hasher};

use cgmath::{Point2, Vector2};
use rand::Rng;
use rand_seeder::{SipHasher, SipRng};

use crate::config::BoxConfig;

use super::meshable::QUAD_INDICES;
use super::{ColorVertex, Meshable};

/// An axis-aligned, solid-colored box in clip space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct ColoredBox {
    pub(crate) origin: Point2<f32>,
    pub(crate) size: Vector2<f32>,
    pub(crate) color: [f32; 4],
}

impl ColoredBox {
    /// A box with random size and color, placed fully inside `[-1, 1]`.
    pub(crate) fn random<R: Rng>(rng: &mut R, min_size: f32, max_size: f32) -> Self {
        let size = Vector2::new(
            rng.gen_range(min_size..=max_size),
            rng.gen_range(min_size..=max_size),
        );

        let origin = Point2::new(
            rng.gen_range(-1f32..=(1f32 - size.x)),
            rng.gen_range(-1f32..=(1f32 - size.y)),
        );

        let color = [
            rng.gen_range(0f32..1f32),
            rng.gen_range(0f32..1f32),
            rng.gen_range(0f32..1f32),
            1f32,
        ];

        Self { origin, size, color }
    }
}

impl Meshable for ColoredBox {
    fn vertices(&self) -> Vec<ColorVertex> {
        let (x0, y0) = (self.origin.x, self.origin.y);
        let (x1, y1) = (x0 + self.size.x, y0 + self.size.y);

        // Same winding as the quad: top-left, top-right, bottom-right, bottom-left
        vec![
            ColorVertex::new([x0, y1], self.color),
            ColorVertex::new([x1, y1], self.color),
            ColorVertex::new([x1, y0], self.color),
            ColorVertex::new([x0, y0], self.color),
        ]
    }

    fn indices(&self) -> Vec<u32> {
        QUAD_INDICES.to_vec()
    }
}

pub(crate) fn generate<R: Rng>(rng: &mut R, config: &BoxConfig) -> Vec<ColoredBox> {
    (0..config.count)
        .map(|_| ColoredBox::random(rng, config.min_size, config.max_size))
        .collect()
}

/// A reproducible generator for a seed phrase.
pub(crate) fn seeded(seed: &str) -> SipRng {
    let mut hasher = SipHasher::new();
    seed.hash(&mut hasher);
    hasher.into_rng()
}
