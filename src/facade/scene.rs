use crate::gfx::{
    Buffer, BufferUsage, Context, DrawCall, Elements, GraphicsError, Program, ShaderSources, Vertex,
    VertexArray, Viewport,
};

use super::mesh::Mesh;
use super::vertex::ColorVertex;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Stage {
    Unloaded,
    Loaded,
    Rendering,
}

/// GPU resources of a scene, in allocation order. Everything after the
/// vertex buffer is optional so a half-finished load can be rolled back.
struct Resources {
    vertex_buffer: Buffer,
    index_buffer: Option<Buffer>,
    vertex_array: Option<VertexArray>,
    program: Option<Program>,
}

impl Resources {
    fn release<C: Context>(&mut self, ctx: &mut C) {
        if let Some(program) = &mut self.program {
            program.release(ctx);
        }
        if let Some(vertex_array) = &mut self.vertex_array {
            vertex_array.release(ctx);
        }
        if let Some(index_buffer) = &mut self.index_buffer {
            index_buffer.release(ctx);
        }
        self.vertex_buffer.release(ctx);
    }
}

/// The load / resize / render / unload bodies driven by the window loop.
pub(crate) struct Scene {
    stage: Stage,
    mesh: Mesh,
    clear_color: [f32; 4],
    viewport: Viewport,
    resources: Option<Resources>,
}

impl Scene {
    pub(crate) fn new(mesh: Mesh, clear_color: [f32; 4], viewport: Viewport) -> Self {
        Self {
            stage: Stage::Unloaded,
            mesh,
            clear_color,
            viewport,
            resources: None,
        }
    }

    pub(crate) fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Allocates and uploads the mesh, then links the program.
    ///
    /// On failure everything allocated so far is released again and the
    /// scene stays unloaded.
    pub(crate) fn load<C: Context>(&mut self, ctx: &mut C, sources: &ShaderSources) -> Result<(), GraphicsError> {
        if self.stage != Stage::Unloaded {
            log::warn!("scene is already loaded");
            return Ok(());
        }

        let mut resources = Resources {
            vertex_buffer: Buffer::vertices::<ColorVertex, _>(ctx, self.mesh.vertex_count(), BufferUsage::Static)?,
            index_buffer: None,
            vertex_array: None,
            program: None,
        };

        if let Err(e) = self.fill(ctx, &mut resources, sources) {
            resources.release(ctx);
            return Err(e);
        }

        self.resources = Some(resources);
        self.stage = Stage::Loaded;
        ctx.set_viewport(self.viewport);

        log::info!(
            "scene loaded: {} vertices, {} indices",
            self.mesh.vertex_count(),
            self.mesh.index_count()
        );

        Ok(())
    }

    fn fill<C: Context>(
        &self,
        ctx: &mut C,
        resources: &mut Resources,
        sources: &ShaderSources,
    ) -> Result<(), GraphicsError> {
        resources.vertex_buffer.upload(ctx, &self.mesh.vertices)?;

        if self.mesh.is_indexed() {
            let index_buffer = resources
                .index_buffer
                .insert(Buffer::indices(ctx, self.mesh.index_count(), BufferUsage::Static)?);
            index_buffer.upload(ctx, &self.mesh.indices)?;
        }

        let vertex_array = resources
            .vertex_array
            .insert(VertexArray::new(ctx, ColorVertex::LAYOUT)?);
        vertex_array.bind(ctx, &resources.vertex_buffer)?;

        let program = resources
            .program
            .insert(Program::link(ctx, sources, &ColorVertex::LAYOUT)?);
        if !program.is_linked() {
            log::warn!("frames will be cleared but nothing drawn");
        }

        Ok(())
    }

    /// Updates the viewport. Buffer contents are left untouched.
    pub(crate) fn resize<C: Context>(&mut self, ctx: &mut C, width: u32, height: u32) {
        self.viewport = Viewport::new(width, height);
        ctx.set_viewport(self.viewport);

        log::debug!("viewport resized to {}x{}", width, height);
    }

    /// Clears, draws the mesh once and presents. Returns whether a frame
    /// was actually presented.
    pub(crate) fn render<C: Context>(&mut self, ctx: &mut C) -> Result<bool, GraphicsError> {
        let resources = self.resources.as_mut().ok_or(GraphicsError::NotLoaded)?;

        let vertex_array = resources.vertex_array.as_mut().ok_or(GraphicsError::NotLoaded)?;
        if vertex_array.needs_rebind(&resources.vertex_buffer) {
            vertex_array.bind(ctx, &resources.vertex_buffer)?;
        }

        let vertex_array = vertex_array.handle().ok_or(GraphicsError::Released)?;
        let program = resources
            .program
            .as_ref()
            .and_then(Program::handle)
            .ok_or(GraphicsError::Released)?;

        let elements = match &resources.index_buffer {
            Some(index_buffer) => Elements::Indexed {
                buffer: index_buffer.handle().ok_or(GraphicsError::Released)?,
                count: index_buffer.len(),
            },
            None => Elements::Arrays {
                count: resources.vertex_buffer.len(),
            },
        };

        let presented = ctx.draw(&DrawCall {
            program,
            vertex_array,
            elements,
            clear_color: self.clear_color,
        })?;

        self.stage = Stage::Rendering;

        Ok(presented)
    }

    /// Releases every resource exactly once. Unloading twice is a no-op.
    pub(crate) fn unload<C: Context>(&mut self, ctx: &mut C) {
        if let Some(mut resources) = self.resources.take() {
            resources.release(ctx);
            log::info!("scene unloaded");
        }

        self.stage = Stage::Unloaded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoxConfig, Demo};
    use crate::gfx::{Call, DummyContext, Handle};

    fn sources() -> ShaderSources {
        ShaderSources::new("@vertex fn vs_main() {}", "@fragment fn fs_main() {}")
    }

    fn scene(demo: Demo) -> Scene {
        let config = BoxConfig {
            count: 12,
            seed: Some("scene".to_string()),
            ..BoxConfig::default()
        };
        Scene::new(Mesh::for_demo(demo, &config), [0.0, 0.0, 0.0, 1.0], Viewport::new(960, 576))
    }

    fn created(ctx: &DummyContext) -> Vec<Handle> {
        ctx.calls()
            .iter()
            .filter_map(|call| match call {
                Call::CreateBuffer(h) | Call::CreateVertexArray(h) | Call::LinkProgram(h) => Some(*h),
                _ => None,
            })
            .collect()
    }

    fn deleted(ctx: &DummyContext) -> Vec<Handle> {
        ctx.calls()
            .iter()
            .filter_map(|call| match call {
                Call::DeleteBuffer(h) | Call::DeleteVertexArray(h) | Call::DeleteProgram(h) => Some(*h),
                _ => None,
            })
            .collect()
    }

    fn draws(ctx: &DummyContext) -> Vec<DrawCall> {
        ctx.calls()
            .iter()
            .filter_map(|call| match call {
                Call::Draw(draw) => Some(*draw),
                _ => None,
            })
            .collect()
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn starts_unloaded() {
        let mut ctx = DummyContext::new();
        let mut scene = scene(Demo::Quad);

        assert_eq!(scene.stage(), Stage::Unloaded);
        assert!(matches!(scene.render(&mut ctx), Err(GraphicsError::NotLoaded)));
        assert_eq!(ctx.frames(), 0);
    }

    #[test]
    fn load_render_unload_walks_every_stage() {
        let mut ctx = DummyContext::new();
        let mut scene = scene(Demo::Quad);

        scene.load(&mut ctx, &sources()).unwrap();
        assert_eq!(scene.stage(), Stage::Loaded);

        for _ in 0..3 {
            scene.render(&mut ctx).unwrap();
            assert_eq!(scene.stage(), Stage::Rendering);
        }
        assert_eq!(ctx.frames(), 3);

        scene.unload(&mut ctx);
        assert_eq!(scene.stage(), Stage::Unloaded);
        assert!(matches!(scene.render(&mut ctx), Err(GraphicsError::NotLoaded)));
    }

    #[test]
    fn unload_releases_every_handle_once_in_reverse_order() {
        let mut ctx = DummyContext::new();
        let mut scene = scene(Demo::Boxes);

        scene.load(&mut ctx, &sources()).unwrap();
        scene.render(&mut ctx).unwrap();
        scene.unload(&mut ctx);

        let mut expected = created(&ctx);
        expected.reverse();
        assert_eq!(expected.len(), 4);
        assert_eq!(deleted(&ctx), expected);
        assert_eq!(ctx.live_resources(), 0);
    }

    #[test]
    fn second_unload_releases_nothing() {
        let mut ctx = DummyContext::new();
        let mut scene = scene(Demo::Quad);

        scene.load(&mut ctx, &sources()).unwrap();
        scene.unload(&mut ctx);
        let after_first = ctx.calls().len();

        scene.unload(&mut ctx);
        assert_eq!(ctx.calls().len(), after_first);
    }

    #[test]
    fn second_load_allocates_nothing() {
        let mut ctx = DummyContext::new();
        let mut scene = scene(Demo::Quad);

        scene.load(&mut ctx, &sources()).unwrap();
        scene.load(&mut ctx, &sources()).unwrap();
        assert_eq!(ctx.created_resources(), 4);

        scene.unload(&mut ctx);
    }

    #[test]
    fn failed_load_rolls_back() {
        // Room for the buffers and vertex array, not the program.
        let mut ctx = DummyContext::new().with_resource_limit(3);
        let mut scene = scene(Demo::Quad);

        assert!(matches!(scene.load(&mut ctx, &sources()), Err(GraphicsError::OutOfMemory)));
        assert_eq!(scene.stage(), Stage::Unloaded);
        assert_eq!(ctx.live_resources(), 0);

        let mut expected = created(&ctx);
        expected.reverse();
        assert_eq!(deleted(&ctx), expected);
    }

    // ── draw calls ────────────────────────────────────────────────────────

    #[test]
    fn indexed_mesh_draws_elements() {
        let mut ctx = DummyContext::new();
        let mut scene = scene(Demo::Boxes);

        scene.load(&mut ctx, &sources()).unwrap();
        scene.render(&mut ctx).unwrap();

        let draw = draws(&ctx)[0];
        assert!(matches!(draw.elements, Elements::Indexed { count: 72, .. }));
        assert_eq!(draw.clear_color, [0.0, 0.0, 0.0, 1.0]);

        scene.unload(&mut ctx);
    }

    #[test]
    fn unindexed_mesh_draws_arrays_without_index_buffer() {
        let mut ctx = DummyContext::new();
        let mut scene = scene(Demo::Triangle);

        scene.load(&mut ctx, &sources()).unwrap();
        scene.render(&mut ctx).unwrap();

        assert_eq!(draws(&ctx)[0].elements, Elements::Arrays { count: 3 });
        assert_eq!(ctx.created_resources(), 3);

        scene.unload(&mut ctx);
    }

    #[test]
    fn link_failure_still_renders() {
        let mut ctx = DummyContext::new().with_link_error("fs_main: unknown identifier");
        let mut scene = scene(Demo::Quad);

        scene.load(&mut ctx, &sources()).unwrap();
        let program = scene.resources.as_ref().and_then(|r| r.program.as_ref()).unwrap();
        assert!(!program.is_linked());

        scene.render(&mut ctx).unwrap();
        assert_eq!(ctx.frames(), 1);

        scene.unload(&mut ctx);
        assert_eq!(ctx.live_resources(), 0);
    }

    // ── resize ────────────────────────────────────────────────────────────

    #[test]
    fn load_applies_initial_viewport() {
        let mut ctx = DummyContext::new();
        let mut scene = scene(Demo::Quad);

        scene.load(&mut ctx, &sources()).unwrap();
        assert_eq!(ctx.viewport(), Viewport::new(960, 576));

        scene.unload(&mut ctx);
    }

    #[test]
    fn resize_sets_viewport_and_keeps_buffers() {
        let mut ctx = DummyContext::new();
        let mut scene = scene(Demo::Boxes);
        scene.load(&mut ctx, &sources()).unwrap();

        let buffers: Vec<Handle> = ctx
            .calls()
            .iter()
            .filter_map(|call| match call {
                Call::CreateBuffer(h) => Some(*h),
                _ => None,
            })
            .collect();
        let before: Vec<Vec<u8>> = buffers
            .iter()
            .map(|&h| ctx.buffer_contents(h).unwrap().to_vec())
            .collect();
        let calls_before = ctx.calls().len();

        scene.resize(&mut ctx, 1280, 720);

        assert_eq!(scene.viewport(), Viewport::new(1280, 720));
        assert_eq!(ctx.viewport(), Viewport::new(1280, 720));
        assert_eq!(&ctx.calls()[calls_before..], &[Call::SetViewport(Viewport::new(1280, 720))]);
        for (h, contents) in buffers.iter().zip(&before) {
            assert_eq!(ctx.buffer_contents(*h).unwrap(), contents.as_slice());
        }

        scene.render(&mut ctx).unwrap();
        scene.unload(&mut ctx);
    }

    #[test]
    fn resize_before_load_is_kept() {
        let mut ctx = DummyContext::new();
        let mut scene = scene(Demo::Quad);

        scene.resize(&mut ctx, 640, 480);
        scene.load(&mut ctx, &sources()).unwrap();
        assert_eq!(ctx.viewport(), Viewport::new(640, 480));

        scene.unload(&mut ctx);
    }

    #[test]
    fn empty_viewport_renders_without_presenting() {
        let mut ctx = DummyContext::new();
        let mut scene = scene(Demo::Quad);
        scene.load(&mut ctx, &sources()).unwrap();

        scene.resize(&mut ctx, 0, 0);
        assert!(!scene.render(&mut ctx).unwrap());
        assert_eq!(ctx.frames(), 0);

        scene.resize(&mut ctx, 640, 480);
        assert!(scene.render(&mut ctx).unwrap());
        assert_eq!(ctx.frames(), 1);

        scene.unload(&mut ctx);
    }

    #[test]
    fn uploaded_vertices_match_mesh() {
        let mut ctx = DummyContext::new();
        let mut scene = scene(Demo::Quad);
        scene.load(&mut ctx, &sources()).unwrap();

        let resources = scene.resources.as_ref().unwrap();
        let vertices = resources
            .vertex_buffer
            .read_back::<ColorVertex, _>(&mut ctx)
            .unwrap()
            .unwrap();
        assert_eq!(vertices, scene.mesh.vertices);

        let indices = resources
            .index_buffer
            .as_ref()
            .unwrap()
            .read_back::<u32, _>(&mut ctx)
            .unwrap()
            .unwrap();
        assert_eq!(indices, scene.mesh.indices);

        scene.unload(&mut ctx);
    }
}
