use std::path::Path;

use super::{Context, GraphicsError, Handle, VertexLayout};

/// WGSL source of the vertex (`vs_main`) and fragment (`fs_main`) stages.
#[derive(Debug, Clone)]
pub(crate) struct ShaderSources {
    pub(crate) vertex: String,
    pub(crate) fragment: String,
}

impl ShaderSources {
    pub(crate) fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    pub(crate) fn load(vertex: &Path, fragment: &Path) -> Result<Self, GraphicsError> {
        fn read(path: &Path) -> Result<String, GraphicsError> {
            std::fs::read_to_string(path).map_err(|source| GraphicsError::ShaderRead {
                path: path.to_path_buf(),
                source,
            })
        }

        let sources = Self::new(read(vertex)?, read(fragment)?);
        log::debug!("loaded shader sources from {:?} and {:?}", vertex, fragment);

        Ok(sources)
    }
}

/// A linked shader program.
///
/// A program whose link step reported diagnostics is still owned and must
/// still be released; it just draws nothing.
#[derive(Debug)]
pub(crate) struct Program {
    handle: Option<Handle>,
    linked: bool,
}

impl Program {
    pub(crate) fn link<C: Context>(
        ctx: &mut C,
        sources: &ShaderSources,
        layout: &VertexLayout,
    ) -> Result<Self, GraphicsError> {
        let linked = ctx.link_program(sources, layout)?;

        let ok = match &linked.info_log {
            Some(info_log) => {
                log::error!("shader program {:?} failed to link:\n{}", linked.handle, info_log);
                false
            }
            None => {
                log::debug!("linked shader program {:?}", linked.handle);
                true
            }
        };

        Ok(Self {
            handle: Some(linked.handle),
            linked: ok,
        })
    }

    pub(crate) fn is_linked(&self) -> bool {
        self.linked
    }

    pub(crate) fn handle(&self) -> Option<Handle> {
        self.handle
    }

    pub(crate) fn release<C: Context>(&mut self, ctx: &mut C) -> bool {
        match self.handle.take() {
            Some(handle) => {
                ctx.delete_program(handle);
                log::debug!("released shader program {:?}", handle);
                true
            }
            None => false,
        }
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        if let Some(handle) = self.handle {
            log::warn!("shader program {:?} dropped without being released", handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::{DummyContext, VertexAttribute};

    const ATTRIBUTES: &[VertexAttribute] = &[VertexAttribute::new("Position", 0, 2, 0)];
    const LAYOUT: VertexLayout = VertexLayout::new(ATTRIBUTES);

    #[test]
    fn link_succeeds_without_info_log() {
        let mut ctx = DummyContext::new();
        let sources = ShaderSources::new("vertex", "fragment");

        let mut program = Program::link(&mut ctx, &sources, &LAYOUT).unwrap();
        assert!(program.is_linked());
        assert!(program.handle().is_some());

        assert!(program.release(&mut ctx));
        assert!(!program.release(&mut ctx));
    }

    #[test]
    fn link_failure_is_not_fatal() {
        let mut ctx = DummyContext::new().with_link_error("error: expected `;`");
        let sources = ShaderSources::new("vertex", "fragment");

        let mut program = Program::link(&mut ctx, &sources, &LAYOUT).unwrap();
        assert!(!program.is_linked());
        assert_eq!(ctx.live_resources(), 1);

        program.release(&mut ctx);
        assert_eq!(ctx.live_resources(), 0);
    }

    #[test]
    fn missing_source_file_reports_path() {
        let missing = Path::new("does/not/exist.wgsl");
        let err = ShaderSources::load(missing, missing).unwrap_err();

        match err {
            GraphicsError::ShaderRead { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_reads_both_stages() {
        let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
        let sources = ShaderSources::load(
            &manifest.join("shaders/vertex.wgsl"),
            &manifest.join("shaders/fragment.wgsl"),
        )
        .unwrap();

        assert!(sources.vertex.contains("fn vs_main"));
        assert!(sources.fragment.contains("fn fs_main"));
    }
}
