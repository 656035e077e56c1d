use std::collections::HashMap;
use std::sync::mpsc;

use winit::window;

use crate::gfx::{
    AttributeBinding, BufferDescriptor, BufferKind, BufferUsage, Context, DrawCall, Elements,
    GraphicsError, Handle, Linked, ShaderSources, VertexLayout, Viewport,
};

struct GpuBuffer {
    buffer: wgpu::Buffer,
    kind: BufferKind,
    size: u64,
}

#[derive(Default)]
struct VertexArrayState {
    source: Option<Handle>,
    bindings: Vec<AttributeBinding>,
}

/// A linked program. `pipeline` is `None` when linking failed.
struct Pipeline {
    pipeline: Option<wgpu::RenderPipeline>,
    bindings: Vec<AttributeBinding>,
}

/// The windowed `wgpu` context.
///
/// Vertex arrays remember which buffer feeds vertex slot 0 and the bindings
/// it was bound with. The attribute layout itself is baked into each
/// program's pipeline, so a draw checks that both agree.
pub(super) struct State {
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    viewport: Viewport,
    next_handle: u32,
    buffers: HashMap<Handle, GpuBuffer>,
    vertex_arrays: HashMap<Handle, VertexArrayState>,
    pipelines: HashMap<Handle, Pipeline>,
}

impl State {
    pub(super) async fn new(window: &window::Window) -> Result<Self, GraphicsError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::Backends::all());

        let surface = unsafe {
            instance.create_surface(window)
        };

        let adapter = instance.request_adapter(
            &wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false
            },
        ).await.ok_or(GraphicsError::NoAdapter)?;

        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter.request_device(
            &wgpu::DeviceDescriptor {
                features: wgpu::Features::empty(),
                limits: {
                    if cfg!(target_arch = "wasm32") {
                        wgpu::Limits::downlevel_webgl2_defaults()
                    } else {
                        wgpu::Limits::default()
                    }
                },
                label: Some("quadkit device")
            },
            None
        ).await.map_err(|e| GraphicsError::Device(e.to_string()))?;

        device.on_uncaptured_error(|e| log::error!("wgpu: {}", e));

        let format = *surface
            .get_supported_formats(&adapter)
            .first()
            .ok_or(GraphicsError::NoSurfaceFormat)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo
        };

        let viewport = Viewport::new(size.width, size.height);
        if !viewport.is_empty() {
            surface.configure(&device, &config);
        }

        Ok(Self {
            surface,
            device,
            queue,
            config,
            viewport,
            next_handle: 0,
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            pipelines: HashMap::new(),
        })
    }

    /// Configures the surface again after it was lost or outdated.
    pub(super) fn reconfigure(&mut self) {
        if !self.viewport.is_empty() {
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn allocate_handle(&mut self) -> Handle {
        self.next_handle += 1;
        Handle::new(self.next_handle)
    }

    fn buffer(&self, handle: Handle) -> Result<&GpuBuffer, GraphicsError> {
        self.buffers.get(&handle).ok_or(GraphicsError::UnknownHandle(handle))
    }
}

/// Copies must be a multiple of `COPY_BUFFER_ALIGNMENT` long.
fn aligned(size: u64) -> u64 {
    let align = wgpu::COPY_BUFFER_ALIGNMENT;
    ((size + align - 1) / align * align).max(align)
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

impl Context for State {
    fn create_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<Handle, GraphicsError> {
        let handle = self.allocate_handle();

        // wgpu has no usage hint; the buffer is created the same way either way
        let usage = match descriptor.kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC;

        let label = format!(
            "{:?} {} buffer {}",
            descriptor.usage,
            match descriptor.kind {
                BufferKind::Vertex => "vertex",
                BufferKind::Index => "index",
            },
            handle.raw()
        );

        let size = aligned(descriptor.size);
        let buffer = self.device.create_buffer(
            &wgpu::BufferDescriptor {
                label: Some(&label),
                size,
                usage,
                mapped_at_creation: false
            }
        );

        if descriptor.usage == BufferUsage::Dynamic {
            log::debug!("created {} ({} bytes)", label, descriptor.size);
        }

        self.buffers.insert(handle, GpuBuffer { buffer, kind: descriptor.kind, size });

        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: Handle, contents: &[u8]) -> Result<(), GraphicsError> {
        let target = self.buffer(buffer)?;

        if contents.is_empty() {
            return Ok(());
        }

        if aligned(contents.len() as u64) > target.size {
            return Err(GraphicsError::BufferTooSmall {
                size: contents.len() as u64,
                capacity: target.size,
            });
        }

        if contents.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT == 0 {
            self.queue.write_buffer(&target.buffer, 0, contents);
        } else {
            let mut padded = contents.to_vec();
            padded.resize(aligned(contents.len() as u64) as usize, 0);
            self.queue.write_buffer(&target.buffer, 0, &padded);
        }

        Ok(())
    }

    fn read_buffer(&mut self, buffer: Handle, size: u64) -> Result<Option<Vec<u8>>, GraphicsError> {
        let source = self.buffer(buffer)?;
        if size > source.size {
            return Err(GraphicsError::Readback(format!("{size} bytes is past the end of {buffer:?}")));
        }

        let copy_size = aligned(size);
        let staging = self.device.create_buffer(
            &wgpu::BufferDescriptor {
                label: Some("readback staging buffer"),
                size: copy_size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false
            }
        );

        let mut encoder = self.device.create_command_encoder(
            &wgpu::CommandEncoderDescriptor {
                label: Some("readback encoder"),
            }
        );
        encoder.copy_buffer_to_buffer(&source.buffer, 0, &staging, 0, copy_size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let (sender, receiver) = mpsc::channel();
        let slice = staging.slice(..);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        receiver
            .recv()
            .map_err(|e| GraphicsError::Readback(e.to_string()))?
            .map_err(|e| GraphicsError::Readback(e.to_string()))?;

        let bytes = slice.get_mapped_range()[..size as usize].to_vec();
        staging.unmap();
        staging.destroy();

        Ok(Some(bytes))
    }

    fn delete_buffer(&mut self, buffer: Handle) {
        match self.buffers.remove(&buffer) {
            Some(target) => target.buffer.destroy(),
            None => log::warn!("deleting unknown buffer {:?}", buffer),
        }
    }

    fn create_vertex_array(&mut self) -> Result<Handle, GraphicsError> {
        let handle = self.allocate_handle();
        self.vertex_arrays.insert(handle, VertexArrayState::default());

        Ok(handle)
    }

    fn bind_vertex_array(
        &mut self,
        vertex_array: Handle,
        buffer: Handle,
        bindings: &[AttributeBinding],
    ) -> Result<(), GraphicsError> {
        if self.buffer(buffer)?.kind != BufferKind::Vertex {
            return Err(GraphicsError::WrongKind {
                expected: BufferKind::Vertex,
                found: BufferKind::Index,
            });
        }

        let target = self
            .vertex_arrays
            .get_mut(&vertex_array)
            .ok_or(GraphicsError::UnknownHandle(vertex_array))?;
        target.source = Some(buffer);
        target.bindings = bindings.to_vec();

        log::trace!("{:?} reads {} attributes from {:?}", vertex_array, bindings.len(), buffer);

        Ok(())
    }

    fn delete_vertex_array(&mut self, vertex_array: Handle) {
        if self.vertex_arrays.remove(&vertex_array).is_none() {
            log::warn!("deleting unknown vertex array {:?}", vertex_array);
        }
    }

    fn link_program(
        &mut self,
        sources: &ShaderSources,
        layout: &VertexLayout,
    ) -> Result<Linked, GraphicsError> {
        let handle = self.allocate_handle();

        let attributes: Vec<wgpu::VertexAttribute> = layout
            .attributes()
            .iter()
            .map(|attribute| wgpu::VertexAttribute {
                format: vertex_format(attribute.components()),
                offset: attribute.offset() as wgpu::BufferAddress,
                shader_location: attribute.index(),
            })
            .collect();

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex_shader = self.device.create_shader_module(
            wgpu::ShaderModuleDescriptor {
                label: Some("vertex shader"),
                source: wgpu::ShaderSource::Wgsl(sources.vertex.as_str().into()),
            }
        );

        let fragment_shader = self.device.create_shader_module(
            wgpu::ShaderModuleDescriptor {
                label: Some("fragment shader"),
                source: wgpu::ShaderSource::Wgsl(sources.fragment.as_str().into()),
            }
        );

        let render_pipeline_layout = self.device.create_pipeline_layout(
            &wgpu::PipelineLayoutDescriptor {
                label: None,
                bind_group_layouts: &[],
                push_constant_ranges: &[]
            }
        );

        let render_pipeline = self.device.create_render_pipeline(
            &wgpu::RenderPipelineDescriptor {
                label: Some("quadkit pipeline"),
                layout: Some(&render_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex_shader,
                    entry_point: "vs_main",
                    buffers: &[
                        wgpu::VertexBufferLayout {
                            array_stride: layout.stride() as wgpu::BufferAddress,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &attributes
                        }
                    ]
                },
                fragment: Some(
                    wgpu::FragmentState {
                        module: &fragment_shader,
                        entry_point: "fs_main",
                        targets: &[
                            Some(
                                wgpu::ColorTargetState {
                                    format: self.config.format,
                                    blend: Some(wgpu::BlendState::REPLACE),
                                    write_mask: wgpu::ColorWrites::ALL
                                }
                            )
                        ],
                    }
                ),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None
            }
        );

        let info_log = pollster::block_on(self.device.pop_error_scope()).map(|e| e.to_string());

        let pipeline = match info_log {
            Some(_) => None,
            None => Some(render_pipeline),
        };
        self.pipelines.insert(handle, Pipeline {
            pipeline,
            bindings: AttributeBinding::for_layout(layout),
        });

        Ok(Linked { handle, info_log })
    }

    fn delete_program(&mut self, program: Handle) {
        if self.pipelines.remove(&program).is_none() {
            log::warn!("deleting unknown program {:?}", program);
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;

        if !viewport.is_empty() {
            self.config.width = viewport.width;
            self.config.height = viewport.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn draw(&mut self, call: &DrawCall) -> Result<bool, GraphicsError> {
        let program = self
            .pipelines
            .get(&call.program)
            .ok_or(GraphicsError::UnknownHandle(call.program))?;

        let vertex_array = self
            .vertex_arrays
            .get(&call.vertex_array)
            .ok_or(GraphicsError::UnknownHandle(call.vertex_array))?;
        let source = vertex_array.source.ok_or(GraphicsError::Unbound(call.vertex_array))?;
        let vertex_buffer = &self.buffer(source)?.buffer;

        if vertex_array.bindings != program.bindings {
            return Err(GraphicsError::LayoutMismatch {
                program: call.program,
                vertex_array: call.vertex_array,
            });
        }

        let index_buffer = match call.elements {
            Elements::Indexed { buffer, count } => {
                let indices = self.buffer(buffer)?;
                let capacity = (indices.size / std::mem::size_of::<u32>() as u64) as u32;
                if count > capacity {
                    return Err(GraphicsError::Overflow { count: count as usize, capacity });
                }

                Some(&indices.buffer)
            }
            Elements::Arrays { .. } => None,
        };

        // Minimized; nothing to present to
        if self.viewport.is_empty() {
            return Ok(false);
        }

        let pipeline = program.pipeline.as_ref();

        let output = self.surface.get_current_texture().map_err(|e| match e {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => GraphicsError::SurfaceLost,
            wgpu::SurfaceError::OutOfMemory => GraphicsError::OutOfMemory,
            wgpu::SurfaceError::Timeout => GraphicsError::Timeout,
        })?;

        let view = output.texture.create_view(
            &wgpu::TextureViewDescriptor::default()
        );

        let mut encoder = self.device.create_command_encoder(
            &wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            }
        );

        let [r, g, b, a] = call.clear_color;

        {
            let mut render_pass = encoder.begin_render_pass(
                &wgpu::RenderPassDescriptor {
                    label: None,
                    color_attachments: &[
                        Some(
                            wgpu::RenderPassColorAttachment {
                                view: &view,
                                resolve_target: None,
                                ops: wgpu::Operations {
                                    load: wgpu::LoadOp::Clear(wgpu::Color {
                                        r: r as f64,
                                        g: g as f64,
                                        b: b as f64,
                                        a: a as f64,
                                    }),
                                    store: true
                                },
                            }
                        )
                    ],
                    depth_stencil_attachment: None
                }
            );

            // A program that failed to link only clears
            if let Some(pipeline) = pipeline {
                render_pass.set_viewport(
                    0.0,
                    0.0,
                    self.viewport.width as f32,
                    self.viewport.height as f32,
                    0.0,
                    1.0
                );
                render_pass.set_pipeline(pipeline);
                render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));

                match (call.elements, index_buffer) {
                    (Elements::Indexed { count, .. }, Some(index_buffer)) => {
                        render_pass.set_index_buffer(
                            index_buffer.slice(..),
                            wgpu::IndexFormat::Uint32
                        );
                        render_pass.draw_indexed(0..count, 0, 0..1);
                    }
                    (Elements::Arrays { count }, _) => render_pass.draw(0..count, 0..1),
                    _ => {}
                }
            }
        }

        self.queue.submit(
            std::iter::once(encoder.finish())
        );

        output.present();

        Ok(true)
    }
}
