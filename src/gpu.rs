//! Presents the tone-mapped accumulation buffer as a full-screen textured quad.

use std::iter::once;
use std::mem::size_of;
use std::sync::{Arc, Mutex};

use bytemuck::bytes_of;
use bytemuck::checked::cast_slice;
use bytemuck_derive::{Pod, Zeroable};
use log::debug;
use nalgebra::{point, Point2, Point3};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use wgpu::{BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResource, BindingType, Buffer, BufferUsages, ColorTargetState, ColorWrites, CommandEncoderDescriptor, DeviceDescriptor, Extent3d, FragmentState, ImageCopyTexture, ImageDataLayout, include_wgsl, InstanceDescriptor, LoadOp, Operations, Origin3d, PipelineLayoutDescriptor, PrimitiveState, PrimitiveTopology, RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor, RequestAdapterOptions, SamplerBindingType, ShaderStages, Surface, SurfaceConfiguration, SurfaceError, TextureAspect, TextureDescriptor, TextureDimension, TextureSampleType, TextureUsages, TextureViewDescriptor, TextureViewDimension, vertex_attr_array, VertexBufferLayout, VertexState, VertexStepMode};
use wgpu::util::{BufferInitDescriptor, DeviceExt};

use radiance::picture::{Picture, RGBA8};

#[derive(Copy, Clone, Pod, Zeroable)]
#[repr(C)]
struct Vertex {
    position: Point3<f32>,
    tex: Point2<f32>,
}

// texture row 0 ends up at the bottom of the window, matching the camera's v axis
const QUAD: [Vertex; 4] = [
    Vertex { position: point![-1.0, 1.0, 0.0], tex: point![0.0, 1.0] },
    Vertex { position: point![-1.0, -1.0, 0.0], tex: point![0.0, 0.0] },
    Vertex { position: point![1.0, 1.0, 0.0], tex: point![1.0, 1.0] },
    Vertex { position: point![1.0, -1.0, 0.0], tex: point![1.0, 0.0] },
];

pub struct Gpu {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl Gpu {
    pub async fn new() -> Self {
        let instance = wgpu::Instance::new(InstanceDescriptor::default());
        let adapter = instance.request_adapter(&RequestAdapterOptions::default())
            .await
            .expect("wgpu adapter");
        let (device, queue) = adapter.request_device(&DeviceDescriptor::default(), None).await
            .expect("wgpu device");

        Gpu { instance, adapter, device, queue }
    }

    pub fn surface<R>(&self, raw: &R) -> Surface
        where R: HasRawWindowHandle + HasRawDisplayHandle {
        unsafe { self.instance.create_surface(raw) }
            .expect("surface")
    }
}

/// CPU-side pixels plus the texture they are uploaded to.
pub struct Frame {
    pixels: Vec<RGBA8>,
    texture: wgpu::Texture,
    sampler: wgpu::Sampler,
    size: (u32, u32),
}

impl Frame {
    fn new(gpu: &Gpu, size: (u32, u32)) -> Self {
        let (width, height) = size;
        let texture = gpu.device.create_texture(&TextureDescriptor {
            label: Some("accumulation"),
            size: Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: RGBA8::TEXTURE_FORMAT,
            usage: TextureUsages::COPY_DST | TextureUsages::TEXTURE_BINDING,
            view_formats: &[RGBA8::TEXTURE_FORMAT.remove_srgb_suffix()],
        });
        let sampler = gpu.device.create_sampler(&Default::default());
        let pixels = vec![RGBA8::BLACK; width as usize * height as usize];
        debug!(target: "app", "Allocating new frame. {}x{} ({} pixels)", width, height, pixels.len());

        Frame { pixels, texture, sampler, size }
    }

    pub fn width(&self) -> u32 {
        self.size.0
    }

    pub fn height(&self) -> u32 {
        self.size.1
    }

    pub fn picture_mut(&mut self) -> Picture<&mut [RGBA8]> {
        Picture::new(self.pixels.as_mut_slice(), self.size)
    }

    fn upload(&self, queue: &wgpu::Queue) {
        queue.write_texture(
            ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                aspect: TextureAspect::All,
                origin: Origin3d::ZERO,
            },
            cast_slice(&self.pixels),
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(size_of::<RGBA8>() as u32 * self.width()),
                rows_per_image: Some(self.height()),
            },
            Extent3d {
                width: self.width(),
                height: self.height(),
                depth_or_array_layers: 1,
            },
        );
    }
}

/// Per-size state: the frame being filled by the worker and the pipeline drawing it.
struct Screen {
    frame: Arc<Mutex<Frame>>,
    pipeline: RenderPipeline,
    bind_group: BindGroup,
}

pub struct Presenter {
    gpu: Gpu,
    surface: Surface,
    vertex_buffer: Buffer,
    screen: Screen,
}

impl Presenter {
    pub fn new(gpu: Gpu, surface: Surface, size: (u32, u32)) -> Self {
        let vertex_buffer = gpu.device.create_buffer_init(&BufferInitDescriptor {
            label: Some("quad"),
            usage: BufferUsages::VERTEX,
            contents: bytes_of(&QUAD),
        });
        let screen = Screen::new(&gpu, &surface, size);

        Presenter { gpu, vertex_buffer, surface, screen }
    }

    /// Reconfigures the surface and allocates a fresh frame. Returns `false`
    /// and keeps the old frame for a zero-sized (minimized) window.
    pub fn resize(&mut self, size: (u32, u32)) -> bool {
        if size.0 == 0 || size.1 == 0 {
            return false;
        }
        self.screen = Screen::new(&self.gpu, &self.surface, size);
        true
    }

    pub fn frame(&self) -> Arc<Mutex<Frame>> {
        self.screen.frame.clone()
    }

    pub fn present(&self) {
        let target = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(SurfaceError::Timeout) => return,
            Err(err) => panic!("current surface texture: {}", err),
        };
        let target_view = target.texture.create_view(&TextureViewDescriptor::default());

        self.screen.frame.lock().expect("frame upload").upload(&self.gpu.queue);

        let mut encoder = self.gpu.device.create_command_encoder(&CommandEncoderDescriptor::default());
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: None,
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &target_view,
                    ops: Operations {
                        load: LoadOp::Clear(wgpu::Color::BLACK),
                        store: true,
                    },
                    resolve_target: None,
                })],
                depth_stencil_attachment: None,
            });
            pass.set_pipeline(&self.screen.pipeline);
            pass.set_bind_group(0, &self.screen.bind_group, &[]);
            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            pass.draw(0..QUAD.len() as u32, 0..1);
        }

        self.gpu.queue.submit(once(encoder.finish()));
        target.present();
    }
}

fn frame_layout(gpu: &Gpu) -> BindGroupLayout {
    gpu.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("frame"),
        entries: &[
            BindGroupLayoutEntry {
                count: None,
                binding: 0,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    multisampled: false,
                    sample_type: TextureSampleType::Float { filterable: false },
                    view_dimension: TextureViewDimension::D2,
                },
            },
            BindGroupLayoutEntry {
                count: None,
                binding: 1,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Sampler(SamplerBindingType::NonFiltering),
            },
        ],
    })
}

fn quad_pipeline(gpu: &Gpu, layout: &BindGroupLayout, surface_config: &SurfaceConfiguration) -> RenderPipeline {
    let module = gpu.device.create_shader_module(include_wgsl!("shader.wgsl"));
    let pipeline_layout = gpu.device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: None,
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    gpu.device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("quad"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &module,
            entry_point: "vertex_main",
            buffers: &[
                VertexBufferLayout {
                    array_stride: size_of::<Vertex>() as _,
                    attributes: &vertex_attr_array![0 => Float32x3, 1 => Float32x2],
                    step_mode: VertexStepMode::Vertex,
                },
            ],
        },
        primitive: PrimitiveState {
            topology: PrimitiveTopology::TriangleStrip,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: Default::default(),
        fragment: Some(FragmentState {
            module: &module,
            entry_point: "fragment_main",
            targets: &[Some(ColorTargetState {
                format: surface_config.format,
                blend: None,
                write_mask: ColorWrites::COLOR,
            })],
        }),
        multiview: None,
    })
}

impl Screen {
    fn new(gpu: &Gpu, surface: &Surface, size: (u32, u32)) -> Self {
        let (width, height) = size;
        let mut surface_config = surface.get_default_config(&gpu.adapter, width, height)
            .expect("default surface config");
        // pixels are already gamma-encoded
        surface_config.format = surface_config.format.remove_srgb_suffix();
        surface.configure(&gpu.device, &surface_config);
        debug!(target: "app", "Surface: {:?}", surface_config);

        let frame = Frame::new(gpu, size);
        let layout = frame_layout(gpu);
        let pipeline = quad_pipeline(gpu, &layout, &surface_config);

        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let bind_group = gpu.device.create_bind_group(&BindGroupDescriptor {
            label: Some("frame"),
            layout: &layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&frame.sampler),
                },
            ],
        });

        Screen {
            frame: Arc::new(Mutex::new(frame)),
            pipeline,
            bind_group,
        }
    }
}
