//! wgpu Execution Context
//!
//! Executes frozen command batches on a real device, headless. Programs are
//! registered up front as WGSL source; per-frame execution never errors,
//! a command that cannot run logs and is skipped.
//!
//! # Program contracts
//!
//! Sphere-trace kernels bind two groups:
//!
//! | Group | Binding | Resource |
//! |-------|---------|----------|
//! | 0 | 0..=3 | write-only storage textures, in the order the frame binds them |
//! | 1 | 0 | uniform block, see [`KernelUniforms`] layout |
//! | 1 | 1 | read-only storage buffer of primitive records |
//!
//! Effects are full-screen triangles (`vs_main`/`fs_main`, three vertices,
//! no vertex buffers) with:
//!
//! | Group | Binding | Resource |
//! |-------|---------|----------|
//! | 0 | 0 | uniform block, see [`GlobalUniforms`] layout |
//! | 0 | 1 | non-filtering sampler |
//! | 1 | 0.. | the blit source (when present), then declared inputs |
//!
//! Depth-format sources and inputs bind as `texture_depth_2d`, everything
//! else as non-filterable `texture_2d<f32>`. An effect registered with
//! `writes_depth` renders with a depth attachment and must write
//! `@builtin(frag_depth)`.

use std::borrow::Cow;

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use log::{debug, error, trace};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::{PipelineError, Result};
use crate::gpu::command::{ClearFlags, CommandBuffer, GpuCommand, KernelRef, TargetDesc, TargetRef};
use crate::gpu::context::{CullingResults, DrawSettings, RenderContext};
use crate::gpu::prop::PropId;
use crate::pipeline::frame::{ALBEDO_FORMAT, LINEAR_DEPTH_FORMAT, MASK_FORMAT, NORMAL_FORMAT};
use crate::pipeline::lights::MAX_VISIBLE_LIGHTS;
use crate::pipeline::passes;
use crate::scene::camera::{CullingParams, RenderCamera};
use crate::settings::PipelineSettings;

// ─── Uniform Blocks ───────────────────────────────────────────────────────────

/// Uniform block handed to every sphere-trace dispatch. Field order is the
/// WGSL struct layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct KernelUniforms {
    pub camera_to_world: [[f32; 4]; 4],
    pub camera_inverse_projection: [[f32; 4]; 4],
    pub world_to_camera: [[f32; 4]; 4],
    pub camera_view_direction: [f32; 4],
    pub light_dir: [f32; 4],
    pub light_pos: [f32; 4],
    pub shadow_params: [f32; 4],
    pub epsilon: f32,
    pub primitive_count: i32,
    pub _pad: [f32; 2],
}

const _: () = assert!(std::mem::size_of::<KernelUniforms>() == 272);

impl Default for KernelUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Uniform block every effect can read. Mirrors the global state the
/// pipeline sets through `SetGlobal*` commands.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GlobalUniforms {
    pub light_colors: [[f32; 4]; MAX_VISIBLE_LIGHTS],
    pub light_directions_or_positions: [[f32; 4]; MAX_VISIBLE_LIGHTS],
    pub fog_color: [f32; 4],
    pub fog_density: f32,
    pub _pad: [f32; 3],
}

const _: () = assert!(std::mem::size_of::<GlobalUniforms>() == 160);

impl Default for GlobalUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}

// ─── Program Registration ─────────────────────────────────────────────────────

/// A compute program to register. Kernel indices are positions in
/// `entry_points`.
#[derive(Debug, Clone)]
pub struct KernelDesc {
    pub name: String,
    pub shader: String,
    pub entry_points: Vec<String>,
}

/// A full-screen effect to register.
///
/// `inputs` are frame-target names sampled at group 1, bound after the blit
/// source when one is present. `writes_depth` selects a depth attachment
/// for the effect's output.
#[derive(Debug, Clone)]
pub struct EffectDesc {
    pub name: String,
    pub shader: String,
    pub inputs: Vec<String>,
    pub writes_depth: bool,
}

struct KernelProgram {
    pipelines: Vec<wgpu::ComputePipeline>,
    texture_layout: wgpu::BindGroupLayout,
    data_layout: wgpu::BindGroupLayout,
}

struct EffectProgram {
    module: wgpu::ShaderModule,
    inputs: Vec<PropId>,
    writes_depth: bool,
}

/// Pass-through blit used when a `Blit` carries no effect.
const COPY_SHADER: &str = r"
struct VsOut {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@group(0) @binding(1) var point_sampler: sampler;
@group(1) @binding(0) var source: texture_2d<f32>;

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VsOut {
    var out: VsOut;
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(uv.x, 1.0 - uv.y);
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return textureSample(source, point_sampler, in.uv);
}
";

// ─── Blit Pipelines ───────────────────────────────────────────────────────────

/// One render pipeline per distinct effect/attachment/input-shape combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BlitKey {
    effect: Option<PropId>,
    dest_format: wgpu::TextureFormat,
    /// `is_depth` per group-1 texture, source first.
    input_kinds: SmallVec<[bool; 4]>,
}

struct BlitPipeline {
    pipeline: wgpu::RenderPipeline,
    input_layout: wgpu::BindGroupLayout,
}

// ─── Target Pool ──────────────────────────────────────────────────────────────

/// The view keeps the underlying texture alive.
struct PooledTarget {
    view: wgpu::TextureView,
    desc: TargetDesc,
}

impl PooledTarget {
    fn new(device: &wgpu::Device, id: PropId, desc: TargetDesc) -> Self {
        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST;
        if desc.storage {
            usage |= wgpu::TextureUsages::STORAGE_BINDING;
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(id.name()),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { view, desc }
    }
}

/// Named live targets plus a free list for reuse across frames. Released
/// textures are kept, not destroyed; an allocation with a matching
/// descriptor picks one up instead of creating a new texture.
#[derive(Default)]
struct TargetPool {
    live: FxHashMap<PropId, PooledTarget>,
    free: FxHashMap<TargetDesc, Vec<PooledTarget>>,
}

impl TargetPool {
    fn allocate(&mut self, device: &wgpu::Device, id: PropId, desc: TargetDesc) {
        if self.live.contains_key(&id) {
            debug!("target {id} allocated while live, replacing");
            self.release(id);
        }
        let target = self
            .free
            .get_mut(&desc)
            .and_then(Vec::pop)
            .unwrap_or_else(|| PooledTarget::new(device, id, desc));
        self.live.insert(id, target);
    }

    fn release(&mut self, id: PropId) {
        if let Some(target) = self.live.remove(&id) {
            self.free.entry(target.desc).or_default().push(target);
        } else {
            debug!("release of unknown target {id} ignored");
        }
    }

    fn get(&self, id: PropId) -> Option<&PooledTarget> {
        self.live.get(&id)
    }
}

// ─── Camera Surface ───────────────────────────────────────────────────────────

/// The headless stand-in for the camera's output surface: a color target,
/// a depth target and a scratch depth used when a blit samples the depth
/// it is about to overwrite.
struct CameraSurface {
    color_view: wgpu::TextureView,
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
    scratch_depth: wgpu::Texture,
    scratch_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl CameraSurface {
    const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
    const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let make = |label, format, usage| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        };
        let color = make(
            "Camera Color",
            Self::COLOR_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
        );
        let depth = make(
            "Camera Depth",
            Self::DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
        );
        let scratch_depth = make(
            "Camera Depth Scratch",
            Self::DEPTH_FORMAT,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        Self {
            color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            scratch_view: scratch_depth.create_view(&wgpu::TextureViewDescriptor::default()),
            depth,
            scratch_depth,
            width,
            height,
        }
    }
}

// ─── Raster Backend ───────────────────────────────────────────────────────────

/// Everything a backend needs to encode its own passes into the frame.
pub struct RasterTargets<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub camera: &'a RenderCamera,
    pub colors: SmallVec<[&'a wgpu::TextureView; 2]>,
    pub color_formats: SmallVec<[wgpu::TextureFormat; 2]>,
    pub depth: Option<&'a wgpu::TextureView>,
    pub depth_format: Option<wgpu::TextureFormat>,
}

/// The host's mesh rasterizer. The executor owns target binding and batch
/// execution; scene geometry, scene culling and the skybox belong to the
/// host and arrive through this seam.
pub trait RasterBackend {
    /// Scene visibility for a camera. The default backend sees no scene
    /// and reports nothing visible.
    fn cull(&mut self, _params: &CullingParams) -> CullingResults {
        CullingResults::default()
    }

    /// Draws visible geometry matching `settings` into the bound targets.
    fn draw_renderers(
        &mut self,
        targets: &mut RasterTargets<'_>,
        culling: &CullingResults,
        settings: &DrawSettings,
    );

    /// Draws the skybox into the bound targets.
    fn draw_skybox(&mut self, targets: &mut RasterTargets<'_>, camera: &RenderCamera);
}

/// Backend with no scene. Raster draws become no-ops, which leaves the
/// SDF side of the pipeline fully functional.
#[derive(Debug, Default)]
pub struct NullRaster;

impl RasterBackend for NullRaster {
    fn draw_renderers(
        &mut self,
        _targets: &mut RasterTargets<'_>,
        _culling: &CullingResults,
        settings: &DrawSettings,
    ) {
        trace!("null raster: skipped {} draw", settings.pass_tag);
    }

    fn draw_skybox(&mut self, _targets: &mut RasterTargets<'_>, _camera: &RenderCamera) {
        trace!("null raster: skipped skybox");
    }
}

// ─── Frame State ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
struct BoundTargets {
    colors: SmallVec<[TargetRef; 2]>,
    depth: Option<TargetRef>,
}

/// Staged kernel parameters, applied at dispatch.
#[derive(Default)]
struct KernelStage {
    uniforms: KernelUniforms,
    /// `(param, target)` in bind order.
    textures: SmallVec<[(PropId, PropId); 4]>,
    primitives: Option<Box<[u8]>>,
}

/// Well-known parameter names, interned once.
struct WellKnownParams {
    camera_to_world: PropId,
    camera_inverse_projection: PropId,
    world_to_camera: PropId,
    camera_view_direction: PropId,
    light_dir: PropId,
    light_pos: PropId,
    shadow_params: PropId,
    epsilon: PropId,
    primitive_count: PropId,
    light_colors: PropId,
    light_directions_or_positions: PropId,
    fog_density: PropId,
    fog_color: PropId,
}

impl WellKnownParams {
    fn intern() -> Self {
        Self {
            camera_to_world: PropId::named(passes::PARAM_CAMERA_TO_WORLD),
            camera_inverse_projection: PropId::named(passes::PARAM_CAMERA_INVERSE_PROJECTION),
            world_to_camera: PropId::named(passes::PARAM_WORLD_TO_CAMERA),
            camera_view_direction: PropId::named(passes::PARAM_CAMERA_VIEW_DIRECTION),
            light_dir: PropId::named(passes::PARAM_LIGHT_DIR),
            light_pos: PropId::named(passes::PARAM_LIGHT_POS),
            shadow_params: PropId::named(passes::PARAM_SHADOW_PARAMS),
            epsilon: PropId::named(passes::PARAM_EPSILON),
            primitive_count: PropId::named(passes::PARAM_PRIMITIVE_COUNT),
            light_colors: PropId::named(passes::GLOBAL_LIGHT_COLORS),
            light_directions_or_positions: PropId::named(
                passes::GLOBAL_LIGHT_DIRECTIONS_OR_POSITIONS,
            ),
            fog_density: PropId::named(passes::GLOBAL_FOG_DENSITY),
            fog_color: PropId::named(passes::GLOBAL_FOG_COLOR),
        }
    }
}

struct ResolvedBound<'a> {
    colors: SmallVec<[(&'a wgpu::TextureView, wgpu::TextureFormat); 2]>,
    depth: Option<(&'a wgpu::TextureView, wgpu::TextureFormat)>,
}

fn resolve_target<'a>(
    pool: &'a TargetPool,
    surface: Option<&'a CameraSurface>,
    target: TargetRef,
    want_depth: bool,
) -> Option<(&'a wgpu::TextureView, wgpu::TextureFormat)> {
    match target {
        TargetRef::Named(id) => {
            let pooled = pool.get(id)?;
            Some((&pooled.view, pooled.desc.format))
        }
        TargetRef::CameraTarget => {
            let surface = surface?;
            if want_depth {
                Some((&surface.depth_view, CameraSurface::DEPTH_FORMAT))
            } else {
                Some((&surface.color_view, CameraSurface::COLOR_FORMAT))
            }
        }
    }
}

fn resolve_bound<'a>(
    pool: &'a TargetPool,
    surface: Option<&'a CameraSurface>,
    bound: &BoundTargets,
) -> Option<ResolvedBound<'a>> {
    let mut colors = SmallVec::new();
    for target in &bound.colors {
        colors.push(resolve_target(pool, surface, *target, false)?);
    }
    let depth = match bound.depth {
        Some(target) => Some(resolve_target(pool, surface, target, true)?),
        None => None,
    };
    Some(ResolvedBound { colors, depth })
}

// ─── Executor ─────────────────────────────────────────────────────────────────

/// A [`RenderContext`] backed by a wgpu device.
pub struct WgpuExecutor {
    device: wgpu::Device,
    queue: wgpu::Queue,
    raster: Box<dyn RasterBackend>,
    params: WellKnownParams,
    kernels: FxHashMap<PropId, KernelProgram>,
    effects: FxHashMap<PropId, EffectProgram>,
    blit_pipelines: FxHashMap<BlitKey, BlitPipeline>,
    copy_module: wgpu::ShaderModule,
    globals_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    pool: TargetPool,
    surface: Option<CameraSurface>,
    current_camera: Option<RenderCamera>,
    bound: BoundTargets,
    globals: GlobalUniforms,
    kernel_stages: FxHashMap<PropId, KernelStage>,
    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuExecutor {
    /// Requests a headless device and wires in the given raster backend.
    ///
    /// # Errors
    ///
    /// Returns an error when no adapter is available or device creation
    /// fails.
    pub fn new(raster: Box<dyn RasterBackend>) -> Result<Self> {
        pollster::block_on(Self::request(raster))
    }

    /// A device-backed executor with no scene rasterizer.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`new`](Self::new).
    pub fn headless() -> Result<Self> {
        Self::new(Box::new(NullRaster))
    }

    async fn request(raster: Box<dyn RasterBackend>) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| PipelineError::AdapterRequestFailed(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        Ok(Self::with_device(device, queue, raster))
    }

    /// Wraps a device and queue the host already owns.
    #[must_use]
    pub fn with_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        raster: Box<dyn RasterBackend>,
    ) -> Self {
        let copy_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blit Copy Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(COPY_SHADER)),
        });

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Effect Globals Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Point Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            device,
            queue,
            raster,
            params: WellKnownParams::intern(),
            kernels: FxHashMap::default(),
            effects: FxHashMap::default(),
            blit_pipelines: FxHashMap::default(),
            copy_module,
            globals_layout,
            sampler,
            pool: TargetPool::default(),
            surface: None,
            current_camera: None,
            bound: BoundTargets::default(),
            globals: GlobalUniforms::default(),
            kernel_stages: FxHashMap::default(),
            encoder: None,
        }
    }

    /// Compiles and registers a sphere-trace program.
    pub fn register_kernel(&mut self, desc: &KernelDesc) -> PropId {
        let id = PropId::named(&desc.name);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&desc.name),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(&desc.shader)),
        });

        let storage_texture = |binding, format| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        };
        let texture_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Kernel Targets Layout"),
                    entries: &[
                        storage_texture(0, ALBEDO_FORMAT),
                        storage_texture(1, NORMAL_FORMAT),
                        storage_texture(2, MASK_FORMAT),
                        storage_texture(3, LINEAR_DEPTH_FORMAT),
                    ],
                });

        let data_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Kernel Data Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&desc.name),
                bind_group_layouts: &[Some(&texture_layout), Some(&data_layout)],
                immediate_size: 0,
            });

        let pipelines = desc
            .entry_points
            .iter()
            .map(|entry| {
                self.device
                    .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                        label: Some(entry),
                        layout: Some(&layout),
                        module: &module,
                        entry_point: Some(entry),
                        compilation_options: Default::default(),
                        cache: None,
                    })
            })
            .collect();

        self.kernels.insert(
            id,
            KernelProgram {
                pipelines,
                texture_layout,
                data_layout,
            },
        );
        id
    }

    /// Compiles and registers a full-screen effect.
    pub fn register_effect(&mut self, desc: &EffectDesc) -> PropId {
        let id = PropId::named(&desc.name);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&desc.name),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(&desc.shader)),
        });
        self.effects.insert(
            id,
            EffectProgram {
                module,
                inputs: desc.inputs.iter().map(|name| PropId::named(name)).collect(),
                writes_depth: desc.writes_depth,
            },
        );
        id
    }

    /// Checks that every program `settings` refers to has been registered.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ProgramNotRegistered`] naming the first
    /// missing program.
    pub fn ensure_registered(&self, settings: &PipelineSettings) -> Result<()> {
        let effects = [
            &settings.effects.copy_depth,
            &settings.effects.copy_ray_depth,
            &settings.effects.deferred,
            &settings.effects.fog,
        ];
        for name in effects {
            let known = PropId::lookup(name).is_some_and(|id| self.effects.contains_key(&id));
            if !known {
                return Err(PipelineError::ProgramNotRegistered {
                    kind: "effect",
                    name: name.clone(),
                });
            }
        }
        if let Some(name) = &settings.sphere_trace_program {
            let known = PropId::lookup(name).is_some_and(|id| self.kernels.contains_key(&id));
            if !known {
                return Err(PipelineError::ProgramNotRegistered {
                    kind: "kernel",
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }

    fn ensure_encoder(&mut self) {
        if self.encoder.is_none() {
            self.encoder = Some(
                self.device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("Frame Encoder"),
                    }),
            );
        }
    }

    fn run_command(&mut self, command: &GpuCommand) {
        match command {
            GpuCommand::AllocateTarget { id, desc } => {
                self.pool.allocate(&self.device, *id, *desc);
            }
            GpuCommand::ReleaseTarget { id } => self.pool.release(*id),
            GpuCommand::SetRenderTarget { colors, depth } => {
                self.bound = BoundTargets {
                    colors: colors.clone(),
                    depth: *depth,
                };
            }
            GpuCommand::Clear { flags, color } => self.run_clear(*flags, *color),
            GpuCommand::Blit {
                source,
                dest,
                effect,
            } => self.run_blit(*source, *dest, *effect),
            GpuCommand::SetComputeTexture {
                kernel,
                param,
                target,
            } => {
                let stage = self.kernel_stages.entry(kernel.program).or_default();
                if let Some(slot) = stage.textures.iter_mut().find(|(p, _)| p == param) {
                    slot.1 = *target;
                } else {
                    stage.textures.push((*param, *target));
                }
            }
            GpuCommand::SetComputeBuffer { kernel, data, .. } => {
                let stage = self.kernel_stages.entry(kernel.program).or_default();
                stage.primitives = Some(data.clone());
            }
            GpuCommand::SetComputeMatrix {
                program,
                param,
                value,
            } => {
                let cols = value.to_cols_array_2d();
                let stage = self.kernel_stages.entry(*program).or_default();
                if *param == self.params.camera_to_world {
                    stage.uniforms.camera_to_world = cols;
                } else if *param == self.params.camera_inverse_projection {
                    stage.uniforms.camera_inverse_projection = cols;
                } else if *param == self.params.world_to_camera {
                    stage.uniforms.world_to_camera = cols;
                } else {
                    debug!("unknown kernel matrix {param} ignored");
                }
            }
            GpuCommand::SetComputeVector {
                program,
                param,
                value,
            } => {
                let stage = self.kernel_stages.entry(*program).or_default();
                if *param == self.params.camera_view_direction {
                    stage.uniforms.camera_view_direction = value.to_array();
                } else if *param == self.params.light_dir {
                    stage.uniforms.light_dir = value.to_array();
                } else if *param == self.params.light_pos {
                    stage.uniforms.light_pos = value.to_array();
                } else if *param == self.params.shadow_params {
                    stage.uniforms.shadow_params = value.to_array();
                } else {
                    debug!("unknown kernel vector {param} ignored");
                }
            }
            GpuCommand::SetComputeFloat {
                program,
                param,
                value,
            } => {
                if *param == self.params.epsilon {
                    self.kernel_stages
                        .entry(*program)
                        .or_default()
                        .uniforms
                        .epsilon = *value;
                } else {
                    debug!("unknown kernel float {param} ignored");
                }
            }
            GpuCommand::SetComputeInt {
                program,
                param,
                value,
            } => {
                if *param == self.params.primitive_count {
                    self.kernel_stages
                        .entry(*program)
                        .or_default()
                        .uniforms
                        .primitive_count = *value;
                } else {
                    debug!("unknown kernel int {param} ignored");
                }
            }
            GpuCommand::DispatchCompute { kernel, groups } => self.run_dispatch(*kernel, *groups),
            GpuCommand::SetGlobalVectorArray { param, values } => {
                let slots = if *param == self.params.light_colors {
                    &mut self.globals.light_colors
                } else if *param == self.params.light_directions_or_positions {
                    &mut self.globals.light_directions_or_positions
                } else {
                    debug!("unknown global array {param} ignored");
                    return;
                };
                for (slot, value) in slots.iter_mut().zip(values.iter()) {
                    *slot = value.to_array();
                }
            }
            GpuCommand::SetGlobalFloat { param, value } => {
                if *param == self.params.fog_density {
                    self.globals.fog_density = *value;
                } else {
                    debug!("unknown global float {param} ignored");
                }
            }
            GpuCommand::SetGlobalColor { param, value } => {
                if *param == self.params.fog_color {
                    self.globals.fog_color = value.to_array();
                } else {
                    debug!("unknown global color {param} ignored");
                }
            }
        }
    }

    fn run_clear(&mut self, flags: ClearFlags, color: Vec4) {
        self.ensure_encoder();
        let Some(resolved) = resolve_bound(&self.pool, self.surface.as_ref(), &self.bound) else {
            error!("clear with unresolved targets skipped");
            return;
        };
        if resolved.colors.is_empty() && resolved.depth.is_none() {
            debug!("clear with no bound targets skipped");
            return;
        }
        let Some(encoder) = self.encoder.as_mut() else {
            return;
        };

        let color_load = if flags.contains(ClearFlags::COLOR) {
            wgpu::LoadOp::Clear(wgpu::Color {
                r: f64::from(color.x),
                g: f64::from(color.y),
                b: f64::from(color.z),
                a: f64::from(color.w),
            })
        } else {
            wgpu::LoadOp::Load
        };
        let attachments: Vec<_> = resolved
            .colors
            .iter()
            .map(|(view, _)| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();
        let depth_attachment =
            resolved
                .depth
                .map(|(view, _)| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: if flags.contains(ClearFlags::DEPTH) {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                });

        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear"),
            color_attachments: &attachments,
            depth_stencil_attachment: depth_attachment,
            ..Default::default()
        });
    }

    fn run_dispatch(&mut self, kernel: KernelRef, groups: [u32; 3]) {
        self.ensure_encoder();
        let Some(program) = self.kernels.get(&kernel.program) else {
            error!("dispatch of unregistered kernel {} skipped", kernel.program);
            return;
        };
        let Some(pipeline) = program.pipelines.get(kernel.index as usize) else {
            error!(
                "kernel {} has no entry point {}, dispatch skipped",
                kernel.program, kernel.index
            );
            return;
        };
        let Some(stage) = self.kernel_stages.get(&kernel.program) else {
            error!("dispatch of {} with no staged state skipped", kernel.program);
            return;
        };
        let Some(primitives) = stage.primitives.as_deref().filter(|data| !data.is_empty())
        else {
            debug!("dispatch of {} without primitives skipped", kernel.program);
            return;
        };

        let mut views = SmallVec::<[&wgpu::TextureView; 4]>::new();
        for (param, target) in &stage.textures {
            let Some(pooled) = self.pool.get(*target) else {
                error!("kernel texture {param} bound to dead target {target}, dispatch skipped");
                return;
            };
            views.push(&pooled.view);
        }
        if views.len() != 4 {
            error!(
                "kernel {} has {} bound targets, expected 4, dispatch skipped",
                kernel.program,
                views.len()
            );
            return;
        }

        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Kernel Uniforms"),
            size: std::mem::size_of::<KernelUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue
            .write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&stage.uniforms));

        let primitive_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Primitive Records"),
            size: primitives.len() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue.write_buffer(&primitive_buffer, 0, primitives);

        let texture_entries: Vec<_> = views
            .iter()
            .enumerate()
            .map(|(i, view)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        let texture_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Kernel Targets"),
            layout: &program.texture_layout,
            entries: &texture_entries,
        });
        let data_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Kernel Data"),
            layout: &program.data_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: primitive_buffer.as_entire_binding(),
                },
            ],
        });

        let Some(encoder) = self.encoder.as_mut() else {
            return;
        };
        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Sphere Trace"),
            timestamp_writes: None,
        });
        cpass.set_pipeline(pipeline);
        cpass.set_bind_group(0, &texture_group, &[]);
        cpass.set_bind_group(1, &data_group, &[]);
        cpass.dispatch_workgroups(groups[0], groups[1], groups[2]);
    }

    fn run_blit(&mut self, source: Option<TargetRef>, dest: TargetRef, effect: Option<PropId>) {
        self.ensure_encoder();

        let program = match effect {
            Some(id) => match self.effects.get(&id) {
                Some(program) => Some(program),
                None => {
                    error!("blit with unregistered effect {id} skipped");
                    return;
                }
            },
            None => None,
        };
        let writes_depth = program.is_some_and(|p| p.writes_depth);

        let Some((dest_view, dest_format)) =
            resolve_target(&self.pool, self.surface.as_ref(), dest, writes_depth)
        else {
            error!("blit into unresolved target skipped");
            return;
        };
        let dest_is_depth = dest_format.is_depth_stencil_format();

        // A depth copy onto the camera target samples the depth it
        // overwrites; route the read through the scratch copy.
        let mut source_resolved: Option<(&wgpu::TextureView, bool)> = None;
        if let Some(source) = source {
            if source == TargetRef::CameraTarget && dest == TargetRef::CameraTarget && dest_is_depth
            {
                let Some(surface) = self.surface.as_ref() else {
                    error!("camera-target blit before any camera, skipped");
                    return;
                };
                if let Some(encoder) = self.encoder.as_mut() {
                    encoder.copy_texture_to_texture(
                        surface.depth.as_image_copy(),
                        surface.scratch_depth.as_image_copy(),
                        wgpu::Extent3d {
                            width: surface.width,
                            height: surface.height,
                            depth_or_array_layers: 1,
                        },
                    );
                }
                source_resolved = Some((&surface.scratch_view, true));
            } else {
                let Some((view, format)) =
                    resolve_target(&self.pool, self.surface.as_ref(), source, writes_depth)
                else {
                    error!("blit from unresolved source skipped");
                    return;
                };
                source_resolved = Some((view, format.is_depth_stencil_format()));
            }
        }

        // Source first, then the effect's declared inputs.
        let mut input_views: SmallVec<[&wgpu::TextureView; 4]> = SmallVec::new();
        let mut input_kinds: SmallVec<[bool; 4]> = SmallVec::new();
        if let Some((view, is_depth)) = source_resolved {
            input_views.push(view);
            input_kinds.push(is_depth);
        }
        if let Some(program) = program {
            for input in &program.inputs {
                let Some(pooled) = self.pool.get(*input) else {
                    error!("effect input {input} is not live, blit skipped");
                    return;
                };
                input_views.push(&pooled.view);
                input_kinds.push(pooled.desc.format.is_depth_stencil_format());
            }
        }

        let key = BlitKey {
            effect,
            dest_format,
            input_kinds: input_kinds.clone(),
        };
        if !self.blit_pipelines.contains_key(&key) {
            let module = program.map_or(&self.copy_module, |p| &p.module);
            let built = build_blit_pipeline(&self.device, &self.globals_layout, module, &key);
            self.blit_pipelines.insert(key.clone(), built);
        }
        let blit = &self.blit_pipelines[&key];

        let globals_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Effect Globals"),
            size: std::mem::size_of::<GlobalUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue
            .write_buffer(&globals_buffer, 0, bytemuck::bytes_of(&self.globals));

        let globals_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Effect Globals"),
            layout: &self.globals_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: globals_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        let input_entries: Vec<_> = input_views
            .iter()
            .enumerate()
            .map(|(i, view)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        let input_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Effect Inputs"),
            layout: &blit.input_layout,
            entries: &input_entries,
        });

        let Some(encoder) = self.encoder.as_mut() else {
            return;
        };
        let color_attachments = [if dest_is_depth {
            None
        } else {
            Some(wgpu::RenderPassColorAttachment {
                view: dest_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })
        }];
        let depth_attachment = dest_is_depth.then(|| wgpu::RenderPassDepthStencilAttachment {
            view: dest_view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Load,
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        });
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Blit"),
            color_attachments: if dest_is_depth { &[] } else { &color_attachments },
            depth_stencil_attachment: depth_attachment,
            ..Default::default()
        });
        pass.set_pipeline(&blit.pipeline);
        pass.set_bind_group(0, &globals_group, &[]);
        pass.set_bind_group(1, &input_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

/// Builds the bind group layout and render pipeline for one blit shape.
fn build_blit_pipeline(
    device: &wgpu::Device,
    globals_layout: &wgpu::BindGroupLayout,
    module: &wgpu::ShaderModule,
    key: &BlitKey,
) -> BlitPipeline {
    let entries: Vec<_> = key
        .input_kinds
        .iter()
        .enumerate()
        .map(|(i, is_depth)| wgpu::BindGroupLayoutEntry {
            binding: i as u32,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: if *is_depth {
                    wgpu::TextureSampleType::Depth
                } else {
                    wgpu::TextureSampleType::Float { filterable: false }
                },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        })
        .collect();
    let input_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Effect Inputs Layout"),
        entries: &entries,
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Blit Pipeline Layout"),
        bind_group_layouts: &[Some(globals_layout), Some(&input_layout)],
        immediate_size: 0,
    });

    let dest_is_depth = key.dest_format.is_depth_stencil_format();
    let color_targets = [Some(wgpu::ColorTargetState {
        format: key.dest_format,
        blend: Some(wgpu::BlendState::REPLACE),
        write_mask: wgpu::ColorWrites::ALL,
    })];
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Blit Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            targets: if dest_is_depth { &[] } else { &color_targets },
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: dest_is_depth.then(|| wgpu::DepthStencilState {
            format: key.dest_format,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::Always),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    });

    BlitPipeline {
        pipeline,
        input_layout,
    }
}

impl RenderContext for WgpuExecutor {
    fn cull(&mut self, params: &CullingParams) -> CullingResults {
        self.raster.cull(params)
    }

    fn setup_camera(&mut self, camera: &RenderCamera) {
        let stale = self
            .surface
            .as_ref()
            .is_none_or(|s| s.width != camera.pixel_width || s.height != camera.pixel_height);
        if stale {
            self.surface = Some(CameraSurface::new(
                &self.device,
                camera.pixel_width,
                camera.pixel_height,
            ));
        }
        self.current_camera = Some(*camera);
    }

    fn execute(&mut self, buffer: CommandBuffer) {
        trace!("executing batch {}", buffer.label());
        for command in &buffer {
            self.run_command(command);
        }
    }

    fn draw_renderers(&mut self, culling: &CullingResults, settings: &DrawSettings) {
        self.ensure_encoder();
        let Some(camera) = self.current_camera else {
            debug!("draw before any camera, skipped");
            return;
        };
        let Some(resolved) = resolve_bound(&self.pool, self.surface.as_ref(), &self.bound) else {
            error!("draw with unresolved targets skipped");
            return;
        };
        let Some(encoder) = self.encoder.as_mut() else {
            return;
        };
        let mut targets = RasterTargets {
            device: &self.device,
            queue: &self.queue,
            encoder,
            camera: &camera,
            colors: resolved.colors.iter().map(|(view, _)| *view).collect(),
            color_formats: resolved.colors.iter().map(|(_, format)| *format).collect(),
            depth: resolved.depth.map(|(view, _)| view),
            depth_format: resolved.depth.map(|(_, format)| format),
        };
        self.raster.draw_renderers(&mut targets, culling, settings);
    }

    fn draw_skybox(&mut self, camera: &RenderCamera) {
        self.ensure_encoder();
        let Some(resolved) = resolve_bound(&self.pool, self.surface.as_ref(), &self.bound) else {
            error!("skybox with unresolved targets skipped");
            return;
        };
        let Some(encoder) = self.encoder.as_mut() else {
            return;
        };
        let mut targets = RasterTargets {
            device: &self.device,
            queue: &self.queue,
            encoder,
            camera,
            colors: resolved.colors.iter().map(|(view, _)| *view).collect(),
            color_formats: resolved.colors.iter().map(|(_, format)| *format).collect(),
            depth: resolved.depth.map(|(view, _)| view),
            depth_format: resolved.depth.map(|(_, format)| format),
        };
        self.raster.draw_skybox(&mut targets, camera);
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
        self.kernel_stages.clear();
        self.bound = BoundTargets::default();
    }
}
