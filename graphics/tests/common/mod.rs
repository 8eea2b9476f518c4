//! Shared setup for the integration tests.
//!
//! Tests are parameterized over [`Backend`] with `rstest`. A backend that is
//! not compiled in, or has no adapter on this machine, yields no
//! [`TestContext`] and the test returns early.

use std::sync::Arc;

use skylight_graphics::{
    BackendKind, CommandContext, CommandQueue, EnvMapQuality, GpuSync, GraphicsConfig, GraphicsDevice,
    ProbeExtent, ReflectionProbe, SharedDescriptorAllocator, Texture2D,
};

/// Backends under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// CPU reference backend, always available.
    Software,
    /// wgpu, when compiled in and an adapter exists.
    Wgpu,
}

impl Backend {
    /// Check if this backend is compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Software => true,
            Backend::Wgpu => skylight_graphics::has_gpu_backend(),
        }
    }

    fn kind(self) -> BackendKind {
        match self {
            Backend::Software => BackendKind::Software,
            Backend::Wgpu => BackendKind::Wgpu,
        }
    }
}

/// Install a test logger once per binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Device, allocator, queue and a command context for one test.
pub struct TestContext {
    /// The backend being tested.
    #[allow(dead_code)]
    pub backend: Backend,
    pub device: Arc<GraphicsDevice>,
    pub allocator: SharedDescriptorAllocator,
    pub queue: CommandQueue,
    pub context: CommandContext,
    pub sync: GpuSync,
}

impl TestContext {
    /// Create a context with the default heap capacity.
    ///
    /// Returns `None` if the backend is not available.
    pub fn new(backend: Backend) -> Option<Self> {
        Self::with_config(backend, GraphicsConfig::new())
    }

    /// Create a context from `config`, overriding its backend.
    pub fn with_config(backend: Backend, config: GraphicsConfig) -> Option<Self> {
        init_logging();
        if !backend.is_available() {
            return None;
        }
        let device = GraphicsDevice::new(&config.with_backend(backend.kind()).with_label("test")).ok()?;
        let allocator = device.create_descriptor_allocator(Some("test")).ok()?;
        let queue = device.create_command_queue(Some("test"));
        let sync = device.create_sync();
        Some(Self {
            backend,
            device,
            allocator,
            queue,
            context: CommandContext::new(Some("test")),
            sync,
        })
    }

    /// Create a probe with a small custom extent.
    pub fn create_probe(&mut self, env_edge: u32, irr_edge: u32) -> ReflectionProbe {
        self.context.reset();
        ReflectionProbe::create_with_extent(
            &self.device,
            self.context.list(),
            &self.allocator,
            ProbeExtent::new(env_edge, irr_edge),
        )
        .expect("probe creation failed")
    }

    /// Create a probe at a quality preset.
    #[allow(dead_code)]
    pub fn create_probe_with_quality(&mut self, quality: EnvMapQuality) -> ReflectionProbe {
        self.context.reset();
        ReflectionProbe::create(&self.device, self.context.list(), &self.allocator, quality)
            .expect("probe creation failed")
    }

    /// Upload an RGBA32F equirectangular image.
    pub fn upload(&self, width: u32, height: u32, texels: &[[f32; 4]]) -> Texture2D {
        Texture2D::from_texels(&self.device, &self.allocator, width, height, texels, Some("env"))
            .expect("upload failed")
    }

    /// Record a bake, submit it and wait for completion.
    pub fn bake(&mut self, probe: &mut ReflectionProbe, source: &Texture2D) {
        self.context.reset();
        probe
            .load_environment_map(&self.device, self.context.list_mut(), source)
            .expect("recording failed");
        self.context.submit(&self.queue).expect("submit failed");
        self.sync.signal(&self.queue).expect("signal failed");
        self.sync.wait().expect("wait failed");
    }
}

/// A uniform equirectangular image.
pub fn constant_sky(width: u32, height: u32, color: [f32; 3]) -> Vec<[f32; 4]> {
    vec![[color[0], color[1], color[2], 1.0]; (width * height) as usize]
}

/// An image bright along the top rows and dark along the bottom.
pub fn vertical_gradient(width: u32, height: u32) -> Vec<[f32; 4]> {
    (0..height)
        .flat_map(|y| {
            let t = 1.0 - (y as f32 + 0.5) / height as f32;
            (0..width).map(move |x| [2.0 * t, t + 0.1 * (x % 3) as f32, 0.5 * t, 1.0])
        })
        .collect()
}

/// Assert two RGB triples match within `tolerance`.
pub fn assert_rgb_near(actual: [f32; 4], expected: [f32; 3], tolerance: f32) {
    for c in 0..3 {
        assert!(
            (actual[c] - expected[c]).abs() <= tolerance,
            "channel {c}: {actual:?} vs {expected:?}"
        );
    }
}
