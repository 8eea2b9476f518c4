//! Bake a reflection probe from an equirectangular HDR image.
//!
//! ```bash
//! cargo run --bin bake_probe -- --input sky.hdr --quality mid --output-dir out/
//! cargo run --bin bake_probe -- --synthetic --backend software
//! ```

use std::error::Error;
use std::fs::File;
use std::path::PathBuf;

use clap::Parser;

use skylight_demos::{EquirectImage, FACE_NAMES, save_face_hdr};
use skylight_graphics::{
    BackendKind, CommandContext, EnvMapQuality, GraphicsConfig, GraphicsDevice, ReflectionProbe, ShaderLibrary,
    Texture2D,
};

/// Graphics backend selection for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum CliBackend {
    /// wgpu when an adapter is found, software otherwise.
    #[default]
    Auto,
    /// GPU backend via wgpu.
    Wgpu,
    /// CPU reference backend with state validation.
    Software,
}

impl From<CliBackend> for BackendKind {
    fn from(cli: CliBackend) -> Self {
        match cli {
            CliBackend::Auto => BackendKind::Auto,
            CliBackend::Wgpu => BackendKind::Wgpu,
            CliBackend::Software => BackendKind::Software,
        }
    }
}

/// Probe resolution for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum CliQuality {
    /// 512² environment, 32² irradiance.
    Low,
    /// 1024² environment, 64² irradiance.
    #[default]
    Mid,
    /// 2048² environment, 128² irradiance.
    High,
}

impl From<CliQuality> for EnvMapQuality {
    fn from(cli: CliQuality) -> Self {
        match cli {
            CliQuality::Low => EnvMapQuality::Low,
            CliQuality::Mid => EnvMapQuality::Mid,
            CliQuality::High => EnvMapQuality::High,
        }
    }
}

/// Reflection probe baker.
#[derive(Parser, Debug)]
#[command(
    name = "bake_probe",
    about = "Bake an environment cube and SH irradiance from an HDR panorama",
    version
)]
struct Args {
    /// Equirectangular Radiance HDR input.
    #[arg(long, required_unless_present = "synthetic")]
    input: Option<PathBuf>,

    /// Bake a procedural sky instead of reading a file.
    #[arg(long, conflicts_with = "input")]
    synthetic: bool,

    /// Probe resolution.
    #[arg(long, default_value = "mid", value_enum)]
    quality: CliQuality,

    /// Graphics backend to use.
    #[arg(long, default_value = "auto", value_enum)]
    backend: CliBackend,

    /// Load shaders from `<dir>/framework/` instead of the built-in copies.
    #[arg(long)]
    shader_dir: Option<PathBuf>,

    /// Directory for the six irradiance faces.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Write the log to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        builder.target(env_logger::Target::Pipe(Box::new(File::create(path)?)));
    }
    builder.try_init()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.log_file.as_ref())?;

    log::info!("Graphics version: {}", skylight_graphics::VERSION);
    skylight_graphics::init();

    let source = match &args.input {
        Some(path) => EquirectImage::load_hdr(path)?,
        None => EquirectImage::synthetic_sky(512),
    };
    let source = source.to_two_by_one();

    let mut config = GraphicsConfig::new().with_backend(args.backend.into()).with_label("bake_probe");
    if let Some(dir) = &args.shader_dir {
        config = config.with_shader_library(ShaderLibrary::from_directory(dir));
    }
    let device = GraphicsDevice::new(&config)?;
    let allocator = device.create_descriptor_allocator(Some("bake_probe"))?;
    let queue = device.create_command_queue(Some("bake_probe"));
    let mut context = CommandContext::new(Some("bake_probe"));
    let mut sync = device.create_sync();

    let sky = Texture2D::from_texels(
        &device,
        &allocator,
        source.width,
        source.height,
        &source.texels,
        Some("panorama"),
    )?;
    let mut probe = ReflectionProbe::create(&device, context.list(), &allocator, args.quality.into())?;

    context.reset();
    probe.load_environment_map(&device, context.list_mut(), &sky)?;
    context.submit(&queue)?;
    sync.signal(&queue)?;
    sync.wait()?;
    log::info!("Bake finished on {}", device.name());

    let sh = probe.read_coefficients(&device)?;
    println!("SH coefficients (RGB):");
    for (k, c) in sh.coefficients.iter().enumerate() {
        println!("  L{k}: {:>12.6} {:>12.6} {:>12.6}", c[0], c[1], c[2]);
    }

    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)?;
        for (face, name) in FACE_NAMES.iter().enumerate() {
            let texels = probe.read_irradiance_face(&device, face as u32)?;
            save_face_hdr(
                &dir.join(format!("irradiance_{name}.hdr")),
                probe.irradiance_edge(),
                &texels,
            )?;
        }
        log::info!("Wrote irradiance faces to {}", dir.display());
    }
    Ok(())
}
