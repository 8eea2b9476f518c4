use criterion::{Criterion, black_box, criterion_group, criterion_main};

use skylight_graphics::ibl::{ShReductionPlan, cube_direction, sh_basis, texel_uv};
use skylight_graphics::{
    BackendKind, CommandContext, DescriptorAllocator, DescriptorHeap, GraphicsConfig, GraphicsDevice, ProbeExtent,
    ReflectionProbe, ShCoefficients, Texture2D,
};

// ---------------------------------------------------------------------------
// Descriptor allocation
// ---------------------------------------------------------------------------

fn bench_allocator_churn(c: &mut Criterion) {
    c.bench_function("descriptor_allocator_churn_1024", |b| {
        let heap = std::sync::Arc::new(DescriptorHeap::new(1024, None).unwrap());
        let mut allocator = DescriptorAllocator::new(heap);
        b.iter(|| {
            let mut live: Vec<_> = (0..1024).map(|_| allocator.allocate().unwrap()).collect();
            for descriptor in live.iter_mut().step_by(2) {
                allocator.free(descriptor);
            }
            for descriptor in live.iter_mut().skip(1).step_by(2) {
                allocator.free(descriptor);
            }
            black_box(allocator.current_length());
        });
    });
}

// ---------------------------------------------------------------------------
// SH math
// ---------------------------------------------------------------------------

fn bench_reduction_plan(c: &mut Criterion) {
    c.bench_function("sh_reduction_plan_2048", |b| {
        b.iter(|| black_box(ShReductionPlan::for_edge(black_box(2048)).unwrap()));
    });
}

fn bench_cpu_projection(c: &mut Criterion) {
    c.bench_function("sh_project_cpu_64x64x6", |b| {
        let edge = 64;
        let inv = 1.0 / edge as f32;
        b.iter(|| {
            let mut sh = ShCoefficients::default();
            for face in 0..6 {
                for y in 0..edge {
                    for x in 0..edge {
                        let dir = cube_direction(face, texel_uv(x, y, inv));
                        sh.add_sample(dir.abs(), &sh_basis(dir), inv * inv);
                    }
                }
            }
            black_box(sh);
        });
    });
}

// ---------------------------------------------------------------------------
// Software bake
// ---------------------------------------------------------------------------

fn bench_software_bake(c: &mut Criterion) {
    let device = GraphicsDevice::new(&GraphicsConfig::new().with_backend(BackendKind::Software)).unwrap();
    let allocator = device.create_descriptor_allocator(Some("bench")).unwrap();
    let queue = device.create_command_queue(Some("bench"));
    let mut context = CommandContext::new(Some("bench"));
    let texels = vec![[0.5, 0.6, 0.7, 1.0]; 64 * 32];
    let sky = Texture2D::from_texels(&device, &allocator, 64, 32, &texels, Some("sky")).unwrap();
    let mut probe =
        ReflectionProbe::create_with_extent(&device, context.list(), &allocator, ProbeExtent::new(32, 8)).unwrap();

    c.bench_function("software_bake_32", |b| {
        b.iter(|| {
            context.reset();
            probe.load_environment_map(&device, context.list_mut(), &sky).unwrap();
            context.submit(&queue).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_allocator_churn,
    bench_reduction_plan,
    bench_cpu_projection,
    bench_software_bake,
);
criterion_main!(benches);
