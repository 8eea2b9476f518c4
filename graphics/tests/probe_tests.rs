//! Reflection probe integration tests.
//!
//! Every test that executes work runs on each backend through `rstest`
//! cases; the validation tests that rely on state tracking run on the
//! software backend only, since wgpu tracks barriers itself.
//!
//! ```bash
//! cargo test --test probe_tests
//! ```

mod common;

use std::f32::consts::PI;

use rstest::rstest;

use common::{Backend, TestContext, assert_rgb_near, constant_sky, vertical_gradient};
use skylight_graphics::ibl::{
    CUBE_FACE_COUNT, ProjectConstants, ReconstructConstants, SH_COEFFICIENT_COUNT, ShCoefficients,
};
use skylight_graphics::{
    AllocError, CommandList, GraphicsConfig, GraphicsError, ProbeExtent, ReflectionProbe, ResourceBarrier,
    ResourceState, Texture2D,
};

const Y00: f32 = 0.282_095;

// ============================================================================
// Bake Results
// ============================================================================

/// A uniform sky bakes to a uniform environment and an irradiance equal to
/// its radiance, with only the constant SH band populated.
#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn test_constant_environment(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let color = [0.25, 0.5, 1.0];
    let source = ctx.upload(32, 16, &constant_sky(32, 16, color));
    let mut probe = ctx.create_probe(16, 4);
    ctx.bake(&mut probe, &source);

    for mip in 0..probe.env_mip_count() {
        for face in 0..CUBE_FACE_COUNT {
            let texels = ctx.device.read_texture_texels(probe.env_cube(), mip, face).unwrap();
            let edge = (16 >> mip).max(1) as usize;
            assert_eq!(texels.len(), edge * edge);
            for texel in texels {
                assert_rgb_near(texel, color, 1e-4);
            }
        }
    }

    let sh = probe.read_coefficients(&ctx.device).unwrap();
    for c in 0..3 {
        let expected = color[c] * Y00 * 4.0 * PI;
        assert!((sh.coefficients[0][c] - expected).abs() < 1e-3 * expected.max(1.0));
    }
    for k in 1..SH_COEFFICIENT_COUNT {
        for c in 0..3 {
            assert!(sh.coefficients[k][c].abs() < 1e-3, "coefficient {k}: {:?}", sh.coefficients[k]);
        }
    }

    for face in 0..CUBE_FACE_COUNT {
        let texels = probe.read_irradiance_face(&ctx.device, face).unwrap();
        assert_eq!(texels.len(), 16);
        for texel in texels {
            assert_rgb_near(texel, color, 1e-2);
        }
    }
}

/// The reduced element equals the sum of the per-texel projections scaled by
/// `4π / Σweights`.
#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn test_reduction_matches_cpu_sum(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let source = ctx.upload(64, 32, &vertical_gradient(64, 32));
    let mut probe = ctx.create_probe(8, 4);
    ctx.bake(&mut probe, &source);

    let coefficients: Vec<ShCoefficients> = ctx.device.read_structured(probe.coefficients()).unwrap();
    let weights: Vec<f32> = ctx.device.read_structured(probe.weights()).unwrap();
    let plan = probe.reduction_plan();
    assert_eq!(coefficients.len(), plan.array_length() as usize);
    assert_eq!(weights.len(), plan.array_length() as usize);

    let base = plan.base_length() as usize;
    let weight_sum: f32 = weights[..base].iter().sum();
    assert!((weight_sum - 4.0 * PI).abs() < 0.3, "{weight_sum}");
    assert!((weights[plan.final_index() as usize] - weight_sum).abs() < 1e-3);

    let mut sum = ShCoefficients::default();
    for element in &coefficients[..base] {
        sum.accumulate(element);
    }
    sum.scale(4.0 * PI / weight_sum);

    let reduced = coefficients[plan.final_index() as usize];
    assert_eq!(reduced, probe.read_coefficients(&ctx.device).unwrap());
    for k in 0..SH_COEFFICIENT_COUNT {
        for c in 0..3 {
            let (a, b) = (reduced.coefficients[k][c], sum.coefficients[k][c]);
            assert!((a - b).abs() <= 1e-3 * b.abs().max(1.0), "coefficient {k}.{c}: {a} vs {b}");
        }
    }
}

/// A sky bright overhead lights an upward normal more than a downward one.
#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn test_directional_sky(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let source = ctx.upload(64, 32, &vertical_gradient(64, 32));
    let mut probe = ctx.create_probe(16, 4);
    ctx.bake(&mut probe, &source);

    let center = |face: u32| {
        let texels = probe.read_irradiance_face(&ctx.device, face).unwrap();
        // texel (1, 1) of a 4x4 face sits next to the center
        texels[5]
    };
    let up = center(2);
    let down = center(3);
    assert!(up[0] > down[0], "{up:?} vs {down:?}");
    assert!(up[2] > down[2], "{up:?} vs {down:?}");
    assert!(down.iter().all(|c| *c >= 0.0));
}

/// A second bake replaces the first and finds every resource back in its
/// resting state.
#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn test_rebake_uses_new_source(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let dim = ctx.upload(16, 8, &constant_sky(16, 8, [0.2, 0.2, 0.2]));
    let bright = ctx.upload(16, 8, &constant_sky(16, 8, [0.8, 0.6, 0.4]));
    let mut probe = ctx.create_probe(8, 2);

    ctx.bake(&mut probe, &dim);
    let first = probe.read_irradiance_face(&ctx.device, 4).unwrap();
    assert_rgb_near(first[0], [0.2, 0.2, 0.2], 1e-2);

    ctx.bake(&mut probe, &bright);
    for face in 0..CUBE_FACE_COUNT {
        for texel in probe.read_irradiance_face(&ctx.device, face).unwrap() {
            assert_rgb_near(texel, [0.8, 0.6, 0.4], 1e-2);
        }
    }
}

// ============================================================================
// Input Validation
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn test_invalid_sources_record_nothing(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let mut probe = ctx.create_probe(8, 2);
    ctx.context.reset();

    let square = ctx.upload(8, 8, &constant_sky(8, 8, [1.0; 3]));
    let ldr = Texture2D::from_rgba8(&ctx.device, &ctx.allocator, 16, 8, &[255; 16 * 8 * 4], Some("ldr")).unwrap();
    let foreign_allocator = ctx.device.create_descriptor_allocator(Some("foreign")).unwrap();
    let foreign = Texture2D::from_texels(
        &ctx.device,
        &foreign_allocator,
        16,
        8,
        &constant_sky(16, 8, [1.0; 3]),
        Some("foreign"),
    )
    .unwrap();

    for source in [&square, &ldr, &foreign] {
        let result = probe.load_environment_map(&ctx.device, ctx.context.list_mut(), source);
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))), "{result:?}");
    }
    assert!(ctx.context.list().is_empty());
}

#[test]
fn test_closed_list_rejected() {
    let mut ctx = TestContext::new(Backend::Software).unwrap();
    let mut probe = ctx.create_probe(8, 2);
    let source = ctx.upload(16, 8, &constant_sky(16, 8, [1.0; 3]));

    let mut list = CommandList::new(Some("closed"));
    let result = probe.load_environment_map(&ctx.device, &mut list, &source);
    assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
    assert!(list.is_empty());
}

// ============================================================================
// Descriptor Lifetime
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn test_probe_drop_releases_descriptors(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    assert_eq!(ctx.allocator.lock().current_length(), 0);
    let probe = ctx.create_probe(8, 2);
    // Views: 1 + 6 * 4 environment, 1 + 6 irradiance, 4 buffer; scratch: 6 * 4
    assert_eq!(ctx.allocator.lock().current_length(), 25 + 7 + 4 + 24);
    drop(probe);
    assert_eq!(ctx.allocator.lock().current_length(), 0);
    assert_eq!(ctx.allocator.lock().tail_index(), 0);
}

#[test]
fn test_create_rolls_back_on_exhausted_heap() {
    let config = GraphicsConfig::new().with_descriptor_heap_capacity(16);
    let mut ctx = TestContext::with_config(Backend::Software, config).unwrap();
    ctx.context.reset();

    let result = ReflectionProbe::create_with_extent(
        &ctx.device,
        ctx.context.list(),
        &ctx.allocator,
        ProbeExtent::new(8, 2),
    );
    assert!(matches!(
        result,
        Err(GraphicsError::DescriptorAllocation(AllocError::HeapExhausted { capacity: 16 }))
    ));
    assert_eq!(ctx.allocator.lock().current_length(), 0);
    assert!(ctx.context.list().is_empty());
}

// ============================================================================
// State Validation (software backend)
// ============================================================================

#[test]
fn test_wrong_transition_state_rejected() {
    let mut ctx = TestContext::new(Backend::Software).unwrap();
    let probe = ctx.create_probe(8, 2);

    ctx.context.reset();
    ctx.context.list_mut().resource_barrier(vec![ResourceBarrier::transition(
        probe.env_cube(),
        ResourceState::UnorderedAccess,
        ResourceState::ShaderResource,
    )]);
    let result = ctx.context.submit(&ctx.queue);
    assert!(matches!(result, Err(GraphicsError::InvalidResourceState(_))), "{result:?}");
}

/// Records two projections into the same buffers. Without a UAV barrier in
/// between the second one is a write-after-write hazard.
fn record_projections(ctx: &mut TestContext, probe: &ReflectionProbe, barrier: bool) {
    let (_, coefficients) = probe.coefficient_views();
    let (_, weights) = probe.weight_views();

    ctx.context.reset();
    let list = ctx.context.list_mut();
    list.set_descriptor_heap(probe.heap());
    list.set_compute_pipeline(&probe.pipelines().sh_project.pipeline);
    for _ in 0..2 {
        list.set_compute_root_constants(
            0,
            &ProjectConstants {
                edge_length: probe.env_edge(),
                inv_edge_length: 1.0 / probe.env_edge() as f32,
                _pad: [0; 2],
            },
        );
        list.set_compute_root_descriptor_table(1, probe.env_srv().gpu_handle);
        list.set_compute_root_descriptor_table(2, coefficients.gpu_handle);
        list.set_compute_root_descriptor_table(3, weights.gpu_handle);
        list.dispatch(1, 1, 1);
        if barrier {
            list.resource_barrier(vec![
                ResourceBarrier::uav(probe.coefficients()),
                ResourceBarrier::uav(probe.weights()),
            ]);
        }
    }
}

#[test]
fn test_missing_uav_barrier_rejected() {
    let mut ctx = TestContext::new(Backend::Software).unwrap();
    let probe = ctx.create_probe(8, 2);

    record_projections(&mut ctx, &probe, false);
    let result = ctx.context.submit(&ctx.queue);
    assert!(matches!(result, Err(GraphicsError::Hazard(_))), "{result:?}");
}

#[test]
fn test_uav_barrier_orders_writes() {
    let mut ctx = TestContext::new(Backend::Software).unwrap();
    let probe = ctx.create_probe(8, 2);

    record_projections(&mut ctx, &probe, true);
    ctx.context.submit(&ctx.queue).unwrap();
}

#[test]
fn test_srv_read_in_wrong_state_rejected() {
    let mut ctx = TestContext::new(Backend::Software).unwrap();
    let probe = ctx.create_probe(8, 2);
    let (coefficients_srv, _) = probe.coefficient_views();

    // The coefficient buffer rests in UnorderedAccess; reconstruction reads it as an SRV.
    ctx.context.reset();
    let list = ctx.context.list_mut();
    list.set_descriptor_heap(probe.heap());
    list.resource_barrier(vec![ResourceBarrier::transition(
        probe.irradiance_cube(),
        ResourceState::ShaderResource,
        ResourceState::UnorderedAccess,
    )]);
    list.set_compute_pipeline(&probe.pipelines().sh_reconstruct.pipeline);
    list.set_compute_root_constants(
        0,
        &ReconstructConstants {
            coeff_index: probe.reduction_plan().final_index(),
            face_index: 0,
            edge_length: 2,
            inv_edge_length: 0.5,
        },
    );
    list.set_compute_root_descriptor_table(1, coefficients_srv.gpu_handle);
    list.set_compute_root_descriptor_table(2, probe.irradiance_uav(0).unwrap().gpu_handle);
    list.dispatch(1, 1, 1);
    let result = ctx.context.submit(&ctx.queue);
    assert!(matches!(result, Err(GraphicsError::InvalidResourceState(_))), "{result:?}");
}

#[test]
fn test_wait_uses_configured_timeout() {
    let config = GraphicsConfig::new().with_wait_timeout(Some(std::time::Duration::from_millis(5)));
    let mut ctx = TestContext::with_config(Backend::Software, config).unwrap();
    let source = ctx.upload(16, 8, &constant_sky(16, 8, [0.5; 3]));
    let mut probe = ctx.create_probe(8, 2);
    ctx.bake(&mut probe, &source);
    assert_eq!(ctx.sync.wait_value(), 1);
    assert!(ctx.sync.wait().is_ok());
}
