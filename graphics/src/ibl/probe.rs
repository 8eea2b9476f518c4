//! Reflection probe: resources, descriptors and the five-stage bake.

use std::sync::Arc;

use super::constants::{
    FaceConstants, NormalizeConstants, ProjectConstants, ReconstructConstants, ReduceConstants,
};
use super::layout::{CUBE_FACE_COUNT, MAX_CUBE_EDGE, ShReductionPlan, THREAD_COUNT_X, THREAD_COUNT_Y, group_count};
use super::pipelines::IblPipelines;
use super::sh::ShCoefficients;
use super::{EnvMapQuality, ProbeExtent};
use crate::command::{CommandList, ResourceBarrier};
use crate::descriptor::{
    Descriptor, DescriptorArena, DescriptorHeap, OwnedDescriptors, ResourceView, SharedDescriptorAllocator,
};
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::resources::{Buffer, Texture, Texture2D};
use crate::types::{
    BufferDescriptor, BufferUsage, BufferViewDesc, ResourceState, TextureDescriptor, TextureFormat,
    TextureSrvDesc, TextureUavDesc, TextureUsage,
};

const CONSTANTS: u32 = 0;
const TABLE_1: u32 = 1;
const TABLE_2: u32 = 2;
const TABLE_3: u32 = 3;

/// Bytes per element of the weight buffer.
const WEIGHT_STRIDE: u32 = 4;

/// A reflection probe.
///
/// Owns an environment cube map with a full mip chain, a single-mip
/// irradiance cube map, and the two scratch buffers of the SH reduction.
/// [`load_environment_map`](Self::load_environment_map) records the bake of
/// an equirectangular image into a command list.
///
/// Between bakes the cube maps are in `ShaderResource` and the scratch
/// buffers in `UnorderedAccess`. Every descriptor the probe holds returns to
/// the allocator when it is dropped.
///
/// # Example
///
/// ```ignore
/// let mut probe = ReflectionProbe::create(&device, context.list(), &allocator, EnvMapQuality::Low)?;
/// context.reset();
/// probe.load_environment_map(&device, context.list_mut(), &sky)?;
/// context.submit(&queue)?;
/// ```
#[derive(Debug)]
pub struct ReflectionProbe {
    extent: ProbeExtent,
    env_mip_count: u32,
    plan: ShReductionPlan,
    pipelines: IblPipelines,
    heap: Arc<DescriptorHeap>,

    env_cube: Arc<Texture>,
    irradiance_cube: Arc<Texture>,
    coefficients: Arc<Buffer>,
    weights: Arc<Buffer>,

    env_srv: Descriptor,
    env_uavs: Vec<Descriptor>,
    irradiance_srv: Descriptor,
    irradiance_uavs: Vec<Descriptor>,
    coefficients_srv: Descriptor,
    coefficients_uav: Descriptor,
    weights_srv: Descriptor,
    weights_uav: Descriptor,

    // Per-dispatch cube face UAVs of the equirect stage.
    scratch: DescriptorArena,
    _descriptors: OwnedDescriptors,
}

impl ReflectionProbe {
    /// Create a probe at a quality preset.
    ///
    /// Only creates resources, pipelines and descriptors; nothing is
    /// recorded into `cmd_list`.
    ///
    /// # Errors
    ///
    /// Any shader, pipeline, resource or descriptor failure. Descriptors
    /// acquired before the failure are returned to the allocator.
    pub fn create(
        device: &GraphicsDevice,
        cmd_list: &CommandList,
        allocator: &SharedDescriptorAllocator,
        quality: EnvMapQuality,
    ) -> Result<Self, GraphicsError> {
        Self::create_with_extent(device, cmd_list, allocator, quality.extent())
    }

    /// Create a probe with custom edge lengths.
    pub fn create_with_extent(
        device: &GraphicsDevice,
        cmd_list: &CommandList,
        allocator: &SharedDescriptorAllocator,
        extent: ProbeExtent,
    ) -> Result<Self, GraphicsError> {
        if extent.env_edge == 0 || extent.irr_edge == 0 {
            let e = GraphicsError::InvalidParameter(format!("probe extent {extent:?} has a zero edge"));
            log::error!("ReflectionProbe: {e}");
            return Err(e);
        }
        if extent.env_edge > MAX_CUBE_EDGE || extent.irr_edge > MAX_CUBE_EDGE {
            let e = GraphicsError::InvalidParameter(format!(
                "probe extent {extent:?} exceeds the {MAX_CUBE_EDGE} texel cube edge limit"
            ));
            log::error!("ReflectionProbe: {e}");
            return Err(e);
        }
        log::debug!(
            "ReflectionProbe: creating {}² / {}² probe for command list {:?}",
            extent.env_edge,
            extent.irr_edge,
            cmd_list.label()
        );

        let env_mip_count = extent.env_mip_count();
        let plan = ShReductionPlan::for_edge(extent.env_edge)?;
        let pipelines = IblPipelines::new(device, device.shader_library())?;
        let heap = Arc::clone(allocator.lock().heap());

        let cube_usage = TextureUsage::TEXTURE_BINDING | TextureUsage::STORAGE_BINDING | TextureUsage::COPY_SRC;
        let env_cube = device.create_texture(
            &TextureDescriptor::new_cube(extent.env_edge, TextureFormat::Rgba32Float, cube_usage)
                .with_mip_levels(env_mip_count)
                .with_label("ReflectionProbe Environment"),
            ResourceState::ShaderResource,
        )?;
        let irradiance_cube = device.create_texture(
            &TextureDescriptor::new_cube(extent.irr_edge, TextureFormat::Rgba32Float, cube_usage)
                .with_label("ReflectionProbe Irradiance"),
            ResourceState::ShaderResource,
        )?;

        let buffer_usage = BufferUsage::STORAGE | BufferUsage::COPY_SRC;
        let coefficients = device.create_buffer(
            &BufferDescriptor::structured(plan.array_length(), ShCoefficients::STRIDE, buffer_usage)
                .with_label("ReflectionProbe SH Coefficients"),
            ResourceState::UnorderedAccess,
        )?;
        let weights = device.create_buffer(
            &BufferDescriptor::structured(plan.array_length(), WEIGHT_STRIDE, buffer_usage)
                .with_label("ReflectionProbe SH Weights"),
            ResourceState::UnorderedAccess,
        )?;

        let mut descriptors = OwnedDescriptors::new(Arc::clone(allocator));
        let mut write = |view: ResourceView| -> Result<Descriptor, GraphicsError> {
            let descriptor = descriptors.allocate()?;
            heap.write_view(&descriptor, view)?;
            Ok(descriptor)
        };

        let env_srv = write(ResourceView::TextureSrv {
            texture: Arc::clone(&env_cube),
            desc: TextureSrvDesc::cube(env_mip_count),
        })?;
        let mut env_uavs = Vec::with_capacity((CUBE_FACE_COUNT * env_mip_count) as usize);
        for face in 0..CUBE_FACE_COUNT {
            for mip in 0..env_mip_count {
                env_uavs.push(write(ResourceView::TextureUav {
                    texture: Arc::clone(&env_cube),
                    desc: TextureUavDesc::face(face, mip),
                })?);
            }
        }
        let irradiance_srv = write(ResourceView::TextureSrv {
            texture: Arc::clone(&irradiance_cube),
            desc: TextureSrvDesc::cube(1),
        })?;
        let irradiance_uavs = (0..CUBE_FACE_COUNT)
            .map(|face| {
                write(ResourceView::TextureUav {
                    texture: Arc::clone(&irradiance_cube),
                    desc: TextureUavDesc::face(face, 0),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let coefficients_view = BufferViewDesc::whole(coefficients.descriptor());
        let coefficients_srv = write(ResourceView::BufferSrv {
            buffer: Arc::clone(&coefficients),
            desc: coefficients_view,
        })?;
        let coefficients_uav = write(ResourceView::BufferUav {
            buffer: Arc::clone(&coefficients),
            desc: coefficients_view,
        })?;
        let weights_view = BufferViewDesc::whole(weights.descriptor());
        let weights_srv = write(ResourceView::BufferSrv {
            buffer: Arc::clone(&weights),
            desc: weights_view,
        })?;
        let weights_uav = write(ResourceView::BufferUav {
            buffer: Arc::clone(&weights),
            desc: weights_view,
        })?;

        let scratch = DescriptorArena::new(Arc::clone(allocator), CUBE_FACE_COUNT * env_mip_count)?;

        log::info!(
            "ReflectionProbe: created env {}² x {} mips, irradiance {}², SH array {} elements, {} descriptors",
            extent.env_edge,
            env_mip_count,
            extent.irr_edge,
            plan.array_length(),
            descriptors.len() + scratch.capacity() as usize
        );

        Ok(Self {
            extent,
            env_mip_count,
            plan,
            pipelines,
            heap,
            env_cube,
            irradiance_cube,
            coefficients,
            weights,
            env_srv,
            env_uavs,
            irradiance_srv,
            irradiance_uavs,
            coefficients_srv,
            coefficients_uav,
            weights_srv,
            weights_uav,
            scratch,
            _descriptors: descriptors,
        })
    }

    fn validate_source(&self, cmd_list: &CommandList, source: &Texture2D) -> Result<(), GraphicsError> {
        if source.format() != TextureFormat::Rgba32Float {
            return Err(GraphicsError::InvalidParameter(format!(
                "environment map must be Rgba32Float, found {:?}",
                source.format()
            )));
        }
        if source.height() == 0 || source.width() != 2 * source.height() {
            return Err(GraphicsError::InvalidParameter(format!(
                "environment map must have a 2:1 aspect ratio, found {}x{}",
                source.width(),
                source.height()
            )));
        }
        if self.heap.index_of(source.srv().gpu_handle).is_none() {
            return Err(GraphicsError::InvalidParameter(
                "environment map SRV is not in the probe's descriptor heap".into(),
            ));
        }
        if !cmd_list.is_recording() {
            return Err(GraphicsError::InvalidParameter(format!(
                "command list {:?} is not recording",
                cmd_list.label()
            )));
        }
        Ok(())
    }

    /// Record the bake of an equirectangular RGBA32F image into `cmd_list`.
    ///
    /// The image must be twice as wide as it is tall. Invalid input records
    /// nothing. The scratch descriptors are reused by every call, so the list
    /// recorded by a previous call must have executed before this one.
    pub fn load_environment_map(
        &mut self,
        device: &GraphicsDevice,
        cmd_list: &mut CommandList,
        source: &Texture2D,
    ) -> Result<(), GraphicsError> {
        if let Err(e) = self.validate_source(cmd_list, source) {
            log::error!("ReflectionProbe: {e}");
            return Err(e);
        }

        let commands_before = cmd_list.len();
        cmd_list.set_descriptor_heap(&self.heap);
        self.record_equirect_to_cube(cmd_list, source)?;
        self.record_sh_project(cmd_list);
        self.record_sh_reduce(cmd_list);
        self.record_sh_normalize(cmd_list);
        self.record_sh_reconstruct(cmd_list);

        log::debug!(
            "ReflectionProbe: recorded {} commands for a {}x{} source on {}",
            cmd_list.len() - commands_before,
            source.width(),
            source.height(),
            device.name()
        );
        Ok(())
    }

    fn record_equirect_to_cube(&mut self, cmd_list: &mut CommandList, source: &Texture2D) -> Result<(), GraphicsError> {
        self.scratch.reset();
        cmd_list.resource_barrier(vec![ResourceBarrier::transition(
            &self.env_cube,
            ResourceState::ShaderResource,
            ResourceState::UnorderedAccess,
        )]);
        cmd_list.set_compute_pipeline(&self.pipelines.equi_to_cube.pipeline);

        for mip in 0..self.env_mip_count {
            let edge = (self.extent.env_edge >> mip).max(1);
            for face in 0..CUBE_FACE_COUNT {
                let uav = self.scratch.allocate()?;
                self.heap.write_view(
                    &uav,
                    ResourceView::TextureUav {
                        texture: Arc::clone(&self.env_cube),
                        desc: TextureUavDesc::face(face, mip),
                    },
                )?;
                cmd_list.set_compute_root_constants(
                    CONSTANTS,
                    &FaceConstants {
                        face_index: face,
                        mip_index: mip,
                        edge_length: edge,
                        inv_edge_length: 1.0 / edge as f32,
                    },
                );
                cmd_list.set_compute_root_descriptor_table(TABLE_1, source.srv().gpu_handle);
                cmd_list.set_compute_root_descriptor_table(TABLE_2, uav.gpu_handle);
                cmd_list.dispatch(group_count(edge, THREAD_COUNT_X), group_count(edge, THREAD_COUNT_Y), 1);
            }
        }

        cmd_list.resource_barrier(vec![ResourceBarrier::transition(
            &self.env_cube,
            ResourceState::UnorderedAccess,
            ResourceState::ShaderResource,
        )]);
        log::trace!(
            "ReflectionProbe: equirect to cube, {} dispatches",
            self.scratch.used()
        );
        Ok(())
    }

    fn sh_buffer_barriers(&self) -> Vec<ResourceBarrier> {
        vec![
            ResourceBarrier::uav(&self.coefficients),
            ResourceBarrier::uav(&self.weights),
        ]
    }

    fn record_sh_project(&self, cmd_list: &mut CommandList) {
        let edge = self.extent.env_edge;
        cmd_list.set_compute_pipeline(&self.pipelines.sh_project.pipeline);
        cmd_list.set_compute_root_constants(
            CONSTANTS,
            &ProjectConstants {
                edge_length: edge,
                inv_edge_length: 1.0 / edge as f32,
                _pad: [0; 2],
            },
        );
        cmd_list.set_compute_root_descriptor_table(TABLE_1, self.env_srv.gpu_handle);
        cmd_list.set_compute_root_descriptor_table(TABLE_2, self.coefficients_uav.gpu_handle);
        cmd_list.set_compute_root_descriptor_table(TABLE_3, self.weights_uav.gpu_handle);
        cmd_list.dispatch(group_count(edge, THREAD_COUNT_X), group_count(edge, THREAD_COUNT_Y), 1);
        cmd_list.resource_barrier(self.sh_buffer_barriers());
    }

    fn record_sh_reduce(&self, cmd_list: &mut CommandList) {
        cmd_list.set_compute_pipeline(&self.pipelines.sh_reduce.pipeline);
        for pass in self.plan.passes() {
            cmd_list.set_compute_root_constants(
                CONSTANTS,
                &ReduceConstants {
                    head_index: pass.head_index,
                    tail_index: pass.tail_index,
                    _pad: [0; 2],
                },
            );
            cmd_list.set_compute_root_descriptor_table(TABLE_1, self.coefficients_uav.gpu_handle);
            cmd_list.set_compute_root_descriptor_table(TABLE_2, self.weights_uav.gpu_handle);
            cmd_list.dispatch(pass.group_count, 1, 1);
            cmd_list.resource_barrier(self.sh_buffer_barriers());
        }
        log::trace!("ReflectionProbe: {} reduction passes", self.plan.passes().len());
    }

    fn record_sh_normalize(&self, cmd_list: &mut CommandList) {
        cmd_list.resource_barrier(vec![ResourceBarrier::transition(
            &self.weights,
            ResourceState::UnorderedAccess,
            ResourceState::ShaderResource,
        )]);
        cmd_list.set_compute_pipeline(&self.pipelines.sh_normalize.pipeline);
        cmd_list.set_compute_root_constants(
            CONSTANTS,
            &NormalizeConstants {
                index: self.plan.final_index(),
                _pad: [0; 3],
            },
        );
        cmd_list.set_compute_root_descriptor_table(TABLE_1, self.weights_srv.gpu_handle);
        cmd_list.set_compute_root_descriptor_table(TABLE_2, self.coefficients_uav.gpu_handle);
        cmd_list.dispatch(1, 1, 1);
        cmd_list.resource_barrier(vec![ResourceBarrier::uav(&self.coefficients)]);
    }

    fn record_sh_reconstruct(&self, cmd_list: &mut CommandList) {
        let edge = self.extent.irr_edge;
        cmd_list.resource_barrier(vec![
            ResourceBarrier::transition(
                &self.coefficients,
                ResourceState::UnorderedAccess,
                ResourceState::ShaderResource,
            ),
            ResourceBarrier::transition(
                &self.irradiance_cube,
                ResourceState::ShaderResource,
                ResourceState::UnorderedAccess,
            ),
        ]);
        cmd_list.set_compute_pipeline(&self.pipelines.sh_reconstruct.pipeline);
        for (face, uav) in self.irradiance_uavs.iter().enumerate() {
            cmd_list.set_compute_root_constants(
                CONSTANTS,
                &ReconstructConstants {
                    coeff_index: self.plan.final_index(),
                    face_index: face as u32,
                    edge_length: edge,
                    inv_edge_length: 1.0 / edge as f32,
                },
            );
            cmd_list.set_compute_root_descriptor_table(TABLE_1, self.coefficients_srv.gpu_handle);
            cmd_list.set_compute_root_descriptor_table(TABLE_2, uav.gpu_handle);
            cmd_list.dispatch(group_count(edge, THREAD_COUNT_X), group_count(edge, THREAD_COUNT_Y), 1);
        }
        cmd_list.resource_barrier(vec![ResourceBarrier::transition(
            &self.irradiance_cube,
            ResourceState::UnorderedAccess,
            ResourceState::ShaderResource,
        )]);
        cmd_list.resource_barrier(vec![
            ResourceBarrier::transition(
                &self.coefficients,
                ResourceState::ShaderResource,
                ResourceState::UnorderedAccess,
            ),
            ResourceBarrier::transition(
                &self.weights,
                ResourceState::ShaderResource,
                ResourceState::UnorderedAccess,
            ),
        ]);
    }

    /// Read back the normalized coefficients of the last executed bake.
    pub fn read_coefficients(&self, device: &GraphicsDevice) -> Result<ShCoefficients, GraphicsError> {
        let elements = device.read_structured::<ShCoefficients>(&self.coefficients)?;
        elements
            .get(self.plan.final_index() as usize)
            .copied()
            .ok_or_else(|| GraphicsError::Internal("coefficient buffer shorter than its plan".into()))
    }

    /// Read back one face of the irradiance cube.
    pub fn read_irradiance_face(&self, device: &GraphicsDevice, face: u32) -> Result<Vec<[f32; 4]>, GraphicsError> {
        device.read_texture_texels(&self.irradiance_cube, 0, face)
    }

    /// Edge lengths.
    pub fn extent(&self) -> ProbeExtent {
        self.extent
    }

    /// Edge of environment mip 0.
    pub fn env_edge(&self) -> u32 {
        self.extent.env_edge
    }

    /// Edge of the irradiance cube.
    pub fn irradiance_edge(&self) -> u32 {
        self.extent.irr_edge
    }

    /// Mip levels of the environment cube.
    pub fn env_mip_count(&self) -> u32 {
        self.env_mip_count
    }

    /// Environment cube map.
    pub fn env_cube(&self) -> &Arc<Texture> {
        &self.env_cube
    }

    /// Irradiance cube map.
    pub fn irradiance_cube(&self) -> &Arc<Texture> {
        &self.irradiance_cube
    }

    /// SRV of the whole environment cube.
    pub fn env_srv(&self) -> Descriptor {
        self.env_srv
    }

    /// UAV of one face and mip of the environment cube.
    pub fn env_uav(&self, face: u32, mip: u32) -> Option<Descriptor> {
        if face >= CUBE_FACE_COUNT || mip >= self.env_mip_count {
            return None;
        }
        self.env_uavs.get((face * self.env_mip_count + mip) as usize).copied()
    }

    /// SRV of the irradiance cube.
    pub fn irradiance_srv(&self) -> Descriptor {
        self.irradiance_srv
    }

    /// UAV of one irradiance face.
    pub fn irradiance_uav(&self, face: u32) -> Option<Descriptor> {
        self.irradiance_uavs.get(face as usize).copied()
    }

    /// SRV and UAV of the coefficient buffer.
    pub fn coefficient_views(&self) -> (Descriptor, Descriptor) {
        (self.coefficients_srv, self.coefficients_uav)
    }

    /// SRV and UAV of the weight buffer.
    pub fn weight_views(&self) -> (Descriptor, Descriptor) {
        (self.weights_srv, self.weights_uav)
    }

    /// SH coefficient scratch buffer.
    pub fn coefficients(&self) -> &Arc<Buffer> {
        &self.coefficients
    }

    /// SH weight scratch buffer.
    pub fn weights(&self) -> &Arc<Buffer> {
        &self.weights
    }

    /// Elements in each scratch buffer.
    pub fn uav_array_length(&self) -> u32 {
        self.plan.array_length()
    }

    /// Reduction plan over the scratch buffers.
    pub fn reduction_plan(&self) -> &ShReductionPlan {
        &self.plan
    }

    /// Descriptor heap the probe's views live in.
    pub fn heap(&self) -> &Arc<DescriptorHeap> {
        &self.heap
    }

    /// Probe compute pipelines.
    pub fn pipelines(&self) -> &IblPipelines {
        &self.pipelines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::command::Command;
    use crate::config::GraphicsConfig;

    fn setup(capacity: u32) -> (Arc<GraphicsDevice>, SharedDescriptorAllocator, CommandList) {
        let device = GraphicsDevice::new(
            &GraphicsConfig::new()
                .with_backend(BackendKind::Software)
                .with_descriptor_heap_capacity(capacity),
        )
        .unwrap();
        let allocator = device.create_descriptor_allocator(Some("test")).unwrap();
        (device, allocator, CommandList::new(Some("test")))
    }

    fn gray(device: &GraphicsDevice, allocator: &SharedDescriptorAllocator, width: u32, height: u32) -> Texture2D {
        let texels = vec![[0.5, 0.5, 0.5, 1.0]; (width * height) as usize];
        Texture2D::from_texels(device, allocator, width, height, &texels, Some("gray")).unwrap()
    }

    #[test]
    fn test_create_descriptor_count() {
        let (device, allocator, list) = setup(256);
        let probe = ReflectionProbe::create_with_extent(&device, &list, &allocator, ProbeExtent::new(8, 4)).unwrap();
        assert_eq!(probe.env_mip_count(), 4);
        // 1 + 24 env, 1 + 6 irradiance, 4 buffer views, 24 scratch
        assert_eq!(allocator.lock().current_length(), 1 + 24 + 1 + 6 + 4 + 24);
        assert_eq!(probe.uav_array_length(), 64 + 16 + 4 + 1);
        assert!(probe.env_uav(5, 3).is_some());
        assert!(probe.env_uav(6, 0).is_none());
        assert!(probe.env_uav(0, 4).is_none());
        assert_eq!(probe.env_uav(1, 2).map(|d| d.index), Some(probe.env_uavs[4 + 2].index));
        drop(probe);
        assert_eq!(allocator.lock().current_length(), 0);
        assert_eq!(allocator.lock().tail_index(), 0);
    }

    #[test]
    fn test_zero_extent_rejected() {
        let (device, allocator, list) = setup(64);
        let result = ReflectionProbe::create_with_extent(&device, &list, &allocator, ProbeExtent::new(0, 4));
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_oversized_extent_rejected() {
        let (device, allocator, list) = setup(64);
        for extent in [
            ProbeExtent::new(65536, 4),
            ProbeExtent::new(60000, 4),
            ProbeExtent::new(MAX_CUBE_EDGE + 1, 4),
            ProbeExtent::new(8, MAX_CUBE_EDGE + 1),
        ] {
            let result = ReflectionProbe::create_with_extent(&device, &list, &allocator, extent);
            assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))), "{extent:?}");
        }
        assert_eq!(allocator.lock().tail_index(), 0);
    }

    #[test]
    fn test_recorded_stage_sequence() {
        let (device, allocator, mut list) = setup(256);
        let mut probe = ReflectionProbe::create_with_extent(&device, &list, &allocator, ProbeExtent::new(4, 2)).unwrap();
        let source = gray(&device, &allocator, 8, 4);
        list.reset();
        probe.load_environment_map(&device, &mut list, &source).unwrap();

        let dispatches: Vec<[u32; 3]> = list
            .commands()
            .iter()
            .filter_map(|command| match command {
                Command::Dispatch { x, y, z } => Some([*x, *y, *z]),
                _ => None,
            })
            .collect();
        // 3 mips x 6 faces, project, 2 reduce passes, normalize, 6 faces
        assert_eq!(dispatches.len(), 18 + 1 + 2 + 1 + 6);
        assert!(dispatches.iter().all(|d| *d != [0, 0, 0]));
        assert!(matches!(list.commands()[0], Command::SetDescriptorHeap(_)));
        assert_eq!(probe.scratch.used(), 18);
    }

    #[test]
    fn test_invalid_source_records_nothing() {
        let (device, allocator, mut list) = setup(256);
        let mut probe = ReflectionProbe::create_with_extent(&device, &list, &allocator, ProbeExtent::new(4, 2)).unwrap();
        list.reset();

        let square = gray(&device, &allocator, 4, 4);
        assert!(matches!(
            probe.load_environment_map(&device, &mut list, &square),
            Err(GraphicsError::InvalidParameter(_))
        ));

        let bytes = vec![128u8; 8 * 4 * 4];
        let ldr = Texture2D::from_rgba8(&device, &allocator, 8, 4, &bytes, Some("ldr")).unwrap();
        assert!(matches!(
            probe.load_environment_map(&device, &mut list, &ldr),
            Err(GraphicsError::InvalidParameter(_))
        ));
        assert!(list.is_empty());
    }

    #[test]
    fn test_closed_list_rejected() {
        let (device, allocator, mut list) = setup(256);
        let mut probe = ReflectionProbe::create_with_extent(&device, &list, &allocator, ProbeExtent::new(4, 2)).unwrap();
        let source = gray(&device, &allocator, 8, 4);
        assert!(probe.load_environment_map(&device, &mut list, &source).is_err());
        assert!(list.is_empty());
        assert!(list.close().is_err());
    }
}
