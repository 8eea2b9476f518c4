//! Dispatch sizing and the SH reduction layout.
//!
//! The coefficient and weight buffers hold every level of the reduction back
//! to back, like a mip chain:
//!
//! ```text
//!  index 0                      base_length                             array_length - 1
//!  | level 0: one element per   | level 1: ceil(len0 / SEG) | ... | 1 |
//!  |   env texel (x, y)         |                           |     |   |
//! ```
//!
//! Pass `k` reads level `k` (`head..tail`) and writes level `k + 1`, which starts
//! at `tail`. The last element holds the fully reduced sum.

use crate::error::GraphicsError;

/// Threads per workgroup along X for 2D dispatches.
pub const THREAD_COUNT_X: u32 = 8;
/// Threads per workgroup along Y for 2D dispatches.
pub const THREAD_COUNT_Y: u32 = 8;
/// Threads per workgroup for 1D dispatches.
pub const LINEAR_THREAD_COUNT: u32 = 64;
/// Elements folded into one by each reduction thread.
pub const SH_REDUCE_SEGMENT_SIZE: u32 = 4;
/// Faces of a cube map.
pub const CUBE_FACE_COUNT: u32 = 6;
/// Largest cube map edge a probe accepts.
pub const MAX_CUBE_EDGE: u32 = 16384;

/// Workgroups needed to cover `threads` invocations, at least one.
pub fn group_count(threads: u32, group_size: u32) -> u32 {
    threads.div_ceil(group_size).max(1)
}

/// One reduction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReductionPass {
    /// First element of the level being reduced.
    pub head_index: u32,
    /// One past the last element of the level being reduced.
    pub tail_index: u32,
    /// Number of elements written, starting at `tail_index`.
    pub output_length: u32,
    /// Workgroups dispatched.
    pub group_count: u32,
}

/// Level lengths and passes of the tree reduction over `base_length` samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShReductionPlan {
    levels: Vec<u32>,
    passes: Vec<ReductionPass>,
    array_length: u32,
}

impl ShReductionPlan {
    /// Plan the reduction of `base_length` samples down to one.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if the levels together exceed `u32::MAX` elements.
    pub fn new(base_length: u32) -> Result<Self, GraphicsError> {
        let mut levels = vec![base_length.max(1)];
        let mut passes = Vec::new();
        let mut head = 0u32;
        let mut length = base_length.max(1);
        while length > 1 {
            let tail = head.checked_add(length).ok_or_else(|| too_long(base_length))?;
            let output_length = length.div_ceil(SH_REDUCE_SEGMENT_SIZE);
            passes.push(ReductionPass {
                head_index: head,
                tail_index: tail,
                output_length,
                group_count: group_count(output_length, LINEAR_THREAD_COUNT),
            });
            levels.push(output_length);
            head = tail;
            length = output_length;
        }
        let array_length = head.checked_add(length).ok_or_else(|| too_long(base_length))?;
        Ok(Self {
            levels,
            passes,
            array_length,
        })
    }

    /// Plan for an environment cube of edge `env_edge` (one sample per face texel position).
    pub fn for_edge(env_edge: u32) -> Result<Self, GraphicsError> {
        let base_length = env_edge.checked_mul(env_edge).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("SH reduction over a {env_edge}² cube overflows u32"))
        })?;
        Self::new(base_length)
    }

    /// Element count of every level, base first, ending with 1.
    pub fn levels(&self) -> &[u32] {
        &self.levels
    }

    /// Reduction passes in execution order.
    pub fn passes(&self) -> &[ReductionPass] {
        &self.passes
    }

    /// Total elements in each scratch buffer.
    pub fn array_length(&self) -> u32 {
        self.array_length
    }

    /// Index of the fully reduced element.
    pub fn final_index(&self) -> u32 {
        self.array_length - 1
    }

    /// Number of un-reduced samples.
    pub fn base_length(&self) -> u32 {
        self.levels[0]
    }
}

fn too_long(base_length: u32) -> GraphicsError {
    GraphicsError::InvalidParameter(format!("SH reduction of {base_length} samples overflows u32"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometric_sum(base: u64) -> u64 {
        let mut sum = 0;
        let mut term = base;
        loop {
            sum += term;
            if term <= 1 {
                return sum;
            }
            term /= u64::from(SH_REDUCE_SEGMENT_SIZE);
        }
    }

    #[test]
    fn test_group_count() {
        assert_eq!(group_count(0, 8), 1);
        assert_eq!(group_count(1, 8), 1);
        assert_eq!(group_count(8, 8), 1);
        assert_eq!(group_count(9, 8), 2);
        assert_eq!(group_count(2048, 8), 256);
    }

    #[test]
    fn test_quality_tier_array_lengths() {
        for edge in [512u32, 1024, 2048] {
            let plan = ShReductionPlan::for_edge(edge).unwrap();
            let base = u64::from(edge) * u64::from(edge);
            assert_eq!(u64::from(plan.array_length()), geometric_sum(base));
            assert_eq!(*plan.levels().last().unwrap(), 1);
        }
    }

    #[test]
    fn test_pass_count_is_log_segment() {
        // 512^2 = 4^9, 1024^2 = 4^10, 2048^2 = 4^11
        assert_eq!(ShReductionPlan::for_edge(512).unwrap().passes().len(), 9);
        assert_eq!(ShReductionPlan::for_edge(1024).unwrap().passes().len(), 10);
        assert_eq!(ShReductionPlan::for_edge(2048).unwrap().passes().len(), 11);
    }

    #[test]
    fn test_passes_chain() {
        let plan = ShReductionPlan::for_edge(16).unwrap();
        let mut expected_head = 0;
        for pass in plan.passes() {
            assert_eq!(pass.head_index, expected_head);
            assert!(pass.tail_index > pass.head_index);
            expected_head = pass.tail_index;
        }
        let last = plan.passes().last().unwrap();
        assert_eq!(last.output_length, 1);
        assert_eq!(last.tail_index, plan.final_index());
    }

    #[test]
    fn test_non_power_lengths_reach_one() {
        for edge in [3u32, 5, 12, 100] {
            let plan = ShReductionPlan::for_edge(edge).unwrap();
            let mut length = edge * edge;
            for pass in plan.passes() {
                assert_eq!(pass.tail_index - pass.head_index, length);
                length = pass.output_length;
            }
            assert_eq!(length, 1);
            assert_eq!(plan.array_length(), plan.levels().iter().sum::<u32>());
        }
    }

    #[test]
    fn test_oversized_lengths_rejected() {
        assert!(matches!(ShReductionPlan::for_edge(65536), Err(GraphicsError::InvalidParameter(_))));
        // 60000² fits in u32 but the levels summed do not
        assert!(60000u32.checked_mul(60000).is_some());
        assert!(matches!(ShReductionPlan::for_edge(60000), Err(GraphicsError::InvalidParameter(_))));
        assert!(ShReductionPlan::for_edge(MAX_CUBE_EDGE).is_ok());
    }

    #[test]
    fn test_single_sample() {
        let plan = ShReductionPlan::new(1).unwrap();
        assert!(plan.passes().is_empty());
        assert_eq!(plan.array_length(), 1);
        assert_eq!(plan.final_index(), 0);
    }
}
