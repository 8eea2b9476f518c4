//! Resolves recorded commands into self-contained operations.
//!
//! Backends never see raw handles: every dispatch carries its pipeline, the
//! root constants and the views its descriptor tables point at, captured at
//! execution time.

use std::sync::Arc;

use super::{Command, ResourceBarrier};
use crate::descriptor::{DescriptorHeap, ResourceView};
use crate::error::GraphicsError;
use crate::pipeline::{ComputePipeline, RootParameter};

/// A dispatch with all of its bindings resolved.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedDispatch {
    pub pipeline: Arc<ComputePipeline>,
    /// Root constants, zero-filled to the declared count. Empty without a constants parameter.
    pub constants: Vec<u32>,
    /// View bound to each root parameter; `None` for the constants parameter.
    pub tables: Vec<Option<ResourceView>>,
    pub groups: [u32; 3],
}

impl ResolvedDispatch {
    /// Views bound to descriptor tables with their root parameter index.
    pub fn views(&self) -> impl Iterator<Item = (u32, &ResourceView)> {
        self.tables
            .iter()
            .enumerate()
            .filter_map(|(index, view)| view.as_ref().map(|view| (index as u32, view)))
    }

    pub fn label(&self) -> &str {
        self.pipeline.label().unwrap_or(self.pipeline.entry_point())
    }
}

/// One operation for a backend to execute.
#[derive(Debug, Clone)]
pub(crate) enum ReplayOp {
    Barrier(Vec<ResourceBarrier>),
    Dispatch(ResolvedDispatch),
}

#[derive(Default)]
struct BindingState {
    heap: Option<Arc<DescriptorHeap>>,
    pipeline: Option<Arc<ComputePipeline>>,
    constants: Vec<u32>,
    tables: Vec<Option<ResourceView>>,
}

fn failed(label: Option<&str>, index: usize, reason: impl std::fmt::Display) -> GraphicsError {
    log::error!("CommandList {label:?}: command {index}: {reason}");
    GraphicsError::ExecutionFailed(format!("command {index}: {reason}"))
}

/// Resolve every command of a list.
///
/// Setting a pipeline clears the bound root arguments.
pub(crate) fn resolve(label: Option<&str>, commands: &[Command]) -> Result<Vec<ReplayOp>, GraphicsError> {
    let mut state = BindingState::default();
    let mut ops = Vec::new();

    for (index, command) in commands.iter().enumerate() {
        match command {
            Command::SetDescriptorHeap(heap) => {
                state.heap = Some(Arc::clone(heap));
            }
            Command::SetPipeline(pipeline) => {
                let parameters = pipeline.root_signature().parameters().len();
                state.constants = pipeline
                    .root_signature()
                    .constants_parameter()
                    .map(|(_, count)| vec![0; count as usize])
                    .unwrap_or_default();
                state.tables = vec![None; parameters];
                state.pipeline = Some(Arc::clone(pipeline));
            }
            Command::SetRootConstants { parameter, values } => {
                let pipeline = state
                    .pipeline
                    .as_ref()
                    .ok_or_else(|| failed(label, index, "root constants set without a pipeline"))?;
                match pipeline.root_signature().constants_parameter() {
                    Some((constants_index, count)) if constants_index == *parameter => {
                        if values.len() > count as usize {
                            return Err(failed(
                                label,
                                index,
                                format!("{} root constants exceed the declared {count}", values.len()),
                            ));
                        }
                        state.constants[..values.len()].copy_from_slice(values);
                    }
                    _ => {
                        return Err(failed(
                            label,
                            index,
                            format!("root parameter {parameter} is not a constants parameter"),
                        ));
                    }
                }
            }
            Command::SetDescriptorTable { parameter, handle } => {
                let pipeline = state
                    .pipeline
                    .as_ref()
                    .ok_or_else(|| failed(label, index, "descriptor table set without a pipeline"))?;
                let heap = state
                    .heap
                    .as_ref()
                    .ok_or_else(|| failed(label, index, "descriptor table set without a descriptor heap"))?;
                let range = match pipeline.root_signature().parameters().get(*parameter as usize) {
                    Some(RootParameter::DescriptorTable(range)) => *range,
                    _ => {
                        return Err(failed(
                            label,
                            index,
                            format!("root parameter {parameter} is not a descriptor table"),
                        ));
                    }
                };
                let view = heap.resolve(*handle).map_err(|e| failed(label, index, e))?;
                if !range.accepts(&view) {
                    return Err(failed(
                        label,
                        index,
                        format!("view {view:?} does not match range {range:?} of parameter {parameter}"),
                    ));
                }
                state.tables[*parameter as usize] = Some(view);
            }
            Command::Dispatch { x, y, z } => {
                let pipeline = state
                    .pipeline
                    .as_ref()
                    .ok_or_else(|| failed(label, index, "dispatch without a pipeline"))?;
                for (parameter, root_parameter) in pipeline.root_signature().parameters().iter().enumerate() {
                    if matches!(root_parameter, RootParameter::DescriptorTable(_))
                        && state.tables[parameter].is_none()
                    {
                        return Err(failed(
                            label,
                            index,
                            format!("dispatch with descriptor table {parameter} unbound"),
                        ));
                    }
                }
                if *x == 0 || *y == 0 || *z == 0 {
                    log::warn!("CommandList {label:?}: command {index}: empty dispatch {x}x{y}x{z}");
                    continue;
                }
                ops.push(ReplayOp::Dispatch(ResolvedDispatch {
                    pipeline: Arc::clone(pipeline),
                    constants: state.constants.clone(),
                    tables: state.tables.clone(),
                    groups: [*x, *y, *z],
                }));
            }
            Command::Barrier(barriers) => {
                ops.push(ReplayOp::Barrier(barriers.clone()));
            }
        }
    }

    Ok(ops)
}
