// propagate.rs — Device attribute propagation
//
// Pre-order walk over a region and its nested regions that gives every
// matching operation the launch's device. An operation matches when it
// belongs to the target dialect or is on the structural allow-list.
// Non-matching operations are skipped but their regions are still walked.
//
// Preconditions: `scope` is the launch whose device is being propagated.
// Postconditions: on success every matching operation in `region` carries
//   `device`; returns how many operations were assigned.
// Failure modes: a matching operation with a different non-empty device
//   (`AttributeConflict`) or a non-string device (`MalformedAttribute`) stops
//   the walk. Assignments made before the failure are kept.
// Side effects: sets the device attribute on matching operations.

use std::ops::ControlFlow;

use crate::config::PassOptions;
use crate::hoist::HoistError;
use crate::id::{OpId, RegionId};
use crate::ir::{Attribute, Module, Operation};

/// Decides which operations take a device, and under which key.
#[derive(Debug, Clone, Copy)]
pub struct DeviceMatcher<'a> {
    options: &'a PassOptions,
}

impl<'a> DeviceMatcher<'a> {
    pub fn new(options: &'a PassOptions) -> Self {
        DeviceMatcher { options }
    }

    pub fn matches(&self, op: &Operation) -> bool {
        op.dialect() == self.options.target_dialect || self.options.is_structural(&op.name)
    }

    pub fn device_attr(&self) -> &'a str {
        &self.options.device_attr
    }
}

/// Assign `device` to every matching operation under `region`.
pub fn propagate(
    module: &mut Module,
    matcher: &DeviceMatcher<'_>,
    scope: OpId,
    device: &str,
    region: RegionId,
) -> Result<usize, HoistError> {
    let mut assigned = 0;
    let flow = module.walk_mut(region, &mut |module, op| {
        match annotate(module, matcher, scope, device, op) {
            Ok(true) => {
                assigned += 1;
                ControlFlow::Continue(())
            }
            Ok(false) => ControlFlow::Continue(()),
            Err(err) => ControlFlow::Break(err),
        }
    });
    match flow {
        ControlFlow::Continue(()) => Ok(assigned),
        ControlFlow::Break(err) => Err(err),
    }
}

/// Returns whether the attribute was written.
fn annotate(
    module: &mut Module,
    matcher: &DeviceMatcher<'_>,
    scope: OpId,
    device: &str,
    op: OpId,
) -> Result<bool, HoistError> {
    let data = module.op(op);
    if !matcher.matches(data) {
        return Ok(false);
    }
    match data.attr(matcher.device_attr()) {
        None => {}
        Some(Attribute::Str(current)) if current.is_empty() => {}
        Some(Attribute::Str(current)) if current == device => return Ok(false),
        Some(Attribute::Str(current)) => {
            return Err(HoistError::AttributeConflict {
                scope,
                op,
                op_name: data.name.clone(),
                attr: matcher.device_attr().to_string(),
                found: current.clone(),
                expected: device.to_string(),
            })
        }
        Some(other) => {
            return Err(HoistError::MalformedAttribute {
                scope,
                op,
                op_name: data.name.clone(),
                attr: matcher.device_attr().to_string(),
                found: other.clone(),
            })
        }
    }
    module.set_attr(op, matcher.device_attr(), Attribute::Str(device.to_string()));
    Ok(true)
}
