// pass.rs — Pass descriptor module: metadata, dependency resolution, lookup
//
// Declares the passes the runner knows about (parse is outside the runner),
// their dependency edges, and the artifacts they produce. Used by the pipeline
// runner to compute the minimal pass list for a terminal pass, and by the CLI
// to find a pass by its registry identifier.

use std::collections::HashSet;

// ── Pass and Artifact identifiers ──────────────────────────────────────────

/// Identifies each pass. Parsing happens before the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    Resolve,
    Verify,
    LaunchToDeviceAttribute,
}

/// Machine-readable artifact identifiers. Each maps to a concrete type
/// in the compilation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Module,     // ir::Module
    VerifyCert, // verify::VerifyCert
    Report,     // hoist::PassReport
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about a pass.
pub struct PassDescriptor {
    /// Short name for verbose output.
    pub name: &'static str,
    /// Registry identifier accepted by `--pass`.
    pub argument: &'static str,
    /// One-line summary shown by `--list-passes`.
    pub description: &'static str,
    /// Pass dependencies (other passes whose outputs this pass consumes).
    pub inputs: &'static [PassId],
    /// Artifacts this pass produces.
    pub outputs: &'static [ArtifactId],
    /// Pre/post conditions (documentation only).
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::Resolve => PassDescriptor {
            name: "resolve",
            argument: "resolve",
            description: "Binds SSA names and builds the IR module",
            inputs: &[],
            outputs: &[ArtifactId::Module],
            invariants: "every operand bound to a value in scope",
        },
        PassId::Verify => PassDescriptor {
            name: "verify",
            argument: "verify",
            description: "Checks terminator placement, operand liveness, use lists and symbols",
            inputs: &[PassId::Resolve],
            outputs: &[ArtifactId::VerifyCert],
            invariants: "V1-V4 obligations hold",
        },
        PassId::LaunchToDeviceAttribute => PassDescriptor {
            name: "launch_to_device_attribute",
            argument: crate::hoist::PASS_ARGUMENT,
            description: "Hoists and annotates device launch inner ops with associated device attribute",
            inputs: &[PassId::Verify],
            outputs: &[ArtifactId::Module, ArtifactId::Report, ArtifactId::VerifyCert],
            invariants: "no launch remains, V1-V4 still hold",
        },
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All pass IDs in declaration order (used for iteration).
pub const ALL_PASSES: [PassId; 3] = [
    PassId::Resolve,
    PassId::Verify,
    PassId::LaunchToDeviceAttribute,
];

/// Compute the minimal ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

/// Find a pass by its registry identifier.
pub fn lookup(argument: &str) -> Option<PassId> {
    ALL_PASSES
        .into_iter()
        .find(|&id| descriptor(id).argument == argument)
}

// ── Verification certificates ──────────────────────────────────────────────

/// Machine-checkable evidence that a stage's postconditions hold.
pub trait StageCert {
    /// True if all obligations pass.
    fn all_pass(&self) -> bool;

    /// Every obligation by name, with its outcome.
    fn obligations(&self) -> Vec<(&'static str, bool)>;

    /// Names of the obligations that do not hold.
    fn failed(&self) -> Vec<&'static str> {
        self.obligations()
            .into_iter()
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| name)
            .collect()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
