// hoist.rs — Launch hoisting and the module driver
//
// Dissolves every device launch in a module. For each launch: validate its
// shape, collect the functions reachable from its body, forward its results
// to the values its terminator yields, propagate its device into the body
// and the reachable functions, splice the body in front of the launch and
// erase the launch.
//
// Preconditions: `module` passed verification; the symbol table was built
//   from `module`.
// Postconditions: on success no launch remains; each former body operation
//   (terminator excluded) sits where its launch was, in original order, and
//   every former use of a launch result uses the matching yielded value.
// Failure modes: `MissingDependency` (target dialect not loaded, module
//   untouched), `MalformedScope` (bad launch shape, that launch untouched),
//   `AttributeConflict` / `MalformedAttribute` (propagation stopped). The
//   driver stops at the first failure; earlier hoists and partial device
//   assignments are kept.
// Side effects: mutates `module`; logs through `log`.

use std::fmt;

use serde::Serialize;

use crate::config::PassOptions;
use crate::diag::{codes, Diagnostic};
use crate::id::{OpId, RegionId};
use crate::ir::{Attribute, Context, IrError, Module};
use crate::propagate::{propagate, DeviceMatcher};
use crate::reachability::collect_reachable;
use crate::symbol::SymbolTable;

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoistError {
    /// The target dialect is not loaded in the context.
    MissingDependency { dialect: String },
    /// An inner operation already carries a different device.
    AttributeConflict {
        scope: OpId,
        op: OpId,
        op_name: String,
        attr: String,
        found: String,
        expected: String,
    },
    /// A device attribute that is not a string.
    MalformedAttribute {
        scope: OpId,
        op: OpId,
        op_name: String,
        attr: String,
        found: Attribute,
    },
    /// The launch does not have one region ending in its terminator with
    /// one yielded value per result.
    MalformedScope { scope: OpId, message: String },
    /// A structural primitive rejected the rewrite.
    Ir { scope: OpId, source: IrError },
}

impl HoistError {
    /// Operation the diagnostic points at, if any.
    pub fn op(&self) -> Option<OpId> {
        match self {
            HoistError::MissingDependency { .. } => None,
            HoistError::AttributeConflict { op, .. } | HoistError::MalformedAttribute { op, .. } => {
                Some(*op)
            }
            HoistError::MalformedScope { scope, .. } | HoistError::Ir { scope, .. } => Some(*scope),
        }
    }

    fn scope(&self) -> Option<OpId> {
        match self {
            HoistError::MissingDependency { .. } => None,
            HoistError::AttributeConflict { scope, .. }
            | HoistError::MalformedAttribute { scope, .. }
            | HoistError::MalformedScope { scope, .. }
            | HoistError::Ir { scope, .. } => Some(*scope),
        }
    }

    /// Diagnostic with spans taken from `module`.
    pub fn to_diagnostic(&self, module: &Module) -> Diagnostic {
        let span_of = |op: Option<OpId>| op.and_then(|op| module.try_op(op)).and_then(|o| o.span);
        let mut diag = Diagnostic::error(span_of(self.op()), self.to_string());
        diag = match self {
            HoistError::MissingDependency { dialect } => diag
                .with_code(codes::E0200)
                .with_hint(format!("load the '{dialect}' dialect before running the pass")),
            HoistError::AttributeConflict { attr, .. } => diag
                .with_code(codes::E0201)
                .with_hint(format!(
                    "remove the inner '{attr}' attribute or make it match the launch"
                )),
            HoistError::MalformedAttribute { attr, .. } => diag
                .with_code(codes::E0202)
                .with_hint(format!("'{attr}' must be a string attribute")),
            HoistError::MalformedScope { .. } => diag.with_code(codes::E0203),
            HoistError::Ir { .. } => diag.with_code(codes::E0204),
        };
        if self.scope() != self.op() {
            diag = diag.with_related(span_of(self.scope()), "device launch is here");
        }
        diag
    }
}

impl fmt::Display for HoistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoistError::MissingDependency { dialect } => {
                write!(f, "dialect '{dialect}' is not loaded")
            }
            HoistError::AttributeConflict {
                op_name,
                attr,
                found,
                expected,
                ..
            } => write!(
                f,
                "inner op '{op_name}' has conflicting '{attr}' attribute, got '{found}' but expected '{expected}'"
            ),
            HoistError::MalformedAttribute {
                op_name,
                attr,
                found,
                ..
            } => write!(f, "inner op '{op_name}' has bad '{attr}' attribute, got {found}"),
            HoistError::MalformedScope { message, .. } => write!(f, "malformed launch: {message}"),
            HoistError::Ir { source, .. } => write!(f, "cannot hoist launch: {source}"),
        }
    }
}

impl std::error::Error for HoistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HoistError::Ir { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ── Reports ─────────────────────────────────────────────────────────────────

/// Outcome of hoisting one launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeReport {
    pub device: String,
    /// Body operations moved out, terminator excluded.
    pub moved_ops: usize,
    pub forwarded_results: usize,
    /// Operands redirected from launch results to yielded values.
    pub rewired_uses: usize,
    /// Operations whose device was written, in the body and in reachable functions.
    pub annotated_ops: usize,
    /// Functions reached from the body, in discovery order.
    pub subroutines: Vec<String>,
}

/// Outcome of one driver run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub pass: &'static str,
    pub scopes: Vec<ScopeReport>,
}

impl PassReport {
    pub fn new(pass: &'static str) -> Self {
        PassReport {
            pass,
            scopes: Vec::new(),
        }
    }

    pub fn moved_ops(&self) -> usize {
        self.scopes.iter().map(|s| s.moved_ops).sum()
    }

    pub fn annotated_ops(&self) -> usize {
        self.scopes.iter().map(|s| s.annotated_ops).sum()
    }

    /// Pretty JSON for `--emit report`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}

// ── Driver ──────────────────────────────────────────────────────────────────

/// Registry identifier of the pass.
pub const PASS_ARGUMENT: &str = "tf-launch-to-device-attribute";

/// Hoist every launch in `module`, innermost first.
pub fn run_launch_to_device_attribute(
    ctx: &Context,
    module: &mut Module,
    options: &PassOptions,
) -> Result<PassReport, HoistError> {
    if !ctx.is_dialect_loaded(&options.target_dialect) {
        return Err(HoistError::MissingDependency {
            dialect: options.target_dialect.clone(),
        });
    }

    let symbols = SymbolTable::build(module);
    let scopes: Vec<OpId> = module
        .ops_post_order(module.body())
        .into_iter()
        .filter(|&op| module.op(op).name == options.scope_op)
        .collect();
    log::debug!(
        "{PASS_ARGUMENT}: {} launch op(s), {} symbol(s)",
        scopes.len(),
        symbols.len()
    );

    let mut report = PassReport::new(PASS_ARGUMENT);
    for scope in scopes {
        report
            .scopes
            .push(hoist_scope(module, &symbols, options, scope)?);
    }
    log::info!(
        "{PASS_ARGUMENT}: hoisted {} launch op(s), moved {} op(s), annotated {} op(s)",
        report.scopes.len(),
        report.moved_ops(),
        report.annotated_ops()
    );
    Ok(report)
}

// ── Hoister ─────────────────────────────────────────────────────────────────

struct ScopeShape {
    region: RegionId,
    terminator: OpId,
    device: String,
}

/// Hoist a single launch.
pub fn hoist_scope(
    module: &mut Module,
    symbols: &SymbolTable,
    options: &PassOptions,
    scope: OpId,
) -> Result<ScopeReport, HoistError> {
    let ScopeShape {
        region,
        terminator,
        device,
    } = check_shape(module, options, scope)?;

    let subroutines = collect_reachable(module, symbols, region);

    let results = module.op(scope).results.clone();
    let yielded = module.op(terminator).operands.clone();
    let mut rewired_uses = 0;
    for (&result, &value) in results.iter().zip(&yielded) {
        rewired_uses += module.replace_all_uses_with(result, value);
    }

    let matcher = DeviceMatcher::new(options);
    let mut annotated_ops = propagate(module, &matcher, scope, &device, region)?;
    for sub in &subroutines {
        annotated_ops += propagate(module, &matcher, scope, &device, sub.body)?;
    }

    let ir_err = |source| HoistError::Ir { scope, source };
    module.erase_op(terminator).map_err(ir_err)?;
    let len = module.region(region).ops.len();
    let moved_ops = module.splice_before(scope, region, 0..len).map_err(ir_err)?;
    module.erase_op(scope).map_err(ir_err)?;

    log::debug!(
        "hoisted {scope} on '{device}': {moved_ops} op(s) moved, {} result(s) forwarded, {} function(s) reached",
        results.len(),
        subroutines.len()
    );
    Ok(ScopeReport {
        device,
        moved_ops,
        forwarded_results: results.len(),
        rewired_uses,
        annotated_ops,
        subroutines: subroutines.into_iter().map(|s| s.name).collect(),
    })
}

fn check_shape(
    module: &Module,
    options: &PassOptions,
    scope: OpId,
) -> Result<ScopeShape, HoistError> {
    let malformed = |message: String| HoistError::MalformedScope { scope, message };
    let op = module.op(scope);

    let &[region] = op.regions.as_slice() else {
        return Err(malformed(format!(
            "expected exactly one region, found {}",
            op.regions.len()
        )));
    };
    if !module.region(region).args.is_empty() {
        return Err(malformed("body must not have arguments".to_string()));
    }
    let terminator = module
        .terminator(region)
        .filter(|&t| module.op(t).name == options.terminator_op)
        .ok_or_else(|| malformed(format!("body must end with '{}'", options.terminator_op)))?;
    let yielded = module.op(terminator).operands.len();
    if yielded != op.results.len() {
        return Err(malformed(format!(
            "'{}' yields {yielded} value(s) but the launch has {} result(s)",
            options.terminator_op,
            op.results.len()
        )));
    }

    let device = match op.attr(&options.device_attr) {
        None => String::new(),
        Some(Attribute::Str(device)) => device.clone(),
        Some(other) => {
            return Err(HoistError::MalformedAttribute {
                scope,
                op: scope,
                op_name: op.name.clone(),
                attr: options.device_attr.clone(),
                found: other.clone(),
            })
        }
    };

    Ok(ScopeShape {
        region,
        terminator,
        device,
    })
}
