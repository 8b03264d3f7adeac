// verify.rs — Structural verification of an IR module
//
// Checks the invariants every pass relies on and that the hoisting pass must
// preserve. Run before and after the transformation by the pipeline.
//
// Preconditions: none.
// Postconditions: `VerifyResult.cert` records each obligation; one diagnostic
//   is produced per violation found.
// Failure modes: none (violations are reported, not raised).
// Side effects: none.

use std::collections::{HashMap, HashSet};

use crate::diag::{codes, Diagnostic};
use crate::id::OpId;
use crate::ir::{Context, Module, OpOperand};
use crate::pass::StageCert;

/// Machine-checkable evidence for module well-formedness (V1-V4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyCert {
    /// V1: Terminators appear only as the last operation of their region.
    pub v1_terminators_last: bool,
    /// V2: Every operand refers to a live value.
    pub v2_operands_live: bool,
    /// V3: Use lists agree exactly with operand lists.
    pub v3_use_lists_consistent: bool,
    /// V4: Top-level symbol names are unique.
    pub v4_unique_symbols: bool,
}

impl StageCert for VerifyCert {
    fn all_pass(&self) -> bool {
        self.v1_terminators_last
            && self.v2_operands_live
            && self.v3_use_lists_consistent
            && self.v4_unique_symbols
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("V1_terminators_last", self.v1_terminators_last),
            ("V2_operands_live", self.v2_operands_live),
            ("V3_use_lists_consistent", self.v3_use_lists_consistent),
            ("V4_unique_symbols", self.v4_unique_symbols),
        ]
    }
}

#[derive(Debug)]
pub struct VerifyResult {
    pub cert: VerifyCert,
    pub diagnostics: Vec<Diagnostic>,
}

/// Verify `module` against the terminators registered in `ctx`.
pub fn verify_module(ctx: &Context, module: &Module) -> VerifyResult {
    let mut diagnostics = Vec::new();
    let cert = VerifyCert {
        v1_terminators_last: verify_v1_terminators_last(ctx, module, &mut diagnostics),
        v2_operands_live: verify_v2_operands_live(module, &mut diagnostics),
        v3_use_lists_consistent: verify_v3_use_lists(module, &mut diagnostics),
        v4_unique_symbols: verify_v4_unique_symbols(module, &mut diagnostics),
    };
    VerifyResult { cert, diagnostics }
}

fn error_at(module: &Module, op: OpId, message: String) -> Diagnostic {
    Diagnostic::error(module.op(op).span, message)
}

/// V1: Walk each region; a terminator anywhere but last is a violation.
fn verify_v1_terminators_last(ctx: &Context, module: &Module, diags: &mut Vec<Diagnostic>) -> bool {
    let mut ok = true;
    for region in module.live_regions() {
        let ops = &module.region(region).ops;
        for (i, &op) in ops.iter().enumerate() {
            let name = &module.op(op).name;
            if ctx.is_terminator(name) && i + 1 != ops.len() {
                ok = false;
                diags.push(
                    error_at(
                        module,
                        op,
                        format!("terminator '{name}' must be the last operation of its region"),
                    )
                    .with_code(codes::E0100),
                );
            }
        }
    }
    ok
}

/// V2: Every operand of every live operation names a live value.
fn verify_v2_operands_live(module: &Module, diags: &mut Vec<Diagnostic>) -> bool {
    let mut ok = true;
    for op in module.live_ops() {
        for (index, &value) in module.op(op).operands.iter().enumerate() {
            if module.try_value(value).is_none() {
                ok = false;
                diags.push(
                    error_at(
                        module,
                        op,
                        format!(
                            "operand #{index} of '{}' refers to erased {value}",
                            module.op(op).name
                        ),
                    )
                    .with_code(codes::E0101),
                );
            }
        }
    }
    ok
}

/// V3: The recorded uses of every value equal the operand slots naming it.
fn verify_v3_use_lists(module: &Module, diags: &mut Vec<Diagnostic>) -> bool {
    let mut expected: HashMap<_, HashSet<OpOperand>> = HashMap::new();
    for op in module.live_ops() {
        for (index, &value) in module.op(op).operands.iter().enumerate() {
            expected
                .entry(value)
                .or_default()
                .insert(OpOperand { op, index });
        }
    }

    let mut ok = true;
    for value in module.live_values() {
        let uses = module.uses(value);
        let recorded: HashSet<OpOperand> = uses.iter().copied().collect();
        let operands = expected.remove(&value).unwrap_or_default();
        if recorded != operands || recorded.len() != uses.len() {
            ok = false;
            diags.push(
                Diagnostic::error(
                    None,
                    format!(
                        "use list of {value} has {} entries but {} operands refer to it",
                        uses.len(),
                        operands.len()
                    ),
                )
                .with_code(codes::E0102),
            );
        }
    }
    ok
}

/// V4: No two operations in the module body share a `sym_name`.
fn verify_v4_unique_symbols(module: &Module, diags: &mut Vec<Diagnostic>) -> bool {
    let mut seen: HashMap<&str, OpId> = HashMap::new();
    let mut ok = true;
    for &op in &module.region(module.body()).ops {
        let Some(name) = module.op(op).symbol_name() else {
            continue;
        };
        if let Some(&first) = seen.get(name) {
            ok = false;
            diags.push(
                error_at(module, op, format!("redefinition of symbol '@{name}'"))
                    .with_code(codes::E0103)
                    .with_related(module.op(first).span, "first defined here"),
            );
        } else {
            seen.insert(name, op);
        }
    }
    ok
}
