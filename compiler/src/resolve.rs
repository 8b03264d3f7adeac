// resolve.rs — SSA name resolution: AST → IR module
//
// Walks the parsed AST, binds every `%name` reference to an arena value and
// builds the operation graph. Names are lexically scoped per region; `func`
// bodies start from an empty scope and cannot see values of the enclosing
// region.
//
// Preconditions: `ast` is a well-formed AST from the parser.
// Postconditions: returns a module holding every item of the AST, plus all
//                 accumulated diagnostics.
// Failure modes: undefined values, redefinitions, bad result indices and
//                duplicate attribute keys produce `Diagnostic` entries.
//                Unresolvable operands are dropped from their operation.
//                Resolution continues past errors.
// Side effects: none.

use std::collections::{BTreeMap, HashMap};

use crate::ast::*;
use crate::diag::{codes, DiagCode, Diagnostic};
use crate::id::{RegionId, ValueId};
use crate::ir::{Attribute, Module, OperationState, FUNC_OP, SYM_NAME_ATTR};

// ── Public types ────────────────────────────────────────────────────────────

/// Result of name resolution.
#[derive(Debug)]
pub struct ResolveResult {
    pub module: Module,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Resolve all value names of a parsed module and build its IR.
pub fn resolve(ast: &ModuleAst) -> ResolveResult {
    let mut ctx = ResolveCtx::new();
    let body = ctx.module.body();
    ctx.resolve_items(body, &ast.items);
    ResolveResult {
        module: ctx.module,
        diagnostics: ctx.diagnostics,
    }
}

// ── Internal context ────────────────────────────────────────────────────────

/// Names defined in one region: name → result group.
type Scope = HashMap<String, Vec<ValueId>>;

struct ResolveCtx {
    module: Module,
    /// Innermost scope last.
    scopes: Vec<Scope>,
    diagnostics: Vec<Diagnostic>,
}

impl ResolveCtx {
    fn new() -> Self {
        ResolveCtx {
            module: Module::new(),
            scopes: vec![Scope::new()],
            diagnostics: Vec::new(),
        }
    }

    fn error(&mut self, span: Span, code: DiagCode, message: String) {
        self.diagnostics
            .push(Diagnostic::error(Some(span), message).with_code(code));
    }

    fn lookup(&self, name: &str) -> Option<Vec<ValueId>> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
    }

    fn define(&mut self, name: &Ident, values: Vec<ValueId>) {
        if self.lookup(&name.name).is_some() {
            self.error(
                name.span,
                codes::E0002,
                format!("value '%{}' is already defined", name.name),
            );
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.name.clone(), values);
        }
    }

    // ── Items ───────────────────────────────────────────────────────────

    fn resolve_items(&mut self, region: RegionId, items: &[Item]) {
        for item in items {
            match item {
                Item::Op(op) => self.resolve_op(region, op),
                Item::Func(func) => self.resolve_func(region, func),
            }
        }
    }

    fn resolve_op(&mut self, region: RegionId, op: &OpAst) {
        let operands: Vec<ValueId> = op
            .operands
            .iter()
            .filter_map(|operand| self.resolve_operand(operand))
            .collect();
        let num_results = op.results.iter().map(|def| def.count as usize).sum();

        let mut state = OperationState::new(&op.name)
            .operands(operands)
            .results(num_results)
            .regions(op.regions.len())
            .span(op.span);
        self.collect_attributes(&op.attributes, &mut state.attributes);
        let id = self.module.append_op(region, state);

        let regions = self.module.op(id).regions.clone();
        for (region_id, region_ast) in regions.into_iter().zip(&op.regions) {
            self.scopes.push(Scope::new());
            for arg in &region_ast.args {
                let value = self.module.add_region_arg(region_id);
                self.define(arg, vec![value]);
            }
            self.resolve_items(region_id, &region_ast.items);
            self.scopes.pop();
        }

        // Results become visible after the operation's own regions.
        let results = self.module.op(id).results.clone();
        let mut offset = 0;
        for def in &op.results {
            let count = def.count as usize;
            self.define(&def.name, results[offset..offset + count].to_vec());
            offset += count;
        }
    }

    fn resolve_func(&mut self, region: RegionId, func: &FuncAst) {
        let mut state = OperationState::new(FUNC_OP)
            .attr(SYM_NAME_ATTR, Attribute::Str(func.name.name.clone()))
            .regions(usize::from(func.body.is_some()))
            .span(func.span);
        self.collect_attributes(&func.attributes, &mut state.attributes);
        let id = self.module.append_op(region, state);

        let Some(body) = &func.body else {
            return;
        };
        if !body.args.is_empty() {
            self.error(
                body.span,
                codes::E0005,
                format!(
                    "body of func @{} declares region arguments",
                    func.name.name
                ),
            );
        }
        let body_region = self.module.op(id).regions[0];
        let outer = std::mem::replace(&mut self.scopes, vec![Scope::new()]);
        for param in &func.params {
            let value = self.module.add_region_arg(body_region);
            self.define(param, vec![value]);
        }
        self.resolve_items(body_region, &body.items);
        self.scopes = outer;
    }

    // ── Operands and attributes ─────────────────────────────────────────

    fn resolve_operand(&mut self, operand: &ValueRef) -> Option<ValueId> {
        let name = &operand.name.name;
        let Some(group) = self.lookup(name) else {
            self.error(
                operand.span,
                codes::E0001,
                format!("use of undefined value '%{name}'"),
            );
            return None;
        };
        match operand.index {
            None if group.len() == 1 => Some(group[0]),
            None => {
                self.error(
                    operand.span,
                    codes::E0003,
                    format!(
                        "value '%{name}' has {} results; select one with '#N'",
                        group.len()
                    ),
                );
                None
            }
            Some(index) => match group.get(index as usize) {
                Some(&value) => Some(value),
                None => {
                    self.error(
                        operand.span,
                        codes::E0003,
                        format!(
                            "result index #{index} is out of range for '%{name}' with {} results",
                            group.len()
                        ),
                    );
                    None
                }
            },
        }
    }

    fn collect_attributes(
        &mut self,
        entries: &[AttrEntry],
        into: &mut BTreeMap<String, Attribute>,
    ) {
        for entry in entries {
            if into.contains_key(&entry.key.name) {
                self.error(
                    entry.key.span,
                    codes::E0004,
                    format!("duplicate attribute '{}'", entry.key.name),
                );
                continue;
            }
            into.insert(entry.key.name.clone(), entry.value.clone());
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
