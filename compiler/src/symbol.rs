// symbol.rs — Top-level symbol table
//
// Indexes the module body's symbol-defining operations (those carrying a
// string `sym_name`) by name. References elsewhere in the IR are plain names
// (`@f`) resolved through this table; nothing owns a callee.
//
// Preconditions: `module` is the module the table is queried against.
// Postconditions: the first definition of a name wins; later duplicates are
//   reported by `verify` and ignored here.
// Failure modes: none (unknown names resolve to `None`).
// Side effects: none.

use std::collections::HashMap;

use crate::id::{OpId, RegionId};
use crate::ir::{Module, FUNC_OP};

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, OpId>,
}

impl SymbolTable {
    /// Index the top-level symbols of `module`.
    pub fn build(module: &Module) -> Self {
        let mut symbols = HashMap::new();
        for &op in &module.region(module.body()).ops {
            if let Some(name) = module.op(op).symbol_name() {
                symbols.entry(name.to_string()).or_insert(op);
            }
        }
        SymbolTable { symbols }
    }

    pub fn lookup(&self, name: &str) -> Option<OpId> {
        self.symbols.get(name).copied()
    }

    /// Body of the function named `name`. `None` when the name is unknown,
    /// names a non-function symbol, or names an external declaration.
    pub fn lookup_function(&self, module: &Module, name: &str) -> Option<(OpId, RegionId)> {
        let op = self.lookup(name)?;
        let data = module.try_op(op)?;
        if data.name != FUNC_OP {
            return None;
        }
        data.regions.first().map(|&body| (op, body))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Every symbol name referenced by attributes of operations in `region`,
/// including nested regions and nested arrays, in walk order.
pub fn symbol_uses(module: &Module, region: RegionId) -> Vec<String> {
    let mut names = Vec::new();
    for op in module.ops_pre_order(region) {
        for attr in module.op(op).attributes.values() {
            attr.for_each_symbol_ref(&mut |name| names.push(name.to_string()));
        }
    }
    names
}
