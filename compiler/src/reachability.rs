// reachability.rs — Functions transitively referenced from a region
//
// Breadth-first closure over symbol references. The first frontier holds the
// functions named anywhere inside the region; each round scans the bodies of
// the current frontier for further references.
//
// Preconditions: `symbols` was built from `module`.
// Postconditions: every function whose body is reachable by following symbol
//   references from `region` appears exactly once, in discovery order.
// Failure modes: none. Names that do not resolve to a function with a body
//   are skipped.
// Side effects: none.

use std::collections::HashSet;

use crate::id::{OpId, RegionId};
use crate::ir::Module;
use crate::symbol::{symbol_uses, SymbolTable};

/// A function reached through a symbol reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subroutine {
    pub name: String,
    pub op: OpId,
    pub body: RegionId,
}

/// Collect every function reachable from `region`.
pub fn collect_reachable(
    module: &Module,
    symbols: &SymbolTable,
    region: RegionId,
) -> Vec<Subroutine> {
    let mut reached = Vec::new();
    let mut visited: HashSet<OpId> = HashSet::new();

    let mut frontier = discover(module, symbols, region, &mut visited);
    while !frontier.is_empty() {
        let mut next = Vec::new();
        for sub in &frontier {
            next.extend(discover(module, symbols, sub.body, &mut visited));
        }
        reached.append(&mut frontier);
        frontier = next;
    }
    reached
}

/// Unvisited functions named inside `region`; marks them visited.
fn discover(
    module: &Module,
    symbols: &SymbolTable,
    region: RegionId,
    visited: &mut HashSet<OpId>,
) -> Vec<Subroutine> {
    let mut found = Vec::new();
    for name in symbol_uses(module, region) {
        let Some((op, body)) = symbols.lookup_function(module, &name) else {
            continue;
        };
        if visited.insert(op) {
            found.push(Subroutine { name, op, body });
        }
    }
    found
}
