// ir.rs — Arena-backed operation / region / value graph
//
// The IR the hoisting pass operates on. Operations own regions, regions own
// an ordered operation list, and every value keeps an explicit use list so
// that `replace_all_uses_with` only touches the affected operands.
//
// Preconditions: ids passed to accessors refer to live (non-erased) entities.
// Postconditions: structural primitives either complete or return an
//   `IrError` with the module untouched.
// Failure modes: erasing an operation whose values are still used; moving an
//   operation into its own nested region; splicing around a detached anchor.
// Side effects: none.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::ops::{ControlFlow, Range};

use crate::ast::Span;
use crate::id::{OpId, RegionId, ValueId};

/// Operation name of symbol-defining functions.
pub const FUNC_OP: &str = "func.func";

/// Attribute carrying a symbol definition's name.
pub const SYM_NAME_ATTR: &str = "sym_name";

// ── Attributes ──────────────────────────────────────────────────────────────

/// Typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    Unit,
    Bool(bool),
    Int(i64),
    Str(String),
    /// Weak reference to a symbol by name (`@f`).
    SymbolRef(String),
    Array(Vec<Attribute>),
}

impl Attribute {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Attribute::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Visit every symbol reference, including those nested in arrays.
    pub fn for_each_symbol_ref<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            Attribute::SymbolRef(name) => f(name),
            Attribute::Array(items) => {
                for item in items {
                    item.for_each_symbol_ref(f);
                }
            }
            Attribute::Unit | Attribute::Bool(_) | Attribute::Int(_) | Attribute::Str(_) => {}
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Unit => write!(f, "unit"),
            Attribute::Bool(b) => write!(f, "{b}"),
            Attribute::Int(n) => write!(f, "{n}"),
            Attribute::Str(s) => write_escaped(f, s),
            Attribute::SymbolRef(name) => write!(f, "@{name}"),
            Attribute::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            _ => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

// ── Context ─────────────────────────────────────────────────────────────────

/// Loaded dialects and the operation names that terminate a region.
#[derive(Debug, Clone, Default)]
pub struct Context {
    dialects: BTreeSet<String>,
    terminators: BTreeSet<String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with the TensorFlow dialect family loaded.
    pub fn tensorflow() -> Self {
        let mut ctx = Context::new();
        for dialect in ["builtin", "func", "tf", "tf_device", "tf_executor"] {
            ctx.load_dialect(dialect);
        }
        for terminator in [
            "func.return",
            "tf_device.return",
            "tf_executor.yield",
            "tf_executor.fetch",
        ] {
            ctx.register_terminator(terminator);
        }
        ctx
    }

    pub fn load_dialect(&mut self, name: impl Into<String>) {
        self.dialects.insert(name.into());
    }

    pub fn is_dialect_loaded(&self, name: &str) -> bool {
        self.dialects.contains(name)
    }

    pub fn dialects(&self) -> impl Iterator<Item = &str> {
        self.dialects.iter().map(String::as_str)
    }

    pub fn register_terminator(&mut self, op_name: impl Into<String>) {
        self.terminators.insert(op_name.into());
    }

    pub fn is_terminator(&self, op_name: &str) -> bool {
        self.terminators.contains(op_name)
    }
}

// ── Graph entities ──────────────────────────────────────────────────────────

/// A use site: operand `index` of operation `op`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpOperand {
    pub op: OpId,
    pub index: usize,
}

/// Where a value is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    OpResult { op: OpId, index: usize },
    RegionArg { region: RegionId, index: usize },
}

#[derive(Debug, Clone)]
pub struct ValueData {
    pub def: ValueDef,
    uses: Vec<OpOperand>,
}

impl ValueData {
    pub fn uses(&self) -> &[OpOperand] {
        &self.uses
    }
}

/// An operation. Mutation goes through `Module` so use lists stay exact.
#[derive(Debug, Clone)]
pub struct Operation {
    pub name: String,
    pub operands: Vec<ValueId>,
    pub results: Vec<ValueId>,
    pub attributes: BTreeMap<String, Attribute>,
    pub regions: Vec<RegionId>,
    pub parent: Option<RegionId>,
    pub span: Option<Span>,
}

impl Operation {
    /// Dialect namespace: the part of the name before the first `.`.
    pub fn dialect(&self) -> &str {
        self.name
            .split_once('.')
            .map_or(self.name.as_str(), |(dialect, _)| dialect)
    }

    pub fn attr(&self, key: &str) -> Option<&Attribute> {
        self.attributes.get(key)
    }

    /// Name under `sym_name`, if this operation defines a symbol.
    pub fn symbol_name(&self) -> Option<&str> {
        self.attr(SYM_NAME_ATTR).and_then(Attribute::as_str)
    }
}

/// A single-block region: arguments plus an ordered operation list.
#[derive(Debug, Clone, Default)]
pub struct Region {
    pub args: Vec<ValueId>,
    pub ops: Vec<OpId>,
    /// Owning operation; `None` for the module body.
    pub parent: Option<OpId>,
}

/// Everything needed to create an operation.
#[derive(Debug, Clone, Default)]
pub struct OperationState {
    pub name: String,
    pub operands: Vec<ValueId>,
    pub num_results: usize,
    pub attributes: BTreeMap<String, Attribute>,
    pub num_regions: usize,
    pub span: Option<Span>,
}

impl OperationState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn operands(mut self, operands: impl IntoIterator<Item = ValueId>) -> Self {
        self.operands.extend(operands);
        self
    }

    pub fn results(mut self, count: usize) -> Self {
        self.num_results = count;
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: Attribute) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn regions(mut self, count: usize) -> Self {
        self.num_regions = count;
        self
    }

    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

// ── Errors ──────────────────────────────────────────────────────────────────

/// Rejected structural mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrError {
    /// The operation is not attached to any region.
    Detached { op: OpId },
    /// A value defined by the erased subtree is still used by `user`.
    LiveUses {
        op: OpId,
        value: ValueId,
        user: OpId,
    },
    /// The move would place `op` inside one of its own regions.
    CyclicMove { op: OpId },
    InvalidRange {
        region: RegionId,
        start: usize,
        end: usize,
        len: usize,
    },
}

impl fmt::Display for IrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrError::Detached { op } => write!(f, "{op} is not attached to a region"),
            IrError::LiveUses { op, value, user } => write!(
                f,
                "cannot erase {op}: {value} is still used by {user}"
            ),
            IrError::CyclicMove { op } => {
                write!(f, "cannot move {op} into one of its own regions")
            }
            IrError::InvalidRange {
                region,
                start,
                end,
                len,
            } => write!(
                f,
                "range {start}..{end} is out of bounds for {region} with {len} operations"
            ),
        }
    }
}

impl std::error::Error for IrError {}

// ── Module ──────────────────────────────────────────────────────────────────

/// Arena owning every operation, region and value of one IR module.
#[derive(Debug, Clone)]
pub struct Module {
    ops: Vec<Option<Operation>>,
    regions: Vec<Option<Region>>,
    values: Vec<Option<ValueData>>,
    body: RegionId,
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl Module {
    pub fn new() -> Self {
        Module {
            ops: Vec::new(),
            regions: vec![Some(Region::default())],
            values: Vec::new(),
            body: RegionId(0),
        }
    }

    /// Top-level region of the module.
    pub fn body(&self) -> RegionId {
        self.body
    }

    // ── Accessors ──

    pub fn op(&self, id: OpId) -> &Operation {
        match self.ops.get(id.index()) {
            Some(Some(op)) => op,
            _ => panic!("{id} is not a live operation"),
        }
    }

    pub fn try_op(&self, id: OpId) -> Option<&Operation> {
        self.ops.get(id.index()).and_then(Option::as_ref)
    }

    pub fn contains_op(&self, id: OpId) -> bool {
        self.try_op(id).is_some()
    }

    pub fn region(&self, id: RegionId) -> &Region {
        match self.regions.get(id.index()) {
            Some(Some(region)) => region,
            _ => panic!("{id} is not a live region"),
        }
    }

    pub fn value(&self, id: ValueId) -> &ValueData {
        match self.values.get(id.index()) {
            Some(Some(value)) => value,
            _ => panic!("{id} is not a live value"),
        }
    }

    pub fn try_value(&self, id: ValueId) -> Option<&ValueData> {
        self.values.get(id.index()).and_then(Option::as_ref)
    }

    pub fn uses(&self, id: ValueId) -> &[OpOperand] {
        &self.value(id).uses
    }

    /// Region directly containing `op`.
    pub fn parent_region(&self, op: OpId) -> Option<RegionId> {
        self.op(op).parent
    }

    /// Operation owning the region that contains `op`.
    pub fn parent_op(&self, op: OpId) -> Option<OpId> {
        self.parent_region(op)
            .and_then(|region| self.region(region).parent)
    }

    /// Last operation of `region`, if any.
    pub fn terminator(&self, region: RegionId) -> Option<OpId> {
        self.region(region).ops.last().copied()
    }

    /// Number of live operations in the module.
    pub fn num_ops(&self) -> usize {
        self.ops.iter().filter(|op| op.is_some()).count()
    }

    pub fn live_ops(&self) -> impl Iterator<Item = OpId> + '_ {
        self.ops
            .iter()
            .enumerate()
            .filter(|(_, op)| op.is_some())
            .map(|(i, _)| OpId(i as u32))
    }

    pub fn live_values(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, value)| value.is_some())
            .map(|(i, _)| ValueId(i as u32))
    }

    pub fn live_regions(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.regions
            .iter()
            .enumerate()
            .filter(|(_, region)| region.is_some())
            .map(|(i, _)| RegionId(i as u32))
    }

    fn op_mut(&mut self, id: OpId) -> &mut Operation {
        match self.ops.get_mut(id.index()) {
            Some(Some(op)) => op,
            _ => panic!("{id} is not a live operation"),
        }
    }

    fn region_mut(&mut self, id: RegionId) -> &mut Region {
        match self.regions.get_mut(id.index()) {
            Some(Some(region)) => region,
            _ => panic!("{id} is not a live region"),
        }
    }

    fn value_mut(&mut self, id: ValueId) -> &mut ValueData {
        match self.values.get_mut(id.index()) {
            Some(Some(value)) => value,
            _ => panic!("{id} is not a live value"),
        }
    }

    // ── Construction ──

    fn new_value(&mut self, def: ValueDef) -> ValueId {
        let id = ValueId(arena_index(self.values.len()));
        self.values.push(Some(ValueData {
            def,
            uses: Vec::new(),
        }));
        id
    }

    fn new_region(&mut self, parent: Option<OpId>) -> RegionId {
        let id = RegionId(arena_index(self.regions.len()));
        self.regions.push(Some(Region {
            parent,
            ..Region::default()
        }));
        id
    }

    /// Create an operation at the end of `region`.
    pub fn append_op(&mut self, region: RegionId, state: OperationState) -> OpId {
        let id = OpId(arena_index(self.ops.len()));
        let results = (0..state.num_results)
            .map(|index| self.new_value(ValueDef::OpResult { op: id, index }))
            .collect();
        let regions = (0..state.num_regions)
            .map(|_| self.new_region(Some(id)))
            .collect();
        for (index, &operand) in state.operands.iter().enumerate() {
            self.value_mut(operand)
                .uses
                .push(OpOperand { op: id, index });
        }
        self.ops.push(Some(Operation {
            name: state.name,
            operands: state.operands,
            results,
            attributes: state.attributes,
            regions,
            parent: Some(region),
            span: state.span,
        }));
        self.region_mut(region).ops.push(id);
        id
    }

    /// Append a new argument to `region`.
    pub fn add_region_arg(&mut self, region: RegionId) -> ValueId {
        let index = self.region(region).args.len();
        let value = self.new_value(ValueDef::RegionArg { region, index });
        self.region_mut(region).args.push(value);
        value
    }

    // ── Attribute mutation ──

    /// Set an attribute, returning the previous value.
    pub fn set_attr(
        &mut self,
        op: OpId,
        key: impl Into<String>,
        value: Attribute,
    ) -> Option<Attribute> {
        self.op_mut(op).attributes.insert(key.into(), value)
    }

    /// Remove an attribute, returning its value.
    pub fn remove_attr(&mut self, op: OpId, key: &str) -> Option<Attribute> {
        self.op_mut(op).attributes.remove(key)
    }

    // ── Structural mutation ──

    /// Redirect every use of `from` to `to`. Returns the number of operands rewritten.
    pub fn replace_all_uses_with(&mut self, from: ValueId, to: ValueId) -> usize {
        if from == to {
            return 0;
        }
        let uses = std::mem::take(&mut self.value_mut(from).uses);
        for u in &uses {
            self.op_mut(u.op).operands[u.index] = to;
        }
        let count = uses.len();
        self.value_mut(to).uses.extend(uses);
        count
    }

    /// Move `source.ops[range]` into the anchor's region immediately before
    /// `anchor`, preserving order. The move happens in one splice.
    pub fn splice_before(
        &mut self,
        anchor: OpId,
        source: RegionId,
        range: Range<usize>,
    ) -> Result<usize, IrError> {
        let dest = self
            .op(anchor)
            .parent
            .ok_or(IrError::Detached { op: anchor })?;
        let len = self.region(source).ops.len();
        if range.start > range.end || range.end > len {
            return Err(IrError::InvalidRange {
                region: source,
                start: range.start,
                end: range.end,
                len,
            });
        }
        let anchor_pos = self
            .region(dest)
            .ops
            .iter()
            .position(|&op| op == anchor)
            .ok_or(IrError::Detached { op: anchor })?;

        let moving: HashSet<OpId> = self.region(source).ops[range.clone()]
            .iter()
            .copied()
            .collect();
        if moving.contains(&anchor) {
            return Err(IrError::CyclicMove { op: anchor });
        }
        let mut cursor = self.region(dest).parent;
        while let Some(owner) = cursor {
            if moving.contains(&owner) {
                return Err(IrError::CyclicMove { op: owner });
            }
            cursor = self.parent_op(owner);
        }

        let insert_at = if source == dest && range.end <= anchor_pos {
            anchor_pos - range.len()
        } else {
            anchor_pos
        };
        let moved: Vec<OpId> = self.region_mut(source).ops.drain(range).collect();
        for &op in &moved {
            self.op_mut(op).parent = Some(dest);
        }
        let count = moved.len();
        let ops = &mut self.region_mut(dest).ops;
        let tail = ops.split_off(insert_at);
        ops.extend(moved);
        ops.extend(tail);
        Ok(count)
    }

    /// Erase `op` and everything nested in it. Fails if any value defined in
    /// the subtree is still used outside of it.
    pub fn erase_op(&mut self, op: OpId) -> Result<(), IrError> {
        let subtree = self.subtree_post_order(op);
        let inside: HashSet<OpId> = subtree.iter().copied().collect();
        let defined = self.values_defined_in(&subtree);
        for &value in &defined {
            if let Some(user) = self.uses(value).iter().find(|u| !inside.contains(&u.op)) {
                return Err(IrError::LiveUses {
                    op,
                    value,
                    user: user.op,
                });
            }
        }

        if let Some(parent) = self.op(op).parent {
            self.region_mut(parent).ops.retain(|&o| o != op);
        }
        for &o in &subtree {
            let operands = self.op(o).operands.clone();
            for (index, value) in operands.into_iter().enumerate() {
                if let Some(Some(data)) = self.values.get_mut(value.index()) {
                    data.uses.retain(|u| !(u.op == o && u.index == index));
                }
            }
        }
        for value in defined {
            self.values[value.index()] = None;
        }
        for o in subtree {
            if let Some(data) = self.ops[o.index()].take() {
                for region in data.regions {
                    self.regions[region.index()] = None;
                }
            }
        }
        Ok(())
    }

    fn subtree_post_order(&self, op: OpId) -> Vec<OpId> {
        let mut out = Vec::new();
        for &region in &self.op(op).regions {
            self.collect_post_order(region, &mut out);
        }
        out.push(op);
        out
    }

    fn values_defined_in(&self, ops: &[OpId]) -> Vec<ValueId> {
        let mut values = Vec::new();
        for &op in ops {
            let data = self.op(op);
            values.extend(data.results.iter().copied());
            for &region in &data.regions {
                values.extend(self.region(region).args.iter().copied());
            }
        }
        values
    }

    // ── Traversal ──

    /// Operations of `region` and all nested regions, parents before children.
    pub fn ops_pre_order(&self, region: RegionId) -> Vec<OpId> {
        let mut out = Vec::new();
        let _ = self.walk::<()>(region, &mut |op| {
            out.push(op);
            ControlFlow::Continue(())
        });
        out
    }

    /// Operations of `region` and all nested regions, children before parents.
    pub fn ops_post_order(&self, region: RegionId) -> Vec<OpId> {
        let mut out = Vec::new();
        self.collect_post_order(region, &mut out);
        out
    }

    fn collect_post_order(&self, region: RegionId, out: &mut Vec<OpId>) {
        for &op in &self.region(region).ops {
            for &nested in &self.op(op).regions {
                self.collect_post_order(nested, out);
            }
            out.push(op);
        }
    }

    /// Pre-order walk over `region`, stopping at the first `Break`.
    pub fn walk<B>(
        &self,
        region: RegionId,
        f: &mut impl FnMut(OpId) -> ControlFlow<B>,
    ) -> ControlFlow<B> {
        for &op in &self.region(region).ops {
            if let ControlFlow::Break(b) = f(op) {
                return ControlFlow::Break(b);
            }
            for &nested in &self.op(op).regions {
                if let ControlFlow::Break(b) = self.walk(nested, f) {
                    return ControlFlow::Break(b);
                }
            }
        }
        ControlFlow::Continue(())
    }

    /// Pre-order walk with mutable access. `f` may rewrite attributes but
    /// must not add, move or erase operations of the walked region.
    pub fn walk_mut<B>(
        &mut self,
        region: RegionId,
        f: &mut impl FnMut(&mut Module, OpId) -> ControlFlow<B>,
    ) -> ControlFlow<B> {
        let mut i = 0;
        while let Some(&op) = self.region(region).ops.get(i) {
            if let ControlFlow::Break(b) = f(self, op) {
                return ControlFlow::Break(b);
            }
            let nested = self.op(op).regions.clone();
            for region in nested {
                if let ControlFlow::Break(b) = self.walk_mut(region, f) {
                    return ControlFlow::Break(b);
                }
            }
            i += 1;
        }
        ControlFlow::Continue(())
    }
}

/// Next id for an arena holding `len` slots. Ids are `u32`; an arena that
/// outgrows them is a bug in the caller.
fn arena_index(len: usize) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| panic!("IR arena overflow: {len} entries"))
}

#[cfg(test)]
impl Module {
    /// Rewrite an operand slot without touching use lists.
    pub(crate) fn overwrite_operand_unchecked(&mut self, op: OpId, index: usize, value: ValueId) {
        self.op_mut(op).operands[index] = value;
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
