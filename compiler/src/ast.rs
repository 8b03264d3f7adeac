// AST node types for textual IR files.
//
// Mirrors the grammar accepted by `parser.rs`. SSA names are still plain
// strings here; `resolve.rs` binds them to arena values.
//
// Preconditions: produced by the parser from a valid or partially-valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

use crate::ir::Attribute;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

/// A name with its source location (`%x`, `@f`, attribute keys).
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

// ── Root ──

/// A complete `module { ... }`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleAst {
    pub items: Vec<Item>,
    pub span: Span,
}

/// One entry of a region body.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Op(OpAst),
    Func(FuncAst),
}

// ── Operations ──

/// Generic operation: `%r:2 = "dialect.op"(%a, %b#1) ({...}) {key = value}`.
#[derive(Debug, Clone, PartialEq)]
pub struct OpAst {
    pub results: Vec<ResultDef>,
    pub name: String,
    pub name_span: Span,
    pub operands: Vec<ValueRef>,
    pub regions: Vec<RegionAst>,
    pub attributes: Vec<AttrEntry>,
    pub span: Span,
}

/// `func @name(%a, %b) attributes {...} { body }` sugar for `func.func`.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncAst {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub attributes: Vec<AttrEntry>,
    /// `None` for an external declaration.
    pub body: Option<RegionAst>,
    pub span: Span,
}

/// A result group definition; `count` is 1 unless written `%name:N`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultDef {
    pub name: Ident,
    pub count: u32,
}

/// An operand reference; `index` is set for `%name#N`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRef {
    pub name: Ident,
    pub index: Option<u32>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionAst {
    pub args: Vec<Ident>,
    pub items: Vec<Item>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttrEntry {
    pub key: Ident,
    pub value: Attribute,
}
