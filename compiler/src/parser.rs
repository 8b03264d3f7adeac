// Parser for textual IR files.
//
// Parses a token stream (from the lexer) into an AST. Accepts a
// `module { ... }` wrapper or a bare item list. Uses chumsky combinators.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::ir::Attribute;
use crate::lexer::Token;

/// Largest `N` accepted in a `%name:N` result group.
pub const MAX_RESULT_COUNT: u32 = 4096;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub module: Option<ModuleAst>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse an IR source string. Lexes then parses.
///
/// Returns an AST (if parsing succeeded) plus any errors.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    // Convert lexer output to chumsky stream.
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = module_parser();
    let (module, parse_errors) = parser.parse(stream).into_output_errors();

    // Merge lex errors + parse errors.
    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        module,
        errors: all_errors,
    }
}

// ── Main parser builder ──

fn module_parser<'tokens, I>(
) -> impl Parser<'tokens, I, ModuleAst, extra::Err<Rich<'tokens, Token, SimpleSpan>>>
where
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    // ── Names ──

    let value_name = select! {
        Token::Value(name) = e => Ident { name, span: e.span() },
    };

    let symbol = select! {
        Token::Symbol(name) = e => Ident { name, span: e.span() },
    };

    let value_list = value_name
        .clone()
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    // ── Attributes ──

    let attr_value = recursive(|attr_value| {
        let array = attr_value
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(Attribute::Array);

        select! {
            Token::StringLit(s) => Attribute::Str(s),
            Token::Int(v) => Attribute::Int(v),
            Token::True => Attribute::Bool(true),
            Token::False => Attribute::Bool(false),
            Token::Unit => Attribute::Unit,
            Token::Symbol(name) => Attribute::SymbolRef(name),
        }
        .or(array)
    });

    // Keys are bare identifiers, or quoted when they collide with a keyword.
    let attr_key = select! {
        Token::Ident(name) = e => Ident { name, span: e.span() },
        Token::StringLit(name) = e => Ident { name, span: e.span() },
    };

    let attr_dict = attr_key
        .then_ignore(just(Token::Equals))
        .then(attr_value)
        .map(|(key, value)| AttrEntry { key, value })
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LBrace), just(Token::RBrace));

    // ── Operand: '%name' ('#' INT)? ──

    let operand = value_name
        .clone()
        .then(select! { Token::ResultIndex(i) => i }.or_not())
        .map_with(|(name, index), e| ValueRef {
            name,
            index,
            span: e.span(),
        });

    // ── Result definition: '%name' (':' INT)? ──

    let result_def = value_name
        .clone()
        .then(
            just(Token::Colon)
                .ignore_then(select! { Token::Int(n) => n })
                .or_not(),
        )
        .try_map(|(name, count), span| match count {
            None => Ok(ResultDef { name, count: 1 }),
            Some(n) if n > 0 && n <= i64::from(MAX_RESULT_COUNT) => Ok(ResultDef {
                name,
                count: n as u32,
            }),
            Some(n) if n > 0 => Err(Rich::custom(
                span,
                format!("result count {n} exceeds the limit of {MAX_RESULT_COUNT}"),
            )),
            Some(n) => Err(Rich::custom(
                span,
                format!("result count must be positive, found {n}"),
            )),
        });

    // ── Items (recursive through regions) ──

    let item = recursive(|item| {
        let region = just(Token::Caret)
            .ignore_then(value_list.clone())
            .then_ignore(just(Token::Colon))
            .or_not()
            .then(item.repeated().collect::<Vec<_>>())
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map_with(|(args, items), e| RegionAst {
                args: args.unwrap_or_default(),
                items,
                span: e.span(),
            });

        let results = result_def
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>()
            .then_ignore(just(Token::Equals))
            .or_not();

        let op_name = select! {
            Token::StringLit(name) = e => (name, e.span()),
        };

        let operands = operand
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let regions = region
            .clone()
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let op = results
            .then(op_name)
            .then(operands)
            .then(regions.or_not())
            .then(attr_dict.clone().or_not())
            .map_with(
                |((((results, (name, name_span)), operands), regions), attributes), e| {
                    Item::Op(OpAst {
                        results: results.unwrap_or_default(),
                        name,
                        name_span,
                        operands,
                        regions: regions.unwrap_or_default(),
                        attributes: attributes.unwrap_or_default(),
                        span: e.span(),
                    })
                },
            );

        let func = just(Token::Func)
            .ignore_then(symbol)
            .then(value_list.clone())
            .then(
                just(Token::Attributes)
                    .ignore_then(attr_dict.clone())
                    .or_not(),
            )
            .then(region.or_not())
            .map_with(|(((name, params), attributes), body), e| {
                Item::Func(FuncAst {
                    name,
                    params,
                    attributes: attributes.unwrap_or_default(),
                    body,
                    span: e.span(),
                })
            });

        func.or(op)
    });

    // ── Module ──

    let wrapped = just(Token::Module).ignore_then(
        item.clone()
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace)),
    );
    let bare = item.repeated().collect::<Vec<_>>();

    wrapped
        .or(bare)
        .then_ignore(end())
        .map_with(|items, e| ModuleAst {
            items,
            span: e.span(),
        })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> ModuleAst {
        let result = parse(source);
        assert!(
            result.errors.is_empty(),
            "unexpected errors: {:#?}",
            result.errors
        );
        result.module.expect("expected module")
    }

    fn parse_one_op(source: &str) -> OpAst {
        let module = parse_ok(source);
        assert_eq!(module.items.len(), 1, "expected 1 item");
        match module.items.into_iter().next() {
            Some(Item::Op(op)) => op,
            other => panic!("expected op, got {other:?}"),
        }
    }

    // ── Empty ──

    #[test]
    fn empty_module() {
        let module = parse_ok("module {}");
        assert!(module.items.is_empty());
    }

    #[test]
    fn empty_source_is_bare_module() {
        let module = parse_ok("");
        assert!(module.items.is_empty());
    }

    // ── Operations ──

    #[test]
    fn op_without_results() {
        let op = parse_one_op(r#""tf.NoOp"()"#);
        assert_eq!(op.name, "tf.NoOp");
        assert!(op.results.is_empty());
        assert!(op.operands.is_empty());
        assert!(op.attributes.is_empty());
    }

    #[test]
    fn op_with_result_and_attributes() {
        let op = parse_one_op(r#"%a = "tf.opA"() {device = "", T = 3, flag = true}"#);
        assert_eq!(op.results.len(), 1);
        assert_eq!(op.results[0].name.name, "a");
        assert_eq!(op.results[0].count, 1);
        assert_eq!(op.attributes.len(), 3);
        assert_eq!(op.attributes[0].key.name, "device");
        assert_eq!(op.attributes[0].value, Attribute::Str(String::new()));
        assert_eq!(op.attributes[1].value, Attribute::Int(3));
        assert_eq!(op.attributes[2].value, Attribute::Bool(true));
    }

    #[test]
    fn multi_result_group_and_indexed_operands() {
        let module = parse_ok(
            r#"
            %l:2 = "test.two"()
            "tf.opD"(%l#0, %l#1)
            "#,
        );
        let Item::Op(def) = &module.items[0] else {
            panic!("expected op")
        };
        assert_eq!(def.results[0].count, 2);
        let Item::Op(user) = &module.items[1] else {
            panic!("expected op")
        };
        assert_eq!(user.operands.len(), 2);
        assert_eq!(user.operands[0].name.name, "l");
        assert_eq!(user.operands[0].index, Some(0));
        assert_eq!(user.operands[1].index, Some(1));
    }

    #[test]
    fn several_result_groups() {
        let op = parse_one_op(r#"%a, %b:3 = "test.four"()"#);
        assert_eq!(op.results.len(), 2);
        assert_eq!(op.results[1].count, 3);
    }

    #[test]
    fn zero_result_count_is_rejected() {
        let result = parse(r#"%a:0 = "test.none"()"#);
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn op_with_region_and_attributes() {
        let op = parse_one_op(
            r#"
            %l:2 = "tf_device.launch"() ({
              %b = "tf.opB"()
              %c = "tf.opC"()
              "tf_device.return"(%c, %b)
            }) {device = "CPU:0"}
            "#,
        );
        assert_eq!(op.name, "tf_device.launch");
        assert_eq!(op.regions.len(), 1);
        assert_eq!(op.regions[0].items.len(), 3);
        assert_eq!(op.attributes[0].value, Attribute::Str("CPU:0".into()));
    }

    #[test]
    fn op_with_two_regions_and_region_args() {
        let op = parse_one_op(
            r#""test.if"() ({ ^(%x): "test.yield"(%x) }, { "test.yield"() })"#,
        );
        assert_eq!(op.regions.len(), 2);
        assert_eq!(op.regions[0].args.len(), 1);
        assert_eq!(op.regions[0].args[0].name, "x");
        assert!(op.regions[1].args.is_empty());
    }

    #[test]
    fn nested_array_and_symbol_attributes() {
        let op = parse_one_op(r#""tf.Case"() {branches = [@a, [@b], "x"], f = @c}"#);
        assert_eq!(
            op.attributes[0].value,
            Attribute::Array(vec![
                Attribute::SymbolRef("a".into()),
                Attribute::Array(vec![Attribute::SymbolRef("b".into())]),
                Attribute::Str("x".into()),
            ])
        );
        assert_eq!(op.attributes[1].value, Attribute::SymbolRef("c".into()));
    }

    #[test]
    fn quoted_attribute_key() {
        let op = parse_one_op(r#""test.op"() {"module" = unit}"#);
        assert_eq!(op.attributes[0].key.name, "module");
        assert_eq!(op.attributes[0].value, Attribute::Unit);
    }

    // ── Functions ──

    #[test]
    fn func_with_params_and_body() {
        let module = parse_ok(
            r#"
            module {
              func @callee(%arg0, %arg1) {
                %0 = "tf.AddV2"(%arg0, %arg1)
                "func.return"(%0)
              }
            }
            "#,
        );
        let Item::Func(func) = &module.items[0] else {
            panic!("expected func")
        };
        assert_eq!(func.name.name, "callee");
        assert_eq!(func.params.len(), 2);
        assert_eq!(func.body.as_ref().map(|b| b.items.len()), Some(2));
    }

    #[test]
    fn func_declaration_without_body() {
        let module = parse_ok("func @external(%x)\nfunc @other() attributes {visibility = \"private\"}");
        assert_eq!(module.items.len(), 2);
        let Item::Func(ext) = &module.items[0] else {
            panic!("expected func")
        };
        assert!(ext.body.is_none());
        let Item::Func(other) = &module.items[1] else {
            panic!("expected func")
        };
        assert_eq!(other.attributes.len(), 1);
    }

    // ── Errors ──

    #[test]
    fn missing_closing_brace_is_an_error() {
        let result = parse(r#"module { "tf.A"() "#);
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn oversized_result_group_is_an_error() {
        let result = parse(r#"module { %a:4294967295 = "tf.A"() }"#);
        assert!(result
            .errors
            .iter()
            .any(|e| e.to_string().contains("exceeds the limit of 4096")));

        let at_limit = parse_one_op(r#"%a:4096 = "tf.A"()"#);
        assert_eq!(at_limit.results[0].count, MAX_RESULT_COUNT);
    }

    #[test]
    fn trailing_garbage_is_an_error() {
        let result = parse(r#"module {} "tf.A"()"#);
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn lex_errors_are_merged() {
        let result = parse("module { ~ }");
        assert!(!result.errors.is_empty());
    }
}
