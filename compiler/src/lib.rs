// devhoist — device launch hoisting for dataflow IR
//
// Library root. The textual front end (lexer, parser, resolve) builds an
// `ir::Module`; passes run over it through `pipeline`.

pub mod ast;
pub mod config;
pub mod diag;
pub mod hoist;
pub mod id;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod print;
pub mod propagate;
pub mod reachability;
pub mod resolve;
pub mod symbol;
pub mod verify;
