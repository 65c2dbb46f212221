mod accessor;
mod alu;
mod ast;
mod builder;
mod config;
mod context;
mod encoding;
mod engine;
mod error;
mod exec;
mod grammar;
mod interface;
mod iter;
mod lexer;
mod lr;
mod out;
mod reflect;
mod resolver;
mod resolvers;
mod scope;
mod slr;
mod tables;
mod template;
mod value;

// Public exports.
pub use accessor::{AccessorCache, AccessorGenerator, FieldTableGenerator, GenerateError, GeneratedAccessor};
pub use ast::Position;
pub use config::EngineConfig;
pub use context::Runtime;
pub use encoding::Encoding;
pub use engine::{Engine, EngineBuilder};
pub use error::{
    EngineError, GrammarError, ParseError, ParseErrorKind, RuntimeError, RuntimeErrorKind, ScriptResult,
    TableError,
};
pub use interface::{Params, ScriptInterface};
pub use iter::{Filter, Iter, IterFilter, IterResult, ListIter, MethodFilter, MethodMap, RangeIter, to_iter};
pub use lexer::{Lexeme, Lexer, TemplateLexer};
pub use lr::{Handle, LrParser, Reducer, Symbol};
pub use out::{DiscardOut, Out, OutResult, StringOut, WriterOut};
pub use reflect::{Bean, Class, ClassKey, Field};
pub use resolvers::{
    BytesResolver, CommonResolver, DefaultResolvers, IterResolver, ListResolver, MapResolver, RangeResolver,
    StringResolver,
};
pub use resolver::{GetResolver, MatchMode, Registrar, Registration, ResolverManager, SetResolver, ToBytesResolver};
pub use slr::{Act, Conflict, GSym, Grammar, Rule, build as build_tables};
pub use tables::{ParserTables, TableKind, pack_row, resource_name};
pub use template::Template;
pub use value::{IterHandle, ListRef, MapRef, NativeFunction, Value};

/// Descriptors of the built-in value classes, for use as supertypes of host
/// classes and as registration targets.
pub mod classes {
    pub use crate::reflect::{
        ANY, BOOL, BYTES, COLLECTION, FLOAT, FUNCTION, INT, ITER, LIST, MAP, NATIVE, NULL, NUMBER, RANGE, STRING,
    };
}

/// Parser tables of the template language, as embedded in the crate.
///
/// # Errors
///
/// Returns the [`TableError`] raised while decoding the embedded tables.
pub fn template_tables() -> Result<&'static ParserTables, &'static TableError> {
    grammar::TABLES.as_ref()
}
