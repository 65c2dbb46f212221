//! Table driven shift-reduce parser.

use std::mem;

use tracing::{error, trace};

use crate::{
    error::{ParseError, ParseErrorKind},
    lexer::Lexer,
    tables::{ParserTables, START_STATE},
};

/// A terminal from the lexer or a non-terminal built by a reduction, with
/// the parser state it was pushed in.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol<V> {
    pub id: usize,
    pub value: V,
    pub state: usize,
    pub line: usize,
    pub column: usize,
}

impl<V> Symbol<V> {
    pub const fn new(id: usize, value: V, line: usize, column: usize) -> Self {
        Self {
            id,
            value,
            state: START_STATE,
            line,
            column,
        }
    }

    pub fn map<U, F: FnOnce(V) -> U>(self, f: F) -> Symbol<U> {
        Symbol {
            id: self.id,
            value: f(self.value),
            state: self.state,
            line: self.line,
            column: self.column,
        }
    }
}

/// The symbols matched by a production, removed from the stack.
pub struct Handle<V> {
    symbols: Vec<Symbol<V>>,
    line: usize,
    column: usize,
    accepted: bool,
}

impl<V: Default> Handle<V> {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Moves the value of the `i`th symbol out, leaving the default behind.
    pub fn take(&mut self, i: usize) -> V {
        self.symbols
            .get_mut(i)
            .map(|symbol| mem::take(&mut symbol.value))
            .unwrap_or_default()
    }

    /// `(line, column)` of the `i`th symbol.
    pub fn position(&self, i: usize) -> (usize, usize) {
        self.symbols
            .get(i)
            .map_or((self.line, self.column), |s| (s.line, s.column))
    }

    /// Line of the leftmost symbol, `0` for an empty handle.
    pub const fn line(&self) -> usize {
        self.line
    }

    pub const fn column(&self) -> usize {
        self.column
    }

    /// Ends the parse with the value of the current reduction.
    pub const fn accept(&mut self) {
        self.accepted = true;
    }
}

/// Semantic actions run on every reduction.
pub trait Reducer {
    type Value: Default;

    fn reduce(
        &mut self,
        production: usize,
        handle: &mut Handle<Self::Value>,
    ) -> Result<Self::Value, ParseError>;
}

pub struct LrParser<'t> {
    tables: &'t ParserTables,
    terminal_names: &'t [&'t str],
}

impl<'t> LrParser<'t> {
    pub const fn new(tables: &'t ParserTables, terminal_names: &'t [&'t str]) -> Self {
        Self {
            tables,
            terminal_names,
        }
    }

    fn terminal_name(&self, id: usize) -> String {
        self.terminal_names
            .get(id)
            .map_or_else(|| format!("symbol #{id}"), |name| (*name).to_owned())
    }

    fn corrupt(&self, line: usize, column: usize, reason: String) -> ParseError {
        error!(line, column, %reason, states = self.tables.states(), "corrupt parser tables");
        ParseError::new(line, column, ParseErrorKind::CorruptTables(reason))
    }

    /// Parses the token stream until a reduction accepts, returning the
    /// accepted value. Stops at the first token without an action.
    pub fn parse<L, R>(&self, lexer: &mut L, reducer: &mut R) -> Result<R::Value, ParseError>
    where
        L: Lexer,
        R: Reducer,
        R::Value: From<L::Value>,
    {
        let mut stack: Vec<Symbol<R::Value>> = Vec::with_capacity(24);
        stack.push(Symbol::new(0, R::Value::default(), 0, 0));
        let mut lookahead = lexer.next_token()?.map(R::Value::from);

        loop {
            let state = stack.last().map_or(START_STATE, |top| top.state);
            let action = self.tables.action(state, lookahead.id);

            if action > 0 {
                let target = usize::from(action.unsigned_abs()).saturating_sub(1);
                trace!(state, target, token = lookahead.id, "shift");
                lookahead.state = target;
                stack.push(lookahead);
                lookahead = lexer.next_token()?.map(R::Value::from);
            } else if action < 0 {
                let production = usize::from(action.unsigned_abs()).saturating_sub(1);
                let Some((lhs, len)) = self.tables.production(production) else {
                    return Err(self.corrupt(
                        lookahead.line,
                        lookahead.column,
                        format!("unknown production {production}"),
                    ));
                };
                if len >= stack.len() {
                    return Err(self.corrupt(
                        lookahead.line,
                        lookahead.column,
                        format!("production {production} pops {len} of {} symbols", stack.len().saturating_sub(1)),
                    ));
                }
                let symbols = stack.split_off(stack.len().saturating_sub(len));
                let (line, column) = symbols.first().map_or((0, 0), |s| (s.line, s.column));
                trace!(state, production, len, "reduce");
                let mut handle = Handle {
                    symbols,
                    line,
                    column,
                    accepted: false,
                };
                let value = reducer.reduce(production, &mut handle)?;
                if handle.accepted {
                    return Ok(value);
                }
                let top = stack.last().map_or(START_STATE, |s| s.state);
                let Ok(next) = usize::try_from(self.tables.goto(top, lhs)) else {
                    return Err(self.corrupt(
                        line,
                        column,
                        format!("no goto from state {top} over non-terminal {lhs}"),
                    ));
                };
                stack.push(Symbol {
                    id: lhs,
                    value,
                    state: next,
                    line,
                    column,
                });
            } else {
                return Err(ParseError::new(
                    lookahead.line,
                    lookahead.column,
                    ParseErrorKind::UnexpectedToken {
                        found: self.terminal_name(lookahead.id),
                    },
                ));
            }
        }
    }
}
