//! Semantic actions of the template grammar: turn reductions into an
//! optimized AST with every variable resolved to a slot.

use std::sync::Arc;

use tracing::trace;

use crate::{
    ast::{BinaryOp, Expr, ForIn, FunctionDecl, Position, Stmt, UnaryOp},
    error::{ParseError, ParseErrorKind},
    grammar::Prod,
    lexer::Lexeme,
    lr::{Handle, Reducer},
    scope::{LabelMap, LoopScope, VariantManager},
    value::Value,
};

type BuildResult<T> = Result<T, ParseError>;

/// Semantic value of a grammar symbol.
#[derive(Debug, Default)]
pub enum Sem {
    #[default]
    None,
    Ident(Arc<str>),
    Literal(Value),
    Text(Arc<str>),
    Expr(Expr),
    Exprs(Vec<Expr>),
    Stmt(Stmt),
    Stmts(Vec<Stmt>),
    Params(Vec<Arc<str>>),
    ForHead(Box<ForIn>),
    /// Arity of a function whose frame is open.
    FunctionHead(usize),
}

impl From<Lexeme> for Sem {
    fn from(lexeme: Lexeme) -> Self {
        match lexeme {
            Lexeme::None => Self::None,
            Lexeme::Ident(name) => Self::Ident(name),
            Lexeme::Literal(value) => Self::Literal(value),
            Lexeme::Text(text) => Self::Text(text),
        }
    }
}

fn position(handle: &Handle<Sem>, i: usize) -> Position {
    let (line, column) = handle.position(i);
    Position::new(line, column)
}

fn error_at(pos: Position, kind: ParseErrorKind) -> ParseError {
    ParseError::new(pos.line, pos.column, kind)
}

fn mismatch(handle: &Handle<Sem>, i: usize, expected: &str) -> ParseError {
    error_at(
        position(handle, i),
        ParseErrorKind::CorruptTables(format!("expected {expected} at handle index {i}")),
    )
}

macro_rules! take {
    ($handle:expr, $i:expr, $variant:ident) => {
        match $handle.take($i) {
            Sem::$variant(value) => Ok(value),
            _ => Err(mismatch($handle, $i, stringify!($variant))),
        }
    };
}

/// Builds the AST of one template. Holds the per-parse slot allocator, the
/// label map and the template parameters discovered so far.
#[derive(Debug)]
pub struct TemplateBuilder {
    vars: VariantManager,
    labels: LabelMap,
    loose_var: bool,
    params: Vec<(Arc<str>, usize)>,
}

impl TemplateBuilder {
    pub fn new(loose_var: bool) -> Self {
        Self {
            vars: VariantManager::new(),
            labels: LabelMap::default(),
            loose_var,
            params: Vec::new(),
        }
    }

    /// Root frame size and the `(name, slot)` of every template parameter.
    pub fn finish(self) -> (usize, Vec<(Arc<str>, usize)>) {
        (self.vars.frame_size(), self.params)
    }

    /// Resolves a variable name to its slot. Undeclared names at template
    /// level become parameters when loose variables are enabled.
    fn resolve(&mut self, name: &Arc<str>, pos: Position) -> BuildResult<usize> {
        if let Some(slot) = self.vars.lookup(name) {
            return Ok(slot);
        }
        if self.loose_var && self.vars.is_root_frame() {
            let slot = self.vars.declare_root(name);
            trace!(%name, slot, "declared template parameter");
            self.params.push((Arc::clone(name), slot));
            return Ok(slot);
        }
        Err(error_at(
            pos,
            ParseErrorKind::UndeclaredVariable {
                name: name.to_string(),
            },
        ))
    }

    fn declare(&mut self, name: &Arc<str>, pos: Position) -> BuildResult<usize> {
        self.vars.declare(name).map_err(|kind| error_at(pos, kind))
    }

    fn binary(op: BinaryOp, handle: &mut Handle<Sem>) -> BuildResult<Sem> {
        let left = take!(handle, 0, Expr)?;
        let right = take!(handle, 2, Expr)?;
        Ok(Sem::Expr(
            Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                pos: position(handle, 1),
            }
            .optimize(),
        ))
    }

    fn unary(op: UnaryOp, handle: &mut Handle<Sem>) -> BuildResult<Sem> {
        let operand = take!(handle, 1, Expr)?;
        Ok(Sem::Expr(
            Expr::Unary {
                op,
                operand: Box::new(operand),
                pos: position(handle, 0),
            }
            .optimize(),
        ))
    }

    fn literal(value: Value, handle: &Handle<Sem>) -> Sem {
        Sem::Expr(Expr::Direct {
            value,
            pos: position(handle, 0),
        })
    }

    fn if_stmt(
        handle: &mut Handle<Sem>,
        otherwise: Vec<Stmt>,
    ) -> BuildResult<Sem> {
        let cond = take!(handle, 2, Expr)?;
        let then = take!(handle, 4, Stmts)?;
        let pos = position(handle, 0);
        // A constant condition keeps only the branch that runs.
        let stmt = match cond.const_value().map(Value::is_truthy) {
            Some(true) => Stmt::Block(then),
            Some(false) => Stmt::Block(otherwise),
            None => Stmt::If {
                cond,
                then,
                otherwise,
                pos,
            },
        };
        Ok(Sem::Stmt(stmt))
    }

    /// Opens the loop scope: the hidden iterator slot, the item variable and
    /// the loop label. Closed again by the `for` body reduction.
    fn for_head(
        &mut self,
        handle: &mut Handle<Sem>,
        label: Option<usize>,
        item_at: usize,
        filter: Option<usize>,
    ) -> BuildResult<Sem> {
        let label = match label {
            Some(i) => Some(take!(handle, i, Ident)?),
            None => None,
        };
        let item_pos = position(handle, item_at);
        let item = take!(handle, item_at, Ident)?;
        let collection = take!(handle, item_at.saturating_add(2), Expr)?;
        let filter = match filter {
            Some(i) => Some(take!(handle, i, Expr)?),
            None => None,
        };
        let pos = position(handle, 0);

        let label = self.labels.index(label.as_ref());
        self.vars.push_scope();
        let iter_slot = self.vars.declare_hidden();
        let item_slot = self.declare(&item, item_pos)?;
        self.vars.push_loop(LoopScope { label, iter_slot });

        Ok(Sem::ForHead(Box::new(ForIn {
            label,
            iter_slot,
            item_slot,
            collection,
            filter,
            body: Vec::new(),
            else_body: None,
            pos,
        })))
    }

    fn loop_jump(&self, handle: &mut Handle<Sem>, keyword: &str, labelled: bool) -> BuildResult<Option<usize>> {
        let pos = position(handle, 0);
        if !labelled {
            return match self.vars.innermost_loop() {
                Some(_) => Ok(None),
                None => Err(error_at(
                    pos,
                    ParseErrorKind::NotInLoop {
                        keyword: keyword.to_owned(),
                    },
                )),
            };
        }
        let label = take!(handle, 1, Ident)?;
        match self.labels.get(&label) {
            Some(index) if self.vars.has_loop(index) => Ok(Some(index)),
            _ => Err(error_at(
                position(handle, 1),
                ParseErrorKind::UnknownLabel {
                    label: label.to_string(),
                },
            )),
        }
    }

    fn reduce_prod(&mut self, prod: Prod, handle: &mut Handle<Sem>) -> BuildResult<Sem> {
        let sem = match prod {
            Prod::Start => {
                handle.accept();
                Sem::Stmts(take!(handle, 0, Stmts)?)
            }
            Prod::StmtsEmpty => Sem::Stmts(Vec::new()),
            Prod::StmtsMore => {
                let mut stmts = take!(handle, 0, Stmts)?;
                match handle.take(1) {
                    Sem::Stmt(stmt) => stmts.push(stmt),
                    Sem::None => {}
                    _ => return Err(mismatch(handle, 1, "Stmt")),
                }
                Sem::Stmts(stmts)
            }

            Prod::Text => Sem::Stmt(Stmt::Text {
                text: take!(handle, 0, Text)?,
                pos: position(handle, 0),
            }),
            Prod::Placeholder => Sem::Stmt(Stmt::Placeholder {
                expr: take!(handle, 1, Expr)?,
                pos: position(handle, 0),
            }),
            Prod::Empty => Sem::None,
            Prod::ExprStmt => Sem::Stmt(Stmt::Expr(take!(handle, 0, Expr)?)),
            Prod::Declare => {
                let name = take!(handle, 1, Ident)?;
                let pos = position(handle, 1);
                let slot = self.declare(&name, pos)?;
                Sem::Stmt(Stmt::Assign {
                    slot,
                    value: Expr::Direct {
                        value: Value::Null,
                        pos,
                    },
                    pos,
                })
            }
            Prod::DeclareAssign => {
                let name = take!(handle, 1, Ident)?;
                let value = take!(handle, 3, Expr)?;
                let pos = position(handle, 1);
                let slot = self.declare(&name, pos)?;
                Sem::Stmt(Stmt::Assign { slot, value, pos })
            }
            Prod::Assign => {
                let name = take!(handle, 0, Ident)?;
                let value = take!(handle, 2, Expr)?;
                let pos = position(handle, 0);
                let slot = self.resolve(&name, pos)?;
                Sem::Stmt(Stmt::Assign { slot, value, pos })
            }
            Prod::SetProperty => Sem::Stmt(Stmt::SetProperty {
                target: take!(handle, 0, Expr)?,
                key: Value::Str(take!(handle, 2, Ident)?),
                value: take!(handle, 4, Expr)?,
                pos: position(handle, 1),
            }),
            Prod::SetIndex => Sem::Stmt(Stmt::SetIndex {
                target: take!(handle, 0, Expr)?,
                index: take!(handle, 2, Expr)?,
                value: take!(handle, 5, Expr)?,
                pos: position(handle, 1),
            }),
            Prod::BlockStmt => Sem::Stmt(Stmt::Block(take!(handle, 0, Stmts)?)),
            Prod::Template
            | Prod::IfStmt
            | Prod::ForStmt
            | Prod::Expr
            | Prod::OrExpr
            | Prod::AndExpr
            | Prod::BitOrExpr
            | Prod::BitXorExpr
            | Prod::BitAndExpr
            | Prod::EqExpr
            | Prod::RelExpr
            | Prod::ShiftExpr
            | Prod::RangeExpr
            | Prod::AddExpr
            | Prod::MulExpr
            | Prod::UnaryExpr
            | Prod::Primary
            | Prod::FunctionPrimary => handle.take(0),
            Prod::Return => Sem::Stmt(Stmt::Return {
                value: None,
                pos: position(handle, 0),
            }),
            Prod::ReturnValue => Sem::Stmt(Stmt::Return {
                value: Some(take!(handle, 1, Expr)?),
                pos: position(handle, 0),
            }),
            Prod::Break | Prod::BreakLabel => Sem::Stmt(Stmt::Break {
                label: self.loop_jump(handle, "break", prod == Prod::BreakLabel)?,
                pos: position(handle, 0),
            }),
            Prod::Continue | Prod::ContinueLabel => Sem::Stmt(Stmt::Continue {
                label: self.loop_jump(handle, "continue", prod == Prod::ContinueLabel)?,
                pos: position(handle, 0),
            }),

            Prod::BlockOpen => {
                self.vars.push_scope();
                Sem::None
            }
            Prod::Block => {
                self.vars.pop_scope();
                Sem::Stmts(take!(handle, 1, Stmts)?)
            }

            Prod::If => Self::if_stmt(handle, Vec::new())?,
            Prod::IfElse => {
                let otherwise = take!(handle, 6, Stmts)?;
                Self::if_stmt(handle, otherwise)?
            }
            Prod::IfElseIf => {
                let otherwise = take!(handle, 6, Stmt)?;
                Self::if_stmt(handle, vec![otherwise])?
            }

            Prod::ForHead => self.for_head(handle, None, 2, None)?,
            Prod::ForHeadWhere => self.for_head(handle, None, 2, Some(6))?,
            Prod::ForHeadLabel => self.for_head(handle, Some(0), 4, None)?,
            Prod::ForHeadLabelWhere => self.for_head(handle, Some(0), 4, Some(8))?,
            Prod::ForMain => {
                let mut head = take!(handle, 0, ForHead)?;
                head.body = take!(handle, 1, Stmts)?;
                self.vars.pop_loop();
                self.vars.pop_scope();
                Sem::ForHead(head)
            }
            Prod::ForIn => Sem::Stmt(Stmt::ForIn(take!(handle, 0, ForHead)?)),
            Prod::ForInElse => {
                let mut head = take!(handle, 0, ForHead)?;
                head.else_body = Some(take!(handle, 2, Stmts)?);
                Sem::Stmt(Stmt::ForIn(head))
            }

            Prod::OrOr | Prod::AndAnd => {
                let left = Box::new(take!(handle, 0, Expr)?);
                let right = Box::new(take!(handle, 2, Expr)?);
                let pos = position(handle, 1);
                let expr = if prod == Prod::OrOr {
                    Expr::Or { left, right, pos }
                } else {
                    Expr::And { left, right, pos }
                };
                Sem::Expr(expr.optimize())
            }
            Prod::BitOr => Self::binary(BinaryOp::BitOr, handle)?,
            Prod::BitXor => Self::binary(BinaryOp::BitXor, handle)?,
            Prod::BitAnd => Self::binary(BinaryOp::BitAnd, handle)?,
            Prod::Eq => Self::binary(BinaryOp::Equal, handle)?,
            Prod::Ne => Self::binary(BinaryOp::NotEqual, handle)?,
            Prod::Lt => Self::binary(BinaryOp::Less, handle)?,
            Prod::Le => Self::binary(BinaryOp::LessEqual, handle)?,
            Prod::Gt => Self::binary(BinaryOp::Greater, handle)?,
            Prod::Ge => Self::binary(BinaryOp::GreaterEqual, handle)?,
            Prod::LShift => Self::binary(BinaryOp::Lshift, handle)?,
            Prod::RShift => Self::binary(BinaryOp::Rshift, handle)?,
            Prod::URShift => Self::binary(BinaryOp::Urshift, handle)?,
            Prod::Range => Self::binary(BinaryOp::Range, handle)?,
            Prod::Plus => Self::binary(BinaryOp::Plus, handle)?,
            Prod::Minus => Self::binary(BinaryOp::Minus, handle)?,
            Prod::Mult => Self::binary(BinaryOp::Mult, handle)?,
            Prod::Div => Self::binary(BinaryOp::Div, handle)?,
            Prod::Mod => Self::binary(BinaryOp::Mod, handle)?,
            Prod::Negative => Self::unary(UnaryOp::Negative, handle)?,
            Prod::Not => Self::unary(UnaryOp::Not, handle)?,
            Prod::BitNot => Self::unary(UnaryOp::BitNot, handle)?,

            Prod::Property => Sem::Expr(Expr::Property {
                target: Box::new(take!(handle, 0, Expr)?),
                key: Value::Str(take!(handle, 2, Ident)?),
                pos: position(handle, 1),
            }),
            Prod::Index => Sem::Expr(Expr::Index {
                target: Box::new(take!(handle, 0, Expr)?),
                index: Box::new(take!(handle, 2, Expr)?),
                pos: position(handle, 1),
            }),
            Prod::CallEmpty => Sem::Expr(Expr::Call {
                callee: Box::new(take!(handle, 0, Expr)?),
                args: Vec::new(),
                pos: position(handle, 1),
            }),
            Prod::Call => Sem::Expr(Expr::Call {
                callee: Box::new(take!(handle, 0, Expr)?),
                args: take!(handle, 2, Exprs)?,
                pos: position(handle, 1),
            }),
            Prod::ArgsFirst => Sem::Exprs(vec![take!(handle, 0, Expr)?]),
            Prod::ArgsMore => {
                let mut args = take!(handle, 0, Exprs)?;
                args.push(take!(handle, 2, Expr)?);
                Sem::Exprs(args)
            }

            Prod::Ident => {
                let name = take!(handle, 0, Ident)?;
                let pos = position(handle, 0);
                let slot = self.resolve(&name, pos)?;
                Sem::Expr(Expr::Var { slot, pos })
            }
            Prod::Int | Prod::Float | Prod::Str => {
                let value = take!(handle, 0, Literal)?;
                Self::literal(value, handle)
            }
            Prod::True => Self::literal(Value::Bool(true), handle),
            Prod::False => Self::literal(Value::Bool(false), handle),
            Prod::Null => Self::literal(Value::Null, handle),
            Prod::Paren => handle.take(1),
            Prod::ListEmpty => Sem::Expr(Expr::List {
                items: Vec::new(),
                pos: position(handle, 0),
            }),
            Prod::List => Sem::Expr(Expr::List {
                items: take!(handle, 1, Exprs)?,
                pos: position(handle, 0),
            }),
            Prod::LoopStatus => {
                let property = take!(handle, 2, Ident)?;
                let pos = position(handle, 0);
                if &*property != "iter" {
                    return Err(error_at(
                        position(handle, 2),
                        ParseErrorKind::InvalidLoopStatus {
                            property: property.to_string(),
                        },
                    ));
                }
                let Some(scope) = self.vars.innermost_loop() else {
                    return Err(error_at(
                        pos,
                        ParseErrorKind::NotInLoop {
                            keyword: "for.iter".to_owned(),
                        },
                    ));
                };
                Sem::Expr(Expr::Var {
                    slot: scope.iter_slot,
                    pos,
                })
            }

            Prod::FunctionHeadEmpty => {
                self.vars.push_frame();
                Sem::FunctionHead(0)
            }
            Prod::FunctionHead => {
                let params = take!(handle, 2, Params)?;
                let pos = position(handle, 2);
                self.vars.push_frame();
                for param in &params {
                    self.declare(param, pos)?;
                }
                Sem::FunctionHead(params.len())
            }
            Prod::ParamsFirst => Sem::Params(vec![take!(handle, 0, Ident)?]),
            Prod::ParamsMore => {
                let mut params = take!(handle, 0, Params)?;
                params.push(take!(handle, 2, Ident)?);
                Sem::Params(params)
            }
            Prod::Function => {
                let arity = take!(handle, 0, FunctionHead)?;
                let body = take!(handle, 1, Stmts)?;
                let frame_size = self.vars.pop_frame();
                Sem::Expr(Expr::Function(Arc::new(FunctionDecl {
                    arity,
                    frame_size,
                    body,
                    pos: position(handle, 0),
                })))
            }
        };
        Ok(sem)
    }
}

impl Reducer for TemplateBuilder {
    type Value = Sem;

    fn reduce(&mut self, production: usize, handle: &mut Handle<Sem>) -> Result<Sem, ParseError> {
        let Some(prod) = Prod::from_index(production) else {
            return Err(ParseError::new(
                handle.line(),
                handle.column(),
                ParseErrorKind::CorruptTables(format!("unknown production {production}")),
            ));
        };
        self.reduce_prod(prod, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        grammar::{TABLES, Term},
        lexer::TemplateLexer,
        lr::LrParser,
    };

    fn build(source: &str, loose_var: bool) -> Result<(Vec<Stmt>, TemplateBuilder), ParseError> {
        let tables = TABLES.as_ref().unwrap();
        let mut builder = TemplateBuilder::new(loose_var);
        let sem = LrParser::new(tables, Term::NAMES)
            .parse(&mut TemplateLexer::new(source, true), &mut builder)?;
        match sem {
            Sem::Stmts(stmts) => Ok((stmts, builder)),
            other => panic!("unexpected root {other:?}"),
        }
    }

    fn error_kind(source: &str) -> ParseErrorKind {
        build(source, false).unwrap_err().kind
    }

    #[test]
    #[ntest::timeout(5000)]
    fn test_text_and_placeholder() {
        let (stmts, _) = build("Hi ${1 + 2}!", false).unwrap();
        assert_eq!(stmts.len(), 3);
        assert!(matches!(&stmts[0], Stmt::Text { text, .. } if &**text == "Hi "));
        match &stmts[1] {
            Stmt::Placeholder { expr, .. } => {
                assert_eq!(expr.const_value(), Some(&Value::Int(3)), "constant is folded");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    #[ntest::timeout(5000)]
    fn test_variables_get_slots() {
        let (stmts, builder) = build("<% var a = 1; var b; b = a; %>", false).unwrap();
        assert_eq!(
            stmts[1],
            Stmt::Assign {
                slot: 1,
                value: Expr::Direct {
                    value: Value::Null,
                    pos: Position::new(1, 19),
                },
                pos: Position::new(1, 19),
            }
        );
        assert!(matches!(
            &stmts[2],
            Stmt::Assign { slot: 1, value: Expr::Var { slot: 0, .. }, .. }
        ));
        assert_eq!(builder.finish().0, 2);
    }

    #[test]
    #[ntest::timeout(5000)]
    fn test_undeclared_variable() {
        let err = build("<% x = 1; %>", false).unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::UndeclaredVariable { name: "x".to_owned() }
        );
        assert_eq!((err.line, err.column), (1, 4));
    }

    #[test]
    #[ntest::timeout(5000)]
    fn test_loose_variables_become_params() {
        let (_, builder) = build("${name}<% { var n = name; } %>${count}", true).unwrap();
        let (frame_size, params) = builder.finish();
        let names: Vec<&str> = params.iter().map(|(name, _)| &**name).collect();
        assert_eq!(names, ["name", "count"]);
        assert_eq!(frame_size, 3);
    }

    #[test]
    #[ntest::timeout(5000)]
    fn test_loose_variables_stop_at_functions() {
        let err = build("<% var f = function() { return outer; }; %>", true).unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::UndeclaredVariable { name: "outer".to_owned() }
        );
    }

    #[test]
    #[ntest::timeout(5000)]
    fn test_duplicate_variable() {
        assert_eq!(
            error_kind("<% var a; var a; %>"),
            ParseErrorKind::DuplicateVariable { name: "a".to_owned() }
        );
        assert!(build("<% var a; { var a; } %>", false).is_ok(), "inner blocks may shadow");
    }

    #[test]
    #[ntest::timeout(5000)]
    fn test_constant_if_is_folded() {
        let (stmts, _) = build("<% if (1 < 2) { %>yes<% } else { %>no<% } %>", false).unwrap();
        match &stmts[0] {
            Stmt::Block(then) => {
                assert!(matches!(&then[0], Stmt::Text { text, .. } if &**text == "yes"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    #[ntest::timeout(5000)]
    fn test_for_loop_slots_and_labels() {
        let (stmts, _) = build(
            "<% outer: for (a : [1, 2]) { for (b : 1..3) { break outer; } } %>",
            false,
        )
        .unwrap();
        let Stmt::ForIn(outer) = &stmts[0] else {
            panic!("unexpected {:?}", stmts[0]);
        };
        assert_eq!(outer.label, 1);
        assert_eq!((outer.iter_slot, outer.item_slot), (0, 1));
        let Stmt::ForIn(inner) = &outer.body[0] else {
            panic!("unexpected {:?}", outer.body[0]);
        };
        assert_eq!(inner.label, 0);
        assert_eq!((inner.iter_slot, inner.item_slot), (2, 3));
        assert!(matches!(inner.body[0], Stmt::Break { label: Some(1), .. }));
    }

    #[test]
    #[ntest::timeout(5000)]
    fn test_for_head_collection_and_filter() {
        let sources = [
            ("<% for (a : 1..4) {} %>", false),
            ("<% for (a : 1..4 where f) {} %>", true),
            ("<% l: for (a : 1..4) {} %>", false),
            ("<% l: for (a : 1..4 where f) {} %>", true),
        ];
        for (source, filtered) in sources {
            let (stmts, _) = build(source, true).unwrap();
            let Stmt::ForIn(for_in) = &stmts[0] else {
                panic!("unexpected {:?}", stmts[0]);
            };
            assert_eq!(
                for_in.collection.const_value(),
                Some(&Value::Range { from: 1, to: 4 }),
                "{source}"
            );
            assert_eq!(
                matches!(for_in.filter, Some(Expr::Var { .. })),
                filtered,
                "{source}"
            );
        }
    }

    #[test]
    #[ntest::timeout(5000)]
    fn test_loop_control_outside_loop() {
        assert_eq!(
            error_kind("<% break; %>"),
            ParseErrorKind::NotInLoop { keyword: "break".to_owned() }
        );
        assert_eq!(
            error_kind("<% for (a : [1]) { continue nope; } %>"),
            ParseErrorKind::UnknownLabel { label: "nope".to_owned() }
        );
        assert_eq!(
            error_kind("${for.iter}"),
            ParseErrorKind::NotInLoop { keyword: "for.iter".to_owned() }
        );
        assert_eq!(
            error_kind("<% for (a : [1]) { %>${for.count}<% } %>"),
            ParseErrorKind::InvalidLoopStatus { property: "count".to_owned() }
        );
    }

    #[test]
    #[ntest::timeout(5000)]
    fn test_loop_status_reads_iterator_slot() {
        let (stmts, _) = build("<% for (a : [1]) { %>${for.iter.index}<% } %>", false).unwrap();
        let Stmt::ForIn(head) = &stmts[0] else {
            panic!("unexpected {:?}", stmts[0]);
        };
        match &head.body[0] {
            Stmt::Placeholder {
                expr: Expr::Property { target, .. },
                ..
            } => assert!(matches!(**target, Expr::Var { slot, .. } if slot == head.iter_slot)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    #[ntest::timeout(5000)]
    fn test_function_frame() {
        let (stmts, builder) =
            build("<% var f = function(a, b) { var c = a + b; return c; }; %>", false).unwrap();
        let Stmt::Assign {
            value: Expr::Function(decl),
            ..
        } = &stmts[0]
        else {
            panic!("unexpected {:?}", stmts[0]);
        };
        assert_eq!((decl.arity, decl.frame_size), (2, 3));
        assert_eq!(builder.finish().0, 1);
    }

    #[test]
    #[ntest::timeout(5000)]
    fn test_syntax_error_position() {
        let err = build("line\n<% var = 1; %>", false).unwrap_err();
        assert_eq!((err.line, err.column), (2, 8));
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedToken { .. }));
    }
}
