use std::sync::Arc;

use crate::{alu, value::Value};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Plus,
    Minus,
    Mult,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Lshift,
    Rshift,
    Urshift,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Range,
}

impl BinaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Mult => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::Lshift => "<<",
            Self::Rshift => ">>",
            Self::Urshift => ">>>",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Range => "..",
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negative,
    Not,
    BitNot,
}

impl UnaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Negative => "-",
            Self::Not => "!",
            Self::BitNot => "~",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value.
    Direct { value: Value, pos: Position },
    /// Read of a variable slot in the current frame.
    Var { slot: usize, pos: Position },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Position,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        pos: Position,
    },
    /// `&&`, evaluates `right` only when `left` is truthy.
    And {
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Position,
    },
    /// `||`, evaluates `right` only when `left` is falsy.
    Or {
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Position,
    },
    Property {
        target: Box<Expr>,
        key: Value,
        pos: Position,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        pos: Position,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        pos: Position,
    },
    Function(Arc<FunctionDecl>),
    List { items: Vec<Expr>, pos: Position },
}

impl Expr {
    pub fn position(&self) -> Position {
        match self {
            Self::Direct { pos, .. }
            | Self::Var { pos, .. }
            | Self::Binary { pos, .. }
            | Self::Unary { pos, .. }
            | Self::And { pos, .. }
            | Self::Or { pos, .. }
            | Self::Property { pos, .. }
            | Self::Index { pos, .. }
            | Self::Call { pos, .. }
            | Self::List { pos, .. } => *pos,
            Self::Function(decl) => decl.pos,
        }
    }

    /// The statically known value of this expression, if it is an immutable
    /// literal.
    pub fn const_value(&self) -> Option<&Value> {
        match self {
            Self::Direct { value, .. } if value.is_immutable() => Some(value),
            _ => None,
        }
    }

    /// Folds operators whose operands are immutable literals into a literal.
    ///
    /// Operands are expected to be optimized already; the builder calls this
    /// on every node as it is reduced. An operation that fails at fold time is
    /// left in place so the failure surfaces at run time with its position.
    pub fn optimize(self) -> Self {
        match self {
            Self::Binary {
                op,
                left,
                right,
                pos,
            } => {
                let folded = match (left.const_value(), right.const_value()) {
                    (Some(l), Some(r)) => alu::binary(op, l, r).ok().filter(Value::is_immutable),
                    _ => None,
                };
                match folded {
                    Some(value) => Self::Direct { value, pos },
                    None => Self::Binary {
                        op,
                        left,
                        right,
                        pos,
                    },
                }
            }
            Self::Unary { op, operand, pos } => {
                let folded = operand
                    .const_value()
                    .and_then(|v| alu::unary(op, v).ok())
                    .filter(Value::is_immutable);
                match folded {
                    Some(value) => Self::Direct { value, pos },
                    None => Self::Unary { op, operand, pos },
                }
            }
            Self::And { left, right, pos } => match left.const_value().map(Value::is_truthy) {
                Some(false) => Self::Direct {
                    value: Value::Bool(false),
                    pos,
                },
                Some(true) => match right.const_value() {
                    Some(r) => Self::Direct {
                        value: Value::Bool(r.is_truthy()),
                        pos,
                    },
                    None => Self::And { left, right, pos },
                },
                None => Self::And { left, right, pos },
            },
            Self::Or { left, right, pos } => match left.const_value().map(Value::is_truthy) {
                Some(true) => Self::Direct {
                    value: Value::Bool(true),
                    pos,
                },
                Some(false) => match right.const_value() {
                    Some(r) => Self::Direct {
                        value: Value::Bool(r.is_truthy()),
                        pos,
                    },
                    None => Self::Or { left, right, pos },
                },
                None => Self::Or { left, right, pos },
            },
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Text {
        text: Arc<str>,
        pos: Position,
    },
    /// `${ expr }`
    Placeholder {
        expr: Expr,
        pos: Position,
    },
    Expr(Expr),
    Assign {
        slot: usize,
        value: Expr,
        pos: Position,
    },
    SetProperty {
        target: Expr,
        key: Value,
        value: Expr,
        pos: Position,
    },
    SetIndex {
        target: Expr,
        index: Expr,
        value: Expr,
        pos: Position,
    },
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
        pos: Position,
    },
    ForIn(Box<ForIn>),
    Return {
        value: Option<Expr>,
        pos: Position,
    },
    /// `label` is `None` for a bare `break`, which targets the innermost loop.
    Break {
        label: Option<usize>,
        pos: Position,
    },
    Continue {
        label: Option<usize>,
        pos: Position,
    },
}

/// `[label:] for (item : collection [where filter]) { body } [else { .. }]`
#[derive(Debug, Clone, PartialEq)]
pub struct ForIn {
    /// Loop disambiguation index. `0` for unlabelled loops.
    pub label: usize,
    pub iter_slot: usize,
    pub item_slot: usize,
    pub collection: Expr,
    pub filter: Option<Expr>,
    pub body: Vec<Stmt>,
    pub else_body: Option<Vec<Stmt>>,
    pub pos: Position,
}

/// A script function. Arguments occupy slots `0..arity` of a fresh frame of
/// `frame_size` slots.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub arity: usize,
    pub frame_size: usize,
    pub body: Vec<Stmt>,
    pub pos: Position,
}
