//! Symbols and productions of the template language, and the parser tables
//! compiled from them.

use std::sync::LazyLock;

use tracing::{debug, error};

use crate::{
    error::TableError,
    slr::{GSym, Grammar, Rule},
    tables::ParserTables,
};

macro_rules! symbols {
    ($(#[$meta:meta])* $vis:vis enum $name:ident($kind:ident) { $($variant:ident = $text:literal,)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)*
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant,)*];
            pub const NAMES: &'static [&'static str] = &[$($text,)*];

            pub const fn id(self) -> usize {
                self as usize
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)*
                }
            }

            pub const fn sym(self) -> GSym {
                GSym::$kind(self as usize)
            }
        }
    };
}

symbols! {
    /// Terminal symbols produced by the lexer.
    pub enum Term(T) {
        Eof = "end of input",
        Text = "text",
        Placeholder = "'${'",
        Ident = "identifier",
        Int = "integer",
        Float = "float",
        Str = "string",
        True = "'true'",
        False = "'false'",
        Null = "'null'",
        Var = "'var'",
        If = "'if'",
        Else = "'else'",
        For = "'for'",
        Where = "'where'",
        Function = "'function'",
        Return = "'return'",
        Break = "'break'",
        Continue = "'continue'",
        Semi = "';'",
        Comma = "','",
        Dot = "'.'",
        DotDot = "'..'",
        Colon = "':'",
        LParen = "'('",
        RParen = "')'",
        LBrack = "'['",
        RBrack = "']'",
        LBrace = "'{'",
        RBrace = "'}'",
        Assign = "'='",
        OrOr = "'||'",
        AndAnd = "'&&'",
        Or = "'|'",
        Xor = "'^'",
        And = "'&'",
        Eq = "'=='",
        Ne = "'!='",
        Lt = "'<'",
        Le = "'<='",
        Gt = "'>'",
        Ge = "'>='",
        LShift = "'<<'",
        RShift = "'>>'",
        URShift = "'>>>'",
        Plus = "'+'",
        Minus = "'-'",
        Star = "'*'",
        Slash = "'/'",
        Percent = "'%'",
        Not = "'!'",
        Tilde = "'~'",
    }
}

symbols! {
    pub enum NonTerm(N) {
        Start = "$START",
        Template = "template",
        Stmts = "statements",
        Stmt = "statement",
        BlockOpen = "block open",
        Block = "block",
        IfStmt = "if statement",
        ForHead = "for head",
        ForMain = "for loop",
        ForStmt = "for statement",
        Expr = "expression",
        OrExpr = "or expression",
        AndExpr = "and expression",
        BitOrExpr = "bit or expression",
        BitXorExpr = "bit xor expression",
        BitAndExpr = "bit and expression",
        EqExpr = "equality expression",
        RelExpr = "relational expression",
        ShiftExpr = "shift expression",
        RangeExpr = "range expression",
        AddExpr = "additive expression",
        MulExpr = "multiplicative expression",
        UnaryExpr = "unary expression",
        Postfix = "postfix expression",
        Primary = "primary expression",
        Args = "arguments",
        FunctionHead = "function head",
        Params = "parameters",
        FunctionExpr = "function",
    }
}

use NonTerm as N;
use Term as T;

macro_rules! productions {
    ($($prod:ident: $lhs:ident => [$($rhs:expr),* $(,)?];)*) => {
        /// Productions of the template language, in table order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Prod {
            $($prod,)*
        }

        impl Prod {
            pub const ALL: &'static [Self] = &[$(Self::$prod,)*];

            pub fn from_index(index: usize) -> Option<Self> {
                Self::ALL.get(index).copied()
            }
        }

        pub static PRODUCTIONS: &[Rule] = &[
            $(Rule { lhs: N::$lhs.id(), rhs: &[$($rhs.sym(),)*] },)*
        ];
    };
}

productions! {
    Start: Start => [N::Template, T::Eof];
    Template: Template => [N::Stmts];
    StmtsEmpty: Stmts => [];
    StmtsMore: Stmts => [N::Stmts, N::Stmt];

    Text: Stmt => [T::Text];
    Placeholder: Stmt => [T::Placeholder, N::Expr, T::RBrace];
    Empty: Stmt => [T::Semi];
    ExprStmt: Stmt => [N::Expr, T::Semi];
    Declare: Stmt => [T::Var, T::Ident, T::Semi];
    DeclareAssign: Stmt => [T::Var, T::Ident, T::Assign, N::Expr, T::Semi];
    Assign: Stmt => [T::Ident, T::Assign, N::Expr, T::Semi];
    SetProperty: Stmt => [N::Postfix, T::Dot, T::Ident, T::Assign, N::Expr, T::Semi];
    SetIndex: Stmt => [N::Postfix, T::LBrack, N::Expr, T::RBrack, T::Assign, N::Expr, T::Semi];
    BlockStmt: Stmt => [N::Block];
    IfStmt: Stmt => [N::IfStmt];
    ForStmt: Stmt => [N::ForStmt];
    Return: Stmt => [T::Return, T::Semi];
    ReturnValue: Stmt => [T::Return, N::Expr, T::Semi];
    Break: Stmt => [T::Break, T::Semi];
    BreakLabel: Stmt => [T::Break, T::Ident, T::Semi];
    Continue: Stmt => [T::Continue, T::Semi];
    ContinueLabel: Stmt => [T::Continue, T::Ident, T::Semi];

    BlockOpen: BlockOpen => [T::LBrace];
    Block: Block => [N::BlockOpen, N::Stmts, T::RBrace];

    If: IfStmt => [T::If, T::LParen, N::Expr, T::RParen, N::Block];
    IfElse: IfStmt => [T::If, T::LParen, N::Expr, T::RParen, N::Block, T::Else, N::Block];
    IfElseIf: IfStmt => [T::If, T::LParen, N::Expr, T::RParen, N::Block, T::Else, N::IfStmt];

    ForHead: ForHead => [T::For, T::LParen, T::Ident, T::Colon, N::Expr, T::RParen];
    ForHeadWhere: ForHead => [T::For, T::LParen, T::Ident, T::Colon, N::Expr, T::Where, N::Expr, T::RParen];
    ForHeadLabel: ForHead => [T::Ident, T::Colon, T::For, T::LParen, T::Ident, T::Colon, N::Expr, T::RParen];
    ForHeadLabelWhere: ForHead => [
        T::Ident, T::Colon, T::For, T::LParen, T::Ident, T::Colon, N::Expr, T::Where, N::Expr, T::RParen,
    ];
    ForMain: ForMain => [N::ForHead, N::Block];
    ForIn: ForStmt => [N::ForMain];
    ForInElse: ForStmt => [N::ForMain, T::Else, N::Block];

    Expr: Expr => [N::OrExpr];
    OrOr: OrExpr => [N::OrExpr, T::OrOr, N::AndExpr];
    OrExpr: OrExpr => [N::AndExpr];
    AndAnd: AndExpr => [N::AndExpr, T::AndAnd, N::BitOrExpr];
    AndExpr: AndExpr => [N::BitOrExpr];
    BitOr: BitOrExpr => [N::BitOrExpr, T::Or, N::BitXorExpr];
    BitOrExpr: BitOrExpr => [N::BitXorExpr];
    BitXor: BitXorExpr => [N::BitXorExpr, T::Xor, N::BitAndExpr];
    BitXorExpr: BitXorExpr => [N::BitAndExpr];
    BitAnd: BitAndExpr => [N::BitAndExpr, T::And, N::EqExpr];
    BitAndExpr: BitAndExpr => [N::EqExpr];
    Eq: EqExpr => [N::EqExpr, T::Eq, N::RelExpr];
    Ne: EqExpr => [N::EqExpr, T::Ne, N::RelExpr];
    EqExpr: EqExpr => [N::RelExpr];
    Lt: RelExpr => [N::RelExpr, T::Lt, N::ShiftExpr];
    Le: RelExpr => [N::RelExpr, T::Le, N::ShiftExpr];
    Gt: RelExpr => [N::RelExpr, T::Gt, N::ShiftExpr];
    Ge: RelExpr => [N::RelExpr, T::Ge, N::ShiftExpr];
    RelExpr: RelExpr => [N::ShiftExpr];
    LShift: ShiftExpr => [N::ShiftExpr, T::LShift, N::RangeExpr];
    RShift: ShiftExpr => [N::ShiftExpr, T::RShift, N::RangeExpr];
    URShift: ShiftExpr => [N::ShiftExpr, T::URShift, N::RangeExpr];
    ShiftExpr: ShiftExpr => [N::RangeExpr];
    Range: RangeExpr => [N::AddExpr, T::DotDot, N::AddExpr];
    RangeExpr: RangeExpr => [N::AddExpr];
    Plus: AddExpr => [N::AddExpr, T::Plus, N::MulExpr];
    Minus: AddExpr => [N::AddExpr, T::Minus, N::MulExpr];
    AddExpr: AddExpr => [N::MulExpr];
    Mult: MulExpr => [N::MulExpr, T::Star, N::UnaryExpr];
    Div: MulExpr => [N::MulExpr, T::Slash, N::UnaryExpr];
    Mod: MulExpr => [N::MulExpr, T::Percent, N::UnaryExpr];
    MulExpr: MulExpr => [N::UnaryExpr];
    Negative: UnaryExpr => [T::Minus, N::UnaryExpr];
    Not: UnaryExpr => [T::Not, N::UnaryExpr];
    BitNot: UnaryExpr => [T::Tilde, N::UnaryExpr];
    UnaryExpr: UnaryExpr => [N::Postfix];

    Primary: Postfix => [N::Primary];
    Property: Postfix => [N::Postfix, T::Dot, T::Ident];
    Index: Postfix => [N::Postfix, T::LBrack, N::Expr, T::RBrack];
    CallEmpty: Postfix => [N::Postfix, T::LParen, T::RParen];
    Call: Postfix => [N::Postfix, T::LParen, N::Args, T::RParen];
    ArgsFirst: Args => [N::Expr];
    ArgsMore: Args => [N::Args, T::Comma, N::Expr];

    Ident: Primary => [T::Ident];
    Int: Primary => [T::Int];
    Float: Primary => [T::Float];
    Str: Primary => [T::Str];
    True: Primary => [T::True];
    False: Primary => [T::False];
    Null: Primary => [T::Null];
    Paren: Primary => [T::LParen, N::Expr, T::RParen];
    ListEmpty: Primary => [T::LBrack, T::RBrack];
    List: Primary => [T::LBrack, N::Args, T::RBrack];
    LoopStatus: Primary => [T::For, T::Dot, T::Ident];
    FunctionPrimary: Primary => [N::FunctionExpr];

    FunctionHeadEmpty: FunctionHead => [T::Function, T::LParen, T::RParen];
    FunctionHead: FunctionHead => [T::Function, T::LParen, N::Params, T::RParen];
    ParamsFirst: Params => [T::Ident];
    ParamsMore: Params => [N::Params, T::Comma, T::Ident];
    Function: FunctionExpr => [N::FunctionHead, N::Block];
}

pub static GRAMMAR: Grammar<'static> = Grammar {
    terminals: Term::ALL.len(),
    nonterminals: NonTerm::ALL.len(),
    eof: Term::Eof.id(),
    rules: PRODUCTIONS,
};

/// Resource namespace of the template language tables.
pub const NAMESPACE: &str = "scriptlate";

macro_rules! table_resource {
    ($file:literal) => {
        (
            concat!("scriptlate/", $file),
            include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/resources/scriptlate/", $file)).as_slice(),
        )
    };
}

/// Tables compiled from [`GRAMMAR`] ahead of time, keyed by resource name.
static RESOURCES: [(&str, &[u8]); 3] = [
    table_resource!("Parser$ActionTable.data"),
    table_resource!("Parser$ReduceTable.data"),
    table_resource!("Parser$ProductionTable.data"),
];

/// Parser tables of the template language, decoded from the embedded
/// resources on first use.
pub static TABLES: LazyLock<Result<ParserTables, TableError>> = LazyLock::new(|| {
    let tables = ParserTables::from_resources(NAMESPACE, |name| {
        RESOURCES
            .iter()
            .find(|(resource, _)| *resource == name)
            .map(|(_, bytes)| *bytes)
    });
    match &tables {
        Ok(tables) => debug!(
            states = tables.states(),
            productions = tables.productions(),
            "loaded template parser tables"
        ),
        Err(error) => error!(%error, "failed to load template parser tables"),
    }
    tables
});
