use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use crate::{
    ast::FunctionDecl,
    error::RuntimeErrorKind,
    iter::Iter,
    reflect::{self, Bean, Class},
};

pub type ListRef = Arc<RwLock<Vec<Value>>>;
pub type MapRef = Arc<RwLock<IndexMap<Arc<str>, Value>>>;
/// A live iterator shared between a loop and the `for.iter` slot.
pub type IterHandle = Arc<Mutex<Box<dyn Iter>>>;

type NativeFn = dyn Fn(&[Value]) -> Result<Value, RuntimeErrorKind> + Send + Sync;

/// A host function callable from a template.
#[derive(Clone)]
pub struct NativeFunction {
    name: Arc<str>,
    func: Arc<NativeFn>,
}

impl NativeFunction {
    pub fn new<N, F>(name: N, func: F) -> Self
    where
        N: Into<Arc<str>>,
        F: Fn(&[Value]) -> Result<Value, RuntimeErrorKind> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, RuntimeErrorKind> {
        (self.func)(args)
    }

    fn same(&self, other: &Self) -> bool {
        Arc::as_ptr(&self.func).cast::<()>() == Arc::as_ptr(&other.func).cast::<()>()
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NativeFunction").field(&self.name).finish()
    }
}

/// A dynamically typed template value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Bytes(Arc<[u8]>),
    List(ListRef),
    Map(MapRef),
    /// Inclusive integer range, ascending or descending.
    Range { from: i64, to: i64 },
    Function(Arc<FunctionDecl>),
    Native(NativeFunction),
    Iter(IterHandle),
    Host(Arc<dyn Bean>),
}

impl Value {
    pub fn list<I: IntoIterator<Item = Self>>(items: I) -> Self {
        Self::List(Arc::new(RwLock::new(items.into_iter().collect())))
    }

    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<Arc<str>>,
        I: IntoIterator<Item = (K, Self)>,
    {
        Self::Map(Arc::new(RwLock::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )))
    }

    pub fn bytes<B: Into<Arc<[u8]>>>(bytes: B) -> Self {
        Self::Bytes(bytes.into())
    }

    pub fn host<B: Bean>(bean: B) -> Self {
        Self::Host(Arc::new(bean))
    }

    pub fn native<N, F>(name: N, func: F) -> Self
    where
        N: Into<Arc<str>>,
        F: Fn(&[Value]) -> Result<Value, RuntimeErrorKind> + Send + Sync + 'static,
    {
        Self::Native(NativeFunction::new(name, func))
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Values that can never change once created. Only these may be produced
    /// by constant folding.
    pub const fn is_immutable(&self) -> bool {
        matches!(
            self,
            Self::Null
                | Self::Bool(_)
                | Self::Int(_)
                | Self::Float(_)
                | Self::Str(_)
                | Self::Bytes(_)
                | Self::Range { .. }
        )
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Bytes(b) => !b.is_empty(),
            Self::List(list) => !list.read().is_empty(),
            Self::Map(map) => !map.read().is_empty(),
            Self::Range { .. }
            | Self::Function(_)
            | Self::Native(_)
            | Self::Iter(_)
            | Self::Host(_) => true,
        }
    }

    /// The runtime type descriptor used by the resolver subsystem.
    pub fn class(&self) -> &'static Class {
        match self {
            Self::Null => &reflect::NULL,
            Self::Bool(_) => &reflect::BOOL,
            Self::Int(_) => &reflect::INT,
            Self::Float(_) => &reflect::FLOAT,
            Self::Str(_) => &reflect::STRING,
            Self::Bytes(_) => &reflect::BYTES,
            Self::List(_) => &reflect::LIST,
            Self::Map(_) => &reflect::MAP,
            Self::Range { .. } => &reflect::RANGE,
            Self::Function(_) => &reflect::FUNCTION,
            Self::Native(_) => &reflect::NATIVE,
            Self::Iter(_) => &reflect::ITER,
            Self::Host(bean) => bean.class(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.class().name
    }

    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Identity of a shared cell. Printing and comparing keep the cells they
/// are inside of, so a container met again while still open is a cycle.
fn addr<T: ?Sized>(cell: &Arc<T>) -> *const () {
    Arc::as_ptr(cell).cast::<()>()
}

impl Value {
    fn eq_nested(&self, other: &Self, open: &mut Vec<(*const (), *const ())>) -> bool {
        match (self, other) {
            (Self::List(a), Self::List(b)) => {
                let key = (addr(a), addr(b));
                if Arc::ptr_eq(a, b) || open.contains(&key) {
                    return true;
                }
                open.push(key);
                let (a, b) = (a.read_recursive(), b.read_recursive());
                let equal = a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.eq_nested(y, open));
                open.pop();
                equal
            }
            (Self::Map(a), Self::Map(b)) => {
                let key = (addr(a), addr(b));
                if Arc::ptr_eq(a, b) || open.contains(&key) {
                    return true;
                }
                open.push(key);
                let (a, b) = (a.read_recursive(), b.read_recursive());
                let equal = a.len() == b.len()
                    && a.iter()
                        .all(|(name, x)| b.get(name).is_some_and(|y| x.eq_nested(y, open)));
                open.pop();
                equal
            }
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => (*a as f64) == *b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Range { from: a, to: b }, Self::Range { from: c, to: d }) => a == c && b == d,
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) => a.same(b),
            (Self::Iter(a), Self::Iter(b)) => Arc::ptr_eq(a, b),
            (Self::Host(a), Self::Host(b)) => addr(a) == addr(b),
            _ => false,
        }
    }

    /// Writes the placeholder form. A list or map that contains itself
    /// prints the inner occurrence as `[...]` or `{...}`.
    fn display(&self, f: &mut fmt::Formatter<'_>, open: &mut Vec<*const ()>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Self::List(list) => {
                if open.contains(&addr(list)) {
                    return f.write_str("[...]");
                }
                open.push(addr(list));
                f.write_str("[")?;
                for (i, item) in list.read_recursive().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.display(f, open)?;
                }
                open.pop();
                f.write_str("]")
            }
            Self::Map(map) => {
                if open.contains(&addr(map)) {
                    return f.write_str("{...}");
                }
                open.push(addr(map));
                f.write_str("{")?;
                for (i, (key, item)) in map.read_recursive().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: ")?;
                    item.display(f, open)?;
                }
                open.pop();
                f.write_str("}")
            }
            Self::Range { from, to } => write!(f, "{from}..{to}"),
            Self::Function(_) => f.write_str("function"),
            Self::Native(native) => write!(f, "native {}", native.name()),
            Self::Iter(_) => f.write_str("iter"),
            Self::Host(bean) => bean.display(f),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_nested(other, &mut Vec::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            Self::List(_) => write!(f, "List({self})"),
            Self::Map(_) => write!(f, "Map({self})"),
            Self::Range { from, to } => write!(f, "Range({from}..{to})"),
            Self::Function(decl) => write!(f, "Function(arity = {})", decl.arity),
            Self::Native(native) => native.fmt(f),
            Self::Iter(_) => write!(f, "Iter"),
            Self::Host(bean) => f.debug_tuple("Host").field(bean).finish(),
        }
    }
}

/// Renders the value the way a placeholder prints it. `null` prints nothing.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.display(f, &mut Vec::new())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value.into())
    }
}

impl From<Arc<str>> for Value {
    fn from(value: Arc<str>) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<Self>> for Value {
    fn from(value: Vec<Self>) -> Self {
        Self::List(Arc::new(RwLock::new(value)))
    }
}

impl From<NativeFunction> for Value {
    fn from(value: NativeFunction) -> Self {
        Self::Native(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
