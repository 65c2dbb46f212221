//! Runtime type descriptors for values flowing through templates.
//!
//! A [`Class`] is a `'static` descriptor compared by address. Host objects
//! implement [`Bean`] and point at a `Class` that lists their supertypes and
//! readable/writable fields.

use std::{any::Any, fmt, ptr};

use crate::{iter::Iter, value::Value};

/// A named property of a host class.
pub struct Field {
    pub name: &'static str,
    pub get: fn(&dyn Any) -> Option<Value>,
    /// `None` for read-only fields. Returns whether the value was stored.
    pub set: Option<fn(&dyn Any, &Value) -> bool>,
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("writable", &self.set.is_some())
            .finish()
    }
}

pub struct Class {
    pub name: &'static str,
    pub supers: &'static [&'static Class],
    pub fields: &'static [Field],
}

/// Stable identity of a `'static` class, usable as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassKey(usize);

impl Class {
    pub fn key(&'static self) -> ClassKey {
        ClassKey(ptr::from_ref(self) as usize)
    }

    /// Whether a value of class `other` may be treated as `self`: the same
    /// class, any declared supertype (transitively), or the root class.
    pub fn is_assignable_from(&self, other: &Self) -> bool {
        ptr::eq(self, &ANY)
            || ptr::eq(self, other)
            || other.supers.iter().any(|s| self.is_assignable_from(s))
    }

    pub fn field(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("supers", &self.supers.iter().map(|s| s.name).collect::<Vec<_>>())
            .field("fields", &self.fields)
            .finish()
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self, other)
    }
}

impl Eq for Class {}

/// A host object exposed to templates.
pub trait Bean: Any + Send + Sync + fmt::Debug {
    fn class(&self) -> &'static Class;

    fn as_any(&self) -> &dyn Any;

    /// Iteration strategy for `for` loops. Beans are not iterable unless they
    /// override this.
    fn to_iter(&self) -> Option<Box<dyn Iter>> {
        None
    }

    fn display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

pub static ANY: Class = Class {
    name: "any",
    supers: &[],
    fields: &[],
};
pub static NULL: Class = Class {
    name: "null",
    supers: &[],
    fields: &[],
};
pub static NUMBER: Class = Class {
    name: "number",
    supers: &[&ANY],
    fields: &[],
};
pub static INT: Class = Class {
    name: "int",
    supers: &[&NUMBER],
    fields: &[],
};
pub static FLOAT: Class = Class {
    name: "float",
    supers: &[&NUMBER],
    fields: &[],
};
pub static BOOL: Class = Class {
    name: "bool",
    supers: &[&ANY],
    fields: &[],
};
pub static STRING: Class = Class {
    name: "string",
    supers: &[&ANY],
    fields: &[],
};
pub static BYTES: Class = Class {
    name: "bytes",
    supers: &[&ANY],
    fields: &[],
};
pub static COLLECTION: Class = Class {
    name: "collection",
    supers: &[&ANY],
    fields: &[],
};
pub static LIST: Class = Class {
    name: "list",
    supers: &[&COLLECTION],
    fields: &[],
};
pub static MAP: Class = Class {
    name: "map",
    supers: &[&COLLECTION],
    fields: &[],
};
pub static RANGE: Class = Class {
    name: "range",
    supers: &[&ANY],
    fields: &[],
};
pub static FUNCTION: Class = Class {
    name: "function",
    supers: &[&ANY],
    fields: &[],
};
pub static NATIVE: Class = Class {
    name: "native",
    supers: &[&FUNCTION],
    fields: &[],
};
pub static ITER: Class = Class {
    name: "iter",
    supers: &[&ANY],
    fields: &[],
};
