//! Tiered selection of the strategy that reads, writes or serializes a
//! property of a runtime value.
//!
//! Lookups for a class go through, in order: the per-capability cache, the
//! assignable registrations in registration order, a generated accessor
//! (get/set only) and finally the generic [`CommonResolver`]. The winner is
//! cached under the exact class and never replaced.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::{
    accessor::{AccessorCache, FieldTableGenerator},
    error::RuntimeErrorKind,
    reflect::{ANY, Class, ClassKey},
    resolvers::{CommonResolver, DefaultResolvers},
    value::Value,
};

pub trait GetResolver: Send + Sync {
    fn get(&self, bean: &Value, property: &Value) -> Result<Value, RuntimeErrorKind>;
}

pub trait SetResolver: Send + Sync {
    /// Returns whether the value was stored.
    fn set(&self, bean: &Value, property: &Value, value: Value) -> Result<bool, RuntimeErrorKind>;
}

pub trait ToBytesResolver: Send + Sync {
    fn to_bytes(&self, bean: &Value, encoding: &str) -> Result<Arc<[u8]>, RuntimeErrorKind>;
}

/// A registration that installs further registrations when initialized.
pub trait Registrar: Send + Sync {
    fn register(&self, manager: &mut ResolverManager);
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchMode {
    /// Applies only to values of exactly this class.
    Exact,
    /// Applies to this class and every class assignable to it.
    Assignable,
    /// Registers other entries and applies to nothing itself.
    Delegating,
}

/// A resolver declaration: the class it matches, how it matches, and any
/// subset of the three strategies.
#[derive(Clone)]
pub struct Registration {
    class: &'static Class,
    mode: MatchMode,
    getter: Option<Arc<dyn GetResolver>>,
    setter: Option<Arc<dyn SetResolver>>,
    to_bytes: Option<Arc<dyn ToBytesResolver>>,
    registrar: Option<Arc<dyn Registrar>>,
}

impl Registration {
    const fn with_mode(class: &'static Class, mode: MatchMode) -> Self {
        Self {
            class,
            mode,
            getter: None,
            setter: None,
            to_bytes: None,
            registrar: None,
        }
    }

    pub const fn exact(class: &'static Class) -> Self {
        Self::with_mode(class, MatchMode::Exact)
    }

    pub const fn assignable(class: &'static Class) -> Self {
        Self::with_mode(class, MatchMode::Assignable)
    }

    pub fn delegating(registrar: Arc<dyn Registrar>) -> Self {
        Self {
            registrar: Some(registrar),
            ..Self::with_mode(&ANY, MatchMode::Delegating)
        }
    }

    #[must_use]
    pub fn getter(mut self, getter: Arc<dyn GetResolver>) -> Self {
        self.getter = Some(getter);
        self
    }

    #[must_use]
    pub fn setter(mut self, setter: Arc<dyn SetResolver>) -> Self {
        self.setter = Some(setter);
        self
    }

    #[must_use]
    pub fn to_bytes(mut self, to_bytes: Arc<dyn ToBytesResolver>) -> Self {
        self.to_bytes = Some(to_bytes);
        self
    }

    pub const fn class(&self) -> &'static Class {
        self.class
    }

    pub const fn mode(&self) -> MatchMode {
        self.mode
    }
}

/// The string key of a `.name` access, if the property is a string.
pub fn property_name(property: &Value) -> Option<&str> {
    property.as_str()
}

type Assignables<R> = Vec<(&'static Class, Arc<R>)>;

pub struct ResolverManager {
    getters: DashMap<ClassKey, Arc<dyn GetResolver>>,
    setters: DashMap<ClassKey, Arc<dyn SetResolver>>,
    to_bytes: DashMap<ClassKey, Arc<dyn ToBytesResolver>>,
    assignable_getters: Assignables<dyn GetResolver>,
    assignable_setters: Assignables<dyn SetResolver>,
    assignable_to_bytes: Assignables<dyn ToBytesResolver>,
    common: Arc<CommonResolver>,
    accessors: Option<AccessorCache>,
}

impl Default for ResolverManager {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ResolverManager {
    /// A manager with no registrations: everything resolves to the
    /// generated accessor or the generic fallback.
    pub fn new(generate_accessors: bool) -> Self {
        Self {
            getters: DashMap::new(),
            setters: DashMap::new(),
            to_bytes: DashMap::new(),
            assignable_getters: Vec::new(),
            assignable_setters: Vec::new(),
            assignable_to_bytes: Vec::new(),
            common: Arc::new(CommonResolver),
            accessors: generate_accessors.then(|| AccessorCache::new(FieldTableGenerator)),
        }
    }

    /// Applies `registrations` in order, then trims the registration lists.
    pub fn init<I>(registrations: I, generate_accessors: bool) -> Self
    where
        I: IntoIterator<Item = Registration>,
    {
        let mut manager = Self::new(generate_accessors);
        for registration in registrations {
            manager.register(registration);
        }
        manager.trim_to_size();
        manager
    }

    /// The built-in resolvers followed by `registrations`.
    pub fn with_defaults<I>(registrations: I, generate_accessors: bool) -> Self
    where
        I: IntoIterator<Item = Registration>,
    {
        Self::init(
            std::iter::once(Registration::delegating(Arc::new(DefaultResolvers)))
                .chain(registrations),
            generate_accessors,
        )
    }

    /// Installs one registration. Returns `false` for delegating entries,
    /// which only register others.
    ///
    /// Exact entries pre-seed the caches; the first entry for a class wins.
    /// Assignable entries are appended to the ordered match lists.
    pub fn register(&mut self, registration: Registration) -> bool {
        let Registration {
            class,
            mode,
            getter,
            setter,
            to_bytes,
            registrar,
        } = registration;
        match mode {
            MatchMode::Delegating => {
                if let Some(registrar) = registrar {
                    registrar.register(self);
                }
                false
            }
            MatchMode::Exact => {
                let key = class.key();
                if let Some(getter) = getter {
                    self.getters.entry(key).or_insert(getter);
                }
                if let Some(setter) = setter {
                    self.setters.entry(key).or_insert(setter);
                }
                if let Some(to_bytes) = to_bytes {
                    self.to_bytes.entry(key).or_insert(to_bytes);
                }
                true
            }
            MatchMode::Assignable => {
                if let Some(getter) = getter {
                    self.assignable_getters.push((class, getter));
                }
                if let Some(setter) = setter {
                    self.assignable_setters.push((class, setter));
                }
                if let Some(to_bytes) = to_bytes {
                    self.assignable_to_bytes.push((class, to_bytes));
                }
                true
            }
        }
    }

    fn trim_to_size(&mut self) {
        self.assignable_getters.shrink_to_fit();
        self.assignable_setters.shrink_to_fit();
        self.assignable_to_bytes.shrink_to_fit();
    }

    /// Reads `property` of `bean`. A `null` bean reads as `null`.
    pub fn get(&self, bean: &Value, property: &Value) -> Result<Value, RuntimeErrorKind> {
        if bean.is_null() {
            return Ok(Value::Null);
        }
        self.get_resolver(bean.class()).get(bean, property)
    }

    /// Writes `property` of `bean`. A `null` bean is never written.
    pub fn set(&self, bean: &Value, property: &Value, value: Value) -> Result<bool, RuntimeErrorKind> {
        if bean.is_null() {
            return Ok(false);
        }
        self.set_resolver(bean.class()).set(bean, property, value)
    }

    /// Serializes `bean` for a byte sink. Byte strings are returned as the
    /// same shared buffer without consulting any resolver.
    pub fn to_bytes(&self, bean: &Value, encoding: &str) -> Result<Option<Arc<[u8]>>, RuntimeErrorKind> {
        match bean {
            Value::Null => Ok(None),
            Value::Bytes(bytes) => Ok(Some(Arc::clone(bytes))),
            other => self
                .to_bytes_resolver(other.class())
                .to_bytes(other, encoding)
                .map(Some),
        }
    }

    pub fn get_resolver(&self, class: &'static Class) -> Arc<dyn GetResolver> {
        resolve(
            &self.getters,
            &self.assignable_getters,
            class,
            "get",
            || {
                self.accessors
                    .as_ref()
                    .and_then(|cache| cache.get_or_generate(class))
                    .map(|accessor| accessor.getter)
            },
            || Arc::clone(&self.common) as Arc<dyn GetResolver>,
        )
    }

    pub fn set_resolver(&self, class: &'static Class) -> Arc<dyn SetResolver> {
        resolve(
            &self.setters,
            &self.assignable_setters,
            class,
            "set",
            || {
                self.accessors
                    .as_ref()
                    .and_then(|cache| cache.get_or_generate(class))
                    .map(|accessor| accessor.setter)
            },
            || Arc::clone(&self.common) as Arc<dyn SetResolver>,
        )
    }

    pub fn to_bytes_resolver(&self, class: &'static Class) -> Arc<dyn ToBytesResolver> {
        resolve(
            &self.to_bytes,
            &self.assignable_to_bytes,
            class,
            "to_bytes",
            || None,
            || Arc::clone(&self.common) as Arc<dyn ToBytesResolver>,
        )
    }
}

fn resolve<R, G, F>(
    cache: &DashMap<ClassKey, Arc<R>>,
    assignable: &[(&'static Class, Arc<R>)],
    class: &'static Class,
    capability: &'static str,
    generated: G,
    fallback: F,
) -> Arc<R>
where
    R: ?Sized,
    G: FnOnce() -> Option<Arc<R>>,
    F: FnOnce() -> Arc<R>,
{
    let key = class.key();
    if let Some(cached) = cache.get(&key) {
        return Arc::clone(cached.value());
    }
    let (resolver, tier) = if let Some((_, found)) =
        assignable.iter().find(|(matched, _)| matched.is_assignable_from(class))
    {
        (Arc::clone(found), "assignable")
    } else if let Some(found) = generated() {
        (found, "generated")
    } else {
        (fallback(), "common")
    };
    debug!(class = class.name, capability, tier, "resolver selected");
    Arc::clone(cache.entry(key).or_insert(resolver).value())
}
