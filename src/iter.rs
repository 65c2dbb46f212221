//! Pull-based external iteration used by `for` loops.

use std::sync::Arc;

use crate::{
    error::RuntimeErrorKind,
    value::{IterHandle, Value},
};

pub type IterResult<T> = Result<T, RuntimeErrorKind>;

/// A single-pass iterator. `index` is the position of the most recently
/// returned element and starts at `-1`.
pub trait Iter: Send {
    fn has_next(&mut self) -> IterResult<bool>;

    /// Fails with [`RuntimeErrorKind::NoSuchElement`] when exhausted.
    fn next(&mut self) -> IterResult<Value>;

    fn index(&self) -> i64;
}

/// Iterates an owned snapshot of values.
pub struct ListIter {
    items: std::vec::IntoIter<Value>,
    cursor: i64,
}

impl ListIter {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: items.into_iter(),
            cursor: -1,
        }
    }
}

impl Iter for ListIter {
    fn has_next(&mut self) -> IterResult<bool> {
        Ok(!self.items.as_slice().is_empty())
    }

    fn next(&mut self) -> IterResult<Value> {
        let item = self.items.next().ok_or(RuntimeErrorKind::NoSuchElement)?;
        self.cursor = self.cursor.saturating_add(1);
        Ok(item)
    }

    fn index(&self) -> i64 {
        self.cursor
    }
}

/// Walks an inclusive integer range in either direction.
pub struct RangeIter {
    next: Option<i64>,
    to: i64,
    cursor: i64,
}

impl RangeIter {
    pub const fn new(from: i64, to: i64) -> Self {
        Self {
            next: Some(from),
            to,
            cursor: -1,
        }
    }
}

impl Iter for RangeIter {
    fn has_next(&mut self) -> IterResult<bool> {
        Ok(self.next.is_some())
    }

    fn next(&mut self) -> IterResult<Value> {
        let current = self.next.ok_or(RuntimeErrorKind::NoSuchElement)?;
        self.next = match current.cmp(&self.to) {
            std::cmp::Ordering::Less => current.checked_add(1),
            std::cmp::Ordering::Greater => current.checked_sub(1),
            std::cmp::Ordering::Equal => None,
        };
        self.cursor = self.cursor.saturating_add(1);
        Ok(Value::Int(current))
    }

    fn index(&self) -> i64 {
        self.cursor
    }
}

/// Adapts a shared handle so it can be driven like an owned iterator.
pub struct SharedIter(IterHandle);

impl Iter for SharedIter {
    fn has_next(&mut self) -> IterResult<bool> {
        self.0.lock().has_next()
    }

    fn next(&mut self) -> IterResult<Value> {
        self.0.lock().next()
    }

    fn index(&self) -> i64 {
        self.0.lock().index()
    }
}

/// Decides which items an [`IterFilter`] lets through.
pub trait Filter: Send {
    fn valid(&mut self, item: &Value) -> IterResult<bool>;
}

/// Decorator that skips delegate items rejected by its [`Filter`].
///
/// One item of lookahead is buffered; rejected items are dropped and never
/// replayed. `index` counts only the items this decorator has returned.
pub struct IterFilter<F> {
    iter: Box<dyn Iter>,
    filter: F,
    pending: Option<Value>,
    cursor: i64,
}

impl<F: Filter> IterFilter<F> {
    pub fn new(iter: Box<dyn Iter>, filter: F) -> Self {
        Self {
            iter,
            filter,
            pending: None,
            cursor: -1,
        }
    }
}

impl<F: Filter> Iter for IterFilter<F> {
    fn has_next(&mut self) -> IterResult<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        while self.iter.has_next()? {
            let item = self.iter.next()?;
            if self.filter.valid(&item)? {
                self.pending = Some(item);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn next(&mut self) -> IterResult<Value> {
        if !self.has_next()? {
            return Err(RuntimeErrorKind::NoSuchElement);
        }
        let item = self.pending.take().ok_or(RuntimeErrorKind::NoSuchElement)?;
        self.cursor = self.cursor.saturating_add(1);
        Ok(item)
    }

    fn index(&self) -> i64 {
        self.cursor
    }
}

type Predicate = dyn FnMut(&Value) -> IterResult<Value> + Send;

/// Filter that invokes a function per item and keeps truthy results.
pub struct MethodFilter {
    method: Box<Predicate>,
}

impl MethodFilter {
    pub fn new<M>(method: M) -> Self
    where
        M: FnMut(&Value) -> IterResult<Value> + Send + 'static,
    {
        Self {
            method: Box::new(method),
        }
    }
}

impl Filter for MethodFilter {
    fn valid(&mut self, item: &Value) -> IterResult<bool> {
        (self.method)(item).map(|v| v.is_truthy())
    }
}

type Transform = dyn FnMut(Value) -> IterResult<Value> + Send;

/// Decorator that passes every delegate item through a function.
pub struct MethodMap {
    iter: Box<dyn Iter>,
    method: Box<Transform>,
}

impl MethodMap {
    pub fn new<M>(iter: Box<dyn Iter>, method: M) -> Self
    where
        M: FnMut(Value) -> IterResult<Value> + Send + 'static,
    {
        Self {
            iter,
            method: Box::new(method),
        }
    }
}

impl Iter for MethodMap {
    fn has_next(&mut self) -> IterResult<bool> {
        self.iter.has_next()
    }

    fn next(&mut self) -> IterResult<Value> {
        let item = self.iter.next()?;
        (self.method)(item)
    }

    fn index(&self) -> i64 {
        self.iter.index()
    }
}

/// Converts a value into an iterator for a `for` loop.
///
/// `null` yields `None`, which runs the loop's `else` branch. Lists are
/// snapshotted, maps iterate their keys, strings their characters and byte
/// strings their byte values.
pub fn to_iter(value: Value) -> IterResult<Option<Box<dyn Iter>>> {
    let iter: Box<dyn Iter> = match value {
        Value::Null => return Ok(None),
        Value::List(list) => Box::new(ListIter::new(list.read().clone())),
        Value::Map(map) => Box::new(ListIter::new(
            map.read().keys().map(|k| Value::Str(Arc::clone(k))).collect(),
        )),
        Value::Str(s) => Box::new(ListIter::new(
            s.chars().map(|c| Value::from(c.to_string())).collect(),
        )),
        Value::Bytes(bytes) => Box::new(ListIter::new(
            bytes.iter().map(|b| Value::Int(i64::from(*b))).collect(),
        )),
        Value::Range { from, to } => Box::new(RangeIter::new(from, to)),
        Value::Iter(handle) => Box::new(SharedIter(handle)),
        Value::Host(bean) => match bean.to_iter() {
            Some(iter) => iter,
            None => {
                return Err(RuntimeErrorKind::NotIterable {
                    type_name: bean.class().name.to_owned(),
                });
            }
        },
        other @ (Value::Bool(_)
        | Value::Int(_)
        | Value::Float(_)
        | Value::Function(_)
        | Value::Native(_)) => {
            return Err(RuntimeErrorKind::NotIterable {
                type_name: other.type_name().to_owned(),
            });
        }
    };
    Ok(Some(iter))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EvenValues;

    impl Filter for EvenValues {
        fn valid(&mut self, item: &Value) -> IterResult<bool> {
            Ok(item.as_int().is_some_and(|i| i % 2 == 0))
        }
    }

    fn ints(values: &[i64]) -> Box<dyn Iter> {
        Box::new(ListIter::new(values.iter().copied().map(Value::Int).collect()))
    }

    fn drain(iter: &mut dyn Iter) -> Vec<(Value, i64)> {
        let mut out = Vec::new();
        while iter.has_next().unwrap() {
            let item = iter.next().unwrap();
            out.push((item, iter.index()));
        }
        out
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_filter_keeps_order_and_counts() {
        let mut filtered = IterFilter::new(ints(&[1, 2, 3, 4, 6, 7]), EvenValues);
        assert_eq!(filtered.index(), -1);
        let produced = drain(&mut filtered);
        assert_eq!(
            produced,
            vec![(Value::Int(2), 0), (Value::Int(4), 1), (Value::Int(6), 2)]
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_filter_next_without_has_next() {
        let mut filtered = IterFilter::new(ints(&[1, 2]), EvenValues);
        assert_eq!(filtered.next().unwrap(), Value::Int(2));
        assert!(matches!(
            filtered.next(),
            Err(RuntimeErrorKind::NoSuchElement)
        ));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_filter_has_next_is_idempotent() {
        let mut filtered = IterFilter::new(ints(&[1, 3, 4]), EvenValues);
        assert!(filtered.has_next().unwrap());
        assert!(filtered.has_next().unwrap());
        assert_eq!(filtered.next().unwrap(), Value::Int(4));
        assert!(!filtered.has_next().unwrap());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_method_filter_uses_truthiness() {
        let filter = MethodFilter::new(|item: &Value| Ok(Value::Bool(item.as_int() > Some(1))));
        let mut filtered = IterFilter::new(ints(&[0, 1, 2, 3]), filter);
        let produced: Vec<_> = drain(&mut filtered).into_iter().map(|(v, _)| v).collect();
        assert_eq!(produced, vec![Value::Int(2), Value::Int(3)]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_method_filter_propagates_errors() {
        let filter = MethodFilter::new(|_: &Value| Err(RuntimeErrorKind::DivideByZero));
        let mut filtered = IterFilter::new(ints(&[1]), filter);
        assert!(matches!(
            filtered.has_next(),
            Err(RuntimeErrorKind::DivideByZero)
        ));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_method_map() {
        let mut mapped = MethodMap::new(ints(&[1, 2]), |v| {
            Ok(Value::Int(v.as_int().unwrap_or_default() * 10))
        });
        let produced = drain(&mut mapped);
        assert_eq!(produced, vec![(Value::Int(10), 0), (Value::Int(20), 1)]);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_range_directions() {
        let up: Vec<_> = drain(&mut RangeIter::new(1, 3)).into_iter().map(|(v, _)| v).collect();
        assert_eq!(up, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let down: Vec<_> = drain(&mut RangeIter::new(2, 0)).into_iter().map(|(v, _)| v).collect();
        assert_eq!(down, vec![Value::Int(2), Value::Int(1), Value::Int(0)]);
        let single = drain(&mut RangeIter::new(i64::MAX, i64::MAX));
        assert_eq!(single.len(), 1);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_to_iter() {
        assert!(to_iter(Value::Null).unwrap().is_none());
        let mut chars = to_iter(Value::from("ab")).unwrap().unwrap();
        assert_eq!(chars.next().unwrap(), Value::from("a"));
        let mut keys = to_iter(Value::map([("x", Value::Int(1))])).unwrap().unwrap();
        assert_eq!(keys.next().unwrap(), Value::from("x"));
        assert!(matches!(
            to_iter(Value::Int(3)),
            Err(RuntimeErrorKind::NotIterable { type_name }) if type_name == "int"
        ));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_list_snapshot() {
        let list = Value::list([Value::Int(1)]);
        let mut iter = to_iter(list.clone()).unwrap().unwrap();
        if let Value::List(items) = &list {
            items.write().push(Value::Int(2));
        }
        assert_eq!(drain(iter.as_mut()).len(), 1, "iteration sees a snapshot");
    }
}
