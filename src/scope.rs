//! Parse-time variable slot allocation.

use std::{collections::HashMap, sync::Arc};

use crate::error::ParseErrorKind;

/// A loop visible to `break`, `continue` and `for.iter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopScope {
    pub label: usize,
    pub iter_slot: usize,
}

#[derive(Debug, Default)]
struct Frame {
    scopes: Vec<HashMap<Arc<str>, usize>>,
    next_slot: usize,
    loops: Vec<LoopScope>,
}

impl Frame {
    fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
            ..Self::default()
        }
    }

    fn allocate(&mut self) -> usize {
        let slot = self.next_slot;
        self.next_slot = slot.saturating_add(1);
        slot
    }
}

/// Maps variable names to slots. Each function body gets its own frame;
/// slots are never reused within a frame, so the slot count of a frame is
/// its high-water mark.
#[derive(Debug)]
pub struct VariantManager {
    root: Frame,
    functions: Vec<Frame>,
}

impl Default for VariantManager {
    fn default() -> Self {
        Self::new()
    }
}

impl VariantManager {
    pub fn new() -> Self {
        Self {
            root: Frame::new(),
            functions: Vec::new(),
        }
    }

    fn frame(&self) -> &Frame {
        self.functions.last().unwrap_or(&self.root)
    }

    fn frame_mut(&mut self) -> &mut Frame {
        match self.functions.last_mut() {
            Some(frame) => frame,
            None => &mut self.root,
        }
    }

    pub fn is_root_frame(&self) -> bool {
        self.functions.is_empty()
    }

    /// Declares `name` in the innermost scope.
    pub fn declare(&mut self, name: &Arc<str>) -> Result<usize, ParseErrorKind> {
        let frame = self.frame_mut();
        let slot = frame.next_slot;
        let scope = frame
            .scopes
            .last_mut()
            .ok_or_else(|| ParseErrorKind::CorruptTables("scope stack is empty".to_owned()))?;
        if scope.contains_key(name) {
            return Err(ParseErrorKind::DuplicateVariable {
                name: name.to_string(),
            });
        }
        scope.insert(Arc::clone(name), slot);
        frame.next_slot = slot.saturating_add(1);
        Ok(slot)
    }

    /// Allocates a slot no name refers to.
    pub fn declare_hidden(&mut self) -> usize {
        self.frame_mut().allocate()
    }

    /// Declares `name` in the outermost scope of the root frame.
    pub fn declare_root(&mut self, name: &Arc<str>) -> usize {
        let root = &mut self.root;
        if let Some(slot) = root.scopes.first().and_then(|scope| scope.get(name)) {
            return *slot;
        }
        let slot = root.allocate();
        if let Some(scope) = root.scopes.first_mut() {
            scope.insert(Arc::clone(name), slot);
        }
        slot
    }

    /// Finds `name` in the scopes of the current frame, innermost first.
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.frame()
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    pub fn push_scope(&mut self) {
        self.frame_mut().scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        let frame = self.frame_mut();
        if frame.scopes.len() > 1 {
            frame.scopes.pop();
        }
    }

    pub fn push_frame(&mut self) {
        self.functions.push(Frame::new());
    }

    /// Leaves a function frame, returning its slot count.
    pub fn pop_frame(&mut self) -> usize {
        self.functions
            .pop()
            .map_or(self.root.next_slot, |frame| frame.next_slot)
    }

    pub fn frame_size(&self) -> usize {
        self.frame().next_slot
    }

    pub fn push_loop(&mut self, scope: LoopScope) {
        self.frame_mut().loops.push(scope);
    }

    pub fn pop_loop(&mut self) {
        self.frame_mut().loops.pop();
    }

    /// The innermost loop of the current frame.
    pub fn innermost_loop(&self) -> Option<LoopScope> {
        self.frame().loops.last().copied()
    }

    pub fn has_loop(&self, label: usize) -> bool {
        self.frame().loops.iter().any(|l| l.label == label)
    }
}

/// Assigns loop label names their indices. Unlabelled loops share index `0`.
#[derive(Debug, Default)]
pub struct LabelMap {
    labels: HashMap<Arc<str>, usize>,
}

impl LabelMap {
    pub fn index(&mut self, label: Option<&Arc<str>>) -> usize {
        let Some(label) = label else {
            return 0;
        };
        let next = self.labels.len().saturating_add(1);
        *self.labels.entry(Arc::clone(label)).or_insert(next)
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Arc<str> {
        Arc::from(s)
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_slots_are_monotonic_and_scoped() {
        let mut vars = VariantManager::new();
        assert_eq!(vars.declare(&name("a")).unwrap(), 0);
        vars.push_scope();
        assert_eq!(vars.declare(&name("b")).unwrap(), 1);
        assert_eq!(vars.declare(&name("a")).unwrap(), 2, "shadowing is allowed");
        assert_eq!(vars.lookup("a"), Some(2));
        vars.pop_scope();
        assert_eq!(vars.lookup("a"), Some(0));
        assert_eq!(vars.lookup("b"), None);
        assert_eq!(vars.declare(&name("c")).unwrap(), 3);
        assert_eq!(vars.frame_size(), 4);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_duplicate_in_same_scope() {
        let mut vars = VariantManager::new();
        vars.declare(&name("a")).unwrap();
        assert_eq!(
            vars.declare(&name("a")),
            Err(ParseErrorKind::DuplicateVariable {
                name: "a".to_owned()
            })
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_frames_are_isolated() {
        let mut vars = VariantManager::new();
        vars.declare(&name("outer")).unwrap();
        vars.push_frame();
        assert!(!vars.is_root_frame());
        assert_eq!(vars.lookup("outer"), None);
        assert_eq!(vars.declare(&name("arg")).unwrap(), 0);
        vars.declare_hidden();
        assert_eq!(vars.pop_frame(), 2);
        assert!(vars.is_root_frame());
        assert_eq!(vars.lookup("outer"), Some(0));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_declare_root_from_nested_scope() {
        let mut vars = VariantManager::new();
        vars.push_scope();
        let slot = vars.declare_root(&name("p"));
        assert_eq!(vars.declare_root(&name("p")), slot);
        vars.pop_scope();
        assert_eq!(vars.lookup("p"), Some(slot));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_loops_and_labels() {
        let mut vars = VariantManager::new();
        let mut labels = LabelMap::default();
        assert_eq!(labels.index(None), 0);
        let outer = labels.index(Some(&name("outer")));
        assert_eq!(outer, 1);
        assert_eq!(labels.index(Some(&name("inner"))), 2);
        assert_eq!(labels.index(Some(&name("outer"))), 1);
        assert_eq!(labels.get("inner"), Some(2));

        assert_eq!(vars.innermost_loop(), None);
        vars.push_loop(LoopScope {
            label: outer,
            iter_slot: 3,
        });
        assert!(vars.has_loop(outer));
        vars.push_frame();
        assert!(!vars.has_loop(outer), "loops do not cross function frames");
        vars.pop_frame();
        vars.pop_loop();
        assert!(!vars.has_loop(outer));
    }
}
