#![forbid(unsafe_code)]

//! Widget ownership of planes.
//!
//! Higher-level widgets live outside the render core. A plane only records
//! which kind of widget owns it and, optionally, a hook that is told when the
//! plane goes away.

use std::fmt;

/// The kind of widget that owns a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Menu,
    Selector,
    MultiSelector,
    Reader,
    Reel,
    Tabbed,
    Tree,
    Plot,
    Progress,
    /// Any widget defined by the application.
    Custom(u32),
}

/// Callback surface for widgets that must release state with their plane.
pub trait WidgetHook: Send {
    /// Called exactly once, after the plane is unlinked but before its cells
    /// are dropped.
    fn on_destroy(&mut self, kind: WidgetKind);
}

/// A widget binding stored on a plane.
pub struct WidgetBinding {
    pub kind: WidgetKind,
    hook: Option<Box<dyn WidgetHook>>,
}

impl WidgetBinding {
    pub fn new(kind: WidgetKind) -> Self {
        Self { kind, hook: None }
    }

    #[must_use]
    pub fn with_hook(mut self, hook: Box<dyn WidgetHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Run the hook. Later calls do nothing.
    pub(crate) fn fire(&mut self) {
        if let Some(mut hook) = self.hook.take() {
            hook.on_destroy(self.kind);
        }
    }
}

impl fmt::Debug for WidgetBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetBinding")
            .field("kind", &self.kind)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counter(Arc<AtomicU32>);

    impl WidgetHook for Counter {
        fn on_destroy(&mut self, _kind: WidgetKind) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn hook_fires_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut binding = WidgetBinding::new(WidgetKind::Menu).with_hook(Box::new(Counter(calls.clone())));
        binding.fire();
        binding.fire();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn binding_without_hook_is_inert() {
        let mut binding = WidgetBinding::new(WidgetKind::Custom(7));
        binding.fire();
        assert_eq!(binding.kind, WidgetKind::Custom(7));
    }
}
