use crate::handle::EffectHandle;

/// Keeps fire-and-forget effects alive until they finish.
///
/// A handle stops its instance when dropped, so effects spawned from a
/// click or a hit need an owner. The pool draws everything it holds once
/// per [`update`](Self::update) and lets go of finished instances.
#[derive(Debug, Default)]
pub struct EffectPool {
    handles: Vec<EffectHandle>,
}

impl EffectPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `handle`. Empty handles are ignored.
    pub fn add(&mut self, handle: EffectHandle) {
        if !handle.is_empty() {
            self.handles.push(handle);
        }
    }

    /// Drop finished instances and queue a draw for the rest.
    pub fn update(&mut self) {
        self.handles.retain(EffectHandle::is_alive);
        for handle in &self.handles {
            handle.draw();
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EffectHandle> {
        self.handles.iter()
    }

    /// Drop every handle, stopping whatever still plays.
    pub fn clear(&mut self) {
        self.handles.clear();
    }
}
