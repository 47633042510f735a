//! Volume and pause groups.
//!
//! Mixers form a tree under the graph's master mixer. A sound's effective
//! volume is its own volume times the product of its mixer chain; it is
//! paused if it or any mixer above it is paused. Mixers live entirely on
//! the control side: sounds pick up changes in [`Sound::update`](crate::Sound::update).

use std::sync::Arc;

use parking_lot::Mutex;

struct MixerState {
    volume: f32,
    paused: bool,
    parent: Option<Mixer>,
}

struct MixerInner {
    name: String,
    master: bool,
    state: Mutex<MixerState>,
}

/// Shared handle to a node of the mixer tree.
#[derive(Clone)]
pub struct Mixer {
    inner: Arc<MixerInner>,
}

impl Mixer {
    /// New master mixer: the root of a tree.
    pub(crate) fn new() -> Self {
        Self::build("master", true, None)
    }

    fn build(name: &str, master: bool, parent: Option<Mixer>) -> Self {
        Self {
            inner: Arc::new(MixerInner {
                name: name.to_owned(),
                master,
                state: Mutex::new(MixerState {
                    volume: 1.0,
                    paused: false,
                    parent,
                }),
            }),
        }
    }

    /// New mixer under `self`.
    pub fn child(&self, name: &str) -> Self {
        Self::build(name, false, Some(self.clone()))
    }

    /// Name given at creation.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether this is the master mixer.
    pub fn is_master(&self) -> bool {
        self.inner.master
    }

    /// Parent mixer; `None` only for the master.
    pub fn parent(&self) -> Option<Mixer> {
        self.inner.state.lock().parent.clone()
    }

    /// Moves this mixer under `parent`. Fails (with an error logged) for the
    /// master mixer or if `parent` is this mixer or one of its descendants.
    pub fn set_parent(&self, parent: &Mixer) -> bool {
        if self.is_master() {
            tracing::error!("the master mixer cannot have a parent");
            return false;
        }
        let mut cursor = Some(parent.clone());
        while let Some(mixer) = cursor {
            if mixer.ptr_eq(self) {
                tracing::error!(mixer = self.name(), parent = parent.name(), "mixer parent would form a cycle");
                return false;
            }
            cursor = mixer.parent();
        }
        self.inner.state.lock().parent = Some(parent.clone());
        true
    }

    /// Sets this mixer's own volume (negative values clamp to 0).
    pub fn set_volume(&self, volume: f32) {
        self.inner.state.lock().volume = volume.max(0.0);
    }

    /// This mixer's own volume.
    pub fn volume(&self) -> f32 {
        self.inner.state.lock().volume
    }

    /// Product of the volumes from this mixer up to the master.
    pub fn mixed_volume(&self) -> f32 {
        let mut volume = 1.0;
        let mut cursor = Some(self.clone());
        while let Some(mixer) = cursor {
            let state = mixer.inner.state.lock();
            volume *= state.volume;
            cursor = state.parent.clone();
        }
        volume
    }

    /// Pauses or resumes everything under this mixer.
    pub fn set_paused(&self, paused: bool) {
        self.inner.state.lock().paused = paused;
    }

    /// This mixer's own pause flag.
    pub fn is_paused(&self) -> bool {
        self.inner.state.lock().paused
    }

    /// Whether this mixer or any mixer above it is paused.
    pub fn is_mixed_paused(&self) -> bool {
        let mut cursor = Some(self.clone());
        while let Some(mixer) = cursor {
            let state = mixer.inner.state.lock();
            if state.paused {
                return true;
            }
            cursor = state.parent.clone();
        }
        false
    }

    /// Whether both handles refer to the same mixer.
    pub fn ptr_eq(&self, other: &Mixer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Mixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Mixer")
            .field("name", &self.inner.name)
            .field("volume", &state.volume)
            .field("paused", &state.paused)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_multiplies_down_the_tree() {
        let master = Mixer::new();
        let music = master.child("music");
        let ambient = music.child("ambient");
        master.set_volume(0.5);
        music.set_volume(0.5);
        ambient.set_volume(0.8);
        assert_eq!(ambient.mixed_volume(), 0.2);
        assert_eq!(ambient.volume(), 0.8);
        music.set_volume(-1.0);
        assert_eq!(ambient.mixed_volume(), 0.0);
    }

    #[test]
    fn pause_propagates_to_descendants() {
        let master = Mixer::new();
        let sfx = master.child("sfx");
        let ui = sfx.child("ui");
        sfx.set_paused(true);
        assert!(ui.is_mixed_paused());
        assert!(!ui.is_paused());
        assert!(!master.is_mixed_paused());
        sfx.set_paused(false);
        assert!(!ui.is_mixed_paused());
    }

    #[test]
    fn reparenting_rejects_cycles_and_master() {
        let master = Mixer::new();
        let a = master.child("a");
        let b = a.child("b");
        let c = master.child("c");

        assert!(!a.set_parent(&b));
        assert!(!a.set_parent(&a));
        assert!(!master.set_parent(&c));
        assert!(b.set_parent(&c));
        assert!(b.parent().unwrap().ptr_eq(&c));
        c.set_volume(0.25);
        assert_eq!(b.mixed_volume(), 0.25);
    }
}
