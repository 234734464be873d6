use parking_lot::Mutex;
use tokio::time::Instant;

/// Emplacement unique d'un snapshot en mémoire + instant du dernier remplissage.
///
/// Vide au démarrage, écrasé à chaque fetch réussi, jamais vidé ensuite.
/// Le verrou n'est jamais tenu pendant un `.await` : lecture = clone.
pub struct SnapshotSlot<T> {
    inner: Mutex<Option<(T, Instant)>>,
}

impl<T: Clone> SnapshotSlot<T> {
    pub fn new() -> Self {
        Self { inner: Mutex::new(None) }
    }

    /// Dernier snapshot stocké, quel que soit son âge
    pub fn get(&self) -> Option<T> {
        self.inner.lock().as_ref().map(|(value, _)| value.clone())
    }

    /// Snapshot stocké seulement s'il a moins de `max_age`
    pub fn get_fresh(&self, max_age: std::time::Duration) -> Option<T> {
        let slot = self.inner.lock();
        match slot.as_ref() {
            Some((value, stored_at)) if stored_at.elapsed() < max_age => Some(value.clone()),
            _ => None,
        }
    }

    pub fn store(&self, value: T) {
        *self.inner.lock() = Some((value, Instant::now()));
    }
}

impl<T: Clone> Default for SnapshotSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
