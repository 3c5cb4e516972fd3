//! Generic fixed-capacity slot table.
//!
//! A [`ResourceSlots`] maps keys to small stable indices that shaders use to
//! index descriptor arrays. Loading is lazy and idempotent; eviction is explicit.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{LoadError, Result, SlotError};

/// Strategy for loading and releasing the resources held by a slot table.
///
/// Loaders are invoked by the table; the table never holds its bookkeeping lock
/// while a loader runs, so loads of different keys proceed in parallel.
pub trait SlotLoader: Send + Sync {
    /// Key identifying an asset.
    type Key: Copy + Eq + Hash + fmt::Debug + Send + Sync;
    /// Loaded resource stored in a slot.
    type Resource: Send + Sync;

    /// Table name used in logs and errors.
    const KIND: &'static str;

    /// Key substituted for assets that can't be loaded.
    fn placeholder_key(&self) -> Self::Key;

    /// Load the resource for `key`.
    fn load(&self, key: Self::Key) -> std::result::Result<Self::Resource, LoadError>;

    /// Release a resource evicted from its slot.
    fn release(&self, resource: Self::Resource);

    /// Human-readable name for a key.
    fn describe(&self, key: Self::Key) -> String {
        format!("{key:?}")
    }
}

/// Outcome of loading a single key, before placeholder fallback.
enum Lookup {
    Slot(u32),
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Empty,
    /// Reserved for a key whose load is in progress.
    Loading,
    Resident,
}

struct SlotBook<K, const N: usize> {
    state: [SlotState; N],
    /// Also maps unavailable keys to the placeholder's slot.
    lookup: HashMap<K, u32>,
    reverse: [Option<K>; N],
}

impl<K: Copy + Eq + Hash, const N: usize> SlotBook<K, N> {
    fn new() -> Self {
        Self {
            state: [SlotState::Empty; N],
            lookup: HashMap::with_capacity(N),
            reverse: [None; N],
        }
    }

    fn free_slot(&self) -> Option<usize> {
        self.state.iter().position(|state| *state == SlotState::Empty)
    }

    fn reserve(&mut self, slot: usize, key: K) {
        self.state[slot] = SlotState::Loading;
        self.reverse[slot] = Some(key);
        self.lookup.insert(key, slot as u32);
    }

    fn clear(&mut self, slot: usize) {
        self.state[slot] = SlotState::Empty;
        if let Some(key) = self.reverse[slot].take() {
            self.lookup.remove(&key);
            self.lookup.retain(|_, aliased| *aliased as usize != slot);
        }
    }
}

/// Fixed-capacity cache of `N` slots keyed by `L::Key`.
///
/// Slot indices stay valid until [`unload`](Self::unload) is called. No
/// reference counting is done; callers must know a slot is unused before
/// unloading it.
pub struct ResourceSlots<L: SlotLoader, const N: usize> {
    loader: L,
    book: Mutex<SlotBook<L::Key, N>>,
    /// Signalled whenever a slot leaves the `Loading` state.
    load_finished: Condvar,
    slots: Box<[RwLock<Option<L::Resource>>]>,
    loads: AtomicU64,
}

impl<L: SlotLoader, const N: usize> ResourceSlots<L, N> {
    /// Create an empty table.
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            book: Mutex::new(SlotBook::new()),
            load_finished: Condvar::new(),
            slots: (0..N).map(|_| RwLock::new(None)).collect(),
            loads: AtomicU64::new(0),
        }
    }

    /// The loader backing this table.
    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Number of slots.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of present slots, including ones still loading.
    pub fn len(&self) -> usize {
        let book = self.book.lock();
        book.state.iter().filter(|s| **s != SlotState::Empty).count()
    }

    /// Check if no slot is present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of loader invocations that produced a resource.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// Return the slot holding `key`, loading it into a free slot first if needed.
    ///
    /// Assets the loader reports as unavailable resolve to the placeholder's
    /// slot, and later calls for the same key go straight there until that
    /// slot is unloaded. A full table is a fatal error; nothing is evicted
    /// implicitly.
    pub fn load_or_get(&self, key: L::Key) -> Result<u32> {
        let reason = match self.load_key(key)? {
            Lookup::Slot(slot) => return Ok(slot),
            Lookup::Unavailable(reason) => reason,
        };

        let placeholder = self.loader.placeholder_key();
        if key == placeholder {
            return Err(SlotError::MissingPlaceholder {
                table: L::KIND,
                key: self.loader.describe(key),
                reason,
            });
        }
        warn!(
            "{} {} unavailable ({}), using placeholder",
            L::KIND,
            self.loader.describe(key),
            reason
        );

        let slot = match self.load_key(placeholder)? {
            Lookup::Slot(slot) => slot,
            Lookup::Unavailable(reason) => {
                return Err(SlotError::MissingPlaceholder {
                    table: L::KIND,
                    key: self.loader.describe(placeholder),
                    reason,
                });
            }
        };

        let mut book = self.book.lock();
        let index = slot as usize;
        if book.state[index] == SlotState::Resident && book.reverse[index] == Some(placeholder) {
            book.lookup.entry(key).or_insert(slot);
        }
        Ok(slot)
    }

    /// Resolve `key` to its own slot without placeholder fallback.
    fn load_key(&self, key: L::Key) -> Result<Lookup> {
        loop {
            let slot = {
                let mut book = self.book.lock();

                if let Some(&slot) = book.lookup.get(&key) {
                    while book.state[slot as usize] == SlotState::Loading {
                        self.load_finished.wait(&mut book);
                    }
                    if book.state[slot as usize] == SlotState::Resident
                        && book.lookup.get(&key) == Some(&slot)
                    {
                        return Ok(Lookup::Slot(slot));
                    }
                    // The load we waited on failed and released the slot
                    continue;
                }

                let Some(slot) = book.free_slot() else {
                    return Err(SlotError::OutOfSlots {
                        table: L::KIND,
                        capacity: N,
                    });
                };
                book.reserve(slot, key);
                slot
            };

            return match self.loader.load(key) {
                Ok(resource) => {
                    *self.slots[slot].write() = Some(resource);
                    {
                        let mut book = self.book.lock();
                        book.state[slot] = SlotState::Resident;
                    }
                    self.load_finished.notify_all();
                    self.loads.fetch_add(1, Ordering::Relaxed);
                    info!("{} slot {} set to {}", L::KIND, slot, self.loader.describe(key));
                    Ok(Lookup::Slot(slot as u32))
                }
                Err(LoadError::Unavailable(reason)) => {
                    self.release_reservation(slot);
                    Ok(Lookup::Unavailable(reason))
                }
                Err(LoadError::Fatal(err)) => {
                    self.release_reservation(slot);
                    Err(err)
                }
            };
        }
    }

    fn release_reservation(&self, slot: usize) {
        {
            let mut book = self.book.lock();
            book.clear(slot);
        }
        self.load_finished.notify_all();
    }

    /// Slot for `key` if it is resident. Never loads.
    ///
    /// Keys that resolved to the placeholder are not resident themselves.
    pub fn get(&self, key: L::Key) -> Option<u32> {
        let book = self.book.lock();
        book.lookup.get(&key).copied().filter(|slot| {
            let index = *slot as usize;
            book.state[index] == SlotState::Resident && book.reverse[index] == Some(key)
        })
    }

    /// Whether `key` is resident.
    pub fn is_loaded(&self, key: L::Key) -> bool {
        self.get(key).is_some()
    }

    /// Whether the slot is occupied or reserved.
    pub fn is_slot_present(&self, slot: u32) -> bool {
        let book = self.book.lock();
        book.state
            .get(slot as usize)
            .is_some_and(|state| *state != SlotState::Empty)
    }

    /// Key currently occupying the slot.
    pub fn key_for_slot(&self, slot: u32) -> Option<L::Key> {
        let book = self.book.lock();
        book.reverse.get(slot as usize).copied().flatten()
    }

    /// Snapshot of all keys currently occupying slots.
    pub fn keys(&self) -> Vec<L::Key> {
        let book = self.book.lock();
        book.reverse.iter().filter_map(|key| *key).collect()
    }

    /// Execute a function with read access to a resident slot.
    ///
    /// Returns `None` if the slot is empty or still loading.
    pub fn with_slot<F, R>(&self, slot: u32, f: F) -> Option<R>
    where
        F: FnOnce(&L::Resource) -> R,
    {
        let resource = self.slots.get(slot as usize)?.read();
        resource.as_ref().map(f)
    }

    /// Evict a resident slot and release its resource.
    ///
    /// Returns false if the slot was empty or is still loading.
    pub fn unload(&self, slot: u32) -> bool {
        let index = slot as usize;
        let resource = {
            let mut book = self.book.lock();
            match book.state.get(index) {
                Some(SlotState::Resident) => {}
                Some(SlotState::Loading) => {
                    warn!("{} slot {} is still loading, not unloading", L::KIND, slot);
                    return false;
                }
                Some(SlotState::Empty) | None => return false,
            }
            book.clear(index);
            self.slots[index].write().take()
        };

        if let Some(resource) = resource {
            self.loader.release(resource);
        }
        debug!("{} slot {} unloaded", L::KIND, slot);
        true
    }

    /// Evict every resident slot.
    pub fn unload_all(&self) {
        for slot in 0..N as u32 {
            self.unload(slot);
        }
    }
}

impl<L: SlotLoader, const N: usize> Drop for ResourceSlots<L, N> {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(resource) = slot.get_mut().take() {
                self.loader.release(resource);
            }
        }
    }
}

impl<L: SlotLoader, const N: usize> fmt::Debug for ResourceSlots<L, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceSlots")
            .field("kind", &L::KIND)
            .field("capacity", &N)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    const MISSING: u32 = 999;

    /// Loader over integer keys; keys listed in `absent` are unavailable.
    #[derive(Default)]
    struct CountingLoader {
        loads: AtomicUsize,
        attempts: AtomicUsize,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
        releases: AtomicUsize,
        absent: Vec<u32>,
        delay: Option<Duration>,
    }

    impl SlotLoader for CountingLoader {
        type Key = u32;
        type Resource = String;
        const KIND: &'static str = "test";

        fn placeholder_key(&self) -> u32 {
            MISSING
        }

        fn load(&self, key: u32) -> std::result::Result<String, LoadError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
                thread::sleep(delay);
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
            if self.absent.contains(&key) {
                return Err(LoadError::Unavailable(format!("no data for {key}")));
            }
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(format!("resource-{key}"))
        }

        fn release(&self, _resource: String) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn table<const N: usize>() -> ResourceSlots<CountingLoader, N> {
        ResourceSlots::new(CountingLoader::default())
    }

    #[test]
    fn load_is_idempotent() {
        let slots = table::<4>();
        let first = slots.load_or_get(7).unwrap();
        let second = slots.load_or_get(7).unwrap();

        assert_eq!(first, second);
        assert_eq!(slots.loader().loads.load(Ordering::SeqCst), 1);
        assert_eq!(slots.load_count(), 1);
        assert!(slots.is_loaded(7));
        assert_eq!(slots.with_slot(first, Clone::clone).as_deref(), Some("resource-7"));
    }

    #[test]
    fn distinct_keys_get_distinct_slots() {
        let slots = table::<4>();
        let a = slots.load_or_get(1).unwrap();
        let b = slots.load_or_get(2).unwrap();

        assert_ne!(a, b);
        assert_eq!(slots.key_for_slot(a), Some(1));
        assert_eq!(slots.key_for_slot(b), Some(2));
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn unloaded_slot_is_reused_for_new_key() {
        let slots = table::<1>();
        let idx = slots.load_or_get(1).unwrap();

        assert!(slots.unload(idx));
        assert!(!slots.is_slot_present(idx));
        assert_eq!(slots.key_for_slot(idx), None);
        assert_eq!(slots.loader().releases.load(Ordering::SeqCst), 1);

        let reused = slots.load_or_get(2).unwrap();
        assert_eq!(reused, idx);
        assert_eq!(slots.key_for_slot(idx), Some(2));
        assert!(!slots.is_loaded(1));
    }

    #[test]
    fn full_table_is_fatal() {
        let slots = table::<2>();
        slots.load_or_get(1).unwrap();
        slots.load_or_get(2).unwrap();

        let err = slots.load_or_get(3).unwrap_err();
        assert!(matches!(err, SlotError::OutOfSlots { table: "test", capacity: 2 }));
        assert_eq!(err.to_string(), "out of test slots (2 in use)");

        // Nothing was evicted
        assert!(slots.is_loaded(1));
        assert!(slots.is_loaded(2));
        // Cache hits still work on a full table
        assert!(slots.load_or_get(2).is_ok());
    }

    #[test]
    fn missing_asset_resolves_to_placeholder() {
        let slots = ResourceSlots::<_, 4>::new(CountingLoader {
            absent: vec![5],
            ..Default::default()
        });

        let idx = slots.load_or_get(5).unwrap();
        assert_eq!(slots.key_for_slot(idx), Some(MISSING));
        assert!(!slots.is_loaded(5));
        assert_eq!(slots.len(), 1);

        // Subsequent misses share the placeholder slot
        assert_eq!(slots.load_or_get(5).unwrap(), idx);
    }

    #[test]
    fn missing_asset_is_not_reloaded() {
        let slots = ResourceSlots::<_, 4>::new(CountingLoader {
            absent: vec![5],
            ..Default::default()
        });

        let idx = slots.load_or_get(5).unwrap();
        for _ in 0..10 {
            assert_eq!(slots.load_or_get(5).unwrap(), idx);
        }
        // One attempt for the missing key, one for the placeholder
        assert_eq!(slots.loader().attempts.load(Ordering::SeqCst), 2);
        assert_eq!(slots.get(5), None);
    }

    #[test]
    fn unloading_placeholder_forgets_missing_keys() {
        let slots = ResourceSlots::<_, 4>::new(CountingLoader {
            absent: vec![5],
            ..Default::default()
        });

        let idx = slots.load_or_get(5).unwrap();
        assert!(slots.unload(idx));
        assert!(slots.is_empty());

        // The key is tried again once the placeholder is gone
        assert_eq!(slots.load_or_get(5).unwrap(), idx);
        assert_eq!(slots.loader().attempts.load(Ordering::SeqCst), 4);
        assert_eq!(slots.key_for_slot(idx), Some(MISSING));
    }

    #[test]
    fn missing_placeholder_is_fatal() {
        let slots = ResourceSlots::<_, 4>::new(CountingLoader {
            absent: vec![5, MISSING],
            ..Default::default()
        });

        let err = slots.load_or_get(5).unwrap_err();
        assert!(matches!(err, SlotError::MissingPlaceholder { .. }));
        assert!(slots.is_empty());
    }

    #[test]
    fn unload_of_empty_slot_is_noop() {
        let slots = table::<2>();
        assert!(!slots.unload(0));
        assert!(!slots.unload(42));
        assert_eq!(slots.loader().releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn out_of_range_accessors_are_empty() {
        let slots = table::<2>();
        assert!(!slots.is_slot_present(2));
        assert_eq!(slots.key_for_slot(100), None);
        assert_eq!(slots.with_slot(100, |_| ()), None);
    }

    #[test]
    fn concurrent_loads_of_same_key_share_one_slot() {
        let slots = Arc::new(ResourceSlots::<_, 8>::new(CountingLoader {
            delay: Some(Duration::from_millis(5)),
            ..Default::default()
        }));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let slots = Arc::clone(&slots);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    slots.load_or_get(3).unwrap()
                })
            })
            .collect();

        let indices: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(indices.iter().all(|idx| *idx == indices[0]));
        assert_eq!(slots.loader().loads.load(Ordering::SeqCst), 1);
        assert_eq!(slots.loader().peak_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn loads_of_different_keys_overlap() {
        let slots = Arc::new(ResourceSlots::<_, 4>::new(CountingLoader {
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        }));
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [1, 2]
            .into_iter()
            .map(|key| {
                let slots = Arc::clone(&slots);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    slots.load_or_get(key).unwrap()
                })
            })
            .collect();

        let indices: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_ne!(indices[0], indices[1]);
        // Both loaders ran while the other was still sleeping
        assert_eq!(slots.loader().peak_in_flight.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unload_all_releases_everything() {
        let slots = table::<4>();
        slots.load_or_get(1).unwrap();
        slots.load_or_get(2).unwrap();
        slots.unload_all();

        assert!(slots.is_empty());
        assert_eq!(slots.loader().releases.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn drop_releases_resident_resources() {
        let releases = Arc::new(AtomicUsize::new(0));

        struct SharedCount(Arc<AtomicUsize>);

        impl SlotLoader for SharedCount {
            type Key = u32;
            type Resource = u32;
            const KIND: &'static str = "shared";

            fn placeholder_key(&self) -> u32 {
                0
            }

            fn load(&self, key: u32) -> std::result::Result<u32, LoadError> {
                Ok(key)
            }

            fn release(&self, _resource: u32) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        {
            let slots = ResourceSlots::<_, 4>::new(SharedCount(Arc::clone(&releases)));
            slots.load_or_get(1).unwrap();
            slots.load_or_get(2).unwrap();
        }
        assert_eq!(releases.load(Ordering::SeqCst), 2);
    }
}
