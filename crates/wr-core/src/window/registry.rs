use std::collections::BTreeMap;

use super::{WindowKey, WindowState};

/// Live windows of one partition, ordered by key.
///
/// Holds only windows that have not been closed. Keys are never reused:
/// the engine refuses to create a window the watermark has already passed.
#[derive(Debug)]
pub struct WindowRegistry<A> {
    windows: BTreeMap<WindowKey, WindowState<A>>,
}

impl<A> Default for WindowRegistry<A> {
    fn default() -> Self {
        Self {
            windows: BTreeMap::new(),
        }
    }
}

impl<A> WindowRegistry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for `key`, created with `init()` on first reference.
    pub fn get_or_init(
        &mut self,
        key: WindowKey,
        now_millis: i64,
        init: impl FnOnce() -> A,
    ) -> &mut WindowState<A> {
        self.windows
            .entry(key)
            .or_insert_with(|| WindowState::new(key, init(), now_millis))
    }

    pub fn get(&self, key: &WindowKey) -> Option<&WindowState<A>> {
        self.windows.get(key)
    }

    pub fn get_mut(&mut self, key: &WindowKey) -> Option<&mut WindowState<A>> {
        self.windows.get_mut(key)
    }

    pub fn remove(&mut self, key: &WindowKey) -> Option<WindowState<A>> {
        self.windows.remove(key)
    }

    /// Keys of every window with `end <= watermark`, in key order.
    pub fn closable(&self, watermark: i64) -> Vec<WindowKey> {
        // A window starting at or after the watermark cannot end before it.
        self.windows
            .keys()
            .take_while(|k| k.start() < watermark)
            .filter(|k| k.is_closed_at(watermark))
            .copied()
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = WindowKey> + '_ {
        self.windows.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WindowState<A>> {
        self.windows.values()
    }

    /// Drop every window, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let n = self.windows.len();
        self.windows.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(start: i64, end: i64) -> WindowKey {
        WindowKey::new(start, end).unwrap()
    }

    #[test]
    fn get_or_init_creates_once() {
        let mut reg: WindowRegistry<u32> = WindowRegistry::new();
        let mut inits = 0;
        reg.get_or_init(key(0, 10), 0, || {
            inits += 1;
            7
        })
        .acc += 1;
        reg.get_or_init(key(0, 10), 5, || {
            inits += 1;
            7
        })
        .acc += 1;
        assert_eq!(inits, 1);
        assert_eq!(*reg.get(&key(0, 10)).unwrap().accumulator(), 9);
    }

    #[test]
    fn remove_forgets_window() {
        let mut reg: WindowRegistry<u32> = WindowRegistry::new();
        reg.get_or_init(key(0, 10), 0, || 0);
        assert!(reg.remove(&key(0, 10)).is_some());
        assert!(reg.remove(&key(0, 10)).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn closable_respects_end_bound() {
        let mut reg: WindowRegistry<u32> = WindowRegistry::new();
        for (s, e) in [(0, 10), (5, 15), (10, 20), (-10, 0)] {
            reg.get_or_init(key(s, e), 0, || 0);
        }
        assert_eq!(reg.closable(9), vec![key(-10, 0)]);
        assert_eq!(reg.closable(10), vec![key(-10, 0), key(0, 10)]);
        assert_eq!(
            reg.closable(20),
            vec![key(-10, 0), key(0, 10), key(5, 15), key(10, 20)]
        );
    }
}
