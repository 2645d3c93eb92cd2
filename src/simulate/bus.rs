//! Invalidation bus: delivers page-eviction notifications to the DTLB and
//! to every cache level that might hold blocks from the evicted page.
//!
//! The original Python simulator delivered these in plain registration
//! order. Registration order does not guarantee a listener closer to the
//! CPU is notified before one closer to memory, so here delivery is sorted
//! by `height` (hops to main memory, ascending) at registration time and
//! walked top-down. The listener set is closed (DTLB, cache levels) and
//! small, so this is a plain enum rather than a trait object.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerKind {
    Dtlb,
    Cache,
}

#[derive(Clone, Copy, Debug)]
struct Listener {
    kind: ListenerKind,
    /// Index into the simulator's own `Vec` for that listener kind,
    /// disambiguating among multiple cache levels (DC, L2).
    level_index: usize,
    height: u32,
}

#[derive(Default)]
pub struct InvalidationBus {
    listeners: Vec<Listener>,
}

impl InvalidationBus {
    pub fn new() -> Self {
        InvalidationBus { listeners: Vec::new() }
    }

    pub fn register(&mut self, kind: ListenerKind, level_index: usize, height: u32) {
        self.listeners.push(Listener {
            kind,
            level_index,
            height,
        });
        self.listeners.sort_by_key(|l| l.height);
    }

    /// Returns `(kind, level_index)` pairs in top-down delivery order.
    pub fn ordered_listeners(&self) -> impl Iterator<Item = (ListenerKind, usize)> + '_ {
        self.listeners.iter().map(|l| (l.kind, l.level_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_top_down_by_height() {
        let mut bus = InvalidationBus::new();
        bus.register(ListenerKind::Cache, 1, 2); // L2, further from CPU
        bus.register(ListenerKind::Dtlb, 0, 0);
        bus.register(ListenerKind::Cache, 0, 1); // DC, closer to CPU
        let order: Vec<_> = bus.ordered_listeners().collect();
        assert_eq!(
            order,
            vec![
                (ListenerKind::Dtlb, 0),
                (ListenerKind::Cache, 0),
                (ListenerKind::Cache, 1),
            ]
        );
    }
}
