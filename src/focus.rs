//! Remembers where the user was across a detail round trip.

/// What the overview list currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListRender {
    /// Placeholder while the first snapshot is loading.
    Loading,
    /// Real data with this many rows.
    Ready(usize),
}

/// Single remembered position. Reading it clears it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FocusMemento {
    position: Option<usize>,
}

impl FocusMemento {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded by the "leave" transition of a detail screen.
    pub fn record(&mut self, position: usize) {
        self.position = Some(position);
    }

    /// Consumed by the "return" transition of the overview.
    pub fn take(&mut self) -> Option<usize> {
        self.position.take()
    }

    pub fn peek(&self) -> Option<usize> {
        self.position
    }
}

/// A restore waiting for the list to hold real data.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingFocusRestore {
    target: Option<usize>,
}

impl PendingFocusRestore {
    pub fn new(target: Option<usize>) -> Self {
        Self { target }
    }

    pub fn is_pending(&self) -> bool {
        self.target.is_some()
    }

    /// Returns the position to focus once, and only once the list is ready.
    /// Positions past the end clamp to the last row; an empty list drops
    /// the restore.
    pub fn on_render(&mut self, render: ListRender) -> Option<usize> {
        let ListRender::Ready(len) = render else {
            return None;
        };
        let target = self.target.take()?;
        if len == 0 {
            return None;
        }
        Some(target.min(len - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_two_targets() {
        let mut memento = FocusMemento::new();

        memento.record(3);
        let mut restore = PendingFocusRestore::new(memento.take());
        assert_eq!(restore.on_render(ListRender::Ready(20)), Some(3));
        assert_eq!(memento.peek(), None);

        memento.record(9);
        let mut restore = PendingFocusRestore::new(memento.take());
        assert_eq!(restore.on_render(ListRender::Ready(20)), Some(9));
        assert_eq!(memento.peek(), None);
    }

    #[test]
    fn test_return_without_leave_restores_nothing() {
        let mut memento = FocusMemento::new();
        memento.record(4);
        let _ = memento.take();

        let mut restore = PendingFocusRestore::new(memento.take());
        assert_eq!(restore.on_render(ListRender::Ready(10)), None);
    }

    #[test]
    fn test_restore_waits_for_real_data() {
        let mut restore = PendingFocusRestore::new(Some(5));

        assert_eq!(restore.on_render(ListRender::Loading), None);
        assert!(restore.is_pending());

        assert_eq!(restore.on_render(ListRender::Ready(8)), Some(5));
        assert!(!restore.is_pending());
        assert_eq!(restore.on_render(ListRender::Ready(8)), None);
    }

    #[test]
    fn test_restore_clamps_to_shorter_list() {
        let mut restore = PendingFocusRestore::new(Some(9));
        assert_eq!(restore.on_render(ListRender::Ready(4)), Some(3));

        let mut restore = PendingFocusRestore::new(Some(2));
        assert_eq!(restore.on_render(ListRender::Ready(0)), None);
    }
}
