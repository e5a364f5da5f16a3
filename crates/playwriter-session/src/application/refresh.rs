//! Coalescing for background refresh fetches.

/// At most one fetch in flight; requests arriving meanwhile collapse into a
/// single follow-up.
#[derive(Debug, Default)]
pub(crate) struct Coalescer {
    in_flight: bool,
    dirty: bool,
}

impl Coalescer {
    /// Returns `true` if the caller should start a fetch now.
    pub(crate) fn request(&mut self) -> bool {
        if self.in_flight {
            self.dirty = true;
            false
        } else {
            self.in_flight = true;
            true
        }
    }

    /// Marks the current fetch settled. Returns `true` if a follow-up fetch
    /// should start now.
    pub(crate) fn settle(&mut self) -> bool {
        if self.dirty {
            self.dirty = false;
            true
        } else {
            self.in_flight = false;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_starts_fetch() {
        let mut coalescer = Coalescer::default();
        assert!(coalescer.request());
        assert!(!coalescer.settle());
        assert!(coalescer.request());
    }

    #[test]
    fn test_requests_during_fetch_collapse_into_one() {
        // Arrange
        let mut coalescer = Coalescer::default();
        assert!(coalescer.request());

        // Act
        let during: Vec<bool> = (0..5).map(|_| coalescer.request()).collect();

        // Assert
        assert!(during.iter().all(|started| !started));
        assert!(coalescer.settle());
        assert!(!coalescer.settle());
    }
}
