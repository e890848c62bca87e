use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
};

use crossbeam::atomic::AtomicCell;

/// Source of every id handed out in this process. Zero is never handed out.
static NEXT: AtomicCell<u64> = AtomicCell::new(1);

/// A process-unique identifier for something that only lives in memory, like a session.
///
/// Ids are issued in increasing order, so comparing two ids tells which one was issued first.
pub struct Id<T> {
    value: u64,
    kind: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    pub fn new() -> Self {
        Self::with_value(NEXT.fetch_add(1))
    }

    /// The id of something that was never issued one.
    pub fn none() -> Self {
        Self::with_value(0)
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn is_none(&self) -> bool {
        self.value == 0
    }

    fn with_value(value: u64) -> Self {
        Self {
            value,
            kind: PhantomData,
        }
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::none()
    }
}

// Written by hand since deriving would put bounds on T

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.value)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("-")
        } else {
            write!(f, "#{}", self.value)
        }
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Marker;

    #[test]
    fn test_ids_are_unique() {
        let a = Id::<Marker>::new();
        let b = Id::<Marker>::new();

        assert_ne!(a, b, "two new ids differ");
        assert!(a < b, "later ids compare greater");
        assert!(!a.is_none(), "new id is not the empty id");
        assert!(Id::<Marker>::default().is_none(), "default id is empty");
    }

    #[test]
    fn test_display() {
        let id = Id::<Marker>::new();

        assert_eq!(id.to_string(), format!("#{}", id.value()));
        assert_eq!(Id::<Marker>::none().to_string(), "-", "empty id has no number");
    }
}
