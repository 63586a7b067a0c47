//! Direction-aware comparison shared by every queue
//!
//! All three queue variants route their comparisons through an
//! [`OrderingPolicy`], so the same linking, consolidation and pairing code
//! serves both min-queues and max-queues.
//!
//! # Example
//!
//! ```rust
//! use mergeable_queues::{Direction, OrderingPolicy};
//!
//! let max = OrderingPolicy::new(Direction::Descending);
//! assert!(max.precedes(&9, &4));
//! assert_eq!(*max.more_extreme(&4, &9), 9);
//!
//! let dir: Direction = "min".parse().unwrap();
//! assert_eq!(dir, Direction::Ascending);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Which end of the order is extracted first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Min-queue: the smallest value is the extreme
    #[default]
    Ascending,
    /// Max-queue: the largest value is the extreme
    Descending,
}

impl Direction {
    /// The opposite direction
    pub fn reverse(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ascending => f.write_str("ascending"),
            Direction::Descending => f.write_str("descending"),
        }
    }
}

/// Error returned when a string does not name a [`Direction`]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown ordering direction `{0}` (expected asc, ascending, min, desc, descending or max)")]
pub struct ParseDirectionError(String);

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "min" => Ok(Direction::Ascending),
            "desc" | "descending" | "max" => Ok(Direction::Descending),
            _ => Err(ParseDirectionError(s.to_owned())),
        }
    }
}

/// `Ord::cmp` flipped according to a [`Direction`]
///
/// Under this policy, `Ordering::Less` always means "more extreme", i.e. closer
/// to the front of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OrderingPolicy {
    direction: Direction,
}

impl OrderingPolicy {
    /// Creates a policy for the given direction
    pub const fn new(direction: Direction) -> Self {
        Self { direction }
    }

    /// The configured direction
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Compares two values; `Less` means `a` ranks ahead of `b`
    #[inline]
    pub fn compare<T: Ord + ?Sized>(&self, a: &T, b: &T) -> Ordering {
        match self.direction {
            Direction::Ascending => a.cmp(b),
            Direction::Descending => b.cmp(a),
        }
    }

    /// True if `a` is strictly more extreme than `b`
    #[inline]
    pub fn precedes<T: Ord + ?Sized>(&self, a: &T, b: &T) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    /// True if `a` is at least as extreme as `b`
    #[inline]
    pub fn precedes_or_eq<T: Ord + ?Sized>(&self, a: &T, b: &T) -> bool {
        self.compare(a, b) != Ordering::Greater
    }

    /// The more extreme of two values; `a` on ties
    #[inline]
    pub fn more_extreme<'a, T: Ord + ?Sized>(&self, a: &'a T, b: &'a T) -> &'a T {
        if self.precedes(b, a) {
            b
        } else {
            a
        }
    }
}

impl From<Direction> for OrderingPolicy {
    fn from(direction: Direction) -> Self {
        Self::new(direction)
    }
}
