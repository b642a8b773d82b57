//! Forward-only cursors over time steps, levels and parameters.

use serde::Serialize;

/// A linear cursor over `0..bound`.
///
/// A reset cursor sits before the first index. Advancing past the last index
/// leaves the cursor one past the end until it is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cursor {
    index: i64,
    bound: usize,
}

impl Cursor {
    pub fn new(bound: usize) -> Self {
        Self { index: -1, bound }
    }

    pub fn reset(&mut self) {
        self.index = -1;
    }

    /// Move to the next index. Returns false once the bound is reached.
    pub fn advance(&mut self) -> bool {
        let end = self.bound as i64;
        if self.index < end {
            self.index += 1;
        }
        self.index < end
    }

    /// Raw position: -1 before the first advance, `bound` when exhausted.
    pub fn index(&self) -> i64 {
        self.index
    }

    /// The position if it addresses a valid element.
    pub fn current(&self) -> Option<usize> {
        usize::try_from(self.index)
            .ok()
            .filter(|&index| index < self.bound)
    }

    pub fn bound(&self) -> usize {
        self.bound
    }
}
