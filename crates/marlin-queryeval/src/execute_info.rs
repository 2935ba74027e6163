//! Execution context handed to `fetch_postings`.

use marlin_types::Doom;

/// How a subtree will be executed: whether it is driven strictly, the
/// estimated fraction of the corpus flowing through it, and the soft
/// deadline for posting-list hydration.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteInfo {
    strict: bool,
    hit_rate: f64,
    doom: Doom,
}

impl ExecuteInfo {
    #[must_use]
    pub fn new(strict: bool, hit_rate: f64, doom: Doom) -> Self {
        Self {
            strict,
            hit_rate,
            doom,
        }
    }

    /// Strict execution over the full corpus, no deadline.
    #[must_use]
    pub fn full(strict: bool) -> Self {
        Self::new(strict, 1.0, Doom::never())
    }

    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        self.hit_rate
    }

    #[must_use]
    pub fn doom(&self) -> Doom {
        self.doom
    }

    /// Same deadline, different strictness and hit rate.
    #[must_use]
    pub fn for_child(&self, strict: bool, hit_rate: f64) -> Self {
        Self::new(strict, hit_rate, self.doom)
    }
}

impl Default for ExecuteInfo {
    fn default() -> Self {
        Self::full(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_info_keeps_doom() {
        let info = ExecuteInfo::full(true);
        let child = info.for_child(false, 0.25);
        assert!(!child.is_strict());
        assert_eq!(child.hit_rate(), 0.25);
        assert!(!child.doom().is_doomed());
    }
}
