// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! Binomial coefficients, used throughout the folded-tensor offset
//! recursion and the Smolyak quadrature weight formula.

use std::collections::HashMap;
use std::sync::Mutex;

/// A read-mostly cache of `C(n, k)` values.
///
/// The original tensor library keeps this table behind a process-global
/// singleton; here it is an explicit, shareable value owned by
/// [`crate::context::TlContext`] instead, per the redesign note on global
/// mutable state. The cache uses a `Mutex` rather than a `RefCell` so a
/// `TlContext` can be shared (by reference) across the Faà di Bruno
/// engine's worker threads.
#[derive(Default)]
pub struct PascalTriangle {
    cache: Mutex<HashMap<(usize, usize), u128>>,
}

impl PascalTriangle {
    pub fn new() -> Self {
        Self::default()
    }

    /// `C(n, k)`, i.e. `n! / (k! (n-k)!)`, computed with a multiplicative
    /// recurrence and memoised. Returns 0 when `k > n`.
    pub fn noverk(&self, n: usize, k: usize) -> u128 {
        if k > n {
            return 0;
        }
        let k = k.min(n - k);
        if let Some(&v) = self.cache.lock().expect("pascal cache poisoned").get(&(n, k)) {
            return v;
        }
        let mut result: u128 = 1;
        for i in 0..k {
            result = result * (n - i) as u128 / (i + 1) as u128;
        }
        self.cache
            .lock()
            .expect("pascal cache poisoned")
            .insert((n, k), result);
        result
    }
}

/// Stateless convenience wrapper for call-sites that don't hold a
/// [`TlContext`](crate::context::TlContext) (e.g. tests and standalone
/// formula checks).
pub fn noverk(n: usize, k: usize) -> u128 {
    thread_local! {
        static TRIANGLE: PascalTriangle = PascalTriangle::new();
    }
    TRIANGLE.with(|t| t.noverk(n, k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_values() {
        assert_eq!(noverk(5, 2), 10);
        assert_eq!(noverk(4, 0), 1);
        assert_eq!(noverk(4, 4), 1);
        assert_eq!(noverk(3, 5), 0);
    }
}
