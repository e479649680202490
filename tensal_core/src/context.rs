// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! Replaces the original tensor library's process-global `tls` statics
//! (Pascal-triangle cache, permutation/equivalence bundles) with an
//! explicit, passed-around context object. The cache is read-mostly and
//! trivially shareable, so a plain value (cloned cheaply via `Rc` if ever
//! needed across threads read-only) is enough — no global state.

use crate::pascal::PascalTriangle;

#[derive(Default)]
pub struct TlContext {
    pascal: PascalTriangle,
}

impl TlContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pascal(&self) -> &PascalTriangle {
        &self.pascal
    }
}
