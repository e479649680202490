// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

//! Containers map a [`Symmetry`] to the tensor carrying that symmetry's
//! derivative block. Folded and unfolded containers are separate
//! instantiations of the same generic container, since most call-sites
//! commit to one storage kind for an entire solver pass.

use std::collections::HashMap;

use crate::error::{Result, TensorError};
use crate::symmetry::Symmetry;
use crate::tensor::{Folded, Storage, Tensor, Unfolded};

/// Owns a set of tensors of a single storage kind, keyed by symmetry.
#[derive(Clone)]
pub struct Container<S: Storage> {
    tensors: HashMap<Symmetry, Tensor<S>>,
}

impl<S: Storage> Default for Container<S> {
    fn default() -> Self {
        Container {
            tensors: HashMap::new(),
        }
    }
}

impl<S: Storage> Container<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, sym: &Symmetry) -> bool {
        self.tensors.contains_key(sym)
    }

    pub fn get(&self, sym: &Symmetry) -> Result<&Tensor<S>> {
        self.tensors.get(sym).ok_or_else(|| {
            TensorError::PreconditionFailed(format!("no tensor stored for symmetry {sym:?}"))
        })
    }

    pub fn get_mut(&mut self, sym: &Symmetry) -> Result<&mut Tensor<S>> {
        self.tensors.get_mut(sym).ok_or_else(|| {
            TensorError::PreconditionFailed(format!("no tensor stored for symmetry {sym:?}"))
        })
    }

    /// Inserts `tensor` under `sym`, taking ownership (replacing any prior
    /// entry for that symmetry, which callers should not normally do).
    pub fn insert(&mut self, sym: Symmetry, tensor: Tensor<S>) {
        self.tensors.insert(sym, tensor);
    }

    pub fn remove(&mut self, sym: &Symmetry) -> Option<Tensor<S>> {
        self.tensors.remove(sym)
    }

    pub fn symmetries(&self) -> impl Iterator<Item = &Symmetry> {
        self.tensors.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symmetry, &Tensor<S>)> {
        self.tensors.iter()
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

pub type FoldedContainer = Container<Folded>;
pub type UnfoldedContainer = Container<Unfolded>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TlContext;
    use crate::dims::TensorDimens;

    #[test]
    fn insert_and_check_round_trip() {
        let ctx = TlContext::new();
        let mut c: FoldedContainer = Container::new();
        let sym = Symmetry::full(2);
        let dims = TensorDimens::full(3, 2);
        let t = Tensor::<Folded>::zeros(&ctx, 1, dims);
        assert!(!c.check(&sym));
        c.insert(sym.clone(), t);
        assert!(c.check(&sym));
        assert_eq!(c.len(), 1);
    }
}
