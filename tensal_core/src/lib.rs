// SPDX-License-Identifier: MIT
// Copyright (c) "2026" . The Tensal Authors and Contributors. All Rights Reserved.

#![forbid(unsafe_code)]

//! Index/symmetry/equivalence/permutation primitives and the folded and
//! unfolded dense/sparse tensors built on top of them. This is the
//! foundation layer of the perturbation solver: every other crate in the
//! workspace builds on the types exported here.

pub mod container;
pub mod context;
pub mod dims;
pub mod equivalence;
pub mod error;
pub mod linalg;
pub mod pascal;
pub mod permutation;
pub mod seq;
pub mod sparse;
pub mod symmetry;
pub mod tensor;

pub use container::{Container, FoldedContainer, UnfoldedContainer};
pub use context::TlContext;
pub use dims::TensorDimens;
pub use equivalence::{Equivalence, EquivalenceSet};
pub use error::{Result, TensorError};
pub use permutation::Permutation;
pub use seq::IntSequence;
pub use sparse::SparseTensor;
pub use symmetry::Symmetry;
pub use tensor::{Folded, Storage, Tensor, Unfolded};
