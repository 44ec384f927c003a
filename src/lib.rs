/*
 * SPDX-FileCopyrightText: 2026 The heapgraph developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]
#![deny(unstable_features)]
#![deny(trivial_casts)]
#![deny(unconditional_recursion)]
#![deny(clippy::empty_loop)]
#![deny(unreachable_code)]
#![deny(unreachable_pub)]
#![deny(unreachable_patterns)]
#![deny(unused_macro_rules)]
#![deny(unused_doc_comments)]
#![allow(clippy::type_complexity)]

pub mod algo;
#[cfg(feature = "cli")]
pub mod cli;
pub mod graphs;
pub mod import;
pub mod parallel;
pub mod store;
pub mod traits;

#[macro_use]
pub mod utils;

/// Prelude module to import everything from this crate
pub mod prelude {
    pub use crate::algo::*;
    pub use crate::graphs::prelude::*;
    pub use crate::import::*;
    pub use crate::parallel::*;
    pub use crate::store::*;
    pub use crate::traits::*;
    pub use crate::utils::*;
}
