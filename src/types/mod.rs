/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that are used across multiple components of the crate.
//!
//! Types specific to a single component live next to it, e.g.,
//! [`ForkStatus`](crate::fork_choice::ForkStatus) in [`crate::fork_choice`].

pub mod block;

pub mod crypto_primitives;

pub mod data_types;

pub mod update_sets;
