/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A shared, monotonically increasing certified height.
//!
//! The component that counts votes (outside this crate) keeps a clone of [`CertifiedHeight`] and
//! calls [`update`](CertifiedHeight::update) whenever it learns that a greater height is final. The
//! [`Synchronizer`](crate::synchronizer::Synchronizer) reads it through [`FinalityOracle`] at the start
//! of every reorganization.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::synchronizer::FinalityOracle;
use crate::types::data_types::BlockHeight;

#[derive(Clone, Debug, Default)]
pub struct CertifiedHeight(Arc<AtomicU64>);

impl CertifiedHeight {
    pub fn new(initial: BlockHeight) -> CertifiedHeight {
        CertifiedHeight(Arc::new(AtomicU64::new(initial.int())))
    }

    /// Raise the certified height to `height`. Lower heights are ignored, so the value never
    /// decreases.
    pub fn update(&self, height: BlockHeight) {
        self.0.fetch_max(height.int(), Ordering::SeqCst);
    }

    pub fn get(&self) -> BlockHeight {
        BlockHeight::new(self.0.load(Ordering::SeqCst))
    }
}

impl FinalityOracle for CertifiedHeight {
    fn certified_height(&self) -> BlockHeight {
        self.get()
    }
}
