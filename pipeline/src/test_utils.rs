// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use crate::dyn_nf::{DynNetworkFunction, nf_dyn};
use crate::sample_nfs::DecrementTtl;
use net::buffer::TestBuffer;

/// Produces an unbounded stream of boxed, dynamic [`DecrementTtl`] stages, for exercising
/// [`crate::DynPipeline`] with large numbers of stages in tests.
pub(crate) struct DynStageGenerator {
    count: usize,
}

impl DynStageGenerator {
    pub(crate) fn new() -> Self {
        Self { count: 0 }
    }

    /// The number of TTL decrements a pipeline built from `n` generated stages performs.
    pub(crate) fn num_ttl_decs(n: usize) -> usize {
        n
    }
}

impl Iterator for DynStageGenerator {
    type Item = Box<dyn DynNetworkFunction<TestBuffer>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.count += 1;
        Some(nf_dyn(DecrementTtl))
    }
}
