// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use net::buffer::PacketBufferMut;
use net::packet::Packet;

/// A network function processes a stream of packets.
///
/// Implementors receive an iterator of [`Packet`] objects and return an iterator of [`Packet`]
/// objects. A network function may drop, mutate, or pass through packets, and may produce more
/// or fewer packets than it consumed.
pub trait NetworkFunction<Buf: PacketBufferMut> {
    /// Process a stream of packets.
    fn process<'a, Input: Iterator<Item = Packet<Buf>> + 'a>(
        &'a mut self,
        input: Input,
    ) -> impl Iterator<Item = Packet<Buf>> + 'a;
}

/// Statically chains two network functions together.
///
/// Produced by [`StaticChain::chain`]. Implements [`NetworkFunction`] itself, so chains may be
/// nested.
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<Buf: PacketBufferMut, A: NetworkFunction<Buf>, B: NetworkFunction<Buf>> NetworkFunction<Buf>
    for Chain<A, B>
{
    fn process<'a, Input: Iterator<Item = Packet<Buf>> + 'a>(
        &'a mut self,
        input: Input,
    ) -> impl Iterator<Item = Packet<Buf>> + 'a {
        self.second.process(self.first.process(input))
    }
}

/// Extension trait for statically chaining network functions together.
///
/// Implemented for every type that implements [`NetworkFunction`]; see the crate-level docs for
/// usage.
pub trait StaticChain<Buf: PacketBufferMut>: NetworkFunction<Buf> + Sized {
    /// Chain this network function with another, running `self` first.
    fn chain<Next: NetworkFunction<Buf>>(self, next: Next) -> Chain<Self, Next> {
        Chain {
            first: self,
            second: next,
        }
    }
}

impl<Buf: PacketBufferMut, NF: NetworkFunction<Buf>> StaticChain<Buf> for NF {}
