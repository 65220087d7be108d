// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Arbor Contributors
//
// This file is part of Arbor.
//
// Arbor is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// Arbor is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with Arbor. If not, see <https://www.gnu.org/licenses/>.

//! Message envelope and the typed request/response wrappers.
//!
//! A message is a destination address plus an immutable, type-tagged
//! payload. The tag is the payload's [`TypeId`]: process-unique, derived at
//! compile time, and the thing handlers match on before downcasting. Two
//! envelopes with equal tags carry the same payload type, so a matched
//! downcast never fails.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use arbor_core::{ErrorCode, RequestId};

use crate::address::Address;

/// Anything that can travel inside a message envelope.
///
/// Blanket-implemented; user payloads need no derives. Payloads are shared
/// (`Arc`) between the queue and every matching handler, hence `Send + Sync`.
pub trait Payload: Any + Send + Sync {}

impl<T: Any + Send + Sync> Payload for T {}

/// A request payload, tied at the type level to its reply payload.
///
/// Implementing this for a type enables
/// [`ActorBase::request`](crate::ActorBase::request) with that type and
/// makes [`Response<T>`] the message the requester's handler receives.
pub trait RequestPayload: Payload {
    type Reply: Payload;
}

/// Type-tagged message envelope.
///
/// Cheap to clone: the payload is behind an `Arc` and immutable once the
/// envelope is enqueued. The envelope keeps its destination [`Address`]
/// alive for as long as it exists, so an address can never be destroyed out
/// from under a queued message.
#[derive(Clone)]
pub struct Message {
    dest: Address,
    type_tag: TypeId,
    payload: Arc<dyn Any + Send + Sync>,
    /// Set on replies produced by `reply_to`/`reply_with_error`; the
    /// supervisor uses it to drop stale responses and cancel request timers.
    correlation: Option<RequestId>,
}

impl Message {
    /// Wrap `payload` for delivery to `dest`.
    pub fn new<P: Payload>(dest: Address, payload: P) -> Self {
        Message {
            dest,
            type_tag: TypeId::of::<P>(),
            payload: Arc::new(payload),
            correlation: None,
        }
    }

    /// A correlated reply to a pending request. Routed like any message, but
    /// additionally matched against the requester supervisor's pending set.
    pub(crate) fn reply<T: RequestPayload>(dest: Address, response: Response<T>) -> Self {
        let correlation = Some(response.id);
        let mut message = Message::new(dest, response);
        message.correlation = correlation;
        message
    }

    /// An error reply synthesized by the supervisor (timeout, cancellation).
    ///
    /// Carries no correlation: the pending entry was already consumed when
    /// the error was synthesized, and the stale-response filter must let
    /// this one through to the response handler.
    pub(crate) fn synthesized_error<T: RequestPayload>(
        dest: Address,
        id: RequestId,
        code: ErrorCode,
    ) -> Self {
        Message::new(dest, Response::<T> { id, result: Err(code) })
    }

    pub fn dest(&self) -> &Address {
        &self.dest
    }

    pub fn type_tag(&self) -> TypeId {
        self.type_tag
    }

    pub(crate) fn correlation(&self) -> Option<RequestId> {
        self.correlation
    }

    /// View the payload as `P`. Returns `None` on a tag mismatch; handlers
    /// check the tag first and then rely on the downcast succeeding.
    pub fn payload_ref<P: Payload>(&self) -> Option<&P> {
        self.payload.downcast_ref::<P>()
    }

    /// Push this envelope into the queue of the supervisor owning its
    /// destination address.
    pub(crate) fn enqueue(self) {
        let owner = self.dest.owner();
        owner.enqueue(self);
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("dest", &self.dest)
            .field("type_tag", &self.type_tag)
            .field("correlation", &self.correlation)
            .finish_non_exhaustive()
    }
}

/// A request in flight: the caller's payload plus the routing the responder
/// needs to answer it.
pub struct Request<T: RequestPayload> {
    payload: T,
    id: RequestId,
    reply_to: Address,
}

impl<T: RequestPayload> Request<T> {
    pub(crate) fn new(payload: T, id: RequestId, reply_to: Address) -> Self {
        Request { payload, id, reply_to }
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Where the response must be sent. Usually the requester's main
    /// address; `request_via` overrides it.
    pub fn reply_to(&self) -> &Address {
        &self.reply_to
    }
}

impl<T: RequestPayload + Clone> Clone for Request<T> {
    fn clone(&self) -> Self {
        Request {
            payload: self.payload.clone(),
            id: self.id,
            reply_to: self.reply_to.clone(),
        }
    }
}

impl<T: RequestPayload + fmt::Debug> fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// The response to a [`Request<T>`]: the reply payload, or the error code
/// the request failed with (its own failure, a timeout, or cancellation).
pub struct Response<T: RequestPayload> {
    id: RequestId,
    result: Result<T::Reply, ErrorCode>,
}

impl<T: RequestPayload> Response<T> {
    pub(crate) fn new(id: RequestId, result: Result<T::Reply, ErrorCode>) -> Self {
        Response { id, result }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn result(&self) -> Result<&T::Reply, ErrorCode> {
        self.result.as_ref().map_err(|code| *code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::test_support::detached_address;

    struct Ping(u32);
    struct Probe;

    impl RequestPayload for Probe {
        type Reply = u32;
    }

    #[test]
    fn tag_matches_payload_type() {
        let msg = Message::new(detached_address(), Ping(7));
        assert_eq!(msg.type_tag(), TypeId::of::<Ping>());
        assert_eq!(msg.payload_ref::<Ping>().map(|p| p.0), Some(7));
        assert!(msg.payload_ref::<Probe>().is_none());
    }

    #[test]
    fn reply_is_correlated_and_synthesized_error_is_not() {
        let id = RequestId::new();
        let reply = Message::reply(detached_address(), Response::<Probe>::new(id, Ok(3)));
        assert_eq!(reply.correlation(), Some(id));

        let synthesized =
            Message::synthesized_error::<Probe>(detached_address(), id, ErrorCode::Timeout);
        assert_eq!(synthesized.correlation(), None);
        let response = synthesized.payload_ref::<Response<Probe>>().unwrap();
        assert_eq!(response.result().unwrap_err(), ErrorCode::Timeout);
    }
}
