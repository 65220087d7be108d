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

//! Request issuance.
//!
//! `send(timeout)` does three things from the caller's perspective
//! atomically: allocates a correlation id, arms a timeout timer at the
//! requester's supervisor, and enqueues the request envelope to the
//! destination. Whichever of response and timer comes first wins; the loser
//! is silently discarded.

use std::time::Duration;

use arbor_core::{ErrorCode, RequestId};

use crate::address::Address;
use crate::message::{Message, Request, RequestPayload};

/// Builder returned by [`ActorBase::request`](crate::ActorBase::request);
/// nothing happens until [`send`](RequestBuilder::send).
#[must_use = "a request does nothing until .send(timeout) is called"]
pub struct RequestBuilder<T: RequestPayload> {
    dest: Address,
    reply_to: Address,
    payload: T,
}

impl<T: RequestPayload> RequestBuilder<T> {
    pub(crate) fn new(dest: Address, reply_to: Address, payload: T) -> Self {
        RequestBuilder { dest, reply_to, payload }
    }

    /// Issue the request with a mandatory timeout.
    ///
    /// If the timer fires before the response arrives, the requester's
    /// response handler receives a synthesized `timeout` error and any
    /// later real response is dropped as stale. If the requesting actor
    /// shuts down first, the handler receives `cancelled` instead.
    pub fn send(self, timeout: Duration) -> RequestId {
        let id = RequestId::new();
        let requester = self.reply_to.owner();

        let error_reply = {
            let reply_to = self.reply_to.clone();
            move |code: ErrorCode| Message::synthesized_error::<T>(reply_to.clone(), id, code)
        };
        requester.register_request(id, timeout, self.reply_to.clone(), Box::new(error_reply));

        metrics::counter!("arbor_requests_total").increment(1);
        Message::new(
            self.dest,
            Request::<T>::new(self.payload, id, self.reply_to),
        )
        .enqueue();
        id
    }
}
