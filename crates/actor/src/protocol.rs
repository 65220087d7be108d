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

//! Framework message payloads.
//!
//! Lifecycle control (init, start, shutdown), subscription bookkeeping, and
//! the state-query protocol all travel through the ordinary message pipeline
//! as the payload types below. User code mostly sees [`Initialize`],
//! [`StartActor`] and [`Shutdown`] when observing another actor's lifecycle,
//! and [`StateQuery`] when polling a supervisor for readiness.

use std::sync::Arc;

use arbor_core::ActorState;

use crate::address::Address;
use crate::handler::Handler;
use crate::message::RequestPayload;

/// Init request, sent by the supervisor to an actor's main address once the
/// actor exists. The actor replies (through `init_finish`) with its main
/// address, or with an error that aborts its startup.
#[derive(Debug, Clone, Copy)]
pub struct Initialize;

impl RequestPayload for Initialize {
    type Reply = Address;
}

/// Start confirmation from the supervisor; flips the actor to operational.
#[derive(Debug, Clone, Copy)]
pub struct StartActor;

/// Shutdown request. The receiving actor unwinds its subscriptions and
/// replies with its main address once fully unwound.
#[derive(Debug, Clone, Copy)]
pub struct Shutdown;

impl RequestPayload for Shutdown {
    type Reply = Address;
}

/// Ask the supervisor to shut down the actor owning `address`. Sent to the
/// supervisor's main address by `do_shutdown`; the supervisor answers with a
/// [`Shutdown`] request to the target.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    pub address: Address,
}

/// Invoked by the owning actor once an unsubscription it asked for has been
/// confirmed.
pub type UnsubscribeCallback = Arc<dyn Fn() + Send + Sync>;

/// The dispatch index accepted `(handler, address)`; the handler's owner
/// records the subscription point on receipt.
#[derive(Clone)]
pub struct SubscriptionConfirmed {
    pub handler: Handler,
    pub address: Address,
}

/// The dispatch index dropped `(handler, address)`; the handler's owner
/// forgets the subscription point on receipt and runs the callback, if any.
#[derive(Clone)]
pub struct UnsubscriptionConfirmed {
    pub handler: Handler,
    pub address: Address,
    pub callback: Option<UnsubscribeCallback>,
}

/// Cross-supervisor subscription: asks the supervisor owning `address` to
/// accept a handler registered by an actor living on another supervisor.
#[derive(Clone)]
pub struct ExternalSubscription {
    pub handler: Handler,
    pub address: Address,
}

/// Cross-supervisor unsubscription, first leg: tells the handler's owner to
/// drop its subscription point for a foreign-owned address.
#[derive(Clone)]
pub struct ExternalUnsubscription {
    pub handler: Handler,
    pub address: Address,
}

/// Cross-supervisor unsubscription, second leg: tells the address-owning
/// supervisor to drop the dispatch index entry.
#[derive(Clone)]
pub struct CommitUnsubscription {
    pub handler: Handler,
    pub address: Address,
}

/// Ask a supervisor for the lifecycle state of the actor owning `subject`.
/// Fails with `target_not_found` if the supervisor knows no such actor.
#[derive(Debug, Clone)]
pub struct StateQuery {
    pub subject: Address,
}

impl RequestPayload for StateQuery {
    type Reply = ActorState;
}
