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

//! Typed message handlers.
//!
//! A handler binds one actor to one callback for one payload type. Delivery
//! hands every handler subscribed on the destination address the envelope;
//! the handler checks the type tag and silently skips envelopes that are not
//! its payload type, so heterogeneous subscriptions on one address are fine.
//!
//! Handler equality is `(callback site, owning actor)`: a caller can build a
//! fresh handler from the same method and the same actor to unsubscribe the
//! original, without ever holding the original handler object.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::actor::{Actor, ActorRef};
use crate::address::Address;
use crate::message::{Message, Payload};

/// Identity of a callback site.
///
/// Method handlers are identified by the address of the registered function;
/// closure handlers by the closure's unique type. Either way, one distinct
/// callback site maps to one tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerTag {
    Method(usize),
    Closure(TypeId),
}

pub(crate) trait ErasedHandler: Send + Sync {
    fn message_tag(&self) -> TypeId;
    fn tag(&self) -> HandlerTag;
    fn owner(&self) -> &ActorRef;
    fn owner_address(&self) -> &Address;
    fn invoke(&self, message: &Message);
}

/// A subscribable callback: `(payload type, callback site, owning actor)`.
///
/// Cheap to clone; clones share the same callback and compare equal.
#[derive(Clone)]
pub struct Handler {
    inner: Arc<dyn ErasedHandler>,
}

impl Handler {
    /// Handler around a method of the concrete actor type `A`.
    pub(crate) fn for_method<A, M>(owner: ActorRef, owner_address: Address, f: fn(&mut A, &M)) -> Self
    where
        A: Actor,
        M: Payload,
    {
        Handler {
            inner: Arc::new(MethodHandler { owner, owner_address, f }),
        }
    }

    /// Handler around a hook reachable through `dyn Actor`. Used for the
    /// framework's own lifecycle handlers, which must not depend on the
    /// concrete actor type.
    pub(crate) fn for_hook<M>(owner: ActorRef, owner_address: Address, f: fn(&mut dyn Actor, &M)) -> Self
    where
        M: Payload,
    {
        Handler {
            inner: Arc::new(HookHandler { owner, owner_address, f }),
        }
    }

    /// Handler around a closure. The closure receives only the payload; it
    /// captures whatever actor access it needs.
    pub(crate) fn for_closure<M, F>(owner: ActorRef, owner_address: Address, f: F) -> Self
    where
        M: Payload,
        F: Fn(&M) + Send + Sync + 'static,
    {
        Handler {
            inner: Arc::new(ClosureHandler {
                owner,
                owner_address,
                f,
                message: std::marker::PhantomData::<fn(&M)>,
            }),
        }
    }

    /// Type tag of the payload this handler consumes.
    pub fn message_tag(&self) -> TypeId {
        self.inner.message_tag()
    }

    /// Identity of the callback site.
    pub fn tag(&self) -> HandlerTag {
        self.inner.tag()
    }

    /// The actor this handler calls into.
    pub fn owner(&self) -> &ActorRef {
        self.inner.owner()
    }

    /// Main address of the owning actor; subscription confirmations about
    /// this handler are delivered there.
    pub fn owner_address(&self) -> &Address {
        self.inner.owner_address()
    }

    /// Deliver `message` if its tag matches; otherwise silently skip.
    pub(crate) fn invoke(&self, message: &Message) {
        self.inner.invoke(message);
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.tag() == other.tag() && self.owner().same_actor(other.owner())
    }
}

impl Eq for Handler {}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("tag", &self.tag())
            .field("owner", &self.owner_address())
            .finish_non_exhaustive()
    }
}

struct MethodHandler<A, M> {
    owner: ActorRef,
    owner_address: Address,
    f: fn(&mut A, &M),
}

impl<A: Actor, M: Payload> ErasedHandler for MethodHandler<A, M> {
    fn message_tag(&self) -> TypeId {
        TypeId::of::<M>()
    }

    fn tag(&self) -> HandlerTag {
        HandlerTag::Method(self.f as usize)
    }

    fn owner(&self) -> &ActorRef {
        &self.owner
    }

    fn owner_address(&self) -> &Address {
        &self.owner_address
    }

    fn invoke(&self, message: &Message) {
        if message.type_tag() != TypeId::of::<M>() {
            return;
        }
        let Some(payload) = message.payload_ref::<M>() else {
            debug_assert!(false, "tag matched but payload downcast failed");
            return;
        };
        let mut guard = self.owner.lock();
        let actor: &mut dyn Any = &mut *guard;
        let Some(actor) = actor.downcast_mut::<A>() else {
            debug_assert!(false, "handler owner is not the expected actor type");
            return;
        };
        (self.f)(actor, payload);
    }
}

struct HookHandler<M> {
    owner: ActorRef,
    owner_address: Address,
    f: fn(&mut dyn Actor, &M),
}

impl<M: Payload> ErasedHandler for HookHandler<M> {
    fn message_tag(&self) -> TypeId {
        TypeId::of::<M>()
    }

    fn tag(&self) -> HandlerTag {
        HandlerTag::Method(self.f as usize)
    }

    fn owner(&self) -> &ActorRef {
        &self.owner
    }

    fn owner_address(&self) -> &Address {
        &self.owner_address
    }

    fn invoke(&self, message: &Message) {
        if message.type_tag() != TypeId::of::<M>() {
            return;
        }
        let Some(payload) = message.payload_ref::<M>() else {
            debug_assert!(false, "tag matched but payload downcast failed");
            return;
        };
        let mut guard = self.owner.lock();
        (self.f)(&mut *guard, payload);
    }
}

struct ClosureHandler<M, F> {
    owner: ActorRef,
    owner_address: Address,
    f: F,
    message: std::marker::PhantomData<fn(&M)>,
}

impl<M, F> ErasedHandler for ClosureHandler<M, F>
where
    M: Payload,
    F: Fn(&M) + Send + Sync + 'static,
{
    fn message_tag(&self) -> TypeId {
        TypeId::of::<M>()
    }

    fn tag(&self) -> HandlerTag {
        HandlerTag::Closure(TypeId::of::<F>())
    }

    fn owner(&self) -> &ActorRef {
        &self.owner
    }

    fn owner_address(&self) -> &Address {
        &self.owner_address
    }

    fn invoke(&self, message: &Message) {
        if message.type_tag() != TypeId::of::<M>() {
            return;
        }
        let Some(payload) = message.payload_ref::<M>() else {
            debug_assert!(false, "tag matched but payload downcast failed");
            return;
        };
        (self.f)(payload);
    }
}
