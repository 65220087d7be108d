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

//! The actor state machine and the surface user actors program against.
//!
//! An actor embeds an [`ActorBase`] and implements [`Actor`], overriding the
//! lifecycle hooks it cares about. The base carries the framework state:
//! lifecycle state, main address, the subscription point list, the stashed
//! init/shutdown requests, and the behavior slot. [`ActorExt`] adds the
//! typed subscribe/unsubscribe sugar that only exists for concrete actor
//! types.

use std::any::Any;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use arbor_core::{ActorState, ErrorCode};

use crate::address::Address;
use crate::behavior::{with_behavior, ActorBehavior, BehaviorStep, DefaultBehavior};
use crate::handler::Handler;
use crate::message::{Message, Payload, Request, RequestPayload, Response};
use crate::protocol::{
    CommitUnsubscription, ExternalSubscription, ExternalUnsubscription, Initialize, Shutdown,
    ShutdownTrigger, StartActor, SubscriptionConfirmed, UnsubscribeCallback,
    UnsubscriptionConfirmed,
};
use crate::request::RequestBuilder;
use crate::subscription::SubscriptionPoint;
use crate::supervisor::SupervisorShared;

/// Shared, lockable handle to an actor.
///
/// This is how the runtime holds actors: the supervisor's child collection
/// and every handler keep one. Two refs are the same actor iff they share
/// the cell ([`same_actor`](ActorRef::same_actor)); this identity is half of
/// handler equality.
#[derive(Clone)]
pub struct ActorRef {
    inner: Arc<Mutex<dyn Actor>>,
}

impl ActorRef {
    pub(crate) fn from_arc(inner: Arc<Mutex<dyn Actor>>) -> Self {
        ActorRef { inner }
    }

    pub fn same_actor(&self, other: &ActorRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, dyn Actor> {
        self.inner.lock()
    }

    pub fn state(&self) -> ActorState {
        self.lock().base().state()
    }

    pub fn address(&self) -> Address {
        self.lock().base().address()
    }

    pub fn subscription_point_count(&self) -> usize {
        self.lock().base().subscription_points().len()
    }

    pub fn downgrade(&self) -> WeakActorRef {
        WeakActorRef {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Run `f` against the concrete actor type. `None` if the actor is not
    /// an `A`. Intended for embedder and test code; handlers already get
    /// typed access.
    pub fn with<A: Actor, R>(&self, f: impl FnOnce(&A) -> R) -> Option<R> {
        let guard = self.lock();
        let actor: &dyn Any = &*guard;
        actor.downcast_ref::<A>().map(f)
    }

    /// Mutable variant of [`with`](ActorRef::with).
    pub fn with_mut<A: Actor, R>(&self, f: impl FnOnce(&mut A) -> R) -> Option<R> {
        let mut guard = self.lock();
        let actor: &mut dyn Any = &mut *guard;
        actor.downcast_mut::<A>().map(f)
    }
}

/// Non-owning [`ActorRef`]; breaks the `actor -> itself` cycle for the
/// self-reference every base carries.
#[derive(Clone)]
pub struct WeakActorRef {
    inner: Weak<Mutex<dyn Actor>>,
}

impl WeakActorRef {
    pub fn upgrade(&self) -> Option<ActorRef> {
        self.inner.upgrade().map(|inner| ActorRef { inner })
    }
}

/// Framework state embedded in every actor.
pub struct ActorBase {
    supervisor: Arc<SupervisorShared>,
    state: ActorState,
    address: Option<Address>,
    owned_addresses: Vec<Address>,
    behavior: Option<Box<dyn ActorBehavior>>,
    points: Vec<SubscriptionPoint>,
    stashed_init: Option<(arbor_core::RequestId, Address)>,
    stashed_shutdown: Option<(arbor_core::RequestId, Address)>,
    self_ref: Option<WeakActorRef>,
}

impl ActorBase {
    pub(crate) fn new(supervisor: Arc<SupervisorShared>) -> Self {
        ActorBase {
            supervisor,
            state: ActorState::New,
            address: None,
            owned_addresses: Vec::new(),
            behavior: None,
            points: Vec::new(),
            stashed_init: None,
            stashed_shutdown: None,
            self_ref: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ActorState {
        self.state
    }

    pub(crate) fn set_state(&mut self, next: ActorState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal state transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(actor = ?self.address, from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }

    /// The actor's main address. Available from `do_initialize` on.
    pub fn address(&self) -> Address {
        self.try_address()
            .cloned()
            .expect("actor has a main address once initialized")
    }

    pub(crate) fn try_address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    pub(crate) fn set_main_address(&mut self, address: Address) {
        debug_assert!(self.address.is_none(), "main address assigned twice");
        self.address = Some(address);
    }

    /// Bind a pre-supplied main address (the supervisor issues its own main
    /// address before constructing itself).
    pub(crate) fn adopt_main_address(&mut self, address: Address) {
        self.owned_addresses.push(address.clone());
        self.set_main_address(address);
    }

    /// Main address of this actor's supervisor.
    pub fn supervisor_address(&self) -> Address {
        self.supervisor.main_address()
    }

    /// The subscription points this actor currently holds, in subscription
    /// order. Shutdown unwinds exactly this list.
    pub fn subscription_points(&self) -> &[SubscriptionPoint] {
        &self.points
    }

    /// Allocate a fresh address owned by this actor's supervisor. The actor
    /// is recorded as the address's user, so pending requests routed through
    /// it are cancelled when the actor shuts down.
    pub fn make_address(&mut self) -> Address {
        let address = self.supervisor.make_address();
        self.owned_addresses.push(address.clone());
        address
    }

    pub(crate) fn set_self_ref(&mut self, self_ref: WeakActorRef) {
        self.self_ref = Some(self_ref);
    }

    pub(crate) fn owner_ref(&self) -> ActorRef {
        self.self_ref
            .as_ref()
            .and_then(WeakActorRef::upgrade)
            .expect("actor is registered with its supervisor")
    }

    pub(crate) fn has_behavior(&self) -> bool {
        self.behavior.is_some()
    }

    pub(crate) fn set_behavior(&mut self, behavior: Box<dyn ActorBehavior>) {
        self.behavior = Some(behavior);
    }

    pub(crate) fn take_behavior(&mut self) -> Option<Box<dyn ActorBehavior>> {
        self.behavior.take()
    }

    pub(crate) fn restore_behavior(&mut self, behavior: Box<dyn ActorBehavior>) {
        self.behavior = Some(behavior);
    }

    /// Enqueue a typed message to `dest`, through the queue of the
    /// supervisor owning `dest`.
    pub fn send<P: Payload>(&self, dest: &Address, payload: P) {
        Message::new(dest.clone(), payload).enqueue();
    }

    /// Request builder replying to this actor's main address.
    pub fn request<T: RequestPayload>(&self, dest: &Address, payload: T) -> RequestBuilder<T> {
        RequestBuilder::new(dest.clone(), self.address(), payload)
    }

    /// Request builder replying to `reply_to`, which must be an address this
    /// actor owns. Useful when one response type needs several handling
    /// sites on the same actor.
    pub fn request_via<T: RequestPayload>(
        &self,
        dest: &Address,
        reply_to: &Address,
        payload: T,
    ) -> RequestBuilder<T> {
        debug_assert!(
            self.owned_addresses.contains(reply_to),
            "request_via reply address must belong to the requesting actor"
        );
        RequestBuilder::new(dest.clone(), reply_to.clone(), payload)
    }

    /// Answer `request` with a success payload.
    pub fn reply_to<T: RequestPayload>(&self, request: &Request<T>, reply: T::Reply) {
        Message::reply(
            request.reply_to().clone(),
            Response::<T>::new(request.id(), Ok(reply)),
        )
        .enqueue();
    }

    /// Answer `request` with an error code.
    pub fn reply_with_error<T: RequestPayload>(&self, request: &Request<T>, code: ErrorCode) {
        Message::reply(
            request.reply_to().clone(),
            Response::<T>::new(request.id(), Err(code)),
        )
        .enqueue();
    }

    /// Ask the supervisor to shut this actor down. Safe to call repeatedly;
    /// the supervisor ignores triggers for an actor already terminating.
    pub fn do_shutdown(&self) {
        self.send(
            &self.supervisor_address(),
            ShutdownTrigger { address: self.address() },
        );
    }

    /// Route `handler` into the dispatch index of the supervisor owning
    /// `address`. Local addresses are indexed synchronously (the
    /// confirmation is enqueued behind any messages already in flight);
    /// foreign addresses go through their supervisor's control channel.
    pub fn subscribe_handler(&self, handler: Handler, address: &Address) {
        if address.is_owned_by(&self.supervisor) {
            self.supervisor.subscribe_local(address.clone(), handler);
        } else {
            self.send(
                &address.supervisor_address(),
                ExternalSubscription { handler, address: address.clone() },
            );
        }
    }

    /// Undo a subscription. For a locally-owned address the confirmation
    /// (carrying `callback`) is enqueued to this actor, whose processing of
    /// it commits the index removal; for a foreign address the two-leg
    /// external-unsubscription protocol runs and `callback` must be `None`.
    pub fn unsubscribe_handler(
        &self,
        handler: Handler,
        address: &Address,
        callback: Option<UnsubscribeCallback>,
    ) {
        if address.is_owned_by(&self.supervisor) {
            self.supervisor
                .unsubscribe_local(address.clone(), handler, callback);
        } else {
            debug_assert!(
                callback.is_none(),
                "unsubscribe callbacks are only supported on local addresses"
            );
            let owner_address = handler.owner_address().clone();
            self.send(
                &owner_address,
                ExternalUnsubscription { handler, address: address.clone() },
            );
        }
    }

    /// Report init failure instead of calling `init_finish`. The supervisor
    /// responds by shutting the actor down without starting it.
    pub fn fail_init(&mut self, code: ErrorCode) {
        if let Some((id, reply_to)) = self.stashed_init.take() {
            Message::reply(reply_to, Response::<Initialize>::new(id, Err(code))).enqueue();
        } else {
            debug_assert!(false, "fail_init without a stashed init request");
        }
    }

    pub(crate) fn stash_init(&mut self, request: &Request<Initialize>) {
        debug_assert!(self.stashed_init.is_none(), "init request stashed twice");
        self.stashed_init = Some((request.id(), request.reply_to().clone()));
    }

    pub(crate) fn take_stashed_init(&mut self) -> Option<(arbor_core::RequestId, Address)> {
        self.stashed_init.take()
    }

    pub(crate) fn stash_shutdown(&mut self, request: &Request<Shutdown>) {
        debug_assert!(self.stashed_shutdown.is_none(), "shutdown request stashed twice");
        self.stashed_shutdown = Some((request.id(), request.reply_to().clone()));
    }

    pub(crate) fn take_stashed_shutdown(&mut self) -> Option<(arbor_core::RequestId, Address)> {
        self.stashed_shutdown.take()
    }

    pub(crate) fn record_point(&mut self, point: SubscriptionPoint) {
        self.points.push(point);
    }

    /// Drop the newest matching point. Matching an absent point is a
    /// programming error (unknown subscription on removal).
    pub(crate) fn remove_point(&mut self, address: &Address, handler: &Handler) -> bool {
        let Some(position) = self
            .points
            .iter()
            .rposition(|p| p.address == *address && p.handler == *handler)
        else {
            return false;
        };
        self.points.remove(position);
        true
    }

    /// Cancel every request still pending on an address this actor owns;
    /// each pending requester handler receives a `cancelled` error response.
    pub(crate) fn cancel_pending_requests(&self) {
        self.supervisor.cancel_requests_for(&self.owned_addresses);
    }

    // The unsubscription handlers go in first: shutdown unwinds points in
    // reverse subscription order, so the first-subscribed handlers are the
    // last removed and can still process the confirmations of everything
    // unsubscribed before them.
    pub(crate) fn subscribe_framework_handlers(&self) {
        let owner = self.owner_ref();
        let address = self.address();
        let hook = |handler: Handler| self.subscribe_handler(handler, &address);

        hook(Handler::for_hook::<UnsubscriptionConfirmed>(
            owner.clone(),
            address.clone(),
            |a, m| a.on_unsubscription(m),
        ));
        hook(Handler::for_hook::<ExternalUnsubscription>(
            owner.clone(),
            address.clone(),
            |a, m| a.on_external_unsubscription(m),
        ));
        hook(Handler::for_hook::<Request<Initialize>>(
            owner.clone(),
            address.clone(),
            |a, m| a.on_initialize(m),
        ));
        hook(Handler::for_hook::<StartActor>(
            owner.clone(),
            address.clone(),
            |a, m| a.on_start(m),
        ));
        hook(Handler::for_hook::<Request<Shutdown>>(
            owner.clone(),
            address.clone(),
            |a, m| a.on_shutdown(m),
        ));
        hook(Handler::for_hook::<ShutdownTrigger>(
            owner.clone(),
            address.clone(),
            |a, m| a.on_shutdown_trigger(m),
        ));
        hook(Handler::for_hook::<SubscriptionConfirmed>(
            owner,
            address.clone(),
            |a, m| a.on_subscription(m),
        ));
    }
}

/// An Arbor actor.
///
/// ## Implementing
/// Embed an [`ActorBase`] and wire up `base`/`base_mut`; everything else has
/// a default. The hooks mirror the lifecycle: override `init_start` to
/// acquire resources before confirming init (calling
/// [`init_finish`](Actor::init_finish) when ready), `shutdown_start` to
/// release them, `create_behavior` to install a custom step driver.
///
/// ## Threading
/// All hooks and handlers run on the owning supervisor's locality, one at a
/// time, to completion. Hooks must not block and must not panic; asynchrony
/// is expressed with messages and timers.
pub trait Actor: Any + Send {
    fn base(&self) -> &ActorBase;
    fn base_mut(&mut self) -> &mut ActorBase;

    /// Construct the behavior driving this actor's init/shutdown steps.
    fn create_behavior(&mut self) -> Box<dyn ActorBehavior> {
        Box::new(DefaultBehavior)
    }

    /// Allocate the actor's main address.
    fn create_address(&mut self) -> Address {
        self.base_mut().make_address()
    }

    /// Early initialization: bind the main address, install the behavior,
    /// subscribe the framework handlers, and become `Initializing`. Called
    /// exactly once, when the actor is registered with its supervisor.
    /// Overrides extend [`default_do_initialize`].
    fn do_initialize(&mut self) {
        default_do_initialize(self);
    }

    /// The init request arrived: stash it and begin the init sequence.
    fn on_initialize(&mut self, request: &Request<Initialize>) {
        default_on_initialize(self, request);
    }

    /// Begin initialization. The default defers to the behavior, which for
    /// [`DefaultBehavior`] completes immediately. Override to acquire
    /// resources first and call [`init_finish`](Actor::init_finish) once
    /// they are ready.
    fn init_start(&mut self) {
        default_init_start(self);
    }

    /// Confirm initialization to the supervisor by answering the stashed
    /// init request.
    fn init_finish(&mut self) {
        let address = self.base().address();
        if let Some((id, reply_to)) = self.base_mut().take_stashed_init() {
            Message::reply(reply_to, Response::<Initialize>::new(id, Ok(address))).enqueue();
        } else {
            debug_assert!(false, "init_finish without a stashed init request");
        }
    }

    /// Start confirmation from the supervisor.
    fn on_start(&mut self, message: &StartActor) {
        default_on_start(self, message);
    }

    /// The shutdown request arrived: stash it and begin unwinding.
    fn on_shutdown(&mut self, request: &Request<Shutdown>) {
        if self.base().state().is_terminating() {
            warn!(actor = %self.base().address(), "shutdown request while already terminating");
            return;
        }
        self.base_mut().stash_shutdown(request);
        self.base_mut().set_state(ActorState::ShuttingDown);
        self.shutdown_start();
    }

    /// A shutdown trigger arrived at this actor's address: forward the
    /// shutdown wish to the supervisor.
    fn on_shutdown_trigger(&mut self, _trigger: &ShutdownTrigger) {
        self.base().do_shutdown();
    }

    /// Begin releasing resources. The default cancels this actor's pending
    /// requests and defers to the behavior, which unwinds every
    /// subscription point. Override to release external resources first.
    fn shutdown_start(&mut self) {
        default_shutdown_start(self);
    }

    /// Last step of the shutdown sequence: answer the stashed shutdown
    /// request and become `ShutDown`. No hook runs after this.
    fn shutdown_finish(&mut self) {
        default_shutdown_finish(self);
    }

    /// The dispatch index accepted one of this actor's subscriptions.
    fn on_subscription(&mut self, confirmation: &SubscriptionConfirmed) {
        self.base_mut().record_point(SubscriptionPoint {
            handler: confirmation.handler.clone(),
            address: confirmation.address.clone(),
        });
    }

    /// An unsubscription this actor asked for reached its confirmation:
    /// drop the point, commit the index removal, run the callback. During
    /// shutdown this is what drives the unwind to completion.
    fn on_unsubscription(&mut self, confirmation: &UnsubscriptionConfirmed) {
        let removed = self
            .base_mut()
            .remove_point(&confirmation.address, &confirmation.handler);
        debug_assert!(removed, "unsubscription confirmation for unknown point");
        confirmation
            .address
            .owner()
            .commit_unsubscription(&confirmation.address, &confirmation.handler);
        if let Some(callback) = &confirmation.callback {
            callback();
        }
        if self.base().state() == ActorState::ShuttingDown {
            match with_behavior(self.base_mut(), |b, base| b.on_unsubscription(base)) {
                BehaviorStep::Complete => self.shutdown_finish(),
                BehaviorStep::Pending => {}
            }
        }
    }

    /// First leg of a cross-supervisor unsubscription: drop the local point,
    /// then ask the address-owning supervisor to drop its index entry.
    fn on_external_unsubscription(&mut self, message: &ExternalUnsubscription) {
        let removed = self
            .base_mut()
            .remove_point(&message.address, &message.handler);
        debug_assert!(removed, "external unsubscription for unknown point");
        self.base().send(
            &message.address.supervisor_address(),
            CommitUnsubscription {
                handler: message.handler.clone(),
                address: message.address.clone(),
            },
        );
        if self.base().state() == ActorState::ShuttingDown {
            match with_behavior(self.base_mut(), |b, base| b.on_unsubscription(base)) {
                BehaviorStep::Complete => self.shutdown_finish(),
                BehaviorStep::Pending => {}
            }
        }
    }
}

// The `default_*` functions below are the bodies of the corresponding
// hooks, callable from overrides that extend rather than replace them (the
// supervisor does this, and so do instrumenting test actors).

/// Default [`Actor::do_initialize`] sequence.
pub fn default_do_initialize<A: Actor + ?Sized>(actor: &mut A) {
    if actor.base().try_address().is_none() {
        let address = actor.create_address();
        actor.base_mut().set_main_address(address);
    }
    if !actor.base().has_behavior() {
        let behavior = actor.create_behavior();
        actor.base_mut().set_behavior(behavior);
    }
    actor.base().subscribe_framework_handlers();
    actor.base_mut().set_state(ActorState::Initializing);
}

/// Default [`Actor::on_initialize`] sequence.
pub fn default_on_initialize<A: Actor + ?Sized>(actor: &mut A, request: &Request<Initialize>) {
    actor.base_mut().stash_init(request);
    actor.init_start();
}

/// Default [`Actor::init_start`] sequence.
pub fn default_init_start<A: Actor + ?Sized>(actor: &mut A) {
    match with_behavior(actor.base_mut(), |b, base| b.on_start_init(base)) {
        BehaviorStep::Complete => actor.init_finish(),
        BehaviorStep::Pending => {}
    }
}

/// Default [`Actor::on_start`] sequence.
pub fn default_on_start<A: Actor + ?Sized>(actor: &mut A, _message: &StartActor) {
    actor.base_mut().set_state(ActorState::Operational);
}

/// Default [`Actor::shutdown_start`] sequence.
pub fn default_shutdown_start<A: Actor + ?Sized>(actor: &mut A) {
    actor.base().cancel_pending_requests();
    match with_behavior(actor.base_mut(), |b, base| b.on_start_shutdown(base)) {
        BehaviorStep::Complete => actor.shutdown_finish(),
        BehaviorStep::Pending => {}
    }
}

/// Default [`Actor::shutdown_finish`] sequence.
pub fn default_shutdown_finish<A: Actor + ?Sized>(actor: &mut A) {
    debug_assert!(
        actor.base().subscription_points().is_empty(),
        "shutdown_finish with live subscription points"
    );
    let address = actor.base().address();
    if let Some((id, reply_to)) = actor.base_mut().take_stashed_shutdown() {
        Message::reply(reply_to, Response::<Shutdown>::new(id, Ok(address))).enqueue();
    }
    actor.base_mut().set_state(ActorState::ShutDown);
}

/// Typed subscribe/unsubscribe sugar, usable on concrete actor types only.
pub trait ActorExt: Actor + Sized {
    /// Subscribe a method of this actor on its main address.
    fn subscribe<M: Payload>(&mut self, f: fn(&mut Self, &M)) -> Handler {
        let address = self.base().address();
        self.subscribe_to(f, &address)
    }

    /// Subscribe a method of this actor on an arbitrary address, possibly
    /// owned by another supervisor.
    fn subscribe_to<M: Payload>(&mut self, f: fn(&mut Self, &M), address: &Address) -> Handler {
        let handler =
            Handler::for_method(self.base().owner_ref(), self.base().address(), f);
        self.base().subscribe_handler(handler.clone(), address);
        handler
    }

    /// Subscribe a closure on an address. The closure sees only the
    /// payload; equality follows the closure's unique type.
    fn subscribe_closure<M, F>(&mut self, f: F, address: &Address) -> Handler
    where
        M: Payload,
        F: Fn(&M) + Send + Sync + 'static,
    {
        let handler =
            Handler::for_closure(self.base().owner_ref(), self.base().address(), f);
        self.base().subscribe_handler(handler.clone(), address);
        handler
    }

    /// Unsubscribe a method from the main address. A fresh handler is built
    /// from `f`; removal matches by `(callback site, owner)`.
    fn unsubscribe<M: Payload>(&mut self, f: fn(&mut Self, &M)) {
        let address = self.base().address();
        self.unsubscribe_from(f, &address);
    }

    /// Unsubscribe a method from an arbitrary address.
    fn unsubscribe_from<M: Payload>(&mut self, f: fn(&mut Self, &M), address: &Address) {
        let handler =
            Handler::for_method(self.base().owner_ref(), self.base().address(), f);
        self.base().unsubscribe_handler(handler, address, None);
    }
}

impl<A: Actor> ActorExt for A {}
