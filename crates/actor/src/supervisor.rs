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

//! The supervisor: queue, dispatch index, child lifecycle, drain loop.
//!
//! A supervisor is itself an actor (same six states, same hooks) with extra
//! duties: it owns the FIFO queue for addresses it issued, the authoritative
//! subscription index, the pending-request/timer bookkeeping, and the child
//! collection whose init and shutdown it sequences.
//!
//! ## Locking
//! The dispatch state ([`SupervisorShared`]) sits behind fine-grained locks
//! taken only for individual operations, never across a handler invocation.
//! [`SupervisorRef::do_process`] therefore holds no lock while a handler
//! runs, which is what lets handlers freely send, subscribe, and issue
//! requests. The queue lock is the one structure foreign localities touch
//! (cross-locality `enqueue`); everything else is only reached from the
//! owning locality or through control messages.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use arbor_core::{ActorState, ErrorCode, Locality, RequestId, SupervisorConfig, TimerDriver, TimerId};

use crate::actor::{default_do_initialize, default_shutdown_finish, Actor, ActorBase, ActorExt, ActorRef};
use crate::address::Address;
use crate::behavior::{with_behavior, BehaviorStep};
use crate::handler::Handler;
use crate::message::{Message, Request, Response};
use crate::protocol::{
    CommitUnsubscription, ExternalSubscription, Initialize, Shutdown, ShutdownTrigger, StartActor,
    StateQuery, SubscriptionConfirmed, UnsubscribeCallback, UnsubscriptionConfirmed,
};
use crate::subscription::SubscriptionMap;

/// One request in flight, from the requester supervisor's point of view.
pub(crate) struct PendingRequest {
    timer: TimerId,
    reply_to: Address,
    /// Builds the typed error response for this request; monomorphized at
    /// issue time so timeouts and cancellations can be synthesized without
    /// knowing the reply type here.
    error_reply: Box<dyn Fn(ErrorCode) -> Message + Send + Sync>,
}

/// Dispatch state of one supervisor: the queue, the subscription index, and
/// the request/timer bookkeeping.
///
/// Shared between the supervisor actor, every address it issued, and every
/// actor base bound to it.
pub struct SupervisorShared {
    locality: Locality,
    driver: Arc<dyn TimerDriver>,
    queue: Mutex<VecDeque<Message>>,
    subscriptions: Mutex<SubscriptionMap>,
    pending: Mutex<HashMap<RequestId, PendingRequest>>,
    timers: Mutex<HashMap<TimerId, RequestId>>,
    next_timer: AtomicU64,
    next_address: AtomicU64,
    main_address: OnceLock<Address>,
    wake: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl SupervisorShared {
    pub(crate) fn new(locality: Locality, driver: Arc<dyn TimerDriver>) -> Arc<Self> {
        Arc::new(SupervisorShared {
            locality,
            driver,
            queue: Mutex::new(VecDeque::new()),
            subscriptions: Mutex::new(SubscriptionMap::default()),
            pending: Mutex::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
            next_timer: AtomicU64::new(1),
            next_address: AtomicU64::new(1),
            main_address: OnceLock::new(),
            wake: Mutex::new(None),
        })
    }

    pub(crate) fn locality(&self) -> Locality {
        self.locality
    }

    /// Issue a fresh address owned by this supervisor.
    pub(crate) fn make_address(self: &Arc<Self>) -> Address {
        let debug_id = self.next_address.fetch_add(1, Ordering::Relaxed);
        Address::new(self, debug_id)
    }

    pub(crate) fn set_main_address(&self, address: Address) {
        let assigned = self.main_address.set(address).is_ok();
        debug_assert!(assigned, "supervisor main address assigned twice");
    }

    /// Main address of the supervisor actor owning this state.
    pub(crate) fn main_address(&self) -> Address {
        self.main_address
            .get()
            .cloned()
            .expect("supervisor main address is assigned at spawn")
    }

    /// Append to the queue. Thread-safe: this is the one mutation foreign
    /// localities perform.
    pub(crate) fn enqueue(&self, message: Message) {
        self.queue.lock().push_back(message);
        if let Some(wake) = self.wake.lock().as_ref() {
            wake();
        }
    }

    pub(crate) fn take_next(&self) -> Option<Message> {
        self.queue.lock().pop_front()
    }

    /// Accept `(handler, address)` into the dispatch index and confirm to
    /// the handler's owner. The index entry is live immediately; the
    /// confirmation queues behind whatever is already in flight.
    pub(crate) fn subscribe_local(self: &Arc<Self>, address: Address, handler: Handler) {
        debug_assert!(
            address.is_owned_by(self),
            "subscribe routed to a supervisor that does not own the address"
        );
        let owner_address = handler.owner_address().clone();
        trace!(address = %address, owner = %owner_address, "subscribe");
        self.subscriptions.lock().subscribe(address.clone(), handler.clone());
        Message::new(owner_address, SubscriptionConfirmed { handler, address }).enqueue();
    }

    /// Begin dropping `(handler, address)` from the dispatch index: the
    /// confirmation is queued to the handler's owner, and the index entry
    /// is removed when the owner processes it (commit). Messages already in
    /// flight ahead of the confirmation still reach the handler; anything
    /// sent after it cannot.
    pub(crate) fn unsubscribe_local(
        self: &Arc<Self>,
        address: Address,
        handler: Handler,
        callback: Option<UnsubscribeCallback>,
    ) {
        let owner_address = handler.owner_address().clone();
        trace!(address = %address, owner = %owner_address, "unsubscribe");
        Message::new(
            owner_address,
            UnsubscriptionConfirmed { handler, address, callback },
        )
        .enqueue();
    }

    /// Final leg of any unsubscription: drop the index entry. Reached from
    /// the owner's confirmation processing (local) or from a
    /// `CommitUnsubscription` control message (cross-supervisor). Removing
    /// an unknown subscription is a programming error.
    pub(crate) fn commit_unsubscription(&self, address: &Address, handler: &Handler) {
        let removed = self.subscriptions.lock().unsubscribe(address, handler);
        debug_assert!(removed, "commit for an unknown subscription");
    }

    pub(crate) fn handlers_for(&self, address: &Address) -> Vec<Handler> {
        self.subscriptions.lock().handlers_for(address)
    }

    /// Record a pending request and arm its timeout timer.
    pub(crate) fn register_request(
        &self,
        id: RequestId,
        timeout: Duration,
        reply_to: Address,
        error_reply: Box<dyn Fn(ErrorCode) -> Message + Send + Sync>,
    ) -> TimerId {
        let timer = TimerId(self.next_timer.fetch_add(1, Ordering::Relaxed));
        self.timers.lock().insert(timer, id);
        self.pending
            .lock()
            .insert(id, PendingRequest { timer, reply_to, error_reply });
        trace!(request = %id, %timer, ?timeout, "request armed");
        self.driver.start_timer(timer, timeout);
        timer
    }

    pub(crate) fn take_pending(&self, id: RequestId) -> Option<PendingRequest> {
        self.pending.lock().remove(&id)
    }

    /// Disarm the timer of a request that was answered in time.
    pub(crate) fn settle_request_timer(&self, pending: &PendingRequest) {
        self.timers.lock().remove(&pending.timer);
        self.driver.cancel_timer(pending.timer);
    }

    /// A timer fired. If it still maps to a pending request, synthesize the
    /// timeout error response; a fire after cancellation is discarded.
    pub(crate) fn on_timer_fired(&self, timer: TimerId) {
        let Some(id) = self.timers.lock().remove(&timer) else {
            trace!(%timer, "late fire of a cancelled timer");
            return;
        };
        let Some(pending) = self.pending.lock().remove(&id) else {
            trace!(request = %id, "timer fired for an already settled request");
            return;
        };
        debug!(request = %id, %timer, "request timed out");
        metrics::counter!("arbor_request_timeouts_total").increment(1);
        (pending.error_reply)(ErrorCode::Timeout).enqueue();
    }

    /// Cancel every pending request whose reply address is one of
    /// `addresses`; each receives a synthesized `cancelled` response.
    pub(crate) fn cancel_requests_for(&self, addresses: &[Address]) {
        let cancelled: Vec<PendingRequest> = {
            let mut pending = self.pending.lock();
            let ids: Vec<RequestId> = pending
                .iter()
                .filter(|(_, p)| addresses.contains(&p.reply_to))
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter().filter_map(|id| pending.remove(&id)).collect()
        };
        for pending in cancelled {
            self.timers.lock().remove(&pending.timer);
            self.driver.cancel_timer(pending.timer);
            (pending.error_reply)(ErrorCode::Cancelled).enqueue();
        }
    }

    /// Disarm everything. Run by the supervisor's `shutdown_finish`.
    pub(crate) fn cancel_all_timers(&self) {
        let timers: Vec<TimerId> = self.timers.lock().drain().map(|(t, _)| t).collect();
        for timer in timers {
            self.driver.cancel_timer(timer);
        }
        self.pending.lock().clear();
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    pub(crate) fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub(crate) fn active_timer_count(&self) -> usize {
        self.timers.lock().len()
    }

    pub(crate) fn set_wake_hook(&self, hook: Option<Box<dyn Fn() + Send + Sync>>) {
        *self.wake.lock() = hook;
    }
}

struct ChildRecord {
    actor: ActorRef,
    init_request: Option<RequestId>,
    shutdown_request: Option<RequestId>,
}

/// The supervisor actor.
///
/// Accessed by embedders through [`SupervisorRef`]; actors interact with it
/// only through messages. Its own lifecycle follows the ordinary actor
/// sequence, driven by an init request it sends to itself on
/// [`SupervisorRef::start`].
pub struct Supervisor {
    base: ActorBase,
    config: SupervisorConfig,
    shared: Arc<SupervisorShared>,
    children: IndexMap<Address, ChildRecord>,
    own_init: Option<RequestId>,
    own_shutdown: Option<RequestId>,
}

impl Supervisor {
    /// Build a supervisor bound to `driver` and return its handle.
    ///
    /// The supervisor pre-initializes immediately (framework and control
    /// handlers subscribed, state `Initializing`); nothing moves until
    /// [`SupervisorRef::start`] and the first
    /// [`SupervisorRef::do_process`].
    pub fn spawn(config: SupervisorConfig, driver: Arc<dyn TimerDriver>) -> SupervisorRef {
        let shared = SupervisorShared::new(config.locality, driver);
        let main = shared.make_address();
        shared.set_main_address(main.clone());

        let supervisor = Supervisor {
            base: ActorBase::new(shared.clone()),
            config,
            shared: shared.clone(),
            children: IndexMap::new(),
            own_init: None,
            own_shutdown: None,
        };
        let cell: Arc<Mutex<dyn Actor>> = Arc::new(Mutex::new(supervisor));
        let actor = ActorRef::from_arc(cell);
        {
            let mut guard = actor.lock();
            guard.base_mut().set_self_ref(actor.downgrade());
            guard.base_mut().adopt_main_address(main);
            guard.do_initialize();
        }
        info!(supervisor = %shared.main_address(), "supervisor spawned");
        SupervisorRef { actor, shared }
    }

    fn start_self(&mut self) {
        if self.own_init.is_some() || self.base.state() > ActorState::Initializing {
            warn!(supervisor = %self.base.address(), "start called twice");
            return;
        }
        let address = self.base.address();
        let id = self
            .base
            .request(&address, Initialize)
            .send(self.config.init_timeout);
        self.own_init = Some(id);
    }

    pub(crate) fn register_child(&mut self, actor: ActorRef, address: Address) {
        debug_assert!(
            !self.children.contains_key(&address),
            "child registered twice under one address"
        );
        if self.base.state().is_terminating() {
            warn!(child = %address, "child created on a terminating supervisor");
            return;
        }
        self.children.insert(
            address.clone(),
            ChildRecord { actor, init_request: None, shutdown_request: None },
        );
        if self.base.state() == ActorState::Operational {
            self.send_child_init(&address);
        }
    }

    fn send_child_init(&mut self, address: &Address) {
        let id = self
            .base
            .request(address, Initialize)
            .send(self.config.init_timeout);
        if let Some(child) = self.children.get_mut(address) {
            child.init_request = Some(id);
        }
    }

    fn send_child_shutdown(&mut self, address: &Address) {
        let already = self
            .children
            .get(address)
            .map_or(true, |child| child.shutdown_request.is_some());
        if already {
            return;
        }
        let id = self
            .base
            .request(address, Shutdown)
            .send(self.config.shutdown_timeout);
        if let Some(child) = self.children.get_mut(address) {
            child.shutdown_request = Some(id);
        }
    }

    /// Child (or own) init confirmation. Success moves the target to
    /// `Initialized` and starts it; failure shuts the target down without
    /// ever starting it.
    fn on_init_confirmed(&mut self, response: &Response<Initialize>) {
        if Some(response.id()) == self.own_init {
            match response.result() {
                Ok(_) => {
                    self.base.set_state(ActorState::Initialized);
                    let address = self.base.address();
                    self.base.send(&address, StartActor);
                }
                Err(code) => {
                    warn!(supervisor = %self.base.address(), %code, "supervisor init failed");
                    self.base.do_shutdown();
                }
            }
            return;
        }

        let Some(address) = self
            .children
            .iter()
            .find(|(_, child)| child.init_request == Some(response.id()))
            .map(|(address, _)| address.clone())
        else {
            trace!(request = %response.id(), "init confirmation for an unknown request");
            return;
        };
        match response.result() {
            Ok(_) => {
                if let Some(child) = self.children.get(&address) {
                    child.actor.lock().base_mut().set_state(ActorState::Initialized);
                }
                self.base.send(&address, StartActor);
            }
            Err(code) => {
                warn!(child = %address, %code, "child init failed; shutting it down");
                self.send_child_shutdown(&address);
            }
        }
    }

    /// Child (or own) shutdown confirmation. The child is removed either
    /// way; once the collection drains during the supervisor's own
    /// shutdown, the supervisor unwinds its subscriptions.
    fn on_shutdown_confirmed(&mut self, response: &Response<Shutdown>) {
        if Some(response.id()) == self.own_shutdown {
            if let Err(code) = response.result() {
                if code == ErrorCode::Timeout {
                    warn!(supervisor = %self.base.address(), "own shutdown request timed out");
                }
            }
            return;
        }

        let Some(address) = self
            .children
            .iter()
            .find(|(_, child)| child.shutdown_request == Some(response.id()))
            .map(|(address, _)| address.clone())
        else {
            trace!(request = %response.id(), "shutdown confirmation for an unknown request");
            return;
        };
        match response.result() {
            Ok(_) => debug!(child = %address, "child shut down"),
            Err(code) => {
                warn!(child = %address, %code, "child failed to confirm shutdown; detaching");
            }
        }
        self.children.shift_remove(&address);

        if self.base.state() == ActorState::ShuttingDown && self.children.is_empty() {
            match with_behavior(self.base_mut(), |b, base| b.on_start_shutdown(base)) {
                BehaviorStep::Complete => self.shutdown_finish(),
                BehaviorStep::Pending => {}
            }
        }
    }

    /// An actor on another supervisor subscribes a handler to an address
    /// owned here.
    fn on_external_subscription(&mut self, message: &ExternalSubscription) {
        debug_assert!(
            message.address.is_owned_by(&self.shared),
            "external subscription for a foreign address"
        );
        self.shared
            .subscribe_local(message.address.clone(), message.handler.clone());
    }

    fn on_commit_unsubscription(&mut self, message: &CommitUnsubscription) {
        self.shared
            .commit_unsubscription(&message.address, &message.handler);
    }

    /// Readiness polling: report the lifecycle state of the actor owning
    /// the queried address.
    fn on_state_query(&mut self, request: &Request<StateQuery>) {
        let subject = &request.payload().subject;
        if *subject == self.base.address() {
            let state = self.base.state();
            self.base.reply_to(request, state);
        } else if let Some(child) = self.children.get(subject) {
            let state = child.actor.state();
            self.base.reply_to(request, state);
        } else {
            self.base.reply_with_error(request, ErrorCode::TargetNotFound);
        }
    }
}

impl Actor for Supervisor {
    fn base(&self) -> &ActorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActorBase {
        &mut self.base
    }

    fn do_initialize(&mut self) {
        default_do_initialize(self);
        // Control handlers beyond the per-actor framework set. Subscribed
        // here, not in init_start: a foreign locality may route external
        // subscriptions and state queries at us before our own init request
        // is processed.
        self.subscribe(Supervisor::on_init_confirmed);
        self.subscribe(Supervisor::on_shutdown_confirmed);
        self.subscribe(Supervisor::on_external_subscription);
        self.subscribe(Supervisor::on_commit_unsubscription);
        self.subscribe(Supervisor::on_state_query);
    }

    fn on_start(&mut self, _message: &StartActor) {
        self.base.set_state(ActorState::Operational);
        info!(supervisor = %self.base.address(), "supervisor operational");
        let waiting: Vec<Address> = self
            .children
            .iter()
            .filter(|(_, child)| child.init_request.is_none())
            .map(|(address, _)| address.clone())
            .collect();
        for address in waiting {
            self.send_child_init(&address);
        }
    }

    /// Shutdown triggers for the supervisor itself and for its children
    /// both land here (the trigger names its target address).
    fn on_shutdown_trigger(&mut self, trigger: &ShutdownTrigger) {
        let target = trigger.address.clone();
        if target == self.base.address() {
            if self.base.state().is_terminating() || self.own_shutdown.is_some() {
                return;
            }
            let id = self
                .base
                .request(&target, Shutdown)
                .send(self.config.shutdown_timeout);
            self.own_shutdown = Some(id);
        } else if self.children.contains_key(&target) {
            let terminating = self
                .children
                .get(&target)
                .map_or(true, |child| child.actor.state().is_terminating());
            if !terminating {
                self.send_child_shutdown(&target);
            }
        } else {
            // A late trigger for an already removed child is legal.
            trace!(target = %target, "shutdown trigger for an unknown address");
        }
    }

    /// Children first, own unwind second.
    fn shutdown_start(&mut self) {
        self.base.cancel_pending_requests();
        if self.children.is_empty() {
            match with_behavior(self.base_mut(), |b, base| b.on_start_shutdown(base)) {
                BehaviorStep::Complete => self.shutdown_finish(),
                BehaviorStep::Pending => {}
            }
        } else {
            let targets: Vec<Address> = self.children.keys().cloned().collect();
            for address in targets {
                self.send_child_shutdown(&address);
            }
        }
    }

    fn shutdown_finish(&mut self) {
        self.shared.cancel_all_timers();
        default_shutdown_finish(self);
        info!(supervisor = %self.base.address(), "supervisor shut down");
    }
}

/// Embedder-facing handle to a supervisor.
///
/// Clones share the supervisor. The handle is the integration surface for
/// event loops: call [`do_process`](SupervisorRef::do_process) whenever
/// messages may be available, deliver timer fires through
/// [`on_timer`](SupervisorRef::on_timer), and install a wake hook so
/// cross-locality enqueues can interrupt your idle wait.
#[derive(Clone)]
pub struct SupervisorRef {
    actor: ActorRef,
    shared: Arc<SupervisorShared>,
}

impl SupervisorRef {
    /// Create an actor owned by this supervisor.
    ///
    /// The actor pre-initializes immediately; its init request is issued
    /// once the supervisor is operational (or right away if it already is).
    /// Call from embedder code, not from inside a handler.
    pub fn create_actor<A, F>(&self, build: F) -> ActorRef
    where
        A: Actor,
        F: FnOnce(ActorBase) -> A,
    {
        let base = ActorBase::new(self.shared.clone());
        let cell: Arc<Mutex<dyn Actor>> = Arc::new(Mutex::new(build(base)));
        let actor = ActorRef::from_arc(cell);
        {
            let mut guard = actor.lock();
            guard.base_mut().set_self_ref(actor.downgrade());
            guard.do_initialize();
        }
        let address = actor.address();
        metrics::counter!("arbor_actors_created_total").increment(1);
        debug!(actor = %address, "actor created");
        self.with_supervisor(|supervisor| supervisor.register_child(actor.clone(), address));
        actor
    }

    /// Kick off the startup sequence: the supervisor sends the init request
    /// to itself; `do_process` does the rest.
    pub fn start(&self) {
        self.with_supervisor(Supervisor::start_self);
    }

    /// Ask the supervisor to shut down itself and all of its children.
    /// Idempotent.
    pub fn shutdown(&self) {
        let main = self.shared.main_address();
        Message::new(main.clone(), ShutdownTrigger { address: main }).enqueue();
    }

    /// Drain the queue: pop one envelope at a time and invoke every
    /// matching handler, until the queue is empty.
    ///
    /// Responses are matched against the pending-request set first: a match
    /// settles the request timer, a miss means the response is stale
    /// (timed out or cancelled) and is dropped.
    pub fn do_process(&self) {
        let mut delivered: u64 = 0;
        while let Some(message) = self.shared.take_next() {
            if let Some(id) = message.correlation() {
                match self.shared.take_pending(id) {
                    Some(pending) => self.shared.settle_request_timer(&pending),
                    None => {
                        trace!(request = %id, "dropping stale response");
                        continue;
                    }
                }
            }
            let handlers = self.shared.handlers_for(message.dest());
            if handlers.is_empty() {
                trace!(dest = %message.dest(), "message without a subscriber");
                continue;
            }
            for handler in &handlers {
                handler.invoke(&message);
            }
            delivered += 1;
        }
        if delivered > 0 {
            metrics::counter!("arbor_messages_delivered_total").increment(delivered);
        }
    }

    /// Deliver a timer fire from the driver.
    pub fn on_timer(&self, timer: TimerId) {
        self.shared.on_timer_fired(timer);
    }

    /// Install the closure the supervisor calls after every enqueue, so the
    /// embedding can schedule a `do_process`. May be invoked from foreign
    /// localities.
    pub fn set_wake_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.shared.set_wake_hook(Some(Box::new(hook)));
    }

    pub fn clear_wake_hook(&self) {
        self.shared.set_wake_hook(None);
    }

    /// The supervisor viewed as an actor.
    pub fn actor(&self) -> &ActorRef {
        &self.actor
    }

    pub fn state(&self) -> ActorState {
        self.actor.state()
    }

    pub fn address(&self) -> Address {
        self.shared.main_address()
    }

    pub fn locality(&self) -> Locality {
        self.shared.locality()
    }

    /// Messages currently queued.
    pub fn queue_len(&self) -> usize {
        self.shared.queue_len()
    }

    /// `(address, handler)` entries currently in the dispatch index.
    pub fn subscription_count(&self) -> usize {
        self.shared.subscription_count()
    }

    /// Timers currently armed.
    pub fn active_timer_count(&self) -> usize {
        self.shared.active_timer_count()
    }

    fn with_supervisor<R>(&self, f: impl FnOnce(&mut Supervisor) -> R) -> R {
        self.actor
            .with_mut(f)
            .expect("a supervisor handle always points at a supervisor")
    }
}
