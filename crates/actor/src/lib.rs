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

//! # Arbor Actor Runtime
//!
//! ## Purpose
//! An in-process actor runtime for cooperative event loops: actors hold
//! private state, communicate through typed messages routed by opaque
//! addresses, and are driven through a strict lifecycle by a supervisor that
//! owns the message queue and the dispatch index.
//!
//! ## Architecture Context
//! The runtime core is synchronous. Handlers run to completion on the
//! supervisor's thread; asynchrony is expressed by enqueueing further
//! messages or arming timers, never by suspending a handler. An embedding
//! (see `arbor-tokio`) supplies the event loop that calls
//! [`SupervisorRef::do_process`] whenever messages may be available, and a
//! [`TimerDriver`](arbor_core::TimerDriver) that delivers timer fires back
//! through [`SupervisorRef::on_timer`].
//!
//! ### Component Diagram
//! ```text
//!            embedding (event loop + timer driver)
//!                 |  do_process / on_timer
//!                 v
//!  SupervisorRef ---> Supervisor (children, init/shutdown sequencing)
//!                 \-> SupervisorShared (queue, subscription index,
//!                      pending requests, timers)
//!                          ^
//!          send / request  |   subscribe / unsubscribe
//!                          |
//!                     ActorBase <- user actors (impl Actor)
//! ```
//!
//! ## Key Components
//! - [`Message`]: type-tagged envelope; payloads are immutable once enqueued
//! - [`Address`]: opaque identity owned by exactly one supervisor
//! - [`Handler`]: typed callback bound to an actor, compared by
//!   `(callback site, owner)`
//! - [`Actor`] / [`ActorBase`] / [`ActorExt`]: the lifecycle state machine
//!   and the typed subscribe/send/request surface
//! - [`ActorBehavior`]: pluggable init/shutdown step driver
//! - [`Supervisor`] / [`SupervisorRef`]: queue, dispatch index, child
//!   lifecycle, drain loop, multi-supervisor federation
//!
//! ## Example
//! ```rust,ignore
//! use std::sync::Arc;
//! use arbor_actor::{Actor, ActorBase, ActorExt, Supervisor};
//! use arbor_core::{ManualTimerDriver, SupervisorConfig};
//!
//! struct Greeter {
//!     base: ActorBase,
//! }
//!
//! struct Hello(String);
//!
//! impl Actor for Greeter {
//!     fn base(&self) -> &ActorBase { &self.base }
//!     fn base_mut(&mut self) -> &mut ActorBase { &mut self.base }
//!
//!     fn init_start(&mut self) {
//!         self.subscribe(Greeter::on_hello);
//!         self.init_finish();
//!     }
//! }
//!
//! impl Greeter {
//!     fn on_hello(&mut self, msg: &Hello) {
//!         println!("hello, {}", msg.0);
//!     }
//! }
//!
//! let driver = Arc::new(ManualTimerDriver::new());
//! let sup = Supervisor::spawn(SupervisorConfig::default(), driver);
//! let greeter = sup.create_actor(|base| Greeter { base });
//! sup.start();
//! sup.do_process();
//! ```

mod actor;
mod address;
mod behavior;
mod handler;
mod message;
mod protocol;
mod request;
mod subscription;
mod supervisor;

pub use actor::{
    default_do_initialize, default_init_start, default_on_initialize, default_on_start,
    default_shutdown_finish, default_shutdown_start, Actor, ActorBase, ActorExt, ActorRef,
    WeakActorRef,
};
pub use address::Address;
pub use behavior::{ActorBehavior, BehaviorStep, DefaultBehavior};
pub use handler::{Handler, HandlerTag};
pub use message::{Message, Payload, Request, RequestPayload, Response};
pub use protocol::{
    CommitUnsubscription, ExternalSubscription, ExternalUnsubscription, Initialize, Shutdown,
    ShutdownTrigger, StartActor, StateQuery, SubscriptionConfirmed, UnsubscribeCallback,
    UnsubscriptionConfirmed,
};
pub use request::RequestBuilder;
pub use subscription::SubscriptionPoint;
pub use supervisor::{Supervisor, SupervisorRef};
