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

//! Two supervisors on two OS threads (two localities): the pinger polls the
//! remote supervisor for the ponger's readiness, plays one ping/pong round,
//! then shuts both systems down.

use std::time::Duration;

use arbor_actor::{
    default_init_start, default_on_start, Actor, ActorBase, ActorExt, Address, Response,
    ShutdownTrigger, StartActor, StateQuery,
};
use arbor_core::{ActorState, Locality, SupervisorConfig};
use arbor_tokio::SupervisorLoop;

struct Ping;
struct Pong;

struct Pinger {
    base: ActorBase,
    ponger: Option<Address>,
    init_done: bool,
    poll_attempts: u32,
    ping_sent: u32,
    pong_received: u32,
}

impl Pinger {
    fn new(base: ActorBase) -> Self {
        Pinger {
            base,
            ponger: None,
            init_done: false,
            poll_attempts: 0,
            ping_sent: 0,
            pong_received: 0,
        }
    }

    fn poll_ponger(&mut self) {
        self.poll_attempts += 1;
        let ponger = self.ponger.clone().unwrap();
        let remote_supervisor = ponger.supervisor_address();
        self.base()
            .request(&remote_supervisor, StateQuery { subject: ponger })
            .send(Duration::from_secs(1));
    }

    fn on_ponger_state(&mut self, response: &Response<StateQuery>) {
        if self.init_done {
            return;
        }
        match response.result() {
            Ok(state) if *state == ActorState::Operational => {
                self.init_done = true;
                self.init_finish();
            }
            _ if self.poll_attempts >= 100 => self.base().do_shutdown(),
            _ => self.poll_ponger(),
        }
    }

    fn on_pong(&mut self, _message: &Pong) {
        self.pong_received += 1;
        let own_supervisor = self.base().supervisor_address();
        self.base().send(
            &own_supervisor,
            ShutdownTrigger { address: own_supervisor.clone() },
        );
        let remote_supervisor = self.ponger.clone().unwrap().supervisor_address();
        self.base().send(
            &remote_supervisor,
            ShutdownTrigger { address: remote_supervisor.clone() },
        );
    }
}

impl Actor for Pinger {
    fn base(&self) -> &ActorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActorBase {
        &mut self.base
    }

    /// Init completes only once the ponger is known to be operational.
    fn init_start(&mut self) {
        self.subscribe(Pinger::on_pong);
        self.subscribe(Pinger::on_ponger_state);
        self.poll_ponger();
    }

    fn on_start(&mut self, message: &StartActor) {
        default_on_start(self, message);
        self.ping_sent += 1;
        let ponger = self.ponger.clone().unwrap();
        self.base().send(&ponger, Ping);
    }
}

struct Ponger {
    base: ActorBase,
    pinger: Option<Address>,
    ping_received: u32,
    pong_sent: u32,
}

impl Ponger {
    fn new(base: ActorBase) -> Self {
        Ponger { base, pinger: None, ping_received: 0, pong_sent: 0 }
    }

    fn on_ping(&mut self, _message: &Ping) {
        self.ping_received += 1;
        let pinger = self.pinger.clone().unwrap();
        self.base().send(&pinger, Pong);
        self.pong_sent += 1;
    }
}

impl Actor for Ponger {
    fn base(&self) -> &ActorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActorBase {
        &mut self.base
    }

    fn init_start(&mut self) {
        self.subscribe(Ponger::on_ping);
        default_init_start(self);
    }
}

#[test]
fn ping_pong_across_two_threads() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let runtime_a = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let runtime_b = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    let timeout = Duration::from_secs(5);
    let host_a = {
        let _guard = runtime_a.enter();
        SupervisorLoop::spawn(SupervisorConfig::in_locality(Locality::new(), timeout))
    };
    let host_b = {
        let _guard = runtime_b.enter();
        SupervisorLoop::spawn(SupervisorConfig::in_locality(Locality::new(), timeout))
    };
    let sup_a = host_a.supervisor().clone();
    let sup_b = host_b.supervisor().clone();

    let pinger = sup_a.create_actor(Pinger::new);
    let ponger = sup_b.create_actor(Ponger::new);
    pinger.with_mut(|p: &mut Pinger| p.ponger = Some(ponger.address()));
    ponger.with_mut(|p: &mut Ponger| p.pinger = Some(pinger.address()));

    sup_a.start();
    sup_b.start();

    let thread_a = std::thread::spawn(move || runtime_a.block_on(host_a.run()));
    let thread_b = std::thread::spawn(move || runtime_b.block_on(host_b.run()));
    thread_a.join().unwrap();
    thread_b.join().unwrap();

    assert_eq!(pinger.with(|p: &Pinger| p.ping_sent), Some(1));
    assert_eq!(pinger.with(|p: &Pinger| p.pong_received), Some(1));
    assert_eq!(ponger.with(|p: &Ponger| p.ping_received), Some(1));
    assert_eq!(ponger.with(|p: &Ponger| p.pong_sent), Some(1));

    assert_eq!(sup_a.state(), ActorState::ShutDown);
    assert_eq!(sup_b.state(), ActorState::ShutDown);
    assert_eq!(sup_a.queue_len(), 0);
    assert_eq!(sup_b.queue_len(), 0);
    assert_eq!(sup_a.subscription_count(), 0);
    assert_eq!(sup_b.subscription_count(), 0);
    assert_eq!(pinger.state(), ActorState::ShutDown);
    assert_eq!(ponger.state(), ActorState::ShutDown);
    assert_eq!(pinger.subscription_point_count(), 0);
    assert_eq!(ponger.subscription_point_count(), 0);
}
