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

//! Request/response pairing: timeouts, stale responses, cancellation on
//! shutdown, error sub-codes, and the state-query protocol.

mod common;

use std::sync::Arc;
use std::time::Duration;

use arbor_actor::{
    default_init_start, Actor, ActorBase, ActorExt, ActorRef, Address, Request, RequestPayload,
    Response, StateQuery, SupervisorRef,
};
use arbor_core::{ActorState, ErrorCode, ManualTimerDriver};
use common::spawn_manual;

struct Fixture {
    sup: SupervisorRef,
    driver: Arc<ManualTimerDriver>,
    responder: ActorRef,
    requester: ActorRef,
}

#[derive(Clone)]
struct Echo(u32);

impl RequestPayload for Echo {
    type Reply = u32;
}

struct Responder {
    base: ActorBase,
    stashed: Option<Request<Echo>>,
    mode: ResponderMode,
}

#[derive(Clone, Copy, PartialEq)]
enum ResponderMode {
    Immediate,
    Failing,
    Silent,
}

impl Responder {
    fn on_echo(&mut self, request: &Request<Echo>) {
        match self.mode {
            ResponderMode::Immediate => {
                let doubled = request.payload().0 * 2;
                self.base().reply_to(request, doubled);
            }
            ResponderMode::Failing => {
                self.base()
                    .reply_with_error(request, ErrorCode::RequestFailed(7));
            }
            ResponderMode::Silent => {
                self.stashed = Some(request.clone());
            }
        }
    }
}

impl Actor for Responder {
    fn base(&self) -> &ActorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActorBase {
        &mut self.base
    }

    fn init_start(&mut self) {
        self.subscribe(Responder::on_echo);
        default_init_start(self);
    }
}

struct Requester {
    base: ActorBase,
    outcomes: Vec<Result<u32, ErrorCode>>,
}

impl Requester {
    fn on_echo_response(&mut self, response: &Response<Echo>) {
        self.outcomes.push(response.result().copied());
    }

    fn ask(&self, dest: &Address, value: u32, timeout: Duration) {
        self.base().request(dest, Echo(value)).send(timeout);
    }
}

impl Actor for Requester {
    fn base(&self) -> &ActorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActorBase {
        &mut self.base
    }

    fn init_start(&mut self) {
        self.subscribe(Requester::on_echo_response);
        default_init_start(self);
    }
}

fn request_fixture(mode: ResponderMode) -> (Fixture, Address) {
    let (sup, driver) = spawn_manual();
    let responder = sup.create_actor(|base| Responder { base, stashed: None, mode });
    let requester = sup.create_actor(|base| Requester { base, outcomes: Vec::new() });
    sup.start();
    sup.do_process();
    let responder_address = responder.address();
    (Fixture { sup, driver, responder, requester }, responder_address)
}

#[test]
fn response_settles_the_request_and_cancels_the_timer() {
    let (fx, responder_address) = request_fixture(ResponderMode::Immediate);
    fx.requester.with_mut(|r: &mut Requester| {
        r.ask(&responder_address, 21, Duration::from_millis(10));
    });
    assert_eq!(fx.driver.armed_count(), 1);
    fx.sup.do_process();

    assert_eq!(
        fx.requester.with(|r: &Requester| r.outcomes.clone()),
        Some(vec![Ok(42)])
    );
    assert_eq!(fx.driver.armed_count(), 0);
    assert_eq!(fx.sup.active_timer_count(), 0);
}

#[test]
fn error_reply_carries_the_sub_code() {
    let (fx, responder_address) = request_fixture(ResponderMode::Failing);
    fx.requester.with_mut(|r: &mut Requester| {
        r.ask(&responder_address, 1, Duration::from_millis(10));
    });
    fx.sup.do_process();
    assert_eq!(
        fx.requester.with(|r: &Requester| r.outcomes.clone()),
        Some(vec![Err(ErrorCode::RequestFailed(7))])
    );
}

#[test]
fn timeout_fires_and_a_late_response_is_dropped() {
    let (fx, responder_address) = request_fixture(ResponderMode::Silent);
    fx.requester.with_mut(|r: &mut Requester| {
        r.ask(&responder_address, 5, Duration::from_millis(10));
    });
    fx.sup.do_process(); // request delivered, responder stays silent

    let (timer, timeout) = fx.driver.pop_armed().unwrap();
    assert_eq!(timeout, Duration::from_millis(10));
    fx.sup.on_timer(timer);
    fx.sup.do_process();
    assert_eq!(
        fx.requester.with(|r: &Requester| r.outcomes.clone()),
        Some(vec![Err(ErrorCode::Timeout)])
    );

    // The real response arrives too late: its correlation id is stale.
    fx.responder.with_mut(|r: &mut Responder| {
        let request = r.stashed.take().unwrap();
        r.base().reply_to(&request, 99);
    });
    fx.sup.do_process();
    assert_eq!(
        fx.requester.with(|r: &Requester| r.outcomes.clone()),
        Some(vec![Err(ErrorCode::Timeout)])
    );
    assert_eq!(fx.sup.active_timer_count(), 0);
}

#[test]
fn firing_a_cancelled_timer_is_a_no_op() {
    let (fx, responder_address) = request_fixture(ResponderMode::Immediate);
    fx.requester.with_mut(|r: &mut Requester| {
        r.ask(&responder_address, 3, Duration::from_millis(10));
    });
    let (timer, _) = fx.driver.pop_armed().unwrap();
    fx.sup.do_process(); // response wins; timer cancelled

    fx.sup.on_timer(timer); // late fire of the cancelled id
    fx.sup.do_process();
    assert_eq!(
        fx.requester.with(|r: &Requester| r.outcomes.clone()),
        Some(vec![Ok(6)])
    );
}

#[test]
fn shutdown_cancels_pending_requests() {
    let (fx, responder_address) = request_fixture(ResponderMode::Silent);
    fx.requester.with_mut(|r: &mut Requester| {
        r.ask(&responder_address, 5, Duration::from_millis(10));
    });
    fx.sup.do_process();
    assert_eq!(fx.sup.active_timer_count(), 1);

    fx.requester.with_mut(|r: &mut Requester| r.base().do_shutdown());
    fx.sup.do_process();

    assert_eq!(fx.requester.state(), ActorState::ShutDown);
    assert_eq!(
        fx.requester.with(|r: &Requester| r.outcomes.clone()),
        Some(vec![Err(ErrorCode::Cancelled)])
    );
    assert_eq!(fx.sup.active_timer_count(), 0);
    assert_eq!(fx.driver.armed_count(), 0);
}

struct SideRequester {
    base: ActorBase,
    side: Option<Address>,
    via_main: Vec<Result<u32, ErrorCode>>,
    via_side: Vec<Result<u32, ErrorCode>>,
}

impl SideRequester {
    fn on_main_response(&mut self, response: &Response<Echo>) {
        self.via_main.push(response.result().copied());
    }

    fn on_side_response(&mut self, response: &Response<Echo>) {
        self.via_side.push(response.result().copied());
    }
}

impl Actor for SideRequester {
    fn base(&self) -> &ActorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActorBase {
        &mut self.base
    }

    fn init_start(&mut self) {
        self.subscribe(SideRequester::on_main_response);
        let side = self.base_mut().make_address();
        self.subscribe_to(SideRequester::on_side_response, &side);
        self.side = Some(side);
        default_init_start(self);
    }
}

#[test]
fn request_via_routes_the_response_through_the_side_address() {
    let (sup, _driver) = spawn_manual();
    let responder = sup.create_actor(|base| Responder {
        base,
        stashed: None,
        mode: ResponderMode::Immediate,
    });
    let requester = sup.create_actor(|base| SideRequester {
        base,
        side: None,
        via_main: Vec::new(),
        via_side: Vec::new(),
    });
    sup.start();
    sup.do_process();

    let responder_address = responder.address();
    requester.with_mut(|r: &mut SideRequester| {
        let side = r.side.clone().unwrap();
        r.base()
            .request_via(&responder_address, &side, Echo(4))
            .send(Duration::from_millis(10));
    });
    sup.do_process();

    assert_eq!(
        requester.with(|r: &SideRequester| r.via_side.clone()),
        Some(vec![Ok(8)])
    );
    assert_eq!(
        requester.with(|r: &SideRequester| r.via_main.clone()),
        Some(Vec::new())
    );
}

struct StatePoller {
    base: ActorBase,
    states: Vec<Result<ActorState, ErrorCode>>,
}

impl StatePoller {
    fn on_state(&mut self, response: &Response<StateQuery>) {
        self.states.push(response.result().copied());
    }
}

impl Actor for StatePoller {
    fn base(&self) -> &ActorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActorBase {
        &mut self.base
    }

    fn init_start(&mut self) {
        self.subscribe(StatePoller::on_state);
        default_init_start(self);
    }
}

#[test]
fn state_query_reports_known_actors_and_rejects_unknown_addresses() {
    let (sup, _driver) = spawn_manual();
    let responder = sup.create_actor(|base| Responder {
        base,
        stashed: None,
        mode: ResponderMode::Immediate,
    });
    let poller = sup.create_actor(|base| StatePoller { base, states: Vec::new() });
    sup.start();
    sup.do_process();

    let responder_address = responder.address();
    let supervisor_address = sup.address();
    poller.with_mut(|p: &mut StatePoller| {
        p.base()
            .request(&supervisor_address, StateQuery { subject: responder_address })
            .send(Duration::from_millis(10));
    });
    sup.do_process();
    assert_eq!(
        poller.with(|p: &StatePoller| p.states.clone()),
        Some(vec![Ok(ActorState::Operational)])
    );

    // An address the supervisor never issued to a child is unknown.
    let unknown = poller.with_mut(|p: &mut StatePoller| p.base_mut().make_address()).unwrap();
    poller.with_mut(|p: &mut StatePoller| {
        p.base()
            .request(&supervisor_address, StateQuery { subject: unknown.clone() })
            .send(Duration::from_millis(10));
    });
    sup.do_process();
    assert_eq!(
        poller.with(|p: &StatePoller| p.states.clone()),
        Some(vec![Ok(ActorState::Operational), Err(ErrorCode::TargetNotFound)])
    );
}
