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

//! The tokio timer driver delivering a real-time request timeout.

use std::time::Duration;

use arbor_actor::{
    default_init_start, default_on_start, Actor, ActorBase, ActorExt, Response, RequestPayload,
    ShutdownTrigger, StartActor,
};
use arbor_core::{ActorState, ErrorCode, SupervisorConfig};
use arbor_tokio::SupervisorLoop;

#[derive(Clone)]
struct Probe;

impl RequestPayload for Probe {
    type Reply = u32;
}

/// Requests from an address nothing answers on, records the timeout, then
/// asks its supervisor to shut down.
struct TimeoutProbe {
    base: ActorBase,
    outcome: Option<Result<u32, ErrorCode>>,
}

impl TimeoutProbe {
    fn on_probe_response(&mut self, response: &Response<Probe>) {
        self.outcome = Some(response.result().copied());
        let supervisor = self.base().supervisor_address();
        self.base()
            .send(&supervisor, ShutdownTrigger { address: supervisor.clone() });
    }
}

impl Actor for TimeoutProbe {
    fn base(&self) -> &ActorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActorBase {
        &mut self.base
    }

    fn init_start(&mut self) {
        self.subscribe(TimeoutProbe::on_probe_response);
        default_init_start(self);
    }

    fn on_start(&mut self, message: &StartActor) {
        default_on_start(self, message);
        let silent = self.base_mut().make_address();
        self.base()
            .request(&silent, Probe)
            .send(Duration::from_millis(10));
    }
}

#[tokio::test]
async fn request_times_out_on_the_tokio_clock() {
    let host = SupervisorLoop::spawn(SupervisorConfig::default());
    let sup = host.supervisor().clone();
    let probe = sup.create_actor(|base| TimeoutProbe { base, outcome: None });

    sup.start();
    host.run().await;

    assert_eq!(
        probe.with(|p: &TimeoutProbe| p.outcome),
        Some(Some(Err(ErrorCode::Timeout)))
    );
    assert_eq!(sup.state(), ActorState::ShutDown);
    assert_eq!(probe.state(), ActorState::ShutDown);
    assert_eq!(sup.queue_len(), 0);
    assert_eq!(sup.subscription_count(), 0);
    assert_eq!(sup.active_timer_count(), 0);
}
