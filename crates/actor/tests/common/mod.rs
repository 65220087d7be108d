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

//! Shared fixtures: a manually-driven supervisor and an actor that counts
//! every lifecycle hook it passes through.

#![allow(dead_code)]

use std::sync::Arc;

use arbor_actor::{
    default_do_initialize, default_init_start, default_on_start, default_shutdown_finish,
    default_shutdown_start, Actor, ActorBase, StartActor, Supervisor, SupervisorRef,
};
use arbor_core::{ManualTimerDriver, SupervisorConfig};

/// A supervisor whose timers only fire when the test says so.
pub fn spawn_manual() -> (SupervisorRef, Arc<ManualTimerDriver>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let driver = Arc::new(ManualTimerDriver::new());
    let supervisor = Supervisor::spawn(SupervisorConfig::default(), driver.clone());
    (supervisor, driver)
}

/// Drain every supervisor until all queues are quiescent. Needed for
/// multi-supervisor tests where each drain can enqueue onto the other.
pub fn drain(supervisors: &[&SupervisorRef]) {
    loop {
        let mut progressed = false;
        for supervisor in supervisors {
            if supervisor.queue_len() > 0 {
                supervisor.do_process();
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
}

/// Counts every lifecycle hook, delegating to the default sequences.
pub struct CounterActor {
    base: ActorBase,
    pub initialized: u32,
    pub init_invoked: u32,
    pub start_invoked: u32,
    pub shutdown_started: u32,
    pub shutdown_finished: u32,
}

impl CounterActor {
    pub fn new(base: ActorBase) -> Self {
        CounterActor {
            base,
            initialized: 0,
            init_invoked: 0,
            start_invoked: 0,
            shutdown_started: 0,
            shutdown_finished: 0,
        }
    }
}

impl Actor for CounterActor {
    fn base(&self) -> &ActorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActorBase {
        &mut self.base
    }

    fn do_initialize(&mut self) {
        self.initialized += 1;
        default_do_initialize(self);
    }

    fn init_start(&mut self) {
        self.init_invoked += 1;
        default_init_start(self);
    }

    fn on_start(&mut self, message: &StartActor) {
        self.start_invoked += 1;
        default_on_start(self, message);
    }

    fn shutdown_start(&mut self) {
        self.shutdown_started += 1;
        default_shutdown_start(self);
    }

    fn shutdown_finish(&mut self) {
        self.shutdown_finished += 1;
        default_shutdown_finish(self);
    }
}
