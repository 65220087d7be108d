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

//! # Arbor Tokio Embedding
//!
//! ## Purpose
//! Hosts an Arbor supervisor on a tokio runtime: a [`SupervisorLoop`] that
//! drains the queue whenever an enqueue wakes it, and a [`TokioTimerDriver`]
//! that turns the runtime's timers into `on_timer` deliveries.
//!
//! The locality contract becomes concrete here: one `SupervisorLoop::run`
//! future per supervisor, and supervisors sharing a locality must share a
//! single-threaded runtime (or otherwise never run concurrently). Two
//! supervisors on two runtimes on two OS threads are two localities; the
//! queue's thread-safe enqueue is what their cross-sends rely on.
//!
//! ## Example
//! ```rust,ignore
//! let host = SupervisorLoop::spawn(SupervisorConfig::default());
//! let sup = host.supervisor().clone();
//! let actor = sup.create_actor(|base| MyActor { base });
//! sup.start();
//! host.run().await; // returns once the supervisor reaches ShutDown
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use arbor_actor::{Supervisor, SupervisorRef};
use arbor_core::{ActorState, SupervisorConfig, TimerDriver, TimerId};

enum TimerCommand {
    Start(TimerId, Duration),
    Cancel(TimerId),
}

/// [`TimerDriver`] backed by `tokio::time`.
///
/// Arm/cancel calls are forwarded to a timer task owned by the
/// [`SupervisorLoop`]; each armed timer is one sleeping task, aborted on
/// cancel. Fires are delivered through `SupervisorRef::on_timer`, whose
/// synthesized responses re-enter the queue and wake the loop.
pub struct TokioTimerDriver {
    commands: UnboundedSender<TimerCommand>,
}

impl TokioTimerDriver {
    fn channel() -> (Self, UnboundedReceiver<TimerCommand>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        (TokioTimerDriver { commands }, receiver)
    }
}

impl TimerDriver for TokioTimerDriver {
    fn start_timer(&self, id: TimerId, duration: Duration) {
        if self.commands.send(TimerCommand::Start(id, duration)).is_err() {
            trace!(%id, "timer armed after the loop ended");
        }
    }

    fn cancel_timer(&self, id: TimerId) {
        if self.commands.send(TimerCommand::Cancel(id)).is_err() {
            trace!(%id, "timer cancelled after the loop ended");
        }
    }
}

async fn timer_loop(mut commands: UnboundedReceiver<TimerCommand>, supervisor: SupervisorRef) {
    let mut armed: HashMap<TimerId, JoinHandle<()>> = HashMap::new();
    while let Some(command) = commands.recv().await {
        match command {
            TimerCommand::Start(id, duration) => {
                let supervisor = supervisor.clone();
                let task = tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    supervisor.on_timer(id);
                });
                armed.insert(id, task);
            }
            TimerCommand::Cancel(id) => {
                if let Some(task) = armed.remove(&id) {
                    task.abort();
                }
            }
        }
        armed.retain(|_, task| !task.is_finished());
    }
    for (_, task) in armed {
        task.abort();
    }
}

/// One supervisor hosted on the current tokio runtime.
pub struct SupervisorLoop {
    supervisor: SupervisorRef,
    wake: Arc<Notify>,
    timer_task: JoinHandle<()>,
}

impl SupervisorLoop {
    /// Spawn a supervisor wired to a tokio timer driver and a wake-up
    /// notifier. Must be called inside a runtime.
    pub fn spawn(config: SupervisorConfig) -> SupervisorLoop {
        let (driver, commands) = TokioTimerDriver::channel();
        let supervisor = Supervisor::spawn(config, Arc::new(driver));

        let wake = Arc::new(Notify::new());
        {
            let wake = wake.clone();
            supervisor.set_wake_hook(move || wake.notify_one());
        }
        let timer_task = tokio::spawn(timer_loop(commands, supervisor.clone()));
        SupervisorLoop { supervisor, wake, timer_task }
    }

    pub fn supervisor(&self) -> &SupervisorRef {
        &self.supervisor
    }

    /// Drive the supervisor until it reaches `ShutDown`: drain, sleep until
    /// an enqueue (local or cross-locality) or a timer wakes us, repeat.
    pub async fn run(self) {
        loop {
            self.supervisor.do_process();
            if self.supervisor.state() == ActorState::ShutDown {
                break;
            }
            self.wake.notified().await;
        }
        // Late arrivals (stale cross-locality replies) still get drained and
        // dropped so the queue ends empty.
        self.supervisor.do_process();
        self.supervisor.clear_wake_hook();
        self.timer_task.abort();
        debug!(supervisor = %self.supervisor.address(), "supervisor loop finished");
    }
}
