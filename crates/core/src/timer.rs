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

use std::time::Duration;

use parking_lot::Mutex;

use crate::TimerId;

/// Timer seam between a supervisor and its embedding.
///
/// ## Contract
/// The supervisor calls [`start_timer`](TimerDriver::start_timer) when a
/// request is issued and [`cancel_timer`](TimerDriver::cancel_timer) when the
/// response arrives first. The embedding eventually calls the supervisor's
/// `on_timer(id)` for timers it has not seen cancelled. A fire after a cancel
/// is legal; the supervisor discards it.
///
/// Implementations must be callable from the supervisor's locality; they do
/// not need to be re-entrant with respect to `on_timer` (the embedding
/// delivers fires through the ordinary wake-up path, never from inside
/// `start_timer`).
pub trait TimerDriver: Send + Sync {
    /// Arm a one-shot timer.
    fn start_timer(&self, id: TimerId, duration: Duration);

    /// Disarm a timer. Idempotent; disarming an already-fired or unknown id
    /// is a no-op.
    fn cancel_timer(&self, id: TimerId);
}

/// Recording driver for tests and single-stepped embeddings.
///
/// Never fires on its own: the test inspects [`armed`](ManualTimerDriver::armed)
/// and feeds chosen ids back into the supervisor's `on_timer`, making
/// timeout behavior fully deterministic.
#[derive(Default)]
pub struct ManualTimerDriver {
    armed: Mutex<Vec<(TimerId, Duration)>>,
}

impl ManualTimerDriver {
    pub fn new() -> Self {
        ManualTimerDriver::default()
    }

    /// Currently armed timers, in arming order.
    pub fn armed(&self) -> Vec<(TimerId, Duration)> {
        self.armed.lock().clone()
    }

    /// Number of currently armed timers.
    pub fn armed_count(&self) -> usize {
        self.armed.lock().len()
    }

    /// Remove and return the oldest armed timer, if any. Tests use this to
    /// simulate a fire: pop here, then call `on_timer` on the supervisor.
    pub fn pop_armed(&self) -> Option<(TimerId, Duration)> {
        let mut armed = self.armed.lock();
        if armed.is_empty() {
            None
        } else {
            Some(armed.remove(0))
        }
    }
}

impl TimerDriver for ManualTimerDriver {
    fn start_timer(&self, id: TimerId, duration: Duration) {
        self.armed.lock().push((id, duration));
    }

    fn cancel_timer(&self, id: TimerId) {
        self.armed.lock().retain(|(armed_id, _)| *armed_id != id);
    }
}
