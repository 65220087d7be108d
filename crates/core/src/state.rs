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

use serde::{Deserialize, Serialize};

/// Actor lifecycle state.
///
/// ## State Transitions
/// ```text
/// New -> Initializing -> Initialized -> Operational -> ShuttingDown -> ShutDown
/// ```
///
/// ## Design Notes
/// - Transitions are strictly forward; there are no back-edges and no retry
///   states. A failed init goes straight to the shutdown leg.
/// - The variant order *is* the transition order: the derived `Ord` is what
///   [`ActorState::can_advance_to`] is built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActorState {
    /// Constructed, not yet bound to its supervisor's dispatch index
    New,
    /// Framework handlers subscribed, waiting for the init request
    Initializing,
    /// Init confirmed by the supervisor, waiting for start
    Initialized,
    /// Processing user messages
    Operational,
    /// Shutdown request received, unwinding subscriptions
    ShuttingDown,
    /// Fully unwound: no subscriptions, no pending requests, no timers
    ShutDown,
}

impl ActorState {
    /// Whether moving from `self` to `next` follows the lifecycle sequence.
    ///
    /// Skipping states forward is legal (a failed init jumps from
    /// `Initializing` to `ShuttingDown`); moving backward never is.
    pub fn can_advance_to(self, next: ActorState) -> bool {
        self < next
    }

    /// True once the actor has entered the shutdown leg of its lifecycle.
    pub fn is_terminating(self) -> bool {
        self >= ActorState::ShuttingDown
    }
}
