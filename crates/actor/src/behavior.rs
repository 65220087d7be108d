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

//! Pluggable lifecycle step drivers.
//!
//! A behavior decides how an actor walks its init and shutdown sequences.
//! Each step inspects the base and returns a [`BehaviorStep`]; the calling
//! hook invokes `init_finish`/`shutdown_finish` on `Complete`, so overridden
//! finish hooks are honored no matter which behavior is installed.

use crate::actor::ActorBase;
use crate::subscription::SubscriptionPoint;

/// Outcome of one behavior step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorStep {
    /// The sequence is waiting on further messages (confirmations, resource
    /// acquisition); the behavior will be re-entered when they arrive.
    Pending,
    /// The sequence is done; the caller may finish the lifecycle step.
    Complete,
}

/// Policy object driving one actor's init and shutdown step sequences.
///
/// The defaults implement the standard sequence: init completes
/// immediately, shutdown unwinds every subscription point and completes
/// once the point list drains. Custom behaviors can gate init on external
/// readiness or interleave resource release into shutdown.
pub trait ActorBehavior: Send {
    /// Run the init step sequence.
    fn on_start_init(&mut self, _base: &mut ActorBase) -> BehaviorStep {
        BehaviorStep::Complete
    }

    /// Run the shutdown step sequence. The default issues an unsubscribe
    /// for every recorded subscription point (local or cross-supervisor),
    /// newest first, and waits for the confirmations. Unwinding in reverse
    /// keeps the unsubscription handlers (subscribed first) alive until
    /// every other confirmation has been processed.
    fn on_start_shutdown(&mut self, base: &mut ActorBase) -> BehaviorStep {
        if base.subscription_points().is_empty() {
            return BehaviorStep::Complete;
        }
        let points: Vec<SubscriptionPoint> = base.subscription_points().to_vec();
        for point in points.into_iter().rev() {
            base.unsubscribe_handler(point.handler, &point.address, None);
        }
        BehaviorStep::Pending
    }

    /// Re-entered whenever a subscription point is removed while the actor
    /// is shutting down; detects completion of the unwind.
    fn on_unsubscription(&mut self, base: &mut ActorBase) -> BehaviorStep {
        if base.subscription_points().is_empty() {
            BehaviorStep::Complete
        } else {
            BehaviorStep::Pending
        }
    }
}

/// The standard behavior: immediate init, unsubscribe-all shutdown.
pub struct DefaultBehavior;

impl ActorBehavior for DefaultBehavior {}

/// Take-call-restore around the behavior slot, so a behavior step can borrow
/// the base mutably without aliasing itself.
pub(crate) fn with_behavior(
    base: &mut ActorBase,
    f: impl FnOnce(&mut dyn ActorBehavior, &mut ActorBase) -> BehaviorStep,
) -> BehaviorStep {
    let Some(mut behavior) = base.take_behavior() else {
        debug_assert!(false, "behavior step invoked before do_initialize");
        return BehaviorStep::Pending;
    };
    let step = f(&mut *behavior, base);
    base.restore_behavior(behavior);
    step
}
