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

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use crate::supervisor::SupervisorShared;

/// Opaque routing identity, owned by exactly one supervisor.
///
/// ## Identity
/// Two addresses compare equal iff they are the *same* address: equality and
/// hashing go by the identity of the shared cell, never by value. Cloning an
/// `Address` clones a handle to the same identity.
///
/// ## Ownership
/// The address holds a non-owning reference to its issuing supervisor; the
/// supervisor outlives every address it issued by construction (actors
/// cannot outlive their supervisor, and subscriptions are torn down before
/// addresses are released). Envelopes and subscription entries hold strong
/// `Address` clones, so an address stays alive for as long as anything can
/// still route to it.
#[derive(Clone)]
pub struct Address {
    inner: Arc<AddressInner>,
}

struct AddressInner {
    supervisor: Weak<SupervisorShared>,
    debug_id: u64,
}

impl Address {
    pub(crate) fn new(supervisor: &Arc<SupervisorShared>, debug_id: u64) -> Self {
        Address {
            inner: Arc::new(AddressInner {
                supervisor: Arc::downgrade(supervisor),
                debug_id,
            }),
        }
    }

    /// The dispatch state of the owning supervisor.
    pub(crate) fn owner(&self) -> Arc<SupervisorShared> {
        self.inner
            .supervisor
            .upgrade()
            .expect("a supervisor outlives the addresses it issued")
    }

    pub(crate) fn is_owned_by(&self, shared: &Arc<SupervisorShared>) -> bool {
        Weak::ptr_eq(&self.inner.supervisor, &Arc::downgrade(shared))
    }

    /// Main address of the supervisor owning this address. This is where
    /// control messages about this address (shutdown triggers, state
    /// queries, unsubscription commits) are sent.
    pub fn supervisor_address(&self) -> Address {
        self.owner().main_address()
    }

    /// Whether both addresses are owned by the same supervisor.
    pub fn same_supervisor(&self, other: &Address) -> bool {
        Weak::ptr_eq(&self.inner.supervisor, &other.inner.supervisor)
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.inner) as usize).hash(state);
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(#{})", self.inner.debug_id)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.inner.debug_id)
    }
}
