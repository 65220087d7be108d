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

use indexmap::IndexMap;

use crate::address::Address;
use crate::handler::Handler;

/// A `(handler, address)` pair.
///
/// Recorded twice: in the dispatch index of the supervisor owning the
/// address, and in the owning actor's point list, which is what shutdown
/// walks to know what it must unsubscribe.
#[derive(Clone, Debug)]
pub struct SubscriptionPoint {
    pub handler: Handler,
    pub address: Address,
}

/// The dispatch index: address to ordered handler list.
///
/// Handlers are kept in subscription order and delivered in that order.
/// Removal matches by handler equality (`(callback site, owner)`), so a
/// fresh handler built from the same method removes the original entry.
#[derive(Default)]
pub(crate) struct SubscriptionMap {
    entries: IndexMap<Address, Vec<Handler>>,
}

impl SubscriptionMap {
    pub fn subscribe(&mut self, address: Address, handler: Handler) {
        self.entries.entry(address).or_default().push(handler);
    }

    /// Remove the first entry matching `handler` under `address`. Returns
    /// whether anything was removed; the caller decides whether a miss is a
    /// programming error.
    pub fn unsubscribe(&mut self, address: &Address, handler: &Handler) -> bool {
        let Some(handlers) = self.entries.get_mut(address) else {
            return false;
        };
        let Some(position) = handlers.iter().position(|h| h == handler) else {
            return false;
        };
        handlers.remove(position);
        if handlers.is_empty() {
            self.entries.shift_remove(address);
        }
        true
    }

    /// Snapshot of the handlers subscribed on `address`, in subscription
    /// order. Delivery iterates the snapshot, so un/subscribing during
    /// delivery affects later messages only.
    pub fn handlers_for(&self, address: &Address) -> Vec<Handler> {
        self.entries.get(address).cloned().unwrap_or_default()
    }

    /// Number of `(address, handler)` entries in the index.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
