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

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

static NEXT_LOCALITY: AtomicU64 = AtomicU64::new(1);

/// Execution-locality token.
///
/// ## Purpose
/// Supervisors sharing a locality are guaranteed by the embedding to run
/// serially with respect to each other (e.g. on one thread or strand).
/// Supervisors on distinct localities may run concurrently, which is why
/// cross-locality enqueue is thread-safe.
///
/// The token itself carries no behavior; it records the embedding's promise
/// so that it can be inspected and asserted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locality(u64);

impl Locality {
    /// Allocate a fresh locality, distinct from every other one in this
    /// process.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Locality(NEXT_LOCALITY.fetch_add(1, Ordering::Relaxed))
    }
}

/// Supervisor tuning.
///
/// ## Fields
/// - `locality`: which serial-execution group this supervisor joins
/// - `init_timeout`: timeout applied to every child init request
/// - `shutdown_timeout`: timeout applied to every child shutdown request
///   (and to the supervisor's own shutdown request to itself)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    pub locality: Locality,
    pub init_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl SupervisorConfig {
    /// Config on a fresh locality with the given timeout for both the init
    /// and shutdown legs. Most embeddings want one timeout for both.
    pub fn with_timeout(timeout: Duration) -> Self {
        SupervisorConfig {
            locality: Locality::new(),
            init_timeout: timeout,
            shutdown_timeout: timeout,
        }
    }

    /// Same timeouts, but joining an existing locality.
    pub fn in_locality(locality: Locality, timeout: Duration) -> Self {
        SupervisorConfig {
            locality,
            init_timeout: timeout,
            shutdown_timeout: timeout,
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig::with_timeout(Duration::from_millis(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localities_are_distinct() {
        assert_ne!(Locality::new(), Locality::new());
    }

    #[test]
    fn shared_locality_compares_equal() {
        let l = Locality::new();
        let a = SupervisorConfig::in_locality(l, Duration::from_millis(10));
        let b = SupervisorConfig::in_locality(l, Duration::from_millis(20));
        assert_eq!(a.locality, b.locality);
    }
}
