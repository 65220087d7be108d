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

//! # Arbor Core Types
//!
//! ## Purpose
//! Leaf types shared by every Arbor crate: the actor lifecycle state machine,
//! the error codes that travel inside response payloads, correlation and
//! timer identifiers, the locality token, supervisor tuning, and the
//! [`TimerDriver`] interface consumed from the embedding.
//!
//! ## Architecture Context
//! This crate sits below `arbor-actor` (the dispatch core) and
//! `arbor-tokio` (the event-loop embedding). It has no knowledge of
//! messages, addresses, or supervisors; it only defines the vocabulary they
//! share, so embeddings can implement [`TimerDriver`] without pulling in the
//! runtime.
//!
//! ## Key Components
//! - [`ActorState`]: the six-state lifecycle enum with forward-only transitions
//! - [`ErrorCode`]: wire-visible request failure codes
//! - [`RequestId`] / [`TimerId`]: correlation and timer identifiers
//! - [`Locality`]: token marking supervisors that execute serially
//! - [`SupervisorConfig`]: init/shutdown timeouts and locality binding
//! - [`TimerDriver`] / [`ManualTimerDriver`]: the timer seam and its test double

mod config;
mod error;
mod ids;
mod state;
mod timer;

pub use config::{Locality, SupervisorConfig};
pub use error::ErrorCode;
pub use ids::{RequestId, TimerId};
pub use state::ActorState;
pub use timer::{ManualTimerDriver, TimerDriver};
