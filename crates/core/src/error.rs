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

/// Request failure code, delivered inside an error response payload.
///
/// ## Context
/// These are the only errors that ever leave the actor system, and they do
/// so as typed responses visible to the requesting actor's response handler.
/// Everything else (bad subscription state, unknown handler on removal,
/// delivery to a destroyed address) is a programming error and trips a debug
/// assertion instead of being masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The request's timer fired before a response arrived
    #[error("request timed out")]
    Timeout,

    /// The requesting actor shut down with the request still pending
    #[error("request cancelled")]
    Cancelled,

    /// The addressed actor is not known to the queried supervisor
    #[error("target actor not found")]
    TargetNotFound,

    /// The responder failed the request; the sub-code is responder-defined
    #[error("request failed (code {0})")]
    RequestFailed(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_sub_code() {
        assert_eq!(ErrorCode::RequestFailed(7).to_string(), "request failed (code 7)");
        assert_eq!(ErrorCode::Timeout.to_string(), "request timed out");
    }
}
