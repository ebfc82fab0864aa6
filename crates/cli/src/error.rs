// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure categories surfaced to the user as dismissable alerts.
///
/// Network-boundary failures are caught at the call site; none of these is
/// fatal to the process. The worst case is a degraded or stale view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    NoReceiver,
    SendFailed,
    LoadFailed,
    CreateChatFailed,
    ConnectFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoReceiver => "NO_RECEIVER",
            Self::SendFailed => "SEND_FAILED",
            Self::LoadFailed => "LOAD_FAILED",
            Self::CreateChatFailed => "CREATE_CHAT_FAILED",
            Self::ConnectFailed => "CONNECT_FAILED",
        }
    }

    /// Human-readable alert text for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoReceiver => "Unable to identify the receiver for this chat.",
            Self::SendFailed => "Unable to send the message.",
            Self::LoadFailed => "Failed to load conversations.",
            Self::CreateChatFailed => "Unable to create the chat.",
            Self::ConnectFailed => "Live updates are unavailable.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
