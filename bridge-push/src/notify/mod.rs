// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Status notifications for bridge transactions

mod dispatcher;
mod message;
mod transport;

pub use self::dispatcher::{remaining_minutes, Dispatcher};
pub use self::message::{PushMessage, TransactionUpdate};
pub use self::transport::{HttpTransport, MessageTransport, RecordingTransport};
