// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Hot-reloadable values
//!
//! A [`Live`] is a read handle on a value that may be replaced at any time by
//! the matching [`LiveSender`] (e.g. the config reloader). Readers always see
//! the latest published value; they never block the writer.

use tokio::sync::watch;

/// Read handle on a value that can change at runtime
#[derive(Debug, Clone)]
pub struct Live<T> {
    receiver: watch::Receiver<T>,
}

/// Publishing side of a [`Live`]
#[derive(Debug)]
pub struct LiveSender<T> {
    name: &'static str,
    sender: watch::Sender<T>,
}

/// Create a linked sender / reader pair
pub fn live_value<T>(name: &'static str, initial: T) -> (LiveSender<T>, Live<T>) {
    let (sender, receiver) = watch::channel(initial);
    (LiveSender { name, sender }, Live { receiver })
}

impl<T: Clone> Live<T> {
    /// A value that never changes
    pub fn fixed(value: T) -> Self {
        let (_, receiver) = watch::channel(value);
        Self { receiver }
    }

    /// Current value
    pub fn get(&self) -> T {
        self.receiver.borrow().clone()
    }
}

impl<T: PartialEq + std::fmt::Debug> LiveSender<T> {
    /// Replace the value. Returns `true` if it actually changed.
    pub fn publish(&self, value: T) -> bool {
        let name = self.name;
        self.sender.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            tracing::info!("[Live] {} changed: {:?} -> {:?}", name, current, value);
            *current = value;
            true
        })
    }

    pub fn subscribe(&self) -> Live<T> {
        Live {
            receiver: self.sender.subscribe(),
        }
    }
}
