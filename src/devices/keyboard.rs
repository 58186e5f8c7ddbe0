//! Keyboard device.
//!
//! A [`KeySource`] is polled between instructions and never blocks. Each key
//! it yields is latched at `0xF4` and raises the keyboard interrupt line.

use std::collections::VecDeque;
use std::io::Read;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// Non-blocking source of key presses.
pub trait KeySource {
    /// The next pressed key, if one is waiting.
    fn poll_key(&mut self) -> Option<u8>;
}

/// A keyboard nobody types on.
#[derive(Debug, Default)]
pub struct NoKeys;

impl KeySource for NoKeys {
    fn poll_key(&mut self) -> Option<u8> {
        None
    }
}

/// Replays a fixed sequence of keys, one every `interval` polls.
///
/// Spacing the keys out gives the program's handler time to consume each
/// one before the next overwrites `0xF4`.
#[derive(Debug, Clone)]
pub struct ScriptedKeys {
    keys: VecDeque<u8>,
    interval: u32,
    countdown: u32,
}

impl ScriptedKeys {
    pub fn new(keys: impl IntoIterator<Item = u8>, interval: u32) -> Self {
        let interval = interval.max(1);
        Self {
            keys: keys.into_iter().collect(),
            interval,
            countdown: interval,
        }
    }
}

impl KeySource for ScriptedKeys {
    fn poll_key(&mut self) -> Option<u8> {
        if self.keys.is_empty() {
            return None;
        }
        self.countdown -= 1;
        if self.countdown > 0 {
            return None;
        }
        self.countdown = self.interval;
        self.keys.pop_front()
    }
}

/// Reads stdin on a background thread and hands bytes over a channel.
pub struct StdinKeys {
    rx: Receiver<u8>,
    closed: bool,
}

impl StdinKeys {
    /// Start the reader thread.
    pub fn spawn() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("ls8-keyboard".into())
            .spawn(move || {
                for byte in std::io::stdin().lock().bytes() {
                    let Ok(byte) = byte else { break };
                    if tx.send(byte).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self { rx, closed: false })
    }
}

impl KeySource for StdinKeys {
    fn poll_key(&mut self) -> Option<u8> {
        if self.closed {
            return None;
        }
        match self.rx.try_recv() {
            Ok(key) => Some(key),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                tracing::debug!("stdin closed, keyboard detached");
                self.closed = true;
                None
            }
        }
    }
}

impl<K: KeySource + ?Sized> KeySource for Box<K> {
    fn poll_key(&mut self) -> Option<u8> {
        (**self).poll_key()
    }
}
