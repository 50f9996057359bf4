//! Process-wide single-slot clipboard for copying one row's filter config
//! to another.
//!
//! A copy overwrites the slot, a paste reads a clone — it is a shared
//! snapshot, not a queue. Interested parties subscribe to a has-content
//! flag; dropping the receiver is the unsubscribe, so a deleted row leaks
//! nothing.

use tokio::sync::watch;
use xharvest_core::AccountConfig;

pub struct ConfigClipboard {
    slot: Option<AccountConfig>,
    notify: watch::Sender<bool>,
}

impl ConfigClipboard {
    pub fn new() -> Self {
        let (notify, _) = watch::channel(false);
        Self { slot: None, notify }
    }

    pub fn copy(&mut self, config: AccountConfig) {
        self.slot = Some(config);
        let _ = self.notify.send(true);
    }

    pub fn paste(&self) -> Option<AccountConfig> {
        self.slot.clone()
    }

    pub fn has_content(&self) -> bool {
        self.slot.is_some()
    }

    pub fn clear(&mut self) {
        self.slot = None;
        let _ = self.notify.send(false);
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.notify.subscribe()
    }
}

impl Default for ConfigClipboard {
    fn default() -> Self {
        Self::new()
    }
}
