use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::resource::ClientId;

const CHANNEL_CAPACITY: usize = 64;

/// Something that happened to a set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetEvent {
    Add(ClientId),
    Remove(ClientId),
    /// Contents replaced wholesale.
    Reset,
    Sort,
    /// A resource's attributes changed after a save.
    Change(ClientId),
    Error {
        cid: Option<ClientId>,
        message: String,
    },
}

impl SetEvent {
    /// Changes membership or order, so a list has to re-render in full.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            SetEvent::Add(_) | SetEvent::Remove(_) | SetEvent::Reset | SetEvent::Sort
        )
    }
}

#[derive(Debug)]
pub(crate) struct EventBus {
    sender: broadcast::Sender<SetEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish to whoever is listening. No listeners is fine.
    pub(crate) fn emit(&self, event: SetEvent) {
        let _ = self.sender.send(event);
    }

    pub(crate) fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }
}

/// A listener on one set. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<SetEvent>,
}

impl Subscription {
    /// Everything published since the last drain.
    ///
    /// A listener that fell behind gets a `Reset` in place of what it missed.
    pub fn drain(&mut self) -> Vec<SetEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Lagged(_)) => events.push(SetEvent::Reset),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        events
    }
}
