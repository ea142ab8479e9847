use parking_lot::RwLock;
use serenity::{gateway::ActivityData, gateway::ShardMessenger};

use crate::presence::{Presence, PresenceKind, PresencePublisher};

/// Publica la presencia por el shard recibido en `ready`
#[derive(Default)]
pub struct ShardPresence {
    messenger: RwLock<Option<ShardMessenger>>,
}

impl ShardPresence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, messenger: ShardMessenger) {
        *self.messenger.write() = Some(messenger);
    }
}

pub fn activity_for(presence: &Presence) -> ActivityData {
    match presence.kind {
        PresenceKind::Playing => ActivityData::playing(presence.text.clone()),
        PresenceKind::Listening => ActivityData::listening(presence.text.clone()),
    }
}

impl PresencePublisher for ShardPresence {
    fn set_presence(&self, presence: &Presence) -> anyhow::Result<()> {
        let guard = self.messenger.read();
        let Some(messenger) = guard.as_ref() else {
            anyhow::bail!("gateway shard not ready yet");
        };

        messenger.set_activity(Some(activity_for(presence)));
        Ok(())
    }
}
