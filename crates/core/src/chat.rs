//! Team chat: formatting, per-player modes and the hand-off from the chat
//! producer thread to the main loop.
//!
//! The producer only owns a [`ChatSender`]; it never reads team state. All
//! routing decisions happen where the [`ChatInbox`] is drained.

use std::collections::HashSet;

use tokio::sync::mpsc;

use crate::{
    models::{ParticipantId, ServerVersion, TeamColor},
    team::Team,
    text,
};

/// Buffered chat lines between producer and main loop.
pub const CHAT_BUFFER: usize = 128;

/// A chat line waiting to be routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    /// Who typed it.
    pub sender: ParticipantId,
    /// Raw text.
    pub message: String,
}

/// Producer half. Cheap to clone, safe to move to another thread.
#[derive(Debug, Clone)]
pub struct ChatSender {
    tx: mpsc::Sender<ChatEvent>,
}

/// Consumer half, owned by the main loop.
#[derive(Debug)]
pub struct ChatInbox {
    rx: mpsc::Receiver<ChatEvent>,
}

/// Create a connected sender/inbox pair.
pub fn chat_channel() -> (ChatSender, ChatInbox) {
    let (tx, rx) = mpsc::channel(CHAT_BUFFER);
    (ChatSender { tx }, ChatInbox { rx })
}

impl ChatSender {
    /// Queue a line from a plain thread, waiting for buffer space.
    ///
    /// Returns false once the inbox is gone. Must not be called from inside
    /// an async task.
    pub fn blocking_send(&self, sender: ParticipantId, message: impl Into<String>) -> bool {
        self.tx
            .blocking_send(ChatEvent {
                sender,
                message: message.into(),
            })
            .is_ok()
    }

    /// Queue a line without waiting. Returns false when full or closed.
    pub fn try_send(&self, sender: ParticipantId, message: impl Into<String>) -> bool {
        self.tx
            .try_send(ChatEvent {
                sender,
                message: message.into(),
            })
            .is_ok()
    }
}

impl ChatInbox {
    /// Wait for the next line; `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<ChatEvent> {
        self.rx.recv().await
    }

    /// Take everything queued so far without waiting.
    pub fn drain(&mut self) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Per-player chat modes kept on the main loop.
#[derive(Debug, Default)]
pub struct ChatModes {
    team_chat: HashSet<ParticipantId>,
    creating: HashSet<ParticipantId>,
}

impl ChatModes {
    /// Flip team-chat mode, returning the new state.
    pub fn toggle_team_chat(&mut self, id: ParticipantId) -> bool {
        if self.team_chat.remove(&id) {
            false
        } else {
            self.team_chat.insert(id);
            true
        }
    }

    /// True when plain chat from `id` goes to the team.
    pub fn in_team_chat(&self, id: ParticipantId) -> bool {
        self.team_chat.contains(&id)
    }

    /// Route the next chat line from `id` into team creation.
    pub fn begin_creation(&mut self, id: ParticipantId) {
        self.creating.insert(id);
    }

    /// Leave the creation prompt. Returns whether `id` was in it.
    pub fn end_creation(&mut self, id: ParticipantId) -> bool {
        self.creating.remove(&id)
    }

    /// True while `id`'s next line names a new team.
    pub fn is_creating(&self, id: ParticipantId) -> bool {
        self.creating.contains(&id)
    }

    /// Forget every mode held by `id`.
    pub fn clear(&mut self, id: ParticipantId) {
        self.team_chat.remove(&id);
        self.creating.remove(&id);
    }
}

/// `[Team] <name>: <message>` in the team's color.
pub fn format_team_chat(
    team: &Team,
    sender_name: &str,
    message: &str,
    version: ServerVersion,
) -> String {
    format!(
        "{}[Team] {}{sender_name}{}: {message}",
        text::legacy(TeamColor::Aqua),
        text::team_code(team.color(), version),
        text::legacy(TeamColor::White),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn id(name: &str) -> ParticipantId {
        ParticipantId::from_name(name)
    }

    #[test]
    fn producer_thread_hands_off_to_main_loop() {
        let (sender, mut inbox) = chat_channel();
        let producer = {
            let sender = sender.clone();
            thread::spawn(move || {
                for n in 0..3 {
                    assert!(sender.blocking_send(id("steve"), format!("line {n}")));
                }
            })
        };
        producer.join().unwrap();

        let lines: Vec<_> = inbox.drain().into_iter().map(|event| event.message).collect();
        assert_eq!(lines, vec!["line 0", "line 1", "line 2"]);
        assert!(inbox.drain().is_empty());
    }

    #[tokio::test]
    async fn inbox_closes_when_senders_drop() {
        let (sender, mut inbox) = chat_channel();
        assert!(sender.try_send(id("alex"), "hi"));
        drop(sender);

        let event = inbox.recv().await.unwrap();
        assert_eq!(event.sender, id("alex"));
        assert!(inbox.recv().await.is_none());
    }

    #[test]
    fn sender_reports_closed_inbox() {
        let (sender, inbox) = chat_channel();
        drop(inbox);
        assert!(!sender.try_send(id("alex"), "lost"));
    }

    #[test]
    fn full_buffer_rejects_without_blocking() {
        let (sender, mut inbox) = chat_channel();
        for n in 0..CHAT_BUFFER {
            assert!(sender.try_send(id("alex"), format!("line {n}")));
        }
        assert!(!sender.try_send(id("alex"), "overflow"));

        assert_eq!(inbox.drain().len(), CHAT_BUFFER);
        assert!(sender.try_send(id("alex"), "room again"));
    }

    #[test]
    fn modes_toggle_and_clear() {
        let mut modes = ChatModes::default();
        assert!(modes.toggle_team_chat(id("a")));
        assert!(modes.in_team_chat(id("a")));
        assert!(!modes.toggle_team_chat(id("a")));

        modes.begin_creation(id("a"));
        modes.toggle_team_chat(id("a"));
        modes.clear(id("a"));
        assert!(!modes.is_creating(id("a")));
        assert!(!modes.in_team_chat(id("a")));
    }

    #[test]
    fn team_chat_uses_team_color() {
        let mut team = Team::new("Alpha", id("o"));
        team.set_color(TeamColor::Gold);

        let modern = format_team_chat(&team, "Steve", "hello", ServerVersion::new(1, 20, 4));
        assert!(modern.contains("§#FFAA00Steve"));
        assert_eq!(text::strip(&modern), "[Team] Steve: hello");

        let legacy = format_team_chat(&team, "Steve", "hello", ServerVersion::new(1, 12, 2));
        assert!(legacy.contains("§6Steve"));
    }
}
