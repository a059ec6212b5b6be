use crate::domain_model::*;

/// Outcome of reconciling an optimistic entry against its ack.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConfirmOutcome {
    /// The temporary entry was replaced in place by the confirmed record.
    Replaced,
    /// The confirmed id was already in the list (own echo arrived before
    /// the ack), so the temporary entry was removed instead.
    Collapsed,
    /// No entry with that temporary id exists.
    Missing,
}

/// In-memory view of one two-party conversation. Exclusively owned by its
/// session; holds at most one entry per message id, append-only except for
/// the single in-place temp-to-server replacement.
#[derive(Debug)]
pub struct ConversationLog {
    pair: UserPair,
    entries: Vec<ChatEntry>,
}

impl ConversationLog {
    pub fn new(pair: UserPair) -> Self {
        Self {
            pair,
            entries: Vec::new(),
        }
    }

    pub fn pair(&self) -> &UserPair {
        &self.pair
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.entries.iter().any(|e| &e.message.id == id)
    }

    /// True iff the message belongs to this conversation, in either
    /// direction. The channel is shared, so everything else is noise.
    pub fn accepts(&self, message: &Message) -> bool {
        self.pair.matches(&message.sender_id, &message.receiver_id)
    }

    /// Appends a remote (history-boundary or live) message unless its id is
    /// already present. Returns whether the list grew.
    pub fn append_remote(&mut self, message: Message) -> bool {
        if self.contains(&message.id) {
            return false;
        }
        self.entries.push(ChatEntry::confirmed(message));
        true
    }

    /// Appends an optimistic local send under its temporary id.
    pub fn append_pending(&mut self, message: Message) {
        debug_assert!(message.id.is_temporary());
        debug_assert!(!self.contains(&message.id));
        self.entries.push(ChatEntry::pending(message));
    }

    /// Replaces the whole list with a fresh history baseline, keeping any
    /// local sends that are still pending or failed (they are not on the
    /// server yet) behind it. Initial loads have no local sends, so this
    /// is a plain replacement there.
    pub fn rebaseline(&mut self, history: Vec<Message>) {
        let local: Vec<ChatEntry> = self
            .entries
            .drain(..)
            .filter(|e| e.delivery != DeliveryState::Confirmed)
            .collect();
        for message in history {
            self.append_remote(message);
        }
        for entry in local {
            if !self.contains(&entry.message.id) {
                self.entries.push(entry);
            }
        }
    }

    /// Reconciles a pending entry with its server-confirmed counterpart,
    /// preserving its position in the list.
    pub fn confirm(&mut self, temp_id: &MessageId, confirmed: Message) -> ConfirmOutcome {
        let Some(index) = self.entries.iter().position(|e| &e.message.id == temp_id) else {
            return ConfirmOutcome::Missing;
        };
        if confirmed.id != *temp_id && self.contains(&confirmed.id) {
            self.entries.remove(index);
            return ConfirmOutcome::Collapsed;
        }
        self.entries[index] = ChatEntry::confirmed(confirmed);
        ConfirmOutcome::Replaced
    }

    /// Marks a pending entry as confirmed without an id change, for acks
    /// that carry no message body.
    pub fn mark_confirmed(&mut self, id: &MessageId) -> bool {
        self.set_delivery(id, DeliveryState::Confirmed)
    }

    pub fn mark_failed(&mut self, id: &MessageId) -> bool {
        self.set_delivery(id, DeliveryState::Failed)
    }

    /// Puts a failed entry back in flight for a manual retry.
    pub fn mark_pending(&mut self, id: &MessageId) -> bool {
        self.set_delivery(id, DeliveryState::Pending)
    }

    pub fn entry(&self, id: &MessageId) -> Option<&ChatEntry> {
        self.entries.iter().find(|e| &e.message.id == id)
    }

    fn set_delivery(&mut self, id: &MessageId, delivery: DeliveryState) -> bool {
        match self.entries.iter_mut().find(|e| &e.message.id == id) {
            Some(entry) => {
                entry.delivery = delivery;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, sender: &str, receiver: &str, text: &str) -> Message {
        Message {
            id: MessageId(id.to_owned()),
            sender_id: sender.into(),
            receiver_id: receiver.into(),
            text: text.to_owned(),
            sent_at: None,
        }
    }

    fn log_ab() -> ConversationLog {
        ConversationLog::new(UserPair::new("A".into(), "B".into()))
    }

    fn ids(log: &ConversationLog) -> Vec<&str> {
        log.entries()
            .iter()
            .map(|e| e.message.id.0.as_str())
            .collect()
    }

    #[test]
    fn duplicate_ids_never_render_twice() {
        let mut log = log_ab();
        log.rebaseline(vec![msg("h1", "A", "B", "hi")]);
        assert!(log.append_remote(msg("m2", "B", "A", "sup")));
        assert!(!log.append_remote(msg("m2", "B", "A", "sup")));
        assert!(!log.append_remote(msg("h1", "A", "B", "hi")));
        assert_eq!(ids(&log), vec!["h1", "m2"]);
    }

    #[test]
    fn filter_rejects_other_conversations() {
        let log = log_ab();
        assert!(log.accepts(&msg("m1", "A", "B", "x")));
        assert!(log.accepts(&msg("m2", "B", "A", "x")));
        assert!(!log.accepts(&msg("m3", "A", "C", "x")));
        assert!(!log.accepts(&msg("m4", "C", "B", "x")));
    }

    #[test]
    fn confirm_replaces_in_place() {
        let mut log = log_ab();
        log.rebaseline(vec![msg("h1", "A", "B", "hi")]);
        let temp = MessageId::temporary();
        log.append_pending(msg(&temp.0, "A", "B", "hello"));
        log.append_remote(msg("m2", "B", "A", "sup"));

        let outcome = log.confirm(&temp, msg("m1", "A", "B", "hello"));
        assert_eq!(outcome, ConfirmOutcome::Replaced);
        assert_eq!(ids(&log), vec!["h1", "m1", "m2"]);
        assert_eq!(log.entries()[1].delivery, DeliveryState::Confirmed);
        assert_eq!(log.entries()[1].message.text, "hello");
    }

    #[test]
    fn confirm_collapses_when_echo_landed_first() {
        let mut log = log_ab();
        let temp = MessageId::temporary();
        log.append_pending(msg(&temp.0, "A", "B", "hello"));
        // own send echoed back under its server id before the ack
        log.append_remote(msg("m1", "A", "B", "hello"));

        let outcome = log.confirm(&temp, msg("m1", "A", "B", "hello"));
        assert_eq!(outcome, ConfirmOutcome::Collapsed);
        assert_eq!(ids(&log), vec!["m1"]);
    }

    #[test]
    fn confirm_on_unknown_temp_is_harmless() {
        let mut log = log_ab();
        let outcome = log.confirm(&MessageId::temporary(), msg("m1", "A", "B", "x"));
        assert_eq!(outcome, ConfirmOutcome::Missing);
        assert!(log.is_empty());
    }

    #[test]
    fn failed_send_is_marked_in_place_and_retryable() {
        let mut log = log_ab();
        let temp = MessageId::temporary();
        log.append_pending(msg(&temp.0, "A", "B", "hello"));

        assert!(log.mark_failed(&temp));
        assert_eq!(log.entry(&temp).unwrap().delivery, DeliveryState::Failed);
        assert!(log.mark_pending(&temp));
        assert_eq!(log.entry(&temp).unwrap().delivery, DeliveryState::Pending);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn rebaseline_keeps_unconfirmed_local_sends() {
        let mut log = log_ab();
        log.rebaseline(vec![msg("h1", "A", "B", "hi")]);
        let temp = MessageId::temporary();
        log.append_pending(msg(&temp.0, "A", "B", "hello"));

        log.rebaseline(vec![msg("h1", "A", "B", "hi"), msg("m2", "B", "A", "sup")]);
        assert_eq!(ids(&log), vec!["h1", "m2", temp.0.as_str()]);
        assert_eq!(log.entry(&temp).unwrap().delivery, DeliveryState::Pending);
    }

    #[test]
    fn history_then_send_then_live_then_ack() {
        // end-to-end list shape for pair (A, B)
        let mut log = log_ab();
        log.rebaseline(vec![msg("h1", "A", "B", "hi")]);
        assert_eq!(ids(&log), vec!["h1"]);

        let temp = MessageId::temporary();
        log.append_pending(msg(&temp.0, "A", "B", "yo"));
        assert_eq!(ids(&log), vec!["h1", temp.0.as_str()]);

        let live = msg("m2", "B", "A", "sup");
        assert!(log.accepts(&live));
        assert!(log.append_remote(live));
        assert_eq!(ids(&log), vec!["h1", temp.0.as_str(), "m2"]);

        assert_eq!(
            log.confirm(&temp, msg("m3", "A", "B", "yo")),
            ConfirmOutcome::Replaced
        );
        assert_eq!(ids(&log), vec!["h1", "m3", "m2"]);
    }
}
