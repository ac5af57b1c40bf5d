//! Message store for the single open ticket.

use helpdesk_protocol::{Message, Role};

/// Messages of the currently open ticket. Switching tickets replaces the
/// list wholesale.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    ticket_id: Option<String>,
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list with a full fetch for `ticket_id`
    pub fn load(&mut self, ticket_id: &str, messages: Vec<Message>) {
        self.ticket_id = Some(ticket_id.to_string());
        self.messages = messages;
    }

    /// Push one message at the end. A message whose server id is already
    /// held is ignored, so a repeated echo cannot double-append.
    pub fn append(&mut self, message: Message) -> bool {
        if let Some(id) = message.id.as_deref() {
            if self.messages.iter().any(|m| m.id.as_deref() == Some(id)) {
                return false;
            }
        }
        self.messages.push(message);
        true
    }

    /// Mark every held message read. Returns how many changed.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for message in self.messages.iter_mut().filter(|m| !m.is_read) {
            message.is_read = true;
            changed += 1;
        }
        changed
    }

    pub fn clear(&mut self) {
        self.ticket_id = None;
        self.messages.clear();
    }

    pub fn ticket_id(&self) -> Option<&str> {
        self.ticket_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Unread messages written by `sender`
    pub fn unread_count(&self, sender: Role) -> usize {
        self.messages
            .iter()
            .filter(|m| m.sender == sender && !m.is_read)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_id(sender: Role, text: &str, id: &str) -> Message {
        let mut message = Message::new(sender, text);
        message.id = Some(id.to_string());
        message
    }

    #[test]
    fn mark_all_read_is_idempotent() {
        let mut store = MessageStore::new();
        store.load(
            "T1",
            vec![
                Message::new(Role::User, "one"),
                Message::new(Role::Admin, "two"),
            ],
        );

        assert_eq!(store.mark_all_read(), 2);
        let once = store.messages().to_vec();
        assert_eq!(store.mark_all_read(), 0);
        assert_eq!(store.messages(), once.as_slice());
        assert!(store.messages().iter().all(|m| m.is_read));
    }

    #[test]
    fn load_replaces_previous_ticket() {
        let mut store = MessageStore::new();
        store.load("T1", vec![Message::new(Role::User, "old")]);
        store.load("T2", vec![Message::new(Role::User, "new")]);

        assert_eq!(store.ticket_id(), Some("T2"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.messages()[0].text, "new");
    }

    #[test]
    fn append_ignores_repeated_server_id() {
        let mut store = MessageStore::new();
        store.load("T1", Vec::new());

        assert!(store.append(with_id(Role::Admin, "hello", "m-1")));
        assert!(!store.append(with_id(Role::Admin, "hello", "m-1")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn append_without_id_always_pushes() {
        let mut store = MessageStore::new();
        assert!(store.append(Message::new(Role::User, "same")));
        assert!(store.append(Message::new(Role::User, "same")));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn unread_count_by_sender() {
        let mut store = MessageStore::new();
        store.load(
            "T1",
            vec![
                Message::new(Role::User, "a"),
                Message::new(Role::User, "b"),
                Message::new(Role::Admin, "c"),
            ],
        );
        assert_eq!(store.unread_count(Role::User), 2);
        assert_eq!(store.unread_count(Role::Admin), 1);

        store.mark_all_read();
        assert_eq!(store.unread_count(Role::User), 0);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.ticket_id(), None);
    }
}
