//! Pure conversion from persisted session state to a backend message list.
//!
//! Output order: the system directive (when present and non-blank), then every
//! non-deleted prior turn by creation time, then the new user text. No
//! truncation against the model's context window is performed.
//!
//! ```rust
//! use pchat::ConversationAssembler;
//! use pprovider::{Message, Role};
//!
//! let messages = ConversationAssembler::assemble(Some("Be terse."), &[], "Hello");
//! assert_eq!(messages, vec![Message::new(Role::System, "Be terse."), Message::user("Hello")]);
//! ```

use pprovider::Message;

use crate::Turn;

#[derive(Debug, Default, Clone, Copy)]
pub struct ConversationAssembler;

impl ConversationAssembler {
    pub fn assemble(system_directive: Option<&str>, prior: &[Turn], user_text: &str) -> Vec<Message> {
        let mut ordered = prior.iter().filter(|turn| !turn.deleted).collect::<Vec<_>>();
        ordered.sort_by_key(|turn| turn.created_at);

        let mut messages = Vec::with_capacity(ordered.len() + 2);
        if let Some(directive) = system_directive
            && !directive.trim().is_empty()
        {
            messages.push(Message::system(directive));
        }

        messages.extend(
            ordered
                .into_iter()
                .map(|turn| Message::new(turn.role, turn.content.clone())),
        );
        messages.push(Message::user(user_text));
        messages
    }
}
