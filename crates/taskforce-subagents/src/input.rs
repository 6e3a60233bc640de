//! Turn parsing for spawn/send.

use taskforce_protocols::types::{ContentPart, Message};

use crate::error::SubagentError;

/// Build one user turn from either free text or structured items.
pub fn parse_turn(
    message: Option<String>,
    items: Option<Vec<ContentPart>>,
) -> Result<Message, SubagentError> {
    match (message, items) {
        (Some(_), Some(_)) => Err(SubagentError::ConflictingInput),
        (None, None) => Err(SubagentError::MissingInput),
        (Some(message), None) => {
            if message.trim().is_empty() {
                return Err(SubagentError::EmptyInput(
                    "Empty message can't be sent to an agent",
                ));
            }
            Ok(Message::user(message))
        }
        (None, Some(items)) => {
            if items.is_empty() {
                return Err(SubagentError::EmptyInput("Items can't be empty"));
            }
            Ok(Message::user_parts(items))
        }
    }
}
