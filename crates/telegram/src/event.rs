//! Strict classification of inbound updates.
//!
//! Updates are decoded with teloxide's wire types; anything that is not a
//! complete text message or a callback query with data is rejected here.

use {
    serde::{Deserialize, de::IgnoredAny},
    teloxide::types::{CallbackQuery, Message, Update, UpdateKind, User},
};

use courier_common::{ChatId, ConversationIdentity};

use crate::error::{Error, Result};

/// A validated inbound event. Exactly one variant per update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    TextMessage {
        chat_id: ChatId,
        sender_id: i64,
        text: String,
        message_id: i64,
        timestamp: i64,
    },
    CallbackQuery {
        query_id: String,
        sender_id: i64,
        /// Chat of the message the inline keyboard was attached to, if any.
        chat_id: Option<ChatId>,
        data: String,
    },
}

/// Top-level payload keys of a raw update. teloxide settles on the first
/// payload it recognises, so an update carrying both is caught here.
#[derive(Deserialize)]
struct PayloadKeys {
    message: Option<IgnoredAny>,
    callback_query: Option<IgnoredAny>,
}

impl InboundEvent {
    /// Decode a raw webhook body and classify it.
    ///
    /// Returns the `update_id` alongside the event for log correlation.
    pub fn parse(raw: &[u8]) -> Result<(i64, Self)> {
        let keys: PayloadKeys = serde_json::from_slice(raw)
            .map_err(|e| Error::malformed(format!("invalid update JSON: {e}")))?;
        if keys.message.is_some() && keys.callback_query.is_some() {
            return Err(Error::malformed(
                "update carries both message and callback_query",
            ));
        }

        let update: Update = serde_json::from_slice(raw)
            .map_err(|e| Error::malformed(format!("undecodable update: {e}")))?;
        let update_id = i64::from(update.id.0);
        Ok((update_id, Self::try_from(update)?))
    }

    pub fn sender_id(&self) -> i64 {
        match self {
            Self::TextMessage { sender_id, .. } | Self::CallbackQuery { sender_id, .. } => {
                *sender_id
            },
        }
    }

    /// Session key and backend identity for this event's sender.
    pub fn identity(&self) -> ConversationIdentity {
        ConversationIdentity::from_sender(self.sender_id())
    }

    /// Where the reply goes. Callbacks without an attached message fall back
    /// to the sender, which is the private chat id.
    pub fn reply_chat_id(&self) -> ChatId {
        match self {
            Self::TextMessage { chat_id, .. } => *chat_id,
            Self::CallbackQuery {
                chat_id, sender_id, ..
            } => chat_id.unwrap_or(*sender_id),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::TextMessage { .. } => "text_message",
            Self::CallbackQuery { .. } => "callback_query",
        }
    }
}

impl TryFrom<Update> for InboundEvent {
    type Error = Error;

    fn try_from(update: Update) -> Result<Self> {
        match update.kind {
            UpdateKind::Message(message) => text_message(&message),
            UpdateKind::CallbackQuery(query) => callback_query(query),
            _ => Err(Error::malformed(
                "update carries neither a message nor a callback_query",
            )),
        }
    }
}

fn text_message(message: &Message) -> Result<InboundEvent> {
    let missing = |field: &str| Error::malformed(format!("message.{field} is required"));

    let sender = message.from.as_ref().ok_or_else(|| missing("from"))?;
    Ok(InboundEvent::TextMessage {
        chat_id: message.chat.id.0,
        sender_id: sender_id(sender)?,
        text: message.text().ok_or_else(|| missing("text"))?.to_string(),
        message_id: i64::from(message.id.0),
        timestamp: message.date.timestamp(),
    })
}

fn callback_query(query: CallbackQuery) -> Result<InboundEvent> {
    Ok(InboundEvent::CallbackQuery {
        sender_id: sender_id(&query.from)?,
        chat_id: query.message.as_ref().map(|m| m.chat().id.0),
        data: query
            .data
            .ok_or_else(|| Error::malformed("callback_query.data is required"))?,
        query_id: query.id,
    })
}

fn sender_id(user: &User) -> Result<i64> {
    i64::try_from(user.id.0)
        .map_err(|_| Error::malformed(format!("sender id {} out of range", user.id.0)))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        rstest::rstest,
        serde_json::{Value, json},
    };

    fn parse(value: Value) -> Result<InboundEvent> {
        InboundEvent::parse(value.to_string().as_bytes()).map(|(_, event)| event)
    }

    fn user(id: i64) -> Value {
        json!({"id": id, "is_bot": false, "first_name": "Ada"})
    }

    fn message(chat_id: i64, sender: i64, text: &str) -> Value {
        json!({
            "message_id": 10,
            "from": user(sender),
            "chat": {"id": chat_id, "type": "private", "first_name": "Ada"},
            "date": 1_700_000_000,
            "text": text
        })
    }

    fn callback(id: &str, sender: i64, message: Option<Value>, data: Option<&str>) -> Value {
        let mut query = json!({"id": id, "from": user(sender), "chat_instance": "ci-1"});
        if let Some(message) = message {
            query["message"] = message;
        }
        if let Some(data) = data {
            query["data"] = json!(data);
        }
        query
    }

    fn without(mut value: Value, field: &str) -> Value {
        if let Some(map) = value.as_object_mut() {
            map.remove(field);
        }
        value
    }

    #[test]
    fn classifies_text_message() {
        let (update_id, event) = InboundEvent::parse(
            json!({"update_id": 1, "message": message(100, 55, "weather today?")})
                .to_string()
                .as_bytes(),
        )
        .unwrap();

        assert_eq!(update_id, 1);
        assert_eq!(event, InboundEvent::TextMessage {
            chat_id: 100,
            sender_id: 55,
            text: "weather today?".into(),
            message_id: 10,
            timestamp: 1_700_000_000,
        });
        assert_eq!(event.identity().as_str(), "55");
        assert_eq!(event.reply_chat_id(), 100);
    }

    #[test]
    fn callback_uses_attached_message_chat() {
        let event = parse(json!({
            "update_id": 2,
            "callback_query": callback("q1", 9, Some(message(7, 9, "pick")), Some("opt1"))
        }))
        .unwrap();
        assert_eq!(event, InboundEvent::CallbackQuery {
            query_id: "q1".into(),
            sender_id: 9,
            chat_id: Some(7),
            data: "opt1".into(),
        });
        assert_eq!(event.reply_chat_id(), 7);
        assert_eq!(event.kind(), "callback_query");
    }

    #[test]
    fn callback_without_message_falls_back_to_sender() {
        let event = parse(json!({
            "update_id": 3,
            "callback_query": callback("q2", 9, None, Some("opt2"))
        }))
        .unwrap();
        assert_eq!(event.reply_chat_id(), 9);
    }

    #[test]
    fn same_sender_resolves_to_same_identity() {
        let first = parse(json!({"update_id": 4, "message": message(77, 77, "a")})).unwrap();
        let second = parse(json!({
            "update_id": 5,
            "callback_query": callback("q", 77, None, Some("b"))
        }))
        .unwrap();
        assert_eq!(first.identity(), second.identity());
    }

    #[rstest]
    #[case::empty(json!({"update_id": 1}))]
    #[case::both(json!({
        "update_id": 1,
        "message": message(1, 1, "x"),
        "callback_query": callback("q", 1, None, Some("d"))
    }))]
    #[case::no_text(json!({"update_id": 1, "message": without(message(1, 1, "x"), "text")}))]
    #[case::no_sender(json!({"update_id": 1, "message": without(message(1, 1, "x"), "from")}))]
    #[case::no_chat(json!({"update_id": 1, "message": without(message(1, 1, "x"), "chat")}))]
    #[case::callback_no_data(json!({"update_id": 1, "callback_query": callback("q", 1, None, None)}))]
    #[case::sender_without_id(json!({
        "update_id": 1,
        "message": {
            "message_id": 1,
            "from": {"is_bot": false, "first_name": "x"},
            "chat": {"id": 1, "type": "private"},
            "date": 1,
            "text": "x"
        }
    }))]
    #[case::no_update_id(json!({"message": message(1, 1, "x")}))]
    #[case::edited_message(json!({"update_id": 1, "edited_message": message(1, 1, "x")}))]
    fn rejects_malformed(#[case] body: Value) {
        assert!(matches!(parse(body), Err(Error::MalformedInput { .. })));
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            InboundEvent::parse(b"not json"),
            Err(Error::MalformedInput { .. })
        ));
    }
}
