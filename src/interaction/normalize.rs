//! Mapping of chat events into the core's input record.

use serde_json::{Value, json};

use crate::base::types::{ChatEvent, Input, Segment, Variables};

/// Whether a message is addressed to the bot.
///
/// A message is for the bot when it mentions the bot, when it mentions nobody,
/// or when it does not open by mentioning someone else.
pub fn is_tome(self_id: &str, segments: &[Segment]) -> bool {
    let mut mentions = segments.iter().filter_map(|s| match s {
        Segment::Mention { user_id } => Some(user_id.as_str()),
        Segment::Text { .. } => None,
    });

    let Some(first_mention) = mentions.next() else {
        return true;
    };

    if first_mention == self_id || mentions.any(|m| m == self_id) {
        return true;
    }

    !matches!(segments.iter().find(|s| !s.is_blank()), Some(Segment::Mention { .. }))
}

/// Build the input record for an event.
pub fn build_input(event: &ChatEvent, platform: &str) -> Input {
    let mut variables = Variables::new();

    variables.insert("nickname".into(), event.nickname.clone().map_or(Value::Null, Value::String));
    variables.insert("user_id".into(), json!(event.user_id));
    variables.insert("self_id".into(), json!(event.self_id));
    variables.insert("group_id".into(), event.group_id.clone().map_or(Value::Null, Value::String));
    variables.insert("session_id".into(), json!(event.session_id));
    variables.insert("message".into(), json!(event.segments));
    variables.insert("mentions".into(), json!(event.mentions()));
    variables.insert("is_tome".into(), json!(is_tome(&event.self_id, &event.segments)));
    variables.insert("nb_event_name".into(), json!(event.name));
    variables.insert("nb_event_type".into(), json!(event.event_type));
    variables.insert("nb_event_description".into(), json!(event.description));
    variables.insert("nb_event_json".into(), event.json.clone());
    variables.insert("platform".into(), json!(platform));

    Input::new(event.plain_text.clone(), variables)
}

// Tests.
