use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// A variable map, as carried by inputs and workflow calls.
pub type Variables = Map<String, Value>;

/// One piece of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    #[serde(rename = "at")]
    Mention { user_id: String },
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text { text: text.into() }
    }

    pub fn mention(user_id: impl Into<String>) -> Self {
        Segment::Mention { user_id: user_id.into() }
    }

    /// Whether this is a text segment containing only whitespace.
    pub fn is_blank(&self) -> bool {
        matches!(self, Segment::Text { text } if text.trim().is_empty())
    }
}

/// Where replies to an event should be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTarget {
    pub channel_id: String,
    pub thread_ts: Option<String>,
    pub message_ts: String,
}

/// A platform-neutral view of an incoming chat event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatEvent {
    pub name: String,
    pub event_type: String,
    pub description: String,
    pub json: Value,
    pub user_id: String,
    pub nickname: Option<String>,
    pub self_id: String,
    pub group_id: Option<String>,
    pub session_id: String,
    pub plain_text: String,
    pub segments: Vec<Segment>,
    pub target: ReplyTarget,
}

impl ChatEvent {
    /// The user ids mentioned in this event, in order of appearance.
    pub fn mentions(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Mention { user_id } => Some(user_id.clone()),
                Segment::Text { .. } => None,
            })
            .collect()
    }
}

/// The normalized record handed to the core.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Input {
    pub text: String,
    pub variables: Variables,
}

impl Input {
    pub fn new(text: impl Into<String>, variables: Variables) -> Self {
        Self { text: text.into(), variables }
    }

    pub fn is_tome(&self) -> bool {
        self.variables.get("is_tome").and_then(Value::as_bool).unwrap_or(false)
    }
}

/// A request from the core to run a named workflow.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowCall {
    pub name: String,
    pub variables: Variables,
}

impl WorkflowCall {
    pub fn new(name: impl Into<String>, variables: Variables) -> Self {
        Self { name: name.into(), variables }
    }
}

/// A single output yielded by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Output {
    Text { text: String },
    Workflow(WorkflowCall),
}

impl Output {
    pub fn text(text: impl Into<String>) -> Self {
        Output::Text { text: text.into() }
    }
}
