//! Workflows available without any rule-package support code.

use std::sync::Arc;

use async_trait::async_trait;

use crate::base::types::Void;

use super::{Parameters, Workflow};

/// All built-in workflows.
pub fn all() -> Vec<Arc<dyn Workflow>> {
    vec![Arc::new(ReplyWorkflow), Arc::new(ReactWorkflow)]
}

/// Sends the `text` parameter to the originating conversation.
pub struct ReplyWorkflow;

#[async_trait]
impl Workflow for ReplyWorkflow {
    fn name(&self) -> &str {
        "reply"
    }

    fn parameters(&self) -> &[&'static str] {
        &["text"]
    }

    async fn run(&self, parameters: Parameters) -> Void {
        let text = parameters.get_str("text")?;
        parameters.chat.send_message(&parameters.target, text).await
    }
}

/// Reacts to the originating message with the `emoji` parameter.
pub struct ReactWorkflow;

#[async_trait]
impl Workflow for ReactWorkflow {
    fn name(&self) -> &str {
        "react"
    }

    fn parameters(&self) -> &[&'static str] {
        &["emoji"]
    }

    async fn run(&self, parameters: Parameters) -> Void {
        let emoji = parameters.get_str("emoji")?.trim_matches(':');
        parameters.chat.react_to_message(&parameters.target, emoji).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        base::types::{ReplyTarget, WorkflowCall},
        service::chat::tests::RecordingChat,
    };

    fn parameters(chat: &RecordingChat, variables: serde_json::Value) -> Parameters {
        let serde_json::Value::Object(variables) = variables else {
            panic!("variables must be an object");
        };

        let target = ReplyTarget {
            channel_id: "C1".into(),
            thread_ts: Some("9.0".into()),
            message_ts: "9.5".into(),
        };

        Parameters::new(WorkflowCall::new("test", variables), chat.client(), target)
    }

    #[tokio::test]
    async fn reply_sends_text() {
        let chat = RecordingChat::default();

        ReplyWorkflow.run(parameters(&chat, json!({ "text": "rolled 4" }))).await.unwrap();

        assert_eq!(chat.sent(), vec![("C1".to_string(), "rolled 4".to_string())]);
    }

    #[tokio::test]
    async fn react_strips_colons() {
        let chat = RecordingChat::default();

        ReactWorkflow.run(parameters(&chat, json!({ "emoji": ":game_die:" }))).await.unwrap();

        assert_eq!(chat.reactions(), vec![("9.5".to_string(), "game_die".to_string())]);
    }

    #[test]
    fn builtins_have_unique_names() {
        let names: Vec<String> = all().iter().map(|w| w.name().to_string()).collect();

        assert_eq!(names, vec!["reply".to_string(), "react".to_string()]);
    }
}
