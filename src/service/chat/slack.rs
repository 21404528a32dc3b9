//! Chat service integration for infini-bot.
//!
//! This module provides the Slack implementation of `GenericChatClient`:
//! - Receiving messages and app mentions over socket mode
//! - Converting them into platform-neutral `ChatEvent`s
//! - Sending replies and reactions

use crate::{
    base::{
        config::Config,
        types::{ChatEvent, ReplyTarget, Res, Segment, Void},
    },
    interaction,
    runtime::Runtime,
    service::{engine::CoreClient, status::StatusClient, workflow::WorkflowClient},
};
use async_trait::async_trait;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use serde_json::Value;
use slack_morphism::prelude::*;
use tracing::{debug, info, instrument, warn};

use std::sync::Arc;

use super::{ChatClient, GenericChatClient};

// Type aliases.

type FullClient = slack_morphism::SlackClient<SlackClientHyperConnector<HttpsConnector<HttpConnector>>>;

// Extra methods on `ChatClient` applied by the slack implementation.

impl ChatClient {
    /// Creates a new Slack chat client.
    pub async fn slack(config: &Config, status: StatusClient, core: CoreClient, workflows: WorkflowClient) -> Res<Self> {
        let client = SlackChatClient::new(config, status, core, workflows).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

impl From<SlackChatClient> for ChatClient {
    fn from(client: SlackChatClient) -> Self {
        Self { inner: Arc::new(client) }
    }
}

// Structs.

/// User state for the slack socket client.
struct SlackUserState {
    runtime: Runtime,
}

/// Slack client implementation.
#[derive(Clone)]
struct SlackChatClient {
    pub app_token: SlackApiToken,
    pub bot_token: SlackApiToken,
    pub bot_user_id: String,
    pub client: Arc<FullClient>,
    pub config: Config,
    pub status: StatusClient,
    pub core: CoreClient,
    pub workflows: WorkflowClient,
}

impl SlackChatClient {
    /// Create a new Slack chat client.
    #[instrument(name = "SlackChatClient::new", skip_all)]
    pub async fn new(config: &Config, status: StatusClient, core: CoreClient, workflows: WorkflowClient) -> Res<Self> {
        // Initialize tokens.

        let app_token = SlackApiToken::new(SlackApiTokenValue(config.slack_app_token.clone()));
        let bot_token = SlackApiToken::new(SlackApiTokenValue(config.slack_bot_token.clone()));

        // Initialize the Slack client.

        let https_connector = HttpsConnector::<HttpConnector>::builder().with_native_roots()?.https_only().enable_all_versions().build();
        let connector = SlackClientHyperConnector::with_connector(https_connector);
        let client = Arc::new(slack_morphism::SlackClient::new(connector));

        // Get the bot's user ID.

        let session = client.open_session(&bot_token);
        let bot_user = session.auth_test().await?;
        let bot_user_id = bot_user.user_id.0;

        info!("Slack bot user ID: {}", bot_user_id);

        Ok(Self {
            app_token,
            bot_token,
            bot_user_id,
            client,
            config: config.clone(),
            status,
            core,
            workflows,
        })
    }
}

#[async_trait]
impl GenericChatClient for SlackChatClient {
    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    async fn start(&self) -> Void {
        // Initialize the socket mode listener.

        let socket_mode_callbacks = SlackSocketModeListenerCallbacks::new()
            .with_command_events(handle_command_event)
            .with_interaction_events(handle_interaction_event)
            .with_push_events(handle_push_event);

        // Initialize the socket mode listener environment.

        let runtime = Runtime {
            config: self.config.clone(),
            status: self.status.clone(),
            core: self.core.clone(),
            workflows: self.workflows.clone(),
            chat: ChatClient::from(self.clone()),
        };

        let listener_environment = Arc::new(SlackClientEventsListenerEnvironment::new(self.client.clone()).with_user_state(SlackUserState { runtime }));

        let socket_mode_listener = Arc::new(SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment.clone(),
            socket_mode_callbacks,
        ));

        // Register an app token to listen for events,
        socket_mode_listener.listen_for(&self.app_token).await?;

        // Start WS connections calling Slack API to get WS url for the token,
        // and wait for Ctrl-C to shutdown.
        socket_mode_listener.serve().await;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn send_message(&self, target: &ReplyTarget, text: &str) -> Void {
        let message = SlackMessageContent::new().with_text(text.to_string());

        let mut request = SlackApiChatPostMessageRequest::new(SlackChannelId(target.channel_id.clone()), message).with_link_names(true);

        if let Some(thread_ts) = &target.thread_ts {
            request = request.with_thread_ts(SlackTs(thread_ts.clone()));
        }

        let session = self.client.open_session(&self.bot_token);

        let _ = session.chat_post_message(&request).await.map_err(|e| anyhow::anyhow!("Failed to send message: {}", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn react_to_message(&self, target: &ReplyTarget, emoji: &str) -> Void {
        let request = SlackApiReactionsAddRequest {
            channel: SlackChannelId(target.channel_id.clone()),
            name: SlackReactionName(emoji.to_string()),
            timestamp: SlackTs(target.message_ts.clone()),
        };

        let session = self.client.open_session(&self.bot_token);

        let _ = session.reactions_add(&request).await.map_err(|e| anyhow::anyhow!("Failed to react to message: {}", e))?;

        Ok(())
    }
}

// Event conversion.

/// Split Slack message text into text and mention segments.
///
/// Mentions are written `<@U123>` or `<@U123|name>`.
pub fn parse_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("<@") {
        let Some(len) = rest[start..].find('>') else {
            break;
        };

        if start > 0 {
            segments.push(Segment::text(&rest[..start]));
        }

        let inner = &rest[start + 2..start + len];
        let user_id = inner.split('|').next().unwrap_or_default();
        segments.push(Segment::mention(user_id));

        rest = &rest[start + len + 1..];
    }

    if !rest.is_empty() {
        segments.push(Segment::text(rest));
    }

    segments
}

fn str_field<'a>(json: &'a Value, pointer: &str) -> Option<&'a str> {
    json.pointer(pointer).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn is_direct(json: &Value) -> bool {
    str_field(json, "/channel_type") == Some("im")
}

/// Why a serialized Slack message event should not be dispatched, if it should not.
pub fn skip_reason(json: &Value, bot_user_id: &str) -> Option<&'static str> {
    if str_field(json, "/bot_id").is_some() || str_field(json, "/user") == Some(bot_user_id) {
        return Some("it was sent by a bot");
    }

    if str_field(json, "/subtype").is_some() {
        return Some("it has a subtype");
    }

    // Slack sends a separate app mention for these.
    let text = str_field(json, "/text").unwrap_or_default();
    if !is_direct(json) && text.contains(&format!("<@{bot_user_id}")) {
        return Some("it mentions the bot");
    }

    None
}

/// Convert a serialized Slack `message` or `app_mention` event into a `ChatEvent`.
pub fn chat_event_from_slack(name: &str, json: Value, bot_user_id: &str) -> Res<ChatEvent> {
    let user_id = str_field(&json, "/user").ok_or(anyhow::anyhow!("Slack event has no user"))?.to_string();
    let channel_id = str_field(&json, "/channel").ok_or(anyhow::anyhow!("Slack event has no channel"))?.to_string();
    let text = json.get("text").and_then(Value::as_str).unwrap_or_default().to_string();
    let ts = str_field(&json, "/ts").unwrap_or_default().to_string();
    let thread_ts = str_field(&json, "/thread_ts").map(str::to_string);

    let nickname = str_field(&json, "/user_profile/display_name")
        .or_else(|| str_field(&json, "/user_profile/real_name"))
        .or_else(|| str_field(&json, "/username"))
        .map(str::to_string);

    let (group_id, session_id) = if is_direct(&json) {
        (None, user_id.clone())
    } else {
        (Some(channel_id.clone()), format!("{channel_id}_{user_id}"))
    };

    let description = format!("{name} {ts} from {user_id}@[channel:{channel_id}] {text:?}");

    // Plain text leaves out mentions, like the segment view does.
    let segments = parse_segments(&text);
    let plain_text = segments
        .iter()
        .filter_map(|s| match s {
            Segment::Text { text } => Some(text.as_str()),
            Segment::Mention { .. } => None,
        })
        .collect::<String>();

    Ok(ChatEvent {
        name: name.to_string(),
        event_type: "message".to_string(),
        description,
        user_id,
        nickname,
        self_id: bot_user_id.to_string(),
        group_id,
        session_id,
        plain_text,
        segments,
        target: ReplyTarget {
            channel_id,
            thread_ts,
            message_ts: ts,
        },
        json,
    })
}

// Socket mode listener callbacks for Slack.

/// Handles command events from Slack.
async fn handle_command_event(
    event: SlackCommandEvent,
    _client: Arc<SlackHyperClient>,
    _states: SlackClientEventsUserState,
) -> Result<SlackCommandEventResponse, Box<dyn std::error::Error + Send + Sync>> {
    warn!("[COMMAND] {:#?}", event);
    Ok(SlackCommandEventResponse::new(SlackMessageContent::new().with_text("Slash commands are not supported; send messages instead.".into())))
}

/// Handles interaction events from Slack.
async fn handle_interaction_event(event: SlackInteractionEvent, _client: Arc<SlackHyperClient>, _states: SlackClientEventsUserState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    warn!("[INTERACTION] {:#?}", event);
    Ok(())
}

/// Handles push events from Slack.
#[instrument(skip_all)]
async fn handle_push_event(event_callback: SlackPushEventCallback, _client: Arc<SlackHyperClient>, states: SlackClientEventsUserState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let event = event_callback.event;
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;
    let runtime = &user_state.runtime;
    let bot_user_id = runtime.chat.bot_user_id().to_string();

    match event {
        SlackEventCallbackBody::Message(slack_message_event) => {
            debug!("Received message event ...");

            let json = serde_json::to_value(&slack_message_event)?;

            if let Some(reason) = skip_reason(&json, &bot_user_id) {
                debug!("Skipping message event because {}.", reason);
                return Ok(());
            }

            let event = chat_event_from_slack("message", json, &bot_user_id)?;
            interaction::dispatch_event(event, runtime.clone());
        }
        SlackEventCallbackBody::AppMention(slack_app_mention_event) => {
            debug!("Received app mention event ...");

            if slack_app_mention_event.user.0 == bot_user_id {
                return Ok(());
            }

            let json = serde_json::to_value(&slack_app_mention_event)?;
            let event = chat_event_from_slack("app_mention", json, &bot_user_id)?;
            interaction::dispatch_event(event, runtime.clone());
        }
        _ => {
            warn!("Received unhandled push event.")
        }
    }

    Ok(())
}

// Tests.
