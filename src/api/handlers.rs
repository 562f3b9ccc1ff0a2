//! Management endpoint handlers.
//!
//! Each handler parses its query string, makes exactly one registry call and
//! renders the outcome. Malformed ids never reach the registry.

use axum::extract::{Query, State};
use serde::Deserialize;
use tracing::debug;

use crate::api::AppState;
use crate::api::response::ApiResponse;
use crate::utils::error::RegistryError;

/// Query parameters accepted by the management endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ManagementQuery {
    pub id: Option<String>,
    #[serde(rename = "topicName", default)]
    pub topic_name: Option<String>,
    #[serde(rename = "messageContent", default)]
    pub message_content: Option<String>,
}

impl ManagementQuery {
    fn id(&self) -> Option<u64> {
        self.id.as_deref()?.trim().parse().ok()
    }

    fn raw_id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    fn topic(&self) -> &str {
        self.topic_name.as_deref().unwrap_or_default()
    }

    fn content(&self) -> &str {
        self.message_content.as_deref().unwrap_or_default()
    }
}

fn rejected(operation: &str, err: &RegistryError) {
    debug!("{operation} rejected: {err} ({:?})", err.kind());
}

pub async fn initialize_publisher(State(state): State<AppState>) -> ApiResponse {
    ApiResponse::id(state.registry.register_publisher())
}

pub async fn create_topic(
    State(state): State<AppState>,
    Query(query): Query<ManagementQuery>,
) -> ApiResponse {
    let topic = query.topic();
    let Some(publisher) = query.id() else {
        return ApiResponse::failure(format!("Topic {topic} could not be added"));
    };

    match state.registry.create_topic(publisher, topic) {
        Ok(()) => ApiResponse::ok(format!("Topic {topic} successfully added")),
        Err(e) => {
            rejected("createTopic", &e);
            ApiResponse::failure(format!("Topic {topic} could not be added"))
        }
    }
}

pub async fn delete_topic(
    State(state): State<AppState>,
    Query(query): Query<ManagementQuery>,
) -> ApiResponse {
    let topic = query.topic();
    let Some(publisher) = query.id() else {
        return ApiResponse::failure(format!("Topic {topic} could not be removed"));
    };

    match state.registry.remove_topic(publisher, topic) {
        Ok(()) => ApiResponse::ok(format!("Topic {topic} successfully removed")),
        Err(e) => {
            rejected("deleteTopic", &e);
            ApiResponse::failure(format!("Topic {topic} could not be removed"))
        }
    }
}

pub async fn all_topic_names(State(state): State<AppState>) -> ApiResponse {
    ApiResponse::names(state.registry.list_topic_names())
}

pub async fn publish_message(
    State(state): State<AppState>,
    Query(query): Query<ManagementQuery>,
) -> ApiResponse {
    let topic = query.topic();
    let failure =
        || ApiResponse::failure(format!("Message to topic {topic} could not be published"));
    let Some(publisher) = query.id() else {
        return failure();
    };
    if query.content().is_empty() {
        return failure();
    }

    match state.registry.publish(publisher, topic, query.content()) {
        Ok(_) => ApiResponse::ok(format!(
            "Message to topic {topic} was successfully published"
        )),
        Err(e) => {
            rejected("publishMessage", &e);
            failure()
        }
    }
}

pub async fn subscribe(
    State(state): State<AppState>,
    Query(query): Query<ManagementQuery>,
) -> ApiResponse {
    let topic = query.topic();
    let failure = || {
        ApiResponse::failure(format!(
            "Subscriber {} was not added to the topic {topic}. (Perhaps an invalid ID?)",
            query.raw_id()
        ))
    };
    let Some(subscriber) = query.id() else {
        return failure();
    };

    match state.registry.subscribe(subscriber, topic) {
        Ok(()) => ApiResponse::ok(format!(
            "Subscriber {subscriber} successfully added to topic {topic}"
        )),
        Err(e) => {
            rejected("subscribeToTopic", &e);
            failure()
        }
    }
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Query(query): Query<ManagementQuery>,
) -> ApiResponse {
    let topic = query.topic();
    let failure = || {
        ApiResponse::failure(format!(
            "Subscriber {} was not removed from the topic {topic}. (Perhaps an invalid ID?)",
            query.raw_id()
        ))
    };
    let Some(subscriber) = query.id() else {
        return failure();
    };

    match state.registry.unsubscribe(subscriber, topic) {
        Ok(()) => ApiResponse::ok(format!(
            "Subscriber {subscriber} successfully removed from topic {topic}"
        )),
        Err(e) => {
            rejected("unsubscribeToTopic", &e);
            failure()
        }
    }
}

pub async fn publisher_topics(
    State(state): State<AppState>,
    Query(query): Query<ManagementQuery>,
) -> ApiResponse {
    match query.id() {
        Some(publisher) => {
            ApiResponse::names(state.registry.list_topics_for_publisher(publisher))
        }
        None => ApiResponse::failure("Publisher ID entered is not a valid integer"),
    }
}

/// Unknown subscribers get an empty list rather than a failure.
pub async fn subscriber_topics(
    State(state): State<AppState>,
    Query(query): Query<ManagementQuery>,
) -> ApiResponse {
    match query.id() {
        Some(subscriber) => ApiResponse::names(
            state
                .registry
                .list_topics_for_subscriber(subscriber)
                .unwrap_or_default(),
        ),
        None => ApiResponse::failure("Subscriber ID entered is not a valid integer"),
    }
}

pub async fn remove_all_topics(
    State(state): State<AppState>,
    Query(query): Query<ManagementQuery>,
) -> ApiResponse {
    match query.id() {
        Some(publisher) => {
            let removed = state.registry.remove_all_topics(publisher);
            ApiResponse::ok(format!(
                "{removed} topics owned by publisher {publisher} successfully removed"
            ))
        }
        None => ApiResponse::failure("Publisher ID entered is not a valid integer"),
    }
}

pub async fn remove_subscriber(
    State(state): State<AppState>,
    Query(query): Query<ManagementQuery>,
) -> ApiResponse {
    let Some(subscriber) = query.id() else {
        return ApiResponse::failure(format!(
            "Subscriber {} could not be removed",
            query.raw_id()
        ));
    };

    match state.registry.remove_subscriber(subscriber) {
        Ok(()) => ApiResponse::ok(format!("Subscriber {subscriber} successfully removed")),
        Err(e) => {
            rejected("removeSubscriber", &e);
            ApiResponse::failure(format!("Subscriber {subscriber} could not be removed"))
        }
    }
}
