use axum::Router;
use axum::routing::{get, post};

use crate::api::AppState;
use crate::api::handlers;

pub fn management_routes() -> Router<AppState> {
    Router::new()
        .route("/initializePublisher", get(handlers::initialize_publisher))
        .route("/createTopic", post(handlers::create_topic))
        .route("/deleteTopic", post(handlers::delete_topic))
        .route("/getAllTopicNames", get(handlers::all_topic_names))
        .route("/publishMessage", post(handlers::publish_message))
        .route("/subscribeToTopic", post(handlers::subscribe))
        .route("/unsubscribeToTopic", post(handlers::unsubscribe))
        .route("/getPublisherActiveTopics", get(handlers::publisher_topics))
        .route("/getSubscriberActiveTopics", get(handlers::subscriber_topics))
        .route("/removeAllPublisherTopics", post(handlers::remove_all_topics))
        // Older clients use this name for the same operation.
        .route(
            "/removeAllSubscriberActiveTopics",
            post(handlers::remove_all_topics),
        )
        .route("/removeSubscriber", post(handlers::remove_subscriber))
}
