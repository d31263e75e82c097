//! Integration tests for the SQS query gateway
//!
//! These tests drive the axum router in-process, the same way an SQS client
//! would talk to the server, with a manual clock standing in for wall time.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use queuestack_sqs::{router, ManualClock, QueueRegistry, RegistryConfig, SqsState};

const QUEUE_URL: &str = "http://localhost:4566/000000000000/orders";

fn test_app() -> (Router, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let registry = QueueRegistry::with_clock(RegistryConfig::default(), clock.clone());
    let state = Arc::new(SqsState::with_registry(registry));
    (router(state), clock)
}

async fn call(app: &Router, params: &[(&str, &str)]) -> (StatusCode, String) {
    let body = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Text of every `<tag>...</tag>` element, in document order
fn values(xml: &str, tag: &str) -> Vec<String> {
    let open_tag = format!("<{}>", tag);
    let close_tag = format!("</{}>", tag);

    let mut found = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(&open_tag) {
        let value_start = start + open_tag.len();
        let Some(end) = rest[value_start..].find(&close_tag) else {
            break;
        };
        found.push(rest[value_start..value_start + end].to_string());
        rest = &rest[value_start + end + close_tag.len()..];
    }
    found
}

fn value(xml: &str, tag: &str) -> String {
    values(xml, tag).into_iter().next().unwrap_or_default()
}

async fn create_orders(app: &Router) {
    let (status, _) = call(app, &[("Action", "CreateQueue"), ("QueueName", "orders")]).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_create_queue_is_idempotent() {
    let (app, _) = test_app();

    let (status, first) = call(&app, &[("Action", "CreateQueue"), ("QueueName", "orders")]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(first.starts_with("<CreateQueueResponse><CreateQueueResult>"));
    assert_eq!(value(&first, "QueueUrl"), QUEUE_URL);
    assert!(!value(&first, "RequestId").is_empty());

    let (_, second) = call(&app, &[("Action", "CreateQueue"), ("QueueName", "orders")]).await;
    assert_eq!(value(&second, "QueueUrl"), QUEUE_URL);

    let (_, listed) = call(&app, &[("Action", "ListQueues")]).await;
    assert_eq!(values(&listed, "QueueUrl"), vec![QUEUE_URL.to_string()]);

    let (_, found) = call(&app, &[("Action", "GetQueueUrl"), ("QueueName", "orders")]).await;
    assert_eq!(value(&found, "QueueUrl"), QUEUE_URL);
}

#[tokio::test]
async fn test_invalid_queue_name() {
    let (app, _) = test_app();

    let (status, xml) = call(&app, &[("Action", "CreateQueue"), ("QueueName", "bad name!")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value(&xml, "Code"), "InvalidParameterValue");
    assert_eq!(value(&xml, "Type"), "Sender");

    let (status, xml) = call(&app, &[("Action", "CreateQueue")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value(&xml, "Code"), "MissingParameter");
}

#[tokio::test]
async fn test_send_receive_delete_round_trip() {
    let (app, _) = test_app();
    create_orders(&app).await;

    let (status, sent) = call(
        &app,
        &[
            ("Action", "SendMessage"),
            ("QueueUrl", QUEUE_URL),
            ("MessageBody", "hello <world> & friends"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let message_id = value(&sent, "MessageId");
    assert!(!message_id.is_empty());
    assert_eq!(value(&sent, "MD5OfMessageBody").len(), 32);

    let (_, received) = call(
        &app,
        &[("Action", "ReceiveMessage"), ("QueueUrl", QUEUE_URL)],
    )
    .await;
    assert_eq!(value(&received, "MessageId"), message_id);
    assert_eq!(
        value(&received, "Body"),
        "hello &lt;world&gt; &amp; friends"
    );
    assert_eq!(value(&received, "MD5OfBody"), value(&sent, "MD5OfMessageBody"));
    let handle = value(&received, "ReceiptHandle");

    let (status, _) = call(
        &app,
        &[
            ("Action", "DeleteMessage"),
            ("QueueUrl", QUEUE_URL),
            ("ReceiptHandle", handle.as_str()),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, xml) = call(
        &app,
        &[
            ("Action", "DeleteMessage"),
            ("QueueUrl", QUEUE_URL),
            ("ReceiptHandle", handle.as_str()),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value(&xml, "Code"), "ReceiptHandleIsInvalid");
}

#[tokio::test]
async fn test_visibility_timeout_and_stale_handle() {
    let (app, clock) = test_app();
    create_orders(&app).await;
    call(
        &app,
        &[("Action", "SendMessage"), ("QueueUrl", QUEUE_URL), ("MessageBody", "job")],
    )
    .await;

    let receive = [
        ("Action", "ReceiveMessage"),
        ("QueueUrl", QUEUE_URL),
        ("VisibilityTimeout", "10"),
    ];
    let (_, first) = call(&app, &receive).await;
    let first_handle = value(&first, "ReceiptHandle");
    assert!(!first_handle.is_empty());

    let (_, hidden) = call(&app, &receive).await;
    assert!(values(&hidden, "Message").is_empty());

    clock.advance(10);
    let (_, second) = call(&app, &receive).await;
    let second_handle = value(&second, "ReceiptHandle");
    assert_ne!(first_handle, second_handle);
    assert!(second.contains("<Name>ApproximateReceiveCount</Name><Value>2</Value>"));

    let (status, _) = call(
        &app,
        &[
            ("Action", "DeleteMessage"),
            ("QueueUrl", QUEUE_URL),
            ("ReceiptHandle", first_handle.as_str()),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_send_message_batch_partial_failure() {
    let (app, _) = test_app();
    create_orders(&app).await;

    let (status, xml) = call(
        &app,
        &[
            ("Action", "SendMessageBatch"),
            ("QueueUrl", QUEUE_URL),
            ("SendMessageBatchRequestEntry.1.Id", "first"),
            ("SendMessageBatchRequestEntry.1.MessageBody", "one"),
            ("SendMessageBatchRequestEntry.2.Id", "second"),
            ("SendMessageBatchRequestEntry.2.MessageBody", "two"),
            ("SendMessageBatchRequestEntry.2.DelaySeconds", "999"),
            ("SendMessageBatchRequestEntry.3.Id", "third"),
            ("SendMessageBatchRequestEntry.3.MessageBody", "three"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let successes = values(&xml, "SendMessageBatchResultEntry");
    assert_eq!(successes.len(), 2);
    assert_eq!(value(&successes[0], "Id"), "first");
    assert_eq!(value(&successes[1], "Id"), "third");

    let failures = values(&xml, "BatchResultErrorEntry");
    assert_eq!(failures.len(), 1);
    assert_eq!(value(&failures[0], "Id"), "second");
    assert_eq!(value(&failures[0], "Code"), "InvalidParameterValue");
    assert_eq!(value(&failures[0], "SenderFault"), "true");
    assert!(xml.find("SendMessageBatchResultEntry") < xml.find("BatchResultErrorEntry"));
}

#[tokio::test]
async fn test_oversized_batch_is_rejected_without_side_effects() {
    let (app, _) = test_app();
    create_orders(&app).await;

    let keys: Vec<(String, String)> = (1..=11)
        .flat_map(|i| {
            [
                (format!("SendMessageBatchRequestEntry.{}.Id", i), format!("m{}", i)),
                (
                    format!("SendMessageBatchRequestEntry.{}.MessageBody", i),
                    format!("body {}", i),
                ),
            ]
        })
        .collect();
    let mut params: Vec<(&str, &str)> = vec![("Action", "SendMessageBatch"), ("QueueUrl", QUEUE_URL)];
    params.extend(keys.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    let (status, xml) = call(&app, &params).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        value(&xml, "Code"),
        "AWS.SimpleQueueService.TooManyEntriesInBatchRequest"
    );

    let (_, attrs) = call(
        &app,
        &[
            ("Action", "GetQueueAttributes"),
            ("QueueUrl", QUEUE_URL),
            ("AttributeName.1", "ApproximateNumberOfMessages"),
        ],
    )
    .await;
    assert_eq!(
        values(&attrs, "Attribute"),
        vec!["<Name>ApproximateNumberOfMessages</Name><Value>0</Value>".to_string()]
    );
}

#[tokio::test]
async fn test_delete_message_batch() {
    let (app, _) = test_app();
    create_orders(&app).await;
    call(
        &app,
        &[("Action", "SendMessage"), ("QueueUrl", QUEUE_URL), ("MessageBody", "a")],
    )
    .await;
    let (_, received) = call(&app, &[("Action", "ReceiveMessage"), ("QueueUrl", QUEUE_URL)]).await;
    let handle = value(&received, "ReceiptHandle");

    let (status, xml) = call(
        &app,
        &[
            ("Action", "DeleteMessageBatch"),
            ("QueueUrl", QUEUE_URL),
            ("DeleteMessageBatchRequestEntry.1.Id", "ok"),
            ("DeleteMessageBatchRequestEntry.1.ReceiptHandle", handle.as_str()),
            ("DeleteMessageBatchRequestEntry.2.Id", "stale"),
            ("DeleteMessageBatchRequestEntry.2.ReceiptHandle", "not-a-handle"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(values(&xml, "DeleteMessageBatchResultEntry").len(), 1);
    let failures = values(&xml, "BatchResultErrorEntry");
    assert_eq!(value(&failures[0], "Id"), "stale");
    assert_eq!(value(&failures[0], "Code"), "ReceiptHandleIsInvalid");
}

#[tokio::test]
async fn test_batch_shape_errors() {
    let (app, _) = test_app();
    create_orders(&app).await;

    let (_, xml) = call(&app, &[("Action", "SendMessageBatch"), ("QueueUrl", QUEUE_URL)]).await;
    assert_eq!(value(&xml, "Code"), "AWS.SimpleQueueService.EmptyBatchRequest");

    let (_, xml) = call(
        &app,
        &[
            ("Action", "DeleteMessageBatch"),
            ("QueueUrl", QUEUE_URL),
            ("DeleteMessageBatchRequestEntry.1.Id", "dup"),
            ("DeleteMessageBatchRequestEntry.1.ReceiptHandle", "x"),
            ("DeleteMessageBatchRequestEntry.2.Id", "dup"),
            ("DeleteMessageBatchRequestEntry.2.ReceiptHandle", "y"),
        ],
    )
    .await;
    assert_eq!(
        value(&xml, "Code"),
        "AWS.SimpleQueueService.BatchEntryIdsNotDistinct"
    );
}

#[tokio::test]
async fn test_unknown_queue_and_action() {
    let (app, _) = test_app();

    let (status, xml) = call(
        &app,
        &[("Action", "SendMessage"), ("QueueUrl", QUEUE_URL), ("MessageBody", "x")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value(&xml, "Code"), "AWS.SimpleQueueService.NonExistentQueue");

    let (status, xml) = call(&app, &[("Action", "Teleport")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value(&xml, "Code"), "InvalidAction");
}

#[tokio::test]
async fn test_queue_attributes_and_purge() {
    let (app, _) = test_app();
    let (status, _) = call(
        &app,
        &[
            ("Action", "CreateQueue"),
            ("QueueName", "orders"),
            ("Attribute.1.Name", "VisibilityTimeout"),
            ("Attribute.1.Value", "45"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        &[
            ("Action", "SetQueueAttributes"),
            ("QueueUrl", QUEUE_URL),
            ("Attribute.1.Name", "DelaySeconds"),
            ("Attribute.1.Value", "5"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    call(
        &app,
        &[("Action", "SendMessage"), ("QueueUrl", QUEUE_URL), ("MessageBody", "x")],
    )
    .await;

    let (_, attrs) = call(
        &app,
        &[("Action", "GetQueueAttributes"), ("QueueUrl", QUEUE_URL), ("AttributeName.1", "All")],
    )
    .await;
    assert_eq!(values(&attrs, "Attribute").len(), 11);
    assert!(attrs.contains("<Name>VisibilityTimeout</Name><Value>45</Value>"));
    assert!(attrs.contains("<Name>DelaySeconds</Name><Value>5</Value>"));
    assert!(attrs.contains("<Name>ApproximateNumberOfMessagesDelayed</Name><Value>1</Value>"));

    let (status, _) = call(&app, &[("Action", "PurgeQueue"), ("QueueUrl", QUEUE_URL)]).await;
    assert_eq!(status, StatusCode::OK);
    let (_, attrs) = call(&app, &[("Action", "GetQueueAttributes"), ("QueueUrl", QUEUE_URL)]).await;
    assert!(attrs.contains("<Name>ApproximateNumberOfMessagesDelayed</Name><Value>0</Value>"));

    let (status, xml) = call(
        &app,
        &[
            ("Action", "SetQueueAttributes"),
            ("QueueUrl", QUEUE_URL),
            ("Attribute.1.Name", "Colour"),
            ("Attribute.1.Value", "blue"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value(&xml, "Code"), "InvalidAttributeName");
}

#[tokio::test]
async fn test_delete_queue() {
    let (app, _) = test_app();
    create_orders(&app).await;

    let (status, _) = call(&app, &[("Action", "DeleteQueue"), ("QueueUrl", QUEUE_URL)]).await;
    assert_eq!(status, StatusCode::OK);

    let (status, xml) = call(&app, &[("Action", "DeleteQueue"), ("QueueUrl", QUEUE_URL)]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value(&xml, "Code"), "AWS.SimpleQueueService.NonExistentQueue");

    let (_, listed) = call(&app, &[("Action", "ListQueues")]).await;
    assert!(values(&listed, "QueueUrl").is_empty());
}

#[tokio::test]
async fn test_action_from_target_header() {
    let (app, _) = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/?QueueName=orders")
        .header("x-amz-target", "AmazonSQS.CreateQueue")
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let xml = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(value(&xml, "QueueUrl"), QUEUE_URL);
}

#[tokio::test]
async fn test_zero_visibility_timeout_redelivers_immediately() {
    let (app, _) = test_app();
    create_orders(&app).await;
    call(
        &app,
        &[
            ("Action", "SetQueueAttributes"),
            ("QueueUrl", QUEUE_URL),
            ("Attribute.1.Name", "VisibilityTimeout"),
            ("Attribute.1.Value", "0"),
        ],
    )
    .await;
    call(
        &app,
        &[("Action", "SendMessage"), ("QueueUrl", QUEUE_URL), ("MessageBody", "again")],
    )
    .await;

    let receive = [("Action", "ReceiveMessage"), ("QueueUrl", QUEUE_URL)];
    let (_, first) = call(&app, &receive).await;
    let (_, second) = call(&app, &receive).await;
    assert_eq!(value(&first, "Body"), "again");
    assert_eq!(value(&second, "Body"), "again");
    assert_ne!(value(&first, "ReceiptHandle"), value(&second, "ReceiptHandle"));
}

#[tokio::test]
async fn test_empty_parameters_count_as_omitted() {
    let (app, _) = test_app();

    let (status, xml) = call(&app, &[("Action", "CreateQueue"), ("QueueName", "")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value(&xml, "Code"), "MissingParameter");

    create_orders(&app).await;
    let (status, _) = call(
        &app,
        &[
            ("Action", "SendMessage"),
            ("QueueUrl", QUEUE_URL),
            ("MessageBody", "now"),
            ("DelaySeconds", ""),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, received) = call(
        &app,
        &[
            ("Action", "ReceiveMessage"),
            ("QueueUrl", QUEUE_URL),
            ("MaxNumberOfMessages", ""),
            ("VisibilityTimeout", ""),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value(&received, "Body"), "now");
}
