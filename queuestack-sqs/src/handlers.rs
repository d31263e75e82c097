//! HTTP handlers for the SQS query protocol

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::Response,
    routing::any,
    Router,
};
use bytes::Bytes;
use queuestack_core::{error::escape_xml, AwsError, RequestId};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::actor::QueueHandle;
use crate::batch::{delete_message_batch, send_message_batch, BatchResultErrorEntry};
use crate::error::SqsError;
use crate::message::Message;
use crate::params::Params;
use crate::queue::QueueConfig;
use crate::registry::{QueueRegistry, RegistryConfig};
use crate::validation::validate_queue_name;

const TARGET_PREFIX: &str = "AmazonSQS.";

/// Shared state handed to every request
#[derive(Debug, Default)]
pub struct SqsState {
    pub registry: QueueRegistry,
}

impl SqsState {
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_registry(QueueRegistry::new(config))
    }

    pub fn with_registry(registry: QueueRegistry) -> Self {
        Self { registry }
    }
}

/// Router answering every path with the SQS dispatcher
pub fn router(state: Arc<SqsState>) -> Router {
    Router::new()
        .route("/", any(handle_request))
        .fallback(handle_request)
        .with_state(state)
}

/// Handle an SQS request, selecting the operation from `Action` or `X-Amz-Target`
pub async fn handle_request(
    State(state): State<Arc<SqsState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let params = Params::parse(uri.query(), &body);
    let action = params
        .get("Action")
        .map(str::to_string)
        .or_else(|| {
            headers
                .get("x-amz-target")
                .and_then(|v| v.to_str().ok())
                .and_then(|t| t.strip_prefix(TARGET_PREFIX))
                .map(str::to_string)
        })
        .unwrap_or_default();
    let request_id = RequestId::new();

    info!(action = %action, request_id = %request_id, "SQS request");

    match dispatch(&state, &action, &params).await {
        Ok(result) => success_response(&action, &result, &request_id),
        Err(err) => {
            debug!(action = %action, request_id = %request_id, error = %err, "SQS request failed");
            error_response(err, &request_id)
        }
    }
}

async fn dispatch(state: &SqsState, action: &str, params: &Params) -> Result<String, SqsError> {
    let registry = &state.registry;
    match action {
        "CreateQueue" => create_queue(registry, params),
        "DeleteQueue" => delete_queue(registry, params),
        "GetQueueUrl" => get_queue_url(registry, params),
        "ListQueues" => Ok(list_queues(registry, params)),
        "GetQueueAttributes" => get_queue_attributes(registry, params).await,
        "SetQueueAttributes" => set_queue_attributes(registry, params).await,
        "SendMessage" => send_message(registry, params).await,
        "SendMessageBatch" => send_message_batch_action(registry, params).await,
        "ReceiveMessage" => receive_message(registry, params).await,
        "DeleteMessage" => delete_message(registry, params).await,
        "DeleteMessageBatch" => delete_message_batch_action(registry, params).await,
        "ChangeMessageVisibility" => change_message_visibility(registry, params).await,
        "PurgeQueue" => purge_queue(registry, params).await,
        _ => {
            warn!(action = %action, "Unknown SQS action");
            Err(SqsError::InvalidAction(
                "The action or operation requested is invalid. Verify that the action is typed correctly."
                    .to_string(),
            ))
        }
    }
}

fn resolve_queue(registry: &QueueRegistry, params: &Params) -> Result<QueueHandle, SqsError> {
    let url = params.require("QueueUrl")?;
    registry.resolve(url).ok_or_else(SqsError::non_existent_queue)
}

// === Queue management ===

fn create_queue(registry: &QueueRegistry, params: &Params) -> Result<String, SqsError> {
    let name = params.require("QueueName")?;
    validate_queue_name(name)?;

    let mut config = QueueConfig::default();
    config.apply(&params.attributes()?)?;

    let (_, url) = registry.create_if_absent_with(name, config);
    Ok(format!("<QueueUrl>{}</QueueUrl>", escape_xml(&url)))
}

fn delete_queue(registry: &QueueRegistry, params: &Params) -> Result<String, SqsError> {
    let url = params.require("QueueUrl")?;
    if registry.delete(url) {
        Ok(String::new())
    } else {
        Err(SqsError::non_existent_queue())
    }
}

fn get_queue_url(registry: &QueueRegistry, params: &Params) -> Result<String, SqsError> {
    let name = params.require("QueueName")?;
    let (_, url) = registry
        .find_by_name(name)
        .ok_or_else(SqsError::non_existent_queue)?;
    Ok(format!("<QueueUrl>{}</QueueUrl>", escape_xml(&url)))
}

fn list_queues(registry: &QueueRegistry, params: &Params) -> String {
    let mut urls = registry.list(params.get("QueueNamePrefix"));
    urls.sort();

    let mut xml = String::new();
    for url in urls {
        let _ = write!(xml, "<QueueUrl>{}</QueueUrl>", escape_xml(&url));
    }
    xml
}

async fn get_queue_attributes(
    registry: &QueueRegistry,
    params: &Params,
) -> Result<String, SqsError> {
    let queue = resolve_queue(registry, params)?;
    let requested = params.attribute_names();
    let attributes = queue.describe().await?.to_pairs();

    let all = requested.is_empty() || requested.iter().any(|n| n == "All");
    if !all {
        if let Some(unknown) = requested
            .iter()
            .find(|n| !attributes.iter().any(|(name, _)| *name == n.as_str()))
        {
            return Err(SqsError::InvalidAttributeName(format!(
                "Unknown Attribute {}.",
                unknown
            )));
        }
    }

    let mut xml = String::new();
    for (name, value) in attributes
        .iter()
        .filter(|(name, _)| all || requested.iter().any(|n| n.as_str() == *name))
    {
        let _ = write!(
            xml,
            "<Attribute><Name>{}</Name><Value>{}</Value></Attribute>",
            name,
            escape_xml(value)
        );
    }
    Ok(xml)
}

async fn set_queue_attributes(
    registry: &QueueRegistry,
    params: &Params,
) -> Result<String, SqsError> {
    let queue = resolve_queue(registry, params)?;
    queue.set_attributes(params.attributes()?).await?;
    info!(queue = %queue.name(), "Updated queue attributes");
    Ok(String::new())
}

async fn purge_queue(registry: &QueueRegistry, params: &Params) -> Result<String, SqsError> {
    let queue = resolve_queue(registry, params)?;
    queue.purge().await?;
    Ok(String::new())
}

// === Messages ===

async fn send_message(registry: &QueueRegistry, params: &Params) -> Result<String, SqsError> {
    let queue = resolve_queue(registry, params)?;
    let body = params.require("MessageBody")?.to_string();
    let delay_seconds = params.get_i64("DelaySeconds")?;

    let message = queue.enqueue(body, delay_seconds).await?;
    info!(queue = %queue.name(), message_id = %message.message_id, "Sent message");

    Ok(format!(
        "<MD5OfMessageBody>{}</MD5OfMessageBody><MD5OfMessageAttributes>{}</MD5OfMessageAttributes><MessageId>{}</MessageId>",
        message.md5_of_body, message.md5_of_message_attributes, message.message_id
    ))
}

async fn receive_message(registry: &QueueRegistry, params: &Params) -> Result<String, SqsError> {
    let queue = resolve_queue(registry, params)?;
    let max_number_of_messages = params.get_i64("MaxNumberOfMessages")?.unwrap_or(1);
    let visibility_timeout = params.get_i64("VisibilityTimeout")?;

    let messages = queue
        .receive(max_number_of_messages, visibility_timeout)
        .await?;
    info!(queue = %queue.name(), count = messages.len(), "Received messages");

    let mut xml = String::new();
    for message in &messages {
        write_message(&mut xml, message);
    }
    Ok(xml)
}

fn write_message(xml: &mut String, message: &Message) {
    let _ = write!(
        xml,
        "<Message><MessageId>{}</MessageId><ReceiptHandle>{}</ReceiptHandle><MD5OfBody>{}</MD5OfBody><Body>{}</Body>",
        message.message_id,
        message.receipt_handle,
        message.md5_of_body,
        escape_xml(&message.body)
    );
    let attributes = [
        ("SenderId", message.sender_id.clone()),
        ("SentTimestamp", message.sent_timestamp.to_string()),
        ("ApproximateReceiveCount", message.receive_count.to_string()),
        (
            "ApproximateFirstReceiveTimestamp",
            message.first_receive_timestamp.to_string(),
        ),
    ];
    for (name, value) in attributes {
        let _ = write!(
            xml,
            "<Attribute><Name>{}</Name><Value>{}</Value></Attribute>",
            name, value
        );
    }
    xml.push_str("</Message>");
}

async fn delete_message(registry: &QueueRegistry, params: &Params) -> Result<String, SqsError> {
    let queue = resolve_queue(registry, params)?;
    let receipt_handle = params.require("ReceiptHandle")?;
    queue.delete(receipt_handle).await?;
    info!(queue = %queue.name(), "Deleted message");
    Ok(String::new())
}

async fn change_message_visibility(
    registry: &QueueRegistry,
    params: &Params,
) -> Result<String, SqsError> {
    let queue = resolve_queue(registry, params)?;
    let receipt_handle = params.require("ReceiptHandle")?;
    let visibility_timeout = params.get_i64("VisibilityTimeout")?.ok_or_else(|| {
        SqsError::MissingParameter(
            "A required parameter VisibilityTimeout is not supplied.".to_string(),
        )
    })?;
    queue
        .change_visibility(receipt_handle, visibility_timeout)
        .await?;
    Ok(String::new())
}

// === Batches ===

async fn send_message_batch_action(
    registry: &QueueRegistry,
    params: &Params,
) -> Result<String, SqsError> {
    let queue = resolve_queue(registry, params)?;
    let outcome = send_message_batch(&queue, params).await?;

    let mut xml = String::new();
    for entry in &outcome.successful {
        let _ = write!(
            xml,
            "<SendMessageBatchResultEntry><Id>{}</Id><MessageId>{}</MessageId><MD5OfMessageBody>{}</MD5OfMessageBody><MD5OfMessageAttributes>{}</MD5OfMessageAttributes></SendMessageBatchResultEntry>",
            entry.id, entry.message_id, entry.md5_of_message_body, entry.md5_of_message_attributes
        );
    }
    write_batch_errors(&mut xml, &outcome.failed);
    Ok(xml)
}

async fn delete_message_batch_action(
    registry: &QueueRegistry,
    params: &Params,
) -> Result<String, SqsError> {
    let queue = resolve_queue(registry, params)?;
    let outcome = delete_message_batch(&queue, params).await?;

    let mut xml = String::new();
    for entry in &outcome.successful {
        let _ = write!(
            xml,
            "<DeleteMessageBatchResultEntry><Id>{}</Id></DeleteMessageBatchResultEntry>",
            entry.id
        );
    }
    write_batch_errors(&mut xml, &outcome.failed);
    Ok(xml)
}

fn write_batch_errors(xml: &mut String, failed: &[BatchResultErrorEntry]) {
    for entry in failed {
        let _ = write!(
            xml,
            "<BatchResultErrorEntry><Id>{}</Id><Code>{}</Code><Message>{}</Message><SenderFault>{}</SenderFault></BatchResultErrorEntry>",
            entry.id,
            entry.code,
            escape_xml(&entry.message),
            entry.sender_fault
        );
    }
}

// === XML Helpers ===

fn success_response(action: &str, result: &str, request_id: &RequestId) -> Response {
    let xml = format!(
        "<{action}Response><{action}Result>{result}</{action}Result><ResponseMetadata><RequestId>{request_id}</RequestId></ResponseMetadata></{action}Response>"
    );
    xml_response(StatusCode::OK, xml)
}

fn error_response(err: SqsError, request_id: &RequestId) -> Response {
    let err = AwsError::from(err).with_request_id(request_id.to_string());
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
    xml_response(status, err.to_xml())
}

fn xml_response(status: StatusCode, body: String) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/xml"),
    );
    response
}
