//! AWS SQS gateway implementation using the SQS query API over HTTP.
//!
//! Requests are plain HTTP calls signed with AWS Signature Version 4, which keeps
//! the gateway testable against mocked HTTP responses and compatible with
//! SQS-compatible endpoints such as LocalStack.
//!
//! ## Authentication
//!
//! - **Access keys**: explicit `access_key_id` / `secret_access_key` in config
//! - **Environment**: `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and the
//!   optional `AWS_SESSION_TOKEN` when the config leaves them unset
//!
//! ## FIFO queues
//!
//! `MessageGroupId` and `MessageDeduplicationId` arrive as system attributes on
//! receive but must be sent as top-level `SendMessage` parameters, so
//! [`AwsSqsGateway::send_message`] lifts them out of the system attribute map.

use crate::error::{ConfigurationError, GatewayError};
use crate::gateway::QueueGateway;
use crate::message::{
    AttributeMap, OutboundMessage, QueueLocator, QueuePage, ReceiptHandle, ReceiveOptions,
    ReceivedMessage,
};
use crate::provider::{AwsSqsConfig, ProviderType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client as HttpClient;
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::debug;

#[cfg(test)]
#[path = "aws_tests.rs"]
mod tests;

const API_VERSION: &str = "2012-11-05";
const PROVIDER_NAME: &str = "AwsSqs";

/// System attributes that `SendMessage` accepts as top-level parameters
const FIFO_SEND_PARAMETERS: [&str; 2] = ["MessageGroupId", "MessageDeduplicationId"];

// ============================================================================
// Error Types
// ============================================================================

/// AWS SQS specific errors
#[derive(Debug, thiserror::Error)]
pub enum AwsError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("SQS service error: {code} - {message}")]
    ServiceError { code: String, message: String },

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Invalid receipt handle: {0}")]
    InvalidReceipt(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<AwsError> for GatewayError {
    fn from(error: AwsError) -> Self {
        match error {
            AwsError::Authentication(message) => GatewayError::AuthenticationFailed { message },
            AwsError::NetworkError(message) => GatewayError::ConnectionFailed { message },
            AwsError::ServiceError { code, message } => GatewayError::ProviderError {
                provider: PROVIDER_NAME.to_string(),
                code,
                message,
            },
            AwsError::QueueNotFound(queue) => GatewayError::QueueNotFound { queue },
            AwsError::InvalidReceipt(receipt) => GatewayError::ReceiptInvalid { receipt },
            AwsError::SerializationError(message) => GatewayError::Serialization { message },
        }
    }
}

// ============================================================================
// AWS Signature V4 Signing
// ============================================================================

type HmacSha256 = Hmac<Sha256>;

/// AWS Signature Version 4 signer for request authentication
///
/// Implements the AWS Signature V4 signing process:
/// 1. Create canonical request (method, URI, query, headers, payload)
/// 2. Create string to sign (algorithm, timestamp, scope, request hash)
/// 3. Derive signing key (4-level HMAC chain)
/// 4. Calculate signature and build Authorization header
#[derive(Clone)]
struct AwsV4Signer {
    access_key: String,
    secret_key: String,
    session_token: Option<String>,
    region: String,
    service: String,
}

impl AwsV4Signer {
    fn new(
        access_key: String,
        secret_key: String,
        session_token: Option<String>,
        region: String,
    ) -> Self {
        Self {
            access_key,
            secret_key,
            session_token,
            region,
            service: "sqs".to_string(),
        }
    }

    /// Sign a request and return the headers to attach to it
    ///
    /// `canonical_query` must already be sorted and URI-encoded exactly as it
    /// is sent on the wire.
    fn sign_request(
        &self,
        method: &str,
        host: &str,
        path: &str,
        canonical_query: &str,
        body: &str,
        timestamp: &DateTime<Utc>,
    ) -> Vec<(String, String)> {
        let date_stamp = timestamp.format("%Y%m%d").to_string();
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();

        // Canonical headers (must be sorted)
        let mut canonical_headers = format!("host:{}\nx-amz-date:{}\n", host, amz_date);
        let mut signed_headers = "host;x-amz-date".to_string();
        if let Some(token) = &self.session_token {
            canonical_headers.push_str(&format!("x-amz-security-token:{}\n", token));
            signed_headers.push_str(";x-amz-security-token");
        }

        let payload_hash = format!("{:x}", Sha256::digest(body.as_bytes()));

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, path, canonical_query, canonical_headers, signed_headers, payload_hash
        );

        let algorithm = "AWS4-HMAC-SHA256";
        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let canonical_request_hash = format!("{:x}", Sha256::digest(canonical_request.as_bytes()));

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            algorithm, amz_date, credential_scope, canonical_request_hash
        );

        let signature = self.calculate_signature(&string_to_sign, &date_stamp);

        let authorization_header = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            algorithm, self.access_key, credential_scope, signed_headers, signature
        );

        let mut headers = vec![
            ("Authorization".to_string(), authorization_header),
            ("x-amz-date".to_string(), amz_date),
        ];
        if let Some(token) = &self.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        headers
    }

    /// Calculate AWS Signature V4 signature
    ///
    /// kSigning = HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")
    fn calculate_signature(&self, string_to_sign: &str, date_stamp: &str) -> String {
        let k_secret = format!("AWS4{}", self.secret_key);
        let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, self.service.as_bytes());
        let k_signing = hmac_sha256(&k_service, b"aws4_request");
        let signature = hmac_sha256(&k_signing, string_to_sign.as_bytes());

        hex::encode(signature)
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so construction cannot fail
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC can take key of any size"),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Sort and URI-encode request parameters into a canonical query string
fn canonical_query_string(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| {
            (
                urlencoding::encode(k).into_owned(),
                urlencoding::encode(v).into_owned(),
            )
        })
        .collect();
    encoded.sort();

    encoded
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

// ============================================================================
// AWS SQS Gateway
// ============================================================================

/// AWS SQS gateway
///
/// The gateway is stateless apart from its HTTP connection pool and can be
/// shared across tasks using `Arc`.
pub struct AwsSqsGateway {
    http_client: HttpClient,
    signer: Option<AwsV4Signer>,
    config: AwsSqsConfig,
    endpoint: url::Url,
}

impl AwsSqsGateway {
    /// Create new AWS SQS gateway
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the region is empty, the endpoint is
    /// not a valid URL, or the HTTP client cannot be built.
    pub fn new(config: AwsSqsConfig) -> Result<Self, GatewayError> {
        if config.region.is_empty() {
            return Err(ConfigurationError::Missing {
                key: "region".to_string(),
            }
            .into());
        }

        let access_key = config
            .access_key_id
            .clone()
            .or_else(|| non_empty_env("AWS_ACCESS_KEY_ID"));
        let secret_key = config
            .secret_access_key
            .clone()
            .or_else(|| non_empty_env("AWS_SECRET_ACCESS_KEY"));
        let session_token = config
            .session_token
            .clone()
            .or_else(|| non_empty_env("AWS_SESSION_TOKEN"));

        let signer = match (access_key, secret_key) {
            (Some(access_key), Some(secret_key)) => Some(AwsV4Signer::new(
                access_key,
                secret_key,
                session_token,
                config.region.clone(),
            )),
            _ => None,
        };

        let endpoint_str = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://sqs.{}.amazonaws.com", config.region));
        let endpoint = url::Url::parse(&endpoint_str).map_err(|e| ConfigurationError::Invalid {
            message: format!("Invalid SQS endpoint '{}': {}", endpoint_str, e),
        })?;

        let http_client = HttpClient::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| ConfigurationError::Invalid {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            signer,
            config,
            endpoint,
        })
    }

    /// Host header value, including the port when it is not the scheme default
    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Make a signed query API call and return the response body
    async fn make_request(
        &self,
        action: &str,
        mut params: Vec<(String, String)>,
    ) -> Result<String, AwsError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| AwsError::Authentication("No credentials configured".to_string()))?;

        params.push(("Action".to_string(), action.to_string()));
        params.push(("Version".to_string(), API_VERSION.to_string()));

        let method = "POST";
        let path = self.endpoint.path().to_string();
        let query = canonical_query_string(&params);
        let auth_headers = signer.sign_request(method, &self.host(), &path, &query, "", &Utc::now());

        let mut url = self.endpoint.clone();
        url.set_query(Some(&query));

        let mut request = self.http_client.post(url);
        for (key, value) in auth_headers {
            request = request.header(key, value);
        }

        debug!(action = action, "Sending SQS request");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AwsError::NetworkError(format!("Request timeout: {}", e))
            } else if e.is_connect() {
                AwsError::NetworkError(format!("Connection failed: {}", e))
            } else {
                AwsError::NetworkError(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| AwsError::NetworkError(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(parse_error_response(&response_body, status.as_u16()));
        }

        Ok(response_body)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl fmt::Debug for AwsSqsGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsSqsGateway")
            .field("region", &self.config.region)
            .field("endpoint", &self.endpoint.as_str())
            .field("credentials", &self.signer.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl QueueGateway for AwsSqsGateway {
    async fn list_queues(
        &self,
        name_prefix: Option<&str>,
        max_results: u32,
        next_token: Option<&str>,
    ) -> Result<QueuePage, GatewayError> {
        let mut params = vec![(
            "MaxResults".to_string(),
            max_results.clamp(1, ProviderType::AwsSqs.max_list_page_size()).to_string(),
        )];
        if let Some(prefix) = name_prefix {
            params.push(("QueueNamePrefix".to_string(), prefix.to_string()));
        }
        if let Some(token) = next_token {
            params.push(("NextToken".to_string(), token.to_string()));
        }

        let response = self.make_request("ListQueues", params).await?;
        Ok(parse_queue_page(&response)?)
    }

    async fn get_approximate_message_count(
        &self,
        queue: &QueueLocator,
    ) -> Result<u64, GatewayError> {
        let params = vec![
            ("QueueUrl".to_string(), queue.as_str().to_string()),
            (
                "AttributeName.1".to_string(),
                "ApproximateNumberOfMessages".to_string(),
            ),
        ];

        let response = self.make_request("GetQueueAttributes", params).await?;
        let attributes = parse_queue_attributes(&response)?;

        let raw = attributes
            .get("ApproximateNumberOfMessages")
            .ok_or_else(|| {
                AwsError::SerializationError(
                    "ApproximateNumberOfMessages not found in response".to_string(),
                )
            })?;

        raw.trim().parse::<u64>().map_err(|e| {
            AwsError::SerializationError(format!(
                "ApproximateNumberOfMessages '{}' is not a count: {}",
                raw, e
            ))
            .into()
        })
    }

    async fn receive_messages(
        &self,
        queue: &QueueLocator,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, GatewayError> {
        let mut params = vec![
            ("QueueUrl".to_string(), queue.as_str().to_string()),
            (
                "MaxNumberOfMessages".to_string(),
                options.batch_size().to_string(),
            ),
            (
                "VisibilityTimeout".to_string(),
                options.visibility_timeout.as_secs().to_string(),
            ),
            (
                "WaitTimeSeconds".to_string(),
                options.wait_time.as_secs().min(20).to_string(), // AWS max is 20 seconds
            ),
        ];
        for (idx, name) in options.message_attribute_names.iter().enumerate() {
            params.push((format!("MessageAttributeName.{}", idx + 1), name.clone()));
        }
        for (idx, name) in options.system_attribute_names.iter().enumerate() {
            params.push((format!("AttributeName.{}", idx + 1), name.clone()));
        }

        let response = self.make_request("ReceiveMessage", params).await?;
        Ok(parse_receive_message_response(&response)?)
    }

    async fn delete_message(
        &self,
        queue: &QueueLocator,
        receipt: &ReceiptHandle,
    ) -> Result<(), GatewayError> {
        let params = vec![
            ("QueueUrl".to_string(), queue.as_str().to_string()),
            ("ReceiptHandle".to_string(), receipt.as_str().to_string()),
        ];

        // DeleteMessage returns an empty result on success
        self.make_request("DeleteMessage", params).await?;
        Ok(())
    }

    async fn purge_queue(&self, queue: &QueueLocator) -> Result<(), GatewayError> {
        let params = vec![("QueueUrl".to_string(), queue.as_str().to_string())];

        self.make_request("PurgeQueue", params).await?;
        Ok(())
    }

    async fn list_redrive_sources(
        &self,
        queue: &QueueLocator,
        next_token: Option<&str>,
    ) -> Result<QueuePage, GatewayError> {
        // SQS only paginates when MaxResults is present
        let mut params = vec![
            ("QueueUrl".to_string(), queue.as_str().to_string()),
            (
                "MaxResults".to_string(),
                ProviderType::AwsSqs.max_list_page_size().to_string(),
            ),
        ];
        if let Some(token) = next_token {
            params.push(("NextToken".to_string(), token.to_string()));
        }

        let response = self.make_request("ListDeadLetterSourceQueues", params).await?;
        Ok(parse_queue_page(&response)?)
    }

    async fn send_message(
        &self,
        queue: &QueueLocator,
        message: &OutboundMessage,
    ) -> Result<(), GatewayError> {
        let params = build_send_message_params(queue, message);

        self.make_request("SendMessage", params).await?;
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::AwsSqs
    }
}

// ============================================================================
// Request Building
// ============================================================================

/// Build `SendMessage` parameters, dropping empty attribute values
fn build_send_message_params(
    queue: &QueueLocator,
    message: &OutboundMessage,
) -> Vec<(String, String)> {
    let mut params = vec![
        ("QueueUrl".to_string(), queue.as_str().to_string()),
        ("MessageBody".to_string(), message.body.clone()),
    ];

    for (idx, (name, value)) in message.attributes.without_empty_values().iter().enumerate() {
        let prefix = format!("MessageAttribute.{}", idx + 1);
        params.push((format!("{}.Name", prefix), name.to_string()));
        params.push((format!("{}.Value.DataType", prefix), "String".to_string()));
        params.push((format!("{}.Value.StringValue", prefix), value.to_string()));
    }

    let mut system_idx = 0;
    for (name, value) in message.system_attributes.without_empty_values().iter() {
        if FIFO_SEND_PARAMETERS.contains(&name) {
            params.push((name.to_string(), value.to_string()));
            continue;
        }

        system_idx += 1;
        let prefix = format!("MessageSystemAttribute.{}", system_idx);
        params.push((format!("{}.Name", prefix), name.to_string()));
        params.push((format!("{}.Value.DataType", prefix), "String".to_string()));
        params.push((format!("{}.Value.StringValue", prefix), value.to_string()));
    }

    params
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Read the text content of the current element, appending to `buffer`
fn append_text(buffer: &mut String, event: &quick_xml::events::BytesText<'_>) -> Result<(), AwsError> {
    let text = event
        .unescape()
        .map_err(|e| AwsError::SerializationError(format!("Failed to parse XML: {}", e)))?;
    buffer.push_str(&text);
    Ok(())
}

/// Parse a page of queue URLs (`ListQueues`, `ListDeadLetterSourceQueues`)
fn parse_queue_page(xml: &str) -> Result<QueuePage, AwsError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    let mut page = QueuePage::default();
    let mut current: Option<&'static str> = None;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                current = match e.name().as_ref() {
                    b"QueueUrl" => Some("QueueUrl"),
                    b"NextToken" => Some("NextToken"),
                    _ => None,
                };
                text.clear();
            }
            Ok(Event::Text(ref e)) if current.is_some() => append_text(&mut text, e)?,
            Ok(Event::End(_)) => {
                match current.take() {
                    Some("QueueUrl") => page.locators.push(QueueLocator::new(text.trim())),
                    Some("NextToken") if !text.trim().is_empty() => {
                        page.next_token = Some(text.trim().to_string())
                    }
                    _ => {}
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AwsError::SerializationError(format!(
                    "XML parsing error: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(page)
}

/// Parse `GetQueueAttributes` `<Attribute><Name/><Value/></Attribute>` pairs
fn parse_queue_attributes(xml: &str) -> Result<AttributeMap, AwsError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    let mut attributes = AttributeMap::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut name = String::new();
    let mut value = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let tag = e.name().as_ref().to_vec();
                if tag == b"Attribute" {
                    name.clear();
                    value.clear();
                }
                stack.push(tag);
            }
            Ok(Event::Text(ref e)) => match stack_tail(&stack).as_slice() {
                [.., b"Attribute", b"Name"] => append_text(&mut name, e)?,
                [.., b"Attribute", b"Value"] => append_text(&mut value, e)?,
                _ => {}
            },
            Ok(Event::End(_)) => {
                if stack.pop().as_deref() == Some(b"Attribute".as_slice()) {
                    attributes.insert(name.clone(), value.clone());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AwsError::SerializationError(format!(
                    "XML parsing error: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(attributes)
}

/// In-progress state for one `<Message>` element
#[derive(Default)]
struct MessageBuilder {
    message_id: String,
    receipt_handle: String,
    body: String,
    attributes: AttributeMap,
    system_attributes: AttributeMap,
    entry_name: String,
    entry_value: String,
}

impl MessageBuilder {
    fn build(self) -> Result<ReceivedMessage, AwsError> {
        if self.message_id.is_empty() || self.receipt_handle.is_empty() {
            return Err(AwsError::SerializationError(
                "Message without MessageId or ReceiptHandle in response".to_string(),
            ));
        }

        Ok(ReceivedMessage {
            message_id: self.message_id,
            body: self.body,
            receipt_handle: ReceiptHandle::new(self.receipt_handle),
            attributes: self.attributes,
            system_attributes: self.system_attributes,
        })
    }
}

/// Parse `ReceiveMessage` response
///
/// Message bodies are kept byte-for-byte; only identifiers are trimmed.
fn parse_receive_message_response(xml: &str) -> Result<Vec<ReceivedMessage>, AwsError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    let mut messages = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<MessageBuilder> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let tag = e.name().as_ref().to_vec();
                match tag.as_slice() {
                    b"Message" => current = Some(MessageBuilder::default()),
                    b"Attribute" | b"MessageAttribute" => {
                        if let Some(builder) = current.as_mut() {
                            builder.entry_name.clear();
                            builder.entry_value.clear();
                        }
                    }
                    _ => {}
                }
                stack.push(tag);
            }
            Ok(Event::Text(ref e)) => {
                if let Some(builder) = current.as_mut() {
                    receive_text(builder, &stack, e)?;
                }
            }
            Ok(Event::End(_)) => {
                let closed = stack.pop();
                if let Some(builder) = current.as_mut() {
                    match closed.as_deref() {
                        Some(b"Attribute") => {
                            let name = builder.entry_name.trim().to_string();
                            let value = builder.entry_value.clone();
                            builder.system_attributes.insert(name, value);
                        }
                        Some(b"MessageAttribute") => {
                            let name = builder.entry_name.trim().to_string();
                            let value = builder.entry_value.clone();
                            builder.attributes.insert(name, value);
                        }
                        Some(b"Message") => {
                            if let Some(mut finished) = current.take() {
                                finished.message_id = finished.message_id.trim().to_string();
                                finished.receipt_handle =
                                    finished.receipt_handle.trim().to_string();
                                messages.push(finished.build()?);
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AwsError::SerializationError(format!(
                    "XML parsing error: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(messages)
}

/// Route text inside a `<Message>` to the field its element path names
fn receive_text(
    builder: &mut MessageBuilder,
    stack: &[Vec<u8>],
    e: &quick_xml::events::BytesText<'_>,
) -> Result<(), AwsError> {
    match stack_tail(stack).as_slice() {
        [.., b"Message", b"MessageId"] => append_text(&mut builder.message_id, e),
        [.., b"Message", b"ReceiptHandle"] => append_text(&mut builder.receipt_handle, e),
        [.., b"Message", b"Body"] => append_text(&mut builder.body, e),
        [.., b"Attribute", b"Name"] | [.., b"MessageAttribute", b"Name"] => {
            append_text(&mut builder.entry_name, e)
        }
        [.., b"Attribute", b"Value"] | [.., b"MessageAttribute", b"Value", b"StringValue"] => {
            append_text(&mut builder.entry_value, e)
        }
        _ => Ok(()),
    }
}

/// View the last three open element names for context matching
fn stack_tail(stack: &[Vec<u8>]) -> Vec<&[u8]> {
    let start = stack.len().saturating_sub(3);
    stack[start..].iter().map(Vec::as_slice).collect()
}

/// Parse error response from XML and classify it
fn parse_error_response(xml: &str, status_code: u16) -> AwsError {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut error_code = None;
    let mut error_message = None;
    let mut in_error = false;
    let mut in_code = false;
    let mut in_message = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Error" => in_error = true,
                b"Code" if in_error => in_code = true,
                b"Message" if in_error => in_message = true,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_code {
                    error_code = e.unescape().ok().map(|s| s.into_owned());
                    in_code = false;
                } else if in_message {
                    error_message = e.unescape().ok().map(|s| s.into_owned());
                    in_message = false;
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Error" => {
                in_error = false;
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    let code = error_code.unwrap_or_else(|| format!("HTTP{}", status_code));
    let message = error_message.unwrap_or_else(|| "Unknown error".to_string());

    match code.as_str() {
        "AWS.SimpleQueueService.NonExistentQueue" | "QueueDoesNotExist" => {
            AwsError::QueueNotFound(message)
        }
        "InvalidClientTokenId"
        | "UnrecognizedClientException"
        | "SignatureDoesNotMatch"
        | "MissingAuthenticationToken"
        | "ExpiredToken" => AwsError::Authentication(format!("{}: {}", code, message)),
        "ReceiptHandleIsInvalid" | "InvalidReceiptHandle" => AwsError::InvalidReceipt(message),
        _ if status_code == 401 || status_code == 403 => {
            AwsError::Authentication(format!("{}: {}", code, message))
        }
        _ => AwsError::ServiceError { code, message },
    }
}
