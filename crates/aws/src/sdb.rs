//! Client for the `SimpleDB` Query API.
//!
//! There is no `SimpleDB` client in the AWS SDK for Rust, so requests are
//! form-encoded `POST`s signed with `SigV4` from the credentials of the shared
//! [`SdkConfig`](aws_config::SdkConfig), and responses are XML.

use std::fmt;
use std::time::{Duration, SystemTime};

use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{SignableBody, SignableRequest, SigningSettings, sign};
use aws_sigv4::sign::v4;
use drift_provider::ProviderError;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::auth::build_sdk_config;
use crate::config::AwsBaseConfig;
use crate::error::{AwsProviderError, SdkFailure, classify_sdk_failure};
use crate::simpledb::{DomainApi, DomainMetadata, DomainResource, NO_SUCH_DOMAIN};

const SIGNING_NAME: &str = "sdb";
const API_VERSION: &str = "2009-04-15";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
const DEFAULT_REGION: &str = "us-east-1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Public `SimpleDB` endpoint for `region`.
pub fn endpoint_for_region(region: &str) -> String {
    if region == DEFAULT_REGION {
        "https://sdb.amazonaws.com".to_owned()
    } else {
        format!("https://sdb.{region}.amazonaws.com")
    }
}

/// `SimpleDB` client for the domain calls.
#[derive(Clone)]
pub struct SimpleDbClient {
    http: reqwest::Client,
    endpoint: String,
    region: String,
    credentials: SharedCredentialsProvider,
}

impl fmt::Debug for SimpleDbClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleDbClient")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("credentials", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl SimpleDbClient {
    /// Create a client from its parts.
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        region: impl Into<String>,
        credentials: SharedCredentialsProvider,
    ) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            region: region.into(),
            credentials,
        }
    }

    /// Create a client using the region, endpoint override and credentials
    /// of an already-loaded SDK config.
    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig) -> Result<Self, AwsProviderError> {
        let credentials = sdk_config.credentials_provider().ok_or_else(|| {
            AwsProviderError::CredentialError("no AWS credentials provider configured".to_owned())
        })?;
        let region = sdk_config
            .region()
            .map_or(DEFAULT_REGION, |region| region.as_ref())
            .to_owned();
        let endpoint = sdk_config
            .endpoint_url()
            .map_or_else(|| endpoint_for_region(&region), str::to_owned);
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AwsProviderError::Configuration(format!("building HTTP client: {e}")))?;

        debug!(endpoint = %endpoint, region = %region, "SimpleDB client configured");
        Ok(Self::new(http, endpoint, region, credentials))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Call a domain-level action and return the response body.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn call(&self, action: &str, domain_name: &str) -> Result<String, AwsProviderError> {
        let body = serde_urlencoded::to_string([
            ("Action", action),
            ("DomainName", domain_name),
            ("Version", API_VERSION),
        ])
        .map_err(|e| AwsProviderError::Configuration(format!("encoding {action}: {e}")))?;

        let url = format!("{}/", self.endpoint);
        let request = self.signed_post(&url, body).await?;
        debug!("sending SimpleDB request");

        let response = request.send().await.map_err(|e| transport_error(&e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| transport_error(&e))?;
        if status.is_success() {
            return Ok(text);
        }

        warn!(%status, "SimpleDB returned an error");
        Err(service_error(status, &text))
    }

    async fn signed_post(
        &self,
        url: &str,
        body: String,
    ) -> Result<reqwest::RequestBuilder, AwsProviderError> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| AwsProviderError::CredentialError(e.to_string()))?;
        let identity = credentials.into();
        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(SIGNING_NAME)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| AwsProviderError::Configuration(format!("signing parameters: {e}")))?
            .into();

        let signable = SignableRequest::new(
            "POST",
            url,
            [("content-type", FORM_CONTENT_TYPE)].into_iter(),
            SignableBody::Bytes(body.as_bytes()),
        )
        .map_err(|e| AwsProviderError::Configuration(format!("signing request: {e}")))?;
        let (instructions, _signature) = sign(signable, &params)
            .map_err(|e| AwsProviderError::Configuration(format!("signing request: {e}")))?
            .into_parts();

        let mut request = self.http.post(url).header(CONTENT_TYPE, FORM_CONTENT_TYPE);
        for (name, value) in instructions.headers() {
            request = request.header(name, value);
        }
        Ok(request.body(body))
    }
}

fn transport_error(err: &reqwest::Error) -> AwsProviderError {
    let failure = if err.is_timeout() {
        SdkFailure::Timeout
    } else if err.is_builder() {
        SdkFailure::Construction
    } else if err.is_connect() || err.is_request() {
        SdkFailure::Dispatch
    } else {
        SdkFailure::Response
    };
    classify_sdk_failure(failure, None, &err.to_string(), &[NO_SUCH_DOMAIN])
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse {
    errors: ErrorList,
}

#[derive(Debug, Deserialize)]
struct ErrorList {
    #[serde(rename = "Error", default)]
    error: Vec<ServiceError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceError {
    code: String,
    message: Option<String>,
}

fn service_error(status: reqwest::StatusCode, body: &str) -> AwsProviderError {
    let first = quick_xml::de::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|response| response.errors.error.into_iter().next());
    match first {
        Some(err) => {
            let detail = match &err.message {
                Some(message) => format!("{}: {message}", err.code),
                None => err.code.clone(),
            };
            classify_sdk_failure(
                SdkFailure::Service,
                Some(&err.code),
                &detail,
                &[NO_SUCH_DOMAIN],
            )
        }
        None => classify_sdk_failure(
            SdkFailure::Response,
            None,
            &format!("HTTP {status}: {body}"),
            &[NO_SUCH_DOMAIN],
        ),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DomainMetadataResponse {
    domain_metadata_result: Option<DomainMetadataResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DomainMetadataResult {
    item_count: Option<i32>,
    item_names_size_bytes: Option<i64>,
    attribute_name_count: Option<i32>,
    attribute_names_size_bytes: Option<i64>,
    attribute_value_count: Option<i32>,
    attribute_values_size_bytes: Option<i64>,
    timestamp: Option<i32>,
}

fn parse_metadata(body: &str) -> Result<Option<DomainMetadata>, AwsProviderError> {
    let response: DomainMetadataResponse = quick_xml::de::from_str(body).map_err(|e| {
        AwsProviderError::ServiceError(format!("unreadable DomainMetadata response: {e}"))
    })?;
    Ok(response
        .domain_metadata_result
        .map(|result| DomainMetadata {
            item_count: result.item_count,
            item_names_size_bytes: result.item_names_size_bytes,
            attribute_name_count: result.attribute_name_count,
            attribute_name_size_bytes: result.attribute_names_size_bytes,
            attribute_value_count: result.attribute_value_count,
            attribute_value_size_bytes: result.attribute_values_size_bytes,
            timestamp: result.timestamp,
        }))
}

impl DomainApi for SimpleDbClient {
    async fn create_domain(&self, name: &str) -> Result<(), ProviderError> {
        self.call("CreateDomain", name).await?;
        Ok(())
    }

    async fn domain_metadata(&self, name: &str) -> Result<Option<DomainMetadata>, ProviderError> {
        let body = self.call("DomainMetadata", name).await?;
        Ok(parse_metadata(&body)?)
    }

    async fn delete_domain(&self, name: &str) -> Result<(), ProviderError> {
        self.call("DeleteDomain", name).await?;
        Ok(())
    }
}

impl DomainResource<SimpleDbClient> {
    /// Create a `DomainResource` by loading an SDK config.
    pub async fn new(config: &AwsBaseConfig) -> Result<Self, AwsProviderError> {
        let sdk_config = build_sdk_config(config).await;
        Self::from_sdk_config(&sdk_config)
    }

    /// Create a `DomainResource` from an already-loaded SDK config.
    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig) -> Result<Self, AwsProviderError> {
        Ok(Self::with_client(SimpleDbClient::from_sdk_config(sdk_config)?))
    }
}

#[cfg(test)]
mod tests {
    use aws_config::{Region, SdkConfig};
    use aws_credential_types::Credentials;
    use drift_provider::{LookupResult, OperationContext};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    const METADATA: &str = r#"<?xml version="1.0"?>
<DomainMetadataResponse xmlns="http://sdb.amazonaws.com/doc/2009-04-15/">
  <DomainMetadataResult>
    <ItemCount>195078</ItemCount>
    <ItemNamesSizeBytes>2586634</ItemNamesSizeBytes>
    <AttributeNameCount>12</AttributeNameCount>
    <AttributeNamesSizeBytes>120</AttributeNamesSizeBytes>
    <AttributeValueCount>3690416</AttributeValueCount>
    <AttributeValuesSizeBytes>50149756</AttributeValuesSizeBytes>
    <Timestamp>1225486466</Timestamp>
  </DomainMetadataResult>
  <ResponseMetadata>
    <RequestId>b1e8f1f7-42e9-494c-ad09-2674e557526d</RequestId>
    <BoxUsage>0.0000219907</BoxUsage>
  </ResponseMetadata>
</DomainMetadataResponse>"#;

    fn error_body(code: &str, message: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?>\n<Response><Errors><Error><Code>{code}</Code>\
             <Message>{message}</Message><BoxUsage>0.0000071759</BoxUsage></Error></Errors>\
             <RequestID>0c3b7f2a-6f1e-4c3a-9d4e-0a1b2c3d4e5f</RequestID></Response>"
        )
    }

    /// A one-shot HTTP server that records the request it answers.
    struct MockSimpleDbServer {
        listener: tokio::net::TcpListener,
        endpoint: String,
    }

    impl MockSimpleDbServer {
        async fn start() -> Self {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("failed to bind mock server");
            let port = listener.local_addr().unwrap().port();
            let endpoint = format!("http://127.0.0.1:{port}");
            Self { listener, endpoint }
        }

        async fn respond_once(self, status_code: u16, body: String) -> String {
            let (mut stream, _) = self.listener.accept().await.unwrap();

            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_complete(&request) {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status_code} OK\r\n\
                 Content-Type: text/xml\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\
                 \r\n\
                 {body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        }
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(split) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..split]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() >= split + 4 + length
    }

    fn credentials() -> SharedCredentialsProvider {
        SharedCredentialsProvider::new(Credentials::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY",
            None,
            None,
            "test",
        ))
    }

    fn client(endpoint: &str) -> SimpleDbClient {
        SimpleDbClient::new(reqwest::Client::new(), endpoint, "us-east-1", credentials())
    }

    #[tokio::test]
    async fn create_domain_posts_signed_form() {
        let server = MockSimpleDbServer::start().await;
        let client = client(&server.endpoint);
        let handle = tokio::spawn(server.respond_once(200, "<CreateDomainResponse/>".to_owned()));

        client.create_domain("alpha").await.unwrap();
        let request = handle.await.unwrap().to_lowercase();

        assert!(request.starts_with("post / http/1.1"));
        assert!(request.contains("authorization: aws4-hmac-sha256 credential=akidexample/"));
        assert!(request.contains("/us-east-1/sdb/aws4_request"));
        assert!(request.contains("x-amz-date:"));
        assert!(request.contains("content-type: application/x-www-form-urlencoded"));
        assert!(request.ends_with("action=createdomain&domainname=alpha&version=2009-04-15"));
    }

    #[tokio::test]
    async fn domain_metadata_reads_counts() {
        let server = MockSimpleDbServer::start().await;
        let client = client(&server.endpoint);
        let handle = tokio::spawn(server.respond_once(200, METADATA.to_owned()));

        let metadata = client.domain_metadata("alpha").await.unwrap().unwrap();
        let request = handle.await.unwrap();

        assert!(request.contains("Action=DomainMetadata"));
        assert_eq!(metadata.item_count, Some(195_078));
        assert_eq!(metadata.attribute_name_size_bytes, Some(120));
        assert_eq!(metadata.attribute_value_size_bytes, Some(50_149_756));
        assert_eq!(metadata.timestamp, Some(1_225_486_466));
    }

    #[test]
    fn metadata_without_result_is_empty() {
        let body = "<DomainMetadataResponse><ResponseMetadata/></DomainMetadataResponse>";
        assert_eq!(parse_metadata(body).unwrap(), None);
        assert!(parse_metadata("not xml <").is_err());
    }

    #[tokio::test]
    async fn missing_domain_is_absent() {
        let server = MockSimpleDbServer::start().await;
        let domains = DomainResource::with_client(client(&server.endpoint));
        let body = error_body("NoSuchDomain", "The specified domain does not exist.");
        let handle = tokio::spawn(server.respond_once(400, body));

        let result = domains
            .find_domain_by_name(&OperationContext::new(), "ghost")
            .await;
        handle.await.unwrap();

        assert!(matches!(result, LookupResult::Absent));
    }

    #[tokio::test]
    async fn service_errors_are_classified_by_code() {
        let server = MockSimpleDbServer::start().await;
        let client = client(&server.endpoint);
        let body = error_body("ServiceUnavailable", "Service AmazonSimpleDB is busy.");
        let handle = tokio::spawn(server.respond_once(503, body));

        let err = client.delete_domain("alpha").await.unwrap_err();
        handle.await.unwrap();
        assert!(matches!(err, ProviderError::RateLimited));

        let err: ProviderError = service_error(
            reqwest::StatusCode::FORBIDDEN,
            &error_body("AuthFailure", "AWS was not able to validate the provided credentials."),
        )
        .into();
        assert!(matches!(err, ProviderError::Configuration(ref m) if m.starts_with("AuthFailure")));
    }

    #[test]
    fn unreadable_error_body_keeps_status() {
        let err: ProviderError =
            service_error(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>").into();
        match err {
            ProviderError::ExecutionFailed(msg) => assert!(msg.starts_with("HTTP 500")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_connection_error() {
        let err = client("http://127.0.0.1:1")
            .create_domain("alpha")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Connection(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn regional_endpoints() {
        assert_eq!(endpoint_for_region("us-east-1"), "https://sdb.amazonaws.com");
        assert_eq!(
            endpoint_for_region("eu-west-1"),
            "https://sdb.eu-west-1.amazonaws.com"
        );
    }

    #[test]
    fn from_sdk_config_uses_region_and_override() {
        let sdk_config = SdkConfig::builder()
            .region(Region::new("eu-west-1"))
            .credentials_provider(credentials())
            .build();
        let client = SimpleDbClient::from_sdk_config(&sdk_config).unwrap();
        assert_eq!(client.region(), "eu-west-1");
        assert_eq!(client.endpoint(), "https://sdb.eu-west-1.amazonaws.com");
        assert!(format!("{client:?}").contains("[REDACTED]"));

        let local = SdkConfig::builder()
            .region(Region::new("us-east-1"))
            .endpoint_url("http://localhost:4566/")
            .credentials_provider(credentials())
            .build();
        let client = SimpleDbClient::from_sdk_config(&local).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:4566");
    }

    #[test]
    fn from_sdk_config_requires_credentials() {
        let sdk_config = SdkConfig::builder()
            .region(Region::new("us-east-1"))
            .build();
        let err = SimpleDbClient::from_sdk_config(&sdk_config).unwrap_err();
        assert!(matches!(err, AwsProviderError::CredentialError(_)));
    }
}
