//! HTTP client for signed Off-Amazon Payments calls.

use crate::config::Config;
use crate::payments::error::PaymentError;
use crate::payments::{parser, signer};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// API version of the Off-Amazon Payments service.
pub const SERVICE_VERSION: &str = "2013-01-01";

/// Statuses treated as transient and retried.
const RETRYABLE_STATUSES: [u16; 2] = [500, 503];
/// One initial attempt plus three retries.
const MAX_ATTEMPTS: u32 = 4;
/// Fixed spacing between attempts; no backoff, no jitter.
const RETRY_DELAY: Duration = Duration::from_millis(400);

/// Trait for issuing payment API calls - enables mocking for tests.
#[async_trait]
pub trait PaymentsApi: Send + Sync {
    /// Calls an API action with the given parameters and returns the parsed
    /// response data.
    async fn call(
        &self,
        action: &str,
        parameters: &[(&str, &str)],
    ) -> Result<Map<String, Value>, PaymentError>;
}

/// Client for the Off-Amazon Payments MWS API.
///
/// Configuration and endpoint are captured at construction and never
/// mutated, so one instance can be shared freely across tasks.
pub struct PaymentsClient {
    http: Client,
    config: Config,
    service_url: Url,
}

impl PaymentsClient {
    /// Creates a client against the production or sandbox endpoint,
    /// depending on the configured sandbox flag.
    pub fn new(config: Config) -> Result<Self, PaymentError> {
        let service_url = config.service_url().to_string();
        Self::with_service_url(config, &service_url)
    }

    /// Creates a client against an explicit endpoint (for testing).
    pub fn with_service_url(config: Config, service_url: &str) -> Result<Self, PaymentError> {
        let service_url = Url::parse(service_url)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            config,
            service_url,
        })
    }

    /// Merges the caller's parameters with the required auth parameters,
    /// then computes and appends the signature. `SellerId` and `Action`
    /// lead, auth parameters trail, and the client's values win over
    /// caller-supplied duplicates. `Signature` is always last and is never
    /// part of its own input.
    fn build_parameters(&self, action: &str, parameters: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = Vec::with_capacity(parameters.len() + 8);
        params.push(("SellerId".to_string(), self.config.seller_id.clone()));
        params.push(("Action".to_string(), action.to_string()));

        for (key, value) in parameters {
            // The signature is computed below; a caller-supplied one never
            // participates.
            if *key == "Signature" {
                continue;
            }
            if !params.iter().any(|(k, _)| k.as_str() == *key) {
                params.push((key.to_string(), value.to_string()));
            }
        }

        upsert(&mut params, "AWSAccessKeyId", self.config.access_key.clone());
        upsert(&mut params, "Timestamp", timestamp());
        upsert(&mut params, "Version", SERVICE_VERSION.to_string());
        upsert(&mut params, "SignatureVersion", "2".to_string());
        upsert(&mut params, "SignatureMethod", "HmacSHA256".to_string());

        let signature = self.sign(&params);
        params.push(("Signature".to_string(), signature));
        params
    }

    /// Signature over everything merged so far, sorted byte-wise by key.
    fn sign(&self, params: &[(String, String)]) -> String {
        let sorted: BTreeMap<String, String> = params.iter().cloned().collect();
        let host = self.service_url.host_str().unwrap_or_default();
        let string_to_sign = signer::string_to_sign(host, self.service_url.path(), &sorted);
        signer::sign(&string_to_sign, &self.config.secret_key)
    }

    /// Posts the signed body, retrying 500/503 on a fixed cadence. Any
    /// transport-level failure surfaces immediately as a connectivity error.
    async fn post(&self, body: &str) -> Result<(u16, String), PaymentError> {
        let mut attempt = 1;
        loop {
            debug!("POST {} (attempt {}/{})", self.service_url, attempt, MAX_ATTEMPTS);
            let response = self
                .http
                .post(self.service_url.clone())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(body.to_string())
                .send()
                .await?;

            let status = response.status().as_u16();
            if RETRYABLE_STATUSES.contains(&status) {
                if attempt < MAX_ATTEMPTS {
                    warn!(
                        "Transient server error (HTTP {}), retrying in {}ms",
                        status,
                        RETRY_DELAY.as_millis()
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                    attempt += 1;
                    continue;
                }
                return Err(PaymentError::Server { status });
            }

            let text = response.text().await?;
            return Ok((status, text));
        }
    }
}

#[async_trait]
impl PaymentsApi for PaymentsClient {
    async fn call(
        &self,
        action: &str,
        parameters: &[(&str, &str)],
    ) -> Result<Map<String, Value>, PaymentError> {
        let params = self.build_parameters(action, parameters);
        let body = signer::canonical_query(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        info!("Calling {}", action);
        let (status, text) = self.post(&body).await?;

        let response = parser::classify(status, &text)?;
        debug!("{} succeeded (HTTP {})", action, response.status);
        Ok(response.data)
    }
}

/// Replaces an existing value in place or appends; mirrors map assignment
/// semantics so a caller-supplied auth key keeps its position but loses its
/// value.
fn upsert(params: &mut Vec<(String, String)>, key: &str, value: String) {
    match params.iter_mut().find(|(k, _)| k.as_str() == key) {
        Some(entry) => entry.1 = value,
        None => params.push((key.to_string(), value)),
    }
}

/// Request timestamp: UTC with a literal `.000` millisecond field. The wire
/// format expects this exact shape; do not substitute real sub-second
/// precision.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S.000Z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::error::ActionErrorKind;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUCCESS_BODY: &str = "<GetOrderReferenceDetailsResponse>\
        <GetOrderReferenceDetailsResult>\
            <OrderReferenceDetails>\
                <AmazonOrderReferenceId>P01-1234567-1234567</AmazonOrderReferenceId>\
            </OrderReferenceDetails>\
        </GetOrderReferenceDetailsResult>\
        <ResponseMetadata><RequestId>abc-123</RequestId></ResponseMetadata>\
    </GetOrderReferenceDetailsResponse>";

    const ERROR_BODY: &str = "<ErrorResponse>\
        <Error><Code>InvalidAddress</Code><Message>bad addr</Message></Error>\
        <RequestId>req-9</RequestId>\
    </ErrorResponse>";

    fn make_test_config() -> Config {
        Config::new("A2EXAMPLE", "AKIAEXAMPLE", "secret-key", true)
    }

    fn make_client(uri: &str) -> PaymentsClient {
        PaymentsClient::with_service_url(make_test_config(), uri).unwrap()
    }

    #[test]
    fn test_signature_is_last_and_unique() {
        let client = make_client("https://mws.amazonservices.com/OffAmazonPayments/2013-01-01");
        let params = client.build_parameters("Authorize", &[("AuthorizationAmount", "10.00")]);

        assert_eq!(params.last().unwrap().0, "Signature");
        assert_eq!(params.iter().filter(|(k, _)| k == "Signature").count(), 1);
    }

    #[test]
    fn test_merged_order() {
        let client = make_client("https://mws.amazonservices.com/OffAmazonPayments/2013-01-01");
        let params = client.build_parameters("Authorize", &[("AuthorizationAmount", "10.00")]);
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();

        assert_eq!(
            keys,
            [
                "SellerId",
                "Action",
                "AuthorizationAmount",
                "AWSAccessKeyId",
                "Timestamp",
                "Version",
                "SignatureVersion",
                "SignatureMethod",
                "Signature",
            ]
        );
    }

    #[test]
    fn test_caller_supplied_signature_is_discarded() {
        let client = make_client("https://mws.amazonservices.com/OffAmazonPayments/2013-01-01");
        let params = client.build_parameters("Authorize", &[("Signature", "evil")]);

        let signatures: Vec<&str> = params
            .iter()
            .filter(|(k, _)| k == "Signature")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(signatures.len(), 1);
        assert_ne!(signatures[0], "evil");
        assert_eq!(params.last().unwrap().0, "Signature");
    }

    #[test]
    fn test_caller_cannot_override_reserved_parameters() {
        let client = make_client("https://mws.amazonservices.com/OffAmazonPayments/2013-01-01");
        let params =
            client.build_parameters("Authorize", &[("SellerId", "evil"), ("Version", "1999")]);

        let find = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(find("SellerId"), Some("A2EXAMPLE"));
        assert_eq!(find("Version"), Some(SERVICE_VERSION));
        assert_eq!(params.iter().filter(|(k, _)| k == "SellerId").count(), 1);
    }

    #[test]
    fn test_timestamp_shape() {
        let ts = timestamp();
        assert_eq!(ts.len(), "2013-01-01T00:00:00.000Z".len());
        assert!(ts.ends_with(".000Z"));
        assert_eq!(&ts[10..11], "T");
    }

    #[tokio::test]
    async fn test_call_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_string_contains("Action=GetOrderReferenceDetails"))
            .and(body_string_contains("SellerId=A2EXAMPLE"))
            .and(body_string_contains("SignatureMethod=HmacSHA256"))
            .and(body_string_contains("Signature="))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS_BODY))
            .mount(&mock_server)
            .await;

        let client = make_client(&mock_server.uri());
        let data = client
            .call(
                "GetOrderReferenceDetails",
                &[("AmazonOrderReferenceId", "P01-1234567-1234567")],
            )
            .await
            .unwrap();

        assert_eq!(
            data["GetOrderReferenceDetailsResult"]["OrderReferenceDetails"]
                ["AmazonOrderReferenceId"],
            Value::String("P01-1234567-1234567".to_string())
        );
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let mock_server = MockServer::start().await;

        // First three attempts see 503, the fourth gets through.
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(3)
            .expect(3)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS_BODY))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = make_client(&mock_server.uri());
        let data = client.call("GetOrderReferenceDetails", &[]).await.unwrap();
        assert!(data.contains_key("GetOrderReferenceDetailsResult"));
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(4)
            .mount(&mock_server)
            .await;

        let client = make_client(&mock_server.uri());
        let err = client.call("Authorize", &[]).await.unwrap_err();

        assert!(matches!(err, PaymentError::Server { status: 503 }));
    }

    #[tokio::test]
    async fn test_500_is_retryable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS_BODY))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = make_client(&mock_server.uri());
        assert!(client.call("Authorize", &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_4xx_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string(ERROR_BODY))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = make_client(&mock_server.uri());
        let err = client.call("SetOrderReferenceDetails", &[]).await.unwrap_err();

        match err {
            PaymentError::Action { kind, status, .. } => {
                assert_eq!(kind, ActionErrorKind::InvalidActionCode);
                assert_eq!(status, 400);
            }
            other => panic!("expected Action, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connectivity_error() {
        // Nothing listens on the discard port.
        let client = make_client("http://127.0.0.1:9/");
        let err = client.call("Authorize", &[]).await.unwrap_err();

        assert!(matches!(err, PaymentError::Connectivity(_)));
    }

    #[tokio::test]
    async fn test_body_encodes_spaces_strictly() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_string_contains("SellerNote=two%20words"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SUCCESS_BODY))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = make_client(&mock_server.uri());
        let result = client
            .call("SetOrderReferenceDetails", &[("SellerNote", "two words")])
            .await;
        assert!(result.is_ok());
    }
}
