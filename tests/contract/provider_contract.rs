use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shiptrack_core::{
    classify, ErrorCode, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse,
    IdentifierType, ProviderCatalog, ProviderFamily, ProviderRegistryBuilder, TrackingNumber,
};

struct FixedHttpClient {
    response: Result<HttpResponse, HttpError>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FixedHttpClient {
    fn new(response: Result<HttpResponse, HttpError>) -> Arc<Self> {
        Arc::new(Self {
            response,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("request log is not poisoned")
            .clone()
    }
}

impl HttpClient for FixedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests
            .lock()
            .expect("request log is not poisoned")
            .push(request);
        let response = self.response.clone();
        Box::pin(async move { response })
    }
}

fn sample_identifier(identifier_type: IdentifierType) -> TrackingNumber {
    let raw = match identifier_type {
        IdentifierType::Container => "MSKU1234567",
        IdentifierType::Booking => "BKG20240601",
        IdentifierType::Bol => "MAEU240601123",
        IdentifierType::Vessel => "IMO9321483",
    };
    TrackingNumber::parse(raw).expect("valid identifier")
}

#[tokio::test]
async fn every_mock_provider_returns_a_complete_payload_for_each_supported_type() {
    let registry = ProviderRegistryBuilder::new()
        .with_mock_mode()
        .build()
        .expect("builtin catalog is valid");
    let descriptors = registry.list_providers(None);
    assert_eq!(descriptors.len(), ProviderCatalog::builtin().providers.len());

    for descriptor in descriptors {
        let provider = registry
            .provider(&descriptor.name)
            .expect("listed provider is registered");

        for identifier_type in descriptor.supported_types.iter().copied() {
            let identifier = sample_identifier(identifier_type);
            let payload = provider
                .fetch(&identifier, identifier_type, descriptor.timeout)
                .await
                .unwrap_or_else(|error| panic!("{} failed for {identifier_type}: {error}", descriptor.name));

            assert!(
                payload.is_complete(),
                "{} returned an incomplete payload for {identifier_type}",
                descriptor.name
            );
            assert!(payload
                .events
                .windows(2)
                .all(|pair| pair[0].timestamp <= pair[1].timestamp));
        }
    }
}

#[tokio::test]
async fn mock_payloads_are_deterministic_per_identifier() {
    let registry = ProviderRegistryBuilder::new()
        .with_mock_mode()
        .build()
        .expect("builtin catalog is valid");
    let provider = registry.provider("maersk").expect("maersk is registered");
    let identifier = sample_identifier(IdentifierType::Container);

    let first = provider
        .fetch(&identifier, IdentifierType::Container, Duration::from_secs(1))
        .await
        .expect("mock fetch");
    let second = provider
        .fetch(&identifier, IdentifierType::Container, Duration::from_secs(1))
        .await
        .expect("mock fetch");

    assert_eq!(first, second);
}

#[test]
fn builtin_catalog_descriptors_are_valid_and_uniquely_named() {
    let catalog = ProviderCatalog::builtin();
    let mut names = catalog
        .providers
        .iter()
        .map(|entry| entry.descriptor.name.clone())
        .collect::<Vec<_>>();

    for entry in &catalog.providers {
        entry.descriptor.validate().expect("valid descriptor");
        assert_eq!(
            entry.descriptor.is_aggregator,
            entry.family == ProviderFamily::Aggregator,
            "{} family and aggregator flag disagree",
            entry.descriptor.name
        );
    }

    names.sort();
    names.dedup();
    assert_eq!(names.len(), catalog.providers.len());
}

#[tokio::test]
async fn real_carrier_requests_carry_the_configured_api_key() {
    let client = FixedHttpClient::new(Ok(HttpResponse::ok_json(
        r#"{"status": "Gate in", "events": [{"timestamp": "2024-06-01T08:00:00Z", "status": "Gate in"}]}"#,
    )));
    let registry = ProviderRegistryBuilder::new()
        .with_api_key("maersk", "secret-key")
        .with_real_clients_from(|_| None)
        .with_http_client(client.clone())
        .build()
        .expect("valid registry");

    let names = registry
        .list_providers(None)
        .into_iter()
        .map(|descriptor| descriptor.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["maersk"]);

    let provider = registry.provider("maersk").expect("registered");
    let payload = provider
        .fetch(
            &sample_identifier(IdentifierType::Container),
            IdentifierType::Container,
            Duration::from_secs(3),
        )
        .await
        .expect("fetch succeeds");

    assert_eq!(payload.carrier.as_deref(), Some("MAERSK"));
    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::Get);
    assert!(requests[0].url.ends_with("/tracking/container/MSKU1234567"));
    assert_eq!(
        requests[0].headers.get("x-api-key").map(String::as_str),
        Some("secret-key")
    );
}

#[tokio::test]
async fn real_aggregator_rejections_classify_as_auth_errors() {
    let client = FixedHttpClient::new(Ok(HttpResponse::new(401, "invalid token")));
    let registry = ProviderRegistryBuilder::new()
        .with_real_clients_from(|key| (key == "SHIPSGO_API_KEY").then(|| String::from("token")))
        .with_http_client(client)
        .build()
        .expect("valid registry");

    let provider = registry.provider("shipsgo").expect("registered");
    let error = provider
        .fetch(
            &sample_identifier(IdentifierType::Bol),
            IdentifierType::Bol,
            Duration::from_secs(3),
        )
        .await
        .expect_err("401 must fail");

    assert_eq!(classify(&error).code, ErrorCode::AuthError);
}

#[tokio::test]
async fn transport_failures_map_onto_the_failure_taxonomy() {
    let cases = [
        (HttpError::timeout("deadline elapsed"), ErrorCode::Timeout),
        (HttpError::connect("connection refused"), ErrorCode::NetworkError),
    ];

    for (transport_error, expected) in cases {
        let registry = ProviderRegistryBuilder::new()
            .with_api_key("cma_cgm", "key")
            .with_real_clients_from(|_| None)
            .with_http_client(FixedHttpClient::new(Err(transport_error)))
            .build()
            .expect("valid registry");
        let provider = registry.provider("cma_cgm").expect("registered");

        let error = provider
            .fetch(
                &sample_identifier(IdentifierType::Booking),
                IdentifierType::Booking,
                Duration::from_secs(1),
            )
            .await
            .expect_err("transport failure");

        assert_eq!(classify(&error).code, expected);
    }
}
