use std::{fmt, future::Future, pin::Pin};

use anyhow::Context;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::domain::{Mortgage, MortgageId, MortgageInput, RatingResult};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug)]
pub enum ApiError {
    /// No response was received (connect, DNS, TLS, reset).
    Transport(reqwest::Error),
    /// A response arrived with a non-2xx status.
    Http { status: u16, body: Option<String> },
    /// A 2xx response whose body did not decode.
    Decode(reqwest::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    /// Human-readable message for banners and notifications.
    ///
    /// For `Http` this is the backend's `detail` (a string, or the first
    /// non-empty `msg` of a validation error list) and otherwise the status
    /// line. For `Transport` it is the transport error text. A `Decode` error
    /// carries no failure message: the backend reported success, so callers
    /// substitute their own fixed text.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Http { body, .. } => Some(
                body.as_deref()
                    .and_then(detail_from_body)
                    .unwrap_or_else(|| self.to_string()),
            ),
            Self::Transport(_) => Some(self.to_string()),
            Self::Decode(_) => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "Network error: {e}"),
            Self::Http { status, .. } => write!(f, "Request failed with status code {status}"),
            Self::Decode(e) => write!(f, "Invalid response body: {e}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) | Self::Decode(e) => Some(e),
            Self::Http { .. } => None,
        }
    }
}

fn detail_from_body(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    let detail = v.get("detail")?;
    if let Some(s) = detail.as_str() {
        return Some(s.to_string()).filter(|s| !s.is_empty());
    }
    detail
        .as_array()?
        .first()?
        .get("msg")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// One method per backend endpoint. Each call issues exactly one request.
pub trait MortgageService: Send + Sync + 'static {
    fn list_mortgages(&self) -> BoxFuture<'_, Result<Vec<Mortgage>, ApiError>>;

    fn create_mortgage(&self, input: MortgageInput) -> BoxFuture<'_, Result<Mortgage, ApiError>>;

    fn update_mortgage(
        &self,
        id: MortgageId,
        input: MortgageInput,
    ) -> BoxFuture<'_, Result<Mortgage, ApiError>>;

    fn delete_mortgage(&self, id: MortgageId) -> BoxFuture<'_, Result<(), ApiError>>;

    fn calculate_rating(&self, id: MortgageId) -> BoxFuture<'_, Result<RatingResult, ApiError>>;

    fn get_rating(&self, id: MortgageId) -> BoxFuture<'_, Result<RatingResult, ApiError>>;
}

#[derive(Clone)]
pub struct HttpMortgageService {
    base: Url,
    client: reqwest::Client,
}

impl HttpMortgageService {
    pub fn try_new(api_base_url: &str) -> anyhow::Result<Self> {
        let base = Url::parse(api_base_url)
            .with_context(|| format!("parse api base url {api_base_url:?}"))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("api base url cannot carry a path: {api_base_url}");
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("mortgage-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build reqwest client")?;
        Ok(Self { base, client })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&MortgageInput>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.url(segments);
        debug!(%method, %url, "mortgage api request");

        let mut req = self.client.request(method.clone(), url.clone());
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(%method, %url, error = %e, "mortgage api request failed");
                return Err(ApiError::Transport(e));
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.ok().filter(|b| !b.is_empty());
            warn!(%method, %url, status = status.as_u16(), "mortgage api returned error status");
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&MortgageInput>,
    ) -> Result<T, ApiError> {
        self.send(method, segments, body)
            .await?
            .json::<T>()
            .await
            .map_err(ApiError::Decode)
    }
}

impl MortgageService for HttpMortgageService {
    fn list_mortgages(&self) -> BoxFuture<'_, Result<Vec<Mortgage>, ApiError>> {
        Box::pin(async move { self.send_json(Method::GET, &["mortgages"], None).await })
    }

    fn create_mortgage(&self, input: MortgageInput) -> BoxFuture<'_, Result<Mortgage, ApiError>> {
        Box::pin(async move {
            self.send_json(Method::POST, &["mortgages"], Some(&input))
                .await
        })
    }

    fn update_mortgage(
        &self,
        id: MortgageId,
        input: MortgageInput,
    ) -> BoxFuture<'_, Result<Mortgage, ApiError>> {
        Box::pin(async move {
            self.send_json(Method::PUT, &["mortgages", id.as_str()], Some(&input))
                .await
        })
    }

    fn delete_mortgage(&self, id: MortgageId) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(async move {
            self.send(Method::DELETE, &["mortgages", id.as_str()], None)
                .await?;
            Ok(())
        })
    }

    fn calculate_rating(&self, id: MortgageId) -> BoxFuture<'_, Result<RatingResult, ApiError>> {
        Box::pin(async move {
            self.send_json(
                Method::POST,
                &["mortgages", id.as_str(), "calculate-rating"],
                None,
            )
            .await
        })
    }

    fn get_rating(&self, id: MortgageId) -> BoxFuture<'_, Result<RatingResult, ApiError>> {
        Box::pin(async move {
            self.send_json(Method::GET, &["mortgages", id.as_str(), "rating"], None)
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::domain::{CreditRating, LoanType, PropertyType};

    fn record(id: i64, rating: Option<&str>) -> serde_json::Value {
        json!({
            "id": id,
            "applicant_name": "A. Singh",
            "income": 1200000.0,
            "credit_score": 780,
            "loan_amount": 3000000.0,
            "property_value": 5000000.0,
            "debt_amount": 50000.0,
            "loan_type": "fixed",
            "property_type": "single_family",
            "credit_rating": rating,
        })
    }

    fn singh() -> MortgageInput {
        MortgageInput {
            applicant_name: "A. Singh".to_string(),
            income: 1200000.0,
            credit_score: 780,
            loan_amount: 3000000.0,
            property_value: 5000000.0,
            debt_amount: 50000.0,
            loan_type: LoanType::Fixed,
            property_type: PropertyType::SingleFamily,
        }
    }

    #[tokio::test]
    async fn list_decodes_records_in_server_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mortgages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([record(2, Some("AAA")), record(1, None)])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = HttpMortgageService::try_new(&server.uri()).unwrap();
        let list = api.list_mortgages().await.unwrap();
        let ids: Vec<&str> = list.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(list[0].credit_rating, Some(CreditRating::Aaa));
    }

    #[tokio::test]
    async fn create_posts_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mortgages"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({
                "applicant_name": "A. Singh",
                "income": 1200000.0,
                "credit_score": 780,
                "loan_amount": 3000000.0,
                "property_value": 5000000.0,
                "debt_amount": 50000.0,
                "loan_type": "fixed",
                "property_type": "single_family",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(record(9, None)))
            .expect(1)
            .mount(&server)
            .await;

        let api = HttpMortgageService::try_new(&server.uri()).unwrap();
        let created = api.create_mortgage(singh()).await.unwrap();
        assert_eq!(created.id, MortgageId::new("9"));
        assert_eq!(created.credit_rating, None);
    }

    #[tokio::test]
    async fn update_puts_full_record_at_id_path() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/mortgages/4"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(record(4, Some("BBB"))))
            .expect(1)
            .mount(&server)
            .await;

        let api = HttpMortgageService::try_new(&server.uri()).unwrap();
        let updated = api
            .update_mortgage(MortgageId::new("4"), singh())
            .await
            .unwrap();
        assert_eq!(updated.credit_rating, Some(CreditRating::Bbb));
    }

    #[tokio::test]
    async fn delete_ignores_body_and_surfaces_404_detail() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/mortgages/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"message": "Mortgage deleted successfully"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/mortgages/2"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Mortgage not found"})),
            )
            .mount(&server)
            .await;

        let api = HttpMortgageService::try_new(&server.uri()).unwrap();
        api.delete_mortgage(MortgageId::new("1")).await.unwrap();

        let err = api.delete_mortgage(MortgageId::new("2")).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.message().as_deref(), Some("Mortgage not found"));
    }

    #[tokio::test]
    async fn validation_errors_use_first_entry_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mortgages"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "detail": [
                    {"loc": ["body", "credit_score"], "msg": "Input should be less than or equal to 850", "type": "less_than_equal"},
                ]
            })))
            .mount(&server)
            .await;

        let api = HttpMortgageService::try_new(&server.uri()).unwrap();
        let err = api.create_mortgage(singh()).await.unwrap_err();
        assert_eq!(err.status(), Some(422));
        assert_eq!(
            err.message().as_deref(),
            Some("Input should be less than or equal to 850")
        );
    }

    #[tokio::test]
    async fn error_without_detail_falls_back_to_status_line() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mortgages"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let api = HttpMortgageService::try_new(&server.uri()).unwrap();
        let err = api.list_mortgages().await.unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 500, body: None }));
        assert_eq!(
            err.message().as_deref(),
            Some("Request failed with status code 500")
        );
    }

    #[test]
    fn empty_details_fall_back_to_status_line() {
        for body in [r#"{"detail":""}"#, r#"{"detail":[{"msg":""}]}"#, "oops"] {
            let err = ApiError::Http {
                status: 422,
                body: Some(body.to_string()),
            };
            assert_eq!(
                err.message().as_deref(),
                Some("Request failed with status code 422"),
                "body {body}"
            );
        }
    }

    #[tokio::test]
    async fn rating_endpoints_hit_their_paths() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mortgages/5/calculate-rating"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"mortgage_id": 5, "rating": "C"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mortgages/5/rating"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"mortgage_id": 5, "rating": "AAA"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = HttpMortgageService::try_new(&server.uri()).unwrap();
        let calc = api.calculate_rating(MortgageId::new("5")).await.unwrap();
        assert_eq!(calc.rating, CreditRating::C);
        let got = api.get_rating(MortgageId::new("5")).await.unwrap();
        assert_eq!(got.rating, CreditRating::Aaa);
        assert_eq!(got.mortgage_id, MortgageId::new("5"));
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mortgages"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let api = HttpMortgageService::try_new(&server.uri()).unwrap();
        let err = api.list_mortgages().await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
        assert_eq!(err.status(), None);
        assert_eq!(err.message(), None);
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = HttpMortgageService::try_new(&format!("http://{addr}")).unwrap();
        let err = api.list_mortgages().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert!(err.message().unwrap().starts_with("Network error"));
    }

    #[test]
    fn base_url_with_path_prefix_keeps_prefix() {
        let api = HttpMortgageService::try_new("http://example.test/api/").unwrap();
        let url = api.url(&["mortgages", "3", "rating"]);
        assert_eq!(url.as_str(), "http://example.test/api/mortgages/3/rating");
    }

    #[test]
    fn rejects_unparseable_base_url() {
        assert!(HttpMortgageService::try_new("not a url").is_err());
        assert!(HttpMortgageService::try_new("mailto:ops@example.test").is_err());
    }
}
