//! Maps a completed HTTP response onto a success payload or an [`ApiError`].

use crate::error::ApiError;
use crate::parser::{self, OAuthProblem, OAuthProblemReport};
use reqwest::header::HeaderMap;
use tracing::debug;

/// Result of classifying one response. `Ok` carries the raw body.
pub type Outcome = Result<Vec<u8>, ApiError>;

/// Message used when an expired-token response carries no readable detail.
pub const UNEXPECTED_TOKEN: &str = "Unexpected token";

/// Message used when a nonce_used report has no advice to quote.
pub const NONCE_USED: &str = "The nonce value has already been used";

/// Advice used when a rate limit problem report has none of its own.
pub const RATE_LIMIT_ADVICE: &str = "please wait before retrying the xero api";

const RETRY_AFTER: &str = "retry-after";
const DAY_LIMIT_REMAINING: &str = "x-daylimit-remaining";

/// Identifies a 404 for a particular entity, by a body substring or by a
/// path segment of the requested endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundSignature {
    pattern: String,
    endpoint: Option<String>,
    entity: String,
}

impl NotFoundSignature {
    /// Responses containing `pattern` are reported as `"{entity} not found in Xero."`.
    pub fn new(pattern: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            endpoint: None,
            entity: entity.into(),
        }
    }

    /// Also match requests whose URL path has `segment` as one of its
    /// segments, e.g. `Invoices` for `.../api.xro/2.0/Invoices/{id}`.
    pub fn endpoint(mut self, segment: impl Into<String>) -> Self {
        self.endpoint = Some(segment.into());
        self
    }

    /// Get the body pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Get the endpoint path segment, if any.
    pub fn endpoint_segment(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Get the entity noun used in the error message.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    fn matches(&self, body: &str, endpoint: &str) -> bool {
        body.contains(&self.pattern)
            || self
                .endpoint
                .as_deref()
                .is_some_and(|segment| has_path_segment(endpoint, segment))
    }
}

fn has_path_segment(endpoint: &str, segment: &str) -> bool {
    let path = endpoint.split(['?', '#']).next().unwrap_or_default();
    path.split('/').any(|part| part == segment)
}

/// Ordered table of 404 signatures. The first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundRegistry {
    signatures: Vec<NotFoundSignature>,
}

impl NotFoundRegistry {
    /// An empty registry; every 404 becomes [`ApiError::ObjectNotFound`].
    pub fn empty() -> Self {
        Self {
            signatures: Vec::new(),
        }
    }

    /// Append a signature after the existing ones.
    pub fn register(mut self, signature: NotFoundSignature) -> Self {
        self.signatures.push(signature);
        self
    }

    /// Get the signatures in match order.
    pub fn signatures(&self) -> &[NotFoundSignature] {
        &self.signatures
    }

    fn lookup(&self, body: &str, endpoint: &str) -> Option<&NotFoundSignature> {
        self.signatures
            .iter()
            .find(|signature| signature.matches(body, endpoint))
    }
}

impl Default for NotFoundRegistry {
    fn default() -> Self {
        Self::empty()
            .register(
                NotFoundSignature::new("Invoice not found", "Invoice").endpoint("Invoices"),
            )
            .register(
                NotFoundSignature::new("CreditNote not found", "Credit Note")
                    .endpoint("CreditNotes"),
            )
    }
}

/// Stateless response classifier.
///
/// # Example
///
/// ```rust
/// use xero_http::{ApiError, ResponseClassifier};
/// use reqwest::header::HeaderMap;
///
/// let classifier = ResponseClassifier::default();
/// let outcome = classifier.classify(418, &HeaderMap::new(), b"", "https://api.xero.com/Teapots");
///
/// assert_eq!(outcome, Err(ApiError::BadResponse { status: 418 }));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseClassifier {
    not_found: NotFoundRegistry,
}

impl ResponseClassifier {
    /// Create a classifier with the given 404 signature table.
    pub fn new(not_found: NotFoundRegistry) -> Self {
        Self { not_found }
    }

    /// Classify a response.
    ///
    /// `endpoint` is the URL that was requested; it is only used for 404
    /// responses.
    pub fn classify(
        &self,
        status: u16,
        headers: &HeaderMap,
        body: &[u8],
        endpoint: &str,
    ) -> Outcome {
        debug!(status, endpoint, body_len = body.len(), "classifying response");

        match status {
            200..=299 => Ok(body.to_vec()),
            400 => Err(api_fault(body)),
            401 | 503 => Err(oauth_error(body)),
            404 => Err(self.not_found(body, endpoint)),
            429 => Err(rate_limited(headers)),
            status => Err(ApiError::BadResponse { status }),
        }
    }

    fn not_found(&self, body: &[u8], endpoint: &str) -> ApiError {
        let body = String::from_utf8_lossy(body);
        match self.not_found.lookup(&body, endpoint) {
            Some(signature) => ApiError::EntityNotFound {
                entity: signature.entity.clone(),
            },
            None => ApiError::ObjectNotFound {
                endpoint: endpoint.to_string(),
            },
        }
    }
}

/// Classify with the default not-found registry.
pub fn classify(status: u16, headers: &HeaderMap, body: &[u8], endpoint: &str) -> Outcome {
    ResponseClassifier::default().classify(status, headers, body, endpoint)
}

fn api_fault(body: &[u8]) -> ApiError {
    let fault = parser::parse_xml_fault(body).unwrap_or_else(|| {
        debug!("400 body is not an XML fault document");
        Default::default()
    });

    ApiError::ApiFault {
        fault_type: fault.fault_type,
        fault_message: fault.message,
        xml: String::from_utf8_lossy(body).into_owned(),
        validation_errors: fault.validation_errors,
    }
}

fn oauth_error(body: &[u8]) -> ApiError {
    match parser::parse_oauth_problem(body) {
        Some(report) => oauth_problem(body, report),
        None => token_expired(body),
    }
}

fn oauth_problem(body: &[u8], report: OAuthProblemReport) -> ApiError {
    debug!(problem = %report.problem, "oauth problem reported");

    match report.kind() {
        OAuthProblem::TokenExpired => token_expired(body),
        OAuthProblem::TokenRejected => ApiError::TokenInvalid {
            advice: report.advice,
        },
        OAuthProblem::RateLimitExceeded => ApiError::RateLimitExceeded {
            message: if report.advice.is_empty() {
                RATE_LIMIT_ADVICE.to_string()
            } else {
                report.advice
            },
            retry_after: None,
            daily_limit_remaining: None,
        },
        OAuthProblem::ConsumerKeyUnknown => ApiError::ConsumerKeyUnknown {
            advice: report.advice,
        },
        OAuthProblem::NonceUsed => {
            let nonce = parser::extract_nonce(&report.advice).map(str::to_string);
            let message = match &nonce {
                Some(nonce) => format!("The nonce value \"{nonce}\" has already been used "),
                None if report.advice.is_empty() => NONCE_USED.to_string(),
                None => report.advice,
            };
            ApiError::NonceUsed { nonce, message }
        }
        OAuthProblem::OrganisationOffline => ApiError::OrganisationOffline {
            advice: report.advice,
        },
        OAuthProblem::Other => ApiError::UnknownOAuthError {
            problem: report.problem,
            advice: report.advice,
        },
    }
}

fn token_expired(body: &[u8]) -> ApiError {
    let message = parser::parse_token_expiry(body)
        .map(|expiry| expiry.message)
        .unwrap_or_else(|| UNEXPECTED_TOKEN.to_string());

    ApiError::TokenExpired { message }
}

fn rate_limited(headers: &HeaderMap) -> ApiError {
    let retry_after = header_count(headers, RETRY_AFTER);
    let daily_limit_remaining = header_count(headers, DAY_LIMIT_REMAINING);

    ApiError::RateLimitExceeded {
        message: format!(
            "Rate limit exceeded: {daily_limit_remaining} requests left for the day, \
             {retry_after} seconds until you can make another request"
        ),
        retry_after: Some(retry_after),
        daily_limit_remaining: Some(daily_limit_remaining),
    }
}

/// Missing or non-numeric headers count as zero.
fn header_count(headers: &HeaderMap, name: &str) -> u64 {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};

    const ENDPOINT: &str = "https://api.xero.com/api.xro/2.0/Invoices";

    fn run(status: u16, body: &str) -> Outcome {
        classify(status, &HeaderMap::new(), body.as_bytes(), ENDPOINT)
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for &(name, value) in pairs {
            map.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        map
    }

    #[test]
    fn test_success_returns_body_unchanged() {
        for status in [200, 201, 204, 299] {
            assert_eq!(run(status, "<Invoices/>"), Ok(b"<Invoices/>".to_vec()));
        }
    }

    #[test]
    fn test_api_fault_message_ends_with_raw_body() {
        let body = "<ApiException><Type>ValidationException</Type><Message>A validation exception occurred</Message></ApiException>";
        let err = run(400, body).unwrap_err();

        assert_eq!(
            err.message(),
            format!(
                "A validation exception occurred: ValidationException \n Generated by the following XML: \n {body}"
            )
        );
    }

    #[test]
    fn test_api_fault_with_unparseable_body() {
        let err = run(400, "not xml at all").unwrap_err();

        assert_eq!(
            err,
            ApiError::ApiFault {
                fault_type: String::new(),
                fault_message: String::new(),
                xml: "not xml at all".into(),
                validation_errors: vec![],
            }
        );
        assert_eq!(
            err.message(),
            ":  \n Generated by the following XML: \n not xml at all"
        );
    }

    #[test]
    fn test_oauth_problems_on_401_and_503() {
        for status in [401, 503] {
            assert_eq!(
                run(status, "oauth_problem_advice=some advice&oauth_problem=token_rejected"),
                Err(ApiError::TokenInvalid {
                    advice: "some advice".into()
                })
            );
            assert_eq!(
                run(
                    status,
                    "oauth_problem_advice=some more advice&oauth_problem=consumer_key_unknown"
                ),
                Err(ApiError::ConsumerKeyUnknown {
                    advice: "some more advice".into()
                })
            );
            assert_eq!(
                run(
                    status,
                    "oauth_problem_advice=organisational advice&oauth_problem=organisation offline"
                ),
                Err(ApiError::OrganisationOffline {
                    advice: "organisational advice".into()
                })
            );
        }
    }

    #[test]
    fn test_token_expired_falls_back_to_unexpected_token() {
        let err = run(
            401,
            "oauth_problem=token_expired&oauth_problem_advice=The access token has expired",
        )
        .unwrap_err();
        assert_eq!(err.message(), UNEXPECTED_TOKEN);

        let err = run(503, "").unwrap_err();
        assert_eq!(
            err,
            ApiError::TokenExpired {
                message: UNEXPECTED_TOKEN.into()
            }
        );
    }

    #[test]
    fn test_bare_token_expiry_document() {
        let body = r#"{"Type":null,"Title":"Unauthorized","Status":401,"Detail":"TokenExpired: token expired at 05/06/2024 10:00:00"}"#;
        assert_eq!(
            run(401, body),
            Err(ApiError::TokenExpired {
                message: "TokenExpired: token expired at 05/06/2024 10:00:00".into()
            })
        );
    }

    #[test]
    fn test_rate_limit_problem_has_no_header_fields() {
        let err = run(
            401,
            "oauth_problem=rate limit exceeded&oauth_problem_advice=please wait before retrying the xero api\n",
        )
        .unwrap_err();

        assert_eq!(
            err,
            ApiError::RateLimitExceeded {
                message: "please wait before retrying the xero api\n".into(),
                retry_after: None,
                daily_limit_remaining: None,
            }
        );

        let err = run(503, "oauth_problem=rate limit exceeded").unwrap_err();
        assert_eq!(err.message(), RATE_LIMIT_ADVICE);
    }

    #[test]
    fn test_nonce_used_embeds_nonce() {
        let err = run(
            401,
            r#"oauth_problem=nonce_used&oauth_problem_advice=The nonce value "potatocakes" has already been used"#,
        )
        .unwrap_err();

        assert_eq!(
            err,
            ApiError::NonceUsed {
                nonce: Some("potatocakes".into()),
                message: "The nonce value \"potatocakes\" has already been used ".into(),
            }
        );
    }

    #[test]
    fn test_nonce_used_without_quoted_nonce_keeps_advice() {
        let err =
            run(401, "oauth_problem=nonce_used&oauth_problem_advice=nonce reused").unwrap_err();
        assert_eq!(
            err,
            ApiError::NonceUsed {
                nonce: None,
                message: "nonce reused".into(),
            }
        );
    }

    #[test]
    fn test_nonce_used_without_advice_has_message() {
        assert_eq!(
            run(503, "oauth_problem=nonce_used"),
            Err(ApiError::NonceUsed {
                nonce: None,
                message: NONCE_USED.into(),
            })
        );
    }

    #[test]
    fn test_unknown_oauth_problem_round_trips() {
        for problem in ["unknown error", "signature_invalid", "parameter_absent"] {
            let body = format!("oauth_problem_advice=unknown advice&oauth_problem={problem}");
            let err = run(401, &body).unwrap_err();

            assert_eq!(err.message(), format!("{problem}:unknown advice"));
            assert_eq!(
                err,
                ApiError::UnknownOAuthError {
                    problem: problem.into(),
                    advice: "unknown advice".into(),
                }
            );
        }
    }

    #[test]
    fn test_not_found_body_signatures() {
        let endpoint = "https://api.xero.com/api.xro/2.0/Items";

        let invoice = b"<ApiException><Message>Invoice not found</Message></ApiException>";
        let err = classify(404, &HeaderMap::new(), invoice, endpoint).unwrap_err();
        assert_eq!(err.message(), "Invoice not found in Xero.");

        let credit_note = b"<ApiException><Message>CreditNote not found</Message></ApiException>";
        let err = classify(404, &HeaderMap::new(), credit_note, endpoint).unwrap_err();
        assert_eq!(err.message(), "Credit Note not found in Xero.");

        assert_eq!(
            classify(404, &HeaderMap::new(), b"body", "https://api.example/Foo"),
            Err(ApiError::ObjectNotFound {
                endpoint: "https://api.example/Foo".into()
            })
        );
    }

    #[test]
    fn test_not_found_endpoint_signatures() {
        assert_eq!(
            classify(404, &HeaderMap::new(), b"body", "https://api.xero.com/Invoices"),
            Err(ApiError::EntityNotFound {
                entity: "Invoice".into()
            })
        );
        assert_eq!(
            run(404, "body").unwrap_err().message(),
            "Invoice not found in Xero."
        );

        let err = classify(
            404,
            &HeaderMap::new(),
            b"body",
            "https://api.xero.com/api.xro/2.0/CreditNotes/7f3b?page=2",
        )
        .unwrap_err();
        assert_eq!(err.message(), "Credit Note not found in Xero.");
    }

    #[test]
    fn test_not_found_endpoint_matches_whole_segments() {
        for endpoint in [
            "https://api.xero.com/api.xro/2.0/RepeatingInvoices",
            "https://api.xero.com/api.xro/2.0/Items?where=Invoices",
        ] {
            assert_eq!(
                classify(404, &HeaderMap::new(), b"body", endpoint),
                Err(ApiError::ObjectNotFound {
                    endpoint: endpoint.into()
                })
            );
        }
    }

    #[test]
    fn test_custom_not_found_signature() {
        let contacts = "https://api.xero.com/api.xro/2.0/Contacts";
        let classifier = ResponseClassifier::new(
            NotFoundRegistry::default()
                .register(NotFoundSignature::new("Contact not found", "Contact")),
        );

        let err = classifier
            .classify(404, &HeaderMap::new(), b"Contact not found", contacts)
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::EntityNotFound {
                entity: "Contact".into()
            }
        );

        let empty = ResponseClassifier::new(NotFoundRegistry::empty());
        let err = empty
            .classify(404, &HeaderMap::new(), b"Invoice not found", ENDPOINT)
            .unwrap_err();
        assert_eq!(err.message(), format!("Couldn't find object for API Endpoint {ENDPOINT}"));
    }

    #[test]
    fn test_429_reads_headers() {
        let err = classify(
            429,
            &headers(&[("retry-after", "42"), ("x-daylimit-remaining", "328")]),
            b"",
            ENDPOINT,
        )
        .unwrap_err();

        let message = err.message().to_lowercase();
        assert!(message.contains("rate limit exceeded"));
        assert!(message.contains("328 requests left for the day"));
        assert!(message.contains("42 seconds until you can make another request"));

        match err {
            ApiError::RateLimitExceeded {
                retry_after,
                daily_limit_remaining,
                ..
            } => {
                assert_eq!(retry_after, Some(42));
                assert_eq!(daily_limit_remaining, Some(328));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_429_missing_headers_default_to_zero() {
        let err = classify(429, &headers(&[("retry-after", "soon")]), b"", ENDPOINT).unwrap_err();
        assert_eq!(
            err,
            ApiError::RateLimitExceeded {
                message: "Rate limit exceeded: 0 requests left for the day, 0 seconds until you can make another request".into(),
                retry_after: Some(0),
                daily_limit_remaining: Some(0),
            }
        );
    }

    #[test]
    fn test_other_status_is_bad_response() {
        let err = run(418, "oauth_problem=token_expired").unwrap_err();
        assert_eq!(err.message(), "Unknown response code: 418");

        for status in [100, 302, 403, 500, 502] {
            assert_eq!(run(status, ""), Err(ApiError::BadResponse { status }));
        }
    }

    #[test]
    fn test_classification_is_idempotent() {
        let map = headers(&[("retry-after", "7")]);
        let cases: [(u16, &str); 5] = [
            (200, "ok"),
            (400, "<ApiException/>"),
            (401, "oauth_problem=nonce_used&oauth_problem_advice=\"abc\""),
            (404, "missing"),
            (429, ""),
        ];

        for (status, body) in cases {
            let first = classify(status, &map, body.as_bytes(), ENDPOINT);
            let second = classify(status, &map, body.as_bytes(), ENDPOINT);
            assert_eq!(first, second);
        }
    }
}
