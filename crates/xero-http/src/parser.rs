//! Body parsers for the shapes of error payload Xero returns.
//!
//! Each parser answers "is this my format, and if so what does it say".
//! None of them fail on malformed input; a body they cannot read is
//! simply `None`.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use url::form_urlencoded;

/// A legacy OAuth 1.0a problem report, `oauth_problem=...&oauth_problem_advice=...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProblemReport {
    pub problem: String,
    pub advice: String,
}

impl OAuthProblemReport {
    /// The problem code, mapped onto the values Xero documents.
    pub fn kind(&self) -> OAuthProblem {
        OAuthProblem::from(self.problem.as_str())
    }
}

/// Known `oauth_problem` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProblem {
    TokenExpired,
    TokenRejected,
    RateLimitExceeded,
    ConsumerKeyUnknown,
    NonceUsed,
    OrganisationOffline,
    Other,
}

impl From<&str> for OAuthProblem {
    fn from(value: &str) -> Self {
        match value {
            "token_expired" => OAuthProblem::TokenExpired,
            "token_rejected" => OAuthProblem::TokenRejected,
            "rate limit exceeded" => OAuthProblem::RateLimitExceeded,
            "consumer_key_unknown" => OAuthProblem::ConsumerKeyUnknown,
            "nonce_used" => OAuthProblem::NonceUsed,
            "organisation offline" => OAuthProblem::OrganisationOffline,
            _ => OAuthProblem::Other,
        }
    }
}

/// Descriptive text from an expired-token document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenExpiry {
    pub message: String,
}

/// Fields read from an XML fault document such as `<ApiException>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlFault {
    pub message: String,
    pub fault_type: String,
    pub validation_errors: Vec<String>,
}

/// RFC 7807 style document returned by the OAuth2 endpoints, e.g.
/// `{"Type":null,"Title":"Unauthorized","Status":401,"Detail":"TokenExpired: ..."}`.
#[derive(Debug, Deserialize)]
struct ProblemDocument {
    #[serde(alias = "Detail")]
    detail: Option<String>,
}

const TOKEN_EXPIRED_MARKER: &str = "tokenexpired";

/// Parse a URL-encoded OAuth problem report.
///
/// Succeeds only when an `oauth_problem` key is present. A missing
/// `oauth_problem_advice` yields empty advice.
pub fn parse_oauth_problem(body: &[u8]) -> Option<OAuthProblemReport> {
    let mut problem = None;
    let mut advice = None;

    for (key, value) in form_urlencoded::parse(body) {
        match key.as_ref() {
            "oauth_problem" if problem.is_none() => problem = Some(value.into_owned()),
            "oauth_problem_advice" if advice.is_none() => advice = Some(value.into_owned()),
            _ => {}
        }
    }

    Some(OAuthProblemReport {
        problem: problem?,
        advice: advice.unwrap_or_default(),
    })
}

/// Recognise a token-expired problem document and return its detail text.
pub fn parse_token_expiry(body: &[u8]) -> Option<TokenExpiry> {
    let document: ProblemDocument = serde_json::from_slice(body).ok()?;
    let detail = document.detail?;

    if detail.to_ascii_lowercase().contains(TOKEN_EXPIRED_MARKER) {
        Some(TokenExpiry { message: detail })
    } else {
        None
    }
}

/// Read the root `Message` and `Type` children of an XML fault document,
/// plus the text of every `ValidationError/Message`.
///
/// Returns `None` when the body is not a well-formed document with a root
/// element.
pub fn parse_xml_fault(body: &[u8]) -> Option<XmlFault> {
    let xml = strip_utf16_declaration(std::str::from_utf8(body).ok()?);
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut fault = XmlFault::default();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut has_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                let name = element.local_name().as_ref().to_vec();
                if path.is_empty() {
                    if has_root {
                        return None;
                    }
                    has_root = true;
                }
                if name == b"ValidationError" {
                    fault.validation_errors.push(String::new());
                }
                path.push(name);
            }
            Ok(Event::Empty(_)) if path.is_empty() => {
                if has_root {
                    return None;
                }
                has_root = true;
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(text)) => {
                // An unknown entity only loses this text node.
                if let Ok(text) = text.unescape() {
                    collect_text(&mut fault, &path, &text);
                }
            }
            Ok(Event::CData(data)) => {
                let text = String::from_utf8_lossy(&data);
                collect_text(&mut fault, &path, &text);
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            Ok(_) => {}
        }
    }

    if !has_root || !path.is_empty() {
        return None;
    }

    fault.validation_errors.retain(|message| !message.is_empty());
    Some(fault)
}

/// Xero labels some UTF-8 fault documents `encoding="utf-16"`; drop that
/// declaration so the body is read as the UTF-8 it actually is.
fn strip_utf16_declaration(xml: &str) -> &str {
    let trimmed = xml.trim_start();
    if let Some(rest) = trimmed.strip_prefix("<?xml") {
        if let Some(end) = rest.find("?>") {
            if rest[..end].to_ascii_lowercase().contains("utf-16") {
                return &rest[end + 2..];
            }
        }
    }
    xml
}

fn collect_text(fault: &mut XmlFault, path: &[Vec<u8>], text: &str) {
    match path {
        [_root, child] if child == b"Message" => fault.message.push_str(text),
        [_root, child] if child == b"Type" => fault.fault_type.push_str(text),
        [.., parent, child] if parent == b"ValidationError" && child == b"Message" => {
            if let Some(current) = fault.validation_errors.last_mut() {
                current.push_str(text);
            }
        }
        _ => {}
    }
}

/// Pull the quoted nonce out of advice such as
/// `The nonce value "potatocakes" has already been used`.
pub fn extract_nonce(advice: &str) -> Option<&str> {
    let start = advice.find('"')? + 1;
    let len = advice[start..].find('"')?;
    Some(&advice[start..start + len])
}
