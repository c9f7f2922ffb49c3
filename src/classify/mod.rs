//! Maps raw upstream failures to a rate-limit verdict and to the Korean
//! message shown to users. Both are pure functions of the message text
//! (plus, for rate limits, the extracted status code).

use crate::provider::UpstreamError;

pub const RATE_LIMIT_STATUS: u16 = 429;

const RATE_LIMIT_MARKERS: &[&str] = &["429", "resource exhausted", "rate", "quota"];

/// User-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Quota,
    InvalidApiKey,
    Permission,
    ModelUnavailable,
    Network,
    Generic,
}

impl FailureCategory {
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureCategory::Quota => {
                "Gemini API 호출 한도(Quota/Rate limit)에 걸렸습니다. 잠시 후 다시 시도하거나 플랜/쿼터를 확인해주세요."
            }
            FailureCategory::InvalidApiKey => {
                "Gemini API 키가 유효하지 않습니다. 서버 환경변수 GEMINI_API_KEY를 다시 확인해주세요."
            }
            FailureCategory::Permission => {
                "Gemini API 권한 오류가 발생했습니다. API 키 권한/결제/프로젝트 설정을 확인해주세요."
            }
            FailureCategory::ModelUnavailable => {
                "Gemini 모델 호출에 실패했습니다(모델/리전/권한). 잠시 후 다시 시도하거나 설정을 확인해주세요."
            }
            FailureCategory::Network => {
                "외부 AI 서버 통신에 실패했습니다(네트워크/타임아웃). 잠시 후 다시 시도해주세요."
            }
            FailureCategory::Generic => "사주 분석 요청 중 오류가 발생했습니다.",
        }
    }
}

fn contains_any(m: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| m.contains(n))
}

fn is_quota(m: &str) -> bool {
    contains_any(m, RATE_LIMIT_MARKERS)
}

fn is_invalid_key(m: &str) -> bool {
    m.contains("api key") && contains_any(m, &["invalid", "not valid"])
}

fn is_permission(m: &str) -> bool {
    contains_any(m, &["permission", "unauthorized", "forbidden", "403"])
}

fn is_model_unavailable(m: &str) -> bool {
    contains_any(m, &["not found", "404", "model"])
}

fn is_network(m: &str) -> bool {
    contains_any(m, &["fetch failed", "enotfound", "econn", "timeout"])
}

/// Checked top to bottom against the lower-cased message; first match wins.
const RULES: &[(fn(&str) -> bool, FailureCategory)] = &[
    (is_quota, FailureCategory::Quota),
    (is_invalid_key, FailureCategory::InvalidApiKey),
    (is_permission, FailureCategory::Permission),
    (is_model_unavailable, FailureCategory::ModelUnavailable),
    (is_network, FailureCategory::Network),
];

pub fn categorize(message: &str) -> FailureCategory {
    let m = message.to_lowercase();
    RULES
        .iter()
        .find(|(matches, _)| matches(&m))
        .map(|(_, category)| *category)
        .unwrap_or(FailureCategory::Generic)
}

pub fn user_friendly_message(message: &str) -> &'static str {
    categorize(message).user_message()
}

/// Numeric status carried by the error: the HTTP status first, then the
/// upstream body's `error.code` when it is all digits.
pub fn extract_status(err: &UpstreamError) -> Option<u16> {
    err.http_status.or_else(|| {
        err.error_code
            .as_deref()
            .filter(|c| !c.is_empty() && c.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|c| c.parse().ok())
    })
}

pub fn is_rate_limited(status: Option<u16>, message: &str) -> bool {
    status == Some(RATE_LIMIT_STATUS) || is_quota(&message.to_lowercase())
}

pub fn is_rate_limit_error(err: &UpstreamError) -> bool {
    is_rate_limited(extract_status(err), &err.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_by_status_or_message() {
        assert!(is_rate_limited(Some(429), "anything"));
        assert!(is_rate_limited(None, "QUOTA exceeded"));
        assert!(is_rate_limited(None, "Resource Exhausted"));
        assert!(is_rate_limited(None, "HTTP 429"));
        assert!(is_rate_limited(None, "rate limited"));
        assert!(!is_rate_limited(Some(500), "model not found"));
        assert!(!is_rate_limited(None, "permission denied"));
    }

    #[test]
    fn test_extract_status_prefers_http_status() {
        let mut err = UpstreamError::new("boom").with_status(503);
        err.error_code = Some("429".to_string());
        assert_eq!(extract_status(&err), Some(503));

        err.http_status = None;
        assert_eq!(extract_status(&err), Some(429));

        err.error_code = Some("RESOURCE_EXHAUSTED".to_string());
        assert_eq!(extract_status(&err), None);
    }

    #[test]
    fn test_error_code_alone_triggers_rate_limit() {
        let err = UpstreamError {
            http_status: None,
            error_code: Some("429".to_string()),
            message: "slow down".to_string(),
        };
        assert!(is_rate_limit_error(&err));
    }

    #[test]
    fn test_categories() {
        assert_eq!(categorize("Quota exceeded"), FailureCategory::Quota);
        assert_eq!(categorize("API key not valid. Please pass a valid API key."), FailureCategory::InvalidApiKey);
        assert_eq!(categorize("Invalid API key"), FailureCategory::InvalidApiKey);
        assert_eq!(categorize("[403 Forbidden] denied"), FailureCategory::Permission);
        assert_eq!(categorize("Unauthorized"), FailureCategory::Permission);
        assert_eq!(categorize("model not found"), FailureCategory::ModelUnavailable);
        assert_eq!(categorize("HTTP 404"), FailureCategory::ModelUnavailable);
        assert_eq!(categorize("fetch failed: dns error"), FailureCategory::Network);
        assert_eq!(categorize("connect ECONNREFUSED"), FailureCategory::Network);
        assert_eq!(categorize("Timeout while waiting"), FailureCategory::Network);
        assert_eq!(categorize("something odd"), FailureCategory::Generic);
    }

    #[test]
    fn test_first_match_wins() {
        // quota beats permission
        assert_eq!(categorize("403 quota"), FailureCategory::Quota);
        // key beats model
        assert_eq!(categorize("invalid api key for model x"), FailureCategory::InvalidApiKey);
        // permission beats not found
        assert_eq!(categorize("permission denied or not found"), FailureCategory::Permission);
        // model beats timeout
        assert_eq!(categorize("model timeout"), FailureCategory::ModelUnavailable);
        // "api key" without "invalid" falls through
        assert_eq!(categorize("api key missing"), FailureCategory::Generic);
    }

    #[test]
    fn test_user_friendly_message() {
        assert_eq!(user_friendly_message("model not found"), FailureCategory::ModelUnavailable.user_message());
        assert_eq!(user_friendly_message(""), "사주 분석 요청 중 오류가 발생했습니다.");
    }
}
