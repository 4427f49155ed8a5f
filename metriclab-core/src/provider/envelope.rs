//! Provider response envelope and dual success validation.
//!
//! Every v4 response is `{"code": ..., "msg": ..., "data": ...}`. A fetch is
//! a success only when the transport status is 2xx AND the body code means
//! "ok". Anything else becomes a typed [`FetchError`].

use serde::Serialize;
use serde_json::Value;

use super::client::FetchError;

/// Body codes the provider uses for success.
pub const SUCCESS_CODES: &[&str] = &["0", "00", "success"];

/// Body codes that mean the key's plan does not cover the endpoint.
pub const PLAN_RESTRICTED_CODES: &[&str] = &["403"];

/// Message fragments (lower-cased) that mark a plan/tier rejection when the
/// code alone does not.
pub const PLAN_MARKERS: &[&str] = &["upgrade", "higher plan"];

/// A validated provider body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub code: String,
    pub msg: String,
    pub data: Value,
}

impl Envelope {
    /// Successful envelope around `data`.
    pub fn ok(data: Value) -> Self {
        Self {
            code: "0".to_string(),
            msg: "ok".to_string(),
            data,
        }
    }

    pub fn is_success(&self) -> bool {
        SUCCESS_CODES.contains(&self.code.as_str())
    }

    pub fn is_plan_restricted(&self) -> bool {
        if PLAN_RESTRICTED_CODES.contains(&self.code.as_str()) {
            return true;
        }
        let msg = self.msg.to_ascii_lowercase();
        PLAN_MARKERS.iter().any(|m| msg.contains(m))
    }

    /// Parse the envelope fields out of a JSON body.
    ///
    /// `code` may be a string or an integer. `msg` and `data` are optional.
    pub fn parse(body: Value) -> Result<Self, FetchError> {
        let Value::Object(mut map) = body else {
            return Err(FetchError::Malformed("body is not a JSON object".into()));
        };

        let code = match map.remove("code") {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(FetchError::Malformed(format!(
                    "unexpected code type: {other}"
                )))
            }
            None => return Err(FetchError::Malformed("missing code field".into())),
        };

        let msg = match map.remove("msg") {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let data = map.remove("data").unwrap_or(Value::Null);

        Ok(Self { code, msg, data })
    }
}

/// Apply dual validation to a transport status and a decoded body.
///
/// A plan rejection is recognised from the body code, or failing that the
/// message, even when the transport status is an error, so a 4xx tier
/// rejection still yields `PlanRestricted` rather than a generic transport
/// failure.
pub fn validate(status: u16, body: Value) -> Result<Envelope, FetchError> {
    let transport_ok = (200..300).contains(&status);
    let parsed = Envelope::parse(body);

    match parsed {
        Ok(envelope) if transport_ok && envelope.is_success() => Ok(envelope),
        Ok(envelope) if envelope.is_plan_restricted() => Err(FetchError::PlanRestricted {
            code: envelope.code,
            msg: envelope.msg,
        }),
        Ok(envelope) if transport_ok => Err(FetchError::Rejected {
            code: envelope.code,
            msg: envelope.msg,
        }),
        Ok(_) => Err(FetchError::Transport { status }),
        Err(e) if transport_ok => Err(e),
        Err(_) => Err(FetchError::Transport { status }),
    }
}
