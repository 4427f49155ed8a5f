//! Parameter normalizer: turns declared endpoint parameters into the exact
//! query sent to the provider.
//!
//! Only declared names are emitted, in declaration order. Venue sets are
//! rendered from the exchange-list policy. Nothing here performs I/O.

use crate::domain::{Endpoint, MetricDefinition, ParamValue, RequestSource};
use crate::error::ConfigError;
use crate::provider::FetchRequest;

/// Interval tokens the provider accepts.
pub const VALID_INTERVALS: &[&str] = &[
    "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "24h", "1d", "7d", "30d",
];

/// Rendered request parameters in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RequestParams {
    pairs: Vec<(String, String)>,
}

impl RequestParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// `k=v&k=v` in declaration order. Values are already whitespace-free
    /// and alphanumeric apart from `,`, so no escaping is needed beyond that.
    pub fn as_query(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{k}={}", v.replace(',', "%2C")))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn push(&mut self, name: &str, value: String) {
        self.pairs.push((name.to_string(), value));
    }
}

/// Validate and render one endpoint's parameters.
pub fn normalize_params(endpoint: &Endpoint) -> Result<RequestParams, ConfigError> {
    let mut out = RequestParams::default();

    for (name, value) in &endpoint.params {
        if out.get(name).is_some() {
            return Err(ConfigError::InvalidParam {
                name: name.clone(),
                reason: "declared more than once".into(),
            });
        }
        let rendered = render_param(name, value)?;
        out.push(name, rendered);
    }

    Ok(out)
}

/// Build every request a metric needs: one for a single endpoint, one per
/// step for a plan, none for a metric without a source.
pub fn build_requests(def: &MetricDefinition) -> Result<Vec<FetchRequest>, ConfigError> {
    match &def.source {
        RequestSource::Endpoint(endpoint) => Ok(vec![FetchRequest::new(
            None,
            endpoint,
            normalize_params(endpoint)?,
        )]),
        RequestSource::Plan(steps) => steps
            .iter()
            .map(|step| {
                let params = normalize_params(&step.endpoint)?;
                Ok(FetchRequest::new(Some(step.key.clone()), &step.endpoint, params))
            })
            .collect(),
        RequestSource::None => Ok(Vec::new()),
    }
}

fn render_param(name: &str, value: &ParamValue) -> Result<String, ConfigError> {
    match value {
        ParamValue::Exchanges(set) => set.render(name),
        ParamValue::Int(v) => {
            if name == "limit" && *v <= 0 {
                return Err(ConfigError::InvalidLimit(v.to_string()));
            }
            Ok(v.to_string())
        }
        ParamValue::Text(text) => render_text(name, text),
    }
}

fn render_text(name: &str, text: &str) -> Result<String, ConfigError> {
    if text.is_empty() {
        return Err(ConfigError::InvalidParam {
            name: name.to_string(),
            reason: "empty value".into(),
        });
    }
    if text.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidParam {
            name: name.to_string(),
            reason: format!("whitespace in '{text}'"),
        });
    }

    match name {
        // Literal venue lists bypass the named-set policy.
        "exchange_list" => Err(ConfigError::InvalidExchangeList {
            param: name.to_string(),
            reason: "literal list; reference a named exchange set".into(),
        }),
        "interval" => {
            if VALID_INTERVALS.contains(&text) {
                Ok(text.to_string())
            } else {
                Err(ConfigError::InvalidInterval(text.to_string()))
            }
        }
        "limit" => match text.parse::<i64>() {
            Ok(v) if v > 0 => Ok(v.to_string()),
            _ => Err(ConfigError::InvalidLimit(text.to_string())),
        },
        "symbol" => {
            if text.chars().all(|c| c.is_ascii_alphanumeric()) {
                Ok(text.to_ascii_uppercase())
            } else {
                Err(ConfigError::InvalidParam {
                    name: name.to_string(),
                    reason: format!("symbol '{text}' must be alphanumeric"),
                })
            }
        }
        _ => Ok(text.to_string()),
    }
}
