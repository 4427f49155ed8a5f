//! Exchange-list policy: named venue sets referenced by metric definitions.
//!
//! Multi-venue metrics never carry a literal venue list. They reference a
//! set by id, and the set is rendered as one comma-joined string in declared
//! order. Editing a set here changes every metric that references it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ConfigError;

/// Venues aggregated by the daily liquidation metrics.
pub const DAILY_VENUES: &[&str] = &["Binance", "OKX", "Bybit"];

/// Venues aggregated by the weekly liquidation and volume metrics.
pub const WEEKLY_VENUES: &[&str] = &["Binance", "OKX", "Bybit", "Bitget", "Gate"];

/// Identifier of a named venue set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeSetId {
    Daily,
    Weekly,
}

impl ExchangeSetId {
    pub const ALL: [ExchangeSetId; 2] = [ExchangeSetId::Daily, ExchangeSetId::Weekly];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeSetId::Daily => "daily",
            ExchangeSetId::Weekly => "weekly",
        }
    }

    /// Member venues in declared order.
    pub fn venues(&self) -> &'static [&'static str] {
        match self {
            ExchangeSetId::Daily => DAILY_VENUES,
            ExchangeSetId::Weekly => WEEKLY_VENUES,
        }
    }

    /// Render for the request parameter named `param`.
    pub fn render(&self, param: &str) -> Result<String, ConfigError> {
        render_venues(param, self.venues())
    }
}

impl fmt::Display for ExchangeSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join venues with `,` after checking each element.
///
/// Rejects an empty set, empty elements, any whitespace inside an element,
/// and duplicates (compared case-insensitively).
pub fn render_venues(param: &str, venues: &[&str]) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidExchangeList {
        param: param.to_string(),
        reason,
    };

    if venues.is_empty() {
        return Err(invalid("empty venue set".into()));
    }

    let mut seen: Vec<String> = Vec::with_capacity(venues.len());
    for venue in venues {
        if venue.is_empty() {
            return Err(invalid("empty element".into()));
        }
        if venue.chars().any(char::is_whitespace) {
            return Err(invalid(format!("whitespace in element '{venue}'")));
        }
        if venue.contains(',') {
            return Err(invalid(format!("separator inside element '{venue}'")));
        }
        let key = venue.to_ascii_lowercase();
        if seen.contains(&key) {
            return Err(invalid(format!("duplicate element '{venue}'")));
        }
        seen.push(key);
    }

    Ok(venues.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_set_renders_in_declared_order() {
        assert_eq!(
            ExchangeSetId::Daily.render("exchange_list").unwrap(),
            "Binance,OKX,Bybit"
        );
    }

    #[test]
    fn weekly_set_renders_five_venues() {
        let s = ExchangeSetId::Weekly.render("exchange_list").unwrap();
        assert_eq!(s, "Binance,OKX,Bybit,Bitget,Gate");
        assert!(!s.contains(' '));
    }

    #[test]
    fn whitespace_element_rejected() {
        let err = render_venues("exchange_list", &["Binance", " OKX"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidExchangeList { .. }));
    }

    #[test]
    fn duplicate_rejected_case_insensitively() {
        assert!(render_venues("exchange_list", &["Binance", "binance"]).is_err());
    }

    #[test]
    fn empty_set_and_empty_element_rejected() {
        assert!(render_venues("exchange_list", &[]).is_err());
        assert!(render_venues("exchange_list", &["Binance", ""]).is_err());
    }

    #[test]
    fn built_in_sets_are_valid() {
        for id in ExchangeSetId::ALL {
            assert!(id.render("exchange_list").is_ok(), "{id} should render");
        }
    }
}
