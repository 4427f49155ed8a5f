//! Provider client boundary: request/response types, envelope validation,
//! rate limiting and the concrete clients.

pub mod client;
pub mod coinglass;
pub mod envelope;
pub mod fixture;
pub mod http;
pub mod public;
pub mod rate_limiter;
pub mod routed;

pub use client::{FetchError, FetchRequest, ProviderBody, ProviderClient};
pub use coinglass::{ClientSettings, CoinGlassClient, DEFAULT_BASE_URL};
pub use envelope::Envelope;
pub use fixture::FixtureProvider;
pub use http::RetryPolicy;
pub use public::{is_native_path, PublicMarketClient};
pub use rate_limiter::RateLimiter;
pub use routed::RoutedClient;
