//! Full data-mode client: the keyed provider for provider paths, the public
//! exchange client for exchange-native paths.

use super::client::{FetchError, FetchRequest, ProviderClient};
use super::envelope::Envelope;
use super::public::is_native_path;

const LOG_TARGET: &str = "metriclab::provider";

pub struct RoutedClient {
    primary: Box<dyn ProviderClient>,
    exchange: Box<dyn ProviderClient>,
    name: String,
}

impl RoutedClient {
    pub fn new(primary: Box<dyn ProviderClient>, exchange: Box<dyn ProviderClient>) -> Self {
        let name = format!("{}+{}", primary.name(), exchange.name());
        Self {
            primary,
            exchange,
            name,
        }
    }

    fn route(&self, path: &str) -> &dyn ProviderClient {
        if is_native_path(path) {
            self.exchange.as_ref()
        } else {
            self.primary.as_ref()
        }
    }
}

impl ProviderClient for RoutedClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, request: &FetchRequest) -> Result<Envelope, FetchError> {
        let client = self.route(&request.path);
        log::debug!(target: LOG_TARGET, "{} via {}", request.path, client.name());
        client.fetch(request)
    }

    fn supports(&self, path: &str) -> bool {
        self.route(path).supports(path)
    }
}
