use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::settings::Settings;

use super::adapter::GatewayAdapter;
use super::error::GatewayResult;
use super::providers::{PayuAdapter, PayuConfig, PhonepeAdapter, PhonepeConfig};
use super::types::{GatewayName, RedirectUrls};

/// Outbound gateway calls must give up within this bound so a hung
/// provider cannot stall an intake request indefinitely.
pub const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_GATEWAY_RETRIES: u32 = 1;

/// Builds adapters from current settings. A trait so tests can count and
/// stub gateway construction without touching the network.
pub trait AdapterFactory: Send + Sync {
    fn selected(&self, settings: &Settings) -> GatewayName;
    fn adapter(
        &self,
        settings: &Settings,
        name: GatewayName,
    ) -> GatewayResult<Box<dyn GatewayAdapter>>;
}

pub struct GatewayFactory {
    /// Overrides the settings-provided site origin when present.
    site_origin: Option<String>,
    timeout: Duration,
    max_retries: u32,
}

impl GatewayFactory {
    pub fn new(site_origin: Option<String>) -> Self {
        Self {
            site_origin,
            timeout: Duration::from_secs(DEFAULT_GATEWAY_TIMEOUT_SECS),
            max_retries: DEFAULT_GATEWAY_RETRIES,
        }
    }

    fn redirect_urls(&self, settings: &Settings) -> RedirectUrls {
        let origin = self
            .site_origin
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(settings.site_url.as_str());
        RedirectUrls::from_origin(origin)
    }
}

impl AdapterFactory for GatewayFactory {
    fn selected(&self, settings: &Settings) -> GatewayName {
        GatewayName::from_str(&settings.payment_gateway).unwrap_or_else(|_| {
            warn!(
                configured = %settings.payment_gateway,
                "unknown payment gateway in settings, falling back to phonepe"
            );
            GatewayName::Phonepe
        })
    }

    fn adapter(
        &self,
        settings: &Settings,
        name: GatewayName,
    ) -> GatewayResult<Box<dyn GatewayAdapter>> {
        let redirect = self.redirect_urls(settings);
        match name {
            GatewayName::Phonepe => {
                let config = PhonepeConfig::from_settings(settings, redirect);
                Ok(Box::new(PhonepeAdapter::new(
                    config,
                    self.timeout,
                    self.max_retries,
                )?))
            }
            GatewayName::Payu => {
                let config = PayuConfig::from_settings(settings, redirect);
                Ok(Box::new(PayuAdapter::new(
                    config,
                    self.timeout,
                    self.max_retries,
                )?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_gateway_falls_back_to_phonepe() {
        let factory = GatewayFactory::new(None);
        let settings = Settings {
            payment_gateway: "braintree".to_string(),
            ..Settings::default()
        };
        assert_eq!(factory.selected(&settings), GatewayName::Phonepe);
    }

    #[test]
    fn explicit_origin_overrides_settings() {
        let factory = GatewayFactory::new(Some("https://override.example".to_string()));
        let settings = Settings {
            site_url: "https://settings.example".to_string(),
            ..Settings::default()
        };
        let urls = factory.redirect_urls(&settings);
        assert_eq!(urls.success, "https://override.example/payment/success");
    }

    #[test]
    fn settings_origin_used_when_no_override() {
        let factory = GatewayFactory::new(None);
        let settings = Settings {
            site_url: "https://settings.example".to_string(),
            ..Settings::default()
        };
        let urls = factory.redirect_urls(&settings);
        assert_eq!(urls.failure, "https://settings.example/payment/failure");
    }
}
