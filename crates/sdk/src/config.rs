use std::sync::Arc;

use dimp_utils::{constants::APP_CONFIG_KEY, AppConfig};

use crate::cache::{read_json, write_json, KeyValueCache};

/// Loads the [`AppConfig`] shared through the cache.
#[derive(Clone)]
pub struct ConfigLoader {
    cache: Arc<dyn KeyValueCache>,
}

impl ConfigLoader {
    /// Create a loader over `cache`.
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self { cache }
    }

    /// Load the current config.
    ///
    /// Seeds the cache with [`AppConfig::default`] when the entry is absent
    /// or cannot be parsed.
    pub async fn load(&self) -> crate::Result<AppConfig> {
        if let Some(config) = read_json::<AppConfig>(self.cache.as_ref(), APP_CONFIG_KEY).await? {
            return Ok(config);
        }
        let config = AppConfig::default();
        tracing::info!("seeding the default app config");
        self.store(&config).await?;
        Ok(config)
    }

    /// Replace the shared config.
    pub async fn store(&self, config: &AppConfig) -> crate::Result<()> {
        if config.dimp_usd_rate <= dimp_utils::Decimal::ZERO {
            return Err(crate::Error::Config(format!(
                "`dimp_usd_rate` must be positive, got {}",
                config.dimp_usd_rate
            )));
        }
        write_json(self.cache.as_ref(), APP_CONFIG_KEY, config, None).await
    }

    /// Overwrite the shared config with the defaults.
    pub async fn reset(&self) -> crate::Result<AppConfig> {
        let config = AppConfig::default();
        self.store(&config).await?;
        Ok(config)
    }
}
