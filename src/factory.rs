use crate::config::Config;
use crate::provider::ChatBackend;
use crate::{Error, GonkaGateProvider};
use std::sync::Arc;

/// Builds a backend for validated configuration.
///
/// Commands and the chat server receive a connector rather than a backend,
/// since the configuration (and with it the model) is only known per run
/// or per request.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, config: &Config) -> Result<Arc<dyn ChatBackend>, Error>;
}

impl<F> Connector for F
where
    F: Fn(&Config) -> Result<Arc<dyn ChatBackend>, Error> + Send + Sync + 'static,
{
    fn connect(&self, config: &Config) -> Result<Arc<dyn ChatBackend>, Error> {
        self(config)
    }
}

/// Connects to GonkaGate at the configured base URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConnector;

impl Connector for DefaultConnector {
    fn connect(&self, config: &Config) -> Result<Arc<dyn ChatBackend>, Error> {
        Ok(Arc::new(GonkaGateProvider::from_config(config)?))
    }
}

/// Connects every configuration to a fixed base URL, keeping the
/// configured API key. Points the whole pipeline at a local server.
#[derive(Debug, Clone)]
pub struct FixedUrlConnector {
    base_url: String,
}

impl FixedUrlConnector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Connector for FixedUrlConnector {
    fn connect(&self, config: &Config) -> Result<Arc<dyn ChatBackend>, Error> {
        Ok(Arc::new(GonkaGateProvider::new_with_base_url(
            config.api_key(),
            self.base_url.clone(),
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve_configuration, API_KEY_VAR, MODEL_VAR};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> Config {
        let env: HashMap<&str, &str> = [(API_KEY_VAR, "k"), (MODEL_VAR, "m")].into_iter().collect();
        resolve_configuration(&env).unwrap()
    }

    #[test]
    fn test_default_connector() {
        assert!(DefaultConnector.connect(&config()).is_ok());
        assert!(FixedUrlConnector::new("http://127.0.0.1:1/v1")
            .connect(&config())
            .is_ok());
    }

    #[test]
    fn test_closure_connector() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let connector = move |config: &Config| -> Result<Arc<dyn ChatBackend>, Error> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(GonkaGateProvider::from_config(config)?))
        };

        connector.connect(&config()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
