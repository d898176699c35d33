use crate::{
    LogFormat,
    LogLevel,
};

/// Values given on the command line. They take precedence over the config
/// file and the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub log_level: Option<LogLevel>,
    pub log_format: Option<LogFormat>,
    pub listen_address: Option<String>,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Overrides {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(level) = &self.log_level {
                cache.insert("server.log_level".to_string(), level.to_string().into());
            }
            if let Some(format) = &self.log_format {
                cache.insert("server.log_format".to_string(), format.to_string().into());
            }
            if let Some(address) = &self.listen_address {
                cache.insert("server.listen_address".to_string(), address.clone().into());
            }
            Ok(cache)
        }
    }
}
