use serde::Deserialize;

use crate::error::ConfigError;
use crate::utils::constants::DEFAULT_SERVICE_PORT;

/// ================================
/// Service endpoints (upstream, token service, gateway)
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct HttpServiceConfig {
    pub endpoint: EndpointConfig,
    /// call timeout in milliseconds, used for forwarded exchanges
    pub timeout: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EndpointConfig {
    #[serde(default)]
    pub service_source: ServiceSource,
    pub service_name: String,
    #[serde(default = "default_service_port")]
    pub service_port: u16,
    pub namespace: Option<String>,
    pub domain: Option<String>,
    #[serde(default)]
    pub protocol: Protocol,
}

/// How a logical service name turns into a reachable host.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceSource {
    K8s,
    Nacos,
    Ip,
    Dns,
    Fqdn,
    /// `service_name` is used as the host verbatim
    #[default]
    Static,
}

impl ServiceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceSource::K8s => "k8s",
            ServiceSource::Nacos => "nacos",
            ServiceSource::Ip => "ip",
            ServiceSource::Dns => "dns",
            ServiceSource::Fqdn => "fqdn",
            ServiceSource::Static => "static",
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl EndpointConfig {
    /// Host name the endpoint resolves to, without port.
    pub fn host(&self) -> Result<String, ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::EmptyServiceName);
        }
        let name = &self.service_name;
        match self.service_source {
            ServiceSource::K8s => {
                let namespace = self.required_namespace()?;
                Ok(format!("{}.{}.svc.cluster.local", name, namespace))
            }
            ServiceSource::Nacos => {
                let namespace = self.required_namespace()?;
                Ok(format!("{}.{}.nacos", name, namespace))
            }
            ServiceSource::Dns => self
                .domain
                .as_ref()
                .filter(|domain| !domain.is_empty())
                .cloned()
                .ok_or_else(|| ConfigError::MissingDomain { service: name.to_owned() }),
            ServiceSource::Ip | ServiceSource::Fqdn | ServiceSource::Static => Ok(name.to_owned()),
        }
    }

    /// `scheme://host:port` without a trailing slash.
    pub fn base_url(&self) -> Result<String, ConfigError> {
        let scheme = match self.protocol {
            Protocol::Http => "http",
            Protocol::Https => "https",
        };
        Ok(format!("{}://{}:{}", scheme, self.host()?, self.service_port))
    }

    fn required_namespace(&self) -> Result<&str, ConfigError> {
        self.namespace
            .as_deref()
            .filter(|namespace| !namespace.is_empty())
            .ok_or_else(|| ConfigError::MissingNamespace {
                service: self.service_name.to_owned(),
                source_kind: self.service_source.as_str(),
            })
    }
}

fn default_service_port() -> u16 {
    DEFAULT_SERVICE_PORT
}
