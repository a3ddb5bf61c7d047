//! Web service descriptors
//!
//! A web service is announced by an overlay service that wants to be
//! reachable over HTTP. It names the service, its area, and the message
//! type accepted for each HTTP verb.

use crate::message::{JsonCodec, ListAggregator, MessageCodec, ResultAggregator};
use http::Method;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Address of an overlay service
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceEndpoint {
    pub service_name: String,
    pub service_area: u8,
}

impl ServiceEndpoint {
    pub fn new(service_name: impl Into<String>, service_area: u8) -> Self {
        Self {
            service_name: service_name.into(),
            service_area,
        }
    }

    /// HTTP path the endpoint is served on: `{prefix}{area}/{name}`
    pub fn pattern(&self, prefix: &str) -> String {
        format!("{prefix}{}/{}", self.service_area, self.service_name)
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service_area, self.service_name)
    }
}

/// A service exposed through the gateway
#[derive(Clone)]
pub struct WebService {
    endpoint: ServiceEndpoint,
    codecs: BTreeMap<String, Arc<dyn MessageCodec>>,
    aggregator: Arc<dyn ResultAggregator>,
}

impl WebService {
    pub fn builder(service_name: impl Into<String>, service_area: u8) -> WebServiceBuilder {
        WebServiceBuilder {
            endpoint: ServiceEndpoint::new(service_name, service_area),
            codecs: BTreeMap::new(),
            aggregator: None,
        }
    }

    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// Codec for the body of a request with this method
    pub fn codec(&self, method: &Method) -> Option<&Arc<dyn MessageCodec>> {
        self.codecs.get(method.as_str())
    }

    pub fn aggregator(&self) -> &Arc<dyn ResultAggregator> {
        &self.aggregator
    }

    /// Names of the message types this service accepts, one per verb
    pub fn message_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.codecs.values().map(|codec| codec.type_name())
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> + '_ {
        self.codecs.keys().map(String::as_str)
    }
}

impl fmt::Debug for WebService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebService")
            .field("endpoint", &self.endpoint)
            .field("methods", &self.codecs.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub struct WebServiceBuilder {
    endpoint: ServiceEndpoint,
    codecs: BTreeMap<String, Arc<dyn MessageCodec>>,
    aggregator: Option<Arc<dyn ResultAggregator>>,
}

impl WebServiceBuilder {
    /// Register a codec for an arbitrary method
    pub fn codec(mut self, method: Method, codec: Arc<dyn MessageCodec>) -> Self {
        self.codecs.insert(method.as_str().to_string(), codec);
        self
    }

    fn json<T>(self, method: Method) -> Self
    where
        T: DeserializeOwned + Serialize + Default + fmt::Debug + Send + Sync + 'static,
    {
        self.codec(method, Arc::new(JsonCodec::<T>::new()))
    }

    pub fn get<T>(self) -> Self
    where
        T: DeserializeOwned + Serialize + Default + fmt::Debug + Send + Sync + 'static,
    {
        self.json::<T>(Method::GET)
    }

    pub fn post<T>(self) -> Self
    where
        T: DeserializeOwned + Serialize + Default + fmt::Debug + Send + Sync + 'static,
    {
        self.json::<T>(Method::POST)
    }

    pub fn put<T>(self) -> Self
    where
        T: DeserializeOwned + Serialize + Default + fmt::Debug + Send + Sync + 'static,
    {
        self.json::<T>(Method::PUT)
    }

    pub fn patch<T>(self) -> Self
    where
        T: DeserializeOwned + Serialize + Default + fmt::Debug + Send + Sync + 'static,
    {
        self.json::<T>(Method::PATCH)
    }

    pub fn delete<T>(self) -> Self
    where
        T: DeserializeOwned + Serialize + Default + fmt::Debug + Send + Sync + 'static,
    {
        self.json::<T>(Method::DELETE)
    }

    pub fn aggregator(mut self, aggregator: Arc<dyn ResultAggregator>) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    pub fn build(self) -> WebService {
        WebService {
            endpoint: self.endpoint,
            codecs: self.codecs,
            aggregator: self
                .aggregator
                .unwrap_or_else(|| Arc::new(ListAggregator::default())),
        }
    }
}
