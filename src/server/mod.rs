//! Request pipeline: plugins decorate a fresh [`Context`], then the named
//! service handles the request and its result becomes a [`Response`].
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use sups_rust::{Server, Settings};
//!
//! let server = Arc::new(Server::new(Settings::from_file("settings.json")?)?);
//!
//! // Direct dispatch
//! let response = server.handle(Request::new("GET", "/data/recipes?pageSize=5"));
//!
//! // HTTP transport (requires "http" feature)
//! // sups_rust::http::serve(server, "0.0.0.0:3030").await?;
//! ```

mod context;
mod plugin;
mod request;
mod response;
mod service;

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::auth::Auth;
use crate::config::{ConfigError, Settings};
use crate::error::{ServiceError, ServiceResult};
use crate::rules::RuleTable;
use crate::services::{data, jsonstore, users, util};
use crate::store::{DocumentStore, InMemoryStore};

pub use context::Context;
pub use plugin::{
    AuthPlugin, Flags, Plugin, RulesPlugin, StoragePlugin, UtilPlugin, ADMIN_HEADER, AUTH_HEADER,
};
pub use request::{parse_body, parse_query, percent_decode, Query, Request};
pub use response::{Response, PREFLIGHT_HEADERS};
pub use service::{Reply, Service};

/// Bounds of the artificial delay added while throttling, in milliseconds.
pub const THROTTLE_MS: (u64, u64) = (500, 1000);

/// The assembled backend: stores, plugins and the service registry.
pub struct Server {
    storage: InMemoryStore,
    protected: InMemoryStore,
    flags: Flags,
    plugins: Vec<Box<dyn Plugin>>,
    services: Vec<Service>,
}

impl Server {
    /// Build a server from settings with the standard plugins and services.
    ///
    /// Fails when the configured access rules do not parse.
    pub fn new(settings: Settings) -> Result<Self, ConfigError> {
        let rules = Arc::new(RuleTable::from_json(&settings.rules)?);
        let storage = InMemoryStore::from_seed(&settings.seed_data);
        let protected = InMemoryStore::from_seed(&settings.protected_data);
        let mut initial = Map::new();
        initial.insert("throttle".into(), Value::Bool(settings.throttle));
        let flags = Flags::from_values(initial);

        let shared: Arc<dyn DocumentStore> = Arc::new(storage.clone());
        let shared_protected: Arc<dyn DocumentStore> = Arc::new(protected.clone());
        let auth = Auth::new(settings.identity.clone(), shared_protected.clone());

        let plugins: Vec<Box<dyn Plugin>> = vec![
            Box::new(StoragePlugin::new(shared, shared_protected)),
            Box::new(AuthPlugin::new(auth)),
            Box::new(UtilPlugin::new(flags.clone())),
            Box::new(RulesPlugin::new(rules)),
        ];
        let services = vec![
            jsonstore::service(jsonstore::JsonTree::new(settings.json_store)),
            users::service(),
            data::service(),
            util::service(),
        ];

        info!(identity = %settings.identity, services = services.len(), "server ready");
        Ok(Self {
            storage,
            protected,
            flags,
            plugins,
            services,
        })
    }

    /// Register an additional service, replacing any service of the same name.
    pub fn with_service(mut self, service: Service) -> Self {
        self.services.retain(|existing| existing.name() != service.name());
        self.services.push(service);
        self
    }

    /// Append a plugin after the standard ones.
    pub fn with_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    pub fn storage(&self) -> &InMemoryStore {
        &self.storage
    }

    pub fn protected_storage(&self) -> &InMemoryStore {
        &self.protected
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    pub fn services(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name()).collect()
    }

    /// Run one request through the pipeline.
    ///
    /// `OPTIONS` is answered with the preflight headers without touching
    /// plugins or services. Errors become `{code, message}` bodies, an empty
    /// result becomes 204.
    pub fn handle(&self, request: Request) -> Response {
        info!("<< {} {}", request.method, request.path);

        if request.method == "OPTIONS" {
            return Response::preflight();
        }

        let mut context = Context::new();
        let outcome = self
            .decorate(&mut context, &request)
            .and_then(|()| self.dispatch(&mut context, &request));

        let mut response = match outcome {
            Ok(Reply::Json(value)) => Response::json(200, &value),
            Ok(Reply::Empty) => Response::no_content(),
            Err(err) => {
                match &err {
                    ServiceError::Internal(detail) => error!(error = %detail, "unhandled service error"),
                    other => warn!(status = other.status_code(), error = %other, "request failed"),
                }
                Response::json(err.status_code(), &err.to_body())
            }
        };

        if context.throttled() {
            let (min, max) = THROTTLE_MS;
            response.delay = Some(Duration::from_millis(rand::thread_rng().gen_range(min..=max)));
        }
        response
    }

    fn decorate(&self, context: &mut Context, request: &Request) -> ServiceResult<()> {
        self.plugins
            .iter()
            .try_for_each(|plugin| plugin.decorate(context, request))
    }

    fn dispatch(&self, context: &mut Context, request: &Request) -> ServiceResult<Reply> {
        let (name, tokens) = request.route();
        let name = name.unwrap_or_default();
        match self.services.iter().find(|service| service.name() == name) {
            Some(service) => service.dispatch(context, &tokens, request),
            None => {
                error!(service = %name, "missing service");
                Err(ServiceError::Request(format!("Service \"{}\" is not supported", name)))
            }
        }
    }
}
