//! Layered option resolution.
//!
//! Every option is looked up through an explicit [`OptionChain`]: call-site
//! [`QueryOptions`], then the field registry, then the backend's
//! [`QueryConfig`], then the process environment's [`QueryConfig`], then
//! [`LibraryDefaults`]. The first provider with a value wins.

use std::path::Path;
use std::sync::Arc;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::params::PaginationType;
use crate::registry::{CustomOptions, DefaultOrder, FieldRegistry};

/// Environment variable prefix read by [`QueryConfig::from_env`].
pub const ENV_PREFIX: &str = "MODKIT_QUERY_";

/// Source of optional option values.
pub trait OptionProvider {
    fn default_limit(&self) -> Option<u64> {
        None
    }
    fn max_limit(&self) -> Option<u64> {
        None
    }
    fn default_order(&self) -> Option<DefaultOrder> {
        None
    }
    fn pagination_types(&self) -> Option<Vec<PaginationType>> {
        None
    }
    fn default_pagination_type(&self) -> Option<PaginationType> {
        None
    }
    fn filtering(&self) -> Option<bool> {
        None
    }
    fn ordering(&self) -> Option<bool> {
        None
    }
    fn pagination(&self) -> Option<bool> {
        None
    }
    fn replace_invalid_params(&self) -> Option<bool> {
        None
    }
}

/// Serializable option set for a backend or the whole process.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_limit: Option<u64>,
    pub max_limit: Option<u64>,
    pub default_pagination_type: Option<PaginationType>,
    pub pagination_types: Option<Vec<PaginationType>>,
    pub filtering: Option<bool>,
    pub ordering: Option<bool>,
    pub pagination: Option<bool>,
    pub replace_invalid_params: Option<bool>,
}

impl QueryConfig {
    /// Extract from an arbitrary figment.
    ///
    /// # Errors
    ///
    /// Returns the figment error when a value has the wrong type.
    pub fn from_figment(figment: &Figment) -> Result<Self, Box<figment::Error>> {
        figment.extract().map_err(Box::new)
    }

    /// Defaults overlaid with `MODKIT_QUERY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns the figment error when a variable has the wrong type.
    pub fn from_env() -> Result<Self, Box<figment::Error>> {
        Self::from_figment(
            &Figment::new()
                .merge(Serialized::defaults(QueryConfig::default()))
                .merge(Env::prefixed(ENV_PREFIX)),
        )
    }

    /// A YAML file overlaid with `MODKIT_QUERY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns the figment error when the file cannot be parsed or a value
    /// has the wrong type.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::from_figment(
            &Figment::new()
                .merge(Serialized::defaults(QueryConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed(ENV_PREFIX)),
        )
    }
}

impl OptionProvider for QueryConfig {
    fn default_limit(&self) -> Option<u64> {
        self.default_limit
    }
    fn max_limit(&self) -> Option<u64> {
        self.max_limit
    }
    fn pagination_types(&self) -> Option<Vec<PaginationType>> {
        self.pagination_types.clone()
    }
    fn default_pagination_type(&self) -> Option<PaginationType> {
        self.default_pagination_type
    }
    fn filtering(&self) -> Option<bool> {
        self.filtering
    }
    fn ordering(&self) -> Option<bool> {
        self.ordering
    }
    fn pagination(&self) -> Option<bool> {
        self.pagination
    }
    fn replace_invalid_params(&self) -> Option<bool> {
        self.replace_invalid_params
    }
}

/// Call-site options, plus the lower layers of the chain.
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    pub config: QueryConfig,
    pub default_order: Option<DefaultOrder>,
    /// Options for custom filter handlers; override registry options per key.
    pub custom: CustomOptions,
    pub backend: Option<Arc<QueryConfig>>,
    pub environment: Option<Arc<QueryConfig>>,
}

impl QueryOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn default_limit(mut self, limit: u64) -> Self {
        self.config.default_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn max_limit(mut self, limit: u64) -> Self {
        self.config.max_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn default_order(mut self, order: DefaultOrder) -> Self {
        self.default_order = Some(order);
        self
    }

    #[must_use]
    pub fn pagination_types(mut self, types: impl IntoIterator<Item = PaginationType>) -> Self {
        self.config.pagination_types = Some(types.into_iter().collect());
        self
    }

    #[must_use]
    pub fn default_pagination_type(mut self, ty: PaginationType) -> Self {
        self.config.default_pagination_type = Some(ty);
        self
    }

    #[must_use]
    pub fn filtering(mut self, enabled: bool) -> Self {
        self.config.filtering = Some(enabled);
        self
    }

    #[must_use]
    pub fn ordering(mut self, enabled: bool) -> Self {
        self.config.ordering = Some(enabled);
        self
    }

    #[must_use]
    pub fn pagination(mut self, enabled: bool) -> Self {
        self.config.pagination = Some(enabled);
        self
    }

    #[must_use]
    pub fn replace_invalid_params(mut self, enabled: bool) -> Self {
        self.config.replace_invalid_params = Some(enabled);
        self
    }

    #[must_use]
    pub fn custom_option(mut self, key: impl Into<String>, value: impl Into<crate::Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn backend(mut self, config: Arc<QueryConfig>) -> Self {
        self.backend = Some(config);
        self
    }

    #[must_use]
    pub fn environment(mut self, config: Arc<QueryConfig>) -> Self {
        self.environment = Some(config);
        self
    }

    /// Resolve every option through the standard chain for `registry`.
    #[must_use]
    pub fn resolve(&self, registry: &dyn FieldRegistry) -> ResolvedOptions {
        let from_registry = RegistryOptions(registry);
        let mut chain = OptionChain::new().with(self).with(&from_registry);
        if let Some(backend) = self.backend.as_deref() {
            chain = chain.with(backend);
        }
        if let Some(environment) = self.environment.as_deref() {
            chain = chain.with(environment);
        }
        chain.with(&LibraryDefaults).resolve()
    }
}

impl OptionProvider for QueryOptions {
    fn default_limit(&self) -> Option<u64> {
        self.config.default_limit
    }
    fn max_limit(&self) -> Option<u64> {
        self.config.max_limit
    }
    fn default_order(&self) -> Option<DefaultOrder> {
        self.default_order.clone()
    }
    fn pagination_types(&self) -> Option<Vec<PaginationType>> {
        self.config.pagination_types.clone()
    }
    fn default_pagination_type(&self) -> Option<PaginationType> {
        self.config.default_pagination_type
    }
    fn filtering(&self) -> Option<bool> {
        self.config.filtering
    }
    fn ordering(&self) -> Option<bool> {
        self.config.ordering
    }
    fn pagination(&self) -> Option<bool> {
        self.config.pagination
    }
    fn replace_invalid_params(&self) -> Option<bool> {
        self.config.replace_invalid_params
    }
}

/// Exposes a registry's declarations as an option layer.
pub struct RegistryOptions<'a>(pub &'a dyn FieldRegistry);

impl OptionProvider for RegistryOptions<'_> {
    fn default_limit(&self) -> Option<u64> {
        self.0.default_limit()
    }
    fn max_limit(&self) -> Option<u64> {
        self.0.max_limit()
    }
    fn default_order(&self) -> Option<DefaultOrder> {
        self.0.default_order().cloned()
    }
    fn pagination_types(&self) -> Option<Vec<PaginationType>> {
        self.0.pagination_types().map(<[PaginationType]>::to_vec)
    }
    fn default_pagination_type(&self) -> Option<PaginationType> {
        self.0.default_pagination_type()
    }
}

/// Bottom layer: everything enabled, every strategy allowed, no limits.
pub struct LibraryDefaults;

impl OptionProvider for LibraryDefaults {
    fn pagination_types(&self) -> Option<Vec<PaginationType>> {
        Some(PaginationType::ALL.to_vec())
    }
    fn filtering(&self) -> Option<bool> {
        Some(true)
    }
    fn ordering(&self) -> Option<bool> {
        Some(true)
    }
    fn pagination(&self) -> Option<bool> {
        Some(true)
    }
    fn replace_invalid_params(&self) -> Option<bool> {
        Some(false)
    }
}

/// Ordered list of providers; the first non-null value wins.
#[derive(Default)]
pub struct OptionChain<'a> {
    providers: Vec<&'a dyn OptionProvider>,
}

impl<'a> OptionChain<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, provider: &'a dyn OptionProvider) -> Self {
        self.providers.push(provider);
        self
    }

    #[must_use]
    pub fn lookup<T>(&self, get: impl Fn(&dyn OptionProvider) -> Option<T>) -> Option<T> {
        self.providers.iter().find_map(|p| get(*p))
    }

    #[must_use]
    pub fn resolve(&self) -> ResolvedOptions {
        ResolvedOptions {
            default_limit: self.lookup(|p| p.default_limit()),
            max_limit: self.lookup(|p| p.max_limit()),
            default_order: self.lookup(|p| p.default_order()),
            pagination_types: self
                .lookup(|p| p.pagination_types())
                .unwrap_or_else(|| PaginationType::ALL.to_vec()),
            default_pagination_type: self.lookup(|p| p.default_pagination_type()),
            filtering: self.lookup(|p| p.filtering()).unwrap_or(true),
            ordering: self.lookup(|p| p.ordering()).unwrap_or(true),
            pagination: self.lookup(|p| p.pagination()).unwrap_or(true),
            replace_invalid_params: self
                .lookup(|p| p.replace_invalid_params())
                .unwrap_or(false),
        }
    }
}

/// Concrete option values after chain resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub default_limit: Option<u64>,
    pub max_limit: Option<u64>,
    pub default_order: Option<DefaultOrder>,
    pub pagination_types: Vec<PaginationType>,
    pub default_pagination_type: Option<PaginationType>,
    pub filtering: bool,
    pub ordering: bool,
    pub pagination: bool,
    pub replace_invalid_params: bool,
}

impl ResolvedOptions {
    #[must_use]
    pub fn allows(&self, ty: PaginationType) -> bool {
        self.pagination_types.contains(&ty)
    }
}
