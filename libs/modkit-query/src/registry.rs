//! Field registry: the static, per-model description of what can be filtered,
//! sorted and paginated.
//!
//! A registry is built once per data-model type with [`Registry::builder`],
//! checked for internal consistency at build time, and then shared read-only
//! (it is `Send + Sync`; wrap it in a `static` or an `Arc`).
//!
//! ```
//! use modkit_query::{Direction, FieldRegistry, FieldType, Registry};
//!
//! let pets = Registry::builder()
//!     .field("name", FieldType::String)
//!     .field("age", FieldType::Integer)
//!     .field("species", FieldType::String)
//!     .compound("full_name", ["family_name", "given_name"])
//!     .field("family_name", FieldType::String)
//!     .field("given_name", FieldType::String)
//!     .join("owner_age", "owner", "age", FieldType::Integer)
//!     .filterable(["name", "age", "full_name", "owner_age"])
//!     .sortable(["name", "age", "species"])
//!     .default_order(["name"], [Direction::Asc])
//!     .default_limit(20)
//!     .max_limit(100)
//!     .build()
//!     .unwrap();
//!
//! assert!(pets.is_sortable("species"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ConfigurationError;
use crate::operator::Operator;
use crate::order::Direction;
use crate::params::{Filter, PaginationType};
use crate::predicate::Predicate;
use crate::value::Value;

/// Logical value type of a field, used for value casting and to pick the
/// operator set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    Id,
    Integer,
    Float,
    Decimal,
    Uuid,
    String,
    Boolean,
    Date,
    Time,
    DateTime,
    /// Enumerated type with its permitted values.
    Enum(Vec<String>),
    Array(Box<FieldType>),
    Map,
    /// No type information; every operator is offered and values pass as-is.
    Unknown,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Id => write!(f, "id"),
            FieldType::Integer => write!(f, "integer"),
            FieldType::Float => write!(f, "float"),
            FieldType::Decimal => write!(f, "decimal"),
            FieldType::Uuid => write!(f, "uuid"),
            FieldType::String => write!(f, "string"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Date => write!(f, "date"),
            FieldType::Time => write!(f, "time"),
            FieldType::DateTime => write!(f, "datetime"),
            FieldType::Enum(_) => write!(f, "enum"),
            FieldType::Array(inner) => write!(f, "array<{inner}>"),
            FieldType::Map => write!(f, "map"),
            FieldType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Extra options passed to custom filter handlers.
pub type CustomOptions = BTreeMap<String, Value>;

/// Builds the predicate for a custom field from the filter clause and the
/// merged options.
pub type CustomHandler = Arc<dyn Fn(&Filter, &CustomOptions) -> Predicate + Send + Sync>;

/// A field whose predicate construction is delegated to a handler.
#[derive(Clone)]
pub struct CustomField {
    pub handler: CustomHandler,
    /// Declared operator allow-list; `None` admits every operator.
    pub operators: Option<Vec<Operator>>,
    /// Type the clause value is cast to before the handler sees it.
    pub value_type: FieldType,
    /// Registry-level options; caller options override them per key.
    pub options: CustomOptions,
}

impl CustomField {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Filter, &CustomOptions) -> Predicate + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            operators: None,
            value_type: FieldType::Unknown,
            options: CustomOptions::new(),
        }
    }

    #[must_use]
    pub fn operators(mut self, ops: impl IntoIterator<Item = Operator>) -> Self {
        self.operators = Some(ops.into_iter().collect());
        self
    }

    #[must_use]
    pub fn value_type(mut self, ty: FieldType) -> Self {
        self.value_type = ty;
        self
    }

    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for CustomField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomField")
            .field("handler", &"<fn>")
            .field("operators", &self.operators)
            .field("value_type", &self.value_type)
            .field("options", &self.options)
            .finish()
    }
}

/// Resolved kind of one field identifier.
#[derive(Clone, Debug)]
pub enum FieldDescriptor {
    /// A column/attribute of the queried source; `name` is the physical name.
    Normal { name: String, ty: FieldType },
    /// One logical field over several member fields (text search only).
    Compound { members: Vec<String> },
    /// A field reached through the named relation `binding`.
    Join {
        binding: String,
        field: String,
        ty: FieldType,
    },
    Custom(CustomField),
    /// A projection-only field (computed column), usable only for ordering.
    Alias { name: String },
}

impl FieldDescriptor {
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldDescriptor::Normal { .. } => "normal",
            FieldDescriptor::Compound { .. } => "compound",
            FieldDescriptor::Join { .. } => "join",
            FieldDescriptor::Custom(_) => "custom",
            FieldDescriptor::Alias { .. } => "alias",
        }
    }

    /// Value type used for casting filter values, if the kind has one.
    #[must_use]
    pub fn value_type(&self) -> FieldType {
        match self {
            FieldDescriptor::Normal { ty, .. } | FieldDescriptor::Join { ty, .. } => ty.clone(),
            FieldDescriptor::Custom(custom) => custom.value_type.clone(),
            FieldDescriptor::Compound { .. } => FieldType::String,
            FieldDescriptor::Alias { .. } => FieldType::Unknown,
        }
    }
}

/// Default ordering applied when a request has no `order_by`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefaultOrder {
    pub order_by: Vec<String>,
    pub order_directions: Option<Vec<Direction>>,
}

/// Capability interface of a per-model field registry.
pub trait FieldRegistry: Send + Sync {
    fn filterable_fields(&self) -> &[String];

    fn sortable_fields(&self) -> &[String];

    fn resolve(&self, field: &str) -> Option<&FieldDescriptor>;

    fn default_limit(&self) -> Option<u64> {
        None
    }

    fn max_limit(&self) -> Option<u64> {
        None
    }

    fn default_order(&self) -> Option<&DefaultOrder> {
        None
    }

    /// Allowed pagination strategies; `None` allows all four.
    fn pagination_types(&self) -> Option<&[PaginationType]> {
        None
    }

    fn default_pagination_type(&self) -> Option<PaginationType> {
        None
    }

    fn is_filterable(&self, field: &str) -> bool {
        self.filterable_fields().iter().any(|f| f == field)
    }

    fn is_sortable(&self, field: &str) -> bool {
        self.sortable_fields().iter().any(|f| f == field)
    }
}

/// Builder-constructed [`FieldRegistry`].
#[derive(Clone, Debug, Default)]
pub struct Registry {
    fields: BTreeMap<String, FieldDescriptor>,
    filterable: Vec<String>,
    sortable: Vec<String>,
    default_limit: Option<u64>,
    max_limit: Option<u64>,
    default_order: Option<DefaultOrder>,
    pagination_types: Option<Vec<PaginationType>>,
    default_pagination_type: Option<PaginationType>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// All declared field identifiers.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl FieldRegistry for Registry {
    fn filterable_fields(&self) -> &[String] {
        &self.filterable
    }

    fn sortable_fields(&self) -> &[String] {
        &self.sortable
    }

    fn resolve(&self, field: &str) -> Option<&FieldDescriptor> {
        self.fields.get(field)
    }

    fn default_limit(&self) -> Option<u64> {
        self.default_limit
    }

    fn max_limit(&self) -> Option<u64> {
        self.max_limit
    }

    fn default_order(&self) -> Option<&DefaultOrder> {
        self.default_order.as_ref()
    }

    fn pagination_types(&self) -> Option<&[PaginationType]> {
        self.pagination_types.as_deref()
    }

    fn default_pagination_type(&self) -> Option<PaginationType> {
        self.default_pagination_type
    }
}

#[derive(Default)]
#[must_use]
pub struct RegistryBuilder {
    registry: Registry,
    duplicates: Vec<String>,
}

impl RegistryBuilder {
    fn declare(mut self, id: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        let id = id.into();
        if self.registry.fields.contains_key(&id) {
            self.duplicates.push(id);
        } else {
            self.registry.fields.insert(id, descriptor);
        }
        self
    }

    /// Normal field whose physical name equals its identifier.
    pub fn field(self, id: impl Into<String>, ty: FieldType) -> Self {
        let id = id.into();
        let name = id.clone();
        self.declare(id, FieldDescriptor::Normal { name, ty })
    }

    /// Normal field exposed under `id` but stored as `column`.
    pub fn field_as(self, id: impl Into<String>, column: impl Into<String>, ty: FieldType) -> Self {
        self.declare(
            id,
            FieldDescriptor::Normal {
                name: column.into(),
                ty,
            },
        )
    }

    pub fn compound<I, S>(self, id: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members = members.into_iter().map(Into::into).collect();
        self.declare(id, FieldDescriptor::Compound { members })
    }

    pub fn join(
        self,
        id: impl Into<String>,
        binding: impl Into<String>,
        field: impl Into<String>,
        ty: FieldType,
    ) -> Self {
        self.declare(
            id,
            FieldDescriptor::Join {
                binding: binding.into(),
                field: field.into(),
                ty,
            },
        )
    }

    pub fn custom(self, id: impl Into<String>, custom: CustomField) -> Self {
        self.declare(id, FieldDescriptor::Custom(custom))
    }

    pub fn alias(self, id: impl Into<String>) -> Self {
        let id = id.into();
        let name = id.clone();
        self.declare(id, FieldDescriptor::Alias { name })
    }

    pub fn filterable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry.filterable = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn sortable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry.sortable = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn default_limit(mut self, limit: u64) -> Self {
        self.registry.default_limit = Some(limit);
        self
    }

    pub fn max_limit(mut self, limit: u64) -> Self {
        self.registry.max_limit = Some(limit);
        self
    }

    pub fn default_order<I, S, D>(mut self, order_by: I, directions: D) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        D: IntoIterator<Item = Direction>,
    {
        let order_directions: Vec<Direction> = directions.into_iter().collect();
        self.registry.default_order = Some(DefaultOrder {
            order_by: order_by.into_iter().map(Into::into).collect(),
            order_directions: (!order_directions.is_empty()).then_some(order_directions),
        });
        self
    }

    pub fn pagination_types(mut self, types: impl IntoIterator<Item = PaginationType>) -> Self {
        self.registry.pagination_types = Some(types.into_iter().collect());
        self
    }

    pub fn default_pagination_type(mut self, ty: PaginationType) -> Self {
        self.registry.default_pagination_type = Some(ty);
        self
    }

    /// Check the declarations and produce the registry.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] found: duplicate or unknown
    /// fields, alias fields marked filterable, compound/custom fields marked
    /// sortable, unusable compound members, a default order over non-sortable
    /// fields, inconsistent limits or a default pagination type that is not
    /// allowed.
    pub fn build(self) -> Result<Registry, ConfigurationError> {
        let Self {
            registry,
            duplicates,
        } = self;

        if let Some(dup) = duplicates.into_iter().next() {
            return Err(ConfigurationError::DuplicateField(dup));
        }

        for field in &registry.filterable {
            match registry.fields.get(field) {
                None => {
                    return Err(ConfigurationError::UnknownField {
                        list: "filterable",
                        field: field.clone(),
                    });
                }
                Some(FieldDescriptor::Alias { .. }) => {
                    return Err(ConfigurationError::AliasFilterable(field.clone()));
                }
                Some(_) => {}
            }
        }

        for field in &registry.sortable {
            match registry.fields.get(field) {
                None => {
                    return Err(ConfigurationError::UnknownField {
                        list: "sortable",
                        field: field.clone(),
                    });
                }
                Some(d @ (FieldDescriptor::Compound { .. } | FieldDescriptor::Custom(_))) => {
                    return Err(ConfigurationError::NotSortable {
                        kind: d.kind_name(),
                        field: field.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        for (id, descriptor) in &registry.fields {
            if let FieldDescriptor::Compound { members } = descriptor {
                let bad = members.iter().find(|m| {
                    !matches!(
                        registry.fields.get(m.as_str()),
                        Some(FieldDescriptor::Normal { .. } | FieldDescriptor::Join { .. })
                    )
                });
                if let Some(member) = bad {
                    return Err(ConfigurationError::InvalidCompoundMember {
                        field: id.clone(),
                        member: member.clone(),
                    });
                }
                if members.is_empty() {
                    return Err(ConfigurationError::InvalidCompoundMember {
                        field: id.clone(),
                        member: String::new(),
                    });
                }
            }
        }

        if let Some(order) = &registry.default_order
            && let Some(field) = order
                .order_by
                .iter()
                .find(|f| !registry.sortable.contains(f))
        {
            return Err(ConfigurationError::DefaultOrderNotSortable(field.clone()));
        }

        if registry.default_limit == Some(0) {
            return Err(ConfigurationError::ZeroLimit("default_limit"));
        }
        if registry.max_limit == Some(0) {
            return Err(ConfigurationError::ZeroLimit("max_limit"));
        }
        if let (Some(default_limit), Some(max_limit)) = (registry.default_limit, registry.max_limit)
            && default_limit > max_limit
        {
            return Err(ConfigurationError::DefaultLimitAboveMax {
                default_limit,
                max_limit,
            });
        }

        if let (Some(default), Some(allowed)) = (
            registry.default_pagination_type,
            registry.pagination_types.as_deref(),
        ) && !allowed.contains(&default)
        {
            return Err(ConfigurationError::DefaultPaginationTypeNotAllowed(default));
        }

        Ok(registry)
    }
}
