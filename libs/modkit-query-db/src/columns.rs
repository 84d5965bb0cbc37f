//! Physical column lookup for an entity.

use std::collections::HashMap;

use modkit_query::compose::target;
use modkit_query::{CursorMap, FieldRegistry, Target, Value};
use sea_orm::sea_query::{Alias, ColumnRef, IntoColumnRef};
use sea_orm::{ColumnTrait, EntityTrait, IdenStatic, Iterable, ModelTrait};

use crate::convert::from_sea;

/// Column names of entity `E` (as used by the registry's physical names)
/// mapped to its `Column` variants.
#[derive(Clone)]
#[must_use]
pub struct ColumnMap<E: EntityTrait> {
    columns: HashMap<String, E::Column>,
}

impl<E: EntityTrait> Default for ColumnMap<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityTrait> ColumnMap<E> {
    pub fn new() -> Self {
        Self {
            columns: HashMap::new(),
        }
    }

    /// Every column of the entity under its database name.
    pub fn from_entity() -> Self
    where
        E::Column: ColumnTrait,
    {
        E::Column::iter().fold(Self::new(), |map, col| map.insert(col.as_str(), col))
    }

    pub fn insert(mut self, name: impl Into<String>, col: E::Column) -> Self {
        self.columns.insert(name.into(), col);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<E::Column>
    where
        E::Column: Copy,
    {
        self.columns.get(name).copied()
    }

    /// Column reference for a predicate or ordering target. Plain columns are
    /// qualified with the entity table; joined targets use the binding as the
    /// table alias.
    #[must_use]
    pub fn column_ref(&self, target: &Target) -> Option<ColumnRef>
    where
        E::Column: Copy,
    {
        match target {
            Target::Column { name, .. } => self
                .get(name)
                .map(|col| (E::default(), col).into_column_ref()),
            Target::Joined { binding, field, .. } => Some(
                (Alias::new(binding.as_str()), Alias::new(field.as_str())).into_column_ref(),
            ),
            Target::Alias(alias) => Some(Alias::new(alias.as_str()).into_column_ref()),
        }
    }

    /// Cursor extractor reading order fields from a model with
    /// [`ModelTrait::get`]. Joined and aliased fields are not part of the
    /// model and come out as null with a warning, since a null boundary
    /// skews every later page; pass a custom extractor when ordering on them.
    pub fn extractor<'a>(
        &'a self,
        registry: &'a dyn FieldRegistry,
    ) -> impl Fn(&E::Model, &[String]) -> CursorMap + 'a
    where
        E::Column: Copy,
    {
        move |model, order_by| {
            order_by
                .iter()
                .map(|field| {
                    let col = match target(registry, field) {
                        Ok(Target::Column { name, .. }) => self.get(&name),
                        _ => None,
                    };
                    let value = if let Some(col) = col {
                        from_sea(model.get(col))
                    } else {
                        tracing::warn!(
                            field = %field,
                            "order field is not a column of the model; cursor carries null"
                        );
                        Value::Null
                    };
                    (field.clone(), value)
                })
                .collect()
        }
    }
}
