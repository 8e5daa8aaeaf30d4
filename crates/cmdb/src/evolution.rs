//! # Schema Evolution
//!
//! Decides whether a field may be added to a virtual table that may already
//! hold rows, and computes the backfill when it must.
//!
//! Adding a field is checked in this order:
//!
//! 1. the schema must exist and be live
//! 2. the field configuration must parse
//! 3. a declared reference must point at an existing field
//! 4. a default, when given, must be valid for the field's type
//! 5. if the schema has no live entities, the field is added as is; otherwise
//!    - nullable fields are added as is
//!    - non-nullable unique fields are rejected
//!    - non-nullable, non-unique fields need a default, which is written to
//!      every live entity in the same transaction as the field

use crate::meta::FieldMeta;
use crate::store::{Backfill, Field, NewField, Store};
use crate::types::TypeRegistry;
use crate::{Error, Result};

/// How a new field is admitted to its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Persist the field alone.
    Direct,
    /// Persist the field and store this canonical value for every live entity.
    Backfill(String),
}

impl Admission {
    /// Applies the admission rules to a parsed field.
    ///
    /// A present default is validated by the field's value type whether or not
    /// it will be used; its canonical form is what gets backfilled.
    pub fn decide(meta: &FieldMeta, in_use: bool) -> Result<Self> {
        let default = meta
            .effective_default()
            .map(|value| meta.value_type.stringify(value))
            .transpose()?;

        if !in_use || meta.nullable {
            return Ok(Admission::Direct);
        }

        if meta.unique {
            return Err(Error::Constraint(
                "field required to be unique cannot be added as not-nullable to a populated table"
                    .to_string(),
            ));
        }

        match default {
            None => Err(Error::Constraint(
                "a non-nullable, non-unique field added to a populated table must supply a default value"
                    .to_string(),
            )),
            Some(value) => Ok(Admission::Backfill(value)),
        }
    }
}

/// Adds fields to virtual tables through a [`Store`].
pub struct SchemaEvolution<'a, S: Store + ?Sized> {
    store: &'a S,
    registry: &'a TypeRegistry,
}

impl<'a, S: Store + ?Sized> SchemaEvolution<'a, S> {
    pub fn new(store: &'a S, registry: &'a TypeRegistry) -> Self {
        Self { store, registry }
    }

    /// Adds `field_name` with configuration `raw_meta` to `schema_name`.
    pub fn add_field(&self, schema_name: &str, field_name: &str, raw_meta: &str) -> Result<Field> {
        let schema = self
            .store
            .find_schema(schema_name)?
            .ok_or_else(|| Error::NotFound(format!("schema '{}'", schema_name.trim())))?;

        let meta = FieldMeta::parse(raw_meta, self.registry)?;
        let name = field_name.trim();
        if name.is_empty() {
            return Err(Error::InvalidMeta("field name must not be empty".to_string()));
        }

        let ref_id = match &meta.reference {
            None => None,
            Some(reference) => {
                let target = self
                    .store
                    .find_field(&reference.schema, &reference.field)?
                    .ok_or_else(|| Error::InvalidReference {
                        schema: reference.schema.clone(),
                        field: reference.field.clone(),
                    })?;
                Some(target.id)
            }
        };

        let new_field = NewField {
            schema_id: schema.id,
            name: name.to_string(),
            meta: raw_meta.to_string(),
            ref_id,
        };

        let in_use = self.store.schema_has_entities(schema.id)?;
        let admission = Admission::decide(&meta, in_use).inspect_err(|err| {
            log::warn!("rejected field {}.{}: {}", schema.name, name, err);
        })?;

        let backfill: Vec<Backfill> = match admission {
            Admission::Direct => Vec::new(),
            Admission::Backfill(value) => self
                .store
                .list_entities(schema.id)?
                .into_iter()
                .map(|entity| Backfill {
                    entity_id: entity.id,
                    value: value.clone(),
                })
                .collect(),
        };
        if !backfill.is_empty() {
            log::debug!(
                "backfilling {} rows of {} for field {}",
                backfill.len(),
                schema.name,
                name
            );
        }

        let field = self.store.insert_field(&new_field, &backfill)?;
        log::info!(
            "Add a field. id:{} schema:{} name:{}",
            field.id,
            schema.name,
            field.name
        );
        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::error::ValidationError;
    use crate::store::{Entity, Schema};

    fn meta(raw: &str) -> FieldMeta {
        FieldMeta::parse(raw, &TypeRegistry::with_builtins()).unwrap()
    }

    #[test]
    fn unused_schema_admits_any_shape() {
        let unique_required = meta(r#"{"type": "IP", "nullable": false, "unique": true}"#);
        assert_eq!(Admission::decide(&unique_required, false).unwrap(), Admission::Direct);
    }

    #[test]
    fn nullable_field_is_direct_on_used_schema() {
        let nullable = meta(r#"{"type": "Int", "nullable": true}"#);
        assert_eq!(Admission::decide(&nullable, true).unwrap(), Admission::Direct);
    }

    #[test]
    fn unique_required_field_is_rejected_on_used_schema() {
        let unique_required = meta(r#"{"type": "Int", "default": "1"}"#);
        assert!(matches!(
            Admission::decide(&unique_required, true),
            Err(Error::Constraint(_))
        ));
    }

    #[test]
    fn required_field_without_default_is_rejected() {
        for raw in [
            r#"{"type": "Int", "unique": false}"#,
            r#"{"type": "Int", "unique": false, "default": ""}"#,
        ] {
            assert!(matches!(
                Admission::decide(&meta(raw), true),
                Err(Error::Constraint(_))
            ));
        }
    }

    #[test]
    fn required_field_with_default_is_backfilled_canonically() {
        let with_default = meta(r#"{"type": "Int", "unique": false, "default": " +1"}"#);
        assert_eq!(
            Admission::decide(&with_default, true).unwrap(),
            Admission::Backfill("1".to_string())
        );
    }

    #[test]
    fn invalid_default_fails_validation_on_any_table() {
        let bad_default = meta(
            r#"{"type": {"name": "Int", "option": {"max": 5}}, "unique": false, "default": "9"}"#,
        );
        for in_use in [false, true] {
            assert!(matches!(
                Admission::decide(&bad_default, in_use),
                Err(Error::Validation(ValidationError::Range { .. }))
            ));
        }

        let nullable = meta(r#"{"type": "IP", "nullable": true, "default": "not-an-ip"}"#);
        assert!(matches!(
            Admission::decide(&nullable, true),
            Err(Error::Validation(ValidationError::Format { .. }))
        ));
    }

    /// In-memory store that records which operations were called.
    #[derive(Default)]
    struct FakeStore {
        schema: Option<Schema>,
        referenced: Option<Field>,
        entities: Vec<Entity>,
        calls: RefCell<Vec<&'static str>>,
        inserted: RefCell<Vec<(NewField, Vec<Backfill>)>>,
    }

    impl FakeStore {
        fn with_schema() -> Self {
            Self {
                schema: Some(Schema {
                    id: 7,
                    name: "host".to_string(),
                    description: None,
                    deleted: false,
                }),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.borrow().clone()
        }
    }

    impl Store for FakeStore {
        fn find_schema(&self, _name: &str) -> Result<Option<Schema>> {
            self.calls.borrow_mut().push("find_schema");
            Ok(self.schema.clone())
        }

        fn find_field(&self, _schema_name: &str, _field_name: &str) -> Result<Option<Field>> {
            self.calls.borrow_mut().push("find_field");
            Ok(self.referenced.clone())
        }

        fn schema_has_entities(&self, _schema_id: i64) -> Result<bool> {
            self.calls.borrow_mut().push("schema_has_entities");
            Ok(!self.entities.is_empty())
        }

        fn list_entities(&self, _schema_id: i64) -> Result<Vec<Entity>> {
            self.calls.borrow_mut().push("list_entities");
            Ok(self.entities.clone())
        }

        fn insert_field(&self, field: &NewField, backfill: &[Backfill]) -> Result<Field> {
            self.calls.borrow_mut().push("insert_field");
            self.inserted
                .borrow_mut()
                .push((field.clone(), backfill.to_vec()));
            Ok(Field {
                id: 100,
                name: field.name.clone(),
                meta: field.meta.clone(),
                deleted: false,
                schema_id: field.schema_id,
                ref_id: field.ref_id,
            })
        }
    }

    fn entity(id: i64) -> Entity {
        Entity {
            id,
            key: format!("e{id}"),
            deleted: false,
            schema_id: 7,
        }
    }

    #[test]
    fn missing_schema_is_reported_before_meta_is_parsed() {
        let store = FakeStore::default();
        let registry = TypeRegistry::with_builtins();
        let err = SchemaEvolution::new(&store, &registry)
            .add_field("host", "ip", "not json")
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(store.calls(), vec!["find_schema"]);
    }

    #[test]
    fn dangling_reference_is_reported_before_usage_check() {
        let store = FakeStore::with_schema();
        let registry = TypeRegistry::with_builtins();
        let err = SchemaEvolution::new(&store, &registry)
            .add_field(
                "host",
                "pool_ip",
                r#"{"type": "IP", "reference": {"schema": "ippool", "field": "ip"}}"#,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidReference { ref schema, ref field } if schema == "ippool" && field == "ip"
        ));
        assert_eq!(store.calls(), vec!["find_schema", "find_field"]);
    }

    #[test]
    fn resolved_reference_is_bound_to_the_new_field() {
        let mut store = FakeStore::with_schema();
        store.referenced = Some(Field {
            id: 42,
            name: "ip".to_string(),
            meta: r#"{"type": "IP"}"#.to_string(),
            deleted: false,
            schema_id: 3,
            ref_id: None,
        });
        let registry = TypeRegistry::with_builtins();

        let field = SchemaEvolution::new(&store, &registry)
            .add_field(
                "host",
                " pool_ip ",
                r#"{"type": "IP", "reference": {"schema": "ippool", "field": "ip"}}"#,
            )
            .unwrap();
        assert_eq!(field.ref_id, Some(42));
        assert_eq!(field.name, "pool_ip");
    }

    #[test]
    fn backfill_stages_one_value_per_entity() {
        let mut store = FakeStore::with_schema();
        store.entities = vec![entity(1), entity(2), entity(3)];
        let registry = TypeRegistry::with_builtins();

        SchemaEvolution::new(&store, &registry)
            .add_field(
                "host",
                "status",
                r#"{"type": "Int", "nullable": false, "unique": false, "default": "1"}"#,
            )
            .unwrap();

        let inserted = store.inserted.borrow();
        let (field, backfill) = &inserted[0];
        assert_eq!(field.schema_id, 7);
        assert_eq!(
            backfill.iter().map(|b| b.entity_id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(backfill.iter().all(|b| b.value == "1"));
        assert_eq!(
            store.calls(),
            vec!["find_schema", "schema_has_entities", "list_entities", "insert_field"]
        );
    }

    #[test]
    fn rejected_field_is_never_inserted() {
        let mut store = FakeStore::with_schema();
        store.entities = vec![entity(1)];
        let registry = TypeRegistry::with_builtins();

        let err = SchemaEvolution::new(&store, &registry)
            .add_field("host", "serial", r#"{"type": "Int", "nullable": false, "unique": true}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Constraint(_)));
        assert!(store.inserted.borrow().is_empty());
    }

    #[test]
    fn blank_field_name_is_invalid_meta() {
        let store = FakeStore::with_schema();
        let registry = TypeRegistry::with_builtins();
        let err = SchemaEvolution::new(&store, &registry)
            .add_field("host", "  ", r#"{"type": "Int"}"#)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMeta(_)));
    }
}
