//! Active records
//!
//! An [`ActiveRecord`] is bound to one row or document of a table and
//! carries its own load/save/delete cycle on top of a [`Database`]. Domain
//! types describe their table through [`Model::schema`] and can be hydrated
//! from collection queries.

pub mod codec;

pub use codec::FieldCodec;

use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

use super::builder::{Database, QueryBuilder};
use super::error::StoreResult;
use super::query::{FilterClause, Page, Record, SortSpec, IDENTITY_FIELD};

/// Filters keyed by field; entries default to equality
pub type FieldFilters = Vec<(String, FilterClause)>;

/// Table binding and persistence rules of a model
#[derive(Debug, Clone)]
pub struct ModelSchema {
    pub table: String,
    /// Values written for keys absent from the record
    pub defaults: Record,
    /// Fields held as structured values and stored as JSON text
    pub json_fields: BTreeSet<String>,
    /// Maintain `created` and `updated` Unix timestamps
    pub auto_timestamp: bool,
    /// Adopt the identity assigned by the engine on insert
    pub auto_increment_identity: bool,
}

impl ModelSchema {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            defaults: Record::new(),
            json_fields: BTreeSet::new(),
            auto_timestamp: true,
            auto_increment_identity: true,
        }
    }

    pub fn with_defaults(mut self, defaults: Record) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_json_fields(mut self, fields: &[&str]) -> Self {
        self.json_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn without_timestamps(mut self) -> Self {
        self.auto_timestamp = false;
        self
    }

    pub fn with_manual_identity(mut self) -> Self {
        self.auto_increment_identity = false;
        self
    }
}

/// A domain type persisted through an [`ActiveRecord`]
pub trait Model: Sized {
    fn schema() -> ModelSchema;

    /// Wrap a loaded record
    fn from_record(record: ActiveRecord) -> Self;

    /// Unsaved instance bound to `db`
    fn create(db: &Database) -> Self {
        Self::from_record(ActiveRecord::new(db.clone(), Self::schema()))
    }

    /// Instance loaded by identity; unsaved and empty when nothing matched
    #[allow(async_fn_in_trait)]
    async fn find(db: &Database, id: impl Into<Value>) -> StoreResult<Self> {
        let mut record = ActiveRecord::new(db.clone(), Self::schema());
        record.load(id).await?;
        Ok(Self::from_record(record))
    }
}

/// One row or document with its persistence cycle
#[derive(Clone)]
pub struct ActiveRecord {
    db: Database,
    schema: ModelSchema,
    codec: FieldCodec,
    data: Record,
    id: Option<Value>,
}

impl ActiveRecord {
    pub fn new(db: Database, schema: ModelSchema) -> Self {
        let codec = FieldCodec::new(schema.json_fields.clone());
        Self {
            db,
            schema,
            codec,
            data: Record::new(),
            id: None,
        }
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    /// Identity; None until loaded or saved
    pub fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }

    pub fn data(&self) -> &Record {
        &self.data
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.data.insert(field.to_string(), value.into());
        self
    }

    /// Merge fields into the in-memory data
    pub fn fill(&mut self, fields: Record) -> &mut Self {
        self.data.extend(fields);
        self
    }

    pub fn reset(&mut self) {
        self.data = Record::new();
        self.id = None;
    }

    fn table(&self) -> QueryBuilder {
        self.db.select_table("*", &self.schema.table)
    }

    async fn fetch_stored(&self, id: &Value) -> StoreResult<Option<Record>> {
        self.table().filter_eq(IDENTITY_FIELD, id.clone()).fetch().await
    }

    /// Load by identity; a miss leaves the record unsaved and empty
    pub async fn load(&mut self, id: impl Into<Value>) -> StoreResult<&mut Self> {
        self.reset();

        if let Some(row) = self.fetch_stored(&id.into()).await? {
            self.load_from_data(row);
        }

        Ok(self)
    }

    /// Hydrate from an already fetched record
    pub fn load_from_data(&mut self, raw: Record) -> &mut Self {
        self.data = self.codec.decode(raw);
        self.id = self.data.get(IDENTITY_FIELD).cloned();
        self
    }

    /// Insert when unsaved, otherwise merge over the stored version and update
    pub async fn save(&mut self) -> StoreResult<&mut Self> {
        let stored = match &self.id {
            Some(id) => self.fetch_stored(id).await?.map(|row| self.codec.decode(row)),
            None => None,
        };
        let existed = stored.is_some();

        let mut merged = stored.unwrap_or_default();
        merged.extend(std::mem::take(&mut self.data));

        let mut record = self.schema.defaults.clone();
        record.extend(merged);

        if self.schema.auto_timestamp {
            let now = chrono::Utc::now().timestamp();
            record.insert("updated".to_string(), Value::from(now));
            if !existed {
                record.insert("created".to_string(), Value::from(now));
            }
        }

        let encoded = self.codec.encode(&record);
        self.data = record;

        match (existed, self.id.clone()) {
            (true, Some(id)) => {
                self.table().filter_eq(IDENTITY_FIELD, id).update(encoded).await?;
            }
            _ => {
                let ids = self.table().insert(encoded).await?;
                let assigned = ids.into_iter().next().filter(|id| !id.is_null());
                let supplied = self.data.get(IDENTITY_FIELD).filter(|id| !id.is_null()).cloned();

                // the caller's id only holds where the engine keeps it
                let identity = if self.schema.auto_increment_identity || self.db.assigns_identity() {
                    assigned.or(supplied)
                } else {
                    supplied.or(assigned)
                };

                if let Some(id) = identity {
                    debug!(table = %self.schema.table, %id, "identity after insert");
                    self.data.insert(IDENTITY_FIELD.to_string(), id.clone());
                    self.id = Some(id);
                }
            }
        }

        Ok(self)
    }

    /// Delete this record; the instance keeps its identity
    pub async fn delete(&self) -> StoreResult<bool> {
        match &self.id {
            Some(id) => self.table().filter_eq(IDENTITY_FIELD, id.clone()).delete().await,
            None => Ok(false),
        }
    }

    /// Delete every record of the table
    pub async fn delete_all(&self) -> StoreResult<bool> {
        self.table().delete().await
    }

    pub async fn count(&self, filters: &FieldFilters) -> StoreResult<u64> {
        self.filtered(filters).count().await
    }

    /// Decoded records matching `filters`; sorted by `id` ascending unless
    /// another sort is given
    pub async fn collection(
        &self,
        filters: &FieldFilters,
        sort: Option<SortSpec>,
        page: Option<Page>,
    ) -> StoreResult<Vec<Record>> {
        let rows = self.collection_query(filters, sort, page).fetch_all().await?;
        Ok(rows.into_iter().map(|row| self.codec.decode(row)).collect())
    }

    /// Like [`collection`](Self::collection), hydrated into model instances
    pub async fn collection_as<M: Model>(
        &self,
        filters: &FieldFilters,
        sort: Option<SortSpec>,
        page: Option<Page>,
    ) -> StoreResult<Vec<M>> {
        let rows = self.collection_query(filters, sort, page).fetch_all().await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut record = ActiveRecord::new(self.db.clone(), M::schema());
                record.load_from_data(row);
                M::from_record(record)
            })
            .collect())
    }

    fn filtered(&self, filters: &FieldFilters) -> QueryBuilder {
        filters
            .iter()
            .fold(self.table(), |query, (field, clause)| query.filter(field, clause.clone()))
    }

    fn collection_query(&self, filters: &FieldFilters, sort: Option<SortSpec>, page: Option<Page>) -> QueryBuilder {
        let query = self
            .filtered(filters)
            .sort(sort.unwrap_or_else(|| SortSpec::asc(IDENTITY_FIELD)));

        match page {
            Some(page) => query.limit_offset(page.limit, page.offset),
            None => query,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::Config;
    use serde_json::json;
    use tempfile::tempdir;

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    fn notes(db: &Database) -> ActiveRecord {
        ActiveRecord::new(
            db.clone(),
            ModelSchema::new("notes")
                .with_defaults(record(json!({"status": "draft", "title": ""})))
                .with_json_fields(&["tags"]),
        )
    }

    #[tokio::test]
    async fn test_create_applies_defaults_and_timestamps() {
        let dir = tempdir().unwrap();
        let db = Database::new(&Config::embedded(dir.path())).unwrap();

        let mut note = notes(&db);
        note.set("title", "first");
        note.save().await.unwrap();

        assert!(note.is_saved());
        assert_eq!(note.get("id"), note.id());
        assert_eq!(note.get("status"), Some(&json!("draft")));
        assert_eq!(note.get("title"), Some(&json!("first")));
        assert_eq!(note.get("created"), note.get("updated"));
    }

    #[tokio::test]
    async fn test_load_miss_stays_unsaved() {
        let dir = tempdir().unwrap();
        let db = Database::new(&Config::embedded(dir.path())).unwrap();

        let mut note = notes(&db);
        note.set("title", "unsaved");
        note.load("missing").await.unwrap();

        assert!(!note.is_saved());
        assert!(note.data().is_empty());
    }

    #[tokio::test]
    async fn test_save_keeps_stored_fields() {
        let dir = tempdir().unwrap();
        let db = Database::new(&Config::embedded(dir.path())).unwrap();

        let mut note = notes(&db);
        note.set("title", "a b").set("body", "kept & safe");
        note.save().await.unwrap();
        let id = note.id().cloned().unwrap();

        let mut partial = notes(&db);
        partial.load_from_data(record(json!({"id": id.clone(), "title": "c"})));
        partial.save().await.unwrap();

        let mut reloaded = notes(&db);
        reloaded.load(id).await.unwrap();
        assert_eq!(reloaded.get("title"), Some(&json!("c")));
        assert_eq!(reloaded.get("body"), Some(&json!("kept & safe")));
    }

    #[tokio::test]
    async fn test_delete_keeps_identity() {
        let dir = tempdir().unwrap();
        let db = Database::new(&Config::embedded(dir.path())).unwrap();

        let mut note = notes(&db);
        assert!(!note.delete().await.unwrap());
        note.save().await.unwrap();

        assert!(note.delete().await.unwrap());
        assert!(note.is_saved());
        assert_eq!(note.count(&Vec::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_manual_identity_on_embedded_uses_assigned_id() {
        let dir = tempdir().unwrap();
        let db = Database::new(&Config::embedded(dir.path())).unwrap();
        let schema = ModelSchema::new("things").with_manual_identity();

        let mut thing = ActiveRecord::new(db.clone(), schema.clone());
        thing.set("name", "first");
        thing.save().await.unwrap();
        assert!(thing.is_saved());
        assert_eq!(thing.get("id"), thing.id());

        thing.set("name", "second");
        thing.save().await.unwrap();
        assert_eq!(thing.count(&Vec::new()).await.unwrap(), 1);

        let mut supplied = ActiveRecord::new(db.clone(), schema.clone());
        supplied.set("id", "mine");
        supplied.save().await.unwrap();
        assert_ne!(supplied.id(), Some(&json!("mine")));

        let mut reloaded = ActiveRecord::new(db.clone(), schema);
        reloaded.load(supplied.id().cloned().unwrap()).await.unwrap();
        assert!(reloaded.is_saved());
    }

    #[test]
    fn test_schema_builder() {
        let schema = ModelSchema::new("t").without_timestamps().with_manual_identity();
        assert!(!schema.auto_timestamp);
        assert!(!schema.auto_increment_identity);
        assert!(schema.json_fields.is_empty());
    }
}
