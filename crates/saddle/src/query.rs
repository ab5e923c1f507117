mod compile;

use crate::{Error, Result, Store};

use saddle_core::driver::{CompiledQuery, QueryOp};
use saddle_core::schema::{ModelId, Schema};
use saddle_core::stmt::{Instance, QueryPlan, Value};

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A lazy, chainable query against one manager.
///
/// Every chaining call copies the whole builder; nothing nested is shared
/// with the ancestor, and extending one chain never leaks into another. Each
/// `Query` value compiles at most once: the first terminal call builds and
/// caches the backend plan, and later terminals reuse it. A chained call
/// starts with an empty cache of its own.
pub struct Query {
    schema: Arc<Schema>,
    model: ModelId,
    store: Store,

    /// Raw lookup expressions, in application order. Repeated calls on one
    /// lookup accumulate values rather than overwrite.
    filters: IndexMap<String, Vec<FilterValue>>,
    excludes: IndexMap<String, Vec<FilterValue>>,

    unions: Vec<Query>,
    intersections: Vec<Query>,
    where_raw: Vec<String>,
    load_related: Vec<String>,

    compiled: OnceCell<Arc<dyn CompiledQuery>>,
}

/// A value handed to `filter`/`exclude`: a plain value, or another query
/// whose result keys the operand matches against.
#[derive(Debug, Clone)]
pub enum FilterValue {
    Value(Value),
    Query(Box<Query>),
}

impl Query {
    pub(crate) fn new(schema: Arc<Schema>, model: ModelId, store: Store) -> Query {
        Query {
            schema,
            model,
            store,
            filters: IndexMap::new(),
            excludes: IndexMap::new(),
            unions: vec![],
            intersections: vec![],
            where_raw: vec![],
            load_related: vec![],
            compiled: OnceCell::new(),
        }
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Adds a positive filter term, e.g. `filter("age__gt", 21)`.
    pub fn filter(&self, lookup: &str, value: impl Into<FilterValue>) -> Query {
        let mut next = self.clone();
        next.filters
            .entry(lookup.to_string())
            .or_default()
            .push(value.into());
        next
    }

    /// Adds a negative filter term: matching rows are dropped.
    pub fn exclude(&self, lookup: &str, value: impl Into<FilterValue>) -> Query {
        let mut next = self.clone();
        next.excludes
            .entry(lookup.to_string())
            .or_default()
            .push(value.into());
        next
    }

    /// Merges another query's result set into this one.
    pub fn union(&self, other: &Query) -> Query {
        let mut next = self.clone();
        next.unions.push(other.clone());
        next
    }

    /// Restricts this query's result set to another's.
    pub fn intersect(&self, other: &Query) -> Query {
        let mut next = self.clone();
        next.intersections.push(other.clone());
        next
    }

    /// Appends a raw backend expression, passed through untouched. Only
    /// stores with a query language accept these.
    pub fn where_raw(&self, expr: &str) -> Query {
        let mut next = self.clone();
        next.where_raw.push(expr.to_string());
        next
    }

    /// Marks a relation path for eager resolution. A no-op on stores that
    /// do not implement eager loading.
    pub fn load_related(&self, path: &str) -> Query {
        let mut next = self.clone();
        next.load_related.push(path.to_string());
        next
    }

    /// The backend-independent plan this query compiles to.
    pub fn plan(&self) -> Result<QueryPlan> {
        compile::build_plan(self)
    }

    pub async fn count(&self) -> Result<u64> {
        self.check_op(QueryOp::Count)?;
        self.compiled().await?.count().await
    }

    pub async fn all(&self) -> Result<Vec<Instance>> {
        self.check_op(QueryOp::All)?;
        self.compiled().await?.all().await
    }

    pub async fn delete(&self) -> Result<u64> {
        self.check_op(QueryOp::Delete)?;
        self.compiled().await?.delete().await
    }

    /// The first matching record, if any.
    pub async fn first(&self) -> Result<Option<Instance>> {
        self.check_op(QueryOp::All)?;
        let mut all = self.compiled().await?.all().await?;
        if all.is_empty() {
            return Ok(None);
        }
        Ok(Some(all.swap_remove(0)))
    }

    /// Exactly like [`Query::first`], except absence is a `ModelNotFound`
    /// error.
    pub async fn get(&self) -> Result<Instance> {
        self.first().await?.ok_or_else(|| {
            let model = self.schema.model(self.model);
            Error::model_not_found(format!("query on `{}` matched nothing", model.name.original()))
        })
    }

    /// The compiled plan for this query value, built on first use.
    pub async fn compiled(&self) -> Result<&Arc<dyn CompiledQuery>> {
        self.compiled
            .get_or_try_init(|| async {
                let plan = self.plan()?;
                self.store.driver().compile_query(&self.schema, plan).await
            })
            .await
    }

    fn check_op(&self, op: QueryOp) -> Result<()> {
        if !self.store.has_query(op) {
            return Err(Error::query(format!(
                "store `{}` does not support operation `{op}`",
                self.store.url()
            )));
        }
        Ok(())
    }

    pub(crate) fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

impl Clone for Query {
    /// A full copy with an empty compile cache: the clone compiles its own
    /// plan on first use.
    fn clone(&self) -> Query {
        Query {
            schema: self.schema.clone(),
            model: self.model,
            store: self.store.clone(),
            filters: self.filters.clone(),
            excludes: self.excludes.clone(),
            unions: self.unions.clone(),
            intersections: self.intersections.clone(),
            where_raw: self.where_raw.clone(),
            load_related: self.load_related.clone(),
            compiled: OnceCell::new(),
        }
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("model", &self.model)
            .field("filters", &self.filters)
            .field("excludes", &self.excludes)
            .field("unions", &self.unions.len())
            .field("intersections", &self.intersections.len())
            .field("compiled", &self.compiled.initialized())
            .finish()
    }
}

impl From<Value> for FilterValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Value(value.into())
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Value(value.into())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Value(value.into())
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Value(value.into())
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Value(value.into())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Value(value.into())
    }
}

impl From<Vec<Value>> for FilterValue {
    fn from(items: Vec<Value>) -> Self {
        Self::Value(Value::List(items))
    }
}

impl From<Query> for FilterValue {
    fn from(query: Query) -> Self {
        Self::Query(Box::new(query))
    }
}

impl From<&Query> for FilterValue {
    fn from(query: &Query) -> Self {
        Self::Query(Box::new(query.clone()))
    }
}

impl FilterValue {
    /// Membership list helper for `__in` lookups.
    pub fn list(items: impl IntoIterator<Item = impl Into<Value>>) -> FilterValue {
        Self::Value(Value::List(items.into_iter().map(Into::into).collect()))
    }
}
