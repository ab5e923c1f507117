use std::fmt;

/// What a store can answer. Consulted by the engine before plans are
/// compiled or operations dispatched; a capability gap surfaces as a typed
/// error, never as silently dropped work.
#[derive(Debug)]
pub struct Capability {
    /// When true, the store speaks a SQL-derived query language and accepts
    /// raw where-clause passthrough.
    pub sql: bool,

    /// The store materializes tables/collections up front.
    pub schema_ddl: bool,

    /// The store can combine filters over more than one field in a single
    /// plan.
    pub multi_field_filter: bool,

    /// The store resolves `load_related` paths eagerly. Without it the
    /// marks are ignored.
    pub eager_load: bool,

    pub query_count: bool,
    pub query_all: bool,
    pub query_delete: bool,
    pub query_get: bool,
}

/// Terminal query operations a store may or may not answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOp {
    Count,
    All,
    Delete,
    Get,
}

impl Capability {
    /// A full-featured document store.
    pub const DOCUMENT: Self = Self {
        sql: false,
        schema_ddl: true,
        multi_field_filter: true,
        eager_load: true,
        query_count: true,
        query_all: true,
        query_delete: true,
        query_get: true,
    };

    /// A flat key-value store: single-field filters only, no schema, no
    /// eager loading.
    pub const KEY_VALUE: Self = Self {
        schema_ddl: false,
        multi_field_filter: false,
        eager_load: false,
        ..Self::DOCUMENT
    };

    pub fn supports(&self, op: QueryOp) -> bool {
        match op {
            QueryOp::Count => self.query_count,
            QueryOp::All => self.query_all,
            QueryOp::Delete => self.query_delete,
            QueryOp::Get => self.query_get,
        }
    }
}

impl fmt::Display for QueryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Count => "count",
            Self::All => "all",
            Self::Delete => "delete",
            Self::Get => "get",
        };
        f.write_str(name)
    }
}
