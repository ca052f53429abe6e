use crate::{template, Bind, Dialect, Fragment};
use trellis_core::Value;

/// A mutable SELECT statement under construction.
///
/// Statements are assembled from raw fragments (the emitter and the hooks
/// collaborator own expression text) and rendered to a [`Fragment`] whose
/// binds appear in textual marker order: projections, then the FROM
/// subquery (including its limit and offset), then joins, filters, and
/// ordering.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    from: From,
    projections: Vec<Fragment>,
    /// Additional comma-joined FROM items (JSON unnest for lookup
    /// flattening).
    extra_from: Vec<Fragment>,
    joins: Vec<Fragment>,
    filters: Vec<Fragment>,
    order: Vec<Fragment>,
    limit: Option<Bind>,
    offset: Option<Bind>,
}

#[derive(Debug, Clone)]
enum From {
    Table {
        name: String,
        alias: Option<String>,
    },
    Subquery {
        query: Box<SelectQuery>,
        alias: String,
    },
}

impl SelectQuery {
    pub fn from_table(name: impl Into<String>) -> Self {
        Self::new(From::Table {
            name: name.into(),
            alias: None,
        })
    }

    pub fn from_table_as(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::new(From::Table {
            name: name.into(),
            alias: Some(alias.into()),
        })
    }

    pub fn from_subquery(query: SelectQuery, alias: impl Into<String>) -> Self {
        Self::new(From::Subquery {
            query: Box::new(query),
            alias: alias.into(),
        })
    }

    fn new(from: From) -> Self {
        Self {
            from,
            projections: Vec::new(),
            extra_from: Vec::new(),
            joins: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Adds a projection. With no projections the statement selects `*`.
    pub fn select(&mut self, fragment: Fragment) -> &mut Self {
        self.projections.push(fragment);
        self
    }

    pub fn from_item(&mut self, fragment: Fragment) -> &mut Self {
        self.extra_from.push(fragment);
        self
    }

    pub fn join(&mut self, fragment: Fragment) -> &mut Self {
        self.joins.push(fragment);
        self
    }

    /// Adds a WHERE condition, ANDed with the others. Each condition is
    /// parenthesized so OR groups keep their precedence.
    pub fn filter(&mut self, fragment: Fragment) -> &mut Self {
        self.filters.push(fragment);
        self
    }

    pub fn order_by(&mut self, fragment: Fragment) -> &mut Self {
        self.order.push(fragment);
        self
    }

    pub fn limit(&mut self, bind: Bind) -> &mut Self {
        self.limit = Some(bind);
        self
    }

    pub fn offset(&mut self, bind: Bind) -> &mut Self {
        self.offset = Some(bind);
        self
    }

    pub fn has_order(&self) -> bool {
        !self.order.is_empty()
    }

    /// Renders to SQL text with `?` markers and the binds in marker order.
    pub fn render(&self, dialect: &dyn Dialect) -> Fragment {
        let mut sql = String::new();
        let mut binds = Vec::new();

        sql.push_str("SELECT ");
        if self.projections.is_empty() {
            sql.push('*');
        } else {
            push_list(&mut sql, &mut binds, &self.projections, ", ");
        }

        sql.push_str(" FROM ");
        match &self.from {
            From::Table { name, alias } => {
                dialect.push_ident(&mut sql, name);
                if let Some(alias) = alias {
                    sql.push_str(" AS ");
                    dialect.push_ident(&mut sql, alias);
                }
            }
            From::Subquery { query, alias } => {
                let inner = query.render(dialect);
                sql.push('(');
                sql.push_str(&inner.sql);
                sql.push_str(") AS ");
                dialect.push_ident(&mut sql, alias);
                binds.extend(inner.binds);
            }
        }

        for item in &self.extra_from {
            sql.push_str(", ");
            sql.push_str(&item.sql);
            binds.extend(item.binds.iter().cloned());
        }

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.sql);
            binds.extend(join.binds.iter().cloned());
        }

        if !self.filters.is_empty() {
            sql.push_str(" WHERE ");
            for (i, filter) in self.filters.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" AND ");
                }
                sql.push('(');
                sql.push_str(&filter.sql);
                sql.push(')');
                binds.extend(filter.binds.iter().cloned());
            }
        }

        if !self.order.is_empty() {
            sql.push_str(" ORDER BY ");
            push_list(&mut sql, &mut binds, &self.order, ", ");
        }

        if let Some(limit) = &self.limit {
            sql.push_str(" LIMIT ?");
            binds.push(limit.clone());
        }
        if let Some(offset) = &self.offset {
            sql.push_str(" OFFSET ?");
            binds.push(offset.clone());
        }

        Fragment { sql, binds }
    }

    /// Renders with the dialect's positional markers, ready for direct
    /// execution.
    pub fn to_sql(&self, dialect: &dyn Dialect) -> CompiledQuery {
        CompiledQuery::from_fragment(self.render(dialect), dialect)
    }
}

fn push_list(sql: &mut String, binds: &mut Vec<Bind>, items: &[Fragment], sep: &str) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            sql.push_str(sep);
        }
        sql.push_str(&item.sql);
        binds.extend(item.binds.iter().cloned());
    }
}

/// A finished statement: dialect-marker SQL text plus its binds.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub binds: Vec<Bind>,
}

impl CompiledQuery {
    pub fn from_fragment(fragment: Fragment, dialect: &dyn Dialect) -> Self {
        let sql = template::expand_markers(&fragment.sql, |out, i| {
            dialect.push_marker(out, i + 1)
        });
        Self {
            sql,
            binds: fragment.binds,
        }
    }

    pub fn bind_values(&self) -> Vec<Value> {
        self.binds.iter().map(|bind| bind.value().clone()).collect()
    }
}
