use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::{RemoteError, RemoteResult, ensure_identifier};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderBy {
    pub column: String,
    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

fn default_ascending() -> bool {
    true
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { column: String, value: Value },
    In { column: String, values: Vec<Value> },
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq { column, .. } | Filter::In { column, .. } => column,
        }
    }

    pub fn matches(&self, row: &Value) -> bool {
        let cell = row.get(self.column()).unwrap_or(&Value::Null);
        match self {
            Filter::Eq { value, .. } => cell == value,
            Filter::In { values, .. } => values.contains(cell),
        }
    }
}

/// Configuration of a table hook: what to read and whether to follow changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableOptions {
    /// Scalars compare by equality, arrays by membership, nulls are ignored.
    pub filter: BTreeMap<String, Value>,
    pub order_by: Option<OrderBy>,
    pub joins: Vec<String>,
    pub select: Option<String>,
    pub realtime: bool,
}

impl TableOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(column.into(), value.into());
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order_by = Some(OrderBy {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn join(mut self, expr: impl Into<String>) -> Self {
        self.joins.push(expr.into());
        self
    }

    pub fn select(mut self, projection: impl Into<String>) -> Self {
        self.select = Some(projection.into());
        self
    }

    pub fn realtime(mut self, enabled: bool) -> Self {
        self.realtime = enabled;
        self
    }

    /// Select projection with the join expressions appended, e.g.
    /// `*, categories!products_category_id_fkey(name, slug)`.
    pub fn projection(&self) -> String {
        let base = self.select.as_deref().unwrap_or("*");
        if self.joins.is_empty() {
            base.to_string()
        } else {
            format!("{}, {}", base, self.joins.join(", "))
        }
    }

    pub fn to_query(&self, table: &str) -> RemoteResult<SelectQuery> {
        let mut query = SelectQuery::new(table)?.columns(self.projection());
        for (column, value) in &self.filter {
            ensure_identifier(column)?;
            let filter = match value {
                Value::Null => continue,
                Value::Array(values) => Filter::In {
                    column: column.clone(),
                    values: values.clone(),
                },
                other => Filter::Eq {
                    column: column.clone(),
                    value: other.clone(),
                },
            };
            query.filters.push(filter);
        }
        if let Some(order) = &self.order_by {
            ensure_identifier(&order.column)?;
            query.order = Some(order.clone());
        }
        Ok(query)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl SelectQuery {
    pub fn new(table: &str) -> RemoteResult<Self> {
        ensure_identifier(table)?;
        Ok(Self {
            table: table.to_string(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        })
    }

    pub fn columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One item of a select projection.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Column(String),
    Embed(JoinExpr),
}

/// Related-table expansion, `[alias:]table[!hint](col, ...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinExpr {
    pub alias: Option<String>,
    pub table: String,
    pub hint: Option<String>,
    pub columns: Vec<String>,
}

impl JoinExpr {
    pub fn parse(expr: &str) -> RemoteResult<Self> {
        let invalid = || RemoteError::InvalidPayload(format!("bad join expression {expr:?}"));
        let open = expr.find('(').ok_or_else(invalid)?;
        if !expr.trim_end().ends_with(')') {
            return Err(invalid());
        }
        let head = expr[..open].trim();
        let body = &expr.trim_end()[open + 1..expr.trim_end().len() - 1];

        let (alias, target) = match head.split_once(':') {
            Some((alias, target)) => (Some(alias.trim().to_string()), target.trim()),
            None => (None, head),
        };
        let (table, hint) = match target.split_once('!') {
            Some((table, hint)) => (table.trim().to_string(), Some(hint.trim().to_string())),
            None => (target.to_string(), None),
        };

        ensure_identifier(&table)?;
        if let Some(alias) = &alias {
            ensure_identifier(alias)?;
        }
        if let Some(hint) = &hint {
            ensure_identifier(hint)?;
        }
        let columns = body
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        for column in &columns {
            if column != "*" {
                ensure_identifier(column)?;
            }
        }

        Ok(Self {
            alias,
            table,
            hint,
            columns,
        })
    }

    /// Key the embedded object is stored under in the parent row.
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    /// Column on `source` referencing the embedded table. Uses the
    /// `{source}_{column}_fkey` constraint name when given, otherwise
    /// `{singular}_id`.
    pub fn foreign_key(&self, source: &str) -> String {
        if let Some(column) = self.hint.as_deref().and_then(|hint| {
            hint.strip_prefix(source)
                .and_then(|rest| rest.strip_prefix('_'))
                .and_then(|rest| rest.strip_suffix("_fkey"))
        }) {
            return column.to_string();
        }
        format!("{}_id", singular(&self.table))
    }
}

fn singular(table: &str) -> String {
    if let Some(stem) = table.strip_suffix("ies") {
        format!("{stem}y")
    } else if let Some(stem) = table.strip_suffix('s') {
        stem.to_string()
    } else {
        table.to_string()
    }
}

/// Splits a projection on top-level commas.
pub fn parse_projection(columns: &str) -> RemoteResult<Vec<Projection>> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (idx, ch) in columns.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(&columns[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    items.push(&columns[start..]);

    items
        .into_iter()
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            if item == "*" {
                Ok(Projection::All)
            } else if item.contains('(') {
                JoinExpr::parse(item).map(Projection::Embed)
            } else {
                ensure_identifier(item)?;
                Ok(Projection::Column(item.to_string()))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn filter_values_split_into_equality_and_membership() {
        let options = TableOptions::new()
            .filter("active", true)
            .filter("status", json!(["pending", "confirmed"]))
            .filter("brand_id", Value::Null);
        let query = options.to_query("products").unwrap();

        assert_eq!(query.filters.len(), 2);
        assert!(query.filters.contains(&Filter::Eq {
            column: "active".into(),
            value: json!(true),
        }));
        assert!(query.filters.contains(&Filter::In {
            column: "status".into(),
            values: vec![json!("pending"), json!("confirmed")],
        }));
    }

    #[test]
    fn joins_are_appended_to_projection() {
        let options = TableOptions::new()
            .join("categories!products_category_id_fkey(name, slug)")
            .join("brands!products_brand_id_fkey(name, slug)");
        assert_eq!(
            options.projection(),
            "*, categories!products_category_id_fkey(name, slug), brands!products_brand_id_fkey(name, slug)"
        );
        assert_eq!(TableOptions::new().projection(), "*");
    }

    #[test]
    fn rejects_unsafe_names() {
        assert!(TableOptions::new().to_query("products; drop").is_err());
        assert!(
            TableOptions::new()
                .order_by("name desc", true)
                .to_query("products")
                .is_err()
        );
    }

    #[test]
    fn join_expression_resolves_foreign_key() {
        let join = JoinExpr::parse("categories!products_category_id_fkey(name, slug)").unwrap();
        assert_eq!(join.table, "categories");
        assert_eq!(join.key(), "categories");
        assert_eq!(join.columns, vec!["name", "slug"]);
        assert_eq!(join.foreign_key("products"), "category_id");

        let bare = JoinExpr::parse("customer:customers(full_name)").unwrap();
        assert_eq!(bare.key(), "customer");
        assert_eq!(bare.foreign_key("orders"), "customer_id");
    }

    #[test]
    fn projection_splits_on_top_level_commas() {
        let items = parse_projection("*, brands(name, slug), sku").unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], Projection::All);
        assert!(matches!(&items[1], Projection::Embed(join) if join.columns.len() == 2));
        assert_eq!(items[2], Projection::Column("sku".into()));
    }
}
