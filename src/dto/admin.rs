use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    hooks::RowUpdate,
};

/// Query string of an admin list call. Reserved keys pick the ordering;
/// every other key is a column filter.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ListQuery {
    pub order_by: Option<String>,
    pub ascending: bool,
    pub filters: Vec<(String, Value)>,
}

impl ListQuery {
    pub fn from_params(params: HashMap<String, String>) -> AppResult<Self> {
        let mut query = ListQuery {
            ascending: true,
            ..Default::default()
        };
        for (key, raw) in params {
            match key.as_str() {
                "order_by" => query.order_by = Some(raw),
                "ascending" => {
                    query.ascending = raw.parse().map_err(|_| {
                        AppError::BadRequest(format!("ascending must be true or false, got {raw:?}"))
                    })?
                }
                _ => query.filters.push((key, filter_value(&raw))),
            }
        }
        query.filters.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(query)
    }
}

/// `a,b,c` is a membership list; booleans and integers keep their JSON
/// type so they compare equal to typed columns.
pub fn filter_value(raw: &str) -> Value {
    if raw.contains(',') {
        return Value::Array(raw.split(',').map(|item| scalar(item.trim())).collect());
    }
    scalar(raw)
}

fn scalar(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkUpdateItem {
    pub id: String,
    #[schema(value_type = Object)]
    pub data: Value,
}

impl From<BulkUpdateItem> for RowUpdate<Value> {
    fn from(item: BulkUpdateItem) -> Self {
        RowUpdate {
            id: item.id,
            data: item.data,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Deleted {
    pub id: String,
}
