//! List queries: filter, search, date range, sort and paginate.
//!
//! List endpoints accept a flat map of query parameters. A few names are
//! reserved (see [`RESERVED_PARAMS`]); every other parameter is an equality
//! filter on the top-level document field of the same name.

use crate::constants::MAX_PAGE_SIZE;
use crate::{ClinicError, ClinicResult};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

pub const RESERVED_PARAMS: [&str; 8] = [
    "page", "limit", "search", "sort", "order", "from", "to", "populate",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery {
    pub page: u32,
    /// Zero disables paging.
    pub limit: u32,
    pub search: Option<String>,
    pub sort: String,
    pub order: SortOrder,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub populate: bool,
    pub filters: BTreeMap<String, String>,
}

impl ListQuery {
    pub fn new(default_limit: u32) -> Self {
        Self {
            page: 1,
            limit: default_limit,
            search: None,
            sort: "createdAt".into(),
            order: SortOrder::Desc,
            from: None,
            to: None,
            populate: true,
            filters: BTreeMap::new(),
        }
    }

    /// Builds a query from raw request parameters.
    ///
    /// Blank values are ignored, so `?status=` behaves like no filter.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::InvalidInput` for non-numeric paging values,
    /// unknown sort orders or malformed dates.
    pub fn from_params(params: &HashMap<String, String>, default_limit: u32) -> ClinicResult<Self> {
        let mut query = Self::new(default_limit);

        for (key, raw) in params {
            let value = raw.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "page" => {
                    query.page = parse_number(key, value)?.max(1);
                }
                "limit" => {
                    query.limit = parse_number(key, value)?.min(MAX_PAGE_SIZE);
                }
                "search" => query.search = Some(value.to_lowercase()),
                "sort" => query.sort = value.to_string(),
                "order" => {
                    query.order = match value.to_ascii_lowercase().as_str() {
                        "asc" | "ascend" | "1" => SortOrder::Asc,
                        "desc" | "descend" | "-1" => SortOrder::Desc,
                        _ => {
                            return Err(ClinicError::InvalidInput(format!(
                                "order must be asc or desc, got: {}",
                                value
                            )))
                        }
                    }
                }
                "from" => query.from = Some(parse_date(key, value)?),
                "to" => query.to = Some(parse_date(key, value)?),
                "populate" => query.populate = !matches!(value, "false" | "0"),
                _ => {
                    query.filters.insert(key.clone(), value.to_string());
                }
            }
        }

        if let (Some(from), Some(to)) = (query.from, query.to) {
            if to < from {
                return Err(ClinicError::InvalidInput("to must not be before from".into()));
            }
        }

        Ok(query)
    }

    /// True if `doc` passes the filters, the search and the date range.
    pub fn matches(&self, doc: &Value, search_fields: &[&str], date_field: &str) -> bool {
        let filters_ok = self.filters.iter().all(|(field, expected)| {
            doc.get(field)
                .map(|v| value_matches(v, expected))
                .unwrap_or(false)
        });
        if !filters_ok {
            return false;
        }

        if let Some(search) = &self.search {
            let hit = search_fields.iter().any(|field| {
                doc.get(*field)
                    .and_then(value_as_text)
                    .map(|text| text.to_lowercase().contains(search.as_str()))
                    .unwrap_or(false)
            });
            if !hit {
                return false;
            }
        }

        if self.from.is_some() || self.to.is_some() {
            let Some(date) = doc.get(date_field).and_then(value_as_date) else {
                return false;
            };
            if self.from.is_some_and(|from| date < from) || self.to.is_some_and(|to| date > to) {
                return false;
            }
        }

        true
    }

    /// Sorts documents in place by the requested field and order.
    pub fn sort_values(&self, docs: &mut [Value]) {
        docs.sort_by(|a, b| {
            let ordering = compare_values(a.get(&self.sort), b.get(&self.sort));
            match self.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }

    /// Filters, sorts and slices `docs` into a page.
    pub fn apply(&self, docs: Vec<Value>, search_fields: &[&str], date_field: &str) -> Page<Value> {
        let mut matching: Vec<Value> = docs
            .into_iter()
            .filter(|doc| self.matches(doc, search_fields, date_field))
            .collect();
        self.sort_values(&mut matching);

        let total = matching.len();
        let data = if self.limit == 0 {
            matching
        } else {
            let skip = (self.page as usize - 1).saturating_mul(self.limit as usize);
            matching.into_iter().skip(skip).take(self.limit as usize).collect()
        };

        Page {
            data,
            total,
            page: if self.limit == 0 { 1 } else { self.page },
            limit: self.limit,
            pages: page_count(total, self.limit),
        }
    }
}

/// One page of a list response.
#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub pages: u32,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            pages: self.pages,
        }
    }
}

fn page_count(total: usize, limit: u32) -> u32 {
    if total == 0 {
        0
    } else if limit == 0 {
        1
    } else {
        total.div_ceil(limit as usize) as u32
    }
}

fn parse_number(key: &str, value: &str) -> ClinicResult<u32> {
    value
        .parse::<u32>()
        .map_err(|_| ClinicError::InvalidInput(format!("{} must be a non-negative integer", key)))
}

fn parse_date(key: &str, value: &str) -> ClinicResult<NaiveDate> {
    crate::models::dates::parse_date_prefix(value)
        .ok_or_else(|| ClinicError::InvalidInput(format!("{} must be a YYYY-MM-DD date", key)))
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_date(value: &Value) -> Option<NaiveDate> {
    value.as_str().and_then(crate::models::dates::parse_date_prefix)
}

fn value_matches(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s.eq_ignore_ascii_case(expected),
        Value::Number(n) => match (n.as_f64(), expected.parse::<f64>()) {
            (Some(a), Ok(b)) => a == b,
            _ => n.to_string() == expected,
        },
        Value::Bool(b) => b.to_string() == expected.to_ascii_lowercase(),
        Value::Null => expected == "null",
        Value::Array(items) => items.iter().any(|item| value_matches(item, expected)),
        Value::Object(_) => false,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.to_lowercase().cmp(&y.to_lowercase()),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sample() -> Vec<Value> {
        vec![
            json!({"name": "Ayesha Khan", "mrNumber": "MR-000001", "status": "Admitted", "date": "2024-03-01", "age": 30}),
            json!({"name": "Bilal Ahmed", "mrNumber": "MR-000002", "status": "Discharged", "date": "2024-03-05", "age": 45}),
            json!({"name": "Sana Malik", "mrNumber": "MR-000003", "status": "Admitted", "date": "2024-03-09", "age": 12}),
        ]
    }

    #[test]
    fn test_from_params_defaults() {
        let query = ListQuery::from_params(&HashMap::new(), 10).unwrap();
        assert_eq!(query, ListQuery::new(10));
    }

    #[test]
    fn test_from_params_separates_filters() {
        let query = ListQuery::from_params(
            &params(&[("page", "2"), ("limit", "5"), ("status", "Admitted"), ("search", " Khan ")]),
            10,
        )
        .unwrap();

        assert_eq!(query.page, 2);
        assert_eq!(query.limit, 5);
        assert_eq!(query.search.as_deref(), Some("khan"));
        assert_eq!(query.filters.get("status").map(String::as_str), Some("Admitted"));
    }

    #[test]
    fn test_from_params_rejects_bad_values() {
        assert!(ListQuery::from_params(&params(&[("page", "two")]), 10).is_err());
        assert!(ListQuery::from_params(&params(&[("order", "sideways")]), 10).is_err());
        assert!(ListQuery::from_params(&params(&[("from", "03/01/2024")]), 10).is_err());
        assert!(
            ListQuery::from_params(&params(&[("from", "2024-03-09"), ("to", "2024-03-01")]), 10)
                .is_err()
        );
    }

    #[test]
    fn test_blank_params_are_ignored() {
        let query = ListQuery::from_params(&params(&[("status", ""), ("search", "  ")]), 10).unwrap();
        assert!(query.filters.is_empty());
        assert!(query.search.is_none());
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let query = ListQuery::from_params(&params(&[("status", "admitted")]), 10).unwrap();
        let page = query.apply(sample(), &["name"], "date");
        assert_eq!(page.total, 2);
    }

    #[test]
    fn test_numeric_filter() {
        let query = ListQuery::from_params(&params(&[("age", "45")]), 10).unwrap();
        let page = query.apply(sample(), &["name"], "date");
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0]["name"], "Bilal Ahmed");
    }

    #[test]
    fn test_search_over_fields() {
        let query = ListQuery::from_params(&params(&[("search", "mr-000003")]), 10).unwrap();
        let page = query.apply(sample(), &["name", "mrNumber"], "date");
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0]["name"], "Sana Malik");
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let query =
            ListQuery::from_params(&params(&[("from", "2024-03-05"), ("to", "2024-03-09")]), 10)
                .unwrap();
        let page = query.apply(sample(), &[], "date");
        assert_eq!(page.total, 2);
    }

    #[test]
    fn test_sort_ascending_by_number() {
        let query = ListQuery::from_params(&params(&[("sort", "age"), ("order", "asc")]), 10).unwrap();
        let page = query.apply(sample(), &[], "date");
        let ages: Vec<i64> = page.data.iter().map(|d| d["age"].as_i64().unwrap()).collect();
        assert_eq!(ages, vec![12, 30, 45]);
    }

    #[test]
    fn test_pagination() {
        let query =
            ListQuery::from_params(&params(&[("limit", "2"), ("page", "2"), ("sort", "name"), ("order", "asc")]), 10)
                .unwrap();
        let page = query.apply(sample(), &[], "date");

        assert_eq!(page.total, 3);
        assert_eq!(page.pages, 2);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0]["name"], "Sana Malik");
    }

    #[test]
    fn test_limit_zero_returns_everything() {
        let query = ListQuery::from_params(&params(&[("limit", "0")]), 10).unwrap();
        let page = query.apply(sample(), &[], "date");
        assert_eq!(page.data.len(), 3);
        assert_eq!(page.pages, 1);
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let query = ListQuery::from_params(&params(&[("page", "9")]), 10).unwrap();
        let page = query.apply(sample(), &[], "date");
        assert!(page.data.is_empty());
        assert_eq!(page.total, 3);
    }
}
