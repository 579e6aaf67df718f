//! Read/write request model for the tabular data endpoint.
//!
//! A [`Query`] renders to the query-string dialect of the backend:
//! `col=eq.value`, `col=in.(a,b)`, `or=(a.eq.1,b.eq.2)`,
//! `select=col,relation(cols)`, `order=col.desc`, `limit=n`.
//! Filters can also be evaluated against a JSON row, which is what the
//! in-memory double uses.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Value};

/// Comparison operator of a single-column filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    Is,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Eq => "eq",
            Op::Neq => "neq",
            Op::Gt => "gt",
            Op::Gte => "gte",
            Op::Lt => "lt",
            Op::Lte => "lte",
            Op::Like => "like",
            Op::ILike => "ilike",
            Op::Is => "is",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row filter.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Compare {
        column: String,
        op: Op,
        value: String,
    },
    In {
        column: String,
        values: Vec<String>,
    },
    Or(Vec<Filter>),
}

impl Filter {
    pub fn compare(column: impl Into<String>, op: Op, value: impl ToString) -> Self {
        Filter::Compare {
            column: column.into(),
            op,
            value: value.to_string(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl ToString) -> Self {
        Self::compare(column, Op::Eq, value)
    }

    pub fn neq(column: impl Into<String>, value: impl ToString) -> Self {
        Self::compare(column, Op::Neq, value)
    }

    pub fn gt(column: impl Into<String>, value: impl ToString) -> Self {
        Self::compare(column, Op::Gt, value)
    }

    pub fn gte(column: impl Into<String>, value: impl ToString) -> Self {
        Self::compare(column, Op::Gte, value)
    }

    pub fn lt(column: impl Into<String>, value: impl ToString) -> Self {
        Self::compare(column, Op::Lt, value)
    }

    pub fn lte(column: impl Into<String>, value: impl ToString) -> Self {
        Self::compare(column, Op::Lte, value)
    }

    /// Pattern match; `*` is the wildcard.
    pub fn like(column: impl Into<String>, pattern: impl ToString) -> Self {
        Self::compare(column, Op::Like, pattern)
    }

    /// Case-insensitive pattern match; `*` is the wildcard.
    pub fn ilike(column: impl Into<String>, pattern: impl ToString) -> Self {
        Self::compare(column, Op::ILike, pattern)
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::compare(column, Op::Is, "null")
    }

    pub fn is_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        Filter::In {
            column: column.into(),
            values: values.into_iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    /// Render as a query-string pair.
    pub fn to_param(&self) -> (String, String) {
        match self {
            Filter::Compare { column, op, value } => (column.clone(), format!("{op}.{value}")),
            Filter::In { column, values } => (column.clone(), format!("in.({})", quote_list(values))),
            Filter::Or(filters) => ("or".to_string(), format!("({})", inline_list(filters))),
        }
    }

    /// Render in the nested form used inside `or=(...)`.
    fn to_inline(&self) -> String {
        match self {
            Filter::Compare { column, op, value } => {
                format!("{column}.{op}.{}", quote_value(value))
            }
            Filter::In { column, values } => format!("{column}.in.({})", quote_list(values)),
            Filter::Or(filters) => format!("or({})", inline_list(filters)),
        }
    }

    /// Evaluate against a JSON row.
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        match self {
            Filter::Compare { column, op, value } => compare_cell(row.get(column), *op, value),
            Filter::In { column, values } => {
                let cell = row.get(column).map(cell_text);
                cell.is_some_and(|text| values.iter().any(|v| *v == text))
            }
            Filter::Or(filters) => filters.iter().any(|f| f.matches(row)),
        }
    }
}

fn inline_list(filters: &[Filter]) -> String {
    filters
        .iter()
        .map(Filter::to_inline)
        .collect::<Vec<_>>()
        .join(",")
}

fn quote_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| quote_value(v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Double-quote list members that contain reserved characters.
fn quote_value(value: &str) -> String {
    let reserved = value
        .chars()
        .any(|c| matches!(c, ',' | '(' | ')' | '"' | ':') || c.is_whitespace());
    if !reserved {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Text form of a JSON cell as the backend would compare it.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn compare_cell(cell: Option<&Value>, op: Op, expected: &str) -> bool {
    let cell = cell.unwrap_or(&Value::Null);
    let text = || (!cell.is_null()).then(|| cell_text(cell));
    match op {
        Op::Is => match expected {
            "null" => cell.is_null(),
            "true" => cell == &Value::Bool(true),
            "false" => cell == &Value::Bool(false),
            _ => false,
        },
        Op::Eq => text().is_some_and(|t| t == expected),
        Op::Neq => text().is_some_and(|t| t != expected),
        Op::Gt => text().is_some_and(|t| compare_text(&t, expected) == Ordering::Greater),
        Op::Gte => text().is_some_and(|t| compare_text(&t, expected) != Ordering::Less),
        Op::Lt => text().is_some_and(|t| compare_text(&t, expected) == Ordering::Less),
        Op::Lte => text().is_some_and(|t| compare_text(&t, expected) != Ordering::Greater),
        Op::Like => text().is_some_and(|t| glob_match(expected, &t)),
        Op::ILike => {
            text().is_some_and(|t| glob_match(&expected.to_lowercase(), &t.to_lowercase()))
        }
    }
}

fn compare_text(left: &str, right: &str) -> Ordering {
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(l), Ok(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        _ => left.cmp(right),
    }
}

/// `*` and `%` match any run of characters.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && matches!(pattern[p], '*' | '%') {
            star = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| matches!(c, '*' | '%'))
}

/// Sort key for one column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }

    fn render(&self) -> String {
        let direction = if self.descending { "desc" } else { "asc" };
        format!("{}.{direction}", self.column)
    }

    /// Nulls sort last ascending and first descending.
    pub fn compare(&self, a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
        let ordering = match (a.get(&self.column), b.get(&self.column)) {
            (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
            (None | Some(Value::Null), _) => Ordering::Greater,
            (_, None | Some(Value::Null)) => Ordering::Less,
            (Some(Value::Number(l)), Some(Value::Number(r))) => l
                .as_f64()
                .partial_cmp(&r.as_f64())
                .unwrap_or(Ordering::Equal),
            (Some(l), Some(r)) => cell_text(l).cmp(&cell_text(r)),
        };
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

fn render_orders(orders: &[Order]) -> String {
    orders
        .iter()
        .map(Order::render)
        .collect::<Vec<_>>()
        .join(",")
}

/// A related table embedded into each returned row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Embed {
    pub relation: String,
    /// Foreign-key hint, rendered as `relation!hint`.
    pub hint: Option<String>,
    pub columns: Vec<String>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Embed {
    pub fn new(relation: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            relation: relation.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn render(&self) -> String {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(",")
        };
        match &self.hint {
            Some(hint) => format!("{}!{hint}({columns})", self.relation),
            None => format!("{}({columns})", self.relation),
        }
    }

    fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if !self.order.is_empty() {
            params.push((
                format!("{}.order", self.relation),
                render_orders(&self.order),
            ));
        }
        if let Some(limit) = self.limit {
            params.push((format!("{}.limit", self.relation), limit.to_string()));
        }
        params
    }
}

/// Column projection plus embedded relations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Select {
    pub columns: Vec<String>,
    pub embeds: Vec<Embed>,
}

impl Select {
    pub fn all() -> Self {
        Self::columns(&["*"])
    }

    pub fn columns(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            embeds: Vec::new(),
        }
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    /// True when every plain column is requested.
    pub fn is_wildcard(&self) -> bool {
        self.columns.is_empty() || self.columns.iter().any(|c| c == "*")
    }

    pub fn render(&self) -> String {
        let mut parts: Vec<String> = if self.columns.is_empty() {
            vec!["*".to_string()]
        } else {
            self.columns.clone()
        };
        parts.extend(self.embeds.iter().map(Embed::render));
        parts.join(",")
    }
}

/// A read request against one table.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub table: String,
    pub select: Select,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: Select::all(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn select(mut self, select: Select) -> Self {
        self.select = select;
        self
    }

    pub fn columns(self, columns: &[&str]) -> Self {
        self.select(Select::columns(columns))
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.select.embeds.push(embed);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query-string pairs in a stable order.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select.render())];
        params.extend(filter_params(&self.filters));
        for embed in &self.select.embeds {
            params.extend(embed.params());
        }
        if !self.order.is_empty() {
            params.push(("order".to_string(), render_orders(&self.order)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

pub fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(Filter::to_param).collect()
}

/// Whether a write echoes the affected rows back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Returning {
    #[default]
    Minimal,
    Representation,
}

impl Returning {
    /// Value of the `Prefer` header.
    pub fn prefer_header(&self) -> &'static str {
        match self {
            Returning::Minimal => "return=minimal",
            Returning::Representation => "return=representation",
        }
    }
}
