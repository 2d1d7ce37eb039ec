//! Render composed catalog queries to parameterized PostgreSQL.
//!
//! Every user-derived value is bound as a positional parameter with an explicit
//! cast (`$n::TEXT`, `$n::BIGINT`, `$n::BOOLEAN`); query text is built only from
//! the fixed column and join vocabulary of `predicate`.
//!
//! Relations:
//!   entries e          (id, collection, directory_id, path, title, description, file_size,
//!                       file_modified, entry_created, entry_updated, game, engine,
//!                       is_singleplayer, is_cooperative, is_deathmatch)
//!   entry_textfile et  (entry_id, text)       -- optional, outer joined
//!   directories d      (id, collection, name, path, parent_id)
//!   maps m             (entry_id)

use crate::facets::SortOrder;
use crate::query::compose::{DirectoryQuery, DirectoryRef, EntryQuery, OrderKey, Projection};
use crate::query::predicate::{Column, Join, MatchTerm, Operand, Predicate, ScoreExpr, Value};

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub text: String,
    pub params: Vec<SqlValue>,
}

const ENTRY_COLUMNS: &str = "e.id::BIGINT, e.collection, e.path, e.title, e.file_size::BIGINT, \
     e.entry_created::BIGINT, e.file_modified::BIGINT, e.entry_updated::BIGINT, \
     e.game::BIGINT, e.engine::BIGINT, e.is_singleplayer, e.is_cooperative, e.is_deathmatch, e.description, \
     (SELECT COUNT(*) FROM maps m WHERE m.entry_id = e.id)::BIGINT AS map_count";

/// Qualified column reference.
pub fn column_ref(column: Column) -> String {
    match column.join() {
        Some(Join::Textfile) => format!("et.{}", column.name()),
        None => format!("e.{}", column.name()),
    }
}

fn join_clause(join: Join) -> &'static str {
    match join {
        Join::Textfile => "LEFT JOIN entry_textfile et ON et.entry_id = e.id",
    }
}

/// `tok:* | tok2:*`. Tokens are word runs, so they carry no tsquery operators.
pub fn prefix_tsquery(tokens: &[String]) -> String {
    tokens.iter().map(|t| format!("{}:*", t)).collect::<Vec<_>>().join(" | ")
}

#[derive(Default)]
struct Renderer {
    params: Vec<SqlValue>,
}

impl Renderer {
    fn bind(&mut self, v: SqlValue) -> String {
        let cast = match &v {
            SqlValue::Text(_) => "TEXT",
            SqlValue::Int(_) => "BIGINT",
            SqlValue::Bool(_) => "BOOLEAN",
        };
        self.params.push(v);
        format!("${}::{}", self.params.len(), cast)
    }

    fn bind_value(&mut self, v: &Value) -> String {
        self.bind(match v {
            Value::Text(s) => SqlValue::Text(s.clone()),
            Value::Int(i) => SqlValue::Int(*i),
            Value::Bool(b) => SqlValue::Bool(*b),
        })
    }

    fn tsvector(column: Column) -> String {
        let col = column_ref(column);
        match column {
            // Split path separators and extensions into words, like the in-memory store does.
            Column::Path => format!("to_tsvector('simple', regexp_replace({}, '[^[:alnum:]_]+', ' ', 'g'))", col),
            _ => format!("to_tsvector('simple', COALESCE({}, ''))", col),
        }
    }

    fn match_term(&mut self, term: &MatchTerm) -> String {
        let q = self.bind(SqlValue::Text(prefix_tsquery(&term.tokens)));
        format!("{} @@ to_tsquery('simple', {})", Self::tsvector(term.column), q)
    }

    fn rank_term(&mut self, term: &MatchTerm) -> String {
        let q = self.bind(SqlValue::Text(prefix_tsquery(&term.tokens)));
        format!("ts_rank({}, to_tsquery('simple', {}))", Self::tsvector(term.column), q)
    }

    fn score(&mut self, expr: &ScoreExpr) -> String {
        if expr.terms.is_empty() {
            return "0::FLOAT8".to_string();
        }
        let parts: Vec<String> = expr.terms.iter().map(|t| self.rank_term(t)).collect();
        format!("({})::FLOAT8", parts.join(" + "))
    }

    fn predicate(&mut self, p: &Predicate) -> String {
        match p {
            Predicate::Match(term) => self.match_term(term),
            Predicate::Equals { column, value } => format!("{} = {}", column_ref(*column), self.bind_value(value)),
            Predicate::IsNull(column) => format!("{} IS NULL", column_ref(*column)),
            Predicate::In { column, values } => {
                if values.is_empty() {
                    return "FALSE".to_string();
                }
                let bound: Vec<String> = values.iter().map(|v| self.bind_value(v)).collect();
                format!("{} IN ({})", column_ref(*column), bound.join(", "))
            }
            Predicate::Compare { column, op, rhs } => {
                let rhs = match rhs {
                    Operand::Value(v) => self.bind_value(v),
                    Operand::Column(c) => column_ref(*c),
                };
                format!("{} {} {}", column_ref(*column), op.symbol(), rhs)
            }
            Predicate::And(children) => self.group(children, " AND ", "TRUE"),
            Predicate::Or(children) => self.group(children, " OR ", "FALSE"),
        }
    }

    fn group(&mut self, children: &[Predicate], sep: &str, empty: &str) -> String {
        match children.len() {
            0 => empty.to_string(),
            1 => self.predicate(&children[0]),
            _ => {
                let parts: Vec<String> = children.iter().map(|c| self.predicate(c)).collect();
                format!("({})", parts.join(sep))
            }
        }
    }
}

fn direction(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "ASC NULLS FIRST",
        SortOrder::Desc => "DESC NULLS LAST",
    }
}

fn order_expr(key: &OrderKey) -> String {
    match key {
        OrderKey::Score => "score".to_string(),
        OrderKey::Column(Column::Title) => "COALESCE(NULLIF(BTRIM(e.title), ''), e.path)".to_string(),
        OrderKey::Column(c) => column_ref(*c),
    }
}

/// Row or count query, depending on the projection.
pub fn render_entries(q: &EntryQuery) -> Rendered {
    let mut r = Renderer::default();
    let select = match &q.projection {
        Projection::Count => "COUNT(*)::BIGINT".to_string(),
        Projection::Rows { score: Some(expr) } => format!("{}, {} AS score", ENTRY_COLUMNS, r.score(expr)),
        Projection::Rows { score: None } => format!("{}, NULL::FLOAT8 AS score", ENTRY_COLUMNS),
    };
    let mut text = format!("SELECT {} FROM entries e", select);
    for join in q.joins() {
        text.push(' ');
        text.push_str(join_clause(join));
    }
    let filter = r.predicate(&q.filter);
    text.push_str(" WHERE ");
    text.push_str(&filter);
    if !q.order_by.is_empty() {
        let keys: Vec<String> = q.order_by.iter().map(|o| format!("{} {}", order_expr(&o.key), direction(o.order))).collect();
        text.push_str(" ORDER BY ");
        text.push_str(&keys.join(", "));
    }
    if let Some(page) = q.page {
        let limit = r.bind(SqlValue::Int(page.limit as i64));
        let offset = r.bind(SqlValue::Int(i64::try_from(page.offset).unwrap_or(i64::MAX)));
        text.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
    }
    Rendered { text, params: r.params }
}

pub fn render_directories(q: &DirectoryQuery) -> Rendered {
    let mut r = Renderer::default();
    let collection = r.bind(SqlValue::Text(q.collection.clone()));
    let parent = match q.parent {
        DirectoryRef::Root => "d.parent_id IS NULL".to_string(),
        DirectoryRef::Id(id) => format!("d.parent_id = {}", r.bind(SqlValue::Int(id))),
    };
    let text = format!(
        "SELECT d.name, d.path FROM directories d WHERE d.collection = {} AND {} ORDER BY d.name ASC",
        collection, parent
    );
    Rendered { text, params: r.params }
}

pub fn render_find_directory(collection: &str, path: &str) -> Rendered {
    let mut r = Renderer::default();
    let c = r.bind(SqlValue::Text(collection.to_string()));
    let p = r.bind(SqlValue::Text(path.to_string()));
    let text = format!("SELECT d.id::BIGINT FROM directories d WHERE d.collection = {} AND d.path = {} LIMIT 1", c, p);
    Rendered { text, params: r.params }
}

#[cfg(test)]
#[path = "sql_tests.rs"]
mod tests;
