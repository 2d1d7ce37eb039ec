//! Tagged predicate tree shared by every composed catalog query.
//!
//! The composer never concatenates query text. It builds a `Predicate` tree
//! and a `ScoreExpr`, and each storage backend interprets them (the in-memory
//! store evaluates them directly, the PostgreSQL store renders them to SQL).

use std::collections::BTreeSet;

/// Logical columns of the entry relation and the relations joined onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    EntryId,
    Collection,
    DirectoryId,
    Path,
    Title,
    Description,
    FileSize,
    FileModified,
    EntryCreated,
    EntryUpdated,
    Game,
    Engine,
    IsSingleplayer,
    IsCooperative,
    IsDeathmatch,
    /// Full body text of the entry's text file. Lives in a separate relation.
    TextfileText,
}

/// Optional relations. Always outer joins so entries without a row there still match on other fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Join {
    Textfile,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::EntryId => "id",
            Column::Collection => "collection",
            Column::DirectoryId => "directory_id",
            Column::Path => "path",
            Column::Title => "title",
            Column::Description => "description",
            Column::FileSize => "file_size",
            Column::FileModified => "file_modified",
            Column::EntryCreated => "entry_created",
            Column::EntryUpdated => "entry_updated",
            Column::Game => "game",
            Column::Engine => "engine",
            Column::IsSingleplayer => "is_singleplayer",
            Column::IsCooperative => "is_cooperative",
            Column::IsDeathmatch => "is_deathmatch",
            Column::TextfileText => "text",
        }
    }

    /// The join a predicate on this column needs, if any.
    pub fn join(&self) -> Option<Join> {
        match self {
            Column::TextfileText => Some(Join::Textfile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::Text(s.to_string()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Value::Text(s) }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::Int(v) }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self { Value::Bool(v) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp { Gt, Ge, Lt, Le, Eq, Ne }

impl CompOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompOp::Gt => ">",
            CompOp::Ge => ">=",
            CompOp::Lt => "<",
            CompOp::Le => "<=",
            CompOp::Eq => "=",
            CompOp::Ne => "<>",
        }
    }
}

/// Right-hand side of a comparison: a literal or another column of the same row.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    Column(Column),
}

/// Prefix full-text match of `tokens` against one text column.
/// A row matches when ANY token prefixes a word of the column.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchTerm {
    pub column: Column,
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Match(MatchTerm),
    Equals { column: Column, value: Value },
    IsNull(Column),
    In { column: Column, values: Vec<Value> },
    Compare { column: Column, op: CompOp, rhs: Operand },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn equals(column: Column, value: impl Into<Value>) -> Self {
        Predicate::Equals { column, value: value.into() }
    }

    /// AND-combine, collapsing a single child to itself.
    pub fn all(mut children: Vec<Predicate>) -> Self {
        if children.len() == 1 { children.remove(0) } else { Predicate::And(children) }
    }

    /// OR-combine, collapsing a single child to itself.
    pub fn any(mut children: Vec<Predicate>) -> Self {
        if children.len() == 1 { children.remove(0) } else { Predicate::Or(children) }
    }

    /// Every column referenced anywhere in the tree.
    pub fn columns(&self) -> BTreeSet<Column> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut BTreeSet<Column>) {
        match self {
            Predicate::Match(term) => { out.insert(term.column); }
            Predicate::Equals { column, .. } | Predicate::IsNull(column) | Predicate::In { column, .. } => { out.insert(*column); }
            Predicate::Compare { column, rhs, .. } => {
                out.insert(*column);
                if let Operand::Column(other) = rhs { out.insert(*other); }
            }
            Predicate::And(children) | Predicate::Or(children) => {
                for c in children { c.collect_columns(out); }
            }
        }
    }

    /// Joins required to evaluate the tree. Derived from the columns so a join is attached only when a field needs it.
    pub fn joins(&self) -> BTreeSet<Join> {
        self.columns().iter().filter_map(|c| c.join()).collect()
    }

    /// All full-text terms, in tree order.
    pub fn match_terms(&self) -> Vec<&MatchTerm> {
        let mut out = Vec::new();
        self.collect_terms(&mut out);
        out
    }

    fn collect_terms<'a>(&'a self, out: &mut Vec<&'a MatchTerm>) {
        match self {
            Predicate::Match(term) => out.push(term),
            Predicate::And(children) | Predicate::Or(children) => {
                for c in children { c.collect_terms(out); }
            }
            _ => {}
        }
    }
}

/// Relevance: the sum of per-term match scores. Unmatched terms contribute zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreExpr {
    pub terms: Vec<MatchTerm>,
}

impl ScoreExpr {
    pub fn joins(&self) -> BTreeSet<Join> {
        self.terms.iter().filter_map(|t| t.column.join()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(column: Column) -> Predicate {
        Predicate::Match(MatchTerm { column, tokens: vec!["doom".into()] })
    }

    #[test]
    fn joins_follow_columns() {
        let p = Predicate::all(vec![
            Predicate::any(vec![term(Column::Title), term(Column::Path)]),
            Predicate::equals(Column::Collection, "idgames"),
        ]);
        assert!(p.joins().is_empty());

        let p = Predicate::any(vec![term(Column::Title), term(Column::TextfileText)]);
        assert_eq!(p.joins().into_iter().collect::<Vec<_>>(), vec![Join::Textfile]);
    }

    #[test]
    fn single_child_collapses() {
        let p = Predicate::any(vec![term(Column::Title)]);
        assert!(matches!(p, Predicate::Match(_)));
        let p = Predicate::all(vec![Predicate::IsNull(Column::DirectoryId)]);
        assert_eq!(p, Predicate::IsNull(Column::DirectoryId));
    }

    #[test]
    fn columns_include_compare_rhs() {
        let p = Predicate::Compare { column: Column::FileModified, op: CompOp::Gt, rhs: Operand::Column(Column::EntryCreated) };
        let cols = p.columns();
        assert!(cols.contains(&Column::FileModified));
        assert!(cols.contains(&Column::EntryCreated));
    }

    #[test]
    fn match_terms_in_tree_order() {
        let p = Predicate::all(vec![
            Predicate::any(vec![term(Column::Title), term(Column::Description)]),
            Predicate::In { column: Column::Game, values: vec![Value::Int(2)] },
        ]);
        let cols: Vec<Column> = p.match_terms().iter().map(|t| t.column).collect();
        assert_eq!(cols, vec![Column::Title, Column::Description]);
    }
}
