//! Schema text builder.
//!
//! Produces predicate and edge definitions for [`Client::set_schema`](crate::Client::set_schema):
//!
//! ```
//! use dgraph_client::schema::{Edge, Predicate, Schema, StringIndex};
//!
//! let schema = Schema::new()
//!     .predicate(Predicate::new("name").string().string_index(&[StringIndex::Exact, StringIndex::Term]))
//!     .edge(Edge::new("friend").reverse().count())
//!     .build();
//!
//! assert_eq!(schema, "name: string @index(exact, term) .\nfriend: uid @reverse @count .");
//! ```

use std::fmt;

/// Scalar predicate type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredicateType {
    /// 64-bit integer.
    Int,
    /// Double-precision float.
    Float,
    /// UTF-8 string.
    #[default]
    String,
    /// Boolean.
    Bool,
    /// RFC 3339 date-time.
    DateTime,
    /// GeoJSON geometry.
    Geo,
    /// Password; never indexed.
    Password,
}

impl PredicateType {
    /// Returns the schema keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            PredicateType::Int => "int",
            PredicateType::Float => "float",
            PredicateType::String => "string",
            PredicateType::Bool => "bool",
            PredicateType::DateTime => "datetime",
            PredicateType::Geo => "geo",
            PredicateType::Password => "password",
        }
    }
}

/// String tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StringIndex {
    /// Exact match and inequality.
    Exact,
    /// Hashed equality.
    Hash,
    /// Term matching.
    Term,
    /// Full-text search.
    Fulltext,
    /// Regular expressions.
    Trigram,
}

impl StringIndex {
    /// Returns the tokenizer name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StringIndex::Exact => "exact",
            StringIndex::Hash => "hash",
            StringIndex::Term => "term",
            StringIndex::Fulltext => "fulltext",
            StringIndex::Trigram => "trigram",
        }
    }
}

/// Date-time index granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateTimeIndex {
    /// By year.
    #[default]
    Year,
    /// By month.
    Month,
    /// By day.
    Day,
    /// By hour.
    Hour,
}

impl DateTimeIndex {
    /// Returns the tokenizer name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DateTimeIndex::Year => "year",
            DateTimeIndex::Month => "month",
            DateTimeIndex::Day => "day",
            DateTimeIndex::Hour => "hour",
        }
    }
}

/// A scalar predicate definition.
///
/// Types default to `string`. Tokenizers are emitted in a fixed order no matter
/// the order they were given in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    name: String,
    kind: PredicateType,
    index: bool,
    string_index: Vec<StringIndex>,
    datetime_index: DateTimeIndex,
    list: bool,
    count: bool,
    upsert: bool,
}

impl Predicate {
    /// Starts a definition for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PredicateType::default(),
            index: false,
            string_index: Vec::new(),
            datetime_index: DateTimeIndex::default(),
            list: false,
            count: false,
            upsert: false,
        }
    }

    /// Sets the scalar type.
    pub fn kind(mut self, kind: PredicateType) -> Self {
        self.kind = kind;
        self
    }

    /// `int`.
    pub fn int(self) -> Self {
        self.kind(PredicateType::Int)
    }

    /// `float`.
    pub fn float(self) -> Self {
        self.kind(PredicateType::Float)
    }

    /// `string`.
    pub fn string(self) -> Self {
        self.kind(PredicateType::String)
    }

    /// `bool`.
    pub fn bool(self) -> Self {
        self.kind(PredicateType::Bool)
    }

    /// `datetime`.
    pub fn datetime(self) -> Self {
        self.kind(PredicateType::DateTime)
    }

    /// `geo`.
    pub fn geo(self) -> Self {
        self.kind(PredicateType::Geo)
    }

    /// `password`.
    pub fn password(self) -> Self {
        self.kind(PredicateType::Password)
    }

    /// Indexes with the type's default tokenizer.
    pub fn index(mut self) -> Self {
        self.index = true;
        self
    }

    /// Indexes a string predicate with `tokenizers`.
    pub fn string_index(mut self, tokenizers: &[StringIndex]) -> Self {
        self.index = true;
        self.string_index.extend_from_slice(tokenizers);
        self.string_index.sort_unstable();
        self.string_index.dedup();
        self
    }

    /// Indexes a date-time predicate at `granularity`.
    pub fn datetime_index(mut self, granularity: DateTimeIndex) -> Self {
        self.index = true;
        self.datetime_index = granularity;
        self
    }

    /// Makes the predicate a list.
    pub fn list(mut self) -> Self {
        self.list = true;
        self
    }

    /// Maintains a count index.
    pub fn count(mut self) -> Self {
        self.count = true;
        self
    }

    /// Enables upsert conflict detection.
    pub fn upsert(mut self) -> Self {
        self.upsert = true;
        self
    }

    /// Renders the definition, e.g. `name: [string] @index(exact) @count @upsert .`.
    pub fn build(&self) -> String {
        self.to_string()
    }

    fn tokenizers(&self) -> String {
        match self.kind {
            PredicateType::String if !self.string_index.is_empty() => self
                .string_index
                .iter()
                .map(StringIndex::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            // Bare string index: the cheapest equality tokenizer.
            PredicateType::String => StringIndex::Hash.as_str().to_string(),
            PredicateType::DateTime => self.datetime_index.as_str().to_string(),
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.name)?;
        if self.list {
            write!(f, "[{}]", self.kind.as_str())?;
        } else {
            f.write_str(self.kind.as_str())?;
        }
        if self.index && self.kind != PredicateType::Password {
            write!(f, " @index({})", self.tokenizers())?;
        }
        if self.count {
            f.write_str(" @count")?;
        }
        if self.upsert {
            f.write_str(" @upsert")?;
        }
        f.write_str(" .")
    }
}

/// A `uid` edge definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    name: String,
    reverse: bool,
    count: bool,
}

impl Edge {
    /// Starts a definition for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reverse: false,
            count: false,
        }
    }

    /// Maintains the reverse edge.
    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Maintains a count index.
    pub fn count(mut self) -> Self {
        self.count = true;
        self
    }

    /// Renders the definition, e.g. `friend: uid @reverse @count .`.
    pub fn build(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: uid", self.name)?;
        if self.reverse {
            f.write_str(" @reverse")?;
        }
        if self.count {
            f.write_str(" @count")?;
        }
        f.write_str(" .")
    }
}

/// Several definitions joined into one alter payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    lines: Vec<String>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a predicate definition.
    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.lines.push(predicate.build());
        self
    }

    /// Adds an edge definition.
    pub fn edge(mut self, edge: Edge) -> Self {
        self.lines.push(edge.build());
        self
    }

    /// Adds raw schema text.
    pub fn raw(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    /// Returns true if nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Renders all definitions, one per line.
    pub fn build(&self) -> String {
        self.lines.join("\n")
    }
}

impl From<Schema> for String {
    fn from(schema: Schema) -> Self {
        schema.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_predicate() {
        let schema = Predicate::new("first")
            .string()
            .string_index(&[StringIndex::Hash, StringIndex::Term, StringIndex::Fulltext])
            .list()
            .count()
            .upsert()
            .build();

        assert_eq!(schema, "first: [string] @index(hash, term, fulltext) @count @upsert .");
    }

    #[test]
    fn test_tokenizer_order_is_fixed() {
        let schema = Predicate::new("name")
            .string_index(&[StringIndex::Trigram, StringIndex::Exact, StringIndex::Trigram])
            .build();

        assert_eq!(schema, "name: string @index(exact, trigram) .");
    }

    #[test]
    fn test_basic_predicates() {
        assert_eq!(
            Predicate::new("first").int().index().list().count().upsert().build(),
            "first: [int] @index(int) @count @upsert ."
        );
        assert_eq!(
            Predicate::new("first").float().index().build(),
            "first: float @index(float) ."
        );
        assert_eq!(
            Predicate::new("first").geo().index().build(),
            "first: geo @index(geo) ."
        );
        assert_eq!(
            Predicate::new("first").bool().index().build(),
            "first: bool @index(bool) ."
        );
        assert_eq!(Predicate::new("age").int().build(), "age: int .");
    }

    #[test]
    fn test_datetime_predicate() {
        let schema = Predicate::new("first")
            .datetime()
            .datetime_index(DateTimeIndex::Month)
            .list()
            .count()
            .upsert()
            .build();

        assert_eq!(schema, "first: [datetime] @index(month) @count @upsert .");
        assert_eq!(
            Predicate::new("born").datetime().index().build(),
            "born: datetime @index(year) ."
        );
    }

    #[test]
    fn test_password_is_never_indexed() {
        assert_eq!(
            Predicate::new("secret").password().index().upsert().build(),
            "secret: password @upsert ."
        );
    }

    #[test]
    fn test_bare_string_index() {
        assert_eq!(
            Predicate::new("email").index().build(),
            "email: string @index(hash) ."
        );
    }

    #[test]
    fn test_edge() {
        assert_eq!(
            Edge::new("friends").count().reverse().build(),
            "friends: uid @reverse @count ."
        );
        assert_eq!(Edge::new("owner").build(), "owner: uid .");
    }

    #[test]
    fn test_schema_joins_lines() {
        let schema = Schema::new()
            .predicate(Predicate::new("name").string_index(&[StringIndex::Exact]))
            .edge(Edge::new("friend").reverse())
            .raw("balance: int .");

        assert!(!schema.is_empty());
        assert_eq!(
            String::from(schema),
            "name: string @index(exact) .\nfriend: uid @reverse .\nbalance: int ."
        );
        assert_eq!(Schema::new().build(), "");
    }
}
