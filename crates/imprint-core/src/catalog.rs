//! Catalog query contract.
//!
//! Engines read metadata through [`Catalog::query`], which takes the host's
//! general query string and returns rows of string columns. Query strings are
//! never assembled by hand: [`CatalogQuery`] renders them and escapes values,
//! and parses them back for in-memory catalogs.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Error, Result};

/// Read access to the catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Runs a general query and returns every row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CatalogQuery`] if the query cannot be executed.
    async fn query(&self, query: &str) -> Result<Vec<Vec<String>>>;

    /// Returns true if `path` names a data object (rather than a collection).
    ///
    /// # Errors
    ///
    /// Returns [`Error::CatalogQuery`] if the lookup fails.
    async fn is_data_object(&self, path: &str) -> Result<bool>;
}

/// Byte-level access to data objects, for handlers that upload content.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Reads the full contents of a data object.
    ///
    /// # Errors
    ///
    /// Returns an error if the object does not exist or cannot be read.
    async fn read(&self, path: &str) -> Result<Bytes>;

    /// Lists every data object beneath `collection`, recursively, in path order.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be listed.
    async fn list_data_objects(&self, collection: &str) -> Result<Vec<String>>;
}

/// Catalog columns used by the engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// Data object metadata attribute name.
    MetaDataAttrName,
    /// Data object metadata attribute value.
    MetaDataAttrValue,
    /// Data object metadata attribute units.
    MetaDataAttrUnits,
    /// Collection metadata attribute name.
    MetaCollAttrName,
    /// Collection metadata attribute value.
    MetaCollAttrValue,
    /// Collection metadata attribute units.
    MetaCollAttrUnits,
    /// Collection path.
    CollName,
    /// Data object leaf name.
    DataName,
    /// User name.
    UserName,
    /// User metadata attribute name.
    MetaUserAttrName,
    /// User metadata attribute value.
    MetaUserAttrValue,
}

impl Column {
    const ALL: [Self; 11] = [
        Self::MetaDataAttrName,
        Self::MetaDataAttrValue,
        Self::MetaDataAttrUnits,
        Self::MetaCollAttrName,
        Self::MetaCollAttrValue,
        Self::MetaCollAttrUnits,
        Self::CollName,
        Self::DataName,
        Self::UserName,
        Self::MetaUserAttrName,
        Self::MetaUserAttrValue,
    ];

    /// The column's name in query strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MetaDataAttrName => "META_DATA_ATTR_NAME",
            Self::MetaDataAttrValue => "META_DATA_ATTR_VALUE",
            Self::MetaDataAttrUnits => "META_DATA_ATTR_UNITS",
            Self::MetaCollAttrName => "META_COLL_ATTR_NAME",
            Self::MetaCollAttrValue => "META_COLL_ATTR_VALUE",
            Self::MetaCollAttrUnits => "META_COLL_ATTR_UNITS",
            Self::CollName => "COLL_NAME",
            Self::DataName => "DATA_NAME",
            Self::UserName => "USER_NAME",
            Self::MetaUserAttrName => "META_USER_ATTR_NAME",
            Self::MetaUserAttrValue => "META_USER_ATTR_VALUE",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Column {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::catalog_query(format!("unknown column: {s}")))
    }
}

/// An equality condition on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// Column being compared.
    pub column: Column,
    /// Literal value (unescaped).
    pub value: String,
}

/// A general query: selected columns plus equality conditions joined by `and`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Columns returned for each row, in order.
    pub select: Vec<Column>,
    /// Conditions every row satisfies.
    pub conditions: Vec<Condition>,
}

impl CatalogQuery {
    /// Starts a query selecting `columns`.
    #[must_use]
    pub fn select(columns: impl IntoIterator<Item = Column>) -> Self {
        Self {
            select: columns.into_iter().collect(),
            conditions: Vec::new(),
        }
    }

    /// Adds a `column = 'value'` condition.
    #[must_use]
    pub fn filter(mut self, column: Column, value: impl Into<String>) -> Self {
        self.conditions.push(Condition {
            column,
            value: value.into(),
        });
        self
    }

    /// Returns the value a condition requires for `column`, if any.
    #[must_use]
    pub fn condition(&self, column: Column) -> Option<&str> {
        self.conditions
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.value.as_str())
    }

    /// Parses a query string produced by [`CatalogQuery`]'s `Display`.
    ///
    /// Keywords are case-insensitive; literals are single-quoted with `''`
    /// standing for an embedded quote.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CatalogQuery`] on malformed input or unknown columns.
    pub fn parse(input: &str) -> Result<Self> {
        Parser::new(input).query()
    }
}

impl fmt::Display for CatalogQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        for (i, column) in self.select.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(column.as_str())?;
        }
        for (i, condition) in self.conditions.iter().enumerate() {
            f.write_str(if i == 0 { " WHERE " } else { " and " })?;
            write!(
                f,
                "{} = '{}'",
                condition.column,
                condition.value.replace('\'', "''")
            )?;
        }
        Ok(())
    }
}

impl FromStr for CatalogQuery {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    const fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, expected: &str) -> Error {
        Error::catalog_query(format!(
            "expected {expected} at offset {} in query: {}",
            self.pos, self.input
        ))
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn word(&mut self) -> &'a str {
        self.skip_ws();
        let rest = self.rest();
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn keyword(&mut self, keyword: &str) -> Result<()> {
        let start = self.pos;
        if self.word().eq_ignore_ascii_case(keyword) {
            Ok(())
        } else {
            self.pos = start;
            Err(self.error(keyword))
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn column(&mut self) -> Result<Column> {
        let word = self.word();
        if word.is_empty() {
            return Err(self.error("column name"));
        }
        word.parse()
    }

    fn literal(&mut self) -> Result<String> {
        if !self.eat('\'') {
            return Err(self.error("quoted literal"));
        }
        let mut value = String::new();
        let mut chars = self.rest().char_indices().peekable();
        while let Some((idx, c)) = chars.next() {
            if c == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    chars.next();
                    value.push('\'');
                } else {
                    self.pos += idx + 1;
                    return Ok(value);
                }
            } else {
                value.push(c);
            }
        }
        self.pos = self.input.len();
        Err(self.error("closing quote"))
    }

    fn query(mut self) -> Result<CatalogQuery> {
        self.keyword("SELECT")?;
        let mut select = vec![self.column()?];
        while self.eat(',') {
            select.push(self.column()?);
        }

        let mut conditions = Vec::new();
        self.skip_ws();
        if !self.rest().is_empty() {
            self.keyword("WHERE")?;
            loop {
                let column = self.column()?;
                if !self.eat('=') {
                    return Err(self.error("'='"));
                }
                let value = self.literal()?;
                conditions.push(Condition { column, value });
                self.skip_ws();
                if self.rest().is_empty() {
                    break;
                }
                self.keyword("and")?;
            }
        }

        Ok(CatalogQuery { select, conditions })
    }
}
