use std::{borrow::Cow, error::Error, fmt::Display, str::FromStr};

use crate::escape_ident;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTableName {
    input: String,
}

impl Display for InvalidTableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}' is not a valid table name, expected [schema.]table",
            self.input
        )
    }
}

impl Error for InvalidTableName {}

/// A table reference in `[schema.]name` form.
///
/// Parts are stored the way the catalog spells them: unquoted input is folded
/// to lower case like PostgreSQL does, double-quoted input is kept as written.
/// Only the shape is checked here, whether the table exists is left to the
/// database at query time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    schema: Option<String>,
    name: String,
}

impl TableName {
    /// Builds a name from parts already spelled as in the catalog.
    pub fn new(schema: Option<&str>, name: &str) -> Self {
        Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, InvalidTableName> {
        let invalid = || InvalidTableName {
            input: input.to_string(),
        };
        let mut parts = Vec::with_capacity(2);
        let mut rest = input;
        loop {
            let (part, tail) = split_part(rest).ok_or_else(invalid)?;
            parts.push(part);
            match tail.strip_prefix('.') {
                Some(tail) => rest = tail,
                None if tail.is_empty() => break,
                None => return Err(invalid()),
            }
        }
        let mut parts = parts.into_iter();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) => Ok(Self { schema: None, name }),
            (Some(schema), Some(name), None) => Ok(Self {
                schema: Some(schema),
                name,
            }),
            _ => Err(invalid()),
        }
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Quoted form safe to splice into SQL text.
    pub fn escaped(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", escape_ident(schema), escape_ident(&self.name)),
            None => escape_ident(&self.name),
        }
    }
}

/// Reads one identifier off the front of `input`, returning it and the rest.
fn split_part(input: &str) -> Option<(String, &str)> {
    if let Some(quoted) = input.strip_prefix('"') {
        let mut part = String::new();
        let mut chars = quoted.char_indices();
        while let Some((idx, c)) = chars.next() {
            if c != '"' {
                part.push(c);
            } else if quoted[idx + 1..].starts_with('"') {
                part.push('"');
                chars.next();
            } else {
                let rest = &quoted[idx + 1..];
                return (!part.is_empty()).then_some((part, rest));
            }
        }
        return None;
    }
    let end = input.find('.').unwrap_or(input.len());
    let part = &input[..end];
    let valid = !part.is_empty() && !part.chars().any(|c| c.is_whitespace() || c == '"');
    valid.then(|| (part.to_ascii_lowercase(), &input[end..]))
}

/// Identifiers that read back unchanged without quotes.
fn display_part(part: &str) -> Cow<'_, str> {
    let mut chars = part.chars();
    let plain = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$');
    match plain {
        true => Cow::Borrowed(part),
        false => Cow::Owned(escape_ident(part)),
    }
}

impl FromStr for TableName {
    type Err = InvalidTableName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", display_part(schema), display_part(&self.name)),
            None => write!(f, "{}", display_part(&self.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TableName;

    #[test]
    fn plain_name() {
        let table = TableName::parse("users").unwrap();
        assert_eq!(table.schema(), None);
        assert_eq!(table.name(), "users");
        assert_eq!(table.to_string(), "users");
    }

    #[test]
    fn unquoted_names_fold_to_lower_case() {
        let table = TableName::parse("USERS").unwrap();
        assert_eq!(table.name(), "users");
        assert_eq!(table.escaped(), "\"users\"");
        assert_eq!(table, TableName::parse("users").unwrap());

        let table = TableName::parse("Analytics.Reports").unwrap();
        assert_eq!(table.schema(), Some("analytics"));
        assert_eq!(table.name(), "reports");
        assert_eq!(table.to_string(), "analytics.reports");
    }

    #[test]
    fn quoted_names_keep_their_spelling() {
        let table = TableName::parse("analytics.\"Reports\"").unwrap();
        assert_eq!(table.schema(), Some("analytics"));
        assert_eq!(table.name(), "Reports");
        assert_eq!(table.to_string(), "analytics.\"Reports\"");
        assert_eq!(table.escaped(), "\"analytics\".\"Reports\"");

        let table = TableName::parse("\"my schema\".\"a.b\"").unwrap();
        assert_eq!(table.schema(), Some("my schema"));
        assert_eq!(table.name(), "a.b");

        let table = TableName::parse("\"say \"\"hi\"\"\"").unwrap();
        assert_eq!(table.name(), "say \"hi\"");
        assert_eq!(table.escaped(), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn display_parses_back_to_the_same_name() {
        for table in [
            TableName::new(None, "orders"),
            TableName::new(Some("sales"), "Orders"),
            TableName::new(Some("Sales Dept"), "order_items$2"),
            TableName::new(None, "2024_sales"),
        ] {
            assert_eq!(TableName::parse(&table.to_string()).unwrap(), table);
        }
    }

    #[test]
    fn malformed_names_are_rejected() {
        for input in [
            "",
            ".",
            "a.",
            ".b",
            "a.b.c",
            "a b",
            "public.my table",
            "\"\"",
            "\"open",
            "\"a\"b",
            "sales.order\"s",
        ] {
            assert!(TableName::parse(input).is_err(), "{input:?} was accepted");
        }
    }
}
