//! Schema-description file parser.
//!
//! A description file is SQL DDL with extra metadata carried in comment
//! tags. Tables are opened by `CREATE TABLE <name>` and closed by a line
//! starting with `)`. Inside a table every non-comment line is either a
//! column declaration or an index definition. Comment lines attach
//! `<descr>`, `<unit>` and `<ucd>` tags to the table (before its first
//! column) or to the most recently declared column:
//!
//! ```text
//! CREATE TABLE Object
//!     -- <descr>The Object table.</descr>
//! (
//!     objectId BIGINT NOT NULL,
//!         -- <descr>Unique id.</descr>
//!         -- <ucd>meta.id;src</ucd>
//!     ra DOUBLE NOT NULL,
//!         -- <descr>Right ascension
//!         -- of the object.</descr>
//!         -- <unit>deg</unit>
//!     flux FLOAT[5],
//!     PRIMARY KEY (objectId)
//! ) ENGINE=MyISAM;
//! ```
//!
//! Anything outside a table, including commented-out DDL, is ignored.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{AppError, AppResult};

static TABLE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?[`"]?([^\s(`"]+)[`"]?"#)
        .expect("valid table regex")
});

/// Table and column names must be plain ASCII identifiers so they can be
/// addressed under `/db`.
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid identifier regex"));

static COMMENT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*--(.*)$").expect("valid comment regex"));

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?)([A-Za-z_]+)>").expect("valid tag regex"));

static COLUMN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^[`"]?([A-Za-z_$][A-Za-z0-9_$]*)[`"]?$"#).expect("valid column regex"));

/// Keywords that end the datatype part of a column declaration.
const TYPE_TERMINATORS: &[&str] = &[
    "NOT",
    "NULL",
    "DEFAULT",
    "PRIMARY",
    "UNIQUE",
    "AUTO_INCREMENT",
    "AUTOINCREMENT",
    "REFERENCES",
    "CHECK",
    "COMMENT",
    "COLLATE",
    "CHARSET",
    "GENERATED",
    "CONSTRAINT",
];

/// Parsed description file: tables in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaDescription {
    pub tables: Vec<TableDescription>,
}

impl SchemaDescription {
    /// Look up a table by name (case-insensitive, like SQL identifiers).
    pub fn table(&self, name: &str) -> Option<&TableDescription> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Total number of described columns across all tables.
    pub fn column_count(&self) -> usize {
        self.tables.iter().map(|t| t.columns.len()).sum()
    }
}

/// One described table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableDescription {
    pub name: String,
    pub description: Option<String>,
    /// Columns in declaration order; the position is the column ordinal.
    pub columns: Vec<ColumnDescription>,
    pub indexes: Vec<IndexDescription>,
}

impl TableDescription {
    pub fn column(&self, name: &str) -> Option<&ColumnDescription> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// One described column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescription {
    pub name: String,
    /// Declared type without any array suffix, e.g. `DOUBLE`, `VARCHAR(64)`.
    pub datatype: String,
    pub nullable: bool,
    /// Fixed array size from a `TYPE[N]` declaration.
    pub arraysize: Option<i32>,
    pub description: Option<String>,
    pub ucd: Option<String>,
    pub unit: Option<String>,
}

/// Kind of an index line inside a table body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    PrimaryKey,
    Unique,
    Index,
    ForeignKey,
    Check,
}

/// An index or constraint line, kept to validate the columns it names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexDescription {
    pub kind: IndexKind,
    pub columns: Vec<String>,
}

/// Read and parse a description file.
pub async fn read_description(path: &Path) -> AppResult<SchemaDescription> {
    let text = tokio::fs::read_to_string(path).await?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "Parsing schema description");
    parse_description(&text)
}

/// Parse description text.
pub fn parse_description(text: &str) -> AppResult<SchemaDescription> {
    let mut parser = Parser::default();
    for (idx, line) in text.lines().enumerate() {
        parser.line = idx + 1;
        parser.feed(line)?;
    }
    parser.finish()
}

fn malformed(line: usize, message: impl Into<String>) -> AppError {
    AppError::MalformedDescription {
        line,
        message: message.into(),
    }
}

/// Which element comment tags currently attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Table,
    Column(usize),
}

#[derive(Default)]
struct Parser {
    line: usize,
    schema: SchemaDescription,
    table: Option<TableDescription>,
    table_line: usize,
    target: Option<Target>,
    /// Line where an unterminated `<descr>` started.
    open_descr: Option<usize>,
}

impl Parser {
    fn feed(&mut self, line: &str) -> AppResult<()> {
        if self.table.is_none() {
            if COMMENT_LINE.is_match(line) {
                return Ok(());
            }
            if let Some(caps) = TABLE_START.captures(line) {
                let name = caps[1].to_string();
                if !IDENTIFIER.is_match(&name) {
                    return Err(malformed(self.line, format!("invalid table name '{}'", name)));
                }
                if self.schema.table(&name).is_some() {
                    return Err(malformed(self.line, format!("duplicate table '{}'", name)));
                }
                self.table = Some(TableDescription {
                    name,
                    ..Default::default()
                });
                self.table_line = self.line;
                self.target = Some(Target::Table);
            }
            return Ok(());
        }

        if let Some(caps) = COMMENT_LINE.captures(line) {
            return self.comment(caps.get(1).map_or("", |m| m.as_str()));
        }

        let trimmed = line.trim();
        if trimmed.starts_with(')') {
            return self.close_table();
        }
        if self.open_descr.is_some() {
            return Err(malformed(self.line, "unterminated <descr>"));
        }

        let (decl, comment) = split_trailing_comment(trimmed);
        let decl = decl.trim().trim_start_matches('(').trim();
        let decl = decl.trim_end_matches(',').trim();
        if !decl.is_empty() {
            self.declaration(decl)?;
        }
        if let Some(comment) = comment {
            self.comment(comment)?;
        }
        Ok(())
    }

    fn declaration(&mut self, decl: &str) -> AppResult<()> {
        let tokens = tokenize(decl);
        let first = tokens[0].to_ascii_uppercase();
        let index_kind = match first.as_str() {
            "PRIMARY" => Some(IndexKind::PrimaryKey),
            "UNIQUE" => Some(IndexKind::Unique),
            "KEY" | "INDEX" | "FULLTEXT" | "SPATIAL" => Some(IndexKind::Index),
            "FOREIGN" => Some(IndexKind::ForeignKey),
            "CHECK" => Some(IndexKind::Check),
            "CONSTRAINT" => Some(constraint_kind(&tokens)),
            _ => None,
        };
        if let Some(kind) = index_kind {
            let columns = if kind == IndexKind::Check {
                Vec::new()
            } else {
                index_columns(decl).ok_or_else(|| {
                    malformed(self.line, format!("index definition without columns: {}", decl))
                })?
            };
            self.current_table().indexes.push(IndexDescription { kind, columns });
            return Ok(());
        }
        self.column(&tokens)
    }

    fn column(&mut self, tokens: &[String]) -> AppResult<()> {
        let line = self.line;
        let name = COLUMN_NAME
            .captures(&tokens[0])
            .map(|c| c[1].to_string())
            .ok_or_else(|| malformed(line, format!("unrecognised declaration '{}'", tokens[0])))?;

        let mut type_tokens: Vec<&str> = Vec::new();
        let mut idx = 1;
        while idx < tokens.len() {
            let upper = tokens[idx].to_ascii_uppercase();
            if TYPE_TERMINATORS.contains(&upper.as_str()) {
                break;
            }
            if upper == "CHARACTER"
                && tokens
                    .get(idx + 1)
                    .is_some_and(|t| t.eq_ignore_ascii_case("SET"))
            {
                break;
            }
            type_tokens.push(&tokens[idx]);
            idx += 1;
        }
        if type_tokens.is_empty() {
            return Err(malformed(line, format!("column '{}' has no datatype", name)));
        }

        let modifiers: Vec<String> = tokens[idx..].iter().map(|t| t.to_ascii_uppercase()).collect();
        let not_null = modifiers
            .windows(2)
            .any(|w| (w[0] == "NOT" && w[1] == "NULL") || (w[0] == "PRIMARY" && w[1] == "KEY"));

        let (datatype, arraysize) = split_array_suffix(&type_tokens.join(" "))
            .map_err(|message| malformed(line, format!("column '{}': {}", name, message)))?;

        let table = self.current_table();
        if table.column(&name).is_some() {
            return Err(malformed(
                line,
                format!("duplicate column '{}' in table '{}'", name, table.name),
            ));
        }
        table.columns.push(ColumnDescription {
            name,
            datatype,
            nullable: !not_null,
            arraysize,
            description: None,
            ucd: None,
            unit: None,
        });
        let idx = table.columns.len() - 1;
        self.target = Some(Target::Column(idx));
        Ok(())
    }

    fn comment(&mut self, body: &str) -> AppResult<()> {
        let mut body = body;
        if self.open_descr.is_some() {
            match body.find("</descr>") {
                Some(end) => {
                    self.append_description(&body[..end]);
                    self.open_descr = None;
                    body = &body[end + "</descr>".len()..];
                }
                None => {
                    self.append_description(body);
                    return Ok(());
                }
            }
        }

        let mut offset = 0;
        while let Some(caps) = TAG.captures(&body[offset..]) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let tag_end = offset + whole.end;
            let closing = !caps[1].is_empty();
            let tag = caps[2].to_ascii_lowercase();
            if closing {
                return Err(malformed(self.line, format!("unexpected </{}>", tag)));
            }
            let close = format!("</{}>", tag);
            let value_end = body[tag_end..].find(&close).map(|i| tag_end + i);
            match tag.as_str() {
                "descr" => match value_end {
                    Some(end) => {
                        let text = body[tag_end..end].trim().to_string();
                        *self.description_slot() = Some(text);
                        offset = end + close.len();
                    }
                    None => {
                        *self.description_slot() = Some(String::new());
                        self.append_description(&body[tag_end..]);
                        self.open_descr = Some(self.line);
                        return Ok(());
                    }
                },
                "unit" | "ucd" => {
                    let end = value_end
                        .ok_or_else(|| malformed(self.line, format!("unterminated <{}>", tag)))?;
                    let value = body[tag_end..end].trim().to_string();
                    let line = self.line;
                    let column = self.current_column().ok_or_else(|| {
                        malformed(line, format!("<{}> outside of a column", tag))
                    })?;
                    if tag == "unit" {
                        column.unit = Some(value);
                    } else {
                        column.ucd = Some(value);
                    }
                    offset = end + close.len();
                }
                other => {
                    return Err(malformed(self.line, format!("unknown token <{}>", other)));
                }
            }
        }
        Ok(())
    }

    fn close_table(&mut self) -> AppResult<()> {
        if let Some(start) = self.open_descr {
            return Err(malformed(start, "unterminated <descr>"));
        }
        let line = self.line;
        let table = self.table.take().unwrap_or_default();
        if table.columns.is_empty() {
            return Err(malformed(line, format!("table '{}' declares no columns", table.name)));
        }
        for index in &table.indexes {
            if let Some(missing) = index.columns.iter().find(|c| table.column(c).is_none()) {
                return Err(malformed(
                    line,
                    format!(
                        "index in table '{}' names undeclared column '{}'",
                        table.name, missing
                    ),
                ));
            }
        }
        self.schema.tables.push(table);
        self.target = None;
        Ok(())
    }

    fn finish(self) -> AppResult<SchemaDescription> {
        if let Some(table) = self.table {
            return Err(malformed(
                self.table_line,
                format!("table '{}' is not closed", table.name),
            ));
        }
        Ok(self.schema)
    }

    fn current_table(&mut self) -> &mut TableDescription {
        self.table.get_or_insert_with(TableDescription::default)
    }

    fn current_column(&mut self) -> Option<&mut ColumnDescription> {
        match self.target {
            Some(Target::Column(idx)) => self.table.as_mut()?.columns.get_mut(idx),
            _ => None,
        }
    }

    fn description_slot(&mut self) -> &mut Option<String> {
        let target = self.target;
        let table = self.current_table();
        match target {
            Some(Target::Column(idx)) if idx < table.columns.len() => {
                &mut table.columns[idx].description
            }
            _ => &mut table.description,
        }
    }

    fn append_description(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return;
        }
        let slot = self.description_slot().get_or_insert_with(String::new);
        if !slot.is_empty() {
            slot.push(' ');
        }
        slot.push_str(fragment);
    }
}

fn constraint_kind(tokens: &[String]) -> IndexKind {
    let upper: Vec<String> = tokens.iter().map(|t| t.to_ascii_uppercase()).collect();
    if upper.iter().any(|t| t == "FOREIGN") {
        IndexKind::ForeignKey
    } else if upper.iter().any(|t| t == "PRIMARY") {
        IndexKind::PrimaryKey
    } else if upper.iter().any(|t| t == "CHECK") {
        IndexKind::Check
    } else {
        IndexKind::Unique
    }
}

/// Column names inside the first parenthesised group, without ASC/DESC
/// or prefix lengths such as `name(10)`.
fn index_columns(decl: &str) -> Option<Vec<String>> {
    let open = decl.find('(')?;
    let mut depth = 0usize;
    let mut close = None;
    for (i, ch) in decl[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let columns: Vec<String> = split_top_level(&decl[open + 1..close?])
        .into_iter()
        .filter_map(|expr| {
            expr.split_whitespace()
                .find(|w| !w.eq_ignore_ascii_case("ASC") && !w.eq_ignore_ascii_case("DESC"))
                .map(|w| {
                    let name = w.split('(').next().unwrap_or(w);
                    name.trim_matches(|c| c == '`' || c == '"').to_string()
                })
        })
        .collect();
    if columns.is_empty() {
        None
    } else {
        Some(columns)
    }
}

/// Split on commas that are not nested in parentheses.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in list.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);
    parts
}

/// Split `TYPE[N]` into the element type and N.
fn split_array_suffix(datatype: &str) -> Result<(String, Option<i32>), String> {
    let datatype = datatype.trim();
    let normalized = |t: &str| {
        if t.eq_ignore_ascii_case("FLOAT(0)") {
            "FLOAT".to_string()
        } else {
            t.to_string()
        }
    };
    if !datatype.ends_with(']') {
        if datatype.contains('[') {
            return Err(format!("malformed array suffix in '{}'", datatype));
        }
        return Ok((normalized(datatype), None));
    }
    let open = datatype
        .rfind('[')
        .ok_or_else(|| format!("malformed array suffix in '{}'", datatype))?;
    let size = &datatype[open + 1..datatype.len() - 1];
    let size: i32 = size
        .trim()
        .parse()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| format!("array size must be a positive integer, got '{}'", size))?;
    let element = datatype[..open].trim();
    if element.is_empty() {
        return Err("array declaration without element type".to_string());
    }
    Ok((normalized(element), Some(size)))
}

/// Split on whitespace outside parentheses and quotes.
fn tokenize(decl: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for ch in decl.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Split a declaration from a trailing `-- comment`, ignoring `--` inside
/// quoted literals.
fn split_trailing_comment(line: &str) -> (&str, Option<&str>) {
    let bytes = line.as_bytes();
    let mut in_quote = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b'-' if !in_quote && bytes.get(i + 1) == Some(&b'-') => {
                return (&line[..i], Some(&line[i + 2..]));
            }
            _ => {}
        }
        i += 1;
    }
    (line, None)
}
