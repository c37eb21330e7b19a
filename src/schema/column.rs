use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Column cardinality as reported by table metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Required,
    Nullable,
    Repeated,
}

impl Mode {
    /// Parse a metadata mode string. Anything other than `NULLABLE` or
    /// `REPEATED` (including an empty string) is `REQUIRED`.
    pub fn parse(s: &str) -> Mode {
        if s.eq_ignore_ascii_case("NULLABLE") {
            Mode::Nullable
        } else if s.eq_ignore_ascii_case("REPEATED") {
            Mode::Repeated
        } else {
            Mode::Required
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Required => "REQUIRED",
            Mode::Nullable => "NULLABLE",
            Mode::Repeated => "REPEATED",
        };
        write!(f, "{}", s)
    }
}

/// One column of a table schema, possibly with nested sub-columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    /// Upper-case type tag, e.g. `STRING`, `TIMESTAMP`, `RECORD`.
    pub field_type: String,
    pub mode: Mode,
    /// Sub-columns; only meaningful for structured columns.
    pub fields: Vec<ColumnSchema>,
}

impl ColumnSchema {
    /// A `REQUIRED` scalar column.
    pub fn new(name: impl Into<String>, field_type: impl AsRef<str>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.as_ref().to_ascii_uppercase(),
            mode: Mode::Required,
            fields: Vec::new(),
        }
    }

    pub fn nullable(name: impl Into<String>, field_type: impl AsRef<str>) -> Self {
        Self::new(name, field_type).with_mode(Mode::Nullable)
    }

    pub fn repeated(name: impl Into<String>, field_type: impl AsRef<str>) -> Self {
        Self::new(name, field_type).with_mode(Mode::Repeated)
    }

    /// A `RECORD` column with the given sub-columns.
    pub fn record(name: impl Into<String>, mode: Mode, fields: Vec<ColumnSchema>) -> Self {
        Self {
            name: name.into(),
            field_type: "RECORD".to_string(),
            mode,
            fields,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_fields(mut self, fields: Vec<ColumnSchema>) -> Self {
        self.fields = fields;
        self
    }

    /// Whether this column holds nested records (`RECORD` or `STRUCT`).
    pub fn is_structured(&self) -> bool {
        self.field_type.eq_ignore_ascii_case("RECORD")
            || self.field_type.eq_ignore_ascii_case("STRUCT")
    }
}

/// Errors produced while parsing a table identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableIdError {
    #[error(
        "table id must be fully qualified as \"project.dataset.table\", got \"{0}\""
    )]
    NotFullyQualified(String),

    #[error("table id \"{0}\" has an empty component")]
    EmptyComponent(String),
}

/// A fully qualified `project.dataset.table` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableId {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableId {
    /// Resource path used by the write service.
    pub fn table_path(&self) -> String {
        format!(
            "projects/{}/datasets/{}/tables/{}",
            self.project, self.dataset, self.table
        )
    }

    /// The table's always-present default stream.
    pub fn default_stream(&self) -> String {
        format!("{}/streams/_default", self.table_path())
    }
}

impl FromStr for TableId {
    type Err = TableIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        let [project, dataset, table] = parts.as_slice() else {
            return Err(TableIdError::NotFullyQualified(s.to_string()));
        };
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(TableIdError::EmptyComponent(s.to_string()));
        }
        Ok(Self {
            project: project.to_string(),
            dataset: dataset.to_string(),
            table: table.to_string(),
        })
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}
