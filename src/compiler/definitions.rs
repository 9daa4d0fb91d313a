use serde::{Deserialize, Serialize};

/// Integer size variants for the Integer data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegerSize {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
}

/// Common database data types that can be mapped to specific databases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataType {
    /// Text with optional length
    Text(Option<u32>),
    /// Variable-length character string with specified maximum length
    Varchar(u32),
    /// Fixed-length character string
    Char(u32),
    /// Integer with specific size
    Integer(IntegerSize),
    SmallInt,
    BigInt,
    Boolean,
    Float,
    Double,
    /// Decimal number with specified precision and scale
    Decimal(u8, u8),
    Date,
    Time,
    DateTime,
    Timestamp,
    TimestampTz,
    Blob,
    Json,
    /// PostgreSQL's binary JSON
    JsonB,
    Uuid,
    /// Enumeration with name and allowed values
    Enum(String, Vec<String>),
    /// Database-specific type, emitted verbatim
    Custom(String),
}

impl DataType {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Integer(_) | DataType::SmallInt | DataType::BigInt
        )
    }
}

/// Actions to take on foreign key references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    pub fn as_sql(action: Option<&ReferentialAction>) -> &'static str {
        match action {
            Some(ReferentialAction::NoAction) | None => "NO ACTION",
            Some(ReferentialAction::Restrict) => "RESTRICT",
            Some(ReferentialAction::Cascade) => "CASCADE",
            Some(ReferentialAction::SetNull) => "SET NULL",
            Some(ReferentialAction::SetDefault) => "SET DEFAULT",
        }
    }
}

/// Database constraints for columns or tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    PrimaryKey {
        name: Option<String>,
        columns: Vec<String>,
    },
    Unique {
        name: Option<String>,
        columns: Vec<String>,
    },
    Check {
        name: Option<String>,
        expression: String,
    },
    /// Foreign key. Declared on a column, an empty `columns` means that column;
    /// an empty `references_columns` targets the referenced table's primary key.
    ForeignKey {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        columns: Vec<String>,
        references_table: String,
        #[serde(default)]
        references_columns: Vec<String>,
        #[serde(default)]
        on_delete: Option<ReferentialAction>,
        #[serde(default)]
        on_update: Option<ReferentialAction>,
    },
}

/// Column definition for a database table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: DataType,
    /// Whether the column allows NULL values (default: true)
    #[serde(default = "default_true")]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_unique: bool,
    /// Default value, emitted verbatim as SQL
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub comment: Option<String>,
    /// Additional column-specific constraints
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

/// Helper function to provide default true value for serde
fn default_true() -> bool {
    true
}

impl Default for ColumnDescriptor {
    fn default() -> Self {
        ColumnDescriptor {
            name: String::new(),
            data_type: DataType::Text(None),
            is_nullable: default_true(),
            is_primary_key: false,
            is_unique: false,
            default_value: None,
            auto_increment: false,
            comment: None,
            constraints: Vec::new(),
        }
    }
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            ..Default::default()
        }
    }

    /// Mark as (part of) the primary key; implies NOT NULL
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Reference `table.column` from this column
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.constraints.push(Constraint::ForeignKey {
            name: None,
            columns: Vec::new(),
            references_table: table.into(),
            references_columns: vec![column.into()],
            on_delete: None,
            on_update: None,
        });
        self
    }
}

/// Index types for different database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexType {
    BTree,
    Hash,
    /// PostgreSQL GIN index (for array and JSON)
    Gin,
    /// PostgreSQL GiST index (for geometry, full-text)
    Gist,
    Spatial,
}

/// Index definition for a database table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IndexDescriptor {
    /// Optional index name (auto-generated if None)
    #[serde(default)]
    pub name: Option<String>,
    /// Columns included in the index, in key order
    pub columns: Vec<String>,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub index_type: Option<IndexType>,
    /// Optional condition for partial indexes
    #[serde(default)]
    pub condition: Option<String>,
}

impl IndexDescriptor {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Explicit name, or `{table}_{columns}_idx`
    pub fn resolved_name(&self, table_name: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}_{}_idx", table_name, self.columns.join("_")))
    }
}

/// Complete table/model definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ModelDescriptor {
    /// Table name
    pub name: String,
    /// Schema name (e.g., "public" for PostgreSQL)
    #[serde(default)]
    pub schema: Option<String>,
    pub columns: Vec<ColumnDescriptor>,
    /// Composite primary key (overrides is_primary_key on columns)
    #[serde(default)]
    pub primary_key: Option<Vec<String>>,
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    /// Table-level constraints
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub comment: Option<String>,
    /// Storage engine (e.g., "InnoDB" for MySQL)
    #[serde(default)]
    pub engine: Option<String>,
    /// Character set (e.g., "utf8mb4" for MySQL)
    #[serde(default)]
    pub charset: Option<String>,
    /// Collation (e.g., "utf8mb4_unicode_ci" for MySQL)
    #[serde(default)]
    pub collation: Option<String>,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_index(mut self, index: IndexDescriptor) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Look a column up by name
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary-key columns: the explicit composite key, else flagged columns
    pub fn primary_key_columns(&self) -> Vec<&str> {
        match &self.primary_key {
            Some(columns) => columns.iter().map(String::as_str).collect(),
            None => self
                .columns
                .iter()
                .filter(|c| c.is_primary_key)
                .map(|c| c.name.as_str())
                .collect(),
        }
    }

    /// Every foreign key, table-level first, then column-level ones with their
    /// owning column filled in.
    pub fn foreign_keys(&self) -> Vec<Constraint> {
        let table_level = self
            .constraints
            .iter()
            .filter(|c| matches!(c, Constraint::ForeignKey { .. }))
            .cloned();

        let column_level = self.columns.iter().flat_map(|column| {
            column.constraints.iter().filter_map(move |c| match c {
                Constraint::ForeignKey {
                    name,
                    columns,
                    references_table,
                    references_columns,
                    on_delete,
                    on_update,
                } => Some(Constraint::ForeignKey {
                    name: name.clone(),
                    columns: if columns.is_empty() {
                        vec![column.name.clone()]
                    } else {
                        columns.clone()
                    },
                    references_table: references_table.clone(),
                    references_columns: references_columns.clone(),
                    on_delete: *on_delete,
                    on_update: *on_update,
                }),
                _ => None,
            })
        });

        table_level.chain(column_level).collect()
    }

    /// Distinct tables this model references, in declaration order
    pub fn referenced_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = Vec::new();
        for fk in self.foreign_keys() {
            if let Constraint::ForeignKey {
                references_table, ..
            } = fk
            {
                if !tables.contains(&references_table) {
                    tables.push(references_table);
                }
            }
        }
        tables
    }
}
