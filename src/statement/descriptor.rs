use serde::{Deserialize, Serialize};

use crate::engine::StatementId;
use crate::types::{ParameterMode, SqlType};

/// Declared shape of one statement parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub sql_type: SqlType,
    pub mode: ParameterMode,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
}

impl ParameterDescriptor {
    /// Nullable IN parameter of `sql_type` without precision or scale.
    #[must_use]
    pub fn new(sql_type: SqlType) -> Self {
        Self {
            sql_type,
            mode: ParameterMode::In,
            precision: None,
            scale: None,
            nullable: true,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ParameterMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_precision(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
}

impl ColumnDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
        }
    }
}

/// Columns a row-producing statement returns; empty for everything else.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResultDescriptor {
    pub columns: Vec<ColumnDescriptor>,
}

impl ResultDescriptor {
    #[must_use]
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    #[must_use]
    pub fn returns_rows(&self) -> bool {
        !self.columns.is_empty()
    }
}

/// What the engine handed back for a PREPARE. The parameter list never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementHandle {
    pub id: StatementId,
    pub parameters: Vec<ParameterDescriptor>,
    pub result: ResultDescriptor,
}
