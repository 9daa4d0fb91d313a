use std::fmt;

use crate::catalog::{catalog_for, Catalog};
use crate::compiler::{compiler_for, SqlCompiler};
use crate::database::DatabaseType;

/// The DDL compiler and catalog queries for one database type
pub struct Dialect {
    db_type: DatabaseType,
    compiler: Box<dyn SqlCompiler>,
    catalog: Box<dyn Catalog>,
}

impl Dialect {
    /// The bundled compiler and catalog for `db_type`
    pub fn for_type(db_type: DatabaseType) -> Self {
        Self {
            db_type,
            compiler: compiler_for(db_type),
            catalog: catalog_for(db_type),
        }
    }

    /// Assemble a dialect from custom parts. Both must target the same database type.
    pub fn from_parts(compiler: Box<dyn SqlCompiler>, catalog: Box<dyn Catalog>) -> Option<Self> {
        let db_type = compiler.database_type();
        (catalog.database_type() == db_type).then_some(Self {
            db_type,
            compiler,
            catalog,
        })
    }

    pub fn database_type(&self) -> DatabaseType {
        self.db_type
    }

    pub fn compiler(&self) -> &dyn SqlCompiler {
        &*self.compiler
    }

    pub fn catalog(&self) -> &dyn Catalog {
        &*self.catalog
    }
}

impl From<DatabaseType> for Dialect {
    fn from(db_type: DatabaseType) -> Self {
        Self::for_type(db_type)
    }
}

impl fmt::Debug for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialect").field("db_type", &self.db_type).finish()
    }
}
