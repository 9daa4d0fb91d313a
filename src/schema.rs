//! Schema orchestration: dependency ordering, DDL scripts and model files.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::compiler::{ModelDescriptor, SqlCompiler};

/// Errors raised while ordering or loading models
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// Tables that could not be ordered because they reference each other
    #[error("dependency cycle between tables: {}", tables.join(", "))]
    DependencyCycle { tables: Vec<String> },

    #[error("model '{0}' is declared more than once")]
    DuplicateModel(String),

    #[error("failed to parse model file: {0}")]
    Parse(String),
}

/// On-disk layout of a model file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelsFile {
    #[serde(default)]
    pub tables: Vec<ModelDescriptor>,
}

/// Order models so every table comes after the tables it references.
///
/// Ties keep declaration order. Self references and references to tables not
/// in `models` are ignored.
pub fn sort_models_topologically(
    models: &[ModelDescriptor],
) -> Result<Vec<&ModelDescriptor>, SchemaError> {
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(models.len());
    for (idx, model) in models.iter().enumerate() {
        if positions.insert(model.name.as_str(), idx).is_some() {
            return Err(SchemaError::DuplicateModel(model.name.clone()));
        }
    }

    let mut in_degree = vec![0usize; models.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); models.len()];
    for (idx, model) in models.iter().enumerate() {
        for table in model.referenced_tables() {
            match positions.get(table.as_str()) {
                Some(&parent) if parent != idx => {
                    dependents[parent].push(idx);
                    in_degree[idx] += 1;
                }
                _ => {}
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..models.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut ordered = Vec::with_capacity(models.len());

    while let Some(idx) = ready.pop_first() {
        ordered.push(&models[idx]);
        for &child in &dependents[idx] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.insert(child);
            }
        }
    }

    if ordered.len() < models.len() {
        let tables = models
            .iter()
            .enumerate()
            .filter(|(idx, _)| in_degree[*idx] > 0)
            .map(|(_, model)| model.name.clone())
            .collect();
        return Err(SchemaError::DependencyCycle { tables });
    }

    Ok(ordered)
}

/// Order for dropping: every table before the tables it references
pub fn drop_order(models: &[ModelDescriptor]) -> Result<Vec<&ModelDescriptor>, SchemaError> {
    let mut ordered = sort_models_topologically(models)?;
    ordered.reverse();
    Ok(ordered)
}

/// Full DDL script for `models` in dependency order: each CREATE TABLE
/// followed by the model's declared indexes.
pub fn generate_create_script(
    compiler: &dyn SqlCompiler,
    models: &[ModelDescriptor],
    safe: bool,
) -> crate::Result<String> {
    let mut script = String::new();

    for model in sort_models_topologically(models)? {
        if !script.is_empty() {
            script.push('\n');
        }

        let create = compiler.compile_create_table(model, safe)?;
        script.push_str(&create.sql);
        script.push_str(";\n");

        for index in &model.indexes {
            let index_sql = compiler.compile_index(model, index)?;
            script.push_str(&index_sql.sql);
            script.push_str(";\n");
        }
    }

    Ok(script)
}

/// DROP TABLE script for `models`, dependents first
pub fn generate_drop_script(
    compiler: &dyn SqlCompiler,
    models: &[ModelDescriptor],
    safe: bool,
) -> crate::Result<String> {
    let mut script = String::new();
    for model in drop_order(models)? {
        script.push_str(&compiler.compile_drop_table(model, safe)?.sql);
        script.push_str(";\n");
    }
    Ok(script)
}

/// Parse a model file. JSON is tried when the text starts with `{`, YAML otherwise.
pub fn parse_models(content: &str) -> Result<Vec<ModelDescriptor>, SchemaError> {
    let file: ModelsFile = if content.trim_start().starts_with('{') {
        serde_json::from_str(content).map_err(|e| SchemaError::Parse(e.to_string()))?
    } else {
        serde_yaml::from_str(content).map_err(|e| SchemaError::Parse(e.to_string()))?
    };

    let mut seen = BTreeSet::new();
    for model in &file.tables {
        if !seen.insert(model.name.as_str()) {
            return Err(SchemaError::DuplicateModel(model.name.clone()));
        }
    }

    Ok(file.tables)
}

/// Read and parse a model file
pub async fn load_models(path: impl AsRef<Path>) -> crate::Result<Vec<ModelDescriptor>> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await?;
    let models = parse_models(&content)?;
    debug!(path = %path.display(), models = models.len(), "Loaded model file");
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{ColumnDescriptor, Constraint, DataType, IndexDescriptor, SqliteCompiler};

    fn table(name: &str, references: &[&str]) -> ModelDescriptor {
        let mut model = ModelDescriptor::new(name)
            .with_column(ColumnDescriptor::new("id", DataType::BigInt).primary_key());
        for parent in references {
            model = model.with_column(
                ColumnDescriptor::new(format!("{parent}_id"), DataType::BigInt)
                    .references(*parent, "id"),
            );
        }
        model
    }

    fn names(models: &[&ModelDescriptor]) -> Vec<String> {
        models.iter().map(|m| m.name.clone()).collect()
    }

    #[test]
    fn test_parents_come_first() {
        let models = vec![table("orders", &["users"]), table("users", &[])];
        let sorted = sort_models_topologically(&models).unwrap();
        assert_eq!(names(&sorted), ["users", "orders"]);
    }

    #[test]
    fn test_ties_keep_declaration_order() {
        let models = vec![
            table("c", &[]),
            table("line_items", &["orders", "products"]),
            table("products", &[]),
            table("orders", &["c"]),
            table("a", &[]),
        ];
        let sorted = sort_models_topologically(&models).unwrap();
        assert_eq!(names(&sorted), ["c", "products", "orders", "line_items", "a"]);
    }

    #[test]
    fn test_self_and_external_references_are_ignored() {
        let models = vec![table("employees", &["employees", "departments"])];
        let sorted = sort_models_topologically(&models).unwrap();
        assert_eq!(names(&sorted), ["employees"]);
    }

    #[test]
    fn test_table_level_foreign_keys_count() {
        let child = ModelDescriptor::new("child")
            .with_column(ColumnDescriptor::new("parent_id", DataType::BigInt))
            .with_constraint(Constraint::ForeignKey {
                name: None,
                columns: vec!["parent_id".into()],
                references_table: "parent".into(),
                references_columns: vec!["id".into()],
                on_delete: None,
                on_update: None,
            });
        let models = vec![child, table("parent", &[])];
        let sorted = sort_models_topologically(&models).unwrap();
        assert_eq!(names(&sorted), ["parent", "child"]);
    }

    #[test]
    fn test_cycle_names_unsorted_tables() {
        let models = vec![
            table("standalone", &[]),
            table("a", &["b"]),
            table("b", &["a"]),
            table("c", &["a"]),
        ];
        let err = sort_models_topologically(&models).unwrap_err();
        assert_eq!(
            err,
            SchemaError::DependencyCycle {
                tables: vec!["a".into(), "b".into(), "c".into()]
            }
        );
    }

    #[test]
    fn test_duplicate_model() {
        let models = vec![table("users", &[]), table("users", &[])];
        assert_eq!(
            sort_models_topologically(&models).unwrap_err(),
            SchemaError::DuplicateModel("users".into())
        );
    }

    #[test]
    fn test_drop_order_is_reversed() {
        let models = vec![table("orders", &["users"]), table("users", &[])];
        assert_eq!(names(&drop_order(&models).unwrap()), ["orders", "users"]);
    }

    #[test]
    fn test_generate_create_script() {
        let models = vec![
            table("orders", &["users"])
                .with_index(IndexDescriptor::new(["users_id"])),
            table("users", &[]),
        ];
        let script = generate_create_script(&SqliteCompiler::new(), &models, true).unwrap();

        let users_at = script.find("CREATE TABLE IF NOT EXISTS \"users\"").unwrap();
        let orders_at = script.find("CREATE TABLE IF NOT EXISTS \"orders\"").unwrap();
        let index_at = script
            .find("CREATE INDEX \"orders_users_id_idx\" ON \"orders\" (\"users_id\");")
            .unwrap();
        assert!(users_at < orders_at && orders_at < index_at);
    }

    #[test]
    fn test_generate_drop_script() {
        let models = vec![table("orders", &["users"]), table("users", &[])];
        let script = generate_drop_script(&SqliteCompiler::new(), &models, true).unwrap();
        assert_eq!(
            script,
            "DROP TABLE IF EXISTS \"orders\";\nDROP TABLE IF EXISTS \"users\";\n"
        );
    }

    #[test]
    fn test_parse_yaml_models() {
        let yaml = r#"
tables:
  - name: users
    columns:
      - name: id
        data_type: !Integer I64
        is_primary_key: true
        auto_increment: true
        is_nullable: false
      - name: email
        data_type: !Varchar 255
        is_nullable: false
        is_unique: true
  - name: orders
    columns:
      - name: id
        data_type: BigInt
        is_primary_key: true
      - name: user_id
        data_type: BigInt
        constraints:
          - !ForeignKey
            references_table: users
            references_columns: [id]
"#;
        let models = parse_models(yaml).unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].columns[1].data_type, DataType::Varchar(255));
        assert_eq!(models[1].referenced_tables(), ["users"]);
    }

    #[test]
    fn test_parse_json_models() {
        let json = r#"{"tables": [{"name": "tags", "columns": [
            {"name": "id", "data_type": "BigInt", "is_primary_key": true}
        ]}]}"#;
        let models = parse_models(json).unwrap();
        assert_eq!(models[0].name, "tags");
        assert!(models[0].columns[0].is_primary_key);
    }

    #[test]
    fn test_parse_rejects_duplicates_and_garbage() {
        let yaml = "tables:\n  - name: a\n    columns: []\n  - name: a\n    columns: []\n";
        assert_eq!(
            parse_models(yaml).unwrap_err(),
            SchemaError::DuplicateModel("a".into())
        );
        assert!(matches!(
            parse_models("tables: [1, 2"),
            Err(SchemaError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_load_models_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.yaml");
        tokio::fs::write(&path, "tables:\n  - name: notes\n    columns: []\n")
            .await
            .unwrap();

        let models = load_models(&path).await.unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "notes");

        let missing = load_models(dir.path().join("missing.yaml")).await;
        assert!(matches!(missing, Err(crate::Error::Io(_))));
    }
}
