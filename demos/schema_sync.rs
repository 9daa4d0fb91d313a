//! Create a small schema in an in-memory SQLite database and read it back.
//!
//! Run with `RUST_LOG=debug` to see every statement.

use aiodb::database::extensions::sqlite_config;
use aiodb::schema::parse_models;
use aiodb::{generate_create_script, init_logging, AioDatabase, DatabaseType, IndexField};

const MODELS: &str = r#"
tables:
  - name: comments
    columns:
      - name: id
        data_type: BigInt
        is_primary_key: true
        is_nullable: false
      - name: post_id
        data_type: BigInt
        is_nullable: false
        constraints:
          - !ForeignKey
            references_table: posts
            references_columns: [id]
            on_delete: Cascade
      - name: body
        data_type: !Varchar 2000
  - name: posts
    columns:
      - name: id
        data_type: BigInt
        is_primary_key: true
        is_nullable: false
      - name: slug
        data_type: !Varchar 120
        is_nullable: false
        is_unique: true
      - name: title
        data_type: !Varchar 200
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let models = parse_models(MODELS)?;
    let db = AioDatabase::new(DatabaseType::Sqlite);

    println!("{}", generate_create_script(db.dialect().compiler(), &models, true)?);

    db.connect(sqlite_config(":memory:")).await?;
    db.create_tables(&models, false).await?;
    db.create_index(&models[0], &[IndexField::from("post_id")], false)
        .await?;

    for table in db.get_tables(None).await? {
        println!("{table}");
        for column in db.get_columns(&table, None).await? {
            println!(
                "  {} {}{}{}",
                column.name,
                column.data_type,
                if column.primary_key { " pk" } else { "" },
                if column.nullable { "" } else { " not null" },
            );
        }
        for index in db.get_indexes(&table, None).await? {
            println!(
                "  index {} ({}){}",
                index.name,
                index.columns.join(", "),
                if index.unique { " unique" } else { "" }
            );
        }
        for fk in db.get_foreign_keys(&table, None).await? {
            println!("  {} -> {}.{}", fk.column, fk.dest_table, fk.dest_column);
        }
    }

    db.close().await?;
    Ok(())
}
