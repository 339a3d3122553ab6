use crate::schema::{ColumnType, Index, TableSchema};

/// Generate CREATE TABLE SQL for a table schema
pub fn generate_create_table(schema: &TableSchema) -> String {
    let mut sql = format!("CREATE TABLE {} (\n", schema.name);
    let mut columns = Vec::new();

    for col in schema.columns {
        let sql_type = match col.col_type {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        };

        let pk = if col.name == "id" { " PRIMARY KEY" } else { "" };
        let null_constraint = if !col.nullable && col.name != "id" {
            " NOT NULL"
        } else {
            ""
        };

        columns.push(format!(
            "    {} {}{}{}",
            col.name, sql_type, pk, null_constraint
        ));
    }

    for fk in schema.foreign_keys {
        columns.push(format!(
            "    FOREIGN KEY ({}) REFERENCES {}({})",
            fk.column, fk.references_table, fk.references_column
        ));
    }

    sql.push_str(&columns.join(",\n"));
    sql.push_str("\n)");

    sql
}

fn index_sql(table: &str, index: &Index) -> String {
    let unique = if index.unique { "UNIQUE " } else { "" };
    format!(
        "CREATE {}INDEX idx_{}_{} ON {}({})",
        unique,
        table,
        index.columns.join("_"),
        table,
        index.columns.join(", ")
    )
}

/// Generate CREATE INDEX statements: explicit indexes plus one per FK
/// column not already covered.
pub fn generate_indexes(schema: &TableSchema) -> Vec<String> {
    let mut out: Vec<String> = schema
        .indexes
        .iter()
        .map(|idx| index_sql(schema.name, idx))
        .collect();

    for fk in schema.foreign_keys {
        let covered = schema
            .indexes
            .iter()
            .any(|idx| idx.columns.first() == Some(&fk.column));
        if !covered {
            out.push(format!(
                "CREATE INDEX idx_{}_{} ON {}({})",
                schema.name, fk.column, schema.name, fk.column
            ));
        }
    }

    out
}
