//! Live schema reader over a single Diesel connection.
//!
//! Catalog queries are plain SQL run through `diesel::sql_query` and decoded
//! with `QueryableByName` rows. Every numeric catalog value is cast to BIGINT
//! so one row type serves all three dialects.

use super::database::{compiled_dialect, Database, DatabaseConfig, DbConnection, PooledConnection};
use super::{RawColumn, RawEnumColumn, RawForeignKey, RawIndex, ReferentialAction, SchemaReader, TableFilter};
use crate::dialect::Dialect;
use crate::error::GenerationError;
use crate::metadata::enums::parse_enum_literal;
use diesel::connection::Connection;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{BigInt, Nullable, Text};
use diesel::{QueryableByName, RunQueryDsl};
use indexmap::IndexMap;

type Backend = <DbConnection as Connection>::Backend;

#[derive(QueryableByName)]
struct TableNameRow {
    #[diesel(sql_type = Text)]
    table_name: String,
}

#[derive(QueryableByName)]
struct TableCountRow {
    #[diesel(sql_type = BigInt)]
    table_count: i64,
}

#[derive(QueryableByName)]
struct ColumnRow {
    #[diesel(sql_type = Text)]
    column_name: String,
    #[diesel(sql_type = Text)]
    native_type: String,
    #[diesel(sql_type = Text)]
    is_nullable: String,
    #[diesel(sql_type = Nullable<Text>)]
    column_default: Option<String>,
    #[diesel(sql_type = Nullable<BigInt>)]
    max_length: Option<i64>,
    #[diesel(sql_type = Nullable<BigInt>)]
    numeric_precision: Option<i64>,
    #[diesel(sql_type = Nullable<BigInt>)]
    numeric_scale: Option<i64>,
    #[diesel(sql_type = BigInt)]
    auto_increment: i64,
    #[diesel(sql_type = BigInt)]
    ordinal_position: i64,
    #[diesel(sql_type = BigInt)]
    key_rank: i64,
}

#[derive(QueryableByName)]
struct ForeignKeyRow {
    #[diesel(sql_type = Text)]
    constraint_name: String,
    #[diesel(sql_type = Text)]
    column_name: String,
    #[diesel(sql_type = Text)]
    referenced_table: String,
    #[diesel(sql_type = Text)]
    referenced_column: String,
    #[diesel(sql_type = Text)]
    on_delete: String,
    #[diesel(sql_type = Text)]
    on_update: String,
}

#[derive(QueryableByName)]
struct IndexRow {
    #[diesel(sql_type = Text)]
    index_name: String,
    #[diesel(sql_type = Nullable<Text>)]
    column_name: Option<String>,
    #[diesel(sql_type = BigInt)]
    is_unique: i64,
    #[diesel(sql_type = BigInt)]
    is_primary: i64,
}

#[derive(QueryableByName)]
struct PrimaryKeyRow {
    #[diesel(sql_type = Text)]
    column_name: String,
}

#[derive(QueryableByName)]
struct EnumValueRow {
    #[diesel(sql_type = Text)]
    column_name: String,
    #[diesel(sql_type = Text)]
    enum_value: String,
}

#[derive(QueryableByName)]
struct EnumTypeRow {
    #[diesel(sql_type = Text)]
    column_name: String,
    #[diesel(sql_type = Text)]
    native_type: String,
}

/// Catalog SQL for one dialect
struct CatalogQueries {
    /// Whether the schema name is bound ahead of the table name
    binds_schema: bool,
    list_tables: &'static str,
    table_exists: &'static str,
    columns: &'static str,
    foreign_keys: &'static str,
    indexes: &'static str,
    /// Primary key columns, for catalogs that do not list the key as an index
    primary_key: Option<&'static str>,
    enums: Option<&'static str>,
    read_only: &'static str,
}

const POSTGRES: CatalogQueries = CatalogQueries {
    binds_schema: true,
    list_tables: "SELECT table_name::text AS table_name \
        FROM information_schema.tables \
        WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
        ORDER BY table_name",
    table_exists: "SELECT COUNT(*)::bigint AS table_count \
        FROM information_schema.tables \
        WHERE table_schema = $1 AND table_name = $2",
    columns: "SELECT c.column_name::text AS column_name, \
            CASE WHEN c.data_type IN ('USER-DEFINED', 'ARRAY') THEN c.udt_name::text ELSE c.data_type::text END AS native_type, \
            c.is_nullable::text AS is_nullable, \
            c.column_default::text AS column_default, \
            c.character_maximum_length::bigint AS max_length, \
            c.numeric_precision::bigint AS numeric_precision, \
            c.numeric_scale::bigint AS numeric_scale, \
            (CASE WHEN c.is_identity = 'YES' OR c.column_default LIKE 'nextval(%' THEN 1 ELSE 0 END)::bigint AS auto_increment, \
            c.ordinal_position::bigint AS ordinal_position, \
            0::bigint AS key_rank \
        FROM information_schema.columns c \
        WHERE c.table_schema = $1 AND c.table_name = $2 \
        ORDER BY c.ordinal_position",
    foreign_keys: "SELECT con.conname::text AS constraint_name, \
            src.attname::text AS column_name, \
            tgt_cls.relname::text AS referenced_table, \
            tgt.attname::text AS referenced_column, \
            con.confdeltype::text AS on_delete, \
            con.confupdtype::text AS on_update \
        FROM pg_constraint con \
        JOIN pg_class cls ON cls.oid = con.conrelid \
        JOIN pg_namespace ns ON ns.oid = cls.relnamespace \
        JOIN pg_class tgt_cls ON tgt_cls.oid = con.confrelid \
        CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(src_attnum, tgt_attnum, ord) \
        JOIN pg_attribute src ON src.attrelid = con.conrelid AND src.attnum = k.src_attnum \
        JOIN pg_attribute tgt ON tgt.attrelid = con.confrelid AND tgt.attnum = k.tgt_attnum \
        WHERE con.contype = 'f' AND ns.nspname = $1 AND cls.relname = $2 \
        ORDER BY con.conname, k.ord",
    indexes: "SELECT i.relname::text AS index_name, \
            a.attname::text AS column_name, \
            (CASE WHEN ix.indisunique THEN 1 ELSE 0 END)::bigint AS is_unique, \
            (CASE WHEN ix.indisprimary THEN 1 ELSE 0 END)::bigint AS is_primary \
        FROM pg_index ix \
        JOIN pg_class t ON t.oid = ix.indrelid \
        JOIN pg_class i ON i.oid = ix.indexrelid \
        JOIN pg_namespace ns ON ns.oid = t.relnamespace \
        CROSS JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord) \
        LEFT JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum \
        WHERE ns.nspname = $1 AND t.relname = $2 \
        ORDER BY i.relname, k.ord",
    primary_key: None,
    enums: Some(
        "SELECT c.column_name::text AS column_name, e.enumlabel::text AS enum_value \
        FROM information_schema.columns c \
        JOIN pg_type t ON t.typname::text = c.udt_name::text \
        JOIN pg_namespace tn ON tn.oid = t.typnamespace AND tn.nspname::text = c.udt_schema::text \
        JOIN pg_enum e ON e.enumtypid = t.oid \
        WHERE c.table_schema = $1 AND c.table_name = $2 \
        ORDER BY c.ordinal_position, e.enumsortorder",
    ),
    read_only: "SET SESSION CHARACTERISTICS AS TRANSACTION READ ONLY",
};

const MYSQL: CatalogQueries = CatalogQueries {
    binds_schema: true,
    list_tables: "SELECT CAST(table_name AS CHAR) AS table_name \
        FROM information_schema.tables \
        WHERE table_schema = ? AND table_type = 'BASE TABLE' \
        ORDER BY table_name",
    table_exists: "SELECT CAST(COUNT(*) AS SIGNED) AS table_count \
        FROM information_schema.tables \
        WHERE table_schema = ? AND table_name = ?",
    columns: "SELECT CAST(column_name AS CHAR) AS column_name, \
            CAST(column_type AS CHAR) AS native_type, \
            CAST(is_nullable AS CHAR) AS is_nullable, \
            CAST(column_default AS CHAR) AS column_default, \
            CAST(character_maximum_length AS SIGNED) AS max_length, \
            CAST(numeric_precision AS SIGNED) AS numeric_precision, \
            CAST(numeric_scale AS SIGNED) AS numeric_scale, \
            CAST(CASE WHEN extra LIKE '%auto_increment%' THEN 1 ELSE 0 END AS SIGNED) AS auto_increment, \
            CAST(ordinal_position AS SIGNED) AS ordinal_position, \
            CAST(0 AS SIGNED) AS key_rank \
        FROM information_schema.columns \
        WHERE table_schema = ? AND table_name = ? \
        ORDER BY ordinal_position",
    foreign_keys: "SELECT CAST(k.constraint_name AS CHAR) AS constraint_name, \
            CAST(k.column_name AS CHAR) AS column_name, \
            CAST(k.referenced_table_name AS CHAR) AS referenced_table, \
            CAST(k.referenced_column_name AS CHAR) AS referenced_column, \
            CAST(r.delete_rule AS CHAR) AS on_delete, \
            CAST(r.update_rule AS CHAR) AS on_update \
        FROM information_schema.key_column_usage k \
        JOIN information_schema.referential_constraints r \
            ON r.constraint_schema = k.constraint_schema \
            AND r.constraint_name = k.constraint_name \
            AND r.table_name = k.table_name \
        WHERE k.table_schema = ? AND k.table_name = ? AND k.referenced_table_name IS NOT NULL \
        ORDER BY k.constraint_name, k.ordinal_position",
    indexes: "SELECT CAST(index_name AS CHAR) AS index_name, \
            CAST(column_name AS CHAR) AS column_name, \
            CAST(CASE WHEN non_unique = 0 THEN 1 ELSE 0 END AS SIGNED) AS is_unique, \
            CAST(CASE WHEN index_name = 'PRIMARY' THEN 1 ELSE 0 END AS SIGNED) AS is_primary \
        FROM information_schema.statistics \
        WHERE table_schema = ? AND table_name = ? \
        ORDER BY index_name, seq_in_index",
    primary_key: None,
    enums: Some(
        "SELECT CAST(column_name AS CHAR) AS column_name, CAST(column_type AS CHAR) AS native_type \
        FROM information_schema.columns \
        WHERE table_schema = ? AND table_name = ? AND data_type = 'enum' \
        ORDER BY ordinal_position",
    ),
    read_only: "SET SESSION TRANSACTION READ ONLY",
};

const SQLITE: CatalogQueries = CatalogQueries {
    binds_schema: false,
    list_tables: "SELECT name AS table_name FROM sqlite_master \
        WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
        ORDER BY name",
    table_exists: "SELECT CAST(COUNT(*) AS BIGINT) AS table_count FROM sqlite_master \
        WHERE type = 'table' AND name = ?",
    columns: "SELECT name AS column_name, type AS native_type, \
            CASE WHEN \"notnull\" = 1 OR pk > 0 THEN 'NO' ELSE 'YES' END AS is_nullable, \
            dflt_value AS column_default, \
            NULL AS max_length, NULL AS numeric_precision, NULL AS numeric_scale, \
            CAST(0 AS BIGINT) AS auto_increment, \
            CAST(cid + 1 AS BIGINT) AS ordinal_position, \
            CAST(pk AS BIGINT) AS key_rank \
        FROM pragma_table_info(?) ORDER BY cid",
    foreign_keys: "SELECT 'fk_' || id AS constraint_name, \"from\" AS column_name, \
            \"table\" AS referenced_table, COALESCE(\"to\", '') AS referenced_column, \
            on_delete, on_update \
        FROM pragma_foreign_key_list(?) ORDER BY id, seq",
    indexes: "SELECT il.name AS index_name, ii.name AS column_name, \
            CAST(il.\"unique\" AS BIGINT) AS is_unique, CAST(0 AS BIGINT) AS is_primary \
        FROM pragma_index_list(?) il JOIN pragma_index_info(il.name) ii \
        WHERE il.origin != 'pk' \
        ORDER BY il.name, ii.seqno",
    primary_key: Some(
        "SELECT name AS column_name FROM pragma_table_info(?) WHERE pk > 0 ORDER BY pk",
    ),
    enums: None,
    read_only: "PRAGMA query_only = ON",
};

fn catalog_queries(dialect: Dialect) -> &'static CatalogQueries {
    match dialect {
        Dialect::Postgres => &POSTGRES,
        Dialect::MySql => &MYSQL,
        Dialect::Sqlite => &SQLITE,
    }
}

fn statement_timeout_sql(dialect: Dialect, millis: u64) -> String {
    match dialect {
        Dialect::Postgres => format!("SET statement_timeout = {}", millis),
        Dialect::MySql => format!("SET SESSION max_execution_time = {}", millis),
        Dialect::Sqlite => format!("PRAGMA busy_timeout = {}", millis),
    }
}

/// Schema reader holding one read-only connection for the whole run
pub struct DieselSchemaReader {
    conn: PooledConnection,
    dialect: Dialect,
    schema: String,
    queries: &'static CatalogQueries,
}

impl DieselSchemaReader {
    /// Connect and prepare a read-only session.
    ///
    /// Fails with [`GenerationError::Connection`] when the database cannot be
    /// reached, rejects the credentials, or `dialect` is not the backend this
    /// binary was built for.
    pub fn connect(
        database_url: &str,
        dialect: Dialect,
        schema: &str,
        config: &DatabaseConfig,
    ) -> Result<Self, GenerationError> {
        if compiled_dialect() != Some(dialect) {
            return Err(GenerationError::connection(format!(
                "dialect '{}' is not supported by this build (compiled backend: {})",
                dialect,
                compiled_dialect().map(|d| d.as_str()).unwrap_or("none")
            )));
        }

        let database = Database::connect(database_url, config).map_err(GenerationError::connection)?;
        let conn = database.get_connection().map_err(GenerationError::connection)?;

        let schema = if schema.is_empty() {
            dialect.default_schema().to_string()
        } else {
            schema.to_string()
        };

        let mut reader = DieselSchemaReader {
            conn,
            dialect,
            schema,
            queries: catalog_queries(dialect),
        };
        reader.prepare_session(config)?;

        tracing::info!(
            "Connected to {} database, reading schema '{}'",
            reader.dialect,
            reader.schema
        );
        Ok(reader)
    }

    fn prepare_session(&mut self, config: &DatabaseConfig) -> Result<(), GenerationError> {
        diesel::sql_query(self.queries.read_only)
            .execute(&mut *self.conn)
            .map_err(GenerationError::connection)?;

        if let Some(secs) = config.statement_timeout_secs {
            diesel::sql_query(statement_timeout_sql(self.dialect, secs.saturating_mul(1000)))
                .execute(&mut *self.conn)
                .map_err(GenerationError::connection)?;
        }
        Ok(())
    }

    fn bound(&self, sql: &'static str, table: Option<&str>) -> BoxedSqlQuery<'static, Backend, SqlQuery> {
        let mut query = diesel::sql_query(sql).into_boxed::<Backend>();
        if self.queries.binds_schema {
            query = query.bind::<Text, _>(self.schema.clone());
        }
        if let Some(table) = table {
            query = query.bind::<Text, _>(table.to_string());
        }
        query
    }

    fn table_exists(&mut self, table: &str) -> Result<bool, GenerationError> {
        let rows = self
            .bound(self.queries.table_exists, Some(table))
            .load::<TableCountRow>(&mut *self.conn)
            .map_err(|e| GenerationError::schema_read(table, e))?;
        Ok(rows.first().map(|r| r.table_count > 0).unwrap_or(false))
    }
}

impl SchemaReader for DieselSchemaReader {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn schema_name(&self) -> &str {
        &self.schema
    }

    fn list_tables(&mut self, filter: &TableFilter) -> Result<Vec<String>, GenerationError> {
        let rows = self
            .bound(self.queries.list_tables, None)
            .load::<TableNameRow>(&mut *self.conn)
            .map_err(GenerationError::connection)?;
        Ok(filter.apply(rows.into_iter().map(|r| r.table_name)))
    }

    fn read_columns(&mut self, table: &str) -> Result<Vec<RawColumn>, GenerationError> {
        let rows = self
            .bound(self.queries.columns, Some(table))
            .load::<ColumnRow>(&mut *self.conn)
            .map_err(|e| GenerationError::schema_read(table, e))?;

        // An empty column list either means the table was dropped after it was
        // listed, or it genuinely has no columns. Only the former is an error.
        if rows.is_empty() && !self.table_exists(table)? {
            return Err(GenerationError::schema_read(table, "table no longer exists"));
        }

        // SQLite: a lone INTEGER primary key aliases the rowid.
        let rowid_alias = if self.dialect == Dialect::Sqlite {
            let keyed: Vec<&ColumnRow> = rows.iter().filter(|r| r.key_rank > 0).collect();
            match keyed.as_slice() {
                [only] if only.native_type.eq_ignore_ascii_case("integer") => Some(only.column_name.clone()),
                _ => None,
            }
        } else {
            None
        };

        Ok(rows
            .into_iter()
            .map(|row| RawColumn {
                auto_increment: row.auto_increment != 0 || rowid_alias.as_deref() == Some(row.column_name.as_str()),
                nullable: row.is_nullable.eq_ignore_ascii_case("YES"),
                name: row.column_name,
                native_type: row.native_type,
                default: row.column_default,
                max_length: row.max_length,
                precision: row.numeric_precision,
                scale: row.numeric_scale,
                ordinal: row.ordinal_position,
            })
            .collect())
    }

    fn read_foreign_keys(&mut self, table: &str) -> Result<Vec<RawForeignKey>, GenerationError> {
        let rows = self
            .bound(self.queries.foreign_keys, Some(table))
            .load::<ForeignKeyRow>(&mut *self.conn)
            .map_err(|e| GenerationError::schema_read(table, e))?;

        let dialect = self.dialect;
        let parse_action = |rule: &str| match dialect {
            Dialect::Postgres => ReferentialAction::from_pg_code(rule),
            _ => ReferentialAction::from_rule(rule),
        };

        let mut grouped: IndexMap<String, RawForeignKey> = IndexMap::new();
        for row in rows {
            let fk = grouped.entry(row.constraint_name.clone()).or_insert_with(|| RawForeignKey {
                name: row.constraint_name.clone(),
                columns: Vec::new(),
                referenced_table: row.referenced_table.clone(),
                referenced_columns: Vec::new(),
                on_delete: parse_action(&row.on_delete),
                on_update: parse_action(&row.on_update),
            });
            fk.columns.push(row.column_name);
            if !row.referenced_column.is_empty() {
                fk.referenced_columns.push(row.referenced_column);
            }
        }
        Ok(grouped.into_values().collect())
    }

    fn read_indexes(&mut self, table: &str) -> Result<Vec<RawIndex>, GenerationError> {
        let rows = self
            .bound(self.queries.indexes, Some(table))
            .load::<IndexRow>(&mut *self.conn)
            .map_err(|e| GenerationError::schema_read(table, e))?;

        let mut grouped: IndexMap<String, Option<RawIndex>> = IndexMap::new();
        for row in rows {
            let slot = grouped.entry(row.index_name.clone()).or_insert_with(|| {
                Some(RawIndex {
                    name: row.index_name.clone(),
                    columns: Vec::new(),
                    unique: row.is_unique != 0,
                    primary: row.is_primary != 0,
                })
            });
            match (slot.as_mut(), row.column_name) {
                (Some(index), Some(column)) => index.columns.push(column),
                // Expression indexes do not describe column keys.
                _ => *slot = None,
            }
        }
        let mut indexes: Vec<RawIndex> = grouped.into_values().flatten().collect();

        if let Some(sql) = self.queries.primary_key {
            let key = self
                .bound(sql, Some(table))
                .load::<PrimaryKeyRow>(&mut *self.conn)
                .map_err(|e| GenerationError::schema_read(table, e))?;
            if !key.is_empty() {
                indexes.push(RawIndex {
                    name: format!("{}_pkey", table),
                    columns: key.into_iter().map(|r| r.column_name).collect(),
                    unique: true,
                    primary: true,
                });
            }
        }
        Ok(indexes)
    }

    fn read_enum_declarations(&mut self, table: &str) -> Result<Vec<RawEnumColumn>, GenerationError> {
        let Some(sql) = self.queries.enums else {
            return Ok(Vec::new());
        };

        match self.dialect {
            Dialect::Postgres => {
                let rows = self
                    .bound(sql, Some(table))
                    .load::<EnumValueRow>(&mut *self.conn)
                    .map_err(|e| GenerationError::schema_read(table, e))?;
                let mut grouped: IndexMap<String, Vec<String>> = IndexMap::new();
                for row in rows {
                    grouped.entry(row.column_name).or_default().push(row.enum_value);
                }
                Ok(grouped
                    .into_iter()
                    .map(|(column, values)| RawEnumColumn { column, values })
                    .collect())
            }
            _ => {
                let rows = self
                    .bound(sql, Some(table))
                    .load::<EnumTypeRow>(&mut *self.conn)
                    .map_err(|e| GenerationError::schema_read(table, e))?;
                Ok(rows
                    .into_iter()
                    .filter_map(|row| {
                        parse_enum_literal(&row.native_type).map(|values| RawEnumColumn {
                            column: row.column_name,
                            values,
                        })
                    })
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_dialect_has_catalog_queries() {
        for dialect in [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite] {
            let queries = catalog_queries(dialect);
            assert!(queries.columns.contains("ordinal_position"));
            assert!(queries.columns.contains("key_rank"));
            assert!(queries.indexes.contains("is_primary"));
        }
    }

    #[test]
    fn test_placeholders_match_dialect() {
        assert!(POSTGRES.columns.contains("$2"));
        assert!(!MYSQL.columns.contains('$'));
        assert!(!SQLITE.binds_schema);
    }

    #[test]
    fn test_statement_timeout_sql() {
        assert_eq!(statement_timeout_sql(Dialect::Postgres, 5000), "SET statement_timeout = 5000");
        assert_eq!(
            statement_timeout_sql(Dialect::MySql, 5000),
            "SET SESSION max_execution_time = 5000"
        );
    }
}
