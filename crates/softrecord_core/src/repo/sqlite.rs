//! SQLite implementation of the persistence query collaborator.
//!
//! # Responsibility
//! - Translate bulk fetch, conditional update, delete and insert requests
//!   into SQL over one borrowed connection.
//!
//! # Invariants
//! - Table/column names come only from a validated `EntitySchema`; values are
//!   always bound as parameters.
//! - Bulk fetch is one collaborator call; it issues one select per
//!   `MAX_IDS_PER_SELECT` ids.

use crate::model::capability::{Identifiable, OptimisticLockable};
use crate::model::record::{Attributes, EntityId, Record};
use crate::model::schema::EntitySchema;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::query::{Condition, PersistenceQuery};
use crate::validation::reporter::ValidationFailed;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::sync::Arc;

/// Ids bound per `IN (...)` select; stays under SQLite's bound-parameter limit.
const MAX_IDS_PER_SELECT: usize = 500;

/// SQLite-backed persistence query layer.
pub struct SqliteQueryLayer<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteQueryLayer<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PersistenceQuery for SqliteQueryLayer<'_> {
    fn find_all_by_ids(
        &self,
        schema: &Arc<EntitySchema>,
        ids: &[EntityId],
    ) -> RepoResult<Vec<Record>> {
        let id_attribute = require_id_attribute(schema)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for chunk in ids.chunks(MAX_IDS_PER_SELECT) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT {} FROM {} WHERE {} IN ({placeholders});",
                column_list(schema),
                quote_identifier(schema.table()),
                quote_identifier(id_attribute),
            );

            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
            while let Some(row) = rows.next()? {
                records.push(parse_record_row(schema, row)?);
            }
        }

        debug!(
            "event=find_all_by_ids module=repo status=ok entity_type={} requested={} statements={} returned={}",
            schema.entity_type(),
            ids.len(),
            ids.len().div_ceil(MAX_IDS_PER_SELECT),
            records.len()
        );
        Ok(records)
    }

    fn update_by_condition(
        &self,
        schema: &EntitySchema,
        condition: &Condition,
        values: &Attributes,
    ) -> RepoResult<usize> {
        if values.is_empty() {
            return Ok(0);
        }
        for attribute in values.keys() {
            ensure_declared(schema, attribute)?;
        }

        let assignments = values
            .keys()
            .map(|attribute| format!("{} = ?", quote_identifier(attribute)))
            .collect::<Vec<_>>()
            .join(", ");
        let (where_sql, mut bind_values) = where_clause(schema, condition)?;
        let mut params: Vec<Value> = values.values().cloned().collect();
        params.append(&mut bind_values);

        let sql = format!(
            "UPDATE {} SET {assignments}{where_sql};",
            quote_identifier(schema.table())
        );
        let changed = self.conn.execute(&sql, params_from_iter(params))?;
        Ok(changed)
    }

    fn hard_delete(&self, record: &Record) -> RepoResult<usize> {
        let schema = record.schema();
        let id = record.old_primary_key()?;
        let condition = Condition::for_persisted(record)?;
        let (where_sql, bind_values) = where_clause(schema, &condition)?;

        let sql = format!("DELETE FROM {}{where_sql};", quote_identifier(schema.table()));
        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;

        if record.lock_attribute().is_some() && changed == 0 {
            return Err(RepoError::StaleObject {
                entity_type: schema.entity_type().to_string(),
                id,
            });
        }
        Ok(changed)
    }

    fn insert(&self, record: &mut Record) -> RepoResult<EntityId> {
        if record.has_errors() {
            return Err(ValidationFailed::from_record(record).into());
        }
        if !record.is_new_record() {
            return Err(RepoError::UnsupportedOperation(format!(
                "{} is already persisted",
                record.entity_type()
            )));
        }

        let schema = record.schema_handle();
        let (columns, values): (Vec<String>, Vec<Value>) = record
            .attributes()
            .iter()
            .map(|(name, value)| (quote_identifier(name), value.clone()))
            .unzip();

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES;", quote_identifier(schema.table()))
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({});",
                quote_identifier(schema.table()),
                columns.join(", "),
                vec!["?"; columns.len()].join(", ")
            )
        };
        self.conn.execute(&sql, params_from_iter(values))?;

        let id = match schema.id_attribute() {
            Some(attribute) => match record.get(attribute) {
                Some(Value::Integer(id)) => *id,
                _ => {
                    let id = self.conn.last_insert_rowid();
                    record.set(attribute, id)?;
                    id
                }
            },
            None => self.conn.last_insert_rowid(),
        };
        record.mark_persisted();
        Ok(id)
    }
}

fn where_clause(schema: &EntitySchema, condition: &Condition) -> RepoResult<(String, Vec<Value>)> {
    if condition.is_empty() {
        return Ok((String::new(), Vec::new()));
    }

    let mut parts = Vec::with_capacity(condition.predicates().len());
    let mut bind_values = Vec::new();
    for (attribute, value) in condition.predicates() {
        ensure_declared(schema, attribute)?;
        if *value == Value::Null {
            parts.push(format!("{} IS NULL", quote_identifier(attribute)));
        } else {
            parts.push(format!("{} = ?", quote_identifier(attribute)));
            bind_values.push(value.clone());
        }
    }
    Ok((format!(" WHERE {}", parts.join(" AND ")), bind_values))
}

fn parse_record_row(schema: &Arc<EntitySchema>, row: &Row<'_>) -> RepoResult<Record> {
    let mut attributes = Attributes::new();
    for (index, attribute) in schema.attributes().iter().enumerate() {
        attributes.insert(attribute.clone(), row.get::<_, Value>(index)?);
    }
    Ok(Record::from_persisted(Arc::clone(schema), attributes))
}

fn column_list(schema: &EntitySchema) -> String {
    schema
        .attributes()
        .iter()
        .map(|attribute| quote_identifier(attribute))
        .collect::<Vec<_>>()
        .join(", ")
}

fn require_id_attribute(schema: &EntitySchema) -> RepoResult<&str> {
    schema.id_attribute().ok_or_else(|| {
        RepoError::UnsupportedOperation(format!(
            "{} does not declare an `id` attribute",
            schema.entity_type()
        ))
    })
}

fn ensure_declared(schema: &EntitySchema, attribute: &str) -> RepoResult<()> {
    if schema.has_attribute(attribute) {
        Ok(())
    } else {
        Err(RepoError::UnsupportedOperation(format!(
            "{} has no attribute `{attribute}`",
            schema.entity_type()
        )))
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{name}\"")
}
