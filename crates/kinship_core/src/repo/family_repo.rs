//! Family tree storage port and SQLite implementation.
//!
//! # Responsibility
//! - Define the persistence contract used by import and inference.
//! - Keep SQL details and row ordering inside the repository boundary.
//!
//! # Invariants
//! - `persist_family` writes a record and all of its members atomically.
//! - Families list in creation order; members list by family, then `sort_order`.
//! - Year updates touch only `birth_year`/`death_year` of existing rows.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::family::{
    FamilyMember, FamilyRecord, FamilyRecordId, MemberId, MemberRole, NewFamilyRecord,
    NewMember, TreeId, YearField,
};
use crate::model::individual::Sex;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

// Stays well below SQLITE_MAX_VARIABLE_NUMBER on every supported build.
const LIST_MEMBERS_CHUNK: usize = 500;

const FAMILY_COLUMNS: &[&str] = &[
    "id",
    "tree_id",
    "owner_id",
    "name",
    "structure_pattern",
    "enabled",
    "created_at",
    "modified_at",
];

const MEMBER_COLUMNS: &[&str] = &[
    "id",
    "family_record_id",
    "role",
    "full_name",
    "birth_year",
    "birth_place",
    "death_year",
    "death_place",
    "gender",
    "source_individual_id",
    "sort_order",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from family tree storage operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target member row does not exist.
    MemberNotFound(MemberId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::MemberNotFound(id) => write!(f, "family member not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "family repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "family repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "family repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid family tree data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage port consumed by import and inference services.
pub trait FamilyRepository {
    /// Inserts one family record and returns its generated id.
    fn create_family_record(&self, record: &NewFamilyRecord) -> RepoResult<FamilyRecordId>;
    /// Inserts one member row under an existing family record.
    fn insert_member(
        &self,
        family_record_id: FamilyRecordId,
        member: &NewMember,
    ) -> RepoResult<MemberId>;
    /// Inserts a family record with all its members in one transaction.
    fn persist_family(
        &self,
        record: &NewFamilyRecord,
        members: &[NewMember],
    ) -> RepoResult<FamilyRecordId>;
    /// Lists every family record of a tree in creation order.
    fn list_family_records(&self, tree_id: TreeId) -> RepoResult<Vec<FamilyRecord>>;
    /// Lists member rows of the given families, grouped by family and
    /// ordered by `sort_order`.
    fn list_members(&self, family_record_ids: &[FamilyRecordId]) -> RepoResult<Vec<FamilyMember>>;
    /// Overwrites one year column of a member row.
    fn update_member_year(
        &self,
        member_id: MemberId,
        field: YearField,
        value: &str,
    ) -> RepoResult<()>;
    /// Resets one year column of a member row to unknown.
    fn clear_member_year(&self, member_id: MemberId, field: YearField) -> RepoResult<()>;
}

/// SQLite-backed family tree repository.
pub struct SqliteFamilyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFamilyRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_family_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl FamilyRepository for SqliteFamilyRepository<'_> {
    fn create_family_record(&self, record: &NewFamilyRecord) -> RepoResult<FamilyRecordId> {
        insert_family_record(self.conn, record)
    }

    fn insert_member(
        &self,
        family_record_id: FamilyRecordId,
        member: &NewMember,
    ) -> RepoResult<MemberId> {
        insert_member_row(self.conn, family_record_id, member)
    }

    fn persist_family(
        &self,
        record: &NewFamilyRecord,
        members: &[NewMember],
    ) -> RepoResult<FamilyRecordId> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let family_record_id = insert_family_record(&tx, record)?;
        for member in members {
            insert_member_row(&tx, family_record_id, member)?;
        }
        tx.commit()?;
        Ok(family_record_id)
    }

    fn list_family_records(&self, tree_id: TreeId) -> RepoResult<Vec<FamilyRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                id,
                tree_id,
                owner_id,
                name,
                structure_pattern,
                enabled,
                created_at,
                modified_at
             FROM family_records
             WHERE tree_id = ?1
             ORDER BY created_at ASC, rowid ASC;",
        )?;
        let mut rows = stmt.query([tree_id.to_string()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_family_record_row(row)?);
        }
        Ok(records)
    }

    fn list_members(&self, family_record_ids: &[FamilyRecordId]) -> RepoResult<Vec<FamilyMember>> {
        let mut members = Vec::new();
        for chunk in family_record_ids.chunks(LIST_MEMBERS_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT
                    m.id AS id,
                    m.family_record_id AS family_record_id,
                    m.role AS role,
                    m.full_name AS full_name,
                    m.birth_year AS birth_year,
                    m.birth_place AS birth_place,
                    m.death_year AS death_year,
                    m.death_place AS death_place,
                    m.gender AS gender,
                    m.source_individual_id AS source_individual_id,
                    m.sort_order AS sort_order
                 FROM family_members m
                 INNER JOIN family_records f ON f.id = m.family_record_id
                 WHERE m.family_record_id IN ({placeholders})
                 ORDER BY f.created_at ASC, f.rowid ASC, m.sort_order ASC;"
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter().map(Uuid::to_string)))?;
            while let Some(row) = rows.next()? {
                members.push(parse_member_row(row)?);
            }
        }
        Ok(members)
    }

    fn update_member_year(
        &self,
        member_id: MemberId,
        field: YearField,
        value: &str,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE family_members SET {} = ?2 WHERE id = ?1;",
                field.column()
            ),
            params![member_id.to_string(), value],
        )?;
        if changed == 0 {
            return Err(RepoError::MemberNotFound(member_id));
        }
        touch_owning_family(self.conn, member_id)
    }

    fn clear_member_year(&self, member_id: MemberId, field: YearField) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE family_members SET {} = NULL WHERE id = ?1;",
                field.column()
            ),
            [member_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::MemberNotFound(member_id));
        }
        touch_owning_family(self.conn, member_id)
    }
}

fn insert_family_record(
    conn: &Connection,
    record: &NewFamilyRecord,
) -> RepoResult<FamilyRecordId> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO family_records (
            id,
            tree_id,
            owner_id,
            name,
            structure_pattern,
            enabled
        ) VALUES (?1, ?2, ?3, ?4, ?5, 1);",
        params![
            id.to_string(),
            record.tree_id.to_string(),
            record.owner_id.to_string(),
            record.name.as_str(),
            record.structure_pattern.as_str(),
        ],
    )?;
    Ok(id)
}

fn insert_member_row(
    conn: &Connection,
    family_record_id: FamilyRecordId,
    member: &NewMember,
) -> RepoResult<MemberId> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO family_members (
            id,
            family_record_id,
            role,
            full_name,
            birth_year,
            birth_place,
            death_year,
            death_place,
            gender,
            source_individual_id,
            sort_order
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
        params![
            id.to_string(),
            family_record_id.to_string(),
            member.role.as_str(),
            member.full_name.as_str(),
            member.birth_year.as_deref(),
            member.birth_place.as_deref(),
            member.death_year.as_deref(),
            member.death_place.as_deref(),
            member.gender.as_str(),
            member.source_individual_id.as_deref(),
            member.sort_order,
        ],
    )?;
    Ok(id)
}

fn touch_owning_family(conn: &Connection, member_id: MemberId) -> RepoResult<()> {
    conn.execute(
        "UPDATE family_records
         SET modified_at = (strftime('%s', 'now') * 1000)
         WHERE id = (SELECT family_record_id FROM family_members WHERE id = ?1);",
        [member_id.to_string()],
    )?;
    Ok(())
}

fn parse_family_record_row(row: &Row<'_>) -> RepoResult<FamilyRecord> {
    let enabled = match row.get::<_, i64>("enabled")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid enabled value `{other}` in family_records.enabled"
            )));
        }
    };

    Ok(FamilyRecord {
        id: parse_uuid(&row.get::<_, String>("id")?, "family_records.id")?,
        tree_id: parse_uuid(&row.get::<_, String>("tree_id")?, "family_records.tree_id")?,
        owner_id: parse_uuid(&row.get::<_, String>("owner_id")?, "family_records.owner_id")?,
        name: row.get("name")?,
        structure_pattern: row.get("structure_pattern")?,
        created_at: row.get("created_at")?,
        modified_at: row.get("modified_at")?,
        enabled,
    })
}

fn parse_member_row(row: &Row<'_>) -> RepoResult<FamilyMember> {
    let role_text: String = row.get("role")?;
    let role = MemberRole::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in family_members.role"))
    })?;

    let gender_text: String = row.get("gender")?;
    let gender = Sex::parse(&gender_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid gender `{gender_text}` in family_members.gender"
        ))
    })?;

    Ok(FamilyMember {
        id: parse_uuid(&row.get::<_, String>("id")?, "family_members.id")?,
        family_record_id: parse_uuid(
            &row.get::<_, String>("family_record_id")?,
            "family_members.family_record_id",
        )?,
        role,
        full_name: row.get("full_name")?,
        birth_year: row.get("birth_year")?,
        birth_place: row.get("birth_place")?,
        death_year: row.get("death_year")?,
        death_place: row.get("death_place")?,
        gender,
        source_individual_id: row.get("source_individual_id")?,
        sort_order: row.get("sort_order")?,
    })
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_family_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for (table, columns) in [
        ("family_records", FAMILY_COLUMNS),
        ("family_members", MEMBER_COLUMNS),
    ] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        let present = table_columns(conn, table)?;
        if let Some(column) = columns
            .iter()
            .copied()
            .find(|column| !present.iter().any(|name| name == column))
        {
            return Err(RepoError::MissingRequiredColumn { table, column });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get(1)?);
    }
    Ok(columns)
}
