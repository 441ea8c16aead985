use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE: &str = "gradecalc.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            branch TEXT NOT NULL,
            section TEXT NOT NULL,
            year TEXT NOT NULL,
            marks TEXT NOT NULL,
            total INTEGER NOT NULL,
            cgpa REAL NOT NULL,
            grade TEXT NOT NULL,
            password_set INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_branch_section ON students(branch, section)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS identities(
            role TEXT NOT NULL,
            login_id TEXT NOT NULL,
            record_key TEXT NOT NULL,
            display_name TEXT NOT NULL,
            salt TEXT NOT NULL,
            secret_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY(role, login_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_identities_record ON identities(record_key)",
        [],
    )?;

    // Workspaces created before the student login flow existed lack this column.
    ensure_students_password_set(conn)?;

    Ok(())
}

fn ensure_students_password_set(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "password_set")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE students ADD COLUMN password_set INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    // A student who already has an identity has set a password.
    conn.execute(
        "UPDATE students SET password_set = 1
         WHERE id IN (SELECT record_key FROM identities WHERE role = 'student')",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
