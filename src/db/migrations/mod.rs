//! Schema migrations for the local store.
//!
//! Each migration has an `up` script that moves the schema from `version - 1` to `version`. The
//! scripts live next to this file as `migration_NN_up.sql`. The schema only ever moves forward.

use crate::error::Res;
use anyhow::{bail, Context};
use sqlx::{Executor, SqlitePool};
use tracing::debug;

struct Migration {
    version: i64,
    up: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    up: include_str!("migration_01_up.sql"),
}];

/// One script to execute and the schema version it leaves behind.
struct Step {
    sql: &'static str,
    resulting_version: i64,
    label: String,
}

/// Moves the schema from `from` to `to`, one version at a time. Every required migration is looked
/// up before anything is executed, so a missing migration leaves the schema untouched.
pub(crate) async fn run(pool: &SqlitePool, from: i64, to: i64) -> Res<()> {
    let steps = plan(from, to)?;
    if steps.is_empty() {
        debug!("Store schema is already at version {to}");
        return Ok(());
    }
    for step in steps {
        debug!("Running {}", step.label);
        apply(pool, &step).await?;
    }
    debug!("Store schema is now at version {to}");
    Ok(())
}

fn plan(from: i64, to: i64) -> Res<Vec<Step>> {
    if from > to {
        bail!("The schema cannot move backwards from version {from} to {to}");
    }
    let find = |version: i64| -> Res<&'static Migration> {
        match MIGRATIONS.iter().find(|m| m.version == version) {
            Some(m) => Ok(m),
            None => bail!(
                "Migration {version} is required to move from {from} to {to} but does not exist"
            ),
        }
    };

    let mut steps = Vec::new();
    for version in (from + 1)..=to {
        steps.push(Step {
            sql: find(version)?.up,
            resulting_version: version,
            label: format!("migration {version:02}"),
        });
    }
    Ok(steps)
}

/// The script and the version bump commit together or not at all.
async fn apply(pool: &SqlitePool, step: &Step) -> Res<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Unable to begin a migration transaction")?;
    (&mut *tx)
        .execute(step.sql)
        .await
        .with_context(|| format!("Unable to execute {}", step.label))?;
    sqlx::query("UPDATE schema_version SET version = ?")
        .bind(step.resulting_version)
        .execute(&mut *tx)
        .await
        .context("Unable to record the new schema version")?;
    tx.commit()
        .await
        .with_context(|| format!("Unable to commit {}", step.label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use tempfile::TempDir;

    async fn bootstrapped_pool() -> (TempDir, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("m.sqlite"))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE schema_version (version INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO schema_version (version) VALUES (0)")
            .execute(&pool)
            .await
            .unwrap();
        (dir, pool)
    }

    async fn version(pool: &SqlitePool) -> i64 {
        let (v,): (i64,) = sqlx::query_as("SELECT version FROM schema_version")
            .fetch_one(pool)
            .await
            .unwrap();
        v
    }

    async fn has_table(pool: &SqlitePool, name: &str) -> bool {
        let (n,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(name)
                .fetch_one(pool)
                .await
                .unwrap();
        n > 0
    }

    #[tokio::test]
    async fn test_up_creates_record_table() {
        let (_dir, pool) = bootstrapped_pool().await;
        run(&pool, 0, 1).await.unwrap();
        assert_eq!(version(&pool).await, 1);
        assert!(has_table(&pool, "new_budget_record").await);
    }

    #[tokio::test]
    async fn test_same_version_is_a_no_op() {
        let (_dir, pool) = bootstrapped_pool().await;
        run(&pool, 0, 1).await.unwrap();
        run(&pool, 1, 1).await.unwrap();
        assert_eq!(version(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_missing_migration_changes_nothing() {
        let (_dir, pool) = bootstrapped_pool().await;
        assert!(run(&pool, 0, 2).await.is_err());
        assert_eq!(version(&pool).await, 0);
        assert!(!has_table(&pool, "new_budget_record").await);
    }

    #[test]
    fn test_plan_only_moves_forward() {
        let up = plan(0, 1).unwrap();
        assert_eq!(up.len(), 1);
        assert_eq!(up[0].resulting_version, 1);
        assert!(plan(1, 1).unwrap().is_empty());
        assert!(plan(1, 0).is_err());
        assert!(plan(1, 3).is_err());
    }

    #[tokio::test]
    async fn test_backwards_run_changes_nothing() {
        let (_dir, pool) = bootstrapped_pool().await;
        run(&pool, 0, 1).await.unwrap();
        assert!(run(&pool, 1, 0).await.is_err());
        assert_eq!(version(&pool).await, 1);
        assert!(has_table(&pool, "new_budget_record").await);
    }
}
