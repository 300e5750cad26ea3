use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, FromQueryResult, Statement};

use crate::error::StoreResult;
use crate::models::{LinkedIdentity, TokenPair};
use crate::repository::LinkedIdentityRepository;

const UPSERT_SQL: &str = r#"
    INSERT INTO linked (discord_user, wiki_userid, wiki_username, site, access_token, refresh_token)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (discord_user, site) DO UPDATE SET
        wiki_username = EXCLUDED.wiki_username,
        access_token = EXCLUDED.access_token,
        refresh_token = EXCLUDED.refresh_token
"#;

const FIND_SQL: &str = r#"
    SELECT discord_user, wiki_userid, wiki_username, site, access_token, refresh_token
    FROM linked
    WHERE discord_user = $1 AND site = $2
"#;

const UPDATE_TOKENS_SQL: &str =
    "UPDATE linked SET access_token = $3, refresh_token = $4 WHERE discord_user = $1 AND site = $2";

const DELETE_SQL: &str = "DELETE FROM linked WHERE discord_user = $1 AND site = $2";

/// PostgreSQL implementation of LinkedIdentityRepository using SeaORM
#[derive(Clone)]
pub struct PostgresLinkedIdentityRepository {
    db: DatabaseConnection,
}

impl PostgresLinkedIdentityRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromQueryResult)]
struct LinkedRow {
    discord_user: String,
    wiki_userid: String,
    wiki_username: String,
    site: String,
    access_token: String,
    refresh_token: String,
}

impl From<LinkedRow> for LinkedIdentity {
    fn from(row: LinkedRow) -> Self {
        LinkedIdentity {
            discord_user: row.discord_user,
            wiki_userid: row.wiki_userid,
            wiki_username: row.wiki_username,
            site: row.site,
            access_token: row.access_token,
            refresh_token: row.refresh_token,
        }
    }
}

#[async_trait]
impl LinkedIdentityRepository for PostgresLinkedIdentityRepository {
    async fn upsert(&self, identity: LinkedIdentity) -> StoreResult<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            UPSERT_SQL,
            [
                identity.discord_user.into(),
                identity.wiki_userid.into(),
                identity.wiki_username.into(),
                identity.site.into(),
                identity.access_token.into(),
                identity.refresh_token.into(),
            ],
        );

        self.db.execute_raw(stmt).await?;
        Ok(())
    }

    async fn find(&self, discord_user: &str, site: &str) -> StoreResult<Option<LinkedIdentity>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            FIND_SQL,
            [discord_user.into(), site.into()],
        );

        let row = LinkedRow::find_by_statement(stmt).one(&self.db).await?;
        Ok(row.map(Into::into))
    }

    async fn update_tokens(
        &self,
        discord_user: &str,
        site: &str,
        tokens: &TokenPair,
    ) -> StoreResult<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            UPDATE_TOKENS_SQL,
            [
                discord_user.into(),
                site.into(),
                tokens.access_token.as_str().into(),
                tokens.refresh_token.as_str().into(),
            ],
        );

        let result = self.db.execute_raw(stmt).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, discord_user: &str, site: &str) -> StoreResult<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            DELETE_SQL,
            [discord_user.into(), site.into()],
        );

        let result = self.db.execute_raw(stmt).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Transaction, Value};
    use std::collections::BTreeMap;

    fn row() -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("discord_user", "42".into()),
            ("wiki_userid", "7".into()),
            ("wiki_username", "Example".into()),
            ("site", "en".into()),
            ("access_token", "access".into()),
            ("refresh_token", "refresh".into()),
        ])
    }

    #[tokio::test]
    async fn test_find_maps_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row()], vec![]])
            .into_connection();
        let repo = PostgresLinkedIdentityRepository::new(db);

        let found = repo.find("42", "en").await.unwrap().unwrap();
        assert_eq!(found.wiki_username, "Example");
        assert_eq!(found.refresh_token, "refresh");

        assert!(repo.find("43", "en").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_uses_conflict_clause() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let repo = PostgresLinkedIdentityRepository::new(db.clone());

        repo.upsert(LinkedIdentity {
            discord_user: "42".into(),
            wiki_userid: "7".into(),
            wiki_username: "Example".into(),
            site: "en".into(),
            access_token: "access".into(),
            refresh_token: "refresh".into(),
        })
        .await
        .unwrap();

        let log = db.into_transaction_log();
        assert_eq!(
            log,
            vec![Transaction::from_sql_and_values(
                DatabaseBackend::Postgres,
                UPSERT_SQL,
                [
                    "42".into(),
                    "7".into(),
                    "Example".into(),
                    "en".into(),
                    "access".into(),
                    "refresh".into(),
                ],
            )]
        );
    }

    #[tokio::test]
    async fn test_update_and_delete_report_affected_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();
        let repo = PostgresLinkedIdentityRepository::new(db);
        let tokens = TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
        };

        assert!(repo.update_tokens("42", "en", &tokens).await.unwrap());
        assert!(!repo.delete("42", "en").await.unwrap());
    }
}
