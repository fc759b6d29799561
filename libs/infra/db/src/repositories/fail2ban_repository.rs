// [libs/infra/db/src/repositories/fail2ban_repository.rs]
//! =================================================================
//! APARATO: FAIL2BAN EVENT REPOSITORY (V3.0)
//! RESPONSABILIDAD: REGISTRO DE BANS/UNBANS OBSERVADOS EN EL BORDE
//! =================================================================

use crate::errors::DbError;
use crate::DbClient;
use guardian_domain_models::blocking::Fail2banEventRecord;
use libsql::params;
use tracing::instrument;

pub struct Fail2banRepository {
    database_client: DbClient,
}

impl Fail2banRepository {
    #[must_use]
    pub fn new(database_client: DbClient) -> Self {
        Self { database_client }
    }

    #[instrument(skip(self, event), fields(ip = %event.ip))]
    pub async fn record(&self, event: &Fail2banEventRecord) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"INSERT OR IGNORE INTO fail2ban_events
                   (id, agent_id, ip_address, jail, is_ban, raw_line, observed_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                params![
                    event.id.clone(),
                    event.agent_id.clone(),
                    event.ip.clone(),
                    event.jail.clone(),
                    event.is_ban as i64,
                    event.raw_line.clone(),
                    event.observed_at.to_rfc3339()
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn count_for_ip(&self, ip: &str) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                "SELECT COUNT(*) FROM fail2ban_events WHERE ip_address = ?1",
                params![ip.to_string()],
            )
            .await?;
        let total = match query_result.next().await? {
            Some(row) => row.get::<i64>(0)? as u64,
            None => 0,
        };
        Ok(total)
    }
}
