// [libs/infra/db/src/repositories/ml_repository.rs]
//! =================================================================
//! APARATO: ML ASSESSMENT SIDECAR REPOSITORY (V5.0)
//! RESPONSABILIDAD: VEREDICTOS DEL DETECTOR POR EVENTO
//! =================================================================

use crate::errors::DbError;
use crate::DbClient;
use guardian_domain_models::event::MlAssessment;
use libsql::params;
use tracing::instrument;

pub struct MlRepository {
    database_client: DbClient,
}

impl MlRepository {
    #[must_use]
    pub fn new(database_client: DbClient) -> Self {
        Self { database_client }
    }

    /// Cristaliza el veredicto con la instantánea de características.
    #[instrument(skip(self, assessment), fields(event = %assessment.event_uuid))]
    pub async fn insert(&self, assessment: &MlAssessment) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"INSERT OR REPLACE INTO auth_events_ml
                   (event_uuid, model_identifier, risk_score, threat_type, confidence,
                    is_anomaly, features_snapshot, inference_latency_ms, operator_feedback,
                    resulted_in_block)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
                params![
                    assessment.event_uuid.clone(),
                    assessment.model_identifier.clone(),
                    assessment.risk_score,
                    assessment.threat_type.clone(),
                    assessment.confidence,
                    assessment.is_anomaly as i64,
                    assessment.features_snapshot.to_string(),
                    assessment.inference_latency_ms,
                    assessment.operator_feedback.clone(),
                    assessment.resulted_in_block as i64
                ],
            )
            .await?;
        Ok(())
    }

    /// Sella que el evento terminó en bloqueo (join-back del emisor).
    pub async fn mark_blocked(&self, event_uuid: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE auth_events_ml SET resulted_in_block = 1 WHERE event_uuid = ?1",
                params![event_uuid.to_string()],
            )
            .await?;
        Ok(())
    }

    /// Retroalimentación humana sobre el veredicto.
    pub async fn set_feedback(&self, event_uuid: &str, feedback: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE auth_events_ml SET operator_feedback = ?1 WHERE event_uuid = ?2",
                params![feedback.to_string(), event_uuid.to_string()],
            )
            .await?;
        Ok(())
    }
}
