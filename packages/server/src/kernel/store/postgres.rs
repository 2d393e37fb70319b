use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::common::RequestId;
use crate::domains::dispatch::models::{EmergencyRequest, OfferBroadcast, RequestStatus};
use crate::domains::presence::models::ResponderPresence;
use crate::kernel::BaseDispatchStore;

/// Postgres-backed store.
///
/// Each record is kept whole as a JSONB document; status and binding columns
/// are duplicated next to it for indexing and ad hoc queries.
#[derive(Clone)]
pub struct PostgresDispatchStore {
    pool: PgPool,
}

impl PostgresDispatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BaseDispatchStore for PostgresDispatchStore {
    async fn save_request(&self, request: &EmergencyRequest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO emergency_requests (id, requester_id, status, assigned_responder_id, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                assigned_responder_id = EXCLUDED.assigned_responder_id,
                document = EXCLUDED.document,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(request.id)
        .bind(request.requester_id)
        .bind(request.status.as_str())
        .bind(request.assigned_responder)
        .bind(Json(request))
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to save emergency request")?;
        Ok(())
    }

    async fn load_request(&self, id: RequestId) -> Result<Option<EmergencyRequest>> {
        let row: Option<(Json<EmergencyRequest>,)> =
            sqlx::query_as("SELECT document FROM emergency_requests WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to load emergency request")?;
        Ok(row.map(|(Json(request),)| request))
    }

    async fn load_searching_requests(&self) -> Result<Vec<EmergencyRequest>> {
        let rows: Vec<(Json<EmergencyRequest>,)> = sqlx::query_as(
            "SELECT document FROM emergency_requests WHERE status = $1 ORDER BY created_at",
        )
        .bind(RequestStatus::Searching.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to load searching requests")?;
        Ok(rows.into_iter().map(|(Json(r),)| r).collect())
    }

    async fn save_offer(&self, offer: &OfferBroadcast) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO offer_broadcasts (request_id, deadline, document)
            VALUES ($1, $2, $3)
            ON CONFLICT (request_id) DO UPDATE SET
                deadline = EXCLUDED.deadline,
                document = EXCLUDED.document
            "#,
        )
        .bind(offer.request_id)
        .bind(offer.deadline)
        .bind(Json(offer))
        .execute(&self.pool)
        .await
        .context("Failed to save offer")?;
        Ok(())
    }

    async fn load_offer(&self, request_id: RequestId) -> Result<Option<OfferBroadcast>> {
        let row: Option<(Json<OfferBroadcast>,)> =
            sqlx::query_as("SELECT document FROM offer_broadcasts WHERE request_id = $1")
                .bind(request_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to load offer")?;
        Ok(row.map(|(Json(offer),)| offer))
    }

    async fn delete_offer(&self, request_id: RequestId) -> Result<()> {
        sqlx::query("DELETE FROM offer_broadcasts WHERE request_id = $1")
            .bind(request_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete offer")?;
        Ok(())
    }

    async fn save_responder(&self, responder: &ResponderPresence) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO responders (id, class, tier, status, session_id, document, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                session_id = EXCLUDED.session_id,
                document = EXCLUDED.document,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(responder.id)
        .bind(responder.class.as_str())
        .bind(responder.tier.as_str())
        .bind(responder.status.as_str())
        .bind(responder.session)
        .bind(Json(responder))
        .bind(responder.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to save responder")?;
        Ok(())
    }

    async fn load_responders(&self) -> Result<Vec<ResponderPresence>> {
        let rows: Vec<(Json<ResponderPresence>,)> =
            sqlx::query_as("SELECT document FROM responders ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .context("Failed to load responders")?;
        Ok(rows.into_iter().map(|(Json(r),)| r).collect())
    }
}
