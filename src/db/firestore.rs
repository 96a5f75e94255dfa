// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed credential operations.
//!
//! Backends:
//! - Live Firestore (production)
//! - Firestore emulator (local development, via FIRESTORE_EMULATOR_HOST)
//! - In-memory DashMap (tests; real read/write semantics, no network)
//!
//! Every operation is a single-document read or write; there are no
//! transactions, so cross-field consistency (credential + subscription
//! id) is best-effort.

use crate::error::AppError;
use crate::models::{Credential, Provider};
use dashmap::DashMap;
use std::sync::Arc;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Live(firestore::FirestoreDb),
    /// Keyed by (collection, user id).
    Memory(Arc<DashMap<(&'static str, String), Credential>>),
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            backend: Backend::Live(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            backend: Backend::Live(client),
        })
    }

    /// Create an in-memory store for testing (no network).
    pub fn new_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(DashMap::new())),
        }
    }

    // ─── Credential Operations ───────────────────────────────────

    /// Get the stored credential for a (user, provider) pair.
    ///
    /// A missing document is `Ok(None)`, not an error; it means the user
    /// has not connected this provider.
    pub async fn get_credential(
        &self,
        provider: Provider,
        user_id: &str,
    ) -> Result<Option<Credential>, AppError> {
        match &self.backend {
            Backend::Live(client) => client
                .fluent()
                .select()
                .by_id_in(provider.collection())
                .obj()
                .one(user_id)
                .await
                .map_err(|e| AppError::Database(e.to_string())),
            Backend::Memory(map) => Ok(map
                .get(&(provider.collection(), user_id.to_string()))
                .map(|entry| entry.value().clone())),
        }
    }

    /// Create or overwrite the credential for a (user, provider) pair.
    ///
    /// Last writer wins; concurrent refreshes are tolerated rather than
    /// serialized.
    pub async fn set_credential(
        &self,
        provider: Provider,
        credential: &Credential,
    ) -> Result<(), AppError> {
        match &self.backend {
            Backend::Live(client) => {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(provider.collection())
                    .document_id(&credential.user_id)
                    .object(credential)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
            Backend::Memory(map) => {
                map.insert(
                    (provider.collection(), credential.user_id.clone()),
                    credential.clone(),
                );
                Ok(())
            }
        }
    }

    /// Delete the credential for a (user, provider) pair.
    ///
    /// Deleting an absent credential succeeds, which makes disconnect
    /// idempotent at the store level.
    pub async fn delete_credential(
        &self,
        provider: Provider,
        user_id: &str,
    ) -> Result<(), AppError> {
        match &self.backend {
            Backend::Live(client) => {
                client
                    .fluent()
                    .delete()
                    .from(provider.collection())
                    .document_id(user_id)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(())
            }
            Backend::Memory(map) => {
                map.remove(&(provider.collection(), user_id.to_string()));
                Ok(())
            }
        }
    }

    /// Find Strava credentials by athlete id (webhook owner resolution).
    ///
    /// Exactly one match is expected; callers treat zero as user-not-found
    /// and more than one as an invariant violation.
    pub async fn find_strava_credentials_by_athlete(
        &self,
        athlete_id: u64,
    ) -> Result<Vec<Credential>, AppError> {
        match &self.backend {
            Backend::Live(client) => client
                .fluent()
                .select()
                .from(Provider::Strava.collection())
                .filter(move |q| q.field("athlete_id").eq(athlete_id))
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string())),
            Backend::Memory(map) => Ok(map
                .iter()
                .filter(|entry| {
                    entry.key().0 == Provider::Strava.collection()
                        && entry.value().athlete_id == Some(athlete_id)
                })
                .map(|entry| entry.value().clone())
                .collect()),
        }
    }
}
