use std::sync::Arc;
use tracing::debug;
use crate::{
    error::{PortalError, Result},
    storage::{
        models::{Student, StudentLookup},
        store::StudentStore,
    },
};

/// The identifiers an incoming row or entry may carry
#[derive(Debug, Clone, Copy, Default)]
pub struct StudentKeys<'a> {
    pub payment_code: Option<&'a str>,
    pub provider_student_id: Option<&'a str>,
    pub student_name: Option<&'a str>,
}

/// One tier of student resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    /// Internally issued payment code. Authoritative: when a row carries a
    /// code, a miss is final and later tiers are not consulted.
    PaymentCode,
    /// Provider-issued student identifier
    ProviderId,
    /// Exact full-name match
    FullName,
}

impl ResolutionStrategy {
    fn lookup(&self, keys: &StudentKeys<'_>) -> Option<StudentLookup> {
        match self {
            ResolutionStrategy::PaymentCode => {
                present(keys.payment_code).map(|v| StudentLookup::PaymentCode(v.to_string()))
            }
            ResolutionStrategy::ProviderId => {
                present(keys.provider_student_id).map(|v| StudentLookup::ProviderId(v.to_string()))
            }
            ResolutionStrategy::FullName => {
                present(keys.student_name).map(|v| StudentLookup::FullName(v.to_string()))
            }
        }
    }

    fn is_authoritative(&self) -> bool {
        matches!(self, ResolutionStrategy::PaymentCode)
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Resolves a row to a student by trying strategies in order.
///
/// First tier whose lookup returns at least one student wins, and the first
/// student of that result is used. Ties are not detected.
pub struct StudentResolver {
    store: Arc<dyn StudentStore>,
    strategies: Vec<ResolutionStrategy>,
}

impl StudentResolver {
    pub fn new(store: Arc<dyn StudentStore>, strategies: Vec<ResolutionStrategy>) -> Self {
        Self { store, strategies }
    }

    /// Payment code, then provider id, then name
    pub fn for_transactions(store: Arc<dyn StudentStore>) -> Self {
        Self::new(
            store,
            vec![
                ResolutionStrategy::PaymentCode,
                ResolutionStrategy::ProviderId,
                ResolutionStrategy::FullName,
            ],
        )
    }

    /// Provider id, then name
    pub fn for_code_sync(store: Arc<dyn StudentStore>) -> Self {
        Self::new(
            store,
            vec![ResolutionStrategy::ProviderId, ResolutionStrategy::FullName],
        )
    }

    pub fn strategies(&self) -> &[ResolutionStrategy] {
        &self.strategies
    }

    pub async fn resolve(&self, keys: &StudentKeys<'_>) -> Result<Student> {
        for strategy in &self.strategies {
            let Some(lookup) = strategy.lookup(keys) else {
                continue;
            };

            let mut matches = self.store.find_students(&lookup).await?;
            if !matches.is_empty() {
                debug!(
                    "Resolved {:?} via {:?} ({} candidates)",
                    lookup.value(),
                    strategy,
                    matches.len()
                );
                return Ok(matches.swap_remove(0));
            }

            if strategy.is_authoritative() {
                return Err(PortalError::PaymentCodeNotFound(lookup.value().to_string()));
            }
        }

        Err(PortalError::StudentNotFound(format!(
            "{} (ID: {})",
            keys.student_name.unwrap_or("-"),
            keys.provider_student_id.unwrap_or("-")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{memory::MemoryStore, models::{NewStudent, PaymentCodeUpdate}};
    use chrono::Utc;

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for (name, provider_id) in [
            ("Auma Patricia", Some("SP-001")),
            ("Ssempa Daniel", Some("SP-002")),
            ("Ssempa Daniel", None),
        ] {
            store
                .insert_student(&NewStudent {
                    full_name: name.to_string(),
                    provider_student_id: provider_id.map(str::to_string),
                    total_fees_owed: 450_000.0,
                })
                .await
                .unwrap();
        }
        store
            .update_payment_code(
                1,
                &PaymentCodeUpdate {
                    payment_code: "1002003".to_string(),
                    payment_instructions: String::new(),
                    qr_code_url: None,
                    synced_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_payment_code_tier() {
        let store = seeded_store().await;
        let resolver = StudentResolver::new(store, vec![ResolutionStrategy::PaymentCode]);

        let keys = StudentKeys {
            payment_code: Some("1002003"),
            ..Default::default()
        };
        assert_eq!(resolver.resolve(&keys).await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_unknown_payment_code_is_final() {
        let store = seeded_store().await;
        let resolver = StudentResolver::for_transactions(store);

        // provider id would match, but the code takes precedence
        let keys = StudentKeys {
            payment_code: Some("9999999"),
            provider_student_id: Some("SP-002"),
            student_name: None,
        };
        let err = resolver.resolve(&keys).await.unwrap_err();
        assert!(matches!(err, PortalError::PaymentCodeNotFound(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_provider_id_tier() {
        let store = seeded_store().await;
        let resolver = StudentResolver::new(store, vec![ResolutionStrategy::ProviderId]);

        let keys = StudentKeys {
            provider_student_id: Some("SP-002"),
            ..Default::default()
        };
        assert_eq!(resolver.resolve(&keys).await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_full_name_tier_takes_first_match() {
        let store = seeded_store().await;
        let resolver = StudentResolver::new(store, vec![ResolutionStrategy::FullName]);

        let keys = StudentKeys {
            student_name: Some("Ssempa Daniel"),
            ..Default::default()
        };
        assert_eq!(resolver.resolve(&keys).await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_falls_through_to_name() {
        let store = seeded_store().await;
        let resolver = StudentResolver::for_transactions(store);

        let keys = StudentKeys {
            payment_code: Some("  "),
            provider_student_id: Some("SP-404"),
            student_name: Some("Auma Patricia"),
        };
        assert_eq!(resolver.resolve(&keys).await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_no_tier_matches() {
        let store = seeded_store().await;
        let resolver = StudentResolver::for_code_sync(store);

        let keys = StudentKeys {
            provider_student_id: Some("SP-404"),
            student_name: Some("Nobody Here"),
            ..Default::default()
        };
        let err = resolver.resolve(&keys).await.unwrap_err();
        assert!(matches!(err, PortalError::StudentNotFound(_)));
        assert_eq!(err.to_string(), "Student not found: Nobody Here (ID: SP-404)");
    }

    #[tokio::test]
    async fn test_code_sync_ignores_payment_codes() {
        let store = seeded_store().await;
        let resolver = StudentResolver::for_code_sync(store);
        assert_eq!(
            resolver.strategies(),
            &[ResolutionStrategy::ProviderId, ResolutionStrategy::FullName]
        );

        let keys = StudentKeys {
            payment_code: Some("1002003"),
            ..Default::default()
        };
        assert!(resolver.resolve(&keys).await.is_err());
    }
}
