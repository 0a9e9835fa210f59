use serde::Serialize;
use std::collections::BTreeMap;
use crate::{
    payments::normalize::{FeeCategory, PaymentMethod},
    storage::models::TransactionRecord,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaymentAnalytics {
    pub total_amount: f64,
    pub payment_method_counts: BTreeMap<PaymentMethod, usize>,
    pub fee_type_counts: BTreeMap<FeeCategory, usize>,
    /// Keyed by "YYYY-MM" of the payment date
    pub monthly_totals: BTreeMap<String, f64>,
    /// Transactions that arrived through the payment provider
    pub external_payment_count: usize,
}

/// Aggregate transactions in one pass
pub fn compute_analytics(transactions: &[TransactionRecord]) -> PaymentAnalytics {
    let mut analytics = PaymentAnalytics::default();

    for transaction in transactions {
        analytics.total_amount += transaction.amount;

        *analytics
            .payment_method_counts
            .entry(transaction.payment_method)
            .or_insert(0) += 1;

        *analytics
            .fee_type_counts
            .entry(transaction.category)
            .or_insert(0) += 1;

        let month = transaction.paid_date.format("%Y-%m").to_string();
        *analytics.monthly_totals.entry(month).or_insert(0.0) += transaction.amount;

        if transaction.provider.is_some() {
            analytics.external_payment_count += 1;
        }
    }

    analytics
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use crate::payments::normalize::TransactionStatus;
    use crate::storage::models::ProviderSnapshot;

    fn transaction(
        amount: f64,
        method: PaymentMethod,
        category: FeeCategory,
        paid: (i32, u32, u32),
        external: bool,
    ) -> TransactionRecord {
        TransactionRecord {
            id: None,
            student_id: 1,
            category,
            amount,
            currency: "UGX".to_string(),
            payment_method: method,
            status: TransactionStatus::Completed,
            description: None,
            reference: None,
            processed_by: "bursar".to_string(),
            processed_at: Utc::now(),
            paid_date: NaiveDate::from_ymd_opt(paid.0, paid.1, paid.2).unwrap(),
            provider: external.then(|| ProviderSnapshot {
                transaction_id: "TX".to_string(),
                raw_status: "Completed".to_string(),
                raw_method: "Mobile Money".to_string(),
                raw_fee_type: "Tuition".to_string(),
                provider_reference: None,
                parent_name: None,
                parent_phone: None,
                payment_code: None,
            }),
        }
    }

    #[test]
    fn test_compute_analytics() {
        let transactions = vec![
            transaction(100_000.0, PaymentMethod::MobileMoney, FeeCategory::TuitionFee, (2024, 1, 15), true),
            transaction(50_000.0, PaymentMethod::MobileMoney, FeeCategory::MealsFee, (2024, 1, 30), true),
            transaction(25_000.0, PaymentMethod::Cash, FeeCategory::TuitionFee, (2024, 2, 2), false),
        ];

        let analytics = compute_analytics(&transactions);

        assert_eq!(analytics.total_amount, 175_000.0);
        assert_eq!(analytics.payment_method_counts[&PaymentMethod::MobileMoney], 2);
        assert_eq!(analytics.payment_method_counts[&PaymentMethod::Cash], 1);
        assert_eq!(analytics.fee_type_counts[&FeeCategory::TuitionFee], 2);
        assert_eq!(analytics.fee_type_counts[&FeeCategory::MealsFee], 1);
        assert_eq!(analytics.monthly_totals["2024-01"], 150_000.0);
        assert_eq!(analytics.monthly_totals["2024-02"], 25_000.0);
        assert_eq!(analytics.external_payment_count, 2);
    }

    #[test]
    fn test_empty_analytics() {
        let analytics = compute_analytics(&[]);
        assert_eq!(analytics, PaymentAnalytics::default());
        assert!(analytics.monthly_totals.is_empty());
    }
}
