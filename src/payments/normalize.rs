//! Provider vocabulary → internal categories.
//!
//! `from_raw` is the permissive mapping used on imported rows: anything the
//! provider sends that we do not recognise lands in a default category.
//! `FromStr` is the strict inverse of `as_str`, used when reading back what
//! we stored ourselves.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::error::UnknownVariant;

macro_rules! canonical_names {
    ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    other => Err(UnknownVariant::new($kind, other)),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeCategory {
    TuitionFee,
    ExaminationFee,
    LibraryFee,
    SportsFee,
    TransportFee,
    MealsFee,
    OtherFee,
}

canonical_names!(FeeCategory, "fee category", {
    TuitionFee => "tuition_fee",
    ExaminationFee => "examination_fee",
    LibraryFee => "library_fee",
    SportsFee => "sports_fee",
    TransportFee => "transport_fee",
    MealsFee => "meals_fee",
    OtherFee => "other_fee",
});

impl FeeCategory {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "Tuition" => FeeCategory::TuitionFee,
            "Examination" => FeeCategory::ExaminationFee,
            "Library" => FeeCategory::LibraryFee,
            "Sports" => FeeCategory::SportsFee,
            "Transport" => FeeCategory::TransportFee,
            "Meals" => FeeCategory::MealsFee,
            _ => FeeCategory::OtherFee,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    MobileMoney,
    BankTransfer,
    Cash,
    SchoolPay,
    Card,
}

canonical_names!(PaymentMethod, "payment method", {
    MobileMoney => "mobile_money",
    BankTransfer => "bank_transfer",
    Cash => "cash",
    SchoolPay => "school_pay",
    Card => "card",
});

impl PaymentMethod {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "Mobile Money" => PaymentMethod::MobileMoney,
            "Bank Transfer" => PaymentMethod::BankTransfer,
            "Cash" => PaymentMethod::Cash,
            "School Pay" => PaymentMethod::SchoolPay,
            "Card" => PaymentMethod::Card,
            _ => PaymentMethod::Cash,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Completed,
    Pending,
    Failed,
    Cancelled,
}

canonical_names!(TransactionStatus, "transaction status", {
    Completed => "completed",
    Pending => "pending",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl TransactionStatus {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "Completed" => TransactionStatus::Completed,
            "Pending" => TransactionStatus::Pending,
            "Failed" => TransactionStatus::Failed,
            "Cancelled" => TransactionStatus::Cancelled,
            _ => TransactionStatus::Pending,
        }
    }
}
