//! Shared domain enums.
//!
//! Serialized names are the ones the frontend and the database use
//! (`tersedia`, `dipinjam`, ...); Rust names are English.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Implements `as_str`, `FromStr` and `Display` from a single variant/label table,
/// so DB text columns and JSON agree on spelling.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    other => Err(format!(
                        "invalid {} '{}', expected one of: {}",
                        stringify!($name),
                        other,
                        [$($label),+].join(", ")
                    )),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Department
// ---------------------------------------------------------------------------

/// School department (jurusan) owning an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Department {
    #[serde(rename = "RPL")]
    Rpl,
    #[serde(rename = "DKV")]
    Dkv,
    #[serde(rename = "TKJ")]
    Tkj,
}

text_enum!(Department { Rpl => "RPL", Dkv => "DKV", Tkj => "TKJ" });

// ---------------------------------------------------------------------------
// ItemKind
// ---------------------------------------------------------------------------

/// Whether stock is a bulk count or a list of serialized units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ItemKind {
    #[serde(rename = "habis_pakai")]
    Consumable,
    #[serde(rename = "tidak_habis_pakai")]
    NonConsumable,
}

text_enum!(ItemKind {
    Consumable => "habis_pakai",
    NonConsumable => "tidak_habis_pakai",
});

// ---------------------------------------------------------------------------
// UnitStatus / Condition
// ---------------------------------------------------------------------------

/// Status of one physical unit of a non-consumable item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum UnitStatus {
    #[serde(rename = "tersedia")]
    Available,
    #[serde(rename = "dipinjam")]
    OnLoan,
    #[serde(rename = "rusak")]
    Damaged,
    #[serde(rename = "hilang")]
    Lost,
}

text_enum!(UnitStatus {
    Available => "tersedia",
    OnLoan => "dipinjam",
    Damaged => "rusak",
    Lost => "hilang",
});

/// Physical condition: a consumable's whole-item flag, a unit's state after
/// return, or the target of a manual unit override. Never `on_loan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Condition {
    #[serde(rename = "tersedia")]
    Available,
    #[serde(rename = "rusak")]
    Damaged,
    #[serde(rename = "hilang")]
    Lost,
}

text_enum!(Condition {
    Available => "tersedia",
    Damaged => "rusak",
    Lost => "hilang",
});

impl Default for Condition {
    fn default() -> Self {
        Condition::Available
    }
}

impl From<Condition> for UnitStatus {
    fn from(c: Condition) -> Self {
        match c {
            Condition::Available => UnitStatus::Available,
            Condition::Damaged => UnitStatus::Damaged,
            Condition::Lost => UnitStatus::Lost,
        }
    }
}

// ---------------------------------------------------------------------------
// Loan states
// ---------------------------------------------------------------------------

/// Approval state machine of a loan request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

text_enum!(ApprovalStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

/// Possession state machine of a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum RentalStatus {
    #[serde(rename = "pinjam")]
    OnLoan,
    #[serde(rename = "kembali")]
    Returned,
}

text_enum!(RentalStatus {
    OnLoan => "pinjam",
    Returned => "kembali",
});

/// Who is borrowing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum BorrowerKind {
    #[serde(rename = "siswa")]
    Student,
    #[serde(rename = "lainnya")]
    Other,
}

text_enum!(BorrowerKind {
    Student => "siswa",
    Other => "lainnya",
});
