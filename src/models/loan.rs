//! Loan (peminjaman) model and its state machine.
//!
//! A loan moves through two small state machines:
//!
//! ```text
//! approval:  pending --approve--> approved
//!            pending --reject---> rejected
//! rental:    (none) --approve--> on_loan --return--> returned   non-consumable
//!            returned from creation                              consumable
//! ```
//!
//! Every transition is checked by [`Loan::transition`]; the operations that
//! touch an [`Item`] validate the whole batch of units (or the stock) before
//! mutating anything.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::{ApprovalStatus, BorrowerKind, Condition, Department, ItemKind, RentalStatus, UnitStatus};
use super::item::{Item, ItemShort};
use crate::error::{AppError, AppResult, FieldError};

/// Who borrows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Borrower {
    Student { student_id: i32 },
    Other { name: String, origin: String },
}

impl Borrower {
    pub fn kind(&self) -> BorrowerKind {
        match self {
            Borrower::Student { .. } => BorrowerKind::Student,
            Borrower::Other { .. } => BorrowerKind::Other,
        }
    }
}

/// What is borrowed: a quantity of a consumable or a set of unit codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanGoods {
    Consumable { quantity: i32 },
    Units { codes: Vec<String> },
}

impl LoanGoods {
    pub fn item_kind(&self) -> ItemKind {
        match self {
            LoanGoods::Consumable { .. } => ItemKind::Consumable,
            LoanGoods::Units { .. } => ItemKind::NonConsumable,
        }
    }
}

/// Condition snapshot of one borrowed unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UnitStatusEntry {
    #[serde(rename = "kode")]
    pub code: String,
    #[serde(rename = "statusSaatPinjam")]
    pub at_loan: UnitStatus,
    #[serde(rename = "statusSetelahKembali", skip_serializing_if = "Option::is_none", default)]
    pub at_return: Option<Condition>,
}

/// Operations that move a loan between states (delete is always allowed)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanAction {
    Approve,
    Reject,
    Return,
}

/// Loan aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct Loan {
    pub id: i32,
    pub item_id: i32,
    pub department: Department,
    pub borrower: Borrower,
    pub borrower_phone: String,
    pub goods: LoanGoods,
    pub status: ApprovalStatus,
    pub rental_status: Option<RentalStatus>,
    pub unit_status: Vec<UnitStatusEntry>,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    pub fn is_consumable(&self) -> bool {
        matches!(self.goods, LoanGoods::Consumable { .. })
    }

    pub fn unit_codes(&self) -> &[String] {
        match &self.goods {
            LoanGoods::Units { codes } => codes,
            LoanGoods::Consumable { .. } => &[],
        }
    }

    /// Approved non-consumable loan whose units are still out
    pub fn holds_units(&self) -> bool {
        !self.is_consumable()
            && self.status == ApprovalStatus::Approved
            && self.rental_status == Some(RentalStatus::OnLoan)
    }

    /// Returns the target `(status, rentalStatus)` for `action`, or the error
    /// naming the violated guard.
    pub fn transition(&self, action: LoanAction) -> AppResult<(ApprovalStatus, Option<RentalStatus>)> {
        match action {
            LoanAction::Approve | LoanAction::Reject if self.status != ApprovalStatus::Pending => {
                Err(AppError::AlreadyProcessed)
            }
            LoanAction::Approve if self.is_consumable() => {
                Ok((ApprovalStatus::Approved, Some(RentalStatus::Returned)))
            }
            LoanAction::Approve => Ok((ApprovalStatus::Approved, Some(RentalStatus::OnLoan))),
            LoanAction::Reject => Ok((ApprovalStatus::Rejected, self.rental_status)),
            LoanAction::Return => {
                if self.is_consumable() {
                    Err(AppError::NotApplicable)
                } else if self.rental_status == Some(RentalStatus::Returned) {
                    Err(AppError::AlreadyReturned)
                } else if self.status != ApprovalStatus::Approved {
                    Err(AppError::NotApproved)
                } else {
                    Ok((ApprovalStatus::Approved, Some(RentalStatus::Returned)))
                }
            }
        }
    }

    fn ensure_item(&self, item: &Item) -> AppResult<()> {
        if item.id != self.item_id {
            return Err(AppError::Internal(format!(
                "Loan {} references item {}, got item {}",
                self.id, self.item_id, item.id
            )));
        }
        if item.kind() != self.goods.item_kind() {
            return Err(AppError::TypeMismatch(format!(
                "Loan {} is {} but item {} is {}",
                self.id,
                self.goods.item_kind(),
                item.id,
                item.kind()
            )));
        }
        Ok(())
    }

    /// Approves a pending loan: deducts stock or puts every requested unit
    /// on loan. Nothing changes unless the whole batch is available.
    pub fn approve(&mut self, item: &mut Item, now: DateTime<Utc>) -> AppResult<()> {
        let (status, rental_status) = self.transition(LoanAction::Approve)?;
        self.ensure_item(item)?;

        match &self.goods {
            LoanGoods::Consumable { quantity } => item.take_stock(*quantity)?,
            LoanGoods::Units { codes } => {
                item.ensure_units_available(codes)?;
                let mut entries = Vec::with_capacity(codes.len());
                for code in codes {
                    let at_loan = item.set_unit_status(code, UnitStatus::OnLoan)?;
                    entries.push(UnitStatusEntry {
                        code: code.clone(),
                        at_loan,
                        at_return: None,
                    });
                }
                item.recompute_borrowed_count();
                self.unit_status = entries;
            }
        }

        self.status = status;
        self.rental_status = rental_status;
        self.approved_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Rejects a pending loan; nothing was allocated, so the item is untouched.
    pub fn reject(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        let (status, rental_status) = self.transition(LoanAction::Reject)?;
        self.status = status;
        self.rental_status = rental_status;
        self.updated_at = now;
        Ok(())
    }

    /// Returns every unit of an approved loan with the condition the operator
    /// reported for it.
    pub fn return_units(
        &mut self,
        item: &mut Item,
        returns: &[UnitReturn],
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let (status, rental_status) = self.transition(LoanAction::Return)?;
        self.ensure_item(item)?;

        let mut plan = Vec::with_capacity(self.unit_codes().len());
        for code in self.unit_codes() {
            if item.unit_status(code) != Some(UnitStatus::OnLoan) {
                return Err(AppError::UnitNotOnLoan(code.clone()));
            }
            let condition = returns
                .iter()
                .find(|r| &r.kode == code)
                .and_then(|r| r.kondisi.as_deref())
                .and_then(|k| k.parse::<Condition>().ok())
                .ok_or_else(|| AppError::InvalidCondition(code.clone()))?;
            plan.push((code.clone(), condition));
        }

        let mut entries = Vec::with_capacity(plan.len());
        for (code, condition) in plan {
            item.set_unit_status(&code, condition.into())?;
            // approval only accepts available units
            let at_loan = self
                .unit_status
                .iter()
                .find(|e| e.code == code)
                .map(|e| e.at_loan)
                .unwrap_or(UnitStatus::Available);
            entries.push(UnitStatusEntry {
                code,
                at_loan,
                at_return: Some(condition),
            });
        }
        item.recompute_borrowed_count();

        self.unit_status = entries;
        self.status = status;
        self.rental_status = rental_status;
        self.returned_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Puts this loan's units that are still on loan back to `available`
    /// before the loan is deleted. Returns the codes released.
    pub fn release_units(&self, item: &mut Item) -> AppResult<Vec<String>> {
        if !self.holds_units() {
            return Ok(Vec::new());
        }
        self.ensure_item(item)?;

        let released: Vec<String> = self
            .unit_codes()
            .iter()
            .filter(|code| item.unit_status(code) == Some(UnitStatus::OnLoan))
            .cloned()
            .collect();
        for code in &released {
            item.set_unit_status(code, UnitStatus::Available)?;
        }
        item.recompute_borrowed_count();
        Ok(released)
    }

    /// Start of the physical loan: approval time, else request time
    pub fn started_at(&self) -> DateTime<Utc> {
        self.approved_at.unwrap_or(self.requested_at)
    }

    pub fn is_overdue(&self, max_loan_duration_days: Option<i32>, now: DateTime<Utc>) -> bool {
        match max_loan_duration_days {
            Some(days) if self.holds_units() => {
                self.started_at() + Duration::days(i64::from(days)) < now
            }
            _ => false,
        }
    }
}

/// Loan row from database
#[derive(Debug, Clone, FromRow)]
pub struct LoanRow {
    pub id: i32,
    pub item_id: i32,
    pub department: String,
    pub borrower_kind: String,
    pub student_id: Option<i32>,
    pub borrower_name: Option<String>,
    pub borrower_origin: Option<String>,
    pub borrower_phone: String,
    pub is_consumable: bool,
    pub quantity: Option<i32>,
    pub unit_codes: Option<Vec<String>>,
    pub status: String,
    pub rental_status: Option<String>,
    pub unit_status: Json<Vec<UnitStatusEntry>>,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<LoanRow> for Loan {
    type Error = AppError;

    fn try_from(row: LoanRow) -> Result<Self, Self::Error> {
        let corrupt = |what: String| AppError::Internal(format!("Loan {}: {}", row.id, what));

        let borrower = match row.borrower_kind.parse::<BorrowerKind>().map_err(corrupt)? {
            BorrowerKind::Student => Borrower::Student {
                student_id: row
                    .student_id
                    .ok_or_else(|| corrupt("student loan without student".to_string()))?,
            },
            BorrowerKind::Other => Borrower::Other {
                name: row.borrower_name.unwrap_or_default(),
                origin: row.borrower_origin.unwrap_or_default(),
            },
        };

        let goods = if row.is_consumable {
            LoanGoods::Consumable {
                quantity: row
                    .quantity
                    .ok_or_else(|| corrupt("consumable loan without quantity".to_string()))?,
            }
        } else {
            LoanGoods::Units {
                codes: row
                    .unit_codes
                    .ok_or_else(|| corrupt("unit loan without unit codes".to_string()))?,
            }
        };

        Ok(Loan {
            id: row.id,
            item_id: row.item_id,
            department: row.department.parse().map_err(corrupt)?,
            borrower,
            borrower_phone: row.borrower_phone,
            goods,
            status: row.status.parse().map_err(corrupt)?,
            rental_status: row
                .rental_status
                .as_deref()
                .map(str::parse)
                .transpose()
                .map_err(corrupt)?,
            unit_status: row.unit_status.0,
            requested_at: row.requested_at,
            approved_at: row.approved_at,
            returned_at: row.returned_at,
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Create loan request as sent by the client; fields required depend on
/// `peminjamType` and `isConsumable`, see [`LoanRequest`].
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoanRequest {
    /// Item ID
    pub barang: Option<i32>,
    pub peminjam_type: Option<BorrowerKind>,
    /// Student ID, when `peminjamType` is `siswa`
    pub peminjam_siswa: Option<i32>,
    pub peminjam_nama: Option<String>,
    pub peminjam_asal: Option<String>,
    pub peminjam_phone: Option<String>,
    pub is_consumable: Option<bool>,
    /// Quantity, when `isConsumable`
    #[validate(range(min = 1, message = "jumlah must be an integer >= 1"))]
    pub jumlah: Option<i32>,
    /// Unit codes, when not `isConsumable`
    pub unit_kodes: Option<Vec<String>>,
    #[validate(length(max = 1000, message = "keterangan is too long"))]
    pub keterangan: Option<String>,
}

/// Checked loan request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanRequest {
    pub item_id: i32,
    pub borrower: Borrower,
    pub borrower_phone: String,
    pub goods: LoanGoods,
    pub note: String,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl TryFrom<CreateLoanRequest> for LoanRequest {
    type Error = AppError;

    fn try_from(body: CreateLoanRequest) -> Result<Self, Self::Error> {
        body.validate()?;

        let mut errors = Vec::new();
        let mut require = |field: &str, message: &str, ok: bool| {
            if !ok {
                errors.push(FieldError::new(field, message));
            }
        };

        let phone = non_blank(body.peminjam_phone);
        require("barang", "barang is required", body.barang.is_some());
        require("peminjamType", "peminjamType is required", body.peminjam_type.is_some());
        require("isConsumable", "isConsumable is required", body.is_consumable.is_some());
        require("peminjamPhone", "peminjamPhone is required", phone.is_some());

        let name = non_blank(body.peminjam_nama);
        let origin = non_blank(body.peminjam_asal);
        match body.peminjam_type {
            Some(BorrowerKind::Student) => require(
                "peminjamSiswa",
                "peminjamSiswa is required when peminjamType is 'siswa'",
                body.peminjam_siswa.is_some(),
            ),
            Some(BorrowerKind::Other) => {
                require(
                    "peminjamNama",
                    "peminjamNama is required when peminjamType is 'lainnya'",
                    name.is_some(),
                );
                require(
                    "peminjamAsal",
                    "peminjamAsal is required when peminjamType is 'lainnya'",
                    origin.is_some(),
                );
            }
            None => {}
        }

        let codes: Vec<String> = body
            .unit_kodes
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.trim().to_string())
            .collect();
        match body.is_consumable {
            Some(true) => require(
                "jumlah",
                "jumlah (integer >= 1) is required when isConsumable is true",
                body.jumlah.is_some(),
            ),
            Some(false) => {
                require(
                    "unitKodes",
                    "unitKodes must contain at least one code when isConsumable is false",
                    !codes.is_empty(),
                );
                require(
                    "unitKodes",
                    "unitKodes must not contain blank codes",
                    codes.iter().all(|c| !c.is_empty()),
                );
                let unique: HashSet<&String> = codes.iter().collect();
                require(
                    "unitKodes",
                    "unitKodes must not contain duplicates",
                    unique.len() == codes.len(),
                );
            }
            None => {}
        }

        if !errors.is_empty() {
            return Err(AppError::InvalidFields(errors));
        }

        // every Option checked above
        let missing = || AppError::Internal("loan request checked inconsistently".to_string());
        let borrower = match body.peminjam_type.ok_or_else(missing)? {
            BorrowerKind::Student => Borrower::Student {
                student_id: body.peminjam_siswa.ok_or_else(missing)?,
            },
            BorrowerKind::Other => Borrower::Other {
                name: name.ok_or_else(missing)?,
                origin: origin.ok_or_else(missing)?,
            },
        };
        let goods = if body.is_consumable.ok_or_else(missing)? {
            LoanGoods::Consumable {
                quantity: body.jumlah.ok_or_else(missing)?,
            }
        } else {
            LoanGoods::Units { codes }
        };

        Ok(LoanRequest {
            item_id: body.barang.ok_or_else(missing)?,
            borrower,
            borrower_phone: phone.ok_or_else(missing)?,
            goods,
            note: body.keterangan.unwrap_or_default(),
        })
    }
}

/// Loan ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub item_id: i32,
    pub department: Department,
    pub borrower: Borrower,
    pub borrower_phone: String,
    pub goods: LoanGoods,
    pub status: ApprovalStatus,
    pub rental_status: Option<RentalStatus>,
    pub requested_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub note: String,
}

impl LoanRequest {
    /// Checks the request against the item's current state. Availability is
    /// only checked here, never reserved; approval checks again.
    pub fn check_against(&self, item: &Item) -> AppResult<()> {
        if item.kind() != self.goods.item_kind() {
            return Err(AppError::TypeMismatch(match self.goods {
                LoanGoods::Consumable { .. } => format!(
                    "Item {} is not consumable; borrow its units instead",
                    item.id
                ),
                LoanGoods::Units { .. } => format!(
                    "Item {} is consumable; request a quantity instead",
                    item.id
                ),
            }));
        }
        match &self.goods {
            LoanGoods::Consumable { quantity } => item.ensure_stock(*quantity),
            LoanGoods::Units { codes } => item.ensure_units_available(codes),
        }
    }

    /// Builds the pending loan. Consumable requests have nothing physical to
    /// hand back, so they start out returned.
    pub fn into_new_loan(self, item: &Item, now: DateTime<Utc>) -> NewLoan {
        let (rental_status, returned_at) = match self.goods {
            LoanGoods::Consumable { .. } => (Some(RentalStatus::Returned), Some(now)),
            LoanGoods::Units { .. } => (None, None),
        };
        NewLoan {
            item_id: self.item_id,
            department: item.department,
            borrower: self.borrower,
            borrower_phone: self.borrower_phone,
            goods: self.goods,
            status: ApprovalStatus::Pending,
            rental_status,
            requested_at: now,
            returned_at,
            note: self.note,
        }
    }
}

/// Condition reported for one returned unit
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UnitReturn {
    pub kode: String,
    /// `tersedia`, `rusak` or `hilang`
    pub kondisi: Option<String>,
}

/// Return request body
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReturnLoanRequest {
    #[serde(rename = "unitReturns", default)]
    pub unit_returns: Vec<UnitReturn>,
    /// Sent by the client for consumables; ignored
    pub kondisi: Option<String>,
}

// ---------------------------------------------------------------------------
// Views and queries
// ---------------------------------------------------------------------------

/// Loan with its item summary, as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanDetails {
    #[serde(rename = "_id")]
    pub id: i32,
    pub barang_id: i32,
    /// Item summary; absent when the item was deleted
    pub barang: Option<ItemShort>,
    pub jurusan: Department,
    pub peminjam_type: BorrowerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peminjam_siswa: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peminjam_nama: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peminjam_asal: Option<String>,
    pub peminjam_phone: String,
    pub is_consumable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jumlah: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_kodes: Option<Vec<String>>,
    pub status: ApprovalStatus,
    pub rental_status: Option<RentalStatus>,
    pub unit_status: Vec<UnitStatusEntry>,
    pub tgl_pengajuan: DateTime<Utc>,
    pub tgl_disetujui: Option<DateTime<Utc>>,
    pub tgl_pinjam: DateTime<Utc>,
    pub tgl_kembali: Option<DateTime<Utc>>,
    pub keterangan: String,
    pub is_overdue: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanDetails {
    pub fn new(loan: Loan, item: Option<ItemShort>, now: DateTime<Utc>) -> Self {
        let is_overdue = loan.is_overdue(
            item.as_ref().and_then(|i| i.max_loan_duration_days),
            now,
        );
        let tgl_pinjam = loan.started_at();
        let (peminjam_siswa, peminjam_nama, peminjam_asal) = match loan.borrower.clone() {
            Borrower::Student { student_id } => (Some(student_id), None, None),
            Borrower::Other { name, origin } => (None, Some(name), Some(origin)),
        };
        let is_consumable = loan.is_consumable();
        let (jumlah, unit_kodes) = match loan.goods.clone() {
            LoanGoods::Consumable { quantity } => (Some(quantity), None),
            LoanGoods::Units { codes } => (None, Some(codes)),
        };

        Self {
            id: loan.id,
            barang_id: loan.item_id,
            barang: item,
            jurusan: loan.department,
            peminjam_type: loan.borrower.kind(),
            peminjam_siswa,
            peminjam_nama,
            peminjam_asal,
            peminjam_phone: loan.borrower_phone,
            is_consumable,
            jumlah,
            unit_kodes,
            status: loan.status,
            rental_status: loan.rental_status,
            unit_status: loan.unit_status,
            tgl_pengajuan: loan.requested_at,
            tgl_disetujui: loan.approved_at,
            tgl_pinjam,
            tgl_kembali: loan.returned_at,
            keterangan: loan.note,
            is_overdue,
            created_at: loan.created_at,
            updated_at: loan.updated_at,
        }
    }
}

/// Loan list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Case-insensitive substring of the borrower name
    pub peminjam_nama: Option<String>,
    pub peminjam_type: Option<BorrowerKind>,
    pub status: Option<ApprovalStatus>,
}

/// Loan history query parameters; end dates are inclusive
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LoanHistoryQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub return_start: Option<NaiveDate>,
    pub return_end: Option<NaiveDate>,
    pub peminjam_nama: Option<String>,
    pub peminjam_type: Option<BorrowerKind>,
    pub status: Option<ApprovalStatus>,
    pub jurusan: Option<Department>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::tests::{consumable_item, unit_item};
    use tokio_test::{assert_err, assert_ok};

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn unit_loan(id: i32, codes: &[&str]) -> Loan {
        Loan {
            id,
            item_id: 1,
            department: Department::Rpl,
            borrower: Borrower::Other {
                name: "Pak Budi".to_string(),
                origin: "Guru".to_string(),
            },
            borrower_phone: "0812".to_string(),
            goods: LoanGoods::Units {
                codes: codes.iter().map(|c| c.to_string()).collect(),
            },
            status: ApprovalStatus::Pending,
            rental_status: None,
            unit_status: Vec::new(),
            requested_at: now(),
            approved_at: None,
            returned_at: None,
            note: String::new(),
            created_at: now(),
            updated_at: now(),
        }
    }

    fn consumable_loan(id: i32, quantity: i32) -> Loan {
        Loan {
            item_id: 2,
            department: Department::Tkj,
            goods: LoanGoods::Consumable { quantity },
            rental_status: Some(RentalStatus::Returned),
            returned_at: Some(now()),
            ..unit_loan(id, &[])
        }
    }

    fn returns(pairs: &[(&str, &str)]) -> Vec<UnitReturn> {
        pairs
            .iter()
            .map(|(k, c)| UnitReturn {
                kode: k.to_string(),
                kondisi: Some(c.to_string()),
            })
            .collect()
    }

    #[test]
    fn round_trip_approve_then_return_damaged() {
        let mut item = unit_item(&[("U1", UnitStatus::Available), ("U2", UnitStatus::Available)]);
        let mut loan = unit_loan(1, &["U1"]);

        assert_ok!(loan.approve(&mut item, now()));
        assert_eq!(item.unit_status("U1"), Some(UnitStatus::OnLoan));
        assert_eq!(item.borrowed_count(), 1);
        assert_eq!(loan.status, ApprovalStatus::Approved);
        assert_eq!(loan.rental_status, Some(RentalStatus::OnLoan));
        assert!(loan.approved_at.is_some());
        assert_eq!(loan.unit_status[0].at_loan, UnitStatus::Available);

        assert_ok!(loan.return_units(&mut item, &returns(&[("U1", "rusak")]), now()));
        assert_eq!(item.unit_status("U1"), Some(UnitStatus::Damaged));
        assert_eq!(item.unit_status("U2"), Some(UnitStatus::Available));
        assert_eq!(item.borrowed_count(), 0);
        assert_eq!(loan.rental_status, Some(RentalStatus::Returned));
        assert!(loan.returned_at.is_some());
        assert_eq!(
            loan.unit_status,
            vec![UnitStatusEntry {
                code: "U1".to_string(),
                at_loan: UnitStatus::Available,
                at_return: Some(Condition::Damaged),
            }]
        );
    }

    #[test]
    fn second_approve_fails_and_leaves_item_alone() {
        let mut item = unit_item(&[("U1", UnitStatus::Available), ("U2", UnitStatus::Available)]);
        let mut loan = unit_loan(1, &["U1"]);
        assert_ok!(loan.approve(&mut item, now()));
        let before = item.clone();

        let err = assert_err!(loan.approve(&mut item, now()));
        assert!(matches!(err, AppError::AlreadyProcessed));
        assert_eq!(item.inventory, before.inventory);

        assert!(matches!(loan.reject(now()), Err(AppError::AlreadyProcessed)));
    }

    #[test]
    fn approval_is_all_or_nothing() {
        let mut item = unit_item(&[
            ("U1", UnitStatus::Available),
            ("U2", UnitStatus::Available),
            ("U3", UnitStatus::Damaged),
        ]);
        let before = item.clone();
        let mut loan = unit_loan(1, &["U1", "U2", "U3"]);

        let err = assert_err!(loan.approve(&mut item, now()));
        assert!(matches!(err, AppError::UnitNotAvailable(code) if code == "U3"));
        assert_eq!(item.inventory, before.inventory);
        assert_eq!(loan.status, ApprovalStatus::Pending);
        assert!(loan.unit_status.is_empty());
    }

    #[test]
    fn competing_loans_for_one_unit_only_one_approves() {
        let mut item = unit_item(&[("U1", UnitStatus::Available), ("U2", UnitStatus::Available)]);
        let mut first = unit_loan(1, &["U1"]);
        let mut second = unit_loan(2, &["U1", "U2"]);

        assert_ok!(first.approve(&mut item, now()));
        let err = assert_err!(second.approve(&mut item, now()));
        assert!(matches!(err, AppError::UnitNotAvailable(code) if code == "U1"));
        assert_eq!(item.unit_status("U2"), Some(UnitStatus::Available));
        assert_eq!(item.borrowed_count(), 1);
    }

    #[test]
    fn delete_rollback_releases_units() {
        let mut item = unit_item(&[("U1", UnitStatus::Available), ("U2", UnitStatus::Available)]);
        let mut loan = unit_loan(1, &["U1"]);
        assert_ok!(loan.approve(&mut item, now()));

        let released = assert_ok!(loan.release_units(&mut item));
        assert_eq!(released, vec!["U1".to_string()]);
        assert_eq!(item.unit_status("U1"), Some(UnitStatus::Available));
        assert_eq!(item.borrowed_count(), 0);
    }

    #[test]
    fn delete_rollback_skips_units_overridden_by_hand() {
        let mut item = unit_item(&[("U1", UnitStatus::Available), ("U2", UnitStatus::Available)]);
        let mut loan = unit_loan(1, &["U1", "U2"]);
        assert_ok!(loan.approve(&mut item, now()));
        assert_ok!(item.set_unit_status("U2", UnitStatus::Lost));
        item.recompute_borrowed_count();

        let released = assert_ok!(loan.release_units(&mut item));
        assert_eq!(released, vec!["U1".to_string()]);
        assert_eq!(item.unit_status("U2"), Some(UnitStatus::Lost));
        assert_eq!(item.borrowed_count(), 0);
    }

    #[test]
    fn delete_of_pending_rejected_or_returned_loan_touches_nothing() {
        let mut item = unit_item(&[("U1", UnitStatus::Available)]);
        let before = item.clone();

        let pending = unit_loan(1, &["U1"]);
        assert!(assert_ok!(pending.release_units(&mut item)).is_empty());

        let mut rejected = unit_loan(2, &["U1"]);
        assert_ok!(rejected.reject(now()));
        assert!(assert_ok!(rejected.release_units(&mut item)).is_empty());
        assert_eq!(item.inventory, before.inventory);

        let mut returned = unit_loan(3, &["U1"]);
        assert_ok!(returned.approve(&mut item, now()));
        assert_ok!(returned.return_units(&mut item, &returns(&[("U1", "tersedia")]), now()));
        let after_return = item.clone();
        assert!(assert_ok!(returned.release_units(&mut item)).is_empty());
        assert_eq!(item.inventory, after_return.inventory);
    }

    #[test]
    fn consumable_boundary() {
        let mut item = consumable_item(5);
        let mut all = consumable_loan(1, 5);
        assert_ok!(all.approve(&mut item, now()));
        assert_eq!(item.stock(), Some(0));
        assert_eq!(all.status, ApprovalStatus::Approved);
        assert_eq!(all.rental_status, Some(RentalStatus::Returned));

        let mut one_more = consumable_loan(2, 1);
        let err = assert_err!(one_more.approve(&mut item, now()));
        assert!(matches!(err, AppError::InsufficientStock { available: 0, requested: 1 }));
        assert_eq!(one_more.status, ApprovalStatus::Pending);
    }

    #[test]
    fn consumable_cannot_be_returned() {
        let mut item = consumable_item(5);
        let mut loan = consumable_loan(1, 2);
        assert_ok!(loan.approve(&mut item, now()));
        let err = assert_err!(loan.return_units(&mut item, &[], now()));
        assert!(matches!(err, AppError::NotApplicable));
        assert_eq!(item.stock(), Some(3));
    }

    #[test]
    fn rejection_has_no_side_effect() {
        let item = unit_item(&[("U1", UnitStatus::Available)]);
        let mut loan = unit_loan(1, &["U1"]);
        assert_ok!(loan.reject(now()));
        assert_eq!(loan.status, ApprovalStatus::Rejected);
        assert_eq!(item.unit_status("U1"), Some(UnitStatus::Available));
    }

    #[test]
    fn return_guards_in_order() {
        let mut item = unit_item(&[("U1", UnitStatus::Available)]);

        let mut pending = unit_loan(1, &["U1"]);
        assert!(matches!(
            pending.return_units(&mut item, &returns(&[("U1", "tersedia")]), now()),
            Err(AppError::NotApproved)
        ));

        let mut loan = unit_loan(2, &["U1"]);
        assert_ok!(loan.approve(&mut item, now()));
        assert_ok!(loan.return_units(&mut item, &returns(&[("U1", "tersedia")]), now()));
        assert!(matches!(
            loan.return_units(&mut item, &returns(&[("U1", "tersedia")]), now()),
            Err(AppError::AlreadyReturned)
        ));
    }

    #[test]
    fn return_requires_a_valid_condition_for_every_unit() {
        let mut item = unit_item(&[("U1", UnitStatus::Available), ("U2", UnitStatus::Available)]);
        let mut loan = unit_loan(1, &["U1", "U2"]);
        assert_ok!(loan.approve(&mut item, now()));
        let before = item.clone();

        let err = assert_err!(loan.return_units(&mut item, &returns(&[("U1", "rusak")]), now()));
        assert!(matches!(err, AppError::InvalidCondition(code) if code == "U2"));

        let err = assert_err!(loan.return_units(
            &mut item,
            &returns(&[("U1", "rusak"), ("U2", "dipinjam")]),
            now()
        ));
        assert!(matches!(err, AppError::InvalidCondition(code) if code == "U2"));

        assert_eq!(item.inventory, before.inventory);
        assert_eq!(loan.rental_status, Some(RentalStatus::OnLoan));
    }

    #[test]
    fn return_fails_when_unit_was_overridden() {
        let mut item = unit_item(&[("U1", UnitStatus::Available)]);
        let mut loan = unit_loan(1, &["U1"]);
        assert_ok!(loan.approve(&mut item, now()));
        assert_ok!(item.set_unit_status("U1", UnitStatus::Available));

        let err = assert_err!(loan.return_units(&mut item, &returns(&[("U1", "hilang")]), now()));
        assert!(matches!(err, AppError::UnitNotOnLoan(code) if code == "U1"));
    }

    #[test]
    fn approve_against_wrong_kind_is_a_type_mismatch() {
        let mut item = consumable_item(5);
        item.id = 1;
        let mut loan = unit_loan(1, &["U1"]);
        assert!(matches!(loan.approve(&mut item, now()), Err(AppError::TypeMismatch(_))));
        assert_eq!(loan.status, ApprovalStatus::Pending);
    }

    #[test]
    fn borrowed_count_matches_units_after_every_step() {
        let mut item = unit_item(&[
            ("U1", UnitStatus::Available),
            ("U2", UnitStatus::Available),
            ("U3", UnitStatus::Available),
        ]);
        let check = |item: &Item| {
            assert_eq!(item.borrowed_count() as usize, item.count_units(UnitStatus::OnLoan));
        };

        let mut a = unit_loan(1, &["U1", "U2"]);
        let mut b = unit_loan(2, &["U3"]);
        assert_ok!(a.approve(&mut item, now()));
        check(&item);
        assert_ok!(b.approve(&mut item, now()));
        check(&item);
        assert_eq!(item.borrowed_count(), 3);
        assert_ok!(a.return_units(&mut item, &returns(&[("U1", "tersedia"), ("U2", "hilang")]), now()));
        check(&item);
        assert_ok!(b.release_units(&mut item));
        check(&item);
        assert_eq!(item.borrowed_count(), 0);
    }

    fn other_body() -> CreateLoanRequest {
        CreateLoanRequest {
            barang: Some(1),
            peminjam_type: Some(BorrowerKind::Other),
            peminjam_nama: Some("Bu Sari".to_string()),
            peminjam_asal: Some("TU".to_string()),
            peminjam_phone: Some("0813".to_string()),
            is_consumable: Some(false),
            unit_kodes: Some(vec!["U1".to_string(), "U2".to_string()]),
            ..Default::default()
        }
    }

    fn field_names(err: AppError) -> Vec<String> {
        match err {
            AppError::InvalidFields(fields) => fields.into_iter().map(|f| f.field).collect(),
            other => panic!("expected field errors, got {other:?}"),
        }
    }

    #[test]
    fn request_becomes_unit_loan() {
        let request = LoanRequest::try_from(other_body()).unwrap();
        assert_eq!(
            request.goods,
            LoanGoods::Units {
                codes: vec!["U1".to_string(), "U2".to_string()]
            }
        );
        assert_eq!(
            request.borrower,
            Borrower::Other {
                name: "Bu Sari".to_string(),
                origin: "TU".to_string()
            }
        );
    }

    #[test]
    fn request_reports_every_missing_field() {
        let err = LoanRequest::try_from(CreateLoanRequest::default()).unwrap_err();
        assert_eq!(
            field_names(err),
            vec!["barang", "peminjamType", "isConsumable", "peminjamPhone"]
        );

        let student = CreateLoanRequest {
            peminjam_type: Some(BorrowerKind::Student),
            peminjam_nama: None,
            ..other_body()
        };
        assert_eq!(
            field_names(LoanRequest::try_from(student).unwrap_err()),
            vec!["peminjamSiswa"]
        );

        let consumable = CreateLoanRequest {
            is_consumable: Some(true),
            ..other_body()
        };
        assert_eq!(
            field_names(LoanRequest::try_from(consumable).unwrap_err()),
            vec!["jumlah"]
        );
    }

    #[test]
    fn request_rejects_duplicate_or_empty_codes() {
        let dup = CreateLoanRequest {
            unit_kodes: Some(vec!["U1".to_string(), " U1 ".to_string()]),
            ..other_body()
        };
        assert_eq!(field_names(LoanRequest::try_from(dup).unwrap_err()), vec!["unitKodes"]);

        let empty = CreateLoanRequest {
            unit_kodes: Some(vec![]),
            ..other_body()
        };
        assert_eq!(field_names(LoanRequest::try_from(empty).unwrap_err()), vec!["unitKodes"]);

        let zero = CreateLoanRequest {
            is_consumable: Some(true),
            jumlah: Some(0),
            ..other_body()
        };
        assert_eq!(field_names(LoanRequest::try_from(zero).unwrap_err()), vec!["jumlah"]);
    }

    #[test]
    fn check_against_item() {
        let item = unit_item(&[("U1", UnitStatus::Available), ("U2", UnitStatus::OnLoan)]);
        let request = LoanRequest::try_from(other_body()).unwrap();
        assert!(matches!(
            request.check_against(&item),
            Err(AppError::UnitNotAvailable(code)) if code == "U2"
        ));

        let stock = consumable_item(3);
        assert!(matches!(request.check_against(&stock), Err(AppError::TypeMismatch(_))));

        let consumable = LoanRequest::try_from(CreateLoanRequest {
            is_consumable: Some(true),
            jumlah: Some(4),
            ..other_body()
        })
        .unwrap();
        assert!(matches!(
            consumable.check_against(&stock),
            Err(AppError::InsufficientStock { available: 3, requested: 4 })
        ));
    }

    #[test]
    fn new_loans_start_pending() {
        let item = unit_item(&[("U1", UnitStatus::Available)]);
        let at = now();
        let new = LoanRequest::try_from(other_body()).unwrap().into_new_loan(&item, at);
        assert_eq!(new.status, ApprovalStatus::Pending);
        assert_eq!(new.rental_status, None);
        assert_eq!(new.department, Department::Rpl);

        let stock = consumable_item(3);
        let consumable = LoanRequest::try_from(CreateLoanRequest {
            is_consumable: Some(true),
            jumlah: Some(1),
            ..other_body()
        })
        .unwrap()
        .into_new_loan(&stock, at);
        assert_eq!(consumable.status, ApprovalStatus::Pending);
        assert_eq!(consumable.rental_status, Some(RentalStatus::Returned));
        assert_eq!(consumable.returned_at, Some(at));
        assert_eq!(consumable.requested_at, at);
    }

    #[test]
    fn overdue_only_while_units_are_out() {
        let mut item = unit_item(&[("U1", UnitStatus::Available)]);
        let mut loan = unit_loan(1, &["U1"]);
        let approved = now() - Duration::days(5);
        assert_ok!(loan.approve(&mut item, approved));

        assert!(loan.is_overdue(Some(3), now()));
        assert!(!loan.is_overdue(Some(7), now()));
        assert!(!loan.is_overdue(None, now()));

        assert_ok!(loan.return_units(&mut item, &returns(&[("U1", "tersedia")]), now()));
        assert!(!loan.is_overdue(Some(3), now()));
    }

    #[test]
    fn details_flatten_borrower_and_goods() {
        let loan = unit_loan(7, &["U1"]);
        let json = serde_json::to_value(LoanDetails::new(loan, None, now())).unwrap();
        assert_eq!(json["_id"], 7);
        assert_eq!(json["peminjamType"], "lainnya");
        assert_eq!(json["peminjamNama"], "Pak Budi");
        assert_eq!(json["isConsumable"], false);
        assert_eq!(json["unitKodes"][0], "U1");
        assert_eq!(json["status"], "pending");
        assert!(json["rentalStatus"].is_null());
        assert!(json.get("jumlah").is_none());
    }
}
