//! Item (barang) model: consumables with a bulk stock count, non-consumables
//! with an embedded list of serialized units.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::{Condition, Department, ItemKind, UnitStatus};
use crate::error::{AppError, AppResult};

/// One physical unit of a non-consumable item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Unit {
    #[serde(rename = "kode")]
    pub code: String,
    pub status: UnitStatus,
}

impl Unit {
    pub fn new(code: impl Into<String>, status: UnitStatus) -> Self {
        Self {
            code: code.into(),
            status,
        }
    }
}

/// Kind-specific part of an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "tipe")]
pub enum Inventory {
    #[serde(rename = "habis_pakai")]
    Consumable {
        #[serde(rename = "stok")]
        stock: i32,
        status: Condition,
    },
    #[serde(rename = "tidak_habis_pakai")]
    NonConsumable {
        units: Vec<Unit>,
        /// Cached count of units on loan, always recomputed from `units`
        #[serde(rename = "stok_dipinjam")]
        borrowed_count: i32,
        #[serde(rename = "maxDurasiPinjam")]
        max_loan_duration_days: Option<i32>,
    },
}

impl Inventory {
    pub fn kind(&self) -> ItemKind {
        match self {
            Inventory::Consumable { .. } => ItemKind::Consumable,
            Inventory::NonConsumable { .. } => ItemKind::NonConsumable,
        }
    }

    /// Checks a unit list: non-empty, codes present and unique within the item.
    pub fn validate_units(units: &[Unit]) -> AppResult<()> {
        if units.is_empty() {
            return Err(AppError::Validation(
                "Non-consumable items need at least one unit".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for unit in units {
            if unit.code.trim().is_empty() {
                return Err(AppError::Validation("Every unit needs a code".to_string()));
            }
            if !seen.insert(unit.code.as_str()) {
                return Err(AppError::Validation(format!(
                    "Duplicate unit code '{}'",
                    unit.code
                )));
            }
        }
        Ok(())
    }
}

/// Catalog item
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Item {
    #[serde(rename = "_id")]
    pub id: i32,
    #[serde(rename = "kode", skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(rename = "nama")]
    pub name: String,
    #[serde(rename = "jurusan")]
    pub department: Department,
    #[serde(flatten)]
    pub inventory: Inventory,
    #[serde(rename = "deskripsi")]
    pub description: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn kind(&self) -> ItemKind {
        self.inventory.kind()
    }

    pub fn units(&self) -> Option<&[Unit]> {
        match &self.inventory {
            Inventory::NonConsumable { units, .. } => Some(units),
            Inventory::Consumable { .. } => None,
        }
    }

    pub fn stock(&self) -> Option<i32> {
        match &self.inventory {
            Inventory::Consumable { stock, .. } => Some(*stock),
            Inventory::NonConsumable { .. } => None,
        }
    }

    pub fn borrowed_count(&self) -> i32 {
        match &self.inventory {
            Inventory::NonConsumable { borrowed_count, .. } => *borrowed_count,
            Inventory::Consumable { .. } => 0,
        }
    }

    pub fn max_loan_duration_days(&self) -> Option<i32> {
        match &self.inventory {
            Inventory::NonConsumable {
                max_loan_duration_days,
                ..
            } => *max_loan_duration_days,
            Inventory::Consumable { .. } => None,
        }
    }

    pub fn unit_status(&self, code: &str) -> Option<UnitStatus> {
        self.units()?
            .iter()
            .find(|u| u.code == code)
            .map(|u| u.status)
    }

    /// Units currently in the given status
    pub fn count_units(&self, status: UnitStatus) -> usize {
        self.units()
            .map(|units| units.iter().filter(|u| u.status == status).count())
            .unwrap_or(0)
    }

    /// Sets one unit's status and returns the status it had before.
    ///
    /// Does not touch `borrowed_count`; callers changing anything that affects
    /// `on_loan` call [`Item::recompute_borrowed_count`] afterwards.
    pub fn set_unit_status(&mut self, code: &str, status: UnitStatus) -> AppResult<UnitStatus> {
        let units = match &mut self.inventory {
            Inventory::NonConsumable { units, .. } => units,
            Inventory::Consumable { .. } => {
                return Err(AppError::TypeMismatch(format!(
                    "Item {} is consumable and has no units",
                    self.id
                )))
            }
        };
        let unit = units
            .iter_mut()
            .find(|u| u.code == code)
            .ok_or_else(|| AppError::UnitNotFound(code.to_string()))?;
        Ok(std::mem::replace(&mut unit.status, status))
    }

    /// Recounts units on loan into `borrowed_count` and returns the new value.
    /// No-op (returns 0) for consumables.
    pub fn recompute_borrowed_count(&mut self) -> i32 {
        match &mut self.inventory {
            Inventory::NonConsumable {
                units,
                borrowed_count,
                ..
            } => {
                *borrowed_count = units
                    .iter()
                    .filter(|u| u.status == UnitStatus::OnLoan)
                    .count() as i32;
                *borrowed_count
            }
            Inventory::Consumable { .. } => 0,
        }
    }

    /// Fails with `UnitNotAvailable` naming the first code that is unknown or
    /// not `available`.
    pub fn ensure_units_available<'a, I>(&self, codes: I) -> AppResult<()>
    where
        I: IntoIterator<Item = &'a String>,
    {
        for code in codes {
            if self.unit_status(code) != Some(UnitStatus::Available) {
                return Err(AppError::UnitNotAvailable(code.clone()));
            }
        }
        Ok(())
    }

    pub fn ensure_stock(&self, quantity: i32) -> AppResult<()> {
        let available = self.stock().ok_or_else(|| {
            AppError::TypeMismatch(format!("Item {} has no bulk stock", self.id))
        })?;
        if available < quantity {
            return Err(AppError::InsufficientStock {
                available,
                requested: quantity,
            });
        }
        Ok(())
    }

    /// Deducts consumable stock after re-checking it
    pub fn take_stock(&mut self, quantity: i32) -> AppResult<()> {
        self.ensure_stock(quantity)?;
        if let Inventory::Consumable { stock, .. } = &mut self.inventory {
            *stock -= quantity;
        }
        Ok(())
    }

    /// Same item with only its `available` units, for the loan form
    pub fn with_available_units_only(mut self) -> Self {
        if let Inventory::NonConsumable { units, .. } = &mut self.inventory {
            units.retain(|u| u.status == UnitStatus::Available);
        }
        self
    }

    /// Applies an admin edit. The kind never changes and units on loan stay
    /// exactly as the loan ledger left them.
    pub fn apply_update(&mut self, update: ItemChanges) -> AppResult<()> {
        if update.inventory.kind() != self.kind() {
            return Err(AppError::Validation(format!(
                "Item kind cannot change from {} to {}",
                self.kind(),
                update.inventory.kind()
            )));
        }

        if let (Some(current), Inventory::NonConsumable { units, .. }) =
            (self.units(), &update.inventory)
        {
            Inventory::validate_units(units)?;
            for unit in current.iter().filter(|u| u.status == UnitStatus::OnLoan) {
                match units.iter().find(|u| u.code == unit.code) {
                    Some(u) if u.status == UnitStatus::OnLoan => {}
                    _ => {
                        return Err(AppError::Validation(format!(
                            "Unit '{}' is on loan; return or delete its loan first",
                            unit.code
                        )))
                    }
                }
            }
            for unit in units.iter().filter(|u| u.status == UnitStatus::OnLoan) {
                if self.unit_status(&unit.code) != Some(UnitStatus::OnLoan) {
                    return Err(AppError::Validation(format!(
                        "Unit '{}' can only be put on loan through a loan approval",
                        unit.code
                    )));
                }
            }
        }

        if update.code.is_some() {
            self.code = update.code;
        }
        self.name = update.name;
        self.department = update.department;
        self.description = update.description;
        self.inventory = update.inventory;
        self.recompute_borrowed_count();
        Ok(())
    }
}

/// Item row from database
#[derive(Debug, Clone, FromRow)]
pub struct ItemRow {
    pub id: i32,
    pub code: Option<String>,
    pub name: String,
    pub department: String,
    pub kind: String,
    pub stock: Option<i32>,
    pub condition: Option<String>,
    pub units: Option<Json<Vec<Unit>>>,
    pub borrowed_count: i32,
    pub max_loan_duration_days: Option<i32>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for Item {
    type Error = AppError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| AppError::Internal(format!("Item {}: {}", row.id, what));

        let kind: ItemKind = row.kind.parse().map_err(|e: String| corrupt(&e))?;
        let inventory = match kind {
            ItemKind::Consumable => Inventory::Consumable {
                stock: row.stock.ok_or_else(|| corrupt("consumable without stock"))?,
                status: row
                    .condition
                    .as_deref()
                    .map(str::parse)
                    .transpose()
                    .map_err(|e: String| corrupt(&e))?
                    .unwrap_or_default(),
            },
            ItemKind::NonConsumable => Inventory::NonConsumable {
                units: row
                    .units
                    .map(|Json(units)| units)
                    .ok_or_else(|| corrupt("non-consumable without units"))?,
                borrowed_count: row.borrowed_count,
                max_loan_duration_days: row.max_loan_duration_days,
            },
        };

        Ok(Item {
            id: row.id,
            code: row.code,
            name: row.name,
            department: row.department.parse().map_err(|e: String| corrupt(&e))?,
            inventory,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Minimal item summary embedded in loan views
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemShort {
    #[serde(rename = "_id")]
    pub id: i32,
    #[serde(rename = "nama")]
    pub name: String,
    #[serde(rename = "tipe")]
    pub kind: ItemKind,
    #[serde(rename = "jurusan")]
    pub department: Department,
    #[serde(rename = "maxDurasiPinjam")]
    pub max_loan_duration_days: Option<i32>,
}

impl From<&Item> for ItemShort {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            kind: item.kind(),
            department: item.department,
            max_loan_duration_days: item.max_loan_duration_days(),
        }
    }
}

/// Item in list responses, with unit counts for non-consumables
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ItemSummary {
    #[serde(flatten)]
    pub item: Item,
    #[serde(rename = "totalUnits", skip_serializing_if = "Option::is_none")]
    pub total_units: Option<usize>,
    #[serde(rename = "unitTersedia", skip_serializing_if = "Option::is_none")]
    pub available_units: Option<usize>,
}

impl From<Item> for ItemSummary {
    fn from(item: Item) -> Self {
        let total_units = item.units().map(<[Unit]>::len);
        let available_units = total_units.map(|_| item.count_units(UnitStatus::Available));
        Self {
            item,
            total_units,
            available_units,
        }
    }
}

/// Item list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ItemQuery {
    pub jurusan: Option<Department>,
    pub tipe: Option<ItemKind>,
    /// Case-insensitive substring of the name
    pub nama: Option<String>,
    /// Consumable condition
    pub status: Option<Condition>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Next-code preview parameters
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NextCodeQuery {
    pub jurusan: Department,
    pub nama: String,
}

/// Manual unit status override body
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReturnUnitRequest {
    /// `tersedia`, `rusak` or `hilang`
    pub status: Option<String>,
}

/// Unit as submitted in create/update bodies; a missing code is generated
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnitInput {
    pub kode: Option<String>,
    pub status: Option<UnitStatus>,
}

/// Create/update item request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ItemRequest {
    #[validate(length(min = 1, message = "Item name is required"))]
    pub nama: String,
    pub jurusan: Department,
    pub tipe: ItemKind,
    #[validate(range(min = 0, message = "Stock must be an integer >= 0"))]
    pub stok: Option<i32>,
    pub status: Option<Condition>,
    pub units: Option<Vec<UnitInput>>,
    #[serde(rename = "maxDurasiPinjam")]
    #[validate(range(min = 1, message = "Max loan duration must be >= 1 day"))]
    pub max_durasi_pinjam: Option<i32>,
    pub deskripsi: Option<String>,
}

/// Bulk import body (rows already parsed by the client)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ImportItemsRequest {
    #[validate(length(min = 1, message = "data must contain at least one row"))]
    #[validate(nested)]
    pub data: Vec<ItemRequest>,
}

/// Checked item fields with unit codes possibly still missing
#[derive(Debug, Clone)]
pub struct ItemDraft {
    pub name: String,
    pub department: Department,
    pub description: String,
    pub stock: DraftStock,
}

#[derive(Debug, Clone)]
pub enum DraftStock {
    Consumable {
        stock: i32,
        status: Condition,
    },
    NonConsumable {
        units: Vec<(Option<String>, UnitStatus)>,
        max_loan_duration_days: Option<i32>,
    },
}

/// Fully resolved item fields ready to persist or apply
#[derive(Debug, Clone)]
pub struct ItemChanges {
    pub code: Option<String>,
    pub name: String,
    pub department: Department,
    pub description: String,
    pub inventory: Inventory,
}

impl ItemRequest {
    /// Checks the kind-dependent required fields and returns a draft.
    pub fn into_draft(self) -> AppResult<ItemDraft> {
        self.validate()?;

        let name = self.nama.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Item name is required".to_string()));
        }

        let stock = match self.tipe {
            ItemKind::Consumable => DraftStock::Consumable {
                stock: self.stok.ok_or_else(|| {
                    AppError::Validation("stok is required for consumable items".to_string())
                })?,
                status: self.status.unwrap_or_default(),
            },
            ItemKind::NonConsumable => {
                let inputs = self.units.unwrap_or_default();
                if inputs.is_empty() {
                    return Err(AppError::Validation(
                        "units must contain at least one unit for non-consumable items"
                            .to_string(),
                    ));
                }
                let units = inputs
                    .into_iter()
                    .map(|u| {
                        let code = u
                            .kode
                            .map(|c| c.trim().to_string())
                            .filter(|c| !c.is_empty());
                        (code, u.status.unwrap_or(UnitStatus::Available))
                    })
                    .collect();
                DraftStock::NonConsumable {
                    units,
                    max_loan_duration_days: self.max_durasi_pinjam,
                }
            }
        };

        Ok(ItemDraft {
            name,
            department: self.jurusan,
            description: self.deskripsi.unwrap_or_default(),
            stock,
        })
    }
}

impl ItemDraft {
    /// Counter key for codes of this item
    pub fn code_key(&self) -> String {
        code_key(self.department, &self.name)
    }

    /// Number of codes the counter has to issue: one per unit without a code,
    /// or the item code of a consumable that has none yet.
    pub fn codes_needed(&self, existing_code: Option<&str>) -> usize {
        match &self.stock {
            DraftStock::Consumable { .. } if existing_code.is_some() => 0,
            DraftStock::Consumable { .. } => 1,
            DraftStock::NonConsumable { units, .. } => {
                units.iter().filter(|(code, _)| code.is_none()).count()
            }
        }
    }

    /// Resolves the draft with generated codes, consumed in order.
    pub fn resolve(self, existing_code: Option<String>, generated: Vec<String>) -> AppResult<ItemChanges> {
        let mut generated = generated.into_iter();
        let mut next_code = || {
            generated
                .next()
                .ok_or_else(|| AppError::Internal("not enough generated codes".to_string()))
        };

        let (code, inventory) = match self.stock {
            DraftStock::Consumable { stock, status } => {
                let code = match existing_code {
                    Some(c) => c,
                    None => next_code()?,
                };
                (Some(code), Inventory::Consumable { stock, status })
            }
            DraftStock::NonConsumable {
                units,
                max_loan_duration_days,
            } => {
                let units = units
                    .into_iter()
                    .map(|(code, status)| {
                        let code = match code {
                            Some(c) => c,
                            None => next_code()?,
                        };
                        Ok(Unit::new(code, status))
                    })
                    .collect::<AppResult<Vec<_>>>()?;
                Inventory::validate_units(&units)?;
                (
                    existing_code,
                    Inventory::NonConsumable {
                        units,
                        borrowed_count: 0,
                        max_loan_duration_days,
                    },
                )
            }
        };

        Ok(ItemChanges {
            code,
            name: self.name,
            department: self.department,
            description: self.description,
            inventory,
        })
    }

    /// Resolves a draft for a new item, which may not contain units on loan.
    pub fn resolve_new(self, generated: Vec<String>) -> AppResult<ItemChanges> {
        let changes = self.resolve(None, generated)?;
        if let Inventory::NonConsumable { units, .. } = &changes.inventory {
            if let Some(u) = units.iter().find(|u| u.status == UnitStatus::OnLoan) {
                return Err(AppError::Validation(format!(
                    "Unit '{}' cannot be created on loan",
                    u.code
                )));
            }
        }
        Ok(changes)
    }
}

/// Counter key: department plus the first three characters of the
/// upper-cased name, whitespace runs replaced by `-`.
pub fn code_key(department: Department, name: &str) -> String {
    let abbrev: String = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_uppercase()
        .chars()
        .take(3)
        .collect();
    format!("{}-{}", department, abbrev)
}

/// Formats a sequence number under a counter key: `RPL-PRO-007`
pub fn format_code(key: &str, seq: i64) -> String {
    format!("{}-{:03}", key, seq)
}
