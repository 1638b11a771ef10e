//! Promo code management.
//!
//! Editing a discount rewrites its rules only. Usages recorded at checkout
//! keep the amount they were applied with.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, instrument};

use synclune_core::{DiscountId, DiscountKind, DiscountKindError, DiscountType, Price};
use synclune_storefront::db::discounts::DiscountInput;
use synclune_storefront::db::{DiscountRepository, RepositoryError};
use synclune_storefront::error::{AppError, BusinessError, Result};
use synclune_storefront::models::discount::{Discount, normalize_code};

const MIN_CODE_LENGTH: usize = 3;
const MAX_CODE_LENGTH: usize = 30;

/// Body of discount create and update.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscountRequest {
    pub code: String,
    pub discount_type: DiscountType,
    /// Percent for percentage codes, cents for fixed amounts.
    pub value: i64,
    #[serde(default)]
    pub min_order_amount_cents: Option<i64>,
    #[serde(default)]
    pub max_usage_count: Option<i32>,
    #[serde(default)]
    pub max_usage_per_user: Option<i32>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

const fn default_active() -> bool {
    true
}

fn invalid(message: impl Into<String>) -> BusinessError {
    BusinessError::Validation(message.into())
}

/// Normalize and check a promo code: 3 to 30 characters among `A-Z`, `0-9`,
/// `_` and `-`.
///
/// # Errors
///
/// Returns `BusinessError::Validation` for a malformed code.
pub fn validate_code(code: &str) -> std::result::Result<String, BusinessError> {
    let code = normalize_code(code);
    let length = code.chars().count();
    if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&length) {
        return Err(invalid(format!(
            "Le code doit contenir entre {MIN_CODE_LENGTH} et {MAX_CODE_LENGTH} caractères."
        )));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(invalid(
            "Le code ne peut contenir que des lettres, des chiffres, « _ » et « - ».",
        ));
    }
    Ok(code)
}

fn positive_limit(
    value: Option<i32>,
    label: &str,
) -> std::result::Result<Option<i32>, BusinessError> {
    match value {
        Some(limit) if limit < 1 => Err(invalid(format!("{label} doit être au moins 1."))),
        other => Ok(other),
    }
}

/// Turn a submitted discount into repository input.
///
/// `now` is the start date when none is given.
///
/// # Errors
///
/// Returns `BusinessError::Validation` for any rule the discount breaks.
pub fn validate_discount(
    request: &DiscountRequest,
    now: DateTime<Utc>,
) -> std::result::Result<DiscountInput, BusinessError> {
    let code = validate_code(&request.code)?;

    let kind = DiscountKind::from_parts(request.discount_type, request.value).map_err(|e| match e {
        DiscountKindError::PercentageOutOfRange(_) => {
            invalid("Le pourcentage doit être compris entre 1 et 100.")
        }
        DiscountKindError::NonPositiveAmount(_) => invalid("Le montant doit être positif."),
    })?;

    let min_order_amount = match request.min_order_amount_cents {
        Some(cents) if cents < 0 => {
            return Err(invalid("Le minimum de commande ne peut pas être négatif."));
        }
        Some(0) | None => None,
        Some(cents) => Some(Price::from_cents(cents)),
    };

    let max_usage_count = positive_limit(request.max_usage_count, "La limite d'utilisation")?;
    let max_usage_per_user =
        positive_limit(request.max_usage_per_user, "La limite par client")?;

    let starts_at = request.starts_at.unwrap_or(now);
    if let Some(ends_at) = request.ends_at
        && ends_at <= starts_at
    {
        return Err(invalid("La date de fin doit être postérieure à la date de début."));
    }

    Ok(DiscountInput {
        code,
        kind,
        min_order_amount,
        max_usage_count,
        max_usage_per_user,
        is_active: request.is_active,
        starts_at,
        ends_at: request.ends_at,
    })
}

fn code_conflict(err: RepositoryError) -> AppError {
    match err {
        RepositoryError::Conflict(_) => invalid("Ce code promo existe déjà.").into(),
        other => other.into(),
    }
}

/// Discount operations of the back-office.
pub struct DiscountAdminService<'a> {
    discounts: DiscountRepository<'a>,
}

impl<'a> DiscountAdminService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            discounts: DiscountRepository::new(pool),
        }
    }

    /// All discounts, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(&self) -> Result<Vec<Discount>> {
        Ok(self.discounts.list().await?)
    }

    /// # Errors
    ///
    /// Returns `BusinessError::Validation` for invalid rules or a taken code.
    #[instrument(skip_all, fields(code = %request.code))]
    pub async fn create(&self, request: &DiscountRequest) -> Result<Discount> {
        let input = validate_discount(request, Utc::now())?;
        let discount = self.discounts.create(&input).await.map_err(code_conflict)?;
        info!(discount_id = %discount.id, "Discount created");
        Ok(discount)
    }

    /// # Errors
    ///
    /// Returns `BusinessError::Validation` for invalid rules or a taken code,
    /// or a not-found error.
    #[instrument(skip(self, request), fields(discount_id = %id))]
    pub async fn update(&self, id: DiscountId, request: &DiscountRequest) -> Result<Discount> {
        let existing = self
            .discounts
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("code promo".to_string()))?;
        // An update without a start date keeps the current one.
        let input = validate_discount(request, existing.starts_at)?;
        let discount = self.discounts.update(id, &input).await.map_err(code_conflict)?;
        info!("Discount updated");
        Ok(discount)
    }

    /// # Errors
    ///
    /// Returns a not-found error for an unknown discount.
    #[instrument(skip(self), fields(discount_id = %id))]
    pub async fn toggle(&self, id: DiscountId) -> Result<Discount> {
        let discount = self.discounts.toggle_active(id).await?;
        info!(is_active = discount.is_active, "Discount toggled");
        Ok(discount)
    }

    /// Delete a discount that was never used.
    ///
    /// # Errors
    ///
    /// Returns `BusinessError::DiscountInUse` once a usage exists.
    #[instrument(skip(self), fields(discount_id = %id))]
    pub async fn delete(&self, id: DiscountId) -> Result<()> {
        if !self.discounts.delete_unused(id).await? {
            return Err(BusinessError::DiscountInUse.into());
        }
        info!("Discount deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }

    fn request(discount_type: DiscountType, value: i64) -> DiscountRequest {
        DiscountRequest {
            code: "noel25".to_string(),
            discount_type,
            value,
            min_order_amount_cents: None,
            max_usage_count: None,
            max_usage_per_user: None,
            is_active: true,
            starts_at: None,
            ends_at: None,
        }
    }

    #[test]
    fn test_validate_code() {
        assert_eq!(validate_code(" noel-25 ").unwrap(), "NOEL-25");
        assert_eq!(validate_code("BIENVENUE_10").unwrap(), "BIENVENUE_10");
        assert!(validate_code("AB").is_err());
        assert!(validate_code(&"A".repeat(31)).is_err());
        assert!(validate_code("NOËL").is_err());
        assert!(validate_code("NOEL 25").is_err());
    }

    #[test]
    fn test_percentage_bounds() {
        assert!(validate_discount(&request(DiscountType::Percentage, 1), now()).is_ok());
        assert!(validate_discount(&request(DiscountType::Percentage, 100), now()).is_ok());
        assert!(validate_discount(&request(DiscountType::Percentage, 0), now()).is_err());
        assert!(validate_discount(&request(DiscountType::Percentage, 101), now()).is_err());
    }

    #[test]
    fn test_fixed_amount_must_be_positive() {
        let input = validate_discount(&request(DiscountType::FixedAmount, 1_000), now()).unwrap();
        assert_eq!(input.kind, DiscountKind::FixedAmount(Price::from_cents(1_000)));
        assert!(validate_discount(&request(DiscountType::FixedAmount, 0), now()).is_err());
    }

    #[test]
    fn test_defaults_and_normalization() {
        let input = validate_discount(&request(DiscountType::Percentage, 25), now()).unwrap();
        assert_eq!(input.code, "NOEL25");
        assert_eq!(input.starts_at, now());
        assert_eq!(input.min_order_amount, None);
        assert!(input.is_active);
    }

    #[test]
    fn test_end_must_follow_start() {
        let mut req = request(DiscountType::Percentage, 10);
        req.ends_at = Some(now());
        assert!(validate_discount(&req, now()).is_err());

        req.ends_at = Some(now() + Duration::days(7));
        assert!(validate_discount(&req, now()).is_ok());
    }

    #[test]
    fn test_limits_must_be_positive() {
        let mut req = request(DiscountType::Percentage, 10);
        req.max_usage_count = Some(0);
        assert!(validate_discount(&req, now()).is_err());

        req.max_usage_count = Some(100);
        req.max_usage_per_user = Some(1);
        req.min_order_amount_cents = Some(5_000);
        let input = validate_discount(&req, now()).unwrap();
        assert_eq!(input.max_usage_count, Some(100));
        assert_eq!(input.min_order_amount, Some(Price::from_cents(5_000)));

        req.min_order_amount_cents = Some(-1);
        assert!(validate_discount(&req, now()).is_err());
    }
}
