//! Subscription lifecycle mapping for payment-provider webhooks.
//!
//! The provider reports six subscription statuses; locally they collapse to
//! four actions. The table lives in [`ProviderStatus::action`].

use serde::Deserialize;

use crate::types::{BillingStatus, Tier};

const EVENT_PREFIX: &str = "subscription.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Active,
    PastDue,
    Canceled,
    Expired,
    Failed,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingAction {
    Activate,
    MarkPastDue,
    Revert,
    PassThrough,
}

impl ProviderStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(ProviderStatus::Active),
            "past_due" => Some(ProviderStatus::PastDue),
            "canceled" | "cancelled" => Some(ProviderStatus::Canceled),
            "expired" => Some(ProviderStatus::Expired),
            "failed" => Some(ProviderStatus::Failed),
            "updated" => Some(ProviderStatus::Updated),
            _ => None,
        }
    }

    /// `subscription.active` -> `Active`. Non-subscription events yield `None`.
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        event_type
            .strip_prefix(EVENT_PREFIX)
            .and_then(ProviderStatus::parse)
    }

    pub const fn action(self) -> BillingAction {
        match self {
            ProviderStatus::Active => BillingAction::Activate,
            ProviderStatus::PastDue => BillingAction::MarkPastDue,
            ProviderStatus::Canceled | ProviderStatus::Expired | ProviderStatus::Failed => {
                BillingAction::Revert
            }
            ProviderStatus::Updated => BillingAction::PassThrough,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionData {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub metadata: SubscriptionMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionMetadata {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Maps provider product ids to tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductCatalog {
    pub pro_product_id: String,
    pub unlimited_product_id: String,
}

impl ProductCatalog {
    pub fn tier_for(&self, product_id: &str) -> Option<Tier> {
        if product_id == self.pro_product_id {
            Some(Tier::Pro)
        } else if product_id == self.unlimited_product_id {
            Some(Tier::Unlimited)
        } else {
            None
        }
    }

    /// Free has no product; it is the absence of a subscription.
    pub fn product_for(&self, tier: Tier) -> Option<&str> {
        match tier {
            Tier::Free => None,
            Tier::Pro => Some(&self.pro_product_id),
            Tier::Unlimited => Some(&self.unlimited_product_id),
        }
    }
}

/// Profile columns to write. `tier: None` keeps the current tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingUpdate {
    pub tier: Option<Tier>,
    pub status: BillingStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BillingError {
    #[error("subscription event has no product id")]
    MissingProduct,
    #[error("unknown product id: {0}")]
    UnknownProduct(String),
}

/// Decide the profile update for a subscription event.
///
/// `Ok(None)` means the event carries nothing to apply (an `updated` event
/// whose own status is missing or unrecognised).
pub fn plan_update(
    event_status: ProviderStatus,
    data: &SubscriptionData,
    catalog: &ProductCatalog,
) -> Result<Option<BillingUpdate>, BillingError> {
    let status = match event_status.action() {
        BillingAction::PassThrough => {
            match data.status.as_deref().and_then(ProviderStatus::parse) {
                Some(ProviderStatus::Updated) | None => return Ok(None),
                Some(status) => status,
            }
        }
        _ => event_status,
    };

    let update = match status.action() {
        BillingAction::Activate => {
            let product_id = data
                .product_id
                .as_deref()
                .ok_or(BillingError::MissingProduct)?;
            let tier = catalog
                .tier_for(product_id)
                .ok_or_else(|| BillingError::UnknownProduct(product_id.to_string()))?;
            BillingUpdate {
                tier: Some(tier),
                status: BillingStatus::Active,
            }
        }
        BillingAction::MarkPastDue => BillingUpdate {
            tier: None,
            status: BillingStatus::PastDue,
        },
        BillingAction::Revert => BillingUpdate {
            tier: Some(Tier::Free),
            status: BillingStatus::Canceled,
        },
        BillingAction::PassThrough => return Ok(None),
    };

    Ok(Some(update))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ProductCatalog {
        ProductCatalog {
            pro_product_id: "prod_pro".to_string(),
            unlimited_product_id: "prod_unl".to_string(),
        }
    }

    fn data(status: Option<&str>, product: Option<&str>) -> SubscriptionData {
        SubscriptionData {
            id: "sub_1".to_string(),
            status: status.map(str::to_string),
            customer_id: Some("cus_1".to_string()),
            product_id: product.map(str::to_string),
            metadata: SubscriptionMetadata::default(),
        }
    }

    #[test]
    fn test_status_table() {
        assert_eq!(ProviderStatus::Active.action(), BillingAction::Activate);
        assert_eq!(ProviderStatus::PastDue.action(), BillingAction::MarkPastDue);
        assert_eq!(ProviderStatus::Canceled.action(), BillingAction::Revert);
        assert_eq!(ProviderStatus::Expired.action(), BillingAction::Revert);
        assert_eq!(ProviderStatus::Failed.action(), BillingAction::Revert);
        assert_eq!(ProviderStatus::Updated.action(), BillingAction::PassThrough);
    }

    #[test]
    fn test_from_event_type() {
        assert_eq!(
            ProviderStatus::from_event_type("subscription.past_due"),
            Some(ProviderStatus::PastDue)
        );
        assert_eq!(
            ProviderStatus::from_event_type("subscription.cancelled"),
            Some(ProviderStatus::Canceled)
        );
        assert_eq!(ProviderStatus::from_event_type("order.created"), None);
        assert_eq!(ProviderStatus::from_event_type("subscription.trialing"), None);
    }

    #[test]
    fn test_activate_uses_product_tier() {
        let update = plan_update(
            ProviderStatus::Active,
            &data(Some("active"), Some("prod_unl")),
            &catalog(),
        )
        .unwrap();

        assert_eq!(
            update,
            Some(BillingUpdate {
                tier: Some(Tier::Unlimited),
                status: BillingStatus::Active,
            })
        );
    }

    #[test]
    fn test_activate_unknown_product() {
        let err = plan_update(
            ProviderStatus::Active,
            &data(None, Some("prod_other")),
            &catalog(),
        )
        .unwrap_err();

        assert_eq!(err, BillingError::UnknownProduct("prod_other".to_string()));
        assert_eq!(
            plan_update(ProviderStatus::Active, &data(None, None), &catalog()).unwrap_err(),
            BillingError::MissingProduct
        );
    }

    #[test]
    fn test_past_due_keeps_tier() {
        let update = plan_update(ProviderStatus::PastDue, &data(None, None), &catalog()).unwrap();

        assert_eq!(
            update,
            Some(BillingUpdate {
                tier: None,
                status: BillingStatus::PastDue,
            })
        );
    }

    #[test]
    fn test_terminal_statuses_revert_to_free() {
        for status in [
            ProviderStatus::Canceled,
            ProviderStatus::Expired,
            ProviderStatus::Failed,
        ] {
            let update = plan_update(status, &data(None, Some("prod_pro")), &catalog()).unwrap();
            assert_eq!(
                update,
                Some(BillingUpdate {
                    tier: Some(Tier::Free),
                    status: BillingStatus::Canceled,
                }),
                "{:?} should revert to free",
                status
            );
        }
    }

    #[test]
    fn test_updated_passes_through_payload_status() {
        let upgraded = plan_update(
            ProviderStatus::Updated,
            &data(Some("active"), Some("prod_unl")),
            &catalog(),
        )
        .unwrap();
        assert_eq!(upgraded.and_then(|u| u.tier), Some(Tier::Unlimited));

        let lapsed = plan_update(
            ProviderStatus::Updated,
            &data(Some("canceled"), Some("prod_pro")),
            &catalog(),
        )
        .unwrap();
        assert_eq!(lapsed.and_then(|u| u.tier), Some(Tier::Free));
    }

    #[test]
    fn test_updated_without_usable_status_is_noop() {
        assert_eq!(
            plan_update(ProviderStatus::Updated, &data(None, None), &catalog()).unwrap(),
            None
        );
        assert_eq!(
            plan_update(
                ProviderStatus::Updated,
                &data(Some("incomplete"), None),
                &catalog()
            )
            .unwrap(),
            None
        );
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = catalog();
        assert_eq!(catalog.tier_for("prod_pro"), Some(Tier::Pro));
        assert_eq!(catalog.tier_for("nope"), None);
        assert_eq!(catalog.product_for(Tier::Unlimited), Some("prod_unl"));
        assert_eq!(catalog.product_for(Tier::Free), None);
    }

    #[test]
    fn test_subscription_data_deserializes_with_metadata() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{
                "type": "subscription.active",
                "data": {
                    "id": "sub_123",
                    "status": "active",
                    "customer_id": "cus_9",
                    "product_id": "prod_pro",
                    "metadata": {"user_id": "usr_abc"},
                    "amount": 900
                }
            }"#,
        )
        .unwrap();
        let data: SubscriptionData = serde_json::from_value(event.data).unwrap();

        assert_eq!(event.event_type, "subscription.active");
        assert_eq!(data.metadata.user_id.as_deref(), Some("usr_abc"));
        assert_eq!(data.customer_id.as_deref(), Some("cus_9"));
    }
}
