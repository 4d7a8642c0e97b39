use serde::Deserialize;
use serde::Serialize;
use zsb_core::Gold;
use zsb_core::Reputation;
use zsb_core::TRADER_BUYBACK_SLOPE;
use zsb_core::TRADER_BUY_SLOPE;
use zsb_inventory::ItemCategory;

/// One purchasable line in a trader's catalog. Stock of -1 is infinite.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderOffer {
    pub id: String,
    pub def_id: String,
    pub price: Gold,
    #[serde(default = "infinite")]
    pub stock: i64,
    #[serde(default = "level_one")]
    pub min_level: u64,
    #[serde(default)]
    pub min_reputation: Reputation,
}

fn infinite() -> i64 {
    -1
}
fn level_one() -> u64 {
    1
}

/// A trader's static definition. An empty category list accepts all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraderDef {
    pub id: String,
    pub name: String,
    pub buyback_rate: f64,
    #[serde(default)]
    pub accepted_categories: Vec<ItemCategory>,
    pub offers: Vec<TraderOffer>,
}

impl TraderDef {
    pub fn accepts(&self, category: ItemCategory) -> bool {
        self.accepted_categories.is_empty() || self.accepted_categories.contains(&category)
    }
    pub fn offer(&self, offer_id: &str) -> Option<&TraderOffer> {
        self.offers.iter().find(|o| o.id == offer_id)
    }
}

/// Buy price at a given standing: `max(1, base * (1 - 0.15 * rep))`.
pub fn buy_price(base: Gold, rep: Reputation) -> Gold {
    ((base as f64 * (1.0 - TRADER_BUY_SLOPE * rep as f64)) as Gold).max(1)
}

/// Buyback rate at a given standing: `base + 0.10 * rep`, floored at zero.
pub fn buyback_rate(base: f64, rep: Reputation) -> f64 {
    (base + TRADER_BUYBACK_SLOPE * rep as f64).max(0.0)
}

/// Gold credited for selling: value × buyback × durability × quantity.
pub fn sell_credit(base_value: Gold, rate: f64, durability: f32, quantity: u32) -> Gold {
    (base_value as f64 * rate * durability as f64 * quantity as f64) as Gold
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn reputation_discounts_purchases() {
        assert_eq!(buy_price(100, 0.0), 100);
        assert_eq!(buy_price(100, 1.0), 85);
        assert_eq!(buy_price(100, -1.0), 114);
        assert_eq!(buy_price(1, 1.0), 1);
    }
    #[test]
    fn reputation_raises_buyback() {
        assert!((buyback_rate(0.4, 0.0) - 0.4).abs() < 1e-9);
        assert!((buyback_rate(0.4, 1.0) - 0.5).abs() < 1e-9);
        assert!((buyback_rate(0.4, -1.0) - 0.3).abs() < 1e-9);
    }
    #[test]
    fn sell_credit_scales_with_wear_and_quantity() {
        assert_eq!(sell_credit(100, 0.5, 1.0, 2), 100);
        assert_eq!(sell_credit(100, 0.5, 0.5, 2), 50);
    }
    #[test]
    fn empty_category_list_accepts_all() {
        let trader = TraderDef {
            id: "doc".into(),
            name: "Doc".into(),
            buyback_rate: 0.5,
            accepted_categories: vec![],
            offers: vec![],
        };
        assert!(trader.accepts(ItemCategory::Weapon));
        let picky = TraderDef {
            accepted_categories: vec![ItemCategory::Medical],
            ..trader
        };
        assert!(picky.accepts(ItemCategory::Medical));
        assert!(!picky.accepts(ItemCategory::Weapon));
    }
}
