use serde::Deserialize;
use serde::Serialize;
use zsb_core::Gold;
use zsb_core::ID;
use zsb_core::UnixMillis;
use zsb_inventory::Character;
use zsb_inventory::ItemInstance;

/// Listing lifecycle state. Everything but Active is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    Sold,
    Cancelled,
    Expired,
}

/// One escrowed item offered at a price. While Active, the item carries
/// this listing's id as its escrow owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: ID<Listing>,
    pub seller: ID<Character>,
    pub iid: ID<ItemInstance>,
    pub def_id: String,
    pub price: Gold,
    pub fee_paid: Gold,
    pub status: ListingStatus,
    pub created_at: UnixMillis,
    pub expires_at: UnixMillis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<UnixMillis>,
}

impl Listing {
    pub fn is_expired(&self, now: UnixMillis) -> bool {
        self.status == ListingStatus::Active && now > self.expires_at
    }
}
