use zsb_inventory::InventoryError;

/// Market failure taxonomy. Kinds are stable wire tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    ListingNotFound,
    ListingNotActive,
    ListingExpired,
    NotYourListing,
    PriceOutOfRange,
    DurationOutOfRange,
    SelfPurchase,
    Inventory(InventoryError),
}

impl MarketError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ListingNotFound => "listing_not_found",
            Self::ListingNotActive => "listing_not_active",
            Self::ListingExpired => "listing_expired",
            Self::NotYourListing => "not_your_listing",
            Self::PriceOutOfRange => "price_out_of_range",
            Self::DurationOutOfRange => "invalid_request",
            Self::SelfPurchase => "invalid_request",
            Self::Inventory(e) => e.kind(),
        }
    }
}

impl From<InventoryError> for MarketError {
    fn from(e: InventoryError) -> Self {
        Self::Inventory(e)
    }
}

impl std::fmt::Display for MarketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

impl std::error::Error for MarketError {}
