use zsb_inventory::InventoryError;

/// Raid failure taxonomy. Kinds are stable wire tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaidError {
    AlreadyInRaid,
    RaidNotFound,
    RaidNotPreparing,
    AlreadyCommitted,
    NotYourRaid,
    InvalidServerSecret,
    InvalidSignature,
    MatchMismatch,
    ItemsAlreadyLocked,
    Inventory(InventoryError),
}

impl RaidError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AlreadyInRaid => "already_in_raid",
            Self::RaidNotFound => "raid_not_found",
            Self::RaidNotPreparing => "raid_not_preparing",
            Self::AlreadyCommitted => "already_committed",
            Self::NotYourRaid => "not_your_raid",
            Self::InvalidServerSecret => "invalid_server_secret",
            Self::InvalidSignature => "invalid_signature",
            Self::MatchMismatch => "invalid_request",
            Self::ItemsAlreadyLocked => "items_already_locked",
            Self::Inventory(e) => e.kind(),
        }
    }
}

impl From<InventoryError> for RaidError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::ItemsAlreadyLocked => Self::ItemsAlreadyLocked,
            other => Self::Inventory(other),
        }
    }
}

impl std::fmt::Display for RaidError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

impl std::error::Error for RaidError {}
