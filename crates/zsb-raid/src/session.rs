use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use std::collections::BTreeSet;
use zsb_core::ID;
use zsb_core::UnixMillis;
use zsb_inventory::Character;
use zsb_inventory::ItemInstance;

/// Marker for the registry match a raid is bound to.
pub struct MatchRef;

/// Raid lifecycle state. Committed and Abandoned are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RaidStatus {
    Preparing,
    Active,
    Committed,
    Abandoned,
}

impl RaidStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Abandoned)
    }
}

/// Equipment slots a character carries into a raid. Clients habitually
/// send empty strings for empty slots, so blanks parse as None.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loadout {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub primary: Option<ID<ItemInstance>>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub secondary: Option<ID<ItemInstance>>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub melee: Option<ID<ItemInstance>>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub armor: Option<ID<ItemInstance>>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub rig: Option<ID<ItemInstance>>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub bag: Option<ID<ItemInstance>>,
    #[serde(default)]
    pub pockets: Vec<ID<ItemInstance>>,
}

impl Loadout {
    /// Every referenced iid, deduplicated, blanks dropped.
    pub fn iids(&self) -> Vec<ID<ItemInstance>> {
        let slots = [
            self.primary,
            self.secondary,
            self.melee,
            self.armor,
            self.rig,
            self.bag,
        ];
        slots
            .into_iter()
            .flatten()
            .chain(self.pockets.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<ID<ItemInstance>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<ID<ItemInstance>>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// One character's play session from prepare to commit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaidSession {
    pub id: ID<RaidSession>,
    pub character: ID<Character>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lobby_id: Option<String>,
    pub loadout: Loadout,
    pub locked: Vec<ID<ItemInstance>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<ID<MatchRef>>,
    pub status: RaidStatus,
    pub created_at: UnixMillis,
    pub expires_at: UnixMillis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed_at: Option<UnixMillis>,
}

impl RaidSession {
    pub fn new(character: ID<Character>, lobby_id: Option<String>, loadout: Loadout) -> Self {
        let now = zsb_core::now_millis();
        Self {
            id: ID::default(),
            character,
            lobby_id,
            loadout,
            locked: Vec::new(),
            match_id: None,
            status: RaidStatus::Preparing,
            created_at: now,
            expires_at: now + zsb_core::RAID_PREPARE_TIMEOUT.as_millis() as UnixMillis,
            committed_at: None,
        }
    }
    pub fn is_expired(&self, now: UnixMillis) -> bool {
        !self.status.is_terminal() && now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loadout_iids_dedupes_and_drops_blanks() {
        let rifle = ID::default();
        let knife = ID::default();
        let loadout = Loadout {
            primary: Some(rifle),
            secondary: None,
            melee: Some(knife),
            pockets: vec![rifle, knife],
            ..Loadout::default()
        };
        let iids = loadout.iids();
        assert_eq!(iids.len(), 2);
        assert!(iids.contains(&rifle));
        assert!(iids.contains(&knife));
    }
    #[test]
    fn blank_slot_strings_parse_as_none() {
        let loadout: Loadout =
            serde_json::from_str(r#"{"primary":"","pockets":[]}"#).unwrap();
        assert!(loadout.primary.is_none());
        assert!(loadout.iids().is_empty());
    }
    #[test]
    fn fresh_session_expires_on_prepare_timeout() {
        let session = RaidSession::new(ID::default(), None, Loadout::default());
        assert_eq!(session.status, RaidStatus::Preparing);
        assert!(!session.is_expired(zsb_core::now_millis()));
        assert!(session.is_expired(session.expires_at + 1));
    }
}
