use super::*;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::MutexGuard;
use zsb_core::PlayerId;
use zsb_core::UnixMillis;

/// Friend-directory failure taxonomy. Kinds are stable wire tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocialError {
    SelfRequest,
    AlreadyFriends,
    AlreadyRequested,
    RequestNotFound,
}

impl SocialError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SelfRequest => "invalid_request",
            Self::AlreadyFriends => "already_friends",
            Self::AlreadyRequested => "already_requested",
            Self::RequestNotFound => "request_not_found",
        }
    }
}

impl std::fmt::Display for SocialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

impl std::error::Error for SocialError {}

#[derive(Default)]
struct State {
    presence: HashMap<PlayerId, Presence>,
    friends: HashMap<PlayerId, HashSet<PlayerId>>,
    requests: HashMap<PlayerId, Vec<FriendRequest>>,
    invites: HashMap<PlayerId, Vec<GameInvite>>,
}

impl State {
    fn presence_or_unknown(&mut self, player: &str) -> &mut Presence {
        self.presence
            .entry(player.to_string())
            .or_insert_with(|| Presence::unknown(player))
    }
    fn are_friends(&self, a: &str, b: &str) -> bool {
        self.friends.get(a).map(|s| s.contains(b)).unwrap_or(false)
    }
}

/// Presence, the symmetric friend graph, pending requests, and invites.
/// One lock serializes every mutation, so per-recipient ordering holds
/// trivially.
#[derive(Default)]
pub struct FriendDirectory {
    state: Mutex<State>,
}

impl FriendDirectory {
    pub fn new() -> Self {
        Self::default()
    }
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("friend directory lock")
    }
}

/// Presence.
impl FriendDirectory {
    pub fn update_presence(
        &self,
        player: &str,
        display_name: Option<&str>,
        online: bool,
        current_game: Option<String>,
    ) -> Presence {
        let mut state = self.lock();
        let record = state.presence_or_unknown(player);
        if let Some(name) = display_name {
            record.display_name = name.to_string();
        }
        record.online = online;
        record.current_game = current_game;
        record.last_seen = zsb_core::now_millis();
        record.clone()
    }
    pub fn presence(&self, player: &str) -> Option<Presence> {
        self.lock().presence.get(player).cloned()
    }
}

/// Friend graph.
impl FriendDirectory {
    /// Rejected for self, existing friends, and duplicate requests, so
    /// re-sending can never fan out into multiple entries.
    pub fn send_request(&self, from: &str, to: &str) -> Result<FriendRequest, SocialError> {
        if from == to {
            return Err(SocialError::SelfRequest);
        }
        let mut state = self.lock();
        if state.are_friends(from, to) {
            return Err(SocialError::AlreadyFriends);
        }
        let pending = state.requests.entry(to.to_string()).or_default();
        if pending.iter().any(|r| r.from == from) {
            return Err(SocialError::AlreadyRequested);
        }
        let request = FriendRequest {
            from: from.to_string(),
            to: to.to_string(),
            sent_at: zsb_core::now_millis(),
        };
        pending.push(request.clone());
        state.presence_or_unknown(from);
        state.presence_or_unknown(to);
        log::debug!("[friends] request {} -> {}", from, to);
        Ok(request)
    }
    /// Consumes the pending request and adds the symmetric edge. Returns
    /// the new friend's presence for the response.
    pub fn accept(&self, player: &str, from: &str) -> Result<Presence, SocialError> {
        let mut state = self.lock();
        let pending = state
            .requests
            .get_mut(player)
            .ok_or(SocialError::RequestNotFound)?;
        let before = pending.len();
        pending.retain(|r| r.from != from);
        if pending.len() == before {
            return Err(SocialError::RequestNotFound);
        }
        state
            .friends
            .entry(player.to_string())
            .or_default()
            .insert(from.to_string());
        state
            .friends
            .entry(from.to_string())
            .or_default()
            .insert(player.to_string());
        log::info!("[friends] {} accepted {}", player, from);
        Ok(state.presence_or_unknown(from).clone())
    }
    pub fn decline(&self, player: &str, from: &str) -> Result<(), SocialError> {
        let mut state = self.lock();
        let pending = state
            .requests
            .get_mut(player)
            .ok_or(SocialError::RequestNotFound)?;
        let before = pending.len();
        pending.retain(|r| r.from != from);
        if pending.len() == before {
            return Err(SocialError::RequestNotFound);
        }
        Ok(())
    }
    /// Removes the symmetric edge. Silent when absent.
    pub fn remove(&self, player: &str, friend: &str) {
        let mut state = self.lock();
        if let Some(set) = state.friends.get_mut(player) {
            set.remove(friend);
        }
        if let Some(set) = state.friends.get_mut(friend) {
            set.remove(player);
        }
    }
    pub fn list_friends(&self, player: &str) -> Vec<Presence> {
        let state = self.lock();
        let mut friends: Vec<Presence> = state
            .friends
            .get(player)
            .into_iter()
            .flatten()
            .map(|id| {
                state
                    .presence
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| Presence::unknown(id))
            })
            .collect();
        friends.sort_by(|a, b| a.player_id.cmp(&b.player_id));
        friends
    }
    pub fn list_pending(&self, player: &str) -> Vec<FriendRequest> {
        self.lock()
            .requests
            .get(player)
            .cloned()
            .unwrap_or_default()
    }
}

/// Game invites.
impl FriendDirectory {
    /// The newest invite from a sender replaces any prior one to the same
    /// recipient.
    pub fn send_invite(&self, from: &str, to: &str, server: InviteServerInfo) -> GameInvite {
        let mut state = self.lock();
        let invite = GameInvite {
            from: from.to_string(),
            server,
            sent_at: zsb_core::now_millis(),
        };
        let inbox = state.invites.entry(to.to_string()).or_default();
        inbox.retain(|i| i.from != from);
        inbox.push(invite.clone());
        invite
    }
    /// Pending invites, stale ones culled on read.
    pub fn invites(&self, player: &str) -> Vec<GameInvite> {
        self.invites_at(player, zsb_core::now_millis())
    }
    fn invites_at(&self, player: &str, now: UnixMillis) -> Vec<GameInvite> {
        let mut state = self.lock();
        match state.invites.get_mut(player) {
            None => Vec::new(),
            Some(inbox) => {
                inbox.retain(|i| !i.is_stale(now));
                inbox.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> InviteServerInfo {
        InviteServerInfo {
            host: "127.0.0.1".into(),
            port: 27015,
            match_id: None,
        }
    }

    #[test]
    fn request_accept_builds_a_symmetric_edge() {
        let directory = FriendDirectory::new();
        directory.send_request("p1", "p2").unwrap();
        directory.accept("p2", "p1").unwrap();
        assert_eq!(directory.list_friends("p1").len(), 1);
        assert_eq!(directory.list_friends("p2").len(), 1);
        assert!(directory.list_pending("p2").is_empty());
    }
    #[test]
    fn self_and_duplicate_requests_are_rejected() {
        let directory = FriendDirectory::new();
        assert_eq!(
            directory.send_request("p1", "p1").err(),
            Some(SocialError::SelfRequest)
        );
        directory.send_request("p1", "p2").unwrap();
        assert_eq!(
            directory.send_request("p1", "p2").err(),
            Some(SocialError::AlreadyRequested)
        );
        assert_eq!(directory.list_pending("p2").len(), 1);
    }
    #[test]
    fn request_to_an_existing_friend_is_rejected() {
        let directory = FriendDirectory::new();
        directory.send_request("p1", "p2").unwrap();
        directory.accept("p2", "p1").unwrap();
        assert_eq!(
            directory.send_request("p2", "p1").err(),
            Some(SocialError::AlreadyFriends)
        );
    }
    #[test]
    fn unknown_players_get_minimal_presence() {
        let directory = FriendDirectory::new();
        directory.send_request("p1", "ghost").unwrap();
        let presence = directory.presence("ghost").unwrap();
        assert!(!presence.online);
        assert_eq!(presence.display_name, "ghost");
    }
    #[test]
    fn decline_drops_the_request_without_an_edge() {
        let directory = FriendDirectory::new();
        directory.send_request("p1", "p2").unwrap();
        directory.decline("p2", "p1").unwrap();
        assert!(directory.list_pending("p2").is_empty());
        assert!(directory.list_friends("p2").is_empty());
        assert_eq!(
            directory.decline("p2", "p1").err(),
            Some(SocialError::RequestNotFound)
        );
    }
    #[test]
    fn remove_is_silent_and_symmetric() {
        let directory = FriendDirectory::new();
        directory.send_request("p1", "p2").unwrap();
        directory.accept("p2", "p1").unwrap();
        directory.remove("p1", "p2");
        assert!(directory.list_friends("p1").is_empty());
        assert!(directory.list_friends("p2").is_empty());
        directory.remove("p1", "p2");
    }
    #[test]
    fn newer_invite_replaces_the_senders_prior_one() {
        let directory = FriendDirectory::new();
        directory.send_invite("p1", "p2", info());
        let second = InviteServerInfo {
            port: 27016,
            ..info()
        };
        directory.send_invite("p1", "p2", second);
        let invites = directory.invites("p2");
        assert_eq!(invites.len(), 1);
        assert_eq!(invites[0].server.port, 27016);
    }
    #[test]
    fn stale_invites_are_culled_on_read() {
        let directory = FriendDirectory::new();
        let invite = directory.send_invite("p1", "p2", info());
        let ttl = zsb_core::INVITE_TTL.as_millis() as UnixMillis;
        assert_eq!(directory.invites_at("p2", invite.sent_at + ttl + 1).len(), 0);
    }
    #[test]
    fn presence_updates_are_upserts() {
        let directory = FriendDirectory::new();
        directory.update_presence("p1", Some("Rook"), true, Some("m-1".into()));
        let presence = directory.presence("p1").unwrap();
        assert!(presence.online);
        assert_eq!(presence.current_game.as_deref(), Some("m-1"));
        directory.update_presence("p1", None, false, None);
        let presence = directory.presence("p1").unwrap();
        assert!(!presence.online);
        assert_eq!(presence.display_name, "Rook");
    }
}
