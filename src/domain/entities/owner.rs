use serde::{Deserialize, Serialize};

/// Claim state of an owner set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerState {
    Unclaimed,
    Claimed,
}

/// Reasons an owner-set mutation is refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerChange {
    Applied,
    AlreadyClaimed,
    InvalidPrincipal,
    NotAuthorized,
    PrimaryImmutable,
    AlreadyOwner,
    NotOwner,
}

impl OwnerChange {
    pub fn applied(&self) -> bool {
        matches!(self, OwnerChange::Applied)
    }
}

/// Persisted owner document.
///
/// `owners[0]` is the primary owner once claimed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerConfig {
    #[serde(default)]
    pub primary_owner: Option<i64>,
    #[serde(default)]
    pub owners: Vec<i64>,
    #[serde(default)]
    pub setup_completed: bool,
}

impl OwnerConfig {
    pub fn state(&self) -> OwnerState {
        if self.primary_owner.is_some() {
            OwnerState::Claimed
        } else {
            OwnerState::Unclaimed
        }
    }

    pub fn is_owner(&self, id: i64) -> bool {
        self.owners.contains(&id)
    }

    pub fn claim(&mut self, id: i64, min_id: i64) -> OwnerChange {
        if !is_plausible_principal(id, min_id) {
            return OwnerChange::InvalidPrincipal;
        }
        if self.state() == OwnerState::Claimed {
            return OwnerChange::AlreadyClaimed;
        }
        self.primary_owner = Some(id);
        self.owners = vec![id];
        self.setup_completed = true;
        OwnerChange::Applied
    }

    pub fn add(&mut self, id: i64, acting: i64) -> OwnerChange {
        if !self.is_owner(acting) {
            return OwnerChange::NotAuthorized;
        }
        if id <= 0 {
            return OwnerChange::InvalidPrincipal;
        }
        if self.is_owner(id) {
            return OwnerChange::AlreadyOwner;
        }
        self.owners.push(id);
        OwnerChange::Applied
    }

    pub fn remove(&mut self, id: i64, acting: i64) -> OwnerChange {
        if self.primary_owner == Some(id) {
            return OwnerChange::PrimaryImmutable;
        }
        if !self.is_owner(acting) {
            return OwnerChange::NotAuthorized;
        }
        let before = self.owners.len();
        self.owners.retain(|owner| *owner != id);
        if self.owners.len() == before {
            return OwnerChange::NotOwner;
        }
        OwnerChange::Applied
    }

    /// Restore a primary owner recorded elsewhere (the claim file) when the
    /// document lost it.
    pub fn restore_primary(&mut self, id: i64) -> bool {
        if self.primary_owner.is_some() {
            return false;
        }
        self.primary_owner = Some(id);
        self.owners.retain(|owner| *owner != id);
        self.owners.insert(0, id);
        self.setup_completed = true;
        true
    }
}

/// Positive and above the magnitude threshold.
pub fn is_plausible_principal(id: i64, min_id: i64) -> bool {
    id > 0 && id >= min_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_happens_once() {
        let mut config = OwnerConfig::default();
        assert_eq!(config.state(), OwnerState::Unclaimed);
        assert!(config.claim(1001, 1000).applied());
        assert_eq!(config.claim(2002, 1000), OwnerChange::AlreadyClaimed);
        assert_eq!(config.primary_owner, Some(1001));
        assert_eq!(config.owners, vec![1001]);
        assert!(config.setup_completed);
    }

    #[test]
    fn claim_rejects_implausible_ids() {
        let mut config = OwnerConfig::default();
        assert_eq!(config.claim(-5, 1000), OwnerChange::InvalidPrincipal);
        assert_eq!(config.claim(0, 1000), OwnerChange::InvalidPrincipal);
        assert_eq!(config.claim(999, 1000), OwnerChange::InvalidPrincipal);
        assert_eq!(config.state(), OwnerState::Unclaimed);
    }

    #[test]
    fn primary_cannot_be_removed() {
        let mut config = OwnerConfig::default();
        config.claim(1001, 1000);
        assert!(config.add(3003, 1001).applied());
        assert_eq!(config.remove(1001, 3003), OwnerChange::PrimaryImmutable);
        assert_eq!(config.remove(1001, 1001), OwnerChange::PrimaryImmutable);
        assert!(config.remove(3003, 1001).applied());
        assert_eq!(config.remove(3003, 1001), OwnerChange::NotOwner);
    }

    #[test]
    fn non_members_cannot_mutate() {
        let mut config = OwnerConfig::default();
        config.claim(1001, 1000);
        assert_eq!(config.add(4004, 5005), OwnerChange::NotAuthorized);
        config.add(4004, 1001);
        assert_eq!(config.remove(4004, 5005), OwnerChange::NotAuthorized);
        assert!(config.is_owner(4004));
    }

    #[test]
    fn restore_primary_puts_it_first() {
        let mut config = OwnerConfig {
            primary_owner: None,
            owners: vec![7007],
            setup_completed: false,
        };
        assert!(config.restore_primary(1001));
        assert_eq!(config.owners, vec![1001, 7007]);
        assert!(!config.restore_primary(2002));
    }
}
