use super::models::{Profile, ProfileType};

/// Visibility scope for contract queries, derived from the calling profile.
/// Clients are matched against `client_id`, contractors against
/// `contractor_id`; there is no way to build an unscoped filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyFilter {
    Client(i64),
    Contractor(i64),
}

impl PartyFilter {
    pub fn for_profile(profile: &Profile) -> Self {
        match profile.kind {
            ProfileType::Client => PartyFilter::Client(profile.id),
            ProfileType::Contractor => PartyFilter::Contractor(profile.id),
        }
    }

    /// Contract column this party is matched against
    pub fn column(&self) -> &'static str {
        match self {
            PartyFilter::Client(_) => "client_id",
            PartyFilter::Contractor(_) => "contractor_id",
        }
    }

    pub fn profile_id(&self) -> i64 {
        match self {
            PartyFilter::Client(id) | PartyFilter::Contractor(id) => *id,
        }
    }
}
