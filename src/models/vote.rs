use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Likes,
    Dislikes,
}

// Vote request
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    #[serde(rename = "type")]
    pub kind: VoteKind,
}

// Vote response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub likes: i64,
    pub dislikes: i64,
    pub user_vote: Option<VoteKind>,
}

/// Vote counters of a post together with who voted what.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoteTally {
    pub likes: i64,
    pub dislikes: i64,
    pub users_voted: BTreeMap<String, VoteKind>,
}

impl VoteTally {
    fn counter(&mut self, kind: VoteKind) -> &mut i64 {
        match kind {
            VoteKind::Likes => &mut self.likes,
            VoteKind::Dislikes => &mut self.dislikes,
        }
    }

    /// Casting the same kind twice takes the vote back; casting the other
    /// kind moves it. Returns the user's vote afterwards.
    pub fn cast(&mut self, user_id: &str, kind: VoteKind) -> Option<VoteKind> {
        let previous = self.users_voted.remove(user_id);

        if let Some(previous) = previous {
            let counter = self.counter(previous);
            *counter = (*counter - 1).max(0);
        }

        if previous == Some(kind) {
            return None;
        }

        *self.counter(kind) += 1;
        self.users_voted.insert(user_id.to_string(), kind);
        Some(kind)
    }
}
