//! The learner's XP and level.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::grading::Verdict;

/// Progress shown in the page header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    /// Total experience points.
    pub xp: u32,
    /// Current level.
    pub level: u32,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self { xp: 0, level: 1 }
    }
}

impl UserProgress {
    /// Applies the server's delta from a verdict.
    ///
    /// The server is trusted: XP is added as sent and the level is replaced
    /// when the verdict carries one.
    pub fn apply(&mut self, verdict: &Verdict) {
        if verdict.xp_earned == 0 && verdict.new_level.is_none() {
            return;
        }
        self.xp = self.xp.saturating_add(verdict.xp_earned);
        if let Some(level) = verdict.new_level {
            self.level = level;
        }
        info!(
            xp = self.xp,
            level = self.level,
            earned = verdict.xp_earned,
            "Progress updated"
        );
    }
}
