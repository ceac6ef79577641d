//! Entity definitions held by the [`Store`](crate::store::Store).

mod achievement;
mod badge;
mod chore;
mod kid;
mod reward;

pub use achievement::{
    Achievement, AchievementKind, AchievementProgress, Challenge, ChallengeKind, ChallengeProgress,
};
pub use badge::{
    AwardManifest, Badge, BadgeProgressStatus, BadgeTarget, BadgeType, CumulativeBadgeProgress,
    CumulativeStatus, DayRule, KidBadgeProgress, ResetSchedule, TargetKind,
};
pub use chore::{
    ApprovalResetType, Chore, ChoreProgress, ChoreState, CompletionCriteria, OverdueHandling,
    PendingClaimAction,
};
pub use kid::{BadgeEarnRecord, Kid, KidRewardData};
pub use reward::{Bonus, Parent, Penalty, Reward};
