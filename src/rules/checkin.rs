use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::game::{GameAction, GameRule, Play, PlayDetail, PlayEnv};
use super::prize::Prize;
use super::state::{GameState, UserProgress, UserState};
use crate::error::{AppError, AppResult};

pub const GAME_TYPE: &str = "checkin";

fn default_true() -> bool {
    true
}

/// 签到玩法配置
/// - required_days: 需要签到的天数
/// - one_per_day: 同一自然日 (UTC) 只计一次签到
/// - reset_on_gap: 中断一天后连续天数从 1 重新开始
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinConfig {
    #[serde(default)]
    pub state: GameState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prize: Option<Prize>,
    pub required_days: i64,
    #[serde(default = "default_true")]
    pub one_per_day: bool,
    #[serde(default)]
    pub reset_on_gap: bool,
}

/// 签到玩法：累计签到达到天数后发放奖励
#[derive(Debug, Clone, PartialEq)]
pub struct CheckinGame {
    name: String,
    config: CheckinConfig,
}

impl CheckinGame {
    pub fn new(name: impl Into<String>, config: CheckinConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    pub fn from_value(name: &str, raw: &serde_json::Value) -> AppResult<Self> {
        let config: CheckinConfig = serde_json::from_value(raw.clone()).map_err(|e| {
            AppError::InvalidConfig(format!("game {name}: invalid checkin config: {e}"))
        })?;
        Ok(Self::new(name, config))
    }

    pub fn required_days(&self) -> i64 {
        self.config.required_days
    }
}

#[async_trait]
impl GameRule for CheckinGame {
    fn name(&self) -> &str {
        &self.name
    }

    fn game_type(&self) -> &'static str {
        GAME_TYPE
    }

    fn configured_state(&self) -> GameState {
        self.config.state
    }

    fn prize(&self) -> Option<&Prize> {
        self.config.prize.as_ref()
    }

    fn validate_config(&self) -> AppResult<()> {
        if self.config.required_days <= 0 {
            return Err(AppError::InvalidConfig(format!(
                "game {}: required_days must be greater than 0",
                self.name
            )));
        }
        match &self.config.prize {
            None => Err(AppError::InvalidConfig(format!(
                "game {}: prize is not configured",
                self.name
            ))),
            Some(prize) => prize.validate(),
        }
    }

    fn user_state(&self, progress: &UserProgress) -> UserState {
        if progress.streak >= self.config.required_days {
            UserState::Closed
        } else {
            progress.state
        }
    }

    /// 签到日以引擎时钟为准；客户端传入的 checkin_at 只能是当天且在活动时间窗内
    fn play(&self, env: &PlayEnv, progress: &UserProgress, action: &GameAction) -> AppResult<Play> {
        let day = env.now.date_naive();
        if let Some(at) = action.checkin_at {
            if at > env.now || at.date_naive() != day {
                return Err(AppError::ValidationError(
                    "checkin_at must be within the current day".into(),
                ));
            }
            if at < env.start_at || at >= env.end_at {
                return Err(AppError::ValidationError(
                    "checkin_at is outside the activity window".into(),
                ));
            }
        }

        if let Some(last) = progress.last_checkin_on {
            if day < last {
                return Err(AppError::ValidationError(
                    "check-in day precedes the last check-in".into(),
                ));
            }
            if self.config.one_per_day && day == last {
                return Err(AppError::AlreadyCheckedIn(day));
            }
        }

        let consecutive = progress
            .last_checkin_on
            .and_then(|last| last.succ_opt())
            .is_some_and(|next| next == day);
        let streak = if self.config.reset_on_gap && progress.last_checkin_on.is_some() && !consecutive
        {
            1
        } else {
            progress.streak + 1
        };

        let qualifies = streak >= self.config.required_days;
        Ok(Play {
            target: GAME_TYPE.to_string(),
            next: UserProgress {
                state: if qualifies {
                    UserState::Closed
                } else {
                    UserState::Open
                },
                streak,
                last_checkin_on: Some(day),
                version: progress.version,
            },
            qualifies,
            detail: PlayDetail::Checkin {
                checkin_days: streak,
                required_days: self.config.required_days,
            },
        })
    }

    fn config_value(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn game(one_per_day: bool, reset_on_gap: bool) -> CheckinGame {
        CheckinGame::new(
            "streak",
            CheckinConfig {
                state: GameState::Open,
                prize: serde_json::from_value(
                    serde_json::json!({ "kind": "product_sku", "sku": "SKU-1" }),
                )
                .ok(),
                required_days: 3,
                one_per_day,
                reset_on_gap,
            },
        )
    }

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap() + Duration::days(n)
    }

    fn env_at(now: DateTime<Utc>) -> PlayEnv {
        PlayEnv {
            now,
            start_at: day(0) - Duration::hours(1),
            end_at: day(30),
        }
    }

    // 引擎时钟位于 now，客户端不传 checkin_at
    fn checkin(game: &CheckinGame, progress: &UserProgress, now: DateTime<Utc>) -> AppResult<Play> {
        game.play(&env_at(now), progress, &GameAction::default())
    }

    #[test]
    fn test_streak_qualifies_on_required_day() {
        let game = game(true, false);
        let mut progress = UserProgress::default();
        for n in 0..3 {
            let play = checkin(&game, &progress, day(n)).unwrap();
            assert_eq!(play.qualifies, n == 2);
            progress = play.next;
        }
        assert_eq!(progress.streak, 3);
        assert_eq!(progress.state, UserState::Closed);
        assert_eq!(game.user_state(&progress), UserState::Closed);
    }

    #[test]
    fn test_same_day_checkin_is_rejected_when_deduplicated() {
        let game = game(true, false);
        let first = checkin(&game, &UserProgress::default(), day(0)).unwrap();
        let err = checkin(&game, &first.next, day(0) + Duration::hours(3)).unwrap_err();
        assert!(matches!(err, AppError::AlreadyCheckedIn(_)));
    }

    #[test]
    fn test_same_day_checkin_counts_without_dedup() {
        let game = game(false, false);
        let first = checkin(&game, &UserProgress::default(), day(0)).unwrap();
        let second = checkin(&game, &first.next, day(0)).unwrap();
        assert_eq!(second.next.streak, 2);
        assert_eq!(second.next.state, UserState::Open);
    }

    #[test]
    fn test_gap_resets_streak_only_when_configured() {
        let strict = game(true, true);
        let first = checkin(&strict, &UserProgress::default(), day(0)).unwrap();
        let after_gap = checkin(&strict, &first.next, day(2)).unwrap();
        assert_eq!(after_gap.next.streak, 1);

        let lenient = game(true, false);
        let first = checkin(&lenient, &UserProgress::default(), day(0)).unwrap();
        let after_gap = checkin(&lenient, &first.next, day(2)).unwrap();
        assert_eq!(after_gap.next.streak, 2);
    }

    #[test]
    fn test_backdated_checkins_are_not_credited() {
        let game = game(true, false);
        let now = day(10);
        for n in [3, 2, 1] {
            let err = game
                .play(
                    &env_at(now),
                    &UserProgress::default(),
                    &GameAction::checkin(now - Duration::days(n)),
                )
                .unwrap_err();
            assert!(matches!(err, AppError::ValidationError(_)));
        }

        let play = game
            .play(
                &env_at(now),
                &UserProgress::default(),
                &GameAction::checkin(now - Duration::hours(2)),
            )
            .unwrap();
        assert_eq!(play.next.last_checkin_on, Some(now.date_naive()));
    }

    #[test]
    fn test_future_checkin_is_rejected() {
        let game = game(true, false);
        let err = game
            .play(
                &env_at(day(5)),
                &UserProgress::default(),
                &GameAction::checkin(day(5) + Duration::minutes(1)),
            )
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_checkin_before_activity_start_is_rejected() {
        let game = game(true, false);
        let now = day(0);
        let err = game
            .play(
                &env_at(now),
                &UserProgress::default(),
                &GameAction::checkin(now - Duration::hours(2)),
            )
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_validate_required_days_and_prize() {
        let raw = serde_json::json!({ "required_days": 0, "prize": { "kind": "product_sku", "sku": "S" } });
        let game = CheckinGame::from_value("c", &raw).unwrap();
        assert!(game.validate_config().is_err());

        let raw = serde_json::json!({ "required_days": 2 });
        let game = CheckinGame::from_value("c", &raw).unwrap();
        assert!(game.validate_config().is_err());

        assert!(self::game(true, false).validate_config().is_ok());
    }
}
