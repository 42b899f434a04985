use std::collections::{HashMap, HashSet};

use super::activity::{ActivityConfig, ActivityDefinition};
use super::game::Game;
use super::{checkin, community_post};
use crate::error::{AppError, AppResult};

/// 从配置构建一个玩法
pub type GameBuilder = fn(&str, &serde_json::Value) -> AppResult<Game>;

fn build_post_game(name: &str, raw: &serde_json::Value) -> AppResult<Game> {
    community_post::CommunityPostGame::from_value(name, raw).map(Game::CommunityPost)
}

fn build_checkin_game(name: &str, raw: &serde_json::Value) -> AppResult<Game> {
    checkin::CheckinGame::from_value(name, raw).map(Game::CheckinStreak)
}

/// 活动类别与玩法类型的注册表
/// 启动时构建一次，之后只读共享
#[derive(Debug, Clone, Default)]
pub struct ActivityRegistry {
    builders: HashMap<String, GameBuilder>,
    categories: HashMap<String, HashSet<String>>,
}

impl ActivityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// community: post + checkin, checkin: checkin
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry
            .register_game(community_post::GAME_TYPE, build_post_game)
            .register_game(checkin::GAME_TYPE, build_checkin_game)
            .register_category(
                "community",
                &[community_post::GAME_TYPE, checkin::GAME_TYPE],
            )
            .register_category("checkin", &[checkin::GAME_TYPE]);
        registry
    }

    pub fn register_game(&mut self, game_type: &str, builder: GameBuilder) -> &mut Self {
        self.builders.insert(game_type.to_string(), builder);
        self
    }

    pub fn register_category(&mut self, category: &str, game_types: &[&str]) -> &mut Self {
        self.categories.insert(
            category.to_string(),
            game_types.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// 构建并校验活动定义，任何一处不合法则整体失败
    pub fn build(&self, config: &ActivityConfig) -> AppResult<ActivityDefinition> {
        let allowed = self.categories.get(&config.category).ok_or_else(|| {
            AppError::InvalidConfig(format!("unknown activity category: {}", config.category))
        })?;

        if config.start_at >= config.end_at {
            return Err(AppError::InvalidConfig(
                "start_at must be earlier than end_at".into(),
            ));
        }

        if config.games.is_empty() {
            return Err(AppError::InvalidConfig(
                "activity must define at least one game".into(),
            ));
        }

        let mut seen = HashSet::new();
        let mut games = Vec::with_capacity(config.games.len());
        for gc in &config.games {
            let name = gc.name.trim();
            if name.is_empty() {
                return Err(AppError::InvalidConfig("game name must not be empty".into()));
            }
            if !seen.insert(name) {
                return Err(AppError::InvalidConfig(format!(
                    "duplicate game name: {name}"
                )));
            }
            if !allowed.contains(&gc.game_type) {
                return Err(AppError::InvalidConfig(format!(
                    "game type {} is not allowed in category {}",
                    gc.game_type, config.category
                )));
            }
            let builder = self.builders.get(&gc.game_type).ok_or_else(|| {
                AppError::InvalidConfig(format!("unknown game type: {}", gc.game_type))
            })?;

            let game = builder(name, &gc.config)?;
            game.validate_config()?;
            games.push(game);
        }

        Ok(ActivityDefinition {
            category: config.category.clone(),
            version: config.version.clone(),
            name: config.name.clone(),
            start_at: config.start_at,
            end_at: config.end_at,
            games,
        })
    }

    pub fn parse_value(&self, raw: &serde_json::Value) -> AppResult<ActivityDefinition> {
        self.build(&ActivityConfig::from_value(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(category: &str, games: serde_json::Value) -> serde_json::Value {
        json!({
            "category": category,
            "version": "v1",
            "start_at": 1_700_000_000,
            "end_at": 1_700_600_000,
            "games": games
        })
    }

    fn post(name: &str) -> serde_json::Value {
        json!({ "type": "post", "name": name, "config": {
            "prize": { "kind": "discount_code", "discount_code": "C", "total_num": 1 } } })
    }

    fn assert_invalid(raw: serde_json::Value) {
        let result = ActivityRegistry::standard().parse_value(&raw);
        assert!(
            matches!(result, Err(AppError::InvalidConfig(_))),
            "expected InvalidConfig, got {result:?}"
        );
    }

    #[test]
    fn test_standard_registry_builds_community_activity() {
        let def = ActivityRegistry::standard()
            .parse_value(&doc("community", json!([post("a"), post("b")])))
            .unwrap();
        assert_eq!(def.games.len(), 2);
        assert_eq!(def.games[1].name(), "b");
    }

    #[test]
    fn test_rejects_unknown_category_and_disallowed_type() {
        assert_invalid(doc("lottery", json!([post("a")])));
        assert_invalid(doc("checkin", json!([post("a")])));
    }

    #[test]
    fn test_rejects_duplicate_or_empty_names() {
        assert_invalid(doc("community", json!([post("a"), post("a")])));
        assert_invalid(doc("community", json!([post(" ")])));
    }

    #[test]
    fn test_rejects_activity_without_games() {
        assert_invalid(doc("community", json!([])));
        assert_invalid(doc("checkin", json!([])));
    }

    #[test]
    fn test_rejects_inverted_window() {
        let mut raw = doc("community", json!([post("a")]));
        raw["end_at"] = raw["start_at"].clone();
        assert_invalid(raw);
    }

    #[test]
    fn test_one_invalid_game_fails_whole_activity() {
        let bad = json!({ "type": "checkin", "name": "c", "config": {
            "required_days": 0,
            "prize": { "kind": "product_sku", "sku": "S" } } });
        assert_invalid(doc("community", json!([post("a"), bad])));

        let no_prize = json!({ "type": "post", "name": "p", "config": {} });
        assert_invalid(doc("community", json!([no_prize])));

        assert_invalid(json!({ "category": "community" }));
    }

    #[test]
    fn test_custom_registry_is_independent() {
        let mut registry = ActivityRegistry::new();
        registry
            .register_game("post", build_post_game)
            .register_category("posts_only", &["post"]);
        assert!(registry.parse_value(&doc("posts_only", json!([post("a")]))).is_ok());
        assert!(registry.parse_value(&doc("community", json!([post("a")]))).is_err());
        assert_eq!(registry.categories().count(), 1);
    }
}
