use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::state::{ActivityId, User};
use crate::error::{AppError, AppResult};
use crate::utils::generate_discount_code;

/// 概率使用 basis points，100% = 10000
pub const FULL_PROBABILITY_BP: i32 = 10_000;

fn default_probability_bp() -> i32 {
    FULL_PROBABILITY_BP
}

/// 折扣码奖品
/// discount_code 为空时每次发放生成一个唯一码
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCodePrize {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_prefix: Option<String>,
    #[serde(default)]
    pub price_rule_id: i64,
    #[serde(default = "default_probability_bp")]
    pub probability_bp: i32,
    /// 库存上限 (None = 无限)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_num: Option<i64>,
}

/// 实物商品奖品
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPrize {
    pub sku: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_probability_bp")]
    pub probability_bp: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_num: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Prize {
    DiscountCode(DiscountCodePrize),
    ProductSku(ProductPrize),
}

impl Prize {
    pub fn prize_type(&self) -> &'static str {
        match self {
            Prize::DiscountCode(_) => "discount_code",
            Prize::ProductSku(_) => "product_sku",
        }
    }

    pub fn win_probability_bp(&self) -> i32 {
        match self {
            Prize::DiscountCode(p) => p.probability_bp,
            Prize::ProductSku(p) => p.probability_bp,
        }
    }

    pub fn total_num(&self) -> Option<i64> {
        match self {
            Prize::DiscountCode(p) => p.total_num,
            Prize::ProductSku(p) => p.total_num,
        }
    }

    /// 是否是限量奖品
    pub fn is_limited(&self) -> bool {
        self.total_num().is_some()
    }

    pub fn validate(&self) -> AppResult<()> {
        let bp = self.win_probability_bp();
        if !(0..=FULL_PROBABILITY_BP).contains(&bp) {
            return Err(AppError::InvalidConfig(format!(
                "probability_bp must be within 0..={FULL_PROBABILITY_BP}, got {bp}"
            )));
        }
        if let Some(total) = self.total_num()
            && total < 0
        {
            return Err(AppError::InvalidConfig(
                "total_num must not be negative".into(),
            ));
        }
        if let Prize::ProductSku(p) = self
            && p.sku.trim().is_empty()
        {
            return Err(AppError::InvalidConfig("product prize requires a sku".into()));
        }
        Ok(())
    }

    /// 按中奖概率抽一次
    pub fn draw(&self) -> bool {
        let bp = self.win_probability_bp();
        if bp >= FULL_PROBABILITY_BP {
            return true;
        }
        if bp <= 0 {
            return false;
        }
        rand::thread_rng().gen_range(0..FULL_PROBABILITY_BP) < bp
    }
}

/// 一次成功发放后交给用户的具体奖品
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PrizeGrant {
    pub prize_type: String,
    /// 折扣码或 SKU
    pub prize_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_rule_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// 扣减后剩余库存 (None = 无限)
    pub remain_num: Option<i64>,
}

/// 库存扣减结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockTake {
    Taken { remain: i64 },
    Empty,
    /// 存储层未记录上限，不参与扣减
    Unlimited,
}

/// 奖品库存的原子扣减能力
/// 同一奖品上的并发调用必须对 remain_num 线性一致
#[async_trait]
pub trait StockCounter: Send {
    async fn take_one(&mut self, activity_id: ActivityId, game_name: &str) -> AppResult<StockTake>;
}

/// 奖品分配器：库存扣减的唯一入口
pub struct PrizeAllocator<'a> {
    activity_id: ActivityId,
    game_name: &'a str,
    prize: Option<&'a Prize>,
}

impl<'a> PrizeAllocator<'a> {
    pub fn new(activity_id: ActivityId, game_name: &'a str, prize: Option<&'a Prize>) -> Self {
        Self {
            activity_id,
            game_name,
            prize,
        }
    }

    /// 发放一个单位的奖品
    /// - 未配置奖品 -> PrizeNotConfigured
    /// - 限量奖品库存为 0 -> StockEmpty，且不做任何修改
    pub async fn award<C>(&self, counter: &mut C, user: &User) -> AppResult<PrizeGrant>
    where
        C: StockCounter + ?Sized,
    {
        let prize = self
            .prize
            .ok_or_else(|| AppError::PrizeNotConfigured(self.game_name.to_string()))?;

        let remain_num = if prize.is_limited() {
            match counter.take_one(self.activity_id, self.game_name).await? {
                StockTake::Taken { remain } => Some(remain),
                StockTake::Empty => {
                    log::warn!(
                        "Prize stock exhausted: activity={} game={} user={}",
                        self.activity_id,
                        self.game_name,
                        user.uid
                    );
                    return Err(AppError::StockEmpty);
                }
                StockTake::Unlimited => None,
            }
        } else {
            None
        };

        let grant = match prize {
            Prize::DiscountCode(p) => PrizeGrant {
                prize_type: prize.prize_type().to_string(),
                prize_id: p
                    .discount_code
                    .clone()
                    .unwrap_or_else(|| generate_discount_code(p.code_prefix.as_deref())),
                price_rule_id: Some(p.price_rule_id),
                title: None,
                remain_num,
            },
            Prize::ProductSku(p) => PrizeGrant {
                prize_type: prize.prize_type().to_string(),
                prize_id: p.sku.clone(),
                price_rule_id: None,
                title: Some(p.title.clone()),
                remain_num,
            },
        };

        log::info!(
            "Prize awarded: activity={} game={} user={} type={} remain={:?}",
            self.activity_id,
            self.game_name,
            user.uid,
            grant.prize_type,
            grant.remain_num
        );
        Ok(grant)
    }
}
