use sea_orm_migration::prelude::*;

/// 活动表（软删除）
#[derive(DeriveIden)]
enum Activities {
    Table,
    Id,
    Category,
    Version,
    Name,
    Config,
    StartAt,
    EndAt,
    Status,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

/// 活动玩法表：运营状态 + 奖品库存
#[derive(DeriveIden)]
enum ActivityGames {
    Table,
    Id,
    ActivityId,
    GameName,
    GameType,
    State,
    TotalNum,
    RemainNum,
    UpdatedAt,
}

/// 用户在玩法下的进度
#[derive(DeriveIden)]
enum UserGameStates {
    Table,
    Id,
    ActivityId,
    GameName,
    UserId,
    State,
    Streak,
    LastCheckinOn,
    Version,
    UpdatedAt,
}

/// 参与记录
#[derive(DeriveIden)]
enum ActivityParticipations {
    Table,
    Id,
    ActivityId,
    UserId,
    GameName,
    GameTarget,
    State,
    Award,
    Extra,
    CreatedAt,
}

/// 奖品发放记录
#[derive(DeriveIden)]
enum PrizeRecords {
    Table,
    Id,
    ActivityId,
    UserId,
    GameName,
    PrizeType,
    PrizeId,
    Status,
    Extra,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

fn id_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .big_integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn timestamp_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::cust("NOW()"))
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Activities::Table)
                    .if_not_exists()
                    .col(&mut id_col(Activities::Id))
                    .col(ColumnDef::new(Activities::Category).string_len(64).not_null())
                    .col(ColumnDef::new(Activities::Version).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Activities::Name)
                            .string_len(255)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Activities::Config).json_binary().not_null())
                    .col(
                        ColumnDef::new(Activities::StartAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Activities::EndAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Activities::Status)
                            .string_len(16)
                            .not_null()
                            .default("draft"),
                    )
                    .col(&mut timestamp_col(Activities::CreatedAt))
                    .col(&mut timestamp_col(Activities::UpdatedAt))
                    .col(
                        ColumnDef::new(Activities::DeletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .check(Expr::col(Activities::StartAt).lt(Expr::col(Activities::EndAt)))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ActivityGames::Table)
                    .if_not_exists()
                    .col(&mut id_col(ActivityGames::Id))
                    .col(
                        ColumnDef::new(ActivityGames::ActivityId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ActivityGames::GameName).string_len(128).not_null())
                    .col(ColumnDef::new(ActivityGames::GameType).string_len(32).not_null())
                    .col(
                        ColumnDef::new(ActivityGames::State)
                            .string_len(16)
                            .not_null()
                            .default("open"),
                    )
                    .col(ColumnDef::new(ActivityGames::TotalNum).big_integer().null())
                    .col(ColumnDef::new(ActivityGames::RemainNum).big_integer().null())
                    .col(&mut timestamp_col(ActivityGames::UpdatedAt))
                    // 0 <= remain_num <= total_num
                    .check(
                        Expr::col(ActivityGames::RemainNum)
                            .is_null()
                            .or(Expr::col(ActivityGames::RemainNum)
                                .gte(0)
                                .and(
                                    Expr::col(ActivityGames::RemainNum)
                                        .lte(Expr::col(ActivityGames::TotalNum)),
                                )),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activity_games_activity")
                            .from(ActivityGames::Table, ActivityGames::ActivityId)
                            .to(Activities::Table, Activities::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_activity_games_activity_name_unique")
                    .table(ActivityGames::Table)
                    .col(ActivityGames::ActivityId)
                    .col(ActivityGames::GameName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserGameStates::Table)
                    .if_not_exists()
                    .col(&mut id_col(UserGameStates::Id))
                    .col(
                        ColumnDef::new(UserGameStates::ActivityId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(UserGameStates::GameName).string_len(128).not_null())
                    .col(ColumnDef::new(UserGameStates::UserId).string_len(128).not_null())
                    .col(ColumnDef::new(UserGameStates::State).string_len(16).not_null())
                    .col(
                        ColumnDef::new(UserGameStates::Streak)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(UserGameStates::LastCheckinOn).date().null())
                    .col(
                        ColumnDef::new(UserGameStates::Version)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(&mut timestamp_col(UserGameStates::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // compare-and-set 依赖该唯一约束
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_user_game_states_unique")
                    .table(UserGameStates::Table)
                    .col(UserGameStates::ActivityId)
                    .col(UserGameStates::GameName)
                    .col(UserGameStates::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ActivityParticipations::Table)
                    .if_not_exists()
                    .col(&mut id_col(ActivityParticipations::Id))
                    .col(
                        ColumnDef::new(ActivityParticipations::ActivityId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActivityParticipations::UserId)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActivityParticipations::GameName)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActivityParticipations::GameTarget)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActivityParticipations::State)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActivityParticipations::Award)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ActivityParticipations::Extra).json_binary().not_null())
                    .col(&mut timestamp_col(ActivityParticipations::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activity_participations_activity")
                            .from(
                                ActivityParticipations::Table,
                                ActivityParticipations::ActivityId,
                            )
                            .to(Activities::Table, Activities::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_activity_participations_user")
                    .table(ActivityParticipations::Table)
                    .col(ActivityParticipations::ActivityId)
                    .col(ActivityParticipations::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PrizeRecords::Table)
                    .if_not_exists()
                    .col(&mut id_col(PrizeRecords::Id))
                    .col(ColumnDef::new(PrizeRecords::ActivityId).big_integer().not_null())
                    .col(ColumnDef::new(PrizeRecords::UserId).string_len(128).not_null())
                    .col(ColumnDef::new(PrizeRecords::GameName).string_len(128).not_null())
                    .col(ColumnDef::new(PrizeRecords::PrizeType).string_len(32).not_null())
                    .col(ColumnDef::new(PrizeRecords::PrizeId).string_len(255).not_null())
                    .col(
                        ColumnDef::new(PrizeRecords::Status)
                            .string_len(16)
                            .not_null()
                            .default("granted"),
                    )
                    .col(ColumnDef::new(PrizeRecords::Extra).json_binary().not_null())
                    .col(&mut timestamp_col(PrizeRecords::CreatedAt))
                    .col(&mut timestamp_col(PrizeRecords::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_prize_records_activity")
                            .from(PrizeRecords::Table, PrizeRecords::ActivityId)
                            .to(Activities::Table, Activities::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_prize_records_user_game")
                    .table(PrizeRecords::Table)
                    .col(PrizeRecords::ActivityId)
                    .col(PrizeRecords::GameName)
                    .col(PrizeRecords::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PrizeRecords::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ActivityParticipations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserGameStates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ActivityGames::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Activities::Table).to_owned())
            .await?;
        Ok(())
    }
}
