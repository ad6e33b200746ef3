use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One checkpoint row per crawl, replaced on every flush
        manager
            .create_table(
                Table::create()
                    .table(QueueCheckpoints::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QueueCheckpoints::CrawlId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(QueueCheckpoints::Payload).json().not_null())
                    .col(
                        ColumnDef::new(QueueCheckpoints::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QueueCheckpoints::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum QueueCheckpoints {
    Table,
    CrawlId,
    Payload,
    UpdatedAt,
}
