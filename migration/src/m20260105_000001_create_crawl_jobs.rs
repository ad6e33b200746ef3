use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create crawl_jobs table
        manager
            .create_table(
                Table::create()
                    .table(CrawlJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CrawlJobs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CrawlJobs::OwnerId).uuid())
                    .col(ColumnDef::new(CrawlJobs::SeedUrl).string().not_null())
                    .col(ColumnDef::new(CrawlJobs::BaseDomain).string().not_null())
                    .col(ColumnDef::new(CrawlJobs::Status).string().not_null())
                    .col(ColumnDef::new(CrawlJobs::Config).json().not_null())
                    .col(
                        ColumnDef::new(CrawlJobs::DiscoveredCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CrawlJobs::CrawledCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CrawlJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CrawlJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(CrawlJobs::LastCheckpointAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Create indexes
        manager
            .create_index(
                Index::create()
                    .name("idx_crawl_jobs_owner_status")
                    .table(CrawlJobs::Table)
                    .col(CrawlJobs::OwnerId)
                    .col(CrawlJobs::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_crawl_jobs_status")
                    .table(CrawlJobs::Table)
                    .col(CrawlJobs::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CrawlJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CrawlJobs {
    Table,
    Id,
    OwnerId,
    SeedUrl,
    BaseDomain,
    Status,
    Config,
    DiscoveredCount,
    CrawledCount,
    CreatedAt,
    UpdatedAt,
    LastCheckpointAt,
}
