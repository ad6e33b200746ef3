use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create url_records table
        manager
            .create_table(
                Table::create()
                    .table(UrlRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UrlRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UrlRecords::CrawlId).uuid().not_null())
                    .col(ColumnDef::new(UrlRecords::Url).string().not_null())
                    .col(ColumnDef::new(UrlRecords::StatusCode).integer())
                    .col(ColumnDef::new(UrlRecords::Title).string())
                    .col(ColumnDef::new(UrlRecords::ContentType).string())
                    .col(
                        ColumnDef::new(UrlRecords::Depth)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(UrlRecords::ResponseTimeMs).big_integer())
                    .to_owned(),
            )
            .await?;

        // Create link_records table
        manager
            .create_table(
                Table::create()
                    .table(LinkRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LinkRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LinkRecords::CrawlId).uuid().not_null())
                    .col(ColumnDef::new(LinkRecords::SourceUrl).string().not_null())
                    .col(ColumnDef::new(LinkRecords::TargetUrl).string().not_null())
                    .col(ColumnDef::new(LinkRecords::AnchorText).string())
                    .col(
                        ColumnDef::new(LinkRecords::IsInternal)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        // Create issue_records table
        manager
            .create_table(
                Table::create()
                    .table(IssueRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(IssueRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(IssueRecords::CrawlId).uuid().not_null())
                    .col(ColumnDef::new(IssueRecords::Url).string().not_null())
                    .col(ColumnDef::new(IssueRecords::Category).string().not_null())
                    .col(ColumnDef::new(IssueRecords::Severity).string().not_null())
                    .col(ColumnDef::new(IssueRecords::Message).string().not_null())
                    .to_owned(),
            )
            .await?;

        // Per-crawl lookup indexes
        manager
            .create_index(
                Index::create()
                    .name("idx_url_records_crawl")
                    .table(UrlRecords::Table)
                    .col(UrlRecords::CrawlId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_link_records_crawl")
                    .table(LinkRecords::Table)
                    .col(LinkRecords::CrawlId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_issue_records_crawl")
                    .table(IssueRecords::Table)
                    .col(IssueRecords::CrawlId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UrlRecords::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LinkRecords::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(IssueRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UrlRecords {
    Table,
    Id,
    CrawlId,
    Url,
    StatusCode,
    Title,
    ContentType,
    Depth,
    ResponseTimeMs,
}

#[derive(DeriveIden)]
enum LinkRecords {
    Table,
    Id,
    CrawlId,
    SourceUrl,
    TargetUrl,
    AnchorText,
    IsInternal,
}

#[derive(DeriveIden)]
enum IssueRecords {
    Table,
    Id,
    CrawlId,
    Url,
    Category,
    Severity,
    Message,
}
