// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::crawl_job::{CrawlJob, CrawlJobStatus};
use crate::domain::models::records::{
    IssueRecord, IssueSeverity, LinkRecord, QueueCheckpoint, UrlRecord,
};
use crate::domain::repositories::checkpoint_repository::{
    CheckpointRepository, JobFilter, RepositoryError,
};
use crate::infrastructure::database::entities::{
    crawl_job as job_entity, issue_record as issue_entity, link_record as link_entity,
    queue_checkpoint as checkpoint_entity, url_record as url_entity,
};
use async_trait::async_trait;
use sea_orm::{sea_query::Expr, *};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// 检查点存储实现
pub struct CheckpointRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl CheckpointRepositoryImpl {
    /// 创建新的检查点存储实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn to_domain(m: job_entity::Model) -> Result<CrawlJob, RepositoryError> {
        let status = CrawlJobStatus::from_str(&m.status).map_err(|_| {
            RepositoryError::Database(DbErr::Custom("Invalid crawl job status".to_string()))
        })?;

        Ok(CrawlJob {
            id: m.id,
            owner_id: m.owner_id,
            seed_url: m.seed_url,
            base_domain: m.base_domain,
            status,
            config: m.config,
            discovered_count: m.discovered_count,
            crawled_count: m.crawled_count,
            created_at: m.created_at.into(),
            updated_at: m.updated_at.into(),
            last_checkpoint_at: m.last_checkpoint_at.map(Into::into),
        })
    }
}

#[async_trait]
impl CheckpointRepository for CheckpointRepositoryImpl {
    async fn write_job(&self, job: &CrawlJob) -> Result<CrawlJob, RepositoryError> {
        let existing = job_entity::Entity::find_by_id(job.id)
            .one(self.db.as_ref())
            .await?;

        let model = job_entity::ActiveModel {
            id: Set(job.id),
            owner_id: Set(job.owner_id),
            seed_url: Set(job.seed_url.clone()),
            base_domain: Set(job.base_domain.clone()),
            status: Set(job.status.to_string()),
            config: Set(job.config.clone()),
            discovered_count: Set(job.discovered_count),
            crawled_count: Set(job.crawled_count),
            created_at: Set(job.created_at.into()),
            updated_at: Set(job.updated_at.into()),
            last_checkpoint_at: Set(job.last_checkpoint_at.map(Into::into)),
        };

        if existing.is_some() {
            model.update(self.db.as_ref()).await?;
        } else {
            model.insert(self.db.as_ref()).await?;
        }
        Ok(job.clone())
    }

    async fn read_job(&self, id: Uuid) -> Result<Option<CrawlJob>, RepositoryError> {
        let model = job_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        model.map(Self::to_domain).transpose()
    }

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<CrawlJob>, RepositoryError> {
        let mut query = job_entity::Entity::find();

        if let Some(owner_id) = filter.owner_id {
            query = query.filter(job_entity::Column::OwnerId.eq(owner_id));
        }

        if let Some(statuses) = filter.statuses {
            let values: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
            query = query.filter(job_entity::Column::Status.is_in(values));
        }

        query = query.order_by_desc(job_entity::Column::CreatedAt);

        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = filter.offset {
            query = query.offset(offset);
        }

        let models = query.all(self.db.as_ref()).await?;
        models.into_iter().map(Self::to_domain).collect()
    }

    async fn set_status(&self, id: Uuid, status: CrawlJobStatus) -> Result<(), RepositoryError> {
        let model = job_entity::ActiveModel {
            id: Set(id),
            status: Set(status.to_string()),
            updated_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        };

        model.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn replace_urls(&self, id: Uuid, urls: &[UrlRecord]) -> Result<(), RepositoryError> {
        url_entity::Entity::delete_many()
            .filter(url_entity::Column::CrawlId.eq(id))
            .exec(self.db.as_ref())
            .await?;

        if urls.is_empty() {
            return Ok(());
        }

        let models = urls.iter().map(|u| url_entity::ActiveModel {
            id: Set(Uuid::new_v4()),
            crawl_id: Set(id),
            url: Set(u.url.clone()),
            status_code: Set(u.status_code),
            title: Set(u.title.clone()),
            content_type: Set(u.content_type.clone()),
            depth: Set(u.depth),
            response_time_ms: Set(u.response_time_ms),
        });

        url_entity::Entity::insert_many(models)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn read_urls(&self, id: Uuid) -> Result<Vec<UrlRecord>, RepositoryError> {
        let models = url_entity::Entity::find()
            .filter(url_entity::Column::CrawlId.eq(id))
            .all(self.db.as_ref())
            .await?;

        Ok(models
            .into_iter()
            .map(|m| UrlRecord {
                url: m.url,
                status_code: m.status_code,
                title: m.title,
                content_type: m.content_type,
                depth: m.depth,
                response_time_ms: m.response_time_ms,
            })
            .collect())
    }

    async fn replace_links(&self, id: Uuid, links: &[LinkRecord]) -> Result<(), RepositoryError> {
        link_entity::Entity::delete_many()
            .filter(link_entity::Column::CrawlId.eq(id))
            .exec(self.db.as_ref())
            .await?;

        if links.is_empty() {
            return Ok(());
        }

        let models = links.iter().map(|l| link_entity::ActiveModel {
            id: Set(Uuid::new_v4()),
            crawl_id: Set(id),
            source_url: Set(l.source_url.clone()),
            target_url: Set(l.target_url.clone()),
            anchor_text: Set(l.anchor_text.clone()),
            is_internal: Set(l.is_internal),
        });

        link_entity::Entity::insert_many(models)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn read_links(&self, id: Uuid) -> Result<Vec<LinkRecord>, RepositoryError> {
        let models = link_entity::Entity::find()
            .filter(link_entity::Column::CrawlId.eq(id))
            .all(self.db.as_ref())
            .await?;

        Ok(models
            .into_iter()
            .map(|m| LinkRecord {
                source_url: m.source_url,
                target_url: m.target_url,
                anchor_text: m.anchor_text,
                is_internal: m.is_internal,
            })
            .collect())
    }

    async fn replace_issues(
        &self,
        id: Uuid,
        issues: &[IssueRecord],
    ) -> Result<(), RepositoryError> {
        issue_entity::Entity::delete_many()
            .filter(issue_entity::Column::CrawlId.eq(id))
            .exec(self.db.as_ref())
            .await?;

        if issues.is_empty() {
            return Ok(());
        }

        let models = issues.iter().map(|i| issue_entity::ActiveModel {
            id: Set(Uuid::new_v4()),
            crawl_id: Set(id),
            url: Set(i.url.clone()),
            category: Set(i.category.clone()),
            severity: Set(i.severity.to_string()),
            message: Set(i.message.clone()),
        });

        issue_entity::Entity::insert_many(models)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn read_issues(&self, id: Uuid) -> Result<Vec<IssueRecord>, RepositoryError> {
        let models = issue_entity::Entity::find()
            .filter(issue_entity::Column::CrawlId.eq(id))
            .all(self.db.as_ref())
            .await?;

        models
            .into_iter()
            .map(|m| {
                let severity = IssueSeverity::from_str(&m.severity).map_err(|_| {
                    RepositoryError::Database(DbErr::Custom(
                        "Invalid issue severity".to_string(),
                    ))
                })?;
                Ok(IssueRecord {
                    url: m.url,
                    category: m.category,
                    severity,
                    message: m.message,
                })
            })
            .collect()
    }

    async fn write_queue_checkpoint(
        &self,
        id: Uuid,
        payload: serde_json::Value,
    ) -> Result<(), RepositoryError> {
        // One row per crawl: replace on every flush
        checkpoint_entity::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;

        let model = checkpoint_entity::ActiveModel {
            crawl_id: Set(id),
            payload: Set(payload),
            updated_at: Set(chrono::Utc::now().into()),
        };
        model.insert(self.db.as_ref()).await?;
        Ok(())
    }

    async fn read_queue_checkpoint(
        &self,
        id: Uuid,
    ) -> Result<Option<QueueCheckpoint>, RepositoryError> {
        let model = checkpoint_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(|m| QueueCheckpoint {
            payload: m.payload,
            updated_at: m.updated_at.into(),
        }))
    }

    async fn delete_job(&self, id: Uuid) -> Result<(), RepositoryError> {
        url_entity::Entity::delete_many()
            .filter(url_entity::Column::CrawlId.eq(id))
            .exec(self.db.as_ref())
            .await?;
        link_entity::Entity::delete_many()
            .filter(link_entity::Column::CrawlId.eq(id))
            .exec(self.db.as_ref())
            .await?;
        issue_entity::Entity::delete_many()
            .filter(issue_entity::Column::CrawlId.eq(id))
            .exec(self.db.as_ref())
            .await?;
        checkpoint_entity::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;

        let result = job_entity::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn fail_interrupted_jobs(&self) -> Result<u64, RepositoryError> {
        let result = job_entity::Entity::update_many()
            .col_expr(
                job_entity::Column::Status,
                Expr::value(CrawlJobStatus::Failed.to_string()),
            )
            .col_expr(
                job_entity::Column::UpdatedAt,
                Expr::value(chrono::Utc::now()),
            )
            .filter(job_entity::Column::Status.eq(CrawlJobStatus::Running.to_string()))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[path = "checkpoint_repo_impl_test.rs"]
mod tests;
