use super::{Template, TemplateName, TemplateStore, TemplateStoreError};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::sync::Arc;

/// Templates stored in the `email_templates` table.
#[derive(Debug, Clone)]
pub struct PostgresTemplateStore {
    pool: Arc<PgPool>,
}

impl PostgresTemplateStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateStore for PostgresTemplateStore {
    #[tracing::instrument(name = "Get email template", skip(self))]
    async fn get(&self, name: TemplateName) -> Result<Option<Template>, TemplateStoreError> {
        let row = sqlx::query(
            r#"SELECT subject, body, from_override, reply_to_override
            FROM email_templates WHERE name = $1"#,
        )
        .bind(name.as_ref())
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(TemplateStoreError::Database)?;

        row.map(|row| -> Result<Template, sqlx::Error> {
            Ok(Template {
                subject: row.try_get("subject")?,
                body: row.try_get("body")?,
                from_override: row.try_get("from_override")?,
                reply_to_override: row.try_get("reply_to_override")?,
            })
        })
        .transpose()
        .map_err(TemplateStoreError::Database)
    }

    #[tracing::instrument(name = "Store email template", skip(self, template))]
    async fn put(&self, name: TemplateName, template: &Template) -> Result<(), TemplateStoreError> {
        sqlx::query(
            r#"INSERT INTO email_templates (name, subject, body, from_override, reply_to_override)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO UPDATE
            SET subject = EXCLUDED.subject,
                body = EXCLUDED.body,
                from_override = EXCLUDED.from_override,
                reply_to_override = EXCLUDED.reply_to_override,
                updated_at = now()"#,
        )
        .bind(name.as_ref())
        .bind(&template.subject)
        .bind(&template.body)
        .bind(template.from_override.as_deref())
        .bind(template.reply_to_override.as_deref())
        .execute(self.pool.as_ref())
        .await
        .map_err(TemplateStoreError::Database)?;

        Ok(())
    }
}
