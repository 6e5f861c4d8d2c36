use super::{Template, TemplateName, TemplateStore, TemplateStoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryTemplateStore {
    templates: RwLock<HashMap<TemplateName, Template>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn get(&self, name: TemplateName) -> Result<Option<Template>, TemplateStoreError> {
        Ok(self.templates.read().await.get(&name).cloned())
    }

    async fn put(&self, name: TemplateName, template: &Template) -> Result<(), TemplateStoreError> {
        self.templates.write().await.insert(name, template.clone());
        Ok(())
    }
}
