use std::collections::BTreeMap;

use serde_json::Value;

use crate::task::Task;
use crate::tasks::{
    BundleCss, CopyStatic, GenerateFeed, GenerateItems, GenerateNavData, GeneratePages,
    GeneratePaginated, GenerateSitemap, PrepareOutput, SetGlobalFromMarkdown, SetGlobals,
    bundle_css, copy_static, generate_feed, generate_items, generate_nav_data, generate_pages,
    generate_paginated, generate_sitemap, prepare_output, set_global_from_markdown, set_globals,
};

type Factory = dyn Fn(String, Value) -> Box<dyn Task>;

/// Maps a task `kind` to a constructor taking the task name and its raw
/// configuration.
pub struct TaskRegistry {
    factories: BTreeMap<String, Box<Factory>>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TaskRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Every built-in task kind.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(prepare_output::KIND, |name, config| -> Box<dyn Task> {
            Box::new(PrepareOutput::new(config).named(name))
        });
        registry.register(copy_static::KIND, |name, config| -> Box<dyn Task> {
            Box::new(CopyStatic::new(config).named(name))
        });
        registry.register(bundle_css::KIND, |name, config| -> Box<dyn Task> {
            Box::new(BundleCss::new(config).named(name))
        });
        registry.register(set_globals::KIND, |name, config| -> Box<dyn Task> {
            Box::new(SetGlobals::new(config).named(name))
        });
        registry.register(set_global_from_markdown::KIND, |name, config| -> Box<dyn Task> {
            Box::new(SetGlobalFromMarkdown::new(config).named(name))
        });
        registry.register(generate_pages::KIND, |name, config| -> Box<dyn Task> {
            Box::new(GeneratePages::new(config).named(name))
        });
        registry.register(generate_items::KIND, |name, config| -> Box<dyn Task> {
            Box::new(GenerateItems::new(config).named(name))
        });
        registry.register(generate_paginated::KIND, |name, config| -> Box<dyn Task> {
            Box::new(GeneratePaginated::new(config).named(name))
        });
        registry.register(generate_feed::KIND, |name, config| -> Box<dyn Task> {
            Box::new(GenerateFeed::new(config).named(name))
        });
        registry.register(generate_sitemap::KIND, |name, config| -> Box<dyn Task> {
            Box::new(GenerateSitemap::new(config).named(name))
        });
        registry.register(generate_nav_data::KIND, |name, config| -> Box<dyn Task> {
            Box::new(GenerateNavData::new(config).named(name))
        });
        registry
    }

    /// Add or replace a kind.
    pub fn register<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn(String, Value) -> Box<dyn Task> + 'static,
    {
        self.factories.insert(kind.to_string(), Box::new(factory));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn create(&self, kind: &str, name: String, config: Value) -> Option<Box<dyn Task>> {
        self.factories.get(kind).map(|factory| factory(name, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::FnTask;
    use serde_json::json;

    #[test]
    fn builtin_kinds_are_registered() {
        let registry = TaskRegistry::builtin();
        assert_eq!(registry.kinds().count(), 11);
        let task = registry
            .create("generate-items", "posts".into(), json!({"itemsDir": "content"}))
            .unwrap();
        assert_eq!(task.name(), "posts");
        assert_eq!(task.title(), "Generate HTML items from content");
        assert!(registry.create("minify-js", "x".into(), Value::Null).is_none());
    }

    #[test]
    fn custom_kinds_can_be_added() {
        let mut registry = TaskRegistry::empty();
        registry.register("noop", |name, config| -> Box<dyn Task> {
            Box::new(FnTask::new(name, config, |_, _| Ok(Default::default())))
        });
        assert!(registry.contains("noop"));
        assert!(!registry.contains("generate-items"));
    }
}
