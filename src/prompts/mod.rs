// src/prompts/mod.rs
// Prompt-file service: resolves `active_{condense,chat,system}_prompt`
// names to file contents (spec.md §7's `PromptNotFoundError`, supplemented
// from original_source/src/utils/prompt_service.py — not given a home
// module by the distilled spec).
//
// Directory layout mirrors the original: `<prompts_path>/{condense,chat,system}/<name>.prompt`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{info, warn};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptType {
    Condense,
    Chat,
    System,
}

impl PromptType {
    fn dir_name(self) -> &'static str {
        match self {
            PromptType::Condense => "condense",
            PromptType::Chat => "chat",
            PromptType::System => "system",
        }
    }

    const ALL: [PromptType; 3] = [PromptType::Condense, PromptType::Chat, PromptType::System];
}

type PromptCache = HashMap<PromptType, HashMap<String, String>>;

pub struct PromptService {
    prompts_path: PathBuf,
    cache: ArcSwap<PromptCache>,
}

impl PromptService {
    pub fn new(prompts_path: impl Into<PathBuf>) -> Self {
        let service = Self {
            prompts_path: prompts_path.into(),
            cache: ArcSwap::from_pointee(HashMap::new()),
        };
        service.reload();
        service
    }

    /// Re-reads every `*.prompt` file from disk. Returns the number of
    /// prompts loaded; a missing directory is not an error, just empty.
    pub fn reload(&self) -> usize {
        let mut loaded = PromptCache::new();
        let mut count = 0;

        if !self.prompts_path.exists() {
            warn!(path = %self.prompts_path.display(), "prompts directory not found");
            self.cache.store(Arc::new(loaded));
            return 0;
        }

        for prompt_type in PromptType::ALL {
            let type_dir = self.prompts_path.join(prompt_type.dir_name());
            let mut entries = HashMap::new();
            if let Ok(read_dir) = fs::read_dir(&type_dir) {
                for entry in read_dir.flatten() {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) != Some("prompt") {
                        continue;
                    }
                    let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                        continue;
                    };
                    match fs::read_to_string(&path) {
                        Ok(content) => {
                            entries.insert(name.to_string(), content.trim().to_string());
                            count += 1;
                        }
                        Err(err) => warn!(%err, path = %path.display(), "failed to load prompt"),
                    }
                }
            }
            loaded.insert(prompt_type, entries);
        }

        info!(count, path = %self.prompts_path.display(), "loaded prompts");
        self.cache.store(Arc::new(loaded));
        count
    }

    pub fn get(&self, prompt_type: PromptType, name: &str) -> Result<String, CoreError> {
        let cache = self.cache.load();
        cache
            .get(&prompt_type)
            .and_then(|m| m.get(name))
            .cloned()
            .ok_or_else(|| CoreError::PromptNotFound(format!("{}/{name}", prompt_type.dir_name())))
    }

    pub fn has_prompt(&self, prompt_type: PromptType, name: &str) -> bool {
        self.cache
            .load()
            .get(&prompt_type)
            .map(|m| m.contains_key(name))
            .unwrap_or(false)
    }

    pub fn list_prompts(&self, prompt_type: PromptType) -> Vec<String> {
        let mut names: Vec<String> = self
            .cache
            .load()
            .get(&prompt_type)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn prompts_path(&self) -> &Path {
        &self.prompts_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prompt_raises_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let service = PromptService::new(dir.path());
        let err = service.get(PromptType::Chat, "default").unwrap_err();
        assert!(matches!(err, CoreError::PromptNotFound(_)));
    }

    #[test]
    fn loads_and_trims_prompt_file() {
        let dir = tempfile::tempdir().unwrap();
        let chat_dir = dir.path().join("chat");
        fs::create_dir_all(&chat_dir).unwrap();
        fs::write(chat_dir.join("default.prompt"), "  hello there  \n").unwrap();

        let service = PromptService::new(dir.path());
        assert_eq!(service.get(PromptType::Chat, "default").unwrap(), "hello there");
        assert!(service.has_prompt(PromptType::Chat, "default"));
        assert_eq!(service.list_prompts(PromptType::Chat), vec!["default".to_string()]);
    }
}
