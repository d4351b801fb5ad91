//! 译文查找
//!
//! 持久化译文存储通过 `TranslationStore` 接入，机器翻译作为可选的
//! `MachineTranslator` 回退。查找结果按提取顺序的位置索引返回，
//! 同一字符串出现多次时每个位置各自得到译文，没有译文的位置不出现在结果中。

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::translation::error::{RenderError, RenderResult};

/// 翻译块类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BlockType {
    Simple = 1,
    Deprecated = 2,
}

impl TryFrom<u8> for BlockType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(BlockType::Simple),
            2 => Ok(BlockType::Deprecated),
            other => Err(format!("未知的翻译块类型: {}", other)),
        }
    }
}

impl From<BlockType> for u8 {
    fn from(value: BlockType) -> Self {
        value as u8
    }
}

/// 已合并的多节点翻译块
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationBlock {
    pub id: u64,
    pub original: String,
    /// 去除标签并折叠空白后的原文，在匹配前计算
    #[serde(default)]
    pub trimmed_original: String,
    pub block_type: BlockType,
    #[serde(default)]
    pub status: i64,
}

impl TranslationBlock {
    pub fn new(id: u64, original: impl Into<String>, block_type: BlockType) -> Self {
        Self {
            id,
            original: original.into(),
            trimmed_original: String::new(),
            block_type,
            status: 0,
        }
    }

    pub fn with_status(mut self, status: i64) -> Self {
        self.status = status;
        self
    }
}

/// 持久化译文存储
pub trait TranslationStore: Send + Sync {
    /// 某语言下的全部翻译块
    fn get_all_blocks(&self, language: &str) -> RenderResult<Vec<TranslationBlock>>;

    /// 按位置返回译文
    fn lookup(&self, strings: &[String], language: &str) -> RenderResult<HashMap<usize, String>>;

    /// 字符串在存储中的ID，仅在预览模式下使用
    fn get_string_ids(&self, strings: &[String], language: &str)
        -> RenderResult<HashMap<String, u64>>;
}

/// 机器翻译回退
pub trait MachineTranslator: Send + Sync {
    /// 按位置返回译文
    fn translate(&self, strings: &[String], language: &str) -> RenderResult<HashMap<usize, String>>;
}

/// 译文查找
pub struct TranslationLookup<'a> {
    store: &'a dyn TranslationStore,
    translator: Option<&'a dyn MachineTranslator>,
}

impl<'a> TranslationLookup<'a> {
    pub fn new(
        store: &'a dyn TranslationStore,
        translator: Option<&'a dyn MachineTranslator>,
    ) -> Self {
        Self { store, translator }
    }

    /// 为提取出的字符串序列查找译文
    ///
    /// 存储按去重后的字符串批量查询；存储失败视为全部未命中。
    /// `skip_machine_translation` 中的字符串不会交给机器翻译。
    pub fn process_strings(
        &self,
        strings: &[String],
        language: &str,
        skip_machine_translation: &HashSet<String>,
    ) -> HashMap<usize, String> {
        if strings.is_empty() {
            return HashMap::new();
        }

        let mut distinct: Vec<String> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for string in strings {
            if !positions.contains_key(string.as_str()) {
                positions.insert(string.as_str(), distinct.len());
                distinct.push(string.clone());
            }
        }

        let mut found: HashMap<usize, String> = match self.store.lookup(&distinct, language) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("译文存储查询失败，按未命中处理: {}", e);
                HashMap::new()
            }
        };
        found.retain(|index, translation| *index < distinct.len() && !translation.is_empty());

        if let Some(translator) = self.translator {
            self.machine_translate(translator, &distinct, language, skip_machine_translation, &mut found);
        }

        let mut translated = HashMap::new();
        for (index, string) in strings.iter().enumerate() {
            if let Some(translation) = positions
                .get(string.as_str())
                .and_then(|distinct_index| found.get(distinct_index))
            {
                translated.insert(index, translation.clone());
            }
        }

        tracing::debug!(
            "查找译文: {} 个字符串，{} 个有译文",
            strings.len(),
            translated.len()
        );
        translated
    }

    fn machine_translate(
        &self,
        translator: &dyn MachineTranslator,
        distinct: &[String],
        language: &str,
        skip_machine_translation: &HashSet<String>,
        found: &mut HashMap<usize, String>,
    ) {
        let misses: Vec<usize> = (0..distinct.len())
            .filter(|index| !found.contains_key(index))
            .filter(|index| !skip_machine_translation.contains(&distinct[*index]))
            .collect();
        if misses.is_empty() {
            return;
        }

        let pending: Vec<String> = misses.iter().map(|index| distinct[*index].clone()).collect();
        match translator.translate(&pending, language) {
            Ok(translations) => {
                for (pending_index, translation) in translations {
                    if translation.is_empty() {
                        continue;
                    }
                    if let Some(distinct_index) = misses.get(pending_index) {
                        found.insert(*distinct_index, translation);
                    }
                }
            }
            Err(e) => tracing::warn!("机器翻译失败: {}", e),
        }
    }
}

/// 译文数据文件格式：`{"fr": {"Hello": "Bonjour"}}`
pub type TranslationsFile = HashMap<String, HashMap<String, String>>;

/// 翻译块数据文件格式：`{"fr": [{"id": 1, "original": "...", "block_type": 1}]}`
pub type BlocksFile = HashMap<String, Vec<TranslationBlock>>;

/// 内存中的译文存储
#[derive(Default)]
pub struct MemoryTranslationStore {
    translations: HashMap<String, HashMap<String, String>>,
    blocks: HashMap<String, Vec<TranslationBlock>>,
    string_ids: RwLock<HashMap<String, u64>>,
}

impl MemoryTranslationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_translation(
        mut self,
        language: &str,
        original: impl Into<String>,
        translation: impl Into<String>,
    ) -> Self {
        self.insert_translation(language, original, translation);
        self
    }

    pub fn with_block(mut self, language: &str, block: TranslationBlock) -> Self {
        self.blocks
            .entry(language.to_string())
            .or_default()
            .push(block);
        self
    }

    pub fn insert_translation(
        &mut self,
        language: &str,
        original: impl Into<String>,
        translation: impl Into<String>,
    ) {
        let original = original.into();
        self.register_string(&original);
        self.translations
            .entry(language.to_string())
            .or_default()
            .insert(original, translation.into());
    }

    /// 从JSON文件加载译文和翻译块
    pub fn from_files(translations: Option<&Path>, blocks: Option<&Path>) -> RenderResult<Self> {
        let mut store = Self::new();

        if let Some(path) = translations {
            let content = std::fs::read_to_string(path)?;
            let parsed: TranslationsFile = serde_json::from_str(&content)
                .map_err(|e| RenderError::from(e).with_context(path.display()))?;
            for (language, strings) in parsed {
                for (original, translation) in strings {
                    store.insert_translation(&language, original, translation);
                }
            }
        }

        if let Some(path) = blocks {
            let content = std::fs::read_to_string(path)?;
            let parsed: BlocksFile = serde_json::from_str(&content)
                .map_err(|e| RenderError::from(e).with_context(path.display()))?;
            for (language, language_blocks) in parsed {
                store
                    .blocks
                    .entry(language)
                    .or_default()
                    .extend(language_blocks);
            }
        }

        Ok(store)
    }

    fn register_string(&self, original: &str) -> u64 {
        let Ok(mut ids) = self.string_ids.write() else {
            return 0;
        };
        let next = ids.len() as u64 + 1;
        *ids.entry(original.to_string()).or_insert(next)
    }
}

impl TranslationStore for MemoryTranslationStore {
    fn get_all_blocks(&self, language: &str) -> RenderResult<Vec<TranslationBlock>> {
        Ok(self.blocks.get(language).cloned().unwrap_or_default())
    }

    fn lookup(&self, strings: &[String], language: &str) -> RenderResult<HashMap<usize, String>> {
        let Some(table) = self.translations.get(language) else {
            return Ok(HashMap::new());
        };

        Ok(strings
            .iter()
            .enumerate()
            .filter_map(|(index, string)| table.get(string).map(|t| (index, t.clone())))
            .collect())
    }

    fn get_string_ids(
        &self,
        strings: &[String],
        _language: &str,
    ) -> RenderResult<HashMap<String, u64>> {
        // 未知字符串在这里登记，与持久化存储插入待翻译字符串的行为一致
        Ok(strings
            .iter()
            .map(|string| (string.clone(), self.register_string(string)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingStore;

    impl TranslationStore for FailingStore {
        fn get_all_blocks(&self, _language: &str) -> RenderResult<Vec<TranslationBlock>> {
            Err(RenderError::Store("offline".to_string()))
        }

        fn lookup(&self, _strings: &[String], _language: &str) -> RenderResult<HashMap<usize, String>> {
            Err(RenderError::Store("offline".to_string()))
        }

        fn get_string_ids(
            &self,
            _strings: &[String],
            _language: &str,
        ) -> RenderResult<HashMap<String, u64>> {
            Err(RenderError::Store("offline".to_string()))
        }
    }

    struct UppercaseTranslator;

    impl MachineTranslator for UppercaseTranslator {
        fn translate(&self, strings: &[String], _language: &str) -> RenderResult<HashMap<usize, String>> {
            Ok(strings
                .iter()
                .enumerate()
                .map(|(index, s)| (index, s.to_uppercase()))
                .collect())
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_duplicates_receive_independent_positions() {
        let store = MemoryTranslationStore::new().with_translation("fr", "Hello", "Bonjour");
        let lookup = TranslationLookup::new(&store, None);

        let result = lookup.process_strings(&strings(&["Hello", "World", "Hello"]), "fr", &HashSet::new());
        assert_eq!(result.len(), 2);
        assert_eq!(result[&0], "Bonjour");
        assert_eq!(result[&2], "Bonjour");
        assert!(!result.contains_key(&1));
    }

    #[test]
    fn test_empty_translations_are_misses() {
        let store = MemoryTranslationStore::new().with_translation("fr", "Hello", "");
        let lookup = TranslationLookup::new(&store, None);
        assert!(lookup
            .process_strings(&strings(&["Hello"]), "fr", &HashSet::new())
            .is_empty());
    }

    #[test]
    fn test_store_failure_is_treated_as_miss() {
        let lookup = TranslationLookup::new(&FailingStore, None);
        assert!(lookup
            .process_strings(&strings(&["Hello"]), "fr", &HashSet::new())
            .is_empty());
    }

    #[test]
    fn test_machine_translation_respects_opt_out() {
        let store = MemoryTranslationStore::new().with_translation("fr", "Hello", "Bonjour");
        let translator = UppercaseTranslator;
        let lookup = TranslationLookup::new(&store, Some(&translator));

        let skip: HashSet<String> = ["logo.png".to_string()].into_iter().collect();
        let result = lookup.process_strings(&strings(&["Hello", "world", "logo.png"]), "fr", &skip);
        assert_eq!(result[&0], "Bonjour");
        assert_eq!(result[&1], "WORLD");
        assert!(!result.contains_key(&2));
    }

    #[test]
    fn test_string_ids_are_stable() {
        let store = MemoryTranslationStore::new()
            .with_translation("fr", "Hello", "Bonjour")
            .with_translation("fr", "World", "Monde");
        let ids = store
            .get_string_ids(&strings(&["World", "Hello", "New"]), "fr")
            .unwrap();
        assert_eq!(ids["Hello"], 1);
        assert_eq!(ids["World"], 2);
        assert_eq!(ids["New"], 3);
    }

    #[test]
    fn test_block_type_deserialization() {
        let block: TranslationBlock =
            serde_json::from_str(r#"{"id": 4, "original": "<b>Hi</b> there", "block_type": 2, "status": 1}"#)
                .unwrap();
        assert_eq!(block.block_type, BlockType::Deprecated);
        assert_eq!(block.trimmed_original, "");
        assert!(serde_json::from_str::<TranslationBlock>(r#"{"id": 4, "original": "x", "block_type": 7}"#).is_err());
    }
}
