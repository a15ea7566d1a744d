use std::path::Path;

use strand_core::{Result, StrandError, Token};
use tokenizers::Tokenizer as HfTokenizer;

/// Text <-> token ids through a Hugging Face `tokenizer.json`.
pub struct StrandTokenizer {
    inner: HfTokenizer,
}

impl StrandTokenizer {
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner =
            HfTokenizer::from_file(path).map_err(|e| StrandError::Tokenizer(e.to_string()))?;
        Ok(Self { inner })
    }

    pub fn encode(&self, text: &str) -> Result<Vec<Token>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| StrandError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    pub fn decode(&self, ids: &[Token]) -> Result<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| StrandError::Tokenizer(e.to_string()))
    }

    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}
