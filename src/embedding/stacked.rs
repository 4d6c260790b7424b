//! Several word-level backends applied one after another.

use std::sync::Arc;

use super::{BackendKind, Embeddings};
use crate::error::{Error, Result};
use crate::sentence::{Sentence, Token};

#[derive(Debug)]
pub struct StackedEmbeddings {
    name: String,
    embeddings: Vec<Arc<dyn Embeddings>>,
}

impl StackedEmbeddings {
    pub fn new(embeddings: Vec<Arc<dyn Embeddings>>) -> Result<Self> {
        if embeddings.is_empty() {
            return Err(Error::InvalidInput(
                "a stack needs at least one embedding".into(),
            ));
        }
        let name = format!(
            "stack({})",
            embeddings.iter().map(|e| e.name()).collect::<Vec<_>>().join(",")
        );
        Ok(Self { name, embeddings })
    }

    pub fn embeddings(&self) -> &[Arc<dyn Embeddings>] {
        &self.embeddings
    }
}

impl Embeddings for StackedEmbeddings {
    fn name(&self) -> &str {
        &self.name
    }

    fn embedding_length(&self) -> usize {
        self.embeddings.iter().map(|e| e.embedding_length()).sum()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Stacked
    }

    fn embed(&self, sentences: &mut [Sentence]) -> Result<()> {
        for embedding in &self.embeddings {
            embedding.embed(sentences)?;
        }
        Ok(())
    }

    /// Concatenation of the members' vectors; `None` if any member is missing.
    fn token_vector(&self, token: &Token) -> Option<Vec<f32>> {
        let mut out = Vec::with_capacity(self.embedding_length());
        for embedding in &self.embeddings {
            out.extend(embedding.token_vector(token)?);
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::word::WordEmbeddings;

    fn table(name: &str, body: &str) -> Arc<dyn Embeddings> {
        Arc::new(WordEmbeddings::parse(name, body.as_bytes()).unwrap())
    }

    #[test]
    fn empty_stack_is_rejected() {
        assert!(matches!(
            StackedEmbeddings::new(Vec::new()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn vectors_concatenate_in_stack_order() {
        let stack = StackedEmbeddings::new(vec![
            table("a", "hello 1 2\n"),
            table("b", "hello 3\n"),
        ])
        .unwrap();
        assert_eq!(stack.embedding_length(), 3);
        assert_eq!(stack.name(), "stack(a,b)");

        let mut sentences = vec![Sentence::new("hello")];
        stack.embed(&mut sentences).unwrap();
        assert_eq!(sentences[0].tokens()[0].embedding(), vec![1.0, 2.0, 3.0]);
        assert_eq!(
            stack.token_vector(&sentences[0].tokens()[0]),
            Some(vec![1.0, 2.0, 3.0])
        );
    }
}
