//! Embedding and completion collaborators.

#[cfg(feature = "native")]
pub mod openai;

use crate::error::LlmError;

/// Turns text into embedding vectors.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;

    /// Embed several texts, one vector per input in input order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, LlmError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Answers an instruction over a set of context documents.
pub trait Completer: Send + Sync {
    fn complete(
        &self,
        instruction: &str,
        documents: &[&str],
        temperature: f32,
    ) -> Result<String, LlmError>;
}

impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, LlmError> {
        (**self).embed_batch(texts)
    }
}

impl<T: Completer + ?Sized> Completer for Box<T> {
    fn complete(
        &self,
        instruction: &str,
        documents: &[&str],
        temperature: f32,
    ) -> Result<String, LlmError> {
        (**self).complete(instruction, documents, temperature)
    }
}

impl<T: Embedder + ?Sized> Embedder for std::sync::Arc<T> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, LlmError> {
        (**self).embed_batch(texts)
    }
}

impl<T: Completer + ?Sized> Completer for std::sync::Arc<T> {
    fn complete(
        &self,
        instruction: &str,
        documents: &[&str],
        temperature: f32,
    ) -> Result<String, LlmError> {
        (**self).complete(instruction, documents, temperature)
    }
}

/// Build a single prompt that places the documents before the instruction.
pub fn stuff_documents(instruction: &str, documents: &[&str]) -> String {
    format!(
        "Use the following pieces of context to answer the question at the end. \
         If the context does not contain the answer, say so instead of guessing.\n\n\
         {}\n\nQuestion: {}\nHelpful Answer:",
        documents.join("\n\n"),
        instruction
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stuff_documents_layout() {
        let prompt = stuff_documents("Which name?", &["Name: A", "Sponsor: B"]);
        assert!(prompt.contains("Name: A\n\nSponsor: B\n\nQuestion: Which name?"));
        assert!(prompt.ends_with("Helpful Answer:"));
    }

    struct Lengths;

    impl Embedder for Lengths {
        fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
            Ok(vec![text.len() as f32])
        }
    }

    #[test]
    fn test_default_batch_keeps_order() {
        let vectors = Lengths.embed_batch(&["a", "abc", "ab"]).unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![3.0], vec![2.0]]);
    }
}
