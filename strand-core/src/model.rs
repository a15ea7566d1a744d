use crate::{GenerateOptions, Generation, Result, Token};

/// A causal language model that extends a prompt token by token.
pub trait CausalLm {
    fn generate_with(
        &mut self,
        prompt: &[Token],
        steps: usize,
        options: GenerateOptions,
    ) -> Result<Generation>;

    /// Generate `steps` tokens after `prompt`.
    fn generate(&mut self, prompt: &[Token], steps: usize) -> Result<Vec<Token>> {
        self.generate_with(prompt, steps, GenerateOptions::default())
            .map(|g| g.tokens)
    }
}
