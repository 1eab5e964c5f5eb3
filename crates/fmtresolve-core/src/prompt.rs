//! Interactive choice capability.

use async_trait::async_trait;

/// Asks the user to pick one of several labels.
///
/// Implementations may wait indefinitely; a dismissed or cancelled prompt
/// resolves to `None`.
#[async_trait]
pub trait ChoicePrompt: Send + Sync {
    async fn choose(&self, placeholder: &str, options: &[&str]) -> Option<usize>;
}

/// Never asks; every prompt counts as cancelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

#[async_trait]
impl ChoicePrompt for NoPrompt {
    async fn choose(&self, _placeholder: &str, _options: &[&str]) -> Option<usize> {
        None
    }
}

/// Always answers with the same index, for non-interactive callers.
#[derive(Debug, Clone, Copy)]
pub struct FixedChoice(pub Option<usize>);

#[async_trait]
impl ChoicePrompt for FixedChoice {
    async fn choose(&self, _placeholder: &str, options: &[&str]) -> Option<usize> {
        self.0.filter(|index| *index < options.len())
    }
}
