//! Onboarding content (logo, example prompts) that disappears on its own.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::ExamplePrompt;

/// Visibility of the onboarding content for one mounted panel.
///
/// `onboarding_visible` only ever goes from true to false, when the timer
/// fires. Content is additionally hidden as soon as any message exists. The
/// timer task is aborted when this value is dropped.
pub struct EphemeralAffordances {
    onboarding_visible: Arc<AtomicBool>,
    example_prompts: Vec<ExamplePrompt>,
    timer: Option<JoinHandle<()>>,
}

impl EphemeralAffordances {
    /// Arm the onboarding timer. Must be called inside a tokio runtime.
    pub fn mount(timeout: Duration, example_prompts: Vec<ExamplePrompt>) -> Self {
        let onboarding_visible = Arc::new(AtomicBool::new(true));
        let flag = onboarding_visible.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            flag.store(false, Ordering::Release);
            tracing::debug!("onboarding content timed out");
        });

        Self {
            onboarding_visible,
            example_prompts,
            timer: Some(timer),
        }
    }

    pub fn onboarding_visible(&self) -> bool {
        self.onboarding_visible.load(Ordering::Acquire)
    }

    pub fn logo_visible(&self, messages_len: usize) -> bool {
        self.onboarding_visible() && messages_len == 0
    }

    pub fn example_prompts_visible(&self, messages_len: usize) -> bool {
        self.onboarding_visible() && messages_len == 0
    }

    pub fn example_prompts(&self) -> &[ExamplePrompt] {
        &self.example_prompts
    }

    /// Example prompt at `index`, only while prompts are on screen
    pub fn pick_example(&self, index: usize, messages_len: usize) -> Option<&ExamplePrompt> {
        if !self.example_prompts_visible(messages_len) {
            return None;
        }
        self.example_prompts.get(index)
    }
}

impl Drop for EphemeralAffordances {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
