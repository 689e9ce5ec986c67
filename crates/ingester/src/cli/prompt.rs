//! Interactive prompts behind a small trait so command logic can be driven
//! by scripted answers in tests.

use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Input, Select};

pub trait Prompter {
    /// Pick one item; `None` when the operator aborts (Esc / q).
    fn select(&self, prompt: &str, items: &[String]) -> Result<Option<usize>>;

    /// Free text. An empty answer is returned as-is.
    fn text(&self, prompt: &str) -> Result<String>;
}

/// dialoguer-backed prompts on the controlling terminal
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn select(&self, prompt: &str, items: &[String]) -> Result<Option<usize>> {
        Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact_opt()
            .context("Failed to get user selection")
    }

    fn text(&self, prompt: &str) -> Result<String> {
        Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .context("Failed to get user input")
    }
}

#[cfg(test)]
pub mod scripted {
    use super::Prompter;
    use anyhow::{anyhow, Result};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Answers queued up front; running out is an error.
    #[derive(Default)]
    pub struct ScriptedPrompter {
        selections: RefCell<VecDeque<Option<usize>>>,
        texts: RefCell<VecDeque<String>>,
        pub seen_items: RefCell<Vec<Vec<String>>>,
    }

    impl ScriptedPrompter {
        pub fn answer_select(self, answer: Option<usize>) -> Self {
            self.selections.borrow_mut().push_back(answer);
            self
        }

        pub fn answer_text(self, answer: &str) -> Self {
            self.texts.borrow_mut().push_back(answer.to_string());
            self
        }
    }

    impl Prompter for ScriptedPrompter {
        fn select(&self, _prompt: &str, items: &[String]) -> Result<Option<usize>> {
            self.seen_items.borrow_mut().push(items.to_vec());
            self.selections
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| anyhow!("unexpected select prompt"))
        }

        fn text(&self, _prompt: &str) -> Result<String> {
            self.texts
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| anyhow!("unexpected text prompt"))
        }
    }
}
