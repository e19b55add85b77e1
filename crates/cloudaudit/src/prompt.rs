//! Operator prompts
//!
//! Workflows ask their questions through [`Prompter`] so that tests can
//! script the answers.

use anyhow::{Context, Result, bail};
use cloudaudit_common::is_yes;
use dialoguer::Input;
use dialoguer::theme::SimpleTheme;
use std::collections::VecDeque;

pub trait Prompter {
    /// Ask a free-form question and return the raw answer
    fn ask(&mut self, message: &str) -> Result<String>;

    /// Ask a yes/no question. Only a literal `yes` counts as yes.
    fn confirm(&mut self, message: &str) -> Result<bool> {
        Ok(is_yes(&self.ask(message)?))
    }
}

/// Interactive prompter on the controlling terminal
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&mut self, message: &str) -> Result<String> {
        // The theme appends its own ": " after the prompt text
        let text = message.trim_end().trim_end_matches(':');
        Input::<String>::with_theme(&SimpleTheme)
            .with_prompt(text)
            .allow_empty(true)
            .interact_text()
            .with_context(|| format!("Failed to read answer to: {text}"))
    }
}

/// Prompter that replays canned answers, for non-interactive runs and tests
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }

    /// Questions asked so far, in order
    pub fn asked(&self) -> &[String] {
        &self.asked
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, message: &str) -> Result<String> {
        self.asked.push(message.to_string());
        match self.answers.pop_front() {
            Some(answer) => Ok(answer),
            None => bail!("No scripted answer for prompt: {message}"),
        }
    }
}
