//! Interactive setup wizard and configuration editor.
//!
//! Every prompt reads from an injected [`BufRead`] and writes to an injected
//! [`Write`], so the dialogs can be driven from tests. End of input counts as
//! a blank answer, which keeps the current value.

use crate::config::Settings;
use crate::model_lister::ModelLister;
use crate::provider_kind::{ProviderChoice, ProviderKind};
use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::info;

/// Renders settings for display, with API keys masked.
pub fn render_settings(settings: &Settings, path: &Path, exists: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("Configuration file: {}\n", path.display()));
    out.push_str(&format!(
        "Status: {}\n\n",
        if exists { "Found" } else { "Not found (using defaults)" }
    ));
    out.push_str(&format!("Provider: {}\n", settings.provider));
    out.push_str(&format!("Output file: {}\n", settings.output_file));
    out.push_str(&format!(
        "System prompt: {}\n",
        match settings.system_prompt.as_deref() {
            Some(prompt) => prompt.lines().next().unwrap_or_default().to_string(),
            None => "(default)".to_string(),
        }
    ));

    out.push_str("\nModels:\n");
    for kind in ProviderKind::PRIORITY {
        out.push_str(&format!("  {:<10} {}\n", kind.as_str(), settings.model_for(kind)));
    }
    out.push_str("\nHosts:\n");
    for kind in ProviderKind::PRIORITY.iter().filter(|k| k.is_host_based()) {
        out.push_str(&format!(
            "  {:<10} {}\n",
            kind.as_str(),
            settings.host_for(*kind).unwrap_or_default()
        ));
    }
    out.push_str("\nAPI keys:\n");
    for kind in ProviderKind::PRIORITY.iter().filter(|k| k.requires_api_key()) {
        out.push_str(&format!(
            "  {:<10} {}\n",
            kind.as_str(),
            settings.api_key_for(*kind).map(mask_key).unwrap_or_else(|| "Not set".to_string())
        ));
    }
    out
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

/// Writes `question` and reads one trimmed line. `None` on end of input.
fn prompt_line<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> Result<Option<String>> {
    write!(output, "{}", question)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        writeln!(output)?;
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Like [`prompt_line`], but end of input reads as a blank answer.
fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<String> {
    Ok(prompt_line(input, output, question)?.unwrap_or_default())
}

fn parse_provider_answer(answer: &str) -> Option<ProviderChoice> {
    if let Ok(index) = answer.parse::<usize>() {
        return match index {
            0 => Some(ProviderChoice::Auto),
            n => ProviderKind::PRIORITY.get(n - 1).copied().map(ProviderChoice::Fixed),
        };
    }
    answer.parse().ok()
}

pub struct SetupWizard {
    lister: ModelLister,
}

impl SetupWizard {
    pub fn new(lister: ModelLister) -> Self {
        Self { lister }
    }

    // =========================================================================
    // Core methods with I/O injection (testable)
    // =========================================================================

    /// Walks through provider, connection, model and output file.
    pub async fn run_with_io<R: BufRead, W: Write>(
        &self,
        current: &Settings,
        input: &mut R,
        output: &mut W,
    ) -> Result<Settings> {
        let mut settings = current.clone();

        writeln!(output, "\n{}", "=".repeat(60))?;
        writeln!(output, "🛠  INTENTION SETUP")?;
        writeln!(output, "{}", "=".repeat(60))?;
        writeln!(output, "Press Enter to keep the value shown in brackets.")?;

        settings.provider = self.choose_provider(settings.provider, input, output)?;

        match settings.provider.fixed() {
            Some(kind) => {
                self.ask_connection(kind, &mut settings, input, output)?;
                self.choose_model(kind, &mut settings, input, output).await?;
            }
            None => {
                writeln!(output, "\nAuto mode tries local providers first, then cloud providers with a key.")?;
                for kind in ProviderKind::PRIORITY {
                    self.ask_connection(kind, &mut settings, input, output)?;
                }
            }
        }

        let answer = ask(
            input,
            output,
            &format!("\nOutput file [{}]: ", settings.output_file),
        )?;
        if !answer.is_empty() {
            settings.output_file = answer;
        }

        writeln!(output, "\n✅ Setup complete. Provider: {}", settings.provider)?;
        info!("Setup wizard finished with provider {}", settings.provider);
        Ok(settings)
    }

    fn choose_provider<R: BufRead, W: Write>(
        &self,
        current: ProviderChoice,
        input: &mut R,
        output: &mut W,
    ) -> Result<ProviderChoice> {
        writeln!(output, "\nWhich provider should refine your intentions?")?;
        writeln!(output, "  0) auto       - detect what is available")?;
        for (i, kind) in ProviderKind::PRIORITY.iter().enumerate() {
            let class = if kind.is_host_based() { "local" } else { "cloud, API key" };
            writeln!(output, "  {}) {:<10} - {} ({})", i + 1, kind.as_str(), kind.label(), class)?;
        }

        loop {
            let answer = ask(input, output, &format!("Provider [{}]: ", current))?;
            if answer.is_empty() {
                return Ok(current);
            }
            match parse_provider_answer(&answer) {
                Some(choice) => return Ok(choice),
                None => writeln!(output, "Invalid choice. Enter a number from the list or a provider name.")?,
            }
        }
    }

    fn ask_connection<R: BufRead, W: Write>(
        &self,
        kind: ProviderKind,
        settings: &mut Settings,
        input: &mut R,
        output: &mut W,
    ) -> Result<()> {
        if kind.is_host_based() {
            let current = settings.host_for(kind).unwrap_or_default().to_string();
            let answer = ask(input, output, &format!("{} host [{}]: ", kind.label(), current))?;
            if !answer.is_empty() {
                settings.set_host(kind, answer);
            }
        } else {
            let status = if settings.api_key_for(kind).is_some() { "set" } else { "not set" };
            let answer = ask(
                input,
                output,
                &format!("{} API key ({}, Enter to keep): ", kind.label(), status),
            )?;
            if !answer.is_empty() {
                settings.set_api_key(kind, answer);
            }
        }
        Ok(())
    }

    async fn choose_model<R: BufRead, W: Write>(
        &self,
        kind: ProviderKind,
        settings: &mut Settings,
        input: &mut R,
        output: &mut W,
    ) -> Result<()> {
        let models = match self.lister.list_models(kind, settings).await {
            Ok(models) => models,
            Err(e) => {
                writeln!(output, "⚠️  Could not list {} models: {:#}", kind.label(), e)?;
                Vec::new()
            }
        };

        if !models.is_empty() {
            writeln!(output, "\nAvailable {} models:", kind.label())?;
            for (i, model) in models.iter().enumerate() {
                writeln!(output, "  {}) {}", i + 1, model)?;
            }
        }

        let current = settings.model_for(kind).to_string();
        loop {
            let answer = ask(input, output, &format!("Model [{}]: ", current))?;
            if answer.is_empty() {
                settings.set_model(kind, current);
                return Ok(());
            }
            match answer.parse::<usize>() {
                Ok(n) if n >= 1 && n <= models.len() => {
                    settings.set_model(kind, models[n - 1].clone());
                    return Ok(());
                }
                Ok(_) if !models.is_empty() => {
                    writeln!(output, "Invalid choice. Enter 1-{} or a model name.", models.len())?;
                }
                _ => {
                    settings.set_model(kind, answer);
                    return Ok(());
                }
            }
        }
    }

    /// Menu-driven editor. Returns `None` when the user quits without saving.
    pub async fn edit_with_io<R: BufRead, W: Write>(
        &self,
        current: &Settings,
        input: &mut R,
        output: &mut W,
    ) -> Result<Option<Settings>> {
        let mut settings = current.clone();

        loop {
            writeln!(output, "\n{}", "-".repeat(60))?;
            writeln!(output, "  1) Provider       {}", settings.provider)?;
            writeln!(output, "  2) Model")?;
            writeln!(output, "  3) Host")?;
            writeln!(output, "  4) API key")?;
            writeln!(output, "  5) Output file    {}", settings.output_file)?;
            writeln!(
                output,
                "  6) System prompt  {}",
                if settings.system_prompt.is_some() { "custom" } else { "default" }
            )?;
            writeln!(output, "  s) Save and exit   q) Quit without saving")?;

            let Some(choice) = prompt_line(input, output, "Choose an option: ")? else {
                return Ok(None);
            };

            match choice.as_str() {
                "1" => {
                    settings.provider = self.choose_provider(settings.provider, input, output)?;
                }
                "2" => {
                    if let Some(kind) = self.pick_provider(&settings, |_| true, input, output)? {
                        self.choose_model(kind, &mut settings, input, output).await?;
                    }
                }
                "3" => {
                    if let Some(kind) = self.pick_provider(&settings, ProviderKind::is_host_based, input, output)? {
                        self.ask_connection(kind, &mut settings, input, output)?;
                    }
                }
                "4" => {
                    if let Some(kind) = self.pick_provider(&settings, ProviderKind::requires_api_key, input, output)? {
                        self.ask_connection(kind, &mut settings, input, output)?;
                    }
                }
                "5" => {
                    let answer = ask(input, output, &format!("Output file [{}]: ", settings.output_file))?;
                    if !answer.is_empty() {
                        settings.output_file = answer;
                    }
                }
                "6" => {
                    writeln!(output, "Enter a single-line system prompt, 'default' to reset, or Enter to keep.")?;
                    let answer = ask(input, output, "System prompt: ")?;
                    if answer.eq_ignore_ascii_case("default") {
                        settings.system_prompt = None;
                    } else if !answer.is_empty() {
                        settings.system_prompt = Some(answer);
                    }
                }
                "s" | "S" => return Ok(Some(settings)),
                "q" | "Q" => return Ok(None),
                _ => writeln!(output, "Invalid choice. Please enter 1-6, s or q.")?,
            }
        }
    }

    /// Asks which provider a per-provider field applies to. Defaults to the
    /// configured provider when it qualifies.
    fn pick_provider<R: BufRead, W: Write>(
        &self,
        settings: &Settings,
        eligible: fn(&ProviderKind) -> bool,
        input: &mut R,
        output: &mut W,
    ) -> Result<Option<ProviderKind>> {
        let candidates: Vec<ProviderKind> =
            ProviderKind::PRIORITY.iter().copied().filter(|k| eligible(k)).collect();
        let default = settings.provider.fixed().filter(|k| eligible(k));

        let names: Vec<&str> = candidates.iter().map(|k| k.as_str()).collect();
        let question = match default {
            Some(kind) => format!("For which provider ({}) [{}]: ", names.join("/"), kind),
            None => format!("For which provider ({}): ", names.join("/")),
        };

        let answer = ask(input, output, &question)?;
        if answer.is_empty() {
            return Ok(default);
        }
        match answer.parse::<ProviderKind>() {
            Ok(kind) if candidates.contains(&kind) => Ok(Some(kind)),
            _ => {
                writeln!(output, "'{}' is not one of: {}", answer, names.join(", "))?;
                Ok(None)
            }
        }
    }

    // =========================================================================
    // Convenience methods using standard I/O
    // =========================================================================

    pub async fn run(&self, current: &Settings) -> Result<Settings> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        self.run_with_io(current, &mut input, &mut output).await
    }

    pub async fn edit(&self, current: &Settings) -> Result<Option<Settings>> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        self.edit_with_io(current, &mut input, &mut output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::HttpClient;
    use crate::http_client::testing::ScriptedHttpClient;
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn wizard(http: ScriptedHttpClient) -> SetupWizard {
        SetupWizard::new(ModelLister::new(Arc::new(http) as Arc<dyn HttpClient>))
    }

    fn offline() -> SetupWizard {
        wizard(ScriptedHttpClient::new())
    }

    async fn run(wizard: &SetupWizard, settings: &Settings, script: &str) -> (Settings, String) {
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output = Vec::new();
        let result = wizard.run_with_io(settings, &mut input, &mut output).await.unwrap();
        (result, String::from_utf8(output).unwrap())
    }

    #[tokio::test]
    async fn test_blank_answers_keep_everything() {
        let settings = Settings::default();
        let (result, output) = run(&offline(), &settings, "").await;
        assert_eq!(result, settings);
        assert!(output.contains("Setup complete"));
    }

    #[tokio::test]
    async fn test_choose_ollama_and_pick_listed_model() {
        let http = ScriptedHttpClient::new().route(
            "http://gpu:11434/api/tags",
            200,
            r#"{"models":[{"name":"llama3.2:latest"},{"name":"qwen2.5:7b"}]}"#,
        );
        // provider, host, model, output file
        let script = "1\nhttp://gpu:11434\n2\n/tmp/out.md\n";

        let (result, output) = run(&wizard(http), &Settings::default(), script).await;

        assert_eq!(result.provider, ProviderChoice::Fixed(ProviderKind::Ollama));
        assert_eq!(result.host_for(ProviderKind::Ollama), Some("http://gpu:11434"));
        assert_eq!(result.model_for(ProviderKind::Ollama), "qwen2.5:7b");
        assert_eq!(result.output_file, "/tmp/out.md");
        assert!(output.contains("1) llama3.2:latest"));
    }

    #[tokio::test]
    async fn test_cloud_provider_by_name_with_free_text_model() {
        // OpenAI listing is unreachable offline; free text is still accepted.
        let script = "openai\nsk-new-key\ngpt-4.1-mini\n\n";

        let (result, output) = run(&offline(), &Settings::default(), script).await;

        assert_eq!(result.provider, ProviderChoice::Fixed(ProviderKind::OpenAi));
        assert_eq!(result.api_key_for(ProviderKind::OpenAi), Some("sk-new-key"));
        assert_eq!(result.model_for(ProviderKind::OpenAi), "gpt-4.1-mini");
        assert!(output.contains("Could not list OpenAI models"));
    }

    #[tokio::test]
    async fn test_invalid_provider_is_asked_again() {
        let script = "9\nnope\n0\n";
        let (result, output) = run(&offline(), &Settings::default(), script).await;
        assert_eq!(result.provider, ProviderChoice::Auto);
        assert_eq!(output.matches("Invalid choice").count(), 2);
    }

    #[tokio::test]
    async fn test_auto_mode_prompts_every_connection() {
        // provider, ollama host, lmstudio host, openai, anthropic, groq keys, output
        let script = "0\n\n\n\nsk-ant\n\n\n";
        let (result, output) = run(&offline(), &Settings::default(), script).await;

        assert_eq!(result.provider, ProviderChoice::Auto);
        assert_eq!(result.api_key_for(ProviderKind::Anthropic), Some("sk-ant"));
        assert_eq!(result.api_key_for(ProviderKind::Groq), None);
        assert!(output.contains("LM Studio host"));
        assert!(output.contains("Groq API key"));
    }

    #[tokio::test]
    async fn test_editor_saves_changes() {
        let script = "5\n/tmp/goals.md\n6\nBe terse.\ns\n";
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output = Vec::new();

        let result = offline()
            .edit_with_io(&Settings::default(), &mut input, &mut output)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.output_file, "/tmp/goals.md");
        assert_eq!(result.system_prompt.as_deref(), Some("Be terse."));
    }

    #[tokio::test]
    async fn test_editor_quit_discards_changes() {
        let script = "5\n/tmp/goals.md\nq\n";
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output = Vec::new();

        let result = offline()
            .edit_with_io(&Settings::default(), &mut input, &mut output)
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_editor_sets_key_for_named_provider() {
        let script = "4\ngroq\ngsk-123\ns\n";
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output = Vec::new();

        let result = offline()
            .edit_with_io(&Settings::default(), &mut input, &mut output)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.api_key_for(ProviderKind::Groq), Some("gsk-123"));
    }

    #[tokio::test]
    async fn test_editor_rejects_host_for_cloud_provider() {
        let script = "3\nopenai\nq\n";
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output = Vec::new();

        offline()
            .edit_with_io(&Settings::default(), &mut input, &mut output)
            .await
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("'openai' is not one of: ollama, lmstudio"));
    }

    #[tokio::test]
    async fn test_editor_resets_system_prompt() {
        let mut settings = Settings::default();
        settings.system_prompt = Some("old".to_string());
        let mut input = Cursor::new(b"6\ndefault\ns\n".to_vec());
        let mut output = Vec::new();

        let result = offline()
            .edit_with_io(&settings, &mut input, &mut output)
            .await
            .unwrap()
            .unwrap();

        assert!(result.system_prompt.is_none());
    }

    #[test]
    fn test_render_masks_keys() {
        let mut settings = Settings::default();
        settings.set_api_key(ProviderKind::OpenAi, "sk-proj-abcdefghijkl");
        settings.set_api_key(ProviderKind::Groq, "short");

        let text = render_settings(&settings, &PathBuf::from("/home/u/.intention/config.json"), true);

        assert!(text.contains("Configuration file: /home/u/.intention/config.json"));
        assert!(text.contains("sk-p…ijkl"));
        assert!(!text.contains("abcdefgh"));
        assert!(text.contains("****"));
        assert!(text.contains("Not set"));
        assert!(text.contains("System prompt: (default)"));
    }

    #[test]
    fn test_parse_provider_answer() {
        assert_eq!(parse_provider_answer("0"), Some(ProviderChoice::Auto));
        assert_eq!(
            parse_provider_answer("2"),
            Some(ProviderChoice::Fixed(ProviderKind::LmStudio))
        );
        assert_eq!(parse_provider_answer("6"), None);
        assert_eq!(
            parse_provider_answer("claude"),
            Some(ProviderChoice::Fixed(ProviderKind::Anthropic))
        );
    }
}
