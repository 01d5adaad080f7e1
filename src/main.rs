use clap::{Arg, ArgAction, Command};
use intention::config::{Settings, SettingsStore, apply_env_overrides};
use intention::error::UnknownProvider;
use intention::http_client::{HttpClient, ReqwestHttpClient};
use intention::intention_router::{FlowError, IntentionRouter};
use intention::llm_generator::MockBackend;
use intention::model_lister::ModelLister;
use intention::overrides::{RuntimeOverrides, apply_overrides};
use intention::provider_kind::ProviderChoice;
use intention::provider_resolver::ProviderResolver;
use intention::setup_wizard::{SetupWizard, render_settings};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn parse_provider_choice(value: &str) -> Result<ProviderChoice, UnknownProvider> {
    value.parse()
}

fn cli() -> Command {
    Command::new("intent")
        .about("Turn a free-form goal into a committed three-line intention")
        .long_about(
            "intent asks a language model to rewrite what you want to do as a three-line \
             intention (what, why, done when) and prepends it to a dated log file",
        )
        .arg(Arg::new("intention")
            .help("What you intend to do; prompted for when omitted")
            .num_args(1..))
        .arg(Arg::new("provider")
            .long("provider")
            .help("Use this provider for one run: auto, ollama, lmstudio, openai, anthropic, groq")
            .value_name("PROVIDER")
            .value_parser(parse_provider_choice))
        .arg(Arg::new("model")
            .long("model")
            .help("Use this model for one run (ignored in auto mode)")
            .value_name("MODEL"))
        .arg(Arg::new("setup")
            .long("setup")
            .help("Run the setup wizard")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("configure")
            .long("configure")
            .help("Edit the configuration interactively")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("show-config")
            .long("show-config")
            .help("Show configuration information")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("list-models")
            .long("list-models")
            .help("List models offered by a provider (default: the configured one)")
            .value_name("PROVIDER")
            .num_args(0..=1)
            .default_missing_value("current"))
}

fn print_remediation_hints() {
    eprintln!("\nTroubleshooting:");
    eprintln!("  • Is the provider running? (`ollama serve`, or start the LM Studio server)");
    eprintln!("  • Is the model name right? Try `intent --list-models`");
    eprintln!("  • Inspect your configuration with `intent --show-config`");
}

fn read_intention_with_io<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> anyhow::Result<String> {
    write!(output, "🎯 What do you intend to do? ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let matches = cli().get_matches();

    let store = SettingsStore::default_location()?;
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let wizard = SetupWizard::new(ModelLister::new(http.clone()));

    if matches.get_flag("show-config") {
        let settings = store.load()?;
        print!("{}", render_settings(&settings, store.path(), store.exists()));
        return Ok(());
    }

    if matches.get_flag("setup") {
        let settings = wizard.run(&store.load()?).await?;
        store.save(&settings)?;
        println!("✅ Configuration saved to {}", store.path().display());
        return Ok(());
    }

    if matches.get_flag("configure") {
        match wizard.edit(&store.load()?).await? {
            Some(settings) => {
                store.save(&settings)?;
                println!("✅ Configuration saved to {}", store.path().display());
            }
            None => println!("No changes saved."),
        }
        return Ok(());
    }

    let overrides = RuntimeOverrides {
        provider: matches.get_one::<ProviderChoice>("provider").copied(),
        model: matches.get_one::<String>("model").cloned(),
    };

    if let Some(target) = matches.get_one::<String>("list-models") {
        let settings = apply_env_overrides(&store.load()?, |name| std::env::var(name).ok());
        let effective = apply_overrides(&settings, &overrides);
        let choice = if target == "current" {
            effective.provider
        } else {
            target.parse::<ProviderChoice>()?
        };
        ModelLister::new(http.clone()).print_models(choice, &effective).await?;
        return Ok(());
    }

    let settings = if store.exists() {
        store.load()?
    } else {
        println!("👋 No configuration found at {}. Let's set things up.", store.path().display());
        let settings = wizard.run(&Settings::default()).await?;
        store.save(&settings)?;
        settings
    };
    let settings = apply_env_overrides(&settings, |name| std::env::var(name).ok());

    let text = match matches.get_many::<String>("intention") {
        Some(words) => words.map(|s| s.as_str()).collect::<Vec<_>>().join(" "),
        None => read_intention_with_io(&mut io::stdin().lock(), &mut io::stdout())?,
    };

    let resolver = if std::env::var("INTENTION_USE_MOCK").is_ok() {
        info!("Using mock backends (INTENTION_USE_MOCK)");
        ProviderResolver::with_backends(MockBackend::all())
    } else {
        ProviderResolver::new(http)
    };
    let router = IntentionRouter::new(resolver);

    match router.process_intention(&text, &settings, &overrides).await {
        Ok(Some(outcome)) => {
            println!("\n{}\n", outcome.refinement.refined);
            println!(
                "✅ Saved to {} (via {})",
                outcome.output_file.display(),
                outcome.refinement.provider
            );
            Ok(())
        }
        Ok(None) => {
            eprintln!("No intention provided. Use 'intent --help' for usage information.");
            Ok(())
        }
        Err(FlowError::Refine(e)) => {
            eprintln!("❌ {}", e);
            print_remediation_hints();
            std::process::exit(1);
        }
        Err(FlowError::Other(e)) => Err(e),
    }
}
