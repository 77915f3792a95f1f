use annai::dialplan::visualize_artifact;
use annai::prelude::*;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Define a CLI-specific enum for clap to parse.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendCli {
    Live,
    Compiled,
}

/// Validate, compile and simulate IVR flows
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Optional engine configuration (JSON or YAML)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a flow document and list its external references
    Validate { flow_path: String },

    /// Compile a flow into a dialplan artifact
    Compile {
        flow_path: String,
        /// Write the bincode artifact here
        #[arg(short, long)]
        out: Option<String>,
        /// Write Asterisk extensions.conf text here
        #[arg(short, long)]
        render: Option<String>,
        /// Print the compiled blocks
        #[arg(long)]
        visualize: bool,
    },

    /// Run a call through a flow with scripted or typed caller inputs
    Simulate {
        flow_path: String,
        /// Scripted call (JSON or YAML); a single "1" press when omitted
        #[arg(short, long)]
        script: Option<String>,
        /// Run a precompiled artifact instead of compiling the flow
        #[arg(short, long)]
        artifact: Option<String>,
        #[arg(short, long, value_enum)]
        backend: Option<BackendCli>,
        /// Prompt for each caller input
        #[arg(short = 'i', long)]
        interactive: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path).unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to load config '{}': {}", path, e))
        }),
        None => EngineConfig::default(),
    };

    match cli.command {
        Command::Validate { flow_path } => run_validate(&flow_path, &config),
        Command::Compile {
            flow_path,
            out,
            render,
            visualize,
        } => run_compile(&flow_path, &config, out, render, visualize),
        Command::Simulate {
            flow_path,
            script,
            artifact,
            backend,
            interactive,
        } => {
            let choice = match backend.unwrap_or(BackendCli::Live) {
                BackendCli::Live => BackendChoice::Live,
                BackendCli::Compiled => BackendChoice::Compiled,
            };
            run_simulation(&flow_path, &config, script, artifact, choice, interactive)
        }
    }
}

fn load_validated(flow_path: &str, config: &EngineConfig) -> Arc<ValidatedFlow> {
    let flow = FlowDocument::from_file(flow_path)
        .and_then(|doc| doc.into_flow())
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to load flow '{}': {}", flow_path, e)));
    let validated = validate(flow, &config.validation_options())
        .unwrap_or_else(|e| exit_with_error(&format!("Validation failed:\n{}", e)));
    Arc::new(validated)
}

fn run_validate(flow_path: &str, config: &EngineConfig) {
    let start = Instant::now();
    let flow = load_validated(flow_path, config);

    println!("Flow '{}' is valid ({:?})", flow.id(), start.elapsed());
    println!("  Root menu:        {}", flow.root_menu());
    println!("  Default language: {}", flow.default_language().code);
    println!("  Menus:            {}", flow.flow().menus.len());
    for warning in flow.warnings() {
        println!("  Warning: {}", warning);
    }
    if !flow.external_refs().is_empty() {
        println!("\n--- External References ---");
        for reference in flow.external_refs() {
            println!("  {}", reference);
        }
    }
}

fn run_compile(
    flow_path: &str,
    config: &EngineConfig,
    out: Option<String>,
    render: Option<String>,
    visualize: bool,
) {
    let flow = load_validated(flow_path, config);

    let compile_start = Instant::now();
    let artifact = compile(&flow, &CompileOptions::from_config(config));
    println!(
        "Compiled '{}': {} menus in {:?}",
        artifact.flow_id,
        artifact.menus.len(),
        compile_start.elapsed()
    );
    println!("Fingerprint: {}", artifact.fingerprint);

    if visualize {
        println!("\n{}", visualize_artifact(&artifact));
    }
    if let Some(path) = out {
        artifact
            .save(&path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to save artifact: {}", e)));
        println!("Artifact written to {}", path);
    }
    if let Some(path) = render {
        fs::write(&path, render_asterisk(&artifact)).unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to write dialplan '{}': {}", path, e))
        });
        println!("Dialplan written to {}", path);
    }
}

fn run_simulation(
    flow_path: &str,
    config: &EngineConfig,
    script_path: Option<String>,
    artifact_path: Option<String>,
    choice: BackendChoice,
    interactive: bool,
) {
    let backend: Arc<dyn CallBackend> = match artifact_path {
        Some(path) => {
            let artifact = DialplanArtifact::from_file(&path).unwrap_or_else(|e| {
                exit_with_error(&format!("Failed to load artifact '{}': {}", path, e))
            });
            Arc::new(DialplanVm::new(Arc::new(artifact)))
        }
        None => load_backend(choice, load_validated(flow_path, config), config),
    };

    let script = match script_path {
        Some(path) => CallScript::from_file(&path).unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to load call script '{}': {}", path, e))
        }),
        None if interactive => CallScript::from_inputs(chrono::Utc::now(), Vec::<String>::new(), 0),
        None => {
            println!("No call script provided. Using the default caller.");
            CallScript::default()
        }
    };

    println!("\nSimulating call '{}' on flow '{}'", script.call_id, backend.flow_id());
    let (mut session, effects) = backend.start(&script.call_id, script.started_at);
    println!("  start      => {}", TraceFormatter::format_effects(&effects));

    if interactive {
        let mut now = script.started_at;
        while !session.is_finished() && !matches!(session.state, CallState::Dispatching(_)) {
            let raw = prompt_for_input("Caller input (digits, timeout, hangup)", Some("timeout"));
            let Some(event) = CallEvent::parse(&raw) else {
                println!("Unrecognized input '{}'.", raw);
                continue;
            };
            now += chrono::Duration::seconds(5);
            apply(backend.as_ref(), &mut session, event, now);
        }
    } else {
        for (at, event) in script.events() {
            if session.is_finished() || matches!(session.state, CallState::Dispatching(_)) {
                break;
            }
            apply(backend.as_ref(), &mut session, event, at);
        }
    }

    if let CallState::Dispatching(_) = session.state {
        let at = session.trace.last().map(|e| e.at).unwrap_or(script.started_at);
        if let Ok(action) = backend.hand_off(&mut session, at) {
            println!("  handoff    => {}", action);
        }
    }

    println!("\n--- Call Trace ---");
    print!("{}", TraceFormatter::format_trace(&session));
    println!("Path: {}", TraceFormatter::format_path(&session));
}

fn apply(
    backend: &dyn CallBackend,
    session: &mut CallSession,
    event: CallEvent,
    at: chrono::DateTime<chrono::Utc>,
) {
    let label = event.to_string();
    match backend.handle(session, event, at) {
        Ok(effects) => println!("  {:<10} => {}", label, TraceFormatter::format_effects(&effects)),
        Err(e) => exit_with_error(&format!("Navigation failed: {}", e)),
    }
}

/// A helper function to prompt the user and read a line of input.
fn prompt_for_input(prompt_text: &str, default: Option<&str>) -> String {
    let mut line = String::new();
    let default_prompt = default.map_or("".to_string(), |d| format!(" [default: {}]", d));

    print!("> {}{}: ", prompt_text, default_prompt);
    io::stdout()
        .flush()
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to flush stdout: {}", e)));

    io::stdin()
        .read_line(&mut line)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to read line: {}", e)));
    let trimmed = line.trim().to_string();

    if trimmed.is_empty() {
        default.unwrap_or("").to_string()
    } else {
        trimmed
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
