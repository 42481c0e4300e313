//! knecht: command-line front end for the chat bridge.
//! Reads config, sends each question (argument or stdin line) to the external
//! script, and prints the question and answer to stdout.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use chrono::Local;
use clap::Parser;
use knecht_client::{config, ChatSession, Config, ProcessBridge, RenderStyle};

#[derive(Parser, Debug)]
#[command(name = "knecht", version, about = "Ask an external LLM script from the terminal")]
struct Cli {
    /// Config file (default: $KNECHT_CONFIG or ~/.knecht/config.yaml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the rendered HTML history at the end instead of plain answers.
    #[arg(long)]
    html: bool,
    /// Question to ask. Without it, every non-blank stdin line is a question.
    question: Vec<String>,
}

fn load_config(cli: &Cli) -> Config {
    // 1. --config <path> flag, 2. KNECHT_CONFIG env var: must load.
    let explicit = cli
        .config
        .clone()
        .or_else(|| std::env::var_os("KNECHT_CONFIG").map(PathBuf::from));
    let result = match &explicit {
        Some(path) => config::load(path).map_err(|e| (path.clone(), e)),
        // 3. Default path (~/.knecht/config.yaml), defaults when absent.
        None => match config::default_config_path() {
            Some(path) => config::load_or_default(&path).map_err(|e| (path, e)),
            None => Ok(Config::default()),
        },
    };
    result.unwrap_or_else(|(path, e)| {
        eprintln!("Error: failed to load config from {}: {}", path.display(), e);
        process::exit(1);
    })
}

fn read_questions(cli: &Cli) -> Vec<String> {
    if !cli.question.is_empty() {
        let question = cli.question.join(" ");
        return if question.trim().is_empty() {
            Vec::new()
        } else {
            vec![question]
        };
    }
    io::stdin()
        .lock()
        .lines()
        .map_while(Result::ok)
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// Ask every question in order. Returns `false` if any bridge call failed.
async fn ask_all(
    bridge: &ProcessBridge,
    style: &RenderStyle,
    questions: &[String],
    html: bool,
) -> bool {
    let stdout = io::stdout();
    let mut session = ChatSession::new();
    let mut all_ok = true;

    for question in questions {
        let pending = match session.begin(question, Local::now().time()) {
            Ok(Some(pending)) => pending,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("Error: {}", e);
                all_ok = false;
                continue;
            }
        };
        let outcome = bridge.invoke(&pending.input).await;
        if let Err(e) = &outcome {
            eprintln!("Error: {}", e);
            all_ok = false;
        }
        let entry = match session.finish(&pending, outcome) {
            Ok(entry) => entry,
            Err(e) => {
                eprintln!("Error: {}", e);
                all_ok = false;
                continue;
            }
        };
        if !html {
            let mut out = stdout.lock();
            let _ = writeln!(out, "{}", entry.question);
            let _ = write!(out, "{}", entry.answer);
            let _ = out.flush();
        }
    }

    if html {
        let _ = writeln!(stdout.lock(), "{}", session.render(style));
    }
    all_ok
}

fn main() {
    knecht_client::init_tracing("warn");
    let cli = Cli::parse();
    let cfg = load_config(&cli);

    let questions = read_questions(&cli);
    if questions.is_empty() {
        eprintln!("Error: no question provided (pass it as an argument or on stdin)");
        process::exit(1);
    }

    let bridge = cfg.process_bridge();
    let style = cfg.render_style();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Error: failed to create runtime: {}", e);
            process::exit(1);
        });

    let ok = rt.block_on(ask_all(&bridge, &style, &questions, cli.html));
    if !ok {
        process::exit(1);
    }
}
