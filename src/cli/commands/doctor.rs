//! Doctor command - verify tools, models and configuration.

use crate::cli::Output;
use crate::config::{GenerationSettings, Settings};
use crate::generation::{Generator, OllamaGenerator};
use console::style;
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Status {
    Ok,
    Warning,
    Error,
}

/// Outcome of one diagnostic.
#[derive(Debug)]
struct Finding {
    name: String,
    status: Status,
    message: String,
    hint: Option<String>,
}

impl Finding {
    fn new(status: Status, name: &str, message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            hint,
        }
    }

    fn ok(name: &str, message: impl Into<String>) -> Self {
        Self::new(Status::Ok, name, message, None)
    }

    fn warning(name: &str, message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::new(Status::Warning, name, message, Some(hint.into()))
    }

    fn error(name: &str, message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::new(Status::Error, name, message, Some(hint.into()))
    }

    fn print(&self) {
        let icon = match self.status {
            Status::Ok => style("✓").green(),
            Status::Warning => style("!").yellow(),
            Status::Error => style("✗").red(),
        };
        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);
        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Print a titled group of findings and return them.
fn section(title: &str, findings: Vec<Finding>) -> Vec<Finding> {
    println!("{}", style(title).bold());
    for finding in &findings {
        finding.print();
    }
    println!();
    findings
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings, config_path: Option<&str>) -> anyhow::Result<()> {
    Output::header("Earshot Doctor");
    println!();

    let mut findings = Vec::new();

    findings.extend(section(
        "External Tools",
        vec![
            probe_tool(&settings.acquisition.ytdlp_binary, "--version", "Install with: pip install yt-dlp").await,
            probe_tool(&settings.acquisition.ffprobe_binary, "-version", "Install ffmpeg, which ships ffprobe").await,
            probe_tool(&settings.transcription.binary, "--help", "Install with: pip install openai-whisper").await,
        ],
    ));
    findings.extend(section("Models", check_models(settings).await));
    findings.extend(section("Storage", check_storage(settings)));
    findings.extend(section("Configuration", vec![check_config_file(config_path)]));

    let errors = findings.iter().filter(|f| f.status == Status::Error).count();
    let warnings = findings.iter().filter(|f| f.status == Status::Warning).count();

    if errors > 0 {
        Output::error(&format!("{} problem(s) must be fixed before Earshot can answer questions.", errors));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("Ready, with {} warning(s).", warnings));
    } else {
        Output::success("Everything is in place.");
    }

    Ok(())
}

/// Run `binary flag` and report the first line it prints.
async fn probe_tool(binary: &str, flag: &str, hint: &str) -> Finding {
    match Command::new(binary).arg(flag).output().await {
        Ok(output) if output.status.success() => {
            let first_line = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|l| l.trim().chars().take(50).collect::<String>())
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| "installed".to_string());
            Finding::ok(binary, first_line)
        }
        Ok(output) => Finding::error(binary, format!("exited with {}", output.status), hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Finding::error(binary, "not found", hint),
        Err(e) => Finding::error(binary, format!("error: {}", e), hint),
    }
}

/// The generation model and, when served by Ollama, the embedding model.
async fn check_models(settings: &Settings) -> Vec<Finding> {
    let mut findings = vec![check_ollama_model("Generation", &settings.generation).await];

    if settings.embedding.provider == "ollama" {
        let embedding = GenerationSettings {
            base_url: settings.embedding.base_url.clone(),
            model: settings.embedding.model.clone(),
            ..settings.generation.clone()
        };
        findings.push(check_ollama_model("Embedding", &embedding).await);
    } else {
        findings.push(Finding::ok(
            "Embedding",
            format!("{} ({} dimensions, no server needed)", settings.embedding.provider, settings.embedding.dimensions),
        ));
    }

    findings
}

async fn check_ollama_model(name: &str, settings: &GenerationSettings) -> Finding {
    let generator = match OllamaGenerator::new(settings) {
        Ok(generator) => generator,
        Err(e) => return Finding::error(name, e.to_string(), "Check the [generation] settings"),
    };

    let health = generator.health_check().await;
    if health.is_ready() {
        Finding::ok(name, format!("{} at {}", settings.model, settings.base_url))
    } else if health.server_accessible {
        Finding::error(
            name,
            format!("{} is not pulled", settings.model),
            format!("Run: ollama pull {}", settings.model),
        )
    } else {
        Finding::error(
            name,
            format!("Ollama not reachable at {}", settings.base_url),
            "Start it with: ollama serve",
        )
    }
}

fn check_storage(settings: &Settings) -> Vec<Finding> {
    let mut findings = Vec::new();

    let data_dir = settings.data_dir();
    findings.push(if data_dir.exists() {
        Finding::ok("Data directory", data_dir.display().to_string())
    } else {
        Finding::warning(
            "Data directory",
            format!("{} does not exist", data_dir.display()),
            "It is created on first run",
        )
    });

    if settings.cache.provider == "memory" {
        findings.push(Finding::warning(
            "Cache",
            "in memory only",
            "Transcripts are lost on exit; set cache.provider = \"sqlite\" to keep them",
        ));
        return findings;
    }

    let db_path = settings.sqlite_path();
    findings.push(match std::fs::metadata(&db_path) {
        Ok(meta) => Finding::ok("Cache", format!("{} ({})", db_path.display(), format_size(meta.len()))),
        Err(_) => Finding::warning(
            "Cache",
            format!("{} not created yet", db_path.display()),
            "It is created on first ingest",
        ),
    });

    findings
}

fn check_config_file(config_path: Option<&str>) -> Finding {
    let path = match config_path {
        Some(p) => Settings::expand_path(p),
        None => Settings::default_config_path(),
    };
    if path.exists() {
        Finding::ok("Config file", path.display().to_string())
    } else {
        Finding::warning(
            "Config file",
            "using defaults",
            format!("Create {} to override them", path.display()),
        )
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
