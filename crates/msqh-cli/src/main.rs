//! msqh: encrypt files behind "any m of n" personal questions
//!
//! Commands:
//!   encrypt -i <glob>   - register questions and encrypt matching files
//!   decrypt -i <file>   - answer the stored questions and decrypt
//!   inspect <file>      - show a container's header without decrypting
//!   config show         - display the effective configuration

mod prompt;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::OsRng;
use std::io::Write;
use std::path::{Path, PathBuf};

use msqh_core::config::{AnswerInput, MsqhConfig};
use msqh_crypto::{
    collect_digests, open, seal, validate_threshold, verify, AnswerProvider, Container,
    EngineOptions, SealRequest,
};

use prompt::{Console, Questionnaire};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "msqh",
    version,
    about = "Question-locked file encryption",
    long_about = "msqh: encrypt files so that any m of n personal questions, answered correctly, unlock them"
)]
struct Cli {
    /// Path to config.toml
    #[arg(long, env = "MSQH_CONFIG", default_value = "~/.config/msqh/config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "MSQH_LOG")]
    log: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "MSQH_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt one file, or every file matching a glob, behind questions
    Encrypt {
        /// Input file name or glob pattern
        #[arg(long, short = 'i', value_name = "FILENAME")]
        input: String,
        /// Output file name (single input only)
        #[arg(long, short = 'o', value_name = "FILENAME")]
        output: Option<PathBuf>,
        /// Correct answers required to decrypt (prompted when omitted)
        #[arg(long, short = 'm')]
        threshold: Option<u16>,
        /// Echo answers while typing (for IME / wide-character input)
        #[arg(long, short = 'z')]
        visible: bool,
        /// Overwrite existing output files without asking
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Decrypt a container by answering its questions
    Decrypt {
        /// Container file
        #[arg(long, short = 'i', value_name = "FILENAME")]
        input: PathBuf,
        /// Output file name, or '-' for standard output
        #[arg(long, short = 'o', value_name = "FILENAME")]
        output: Option<String>,
        /// Check the result against the original file and report correct answers
        #[arg(long, short = 'c', value_name = "SRC")]
        check: Option<PathBuf>,
        /// Echo answers while typing (for IME / wide-character input)
        #[arg(long, short = 'z')]
        visible: bool,
    },

    /// Show a container's header
    Inspect {
        /// Container file
        input: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = MsqhConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    match cli.command {
        Commands::Encrypt {
            input,
            output,
            threshold,
            visible,
            yes,
        } => cmd_encrypt(&config, &input, output, threshold, visible, yes),
        Commands::Decrypt {
            input,
            output,
            check,
            visible,
        } => cmd_decrypt(&config, &input, output.as_deref(), check.as_deref(), visible),
        Commands::Inspect { input } => cmd_inspect(&input),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(home).join(rest)
    } else {
        path.to_path_buf()
    }
}

/// `<stem>.<extension>` in the current directory
fn default_encrypted_path(input: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    PathBuf::from(format!("{stem}.{extension}"))
}

/// `<prefix><stored name>`, keeping only the last component of the stored name
fn default_decrypted_path(prefix: &str, stored_name: &str) -> PathBuf {
    let name = Path::new(stored_name)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    PathBuf::from(format!("{prefix}{name}"))
}

/// Files matching a path or glob pattern, sorted.
///
/// An existing file is taken literally, so names like `[decrypted]hi.txt`
/// are not read as character classes.
fn expand_inputs(pattern: &str) -> Result<Vec<PathBuf>> {
    let literal = Path::new(pattern);
    if literal.is_file() {
        return Ok(vec![literal.to_path_buf()]);
    }
    let mut files: Vec<PathBuf> = glob::glob(pattern)
        .with_context(|| format!("invalid input pattern: {pattern}"))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("skipping unreadable path: {e}");
                None
            }
        })
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Write to a temp file in the same directory, then rename over `path`.
fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    std::fs::write(&tmp_path, data)
        .with_context(|| format!("writing {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {} to {}", tmp_path.display(), path.display()))?;
    Ok(())
}

fn answer_mode(config: &MsqhConfig, visible: bool) -> AnswerInput {
    if visible {
        AnswerInput::Visible
    } else {
        config.answers.input
    }
}

// ── `msqh encrypt` ────────────────────────────────────────────────────────────

fn cmd_encrypt(
    config: &MsqhConfig,
    pattern: &str,
    output: Option<PathBuf>,
    threshold: Option<u16>,
    visible: bool,
    yes: bool,
) -> Result<()> {
    let inputs = expand_inputs(pattern)?;
    if inputs.is_empty() {
        anyhow::bail!("input file not found: {pattern}");
    }
    let output = if inputs.len() > 1 && output.is_some() {
        eprintln!("-o is ignored when encrypting multiple files");
        None
    } else {
        output
    };

    let mut console = Console::stdio(answer_mode(config, visible));
    let questionnaire = prompt::register(&mut console)?;
    let n = u16::try_from(questionnaire.questions.len()).context("too many questions")?;
    let m = match threshold {
        Some(m) => m,
        None => prompt::ask_threshold(&mut console, n)?,
    };
    validate_threshold(n, m)?;

    let options = EngineOptions {
        parallel: config.decrypt.parallel,
        max_combinations: config.encrypt.max_combinations,
    };

    for input in &inputs {
        let out = output
            .clone()
            .unwrap_or_else(|| default_encrypted_path(input, &config.encrypt.extension));
        if out.exists() && config.encrypt.confirm_overwrite && !yes {
            let question = format!("Overwrite '{}'? [y/n]", out.display());
            if !console.confirm(&question)? {
                eprintln!("skipped {}", input.display());
                continue;
            }
        }
        encrypt_file(input, &out, &questionnaire, m, &options)
            .with_context(|| format!("encrypting {}", input.display()))?;
    }
    Ok(())
}

fn encrypt_file(
    input: &Path,
    output: &Path,
    questionnaire: &Questionnaire,
    threshold: u16,
    options: &EngineOptions,
) -> Result<()> {
    let plaintext =
        std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let filename = input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let request = SealRequest {
        plaintext: &plaintext,
        filename: &filename,
        questions: &questionnaire.questions,
        answers: &questionnaire.answers,
        threshold,
    };
    let container = seal(&request, options, &mut OsRng)?;
    atomic_write(output, &container.to_bytes()?)?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        derived_keys = container.derived_keys.len(),
        "encrypted"
    );
    eprintln!("{} -> {}", input.display(), output.display());
    Ok(())
}

// ── `msqh decrypt` ────────────────────────────────────────────────────────────

fn read_container(path: &Path) -> Result<Container> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Container::from_bytes(&data).with_context(|| format!("parsing {}", path.display()))
}

fn cmd_decrypt(
    config: &MsqhConfig,
    input: &Path,
    output: Option<&str>,
    check: Option<&Path>,
    visible: bool,
) -> Result<()> {
    let container = read_container(input)?;

    eprintln!(
        "version: {}.{}",
        container.major_version, container.minor_version
    );
    eprintln!("hash function: {}", container.hash_description);
    eprintln!("encryption: {}", container.cipher_description);
    eprintln!();

    let mut console = Console::stdio(answer_mode(config, visible));
    let target = DecryptTarget {
        output,
        check,
        dir: Path::new("."),
    };
    decrypt_container(
        config,
        &container,
        &mut console,
        &target,
        &mut std::io::stdout().lock(),
    )
}

/// Where a decrypted payload goes.
struct DecryptTarget<'a> {
    /// Explicit output path, or `-` for `stdout`
    output: Option<&'a str>,
    /// Reference file for verification mode; nothing is written
    check: Option<&'a Path>,
    /// Directory for the default `<prefix><stored name>` output
    dir: &'a Path,
}

/// Ask every question, decrypt, then verify or write the plaintext.
///
/// Nothing is written unless decryption succeeds.
fn decrypt_container<W: Write>(
    config: &MsqhConfig,
    container: &Container,
    provider: &mut dyn AnswerProvider,
    target: &DecryptTarget<'_>,
    stdout: &mut W,
) -> Result<()> {
    let digests = collect_digests(container, provider)?;

    let options = EngineOptions {
        parallel: config.decrypt.parallel,
        max_combinations: config.encrypt.max_combinations,
    };
    let opened = open(container, &digests, &options)?;

    if let Some(src) = target.check {
        let reference =
            std::fs::read(src).with_context(|| format!("reading {}", src.display()))?;
        let report = verify(&opened, container.question_count(), &reference)?;
        writeln!(
            stdout,
            "decryptable ({} of {} correct)",
            report.correct_count(),
            report.total()
        )?;
        writeln!(stdout, "{}", report.markers())?;
        return Ok(());
    }

    match target.output {
        Some("-") => {
            stdout
                .write_all(&opened.plaintext)
                .and_then(|()| stdout.flush())
                .context("writing to stdout")?;
        }
        _ => {
            let out = target.output.map(PathBuf::from).unwrap_or_else(|| {
                target.dir.join(default_decrypted_path(
                    &config.decrypt.output_prefix,
                    &container.filename,
                ))
            });
            atomic_write(&out, &opened.plaintext)?;
            eprintln!("decrypted to {}", out.display());
        }
    }
    Ok(())
}

// ── `msqh inspect` ────────────────────────────────────────────────────────────

fn cmd_inspect(input: &Path) -> Result<()> {
    let container = read_container(input)?;

    println!("file:          {}", input.display());
    println!(
        "version:       {}.{}",
        container.major_version, container.minor_version
    );
    println!("hash function: {}", container.hash_description);
    println!("encryption:    {}", container.cipher_description);
    println!(
        "threshold:     {} of {}",
        container.threshold,
        container.question_count()
    );
    println!("derived keys:  {}", container.derived_keys.len());
    println!("original name: {}", container.filename);
    println!("original size: {} bytes", container.raw_length);
    println!("payload size:  {} bytes", container.ciphertext.len());
    println!("questions:");
    for (i, question) in container.questions.iter().enumerate() {
        println!("  {}. {question}", i + 1);
    }
    Ok(())
}

// ── `msqh config show` ────────────────────────────────────────────────────────

fn cmd_config_show(config: &MsqhConfig, path: &Path) -> Result<()> {
    println!("# config file: {}", path.display());
    let rendered = toml::to_string_pretty(config).context("serializing config")?;
    print!("{rendered}");
    Ok(())
}
